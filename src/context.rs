//! Values the engine borrows from the surrounding forum.
//!
//! Templates in the tag catalog carry `{txt_*}`, `{scripturl}` and
//! `{hosturl}` tokens. They are resolved once, when the catalog is built,
//! from a [`ForumContext`]. Behaviours that need live data at scan time (the
//! date format for `[time]`, attachment lookups for `[attach]`) reach it
//! through the catalog as well.

use std::{
    collections::BTreeMap,
    fmt::{self, Write as _},
    sync::{Arc, LazyLock},
};

use chrono::DateTime;
use regex::{Captures, Regex};

static TOKEN_RE: LazyLock<Regex> =
    lazy_regex!(r"\{(txt_[A-Za-z0-9_]+|scripturl|hosturl)\}", "context token");
static ORIGIN_RE: LazyLock<Regex> =
    lazy_regex!(r"^([A-Za-z][A-Za-z0-9+.\-]*://[^/?#]+)", "url origin");

/// An attachment as the forum knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub id: u64,
    pub name: String,
    pub is_image: bool,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Looks up attachments referenced by `[attach]` tags.
pub trait AttachmentResolver: Send + Sync {
    /// Return the attachment with `id`, or `None` when it does not exist or
    /// the viewer may not see it.
    fn resolve(&self, id: u64) -> Option<Attachment>;
}

impl<F> AttachmentResolver for F
where
    F: Fn(u64) -> Option<Attachment> + Send + Sync,
{
    fn resolve(&self, id: u64) -> Option<Attachment> { self(id) }
}

/// Forum configuration consumed by the converters.
#[derive(Clone)]
pub struct ForumContext {
    /// Absolute URL of the forum's entry script, e.g.
    /// `https://forum.example/index.php`.
    pub script_url: String,
    /// Absolute URL of the forum host, e.g. `https://forum.example`.
    pub host_url: String,
    /// Localised strings referenced as `{txt_key}`.
    pub texts: BTreeMap<String, String>,
    /// `chrono` format string used for `[time]` and quote dates.
    pub time_format: String,
    pub attachments: Option<Arc<dyn AttachmentResolver>>,
}

impl fmt::Debug for ForumContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForumContext")
            .field("script_url", &self.script_url)
            .field("host_url", &self.host_url)
            .field("texts", &self.texts.len())
            .field("time_format", &self.time_format)
            .field("attachments", &self.attachments.is_some())
            .finish()
    }
}

const DEFAULT_TEXTS: &[(&str, &str)] = &[
    ("quote", "Quote"),
    ("quote_from", "Quote from"),
    ("search_on", "on"),
    ("code", "Code"),
    ("code_select", "Select"),
    ("code_expand", "Expand"),
    ("code_shrink", "Shrink"),
    ("attach_unavailable", "Attachment not available"),
    ("flash_disabled", "Flash is disabled"),
];

impl Default for ForumContext {
    fn default() -> Self {
        Self {
            script_url: "https://forum.example/index.php".into(),
            host_url: "https://forum.example".into(),
            texts: DEFAULT_TEXTS
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            time_format: "%B %d, %Y, %I:%M:%S %p".into(),
            attachments: None,
        }
    }
}

impl ForumContext {
    /// Attach a resolver for `[attach]` references.
    #[must_use]
    pub fn with_attachments(mut self, resolver: impl AttachmentResolver + 'static) -> Self {
        self.attachments = Some(Arc::new(resolver));
        self
    }

    /// Look up a localised string. Unknown keys resolve to the key itself so
    /// a missing translation is visible rather than silently empty.
    #[must_use]
    pub fn text<'a>(&'a self, key: &'a str) -> &'a str {
        self.texts.get(key).map_or(key, String::as_str)
    }

    /// Replace `{txt_*}`, `{scripturl}` and `{hosturl}` tokens in `template`.
    ///
    /// ```
    /// use bbcodec::ForumContext;
    ///
    /// let ctx = ForumContext::default();
    /// assert_eq!(ctx.resolve_tokens("<cite>{txt_quote}</cite>"), "<cite>Quote</cite>");
    /// ```
    #[must_use]
    pub fn resolve_tokens(&self, template: &str) -> String {
        if !template.contains('{') {
            return template.to_string();
        }
        TOKEN_RE
            .replace_all(template, |caps: &Captures| match &caps[1] {
                "scripturl" => self.script_url.clone(),
                "hosturl" => self.host_url.clone(),
                key => self.text(&key["txt_".len()..]).to_string(),
            })
            .into_owned()
    }

    /// Format a unix timestamp with [`Self::time_format`].
    ///
    /// Returns `None` for out-of-range timestamps or an unusable format.
    #[must_use]
    pub fn format_time(&self, timestamp: i64) -> Option<String> {
        let when = DateTime::from_timestamp(timestamp, 0)?;
        let mut out = String::new();
        write!(out, "{}", when.format(&self.time_format)).ok()?;
        Some(out)
    }

    /// Scheme and host of the forum, e.g. `https://forum.example`.
    #[must_use]
    pub fn origin(&self) -> &str {
        ORIGIN_RE
            .captures(&self.script_url)
            .and_then(|c| c.get(1))
            .map_or(self.host_url.as_str(), |m| m.as_str())
    }

    /// Make `href` absolute relative to the forum's entry script.
    ///
    /// Absolute and protocol-relative URLs are returned untouched.
    #[must_use]
    pub fn absolutize(&self, href: &str) -> String {
        if href.starts_with("//") || has_scheme(href) {
            href.to_string()
        } else if href.starts_with('/') {
            format!("{}{href}", self.origin())
        } else {
            let base = self
                .script_url
                .rfind('/')
                .filter(|&i| i >= self.origin().len())
                .map_or_else(|| format!("{}/", self.origin()), |i| self.script_url[..=i].to_string());
            format!("{base}{href}")
        }
    }
}

/// Whether `url` starts with a URI scheme such as `https:` or `mailto:`.
pub(crate) fn has_scheme(url: &str) -> bool {
    let Some(colon) = url.find(':') else {
        return false;
    };
    let scheme = &url[..colon];
    scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_text_keys_fall_back_to_key() {
        let ctx = ForumContext::default();
        assert_eq!(ctx.resolve_tokens("{txt_nope}"), "nope");
        assert_eq!(ctx.resolve_tokens("{scripturl}?a"), "https://forum.example/index.php?a");
    }

    #[test]
    fn formats_timestamps() {
        let ctx = ForumContext {
            time_format: "%Y-%m-%d".into(),
            ..ForumContext::default()
        };
        assert_eq!(ctx.format_time(0).as_deref(), Some("1970-01-01"));
    }

    #[test]
    fn absolutizes_relative_urls() {
        let ctx = ForumContext::default();
        assert_eq!(ctx.absolutize("/a.png"), "https://forum.example/a.png");
        assert_eq!(ctx.absolutize("a.png"), "https://forum.example/a.png");
        assert_eq!(ctx.absolutize("//cdn/a.png"), "//cdn/a.png");
        assert_eq!(ctx.absolutize("mailto:x@y"), "mailto:x@y");
    }

    #[test]
    fn scheme_detection() {
        assert!(has_scheme("ftp://x"));
        assert!(!has_scheme("www.example.com"));
        assert!(!has_scheme("1ab:c"));
    }
}
