//! Per-tag validators.
//!
//! A handful of tags need more than template substitution: URLs gain a
//! scheme, code is highlighted, attachments are looked up. Each such tag
//! names a [`TagBehavior`] in its definition. The scanner runs it on the
//! per-occurrence [`ResolvedTag`] after the tag's data has been captured and
//! before the templates are filled in.

mod cowsay;
mod php;

use crate::{
    TagSet,
    context::{ForumContext, has_scheme},
    matcher::ResolvedTag,
    textproc::{escape_special_chars, strtr},
};

pub(crate) use php::highlight as highlight_php;

/// The special tags with custom validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagBehavior {
    Attach,
    Code,
    Cowsay,
    Email,
    Flash,
    Float,
    Ftp,
    Html,
    Img,
    Php,
    Shadow,
    Size,
    Time,
    Url,
}

/// What a validator may consult besides the tag and its data.
#[derive(Debug, Clone, Copy)]
pub struct ValidateEnv<'a> {
    pub disabled: &'a TagSet,
    /// Resolved parameter values, already escaped.
    pub params: &'a [(String, String)],
    pub context: &'a ForumContext,
}

impl ValidateEnv<'_> {
    /// The resolved value of parameter `name`, if it was given.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    fn is_disabled(&self, name: &str) -> bool { self.disabled.contains(name) }
}

const FONT_SIZES: [&str; 7] = ["0.7em", "1em", "1.35em", "1.45em", "2em", "2.65em", "3.95em"];

impl TagBehavior {
    /// Rewrite `tag` and `data` for one occurrence.
    ///
    /// `data[0]` is `$1` in the tag's templates, `data[1]` is `$2` and so on.
    pub fn validate(self, tag: &mut ResolvedTag<'_>, data: &mut [String], env: &ValidateEnv<'_>) {
        if self == Self::Shadow {
            if let Some(direction) = data.get_mut(1) {
                *direction = shadow_offset(direction.trim()).to_string();
            }
            return;
        }
        let Some(first) = data.first_mut() else {
            return;
        };
        match self {
            Self::Attach => attach(tag, first, env),
            Self::Code => {
                if !env.is_disabled("code") {
                    *first = code(first);
                }
            }
            Self::Cowsay => *first = cowsay::render(first),
            Self::Email => *first = first.replace("<br>", ""),
            Self::Flash => {
                if env.is_disabled("url") {
                    tag.content = "$1".into();
                } else if !first.starts_with("http://") && !first.starts_with("https://") {
                    first.insert_str(0, "https://");
                }
            }
            Self::Float => *first = float(first),
            Self::Ftp => {
                *first = first.replace("<br>", "");
                if env.is_disabled("ftp") {
                    tag.content = "$1".into();
                } else if !has_scheme(first) {
                    *first = format!("ftp://{}", first.trim_start_matches([':', '/']));
                }
            }
            Self::Html => {
                if !env.is_disabled("html") {
                    *first = first
                        .split("<br>")
                        .map(|piece| html_escape::decode_html_entities(piece).into_owned())
                        .collect::<Vec<_>>()
                        .join("&#13;");
                }
            }
            Self::Img | Self::Url => *first = normalize_url(first),
            Self::Php => {
                if !env.is_disabled("php") {
                    *first = highlight_php(first);
                }
            }
            Self::Shadow => {}
            Self::Size => {
                if let Some(size) = first
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| FONT_SIZES.get(i))
                {
                    *first = (*size).to_string();
                }
            }
            Self::Time => match first.trim().parse::<i64>() {
                Ok(ts) => {
                    if let Some(formatted) = env.context.format_time(ts) {
                        *first = formatted;
                    }
                }
                Err(_) => tag.content = "[time]$1[/time]".into(),
            },
        }
    }
}

/// Schemes a link or image may point at.
const SAFE_SCHEMES: [&str; 5] = ["http", "https", "ftp", "ftps", "mailto"];

/// Strip line breaks and give scheme-less URLs a protocol-relative prefix.
/// In-page anchors such as `#intro` point at `#post_intro`; any other scheme
/// outside [`SAFE_SCHEMES`] collapses to `#`.
fn normalize_url(url: &str) -> String {
    let url = url.replace("<br>", "");
    if let Some(anchor) = url.strip_prefix('#') {
        format!("#post_{anchor}")
    } else if url.starts_with("//") {
        url
    } else if has_scheme(&url) {
        let (scheme, rest) = url.split_once(':').unwrap_or_default();
        if SAFE_SCHEMES.iter().any(|safe| scheme.eq_ignore_ascii_case(safe)) {
            url
        } else if rest.starts_with(|c: char| c.is_ascii_digit()) {
            // `host:port`, not a scheme.
            format!("//{url}")
        } else {
            "#".to_string()
        }
    } else {
        format!("//{}", url.trim_start_matches([':', '/']))
    }
}

fn float(value: &str) -> String {
    let side = if value.starts_with("left") { "left" } else { "right" };
    let mut out = format!(r#"class="bbc_float float{side}""#);
    if let Some(max) = value
        .split_whitespace()
        .find_map(|part| part.strip_prefix("max="))
    {
        let numeric = max.chars().all(|c| c.is_ascii_digit());
        out.push_str(&format!(
            r#" style="max-width:{max}{}""#,
            if numeric { "px" } else { "" }
        ));
    }
    out
}

fn shadow_offset(direction: &str) -> &'static str {
    let angle = direction.parse::<u32>().ok();
    let below = |limit: u32| angle.is_some_and(|a| a < limit);
    if direction == "top" || below(50) {
        "0 -2px 1px"
    } else if direction == "right" || below(100) {
        "2px 0 1px"
    } else if direction == "bottom" || below(190) {
        "0 2px 1px"
    } else if direction == "left" || below(280) {
        "-2px 0 1px"
    } else {
        "1px 1px 1px"
    }
}

/// Highlight embedded `<?php ... ?>` runs and keep tabs visible.
fn code(body: &str) -> String {
    const OPEN: &str = "&lt;?php";
    const CLOSE: &str = "?&gt;";
    let mut out = String::with_capacity(body.len());
    let mut rest = body;
    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let end = tail[OPEN.len()..]
            .find(CLOSE)
            .map_or(tail.len(), |i| OPEN.len() + i + CLOSE.len());
        out.push_str(&highlight_php(&tail[..end]));
        rest = &tail[end..];
    }
    out.push_str(rest);
    out.replace('\t', "<span style=\"white-space: pre;\">\t</span>")
}

fn attach(tag: &mut ResolvedTag<'_>, label: &mut String, env: &ValidateEnv<'_>) {
    if env.is_disabled("attach") {
        return;
    }
    let found = env
        .param("id")
        .and_then(|id| id.parse::<u64>().ok())
        .zip(env.context.attachments.as_ref())
        .and_then(|(id, resolver)| resolver.resolve(id));
    let Some(attachment) = found else {
        tag.content = format!(
            r#"<span class="bbc_error">{}</span>"#,
            literal(env.context.text("attach_unavailable"))
        );
        return;
    };

    let href = format!(
        "{}?action=dlattach;attach={}",
        env.context.script_url, attachment.id
    );
    let name = literal(&escape_special_chars(&attachment.name));
    if attachment.is_image {
        let alt = env.param("alt").map_or_else(|| name.clone(), literal);
        let width = env
            .param("width")
            .map(str::to_string)
            .or_else(|| attachment.width.map(|w| w.to_string()));
        let height = env
            .param("height")
            .map(str::to_string)
            .or_else(|| attachment.height.map(|h| h.to_string()));
        let mut dims = String::new();
        if let Some(w) = width {
            dims.push_str(&format!(r#" width="{w}""#));
        }
        if let Some(h) = height {
            dims.push_str(&format!(r#" height="{h}""#));
        }
        tag.content = format!(
            r#"<a href="{href};image" class="bbc_link"><img src="{href};image" alt="{alt}" title="{name}"{dims} class="bbc_img"></a>"#
        );
    } else {
        if label.trim().is_empty() {
            *label = name;
        }
        tag.content = format!(r#"<a href="{href}" class="bbc_link">$1</a>"#);
    }
}

/// Make text safe to splice into a template that is later scanned for `$n`.
fn literal(text: &str) -> String { strtr(text, &[("$", "&#036;")]) }
