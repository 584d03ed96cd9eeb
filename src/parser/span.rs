//! Fix-ups for the text between tags.

use std::sync::LazyLock;

use regex::Regex;

use super::{OpenFrame, Parser, is_link_frame};
use crate::protect::Protector;

static AUTOLINK_RE: LazyLock<Regex> = lazy_regex!(
    r"(?i)(?:(?:https?|ftps?)://|www\.)[^\s<>\[\]\x{E03C}-\x{E03E}]+|[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)+",
    "autolink pattern compiles"
);

/// Entities that end a URL when they appear in escaped text.
const URL_STOPS: [&str; 5] = ["&quot;", "&lt;", "&gt;", "&#039;", "&nbsp;"];

impl Parser<'_> {
    /// Fix up one span of member text.
    ///
    /// Protected tokens are restored, tabs expanded, and (when enabled and
    /// not already inside a link) bare URLs wrapped in link tags. Returns the
    /// new text and, if any link tags were inserted, the offset of the first
    /// so the scanner can parse it.
    pub(super) fn fix_span(
        &self,
        span: &str,
        open: &[OpenFrame],
        protector: &mut Protector,
    ) -> (String, Option<usize>) {
        let text = protector.restore(span).replace('\t', "&nbsp;&nbsp;&nbsp;");
        if !self.options.autolink_urls || open.iter().any(is_link_frame) {
            return (text, None);
        }
        autolink(&text)
    }
}

fn may_link_after(text: &str, at: usize) -> bool {
    text[..at]
        .chars()
        .next_back()
        .is_none_or(|c| c.is_whitespace() || matches!(c, '>' | '.' | '(' | ';' | '\''))
}

/// Trim what the pattern over-collects: trailing entities and punctuation.
fn url_end(candidate: &str) -> usize {
    let mut end = URL_STOPS
        .iter()
        .filter_map(|stop| candidate.find(stop))
        .min()
        .unwrap_or(candidate.len());
    while candidate[..end].ends_with(['.', ',', ';', ':', '!', '?', ')']) {
        end -= 1;
    }
    end
}

/// Wrap bare URLs and e-mail addresses in `[url]`, `[ftp]` or `[email]`.
fn autolink(text: &str) -> (String, Option<usize>) {
    let mut out = String::with_capacity(text.len());
    let mut first = None;
    let mut copied = 0;
    for m in AUTOLINK_RE.find_iter(text) {
        if m.start() < copied || !may_link_after(text, m.start()) {
            continue;
        }
        let found = m.as_str();
        let end = url_end(found);
        let link = &found[..end];
        if link.is_empty() || link.eq_ignore_ascii_case("www.") {
            continue;
        }
        let lower = link.to_ascii_lowercase();
        let tag = if !link.contains("://") && link.contains('@') {
            "email"
        } else if lower.starts_with("ftp") && link.contains("://") {
            "ftp"
        } else {
            "url"
        };
        out.push_str(&text[copied..m.start()]);
        first.get_or_insert(out.len());
        out.push_str(&format!("[{tag}]{link}[/{tag}]"));
        copied = m.start() + end;
    }
    if first.is_none() {
        return (text.to_string(), None);
    }
    out.push_str(&text[copied..]);
    (out, first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_bare_urls() {
        let (out, first) = autolink("see https://a.example/x?q=1&amp;r=2.");
        assert_eq!(out, "see [url]https://a.example/x?q=1&amp;r=2[/url].");
        assert_eq!(first, Some(4));
    }

    #[test]
    fn links_www_and_mail() {
        let (out, _) = autolink("www.example.org or bob@example.org");
        assert_eq!(
            out,
            "[url]www.example.org[/url] or [email]bob@example.org[/email]"
        );
    }

    #[test]
    fn ftp_links_use_ftp_tag() {
        let (out, _) = autolink("ftp://files.example.org/a");
        assert_eq!(out, "[ftp]ftp://files.example.org/a[/ftp]");
    }

    #[test]
    fn urls_after_equals_are_left_alone() {
        let (out, first) = autolink("x=https://a.example");
        assert_eq!(out, "x=https://a.example");
        assert_eq!(first, None);
    }

    #[test]
    fn quoted_urls_stop_at_entity() {
        let (out, _) = autolink("&quot;https://a.example&quot;");
        assert_eq!(out, "&quot;[url]https://a.example[/url]&quot;");
    }
}
