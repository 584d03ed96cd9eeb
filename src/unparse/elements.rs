//! Element passes: images, the fixed element map, links and the final
//! strip.

use std::sync::LazyLock;

use regex::Regex;

use super::{
    html::{HtmlTag, TAG_RE, find_tag, tags},
    normalize::{SMILEY_CLOSE, SMILEY_OPEN},
};
use crate::{
    context::ForumContext,
    textproc::{escape_special_chars, strtr},
};

static LEFTOVER_RE: LazyLock<Regex> = lazy_regex!(
    r#"</?[A-Za-z][A-Za-z0-9]*(?:[^>"']|"[^"]*"|'[^']*')*>|<![^>]*>|<\?[^>]*>"#,
    "leftover markup pattern compiles"
);

static EMPTY_PAIR_RE: LazyLock<Regex> = lazy_regex!(
    r"(?i)\[b\]\s*\[/b\]|\[i\]\s*\[/i\]|\[u\]\s*\[/u\]|\[s\]\s*\[/s\]",
    "empty pair pattern compiles"
);

/// Widest colspan expanded into placeholder cells.
const MAX_COLSPAN: usize = 64;

/// Replace each tag for which `f` returns a replacement.
fn rewrite(html: &str, mut f: impl FnMut(&HtmlTag) -> Option<String>) -> String {
    let mut out = String::with_capacity(html.len());
    let mut copied = 0;
    for tag in tags(html) {
        if let Some(replacement) = f(&tag) {
            out.push_str(&html[copied..tag.start]);
            out.push_str(&replacement);
            copied = tag.end;
        }
    }
    out.push_str(&html[copied..]);
    out
}

fn dimension<'t>(tag: &'t HtmlTag, name: &str) -> Option<&'t str> {
    tag.attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit()))
}

pub(super) fn images(html: &str, context: &ForumContext) -> String {
    rewrite(html, |tag| {
        if tag.name != "img" || tag.closing {
            return None;
        }
        let src = tag.attr("src").map(str::trim).unwrap_or_default();
        if src.is_empty() {
            return Some(String::new());
        }
        let mut params = String::new();
        if let Some(alt) = tag
            .attr("alt")
            .map(|a| a.replace(['[', ']'], ""))
            .filter(|a| !a.trim().is_empty())
        {
            params.push_str(&format!(" alt={}", escape_special_chars(alt.trim())));
        }
        for name in ["width", "height"] {
            if let Some(value) = dimension(tag, name) {
                params.push_str(&format!(" {name}={value}"));
            }
        }
        let src = escape_special_chars(&context.absolutize(src));
        Some(format!("[img{params}]{src}[/img]"))
    })
}

fn cell(tag: &HtmlTag) -> String {
    if tag.closing {
        return "[/td]".into();
    }
    let span = dimension(tag, "colspan")
        .and_then(|n| n.parse::<usize>().ok())
        .map_or(1, |n| n.clamp(1, MAX_COLSPAN));
    format!("{}[td]", "[td][/td]".repeat(span - 1))
}

/// Elements with a direct bracket equivalent.
pub(super) fn fixed_map(html: &str) -> String {
    rewrite(html, |tag| {
        let name = match tag.name.as_str() {
            "b" | "strong" => "b",
            "i" | "em" => "i",
            "u" => "u",
            "s" | "strike" | "del" => "s",
            other @ ("center" | "pre" | "sub" | "sup" | "tt" | "table" | "tr") => other,
            "td" | "th" => return Some(cell(tag)),
            "br" => return Some("\n".into()),
            "hr" if tag.closing => return Some(String::new()),
            "hr" => return Some("[hr]".into()),
            "blockquote" | "ins" => {
                let slash = if tag.closing { "/" } else { "" };
                return Some(format!("&lt;{slash}{}&gt;", tag.name));
            }
            _ => return None,
        };
        if tag.is_void() && !tag.closing {
            return Some(String::new());
        }
        let slash = if tag.closing { "/" } else { "" };
        Some(format!("[{slash}{name}]"))
    })
}

fn strip_prefix_ci<'h>(href: &'h str, prefix: &str) -> Option<&'h str> {
    href.get(..prefix.len())
        .filter(|head| head.eq_ignore_ascii_case(prefix))
        .map(|_| &href[prefix.len()..])
}

fn link(href: &str, inner: &str, context: &ForumContext) -> String {
    let text = TAG_RE.replace_all(inner, "");
    let text = text.trim();
    if let Some(address) = strip_prefix_ci(href, "mailto:") {
        let address = escape_special_chars(address);
        return if text.is_empty() || text == address {
            format!("[email]{address}[/email]")
        } else {
            format!("[email={address}]{inner}[/email]")
        };
    }
    let (kind, target) = if strip_prefix_ci(href, "ftp://").is_some()
        || strip_prefix_ci(href, "ftps://").is_some()
    {
        ("ftp", href.to_string())
    } else if let Some(anchor) = href.strip_prefix('#') {
        ("url", format!("#{}", anchor.strip_prefix("post_").unwrap_or(anchor)))
    } else {
        ("url", context.absolutize(href))
    };
    let target = escape_special_chars(&target);
    if text.is_empty() || text == target || text == href {
        format!("[{kind}]{target}[/{kind}]")
    } else {
        format!("[{kind}={target}]{inner}[/{kind}]")
    }
}

/// Anchors to `url`, `ftp` or `email` tags. An anchor without `href` leaves
/// only its content behind.
pub(super) fn links(html: &str, context: &ForumContext) -> String {
    let mut html = html.to_string();
    let mut from = 0;
    while let Some(open) = find_tag(&html, from, |t| t.name == "a" && !t.closing) {
        let (inner_end, end) = match find_tag(&html, open.end, |t| t.name == "a") {
            Some(next) if next.closing => (next.start, next.end),
            Some(next) => (next.start, next.start),
            None => (html.len(), html.len()),
        };
        let inner = &html[open.end..inner_end];
        let replacement = match open.attr("href").map(str::trim).filter(|h| !h.is_empty()) {
            Some(href) => link(href, inner, context),
            None => inner.to_string(),
        };
        html.replace_range(open.start..end, &replacement);
        from = open.start + replacement.len();
    }
    html
}

/// Put each bracketed smiley code back as plain text, spaced off from
/// neighbouring words.
fn unmark_smileys(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find(SMILEY_OPEN) {
        let Some(close) = rest[open..].find(SMILEY_CLOSE).map(|i| open + i) else {
            break;
        };
        out.push_str(&rest[..open]);
        if out.chars().next_back().is_some_and(|c| !c.is_whitespace()) {
            out.push(' ');
        }
        out.push_str(&rest[open + SMILEY_OPEN.len_utf8()..close]);
        rest = &rest[close + SMILEY_CLOSE.len_utf8()..];
        if rest.chars().next().is_some_and(char::is_alphanumeric) {
            out.push(' ');
        }
    }
    out.push_str(rest);
    out
}

/// Strip whatever markup is left and tidy the text.
pub(super) fn cleanup(html: &str) -> String {
    let mut text = LEFTOVER_RE.replace_all(html, "").into_owned();
    while EMPTY_PAIR_RE.is_match(&text) {
        text = EMPTY_PAIR_RE.replace_all(&text, "").into_owned();
    }
    let text = strtr(
        &text,
        &[
            ("&amp;#38;", "&amp;"),
            ("&#38;", "&amp;"),
            ("&nbsp;", " "),
            ("&#160;", " "),
            ("&#9;", "\t"),
        ],
    );
    unmark_smileys(&text).trim().to_string()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn context() -> ForumContext { ForumContext::default() }

    #[rstest]
    #[case(r#"<img src="/a.png">"#, "[img]https://forum.example/a.png[/img]")]
    #[case(
        r#"<img src="https://x.test/a.png?a=1&amp;b=2" alt="A &amp; B" width="20" height="10">"#,
        "[img alt=A &amp; B width=20 height=10]https://x.test/a.png?a=1&amp;b=2[/img]"
    )]
    #[case(r#"<img alt="nothing">"#, "")]
    fn converts_images(#[case] html: &str, #[case] expected: &str) {
        assert_eq!(images(html, &context()), expected);
    }

    #[rstest]
    #[case("<strong>a</strong><em>b</em><del>c</del>", "[b]a[/b][i]b[/i][s]c[/s]")]
    #[case("a<br>b<hr>", "a\nb[hr]")]
    #[case(r#"<table><tr><td colspan="3">a</td></tr></table>"#, "[table][tr][td][/td][td][/td][td]a[/td][/tr][/table]")]
    #[case("<th>h</th>", "[td]h[/td]")]
    #[case("<blockquote>q</blockquote>", "&lt;blockquote&gt;q&lt;/blockquote&gt;")]
    #[case("<span>kept</span>", "<span>kept</span>")]
    fn maps_fixed_elements(#[case] html: &str, #[case] expected: &str) {
        assert_eq!(fixed_map(html), expected);
    }

    #[rstest]
    #[case(r#"<a href="https://x.test/">https://x.test/</a>"#, "[url]https://x.test/[/url]")]
    #[case(r#"<a href="https://x.test/">site</a>"#, "[url=https://x.test/]site[/url]")]
    #[case(r#"<a href="/topic/1">t</a>"#, "[url=https://forum.example/topic/1]t[/url]")]
    #[case(r#"<a href="mailto:a@b.test">a@b.test</a>"#, "[email]a@b.test[/email]")]
    #[case(r#"<a href="mailto:a@b.test">write</a>"#, "[email=a@b.test]write[/email]")]
    #[case(r#"<a href="ftp://f.test/x">get</a>"#, "[ftp=ftp://f.test/x]get[/ftp]")]
    #[case(r##"<a href="#post_intro">up</a>"##, "[url=#intro]up[/url]")]
    #[case(r#"<a name="x">plain</a>"#, "plain")]
    #[case(r#"<a href="https://x.test/">open"#, "[url=https://x.test/]open[/url]")]
    fn converts_links(#[case] html: &str, #[case] expected: &str) {
        assert_eq!(links(html, &context()), expected);
    }

    #[test]
    fn cleanup_strips_and_tidies() {
        assert_eq!(
            cleanup("<span>a&nbsp;b</span>[b][/b]<!DOCTYPE html> &#38; [i] [/i]"),
            "a b &amp;"
        );
    }

    #[test]
    fn cleanup_spaces_smileys() {
        assert_eq!(cleanup("hi\u{E03A}:)\u{E03B}there"), "hi :) there");
    }
}
