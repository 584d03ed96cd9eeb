//! First pass: line breaks, paragraphs, invisible content and smileys.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::html::{HtmlTag, TAG_RE, tags};
use crate::{
    smileys::SmileyTable,
    textproc::{escape_special_chars, strtr},
};

/// Brackets a smiley code so later passes leave it alone.
pub(super) const SMILEY_OPEN: char = '\u{E03A}';
pub(super) const SMILEY_CLOSE: char = '\u{E03B}';

static INVISIBLE_RE: LazyLock<Regex> = lazy_regex!(
    r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<!--.*?-->|<!\[CDATA\[.*?\]\]>",
    "invisible content pattern compiles"
);

static CODE_RE: LazyLock<Regex> = lazy_regex!(
    r"(?is)(\[code(?:=[^\]]*)?\])(.*?)\[/code\]",
    "code region pattern compiles"
);

static SPACE_RE: LazyLock<Regex> = lazy_regex!(r"[ \t\n\x0C]+", "space run pattern compiles");

static BR_RE: LazyLock<Regex> = lazy_regex!(r"(?i) ?<br\s*/?> ?", "line break pattern compiles");

static PARA_OPEN_RE: LazyLock<Regex> =
    lazy_regex!(r"(?i)<p(\s[^>]*)?>", "paragraph open pattern compiles");

static PARA_CLOSE_RE: LazyLock<Regex> =
    lazy_regex!(r"(?i)</p\s*>", "paragraph close pattern compiles");

static TRAILING_BR_RE: LazyLock<Regex> =
    lazy_regex!(r"(?:<br>| )+$", "trailing break pattern compiles");

pub(super) fn normalize(html: &str, smileys: Option<&SmileyTable>) -> String {
    let text = INVISIBLE_RE.replace_all(html, "");
    let text = CODE_RE.replace_all(&text, |caps: &Captures<'_>| {
        format!("{}{}[/code]", &caps[1], preserve_code(&caps[2]))
    });
    let text = text.replace('\r', "");
    let text = SPACE_RE.replace_all(&text, " ");
    let text = BR_RE.replace_all(&text, "<br>");
    let text = PARA_OPEN_RE.replace_all(&text, "<div$1>");
    let text = PARA_CLOSE_RE.replace_all(&text, "</div><br>");
    let text = division_breaks(&text);
    let text = mark_smileys(&text, smileys);
    TRAILING_BR_RE.replace(text.trim_start(), "").into_owned()
}

/// Elements whose start or end already sits on a line boundary.
const BLOCK_EDGES: [&str; 12] = [
    "blockquote", "br", "div", "li", "ol", "pre", "table", "td", "th", "tr", "ul", "hr",
];

/// A `<div>` without `style` or `align` is a bare line container.
fn plain_division(tag: &HtmlTag) -> bool {
    tag.attr("style").is_none() && tag.attr("align").is_none()
}

/// Put a `<br>` where a bare `<div>` starts or ends a line that would
/// otherwise run into its neighbours. Styled and aligned divisions are left
/// to the later passes.
fn division_breaks(html: &str) -> String {
    let all: Vec<HtmlTag> = tags(html).collect();
    let mut out = String::with_capacity(html.len());
    let mut open: Vec<bool> = Vec::new();
    let mut edge = 0;
    let mut copied = 0;
    for (i, tag) in all.iter().enumerate() {
        out.push_str(&html[copied..tag.start]);
        copied = tag.end;
        if tag.name == "div" && !tag.closing {
            let plain = plain_division(tag);
            open.push(plain);
            let text_end = out.trim_end().len();
            if plain && text_end > edge {
                out.truncate(text_end);
                out.push_str("<br>");
            }
        }
        out.push_str(&html[tag.start..tag.end]);
        if BLOCK_EDGES.contains(&tag.name.as_str()) {
            edge = out.len();
        }
        if tag.name == "div" && tag.closing && open.pop().unwrap_or(true) {
            let rest = html[tag.end..].trim_start();
            let next = all.get(i + 1).filter(|n| n.start == html.len() - rest.len());
            let at_boundary = rest.is_empty()
                || next.is_some_and(|n| {
                    n.name == "br" || (n.closing && BLOCK_EDGES.contains(&n.name.as_str()))
                });
            if !at_boundary {
                copied = html.len() - rest.len();
                out.push_str("<br>");
                edge = out.len();
            }
        }
    }
    out.push_str(&html[copied..]);
    out
}

/// Keep the layout of a code region through whitespace collapsing: only
/// line breaks survive as markup, spacing becomes entities.
fn preserve_code(inner: &str) -> String {
    let inner = inner.replace('\r', "").replace('\n', "<br>");
    let inner = TAG_RE.replace_all(&inner, |caps: &Captures<'_>| {
        if caps[1].is_empty() && caps[2].eq_ignore_ascii_case("br") {
            "<br>"
        } else {
            ""
        }
    });
    strtr(&inner, &[(" ", "&nbsp;"), ("\t", "&#9;")])
}

/// Replace smiley images with their bracketed codes.
fn mark_smileys(html: &str, smileys: Option<&SmileyTable>) -> String {
    let mut out = String::with_capacity(html.len());
    let mut copied = 0;
    for tag in tags(html).filter(|t| t.name == "img" && !t.closing) {
        let by_file = smileys
            .zip(tag.attr("src"))
            .and_then(|(table, src)| table.code_for(src))
            .map(str::to_string);
        let classed = tag
            .attr("class")
            .is_some_and(|c| c.split_whitespace().any(|c| c == "smiley"));
        let code = match by_file {
            Some(code) => code,
            None if classed => tag.attr("alt").map(escape_special_chars).unwrap_or_default(),
            None => continue,
        };
        out.push_str(&html[copied..tag.start]);
        if !code.is_empty() {
            out.push(SMILEY_OPEN);
            out.push_str(&code);
            out.push(SMILEY_CLOSE);
        }
        copied = tag.end;
    }
    out.push_str(&html[copied..]);
    out
}
