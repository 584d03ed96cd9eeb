//! A small PHP highlighter for `[php]` and `<?php` runs inside `[code]`.
//!
//! The input is already entity-escaped and uses `<br>` for line breaks; the
//! output keeps both and wraps tokens in coloured spans using the classic
//! PHP highlighting palette. It never emits a raw newline.

const DEFAULT: &str = "#0000BB";
const KEYWORD: &str = "#007700";
const STRING: &str = "#DD0000";
const COMMENT: &str = "#FF8000";

const KEYWORDS: &[&str] = &[
    "abstract", "and", "array", "as", "break", "case", "catch", "class", "clone", "const",
    "continue", "declare", "default", "do", "echo", "else", "elseif", "empty", "enum", "extends",
    "final", "finally", "fn", "for", "foreach", "function", "global", "if", "implements",
    "include", "include_once", "instanceof", "interface", "isset", "list", "match", "namespace",
    "new", "or", "print", "private", "protected", "public", "readonly", "require",
    "require_once", "return", "static", "switch", "throw", "trait", "try", "unset", "use", "var",
    "while", "xor", "yield",
];

/// Split off the next token and the colour it should be drawn in. `None`
/// leaves the token uncoloured.
fn next_token(s: &str) -> (Option<&'static str>, usize) {
    const ENTITY_QUOTES: [&str; 2] = ["&quot;", "&#039;"];

    if s.starts_with("<br>") {
        return (None, 4);
    }
    if s.starts_with("&nbsp;") {
        return (None, 6);
    }
    for tag in ["&lt;?php", "&lt;?=", "?&gt;"] {
        if s.starts_with(tag) {
            return (Some(DEFAULT), tag.len());
        }
    }
    if s.starts_with("/*") {
        let end = s[2..].find("*/").map_or(s.len(), |i| i + 4);
        return (Some(COMMENT), end);
    }
    if s.starts_with("//") || s.starts_with('#') {
        return (Some(COMMENT), s.find("<br>").unwrap_or(s.len()));
    }
    for quote in ENTITY_QUOTES {
        if s.starts_with(quote) {
            return (Some(STRING), string_end(s, quote));
        }
    }

    let Some(c) = s.chars().next() else {
        return (None, 0);
    };
    if c == '$' || c == '_' || c.is_alphabetic() {
        let len = c.len_utf8()
            + s[c.len_utf8()..]
                .find(|ch: char| !(ch == '_' || ch.is_alphanumeric()))
                .unwrap_or(s.len() - c.len_utf8());
        let word = &s[..len];
        let colour = if KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(word)) {
            KEYWORD
        } else {
            DEFAULT
        };
        return (Some(colour), len);
    }
    if c.is_ascii_digit() {
        let len = s
            .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '.'))
            .unwrap_or(s.len());
        return (Some(DEFAULT), len);
    }
    if c.is_whitespace() {
        return (None, c.len_utf8());
    }
    if c == '&'
        && let Some((semi, _)) = s.char_indices().take(10).find(|&(_, ch)| ch == ';')
    {
        return (Some(KEYWORD), semi + 1);
    }
    (Some(KEYWORD), c.len_utf8())
}

/// Length of a string literal opened by `quote`, including both quotes.
/// A quote preceded by a backslash does not close the literal.
fn string_end(s: &str, quote: &str) -> usize {
    let mut from = quote.len();
    while let Some(i) = s[from..].find(quote) {
        let at = from + i;
        if s[..at].ends_with('\\') && !s[..at].ends_with("\\\\") {
            from = at + quote.len();
            continue;
        }
        return at + quote.len();
    }
    s.len()
}

/// Colour PHP source, merging neighbouring tokens of the same colour.
pub(crate) fn highlight(source: &str) -> String {
    let mut out = String::with_capacity(source.len() * 2);
    let mut run: Option<&'static str> = None;
    let mut rest = source;
    while !rest.is_empty() {
        let (colour, len) = next_token(rest);
        let len = len.max(1);
        let token = &rest[..len];
        match colour {
            Some(c) if run == Some(c) => {}
            Some(c) => {
                if run.is_some() {
                    out.push_str("</span>");
                }
                out.push_str(&format!(r#"<span style="color: {c}">"#));
                run = Some(c);
            }
            None => {}
        }
        out.push_str(token);
        rest = &rest[len..];
    }
    if run.is_some() {
        out.push_str("</span>");
    }
    out
}
