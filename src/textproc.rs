//! String helpers shared by the forward and reverse converters.
//!
//! The engine rewrites plain `String` buffers in place. These helpers cover
//! the handful of operations both directions need: simultaneous multi-key
//! replacement, ASCII case-insensitive search, and the storage escaping the
//! forum applies to posts before they reach [`crate::Parser::parse`].

/// Replace every key in `pairs` with its value in a single left-to-right pass.
///
/// At each position the longest matching key wins and replaced text is never
/// rescanned, so `$1` and `$10` can be substituted together safely.
///
/// # Examples
///
/// ```
/// use bbcodec::textproc::strtr;
///
/// let out = strtr("$1-$10", &[("$1", "a"), ("$10", "b")]);
/// assert_eq!(out, "a-b");
/// ```
#[must_use]
pub fn strtr<K: AsRef<str>, V: AsRef<str>>(text: &str, pairs: &[(K, V)]) -> String {
    let mut keys: Vec<(&str, &str)> = pairs
        .iter()
        .map(|(k, v)| (k.as_ref(), v.as_ref()))
        .filter(|(k, _)| !k.is_empty())
        .collect();
    if keys.is_empty() {
        return text.to_string();
    }
    keys.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    'outer: while let Some(ch) = rest.chars().next() {
        for (from, to) in &keys {
            if rest.starts_with(from) {
                out.push_str(to);
                rest = &rest[from.len()..];
                continue 'outer;
            }
        }
        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    out
}

/// Find `needle` in `haystack` at or after byte offset `from`, ignoring ASCII
/// case.
///
/// `needle` must start with an ASCII character so the returned offset is
/// always a character boundary.
#[must_use]
pub fn find_ci(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let hay = haystack.as_bytes();
    let pat = needle.as_bytes();
    if pat.is_empty() || from > hay.len() || hay.len() - from < pat.len() {
        return None;
    }
    hay[from..]
        .windows(pat.len())
        .position(|w| w.eq_ignore_ascii_case(pat))
        .map(|i| i + from)
}

/// Escape text the way the forum stores posts: `&`, `"`, `'`, `<` and `>`
/// become entities.
///
/// The forward parser expects its input in this form; quoted tag values are
/// recognised as `&quot;…&quot;` as well as raw quotes.
///
/// ```
/// use bbcodec::escape_special_chars;
///
/// assert_eq!(escape_special_chars("<b> & \"it's\""), "&lt;b&gt; &amp; &quot;it&#039;s&quot;");
/// ```
#[must_use]
pub fn escape_special_chars(text: &str) -> String {
    strtr(
        text,
        &[
            ("&", "&amp;"),
            ("\"", "&quot;"),
            ("'", "&#039;"),
            ("<", "&lt;"),
            (">", "&gt;"),
        ],
    )
}

/// Whitespace as the scanner sees it. `\n` is excluded: inside the scan
/// buffer it only ever appears as a markup boundary marker.
pub(crate) fn is_scan_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\x0B' | '\x0C')
}

/// Length in bytes of the leading run of `s` made of HTML-ish whitespace:
/// [`is_scan_space`] characters and `&nbsp;`, plus `<br>` when `breaks` is set.
pub(crate) fn whitespace_run(s: &str, breaks: bool) -> usize {
    let mut len = 0;
    loop {
        let rest = &s[len..];
        if rest.starts_with(is_scan_space) {
            len += 1;
        } else if rest.starts_with("&nbsp;") {
            len += "&nbsp;".len();
        } else if breaks && rest.starts_with("<br>") {
            len += "<br>".len();
        } else {
            return len;
        }
    }
}

/// Length in bytes of the trailing run of `s` made of the same whitespace
/// forms as [`whitespace_run`].
pub(crate) fn trailing_whitespace_run(s: &str, breaks: bool) -> usize {
    let mut end = s.len();
    loop {
        let rest = &s[..end];
        if rest.ends_with(is_scan_space) {
            end -= 1;
        } else if rest.ends_with("&nbsp;") {
            end -= "&nbsp;".len();
        } else if breaks && rest.ends_with("<br>") {
            end -= "<br>".len();
        } else {
            return s.len() - end;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strtr_prefers_longest_key() {
        assert_eq!(strtr("  x", &[(" ", "_"), ("  ", " &nbsp;")]), " &nbsp;x");
    }

    #[test]
    fn strtr_does_not_rescan_output() {
        assert_eq!(strtr("ab", &[("a", "b"), ("b", "c")]), "bc");
    }

    #[test]
    fn find_ci_ignores_case() {
        assert_eq!(find_ci("x[/CODE]", "[/code]", 0), Some(1));
        assert_eq!(find_ci("x[/CODE]", "[/code]", 2), None);
    }

    #[test]
    fn whitespace_runs() {
        assert_eq!(whitespace_run(" &nbsp;<br>x", true), 11);
        assert_eq!(whitespace_run(" &nbsp;<br>x", false), 7);
        assert_eq!(trailing_whitespace_run("x<br> ", true), 5);
        assert_eq!(trailing_whitespace_run("x<br> ", false), 1);
    }

    #[test]
    fn markers_are_not_whitespace() {
        assert_eq!(whitespace_run("\n<br>", true), 0);
        assert_eq!(trailing_whitespace_run(" \n", true), 0);
    }
}
