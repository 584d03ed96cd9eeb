//! Placeholder tokens that shield fragments from the scanner.
//!
//! A protected fragment is swapped for a token made of private-use
//! characters, so no tag pattern, smiley or whitespace rule can see into it.
//! Tokens met in ordinary text are restored to their replacement markup;
//! any left at the end of a parse (for instance inside `[code]`) go back to
//! the original source text.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::textproc::strtr;

const OPEN: char = '\u{E03C}';
const CLOSE: char = '\u{E03E}';

static TOKEN_RE: LazyLock<Regex> = lazy_regex!(r"\x{E03C}(\d+)\x{E03E}", "token pattern compiles");

#[derive(Debug)]
struct Entry {
    original: String,
    replacement: String,
    restored: bool,
}

/// The table of live placeholder tokens for one parse.
#[derive(Debug, Default)]
pub struct Protector {
    entries: Vec<Entry>,
}

impl Protector {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Shield `fragment`; the token restores to the fragment itself.
    pub fn protect(&mut self, fragment: &str) -> String { self.protect_as(fragment, fragment) }

    /// Shield `original`, restoring it as `replacement` when it surfaces in
    /// ordinary text.
    pub fn protect_as(&mut self, original: &str, replacement: &str) -> String {
        let token = format!("{OPEN}{}{CLOSE}", self.entries.len());
        self.entries.push(Entry {
            original: original.to_string(),
            replacement: replacement.to_string(),
            restored: false,
        });
        token
    }

    /// Swap tokens in `text` for their replacements. Each token is restored
    /// once; a repeated token is left in place.
    pub fn restore(&mut self, text: &str) -> String {
        if self.entries.is_empty() || !text.contains(OPEN) {
            return text.to_string();
        }
        TOKEN_RE
            .replace_all(text, |caps: &Captures<'_>| {
                let entry = caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| self.entries.get_mut(i));
                match entry {
                    Some(entry) if !entry.restored => {
                        entry.restored = true;
                        entry.replacement.clone()
                    }
                    _ => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// Swap every token still present for its original text.
    #[must_use]
    pub fn restore_original(&self, text: &str) -> String {
        if self.entries.is_empty() || !text.contains(OPEN) {
            return text.to_string();
        }
        let pairs: Vec<(String, &str)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (format!("{OPEN}{i}{CLOSE}"), e.original.as_str()))
            .collect();
        strtr(text, &pairs)
    }
}

static POST_LINK_RE: LazyLock<Regex> = lazy_regex!(
    r"(?is)&lt;a\s+href=(?:&quot;)?((?:https?://|ftps?://|mailto:)\S+?)(?:&quot;)?&gt;(.*?)&lt;/a&gt;",
    "post link pattern compiles"
);
static POST_IMG_RE: LazyLock<Regex> = lazy_regex!(
    r"(?i)&lt;img\s+src=(?:&quot;)?((?:https?://|ftps?://)\S+?)(?:&quot;)?(?:\s+alt=(?:&quot;(.*?)&quot;|([^\s&]*)))?\s*/?&gt;",
    "post image pattern compiles"
);
static POST_VOID_RE: LazyLock<Regex> =
    lazy_regex!(r"(?i)&lt;(br|hr)\s*/?&gt;", "post void pattern compiles");
static POST_PAIRED_RE: LazyLock<Regex> = lazy_regex!(
    r"(?i)&lt;(/?)(b|u|i|s|em|ins|del|pre|blockquote|strong)&gt;",
    "post paired pattern compiles"
);

/// Convert the small HTML subset members may type into BBCode or protected
/// markup. The input is already entity-escaped.
///
/// Links and images become `[url]`/`[email]`/`[img]` tags. Line breaks,
/// rules and simple formatting elements are protected as real markup, with
/// any unclosed elements closed at the end of the text.
pub fn protect_post_html(text: &str, protector: &mut Protector) -> String {
    let text = POST_LINK_RE.replace_all(text, |caps: &Captures<'_>| {
        let href = &caps[1];
        match href.strip_prefix("mailto:") {
            Some(address) => format!("[email={address}]{}[/email]", &caps[2]),
            None => format!("[url=&quot;{href}&quot;]{}[/url]", &caps[2]),
        }
    });
    let text = POST_IMG_RE.replace_all(&text, |caps: &Captures<'_>| {
        match caps.get(2).or_else(|| caps.get(3)).filter(|m| !m.as_str().is_empty()) {
            Some(alt) => format!("[img alt=&quot;{}&quot;]{}[/img]", alt.as_str(), &caps[1]),
            None => format!("[img]{}[/img]", &caps[1]),
        }
    });
    let text = POST_VOID_RE.replace_all(&text, |caps: &Captures<'_>| {
        protector.protect_as(&caps[0], &format!("<{}>", caps[1].to_ascii_lowercase()))
    });

    let mut balance: Vec<(String, isize)> = Vec::new();
    let mut text = POST_PAIRED_RE
        .replace_all(&text, |caps: &Captures<'_>| {
            let name = caps[2].to_ascii_lowercase();
            let closing = !caps[1].is_empty();
            let delta = if closing { -1 } else { 1 };
            match balance.iter_mut().find(|(n, _)| *n == name) {
                Some((_, count)) => *count += delta,
                None => balance.push((name.clone(), delta)),
            }
            let slash = if closing { "/" } else { "" };
            protector.protect_as(&caps[0], &format!("<{slash}{name}>"))
        })
        .into_owned();
    for (name, count) in balance.iter().rev() {
        for _ in 0..*count {
            text.push_str(&protector.protect_as("", &format!("</{name}>")));
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restores_replacement_once() {
        let mut p = Protector::new();
        let token = p.protect_as("&lt;b&gt;", "<b>");
        let text = format!("{token}x{token}");
        let restored = p.restore(&text);
        assert_eq!(restored, format!("<b>x{token}"));
    }

    #[test]
    fn leftovers_go_back_to_source() {
        let mut p = Protector::new();
        let token = p.protect_as("&lt;hr&gt;", "<hr>");
        assert_eq!(p.restore_original(&format!("a{token}b")), "a&lt;hr&gt;b");
    }

    #[test]
    fn text_without_tokens_is_untouched() {
        let mut p = Protector::new();
        p.protect("x");
        assert_eq!(p.restore("plain"), "plain");
    }

    #[test]
    fn post_links_become_bbcode() {
        let mut p = Protector::new();
        let out = protect_post_html(
            "&lt;a href=&quot;https://a.example&quot;&gt;A&lt;/a&gt; &lt;a href=mailto:me@x.org&gt;me&lt;/a&gt;",
            &mut p,
        );
        assert_eq!(
            out,
            "[url=&quot;https://a.example&quot;]A[/url] [email=me@x.org]me[/email]"
        );
        assert!(p.is_empty());
    }

    #[test]
    fn post_images_keep_alt_text() {
        let mut p = Protector::new();
        let out = protect_post_html(
            "&lt;img src=&quot;https://a.example/p.png&quot; alt=&quot;cat&quot; /&gt;",
            &mut p,
        );
        assert_eq!(out, "[img alt=&quot;cat&quot;]https://a.example/p.png[/img]");
    }

    #[test]
    fn unclosed_elements_are_closed() {
        let mut p = Protector::new();
        let out = protect_post_html("&lt;b&gt;x&lt;br /&gt;y", &mut p);
        assert_eq!(p.restore(&out), "<b>x<br>y</b>");
    }
}
