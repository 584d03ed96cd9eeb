//! Shorthand list items: `[*]`, `[#]`, `[o]` and friends.

use super::{OpenFrame, Parser, ScanFlags, ScanState, Step};
use crate::{catalog::Trim, textproc::is_scan_space};

impl Parser<'_> {
    fn item_codes_enabled(&self, flags: ScanFlags<'_>) -> bool {
        let disabled = &self.options.disabled;
        !disabled.contains("list")
            && !disabled.contains("li")
            && flags
                .restrict
                .is_none_or(|allowed| allowed.contains("list") && allowed.contains("li"))
    }

    /// Open an implicit list item for an item code at `cand`, opening the
    /// surrounding list when needed.
    ///
    /// An item runs to the next line break. When the text after that break
    /// starts another tag the list stays open; otherwise the list ends there.
    pub(super) fn item_code(&self, st: &mut ScanState, cand: usize, flags: ScanFlags<'_>) -> Option<Step> {
        let bytes = st.buf.as_bytes();
        if bytes.get(cand + 2) != Some(&b']') {
            return None;
        }
        let code = char::from(*bytes.get(cand + 1)?);
        let style = self.catalog.item_code(code)?;
        if !self.item_codes_enabled(flags) {
            return None;
        }
        if code == '0' && cand > 0 && !matches!(bytes[cand - 1], b';' | b' ' | b'\t' | b'\n' | b'>') {
            return None;
        }

        let disallow = st.open.last().and_then(|f| f.disallow_children.clone());
        let mut html = String::new();
        match st.open.last().map(|f| f.name.as_str()) {
            Some("li") => {
                st.open.pop();
                html.push_str("</li>");
            }
            Some("list") => {}
            _ => {
                st.open.push(OpenFrame {
                    name: "list".into(),
                    after: "</ul>".into(),
                    block_level: true,
                    trim: Trim::None,
                    nested: false,
                    require_children: Some(tag_set!["li"]),
                    disallow_children: disallow.clone(),
                });
                html.push_str(r#"<ul class="bbc_list">"#);
            }
        }
        st.open.push(OpenFrame {
            name: "li".into(),
            after: "</li>".into(),
            block_level: true,
            trim: Trim::Outside,
            nested: false,
            require_children: None,
            disallow_children: disallow,
        });
        html.push_str(&format!(r#"<li type="{style}">"#));

        let markup = format!("\n{html}\n");
        st.buf.replace_range(cand..cand + 3, &markup);
        let at = cand + markup.len();

        let n = st.open.len();
        let line_break = st.buf[at..].find("<br>").map(|i| at + i);
        let next_close = st.buf[at..].find("[/").map(|i| at + i);
        match line_break {
            Some(br) if next_close.is_none_or(|close| br <= close) => {
                let closer = if continues_list(&st.buf[br + 4..]) {
                    "[/li]"
                } else {
                    "[/li][/list]"
                };
                st.buf.insert_str(br, closer);
                if n >= 2 {
                    st.open[n - 2].after = "</ul>".into();
                }
            }
            _ => {
                st.open[n - 1].after = String::new();
                if n >= 2 {
                    st.open[n - 2].after = "</li></ul>".into();
                }
            }
        }
        Some(Step::Resume(at))
    }
}

/// Whether the run of breaks and blanks at the start of `rest` ends at a `[`,
/// meaning another tag (typically the next item) follows.
fn continues_list(rest: &str) -> bool {
    let mut s = rest;
    let mut last_was_bracket = false;
    loop {
        if let Some(tail) = s.strip_prefix("<br>") {
            s = tail;
            last_was_bracket = false;
        } else if let Some(tail) = s.strip_prefix("&nbsp;") {
            s = tail;
            last_was_bracket = false;
        } else if let Some(tail) = s.strip_prefix('[') {
            s = tail;
            last_was_bracket = true;
        } else if let Some(c) = s.chars().next().filter(|&c| is_scan_space(c) || c == '\n') {
            s = &s[c.len_utf8()..];
            last_was_bracket = false;
        } else {
            return last_was_bracket;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TagSet, catalog::TagCatalog, context::ForumContext};

    fn parse(text: &str) -> String {
        let catalog = TagCatalog::builtin(&ForumContext::default()).expect("builtin tags compile");
        Parser::new(&catalog).parse(text, false, &TagSet::new())
    }

    #[test]
    fn consecutive_items_share_a_list() {
        assert_eq!(
            parse("[*]first\n[*]second"),
            r#"<ul class="bbc_list"><li type="disc">first</li><li type="disc">second</li></ul>"#
        );
    }

    #[test]
    fn list_ends_before_plain_text() {
        assert_eq!(
            parse("[*]one\nafter"),
            r#"<ul class="bbc_list"><li type="disc">one</li></ul>after"#
        );
    }

    #[test]
    fn tag_inside_item_keeps_list_open() {
        let html = parse("[*]a[b]x[/b]\n[*]c");
        assert_eq!(html.matches("<ul").count(), 1, "{html}");
        assert_eq!(html.matches("<li").count(), 2, "{html}");
        assert_eq!(html.matches("</ul>").count(), 1, "{html}");
        assert!(html.contains("a<b>x</b>"), "{html}");
        assert!(html.ends_with("c</li></ul>"), "{html}");
    }

    #[test]
    fn codes_pick_bullet_style() {
        let html = parse("[#]a\n[o]b");
        assert!(html.contains(r#"<li type="square">a</li>"#));
        assert!(html.contains(r#"<li type="circle">b</li>"#));
    }

    #[test]
    fn zero_needs_a_boundary() {
        assert_eq!(parse("x[0]"), "x[0]");
    }

    #[test]
    fn continuation_detection() {
        assert!(continues_list(" <br>[*]"));
        assert!(!continues_list("text"));
        assert!(!continues_list("<br>"));
    }
}
