//! The forward converter: BBCode in, HTML out.
//!
//! [`Parser::parse`] walks the message once, left to right. Text between
//! tags is fixed up in place (autolinking, tab expansion, protected markup),
//! and every tag that matches a catalog definition is replaced by its HTML.
//! Emitted markup is fenced with `\n` markers so the finishing pass can tell
//! generated HTML from member text; the markers never survive into the
//! output.

mod emit;
mod items;
mod span;

use tracing::{debug, warn};

use crate::{
    TagSet,
    catalog::{TagCatalog, Trim},
    protect::{Protector, protect_post_html},
    smileys::{SmileyTable, substitute_smileys},
    textproc::{strtr, whitespace_run},
};

/// Switches that change how a message is converted.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Tags rendered with their disabled templates.
    pub disabled: TagSet,
    /// Accept the small HTML subset members may type (`<b>`, `<a href>` ...).
    pub enable_post_html: bool,
    /// Turn bare URLs and e-mail addresses into links.
    pub autolink_urls: bool,
}

/// A tag that has been opened and not yet closed.
#[derive(Debug, Clone)]
pub struct OpenFrame {
    pub name: String,
    /// Closing markup, emitted when the frame is popped.
    pub after: String,
    pub block_level: bool,
    pub trim: Trim,
    /// The tag only lives inside particular parents (`li`, `td`, `tr`).
    pub nested: bool,
    pub require_children: Option<TagSet>,
    pub disallow_children: Option<TagSet>,
}

/// How one scan (top level or a nested `parsed_equals` value) behaves.
#[derive(Debug, Clone, Copy)]
struct ScanFlags<'r> {
    smileys: bool,
    restrict: Option<&'r TagSet>,
    top_level: bool,
}

/// The mutable state of one scan.
#[derive(Debug)]
struct ScanState {
    buf: String,
    /// Where the next tag search starts.
    pos: usize,
    /// Start of text that has not yet been through [`Parser::fix_span`].
    last_pos: usize,
    open: Vec<OpenFrame>,
}

/// What the scanner does after looking at a candidate `[`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Not a tag; leave the bracket as text.
    Literal,
    /// Markup was emitted; continue at this offset.
    Resume(usize),
}

/// Converts BBCode to HTML against a tag catalog.
#[derive(Debug, Clone)]
pub struct Parser<'c> {
    catalog: &'c TagCatalog,
    options: ParseOptions,
    smileys: Option<&'c SmileyTable>,
}

impl<'c> Parser<'c> {
    #[must_use]
    pub fn new(catalog: &'c TagCatalog) -> Self {
        Self {
            catalog,
            options: ParseOptions::default(),
            smileys: None,
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_smileys(mut self, table: &'c SmileyTable) -> Self {
        self.smileys = Some(table);
        self
    }

    #[must_use]
    pub fn catalog(&self) -> &'c TagCatalog { self.catalog }

    #[must_use]
    pub fn options(&self) -> &ParseOptions { &self.options }

    /// Convert an escaped BBCode message to HTML.
    ///
    /// `restrict`, when non-empty, limits recognition to the named tags.
    /// Smileys are substituted only when `enable_smileys` is set and a
    /// smiley table was supplied.
    #[must_use]
    pub fn parse(&self, text: &str, enable_smileys: bool, restrict: &TagSet) -> String {
        if text.is_empty() {
            return String::new();
        }
        let mut protector = Protector::new();
        let source = if self.options.enable_post_html {
            protect_post_html(text, &mut protector)
        } else {
            text.to_string()
        };
        let buf = strtr(&source, &[("\r\n", "<br>"), ("\n", "<br>"), ("\r", "")]);
        let flags = ScanFlags {
            smileys: enable_smileys,
            restrict: (!restrict.is_empty()).then_some(restrict),
            top_level: true,
        };
        let html = self.scan(buf, flags, &mut protector);
        debug!(input = text.len(), output = html.len(), "message parsed");
        protector.restore_original(&html)
    }

    fn scan(&self, buf: String, flags: ScanFlags<'_>, protector: &mut Protector) -> String {
        let tag_re = self.catalog.tag_pattern(flags.restrict);
        let mut st = ScanState {
            buf,
            pos: 0,
            last_pos: 0,
            open: Vec::new(),
        };

        loop {
            let mut cand = tag_re
                .find_at(&st.buf, st.pos)
                .map_or(st.buf.len(), |m| m.start());

            if cand > st.last_pos {
                let span = &st.buf[st.last_pos..cand];
                let (fixed, inserted) = self.fix_span(span, &st.open, protector);
                if fixed != span {
                    let len = fixed.len();
                    st.buf.replace_range(st.last_pos..cand, &fixed);
                    cand = st.last_pos + inserted.unwrap_or(len);
                }
            }

            if cand + 1 >= st.buf.len() {
                break;
            }

            let step = if st.buf[cand + 1..].starts_with('/') {
                self.close_tag(&mut st, cand)
            } else {
                self.open_tag(&mut st, cand, flags, &tag_re, protector)
            };
            match step {
                Step::Literal => {
                    st.last_pos = cand;
                    st.pos = cand + 1;
                }
                Step::Resume(next) if next <= cand => {
                    warn!(pos = cand, "scan failed to advance; treating the rest as text");
                    st.last_pos = cand;
                    st.pos = st.buf.len();
                }
                Step::Resume(next) => {
                    st.pos = next;
                    st.last_pos = next;
                }
            }
        }

        while let Some(frame) = st.open.pop() {
            st.buf.push('\n');
            st.buf.push_str(&frame.after);
            st.buf.push('\n');
        }
        self.finish(st.buf, flags)
    }

    /// Handle `[/name]`: pop frames down to the innermost `name`, emitting
    /// each popped frame's closing markup.
    fn close_tag(&self, st: &mut ScanState, cand: usize) -> Step {
        if st.open.is_empty() {
            return Step::Literal;
        }
        let Some(end) = st.buf[cand..].find(']').map(|i| cand + i) else {
            return Step::Literal;
        };
        let look_for = st.buf[cand + 2..end].to_ascii_lowercase();
        let Some(idx) = st.open.iter().rposition(|f| f.name == look_for) else {
            return Step::Literal;
        };
        // An inline closer may not reach through block frames.
        if !self.catalog.is_block_level(&look_for) && st.open[idx..].iter().any(|f| f.block_level) {
            return Step::Literal;
        }

        let closing: Vec<OpenFrame> = st.open.drain(idx..).rev().collect();
        st.buf.replace_range(cand..=end, "");
        let mut at = cand;
        for frame in &closing {
            let markup = format!("\n{}\n", frame.after);
            st.buf.insert_str(at, &markup);
            at += markup.len();
            eat_after_close(&mut st.buf, at, frame);
        }
        Step::Resume(at)
    }

    /// Strip the markers and apply the final whitespace rules.
    fn finish(&self, buf: String, flags: ScanFlags<'_>) -> String {
        let mut out = match self.smileys.filter(|_| flags.smileys) {
            Some(table) => buf
                .split('\n')
                .enumerate()
                .map(|(i, part)| {
                    if i % 2 == 0 {
                        substitute_smileys(part, table)
                    } else {
                        part.to_string()
                    }
                })
                .collect::<String>(),
            None => buf.replace('\n', ""),
        };
        if out.starts_with(' ') {
            out.replace_range(..1, "&nbsp;");
        }
        let mut pairs = vec![("  ", " &nbsp;"), ("\r", ""), ("<br> ", "<br>&nbsp;")];
        if flags.top_level {
            pairs.push(("&#13;", "\n"));
        }
        strtr(&out, &pairs)
    }
}

/// Remove whitespace following a closing tag: one line break after block
/// tags, then anything the frame's outside trim allows.
fn eat_after_close(buf: &mut String, at: usize, frame: &OpenFrame) {
    let rest = &buf[at..];
    let mut n = 0;
    if frame.block_level {
        n = whitespace_run(rest, false);
        if rest[n..].starts_with("<br>") {
            n += 4;
        }
    }
    if frame.trim.outside() {
        n += whitespace_run(&rest[n..], frame.nested);
    }
    if n > 0 {
        buf.replace_range(at..at + n, "");
    }
}

/// Tags whose frames suppress autolinking of the text inside them.
fn is_link_frame(frame: &OpenFrame) -> bool {
    matches!(frame.name.as_str(), "url" | "iurl" | "email" | "ftp")
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::context::ForumContext;

    fn parse(text: &str) -> String {
        let catalog = TagCatalog::builtin(&ForumContext::default()).expect("builtin tags compile");
        Parser::new(&catalog).parse(text, false, &TagSet::new())
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(parse("hello world"), "hello world");
    }

    #[test]
    fn empty_input_is_empty() {
        assert_eq!(parse(""), "");
    }

    #[rstest]
    #[case("[")]
    #[case("[[[[[[")]
    #[case("[b")]
    #[case("[url=")]
    #[case("[/")]
    #[case("a[]b")]
    fn malformed_brackets_stay_text(#[case] text: &str) {
        assert_eq!(parse(text), text);
    }

    #[test]
    fn newlines_become_breaks() {
        assert_eq!(parse("a\nb\r\nc"), "a<br>b<br>c");
    }

    #[test]
    fn unclosed_tags_are_closed_at_end() {
        assert_eq!(parse("[b]bold"), "<b>bold</b>");
    }

    #[test]
    fn stray_closers_stay_literal() {
        assert_eq!(parse("a[/b]"), "a[/b]");
        assert_eq!(parse("[b]x[/i]"), "<b>x[/i]</b>");
    }

    #[test]
    fn inline_closer_cannot_cross_block() {
        assert_eq!(
            parse("[b][center]x[/b][/center]"),
            r#"<b></b><div class="centertext"><div class="inline-block">x[/b]</div></div>"#
        );
    }

    #[test]
    fn whitespace_is_preserved() {
        assert_eq!(parse(" a  b"), "&nbsp;a &nbsp;b");
        assert_eq!(parse("a\n b"), "a<br>&nbsp;b");
    }

    #[test]
    fn restriction_limits_recognised_tags() {
        let catalog = TagCatalog::builtin(&ForumContext::default()).expect("builtin tags compile");
        let out = Parser::new(&catalog).parse("[b]x[/b] [i]y[/i]", false, &crate::tag_set!["i"]);
        assert_eq!(out, "[b]x[/b] <i>y</i>");
    }
}
