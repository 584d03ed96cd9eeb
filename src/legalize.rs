//! Repair BBCode whose tags cross, repeat or never close.
//!
//! Browsers hand back HTML whose structure survives conversion only
//! loosely, so [`crate::Unparser`] output can contain overlapping tags. The
//! legalizer rewrites it into properly nested markup: alignment tags are
//! never nested or crossed, empty pairs disappear, inline tags are closed and
//! reopened around block boundaries and out-of-order closers, and anything
//! left open is closed at the end.

use std::{ops::Range, sync::LazyLock};

use regex::Regex;
use tracing::debug;

use crate::{TagSet, catalog::TagCatalog};

static TOKEN_RE: LazyLock<Regex> = lazy_regex!(
    r"\[(/?)([A-Za-z][A-Za-z0-9]*)((?:[= ][^\[\]]*)?)\]",
    "bracket tag pattern compiles"
);

/// Tags that may never nest within one another.
const ALIGNMENT: [&str; 4] = ["left", "center", "right", "pre"];

/// Tags whose content is copied through untouched.
const VERBATIM: [&str; 2] = ["code", "nobbc"];

/// Tags of which only one instance may apply at a time.
const COMPETING: [&str; 2] = ["color", "size"];

/// Tags whose empty pairs carry meaning.
const KEEP_EMPTY: [&str; 1] = ["td"];

struct Token {
    range: Range<usize>,
    closing: bool,
    name: String,
}

/// Every tag in `text` whose name is in `known`.
fn tokens<'t>(text: &'t str, known: &'t TagSet) -> impl Iterator<Item = Token> + 't {
    TOKEN_RE.captures_iter(text).filter_map(move |caps| {
        let closing = !caps[1].is_empty();
        let name = caps[2].to_ascii_lowercase();
        if !known.contains(&name) || (closing && !caps[3].is_empty()) {
            return None;
        }
        Some(Token {
            range: caps.get(0)?.range(),
            closing,
            name,
        })
    })
}

fn closer(name: &str) -> String { format!("[/{name}]") }

/// Legalize `text` against the tags of `catalog` that are not `disabled`.
#[must_use]
pub fn legalize(text: &str, catalog: &TagCatalog, disabled: &TagSet) -> String {
    if text.chars().count() < 3 {
        return text.to_string();
    }
    let known: TagSet = catalog.names().difference(disabled).cloned().collect();
    let text = fix_alignment(text, &known);
    let text = remove_empty_pairs(&text, catalog, &known);
    let text = Nester::new(catalog).run(&text, &known);
    let text = remove_empty_pairs(&text, catalog, &known);
    debug!(len = text.len(), "markup legalized");
    text
}

/// Keep only alignment tags that open when none is open and close the one
/// that is.
fn fix_alignment(text: &str, known: &TagSet) -> String {
    let mut out = String::with_capacity(text.len());
    let mut current: Option<String> = None;
    let mut copied = 0;
    for token in tokens(text, known).filter(|t| ALIGNMENT.contains(&t.name.as_str())) {
        out.push_str(&text[copied..token.range.start]);
        copied = token.range.end;
        let fits = if token.closing {
            current.as_deref() == Some(token.name.as_str())
        } else {
            current.is_none()
        };
        if fits {
            out.push_str(&text[token.range.clone()]);
            current = (!token.closing).then_some(token.name);
        }
    }
    out.push_str(&text[copied..]);
    if let Some(open) = current {
        out.push_str(&closer(&open));
    }
    out
}

/// Strip `[tag][/tag]` pairs holding nothing but whitespace, until none
/// remain.
fn remove_empty_pairs(text: &str, catalog: &TagCatalog, known: &TagSet) -> String {
    let mut text = text.to_string();
    loop {
        let found: Vec<Token> = tokens(&text, known).collect();
        let empty: Vec<Range<usize>> = found
            .windows(2)
            .filter(|pair| {
                let (open, close) = (&pair[0], &pair[1]);
                !open.closing
                    && close.closing
                    && open.name == close.name
                    && !KEEP_EMPTY.contains(&open.name.as_str())
                    && !catalog.is_closed(&open.name)
                    && text[open.range.end..close.range.start].trim().is_empty()
            })
            .map(|pair| pair[0].range.start..pair[1].range.end)
            .collect();
        if empty.is_empty() {
            return text;
        }
        for range in empty.into_iter().rev() {
            text.replace_range(range, "");
        }
    }
}

#[derive(Debug, Clone)]
struct Open {
    name: String,
    /// The full opening tag, parameters included.
    tag: String,
}

struct Block {
    name: String,
    /// Inline tags that were open when the block started.
    inline_before: Vec<Open>,
}

struct Nester<'c> {
    catalog: &'c TagCatalog,
    out: String,
    inline: Vec<Open>,
    blocks: Vec<Block>,
    /// Competing tags displaced by a newer instance, restored when it closes.
    suspended: Vec<Open>,
    /// Names of duplicate openers that were dropped; their closers go too.
    skipped: Vec<String>,
    verbatim: Option<String>,
}

impl<'c> Nester<'c> {
    fn new(catalog: &'c TagCatalog) -> Self {
        Self {
            catalog,
            out: String::new(),
            inline: Vec::new(),
            blocks: Vec::new(),
            suspended: Vec::new(),
            skipped: Vec::new(),
            verbatim: None,
        }
    }

    fn run(mut self, text: &str, known: &TagSet) -> String {
        self.out.reserve(text.len());
        let mut copied = 0;
        for token in tokens(text, known) {
            self.out.push_str(&text[copied..token.range.start]);
            copied = token.range.end;
            let raw = &text[token.range.clone()];
            if let Some(verbatim) = &self.verbatim {
                if token.closing && token.name == *verbatim {
                    self.verbatim = None;
                }
                self.out.push_str(raw);
            } else if token.closing {
                self.close(&token.name);
            } else {
                self.open(token.name, raw);
            }
        }
        self.out.push_str(&text[copied..]);
        self.finish()
    }

    fn close_all_inline(&mut self) {
        for open in self.inline.iter().rev() {
            self.out.push_str(&closer(&open.name));
        }
    }

    fn reopen_all_inline(&mut self) {
        for open in &self.inline {
            self.out.push_str(&open.tag);
        }
    }

    /// Close the inline tag at `at`, closing and reopening those above it.
    fn remove_inline(&mut self, at: usize) -> Open {
        let above: Vec<Open> = self.inline.drain(at + 1..).collect();
        for open in above.iter().rev() {
            self.out.push_str(&closer(&open.name));
        }
        let removed = self.inline.remove(at);
        self.out.push_str(&closer(&removed.name));
        for open in &above {
            self.out.push_str(&open.tag);
        }
        self.inline.extend(above);
        removed
    }

    fn open(&mut self, name: String, raw: &str) {
        if self.catalog.is_closed(&name) {
            self.out.push_str(raw);
            return;
        }
        if VERBATIM.contains(&name.as_str()) {
            self.out.push_str(raw);
            self.verbatim = Some(name);
            return;
        }
        if self.catalog.is_block_level(&name) {
            let inline_before = self.inline.clone();
            self.close_all_inline();
            self.out.push_str(raw);
            self.reopen_all_inline();
            self.blocks.push(Block { name, inline_before });
            return;
        }
        if self.inline.iter().any(|open| open.tag == raw) {
            self.skipped.push(name);
            return;
        }
        if COMPETING.contains(&name.as_str())
            && let Some(at) = self.inline.iter().rposition(|open| open.name == name)
        {
            let displaced = self.remove_inline(at);
            self.suspended.push(displaced);
        }
        self.out.push_str(raw);
        self.inline.push(Open {
            name,
            tag: raw.to_string(),
        });
    }

    fn close(&mut self, name: &str) {
        if self.catalog.is_closed(name) {
            return;
        }
        if let Some(at) = self.skipped.iter().rposition(|n| n == name) {
            self.skipped.remove(at);
            return;
        }
        if let Some(at) = self.inline.iter().rposition(|open| open.name == name) {
            self.remove_inline(at);
            if COMPETING.contains(&name)
                && let Some(at) = self.suspended.iter().rposition(|open| open.name == name)
            {
                let restored = self.suspended.remove(at);
                self.out.push_str(&restored.tag);
                self.inline.push(restored);
            }
            return;
        }
        let Some(at) = self.blocks.iter().rposition(|block| block.name == name) else {
            return;
        };
        self.close_all_inline();
        let closed: Vec<Block> = self.blocks.drain(at..).collect();
        for block in closed.iter().rev() {
            self.out.push_str(&closer(&block.name));
        }
        let still_open = std::mem::take(&mut self.inline);
        self.inline = closed
            .into_iter()
            .next()
            .map(|block| block.inline_before)
            .unwrap_or_default()
            .into_iter()
            .filter(|before| still_open.iter().any(|open| open.tag == before.tag))
            .collect();
        self.reopen_all_inline();
    }

    fn finish(mut self) -> String {
        if let Some(verbatim) = self.verbatim.take() {
            self.out.push_str(&closer(&verbatim));
        }
        self.close_all_inline();
        for block in self.blocks.iter().rev() {
            self.out.push_str(&closer(&block.name));
        }
        self.out
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::context::ForumContext;

    fn run(text: &str) -> String {
        let catalog = TagCatalog::builtin(&ForumContext::default()).expect("builtin tags compile");
        legalize(text, &catalog, &TagSet::new())
    }

    #[rstest]
    #[case("[b]bold[/b]", "[b]bold[/b]")]
    #[case("[b]x[i]y[/b]z[/i]", "[b]x[i]y[/i][/b][i]z[/i]")]
    #[case("a[/b]", "a")]
    #[case("[b]x", "[b]x[/b]")]
    #[case("[b][/b]x", "x")]
    #[case("[b][i] [/i][/b]x", "x")]
    #[case("[b]a[b]b[/b]c[/b]", "[b]abc[/b]")]
    #[case("[code][b]x[/code]", "[code][b]x[/code]")]
    #[case("[code]x", "[code]x[/code]")]
    #[case("[hr][/hr]text", "[hr]text")]
    #[case("[foo]x[/bar]", "[foo]x[/bar]")]
    #[case("ab", "ab")]
    fn repairs(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(run(input), expected);
    }

    #[test]
    fn crossed_alignment_is_dropped() {
        assert_eq!(run("[left]a[center]b[/left]c[/center]"), "[left]ab[/left]c");
    }

    #[test]
    fn open_alignment_is_closed() {
        assert_eq!(run("[right]a"), "[right]a[/right]");
    }

    #[test]
    fn inline_tags_reopen_inside_blocks() {
        assert_eq!(
            run("[b]x[quote]y[/quote]z[/b]"),
            "[b]x[/b][quote][b]y[/b][/quote][b]z[/b]"
        );
    }

    #[test]
    fn closing_a_block_closes_what_it_holds() {
        assert_eq!(run("[quote][i]a[/quote]b"), "[quote][i]a[/i][/quote]b");
    }

    #[test]
    fn competing_colors_take_turns() {
        assert_eq!(
            run("[color=red]a[color=blue]b[/color]c[/color]"),
            "[color=red]a[/color][color=blue]b[/color][color=red]c[/color]"
        );
    }

    #[test]
    fn empty_cells_survive() {
        assert_eq!(
            run("[table][tr][td][/td][td]a[/td][/tr][/table]"),
            "[table][tr][td][/td][td]a[/td][/tr][/table]"
        );
    }

    #[test]
    fn disabled_tags_are_left_alone() {
        let catalog = TagCatalog::builtin(&ForumContext::default()).expect("builtin tags compile");
        assert_eq!(
            legalize("[b]x", &catalog, &crate::tag_set!["b"]),
            "[b]x"
        );
    }
}
