//! Reading HTML tags for the reverse converter.
//!
//! The converter works on the HTML text directly, so tags are located with
//! a pattern. Attribute lists are handed to `html5ever`, which takes care of
//! quoting styles and entity decoding.

use std::sync::LazyLock;

use html5ever::{driver::ParseOpts, parse_document, tendril::TendrilSink};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use regex::{Captures, Regex};

/// Any start or end tag, with quoted attribute values allowed to hold `>`.
pub(crate) static TAG_RE: LazyLock<Regex> = lazy_regex!(
    r#"<(/?)([A-Za-z][A-Za-z0-9]*)((?:[^>"']|"[^"]*"|'[^']*')*)>"#,
    "html tag pattern compiles"
);

const VOID: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Custom element used to carry an attribute list through the HTML parser.
const PROBE: &str = "bbc-probe";

/// One tag found in the HTML text.
#[derive(Debug, Clone)]
pub(crate) struct HtmlTag {
    pub name: String,
    pub closing: bool,
    pub self_closing: bool,
    pub attrs: Vec<(String, String)>,
    pub start: usize,
    pub end: usize,
}

impl HtmlTag {
    fn from_captures(caps: &Captures<'_>) -> Self {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        let attr_text = caps.get(3).map_or("", |m| m.as_str());
        let closing = !caps[1].is_empty();
        Self {
            name: caps[2].to_ascii_lowercase(),
            closing,
            self_closing: attr_text.trim_end().ends_with('/'),
            attrs: if closing { Vec::new() } else { attributes(attr_text) },
            start: whole.start,
            end: whole.end,
        }
    }

    /// The decoded value of attribute `name`.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Whether the element never has a closing tag.
    pub fn is_void(&self) -> bool { self.self_closing || VOID.contains(&self.name.as_str()) }

    /// Rebuild the opening tag without the named attributes.
    pub fn rebuild_without(&self, dropped: &[&str]) -> String {
        let mut out = format!("<{}", self.name);
        for (name, value) in &self.attrs {
            if dropped.contains(&name.as_str()) {
                continue;
            }
            out.push_str(&format!(
                r#" {name}="{}""#,
                html_escape::encode_double_quoted_attribute(value)
            ));
        }
        out.push('>');
        out
    }
}

/// Every tag in `html`, in document order.
pub(crate) fn tags(html: &str) -> impl Iterator<Item = HtmlTag> + '_ {
    TAG_RE.captures_iter(html).map(|caps| HtmlTag::from_captures(&caps))
}

/// The first tag at or after `from` for which `pred` holds.
pub(crate) fn find_tag(
    html: &str,
    from: usize,
    mut pred: impl FnMut(&HtmlTag) -> bool,
) -> Option<HtmlTag> {
    TAG_RE
        .captures_iter(&html[from..])
        .map(|caps| {
            let mut tag = HtmlTag::from_captures(&caps);
            tag.start += from;
            tag.end += from;
            tag
        })
        .find(|tag| pred(tag))
}

/// Locate the closing tag matching an element of `name` opened just before
/// `from`, counting nested elements of the same name.
pub(crate) fn matching_close(html: &str, name: &str, from: usize) -> Option<HtmlTag> {
    let mut depth = 0usize;
    find_tag(html, from, |tag| {
        if tag.name != name || (!tag.closing && tag.is_void()) {
            return false;
        }
        if !tag.closing {
            depth += 1;
            return false;
        }
        if depth == 0 {
            return true;
        }
        depth -= 1;
        false
    })
}

/// Parse an attribute list with html5ever. Values come back entity-decoded
/// and names lowercased.
fn attributes(attr_text: &str) -> Vec<(String, String)> {
    let attr_text = attr_text.trim().trim_end_matches('/');
    if attr_text.is_empty() {
        return Vec::new();
    }
    let markup = format!("<{PROBE} {attr_text}></{PROBE}>");
    let dom: RcDom = parse_document(RcDom::default(), ParseOpts::default()).one(markup);
    find_probe(&dom.document)
        .map(|probe| match &probe.data {
            NodeData::Element { attrs, .. } => attrs
                .borrow()
                .iter()
                .map(|a| (a.name.local.to_string(), a.value.to_string()))
                .collect(),
            _ => Vec::new(),
        })
        .unwrap_or_default()
}

/// Walks the DOM tree looking for the probe element.
fn find_probe(handle: &Handle) -> Option<Handle> {
    if let NodeData::Element { name, .. } = &handle.data
        && name.local.as_ref() == PROBE
    {
        return Some(handle.clone());
    }
    handle.children.borrow().iter().find_map(find_probe)
}
