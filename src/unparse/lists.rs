//! `<ul>`, `<ol>` and `<li>` to `[list]` and `[li]`.

use std::sync::LazyLock;

use regex::Regex;

use super::html::{HtmlTag, tags};
use crate::catalog::LIST_STYLES;

static LIST_STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^(?:{LIST_STYLES})$")).expect("list style names form a valid pattern")
});

struct ListFrame {
    in_item: bool,
    /// Opened for an `<li>` that had no list around it.
    synthetic: bool,
}

#[derive(Default)]
struct Lists {
    out: String,
    stack: Vec<ListFrame>,
}

impl Lists {
    /// Text or markup that belongs inside an item. Whitespace directly under
    /// a list is dropped; anything else gets an item of its own.
    fn content(&mut self, text: &str) {
        if let Some(top) = self.stack.last_mut()
            && !top.in_item
        {
            if text.replace("&nbsp;", "").trim().is_empty() {
                return;
            }
            top.in_item = true;
            self.out.push_str("\t[li]");
        }
        self.out.push_str(text);
    }

    fn open_list(&mut self, tag: &HtmlTag) {
        if let Some(top) = self.stack.last_mut()
            && !top.in_item
        {
            top.in_item = true;
            self.out.push_str("\t[li]");
        }
        match list_type(tag) {
            Some(style) => self.out.push_str(&format!("[list type={style}]\n")),
            None => self.out.push_str("[list]\n"),
        }
        self.stack.push(ListFrame {
            in_item: false,
            synthetic: false,
        });
    }

    fn close_list(&mut self) {
        if let Some(frame) = self.stack.pop() {
            if frame.in_item {
                self.out.push_str("[/li]\n");
            }
            self.out.push_str("[/list]");
        }
    }

    fn open_item(&mut self) {
        if self.stack.is_empty() {
            self.out.push_str("[list]\n");
            self.stack.push(ListFrame {
                in_item: false,
                synthetic: true,
            });
        }
        if let Some(top) = self.stack.last_mut() {
            if top.in_item {
                self.out.push_str("[/li]\n");
            }
            top.in_item = true;
            self.out.push_str("\t[li]");
        }
    }

    fn close_item(&mut self) {
        let Some(top) = self.stack.last_mut() else {
            return;
        };
        if !top.in_item {
            return;
        }
        top.in_item = false;
        self.out.push_str("[/li]\n");
        if top.synthetic {
            self.close_list();
        }
    }
}

fn list_type(tag: &HtmlTag) -> Option<String> {
    if let Some(style) = tag.attr("listtype").filter(|s| LIST_STYLE_RE.is_match(s)) {
        return Some(style.to_string());
    }
    if tag.name != "ol" {
        return None;
    }
    let style = match tag.attr("type").map(str::trim) {
        Some("a") => "lower-alpha",
        Some("A") => "upper-alpha",
        Some("i") => "lower-roman",
        Some("I") => "upper-roman",
        _ => "decimal",
    };
    Some(style.to_string())
}

/// Rebuild lists with explicit items, repairing the nesting mistakes
/// editors make: lists directly inside lists, items outside any list and
/// text between items.
pub(super) fn restructure(html: &str) -> String {
    let mut lists = Lists::default();
    let mut copied = 0;
    for tag in tags(html) {
        lists.content(&html[copied..tag.start]);
        copied = tag.end;
        match (tag.name.as_str(), tag.closing) {
            ("ul" | "ol", false) => lists.open_list(&tag),
            ("ul" | "ol", true) => lists.close_list(),
            ("li", false) => lists.open_item(),
            ("li", true) => lists.close_item(),
            ("br", _) if lists.stack.last().is_some_and(|top| !top.in_item) => {}
            _ => lists.content(&html[tag.start..tag.end]),
        }
    }
    lists.content(&html[copied..]);
    while !lists.stack.is_empty() {
        lists.close_list();
    }
    lists.out
}
