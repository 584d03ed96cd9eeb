//! Presentational attributes from older editors: `align` and `<font>`.

use super::html::{HtmlTag, find_tag, matching_close};

/// Point sizes for `<font size="1">` to `<font size="7">`.
const FONT_POINTS: [&str; 7] = ["8pt", "10pt", "12pt", "14pt", "18pt", "24pt", "36pt"];

fn alignment_of(tag: &HtmlTag) -> Option<String> {
    let align = tag.attr("align")?.trim().to_ascii_lowercase();
    matches!(align.as_str(), "left" | "center" | "right").then_some(align)
}

/// Rewrite `align="left|center|right"` into alignment tags around the
/// element's content. Table cells keep the alignment inside the cell.
pub(super) fn alignment(html: &str) -> String {
    let mut html = html.to_string();
    let mut from = 0;
    while let Some(tag) = find_tag(&html, from, |t| !t.closing && alignment_of(t).is_some()) {
        let Some(align) = alignment_of(&tag) else {
            break;
        };
        let opening = tag.rebuild_without(&["align"]);
        from = tag.start;
        if tag.is_void() {
            html.replace_range(tag.start..tag.end, &opening);
            continue;
        }
        let in_cell = matches!(tag.name.as_str(), "td" | "th");
        let (open, close) = if in_cell {
            (
                format!("{opening}[{align}]"),
                format!("[/{align}]</{}>", tag.name),
            )
        } else {
            (
                format!("[{align}]{opening}"),
                format!("</{}>[/{align}]", tag.name),
            )
        };
        match matching_close(&html, &tag.name, tag.end) {
            Some(end) => html.replace_range(end.start..end.end, &close),
            None => html.push_str(&format!("[/{align}]")),
        }
        html.replace_range(tag.start..tag.end, &open);
    }
    html
}

/// Map `<font size face color>` onto size, font and color tags, closing them
/// where the element closes.
pub(super) fn fonts(html: &str) -> String {
    let mut html = html.to_string();
    let mut from = 0;
    while let Some(tag) = find_tag(&html, from, |t| t.name == "font" && !t.closing) {
        let mut opens = String::new();
        let mut closes = String::new();
        let mut wrap = |open: String, name: &str| {
            opens.push_str(&open);
            closes.insert_str(0, &format!("[/{name}]"));
        };
        if let Some(size) = tag.attr("size").and_then(point_size) {
            wrap(format!("[size={size}]"), "size");
        }
        if let Some(face) = tag
            .attr("face")
            .and_then(|f| f.split(',').next())
            .map(|f| f.trim().trim_matches(['"', '\'']))
            .filter(|f| !f.is_empty())
        {
            wrap(format!("[font={face}]"), "font");
        }
        if let Some(color) = tag.attr("color").map(str::trim).filter(|c| !c.is_empty()) {
            wrap(format!("[color={color}]"), "color");
        }

        match matching_close(&html, "font", tag.end) {
            Some(end) => html.replace_range(end.start..end.end, &closes),
            None => html.push_str(&closes),
        }
        html.replace_range(tag.start..tag.end, &opens);
        from = tag.start;
    }
    html
}

/// Absolute (`3`) or relative (`+1`, `-2`) font sizes, relative to 3.
fn point_size(size: &str) -> Option<&'static str> {
    let size = size.trim();
    let n: i32 = match size.as_bytes().first()? {
        b'+' => 3 + size[1..].parse::<i32>().ok()?,
        b'-' => 3 - size[1..].parse::<i32>().ok()?,
        _ => size.parse().ok()?,
    };
    let index = usize::try_from(n.clamp(1, 7) - 1).ok()?;
    FONT_POINTS.get(index).copied()
}
