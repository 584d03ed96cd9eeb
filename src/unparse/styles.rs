//! Inline `style` declarations to bracket tags.

use std::sync::LazyLock;

use regex::Regex;

use super::html::{HtmlTag, tags};

/// Elements that survive decomposition with only their styling removed.
const KEPT: [&str; 3] = ["a", "font", "td"];

static FONT_SIZE_RE: LazyLock<Regex> = lazy_regex!(
    r"^(?:[1-9]\d?p[xt]|small(?:er)?|larger?|xx?-(?:small|large)|medium|(?:0\.[1-9]|[1-9](?:\.\d\d?)?)?em)$",
    "font size pattern compiles"
);

static COLOR_RE: LazyLock<Regex> = lazy_regex!(
    r"^(?:#[\da-fA-F]{3}|#[\da-fA-F]{6}|[A-Za-z]{1,20}|rgb\(\d{1,3}(?:,\d{1,3}){2}\))$",
    "color pattern compiles"
);

struct Frame {
    name: String,
    closers: String,
}

/// Bracket tags and extra attributes derived from one `style` attribute.
#[derive(Default)]
struct Decomposed {
    opens: String,
    closes: String,
    attrs: Vec<(String, String)>,
}

impl Decomposed {
    fn wrap(&mut self, open: &str, name: &str) {
        self.opens.push_str(open);
        self.closes.insert_str(0, &format!("[/{name}]"));
    }
}

pub(super) fn decompose(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut stack: Vec<Frame> = Vec::new();
    let mut copied = 0;
    for tag in tags(html) {
        out.push_str(&html[copied..tag.start]);
        copied = tag.end;
        let original = &html[tag.start..tag.end];

        if tag.closing {
            // Crossed elements stay crossed here; the legalizer untangles them.
            match stack.iter().rposition(|f| f.name == tag.name) {
                Some(at) => out.push_str(&stack.remove(at).closers),
                None => out.push_str(original),
            }
            continue;
        }

        let Some(style) = tag.attr("style") else {
            out.push_str(original);
            if !tag.is_void() {
                stack.push(Frame {
                    name: tag.name.clone(),
                    closers: format!("</{}>", tag.name),
                });
            }
            continue;
        };

        let parts = declarations(&tag, style);
        let keep = KEPT.contains(&tag.name.as_str()) || parts.opens.is_empty() || tag.is_void();
        if keep {
            let mut rebuilt = tag.clone();
            rebuilt.attrs.extend(parts.attrs);
            out.push_str(&rebuilt.rebuild_without(&["style"]));
        }
        if tag.is_void() {
            continue;
        }
        out.push_str(&parts.opens);
        let mut closers = parts.closes;
        if keep {
            closers.push_str(&format!("</{}>", tag.name));
        }
        stack.push(Frame {
            name: tag.name.clone(),
            closers,
        });
    }
    out.push_str(&html[copied..]);
    for frame in stack.into_iter().rev() {
        out.push_str(&frame.closers);
    }
    out
}

fn declarations(tag: &HtmlTag, style: &str) -> Decomposed {
    let mut parts = Decomposed::default();
    for declaration in style.split(';') {
        let Some((property, value)) = declaration.split_once(':') else {
            continue;
        };
        let property = property.trim().to_ascii_lowercase();
        let value = value.trim().trim_end_matches("!important").trim();
        let lower = value.to_ascii_lowercase();
        match property.as_str() {
            "font-weight" => {
                let heavy = matches!(lower.as_str(), "bold" | "bolder")
                    || lower.parse::<u16>().is_ok_and(|w| w >= 600);
                if heavy {
                    parts.wrap("[b]", "b");
                }
            }
            "text-decoration" | "text-decoration-line" => {
                if lower.contains("underline") {
                    parts.wrap("[u]", "u");
                }
                if lower.contains("line-through") {
                    parts.wrap("[s]", "s");
                }
            }
            "text-align" => {
                if let align @ ("left" | "center" | "right") = lower.as_str() {
                    parts.wrap(&format!("[{align}]"), align);
                }
            }
            "font-style" => {
                if matches!(lower.as_str(), "italic" | "oblique") {
                    parts.wrap("[i]", "i");
                }
            }
            "color" => {
                let color = value.replace(' ', "");
                if COLOR_RE.is_match(&color) {
                    parts.wrap(&format!("[color={color}]"), "color");
                }
            }
            "font-size" => {
                if FONT_SIZE_RE.is_match(&lower) {
                    parts.wrap(&format!("[size={lower}]"), "size");
                }
            }
            "font-family" => {
                let family = value
                    .split(',')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .trim_matches(['"', '\'']);
                if !family.is_empty() {
                    parts.wrap(&format!("[font={family}]"), "font");
                }
            }
            "list-style-type" if matches!(tag.name.as_str(), "ul" | "ol") => {
                parts.attrs.push(("listtype".into(), lower));
            }
            "width" | "height" if tag.name == "img" => {
                let pixels = lower.trim_end_matches("px").trim();
                if !pixels.is_empty() && pixels.bytes().all(|b| b.is_ascii_digit()) {
                    parts.attrs.retain(|(name, _)| *name != property);
                    parts.attrs.push((property.clone(), pixels.to_string()));
                }
            }
            _ => {}
        }
    }
    parts
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(r#"<span style="color: red;">x</span>"#, "[color=red]x[/color]")]
    #[case(r#"<span style="font-weight: bold; font-style: italic">x</span>"#, "[b][i]x[/i][/b]")]
    #[case(r#"<span style="font-weight: 700">x</span>"#, "[b]x[/b]")]
    #[case(r#"<span style="text-decoration: underline line-through">x</span>"#, "[u][s]x[/s][/u]")]
    #[case(r#"<span style="font-size: 1.35em;" class="bbc_size">x</span>"#, "[size=1.35em]x[/size]")]
    #[case(r#"<span style="font-family: 'Comic Sans', serif">x</span>"#, "[font=Comic Sans]x[/font]")]
    #[case(r#"<div style="text-align: center">x</div>"#, "[center]x[/center]")]
    #[case(r#"<span style="color: rgb(1, 2, 3)">x</span>"#, "[color=rgb(1,2,3)]x[/color]")]
    fn maps_declarations(#[case] html: &str, #[case] expected: &str) {
        assert_eq!(decompose(html), expected);
    }

    #[test]
    fn kept_elements_lose_only_style() {
        assert_eq!(
            decompose(r#"<a href="/x" style="color: red">y</a>"#),
            r#"<a href="/x">[color=red]y[/color]</a>"#
        );
    }

    #[test]
    fn unknown_styles_keep_the_element() {
        assert_eq!(
            decompose(r#"<span style="margin: 0">x</span>"#),
            "<span>x</span>"
        );
    }

    #[test]
    fn nested_closers_follow_their_element() {
        assert_eq!(
            decompose(r#"<span style="color: red">a<b>b</b><span style="font-weight: bold">c</span>d</span>e"#),
            "[color=red]a<b>b</b>[b]c[/b]d[/color]e"
        );
    }

    #[test]
    fn image_dimensions_become_attributes() {
        assert_eq!(
            decompose(r#"<img src="a.png" style="width: 40px; height: 30px">"#),
            r#"<img src="a.png" width="40" height="30">"#
        );
    }

    #[test]
    fn list_style_becomes_attribute() {
        assert_eq!(
            decompose(r#"<ul style="list-style-type: square"><li>a</li></ul>"#),
            r#"<ul listtype="square"><li>a</li></ul>"#
        );
    }

    #[test]
    fn unclosed_elements_are_closed_at_the_end() {
        assert_eq!(decompose(r#"<span style="color: red">x"#), "[color=red]x[/color]");
    }
}
