//! `[cowsay]`: the body in a speech bubble above an ASCII cow.

const COW: [&str; 5] = [
    r"        \   ^__^",
    r"         \  (oo)\_______",
    r"            (__)\       )\/\",
    r"                ||----w |",
    r"                ||     ||",
];

/// Visible width of already-escaped text: each entity counts as one column.
fn width(line: &str) -> usize { html_escape::decode_html_entities(line).chars().count() }

/// Render `body` (escaped, `<br>`-separated) as cowsay output joined with
/// `<br>`.
pub(crate) fn render(body: &str) -> String {
    let trimmed = body.trim_matches(|c: char| c.is_whitespace());
    let trimmed = trimmed.trim_start_matches("<br>").trim_end_matches("<br>");
    let lines: Vec<&str> = if trimmed.is_empty() {
        vec!["Moo."]
    } else {
        trimmed.split("<br>").map(str::trim_end).collect()
    };
    let widest = lines.iter().map(|l| width(l)).max().unwrap_or(0);

    let mut out = Vec::with_capacity(lines.len() + COW.len() + 2);
    out.push(format!(" {}", "_".repeat(widest + 2)));
    let last = lines.len() - 1;
    for (i, line) in lines.iter().enumerate() {
        let (open, close) = match (i, lines.len()) {
            (_, 1) => ("&lt;", "&gt;"),
            (0, _) => ("/", "\\"),
            (n, _) if n == last => ("\\", "/"),
            _ => ("|", "|"),
        };
        let pad = " ".repeat(widest - width(line));
        out.push(format!("{open} {line}{pad} {close}"));
    }
    out.push(format!(" {}", "-".repeat(widest + 2)));
    out.extend(COW.iter().map(|l| (*l).to_string()));
    out.join("<br>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_uses_angle_brackets() {
        let cow = render("hi");
        let lines: Vec<&str> = cow.split("<br>").collect();
        assert_eq!(lines[0], " ____");
        assert_eq!(lines[1], "&lt; hi &gt;");
        assert_eq!(lines[2], " ----");
        assert_eq!(lines.len(), 3 + COW.len());
    }

    #[test]
    fn multi_line_pads_to_widest() {
        let cow = render("a<br>bbb<br>cc");
        let lines: Vec<&str> = cow.split("<br>").collect();
        assert_eq!(&lines[1..4], ["/ a   \\", "| bbb |", "\\ cc  /"]);
    }

    #[test]
    fn entities_count_as_one_column() {
        let cow = render("&amp;");
        assert!(cow.starts_with(" ___<br>"));
    }
}
