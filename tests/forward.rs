//! End-to-end behaviour of the BBCode to HTML direction.

use bbcodec::{ParseOptions, Parser, SmileyTable, TagSet, parse, tag_set};

mod prelude;
use prelude::*;

#[fixture]
fn smileys() -> SmileyTable { SmileyTable::default_set("https://forum.example/Smileys/default") }

#[test]
fn bold_renders() {
    assert!(parse("[b]bold[/b]").contains("<b>bold</b>"));
}

#[test]
fn explicit_list_wraps_its_item() {
    let html = parse("[list][li]a[/li][/list]");
    assert!(html.starts_with(r#"<ul class="bbc_list">"#), "{html}");
    assert!(html.contains("<li>a</li>"), "{html}");
    assert!(html.ends_with("</ul>"), "{html}");
}

#[test]
fn unclosed_tag_is_closed_at_the_end() {
    assert_eq!(parse("[b]bold"), "<b>bold</b>");
}

#[test]
fn nested_quotes_alternate() {
    let html = parse("[quote][quote]x[/quote][/quote]");
    let standard = html.find("bbc_standard_quote").expect("outer quote styled");
    let alternate = html.find("bbc_alternate_quote").expect("inner quote styled");
    assert!(standard < alternate, "{html}");
}

#[test]
fn item_codes_share_one_list() {
    let html = parse("[*]first\n[*]second");
    assert_eq!(html.matches("<ul").count(), 1, "{html}");
    assert_eq!(html.matches("<li").count(), 2, "{html}");
    assert!(html.contains(">first</li>") && html.contains(">second</li>"), "{html}");
}

#[test]
fn empty_input_stays_empty() {
    assert_eq!(parse(""), "");
}

#[test]
fn parsing_is_deterministic() {
    let text = "[quote author=Ann][b]x[/b] :) [url]https://x.test[/url][/quote]";
    assert_eq!(parse(text), parse(text));
}

#[rstest]
fn smileys_need_a_boundary(smileys: SmileyTable) {
    let catalog = stock_catalog();
    let parser = Parser::new(&catalog).with_smileys(&smileys);
    assert_eq!(parser.parse("a:)", true, &TagSet::new()), "a:)");
    assert!(parser.parse(":) hi", true, &TagSet::new()).contains("smiley.gif"));
    assert_eq!(parser.parse(":) hi", false, &TagSet::new()), ":) hi");
}

#[rstest]
#[case("[b]x[/b]", "x")]
#[case("[url=https://x.test/]site[/url]", "site (https://x.test/)")]
#[case("[center]x[/center]", "<div>x</div>")]
fn disabled_tags_use_their_fallback(#[case] text: &str, #[case] expected: &str) {
    let catalog = stock_catalog();
    let parser = Parser::new(&catalog).with_options(ParseOptions {
        disabled: tag_set!["b", "url", "center"],
        ..ParseOptions::default()
    });
    assert_eq!(parser.parse(text, false, &TagSet::new()), expected);
}

#[test]
fn restriction_leaves_other_tags_as_text() {
    let catalog = stock_catalog();
    let html = Parser::new(&catalog).parse("[b]x[/b][i]y[/i]", false, &tag_set!["b"]);
    assert_eq!(html, "<b>x</b>[i]y[/i]");
}

#[test]
fn mixed_inline_markup() {
    insta::assert_snapshot!(parse("[b]a[/b] [i]b[/i] [s]c[/s]"), @"<b>a</b> <i>b</i> <s>c</s>");
}

#[test]
fn script_links_are_not_live() {
    let html = parse("[url]javascript:alert(1)[/url] [img]javascript:x[/img]");
    assert!(!html.contains("href=\"javascript"), "{html}");
    assert!(!html.contains("src=\"javascript"), "{html}");
}
