//! End-to-end behaviour of the HTML to BBCode direction.

use bbcodec::{TagSet, Unparser, legalize, parse, unparse};

mod prelude;
use prelude::*;

#[test]
fn bold_element() {
    assert_eq!(unparse("<b>bold</b>"), "[b]bold[/b]");
}

#[test]
fn inline_color_style() {
    assert_eq!(unparse(r#"<span style="color: red;">x</span>"#), "[color=red]x[/color]");
}

#[rstest]
#[case("[b]x[/b]")]
#[case("[i]x[/i]")]
#[case("[u]x[/u]")]
#[case("[color=red]x[/color]")]
fn simple_tags_survive_a_round_trip(#[case] markup: &str) {
    assert_eq!(unparse(&parse(markup)), markup);
}

#[test]
fn lists_are_rebuilt() {
    assert_eq!(
        unparse("<ul><li>one</li><li><b>two</b></li></ul>"),
        "[list]\n\t[li]one[/li]\n\t[li][b]two[/b][/li]\n[/list]"
    );
}

#[test]
fn crossed_markup_is_repaired() {
    assert_eq!(unparse("<b>a<i>b</b>c</i>"), "[b]a[i]b[/i][/b][i]c[/i]");
}

#[test]
fn links_and_images() {
    let out = unparse(
        r#"<p>See <a href="https://x.test/">the site</a> and <img src="/pic.png" alt="pic"></p>"#,
    );
    insta::assert_snapshot!(out, @"See [url=https://x.test/]the site[/url] and [img alt=pic]https://forum.example/pic.png[/img]");
}

#[test]
fn legacy_presentation_attributes() {
    let out = unparse(r#"<div align="center"><font color="blue" size="5">big</font></div>"#);
    assert_eq!(out, "[center][size=18pt][color=blue]big[/color][/size][/center]");
}

#[test]
fn disabled_tags_are_not_repaired() {
    let catalog = stock_catalog();
    let out = Unparser::new(&catalog)
        .with_disabled(bbcodec::tag_set!["b"])
        .unparse("<b>x</b>");
    assert_eq!(out, "[b]x[/b]");
    assert_eq!(legalize("[b]x", &catalog, &bbcodec::tag_set!["b"]), "[b]x");
    assert_eq!(legalize("[b]x", &catalog, &TagSet::new()), "[b]x[/b]");
}
