//! The stock forum tag set.

use super::{ContentType, ParamSpec, Quoting, TagDefinition, Trim};
use crate::{TagSet, behavior::TagBehavior, context::ForumContext};

/// Tags that render as links and therefore may not nest in one another.
fn link_tags() -> TagSet { tag_set!["email", "ftp", "url", "iurl"] }

pub(crate) const LIST_STYLES: &str = "none|disc|circle|square|decimal|decimal-leading-zero|lower-roman|\
    upper-roman|lower-alpha|upper-alpha|lower-greek|upper-greek|lower-latin|upper-latin|hebrew|\
    armenian|georgian|cjk-ideographic|hiragana|katakana|hiragana-iroha|katakana-iroha";

const NAMED_SIZES: &str =
    r"([1-9][\d]?p[xt]|small(?:er)?|large[r]?|x[x]?-(?:small|large)|medium|(0\.[1-9]|[1-9](\.[\d][\d]?)?)?em)\]";

const COLOR_VALUE: &str = r"(#[\da-fA-F]{3}|#[\da-fA-F]{6}|[A-Za-z]{1,20}|rgb\((?:1?\d{1,2}|2[0-4]\d|25[0-5])(?:,\s?(?:1?\d{1,2}|2[0-4]\d|25[0-5])){2}\))\]";

const QUOTE_LINK: &str = r"(?:board=\d+;)?((?:topic|threadid)=[\dmsg#\./]{1,40}(?:;start=[\dmsg#\./]{1,40})?|msg=\d+?|action=profile;u=\d+)";

const CODE_TITLE: &str = r#"<div class="codeheader"><span class="code">{txt_code}</span>"#;

const CODE_OPERATIONS: &str = concat!(
    r#" <a class="codeoperation bbc_select_text">{txt_code_select}</a>"#,
    r#" <a class="codeoperation bbc_expand_code hidden" data-shrink-txt="{txt_code_shrink}""#,
    r#" data-expand-txt="{txt_code_expand}">{txt_code_expand}</a></div>"#,
);

/// Render a quote's `date` parameter with the forum's time format.
fn quote_date(value: &str, context: &ForumContext) -> String {
    value
        .parse::<i64>()
        .ok()
        .and_then(|ts| context.format_time(ts))
        .unwrap_or_else(|| value.to_string())
}

fn link_definitions() -> Vec<TagDefinition> {
    let anchor = r#"<a href="$1" class="bbc_link" target="_blank" rel="noopener">"#;
    vec![
        TagDefinition::new("email")
            .content_type(ContentType::UnparsedContent)
            .content(r#"<a href="mailto:$1" class="bbc_email">$1</a>"#)
            .behavior(TagBehavior::Email),
        TagDefinition::new("email")
            .content_type(ContentType::UnparsedEquals)
            .before(r#"<a href="mailto:$1" class="bbc_email">"#)
            .after("</a>")
            .disallow_children(link_tags())
            .disabled_before("")
            .disabled_after(" ($1)")
            .behavior(TagBehavior::Email),
        TagDefinition::new("ftp")
            .content_type(ContentType::UnparsedContent)
            .content(&format!("{anchor}$1</a>"))
            .behavior(TagBehavior::Ftp),
        TagDefinition::new("ftp")
            .content_type(ContentType::UnparsedEquals)
            .before(anchor)
            .after("</a>")
            .disallow_children(link_tags())
            .disabled_before("")
            .disabled_after(" ($1)")
            .behavior(TagBehavior::Ftp),
        TagDefinition::new("iurl")
            .content_type(ContentType::UnparsedContent)
            .content(r#"<a href="$1" class="bbc_link">$1</a>"#)
            .behavior(TagBehavior::Url),
        TagDefinition::new("iurl")
            .content_type(ContentType::UnparsedEquals)
            .quoted(Quoting::Optional)
            .before(r#"<a href="$1" class="bbc_link">"#)
            .after("</a>")
            .disallow_children(link_tags())
            .disabled_before("")
            .disabled_after(" ($1)")
            .behavior(TagBehavior::Url),
        TagDefinition::new("url")
            .content_type(ContentType::UnparsedContent)
            .content(&format!("{anchor}$1</a>"))
            .behavior(TagBehavior::Url),
        TagDefinition::new("url")
            .content_type(ContentType::UnparsedEquals)
            .quoted(Quoting::Optional)
            .before(anchor)
            .after("</a>")
            .disallow_children(link_tags())
            .disabled_before("")
            .disabled_after(" ($1)")
            .behavior(TagBehavior::Url),
    ]
}

fn quote_definitions() -> Vec<TagDefinition> {
    let quote = |def: TagDefinition| {
        def.after("</blockquote>")
            .trim(Trim::Both)
            .block_level()
    };
    vec![
        quote(TagDefinition::new("quote").before("<blockquote><cite>{txt_quote}</cite>")),
        quote(
            TagDefinition::new("quote")
                .content_type(ContentType::ParsedEquals)
                .before("<blockquote><cite>{txt_quote_from}: $1</cite>")
                .quoted(Quoting::Optional)
                .parsed_tags_allowed(tag_set!["url", "iurl", "ftp"]),
        ),
        quote(
            TagDefinition::new("quote")
                .param(ParamSpec::new("author").pattern(r"([^<>]{1,192}?)"))
                .param(ParamSpec::new("link").pattern(QUOTE_LINK))
                .param(ParamSpec::new("date").pattern(r"(\d+)").validate(quote_date))
                .before(
                    r#"<blockquote><cite><a href="{scripturl}?{link}">{txt_quote_from}: {author} {txt_search_on} {date}</a></cite>"#,
                ),
        ),
        quote(
            TagDefinition::new("quote")
                .param(ParamSpec::new("author").pattern(r"([^<>]{1,192}?)"))
                .before("<blockquote><cite>{txt_quote_from}: {author}</cite>"),
        ),
    ]
}

fn table_definitions() -> Vec<TagDefinition> {
    vec![
        TagDefinition::wrap("table", r#"<table class="bbc_table">"#, "</table>")
            .trim(Trim::Inside)
            .require_children(tag_set!["tr"])
            .block_level(),
        TagDefinition::wrap("td", "<td>", "</td>")
            .require_parents(tag_set!["tr"])
            .trim(Trim::Outside)
            .block_level()
            .disabled_before("")
            .disabled_after(""),
        TagDefinition::wrap("tr", "<tr>", "</tr>")
            .require_parents(tag_set!["table"])
            .require_children(tag_set!["td"])
            .trim(Trim::Both)
            .block_level()
            .disabled_before("")
            .disabled_after(""),
    ]
}

fn list_definitions() -> Vec<TagDefinition> {
    vec![
        TagDefinition::wrap("li", "<li>", "</li>")
            .trim(Trim::Outside)
            .require_parents(tag_set!["list"])
            .block_level()
            .disabled_before("")
            .disabled_after("<br>"),
        TagDefinition::wrap("list", r#"<ul class="bbc_list">"#, "</ul>")
            .trim(Trim::Inside)
            .require_children(tag_set!["li", "list"])
            .block_level(),
        TagDefinition::wrap(
            "list",
            r#"<ul class="bbc_list" style="list-style-type: {type};">"#,
            "</ul>",
        )
        .param(ParamSpec::new("type").pattern(&format!("({LIST_STYLES})")))
        .trim(Trim::Inside)
        .require_children(tag_set!["li", "list"])
        .block_level(),
    ]
}

fn media_definitions() -> Vec<TagDefinition> {
    vec![
        TagDefinition::new("attach")
            .content_type(ContentType::UnparsedContent)
            .param(ParamSpec::new("id").pattern(r"(\d+)"))
            .param(ParamSpec::new("alt").optional())
            .param(ParamSpec::new("width").pattern(r"(\d+)").optional())
            .param(ParamSpec::new("height").pattern(r"(\d+)").optional())
            .content("$1")
            .behavior(TagBehavior::Attach),
        TagDefinition::new("flash")
            .content_type(ContentType::UnparsedCommasContent)
            .test(r"\d+,\d+\]")
            .content(
                r#"<embed type="application/x-shockwave-flash" src="$1" width="$2" height="$3" play="true" loop="true" quality="high" AllowScriptAccess="never">"#,
            )
            .disabled_content(r#"<a href="$1" target="_blank" rel="noopener">$1</a>"#)
            .behavior(TagBehavior::Flash),
        TagDefinition::new("img")
            .content_type(ContentType::UnparsedContent)
            .param(ParamSpec::new("alt").quoting(Quoting::Optional).optional())
            .param(ParamSpec::new("title").quoting(Quoting::Optional).optional())
            .param(
                ParamSpec::new("width")
                    .pattern(r"(\d+)")
                    .value(r#" width="$1""#)
                    .optional(),
            )
            .param(
                ParamSpec::new("height")
                    .pattern(r"(\d+)")
                    .value(r#" height="$1""#)
                    .optional(),
            )
            .content(r#"<img src="$1" alt="{alt}" title="{title}"{width}{height} class="bbc_img resized">"#)
            .disabled_content("($1)")
            .behavior(TagBehavior::Img),
        TagDefinition::new("img")
            .content_type(ContentType::UnparsedContent)
            .content(r#"<img src="$1" alt="" class="bbc_img">"#)
            .disabled_content("($1)")
            .behavior(TagBehavior::Img),
    ]
}

fn code_definitions() -> Vec<TagDefinition> {
    vec![
        TagDefinition::new("code")
            .content_type(ContentType::UnparsedContent)
            .content(&format!(
                r#"{CODE_TITLE}{CODE_OPERATIONS}<code class="bbc_code">$1</code>"#
            ))
            .block_level()
            .behavior(TagBehavior::Code),
        TagDefinition::new("code")
            .content_type(ContentType::UnparsedEqualsContent)
            .content(&format!(
                r#"{CODE_TITLE} ($2){CODE_OPERATIONS}<code class="bbc_code">$1</code>"#
            ))
            .block_level()
            .behavior(TagBehavior::Code),
        TagDefinition::new("php")
            .content_type(ContentType::UnparsedContent)
            .content(r#"<span class="phpcode">$1</span>"#)
            .disabled_content("$1")
            .behavior(TagBehavior::Php),
        TagDefinition::new("html")
            .content_type(ContentType::UnparsedContent)
            .content("<div>$1</div>")
            .block_level()
            .disabled_content("$1")
            .behavior(TagBehavior::Html),
        TagDefinition::new("nobbc")
            .content_type(ContentType::UnparsedContent)
            .content("$1"),
        TagDefinition::new("cowsay")
            .content_type(ContentType::UnparsedContent)
            .content(r#"<pre class="bbc_cowsay">$1</pre>"#)
            .block_level()
            .behavior(TagBehavior::Cowsay),
    ]
}

fn style_definitions() -> Vec<TagDefinition> {
    vec![
        TagDefinition::new("color")
            .content_type(ContentType::UnparsedEquals)
            .test(COLOR_VALUE)
            .before(r#"<span style="color: $1;" class="bbc_color">"#)
            .after("</span>"),
        TagDefinition::new("font")
            .content_type(ContentType::UnparsedEquals)
            .test(r"[A-Za-z0-9_,\-\s]+?\]")
            .before(r#"<span style="font-family: $1;" class="bbc_font">"#)
            .after("</span>"),
        TagDefinition::new("glow")
            .content_type(ContentType::UnparsedCommas)
            .test(r"[#0-9a-zA-Z\-]{3,12},([012]\d{1,2}|\d{1,2})(,[^\]]+)?\]")
            .before(r#"<span style="text-shadow: $1 1px 1px 1px">"#)
            .after("</span>"),
        TagDefinition::new("shadow")
            .content_type(ContentType::UnparsedCommas)
            .test(r"[#0-9a-zA-Z\-]{3,12},(left|right|top|bottom|[0123]\d{0,2})\]")
            .before(r#"<span style="text-shadow: $1 $2">"#)
            .after("</span>")
            .behavior(TagBehavior::Shadow),
        TagDefinition::new("size")
            .content_type(ContentType::UnparsedEquals)
            .test(NAMED_SIZES)
            .before(r#"<span style="font-size: $1;" class="bbc_size">"#)
            .after("</span>"),
        TagDefinition::new("size")
            .content_type(ContentType::UnparsedEquals)
            .test(r"[1-7]\]")
            .before(r#"<span style="font-size: $1;" class="bbc_size">"#)
            .after("</span>")
            .behavior(TagBehavior::Size),
        TagDefinition::new("float")
            .content_type(ContentType::UnparsedEquals)
            .test(r"(left|right)(\s+max=\d+(?:%|px|em|rem|ex|pt|pc|ch|vw|vh|vmin|vmax|cm|mm|in)?)?\]")
            .before("<div $1>")
            .after("</div>")
            .trim(Trim::Outside)
            .block_level()
            .behavior(TagBehavior::Float),
    ]
}

fn layout_definitions() -> Vec<TagDefinition> {
    vec![
        TagDefinition::wrap(
            "center",
            r#"<div class="centertext"><div class="inline-block">"#,
            "</div></div>",
        )
        .block_level(),
        TagDefinition::wrap("left", r#"<div style="text-align: left;">"#, "</div>").block_level(),
        TagDefinition::wrap("right", r#"<div style="text-align: right;">"#, "</div>").block_level(),
        TagDefinition::wrap("pre", "<pre>", "</pre>"),
        TagDefinition::wrap("ltr", r#"<bdo dir="ltr">"#, "</bdo>").block_level(),
        TagDefinition::wrap("rtl", r#"<bdo dir="rtl">"#, "</bdo>").block_level(),
        TagDefinition::new("bdo")
            .content_type(ContentType::UnparsedEquals)
            .test(r"(rtl|ltr)\]")
            .before(r#"<bdo dir="$1">"#)
            .after("</bdo>")
            .block_level(),
        TagDefinition::wrap("move", r#"<marquee>"#, "</marquee>")
            .block_level()
            .disallow_children(tag_set!["move"]),
        TagDefinition::new("me")
            .content_type(ContentType::UnparsedEquals)
            .before(r#"<div class="meaction">* $1 "#)
            .after("</div>")
            .quoted(Quoting::Optional)
            .block_level()
            .disabled_before("/me ")
            .disabled_after("<br>"),
        TagDefinition::new("hr")
            .content_type(ContentType::Closed)
            .content("<hr>")
            .block_level(),
        TagDefinition::new("br")
            .content_type(ContentType::Closed)
            .content("<br>"),
    ]
}

fn inline_definitions() -> Vec<TagDefinition> {
    vec![
        TagDefinition::new("abbr")
            .content_type(ContentType::UnparsedEquals)
            .before(r#"<abbr title="$1">"#)
            .after("</abbr>")
            .quoted(Quoting::Optional)
            .disabled_after(" ($1)"),
        TagDefinition::new("anchor")
            .content_type(ContentType::UnparsedEquals)
            .test(r"[#]?([A-Za-z][A-Za-z0-9_\-]*)\]")
            .before(r#"<span id="post_$1">"#)
            .after("</span>"),
        TagDefinition::wrap("b", "<b>", "</b>"),
        TagDefinition::wrap("i", "<i>", "</i>"),
        TagDefinition::wrap("u", "<u>", "</u>"),
        TagDefinition::wrap("s", "<s>", "</s>"),
        TagDefinition::wrap("sub", "<sub>", "</sub>"),
        TagDefinition::wrap("sup", "<sup>", "</sup>"),
        TagDefinition::wrap("tt", r#"<span class="monospace">"#, "</span>"),
        TagDefinition::new("time")
            .content_type(ContentType::UnparsedContent)
            .content("$1")
            .behavior(TagBehavior::Time),
    ]
}

/// Every tag the forum ships with, in catalog order.
///
/// Several names appear more than once (`quote`, `size`, `url`...). The
/// matcher tries same-named definitions in this order and takes the first
/// whose head grammar, `test` and parameters all fit.
#[must_use]
pub fn builtin_definitions() -> Vec<TagDefinition> {
    [
        inline_definitions(),
        style_definitions(),
        layout_definitions(),
        link_definitions(),
        media_definitions(),
        code_definitions(),
        quote_definitions(),
        list_definitions(),
        table_definitions(),
    ]
    .into_iter()
    .flatten()
    .collect()
}
