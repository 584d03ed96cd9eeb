//! Opening tags: matching, tree repair and per-content-type emission.

use regex::Regex;

use super::{OpenFrame, Parser, ScanFlags, ScanState, Step};
use crate::{
    behavior::ValidateEnv,
    catalog::{ContentType, Quoting},
    matcher::{ResolvedTag, TagMatch, match_tag},
    protect::Protector,
    textproc::{find_ci, strtr, trailing_whitespace_run, whitespace_run},
};

const QUOTES: [&str; 2] = ["&quot;", "\""];

impl Parser<'_> {
    pub(super) fn open_tag(
        &self,
        st: &mut ScanState,
        cand: usize,
        flags: ScanFlags<'_>,
        tag_re: &Regex,
        protector: &mut Protector,
    ) -> Step {
        let found = match_tag(self.catalog, &st.buf, cand, &st.open, flags.restrict, tag_re);
        let Some(TagMatch { mut tag, body_start }) = found else {
            if let Some(step) = self.item_code(st, cand, flags) {
                return step;
            }
            // A tag that may not appear here ends a parent that only admits
            // particular children.
            if st.open.last().is_some_and(|f| f.require_children.is_some())
                && let Some(frame) = st.open.pop()
            {
                let markup = format!("\n{}\n", frame.after);
                st.buf.insert_str(cand, &markup);
                return Step::Resume(cand + markup.len());
            }
            return Step::Literal;
        };

        if let Some(inherited) = st.open.last().and_then(|f| f.disallow_children.as_ref()) {
            let mut merged = tag.disallow_children.take().unwrap_or_default();
            merged.extend(inherited.iter().cloned());
            tag.disallow_children = Some(merged);
        }
        if self.options.disabled.contains(tag.name()) {
            tag.apply_disabled();
        }

        let original = cand;
        let (cand, body_start) = if tag.def.block_level
            && tag.name() != "html"
            && !st.open.last().is_some_and(|f| f.block_level)
        {
            let moved = close_inline(st, cand);
            (moved, body_start + moved - cand)
        } else {
            (cand, body_start)
        };

        let Some(at) = self.emit(st, &mut tag, cand, body_start, flags, protector) else {
            // Inline frames closed above are already in the buffer; look at
            // the bracket again from its new position.
            return if cand > original { Step::Resume(cand) } else { Step::Literal };
        };

        let mut eat = 0;
        if tag.def.block_level && st.buf[at..].starts_with("<br>") {
            eat = 4;
        }
        if tag.def.trim.inside() {
            eat += whitespace_run(&st.buf[at + eat..], true);
        }
        if eat > 0 {
            st.buf.replace_range(at..at + eat, "");
        }
        Step::Resume(at)
    }

    /// Replace the tag at `cand` with its markup. Returns the offset just past
    /// the emitted markup, or `None` when the tag turns out to be malformed
    /// (no closing tag, unterminated value).
    fn emit(
        &self,
        st: &mut ScanState,
        tag: &mut ResolvedTag<'_>,
        cand: usize,
        body_start: usize,
        flags: ScanFlags<'_>,
        protector: &mut Protector,
    ) -> Option<usize> {
        let def = tag.def;
        let closer = format!("[/{}]", def.name);
        match def.content_type {
            ContentType::ParsedContent => {
                let markup = format!("\n{}\n", tag.before);
                st.buf.replace_range(cand..body_start, &markup);
                push_frame(st, tag);
                Some(cand + markup.len())
            }
            ContentType::Closed => {
                let markup = format!("\n{}\n", tag.content);
                st.buf.replace_range(cand..body_start, &markup);
                Some(cand + markup.len())
            }
            ContentType::UnparsedContent => {
                let close = find_ci(&st.buf, &closer, body_start)?;
                let mut data = vec![body(&st.buf[body_start..close], tag).to_string()];
                self.validate(tag, &mut data);
                let html = strtr(&tag.content, &[("$1", data[0].as_str())]);
                Some(splice(st, cand, close + closer.len(), &html))
            }
            ContentType::UnparsedEqualsContent => {
                let (quote, value_start) = opening_quote(&st.buf, body_start, def.quoted)?;
                let terminator = format!("{}]", quote.unwrap_or(""));
                let value_end = value_start + st.buf[value_start..].find(&terminator)?;
                let body_from = value_end + terminator.len();
                let close = find_ci(&st.buf, &closer, body_from)?;
                let mut data = vec![
                    body(&st.buf[body_from..close], tag).to_string(),
                    st.buf[value_start..value_end].to_string(),
                ];
                self.validate(tag, &mut data);
                let html = strtr(
                    &tag.content,
                    &[("$1", data[0].as_str()), ("$2", data[1].as_str())],
                );
                Some(splice(st, cand, close + closer.len(), &html))
            }
            ContentType::UnparsedCommasContent => {
                let head_end = body_start + st.buf[body_start..].find(']')?;
                let close = find_ci(&st.buf, &closer, head_end + 1)?;
                let mut data = vec![body(&st.buf[head_end + 1..close], tag).to_string()];
                data.extend(comma_fields(&st.buf[body_start..head_end]));
                self.validate(tag, &mut data);
                let html = strtr(&tag.content, &numbered(&data));
                Some(splice(st, cand, close + closer.len(), &html))
            }
            ContentType::UnparsedCommas => {
                let head_end = body_start + st.buf[body_start..].find(']')?;
                let mut data = comma_fields(&st.buf[body_start..head_end]);
                self.validate(tag, &mut data);
                let pairs = numbered(&data);
                tag.after = strtr(&tag.after, &pairs);
                let html = strtr(&tag.before, &pairs);
                push_frame(st, tag);
                Some(splice(st, cand, head_end + 1, &html))
            }
            ContentType::UnparsedEquals | ContentType::ParsedEquals => {
                let (quote, value_start) = opening_quote(&st.buf, body_start, def.quoted)?;
                let terminator = format!("{}]", quote.unwrap_or(""));
                let search_from = quote.map_or(value_start, |q| nested_value_start(&st.buf, value_start, q));
                let value_end = search_from + st.buf[search_from..].find(&terminator)?;
                let mut data = vec![st.buf[value_start..value_end].to_string()];
                self.validate(tag, &mut data);
                if def.content_type == ContentType::ParsedEquals {
                    let nested = match &def.parsed_tags_allowed {
                        Some(allowed) => ScanFlags {
                            smileys: false,
                            restrict: Some(allowed),
                            top_level: false,
                        },
                        None => ScanFlags {
                            top_level: false,
                            ..flags
                        },
                    };
                    data[0] = self.scan(std::mem::take(&mut data[0]), nested, protector);
                }
                tag.after = strtr(&tag.after, &[("$1", data[0].as_str())]);
                let html = strtr(&tag.before, &[("$1", data[0].as_str())]);
                push_frame(st, tag);
                Some(splice(st, cand, value_end + terminator.len(), &html))
            }
        }
    }

    fn validate(&self, tag: &mut ResolvedTag<'_>, data: &mut [String]) {
        let Some(behavior) = tag.def.behavior else {
            return;
        };
        let params = std::mem::take(&mut tag.params);
        let env = ValidateEnv {
            disabled: &self.options.disabled,
            params: &params,
            context: self.catalog.context(),
        };
        behavior.validate(tag, data, &env);
        tag.params = params;
    }
}

/// Replace `cand..end` with `\n{html}\n`, returning the offset past it.
fn splice(st: &mut ScanState, cand: usize, end: usize, html: &str) -> usize {
    let markup = format!("\n{html}\n");
    st.buf.replace_range(cand..end, &markup);
    cand + markup.len()
}

fn push_frame(st: &mut ScanState, tag: &ResolvedTag<'_>) {
    st.open.push(OpenFrame {
        name: tag.name().to_string(),
        after: tag.after.clone(),
        block_level: tag.def.block_level,
        trim: tag.def.trim,
        nested: tag.def.require_parents.is_some(),
        require_children: tag.def.require_children.clone(),
        disallow_children: tag.disallow_children.clone(),
    });
}

/// The captured body of an unparsed tag; block tags drop one leading break.
fn body<'b>(raw: &'b str, tag: &ResolvedTag<'_>) -> &'b str {
    if tag.def.block_level {
        raw.strip_prefix("<br>").unwrap_or(raw)
    } else {
        raw
    }
}

fn comma_fields(head: &str) -> Vec<String> {
    head.split(',').map(|f| f.trim().to_string()).collect()
}

/// `$1`, `$2` ... pairs for positional data.
fn numbered(data: &[String]) -> Vec<(String, &str)> {
    data.iter()
        .enumerate()
        .map(|(i, d)| (format!("${}", i + 1), d.as_str()))
        .collect()
}

/// Detect an opening quote at `at` according to the tag's quoting rule.
/// Returns the quote form found and where the value starts, or `None` when a
/// required quote is missing.
fn opening_quote(buf: &str, at: usize, quoting: Quoting) -> Option<(Option<&'static str>, usize)> {
    if quoting == Quoting::None {
        return Some((None, at));
    }
    match QUOTES.into_iter().find(|q| buf[at..].starts_with(q)) {
        Some(q) => Some((Some(q), at + q.len())),
        None if quoting == Quoting::Required => None,
        None => Some((None, at)),
    }
}

/// Where to look for the closing quote of a quoted value that itself holds a
/// quoted `=` assignment, such as `[quote="a="b""]`.
fn nested_value_start(buf: &str, value_start: usize, quote: &str) -> usize {
    let rest = &buf[value_start..];
    let end_of_value = rest.find(&format!("{quote}]"));
    let assign = format!("={quote}");
    let nested = rest
        .match_indices(&assign)
        .map(|(i, _)| i)
        .find(|&i| !rest[i..].starts_with(&format!("{assign}]")));
    match (nested, end_of_value) {
        (Some(n), Some(e)) if n < e => rest
            .find(quote)
            .map_or(value_start, |i| value_start + i + quote.len()),
        _ => value_start,
    }
}

/// Close the inline frames above the nearest block frame before a block tag
/// opens at `cand`. Returns the tag's new offset.
fn close_inline(st: &mut ScanState, cand: usize) -> usize {
    let keep = st.open.iter().rposition(|f| f.block_level).map_or(0, |i| i + 1);
    let mut at = cand;
    while st.open.len() > keep {
        let Some(frame) = st.open.pop() else {
            break;
        };
        if frame.trim.inside() {
            let segment_start = st.buf[..at].rfind('\n').map_or(0, |i| i + 1);
            let n = trailing_whitespace_run(&st.buf[segment_start..at], true);
            st.buf.replace_range(at - n..at, "");
            at -= n;
        }
        let markup = format!("\n{}\n", frame.after);
        st.buf.insert_str(at, &markup);
        at += markup.len();
    }
    at
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::{TagSet, catalog::TagCatalog, context::ForumContext, parser::Parser};

    fn parse(text: &str) -> String {
        let catalog = TagCatalog::builtin(&ForumContext::default()).expect("builtin tags compile");
        Parser::new(&catalog).parse(text, false, &TagSet::new())
    }

    #[rstest]
    #[case("[b]x[/b]", "<b>x</b>")]
    #[case("[hr]x", "<hr>x")]
    #[case("a[br]b", "a<br>b")]
    #[case("[color=red]x[/color]", r#"<span style="color: red;" class="bbc_color">x</span>"#)]
    #[case("[size=3]x[/size]", r#"<span style="font-size: 1.35em;" class="bbc_size">x</span>"#)]
    #[case("[nobbc][b]x[/b][/nobbc]", "[b]x[/b]")]
    #[case("[url]https://a.example[/url]", r#"<a href="https://a.example" class="bbc_link" target="_blank" rel="noopener">https://a.example</a>"#)]
    #[case("[url=&quot;https://a.example&quot;]A[/url]", r#"<a href="https://a.example" class="bbc_link" target="_blank" rel="noopener">A</a>"#)]
    fn renders_tags(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(parse(input), expected);
    }

    #[test]
    fn shadow_uses_comma_fields() {
        assert_eq!(
            parse("[shadow=red,left]x[/shadow]"),
            r#"<span style="text-shadow: red -2px 0 1px">x</span>"#
        );
    }

    #[test]
    fn flash_reads_its_dimensions() {
        assert_eq!(
            parse("[flash=100,80]http://x.example/a.swf[/flash]"),
            r#"<embed type="application/x-shockwave-flash" src="http://x.example/a.swf" width="100" height="80" play="true" loop="true" quality="high" AllowScriptAccess="never">"#
        );
        assert_eq!(parse("[flash=100]x[/flash]"), "[flash=100]x[/flash]");
    }

    #[test]
    fn unparsed_body_is_not_scanned() {
        let html = parse("[code][b]x[/b][/code]");
        assert!(html.ends_with(r#"<code class="bbc_code">[b]x[/b]</code>"#));
    }

    #[test]
    fn code_with_title() {
        let html = parse("[code=main.rs]fn x[/code]");
        assert!(html.contains("<span class=\"code\">Code</span> (main.rs)"));
        assert!(html.ends_with(r#"<code class="bbc_code">fn x</code>"#));
    }

    #[test]
    fn missing_closer_leaves_text() {
        assert_eq!(parse("[code]x"), "[code]x");
    }

    #[test]
    fn block_tag_closes_open_inline_tags() {
        assert_eq!(
            parse("[b]x[quote]y[/quote]"),
            r#"<b>x</b><blockquote class="bbc_standard_quote"><cite>Quote</cite>y</blockquote>"#
        );
    }

    #[test]
    fn block_tags_eat_one_break() {
        assert_eq!(
            parse("[center]x[/center]\n\ny"),
            r#"<div class="centertext"><div class="inline-block">x</div></div><br>y"#
        );
    }

    #[test]
    fn quote_trims_inner_whitespace() {
        assert_eq!(
            parse("[quote]\n x \n[/quote]"),
            r#"<blockquote class="bbc_standard_quote"><cite>Quote</cite>x <br></blockquote>"#
        );
    }

    #[test]
    fn quoted_value_with_nested_assignment() {
        let html = parse("[quote=&quot;a=&quot;b&quot;&quot;]x[/quote]");
        assert_eq!(
            html,
            r#"<blockquote class="bbc_standard_quote"><cite>Quote from: a=&quot;b&quot;</cite>x</blockquote>"#
        );
    }

    #[test]
    fn quote_title_only_parses_links() {
        let html = parse("[quote=&quot;[b]Ann[/b]&quot;]x[/quote]");
        assert!(html.contains("<cite>Quote from: [b]Ann[/b]</cite>"));
        let html = parse("[quote=&quot;[url=https://a.example]Ann[/url]&quot;]x[/quote]");
        assert!(html.contains(r#"<cite>Quote from: <a href="https://a.example" class="bbc_link""#));
    }

    #[test]
    fn tables_repair_structure() {
        assert_eq!(
            parse("[table][tr][td]a[/td][td]b[/td][/tr][/table]"),
            r#"<table class="bbc_table"><tr><td>a</td><td>b</td></tr></table>"#
        );
    }

    #[test]
    fn loose_text_in_table_is_kept() {
        let html = parse("[table]junk[tr][td]a[/td][/tr][/table]");
        assert!(html.starts_with(r#"<table class="bbc_table">junk<tr>"#), "{html}");
        assert!(html.ends_with("<td>a</td></tr></table>"), "{html}");
    }

    #[test]
    fn disabled_tags_use_fallback_templates() {
        let catalog = TagCatalog::builtin(&ForumContext::default()).expect("builtin tags compile");
        let parser = Parser::new(&catalog).with_options(crate::ParseOptions {
            disabled: crate::tag_set!["b", "url", "center"],
            ..crate::ParseOptions::default()
        });
        let none = TagSet::new();
        assert_eq!(parser.parse("[b]x[/b]", false, &none), "x");
        assert_eq!(
            parser.parse("[url=https://a.example]A[/url]", false, &none),
            "A (https://a.example)"
        );
        assert_eq!(parser.parse("[center]x[/center]", false, &none), "<div>x</div>");
    }
}
