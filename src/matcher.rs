//! Deciding which tag definition applies at a `[`.
//!
//! The matcher looks at the definitions bucketed under the character after
//! the bracket and takes the first one whose name, head grammar, `test`
//! pattern, tree constraints and parameters all fit. The winner is cloned
//! into a [`ResolvedTag`] with its parameters substituted, ready for the
//! scanner to emit.

use regex::Regex;
use tracing::trace;

use crate::{
    TagSet,
    catalog::{ContentType, Quoting, TagCatalog, TagDefinition},
    context::ForumContext,
    parser::OpenFrame,
    textproc::strtr,
};

/// One occurrence of a tag, with templates owned and specialised.
#[derive(Debug, Clone)]
pub struct ResolvedTag<'c> {
    pub def: &'c TagDefinition,
    pub before: String,
    pub after: String,
    pub content: String,
    /// Own disallowed children merged with those inherited from the parent.
    pub disallow_children: Option<TagSet>,
    /// Resolved parameter values, in definition order.
    pub params: Vec<(String, String)>,
}

impl<'c> ResolvedTag<'c> {
    #[must_use]
    pub fn from_definition(def: &'c TagDefinition) -> Self {
        Self {
            def,
            before: def.before.clone(),
            after: def.after.clone(),
            content: def.content.clone(),
            disallow_children: def.disallow_children.clone(),
            params: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'c str { &self.def.name }

    /// Replace `{param}` tokens in all three templates.
    fn substitute_params(&mut self) {
        if self.params.is_empty() {
            return;
        }
        let pairs: Vec<(String, &str)> = self
            .params
            .iter()
            .map(|(name, value)| (format!("{{{name}}}"), value.as_str()))
            .collect();
        self.before = strtr(&self.before, &pairs);
        self.after = strtr(&self.after, &pairs);
        self.content = strtr(&self.content, &pairs);
    }

    /// Switch to the templates used when the tag is administratively
    /// disabled, falling back to a plain `<div>` (block tags) or bare
    /// passthrough.
    pub(crate) fn apply_disabled(&mut self) {
        let def = self.def;
        let block_before = if def.block_level { "<div>" } else { "" };
        let block_after = if def.block_level { "</div>" } else { "" };
        match (&def.disabled_before, &def.disabled_after, &def.disabled_content) {
            (None, None, None) => {
                self.before = block_before.to_string();
                self.after = block_after.to_string();
                self.content = if def.content_type == ContentType::Closed {
                    String::new()
                } else if def.block_level {
                    "<div>$1</div>".to_string()
                } else {
                    "$1".to_string()
                };
            }
            (before, after, _) if before.is_some() || after.is_some() => {
                self.before = before.clone().unwrap_or_else(|| block_before.to_string());
                self.after = after.clone().unwrap_or_else(|| block_after.to_string());
            }
            (_, _, content) => {
                self.content = content.clone().unwrap_or_default();
            }
        }
        self.substitute_params();
    }
}

/// A successful match: the resolved tag and the offset just past its head.
#[derive(Debug)]
pub struct TagMatch<'c> {
    pub tag: ResolvedTag<'c>,
    pub body_start: usize,
}

/// Try every candidate definition for the `[` at byte offset `pos`.
///
/// `tag_re` is the scan's combined tag pattern; parameter strings never
/// extend past the next tag it finds.
pub(crate) fn match_tag<'c>(
    catalog: &'c TagCatalog,
    buf: &str,
    pos: usize,
    open: &[OpenFrame],
    restrict: Option<&TagSet>,
    tag_re: &Regex,
) -> Option<TagMatch<'c>> {
    let rest = &buf[pos + 1..];
    let first = rest.chars().next()?;
    let inside = open.last();

    for def in catalog.bucket(first) {
        if restrict.is_some_and(|allowed| !allowed.contains(&def.name)) {
            continue;
        }
        let name_len = def.name.len();
        if !rest
            .get(..name_len)
            .is_some_and(|head| head.eq_ignore_ascii_case(&def.name))
        {
            continue;
        }
        let after_name = &rest[name_len..];
        let Some(next_c) = after_name.chars().next() else {
            break;
        };

        if let Some(test) = def.test_regex()
            && !test.is_match(&after_name[next_c.len_utf8()..])
        {
            continue;
        }
        let Some(head_len) = head_length(def, after_name, next_c) else {
            continue;
        };
        if !fits_tree(def, inside) {
            continue;
        }

        let mut tag = ResolvedTag::from_definition(def);
        let mut body_start = pos + 1 + name_len + head_len;

        if def.name == "quote" && tag.before.contains("<blockquote>") {
            let depth = open.iter().filter(|f| f.name == "quote").count();
            let class = if depth % 2 == 1 { "alternate" } else { "standard" };
            tag.before = tag.before.replace(
                "<blockquote>",
                &format!(r#"<blockquote class="bbc_{class}_quote">"#),
            );
        }

        if !def.parameters.is_empty() {
            let region = &buf[pos + 1 + name_len..];
            let Some((params, param_len)) = parse_params(def, region, tag_re, catalog.context())
            else {
                continue;
            };
            tag.params = params;
            tag.substitute_params();
            body_start = pos + 1 + name_len + param_len + 1;
        }

        trace!(tag = %def.name, pos, body_start, "tag matched");
        return Some(TagMatch { tag, body_start });
    }
    None
}

/// Length of the head continuation (`]`, `=`, ` `, `/]`, ` /]`) when it
/// suits the definition's grammar.
fn head_length(def: &TagDefinition, after_name: &str, next_c: char) -> Option<usize> {
    if !def.parameters.is_empty() {
        let ok = if def.params_required() {
            next_c == ' '
        } else {
            next_c == ' ' || next_c == ']'
        };
        return ok.then_some(1);
    }
    match def.content_type {
        ct if ct.needs_equals() => (next_c == '=').then_some(1),
        ContentType::Closed => ["]", "/]", " /]"]
            .into_iter()
            .find(|end| after_name.starts_with(end))
            .map(str::len),
        _ => (next_c == ']').then_some(1),
    }
}

/// Whether `def` may open inside the innermost frame.
fn fits_tree(def: &TagDefinition, inside: Option<&OpenFrame>) -> bool {
    if let Some(parents) = &def.require_parents
        && !inside.is_some_and(|frame| parents.contains(&frame.name))
    {
        return false;
    }
    let Some(frame) = inside else {
        return true;
    };
    if frame
        .require_children
        .as_ref()
        .is_some_and(|allowed| !allowed.contains(&def.name))
    {
        return false;
    }
    !frame
        .disallow_children
        .as_ref()
        .is_some_and(|banned| banned.contains(&def.name))
}

/// Parse the parameters following a tag name.
///
/// Quoted values may contain `]`, so the candidate parameter string is
/// extended one `]` at a time until every parameter fits. Returns the
/// resolved values and the length of the accepted parameter string.
fn parse_params(
    def: &TagDefinition,
    region: &str,
    tag_re: &Regex,
    context: &ForumContext,
) -> Option<(Vec<(String, String)>, usize)> {
    let limit = tag_re.find(region).map_or(region.len(), |m| m.start());
    let region = &region[..limit];
    region
        .match_indices(']')
        .find_map(|(end, _)| resolve_params(def, &region[..end], context).map(|p| (p, end)))
}

fn resolve_params(
    def: &TagDefinition,
    given: &str,
    context: &ForumContext,
) -> Option<Vec<(String, String)>> {
    let splitter = def.splitter()?;
    let mut raw: Vec<(String, &str)> = Vec::new();
    let heads: Vec<_> = splitter.find_iter(given).collect();
    if heads.first().map_or(!given.is_empty(), |m| m.start() != 0) {
        return None;
    }
    for (i, head) in heads.iter().enumerate() {
        let name = head
            .as_str()
            .trim_start()
            .trim_end_matches('=')
            .to_ascii_lowercase();
        if raw.iter().any(|(n, _)| *n == name) {
            return None;
        }
        let end = heads.get(i + 1).map_or(given.len(), regex::Match::start);
        raw.push((name, given[head.end()..end].trim_end()));
    }

    let mut resolved = Vec::with_capacity(def.parameters.len());
    for spec in &def.parameters {
        let value = match raw.iter().find(|(n, _)| *n == spec.name) {
            Some((_, value)) => {
                let inner = unquote(value, spec.quoting)?;
                let caps = spec.regex()?.captures(inner)?;
                let captured = caps.get(1).or_else(|| caps.get(0))?.as_str();
                if let Some(template) = &spec.value {
                    template.replace("$1", captured)
                } else if let Some(validate) = spec.validate {
                    validate(captured, context)
                } else {
                    captured.to_string()
                }
            }
            None if !spec.optional => return None,
            None => match &spec.default {
                None => String::new(),
                Some(default) => {
                    if let Some(template) = &spec.value {
                        template.replace("$1", default)
                    } else if let Some(validate) = spec.validate {
                        validate(default, context)
                    } else {
                        default.clone()
                    }
                }
            },
        };
        resolved.push((
            spec.name.clone(),
            strtr(&value, &[("$", "&#036;"), ("{", "&#123;")]),
        ));
    }
    Some(resolved)
}

/// Strip surrounding `&quot;` or `"` according to `quoting`.
fn unquote(value: &str, quoting: Quoting) -> Option<&str> {
    let inner = ["&quot;", "\""].into_iter().find_map(|q| {
        value
            .strip_prefix(q)
            .and_then(|v| v.strip_suffix(q))
    });
    match quoting {
        Quoting::None => Some(value),
        Quoting::Optional => Some(inner.unwrap_or(value)),
        Quoting::Required => inner,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{catalog::Trim, context::ForumContext};

    fn catalog() -> TagCatalog {
        TagCatalog::builtin(&ForumContext::default()).expect("builtin tags compile")
    }

    fn frame(name: &str, catalog: &TagCatalog) -> OpenFrame {
        let def = catalog
            .bucket(name.chars().next().expect("non-empty name"))
            .iter()
            .rev()
            .find(|d| d.name == name)
            .expect("known tag");
        OpenFrame {
            name: name.to_string(),
            after: def.after.clone(),
            block_level: def.block_level,
            trim: Trim::None,
            nested: def.require_parents.is_some(),
            require_children: def.require_children.clone(),
            disallow_children: def.disallow_children.clone(),
        }
    }

    fn try_match<'c>(catalog: &'c TagCatalog, text: &str, open: &[OpenFrame]) -> Option<TagMatch<'c>> {
        let re = catalog.tag_pattern(None);
        match_tag(catalog, text, 0, open, None, &re)
    }

    #[test]
    fn matches_case_insensitively() {
        let catalog = catalog();
        let m = try_match(&catalog, "[B]x", &[]).expect("bold matches");
        assert_eq!(m.tag.name(), "b");
        assert_eq!(m.body_start, 3);
    }

    #[test]
    fn test_pattern_selects_between_definitions() {
        let catalog = catalog();
        let named = try_match(&catalog, "[size=12pt]x", &[]).expect("named size");
        assert_eq!(named.tag.def.behavior, None);
        let numeric = try_match(&catalog, "[size=3]x", &[]).expect("numeric size");
        assert!(numeric.tag.def.behavior.is_some());
        assert!(try_match(&catalog, "[size=huge]x", &[]).is_none());
    }

    #[test]
    fn closed_tags_accept_slash_forms() {
        let catalog = catalog();
        for text in ["[hr]", "[hr/]", "[hr /]"] {
            let m = try_match(&catalog, text, &[]).expect("hr matches");
            assert_eq!(m.body_start, text.len());
        }
    }

    #[test]
    fn tree_constraints_apply() {
        let catalog = catalog();
        assert!(try_match(&catalog, "[li]x", &[]).is_none());
        let list = frame("list", &catalog);
        assert!(try_match(&catalog, "[li]x", std::slice::from_ref(&list)).is_some());
        assert!(try_match(&catalog, "[b]x", &[list]).is_none());
        let url = frame("url", &catalog);
        assert!(try_match(&catalog, "[url]x[/url]", &[url]).is_none());
    }

    #[test]
    fn nested_quotes_alternate() {
        let catalog = catalog();
        let outer = try_match(&catalog, "[quote]x", &[]).expect("quote");
        assert!(outer.tag.before.starts_with(r#"<blockquote class="bbc_standard_quote">"#));
        let inner = try_match(&catalog, "[quote]x", &[frame("quote", &catalog)]).expect("quote");
        assert!(inner.tag.before.starts_with(r#"<blockquote class="bbc_alternate_quote">"#));
    }

    #[test]
    fn parameters_parse_in_any_order() {
        let catalog = catalog();
        let text = "[img height=20 alt=&quot;a b&quot; width=10]pic.png[/img]";
        let m = try_match(&catalog, text, &[]).expect("img with params");
        assert_eq!(&text[m.body_start..m.body_start + 7], "pic.png");
        assert!(m.tag.content.contains(r#"alt="a b""#));
        assert!(m.tag.content.contains(r#" width="10" height="20""#));
    }

    #[test]
    fn required_parameters_must_be_present() {
        let catalog = catalog();
        let m = try_match(&catalog, "[quote author=Ann]x[/quote]", &[]).expect("author quote");
        assert!(m.tag.before.contains("Quote from: Ann"));
        assert!(try_match(&catalog, "[list type=bogus]", &[]).is_none());
        let list = try_match(&catalog, "[list type=square]", &[]).expect("typed list");
        assert!(list.tag.before.contains("list-style-type: square;"));
    }

    #[test]
    fn parameter_values_cannot_inject_placeholders() {
        let catalog = catalog();
        let m = try_match(&catalog, "[quote author=$1{x}]y", &[]).expect("author quote");
        assert!(m.tag.before.contains("&#036;1&#123;x}"));
    }

    #[test]
    fn restriction_filters_candidates() {
        let catalog = catalog();
        let re = catalog.tag_pattern(None);
        let allowed = crate::tag_set!["url"];
        assert!(match_tag(&catalog, "[b]x", 0, &[], Some(&allowed), &re).is_none());
    }
}
