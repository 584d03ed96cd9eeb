//! The tag catalog: every tag the engine understands and how it renders.
//!
//! A [`TagCatalog`] is built once from a list of [`TagDefinition`]s plus any
//! caller extensions, then shared immutably by every parse. Definitions are
//! bucketed by the first character of their name so the matcher only looks
//! at a handful of candidates for each `[`.

mod builtin;

use std::collections::BTreeMap;

use once_cell::sync::OnceCell;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

pub(crate) use builtin::LIST_STYLES;
pub use builtin::builtin_definitions;

use crate::{TagSet, behavior::TagBehavior, context::ForumContext};

/// How a tag captures its argument and body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentType {
    /// `[tag]body[/tag]`, body parsed as markup.
    #[default]
    ParsedContent,
    /// `[tag]raw[/tag]`, body captured verbatim.
    UnparsedContent,
    /// `[tag]`, `[tag/]` or `[tag /]`.
    Closed,
    /// `[tag=value]body[/tag]`, body parsed.
    UnparsedEquals,
    /// Like [`Self::UnparsedEquals`] but the value is parsed as markup too.
    ParsedEquals,
    /// `[tag=a,b,c]body[/tag]`, body parsed.
    UnparsedCommas,
    /// `[tag=a,b,c]raw[/tag]`.
    UnparsedCommasContent,
    /// `[tag=value]raw[/tag]`.
    UnparsedEqualsContent,
}

impl ContentType {
    /// Whether the tag head must continue with `=`.
    #[must_use]
    pub fn needs_equals(self) -> bool {
        matches!(
            self,
            Self::UnparsedEquals
                | Self::ParsedEquals
                | Self::UnparsedCommas
                | Self::UnparsedCommasContent
                | Self::UnparsedEqualsContent
        )
    }
}

/// Whitespace trimming around a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trim {
    #[default]
    None,
    Inside,
    Outside,
    Both,
}

impl Trim {
    #[must_use]
    pub fn inside(self) -> bool { matches!(self, Self::Inside | Self::Both) }

    #[must_use]
    pub fn outside(self) -> bool { matches!(self, Self::Outside | Self::Both) }
}

/// Whether a value must, may, or must not be wrapped in quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quoting {
    #[default]
    None,
    Optional,
    Required,
}

/// Rewrites a parameter value using the forum context.
pub type ParamValidator = fn(&str, &ForumContext) -> String;

/// One named parameter of a parameterised tag, e.g. `width` in
/// `[img width=100]`.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    /// Pattern the whole (unquoted) value must match. Group 1, when
    /// present, is the captured value.
    pub pattern: String,
    pub quoting: Quoting,
    pub optional: bool,
    pub default: Option<String>,
    /// Template with `$1` standing for the captured value.
    pub value: Option<String>,
    pub validate: Option<ParamValidator>,
    compiled: Option<Regex>,
}

impl ParamSpec {
    /// A required parameter matching any non-empty value.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            pattern: "(.+?)".to_string(),
            quoting: Quoting::None,
            optional: false,
            default: None,
            value: None,
            validate: None,
            compiled: None,
        }
    }

    #[must_use]
    pub fn pattern(mut self, pattern: &str) -> Self {
        self.pattern = pattern.to_string();
        self
    }

    #[must_use]
    pub fn quoting(mut self, quoting: Quoting) -> Self {
        self.quoting = quoting;
        self
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    #[must_use]
    pub fn default_value(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }

    #[must_use]
    pub fn value(mut self, template: &str) -> Self {
        self.value = Some(template.to_string());
        self
    }

    #[must_use]
    pub fn validate(mut self, validator: ParamValidator) -> Self {
        self.validate = Some(validator);
        self
    }

    /// The compiled full-value pattern. Available once the owning catalog
    /// has been built.
    pub(crate) fn regex(&self) -> Option<&Regex> { self.compiled.as_ref() }
}

/// A tag definition as stored in the catalog.
///
/// Templates may contain `$1..$n` (captured data), `{param}` (resolved
/// parameters) and `{txt_*}`/`{scripturl}`/`{hosturl}` (resolved at build).
#[derive(Debug, Clone)]
pub struct TagDefinition {
    pub name: String,
    pub content_type: ContentType,
    pub before: String,
    pub after: String,
    pub content: String,
    pub disabled_before: Option<String>,
    pub disabled_after: Option<String>,
    pub disabled_content: Option<String>,
    pub parameters: Vec<ParamSpec>,
    pub test: Option<String>,
    pub block_level: bool,
    pub trim: Trim,
    pub require_parents: Option<TagSet>,
    pub require_children: Option<TagSet>,
    pub disallow_children: Option<TagSet>,
    pub quoted: Quoting,
    pub parsed_tags_allowed: Option<TagSet>,
    pub behavior: Option<TagBehavior>,
    test_re: Option<Regex>,
    splitter_re: Option<Regex>,
}

impl TagDefinition {
    /// A `parsed_content` tag with empty templates.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            content_type: ContentType::ParsedContent,
            before: String::new(),
            after: String::new(),
            content: String::new(),
            disabled_before: None,
            disabled_after: None,
            disabled_content: None,
            parameters: Vec::new(),
            test: None,
            block_level: false,
            trim: Trim::None,
            require_parents: None,
            require_children: None,
            disallow_children: None,
            quoted: Quoting::None,
            parsed_tags_allowed: None,
            behavior: None,
            test_re: None,
            splitter_re: None,
        }
    }

    /// Shorthand for a parsed tag wrapping its body in `before`/`after`.
    #[must_use]
    pub fn wrap(name: &str, before: &str, after: &str) -> Self {
        Self::new(name).before(before).after(after)
    }

    #[must_use]
    pub fn content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    #[must_use]
    pub fn before(mut self, template: &str) -> Self {
        self.before = template.to_string();
        self
    }

    #[must_use]
    pub fn after(mut self, template: &str) -> Self {
        self.after = template.to_string();
        self
    }

    #[must_use]
    pub fn content(mut self, template: &str) -> Self {
        self.content = template.to_string();
        self
    }

    #[must_use]
    pub fn disabled_before(mut self, template: &str) -> Self {
        self.disabled_before = Some(template.to_string());
        self
    }

    #[must_use]
    pub fn disabled_after(mut self, template: &str) -> Self {
        self.disabled_after = Some(template.to_string());
        self
    }

    #[must_use]
    pub fn disabled_content(mut self, template: &str) -> Self {
        self.disabled_content = Some(template.to_string());
        self
    }

    #[must_use]
    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.parameters.push(spec);
        self
    }

    #[must_use]
    pub fn test(mut self, pattern: &str) -> Self {
        self.test = Some(pattern.to_string());
        self
    }

    #[must_use]
    pub fn block_level(mut self) -> Self {
        self.block_level = true;
        self
    }

    #[must_use]
    pub fn trim(mut self, trim: Trim) -> Self {
        self.trim = trim;
        self
    }

    #[must_use]
    pub fn require_parents(mut self, tags: TagSet) -> Self {
        self.require_parents = Some(tags);
        self
    }

    #[must_use]
    pub fn require_children(mut self, tags: TagSet) -> Self {
        self.require_children = Some(tags);
        self
    }

    #[must_use]
    pub fn disallow_children(mut self, tags: TagSet) -> Self {
        self.disallow_children = Some(tags);
        self
    }

    #[must_use]
    pub fn quoted(mut self, quoting: Quoting) -> Self {
        self.quoted = quoting;
        self
    }

    #[must_use]
    pub fn parsed_tags_allowed(mut self, tags: TagSet) -> Self {
        self.parsed_tags_allowed = Some(tags);
        self
    }

    #[must_use]
    pub fn behavior(mut self, behavior: TagBehavior) -> Self {
        self.behavior = Some(behavior);
        self
    }

    /// The compiled `test` pattern, anchored at the start of the text
    /// following the tag head.
    pub(crate) fn test_regex(&self) -> Option<&Regex> { self.test_re.as_ref() }

    /// Splits a parameter string before each ` name=`.
    pub(crate) fn splitter(&self) -> Option<&Regex> { self.splitter_re.as_ref() }

    pub(crate) fn params_required(&self) -> bool { self.parameters.iter().any(|p| !p.optional) }

    /// Identity used to drop exact duplicates when extensions are merged.
    fn signature(&self) -> (&str, ContentType, Option<&str>, &str, &str, &str, usize) {
        (
            &self.name,
            self.content_type,
            self.test.as_deref(),
            &self.before,
            &self.after,
            &self.content,
            self.parameters.len(),
        )
    }

    fn compile(&mut self, context: &ForumContext) -> Result<(), CatalogError> {
        self.before = context.resolve_tokens(&self.before);
        self.after = context.resolve_tokens(&self.after);
        self.content = context.resolve_tokens(&self.content);
        for slot in [
            &mut self.disabled_before,
            &mut self.disabled_after,
            &mut self.disabled_content,
        ]
        .into_iter()
        .flatten()
        {
            *slot = context.resolve_tokens(slot);
        }

        if let Some(test) = &self.test {
            let re = Regex::new(&format!("^(?:{test})")).map_err(|source| CatalogError::Test {
                tag: self.name.clone(),
                source,
            })?;
            self.test_re = Some(re);
        }

        if !self.parameters.is_empty() {
            let names: Vec<String> = self
                .parameters
                .iter()
                .map(|p| regex::escape(&p.name))
                .collect();
            let splitter = Regex::new(&format!(r"(?i)\s+(?:{})=", names.join("|"))).map_err(
                |source| CatalogError::Parameter {
                    tag: self.name.clone(),
                    param: String::new(),
                    source,
                },
            )?;
            self.splitter_re = Some(splitter);
        }
        for param in &mut self.parameters {
            let re = Regex::new(&format!("(?is)^(?:{})$", param.pattern)).map_err(|source| {
                CatalogError::Parameter {
                    tag: self.name.clone(),
                    param: param.name.clone(),
                    source,
                }
            })?;
            param.compiled = Some(re);
        }
        Ok(())
    }
}

/// Errors raised while building a [`TagCatalog`].
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid test pattern for [{tag}]: {source}")]
    Test {
        tag: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid pattern for parameter `{param}` of [{tag}]: {source}")]
    Parameter {
        tag: String,
        param: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid tag name `{0}`")]
    Name(String),
}

/// A change contributed by a plugin before the catalog is frozen.
#[derive(Debug, Clone)]
pub enum CatalogExtension {
    /// Add a definition alongside existing ones of the same name.
    Append(TagDefinition),
    /// Drop every existing definition with this name first.
    Replace(TagDefinition),
}

/// Characters that open an implicit list item, and the bullet style each
/// produces.
const ITEM_CODES: &[(char, &str)] = &[
    ('*', "disc"),
    ('@', "disc"),
    ('+', "square"),
    ('x', "square"),
    ('#', "square"),
    ('o', "circle"),
    ('O', "circle"),
    ('0', "circle"),
];

/// An immutable, shareable set of tag definitions.
#[derive(Debug)]
pub struct TagCatalog {
    buckets: BTreeMap<char, Vec<TagDefinition>>,
    names: TagSet,
    block_level: TagSet,
    closed: TagSet,
    context: ForumContext,
    pattern: OnceCell<Regex>,
}

impl TagCatalog {
    /// Merge `extensions` into `base`, resolve context tokens and compile
    /// every pattern.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when a tag name is not a plain word or a
    /// `test`/parameter pattern fails to compile.
    pub fn build(
        base: Vec<TagDefinition>,
        extensions: Vec<CatalogExtension>,
        context: &ForumContext,
    ) -> Result<Self, CatalogError> {
        let mut defs = base;
        for ext in extensions {
            match ext {
                CatalogExtension::Append(def) => defs.push(def),
                CatalogExtension::Replace(def) => {
                    defs.retain(|d| d.name != def.name);
                    defs.push(def);
                }
            }
        }

        let mut unique: Vec<TagDefinition> = Vec::with_capacity(defs.len());
        for def in defs {
            if !unique.iter().any(|d| d.signature() == def.signature()) {
                unique.push(def);
            }
        }

        let mut catalog = Self {
            buckets: BTreeMap::new(),
            names: TagSet::new(),
            block_level: TagSet::new(),
            closed: TagSet::new(),
            context: context.clone(),
            pattern: OnceCell::new(),
        };
        for mut def in unique {
            let Some(first) = def.name.chars().next() else {
                return Err(CatalogError::Name(def.name));
            };
            if !def.name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(CatalogError::Name(def.name));
            }
            def.compile(context)?;
            catalog.names.insert(def.name.clone());
            if def.block_level {
                catalog.block_level.insert(def.name.clone());
            }
            if def.content_type == ContentType::Closed {
                catalog.closed.insert(def.name.clone());
            }
            catalog.buckets.entry(first).or_default().push(def);
        }
        debug!(
            tags = catalog.names.len(),
            buckets = catalog.buckets.len(),
            "tag catalog built"
        );
        Ok(catalog)
    }

    /// The stock forum catalog with the given context.
    ///
    /// # Errors
    ///
    /// Only fails if the built-in definitions are broken.
    pub fn builtin(context: &ForumContext) -> Result<Self, CatalogError> {
        Self::build(builtin_definitions(), Vec::new(), context)
    }

    /// Definitions whose name starts with `first`, ignoring case, in
    /// catalog order.
    #[must_use]
    pub fn bucket(&self, first: char) -> &[TagDefinition] {
        self.buckets
            .get(&first.to_ascii_lowercase())
            .map_or(&[], Vec::as_slice)
    }

    /// Every tag name in the catalog.
    #[must_use]
    pub fn names(&self) -> &TagSet { &self.names }

    /// Whether any definition named `name` is block level.
    #[must_use]
    pub fn is_block_level(&self, name: &str) -> bool { self.block_level.contains(name) }

    /// Whether any definition named `name` is self-closing.
    #[must_use]
    pub fn is_closed(&self, name: &str) -> bool { self.closed.contains(name) }

    /// The bullet style for an item-code character.
    #[must_use]
    pub fn item_code(&self, c: char) -> Option<&'static str> {
        ITEM_CODES
            .iter()
            .find(|(code, _)| *code == c)
            .map(|(_, style)| *style)
    }

    #[must_use]
    pub fn context(&self) -> &ForumContext { &self.context }

    /// The pattern locating anything that may start a tag: `[name`, `[/name`
    /// or an item code such as `[*]`.
    ///
    /// With `restrict` set only those names are considered. The unrestricted
    /// pattern is compiled once and cached.
    #[must_use]
    pub fn tag_pattern(&self, restrict: Option<&TagSet>) -> Regex {
        match restrict {
            None => self
                .pattern
                .get_or_init(|| self.compile_pattern(self.names.iter()))
                .clone(),
            Some(set) => self.compile_pattern(self.names.iter().filter(|n| set.contains(*n))),
        }
    }

    fn compile_pattern<'a>(&self, names: impl Iterator<Item = &'a String>) -> Regex {
        let mut names: Vec<&String> = names.collect();
        names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let codes: String = ITEM_CODES
            .iter()
            .map(|(c, _)| regex::escape(&c.to_string()))
            .collect();
        let alternation = names
            .iter()
            .map(|n| regex::escape(n))
            .collect::<Vec<_>>()
            .join("|");
        let source = if alternation.is_empty() {
            format!(r"\[[{codes}]\]")
        } else {
            format!(r"(?i)\[/?(?:(?:{alternation})\b|[{codes}]\])")
        };
        // Names are validated as plain words in `build`.
        Regex::new(&source).expect("escaped tag names form a valid pattern")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TagCatalog {
        TagCatalog::build(
            vec![
                TagDefinition::wrap("b", "<b>", "</b>"),
                TagDefinition::wrap("bdo", "<bdo>", "</bdo>").block_level(),
                TagDefinition::new("hr").content_type(ContentType::Closed).content("<hr>"),
            ],
            Vec::new(),
            &ForumContext::default(),
        )
        .expect("sample catalog builds")
    }

    #[test]
    fn buckets_are_case_insensitive() {
        let catalog = sample();
        assert_eq!(catalog.bucket('B').len(), 2);
        assert!(catalog.bucket('z').is_empty());
    }

    #[test]
    fn classifies_tags() {
        let catalog = sample();
        assert!(catalog.is_block_level("bdo"));
        assert!(!catalog.is_block_level("b"));
        assert!(catalog.is_closed("hr"));
        assert_eq!(catalog.item_code('O'), Some("circle"));
        assert_eq!(catalog.item_code('y'), None);
    }

    #[test]
    fn extensions_replace_and_dedupe() {
        let base = vec![
            TagDefinition::wrap("b", "<b>", "</b>"),
            TagDefinition::wrap("b", "<b>", "</b>"),
        ];
        let ext = vec![CatalogExtension::Replace(TagDefinition::wrap(
            "b",
            "<strong>",
            "</strong>",
        ))];
        let catalog =
            TagCatalog::build(base, ext, &ForumContext::default()).expect("catalog builds");
        assert_eq!(catalog.bucket('b').len(), 1);
        assert_eq!(catalog.bucket('b')[0].before, "<strong>");
    }

    #[test]
    fn resolves_context_tokens() {
        let catalog = TagCatalog::build(
            vec![TagDefinition::wrap("q", "<cite>{txt_quote}</cite>", "")],
            Vec::new(),
            &ForumContext::default(),
        )
        .expect("catalog builds");
        assert_eq!(catalog.bucket('q')[0].before, "<cite>Quote</cite>");
    }

    #[test]
    fn rejects_bad_test_pattern() {
        let err = TagCatalog::build(
            vec![TagDefinition::new("x").test("(")],
            Vec::new(),
            &ForumContext::default(),
        )
        .expect_err("unbalanced group must fail");
        assert!(matches!(err, CatalogError::Test { .. }));
    }

    #[test]
    fn tag_pattern_respects_restriction() {
        let catalog = sample();
        let all = catalog.tag_pattern(None);
        assert!(all.is_match("x [BDO]"));
        assert!(all.is_match("[*]"));
        assert!(!all.is_match("[bx]"));
        let only_b = catalog.tag_pattern(Some(&tag_set!["b"]));
        assert!(only_b.is_match("[/b]"));
        assert!(!only_b.is_match("[bdo]"));
    }
}
