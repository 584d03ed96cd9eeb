//! Forum markup conversion between BBCode and HTML.
//!
//! [`Parser`] turns stored BBCode into HTML, [`Unparser`] turns editor HTML
//! back into BBCode and [`legalize()`] repairs badly nested BBCode. Both
//! directions work from a [`TagCatalog`], built once from the tag
//! definitions and a [`ForumContext`].
//!
//! ```
//! assert_eq!(bbcodec::parse("[b]hi[/b]"), "<b>hi</b>");
//! assert_eq!(bbcodec::unparse("<b>hi</b>"), "[b]hi[/b]");
//! ```

#[macro_use]
mod macros;

pub mod behavior;
pub mod catalog;
pub mod config;
pub mod context;
pub mod legalize;
pub mod matcher;
pub mod parser;
pub mod protect;
pub mod smileys;
pub mod textproc;
pub mod unparse;

use std::{collections::BTreeSet, sync::LazyLock};

pub use catalog::{CatalogError, CatalogExtension, TagCatalog, TagDefinition};
pub use config::{Config, ConfigError};
pub use context::{Attachment, AttachmentResolver, ForumContext};
pub use legalize::legalize;
pub use matcher::ResolvedTag;
pub use parser::{ParseOptions, Parser};
pub use protect::Protector;
pub use smileys::{Smiley, SmileyTable, substitute_smileys};
pub use textproc::escape_special_chars;
pub use unparse::{UnparseStage, Unparser};

/// A set of lowercase tag names.
pub type TagSet = BTreeSet<String>;

static DEFAULT_CATALOG: LazyLock<TagCatalog> = LazyLock::new(|| {
    TagCatalog::builtin(&ForumContext::default()).expect("built-in tag definitions compile")
});

static DEFAULT_SMILEYS: LazyLock<SmileyTable> =
    LazyLock::new(|| SmileyTable::default_set("https://forum.example/Smileys/default"));

/// Convert BBCode to HTML with the stock tags, smileys enabled.
///
/// `text` is expected in stored form, see [`escape_special_chars`].
#[must_use]
pub fn parse(text: &str) -> String {
    Parser::new(&DEFAULT_CATALOG)
        .with_smileys(&DEFAULT_SMILEYS)
        .parse(text, true, &TagSet::new())
}

/// Convert HTML to BBCode with the stock tags and smileys.
#[must_use]
pub fn unparse(html: &str) -> String {
    Unparser::new(&DEFAULT_CATALOG)
        .with_smileys(&DEFAULT_SMILEYS)
        .unparse(html)
}
