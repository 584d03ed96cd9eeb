//! The reverse converter: HTML in, BBCode out.
//!
//! HTML from a rich-text editor (or from [`crate::Parser`]) is rewritten in
//! a fixed sequence of passes, each a plain string-to-string function:
//!
//! 1. normalisation (scripts, comments, line breaks, paragraphs, smileys),
//! 2. inline `style` declarations,
//! 3. legacy `align` attributes,
//! 4. legacy `<font>` attributes,
//! 5. lists,
//! 6. images,
//! 7. the fixed element map,
//! 8. links,
//! 9. stripping what is left,
//!
//! and the result goes through [`crate::legalize`]. A checkpoint callback,
//! when installed, sees the text after every pass.

mod elements;
mod html;
mod legacy;
mod lists;
mod normalize;
mod styles;

use std::{fmt, sync::Arc};

use tracing::{debug, trace};

use crate::{TagSet, catalog::TagCatalog, legalize::legalize, smileys::SmileyTable};

/// The passes of [`Unparser::unparse`], in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnparseStage {
    Normalize,
    Styles,
    Alignment,
    Fonts,
    Lists,
    Images,
    Elements,
    Links,
    Cleanup,
    Legalize,
}

/// Observer invoked with the text after each pass.
pub type Checkpoint<'c> = Arc<dyn Fn(UnparseStage, &str) + Send + Sync + 'c>;

/// Converts HTML back into BBCode.
#[derive(Clone)]
pub struct Unparser<'c> {
    catalog: &'c TagCatalog,
    smileys: Option<&'c SmileyTable>,
    disabled: TagSet,
    checkpoint: Option<Checkpoint<'c>>,
}

impl fmt::Debug for Unparser<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unparser")
            .field("smileys", &self.smileys.map(SmileyTable::smileys))
            .field("disabled", &self.disabled)
            .field("checkpoint", &self.checkpoint.is_some())
            .finish_non_exhaustive()
    }
}

impl<'c> Unparser<'c> {
    #[must_use]
    pub fn new(catalog: &'c TagCatalog) -> Self {
        Self {
            catalog,
            smileys: None,
            disabled: TagSet::new(),
            checkpoint: None,
        }
    }

    /// Recognise smiley images from `table` and turn them back into codes.
    #[must_use]
    pub fn with_smileys(mut self, table: &'c SmileyTable) -> Self {
        self.smileys = Some(table);
        self
    }

    /// Tags the legalizer should treat as unknown.
    #[must_use]
    pub fn with_disabled(mut self, disabled: TagSet) -> Self {
        self.disabled = disabled;
        self
    }

    #[must_use]
    pub fn with_checkpoint(mut self, checkpoint: impl Fn(UnparseStage, &str) + Send + Sync + 'c) -> Self {
        self.checkpoint = Some(Arc::new(checkpoint));
        self
    }

    /// Convert `html` to BBCode.
    #[must_use]
    pub fn unparse(&self, html: &str) -> String {
        if html.trim().is_empty() {
            return String::new();
        }
        let context = self.catalog.context();

        let text = self.stage(UnparseStage::Normalize, normalize::normalize(html, self.smileys));
        let text = self.stage(UnparseStage::Styles, styles::decompose(&text));
        let text = self.stage(UnparseStage::Alignment, legacy::alignment(&text));
        let text = self.stage(UnparseStage::Fonts, legacy::fonts(&text));
        let text = self.stage(UnparseStage::Lists, lists::restructure(&text));
        let text = self.stage(UnparseStage::Images, elements::images(&text, context));
        let text = self.stage(UnparseStage::Elements, elements::fixed_map(&text));
        let text = self.stage(UnparseStage::Links, elements::links(&text, context));
        let text = self.stage(UnparseStage::Cleanup, elements::cleanup(&text));
        let bbc = self.stage(
            UnparseStage::Legalize,
            legalize(&text, self.catalog, &self.disabled),
        );
        debug!(input = html.len(), output = bbc.len(), "html unparsed");
        bbc
    }

    fn stage(&self, stage: UnparseStage, text: String) -> String {
        trace!(?stage, len = text.len(), "unparse stage done");
        if let Some(checkpoint) = &self.checkpoint {
            checkpoint(stage, &text);
        }
        text
    }
}
