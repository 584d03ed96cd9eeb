//! Emoticon codes and their images.
//!
//! Codes are matched longest first, and only where they stand on their own:
//! after whitespace, punctuation or the start of the text, before a
//! character that is neither letter nor digit, and never
//! inside an HTML tag. Both the raw and the escaped spelling of a code
//! match.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::textproc::escape_special_chars;

/// One emoticon: the code members type and the image it becomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Smiley {
    pub code: String,
    pub file: String,
    pub description: String,
}

impl Smiley {
    #[must_use]
    pub fn new(code: &str, file: &str, description: &str) -> Self {
        Self {
            code: code.to_string(),
            file: file.to_string(),
            description: description.to_string(),
        }
    }
}

const DEFAULT_SET: [(&str, &str, &str); 22] = [
    (">:(", "angry.gif", "Angry"),
    (":)", "smiley.gif", "Smiley"),
    (";)", "wink.gif", "Wink"),
    (":D", "cheesy.gif", "Cheesy"),
    (";D", "grin.gif", "Grin"),
    (":(", "sad.gif", "Sad"),
    (":o", "shocked.gif", "Shocked"),
    ("8)", "cool.gif", "Cool"),
    ("???", "huh.gif", "Huh?"),
    ("::)", "rolleyes.gif", "Roll Eyes"),
    (":P", "tongue.gif", "Tongue"),
    (":-[", "embarrassed.gif", "Embarrassed"),
    (":-X", "lipsrsealed.gif", "Lips Sealed"),
    (":-\\", "undecided.gif", "Undecided"),
    (":-*", "kiss.gif", "Kiss"),
    (":'(", "cry.gif", "Cry"),
    (">:D", "evil.gif", "Evil"),
    ("^-^", "azn.gif", "Azn"),
    ("O0", "afro.gif", "Afro"),
    (":))", "laugh.gif", "Laugh"),
    ("C:-)", "police.gif", "Police"),
    ("O:-)", "angel.gif", "Angel"),
];

/// A set of smileys plus the URL their images are served from.
#[derive(Debug, Clone)]
pub struct SmileyTable {
    base_url: String,
    smileys: Vec<Smiley>,
    /// `(escaped code, rendered image)` in table order.
    rendered: Vec<(String, String)>,
    /// Every matchable spelling of a code (raw and escaped) and the index of
    /// its smiley.
    variants: Vec<(String, usize)>,
    pattern: Option<Regex>,
}

impl SmileyTable {
    #[must_use]
    pub fn new(base_url: &str, smileys: Vec<Smiley>) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        let rendered: Vec<(String, String)> = smileys
            .iter()
            .map(|s| {
                let code = escape_special_chars(&s.code);
                let image = format!(
                    r#"<img src="{base_url}/{}" alt="{code}" title="{}" class="smiley">"#,
                    s.file,
                    escape_special_chars(&s.description)
                );
                (code, image)
            })
            .collect();

        let mut variants: Vec<(String, usize)> = Vec::with_capacity(smileys.len() * 2);
        for (i, (s, (escaped, _))) in smileys.iter().zip(&rendered).enumerate() {
            variants.push((escaped.clone(), i));
            if s.code != *escaped {
                variants.push((s.code.clone(), i));
            }
        }
        let mut codes: Vec<&str> = variants.iter().map(|(c, _)| c.as_str()).collect();
        codes.sort_by(|a, b| b.len().cmp(&a.len()));
        codes.dedup();
        let pattern = (!codes.is_empty()).then(|| {
            let alternation = codes
                .iter()
                .map(|c| regex::escape(c))
                .collect::<Vec<_>>()
                .join("|");
            Regex::new(&alternation).expect("escaped smiley codes form a valid pattern")
        });
        debug!(count = smileys.len(), "smiley table built");
        Self {
            base_url,
            smileys,
            rendered,
            variants,
            pattern,
        }
    }

    /// The stock smiley set served from `base_url`.
    #[must_use]
    pub fn default_set(base_url: &str) -> Self {
        Self::new(
            base_url,
            DEFAULT_SET
                .iter()
                .map(|(code, file, description)| Smiley::new(code, file, description))
                .collect(),
        )
    }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.smileys.is_empty() }

    #[must_use]
    pub fn smileys(&self) -> &[Smiley] { &self.smileys }

    #[must_use]
    pub fn base_url(&self) -> &str { &self.base_url }

    /// The escaped code whose image is `src`, matched on the file name so
    /// relative and absolute sources both resolve.
    #[must_use]
    pub fn code_for(&self, src: &str) -> Option<&str> {
        let file = src.rsplit('/').next().unwrap_or(src);
        self.smileys
            .iter()
            .zip(&self.rendered)
            .find(|(s, _)| s.file == file)
            .map(|(_, (code, _))| code.as_str())
    }

    /// The longest code at `at` that a boundary follows, as its end offset
    /// and image.
    fn longest_fit(&self, text: &str, at: usize) -> Option<(usize, &str)> {
        let rest = &text[at..];
        self.variants
            .iter()
            .filter(|(code, _)| rest.starts_with(code.as_str()))
            .map(|(code, i)| (at + code.len(), *i))
            .filter(|&(end, _)| stands_alone_after(text, end))
            .max_by_key(|&(end, _)| end)
            .and_then(|(end, i)| self.rendered.get(i).map(|(_, image)| (end, image.as_str())))
    }
}

fn stands_alone_before(text: &str, at: usize) -> bool {
    let before = &text[..at];
    let Some(prev) = before.chars().next_back() else {
        return true;
    };
    prev.is_whitespace()
        || matches!(prev, '>' | ':' | '?' | '.' | '[' | ']' | '(' | ')' | '*' | '\\' | ';')
        || before.ends_with("&#039;")
}

fn stands_alone_after(text: &str, end: usize) -> bool {
    let rest = &text[end..];
    if rest.chars().next().is_some_and(char::is_alphanumeric) {
        return false;
    }
    // Inside a tag if a `>` comes before any `<`.
    !matches!(rest.find(['<', '>']).map(|i| rest.as_bytes()[i]), Some(b'>'))
}

/// Replace every free-standing smiley code in `text` with its image.
#[must_use]
pub fn substitute_smileys(text: &str, table: &SmileyTable) -> String {
    let Some(pattern) = &table.pattern else {
        return text.to_string();
    };
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut from = 0;
    while let Some(m) = pattern.find_at(text, from) {
        let fit = if stands_alone_before(text, m.start()) {
            table.longest_fit(text, m.start())
        } else {
            None
        };
        match fit {
            Some((end, image)) => {
                out.push_str(&text[copied..m.start()]);
                out.push_str(image);
                copied = end;
                from = end;
            }
            None => {
                from = m.start() + text[m.start()..].chars().next().map_or(1, char::len_utf8);
            }
        }
        if from >= text.len() {
            break;
        }
    }
    out.push_str(&text[copied..]);
    out
}
