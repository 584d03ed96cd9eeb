//! JSON configuration for the command-line front end.
//!
//! ```json
//! {
//!   "script_url": "https://forum.example/index.php",
//!   "disabled_tags": ["flash"],
//!   "autolink_urls": true,
//!   "texts": { "quote": "Zitat" }
//! }
//! ```
//!
//! Every field is optional; missing ones take the stock forum defaults.

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    TagSet,
    context::ForumContext,
    parser::ParseOptions,
    smileys::{Smiley, SmileyTable},
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config file {}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Settings for one conversion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub script_url: String,
    pub host_url: String,
    /// Where smiley images are served from. Defaults to the stock smiley
    /// directory under `host_url`.
    pub smileys_url: Option<String>,
    /// Replaces the stock smiley set when present.
    pub smileys: Option<Vec<Smiley>>,
    pub disabled_tags: TagSet,
    pub enable_post_html: bool,
    pub autolink_urls: bool,
    pub time_format: String,
    /// Overrides for the localised strings, keyed without the `txt_` prefix.
    pub texts: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        let context = ForumContext::default();
        Self {
            script_url: context.script_url,
            host_url: context.host_url,
            smileys_url: None,
            smileys: None,
            disabled_tags: TagSet::new(),
            enable_post_html: false,
            autolink_urls: false,
            time_format: context.time_format,
            texts: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Read a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or is not a valid
    /// configuration.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The forum context these settings describe. String overrides are
    /// layered over the stock strings.
    #[must_use]
    pub fn context(&self) -> ForumContext {
        let mut context = ForumContext {
            script_url: self.script_url.clone(),
            host_url: self.host_url.clone(),
            time_format: self.time_format.clone(),
            ..ForumContext::default()
        };
        context
            .texts
            .extend(self.texts.iter().map(|(k, v)| (k.clone(), v.clone())));
        context
    }

    #[must_use]
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            disabled: self.disabled_tags.clone(),
            enable_post_html: self.enable_post_html,
            autolink_urls: self.autolink_urls,
        }
    }

    #[must_use]
    pub fn smiley_table(&self) -> SmileyTable {
        let base = self.smileys_url.clone().unwrap_or_else(|| {
            format!("{}/Smileys/default", self.host_url.trim_end_matches('/'))
        });
        match &self.smileys {
            Some(smileys) => SmileyTable::new(&base, smileys.clone()),
            None => SmileyTable::default_set(&base),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: Config = serde_json::from_str("{}").expect("empty object parses");
        assert_eq!(config, Config::default());
        assert_eq!(config.context().origin(), "https://forum.example");
    }

    #[test]
    fn loads_a_file() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("bbcodec.json");
        fs::write(
            &path,
            r#"{"host_url": "https://b.test", "disabled_tags": ["b"], "texts": {"quote": "Zitat"}}"#,
        )
        .expect("write config");
        let config = Config::load(&path).expect("config loads");
        assert!(config.parse_options().disabled.contains("b"));
        assert_eq!(config.context().text("quote"), "Zitat");
        assert_eq!(config.context().text("code"), "Code");
        assert_eq!(config.smiley_table().base_url(), "https://b.test/Smileys/default");
    }

    #[test]
    fn custom_smileys_replace_the_stock_set() {
        let config: Config = serde_json::from_str(
            r#"{"smileys_url": "/s", "smileys": [{"code": ":x", "file": "x.gif", "description": "X"}]}"#,
        )
        .expect("config parses");
        let table = config.smiley_table();
        assert_eq!(table.smileys().len(), 1);
        assert_eq!(table.code_for("/s/x.gif"), Some(":x"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{"colour": "red"}"#).expect("write config");
        assert!(matches!(Config::load(&path), Err(ConfigError::Json { .. })));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempdir().expect("temp dir");
        let err = Config::load(&dir.path().join("absent.json")).expect_err("file is absent");
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("absent.json"));
    }
}
