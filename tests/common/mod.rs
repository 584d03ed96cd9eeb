//! Utility helpers shared across integration tests.

use std::{fs, path::{Path, PathBuf}};

use assert_cmd::Command;
use bbcodec::{ForumContext, TagCatalog};

/// The `bbcodec` binary built for this test run.
pub fn bbcodec() -> Command {
    Command::cargo_bin("bbcodec").expect("Failed to create cargo command for bbcodec")
}

/// The stock catalog with the default forum context.
pub fn stock_catalog() -> TagCatalog {
    TagCatalog::builtin(&ForumContext::default()).expect("built-in tag definitions compile")
}

/// Write `content` to `dir/name` and return the path.
pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("failed to write temporary file");
    path
}
