//! Shared fixtures for integration tests
//!
//! Declaration files live under `tests/fixtures/apps`.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tfsynth::{AppFile, NodeId, SynthOptions, Tree};

/// Path to a declaration file fixture
pub fn app_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/apps")
        .join(name)
}

/// Load a declaration file fixture
pub fn load_app(name: &str) -> AppFile {
    AppFile::from_path(&app_path(name)).expect("fixture should parse")
}

/// Options without the metadata block, so documents compare exactly
pub fn bare_options() -> SynthOptions {
    SynthOptions {
        metadata: false,
        ..SynthOptions::default()
    }
}

/// A tree with one stack named `main`
pub fn single_stack() -> (Tree, NodeId) {
    let mut tree = Tree::new();
    let root = tree.root();
    let stack = tree.stack(root, "main").expect("valid stack name");
    (tree, stack)
}
