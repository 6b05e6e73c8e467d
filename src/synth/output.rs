//! Writing synthesized stacks to disk
//!
//! Layout under the output directory:
//! - `stacks/<name>/cdk.tf.json`
//! - `manifest.json`
//!
//! Every document is serialized in memory before the first file is
//! written, so a serialization failure leaves the directory untouched.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tfsynth_manifest::{document_sha256, ManifestError, StackEntry, SynthManifest, MANIFEST_FILE_NAME, STACK_FILE_NAME};
use tracing::info;

use super::SynthesizedApp;

/// Errors writing synthesized output
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Path of a stack's document relative to the output directory
pub fn stack_relative_path(stack: &str) -> PathBuf {
    Path::new("stacks").join(stack).join(STACK_FILE_NAME)
}

/// Write every stack plus `manifest.json`, returning the manifest
pub fn write_app(out_dir: &Path, app: &SynthesizedApp, pretty: bool) -> OutputResult<SynthManifest> {
    let mut files = Vec::with_capacity(app.stacks.len());
    let mut entries = Vec::with_capacity(app.stacks.len());

    for doc in &app.stacks {
        let relative = stack_relative_path(&doc.stack);
        files.push((relative.clone(), doc.to_json(pretty)?));
        entries.push(StackEntry {
            name: doc.stack.clone(),
            path: relative.to_string_lossy().replace('\\', "/"),
            sha256: document_sha256(&doc.document)?,
            emission_order: doc.emission_order.clone(),
        });
    }

    let manifest = SynthManifest::new(env!("CARGO_PKG_VERSION"), entries);
    let manifest_json = manifest.to_json()?;

    for (relative, json) in files {
        let path = out_dir.join(&relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, json)?;
        info!(path = %path.display(), "wrote stack document");
    }

    fs::create_dir_all(out_dir)?;
    let manifest_path = out_dir.join(MANIFEST_FILE_NAME);
    fs::write(&manifest_path, manifest_json)?;
    info!(path = %manifest_path.display(), stacks = manifest.stacks.len(), "wrote manifest");

    Ok(manifest)
}
