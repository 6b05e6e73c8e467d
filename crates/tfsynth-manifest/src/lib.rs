//! tfsynth manifest types
//!
//! Defines the stable error-code registry reported by the CLI and the
//! `manifest.json` written next to synthesized stacks.

pub mod error;
pub mod manifest;

pub use error::{ErrorCode, ErrorReport};
pub use manifest::{document_sha256, ManifestError, StackEntry, SynthManifest};

/// Schema version for manifest.json
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier for manifest.json
pub const SCHEMA_ID: &str = "tfsynth/manifest@1";

/// File name of each synthesized stack document
pub const STACK_FILE_NAME: &str = "cdk.tf.json";

/// File name of the manifest at the output root
pub const MANIFEST_FILE_NAME: &str = "manifest.json";
