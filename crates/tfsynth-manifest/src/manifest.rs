//! Synthesis manifest (manifest.json)
//!
//! Lists every stack written by a synthesis run together with the
//! JCS-based SHA-256 of its document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{SCHEMA_ID, SCHEMA_VERSION};

/// A synthesized stack entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StackEntry {
    /// Stack name
    pub name: String,

    /// Document path relative to the output directory
    pub path: String,

    /// SHA-256 of JCS(document)
    pub sha256: String,

    /// Element addresses in emission order
    pub emission_order: Vec<String>,
}

/// Synthesis manifest (manifest.json)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthManifest {
    /// Schema version
    pub schema_version: u32,

    /// Schema identifier
    pub schema_id: String,

    /// When the manifest was created
    pub created_at: DateTime<Utc>,

    /// Tool version that produced the output
    pub tool_version: String,

    /// Stacks sorted by name
    pub stacks: Vec<StackEntry>,
}

/// Errors for manifest operations
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("JCS canonicalization error: {0}")]
    JcsError(String),
}

/// Compute the SHA-256 of a document using JCS canonical form.
///
/// Key order in the emitted file does not affect the digest.
pub fn document_sha256(document: &serde_json::Value) -> Result<String, ManifestError> {
    let jcs_bytes = serde_json_canonicalizer::to_vec(document)
        .map_err(|e| ManifestError::JcsError(e.to_string()))?;

    let mut hasher = Sha256::new();
    hasher.update(&jcs_bytes);
    Ok(hex::encode(hasher.finalize()))
}

impl SynthManifest {
    /// Create a manifest for the given stacks.
    pub fn new(tool_version: impl Into<String>, mut stacks: Vec<StackEntry>) -> Self {
        stacks.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            tool_version: tool_version.into(),
            stacks,
        }
    }

    /// Look up a stack entry by name
    pub fn stack(&self, name: &str) -> Option<&StackEntry> {
        self.stacks.iter().find(|s| s.name == name)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, ManifestError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(name: &str) -> StackEntry {
        StackEntry {
            name: name.to_string(),
            path: format!("stacks/{}/cdk.tf.json", name),
            sha256: "00".repeat(32),
            emission_order: vec![],
        }
    }

    #[test]
    fn test_digest_ignores_key_order() {
        let a = json!({"resource": {"x": 1}, "output": {"y": 2}});
        let b = json!({"output": {"y": 2}, "resource": {"x": 1}});
        assert_eq!(document_sha256(&a).unwrap(), document_sha256(&b).unwrap());
    }

    #[test]
    fn test_digest_changes_with_content() {
        let a = json!({"resource": {"x": 1}});
        let b = json!({"resource": {"x": 2}});
        assert_ne!(document_sha256(&a).unwrap(), document_sha256(&b).unwrap());
        assert_eq!(document_sha256(&a).unwrap().len(), 64);
    }

    #[test]
    fn test_manifest_sorts_stacks() {
        let manifest = SynthManifest::new("0.1.0", vec![entry("prod"), entry("dev")]);
        assert_eq!(manifest.schema_version, SCHEMA_VERSION);
        assert_eq!(manifest.stacks[0].name, "dev");
        assert!(manifest.stack("prod").is_some());
        assert!(manifest.stack("staging").is_none());
    }

    #[test]
    fn test_manifest_json_fields() {
        let manifest = SynthManifest::new("0.1.0", vec![entry("dev")]);
        let value: serde_json::Value = serde_json::from_str(&manifest.to_json().unwrap()).unwrap();
        assert_eq!(value["schema_id"], SCHEMA_ID);
        assert!(value["created_at"].is_string());
        assert_eq!(value["stacks"][0]["path"], "stacks/dev/cdk.tf.json");
    }
}
