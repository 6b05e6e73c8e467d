//! Synthesis error taxonomy
//!
//! Every failure aborts the synthesis pass; nothing is retried and no
//! partial document is produced.

use tfsynth_manifest::{ErrorCode, ErrorReport};

/// Errors raised while building, overriding or serializing a tree
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SynthError {
    #[error("Duplicate identifier '{id}' for {type_name} under {scope}")]
    DuplicateIdentifier {
        scope: String,
        type_name: String,
        id: String,
    },

    #[error("Invalid property reference from {from} to {target}: {reason}")]
    InvalidPropertyReference {
        from: String,
        target: String,
        reason: String,
    },

    #[error("Invalid override path '{path}' on {node}: {reason}")]
    InvalidOverridePath {
        node: String,
        path: String,
        reason: String,
    },

    #[error("Index {index} out of range at '{path}' on {node} (length {len})")]
    IndexOutOfRange {
        node: String,
        path: String,
        index: usize,
        len: usize,
    },

    #[error("Dependency cycle: {}", .cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    #[error("Element {id} is not inside a stack")]
    InvalidScope { id: String },

    #[error("Invalid generator block '{block}' on {node}: {reason}")]
    InvalidGeneratorBlock {
        node: String,
        block: String,
        reason: String,
    },

    #[error("Invalid identifier '{id}': {reason}")]
    InvalidIdentifier { id: String, reason: String },

    #[error("Unknown node {0}")]
    UnknownNode(String),
}

impl SynthError {
    /// Returns the registry code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            SynthError::DuplicateIdentifier { .. } => ErrorCode::DuplicateIdentifier,
            SynthError::InvalidPropertyReference { .. } => ErrorCode::InvalidPropertyReference,
            SynthError::InvalidOverridePath { .. } => ErrorCode::InvalidOverridePath,
            SynthError::IndexOutOfRange { .. } => ErrorCode::IndexOutOfRange,
            SynthError::DependencyCycle { .. } => ErrorCode::DependencyCycle,
            SynthError::InvalidScope { .. } => ErrorCode::InvalidScope,
            SynthError::InvalidGeneratorBlock { .. } => ErrorCode::InvalidGeneratorBlock,
            SynthError::InvalidIdentifier { .. } => ErrorCode::InvalidIdentifier,
            SynthError::UnknownNode(_) => ErrorCode::UnknownNode,
        }
    }

    /// Convert to a machine-readable report
    pub fn to_report(&self) -> ErrorReport {
        let data = match self {
            SynthError::DuplicateIdentifier {
                scope,
                type_name,
                id,
            } => serde_json::json!({ "scope": scope, "type": type_name, "id": id }),
            SynthError::InvalidPropertyReference { from, target, .. } => {
                serde_json::json!({ "from": from, "target": target })
            }
            SynthError::InvalidOverridePath { node, path, .. } => {
                serde_json::json!({ "node": node, "path": path })
            }
            SynthError::IndexOutOfRange {
                node,
                path,
                index,
                len,
            } => serde_json::json!({ "node": node, "path": path, "index": index, "len": len }),
            SynthError::DependencyCycle { cycle } => serde_json::json!({ "cycle": cycle }),
            SynthError::InvalidScope { id } => serde_json::json!({ "id": id }),
            SynthError::InvalidGeneratorBlock { node, block, .. } => {
                serde_json::json!({ "node": node, "block": block })
            }
            SynthError::InvalidIdentifier { id, .. } => serde_json::json!({ "id": id }),
            SynthError::UnknownNode(node) => serde_json::json!({ "node": node }),
        };

        ErrorReport::with_data(self.code(), self.to_string(), data)
    }
}
