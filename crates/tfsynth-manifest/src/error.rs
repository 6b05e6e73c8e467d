//! Error code registry.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes reported when a synthesis pass fails.
///
/// These codes are stable and used for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Two siblings share a type and local id, or two elements emit the same id.
    DuplicateIdentifier,
    /// A reference points at a node or attribute that does not exist.
    InvalidPropertyReference,
    /// An override path traverses a missing or non-container location.
    InvalidOverridePath,
    /// An override index is more than one past the end of a sequence.
    IndexOutOfRange,
    /// The dependency graph contains a cycle.
    DependencyCycle,
    /// An element was declared outside of any stack.
    InvalidScope,
    /// A generator override is missing its iteration source or template.
    InvalidGeneratorBlock,
    /// A stack name or logical id is not a valid identifier.
    InvalidIdentifier,
    /// A node id does not belong to the tree.
    UnknownNode,
    /// Configuration could not be loaded or failed validation.
    ConfigInvalid,
    /// The declaration file could not be read or parsed.
    AppFileInvalid,
    /// Writing synthesized output failed.
    OutputFailed,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateIdentifier => write!(f, "DUPLICATE_IDENTIFIER"),
            Self::InvalidPropertyReference => write!(f, "INVALID_PROPERTY_REFERENCE"),
            Self::InvalidOverridePath => write!(f, "INVALID_OVERRIDE_PATH"),
            Self::IndexOutOfRange => write!(f, "INDEX_OUT_OF_RANGE"),
            Self::DependencyCycle => write!(f, "DEPENDENCY_CYCLE"),
            Self::InvalidScope => write!(f, "INVALID_SCOPE"),
            Self::InvalidGeneratorBlock => write!(f, "INVALID_GENERATOR_BLOCK"),
            Self::InvalidIdentifier => write!(f, "INVALID_IDENTIFIER"),
            Self::UnknownNode => write!(f, "UNKNOWN_NODE"),
            Self::ConfigInvalid => write!(f, "CONFIG_INVALID"),
            Self::AppFileInvalid => write!(f, "APP_FILE_INVALID"),
            Self::OutputFailed => write!(f, "OUTPUT_FAILED"),
        }
    }
}

/// Machine-readable error report printed by `--json` mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Error code from the registry.
    pub code: ErrorCode,
    /// Human-readable, single-line error message.
    pub message: String,
    /// Optional details (identifier, path, cycle).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ErrorReport {
    /// Create a new report.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create a new report with additional data.
    pub fn with_data(code: ErrorCode, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}
