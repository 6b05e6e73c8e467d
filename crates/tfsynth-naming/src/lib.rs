//! Naming conventions for synthesized configuration.
//!
//! Declarations use camelCase property names and free-form construct ids;
//! the emitted document uses snake_case keys and Terraform-safe identifiers.
//! This crate owns both transforms.

mod case;
mod logical_id;

pub use case::{snake_case, KeyCase};
pub use logical_id::{allocate_logical_id, is_valid_identifier, sanitize_component, HASH_LEN};

/// Errors produced while deriving identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NamingError {
    #[error("cannot allocate a logical id from an empty path")]
    EmptyPath,
}
