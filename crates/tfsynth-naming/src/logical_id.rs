//! Logical identifier allocation.
//!
//! Elements declared directly in a stack keep their id. Elements inside
//! nested scopes get the scope path joined with `_` plus a short digest of
//! the full path, so two scopes that sanitize to the same text still emit
//! distinct identifiers.

use sha2::{Digest, Sha256};
use std::sync::OnceLock;

use regex_lite::Regex;

use crate::NamingError;

/// Number of hex digits of the path digest appended to nested ids
pub const HASH_LEN: usize = 8;

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("identifier pattern is valid")
    })
}

/// Check that `id` is usable as an emitted identifier.
pub fn is_valid_identifier(id: &str) -> bool {
    identifier_pattern().is_match(id)
}

/// Replace characters that are not allowed in identifiers.
pub fn sanitize_component(component: &str) -> String {
    let mut out: String = component
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
        out.insert(0, '_');
    }
    out
}

/// Allocate the emitted identifier for a scope path.
///
/// `components` is the path from the enclosing stack (exclusive) down to
/// the element (inclusive).
pub fn allocate_logical_id(components: &[&str]) -> Result<String, NamingError> {
    match components {
        [] => Err(NamingError::EmptyPath),
        [single] => Ok(sanitize_component(single)),
        _ => {
            let mut human: Vec<String> = Vec::with_capacity(components.len());
            for component in components {
                let sanitized = sanitize_component(component);
                // "web/web/sg" reads better as "web_sg"
                if human.last() != Some(&sanitized) {
                    human.push(sanitized);
                }
            }

            let mut hasher = Sha256::new();
            hasher.update(components.join("/").as_bytes());
            let digest = hex::encode_upper(hasher.finalize());

            Ok(format!("{}_{}", human.join("_"), &digest[..HASH_LEN]))
        }
    }
}
