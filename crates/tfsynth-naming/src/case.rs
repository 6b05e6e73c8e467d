//! Key case transforms.

use serde::{Deserialize, Serialize};

/// Naming convention applied to schema block keys on output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyCase {
    /// camelCase -> snake_case
    #[default]
    Snake,
    /// Keys are emitted exactly as declared
    Preserve,
}

impl KeyCase {
    /// Transform a single key.
    pub fn apply(&self, key: &str) -> String {
        match self {
            KeyCase::Snake => snake_case(key),
            KeyCase::Preserve => key.to_string(),
        }
    }

    /// Returns the string representation used in config files
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyCase::Snake => "snake",
            KeyCase::Preserve => "preserve",
        }
    }
}

/// Convert a camelCase (or PascalCase) name to snake_case.
///
/// Acronym runs stay together: `HTTPServer` becomes `http_server`,
/// `userID` becomes `user_id`. Hyphens and spaces become underscores.
/// Names that are already snake_case are returned unchanged.
pub fn snake_case(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c == '-' || c == ' ' {
            out.push('_');
            continue;
        }

        if c.is_uppercase() {
            if i > 0 && !out.ends_with('_') {
                let prev = chars[i - 1];
                let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
                let boundary = prev.is_lowercase()
                    || prev.is_ascii_digit()
                    || (prev.is_uppercase() && next_is_lower);
                if boundary {
                    out.push('_');
                }
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_to_snake() {
        assert_eq!(snake_case("displayName"), "display_name");
        assert_eq!(snake_case("forEach"), "for_each");
        assert_eq!(snake_case("metadata"), "metadata");
    }

    #[test]
    fn test_acronyms() {
        assert_eq!(snake_case("HTTPServer"), "http_server");
        assert_eq!(snake_case("userID"), "user_id");
        assert_eq!(snake_case("ID"), "id");
    }

    #[test]
    fn test_digits_and_separators() {
        assert_eq!(snake_case("ipv4Address"), "ipv4_address");
        assert_eq!(snake_case("max-size"), "max_size");
    }

    #[test]
    fn test_already_snake_is_stable() {
        assert_eq!(snake_case("display_name"), "display_name");
        assert_eq!(snake_case(&snake_case("someLongName")), "some_long_name");
    }

    #[test]
    fn test_preserve() {
        assert_eq!(KeyCase::Preserve.apply("displayName"), "displayName");
        assert_eq!(KeyCase::Snake.apply("displayName"), "display_name");
    }
}
