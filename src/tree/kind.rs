//! Element kinds and their output conventions.

use serde::{Deserialize, Serialize};

/// What a declared element is; decides its output category and how
/// references to it are spelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Resource,
    Data,
    Provider,
    Variable,
    Local,
    Output,
}

/// Order of categories in a synthesized document
pub const CATEGORY_ORDER: &[ElementKind] = &[
    ElementKind::Provider,
    ElementKind::Variable,
    ElementKind::Local,
    ElementKind::Data,
    ElementKind::Resource,
    ElementKind::Output,
];

impl ElementKind {
    /// Returns the string representation used in declaration files
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Resource => "resource",
            ElementKind::Data => "data",
            ElementKind::Provider => "provider",
            ElementKind::Variable => "variable",
            ElementKind::Local => "local",
            ElementKind::Output => "output",
        }
    }

    /// Top-level key of the output document
    pub fn category(&self) -> &'static str {
        match self {
            ElementKind::Local => "locals",
            other => other.as_str(),
        }
    }

    /// Whether the element is keyed by a user-chosen type name.
    ///
    /// Variables, locals and outputs use their kind as the type.
    pub fn is_typed(&self) -> bool {
        matches!(
            self,
            ElementKind::Resource | ElementKind::Data | ElementKind::Provider
        )
    }

    /// Whether other elements may read this element's attributes
    pub fn is_referenceable(&self) -> bool {
        !matches!(self, ElementKind::Output)
    }

    /// Variables and locals have no declared attribute schema, so any
    /// attribute path is accepted when referencing them.
    pub fn has_open_attributes(&self) -> bool {
        matches!(self, ElementKind::Variable | ElementKind::Local)
    }

    /// Attributes every element of this kind exposes without declaring them
    pub fn implicit_attributes(&self) -> &'static [&'static str] {
        match self {
            ElementKind::Resource | ElementKind::Data => &["id"],
            _ => &[],
        }
    }

    /// Whether the element may be listed in a `depends_on`
    pub fn can_be_depended_on(&self) -> bool {
        matches!(self, ElementKind::Resource | ElementKind::Data)
    }

    /// Whether the element may carry a `depends_on` of its own
    pub fn accepts_depends_on(&self) -> bool {
        matches!(
            self,
            ElementKind::Resource | ElementKind::Data | ElementKind::Output
        )
    }

    /// Human-readable address, also used inside `depends_on`
    pub fn address(&self, type_name: &str, logical_id: &str) -> String {
        match self {
            ElementKind::Resource => format!("{}.{}", type_name, logical_id),
            ElementKind::Data => format!("data.{}.{}", type_name, logical_id),
            ElementKind::Provider => format!("provider.{}.{}", type_name, logical_id),
            ElementKind::Variable => format!("var.{}", logical_id),
            ElementKind::Local => format!("local.{}", logical_id),
            ElementKind::Output => format!("output.{}", logical_id),
        }
    }

    /// Emitted form of a reference to `attribute` of this element.
    ///
    /// Providers are referenced by bare `type.alias`, everything else is
    /// an interpolation.
    pub fn reference_expression(&self, type_name: &str, logical_id: &str, attribute: &[String]) -> String {
        let base = match self {
            ElementKind::Provider if logical_id == type_name => return type_name.to_string(),
            ElementKind::Provider => return format!("{}.{}", type_name, logical_id),
            ElementKind::Resource | ElementKind::Output => format!("{}.{}", type_name, logical_id),
            ElementKind::Data => format!("data.{}.{}", type_name, logical_id),
            ElementKind::Variable => format!("var.{}", logical_id),
            ElementKind::Local => format!("local.{}", logical_id),
        };

        if attribute.is_empty() {
            format!("${{{}}}", base)
        } else {
            format!("${{{}.{}}}", base, attribute.join("."))
        }
    }
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
