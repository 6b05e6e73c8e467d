//! Special block table
//!
//! Some block names are not literal values in the target format but
//! generator constructs (Terraform's `dynamic`). Which names behave this
//! way, and which sub-keys they carry, is looked up here by keyword.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Default generator keyword
pub const DYNAMIC_KEYWORD: &str = "dynamic";

/// Sub-keys of a generator construct
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorShape {
    /// Key holding the iteration source expression
    pub source_key: String,
    /// Key holding the per-element template
    pub template_key: String,
    /// Key naming the iteration variable bound inside the template
    pub iterator_key: String,
}

impl Default for GeneratorShape {
    fn default() -> Self {
        Self {
            source_key: "for_each".to_string(),
            template_key: "content".to_string(),
            iterator_key: "iterator".to_string(),
        }
    }
}

/// Keyword -> generator shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialBlockTable {
    entries: BTreeMap<String, GeneratorShape>,
}

impl SpecialBlockTable {
    /// An empty table: every path is a literal write
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// The table for Terraform JSON (`dynamic` blocks)
    pub fn terraform() -> Self {
        let mut table = Self::empty();
        table.insert(DYNAMIC_KEYWORD, GeneratorShape::default());
        table
    }

    /// Register or replace a keyword
    pub fn insert(&mut self, keyword: impl Into<String>, shape: GeneratorShape) {
        self.entries.insert(keyword.into(), shape);
    }

    /// Shape registered for `keyword`, if any
    pub fn lookup(&self, keyword: &str) -> Option<&GeneratorShape> {
        self.entries.get(keyword)
    }

    /// Registered keywords, sorted
    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl Default for SpecialBlockTable {
    fn default() -> Self {
        Self::terraform()
    }
}

impl FromIterator<(String, GeneratorShape)> for SpecialBlockTable {
    fn from_iter<I: IntoIterator<Item = (String, GeneratorShape)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
