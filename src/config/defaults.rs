//! Built-in defaults (layer 1)

use serde::{Deserialize, Serialize};
use tfsynth_naming::KeyCase;

use crate::overrides::{GeneratorShape, DYNAMIC_KEYWORD};
use crate::synth::Linkage;

/// Built-in configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Output directory (default: "tfsynth.out")
    pub output_dir: String,

    /// Dependency linkage mode (default: ordering)
    pub linkage: Linkage,

    /// Key case of schema blocks (default: snake)
    pub key_case: KeyCase,

    /// Emit the "//" metadata block (default: true)
    pub metadata: bool,

    /// Pretty-print documents (default: true)
    pub pretty: bool,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            output_dir: "tfsynth.out".to_string(),
            linkage: Linkage::Ordering,
            key_case: KeyCase::Snake,
            metadata: true,
            pretty: true,
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON for merging
    pub fn to_value(&self) -> serde_json::Value {
        let dynamic = GeneratorShape::default();
        serde_json::json!({
            "output_dir": self.output_dir,
            "linkage": self.linkage.as_str(),
            "key_case": self.key_case.as_str(),
            "metadata": self.metadata,
            "pretty": self.pretty,
            "special_blocks": {
                (DYNAMIC_KEYWORD): {
                    "source_key": dynamic.source_key,
                    "template_key": dynamic.template_key,
                    "iterator_key": dynamic.iterator_key,
                }
            }
        })
    }
}
