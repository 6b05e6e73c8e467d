//! Layered configuration
//!
//! Layers, lowest precedence first:
//! 1. Built-in defaults
//! 2. Repo config (`tfsynth.toml`)
//! 3. CLI flags

mod defaults;
mod effective;
mod merge;

pub use defaults::BuiltinDefaults;
pub use effective::{ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig, REPO_CONFIG_FILE};
pub use merge::{deep_merge, merge_layers};

pub(crate) use effective::toml_to_json;
