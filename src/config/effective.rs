//! Effective configuration with provenance
//!
//! The merged configuration plus the list of sources that contributed to
//! it, with a digest of each file so a synthesis run can be traced back
//! to the exact config it used.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use tfsynth_naming::{is_valid_identifier, KeyCase};

use super::defaults::BuiltinDefaults;
use super::merge::merge_layers;
use crate::overrides::{GeneratorShape, SpecialBlockTable};
use crate::synth::{Linkage, SynthOptions};

/// Schema version for effective config
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "tfsynth/effective_config@1";

/// Repo config file name
pub const REPO_CONFIG_FILE: &str = "tfsynth.toml";

/// Origin of a configuration source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    Repo,
    Cli,
}

/// A contributing config source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 of the raw file bytes (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Merged configuration with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub schema_version: u32,
    pub schema_id: String,
    pub created_at: DateTime<Utc>,

    /// The merged configuration object
    pub config: Value,

    /// Contributing sources in precedence order
    pub sources: Vec<ConfigSource>,
}

impl EffectiveConfig {
    /// Build from layers. A missing repo file is skipped.
    pub fn build(repo_config_path: Option<&Path>, cli_overrides: Option<Value>) -> Result<Self, ConfigError> {
        let mut layers = vec![BuiltinDefaults::default().to_value()];
        let mut sources = vec![ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        }];

        if let Some(path) = repo_config_path {
            if path.exists() {
                let (value, digest) = Self::load_toml_file(path)?;
                layers.push(value);
                sources.push(ConfigSource {
                    origin: ConfigOrigin::Repo,
                    path: Some(path.to_string_lossy().to_string()),
                    digest: Some(digest),
                });
            }
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let merged = merge_layers(layers);
        Self::validate_config(&merged)?;

        Ok(Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            config: merged,
            sources,
        })
    }

    /// Load and parse a TOML file, returning the value and digest
    fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
        let bytes = fs::read(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        let contents =
            String::from_utf8(bytes).map_err(|e| ConfigError::ParseError(format!("Invalid UTF-8: {}", e)))?;
        let toml_value: toml::Value = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("TOML parse error in {}: {}", path.display(), e)))?;

        Ok((toml_to_json(toml_value), digest))
    }

    fn validate_config(config: &Value) -> Result<(), ConfigError> {
        match config.get("output_dir") {
            Some(Value::String(dir)) if !dir.trim().is_empty() => {}
            _ => {
                return Err(ConfigError::ValidationError(
                    "output_dir must be a non-empty string".to_string(),
                ))
            }
        }

        if let Some(linkage) = config.get("linkage") {
            if linkage.as_str().and_then(Linkage::parse).is_none() {
                return Err(ConfigError::ValidationError(format!(
                    "linkage must be \"ordering\" or \"explicit\", got {}",
                    linkage
                )));
            }
        }

        if let Some(key_case) = config.get("key_case") {
            if serde_json::from_value::<KeyCase>(key_case.clone()).is_err() {
                return Err(ConfigError::ValidationError(format!(
                    "key_case must be \"snake\" or \"preserve\", got {}",
                    key_case
                )));
            }
        }

        for key in ["metadata", "pretty"] {
            if let Some(value) = config.get(key) {
                if !value.is_boolean() {
                    return Err(ConfigError::ValidationError(format!("{} must be a boolean", key)));
                }
            }
        }

        special_blocks(config)?;
        Ok(())
    }

    /// Synthesis options described by this config
    pub fn to_options(&self) -> Result<SynthOptions, ConfigError> {
        let linkage = self.get_str("linkage").and_then(Linkage::parse).unwrap_or_default();
        let key_case = self
            .get("key_case")
            .and_then(|v| serde_json::from_value::<KeyCase>(v.clone()).ok())
            .unwrap_or_default();

        Ok(SynthOptions {
            key_case,
            linkage,
            metadata: self.get_bool("metadata").unwrap_or(true),
            special_blocks: special_blocks(&self.config)?,
        })
    }

    /// Output directory
    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(self.get_str("output_dir").unwrap_or("tfsynth.out"))
    }

    /// Whether documents are pretty-printed
    pub fn pretty(&self) -> bool {
        self.get_bool("pretty").unwrap_or(true)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Get a config value by dot-separated path
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = &self.config;
        for part in path.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    /// Get a config value as string
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|v| v.as_str())
    }

    /// Get a config value as bool
    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path).and_then(|v| v.as_bool())
    }
}

/// Build the special block table. An entry set to `false` disables
/// that keyword.
fn special_blocks(config: &Value) -> Result<SpecialBlockTable, ConfigError> {
    let mut table = SpecialBlockTable::empty();
    let Some(entries) = config.get("special_blocks") else {
        return Ok(table);
    };
    let Value::Object(entries) = entries else {
        return Err(ConfigError::ValidationError("special_blocks must be a table".to_string()));
    };

    for (keyword, entry) in entries {
        if entry == &Value::Bool(false) {
            continue;
        }
        if !is_valid_identifier(keyword) {
            return Err(ConfigError::ValidationError(format!(
                "special_blocks keyword '{}' is not an identifier",
                keyword
            )));
        }
        let shape: GeneratorShape = serde_json::from_value(entry.clone())
            .map_err(|e| ConfigError::ValidationError(format!("special_blocks.{}: {}", keyword, e)))?;
        if shape.source_key.is_empty() || shape.template_key.is_empty() || shape.iterator_key.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "special_blocks.{}: keys must not be empty",
                keyword
            )));
        }
        table.insert(keyword.clone(), shape);
    }
    Ok(table)
}

/// Convert a TOML value to JSON
pub(crate) fn toml_to_json(toml: toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(table.into_iter().map(|(k, v)| (k, toml_to_json(v))).collect()),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
