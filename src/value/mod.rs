//! Property values
//!
//! Declarations hold `Value`s rather than raw JSON so that references to
//! other nodes can stay pending until the synthesis pass resolves them.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde_json::Number;
use tfsynth_naming::KeyCase;

use crate::error::SynthError;
use crate::tree::NodeId;

/// Property map of a declaration
pub type Properties = BTreeMap<String, Value>;

/// A property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<Value>),
    /// Schema block: keys follow the declaration naming convention and are
    /// case-transformed on output. Entries keep insertion order.
    Block(IndexMap<String, Value>),
    /// User data map: keys are emitted verbatim
    Map(IndexMap<String, Value>),
    /// Pending reference to another node's attribute
    Reference(Reference),
    /// Raw expression, emitted as `${...}`
    Expression(String),
    /// String interpolation of literals, expressions and references
    Concat(Vec<Value>),
}

/// Deferred read of `target`'s attribute.
///
/// Produced by [`crate::tree::Tree::attr`]; resolved into an expression
/// string once every node has its emitted identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub target: NodeId,
    pub attribute: Vec<String>,
}

impl Reference {
    /// Create a reference from a dot-separated attribute path
    pub fn new(target: NodeId, attribute: &str) -> Self {
        let attribute = attribute
            .split('.')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self { target, attribute }
    }
}

impl Value {
    /// Build a schema block from key/value pairs
    pub fn block<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Block(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build a verbatim-key map from key/value pairs
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Raw expression such as `each.value`
    pub fn expr(expression: impl Into<String>) -> Self {
        Value::Expression(expression.into())
    }

    /// All references contained in this value, in traversal order
    pub fn references(&self) -> Vec<&Reference> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a Reference>) {
        match self {
            Value::Reference(r) => out.push(r),
            Value::List(items) | Value::Concat(items) => {
                for item in items {
                    item.collect_references(out);
                }
            }
            Value::Block(map) | Value::Map(map) => {
                for v in map.values() {
                    v.collect_references(out);
                }
            }
            _ => {}
        }
    }

    /// Render into JSON.
    ///
    /// `resolve` turns a reference into its emitted string form
    /// (`${type.id.attr}` for most targets).
    pub fn render<F>(&self, key_case: KeyCase, resolve: &mut F) -> Result<serde_json::Value, SynthError>
    where
        F: FnMut(&Reference) -> Result<String, SynthError>,
    {
        use serde_json::Value as Json;

        Ok(match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => Json::Number(n.clone()),
            Value::String(s) => Json::String(s.clone()),
            Value::List(items) => Json::Array(
                items
                    .iter()
                    .map(|v| v.render(key_case, resolve))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Block(map) => {
                let mut out = serde_json::Map::new();
                for (k, v) in map {
                    out.insert(key_case.apply(k), v.render(key_case, resolve)?);
                }
                Json::Object(out)
            }
            Value::Map(map) => {
                let mut out = serde_json::Map::new();
                for (k, v) in map {
                    out.insert(k.clone(), v.render(key_case, resolve)?);
                }
                Json::Object(out)
            }
            Value::Reference(r) => Json::String(resolve(r)?),
            Value::Expression(e) => Json::String(format!("${{{}}}", e)),
            Value::Concat(parts) => {
                let mut out = String::new();
                for part in parts {
                    part.render_fragment(key_case, resolve, &mut out)?;
                }
                Json::String(out)
            }
        })
    }

    fn render_fragment<F>(&self, key_case: KeyCase, resolve: &mut F, out: &mut String) -> Result<(), SynthError>
    where
        F: FnMut(&Reference) -> Result<String, SynthError>,
    {
        match self {
            Value::String(s) => out.push_str(&s.replace("${", "$${")),
            Value::Concat(parts) => {
                for part in parts {
                    part.render_fragment(key_case, resolve, out)?;
                }
            }
            Value::Null => {}
            other => match other.render(key_case, resolve)? {
                serde_json::Value::String(s) => out.push_str(&s),
                json => out.push_str(&json.to_string()),
            },
        }
        Ok(())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n.into())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

impl From<Reference> for Value {
    fn from(r: Reference) -> Self {
        Value::Reference(r)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// Plain JSON converts with objects treated as schema blocks.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Block(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn no_refs(_: &Reference) -> Result<String, SynthError> {
        panic!("unexpected reference")
    }

    #[test]
    fn test_block_keys_are_transformed() {
        let v = Value::block([("displayName", "x")]);
        let out = v.render(KeyCase::Snake, &mut no_refs).unwrap();
        assert_eq!(out, json!({"display_name": "x"}));
    }

    #[test]
    fn test_map_keys_are_verbatim() {
        let v = Value::block([("tags", Value::map([("CostCenter", "42")]))]);
        let out = v.render(KeyCase::Snake, &mut no_refs).unwrap();
        assert_eq!(out, json!({"tags": {"CostCenter": "42"}}));
    }

    #[test]
    fn test_reference_uses_resolver() {
        let v = Value::Reference(Reference::new(NodeId(3), "metadata.name"));
        let mut resolve = |r: &Reference| -> Result<String, SynthError> {
            Ok(format!("${{ns.{}}}", r.attribute.join(".")))
        };
        let out = v.render(KeyCase::Snake, &mut resolve).unwrap();
        assert_eq!(out, json!("${ns.metadata.name}"));
    }

    #[test]
    fn test_concat_escapes_literals() {
        let v = Value::Concat(vec![
            Value::from("literal ${x}-"),
            Value::expr("var.env"),
            Value::from(7),
        ]);
        let out = v.render(KeyCase::Snake, &mut no_refs).unwrap();
        assert_eq!(out, json!("literal $${x}-${var.env}7"));
    }

    #[test]
    fn test_references_are_collected_from_nested_values() {
        let v = Value::block([
            ("a", Value::Reference(Reference::new(NodeId(1), "id"))),
            (
                "b",
                Value::List(vec![Value::Concat(vec![Value::Reference(Reference::new(
                    NodeId(2),
                    "arn",
                ))])]),
            ),
        ]);
        let targets: Vec<NodeId> = v.references().iter().map(|r| r.target).collect();
        assert_eq!(targets, vec![NodeId(1), NodeId(2)]);
        assert!(Value::from("plain").references().is_empty());
    }

    #[test]
    fn test_entries_keep_insertion_order() {
        let v = Value::map([("to_port", Value::from(80)), ("protocol", Value::from("tcp")), ("from_port", Value::from(80))]);
        let out = v.render(KeyCase::Snake, &mut no_refs).unwrap();
        let keys: Vec<&str> = out.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["to_port", "protocol", "from_port"]);

        let v = Value::block([("zoneId", 1), ("accountId", 2)]);
        let out = v.render(KeyCase::Snake, &mut no_refs).unwrap();
        let keys: Vec<&str> = out.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zone_id", "account_id"]);
    }

    #[test]
    fn test_from_json_objects_become_blocks() {
        let v = Value::from(json!({"forEach": [22, 80], "enabled": true}));
        assert!(matches!(v, Value::Block(_)));
        let out = v.render(KeyCase::Snake, &mut no_refs).unwrap();
        assert_eq!(out, json!({"enabled": true, "for_each": [22, 80]}));
    }
}
