//! Declaration files
//!
//! A JSON or TOML file listing stacks and their elements, used by the CLI
//! to build a [`Tree`]. Property values use a few escapes:
//! - `{"$ref": "aws_vpc.main.id"}` reads another element's attribute
//! - `{"$expr": "each.value"}` is a raw expression
//! - `{"$map": {...}}` keeps its keys verbatim
//! - `{"$concat": ["arn:", {"$ref": "..."}]}` interpolates
//!
//! Every element is reserved before any is defined, so references may
//! point forward in the file.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::debug;

use crate::config::toml_to_json;
use crate::error::SynthError;
use crate::overrides::OverrideAction;
use crate::tree::{ElementKind, NodeId, Tree};
use crate::value::{Properties, Reference, Value};

/// Errors loading a declaration file
#[derive(Debug, thiserror::Error)]
pub enum AppFileError {
    #[error("IO error reading {path}: {source}")]
    Io { path: String, source: io::Error },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid declaration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Synth(#[from] SynthError),
}

/// Top-level declaration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppFile {
    #[serde(default)]
    pub stacks: Vec<StackDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackDecl {
    pub name: String,
    #[serde(default)]
    pub elements: Vec<ElementDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementDecl {
    pub kind: ElementKind,

    /// Required for resources, data sources and providers
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,

    pub id: String,

    /// Slash-separated scope path below the stack
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    #[serde(default)]
    pub properties: serde_json::Map<String, Json>,

    /// Value of a local or output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Json>,

    #[serde(default)]
    pub computed: Vec<String>,

    /// Addresses of explicit dependencies
    #[serde(default)]
    pub depends_on: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_id: Option<String>,

    #[serde(default)]
    pub overrides: Vec<OverrideDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideDecl {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Json>,
    #[serde(default)]
    pub remove: bool,
}

/// Declared element lookup for one stack
#[derive(Debug, Default)]
struct AddressBook {
    /// (scope path, address) -> node
    entries: BTreeMap<(String, String), NodeId>,
}

impl AddressBook {
    fn insert(&mut self, scope: &str, address: String, node: NodeId) {
        self.entries.insert((scope.to_string(), address), node);
    }

    /// Find `address`, optionally qualified as `scope/path/address`
    fn lookup(&self, qualified: &str) -> Result<NodeId, String> {
        let (scope, address) = match qualified.rsplit_once('/') {
            Some((scope, address)) => (Some(scope), address),
            None => (None, qualified),
        };

        let matches: Vec<NodeId> = self
            .entries
            .iter()
            .filter(|((s, a), _)| a == address && scope.map(|want| want == s).unwrap_or(true))
            .map(|(_, &n)| n)
            .collect();

        match matches.as_slice() {
            [node] => Ok(*node),
            [] => Err(format!("no element declared at '{}'", qualified)),
            _ => Err(format!(
                "'{}' matches elements in several scopes, qualify it as <scope>/{}",
                qualified, address
            )),
        }
    }
}

/// Split `data.aws_ami.ubuntu.id` into the element address and the
/// attribute path
fn split_reference(text: &str) -> Option<(String, String)> {
    let (scope, rest) = match text.rsplit_once('/') {
        Some((scope, rest)) => (Some(scope), rest),
        None => (None, text),
    };
    let parts: Vec<&str> = rest.split('.').collect();
    let head = match parts.first().copied() {
        Some("data") | Some("provider") => 3,
        Some("var") | Some("local") | Some("output") => 2,
        _ => 2,
    };
    if parts.len() < head || parts[..head].iter().any(|p| p.is_empty()) {
        return None;
    }

    let address = parts[..head].join(".");
    let attribute = parts[head..].join(".");
    let address = match scope {
        Some(scope) => format!("{}/{}", scope, address),
        None => address,
    };
    Some((address, attribute))
}

impl AppFile {
    /// Load from a `.json` or `.toml` file
    pub fn from_path(path: &Path) -> Result<Self, AppFileError> {
        let contents = fs::read_to_string(path).map_err(|source| AppFileError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let is_toml = path.extension().map(|e| e == "toml").unwrap_or(false);
        if is_toml {
            Self::from_toml(&contents)
        } else {
            Self::from_json(&contents)
        }
    }

    pub fn from_json(contents: &str) -> Result<Self, AppFileError> {
        serde_json::from_str(contents).map_err(|e| AppFileError::Parse(e.to_string()))
    }

    pub fn from_toml(contents: &str) -> Result<Self, AppFileError> {
        let value: toml::Value = toml::from_str(contents).map_err(|e| AppFileError::Parse(e.to_string()))?;
        serde_json::from_value(toml_to_json(value)).map_err(|e| AppFileError::Parse(e.to_string()))
    }

    /// Build the declared tree
    pub fn build(&self) -> Result<Tree, AppFileError> {
        let mut tree = Tree::new();
        let root = tree.root();

        for stack_decl in &self.stacks {
            let stack = tree.stack(root, &stack_decl.name)?;
            let mut book = AddressBook::default();
            let mut scopes: BTreeMap<String, NodeId> = BTreeMap::new();
            let mut nodes = Vec::with_capacity(stack_decl.elements.len());

            for decl in &stack_decl.elements {
                let type_name = element_type(decl)?;
                let scope_path = decl.scope.clone().unwrap_or_default();
                let parent = ensure_scope(&mut tree, &mut scopes, stack, &scope_path)?;
                let node = tree.reserve(parent, decl.kind, &type_name, &decl.id)?;
                book.insert(&scope_path, decl.kind.address(&type_name, &decl.id), node);
                nodes.push(node);
            }

            for (decl, &node) in stack_decl.elements.iter().zip(&nodes) {
                let mut properties = Properties::new();
                for (key, json) in &decl.properties {
                    properties.insert(key.clone(), decode_value(json, &book)?);
                }
                if let Some(value) = &decl.value {
                    properties.insert("value".to_string(), decode_value(value, &book)?);
                }
                tree.define(node, properties)?;
                for attribute in &decl.computed {
                    tree.add_computed(node, attribute)?;
                }
            }

            for (decl, &node) in stack_decl.elements.iter().zip(&nodes) {
                for address in &decl.depends_on {
                    let provider = book.lookup(address).map_err(AppFileError::Invalid)?;
                    tree.add_dependency(node, provider)?;
                }
                if let Some(id) = &decl.logical_id {
                    tree.override_logical_id(node, id)?;
                }
                for o in &decl.overrides {
                    let action = match (&o.value, o.remove) {
                        (None, true) => OverrideAction::Remove,
                        (Some(value), false) => OverrideAction::Set(decode_override(value, &book)?),
                        _ => {
                            return Err(AppFileError::Invalid(format!(
                                "override '{}' on {} needs exactly one of value or remove",
                                o.path, decl.id
                            )))
                        }
                    };
                    tree.add_override(node, &o.path, action)?;
                }
            }

            debug!(stack = %stack_decl.name, elements = nodes.len(), "loaded stack declarations");
        }

        Ok(tree)
    }
}

fn element_type(decl: &ElementDecl) -> Result<String, AppFileError> {
    if decl.kind.is_typed() {
        decl.type_name
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppFileError::Invalid(format!("{} '{}' needs a type", decl.kind, decl.id)))
    } else {
        Ok(decl.kind.as_str().to_string())
    }
}

fn ensure_scope(
    tree: &mut Tree,
    scopes: &mut BTreeMap<String, NodeId>,
    stack: NodeId,
    path: &str,
) -> Result<NodeId, AppFileError> {
    let mut parent = stack;
    let mut walked = String::new();
    for part in path.split('/').filter(|p| !p.is_empty()) {
        if !walked.is_empty() {
            walked.push('/');
        }
        walked.push_str(part);

        parent = match scopes.get(&walked) {
            Some(&existing) => existing,
            None => {
                let created = tree.scope(parent, part)?;
                scopes.insert(walked.clone(), created);
                created
            }
        };
    }
    Ok(parent)
}

/// Decode a property value; objects are schema blocks
fn decode_value(json: &Json, book: &AddressBook) -> Result<Value, AppFileError> {
    decode(json, book, false)
}

/// Decode an override value; objects keep their keys verbatim
fn decode_override(json: &Json, book: &AddressBook) -> Result<Value, AppFileError> {
    decode(json, book, true)
}

fn decode(json: &Json, book: &AddressBook, verbatim: bool) -> Result<Value, AppFileError> {
    Ok(match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => Value::Number(n.clone()),
        Json::String(s) => Value::String(s.clone()),
        Json::Array(items) => Value::List(
            items
                .iter()
                .map(|v| decode(v, book, verbatim))
                .collect::<Result<_, _>>()?,
        ),
        Json::Object(map) => {
            if map.len() == 1 {
                if let Some((key, inner)) = map.iter().next() {
                    if let Some(escaped) = decode_escape(key, inner, book, verbatim)? {
                        return Ok(escaped);
                    }
                }
            }
            let entries = map
                .iter()
                .map(|(k, v)| Ok((k.clone(), decode(v, book, verbatim)?)))
                .collect::<Result<IndexMap<_, _>, AppFileError>>()?;
            if verbatim {
                Value::Map(entries)
            } else {
                Value::Block(entries)
            }
        }
    })
}

fn decode_escape(key: &str, inner: &Json, book: &AddressBook, verbatim: bool) -> Result<Option<Value>, AppFileError> {
    match (key, inner) {
        ("$ref", Json::String(text)) => {
            let (address, attribute) = split_reference(text)
                .ok_or_else(|| AppFileError::Invalid(format!("malformed reference '{}'", text)))?;
            let target = book.lookup(&address).map_err(|reason| {
                AppFileError::Synth(SynthError::InvalidPropertyReference {
                    from: "declaration file".to_string(),
                    target: text.clone(),
                    reason,
                })
            })?;
            Ok(Some(Value::Reference(Reference::new(target, &attribute))))
        }
        ("$expr", Json::String(expression)) => Ok(Some(Value::expr(expression.clone()))),
        // Everything below a `$map` keeps its keys
        ("$map", Json::Object(map)) => {
            let entries = map
                .iter()
                .map(|(k, v)| Ok((k.clone(), decode(v, book, true)?)))
                .collect::<Result<IndexMap<_, _>, AppFileError>>()?;
            Ok(Some(Value::Map(entries)))
        }
        ("$concat", Json::Array(parts)) => Ok(Some(Value::Concat(
            parts
                .iter()
                .map(|v| decode(v, book, verbatim))
                .collect::<Result<_, _>>()?,
        ))),
        ("$ref" | "$expr" | "$map" | "$concat", other) => Err(AppFileError::Invalid(format!(
            "'{}' has the wrong shape: {}",
            key, other
        ))),
        _ => Ok(None),
    }
}
