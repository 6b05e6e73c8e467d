//! Override merger (escape hatch)
//!
//! Overrides are destructive writes into a node's rendered body:
//! - Missing terminal segments are created; missing parents are an error
//! - Existing terminal values are replaced wholesale, never deep-merged
//! - All-digit segments index sequences; one past the end appends
//! - `<keyword>.<block>` paths whose keyword is in the special block table
//!   install a generator construct instead of a literal value

mod path;
mod special;

pub use path::{OverridePath, PathParseError, Segment};
pub use special::{GeneratorShape, SpecialBlockTable, DYNAMIC_KEYWORD};

use serde_json::{Map, Value as Json};
use tfsynth_naming::is_valid_identifier;

use crate::value::Value;

/// What an override does at its path
#[derive(Debug, Clone, PartialEq)]
pub enum OverrideAction {
    /// Replace (or create) the terminal value
    Set(Value),
    /// Delete the terminal value if present
    Remove,
}

/// How an override was dispatched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Literal,
    Generator { keyword: String, block: String },
}

/// Errors applying an override to a rendered body
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OverrideError {
    #[error("'{at}' does not exist")]
    MissingParent { at: String },

    #[error("'{at}' is not a mapping or sequence")]
    NotAContainer { at: String },

    #[error("key '{key}' cannot address the sequence at '{at}'")]
    KeyOnSequence { at: String, key: String },

    #[error("index {index} out of range at '{at}' (length {len})")]
    IndexOutOfRange { at: String, index: usize, len: usize },

    #[error("{reason}")]
    Generator { block: String, reason: String },
}

/// Decide how `path` is applied. Only the special block table is
/// consulted, never the shape of the value.
pub fn dispatch<'t>(path: &OverridePath, table: &'t SpecialBlockTable) -> Option<&'t GeneratorShape> {
    let segments = path.segments();
    if segments.len() < 2 {
        return None;
    }
    match &segments[segments.len() - 2] {
        Segment::Key(keyword) => table.lookup(keyword),
        Segment::Index { .. } => None,
    }
}

/// Apply an override to `body`.
///
/// `value` of `None` removes the terminal.
pub fn apply(
    body: &mut Json,
    path: &OverridePath,
    value: Option<Json>,
    table: &SpecialBlockTable,
) -> Result<Dispatch, OverrideError> {
    match dispatch(path, table) {
        Some(shape) => apply_generator(body, path, value, shape),
        None => {
            let last = path.segments().len() - 1;
            let container = walk(body, path, last)?;
            write_terminal(container, path, value)?;
            Ok(Dispatch::Literal)
        }
    }
}

fn location(path: &OverridePath, n: usize) -> String {
    if n == 0 {
        "<root>".to_string()
    } else {
        path.prefix(n)
    }
}

/// Follow the first `upto` segments, which must all exist.
fn walk<'v>(mut current: &'v mut Json, path: &OverridePath, upto: usize) -> Result<&'v mut Json, OverrideError> {
    for (i, segment) in path.segments()[..upto].iter().enumerate() {
        current = match current {
            Json::Object(map) => map
                .get_mut(segment.as_str())
                .ok_or_else(|| OverrideError::MissingParent { at: path.prefix(i + 1) })?,
            Json::Array(items) => match segment {
                Segment::Index { position, .. } => {
                    let len = items.len();
                    if *position > len {
                        return Err(OverrideError::IndexOutOfRange {
                            at: path.prefix(i + 1),
                            index: *position,
                            len,
                        });
                    }
                    items
                        .get_mut(*position)
                        .ok_or_else(|| OverrideError::MissingParent { at: path.prefix(i + 1) })?
                }
                Segment::Key(key) => {
                    return Err(OverrideError::KeyOnSequence {
                        at: location(path, i),
                        key: key.clone(),
                    })
                }
            },
            _ => {
                return Err(OverrideError::NotAContainer {
                    at: location(path, i),
                })
            }
        };
    }
    Ok(current)
}

fn write_terminal(container: &mut Json, path: &OverridePath, value: Option<Json>) -> Result<(), OverrideError> {
    let last = path.segments().len() - 1;
    let segment = &path.segments()[last];

    match container {
        Json::Object(map) => {
            match value {
                Some(v) => {
                    map.insert(segment.as_str().to_string(), v);
                }
                None => {
                    map.shift_remove(segment.as_str());
                }
            }
            Ok(())
        }
        Json::Array(items) => {
            let position = match segment {
                Segment::Index { position, .. } => *position,
                Segment::Key(key) => {
                    return Err(OverrideError::KeyOnSequence {
                        at: location(path, last),
                        key: key.clone(),
                    })
                }
            };
            let len = items.len();
            if position > len {
                return Err(OverrideError::IndexOutOfRange {
                    at: path.to_string(),
                    index: position,
                    len,
                });
            }
            match value {
                Some(v) if position == len => items.push(v),
                Some(v) => items[position] = v,
                None if position < len => {
                    items.remove(position);
                }
                None => {}
            }
            Ok(())
        }
        _ => Err(OverrideError::NotAContainer {
            at: location(path, last),
        }),
    }
}

fn apply_generator(
    body: &mut Json,
    path: &OverridePath,
    value: Option<Json>,
    shape: &GeneratorShape,
) -> Result<Dispatch, OverrideError> {
    let n = path.segments().len();
    let keyword = path.segments()[n - 2].as_str().to_string();
    let block = match &path.segments()[n - 1] {
        Segment::Key(block) => block.clone(),
        Segment::Index { raw, .. } => {
            return Err(OverrideError::Generator {
                block: raw.clone(),
                reason: format!("'{}' needs a block name, not an index", keyword),
            })
        }
    };

    let container = walk(body, path, n - 2)?;
    let Json::Object(map) = container else {
        return Err(OverrideError::NotAContainer {
            at: location(path, n - 2),
        });
    };

    match value {
        None => {
            if let Some(Json::Object(generators)) = map.get_mut(&keyword) {
                generators.shift_remove(&block);
                if generators.is_empty() {
                    map.shift_remove(&keyword);
                }
            }
        }
        Some(value) => {
            let construct = build_generator(&block, value, shape)?;
            let slot = map
                .entry(keyword.clone())
                .or_insert_with(|| Json::Object(Map::new()));
            let Json::Object(generators) = slot else {
                return Err(OverrideError::NotAContainer {
                    at: location(path, n - 1),
                });
            };
            generators.insert(block.clone(), construct);
        }
    }

    Ok(Dispatch::Generator { keyword, block })
}

/// Validate the override value and produce `{source, iterator, template}`.
fn build_generator(block: &str, value: Json, shape: &GeneratorShape) -> Result<Json, OverrideError> {
    let fail = |reason: String| OverrideError::Generator {
        block: block.to_string(),
        reason,
    };

    let Json::Object(mut input) = value else {
        return Err(fail("generator value must be a mapping".to_string()));
    };

    let source = input
        .shift_remove(&shape.source_key)
        .ok_or_else(|| fail(format!("missing iteration source '{}'", shape.source_key)))?;
    let template = input
        .shift_remove(&shape.template_key)
        .ok_or_else(|| fail(format!("missing template '{}'", shape.template_key)))?;
    if !template.is_object() {
        return Err(fail(format!("'{}' must be a mapping", shape.template_key)));
    }

    let iterator = match input.shift_remove(&shape.iterator_key) {
        None => block.to_string(),
        Some(Json::String(name)) if is_valid_identifier(&name) => name,
        Some(other) => {
            return Err(fail(format!(
                "'{}' must be an identifier, got {}",
                shape.iterator_key, other
            )))
        }
    };

    if let Some(extra) = input.keys().next() {
        return Err(fail(format!("unexpected key '{}'", extra)));
    }

    if mentions_variable(&source, &iterator) {
        return Err(fail(format!(
            "iteration variable '{}' is only bound inside '{}'",
            iterator, shape.template_key
        )));
    }

    let mut construct = Map::new();
    construct.insert(shape.source_key.clone(), source);
    construct.insert(shape.iterator_key.clone(), Json::String(iterator));
    construct.insert(shape.template_key.clone(), template);
    Ok(Json::Object(construct))
}

/// Whether any interpolation in `value` reads the variable `name`.
///
/// Quoted string literals inside an expression are skipped, and
/// attribute accesses such as `var.ingress` do not count.
fn mentions_variable(value: &Json, name: &str) -> bool {
    match value {
        Json::String(s) => interpolations(s).iter().any(|expr| reads_identifier(expr, name)),
        Json::Array(items) => items.iter().any(|v| mentions_variable(v, name)),
        Json::Object(map) => map.values().any(|v| mentions_variable(v, name)),
        _ => false,
    }
}

/// Bodies of the `${...}` interpolations in `s`, skipping `$${` escapes
fn interpolations(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let escaped = rest[..start].ends_with('$');
        let body = &rest[start + 2..];
        let mut depth = 1usize;
        let mut end = body.len();
        for (i, c) in body.char_indices() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        end = i;
                        break;
                    }
                }
                _ => {}
            }
        }
        if !escaped {
            out.push(&body[..end]);
        }
        rest = body.get(end + 1..).unwrap_or("");
    }
    out
}

fn reads_identifier(expr: &str, name: &str) -> bool {
    let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-';
    // Odd-numbered pieces sit inside string literals
    expr.split('"').step_by(2).any(|code| {
        code.match_indices(name).any(|(i, _)| {
            let before = code[..i].chars().next_back();
            let after = code[i + name.len()..].chars().next();
            !before.map(|c| is_word(c) || c == '.').unwrap_or(false) && !after.map(is_word).unwrap_or(false)
        })
    })
}
