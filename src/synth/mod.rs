//! Synthesis pass
//!
//! [`Synthesis::new`] takes ownership of the [`Tree`], which closes the
//! construction phase. It resolves every pending reference and renders
//! one body per element. Overrides are then applied to the rendered
//! bodies, and [`Synthesis::finish`] computes the emission order and
//! serializes one document per stack.

pub mod output;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as Json};
use tfsynth_naming::{allocate_logical_id, KeyCase};
use tracing::{debug, info, warn};

use crate::error::SynthError;
use crate::graph::{Cycle, DependencyGraph};
use crate::overrides::{self, OverrideAction, OverrideError, OverridePath, SpecialBlockTable};
use crate::tree::{Element, ElementKind, NodeId, Tree, CATEGORY_ORDER};
use crate::value::{Properties, Reference, Value};

/// How dependency edges show up in the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Linkage {
    /// Edges only decide emission order; references carry the linkage
    #[default]
    Ordering,
    /// Every edge to a resource or data source is also listed in `depends_on`
    Explicit,
}

impl Linkage {
    /// Returns the string representation used in config files
    pub fn as_str(&self) -> &'static str {
        match self {
            Linkage::Ordering => "ordering",
            Linkage::Explicit => "explicit",
        }
    }

    /// Parse a config value
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ordering" => Some(Linkage::Ordering),
            "explicit" => Some(Linkage::Explicit),
            _ => None,
        }
    }
}

/// Options for a synthesis pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthOptions {
    pub key_case: KeyCase,
    pub linkage: Linkage,
    /// Emit the `"//"` metadata block
    pub metadata: bool,
    pub special_blocks: SpecialBlockTable,
}

impl Default for SynthOptions {
    fn default() -> Self {
        Self {
            key_case: KeyCase::Snake,
            linkage: Linkage::Ordering,
            metadata: true,
            special_blocks: SpecialBlockTable::terraform(),
        }
    }
}

/// Final document of one stack
#[derive(Debug, Clone, PartialEq)]
pub struct SerializedDocument {
    pub stack: String,
    pub document: Json,
    /// Element addresses, providers first
    pub emission_order: Vec<String>,
    /// (consumer, provider) address pairs
    pub edges: Vec<(String, String)>,
}

impl SerializedDocument {
    /// Look up a dot path such as `resource.aws_instance.web.tags`.
    ///
    /// All-digit segments index arrays.
    pub fn get(&self, path: &str) -> Option<&Json> {
        let mut current = &self.document;
        for segment in path.split('.') {
            current = match current {
                Json::Object(map) => map.get(segment)?,
                Json::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Serialize the document
    pub fn to_json(&self, pretty: bool) -> Result<String, serde_json::Error> {
        if pretty {
            serde_json::to_string_pretty(&self.document)
        } else {
            serde_json::to_string(&self.document)
        }
    }
}

/// Result of a complete pass
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedApp {
    pub stacks: Vec<SerializedDocument>,
}

impl SynthesizedApp {
    /// Look up a stack document by name
    pub fn stack(&self, name: &str) -> Option<&SerializedDocument> {
        self.stacks.iter().find(|s| s.stack == name)
    }
}

#[derive(Debug, Clone)]
struct Emitted {
    stack: NodeId,
    logical_id: String,
    body: Json,
}

/// An in-progress synthesis pass
#[derive(Debug)]
pub struct Synthesis {
    tree: Tree,
    options: SynthOptions,
    emitted: BTreeMap<NodeId, Emitted>,
    graph: DependencyGraph<NodeId>,
}

impl Synthesis {
    /// Resolve references, render bodies and apply queued overrides
    pub fn new(tree: Tree, options: SynthOptions) -> Result<Self, SynthError> {
        let ids = allocate_ids(&tree)?;

        let mut emitted = BTreeMap::new();
        for (&node, (stack, logical_id)) in &ids {
            let Some(element) = tree.element(node) else {
                continue;
            };
            let body = render_body(&tree, &ids, &options, node, element)?;
            validate_dependencies(&tree, &ids, node, element)?;
            emitted.insert(
                node,
                Emitted {
                    stack: *stack,
                    logical_id: logical_id.clone(),
                    body,
                },
            );
        }

        let graph = tree.graph().subgraph(|n| emitted.contains_key(&n));
        debug!(elements = emitted.len(), "rendered element bodies");

        let mut synthesis = Self {
            tree,
            options,
            emitted,
            graph,
        };

        let queued: Vec<(NodeId, OverridePath, OverrideAction)> = synthesis
            .emitted
            .keys()
            .filter_map(|&n| synthesis.tree.element(n).map(|e| (n, e)))
            .flat_map(|(n, e)| e.overrides.iter().map(move |(p, a)| (n, p.clone(), a.clone())))
            .collect();
        for (node, path, action) in queued {
            synthesis.apply_parsed(node, &path, action)?;
        }

        Ok(synthesis)
    }

    /// The tree being synthesized
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Rendered body of `node`, including applied overrides
    pub fn body(&self, node: NodeId) -> Option<&Json> {
        self.emitted.get(&node).map(|e| &e.body)
    }

    /// Emitted identifier of `node`
    pub fn logical_id(&self, node: NodeId) -> Option<&str> {
        self.emitted.get(&node).map(|e| e.logical_id.as_str())
    }

    /// Write `value` at `path` inside the body of `node`
    pub fn apply_override(&mut self, node: NodeId, path: &str, value: impl Into<Value>) -> Result<(), SynthError> {
        let parsed = self.parse_path(node, path)?;
        self.apply_parsed(node, &parsed, OverrideAction::Set(value.into()))
    }

    /// Delete the value at `path` inside the body of `node`
    pub fn remove_override(&mut self, node: NodeId, path: &str) -> Result<(), SynthError> {
        let parsed = self.parse_path(node, path)?;
        self.apply_parsed(node, &parsed, OverrideAction::Remove)
    }

    /// Compute emission order and serialize every stack
    pub fn finish(self) -> Result<SynthesizedApp, SynthError> {
        let mut stacks = Vec::new();
        for stack in self.tree.stacks() {
            stacks.push(self.serialize_stack(stack)?);
        }
        Ok(SynthesizedApp { stacks })
    }

    fn parse_path(&self, node: NodeId, path: &str) -> Result<OverridePath, SynthError> {
        path.parse().map_err(|e: overrides::PathParseError| SynthError::InvalidOverridePath {
            node: self.tree.label(node),
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    fn apply_parsed(&mut self, node: NodeId, path: &OverridePath, action: OverrideAction) -> Result<(), SynthError> {
        if !self.emitted.contains_key(&node) {
            return Err(SynthError::UnknownNode(node.to_string()));
        }

        let (value, targets) = match action {
            OverrideAction::Set(value) => {
                let ids = self.id_map();
                let key_case = self.options.key_case;
                let mut resolve = |r: &Reference| resolve_reference(&self.tree, &ids, key_case, node, r);
                // Escape-hatch values are written as given
                let json = value.render(KeyCase::Preserve, &mut resolve)?;
                let targets: Vec<NodeId> = value.references().iter().map(|r| r.target).collect();
                (Some(json), targets)
            }
            OverrideAction::Remove => (None, Vec::new()),
        };

        let label = self.tree.label(node);
        let Some(emitted) = self.emitted.get_mut(&node) else {
            return Err(SynthError::UnknownNode(node.to_string()));
        };
        let dispatch = overrides::apply(&mut emitted.body, path, value, &self.options.special_blocks)
            .map_err(|e| override_error(&label, path, e))?;

        for target in targets {
            self.graph.add_edge(node, target);
        }

        debug!(node = %label, path = %path, dispatch = ?dispatch, "applied override");
        Ok(())
    }

    fn id_map(&self) -> BTreeMap<NodeId, (NodeId, String)> {
        self.emitted
            .iter()
            .map(|(&n, e)| (n, (e.stack, e.logical_id.clone())))
            .collect()
    }

    fn address(&self, node: NodeId) -> String {
        match (self.tree.element(node), self.emitted.get(&node)) {
            (Some(element), Some(emitted)) => element.kind.address(&element.type_name, &emitted.logical_id),
            _ => self.tree.label(node),
        }
    }

    fn serialize_stack(&self, stack: NodeId) -> Result<SerializedDocument, SynthError> {
        let name = self.tree.name(stack).to_string();
        let members: BTreeSet<NodeId> = self
            .emitted
            .iter()
            .filter(|(_, e)| e.stack == stack)
            .map(|(&n, _)| n)
            .collect();

        let graph = self.graph.subgraph(|n| members.contains(&n));
        let order = graph.emission_order().map_err(|Cycle(cycle)| SynthError::DependencyCycle {
            cycle: cycle.iter().map(|&n| self.address(n)).collect(),
        })?;
        let position: BTreeMap<NodeId, usize> = order.iter().enumerate().map(|(i, &n)| (n, i)).collect();

        let mut bodies: BTreeMap<NodeId, Json> = BTreeMap::new();
        for &node in &order {
            let (Some(element), Some(emitted)) = (self.tree.element(node), self.emitted.get(&node)) else {
                continue;
            };
            let mut body = emitted.body.clone();
            if element.kind.accepts_depends_on() {
                let mut providers: Vec<NodeId> = element
                    .depends_on
                    .iter()
                    .copied()
                    .filter(|p| members.contains(p))
                    .collect();
                if self.options.linkage == Linkage::Explicit {
                    providers.extend(graph.providers(node).filter(|&p| {
                        p != node
                            && self
                                .tree
                                .element(p)
                                .map(|e| e.kind.can_be_depended_on())
                                .unwrap_or(false)
                    }));
                }
                providers.sort_by_key(|p| position.get(p).copied().unwrap_or(usize::MAX));
                providers.dedup();

                if let Json::Object(map) = &mut body {
                    if !providers.is_empty() && !map.contains_key("depends_on") {
                        let addresses: Vec<Json> = providers.iter().map(|&p| Json::String(self.address(p))).collect();
                        map.insert("depends_on".to_string(), Json::Array(addresses));
                    }
                }
            }
            bodies.insert(node, body);
        }

        let mut document = Map::new();
        if self.options.metadata {
            document.insert(
                "//".to_string(),
                json!({
                    "metadata": {
                        "version": env!("CARGO_PKG_VERSION"),
                        "stackName": name,
                    }
                }),
            );
        }

        for &kind in CATEGORY_ORDER {
            let mut category = Map::new();
            for &node in &order {
                let (Some(element), Some(emitted)) = (self.tree.element(node), self.emitted.get(&node)) else {
                    continue;
                };
                if element.kind != kind {
                    continue;
                }
                let body = bodies.remove(&node).unwrap_or(Json::Null);
                match kind {
                    ElementKind::Resource | ElementKind::Data => {
                        let by_type = category
                            .entry(element.type_name.clone())
                            .or_insert_with(|| Json::Object(Map::new()));
                        if let Json::Object(by_type) = by_type {
                            by_type.insert(emitted.logical_id.clone(), body);
                        }
                    }
                    ElementKind::Provider => {
                        let list = category
                            .entry(element.type_name.clone())
                            .or_insert_with(|| Json::Array(Vec::new()));
                        if let Json::Array(list) = list {
                            list.push(body);
                        }
                    }
                    ElementKind::Variable | ElementKind::Local | ElementKind::Output => {
                        category.insert(emitted.logical_id.clone(), body);
                    }
                }
            }
            if !category.is_empty() {
                document.insert(kind.category().to_string(), Json::Object(category));
            }
        }

        let emission_order: Vec<String> = order.iter().map(|&n| self.address(n)).collect();
        let edges = graph
            .edges()
            .into_iter()
            .map(|(c, p)| (self.address(c), self.address(p)))
            .collect();

        info!(stack = %name, elements = order.len(), "synthesized stack");
        Ok(SerializedDocument {
            stack: name,
            document: Json::Object(document),
            emission_order,
            edges,
        })
    }
}

/// Run a whole pass with no programmatic overrides
pub fn synthesize(tree: Tree, options: SynthOptions) -> Result<SynthesizedApp, SynthError> {
    Synthesis::new(tree, options)?.finish()
}

fn override_error(node: &str, path: &OverridePath, err: OverrideError) -> SynthError {
    match err {
        OverrideError::IndexOutOfRange { at, index, len } => SynthError::IndexOutOfRange {
            node: node.to_string(),
            path: at,
            index,
            len,
        },
        OverrideError::Generator { block, reason } => SynthError::InvalidGeneratorBlock {
            node: node.to_string(),
            block,
            reason,
        },
        other => SynthError::InvalidOverridePath {
            node: node.to_string(),
            path: path.to_string(),
            reason: other.to_string(),
        },
    }
}

/// Emitted identifier of every defined element, keyed with its stack
fn allocate_ids(tree: &Tree) -> Result<BTreeMap<NodeId, (NodeId, String)>, SynthError> {
    let mut ids = BTreeMap::new();
    for stack in tree.stacks() {
        let mut taken: BTreeSet<(ElementKind, String, String)> = BTreeSet::new();
        for node in tree.elements_in(stack) {
            let Some(element) = tree.element(node) else {
                continue;
            };
            if !element.defined {
                warn!(node = %tree.label(node), "reserved element was never defined, skipping");
                continue;
            }

            let logical_id = match &element.logical_id {
                Some(id) => id.clone(),
                None => allocate_logical_id(&tree.path_components(node)).map_err(|e| {
                    SynthError::InvalidIdentifier {
                        id: tree.label(node),
                        reason: e.to_string(),
                    }
                })?,
            };

            let key = (element.kind, element.type_name.clone(), logical_id.clone());
            if !taken.insert(key) {
                return Err(SynthError::DuplicateIdentifier {
                    scope: tree.name(stack).to_string(),
                    type_name: element.type_name.clone(),
                    id: logical_id,
                });
            }
            ids.insert(node, (stack, logical_id));
        }
    }
    Ok(ids)
}

fn render_body(
    tree: &Tree,
    ids: &BTreeMap<NodeId, (NodeId, String)>,
    options: &SynthOptions,
    node: NodeId,
    element: &Element,
) -> Result<Json, SynthError> {
    let key_case = options.key_case;
    let mut resolve = |r: &Reference| resolve_reference(tree, ids, key_case, node, r);

    if element.kind == ElementKind::Local {
        return match element.properties.get("value") {
            Some(value) => value.render(key_case, &mut resolve),
            None => Ok(Json::Null),
        };
    }

    let mut body = render_properties(&element.properties, key_case, &mut resolve)?;

    if element.kind == ElementKind::Provider {
        if let Some((_, alias)) = ids.get(&node) {
            if alias != &element.type_name && !body.contains_key("alias") {
                body.insert("alias".to_string(), Json::String(alias.clone()));
            }
        }
    }

    Ok(Json::Object(body))
}

fn render_properties<F>(properties: &Properties, key_case: KeyCase, resolve: &mut F) -> Result<Map<String, Json>, SynthError>
where
    F: FnMut(&Reference) -> Result<String, SynthError>,
{
    let mut out = Map::new();
    for (key, value) in properties {
        out.insert(key_case.apply(key), value.render(key_case, resolve)?);
    }
    Ok(out)
}

/// Turn a pending reference into its emitted expression
fn resolve_reference(
    tree: &Tree,
    ids: &BTreeMap<NodeId, (NodeId, String)>,
    key_case: KeyCase,
    consumer: NodeId,
    reference: &Reference,
) -> Result<String, SynthError> {
    let invalid = |reason: String| SynthError::InvalidPropertyReference {
        from: tree.label(consumer),
        target: tree.label(reference.target),
        reason,
    };

    let Some(target) = tree.element(reference.target) else {
        let reason = if tree.is_live(reference.target) {
            "target is not an element"
        } else {
            "target does not exist or was removed"
        };
        return Err(invalid(reason.to_string()));
    };
    if !target.defined {
        return Err(invalid("target was reserved but never defined".to_string()));
    }
    if !target.kind.is_referenceable() {
        return Err(invalid(format!("{} elements cannot be referenced", target.kind)));
    }
    let Some((stack, logical_id)) = ids.get(&reference.target) else {
        return Err(invalid("target has no emitted identifier".to_string()));
    };
    if tree.enclosing_stack(consumer) != Some(*stack) {
        return Err(invalid("references across stacks are not supported".to_string()));
    }

    match target.kind {
        ElementKind::Resource | ElementKind::Data => {
            if let Some(first) = reference.attribute.first() {
                let declared = target.exposes(first)
                    || target
                        .properties
                        .keys()
                        .any(|k| key_case.apply(k) == key_case.apply(first));
                if !declared {
                    return Err(invalid(format!("'{}' is not an attribute of {}", first, target.type_name)));
                }
            }
        }
        ElementKind::Provider if !reference.attribute.is_empty() => {
            return Err(invalid("providers are referenced without an attribute".to_string()));
        }
        _ => {}
    }

    let attribute = emitted_attribute(target, &reference.attribute, key_case);
    Ok(target.kind.reference_expression(&target.type_name, logical_id, &attribute))
}

/// Spell `attribute` the way the target's body is emitted.
///
/// Segments are case-transformed only while they walk schema blocks.
/// Inside a `Map`, below a variable, and below a local whose value is
/// not a block, keys are verbatim.
/// Segments past the declared value keep the casing of the last
/// container walked.
fn emitted_attribute(target: &Element, attribute: &[String], key_case: KeyCase) -> Vec<String> {
    let mut transform = true;
    let mut current: Option<&Value> = None;
    let mut segments = attribute.iter();
    let mut out = Vec::with_capacity(attribute.len());

    match target.kind {
        ElementKind::Variable => transform = false,
        ElementKind::Local => {
            transform = false;
            current = target.properties.get("value");
        }
        _ => {
            if let Some(first) = segments.next() {
                current = find_key(target.properties.iter(), first, key_case);
                out.push(key_case.apply(first));
            }
        }
    }

    for segment in segments {
        current = match current {
            Some(Value::Block(block)) => {
                transform = true;
                out.push(key_case.apply(segment));
                find_key(block.iter(), segment, key_case)
            }
            Some(Value::Map(map)) => {
                transform = false;
                out.push(segment.clone());
                map.get(segment.as_str())
            }
            Some(Value::List(items)) => {
                out.push(segment.clone());
                segment.parse::<usize>().ok().and_then(|i| items.get(i))
            }
            _ => {
                out.push(if transform { key_case.apply(segment) } else { segment.clone() });
                None
            }
        };
    }
    out
}

/// Look up a declared key, matching either spelling of it
fn find_key<'v, I>(entries: I, segment: &str, key_case: KeyCase) -> Option<&'v Value>
where
    I: Iterator<Item = (&'v String, &'v Value)>,
{
    let wanted = key_case.apply(segment);
    let mut fallback = None;
    for (key, value) in entries {
        if key == segment {
            return Some(value);
        }
        if fallback.is_none() && key_case.apply(key) == wanted {
            fallback = Some(value);
        }
    }
    fallback
}

/// Explicit dependencies must name resources or data sources in the same stack
fn validate_dependencies(
    tree: &Tree,
    ids: &BTreeMap<NodeId, (NodeId, String)>,
    node: NodeId,
    element: &Element,
) -> Result<(), SynthError> {
    if element.depends_on.is_empty() {
        return Ok(());
    }
    if !element.kind.accepts_depends_on() {
        return Err(SynthError::InvalidPropertyReference {
            from: tree.label(node),
            target: tree.label(element.depends_on[0]),
            reason: format!("{} elements cannot carry depends_on", element.kind),
        });
    }

    let stack = tree.enclosing_stack(node);
    for &provider in &element.depends_on {
        let invalid = |reason: &str| SynthError::InvalidPropertyReference {
            from: tree.label(node),
            target: tree.label(provider),
            reason: reason.to_string(),
        };
        let Some(target) = tree.element(provider) else {
            return Err(invalid("dependency does not exist or was removed"));
        };
        if !target.kind.can_be_depended_on() {
            return Err(invalid("only resources and data sources can be depended on"));
        }
        match ids.get(&provider) {
            Some((provider_stack, _)) if Some(*provider_stack) == stack => {}
            Some(_) => return Err(invalid("dependencies across stacks are not supported")),
            None => return Err(invalid("dependency was reserved but never defined")),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Declaration;

    fn stack() -> (Tree, NodeId) {
        let mut tree = Tree::new();
        let root = tree.root();
        let stack = tree.stack(root, "main").unwrap();
        (tree, stack)
    }

    fn no_metadata() -> SynthOptions {
        SynthOptions {
            metadata: false,
            ..SynthOptions::default()
        }
    }

    #[test]
    fn test_provider_emitted_before_consumer() {
        let (mut tree, stack) = stack();
        let later = tree
            .reserve(stack, ElementKind::Resource, "kubernetes_namespace", "ns1")
            .unwrap();
        tree.declare(
            stack,
            Declaration::resource("kubernetes_deployment", "dep1")
                .property("namespace", tree.attr(later, "metadata.name")),
        )
        .unwrap();
        let mut props = Properties::new();
        props.insert("metadata".into(), Value::block([("name", "ns1")]));
        tree.define(later, props).unwrap();

        let app = synthesize(tree, no_metadata()).unwrap();
        let doc = app.stack("main").unwrap();
        assert_eq!(
            doc.emission_order,
            vec!["kubernetes_namespace.ns1", "kubernetes_deployment.dep1"]
        );
        assert_eq!(
            doc.get("resource.kubernetes_deployment.dep1.namespace").unwrap(),
            "${kubernetes_namespace.ns1.metadata.name}"
        );
    }

    #[test]
    fn test_unknown_attribute_fails() {
        let (mut tree, stack) = stack();
        let vpc = tree.declare(stack, Declaration::resource("aws_vpc", "main")).unwrap();
        tree.declare(
            stack,
            Declaration::resource("aws_subnet", "a").property("vpcId", tree.attr(vpc, "nonexistent")),
        )
        .unwrap();
        let err = synthesize(tree, no_metadata()).unwrap_err();
        assert!(matches!(err, SynthError::InvalidPropertyReference { .. }));
    }

    #[test]
    fn test_computed_and_implicit_attributes_resolve() {
        let (mut tree, stack) = stack();
        let role = tree
            .declare(stack, Declaration::resource("aws_iam_role", "r").computed("arn"))
            .unwrap();
        tree.declare(
            stack,
            Declaration::resource("aws_lambda_function", "f")
                .property("role", tree.attr(role, "arn"))
                .property("roleId", tree.attr(role, "id")),
        )
        .unwrap();
        let app = synthesize(tree, no_metadata()).unwrap();
        let doc = app.stack("main").unwrap();
        assert_eq!(doc.get("resource.aws_lambda_function.f.role").unwrap(), "${aws_iam_role.r.arn}");
        assert_eq!(doc.get("resource.aws_lambda_function.f.role_id").unwrap(), "${aws_iam_role.r.id}");
    }

    #[test]
    fn test_reference_to_removed_node_fails() {
        let (mut tree, stack) = stack();
        let vpc = tree.declare(stack, Declaration::resource("aws_vpc", "main")).unwrap();
        tree.declare(
            stack,
            Declaration::resource("aws_subnet", "a").property("vpcId", tree.attr(vpc, "id")),
        )
        .unwrap();
        tree.remove(vpc).unwrap();
        let err = synthesize(tree, no_metadata()).unwrap_err();
        assert!(matches!(err, SynthError::InvalidPropertyReference { .. }));
    }

    #[test]
    fn test_reference_across_stacks_fails() {
        let mut tree = Tree::new();
        let root = tree.root();
        let a = tree.stack(root, "a").unwrap();
        let b = tree.stack(root, "b").unwrap();
        let vpc = tree.declare(a, Declaration::resource("aws_vpc", "main")).unwrap();
        tree.declare(b, Declaration::resource("aws_subnet", "s").property("vpcId", tree.attr(vpc, "id")))
            .unwrap();
        let err = synthesize(tree, no_metadata()).unwrap_err();
        assert!(err.to_string().contains("across stacks"));
    }

    #[test]
    fn test_nested_scope_ids_are_hashed_and_unique() {
        let (mut tree, stack) = stack();
        let a = tree.scope(stack, "a").unwrap();
        let b = tree.scope(stack, "b").unwrap();
        let x = tree.declare(a, Declaration::resource("null_resource", "x")).unwrap();
        let y = tree.declare(b, Declaration::resource("null_resource", "x")).unwrap();
        let synthesis = Synthesis::new(tree, no_metadata()).unwrap();
        let (ix, iy) = (synthesis.logical_id(x).unwrap(), synthesis.logical_id(y).unwrap());
        assert!(ix.starts_with("a_x_"));
        assert!(iy.starts_with("b_x_"));
        assert_ne!(ix, iy);
    }

    #[test]
    fn test_logical_id_collision_fails() {
        let (mut tree, stack) = stack();
        let a = tree.declare(stack, Declaration::resource("null_resource", "a")).unwrap();
        tree.declare(stack, Declaration::resource("null_resource", "b")).unwrap();
        tree.override_logical_id(a, "b").unwrap();
        let err = synthesize(tree, no_metadata()).unwrap_err();
        assert!(matches!(err, SynthError::DuplicateIdentifier { .. }));
    }

    #[test]
    fn test_document_layout() {
        let (mut tree, stack) = stack();
        let region = tree.declare(stack, Declaration::variable("region").property("type", "string")).unwrap();
        tree.declare(stack, Declaration::provider("aws", "aws").property("region", tree.attr(region, "")))
            .unwrap();
        let west = tree.declare(stack, Declaration::provider("aws", "west")).unwrap();
        let tags = tree
            .declare(stack, Declaration::local("tags", Value::map([("Team", "core")])))
            .unwrap();
        let bucket = tree
            .declare(
                stack,
                Declaration::resource("aws_s3_bucket", "logs")
                    .property("provider", tree.attr(west, ""))
                    .property("tags", tree.attr(tags, "")),
            )
            .unwrap();
        tree.declare(stack, Declaration::output("bucket", tree.attr(bucket, "id"))).unwrap();

        let app = synthesize(tree, SynthOptions::default()).unwrap();
        let doc = app.stack("main").unwrap();
        let keys: Vec<&str> = doc.document.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["//", "provider", "variable", "locals", "resource", "output"]);

        assert_eq!(doc.get("//.metadata.stackName").unwrap(), "main");
        assert_eq!(doc.get("provider.aws.0.region").unwrap(), "${var.region}");
        assert_eq!(doc.get("provider.aws.1.alias").unwrap(), "west");
        assert_eq!(doc.get("locals.tags.Team").unwrap(), "core");
        assert_eq!(doc.get("resource.aws_s3_bucket.logs.provider").unwrap(), "aws.west");
        assert_eq!(doc.get("resource.aws_s3_bucket.logs.tags").unwrap(), "${local.tags}");
        assert_eq!(doc.get("output.bucket.value").unwrap(), "${aws_s3_bucket.logs.id}");
    }

    #[test]
    fn test_explicit_dependency_emits_depends_on() {
        let (mut tree, stack) = stack();
        let a = tree.declare(stack, Declaration::resource("null_resource", "a")).unwrap();
        let b = tree.declare(stack, Declaration::resource("null_resource", "b")).unwrap();
        tree.add_dependency(a, b).unwrap();
        let app = synthesize(tree, no_metadata()).unwrap();
        let doc = app.stack("main").unwrap();
        assert_eq!(doc.emission_order, vec!["null_resource.b", "null_resource.a"]);
        assert_eq!(
            doc.get("resource.null_resource.a.depends_on").unwrap(),
            &json!(["null_resource.b"])
        );
    }

    #[test]
    fn test_explicit_linkage_lists_reference_providers() {
        let (mut tree, stack) = stack();
        let ns = tree.declare(stack, Declaration::resource("kubernetes_namespace", "ns1")).unwrap();
        tree.declare(
            stack,
            Declaration::resource("kubernetes_deployment", "dep1").property("namespace", tree.attr(ns, "id")),
        )
        .unwrap();

        let options = SynthOptions {
            linkage: Linkage::Explicit,
            ..no_metadata()
        };
        let app = synthesize(tree.clone(), options).unwrap();
        assert_eq!(
            app.stack("main").unwrap().get("resource.kubernetes_deployment.dep1.depends_on").unwrap(),
            &json!(["kubernetes_namespace.ns1"])
        );

        let app = synthesize(tree, no_metadata()).unwrap();
        assert!(app
            .stack("main")
            .unwrap()
            .get("resource.kubernetes_deployment.dep1.depends_on")
            .is_none());
    }

    #[test]
    fn test_override_adds_edge() {
        let (mut tree, stack) = stack();
        let a = tree.declare(stack, Declaration::resource("null_resource", "a")).unwrap();
        let b = tree.declare(stack, Declaration::resource("null_resource", "b")).unwrap();
        let mut synthesis = Synthesis::new(tree, no_metadata()).unwrap();
        let reference = synthesis.tree().attr(b, "id");
        synthesis.apply_override(a, "triggers", Value::map([("b", reference)])).unwrap();
        let app = synthesis.finish().unwrap();
        assert_eq!(
            app.stack("main").unwrap().emission_order,
            vec!["null_resource.b", "null_resource.a"]
        );
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let (mut tree, stack) = stack();
        let a = tree
            .declare(stack, Declaration::resource("null_resource", "a").property("x", "y"))
            .unwrap();
        let mut synthesis = Synthesis::new(tree, no_metadata()).unwrap();
        let reference = synthesis.tree().attr(a, "x");
        synthesis.apply_override(a, "y", reference).unwrap();
        let err = synthesis.finish().unwrap_err();
        assert_eq!(
            err,
            SynthError::DependencyCycle {
                cycle: vec!["null_resource.a".into(), "null_resource.a".into()]
            }
        );
    }

    #[test]
    fn test_queued_overrides_apply_in_order() {
        let (mut tree, stack) = stack();
        let web = tree
            .declare(stack, Declaration::resource("aws_instance", "web").property("ami", "a"))
            .unwrap();
        tree.add_override(web, "ami", OverrideAction::Set(Value::from("b"))).unwrap();
        tree.add_override(web, "ami", OverrideAction::Set(Value::from("c"))).unwrap();
        let synthesis = Synthesis::new(tree, no_metadata()).unwrap();
        assert_eq!(synthesis.body(web).unwrap()["ami"], "c");
    }

    #[test]
    fn test_unused_reserved_element_is_skipped() {
        let (mut tree, stack) = stack();
        tree.reserve(stack, ElementKind::Resource, "aws_vpc", "later").unwrap();
        let app = synthesize(tree, no_metadata()).unwrap();
        assert!(app.stack("main").unwrap().emission_order.is_empty());
    }
}
