//! Configuration tree builder
//!
//! Nodes live in an arena owned by [`Tree`]; children point at their parent
//! by index only. The tree records a dependency edge every time a declared
//! property holds a reference to another node.

mod kind;

pub use kind::{ElementKind, CATEGORY_ORDER};

use std::collections::BTreeSet;
use std::fmt;

use tfsynth_naming::is_valid_identifier;
use tracing::debug;

use crate::error::SynthError;
use crate::graph::DependencyGraph;
use crate::overrides::{OverrideAction, OverridePath};
use crate::value::{Properties, Reference, Value};

/// Handle to a node in a [`Tree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Arena position; also the declaration order
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a node is
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    App,
    Stack,
    Scope,
    Element(Element),
}

/// A declared object
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub kind: ElementKind,
    pub type_name: String,
    pub properties: Properties,
    /// Attributes known only after apply (e.g. `arn`)
    pub computed: BTreeSet<String>,
    /// False while the element is only reserved
    pub defined: bool,
    /// Explicit dependencies, emitted as `depends_on`
    pub depends_on: Vec<NodeId>,
    /// Queued overrides in registration order
    pub overrides: Vec<(OverridePath, OverrideAction)>,
    /// Emitted identifier set with [`Tree::override_logical_id`]
    pub logical_id: Option<String>,
}

impl Element {
    /// Whether `attribute` may be read from this element
    pub fn exposes(&self, attribute: &str) -> bool {
        self.kind.has_open_attributes()
            || self.properties.contains_key(attribute)
            || self.computed.contains(attribute)
            || self.kind.implicit_attributes().contains(&attribute)
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    id: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
    removed: bool,
}

impl NodeData {
    /// Sibling uniqueness key: ids only collide within the same key
    fn type_key(&self) -> String {
        match &self.kind {
            NodeKind::App => "app".to_string(),
            NodeKind::Stack => "stack".to_string(),
            NodeKind::Scope => "scope".to_string(),
            NodeKind::Element(e) => format!("{}:{}", e.kind, e.type_name),
        }
    }
}

/// What to declare
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub kind: ElementKind,
    pub type_name: String,
    pub local_id: String,
    pub properties: Properties,
    pub computed: BTreeSet<String>,
}

impl Declaration {
    fn new(kind: ElementKind, type_name: impl Into<String>, local_id: impl Into<String>) -> Self {
        Self {
            kind,
            type_name: type_name.into(),
            local_id: local_id.into(),
            properties: Properties::new(),
            computed: BTreeSet::new(),
        }
    }

    pub fn resource(type_name: impl Into<String>, local_id: impl Into<String>) -> Self {
        Self::new(ElementKind::Resource, type_name, local_id)
    }

    pub fn data(type_name: impl Into<String>, local_id: impl Into<String>) -> Self {
        Self::new(ElementKind::Data, type_name, local_id)
    }

    pub fn provider(type_name: impl Into<String>, local_id: impl Into<String>) -> Self {
        Self::new(ElementKind::Provider, type_name, local_id)
    }

    pub fn variable(local_id: impl Into<String>) -> Self {
        Self::new(ElementKind::Variable, ElementKind::Variable.as_str(), local_id)
    }

    /// A local value; the whole value is the emitted body
    pub fn local(local_id: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(ElementKind::Local, ElementKind::Local.as_str(), local_id).property("value", value)
    }

    pub fn output(local_id: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(ElementKind::Output, ElementKind::Output.as_str(), local_id).property("value", value)
    }

    /// Set one property
    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Declare an attribute that only exists after apply
    pub fn computed(mut self, attribute: impl Into<String>) -> Self {
        self.computed.insert(attribute.into());
        self
    }
}

/// Arena of declared nodes plus the dependency edges between them
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<NodeData>,
    graph: DependencyGraph<NodeId>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Create a tree holding only the root app node
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData {
                id: "app".to_string(),
                parent: None,
                children: Vec::new(),
                kind: NodeKind::App,
                removed: false,
            }],
            graph: DependencyGraph::new(),
        }
    }

    /// The root app node
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Add a stack under the app
    pub fn stack(&mut self, parent: NodeId, name: &str) -> Result<NodeId, SynthError> {
        if !matches!(self.live(parent)?.kind, NodeKind::App) {
            return Err(SynthError::InvalidScope {
                id: name.to_string(),
            });
        }
        if !is_valid_identifier(name) {
            return Err(SynthError::InvalidIdentifier {
                id: name.to_string(),
                reason: "stack names must start with a letter or underscore".to_string(),
            });
        }
        self.insert(parent, name, NodeKind::Stack)
    }

    /// Add a nested grouping scope
    pub fn scope(&mut self, parent: NodeId, id: &str) -> Result<NodeId, SynthError> {
        self.require_container(parent, id)?;
        self.insert(parent, id, NodeKind::Scope)
    }

    /// Declare an element under a stack or scope.
    ///
    /// Every reference in the properties records an edge from the new
    /// element to the referenced node.
    pub fn declare(&mut self, parent: NodeId, decl: Declaration) -> Result<NodeId, SynthError> {
        self.require_container(parent, &decl.local_id)?;
        self.check_targets(&decl.properties)?;

        let element = Element {
            kind: decl.kind,
            type_name: decl.type_name,
            properties: decl.properties,
            computed: decl.computed,
            defined: true,
            depends_on: Vec::new(),
            overrides: Vec::new(),
            logical_id: None,
        };
        let node = self.insert(parent, &decl.local_id, NodeKind::Element(element))?;
        self.graph.add_node(node);
        self.record_edges(node);

        debug!(node = %node, label = %self.label(node), "declared element");
        Ok(node)
    }

    /// Reserve an element so it can be referenced before it is defined
    pub fn reserve(
        &mut self,
        parent: NodeId,
        kind: ElementKind,
        type_name: &str,
        local_id: &str,
    ) -> Result<NodeId, SynthError> {
        self.require_container(parent, local_id)?;

        let element = Element {
            kind,
            type_name: type_name.to_string(),
            properties: Properties::new(),
            computed: BTreeSet::new(),
            defined: false,
            depends_on: Vec::new(),
            overrides: Vec::new(),
            logical_id: None,
        };
        let node = self.insert(parent, local_id, NodeKind::Element(element))?;
        self.graph.add_node(node);
        Ok(node)
    }

    /// Supply the properties of a reserved element
    pub fn define(&mut self, node: NodeId, properties: Properties) -> Result<(), SynthError> {
        self.check_targets(&properties)?;
        let scope = self.parent_label(node);
        let data = self.live_mut(node)?;
        let NodeKind::Element(element) = &mut data.kind else {
            return Err(SynthError::UnknownNode(node.to_string()));
        };
        if element.defined {
            return Err(SynthError::DuplicateIdentifier {
                scope,
                type_name: element.type_name.clone(),
                id: data.id.clone(),
            });
        }
        element.properties = properties;
        element.defined = true;
        self.record_edges(node);

        debug!(node = %node, label = %self.label(node), "defined reserved element");
        Ok(())
    }

    /// Declare an attribute of `node` that only exists after apply
    pub fn add_computed(&mut self, node: NodeId, attribute: &str) -> Result<(), SynthError> {
        self.element_mut(node)?.computed.insert(attribute.to_string());
        Ok(())
    }

    /// Read `attribute` (dot path) of `node` as a deferred reference
    pub fn attr(&self, node: NodeId, attribute: &str) -> Value {
        Value::Reference(Reference::new(node, attribute))
    }

    /// Record an explicit dependency, emitted as `depends_on`
    pub fn add_dependency(&mut self, consumer: NodeId, provider: NodeId) -> Result<(), SynthError> {
        self.element(provider)
            .ok_or_else(|| SynthError::UnknownNode(provider.to_string()))?;
        let element = self.element_mut(consumer)?;
        if !element.depends_on.contains(&provider) {
            element.depends_on.push(provider);
        }
        self.graph.add_edge(consumer, provider);
        Ok(())
    }

    /// Queue an override applied after construction
    pub fn add_override(&mut self, node: NodeId, path: &str, action: OverrideAction) -> Result<(), SynthError> {
        let parsed: OverridePath = path.parse().map_err(|e: crate::overrides::PathParseError| {
            SynthError::InvalidOverridePath {
                node: self.label(node),
                path: path.to_string(),
                reason: e.to_string(),
            }
        })?;

        let targets: Vec<NodeId> = match &action {
            OverrideAction::Set(value) => value.references().iter().map(|r| r.target).collect(),
            OverrideAction::Remove => Vec::new(),
        };
        for target in &targets {
            self.live(*target)?;
        }

        self.element_mut(node)?.overrides.push((parsed, action));
        for target in targets {
            self.graph.add_edge(node, target);
        }
        Ok(())
    }

    /// Replace the emitted identifier of `node`
    pub fn override_logical_id(&mut self, node: NodeId, id: &str) -> Result<(), SynthError> {
        if !is_valid_identifier(id) {
            return Err(SynthError::InvalidIdentifier {
                id: id.to_string(),
                reason: "logical ids must start with a letter or underscore".to_string(),
            });
        }
        self.element_mut(node)?.logical_id = Some(id.to_string());
        Ok(())
    }

    /// Remove `node` and its subtree
    pub fn remove(&mut self, node: NodeId) -> Result<(), SynthError> {
        let parent = self.live(node)?.parent.ok_or_else(|| SynthError::InvalidScope {
            id: "app".to_string(),
        })?;
        self.nodes[parent.0].children.retain(|c| *c != node);

        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            let data = &mut self.nodes[current.0];
            data.removed = true;
            stack.extend(data.children.iter().copied());
            self.graph.remove_node(current);
        }

        debug!(node = %node, "removed subtree");
        Ok(())
    }

    /// The element at `node`, if it is a live element
    pub fn element(&self, node: NodeId) -> Option<&Element> {
        match self.nodes.get(node.0) {
            Some(NodeData {
                kind: NodeKind::Element(e),
                removed: false,
                ..
            }) => Some(e),
            _ => None,
        }
    }

    /// Returns true if `node` exists and has not been removed
    pub fn is_live(&self, node: NodeId) -> bool {
        self.nodes.get(node.0).map(|n| !n.removed).unwrap_or(false)
    }

    /// Live stacks in declaration order
    pub fn stacks(&self) -> Vec<NodeId> {
        self.nodes[0]
            .children
            .iter()
            .copied()
            .filter(|&c| matches!(self.nodes[c.0].kind, NodeKind::Stack) && !self.nodes[c.0].removed)
            .collect()
    }

    /// Live elements under `stack` (any depth), in declaration order
    pub fn elements_in(&self, stack: NodeId) -> Vec<NodeId> {
        (0..self.nodes.len())
            .map(NodeId)
            .filter(|&n| self.element(n).is_some() && self.enclosing_stack(n) == Some(stack))
            .collect()
    }

    /// The stack `node` lives in
    pub fn enclosing_stack(&self, node: NodeId) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(n) = current {
            let data = self.nodes.get(n.0)?;
            if matches!(data.kind, NodeKind::Stack) {
                return Some(n);
            }
            current = data.parent;
        }
        None
    }

    /// Local ids from below the enclosing stack down to `node`
    pub fn path_components(&self, node: NodeId) -> Vec<&str> {
        let mut out = Vec::new();
        let mut current = Some(node);
        while let Some(n) = current {
            let Some(data) = self.nodes.get(n.0) else {
                break;
            };
            if matches!(data.kind, NodeKind::Stack | NodeKind::App) {
                break;
            }
            out.push(data.id.as_str());
            current = data.parent;
        }
        out.reverse();
        out
    }

    /// Local id of `node`
    pub fn name(&self, node: NodeId) -> &str {
        self.nodes.get(node.0).map(|n| n.id.as_str()).unwrap_or("")
    }

    /// Parent of `node`
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0).and_then(|n| n.parent)
    }

    /// Slash-separated path below the app, for messages
    pub fn label(&self, node: NodeId) -> String {
        let mut parts = Vec::new();
        let mut current = Some(node);
        while let Some(n) = current {
            let Some(data) = self.nodes.get(n.0) else {
                return node.to_string();
            };
            if matches!(data.kind, NodeKind::App) {
                break;
            }
            parts.push(data.id.as_str());
            current = data.parent;
        }
        if parts.is_empty() {
            return "app".to_string();
        }
        parts.reverse();
        parts.join("/")
    }

    /// Recorded dependency edges
    pub fn graph(&self) -> &DependencyGraph<NodeId> {
        &self.graph
    }

    fn parent_label(&self, node: NodeId) -> String {
        self.parent(node)
            .map(|p| self.label(p))
            .unwrap_or_else(|| "app".to_string())
    }

    fn live(&self, node: NodeId) -> Result<&NodeData, SynthError> {
        match self.nodes.get(node.0) {
            Some(data) if !data.removed => Ok(data),
            _ => Err(SynthError::UnknownNode(node.to_string())),
        }
    }

    fn live_mut(&mut self, node: NodeId) -> Result<&mut NodeData, SynthError> {
        match self.nodes.get_mut(node.0) {
            Some(data) if !data.removed => Ok(data),
            _ => Err(SynthError::UnknownNode(node.to_string())),
        }
    }

    fn element_mut(&mut self, node: NodeId) -> Result<&mut Element, SynthError> {
        match &mut self.live_mut(node)?.kind {
            NodeKind::Element(e) => Ok(e),
            _ => Err(SynthError::UnknownNode(node.to_string())),
        }
    }

    /// Elements and scopes need a stack or scope parent inside a stack
    fn require_container(&self, parent: NodeId, id: &str) -> Result<(), SynthError> {
        let data = self.live(parent)?;
        let container = matches!(data.kind, NodeKind::Stack | NodeKind::Scope);
        if !container || self.enclosing_stack(parent).is_none() {
            return Err(SynthError::InvalidScope { id: id.to_string() });
        }
        Ok(())
    }

    /// Referenced nodes must at least exist in the arena; whether they
    /// are usable is decided at resolution
    fn check_targets(&self, properties: &Properties) -> Result<(), SynthError> {
        for value in properties.values() {
            for reference in value.references() {
                if reference.target.0 >= self.nodes.len() {
                    return Err(SynthError::UnknownNode(reference.target.to_string()));
                }
            }
        }
        Ok(())
    }

    fn record_edges(&mut self, node: NodeId) {
        let targets: Vec<NodeId> = match self.element(node) {
            Some(e) => e
                .properties
                .values()
                .flat_map(|v| v.references())
                .map(|r| r.target)
                .collect(),
            None => return,
        };
        for target in targets {
            self.graph.add_edge(node, target);
        }
    }

    fn insert(&mut self, parent: NodeId, id: &str, kind: NodeKind) -> Result<NodeId, SynthError> {
        let data = NodeData {
            id: id.to_string(),
            parent: Some(parent),
            children: Vec::new(),
            kind,
            removed: false,
        };

        let key = data.type_key();
        let clash = self.nodes[parent.0]
            .children
            .iter()
            .map(|c| &self.nodes[c.0])
            .any(|sibling| !sibling.removed && sibling.id == id && sibling.type_key() == key);
        if clash {
            let type_name = match &data.kind {
                NodeKind::Element(e) => e.type_name.clone(),
                _ => key,
            };
            return Err(SynthError::DuplicateIdentifier {
                scope: self.label(parent),
                type_name,
                id: id.to_string(),
            });
        }

        let node = NodeId(self.nodes.len());
        self.nodes.push(data);
        self.nodes[parent.0].children.push(node);
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack() -> (Tree, NodeId) {
        let mut tree = Tree::new();
        let root = tree.root();
        let stack = tree.stack(root, "main").unwrap();
        (tree, stack)
    }

    #[test]
    fn test_duplicate_sibling_fails() {
        let (mut tree, stack) = stack();
        tree.declare(stack, Declaration::resource("aws_instance", "web")).unwrap();
        let err = tree
            .declare(stack, Declaration::resource("aws_instance", "web"))
            .unwrap_err();
        assert_eq!(
            err,
            SynthError::DuplicateIdentifier {
                scope: "main".into(),
                type_name: "aws_instance".into(),
                id: "web".into()
            }
        );
    }

    #[test]
    fn test_same_id_different_type_is_fine() {
        let (mut tree, stack) = stack();
        tree.declare(stack, Declaration::resource("aws_instance", "web")).unwrap();
        tree.declare(stack, Declaration::resource("aws_eip", "web")).unwrap();
        tree.declare(stack, Declaration::data("aws_instance", "web")).unwrap();
    }

    #[test]
    fn test_same_id_in_different_scopes_is_fine() {
        let (mut tree, stack) = stack();
        let a = tree.scope(stack, "a").unwrap();
        let b = tree.scope(stack, "b").unwrap();
        tree.declare(a, Declaration::resource("aws_instance", "web")).unwrap();
        tree.declare(b, Declaration::resource("aws_instance", "web")).unwrap();
    }

    #[test]
    fn test_element_outside_stack_fails() {
        let mut tree = Tree::new();
        let root = tree.root();
        let err = tree
            .declare(root, Declaration::resource("aws_instance", "web"))
            .unwrap_err();
        assert_eq!(err, SynthError::InvalidScope { id: "web".into() });
    }

    #[test]
    fn test_invalid_stack_name() {
        let mut tree = Tree::new();
        let root = tree.root();
        assert!(matches!(
            tree.stack(root, "1st").unwrap_err(),
            SynthError::InvalidIdentifier { .. }
        ));
    }

    #[test]
    fn test_references_record_edges() {
        let (mut tree, stack) = stack();
        let ns = tree.declare(stack, Declaration::resource("kubernetes_namespace", "ns1")).unwrap();
        let dep = tree
            .declare(
                stack,
                Declaration::resource("kubernetes_deployment", "dep1")
                    .property("namespace", tree.attr(ns, "metadata.name")),
            )
            .unwrap();
        assert_eq!(tree.graph().edges(), vec![(dep, ns)]);
    }

    #[test]
    fn test_reserve_then_define() {
        let (mut tree, stack) = stack();
        let later = tree.reserve(stack, ElementKind::Resource, "aws_vpc", "main").unwrap();
        let subnet = tree
            .declare(
                stack,
                Declaration::resource("aws_subnet", "a").property("vpcId", tree.attr(later, "id")),
            )
            .unwrap();
        assert!(!tree.element(later).unwrap().defined);

        let mut props = Properties::new();
        props.insert("cidrBlock".into(), Value::from("10.0.0.0/16"));
        tree.define(later, props.clone()).unwrap();
        assert!(tree.element(later).unwrap().defined);
        assert_eq!(tree.graph().edges(), vec![(subnet, later)]);

        let err = tree.define(later, props).unwrap_err();
        assert!(matches!(err, SynthError::DuplicateIdentifier { .. }));
    }

    #[test]
    fn test_remove_subtree() {
        let (mut tree, stack) = stack();
        let scope = tree.scope(stack, "net").unwrap();
        let vpc = tree.declare(scope, Declaration::resource("aws_vpc", "main")).unwrap();
        tree.remove(scope).unwrap();
        assert!(tree.element(vpc).is_none());
        assert!(tree.elements_in(stack).is_empty());
        assert!(tree.graph().is_empty());

        // The id is free again
        tree.scope(stack, "net").unwrap();
        assert!(tree.remove(tree.root()).is_err());
    }

    #[test]
    fn test_path_components_and_label() {
        let (mut tree, stack) = stack();
        let outer = tree.scope(stack, "web").unwrap();
        let inner = tree.scope(outer, "lb").unwrap();
        let sg = tree.declare(inner, Declaration::resource("aws_security_group", "sg")).unwrap();
        assert_eq!(tree.path_components(sg), vec!["web", "lb", "sg"]);
        assert_eq!(tree.label(sg), "main/web/lb/sg");
        assert_eq!(tree.enclosing_stack(sg), Some(stack));
    }

    #[test]
    fn test_bad_override_path_is_rejected_when_queued() {
        let (mut tree, stack) = stack();
        let web = tree.declare(stack, Declaration::resource("aws_instance", "web")).unwrap();
        let err = tree
            .add_override(web, "tags..Name", OverrideAction::Set(Value::from("x")))
            .unwrap_err();
        assert!(matches!(err, SynthError::InvalidOverridePath { .. }));
    }

    #[test]
    fn test_override_logical_id_validated() {
        let (mut tree, stack) = stack();
        let web = tree.declare(stack, Declaration::resource("aws_instance", "web")).unwrap();
        tree.override_logical_id(web, "frontend").unwrap();
        assert!(tree.override_logical_id(web, "has space").is_err());
        assert_eq!(tree.element(web).unwrap().logical_id.as_deref(), Some("frontend"));
    }

    #[test]
    fn test_explicit_dependency_recorded_once() {
        let (mut tree, stack) = stack();
        let a = tree.declare(stack, Declaration::resource("null_resource", "a")).unwrap();
        let b = tree.declare(stack, Declaration::resource("null_resource", "b")).unwrap();
        tree.add_dependency(b, a).unwrap();
        tree.add_dependency(b, a).unwrap();
        assert_eq!(tree.element(b).unwrap().depends_on, vec![a]);
        assert_eq!(tree.graph().edges(), vec![(b, a)]);
    }
}
