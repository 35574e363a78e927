use crate::error::{SchemaError, SchemaResult};
use crate::expression::Expression;
use crate::registry::ComponentKind;
use crate::schema::{canonical_name, PropertyKind};
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Handle to a node inside a [`ComponentTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Current value of one declared property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Scalar/any value, literal or produced by binding evaluation.
    Value(Value),
    /// Content or metadata placeholder node.
    Node(NodeId),
    /// Ordered collection of placeholder nodes; subtag form appends.
    Nodes(Vec<NodeId>),
}

/// Property storage validated against the owning kind's schema.
///
/// The `modified` flag records post-creation mutation; the parser's text
/// optimization only merges nodes that were never touched after creation.
#[derive(Debug, Clone, Default)]
pub struct PropertyBag {
    values: HashMap<String, PropertyValue>,
    modified: bool,
}

impl PropertyBag {
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// One element of the parsed markup tree.
#[derive(Debug)]
pub struct ComponentNode {
    pub id: String,
    pub tag_name: String,
    pub kind: Arc<ComponentKind>,
    props: PropertyBag,
    pub bindings: HashMap<String, Expression>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) parent: Option<NodeId>,
    /// The node's own view model; consulted first during scope-chain lookup.
    pub view_model: Option<Value>,
    /// Set on metadata placeholder nodes: the declared kind of the property
    /// slot this node fills.
    pub meta_kind: Option<PropertyKind>,
}

impl ComponentNode {
    pub fn new(kind: Arc<ComponentKind>, tag_name: impl Into<String>, id: String) -> Self {
        Self {
            id,
            tag_name: tag_name.into(),
            kind,
            props: PropertyBag::default(),
            bindings: HashMap::new(),
            children: Vec::new(),
            parent: None,
            view_model: None,
            meta_kind: None,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn props(&self) -> &PropertyBag {
        &self.props
    }

    /// Validate a property name against this node's schema.
    fn check_declared(&self, name: &str) -> SchemaResult<()> {
        if self.kind.open_schema || self.kind.schema.defines(name, false) {
            Ok(())
        } else if self.kind.schema.is_empty() {
            Err(SchemaError::PropertiesNotSupported {
                component: self.tag_name.clone(),
            })
        } else {
            Err(SchemaError::unknown_property(
                &self.tag_name,
                name,
                self.kind.schema.names(),
            ))
        }
    }

    /// Assign a scalar/any property value, failing on undeclared names.
    pub fn set_prop(&mut self, name: &str, value: Value) -> SchemaResult<()> {
        self.set_prop_value(name, value)?;
        self.props.modified = true;
        Ok(())
    }

    /// Assignment used during node construction; does not count as a
    /// post-creation mutation.
    pub fn init_prop(&mut self, name: &str, value: Value) -> SchemaResult<()> {
        self.set_prop_value(name, value)
    }

    fn set_prop_value(&mut self, name: &str, value: Value) -> SchemaResult<()> {
        self.check_declared(name)?;
        let name = canonical_name(name);
        if self.kind.schema.kind_of(&name) == Some(PropertyKind::Id) {
            let valid = value
                .as_str()
                .map(is_identifier)
                .unwrap_or(false);
            if !valid {
                return Err(SchemaError::InvalidIdentifier {
                    component: self.tag_name.clone(),
                    name,
                    value: value.render_string(),
                });
            }
        }
        self.props.values.insert(name, PropertyValue::Value(value));
        Ok(())
    }

    /// Fill a content/metadata property slot with a placeholder node.
    pub fn set_slot_node(&mut self, name: &str, node: NodeId) -> SchemaResult<()> {
        self.check_declared(name)?;
        self.props
            .values
            .insert(canonical_name(name), PropertyValue::Node(node));
        Ok(())
    }

    /// Append to a collection property slot, creating the list on first use.
    pub fn push_slot_node(&mut self, name: &str, node: NodeId) -> SchemaResult<()> {
        self.check_declared(name)?;
        let entry = self
            .props
            .values
            .entry(canonical_name(name))
            .or_insert_with(|| PropertyValue::Nodes(Vec::new()));
        match entry {
            PropertyValue::Nodes(list) => list.push(node),
            other => *other = PropertyValue::Nodes(vec![node]),
        }
        Ok(())
    }

    /// Read a property, failing on undeclared names; `None` means declared
    /// but unset.
    pub fn prop(&self, name: &str) -> SchemaResult<Option<&PropertyValue>> {
        self.check_declared(name)?;
        Ok(self.props.values.get(&canonical_name(name)))
    }

    /// Scalar value of a property, `Value::Null` when unset.
    pub fn value_of(&self, name: &str) -> SchemaResult<Value> {
        Ok(match self.prop(name)? {
            Some(PropertyValue::Value(v)) => v.clone(),
            _ => Value::Null,
        })
    }

    /// Content slot of a property, if filled.
    pub fn slot_of(&self, name: &str) -> SchemaResult<Option<NodeId>> {
        Ok(match self.prop(name)? {
            Some(PropertyValue::Node(id)) => Some(*id),
            _ => None,
        })
    }

    pub fn has_binding(&self, name: &str) -> bool {
        self.bindings.contains_key(&canonical_name(name))
    }

    pub fn add_binding(&mut self, name: &str, expression: Expression) {
        self.bindings.insert(canonical_name(name), expression);
    }

    /// String payload append used by text optimization; exempt from both
    /// schema checks (the text kind declares `value`) and the modified flag.
    pub fn append_text_value(&mut self, text: &str) {
        let entry = self
            .props
            .values
            .entry("value".to_string())
            .or_insert_with(|| PropertyValue::Value(Value::String(String::new())));
        if let PropertyValue::Value(Value::String(s)) = entry {
            s.push_str(text);
        }
    }
}

/// Arena-backed component tree.
///
/// Nodes are owned by the arena; `children` sequences and property slots
/// reference them by [`NodeId`]. Detached nodes simply become unreachable.
#[derive(Debug, Default)]
pub struct ComponentTree {
    nodes: Vec<ComponentNode>,
}

impl ComponentTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a detached node, returning its handle.
    pub fn insert(&mut self, node: ComponentNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> &ComponentNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut ComponentNode {
        &mut self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Append `child` to `parent`'s children, enforcing `allows_children` at
    /// the node level so no code path can bypass it.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> SchemaResult<()> {
        if !self.node(parent).kind.allows_children {
            return Err(SchemaError::ChildrenNotAllowed {
                component: self.node(parent).tag_name.clone(),
            });
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        Ok(())
    }

    /// Set only the parent back-reference; used for property-slot placeholder
    /// nodes, which hang off a property rather than the children sequence.
    pub fn attach_to(&mut self, child: NodeId, parent: NodeId) {
        self.nodes[child.0].parent = Some(parent);
    }

    /// Remove a node from its parent's children sequence.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != id);
        }
    }

    pub fn set_children(&mut self, id: NodeId, children: Vec<NodeId>) {
        self.nodes[id.0].children = children;
    }

    /// Ancestor chain from `id` (exclusive) to the root.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = self.node(id).parent;
        while let Some(node) = current {
            chain.push(node);
            current = self.node(node).parent;
        }
        chain
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
