use crate::error::SchemaResult;
use crate::node::{ComponentNode, ComponentTree, NodeId};
use crate::schema::{PropertyKind, PropertySchema};
use std::collections::HashMap;
use std::sync::Arc;

/// How the renderer turns a node of this kind into output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStrategy {
    /// Render the children sequence in order.
    Children,
    /// Emit the node's `value` property as text.
    Text,
    /// Emit a plain HTML element: tag, attributes, children.
    Html,
    /// Conditional: render the `then` or `else` slot.
    If,
    /// Iterate the `of` property, rendering children once per item.
    Repeat,
    /// Produces no output; structural data read by other components.
    Nothing,
}

/// Rewrite applied to a node when its closing tag is reached, after all
/// children and properties are in place.
pub type FinalizeHook = fn(&mut ComponentTree, NodeId) -> SchemaResult<()>;

/// Immutable description of one component kind, shared by all instances.
#[derive(Clone)]
pub struct ComponentKind {
    pub name: String,
    pub schema: PropertySchema,
    pub strategy: RenderStrategy,
    pub allows_children: bool,
    /// Open-schema kinds accept any property name; used by the HTML
    /// passthrough kind and metadata containers.
    pub open_schema: bool,
    /// Open-content kinds accept unregistered child tags as plain HTML.
    /// Closed kinds treat them as misspelled subtags.
    pub open_content: bool,
    pub finalize: Option<FinalizeHook>,
}

impl ComponentKind {
    pub fn new(
        name: &str,
        schema: PropertySchema,
        strategy: RenderStrategy,
        allows_children: bool,
    ) -> Self {
        Self {
            name: name.to_string(),
            schema,
            strategy,
            allows_children,
            open_schema: false,
            open_content: false,
            finalize: None,
        }
    }

    /// A child-rendering component with a closed schema.
    pub fn container(name: &str, schema: PropertySchema) -> Self {
        Self::new(name, schema, RenderStrategy::Children, true)
    }

    pub fn with_finalize(mut self, hook: FinalizeHook) -> Self {
        self.finalize = Some(hook);
        self
    }

    pub fn with_open_schema(mut self) -> Self {
        self.open_schema = true;
        self
    }

    pub fn with_open_content(mut self) -> Self {
        self.open_content = true;
        self
    }
}

impl std::fmt::Debug for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentKind")
            .field("name", &self.name)
            .field("strategy", &self.strategy)
            .field("allows_children", &self.allows_children)
            .field("open_schema", &self.open_schema)
            .field("finalize", &self.finalize.is_some())
            .finish()
    }
}

/// Maps tag names to component kinds.
///
/// Unknown capitalized tags resolve to the HTML passthrough kind, so markup
/// may freely mix components with plain elements.
pub struct ComponentRegistry {
    kinds: HashMap<String, Arc<ComponentKind>>,
    html: Arc<ComponentKind>,
    slot: Arc<ComponentKind>,
}

impl ComponentRegistry {
    /// Registry pre-loaded with the core tags: `Document`, `Text`, `If`,
    /// `Repeat` and `Metadata`.
    pub fn with_core_tags() -> Self {
        let mut registry = Self {
            kinds: HashMap::new(),
            html: Arc::new(
                ComponentKind::new("Html", PropertySchema::new(), RenderStrategy::Html, true)
                    .with_open_schema()
                    .with_open_content(),
            ),
            slot: Arc::new(
                ComponentKind::new("Slot", PropertySchema::new(), RenderStrategy::Children, true)
                    .with_open_schema()
                    .with_open_content(),
            ),
        };

        registry.register(
            "Document",
            ComponentKind::container("Document", PropertySchema::new()).with_open_content(),
        );
        registry.register(
            "Text",
            ComponentKind::new(
                "Text",
                PropertySchema::new().prop("value", PropertyKind::Any),
                RenderStrategy::Text,
                false,
            ),
        );
        registry.register(
            "If",
            ComponentKind::new(
                "If",
                PropertySchema::new()
                    .prop("condition", PropertyKind::Any)
                    .prop("then", PropertyKind::Content)
                    .prop("else", PropertyKind::Content),
                RenderStrategy::If,
                true,
            )
            .with_open_content()
            .with_finalize(finalize_if),
        );
        registry.register(
            "Repeat",
            ComponentKind::new(
                "Repeat",
                PropertySchema::new()
                    .prop("of", PropertyKind::Any)
                    .prop("as", PropertyKind::String)
                    .prop("noData", PropertyKind::Content),
                RenderStrategy::Repeat,
                true,
            )
            .with_open_content(),
        );
        registry.register(
            "Metadata",
            ComponentKind::new(
                "Metadata",
                PropertySchema::new(),
                RenderStrategy::Nothing,
                true,
            )
            .with_open_schema(),
        );

        registry
    }

    pub fn register(&mut self, tag: &str, kind: ComponentKind) {
        self.kinds.insert(tag.to_string(), Arc::new(kind));
    }

    /// Resolve a tag to its kind; unregistered tags fall back to the HTML
    /// passthrough kind.
    pub fn resolve(&self, tag: &str) -> Arc<ComponentKind> {
        self.kinds
            .get(tag)
            .cloned()
            .unwrap_or_else(|| self.html.clone())
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.kinds.contains_key(tag)
    }

    /// Kind used for property-slot placeholder nodes created by subtags.
    pub fn slot_kind(&self) -> Arc<ComponentKind> {
        self.slot.clone()
    }

    pub fn document_kind(&self) -> Arc<ComponentKind> {
        self.resolve("Document")
    }

    pub fn text_kind(&self) -> Arc<ComponentKind> {
        self.resolve("Text")
    }

    pub fn metadata_kind(&self) -> Arc<ComponentKind> {
        self.resolve("Metadata")
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::with_core_tags()
    }
}

/// Loose children of an `If` become its `then` content when no explicit
/// `Then` subtag was given.
fn finalize_if(tree: &mut ComponentTree, id: NodeId) -> SchemaResult<()> {
    if tree.node(id).children().is_empty() || tree.node(id).prop("then")?.is_some() {
        return Ok(());
    }
    let children: Vec<NodeId> = tree.node(id).children().to_vec();
    tree.set_children(id, Vec::new());
    for child in children {
        tree.node_mut(id).push_slot_node("then", child)?;
    }
    Ok(())
}

/// Instantiation seam between the parser and the component model.
///
/// The default factory consults the registry; an embedding application can
/// substitute its own to intercept node creation.
pub trait ComponentFactory {
    fn create(
        &self,
        registry: &ComponentRegistry,
        tree: &mut ComponentTree,
        tag: &str,
        id: String,
    ) -> NodeId;
}

pub struct DefaultFactory;

impl ComponentFactory for DefaultFactory {
    fn create(
        &self,
        registry: &ComponentRegistry,
        tree: &mut ComponentTree,
        tag: &str,
        id: String,
    ) -> NodeId {
        let kind = registry.resolve(tag);
        tree.insert(ComponentNode::new(kind, tag, id))
    }
}
