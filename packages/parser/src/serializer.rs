use matisse_dom::node::{ComponentTree, NodeId, PropertyValue};
use matisse_dom::registry::RenderStrategy;
use matisse_dom::schema::subtag_name;

/// Re-serialize a component tree back into markup.
///
/// Output is structural: tag nesting, properties and bindings survive a
/// parse/serialize round trip, whitespace does not.
pub struct Serializer<'t> {
    tree: &'t ComponentTree,
    out: String,
}

impl<'t> Serializer<'t> {
    pub fn new(tree: &'t ComponentTree) -> Self {
        Self {
            tree,
            out: String::new(),
        }
    }

    pub fn serialize(mut self, root: NodeId) -> String {
        // The root is caller-supplied, not part of the markup.
        for child in self.tree.node(root).children().to_vec() {
            self.write_node(child);
        }
        self.out
    }

    fn write_node(&mut self, id: NodeId) {
        let node = self.tree.node(id);

        if node.kind.strategy == RenderStrategy::Text {
            match node.bindings.get("value") {
                Some(expr) => self.out.push_str(expr.source()),
                None => {
                    if let Ok(value) = node.value_of("value") {
                        self.out.push_str(&value.render_string());
                    }
                }
            }
            return;
        }

        self.out.push('<');
        self.out.push_str(&node.tag_name);
        self.write_attributes(id);

        let slots = self.slot_entries(id);
        if node.children().is_empty() && slots.is_empty() {
            self.out.push_str("/>");
            return;
        }
        self.out.push('>');

        for slot in slots {
            self.write_slot(slot);
        }
        for child in node.children().to_vec() {
            self.write_node(child);
        }

        self.out.push_str("</");
        self.out.push_str(&node.tag_name);
        self.out.push('>');
    }

    fn write_attributes(&mut self, id: NodeId) {
        let node = self.tree.node(id);

        let mut literals: Vec<String> = Vec::new();
        for name in node.props().names() {
            if let Ok(Some(PropertyValue::Value(value))) = node.prop(name) {
                literals.push(format!("{}=\"{}\"", name, value.render_string()));
            }
        }
        literals.sort();

        let mut bindings: Vec<String> = node
            .bindings
            .iter()
            .map(|(name, expr)| format!("{}=\"{}\"", name, expr.source()))
            .collect();
        bindings.sort();

        for attr in literals.into_iter().chain(bindings) {
            self.out.push(' ');
            self.out.push_str(&attr);
        }
    }

    /// Property slots holding placeholder nodes, emitted as subtags. The
    /// placeholder keeps the tag name it was written with.
    fn slot_entries(&self, id: NodeId) -> Vec<NodeId> {
        let node = self.tree.node(id);
        let mut names: Vec<String> = node.props().names().map(str::to_string).collect();
        names.sort();

        let mut slots = Vec::new();
        for name in names {
            match node.prop(&name) {
                Ok(Some(PropertyValue::Node(slot))) => slots.push(*slot),
                Ok(Some(PropertyValue::Nodes(list))) => slots.extend(list.iter().copied()),
                _ => {}
            }
        }
        slots
    }

    fn write_slot(&mut self, id: NodeId) {
        // Finalize hooks may move regular children into a slot; only
        // placeholder nodes get subtag framing.
        if self.tree.node(id).meta_kind.is_none() {
            self.write_node(id);
            return;
        }
        let tag = subtag_name(&self.tree.node(id).tag_name);
        self.out.push('<');
        self.out.push_str(&tag);
        self.write_attributes(id);
        if self.tree.node(id).children().is_empty() {
            self.out.push_str("/>");
            return;
        }
        self.out.push('>');
        for child in self.tree.node(id).children().to_vec() {
            self.write_node(child);
        }
        self.out.push_str("</");
        self.out.push_str(&tag);
        self.out.push('>');
    }
}

pub fn serialize(tree: &ComponentTree, root: NodeId) -> String {
    Serializer::new(tree).serialize(root)
}
