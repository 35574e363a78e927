use crate::error::{ParseError, ParseResult};
use crate::scan::{find_tag, scan_attributes, RawAttr, RawTag};
use matisse_dom::node::{ComponentNode, ComponentTree, NodeId};
use matisse_dom::registry::{ComponentFactory, ComponentRegistry, RenderStrategy};
use matisse_dom::schema::{canonical_name, PropertyKind};
use matisse_dom::{Expression, IDGenerator, Value};

/// Scalar-property subtag being accumulated: `<Title>text...</Title>`.
struct ScalarContext {
    /// Canonical property name on the owning node.
    property: String,
    /// Tag name as written, checked against the closing tag.
    tag_name: String,
    value: String,
    start: usize,
}

/// Single-pass markup parser.
///
/// Builds the component tree in place under a caller-supplied parent node,
/// resolving each tag to a child component, a property subtag or a literal
/// text run. All failures are fatal; no partial tree is usable after an
/// error.
pub struct Parser<'a> {
    source: &'a str,
    pos: usize,
    registry: &'a ComponentRegistry,
    factory: &'a dyn ComponentFactory,
    ids: IDGenerator,
    scalar: Option<ScalarContext>,
}

impl<'a> Parser<'a> {
    pub fn new(
        source: &'a str,
        registry: &'a ComponentRegistry,
        factory: &'a dyn ComponentFactory,
        ids: IDGenerator,
    ) -> Self {
        Self {
            source,
            pos: 0,
            registry,
            factory,
            ids,
            scalar: None,
        }
    }

    /// Parse the whole source into `parent`'s subtree.
    pub fn parse_into(&mut self, tree: &mut ComponentTree, parent: NodeId) -> ParseResult<()> {
        let starting = parent;
        let mut current = parent;

        while let Some(tag) = find_tag(self.source, self.pos)? {
            let text = &self.source[self.pos..tag.start];
            if !text.is_empty() {
                self.handle_text(tree, current, text, self.pos)?;
            }
            self.pos = tag.end;

            if tag.closing {
                current = self.exit_tag(tree, current, starting, &tag)?;
            } else {
                current = self.enter_tag(tree, current, &tag)?;
            }
        }

        let trailing = &self.source[self.pos..];
        if !trailing.is_empty() {
            self.handle_text(tree, current, trailing, self.pos)?;
        }

        if let Some(scalar) = &self.scalar {
            return Err(ParseError::UnclosedTag {
                tag: scalar.tag_name.clone(),
                pos: scalar.start,
            });
        }
        if current != starting {
            return Err(ParseError::UnclosedTag {
                tag: tree.node(current).tag_name.clone(),
                pos: self.source.len(),
            });
        }

        text_optimize(tree, starting);
        Ok(())
    }

    /// Closing tag: commit a pending scalar or pop the current node.
    fn exit_tag(
        &mut self,
        tree: &mut ComponentTree,
        current: NodeId,
        starting: NodeId,
        tag: &RawTag,
    ) -> ParseResult<NodeId> {
        if !tag.attrs.is_empty() {
            return Err(ParseError::ClosingTagAttributes {
                name: tag.name.to_string(),
                start: tag.start,
                end: tag.end,
            });
        }

        if let Some(scalar) = self.scalar.take() {
            if tag.name != scalar.tag_name {
                return Err(ParseError::tag_mismatch(
                    tag.name,
                    &scalar.tag_name,
                    &tree.node(current).tag_name,
                    tag.start,
                    tag.end,
                ));
            }
            commit_scalar(tree, current, &scalar.property, scalar.value.trim())
                .map_err(|e| ParseError::schema(e, tag.start, tag.end))?;
            return Ok(current);
        }

        if current == starting {
            return Err(ParseError::StrayClosingTag {
                name: tag.name.to_string(),
                start: tag.start,
                end: tag.end,
            });
        }
        let expected = tree.node(current).tag_name.clone();
        if tag.name != expected {
            let component = match tree.node(current).parent() {
                Some(p) => tree.node(p).tag_name.clone(),
                None => expected.clone(),
            };
            return Err(ParseError::tag_mismatch(
                tag.name, expected, component, tag.start, tag.end,
            ));
        }

        self.finish_node(tree, current, tag)
    }

    /// Run the exit steps for a fully-parsed node and pop to its parent.
    fn finish_node(
        &mut self,
        tree: &mut ComponentTree,
        node: NodeId,
        tag: &RawTag,
    ) -> ParseResult<NodeId> {
        text_optimize(tree, node);
        if let Some(hook) = tree.node(node).kind.finalize {
            hook(tree, node).map_err(|e| ParseError::schema(e, tag.start, tag.end))?;
        }
        match tree.node(node).parent() {
            Some(parent) => Ok(parent),
            // Slot placeholder: attached to a property, not a child list.
            None => Err(ParseError::StrayClosingTag {
                name: tag.name.to_string(),
                start: tag.start,
                end: tag.end,
            }),
        }
    }

    /// Opening tag: subtag of the current node or a new child component.
    fn enter_tag(
        &mut self,
        tree: &mut ComponentTree,
        current: NodeId,
        tag: &RawTag,
    ) -> ParseResult<NodeId> {
        if let Some(scalar) = &self.scalar {
            return Err(ParseError::ComponentInsideScalar {
                tag: tag.name.to_string(),
                property: scalar.property.clone(),
                start: tag.start,
                end: tag.end,
            });
        }

        let in_metadata = is_metadata_context(tree, current);
        let property = canonical_name(tag.name);
        let is_subtag =
            in_metadata || tree.node(current).kind.schema.defines(&property, true);

        if is_subtag {
            self.enter_subtag(tree, current, tag, &property, in_metadata)
        } else {
            self.enter_child(tree, current, tag)
        }
    }

    fn enter_subtag(
        &mut self,
        tree: &mut ComponentTree,
        current: NodeId,
        tag: &RawTag,
        property: &str,
        in_metadata: bool,
    ) -> ParseResult<NodeId> {
        // Inside a metadata container every nested tag is structural data,
        // regardless of the container's schema.
        if in_metadata {
            let node = self.make_slot_node(tree, tag, PropertyKind::Metadata)?;
            tree.append_child(current, node)
                .map_err(|e| ParseError::schema(e, tag.start, tag.end))?;
            return if tag.self_closing {
                self.finish_node(tree, node, tag)
            } else {
                Ok(node)
            };
        }

        let kind = tree.node(current).kind.schema.kind_of(property);
        match kind {
            Some(PropertyKind::String) => {
                if tag.self_closing {
                    commit_scalar(tree, current, property, "")
                        .map_err(|e| ParseError::schema(e, tag.start, tag.end))?;
                } else {
                    self.scalar = Some(ScalarContext {
                        property: property.to_string(),
                        tag_name: tag.name.to_string(),
                        value: String::new(),
                        start: tag.start,
                    });
                }
                Ok(current)
            }
            Some(slot_kind @ (PropertyKind::Content | PropertyKind::Metadata)) => {
                let node = self.make_slot_node(tree, tag, slot_kind)?;
                tree.node_mut(current)
                    .set_slot_node(property, node)
                    .map_err(|e| ParseError::schema(e, tag.start, tag.end))?;
                tree.attach_to(node, current);
                if tag.self_closing {
                    self.finish_node(tree, node, tag)?;
                    Ok(current)
                } else {
                    Ok(node)
                }
            }
            Some(PropertyKind::Collection) => {
                let node = self.make_slot_node(tree, tag, PropertyKind::Collection)?;
                tree.node_mut(current)
                    .push_slot_node(property, node)
                    .map_err(|e| ParseError::schema(e, tag.start, tag.end))?;
                tree.attach_to(node, current);
                if tag.self_closing {
                    self.finish_node(tree, node, tag)?;
                    Ok(current)
                } else {
                    Ok(node)
                }
            }
            // defines(.., true) gated the reachable kinds already.
            _ => self.enter_child(tree, current, tag),
        }
    }

    /// Placeholder node filling a property slot or metadata child.
    fn make_slot_node(
        &mut self,
        tree: &mut ComponentTree,
        tag: &RawTag,
        kind: PropertyKind,
    ) -> ParseResult<NodeId> {
        let node = tree.insert(ComponentNode::new(
            self.registry.slot_kind(),
            tag.name,
            self.ids.new_id(),
        ));
        tree.node_mut(node).meta_kind = Some(kind);
        let attrs = scan_attributes(tag.attrs, tag.attrs_start)?;
        apply_attributes(tree, node, &attrs)?;
        Ok(node)
    }

    fn enter_child(
        &mut self,
        tree: &mut ComponentTree,
        current: NodeId,
        tag: &RawTag,
    ) -> ParseResult<NodeId> {
        // Under a closed-content component, an unregistered tag can only be
        // a misspelled subtag. The HTML passthrough applies where content is
        // unconstrained.
        if !self.registry.is_registered(tag.name) {
            let kind = &tree.node(current).kind;
            if !kind.open_content {
                let err = matisse_dom::SchemaError::unknown_property(
                    &tree.node(current).tag_name,
                    &canonical_name(tag.name),
                    tree.node(current).kind.schema.names(),
                );
                return Err(ParseError::schema(err, tag.start, tag.end));
            }
        }

        let node = self
            .factory
            .create(self.registry, tree, tag.name, self.ids.new_id());
        let attrs = scan_attributes(tag.attrs, tag.attrs_start)?;
        apply_attributes(tree, node, &attrs)?;
        tree.append_child(current, node)
            .map_err(|e| ParseError::schema(e, tag.start, tag.end))?;

        if tag.self_closing {
            self.finish_node(tree, node, tag)
        } else {
            Ok(node)
        }
    }

    /// Literal run between tags.
    fn handle_text(
        &mut self,
        tree: &mut ComponentTree,
        current: NodeId,
        text: &str,
        offset: usize,
    ) -> ParseResult<()> {
        if let Some(scalar) = &mut self.scalar {
            scalar.value.push_str(text);
            return Ok(());
        }

        // Literal runs are trimmed where they touch a tag boundary; spacing
        // around embedded bindings is preserved by the split below.
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(());
        }
        if !tree.node(current).kind.allows_children {
            // Leaf components with a `value` property take their tag content
            // as that property, the way `<Text>Hello</Text>` reads.
            let takes_value = matches!(
                tree.node(current).kind.schema.kind_of("value"),
                Some(PropertyKind::String | PropertyKind::Any)
            );
            if takes_value {
                commit_scalar(tree, current, "value", trimmed)
                    .map_err(|e| ParseError::schema(e, offset, offset + text.len()))?;
                return Ok(());
            }
            return Err(ParseError::LiteralNotAllowed {
                component: tree.node(current).tag_name.clone(),
                start: offset,
                end: offset + text.len(),
            });
        }

        for segment in split_text(trimmed) {
            let node = tree.insert(ComponentNode::new(
                self.registry.text_kind(),
                "Text",
                self.ids.new_id(),
            ));
            match segment {
                TextSegment::Literal(s) => {
                    tree.node_mut(node)
                        .init_prop("value", Value::from(s))
                        .map_err(|e| ParseError::schema(e, offset, offset + text.len()))?;
                }
                TextSegment::Binding(src) => {
                    tree.node_mut(node).add_binding("value", Expression::new(src));
                }
            }
            tree.append_child(current, node)
                .map_err(|e| ParseError::schema(e, offset, offset + text.len()))?;
        }
        Ok(())
    }
}

/// Parse a standalone template: creates a `Document` root and fills it.
pub fn parse(
    source: &str,
    registry: &ComponentRegistry,
    factory: &dyn ComponentFactory,
    template_name: &str,
) -> ParseResult<(ComponentTree, NodeId)> {
    let mut ids = IDGenerator::new(template_name);
    let mut tree = ComponentTree::new();
    let root = tree.insert(ComponentNode::new(
        registry.document_kind(),
        "Document",
        ids.new_id(),
    ));
    let mut parser = Parser::new(source, registry, factory, ids);
    parser.parse_into(&mut tree, root)?;
    Ok((tree, root))
}

fn is_metadata_context(tree: &ComponentTree, node: NodeId) -> bool {
    tree.node(node).meta_kind == Some(PropertyKind::Metadata)
        || tree.node(node).kind.name == "Metadata"
}

/// Classify attribute pairs into literal values and binding expressions.
fn apply_attributes(
    tree: &mut ComponentTree,
    node: NodeId,
    attrs: &[RawAttr],
) -> ParseResult<()> {
    for attr in attrs {
        match attr.value {
            Some(value) if Expression::is_binding(value) => {
                let declared = {
                    let n = tree.node(node);
                    n.kind.open_schema || n.kind.schema.defines(attr.name, false)
                };
                if !declared {
                    let n = tree.node(node);
                    let err = matisse_dom::SchemaError::unknown_property(
                        &n.tag_name,
                        attr.name,
                        n.kind.schema.names(),
                    );
                    return Err(ParseError::schema(
                        err,
                        attr.offset,
                        attr.offset + attr.name.len(),
                    ));
                }
                tree.node_mut(node)
                    .add_binding(attr.name, Expression::new(value));
            }
            Some(value) => {
                tree.node_mut(node)
                    .init_prop(attr.name, Value::from(value))
                    .map_err(|e| {
                        ParseError::schema(e, attr.offset, attr.offset + attr.name.len())
                    })?;
            }
            None => {
                tree.node_mut(node)
                    .init_prop(attr.name, Value::Bool(true))
                    .map_err(|e| {
                        ParseError::schema(e, attr.offset, attr.offset + attr.name.len())
                    })?;
            }
        }
    }
    Ok(())
}

/// Store an accumulated scalar subtag: binding syntax becomes a binding,
/// anything else a literal value.
fn commit_scalar(
    tree: &mut ComponentTree,
    owner: NodeId,
    property: &str,
    value: &str,
) -> matisse_dom::SchemaResult<()> {
    if Expression::is_binding(value) {
        // Subtag check already proved the property is declared.
        tree.node_mut(owner)
            .add_binding(property, Expression::new(value));
        Ok(())
    } else {
        tree.node_mut(owner).init_prop(property, Value::from(value))
    }
}

enum TextSegment<'src> {
    Literal(&'src str),
    Binding(&'src str),
}

/// Split a literal run so each binding occupies its own segment.
fn split_text(text: &str) -> Vec<TextSegment<'_>> {
    let mut segments = Vec::new();
    let mut pos = 0;
    while let Some((start, end, _raw)) = matisse_dom::expression::find_binding(text, pos) {
        if start > pos {
            segments.push(TextSegment::Literal(&text[pos..start]));
        }
        segments.push(TextSegment::Binding(&text[start..end]));
        pos = end;
    }
    if pos < text.len() {
        segments.push(TextSegment::Literal(&text[pos..]));
    }
    segments
}

/// Merge adjacent plain text leaves.
///
/// Only leaves with no bindings and no post-creation mutation participate;
/// running the pass twice yields the same tree as once.
pub fn text_optimize(tree: &mut ComponentTree, parent: NodeId) {
    let children = tree.node(parent).children().to_vec();
    let mut kept: Vec<NodeId> = Vec::with_capacity(children.len());

    for child in children {
        if let Some(&prev) = kept.last() {
            if is_plain_text(tree, prev) && is_plain_text(tree, child) {
                if let Ok(value) = tree.node(child).value_of("value") {
                    tree.node_mut(prev).append_text_value(&value.render_string());
                    continue;
                }
            }
        }
        kept.push(child);
    }
    tree.set_children(parent, kept);
}

fn is_plain_text(tree: &ComponentTree, node: NodeId) -> bool {
    let n = tree.node(node);
    n.kind.strategy == RenderStrategy::Text
        && n.bindings.is_empty()
        && !n.props().is_modified()
}
