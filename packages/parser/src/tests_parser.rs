use crate::error::ParseError;
use crate::parser::{parse, text_optimize};
use crate::serializer::serialize;
use matisse_dom::node::{ComponentNode, ComponentTree, NodeId, PropertyValue};
use matisse_dom::registry::{
    ComponentKind, ComponentRegistry, DefaultFactory, RenderStrategy,
};
use matisse_dom::schema::{PropertyKind, PropertySchema};
use matisse_dom::{SchemaError, Value};

fn test_registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::with_core_tags();
    registry.register(
        "Panel",
        ComponentKind::container(
            "Panel",
            PropertySchema::new()
                .prop("title", PropertyKind::String)
                .prop("header", PropertyKind::Content)
                .prop("items", PropertyKind::Collection)
                .prop("model", PropertyKind::Metadata)
                .prop("anchor", PropertyKind::Id),
        ),
    );
    registry.register(
        "Image",
        ComponentKind::new(
            "Image",
            PropertySchema::new().prop("src", PropertyKind::String),
            RenderStrategy::Html,
            false,
        ),
    );
    registry
}

fn parse_src(source: &str) -> (ComponentTree, NodeId) {
    parse(source, &test_registry(), &DefaultFactory, "test.html").unwrap()
}

fn parse_err(source: &str) -> ParseError {
    parse(source, &test_registry(), &DefaultFactory, "test.html").unwrap_err()
}

#[test]
fn test_simple_component_with_text() {
    let (tree, root) = parse_src("<Panel title=\"Home\">Hello</Panel>");
    let panel = tree.node(root).children()[0];
    assert_eq!(tree.node(panel).tag_name, "Panel");
    assert_eq!(
        tree.node(panel).value_of("title").unwrap(),
        Value::from("Home")
    );

    let text = tree.node(panel).children()[0];
    assert_eq!(
        tree.node(text).value_of("value").unwrap(),
        Value::from("Hello")
    );
}

#[test]
fn test_binding_attribute_goes_to_bindings_map() {
    let (tree, root) = parse_src("<Panel title=\"{{ pageTitle }}\"/>");
    let panel = tree.node(root).children()[0];
    assert!(tree.node(panel).has_binding("title"));
    // The literal map stays empty; the binding has not been evaluated yet.
    assert_eq!(tree.node(panel).value_of("title").unwrap(), Value::Null);
}

#[test]
fn test_single_brace_attribute_is_binding() {
    // Any brace in an attribute value marks an expression.
    let (tree, root) = parse_src("<Panel title=\"{x}\"/>");
    let panel = tree.node(root).children()[0];
    assert!(tree.node(panel).has_binding("title"));
}

#[test]
fn test_literal_attribute_stays_literal() {
    let (tree, root) = parse_src("<Panel title=\"plain\"/>");
    let panel = tree.node(root).children()[0];
    assert!(!tree.node(panel).has_binding("title"));
    assert_eq!(
        tree.node(panel).value_of("title").unwrap(),
        Value::from("plain")
    );
}

#[test]
fn test_bare_attribute_is_boolean_true() {
    let (tree, root) = parse_src("<Section hidden/>");
    let section = tree.node(root).children()[0];
    assert_eq!(
        tree.node(section).value_of("hidden").unwrap(),
        Value::Bool(true)
    );
}

#[test]
fn test_scalar_subtag_equivalent_to_attribute() {
    let (tree_a, root_a) = parse_src("<Panel><Title>hello</Title></Panel>");
    let (tree_b, root_b) = parse_src("<Panel title=\"hello\"/>");
    let a = tree_a.node(root_a).children()[0];
    let b = tree_b.node(root_b).children()[0];
    assert_eq!(
        tree_a.node(a).value_of("title").unwrap(),
        tree_b.node(b).value_of("title").unwrap()
    );
}

#[test]
fn test_scalar_subtag_with_binding_body() {
    let (tree, root) = parse_src("<Panel><Title>{{ pageTitle }}</Title></Panel>");
    let panel = tree.node(root).children()[0];
    assert!(tree.node(panel).has_binding("title"));
}

#[test]
fn test_component_inside_scalar_fails() {
    let err = parse_err("<Panel><Title>a<Image src=\"x\"/>b</Title></Panel>");
    match err {
        ParseError::ComponentInsideScalar { tag, property, .. } => {
            assert_eq!(tag, "Image");
            assert_eq!(property, "title");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_unknown_subtag_names_expected_set() {
    let err = parse_err("<Panel><Bogus>x</Bogus></Panel>");
    match err {
        ParseError::Schema {
            source: SchemaError::UnknownProperty { name, expected, .. },
            ..
        } => {
            assert_eq!(name, "bogus");
            assert!(expected.contains("title"));
            assert!(expected.contains("header"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_unknown_attribute_fails() {
    let err = parse_err("<Panel bogus=\"x\"/>");
    assert!(matches!(
        err,
        ParseError::Schema {
            source: SchemaError::UnknownProperty { .. },
            ..
        }
    ));
}

#[test]
fn test_closing_tag_mismatch_names_both_tags() {
    let err = parse_err("<Panel>x</Wrong>");
    match err {
        ParseError::TagMismatch {
            found, expected, ..
        } => {
            assert_eq!(found, "Wrong");
            assert_eq!(expected, "Panel");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_unclosed_tag_fails() {
    let err = parse_err("<Panel>abc");
    assert!(matches!(err, ParseError::UnclosedTag { ref tag, .. } if tag == "Panel"));
}

#[test]
fn test_stray_closing_tag_fails() {
    let err = parse_err("abc</Panel>");
    assert!(matches!(err, ParseError::StrayClosingTag { .. }));
}

#[test]
fn test_closing_tag_with_attributes_fails() {
    let err = parse_err("<Panel></Panel title=\"x\">");
    assert!(matches!(err, ParseError::ClosingTagAttributes { .. }));
}

#[test]
fn test_literal_inside_childless_component_fails() {
    let err = parse_err("<Image src=\"x\">stray</Image>");
    match err {
        ParseError::LiteralNotAllowed { component, .. } => assert_eq!(component, "Image"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_content_subtag_fills_slot() {
    let (tree, root) = parse_src("<Panel><Header>Hi</Header></Panel>");
    let panel = tree.node(root).children()[0];
    let slot = tree.node(panel).slot_of("header").unwrap().unwrap();
    assert_eq!(tree.node(slot).parent(), Some(panel));
    let text = tree.node(slot).children()[0];
    assert_eq!(tree.node(text).value_of("value").unwrap(), Value::from("Hi"));
    // Slot placeholders are not regular children.
    assert_eq!(tree.node(panel).children().len(), 0);
}

#[test]
fn test_collection_subtags_append() {
    let (tree, root) =
        parse_src("<Panel><Items label=\"a\"/><Items label=\"b\"/></Panel>");
    let panel = tree.node(root).children()[0];
    match tree.node(panel).prop("items").unwrap() {
        Some(PropertyValue::Nodes(list)) => {
            assert_eq!(list.len(), 2);
            assert_eq!(
                tree.node(list[0]).value_of("label").unwrap(),
                Value::from("a")
            );
            assert_eq!(
                tree.node(list[1]).value_of("label").unwrap(),
                Value::from("b")
            );
        }
        other => panic!("unexpected property value: {other:?}"),
    }
}

#[test]
fn test_metadata_nests_arbitrary_tags() {
    let (tree, root) =
        parse_src("<Panel><Model><Field name=\"id\"/><Field name=\"title\"/></Model></Panel>");
    let panel = tree.node(root).children()[0];
    let model = tree.node(panel).slot_of("model").unwrap().unwrap();
    assert_eq!(tree.node(model).children().len(), 2);

    let field = tree.node(model).children()[0];
    assert_eq!(tree.node(field).tag_name, "Field");
    assert_eq!(
        tree.node(field).value_of("name").unwrap(),
        Value::from("id")
    );
    assert_eq!(tree.node(field).meta_kind, Some(PropertyKind::Metadata));
}

#[test]
fn test_collection_item_holds_ordinary_content() {
    // Collection slots carry content, not metadata: nested tags resolve as
    // regular children of the item node.
    let (tree, root) =
        parse_src("<Panel><Items label=\"a\"><Image src=\"x\"/>inner</Items></Panel>");
    let panel = tree.node(root).children()[0];
    let item = match tree.node(panel).prop("items").unwrap() {
        Some(PropertyValue::Nodes(list)) => list[0],
        other => panic!("unexpected property value: {other:?}"),
    };
    assert_eq!(tree.node(item).meta_kind, Some(PropertyKind::Collection));

    let children = tree.node(item).children();
    assert_eq!(children.len(), 2);
    assert_eq!(tree.node(children[0]).tag_name, "Image");
    assert_eq!(tree.node(children[0]).meta_kind, None);
    assert_eq!(
        tree.node(children[1]).value_of("value").unwrap(),
        Value::from("inner")
    );
}

#[test]
fn test_metadata_nesting_deep() {
    let (tree, root) =
        parse_src("<Panel><Model><Row><Cell v=\"1\"/></Row></Model></Panel>");
    let panel = tree.node(root).children()[0];
    let model = tree.node(panel).slot_of("model").unwrap().unwrap();
    let row = tree.node(model).children()[0];
    let cell = tree.node(row).children()[0];
    assert_eq!(tree.node(row).meta_kind, Some(PropertyKind::Metadata));
    assert_eq!(tree.node(cell).meta_kind, Some(PropertyKind::Metadata));
}

#[test]
fn test_text_binding_splits_into_leaves() {
    let (tree, root) = parse_src("<Panel>Hello {{ name }}!</Panel>");
    let panel = tree.node(root).children()[0];
    let children = tree.node(panel).children();
    assert_eq!(children.len(), 3);
    assert_eq!(
        tree.node(children[0]).value_of("value").unwrap(),
        Value::from("Hello ")
    );
    assert!(tree.node(children[1]).has_binding("value"));
    assert_eq!(
        tree.node(children[2]).value_of("value").unwrap(),
        Value::from("!")
    );
}

#[test]
fn test_raw_binding_delimiters_survive_parse() {
    let (tree, root) = parse_src("<Panel>{!! html !!}</Panel>");
    let panel = tree.node(root).children()[0];
    let leaf = tree.node(panel).children()[0];
    let expr = tree.node(leaf).bindings.get("value").unwrap();
    assert!(expr.is_raw());
}

#[test]
fn test_newline_whitespace_around_tags_is_trimmed() {
    let (tree, root) = parse_src("<Panel>\n    Hello\n</Panel>");
    let panel = tree.node(root).children()[0];
    assert_eq!(tree.node(panel).children().len(), 1);
    let text = tree.node(panel).children()[0];
    assert_eq!(
        tree.node(text).value_of("value").unwrap(),
        Value::from("Hello")
    );
}

#[test]
fn test_inline_whitespace_at_tag_boundary_is_trimmed() {
    let (tree, root) = parse_src("<Panel> Hello </Panel>");
    let panel = tree.node(root).children()[0];
    let text = tree.node(panel).children()[0];
    assert_eq!(
        tree.node(text).value_of("value").unwrap(),
        Value::from("Hello")
    );
}

#[test]
fn test_spacing_around_embedded_binding_survives() {
    let (tree, root) = parse_src("<Panel> Hello {{ name }} </Panel>");
    let panel = tree.node(root).children()[0];
    let children = tree.node(panel).children();
    assert_eq!(children.len(), 2);
    // Only the run's outer edges are trimmed.
    assert_eq!(
        tree.node(children[0]).value_of("value").unwrap(),
        Value::from("Hello ")
    );
    assert!(tree.node(children[1]).has_binding("value"));
}

#[test]
fn test_unknown_tag_is_html_passthrough_at_top_level() {
    let (tree, root) = parse_src("<Section class=\"wide\">x</Section>");
    let section = tree.node(root).children()[0];
    assert_eq!(tree.node(section).kind.strategy, RenderStrategy::Html);
    assert_eq!(
        tree.node(section).value_of("class").unwrap(),
        Value::from("wide")
    );
}

#[test]
fn test_if_loose_children_become_then_content() {
    let (tree, root) = parse_src("<If condition=\"{{ ok }}\">yes</If>");
    let cond = tree.node(root).children()[0];
    assert!(tree.node(cond).children().is_empty());
    match tree.node(cond).prop("then").unwrap() {
        Some(PropertyValue::Nodes(list)) => assert_eq!(list.len(), 1),
        other => panic!("unexpected slot: {other:?}"),
    }
}

#[test]
fn test_text_optimize_merges_plain_neighbors() {
    let registry = test_registry();
    let mut tree = ComponentTree::new();
    let root = tree.insert(ComponentNode::new(
        registry.document_kind(),
        "Document",
        "t-1".into(),
    ));
    for (i, s) in ["a", "b", "c"].iter().enumerate() {
        let leaf = tree.insert(ComponentNode::new(
            registry.text_kind(),
            "Text",
            format!("t-{}", i + 2),
        ));
        tree.node_mut(leaf).init_prop("value", Value::from(*s)).unwrap();
        tree.append_child(root, leaf).unwrap();
    }

    text_optimize(&mut tree, root);
    assert_eq!(tree.node(root).children().len(), 1);
    let merged = tree.node(root).children()[0];
    assert_eq!(
        tree.node(merged).value_of("value").unwrap(),
        Value::from("abc")
    );

    // Idempotent.
    text_optimize(&mut tree, root);
    assert_eq!(tree.node(root).children().len(), 1);
    assert_eq!(
        tree.node(tree.node(root).children()[0])
            .value_of("value")
            .unwrap(),
        Value::from("abc")
    );
}

#[test]
fn test_text_optimize_skips_bound_and_modified_leaves() {
    let registry = test_registry();
    let mut tree = ComponentTree::new();
    let root = tree.insert(ComponentNode::new(
        registry.document_kind(),
        "Document",
        "t-1".into(),
    ));

    let plain = tree.insert(ComponentNode::new(registry.text_kind(), "Text", "t-2".into()));
    tree.node_mut(plain).init_prop("value", Value::from("a")).unwrap();
    let bound = tree.insert(ComponentNode::new(registry.text_kind(), "Text", "t-3".into()));
    tree.node_mut(bound)
        .add_binding("value", matisse_dom::Expression::new("{{ x }}"));
    let touched = tree.insert(ComponentNode::new(registry.text_kind(), "Text", "t-4".into()));
    tree.node_mut(touched).set_prop("value", Value::from("b")).unwrap();

    tree.append_child(root, plain).unwrap();
    tree.append_child(root, bound).unwrap();
    tree.append_child(root, touched).unwrap();

    text_optimize(&mut tree, root);
    assert_eq!(tree.node(root).children().len(), 3);
}

#[test]
fn test_structural_round_trip() {
    let source = "<Panel title=\"Home\" subtitle=\"{{ sub }}\">\
                  <Header>Hi</Header>\
                  <Items label=\"a\"/>\
                  <Section>text {{ x }}</Section>\
                  </Panel>";
    // subtitle is undeclared on Panel; use a schema-free wrapper instead.
    let source = source.replace("Panel", "Wrapper");

    let registry = test_registry();
    let (tree, root) = parse(&source, &registry, &DefaultFactory, "a.html").unwrap();
    let first = serialize(&tree, root);
    let (tree2, root2) = parse(&first, &registry, &DefaultFactory, "a.html").unwrap();
    let second = serialize(&tree2, root2);
    assert_eq!(first, second);
}

#[test]
fn test_self_closing_component() {
    let (tree, root) = parse_src("<Panel title=\"a\"/><Panel title=\"b\"/>");
    assert_eq!(tree.node(root).children().len(), 2);
}
