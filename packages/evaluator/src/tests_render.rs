use crate::error::RenderError;
use crate::evaluator::Evaluator;
use matisse_dom::node::{ComponentTree, NodeId};
use matisse_dom::registry::{ComponentKind, ComponentRegistry, DefaultFactory};
use matisse_dom::schema::{PropertyKind, PropertySchema};
use matisse_dom::Value;
use matisse_parser::parse;
use serde_json::json;

fn test_registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::with_core_tags();
    registry.register(
        "Panel",
        ComponentKind::container(
            "Panel",
            PropertySchema::new()
                .prop("title", PropertyKind::String)
                .prop("header", PropertyKind::Content),
        ),
    );
    registry
}

fn parse_src(source: &str) -> (ComponentTree, NodeId) {
    parse(source, &test_registry(), &DefaultFactory, "test.html").unwrap()
}

fn render_with(source: &str, view_model: serde_json::Value) -> String {
    let (mut tree, root) = parse_src(source);
    let evaluator = Evaluator::new().with_view_model(Value::from(view_model));
    evaluator.render(&mut tree, root).unwrap()
}

#[test]
fn test_e2e_panel_binding() {
    let (mut tree, root) = parse_src("<Panel title=\"{{ pageTitle }}\"><Text>Hello</Text></Panel>");
    let panel = tree.node(root).children()[0];
    assert!(tree.node(panel).has_binding("title"));
    assert_eq!(tree.node(panel).children().len(), 1);

    let evaluator =
        Evaluator::new().with_view_model(Value::object([("pageTitle", Value::from("Home"))]));
    let html = evaluator.render(&mut tree, root).unwrap();

    // Binding evaluation wrote the resolved value into the property map.
    assert_eq!(
        tree.node(panel).value_of("title").unwrap(),
        Value::from("Home")
    );
    assert_eq!(html, "Hello");
}

#[test]
fn test_scope_chain_falls_back_to_ancestors() {
    let (mut tree, root) = parse_src("<Section>{{ field }}</Section>");
    let section = tree.node(root).children()[0];
    tree.node_mut(section).view_model =
        Some(Value::object([("field", Value::from("from-parent"))]));
    let text = tree.node(section).children()[0];
    assert!(tree.node(text).view_model.is_none());

    let html = Evaluator::new().render(&mut tree, root).unwrap();
    assert_eq!(html, "<section>from-parent</section>");
}

#[test]
fn test_nearest_scope_wins() {
    let (mut tree, root) = parse_src("<Section><Div>{{ field }}</Div></Section>");
    let section = tree.node(root).children()[0];
    let div = tree.node(section).children()[0];
    tree.node_mut(section).view_model = Some(Value::object([("field", Value::from("outer"))]));
    tree.node_mut(div).view_model = Some(Value::object([("field", Value::from("inner"))]));

    let html = Evaluator::new().render(&mut tree, root).unwrap();
    assert_eq!(html, "<section><div>inner</div></section>");
}

#[test]
fn test_absent_field_renders_empty() {
    let html = render_with("<Span>[{{ missing }}]</Span>", json!({}));
    assert_eq!(html, "<span>[]</span>");
}

#[test]
fn test_escaped_vs_raw_output() {
    let vm = json!({"markup": "<b>bold & free</b>"});
    assert_eq!(
        render_with("{{ markup }}", vm.clone()),
        "&lt;b&gt;bold &amp; free&lt;/b&gt;"
    );
    assert_eq!(render_with("{!! markup !!}", vm), "<b>bold & free</b>");
}

#[test]
fn test_literal_text_not_escaped() {
    let html = render_with("<Span>a &amp; b</Span>", json!({}));
    assert_eq!(html, "<span>a &amp; b</span>");
}

#[test]
fn test_mixed_leaf_text_escapes_binding_segments_only() {
    let html = render_with(
        "<Text>R&D: {{ m }}</Text>",
        json!({"m": "<b>x</b>"}),
    );
    assert_eq!(html, "R&D: &lt;b&gt;x&lt;/b&gt;");
}

#[test]
fn test_inline_spaces_at_tag_boundary_trimmed() {
    let html = render_with("<Span> Hello </Span>", json!({}));
    assert_eq!(html, "<span>Hello</span>");
}

#[test]
fn test_html_attributes_escaped_and_sorted() {
    let html = render_with(
        "<Div title=\"{{ t }}\" class=\"x\"/>",
        json!({"t": "a \"quoted\" <tag>"}),
    );
    assert_eq!(
        html,
        "<div class=\"x\" title=\"a &quot;quoted&quot; &lt;tag&gt;\"></div>"
    );
}

#[test]
fn test_void_element_has_no_closing_tag() {
    let html = render_with("<Img src=\"x.png\"/>", json!({}));
    assert_eq!(html, "<img src=\"x.png\">");
}

#[test]
fn test_bare_attribute_renders_bare() {
    let html = render_with("<Input disabled/>", json!({}));
    assert_eq!(html, "<input disabled>");
}

#[test]
fn test_if_renders_then_or_else() {
    let source = "<If condition=\"{{ ok }}\">yes<Else>no</Else></If>";
    assert_eq!(render_with(source, json!({"ok": true})), "yes");
    assert_eq!(render_with(source, json!({"ok": false})), "no");
}

#[test]
fn test_repeat_with_named_variable() {
    let html = render_with(
        "<Repeat of=\"{{ items }}\" as=\"item\"><Li>{{ item }}</Li></Repeat>",
        json!({"items": ["a", "b"]}),
    );
    assert_eq!(html, "<li>a</li><li>b</li>");
}

#[test]
fn test_repeat_with_index() {
    let html = render_with(
        "<Repeat of=\"{{ items }}\" as=\"i:item\"><Li>{{ i }}:{{ item }}</Li></Repeat>",
        json!({"items": ["a", "b"]}),
    );
    assert_eq!(html, "<li>0:a</li><li>1:b</li>");
}

#[test]
fn test_repeat_default_scope_is_item() {
    let html = render_with(
        "<Repeat of=\"{{ users }}\"><Li>{{ name }}</Li></Repeat>",
        json!({"users": [{"name": "ada"}, {"name": "grace"}]}),
    );
    assert_eq!(html, "<li>ada</li><li>grace</li>");
}

#[test]
fn test_repeat_no_data_slot() {
    let html = render_with(
        "<Repeat of=\"{{ items }}\"><Li>x</Li><NoData>empty</NoData></Repeat>",
        json!({"items": []}),
    );
    assert_eq!(html, "empty");
}

#[test]
fn test_repeat_rejects_non_iterable() {
    let (mut tree, root) = parse_src("<Repeat of=\"{{ items }}\"><Li>x</Li></Repeat>");
    let evaluator =
        Evaluator::new().with_view_model(Value::from(json!({"items": "not-a-list"})));
    let err = evaluator.render(&mut tree, root).unwrap_err();
    assert!(matches!(err, RenderError::InvalidIterator { .. }));
}

#[test]
fn test_unknown_filter_names_filter_and_component() {
    let (mut tree, root) = parse_src("<Span>{{ x | frobnicate }}</Span>");
    let err = Evaluator::new().render(&mut tree, root).unwrap_err();
    match err {
        RenderError::FilterNotFound { filter, .. } => assert_eq!(filter, "frobnicate"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_filter_pipeline_in_template() {
    let html = render_with(
        "<Span>{{ nickname | alt 'anonymous' }}</Span>",
        json!({"nickname": null}),
    );
    assert_eq!(html, "<span>anonymous</span>");
}

#[test]
fn test_then_filter_picks_false_branch() {
    let source = "<Span>{{ ok | then 'yes' 'no' }}</Span>";
    assert_eq!(render_with(source, json!({"ok": true})), "<span>yes</span>");
    assert_eq!(render_with(source, json!({"ok": false})), "<span>no</span>");
}

#[test]
fn test_else_filter_keeps_zero() {
    let source = "<Span>{{ n | else 'none' }}</Span>";
    assert_eq!(render_with(source, json!({"n": 0})), "<span>0</span>");
    assert_eq!(render_with(source, json!({"n": null})), "<span>none</span>");
}

#[test]
fn test_custom_filter_registration() {
    let (mut tree, root) = parse_src("<Span>{{ name | shout }}</Span>");
    let mut evaluator =
        Evaluator::new().with_view_model(Value::from(json!({"name": "ada"})));
    evaluator.filters_mut().register("shout", |value, _args| {
        Ok(Value::String(value.render_string().to_uppercase()))
    });
    assert_eq!(evaluator.render(&mut tree, root).unwrap(), "<span>ADA</span>");
}

#[test]
fn test_arithmetic_and_comparison() {
    assert_eq!(
        render_with("{{ a + b }}", json!({"a": 2, "b": 3})),
        "5"
    );
    assert_eq!(
        render_with("{{ a > b }}", json!({"a": 2, "b": 3})),
        "false"
    );
    assert_eq!(
        render_with("{{ first + ' ' + last }}", json!({"first": "Ada", "last": "Lovelace"})),
        "Ada Lovelace"
    );
}

#[test]
fn test_division_by_zero_fails() {
    let (mut tree, root) = parse_src("{{ a / b }}");
    let evaluator = Evaluator::new().with_view_model(Value::from(json!({"a": 1, "b": 0})));
    let err = evaluator.render(&mut tree, root).unwrap_err();
    assert!(matches!(err, RenderError::DivisionByZero { .. }));
}

#[test]
fn test_path_navigation() {
    let html = render_with(
        "{{ user.address.city }}",
        json!({"user": {"address": {"city": "Lisbon"}}}),
    );
    assert_eq!(html, "Lisbon");
}

#[test]
fn test_rerender_reflects_new_view_model() {
    let (mut tree, root) = parse_src("<Panel title=\"{{ t }}\"/>");
    let panel = tree.node(root).children()[0];

    let mut evaluator = Evaluator::new();
    evaluator.set_view_model(Value::object([("t", Value::from("one"))]));
    evaluator.render(&mut tree, root).unwrap();
    assert_eq!(tree.node(panel).value_of("title").unwrap(), Value::from("one"));

    evaluator.set_view_model(Value::object([("t", Value::from("two"))]));
    evaluator.render(&mut tree, root).unwrap();
    assert_eq!(tree.node(panel).value_of("title").unwrap(), Value::from("two"));
}

#[test]
fn test_metadata_produces_no_output() {
    let html = render_with("<Metadata><Field name=\"id\"/></Metadata>after", json!({}));
    assert_eq!(html, "after");
}

#[test]
fn test_mixed_attribute_segments_concatenate() {
    let html = render_with(
        "<A href=\"/users/{{ id }}\"/>",
        json!({"id": 42}),
    );
    assert_eq!(html, "<a href=\"/users/42\"></a>");
}
