use crate::error::{RenderError, RenderResult};
use crate::filters::FilterRegistry;
use matisse_dom::expression::{BinaryOp, Expr, Segment, UnaryOp};
use matisse_dom::node::{ComponentTree, NodeId, PropertyValue};
use matisse_dom::registry::RenderStrategy;
use matisse_dom::{Expression, Value};
use tracing::{debug, instrument};

/// Binds expressions and renders a component tree to an HTML string.
///
/// Binding writes evaluated values back into node property storage, so a
/// tree must not be shared across concurrent render passes. The compiled
/// form inside each [`Expression`] is immutable after first use and safe to
/// share.
pub struct Evaluator {
    filters: FilterRegistry,
    /// Process-wide fallback view model, the last stop of the scope chain.
    view_model: Value,
}

impl Evaluator {
    pub fn new() -> Self {
        Self {
            filters: FilterRegistry::with_defaults(),
            view_model: Value::Null,
        }
    }

    pub fn with_view_model(mut self, view_model: Value) -> Self {
        self.view_model = view_model;
        self
    }

    pub fn set_view_model(&mut self, view_model: Value) {
        self.view_model = view_model;
    }

    pub fn filters_mut(&mut self) -> &mut FilterRegistry {
        &mut self.filters
    }

    /// One full render pass: depth-first walk, binding each node just
    /// before its own output is produced.
    #[instrument(skip(self, tree, root))]
    pub fn render(&self, tree: &mut ComponentTree, root: NodeId) -> RenderResult<String> {
        debug!(nodes = tree.len(), "starting render pass");
        let mut out = String::new();
        self.render_node(tree, root, &mut out)?;
        debug!(bytes = out.len(), "render pass complete");
        Ok(out)
    }

    fn render_node(
        &self,
        tree: &mut ComponentTree,
        id: NodeId,
        out: &mut String,
    ) -> RenderResult<()> {
        self.bind_node(tree, id)?;

        match tree.node(id).kind.strategy {
            RenderStrategy::Nothing => Ok(()),
            RenderStrategy::Children => self.render_children(tree, id, out),
            RenderStrategy::Text => self.render_text(tree, id, out),
            RenderStrategy::Html => self.render_html(tree, id, out),
            RenderStrategy::If => self.render_if(tree, id, out),
            RenderStrategy::Repeat => self.render_repeat(tree, id, out),
        }
    }

    /// Evaluate every binding on the node and write the results into its
    /// property storage. Bound values always win over literal defaults.
    fn bind_node(&self, tree: &mut ComponentTree, id: NodeId) -> RenderResult<()> {
        if tree.node(id).bindings.is_empty() {
            return Ok(());
        }
        let names: Vec<String> = tree.node(id).bindings.keys().cloned().collect();
        let mut resolved = Vec::with_capacity(names.len());
        for name in names {
            if let Some(expr) = tree.node(id).bindings.get(&name) {
                let value = self.eval_expression(tree, id, expr)?;
                resolved.push((name, value));
            }
        }
        for (name, value) in resolved {
            tree.node_mut(id).set_prop(&name, value)?;
        }
        Ok(())
    }

    fn render_children(
        &self,
        tree: &mut ComponentTree,
        id: NodeId,
        out: &mut String,
    ) -> RenderResult<()> {
        for child in tree.node(id).children().to_vec() {
            self.render_node(tree, child, out)?;
        }
        Ok(())
    }

    fn render_text(
        &self,
        tree: &mut ComponentTree,
        id: NodeId,
        out: &mut String,
    ) -> RenderResult<()> {
        if tree.node(id).bindings.contains_key("value") {
            return self.render_text_segments(tree, id, out);
        }
        // Literal template text is emitted as written.
        let text = tree.node(id).value_of("value")?.render_string();
        out.push_str(&text);
        Ok(())
    }

    /// Bound text renders per segment: literal segments as written, `{{ }}`
    /// segments escaped, `{!! !!}` segments raw.
    fn render_text_segments(
        &self,
        tree: &ComponentTree,
        id: NodeId,
        out: &mut String,
    ) -> RenderResult<()> {
        let node = tree.node(id);
        let expr = match node.bindings.get("value") {
            Some(expr) => expr,
            None => return Ok(()),
        };
        let segments = expr.compiled().map_err(|e| RenderError::Expression {
            source: e,
            component: node.tag_name.clone(),
        })?;
        for segment in segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Binding { expr, raw } => {
                    let value = self.eval_expr(tree, id, expr)?.render_string();
                    if *raw {
                        out.push_str(&value);
                    } else {
                        out.push_str(&escape_html(&value));
                    }
                }
            }
        }
        Ok(())
    }

    fn render_html(
        &self,
        tree: &mut ComponentTree,
        id: NodeId,
        out: &mut String,
    ) -> RenderResult<()> {
        let tag = tree.node(id).tag_name.to_ascii_lowercase();
        out.push('<');
        out.push_str(&tag);

        let mut names: Vec<String> = tree
            .node(id)
            .props()
            .names()
            .map(str::to_string)
            .collect();
        names.sort();
        for name in names {
            let value = match tree.node(id).prop(&name).map_err(RenderError::Schema)? {
                Some(PropertyValue::Value(v)) => v.clone(),
                _ => continue,
            };
            match value {
                Value::Bool(true) => {
                    out.push(' ');
                    out.push_str(&name);
                }
                Value::Bool(false) | Value::Null => {}
                other => {
                    out.push(' ');
                    out.push_str(&name);
                    out.push_str("=\"");
                    out.push_str(&escape_html(&other.render_string()));
                    out.push('"');
                }
            }
        }
        out.push('>');

        if is_void_element(&tag) {
            return Ok(());
        }
        self.render_children(tree, id, out)?;
        out.push_str("</");
        out.push_str(&tag);
        out.push('>');
        Ok(())
    }

    fn render_if(
        &self,
        tree: &mut ComponentTree,
        id: NodeId,
        out: &mut String,
    ) -> RenderResult<()> {
        let condition = tree.node(id).value_of("condition")?.is_truthy();
        debug!(component = %tree.node(id).tag_name, condition, "conditional branch");
        let slot = if condition { "then" } else { "else" };
        self.render_slot(tree, id, slot, out)
    }

    fn render_repeat(
        &self,
        tree: &mut ComponentTree,
        id: NodeId,
        out: &mut String,
    ) -> RenderResult<()> {
        let of = tree.node(id).value_of("of")?;
        let items = match of {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => {
                return Err(RenderError::InvalidIterator {
                    found: other.type_name().to_string(),
                    component: tree.node(id).tag_name.clone(),
                })
            }
        };
        debug!(component = %tree.node(id).tag_name, items = items.len(), "repeating");

        if items.is_empty() {
            return self.render_slot(tree, id, "noData", out);
        }

        let as_value = tree.node(id).value_of("as")?;
        let spec = as_value.as_str().map(parse_iteration_spec);
        let children = tree.node(id).children().to_vec();

        for (index, item) in items.into_iter().enumerate() {
            let scope = match &spec {
                // Without `as`, the item itself is the iteration scope.
                None => item,
                Some((None, var)) => Value::object([(var.clone(), item)]),
                Some((Some(index_var), var)) => Value::object([
                    (index_var.clone(), Value::Number(index as f64)),
                    (var.clone(), item),
                ]),
            };
            tree.node_mut(id).view_model = Some(scope);
            for child in &children {
                self.render_node(tree, *child, out)?;
            }
        }
        tree.node_mut(id).view_model = None;
        Ok(())
    }

    /// Render a content slot: a placeholder node's children, or the node
    /// list a finalize hook moved into the property.
    fn render_slot(
        &self,
        tree: &mut ComponentTree,
        id: NodeId,
        name: &str,
        out: &mut String,
    ) -> RenderResult<()> {
        let targets: Vec<NodeId> = match tree.node(id).prop(name).map_err(RenderError::Schema)? {
            Some(PropertyValue::Node(slot)) => vec![*slot],
            Some(PropertyValue::Nodes(list)) => list.clone(),
            _ => Vec::new(),
        };
        for target in targets {
            self.render_node(tree, target, out)?;
        }
        Ok(())
    }

    fn eval_expression(
        &self,
        tree: &ComponentTree,
        id: NodeId,
        expr: &Expression,
    ) -> RenderResult<Value> {
        let component = &tree.node(id).tag_name;
        let segments = expr.compiled().map_err(|e| RenderError::Expression {
            source: e,
            component: component.clone(),
        })?;

        // The common case: one binding, no surrounding literal text. The
        // value keeps its type instead of collapsing to a string.
        if let [Segment::Binding { expr, .. }] = segments {
            return self.eval_expr(tree, id, expr);
        }

        let mut result = String::new();
        for segment in segments {
            match segment {
                Segment::Literal(text) => result.push_str(text),
                Segment::Binding { expr, .. } => {
                    result.push_str(&self.eval_expr(tree, id, expr)?.render_string());
                }
            }
        }
        Ok(Value::String(result))
    }

    fn eval_expr(&self, tree: &ComponentTree, id: NodeId, expr: &Expr) -> RenderResult<Value> {
        match expr {
            Expr::String(s) => Ok(Value::String(s.clone())),
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Path(segments) => {
                let mut value = self.resolve_field(tree, id, &segments[0]);
                for field in &segments[1..] {
                    value = value.field(field).cloned().unwrap_or(Value::Null);
                }
                Ok(value)
            }
            Expr::Unary { op, operand } => {
                let value = self.eval_expr(tree, id, operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                    UnaryOp::Neg => match value.as_number() {
                        Some(n) => Ok(Value::Number(-n)),
                        None => Err(RenderError::type_mismatch(
                            "number",
                            value.type_name(),
                            &tree.node(id).tag_name,
                        )),
                    },
                }
            }
            Expr::Binary { op, left, right } => self.eval_binary(tree, id, *op, left, right),
            Expr::Filter { input, name, args } => {
                let filter = self.filters.get(name).ok_or_else(|| {
                    RenderError::FilterNotFound {
                        filter: name.clone(),
                        component: tree.node(id).tag_name.clone(),
                    }
                })?;
                let input = self.eval_expr(tree, id, input)?;
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(self.eval_expr(tree, id, arg)?);
                }
                filter(&input, &arg_values)
            }
        }
    }

    fn eval_binary(
        &self,
        tree: &ComponentTree,
        id: NodeId,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
    ) -> RenderResult<Value> {
        // Short-circuit operators yield the deciding operand, not a bool.
        if op == BinaryOp::And {
            let l = self.eval_expr(tree, id, left)?;
            return if l.is_truthy() {
                self.eval_expr(tree, id, right)
            } else {
                Ok(l)
            };
        }
        if op == BinaryOp::Or {
            let l = self.eval_expr(tree, id, left)?;
            return if l.is_truthy() {
                Ok(l)
            } else {
                self.eval_expr(tree, id, right)
            };
        }

        let l = self.eval_expr(tree, id, left)?;
        let r = self.eval_expr(tree, id, right)?;
        let component = &tree.node(id).tag_name;

        match op {
            BinaryOp::Eq => Ok(Value::Bool(l == r)),
            BinaryOp::NotEq => Ok(Value::Bool(l != r)),
            BinaryOp::Add => match (l.as_number(), r.as_number()) {
                (Some(a), Some(b)) => Ok(Value::Number(a + b)),
                _ if l.as_str().is_some() || r.as_str().is_some() => Ok(Value::String(
                    format!("{}{}", l.render_string(), r.render_string()),
                )),
                _ => Err(RenderError::type_mismatch(
                    "number or string",
                    format!("{} + {}", l.type_name(), r.type_name()),
                    component,
                )),
            },
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                let (a, b) = match (l.as_number(), r.as_number()) {
                    (Some(a), Some(b)) => (a, b),
                    _ => {
                        return Err(RenderError::type_mismatch(
                            "number",
                            format!("{} and {}", l.type_name(), r.type_name()),
                            component,
                        ))
                    }
                };
                match op {
                    BinaryOp::Sub => Ok(Value::Number(a - b)),
                    BinaryOp::Mul => Ok(Value::Number(a * b)),
                    _ => {
                        if b == 0.0 {
                            Err(RenderError::DivisionByZero {
                                component: component.clone(),
                            })
                        } else {
                            Ok(Value::Number(a / b))
                        }
                    }
                }
            }
            BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte => {
                let ordering = match (&l, &r) {
                    (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                    (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                    _ => None,
                };
                let ordering = ordering.ok_or_else(|| {
                    RenderError::type_mismatch(
                        "comparable operands",
                        format!("{} and {}", l.type_name(), r.type_name()),
                        component,
                    )
                })?;
                let result = match op {
                    BinaryOp::Lt => ordering.is_lt(),
                    BinaryOp::Lte => ordering.is_le(),
                    BinaryOp::Gt => ordering.is_gt(),
                    _ => ordering.is_ge(),
                };
                Ok(Value::Bool(result))
            }
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }

    /// Scope-chain field lookup: the node's own view model, then each
    /// ancestor's, then the global fallback. Absence resolves to `Null`.
    fn resolve_field(&self, tree: &ComponentTree, id: NodeId, name: &str) -> Value {
        let mut current = Some(id);
        while let Some(node) = current {
            if let Some(vm) = &tree.node(node).view_model {
                if let Some(value) = vm.field(name) {
                    return value.clone();
                }
            }
            current = tree.node(node).parent();
        }
        self.view_model.field(name).cloned().unwrap_or(Value::Null)
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// `"item"` exposes each element under that name; `"i:item"` adds the
/// zero-based index.
fn parse_iteration_spec(spec: &str) -> (Option<String>, String) {
    match spec.split_once(':') {
        Some((index, var)) => (Some(index.trim().to_string()), var.trim().to_string()),
        None => (None, spec.trim().to_string()),
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn is_void_element(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "source"
            | "track"
            | "wbr"
    )
}
