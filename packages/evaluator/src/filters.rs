use crate::error::RenderResult;
use matisse_dom::Value;
use std::collections::HashMap;

/// A filter takes the piped-in value plus any extra arguments.
pub type FilterFn = fn(&Value, &[Value]) -> RenderResult<Value>;

/// Name-to-function lookup used by `expr | name arg` pipes.
pub struct FilterRegistry {
    filters: HashMap<String, FilterFn>,
}

impl FilterRegistry {
    pub fn empty() -> Self {
        Self {
            filters: HashMap::new(),
        }
    }

    /// Registry pre-loaded with the standard filters.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("alt", filter_alt);
        registry.register("else", filter_else);
        registry.register("then", filter_then);
        registry.register("even", filter_even);
        registry.register("odd", filter_odd);
        registry.register("ord", filter_ord);
        registry.register("json", filter_json);
        registry.register("nl2br", filter_nl2br);
        registry.register("type", filter_type);
        registry.register("datePart", filter_date_part);
        registry.register("timePart", filter_time_part);
        registry
    }

    pub fn register(&mut self, name: &str, filter: FilterFn) {
        self.filters.insert(name.to_string(), filter);
    }

    pub fn get(&self, name: &str) -> Option<FilterFn> {
        self.filters.get(name).copied()
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// `value | alt fallback`: replaces an absent value, keeps everything else.
fn filter_alt(value: &Value, args: &[Value]) -> RenderResult<Value> {
    let absent = matches!(value, Value::Null) || value.as_str() == Some("");
    Ok(if absent {
        args.first().cloned().unwrap_or(Value::Null)
    } else {
        value.clone()
    })
}

/// `value | else fallback`: unset, empty-string and false become the
/// fallback. Unlike `alt`, false is replaced; zero is not.
fn filter_else(value: &Value, args: &[Value]) -> RenderResult<Value> {
    let replace =
        matches!(value, Value::Null | Value::Bool(false)) || value.as_str() == Some("");
    Ok(if replace {
        args.first().cloned().unwrap_or(Value::Null)
    } else {
        value.clone()
    })
}

/// `value | then whenTrue whenFalse`: truthy picks the first argument,
/// falsy the second.
fn filter_then(value: &Value, args: &[Value]) -> RenderResult<Value> {
    let pick = if value.is_truthy() {
        args.first()
    } else {
        args.get(1)
    };
    Ok(pick.cloned().unwrap_or(Value::Null))
}

fn filter_even(value: &Value, _args: &[Value]) -> RenderResult<Value> {
    Ok(Value::Bool(
        value.as_number().map(|n| (n as i64) % 2 == 0).unwrap_or(false),
    ))
}

fn filter_odd(value: &Value, _args: &[Value]) -> RenderResult<Value> {
    Ok(Value::Bool(
        value.as_number().map(|n| (n as i64) % 2 != 0).unwrap_or(false),
    ))
}

/// Ordinal suffix: 1st, 2nd, 3rd, 4th...
fn filter_ord(value: &Value, _args: &[Value]) -> RenderResult<Value> {
    let n = match value.as_number() {
        Some(n) => n as i64,
        None => return Ok(value.clone()),
    };
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    Ok(Value::String(format!("{}{}", n, suffix)))
}

fn filter_json(value: &Value, _args: &[Value]) -> RenderResult<Value> {
    Ok(Value::String(
        serde_json::to_string(value).unwrap_or_default(),
    ))
}

fn filter_nl2br(value: &Value, _args: &[Value]) -> RenderResult<Value> {
    Ok(Value::String(value.render_string().replace('\n', "<br>")))
}

fn filter_type(value: &Value, _args: &[Value]) -> RenderResult<Value> {
    Ok(Value::String(value.type_name().to_string()))
}

/// Date portion of a `YYYY-MM-DD HH:MM:SS` timestamp string.
fn filter_date_part(value: &Value, _args: &[Value]) -> RenderResult<Value> {
    Ok(Value::String(
        value
            .render_string()
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_string(),
    ))
}

/// Time portion of a `YYYY-MM-DD HH:MM:SS` timestamp string.
fn filter_time_part(value: &Value, _args: &[Value]) -> RenderResult<Value> {
    Ok(Value::String(
        value
            .render_string()
            .split_whitespace()
            .nth(1)
            .unwrap_or("")
            .to_string(),
    ))
}
