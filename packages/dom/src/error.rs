use thiserror::Error;

pub type SchemaResult<T> = Result<T, SchemaError>;

/// Violations of a component kind's declared surface.
///
/// These are always raised at the point of violation (construction or parse
/// time), never deferred to rendering.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("component <{component}> has no property '{name}'; expected one of: {expected}")]
    UnknownProperty {
        component: String,
        name: String,
        expected: String,
    },

    #[error("component <{component}> does not allow children")]
    ChildrenNotAllowed { component: String },

    #[error("component <{component}> does not support properties")]
    PropertiesNotSupported { component: String },

    #[error("invalid identifier '{value}' for property '{name}' of <{component}>")]
    InvalidIdentifier {
        component: String,
        name: String,
        value: String,
    },
}

impl SchemaError {
    pub fn unknown_property(component: &str, name: &str, expected: Vec<String>) -> Self {
        Self::UnknownProperty {
            component: component.to_string(),
            name: name.to_string(),
            expected: if expected.is_empty() {
                "(none)".to_string()
            } else {
                expected.join(", ")
            },
        }
    }
}
