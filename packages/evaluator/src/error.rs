use matisse_dom::{ExprError, SchemaError};
use thiserror::Error;

pub type RenderResult<T> = Result<T, RenderError>;

/// Binding and rendering failures.
///
/// These abort the current render pass for the whole subtree; a half-blank
/// page hides bugs, an explicit failure surfaces them.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("unknown filter '{filter}' in expression inside <{component}>")]
    FilterNotFound { filter: String, component: String },

    #[error("in <{component}>: {source}")]
    Expression {
        #[source]
        source: ExprError,
        component: String,
    },

    #[error("type mismatch in <{component}>: expected {expected}, found {found}")]
    TypeMismatch {
        expected: String,
        found: String,
        component: String,
    },

    #[error("<{component}> cannot iterate over {found}")]
    InvalidIterator { found: String, component: String },

    #[error("division by zero in expression inside <{component}>")]
    DivisionByZero { component: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl RenderError {
    pub fn type_mismatch(
        expected: impl Into<String>,
        found: impl Into<String>,
        component: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
            component: component.into(),
        }
    }
}
