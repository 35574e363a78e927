use matisse_dom::SchemaError;
use thiserror::Error;

pub type ParseResult<T> = Result<T, ParseError>;

/// Fatal markup errors. Every variant carries the byte offsets of the
/// offending region so callers can show caret-style diagnostics.
#[derive(Error, Debug, Clone)]
pub enum ParseError {
    #[error("Closing tag </{found}> at {start}..{end} does not match <{expected}> opened inside <{component}>")]
    TagMismatch {
        found: String,
        expected: String,
        component: String,
        start: usize,
        end: usize,
    },

    #[error("Closing tag </{name}> at {start}..{end} has nothing to close")]
    StrayClosingTag {
        name: String,
        start: usize,
        end: usize,
    },

    #[error("Closing tag </{name}> at {start}..{end} must not carry attributes")]
    ClosingTagAttributes {
        name: String,
        start: usize,
        end: usize,
    },

    #[error("Tag <{tag}> at {start}..{end} is not allowed inside scalar property <{property}>")]
    ComponentInsideScalar {
        tag: String,
        property: String,
        start: usize,
        end: usize,
    },

    #[error("Literal content at {start}..{end} is not allowed inside <{component}>, which forbids children")]
    LiteralNotAllowed {
        component: String,
        start: usize,
        end: usize,
    },

    #[error("Tag starting at {pos} is never closed by '>'")]
    UnterminatedTag { pos: usize },

    #[error("Attribute value at {pos} is missing its closing quote")]
    UnterminatedAttribute { pos: usize },

    #[error("Malformed attribute at {pos}: {found:?}")]
    MalformedAttribute { pos: usize, found: String },

    #[error("Tag <{tag}> opened at {pos} is never closed")]
    UnclosedTag { tag: String, pos: usize },

    #[error("Schema violation at {start}..{end}: {source}")]
    Schema {
        #[source]
        source: SchemaError,
        start: usize,
        end: usize,
    },
}

impl ParseError {
    pub fn tag_mismatch(
        found: impl Into<String>,
        expected: impl Into<String>,
        component: impl Into<String>,
        start: usize,
        end: usize,
    ) -> Self {
        Self::TagMismatch {
            found: found.into(),
            expected: expected.into(),
            component: component.into(),
            start,
            end,
        }
    }

    pub fn schema(source: SchemaError, start: usize, end: usize) -> Self {
        Self::Schema { source, start, end }
    }

    /// Byte range of the offending region.
    pub fn span(&self) -> (usize, usize) {
        match self {
            Self::TagMismatch { start, end, .. }
            | Self::StrayClosingTag { start, end, .. }
            | Self::ClosingTagAttributes { start, end, .. }
            | Self::ComponentInsideScalar { start, end, .. }
            | Self::LiteralNotAllowed { start, end, .. }
            | Self::Schema { start, end, .. } => (*start, *end),
            Self::UnterminatedTag { pos }
            | Self::UnterminatedAttribute { pos }
            | Self::MalformedAttribute { pos, .. }
            | Self::UnclosedTag { pos, .. } => (*pos, *pos),
        }
    }
}
