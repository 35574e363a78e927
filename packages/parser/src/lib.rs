//! Markup parser for the Matisse template language.
//!
//! Turns `<Tag attr="..." attr2="{{ expr }}">` markup into a mutable
//! [`matisse_dom::ComponentTree`], resolving each tag to a child component,
//! a property subtag or a literal text run in a single left-to-right pass.

pub mod error;
pub mod parser;
pub mod scan;
pub mod serializer;

#[cfg(test)]
mod tests_parser;

pub use error::{ParseError, ParseResult};
pub use parser::{parse, text_optimize, Parser};
pub use scan::{find_tag, scan_attributes, RawAttr, RawTag};
pub use serializer::{serialize, Serializer};
