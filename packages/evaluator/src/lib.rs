//! Data binding and rendering for Matisse component trees.
//!
//! Walks a parsed [`matisse_dom::ComponentTree`] depth first, resolves every
//! node's binding expressions against its scope chain and produces the final
//! HTML string. `{{ }}` output is escaped, `{!! !!}` output is raw.

pub mod error;
pub mod evaluator;
pub mod filters;

#[cfg(test)]
mod tests_render;

pub use error::{RenderError, RenderResult};
pub use evaluator::{escape_html, Evaluator};
pub use filters::{FilterFn, FilterRegistry};
