//! Component model for the Matisse template engine.
//!
//! This crate owns everything the parser and the renderer share:
//!
//! - the mutable component tree ([`ComponentTree`], [`ComponentNode`]),
//! - per-kind property schemas ([`PropertySchema`], [`PropertyKind`]),
//! - the component kind registry and factory seam ([`ComponentRegistry`],
//!   [`ComponentFactory`]),
//! - runtime values ([`Value`]) and binding expressions ([`Expression`]).
//!
//! Nodes are stored in an arena; the parent link is an index, never a second
//! owner, so a node's lifetime is governed solely by the tree that holds it.

pub mod error;
pub mod expression;
pub mod id;
pub mod node;
pub mod registry;
pub mod schema;
pub mod value;

pub use error::{SchemaError, SchemaResult};
pub use expression::{Expression, ExprError};
pub use id::IDGenerator;
pub use node::{ComponentNode, ComponentTree, NodeId, PropertyValue};
pub use registry::{ComponentFactory, ComponentKind, ComponentRegistry, DefaultFactory, RenderStrategy};
pub use schema::{PropertyKind, PropertySchema};
pub use value::Value;
