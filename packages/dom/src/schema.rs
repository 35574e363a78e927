use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Declared kind of a component property, fixed at kind-definition time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyKind {
    /// Scalar string; assignable via attribute or subtag text content.
    String,
    Bool,
    Number,
    /// Nested markup producing a sub-tree, held in a content placeholder node.
    Content,
    /// Non-rendering structural data; descendants of a metadata slot are
    /// always metadata themselves.
    Metadata,
    /// Ordered list of content placeholder nodes; subtag form appends.
    Collection,
    /// Enumerated identifier; attribute form only.
    Id,
    Any,
}

impl PropertyKind {
    /// Whether a property of this kind may be assigned in subtag form.
    pub fn allows_tag_form(&self) -> bool {
        matches!(
            self,
            PropertyKind::String
                | PropertyKind::Content
                | PropertyKind::Metadata
                | PropertyKind::Collection
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDecl {
    pub kind: PropertyKind,
}

/// The legal property surface of one component kind.
///
/// Shared read-only across all instances of the kind. Names are stored in
/// their canonical form: leading character lower-cased, which is also how
/// subtag names are normalized before lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    entries: HashMap<String, PropertyDecl>,
}

impl PropertySchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style property declaration.
    pub fn prop(mut self, name: &str, kind: PropertyKind) -> Self {
        self.entries
            .insert(canonical_name(name), PropertyDecl { kind });
        self
    }

    /// Whether `name` is declared. With `as_subtag` set, the property must
    /// additionally support tag-form assignment.
    pub fn defines(&self, name: &str, as_subtag: bool) -> bool {
        match self.entries.get(&canonical_name(name)) {
            Some(decl) => !as_subtag || decl.kind.allows_tag_form(),
            None => false,
        }
    }

    pub fn kind_of(&self, name: &str) -> Option<PropertyKind> {
        self.entries.get(&canonical_name(name)).map(|d| d.kind)
    }

    /// Declared names, sorted; used in diagnostics.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Canonical property name: leading character lower-cased.
pub fn canonical_name(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Subtag form of a property name: leading character upper-cased.
pub fn subtag_name(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
