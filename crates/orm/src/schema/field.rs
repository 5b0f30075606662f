//! Field declarations - the tagged union behind every entity schema

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::relationships::Relationship;

/// Read-time transform applied to an attribute value during hydration.
pub type Mutator = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Ordered map of field name to declaration.
pub type FieldMap = IndexMap<String, Field>;

/// Plain attribute declaration.
///
/// Defaulting and mutation happen at read/hydration time, never during
/// normalization.
#[derive(Clone)]
pub struct Attr {
    /// Value filled in at hydration time when the record lacks the field
    pub default: Value,
    /// Auto-increment fields receive `max + 1` at persist time when unset
    pub increment: bool,
    /// Optional read-time transform
    pub mutator: Option<Mutator>,
}

impl Attr {
    /// Attribute with a hydration default.
    pub fn new(default: Value) -> Self {
        Self {
            default,
            increment: false,
            mutator: None,
        }
    }

    /// Auto-increment attribute (defaults to null until assigned).
    pub fn increment() -> Self {
        Self {
            default: Value::Null,
            increment: true,
            mutator: None,
        }
    }

    /// Attach a read-time mutator.
    pub fn with_mutator<F>(mut self, mutator: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.mutator = Some(Arc::new(mutator));
        self
    }
}

impl fmt::Debug for Attr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attr")
            .field("default", &self.default)
            .field("increment", &self.increment)
            .field("mutator", &self.mutator.is_some())
            .finish()
    }
}

/// A single schema field declaration.
#[derive(Debug, Clone)]
pub enum Field {
    /// Scalar attribute
    Attr(Attr),
    /// Declared relationship to another entity
    Relation(Relationship),
    /// Grouped/embedded sub-object that is not a separate entity
    Nested(FieldMap),
}

impl Field {
    /// Attribute field with a hydration default.
    pub fn attr(default: Value) -> Self {
        Self::Attr(Attr::new(default))
    }

    /// Auto-increment attribute field.
    pub fn increment() -> Self {
        Self::Attr(Attr::increment())
    }

    /// Relationship field.
    pub fn relation(relationship: Relationship) -> Self {
        Self::Relation(relationship)
    }

    /// Grouped sub-object field.
    pub fn nested(fields: FieldMap) -> Self {
        Self::Nested(fields)
    }

    /// Relationship declaration, if this field is one.
    pub fn as_relation(&self) -> Option<&Relationship> {
        match self {
            Self::Relation(rel) => Some(rel),
            _ => None,
        }
    }

    /// Attribute declaration, if this field is one.
    pub fn as_attr(&self) -> Option<&Attr> {
        match self {
            Self::Attr(attr) => Some(attr),
            _ => None,
        }
    }
}

impl From<Relationship> for Field {
    fn from(relationship: Relationship) -> Self {
        Self::Relation(relationship)
    }
}
