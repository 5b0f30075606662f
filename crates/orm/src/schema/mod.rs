//! Schema Registry - entity declarations and their resolution
//!
//! Entities are declared as an ordered map of field name to [`Field`]
//! (attribute, relationship, or grouped sub-object). Relation targets are
//! stored as entity-name strings and resolved lazily at use time, so
//! mutually referencing schemas register in any order.

pub mod field;
pub mod registry;

pub use field::{Attr, Field, FieldMap, Mutator};
pub use registry::{index_id, key_string, EntitySchema, PrimaryKey, SchemaRegistry};

/// Reserved record field holding the canonical index id used as table key.
pub const ID_FIELD: &str = "$id";

/// Prefix of synthetic ids assigned to records lacking a resolvable
/// primary key at normalization time.
pub const NO_KEY_PREFIX: &str = "_no_key_";
