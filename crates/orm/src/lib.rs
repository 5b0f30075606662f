//! Trellis ORM - an in-memory, entity-relational data layer
//!
//! Nested JSON payloads normalize into flat, id-keyed tables (one per
//! registered entity), with foreign keys attached and junction rows
//! materialized from the declared relationships. Reads go through a
//! fluent query builder with filtering, ordering, pagination, and
//! eager loading of relation graphs.
//!
//! ```
//! use serde_json::json;
//! use trellis_orm::{EntitySchema, SchemaRegistry, Store};
//!
//! let mut registry = SchemaRegistry::new();
//! registry.register(
//!     EntitySchema::new("users")
//!         .attr("id")
//!         .attr("name")
//!         .has_many("posts", "posts", "user_id", "id"),
//! );
//! registry.register(EntitySchema::new("posts").attr("id").attr("user_id"));
//!
//! let mut store = Store::new(registry);
//! store.insert(
//!     "users",
//!     &json!({ "id": 1, "name": "Ada", "posts": [{ "id": 10 }] }),
//! )?;
//!
//! let users = store.query("users")?.with("posts").get()?;
//! assert_eq!(users[0]["posts"][0]["user_id"], json!(1));
//! # Ok::<(), trellis_orm::OrmError>(())
//! ```

pub mod error;
pub mod events;
pub mod normalize;
pub mod query;
pub mod relationships;
pub mod schema;
pub mod store;

#[cfg(test)]
mod tests;

pub use error::{OrmError, OrmResult};
pub use events::{HookHandle, Hooks, Mutation};
pub use normalize::{NoKeySequence, NormalizedData};
pub use query::{EagerLoadSpec, OrderDirection, Query, QueryScope};
pub use relationships::{
    BelongsTo, BelongsToMany, HasMany, HasManyBy, HasOne, MorphMany, MorphOne, MorphTo, Relation,
    Relationship,
};
pub use schema::{
    Attr, EntitySchema, Field, FieldMap, PrimaryKey, SchemaRegistry, ID_FIELD, NO_KEY_PREFIX,
};
pub use store::Store;

/// One stored record: a plain JSON object.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Flat table of records keyed by index id, in insertion order.
pub type Table = indexmap::IndexMap<String, Record>;
