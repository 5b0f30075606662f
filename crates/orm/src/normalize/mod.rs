//! Normalizer - decomposes nested payloads into flat per-entity tables
//!
//! The write path is `payload -> normalize (+ relation attach hooks) ->
//! pivot creation -> id fixing -> table persistence`. Everything here is a
//! pure computation over the schema, the payload, and an explicit no-key
//! sequence; persistence belongs to the store.

pub mod id_fixer;
pub mod normalizer;
pub mod pivot;

pub use id_fixer::fix_ids;
pub use normalizer::normalize;

use indexmap::IndexMap;

use crate::schema::{SchemaRegistry, ID_FIELD, NO_KEY_PREFIX};
use crate::{Record, Table};

/// Monotonically increasing sequence for synthetic record ids.
///
/// Owned by the store (never process-global), so independent stores in one
/// process do not interfere; construction is the only reset point.
#[derive(Debug, Clone, Default)]
pub struct NoKeySequence {
    next: u64,
}

impl NoKeySequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next synthetic id, e.g. `_no_key_1`.
    pub fn next_id(&mut self) -> String {
        self.next += 1;
        format!("{NO_KEY_PREFIX}{}", self.next)
    }

    /// True when `id` was synthesized by a [`NoKeySequence`].
    pub fn is_synthetic(id: &str) -> bool {
        id.starts_with(NO_KEY_PREFIX)
    }
}

/// Explicit state threaded through a normalization run.
pub struct NormalizeContext<'a> {
    pub registry: &'a SchemaRegistry,
    pub sequence: &'a mut NoKeySequence,
}

impl<'a> NormalizeContext<'a> {
    pub fn new(registry: &'a SchemaRegistry, sequence: &'a mut NoKeySequence) -> Self {
        Self { registry, sequence }
    }
}

/// Flat map of `entity -> id -> record` produced by normalization.
#[derive(Debug, Clone, Default)]
pub struct NormalizedData {
    entities: IndexMap<String, Table>,
}

impl NormalizedData {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no records were produced.
    pub fn is_empty(&self) -> bool {
        self.entities.values().all(IndexMap::is_empty)
    }

    /// Flat table for `entity`, if any record of it was produced.
    pub fn table(&self, entity: &str) -> Option<&Table> {
        self.entities.get(entity)
    }

    /// Iterate `(entity, table)` pairs in first-encounter order.
    pub fn tables(&self) -> impl Iterator<Item = (&str, &Table)> {
        self.entities.iter().map(|(name, table)| (name.as_str(), table))
    }

    /// Entity names present, in first-encounter order.
    pub fn entity_names(&self) -> Vec<String> {
        self.entities.keys().cloned().collect()
    }

    /// Consume into the underlying tables.
    pub fn into_tables(self) -> IndexMap<String, Table> {
        self.entities
    }

    pub(crate) fn table_mut(&mut self, entity: &str) -> &mut Table {
        self.entities.entry(entity.to_string()).or_default()
    }

    pub(crate) fn tables_mut(&mut self) -> impl Iterator<Item = (&str, &mut Table)> {
        self.entities
            .iter_mut()
            .map(|(name, table)| (name.as_str(), table))
    }

    pub(crate) fn record(&self, entity: &str, id: &str) -> Option<&Record> {
        self.entities.get(entity)?.get(id)
    }

    pub(crate) fn record_mut(&mut self, entity: &str, id: &str) -> Option<&mut Record> {
        self.entities.get_mut(entity)?.get_mut(id)
    }

    /// Insert a record under `id`, field-wise merging into any record
    /// already keyed there (later values win). Keeps `$id` canonical.
    pub(crate) fn merge_record(&mut self, entity: &str, id: String, record: Record) {
        let table = self.table_mut(entity);
        match table.get_mut(&id) {
            Some(existing) => {
                for (field, value) in record {
                    existing.insert(field, value);
                }
                existing.insert(ID_FIELD.to_string(), serde_json::Value::String(id));
            }
            None => {
                let mut record = record;
                record.insert(ID_FIELD.to_string(), serde_json::Value::String(id.clone()));
                table.insert(id, record);
            }
        }
    }
}
