//! BelongsToMany - many-to-many through a pivot entity
//!
//! Pivot rows are synthesized after normalization with deterministic ids,
//! so repeated inserts of the same pair stay one row.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::OrmResult;
use crate::normalize::NormalizedData;
use crate::query::{fetch_related, EagerLoadSpec};
use crate::relationships::dictionary::{field_key, ids_of};
use crate::relationships::Relation;
use crate::schema::{index_id, key_string, PrimaryKey, SchemaRegistry};
use crate::store::Store;
use crate::Record;

/// Default field under which inline pivot data travels and under which the
/// matched pivot row is attached on load.
pub const DEFAULT_PIVOT_ACCESSOR: &str = "pivot";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BelongsToMany {
    pub related: String,
    pub pivot: String,
    pub foreign_pivot_key: String,
    pub related_pivot_key: String,
    pub parent_key: String,
    pub related_key: String,
    pub pivot_accessor: String,
}

impl BelongsToMany {
    pub fn new(
        related: impl Into<String>,
        pivot: impl Into<String>,
        foreign_pivot_key: impl Into<String>,
        related_pivot_key: impl Into<String>,
        parent_key: impl Into<String>,
        related_key: impl Into<String>,
    ) -> Self {
        Self {
            related: related.into(),
            pivot: pivot.into(),
            foreign_pivot_key: foreign_pivot_key.into(),
            related_pivot_key: related_pivot_key.into(),
            parent_key: parent_key.into(),
            related_key: related_key.into(),
            pivot_accessor: DEFAULT_PIVOT_ACCESSOR.to_string(),
        }
    }

    /// Override the pivot accessor field name.
    pub fn accessor(mut self, name: impl Into<String>) -> Self {
        self.pivot_accessor = name.into();
        self
    }

    /// Deterministic pivot-row id for one joined pair. Composite pivot keys
    /// serialize as a JSON array string; a single-key pivot gets a
    /// delimited string and has its key field filled in.
    fn pivot_id(
        &self,
        key: &PrimaryKey,
        row: &mut Record,
        parent_value: &Value,
        related_value: &Value,
    ) -> String {
        if let Some(id) = index_id(key, row) {
            return id;
        }
        match key {
            PrimaryKey::Composite(_) => {
                Value::Array(vec![parent_value.clone(), related_value.clone()]).to_string()
            }
            PrimaryKey::Single(field) => {
                let id = format!("{}_{}", key_string(parent_value), key_string(related_value));
                row.insert(field.clone(), Value::String(id.clone()));
                id
            }
        }
    }
}

impl Relation for BelongsToMany {
    fn related_entity(&self) -> Option<&str> {
        Some(&self.related)
    }

    fn is_collection(&self) -> bool {
        true
    }

    fn attach(
        &self,
        _name: &str,
        _parent_entity: &str,
        _parent_id: &str,
        _registry: &SchemaRegistry,
        _data: &mut NormalizedData,
    ) -> OrmResult<()> {
        // no foreign key on either side; the pivot pass does the joining
        Ok(())
    }

    fn create_pivots(
        &self,
        name: &str,
        parent_entity: &str,
        registry: &SchemaRegistry,
        data: &mut NormalizedData,
    ) -> OrmResult<()> {
        let pivot_key = registry.primary_key(&self.pivot)?.clone();
        let Some(parents) = data.table(parent_entity) else {
            return Ok(());
        };
        let parent_ids: Vec<String> = parents.keys().cloned().collect();

        for parent_id in parent_ids {
            let Some(parent) = data.record(parent_entity, &parent_id) else {
                continue;
            };
            let Some(parent_value) = parent
                .get(&self.parent_key)
                .filter(|value| !value.is_null())
                .cloned()
            else {
                continue;
            };
            for related_id in ids_of(parent.get(name)) {
                let related_value = data
                    .record(&self.related, &related_id)
                    .and_then(|related| related.get(&self.related_key))
                    .filter(|value| !value.is_null())
                    .cloned()
                    .unwrap_or_else(|| Value::String(related_id.clone()));
                // inline pivot fields carried through normalization
                let extra = data
                    .record_mut(&self.related, &related_id)
                    .and_then(|related| related.remove(&self.pivot_accessor));

                let mut row = Record::new();
                row.insert(self.foreign_pivot_key.clone(), parent_value.clone());
                row.insert(self.related_pivot_key.clone(), related_value.clone());
                if let Some(Value::Object(fields)) = extra {
                    for (field, value) in fields {
                        if field != self.foreign_pivot_key && field != self.related_pivot_key {
                            row.insert(field, value);
                        }
                    }
                }
                let id = self.pivot_id(&pivot_key, &mut row, &parent_value, &related_value);
                data.merge_record(&self.pivot, id, row);
            }
        }
        Ok(())
    }

    fn load(
        &self,
        store: &Store,
        _parent_entity: &str,
        name: &str,
        records: &mut [Record],
        spec: &EagerLoadSpec,
    ) -> OrmResult<()> {
        let keys: HashSet<String> = records
            .iter()
            .filter_map(|record| field_key(record, &self.parent_key))
            .collect();

        // pivot rows in table insertion order
        let mut pivots_by_parent: HashMap<String, Vec<Record>> = HashMap::new();
        let mut wanted: HashSet<String> = HashSet::new();
        for row in store.table(&self.pivot)?.values() {
            let Some(parent_key) = field_key(row, &self.foreign_pivot_key) else {
                continue;
            };
            if !keys.contains(&parent_key) {
                continue;
            }
            if let Some(related_key) = field_key(row, &self.related_pivot_key) {
                wanted.insert(related_key);
            }
            pivots_by_parent.entry(parent_key).or_default().push(row.clone());
        }

        let related_rows = fetch_related(store, &self.related, spec, |row| {
            field_key(row, &self.related_key).is_some_and(|key| wanted.contains(&key))
        })?;

        for record in records {
            let mut matched = Vec::new();
            if let Some(parent_key) = field_key(record, &self.parent_key) {
                if let Some(pivots) = pivots_by_parent.get(&parent_key) {
                    let pivot_by_related: HashMap<String, &Record> = pivots
                        .iter()
                        .filter_map(|row| {
                            field_key(row, &self.related_pivot_key).map(|key| (key, row))
                        })
                        .collect();
                    // iterate fetch order so nested order_by constraints win
                    for related in &related_rows {
                        let Some(related_key) = field_key(related, &self.related_key) else {
                            continue;
                        };
                        if let Some(pivot_row) = pivot_by_related.get(&related_key) {
                            let mut related = related.clone();
                            related.insert(
                                self.pivot_accessor.clone(),
                                Value::Object((*pivot_row).clone()),
                            );
                            matched.push(Value::Object(related));
                        }
                    }
                }
            }
            record.insert(name.to_string(), Value::Array(matched));
        }
        Ok(())
    }
}
