//! MorphOne - polymorphic one-to-one

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::OrmResult;
use crate::normalize::NormalizedData;
use crate::query::{fetch_related, EagerLoadSpec};
use crate::relationships::dictionary::{build_dictionary, field_key, ids_of};
use crate::relationships::Relation;
use crate::schema::SchemaRegistry;
use crate::store::Store;
use crate::Record;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MorphOne {
    pub related: String,
    /// Field on the related record holding the owner's key
    pub id_field: String,
    /// Field on the related record naming the owner's entity
    pub type_field: String,
    pub local_key: String,
}

impl MorphOne {
    pub fn new(
        related: impl Into<String>,
        id_field: impl Into<String>,
        type_field: impl Into<String>,
        local_key: impl Into<String>,
    ) -> Self {
        Self {
            related: related.into(),
            id_field: id_field.into(),
            type_field: type_field.into(),
            local_key: local_key.into(),
        }
    }
}

impl Relation for MorphOne {
    fn related_entity(&self) -> Option<&str> {
        Some(&self.related)
    }

    fn is_collection(&self) -> bool {
        false
    }

    fn attach(
        &self,
        name: &str,
        parent_entity: &str,
        parent_id: &str,
        _registry: &SchemaRegistry,
        data: &mut NormalizedData,
    ) -> OrmResult<()> {
        attach_morph(
            name,
            parent_entity,
            parent_id,
            &self.related,
            &self.id_field,
            &self.type_field,
            &self.local_key,
            data,
        );
        Ok(())
    }

    fn load(
        &self,
        store: &Store,
        parent_entity: &str,
        name: &str,
        records: &mut [Record],
        spec: &EagerLoadSpec,
    ) -> OrmResult<()> {
        let keys: HashSet<String> = records
            .iter()
            .filter_map(|record| field_key(record, &self.local_key))
            .collect();
        let rows = fetch_related(store, &self.related, spec, |row| {
            row.get(&self.type_field).and_then(Value::as_str) == Some(parent_entity)
                && field_key(row, &self.id_field).is_some_and(|key| keys.contains(&key))
        })?;
        let dictionary = build_dictionary(&rows, &self.id_field);
        for record in records {
            let matched = field_key(record, &self.local_key)
                .and_then(|key| dictionary.get(&key))
                .cloned()
                .map_or(Value::Null, Value::Object);
            record.insert(name.to_string(), matched);
        }
        Ok(())
    }
}

/// Shared attach logic for the owning side of polymorphic relations:
/// write the owner's key and entity name into each related record.
#[allow(clippy::too_many_arguments)]
pub(crate) fn attach_morph(
    name: &str,
    parent_entity: &str,
    parent_id: &str,
    related: &str,
    id_field: &str,
    type_field: &str,
    local_key: &str,
    data: &mut NormalizedData,
) {
    let Some(parent) = data.record(parent_entity, parent_id) else {
        return;
    };
    let local = parent
        .get(local_key)
        .filter(|value| !value.is_null())
        .cloned();
    let related_ids = ids_of(parent.get(name));
    for related_id in related_ids {
        if let Some(row) = data.record_mut(related, &related_id) {
            if row.get(type_field).map_or(true, Value::is_null) {
                row.insert(type_field.to_string(), Value::String(parent_entity.to_string()));
            }
            if let Some(local) = &local {
                if row.get(id_field).map_or(true, Value::is_null) {
                    row.insert(id_field.to_string(), local.clone());
                }
            }
        }
    }
}
