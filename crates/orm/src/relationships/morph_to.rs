//! MorphTo - polymorphic inverse, target entity resolved per record
//!
//! Loading groups the base records by distinct type value first and issues
//! one related fetch per distinct type, instead of one fetch per record.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::OrmResult;
use crate::normalize::NormalizedData;
use crate::query::{fetch_related, EagerLoadSpec};
use crate::relationships::dictionary::{build_dictionary, field_key, ids_of};
use crate::relationships::Relation;
use crate::schema::{PrimaryKey, SchemaRegistry, ID_FIELD};
use crate::store::Store;
use crate::Record;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MorphTo {
    /// Field on this record holding the owner's key
    pub id_field: String,
    /// Field on this record naming the owner's entity
    pub type_field: String,
}

impl MorphTo {
    pub fn new(id_field: impl Into<String>, type_field: impl Into<String>) -> Self {
        Self {
            id_field: id_field.into(),
            type_field: type_field.into(),
        }
    }

    /// Field the join dictionary for `entity` is keyed by: the single
    /// primary key, or the index id for composite keys.
    fn join_field(key: &PrimaryKey) -> String {
        match key {
            PrimaryKey::Single(field) => field.clone(),
            PrimaryKey::Composite(_) => ID_FIELD.to_string(),
        }
    }
}

impl Relation for MorphTo {
    fn related_entity(&self) -> Option<&str> {
        None
    }

    fn is_collection(&self) -> bool {
        false
    }

    fn attach(
        &self,
        name: &str,
        parent_entity: &str,
        parent_id: &str,
        registry: &SchemaRegistry,
        data: &mut NormalizedData,
    ) -> OrmResult<()> {
        let Some(parent) = data.record(parent_entity, parent_id) else {
            return Ok(());
        };
        if parent
            .get(&self.id_field)
            .is_some_and(|value| !value.is_null())
        {
            return Ok(());
        }
        let Some(target) = parent
            .get(&self.type_field)
            .and_then(Value::as_str)
            .map(ToString::to_string)
        else {
            return Ok(());
        };
        let raw = parent.get(name).cloned();
        let Some(related_id) = ids_of(raw.as_ref()).into_iter().next() else {
            return Ok(());
        };
        let owner_value = registry
            .schema(&target)
            .ok()
            .and_then(|schema| match schema.key() {
                PrimaryKey::Single(field) => data
                    .record(&target, &related_id)
                    .and_then(|owner| owner.get(field))
                    .filter(|value| !value.is_null())
                    .cloned(),
                PrimaryKey::Composite(_) => Some(Value::String(related_id.clone())),
            })
            .or_else(|| raw.filter(|value| !value.is_array() && !value.is_object()));
        if let (Some(value), Some(parent)) =
            (owner_value, data.record_mut(parent_entity, parent_id))
        {
            parent.insert(self.id_field.clone(), value);
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
        // group base records by distinct type value
        let mut groups: HashMap<String, HashSet<String>> = HashMap::new();
        for record in records.iter() {
            let Some(target) = record.get(&self.type_field).and_then(Value::as_str) else {
                continue;
            };
            if let Some(key) = field_key(record, &self.id_field) {
                groups.entry(target.to_string()).or_default().insert(key);
            }
        }

        // one related fetch per distinct type
        let mut dictionaries: HashMap<String, (String, HashMap<String, Record>)> = HashMap::new();
        for (target, keys) in &groups {
            if !store.registry().contains(target) {
                debug!(target = %target, "skipping morph-to load for unregistered type");
                continue;
            }
            let join_field = Self::join_field(store.registry().primary_key(target)?);
            let rows = fetch_related(store, target, spec, |row| {
                field_key(row, &join_field).is_some_and(|key| keys.contains(&key))
            })?;
            let dictionary = build_dictionary(&rows, &join_field);
            dictionaries.insert(target.clone(), (join_field, dictionary));
        }

        for record in records {
            let matched = record
                .get(&self.type_field)
                .and_then(Value::as_str)
                .and_then(|target| dictionaries.get(target))
                .and_then(|(_, dictionary)| {
                    field_key(record, &self.id_field)
                        .and_then(|key| dictionary.get(&key))
                        .cloned()
                })
                .map_or(Value::Null, Value::Object);
            record.insert(name.to_string(), matched);
        }
        Ok(())
    }
}
