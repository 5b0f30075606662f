//! HasManyBy - one-to-many through an id list held on the owner

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
pub struct HasManyBy {
    pub related: String,
    /// Field on the owner holding the array of related owner-key values
    pub foreign_key: String,
    pub owner_key: String,
}

impl HasManyBy {
    pub fn new(
        related: impl Into<String>,
        foreign_key: impl Into<String>,
        owner_key: impl Into<String>,
    ) -> Self {
        Self {
            related: related.into(),
            foreign_key: foreign_key.into(),
            owner_key: owner_key.into(),
        }
    }
}

impl Relation for HasManyBy {
    fn related_entity(&self) -> Option<&str> {
        Some(&self.related)
    }

    fn is_collection(&self) -> bool {
        true
    }

    fn attach(
        &self,
        name: &str,
        parent_entity: &str,
        parent_id: &str,
        _registry: &SchemaRegistry,
        data: &mut NormalizedData,
    ) -> OrmResult<()> {
        let Some(parent) = data.record(parent_entity, parent_id) else {
            return Ok(());
        };
        let existing = parent.get(&self.foreign_key);
        let already_set = existing
            .is_some_and(|value| !value.is_null() && value.as_array().map_or(true, |a| !a.is_empty()));
        if already_set && name != self.foreign_key {
            return Ok(());
        }
        let related_ids = ids_of(parent.get(name));
        if related_ids.is_empty() {
            return Ok(());
        }
        let mut owner_values = Vec::with_capacity(related_ids.len());
        for related_id in &related_ids {
            let value = data
                .record(&self.related, related_id)
                .and_then(|related| related.get(&self.owner_key))
                .filter(|value| !value.is_null())
                .cloned()
                .unwrap_or_else(|| Value::String(related_id.clone()));
            owner_values.push(value);
        }
        if let Some(parent) = data.record_mut(parent_entity, parent_id) {
            parent.insert(self.foreign_key.clone(), Value::Array(owner_values));
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
        let mut wanted: HashSet<String> = HashSet::new();
        for record in records.iter() {
            wanted.extend(ids_of(record.get(&self.foreign_key)));
        }
        let rows = fetch_related(store, &self.related, spec, |row| {
            field_key(row, &self.owner_key).is_some_and(|key| wanted.contains(&key))
        })?;
        let dictionary = build_dictionary(&rows, &self.owner_key);
        for record in records {
            // matched rows follow the order of the id list
            let matched: Vec<Value> = ids_of(record.get(&self.foreign_key))
                .iter()
                .filter_map(|id| dictionary.get(id))
                .cloned()
                .map(Value::Object)
                .collect();
            record.insert(name.to_string(), Value::Array(matched));
        }
        Ok(())
    }
}
