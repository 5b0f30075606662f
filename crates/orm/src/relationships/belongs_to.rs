//! BelongsTo - many-to-one, foreign key on the owning record

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
pub struct BelongsTo {
    pub related: String,
    pub foreign_key: String,
    pub owner_key: String,
}

impl BelongsTo {
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

impl Relation for BelongsTo {
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
        let Some(parent) = data.record(parent_entity, parent_id) else {
            return Ok(());
        };
        if parent
            .get(&self.foreign_key)
            .is_some_and(|value| !value.is_null())
        {
            return Ok(());
        }
        let raw = parent.get(name).cloned();
        let Some(related_id) = ids_of(raw.as_ref()).into_iter().next() else {
            return Ok(());
        };
        // prefer the normalized owner record's key; a bare scalar reference
        // is itself the owner-key value
        let owner_value = data
            .record(&self.related, &related_id)
            .and_then(|owner| owner.get(&self.owner_key))
            .filter(|value| !value.is_null())
            .cloned()
            .or_else(|| raw.filter(|value| !value.is_array() && !value.is_object()));
        if let (Some(value), Some(parent)) =
            (owner_value, data.record_mut(parent_entity, parent_id))
        {
            parent.insert(self.foreign_key.clone(), value);
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
            .filter_map(|record| field_key(record, &self.foreign_key))
            .collect();
        let rows = fetch_related(store, &self.related, spec, |row| {
            field_key(row, &self.owner_key).is_some_and(|key| keys.contains(&key))
        })?;
        let dictionary = build_dictionary(&rows, &self.owner_key);
        for record in records {
            let matched = field_key(record, &self.foreign_key)
                .and_then(|key| dictionary.get(&key))
                .cloned()
                .map_or(Value::Null, Value::Object);
            record.insert(name.to_string(), matched);
        }
        Ok(())
    }
}
