//! HasMany - one-to-many, foreign key on each related record

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::OrmResult;
use crate::normalize::NormalizedData;
use crate::query::{fetch_related, EagerLoadSpec};
use crate::relationships::dictionary::{build_many_dictionary, field_key, ids_of};
use crate::relationships::Relation;
use crate::schema::SchemaRegistry;
use crate::store::Store;
use crate::Record;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HasMany {
    pub related: String,
    pub foreign_key: String,
    pub local_key: String,
}

impl HasMany {
    pub fn new(
        related: impl Into<String>,
        foreign_key: impl Into<String>,
        local_key: impl Into<String>,
    ) -> Self {
        Self {
            related: related.into(),
            foreign_key: foreign_key.into(),
            local_key: local_key.into(),
        }
    }
}

impl Relation for HasMany {
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
        let local = parent
            .get(&self.local_key)
            .filter(|value| !value.is_null())
            .cloned();
        let related_ids = ids_of(parent.get(name));
        let Some(local) = local else {
            return Ok(());
        };
        for related_id in related_ids {
            if let Some(related) = data.record_mut(&self.related, &related_id) {
                if related.get(&self.foreign_key).map_or(true, Value::is_null) {
                    related.insert(self.foreign_key.clone(), local.clone());
                }
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
            .filter_map(|record| field_key(record, &self.local_key))
            .collect();
        let rows = fetch_related(store, &self.related, spec, |row| {
            field_key(row, &self.foreign_key).is_some_and(|key| keys.contains(&key))
        })?;
        let dictionary = build_many_dictionary(&rows, &self.foreign_key);
        for record in records {
            let matched = field_key(record, &self.local_key)
                .and_then(|key| dictionary.get(&key))
                .map(|rows| rows.iter().cloned().map(Value::Object).collect())
                .unwrap_or_default();
            record.insert(name.to_string(), Value::Array(matched));
        }
        Ok(())
    }
}
