//! MorphMany - polymorphic one-to-many

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::OrmResult;
use crate::normalize::NormalizedData;
use crate::query::{fetch_related, EagerLoadSpec};
use crate::relationships::dictionary::{build_many_dictionary, field_key};
use crate::relationships::morph_one::attach_morph;
use crate::relationships::Relation;
use crate::schema::SchemaRegistry;
use crate::store::Store;
use crate::Record;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MorphMany {
    pub related: String,
    pub id_field: String,
    pub type_field: String,
    pub local_key: String,
}

impl MorphMany {
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

impl Relation for MorphMany {
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
        let dictionary = build_many_dictionary(&rows, &self.id_field);
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
