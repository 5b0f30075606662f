//! Store - the mutable keyed table store and its write pipeline
//!
//! One flat, id-keyed table per registered entity. All write operations
//! run the full pipeline (normalize, pivot creation, auto-increment
//! assignment, id fixing, hooks) in memory and only then touch the
//! tables, so there is no partial-failure state to roll back. Access is
//! single-threaded and synchronous; a multi-threaded host must serialize
//! its calls.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::error::{OrmError, OrmResult};
use crate::events::{Hooks, Mutation};
use crate::normalize::{self, fix_ids, NoKeySequence, NormalizeContext, NormalizedData};
use crate::query::Query;
use crate::relationships::Relationship;
use crate::schema::{index_id, PrimaryKey, SchemaRegistry};
use crate::{Record, Table};

/// How normalized records are written into the tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    /// Replace the root entity's table; merge related entities
    Create,
    /// Merge every entity additively
    Insert,
    /// Merge; records colliding with an existing id count as updates
    InsertOrUpdate,
}

/// In-memory entity store over a schema registry.
pub struct Store {
    registry: SchemaRegistry,
    tables: IndexMap<String, Table>,
    sequence: NoKeySequence,
    hooks: Hooks,
}

impl Store {
    /// Build a store with one empty table per registered entity. This is
    /// also the only reset point of the synthetic-id sequence.
    pub fn new(registry: SchemaRegistry) -> Self {
        let tables = registry
            .entity_names()
            .map(|name| (name.to_string(), Table::new()))
            .collect();
        Self {
            registry,
            tables,
            sequence: NoKeySequence::new(),
            hooks: Hooks::new(),
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Lifecycle hook registry for this store.
    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    /// Read access to an entity's table.
    pub fn table(&self, entity: &str) -> OrmResult<&Table> {
        self.registry.schema(entity)?;
        self.tables
            .get(entity)
            .ok_or_else(|| OrmError::UnknownEntity(entity.to_string()))
    }

    /// Start a query over an entity's table. Unknown entities error here,
    /// at the outermost call.
    pub fn query(&self, entity: &str) -> OrmResult<Query<'_>> {
        Query::new(self, entity)
    }

    /// All records of an entity, hydrated, in insertion order.
    pub fn all(&self, entity: &str) -> OrmResult<Vec<Record>> {
        self.query(entity)?.get()
    }

    /// Normalize a payload against the registry. Pure apart from the
    /// store-owned synthetic-id sequence.
    pub fn normalize(&mut self, payload: &Value, entity: &str) -> OrmResult<NormalizedData> {
        let mut ctx = NormalizeContext::new(&self.registry, &mut self.sequence);
        normalize::normalize(&mut ctx, payload, entity)
    }

    /// Destructive write: replaces the root entity's table with the
    /// normalized records; related entities merge additively.
    pub fn create(
        &mut self,
        entity: &str,
        payload: &Value,
    ) -> OrmResult<IndexMap<String, Vec<Record>>> {
        let data = self.normalize(payload, entity)?;
        self.persist(entity, WriteMode::Create, data)
    }

    /// Additive write: merges normalized records into every table.
    pub fn insert(
        &mut self,
        entity: &str,
        payload: &Value,
    ) -> OrmResult<IndexMap<String, Vec<Record>>> {
        let data = self.normalize(payload, entity)?;
        self.persist(entity, WriteMode::Insert, data)
    }

    /// Additive write where records colliding with an existing id go
    /// through the update path (update hooks, field-wise merge) and new
    /// records through the create path.
    pub fn insert_or_update(
        &mut self,
        entity: &str,
        payload: &Value,
    ) -> OrmResult<IndexMap<String, Vec<Record>>> {
        let data = self.normalize(payload, entity)?;
        self.persist(entity, WriteMode::InsertOrUpdate, data)
    }

    /// Merge `data`'s fields into the record it identifies by primary key.
    pub fn update(&mut self, entity: &str, data: &Value) -> OrmResult<Option<Record>> {
        let object = data
            .as_object()
            .ok_or_else(|| OrmError::InvalidUpdate("update data must be an object".to_string()))?;
        let key = self.registry.primary_key(entity)?;
        let probe: Record = object.clone();
        let Some(id) = index_id(key, &probe) else {
            return Err(OrmError::InvalidUpdate(format!(
                "update data for '{entity}' is missing its primary key"
            )));
        };
        let fields = self.declared_fields(entity)?;
        self.apply_update(entity, &id, |record| merge_declared(record, object, &fields))
    }

    /// Merge `data`'s fields into every record matching the predicate.
    pub fn update_where<P>(
        &mut self,
        entity: &str,
        data: &Value,
        predicate: P,
    ) -> OrmResult<Vec<Record>>
    where
        P: Fn(&Record) -> bool,
    {
        let object = data
            .as_object()
            .ok_or_else(|| OrmError::InvalidUpdate("update data must be an object".to_string()))?;
        let fields = self.declared_fields(entity)?;
        let ids: Vec<String> = self
            .table(entity)?
            .iter()
            .filter(|(_, record)| predicate(record))
            .map(|(id, _)| id.clone())
            .collect();
        let mut updated = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) =
                self.apply_update(entity, &id, |record| merge_declared(record, object, &fields))?
            {
                updated.push(record);
            }
        }
        Ok(updated)
    }

    /// Merge `data`'s fields into the record keyed by `id`.
    pub fn update_by_id(
        &mut self,
        entity: &str,
        id: &Value,
        data: &Value,
    ) -> OrmResult<Option<Record>> {
        let object = data
            .as_object()
            .ok_or_else(|| OrmError::InvalidUpdate("update data must be an object".to_string()))?;
        let fields = self.declared_fields(entity)?;
        let key = self.entry_key(entity, id)?;
        self.apply_update(entity, &key, |record| merge_declared(record, object, &fields))
    }

    /// Apply a closure to the record keyed by `id`. A scalar id against a
    /// composite-key entity cannot identify a record and is rejected.
    pub fn update_by_id_with<F>(
        &mut self,
        entity: &str,
        id: &Value,
        apply: F,
    ) -> OrmResult<Option<Record>>
    where
        F: FnOnce(&mut Record),
    {
        let key = self.registry.primary_key(entity)?;
        if key.is_composite() && !id.is_array() {
            return Err(OrmError::InvalidUpdate(format!(
                "entity '{entity}' has a composite primary key; closure updates need the full key array"
            )));
        }
        let key = self.entry_key(entity, id)?;
        self.apply_update(entity, &key, apply)
    }

    /// Delete the record keyed by `id`, returning it.
    pub fn delete(&mut self, entity: &str, id: &Value) -> OrmResult<Option<Record>> {
        let key = self.entry_key(entity, id)?;
        self.delete_key(entity, &key)
    }

    /// Delete every record matching the predicate, returning the count.
    pub fn delete_where<P>(&mut self, entity: &str, predicate: P) -> OrmResult<usize>
    where
        P: Fn(&Record) -> bool,
    {
        let keys: Vec<String> = self
            .table(entity)?
            .iter()
            .filter(|(_, record)| predicate(record))
            .map(|(key, _)| key.clone())
            .collect();
        let mut deleted = 0;
        for key in keys {
            if self.delete_key(entity, &key)?.is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// Wipe an entity's table. Per-record delete hooks do not fire.
    pub fn delete_all(&mut self, entity: &str) -> OrmResult<()> {
        self.table_clear(entity)
    }

    // --- table mutation primitives for the host persistence layer ---
    // These write records verbatim and fire no lifecycle hooks.

    /// Replace an entity's table wholesale.
    pub fn table_replace(&mut self, entity: &str, records: Table) -> OrmResult<()> {
        self.registry.schema(entity)?;
        self.tables.insert(entity.to_string(), records);
        Ok(())
    }

    /// Merge records into an entity's table, field-wise on id collision.
    pub fn table_merge(&mut self, entity: &str, records: Table) -> OrmResult<()> {
        self.registry.schema(entity)?;
        let table = self.tables.entry(entity.to_string()).or_default();
        for (id, record) in records {
            match table.get_mut(&id) {
                Some(existing) => {
                    for (field, value) in record {
                        existing.insert(field, value);
                    }
                }
                None => {
                    table.insert(id, record);
                }
            }
        }
        Ok(())
    }

    /// Remove records matching the predicate, returning the count.
    pub fn table_delete_where<P>(&mut self, entity: &str, predicate: P) -> OrmResult<usize>
    where
        P: Fn(&Record) -> bool,
    {
        self.registry.schema(entity)?;
        let table = self.tables.entry(entity.to_string()).or_default();
        let before = table.len();
        table.retain(|_, record| !predicate(record));
        Ok(before - table.len())
    }

    /// Empty an entity's table.
    pub fn table_clear(&mut self, entity: &str) -> OrmResult<()> {
        self.registry.schema(entity)?;
        if let Some(table) = self.tables.get_mut(entity) {
            table.clear();
        }
        Ok(())
    }

    /// Table key for an id value. Composite keys take a JSON array.
    pub(crate) fn entry_key(&self, entity: &str, id: &Value) -> OrmResult<String> {
        match self.registry.primary_key(entity)? {
            PrimaryKey::Single(_) => Ok(crate::schema::key_string(id)),
            PrimaryKey::Composite(fields) => match id {
                Value::Array(values) if values.len() == fields.len() => {
                    Ok(Value::Array(values.clone()).to_string())
                }
                _ => Err(OrmError::Schema(format!(
                    "entity '{entity}' has a composite primary key; expected an array of {} values",
                    fields.len()
                ))),
            },
        }
    }

    fn declared_fields(&self, entity: &str) -> OrmResult<Vec<String>> {
        Ok(self.registry.fields(entity)?.keys().cloned().collect())
    }

    fn apply_update<F>(&mut self, entity: &str, key: &str, apply: F) -> OrmResult<Option<Record>>
    where
        F: FnOnce(&mut Record),
    {
        self.registry.schema(entity)?;
        let Some(mut updated) = self.tables.get(entity).and_then(|t| t.get(key)).cloned() else {
            return Ok(None);
        };
        apply(&mut updated);
        if !self.hooks.fire_before(Mutation::Update, entity, &mut updated) {
            return Ok(None);
        }
        if let Some(table) = self.tables.get_mut(entity) {
            table.insert(key.to_string(), updated.clone());
        }
        self.hooks.fire_after(Mutation::Update, entity, &updated);
        Ok(Some(updated))
    }

    fn delete_key(&mut self, entity: &str, key: &str) -> OrmResult<Option<Record>> {
        self.registry.schema(entity)?;
        let Some(mut record) = self.tables.get(entity).and_then(|t| t.get(key)).cloned() else {
            return Ok(None);
        };
        if !self.hooks.fire_before(Mutation::Delete, entity, &mut record) {
            return Ok(None);
        }
        if let Some(table) = self.tables.get_mut(entity) {
            table.shift_remove(key);
        }
        self.hooks.fire_after(Mutation::Delete, entity, &record);
        Ok(Some(record))
    }

    /// Assign auto-increment fields over the incoming batch, continuing
    /// from the highest value seen in the live table or the batch itself.
    fn apply_increments(&self, data: &mut NormalizedData) -> OrmResult<()> {
        // collect first: the data iterator borrows data mutably
        let entities = data.entity_names();
        for entity in entities {
            let schema = self.registry.schema(&entity)?;
            let increment_fields: Vec<String> = schema
                .fields()
                .iter()
                .filter(|(_, field)| field.as_attr().is_some_and(|attr| attr.increment))
                .map(|(name, _)| name.clone())
                .collect();
            if increment_fields.is_empty() {
                continue;
            }
            for field in increment_fields {
                let existing_max = self
                    .tables
                    .get(&entity)
                    .map_or(0, |table| max_value(table.values(), &field));
                let batch_max = data
                    .table(&entity)
                    .map_or(0, |table| max_value(table.values(), &field));
                let mut next = existing_max.max(batch_max);
                for record in data.table_mut(&entity).values_mut() {
                    if record.get(&field).map_or(true, Value::is_null) {
                        next += 1;
                        record.insert(field.clone(), Value::from(next));
                    }
                }
            }
        }
        Ok(())
    }

    /// Re-run the relation attach hooks over the normalized data. Attach
    /// never overwrites, so this only fills foreign keys that became
    /// derivable after auto-increment assignment.
    fn reattach(&self, data: &mut NormalizedData) -> OrmResult<()> {
        for entity in data.entity_names() {
            let schema = self.registry.schema(&entity)?;
            let relations: Vec<(String, Relationship)> = schema
                .relation_names()
                .into_iter()
                .filter_map(|name| {
                    schema
                        .relationship(&name)
                        .cloned()
                        .map(|relation| (name, relation))
                })
                .collect();
            if relations.is_empty() {
                continue;
            }
            let ids: Vec<String> = data
                .table(&entity)
                .map(|table| table.keys().cloned().collect())
                .unwrap_or_default();
            for id in ids {
                for (name, relation) in &relations {
                    let present = data
                        .record(&entity, &id)
                        .is_some_and(|record| record.contains_key(name.as_str()));
                    if present {
                        relation
                            .resolver()
                            .attach(name, &entity, &id, &self.registry, data)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn persist(
        &mut self,
        root: &str,
        mode: WriteMode,
        mut data: NormalizedData,
    ) -> OrmResult<IndexMap<String, Vec<Record>>> {
        self.apply_increments(&mut data)?;
        self.reattach(&mut data)?;
        normalize::pivot::create_pivots(&self.registry, &mut data)?;
        fix_ids(&self.registry, &mut data)?;

        if mode == WriteMode::Create {
            if let Some(table) = self.tables.get_mut(root) {
                table.clear();
            }
        }

        let mut written: IndexMap<String, Vec<Record>> = IndexMap::new();
        for (entity, table) in data.into_tables() {
            self.registry.schema(&entity)?;
            for (id, mut record) in table {
                let existing = self
                    .tables
                    .get(&entity)
                    .is_some_and(|table| table.contains_key(&id));
                let mutation = match mode {
                    WriteMode::InsertOrUpdate if existing => Mutation::Update,
                    _ => Mutation::Create,
                };
                if !self.hooks.fire_before(mutation, &entity, &mut record) {
                    continue;
                }
                let table = self.tables.entry(entity.clone()).or_default();
                let stored = match table.get_mut(&id) {
                    Some(existing_record) => {
                        for (field, value) in record {
                            existing_record.insert(field, value);
                        }
                        existing_record.clone()
                    }
                    None => {
                        table.insert(id.clone(), record.clone());
                        record
                    }
                };
                self.hooks.fire_after(mutation, &entity, &stored);
                written.entry(entity.clone()).or_default().push(stored);
            }
        }
        debug!(root, ?mode, "persisted normalized data");
        Ok(written)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("entities", &self.tables.len())
            .field("hooks", &self.hooks)
            .finish()
    }
}

fn max_value<'a, I>(records: I, field: &str) -> i64
where
    I: Iterator<Item = &'a Record>,
{
    records
        .filter_map(|record| record.get(field))
        .filter_map(Value::as_i64)
        .max()
        .unwrap_or(0)
}

fn merge_declared(record: &mut Record, data: &serde_json::Map<String, Value>, declared: &[String]) {
    for (field, value) in data {
        if declared.iter().any(|name| name == field) {
            record.insert(field.clone(), value.clone());
        }
    }
}
