//! Entity schema registry and index-id helpers

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::error::{OrmError, OrmResult};
use crate::relationships::{
    BelongsTo, BelongsToMany, HasMany, HasManyBy, HasOne, MorphMany, MorphOne, MorphTo,
    Relationship,
};
use crate::schema::field::{Attr, Field, FieldMap, Mutator};
use crate::Record;

/// Primary-key declaration for an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryKey {
    /// Single-column key
    Single(String),
    /// Composite key; the index id serializes as a JSON array string
    Composite(Vec<String>),
}

impl PrimaryKey {
    /// True when the key spans multiple fields.
    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Composite(_))
    }
}

/// Declarations for a single entity: name, primary key, ordered fields.
#[derive(Debug, Clone)]
pub struct EntitySchema {
    name: String,
    primary_key: PrimaryKey,
    fields: FieldMap,
}

impl EntitySchema {
    /// New schema with the conventional `id` primary key.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: PrimaryKey::Single("id".to_string()),
            fields: IndexMap::new(),
        }
    }

    /// Override the primary-key field.
    pub fn primary_key(mut self, key: impl Into<String>) -> Self {
        self.primary_key = PrimaryKey::Single(key.into());
        self
    }

    /// Declare a composite primary key.
    pub fn composite_key<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = PrimaryKey::Composite(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Declare an arbitrary field.
    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    /// Attribute defaulting to null.
    pub fn attr(self, name: impl Into<String>) -> Self {
        self.field(name, Field::attr(Value::Null))
    }

    /// Attribute with an explicit hydration default.
    pub fn attr_default(self, name: impl Into<String>, default: Value) -> Self {
        self.field(name, Field::attr(default))
    }

    /// Auto-increment attribute.
    pub fn increment(self, name: impl Into<String>) -> Self {
        self.field(name, Field::increment())
    }

    /// Attribute with a read-time mutator.
    pub fn attr_mutated<F>(self, name: impl Into<String>, default: Value, mutator: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.field(name, Field::Attr(Attr::new(default).with_mutator(mutator)))
    }

    /// Grouped sub-object field.
    pub fn nested(self, name: impl Into<String>, fields: FieldMap) -> Self {
        self.field(name, Field::nested(fields))
    }

    /// Declare a relationship by value.
    pub fn relation(self, name: impl Into<String>, relationship: impl Into<Relationship>) -> Self {
        self.field(name, Field::Relation(relationship.into()))
    }

    /// One-to-one: the related record carries `foreign_key`.
    pub fn has_one(
        self,
        name: impl Into<String>,
        related: impl Into<String>,
        foreign_key: impl Into<String>,
        local_key: impl Into<String>,
    ) -> Self {
        self.relation(name, HasOne::new(related, foreign_key, local_key))
    }

    /// One-to-many: each related record carries `foreign_key`.
    pub fn has_many(
        self,
        name: impl Into<String>,
        related: impl Into<String>,
        foreign_key: impl Into<String>,
        local_key: impl Into<String>,
    ) -> Self {
        self.relation(name, HasMany::new(related, foreign_key, local_key))
    }

    /// Many-to-one: this record carries `foreign_key`.
    pub fn belongs_to(
        self,
        name: impl Into<String>,
        related: impl Into<String>,
        foreign_key: impl Into<String>,
        owner_key: impl Into<String>,
    ) -> Self {
        self.relation(name, BelongsTo::new(related, foreign_key, owner_key))
    }

    /// One-to-many by id list: this record's `foreign_key` holds related ids.
    pub fn has_many_by(
        self,
        name: impl Into<String>,
        related: impl Into<String>,
        foreign_key: impl Into<String>,
        owner_key: impl Into<String>,
    ) -> Self {
        self.relation(name, HasManyBy::new(related, foreign_key, owner_key))
    }

    /// Many-to-many through a pivot entity.
    #[allow(clippy::too_many_arguments)]
    pub fn belongs_to_many(
        self,
        name: impl Into<String>,
        related: impl Into<String>,
        pivot: impl Into<String>,
        foreign_pivot_key: impl Into<String>,
        related_pivot_key: impl Into<String>,
        parent_key: impl Into<String>,
        related_key: impl Into<String>,
    ) -> Self {
        self.relation(
            name,
            BelongsToMany::new(
                related,
                pivot,
                foreign_pivot_key,
                related_pivot_key,
                parent_key,
                related_key,
            ),
        )
    }

    /// Polymorphic one-to-one.
    pub fn morph_one(
        self,
        name: impl Into<String>,
        related: impl Into<String>,
        id_field: impl Into<String>,
        type_field: impl Into<String>,
        local_key: impl Into<String>,
    ) -> Self {
        self.relation(name, MorphOne::new(related, id_field, type_field, local_key))
    }

    /// Polymorphic one-to-many.
    pub fn morph_many(
        self,
        name: impl Into<String>,
        related: impl Into<String>,
        id_field: impl Into<String>,
        type_field: impl Into<String>,
        local_key: impl Into<String>,
    ) -> Self {
        self.relation(name, MorphMany::new(related, id_field, type_field, local_key))
    }

    /// Polymorphic inverse: the target entity is read per record from
    /// `type_field`.
    pub fn morph_to(
        self,
        name: impl Into<String>,
        id_field: impl Into<String>,
        type_field: impl Into<String>,
    ) -> Self {
        self.relation(name, MorphTo::new(id_field, type_field))
    }

    /// Entity name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Primary-key declaration.
    pub fn key(&self) -> &PrimaryKey {
        &self.primary_key
    }

    /// Ordered field declarations.
    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// Relationship declared under `name`, if any.
    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.fields.get(name).and_then(Field::as_relation)
    }

    /// Names of all declared relationships, in declaration order.
    pub fn relation_names(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(_, field)| field.as_relation().is_some())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Mutator declared on an attribute, if any.
    pub fn mutator(&self, field: &str) -> Option<&Mutator> {
        self.fields
            .get(field)
            .and_then(Field::as_attr)
            .and_then(|attr| attr.mutator.as_ref())
    }
}

/// Resolves entity names to their declarations.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    entities: IndexMap<String, EntitySchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity schema, replacing any previous declaration.
    pub fn register(&mut self, schema: EntitySchema) {
        debug!(entity = schema.name(), "registering entity schema");
        self.entities.insert(schema.name().to_string(), schema);
    }

    /// Schema for `entity`; unknown names are a fatal error at the
    /// outermost call.
    pub fn schema(&self, entity: &str) -> OrmResult<&EntitySchema> {
        self.entities
            .get(entity)
            .ok_or_else(|| OrmError::UnknownEntity(entity.to_string()))
    }

    /// Ordered field declarations for `entity`.
    pub fn fields(&self, entity: &str) -> OrmResult<&FieldMap> {
        self.schema(entity).map(EntitySchema::fields)
    }

    /// Primary-key declaration for `entity`.
    pub fn primary_key(&self, entity: &str) -> OrmResult<&PrimaryKey> {
        self.schema(entity).map(EntitySchema::key)
    }

    /// True when the entity is registered.
    pub fn contains(&self, entity: &str) -> bool {
        self.entities.contains_key(entity)
    }

    /// Registered entity names, in registration order.
    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }
}

/// Uniform string form of a key value, used for table keys and join
/// dictionaries.
pub fn key_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Canonical index id of a record under the given primary key, when every
/// key field is present and non-null. Composite keys serialize as a JSON
/// array string.
pub fn index_id(key: &PrimaryKey, record: &Record) -> Option<String> {
    match key {
        PrimaryKey::Single(field) => record
            .get(field)
            .filter(|value| !value.is_null())
            .map(key_string),
        PrimaryKey::Composite(fields) => {
            let mut values = Vec::with_capacity(fields.len());
            for field in fields {
                let value = record.get(field).filter(|value| !value.is_null())?;
                values.push(value.clone());
            }
            Some(Value::Array(values).to_string())
        }
    }
}
