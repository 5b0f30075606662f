//! Recursive record normalization

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::error::{OrmError, OrmResult};
use crate::normalize::{pivot, NormalizeContext, NormalizedData};
use crate::relationships::Relationship;
use crate::schema::{index_id, Field, FieldMap};
use crate::Record;

/// Normalize a nested payload (single record or array of records) into
/// flat per-entity tables, including pivot-row materialization.
///
/// `Null` and empty-array payloads are a no-op, not an error.
/// Normalizing already-flat data again is not guaranteed idempotent; this
/// is a write-time operation only.
pub fn normalize(
    ctx: &mut NormalizeContext<'_>,
    payload: &Value,
    entity: &str,
) -> OrmResult<NormalizedData> {
    ctx.registry.schema(entity)?;

    let mut data = NormalizedData::new();
    match payload {
        Value::Null => {}
        Value::Array(items) => {
            for item in items {
                match item.as_object() {
                    Some(object) => {
                        normalize_record(ctx, &mut data, entity, object, None)?;
                    }
                    None => {
                        return Err(OrmError::Schema(format!(
                            "cannot normalize non-object element for entity '{entity}'"
                        )))
                    }
                }
            }
        }
        Value::Object(object) => {
            normalize_record(ctx, &mut data, entity, object, None)?;
        }
        _ => {
            return Err(OrmError::Schema(format!(
                "cannot normalize scalar payload for entity '{entity}'"
            )))
        }
    }

    pivot::create_pivots(ctx.registry, &mut data)?;
    Ok(data)
}

/// Normalize one record of `entity`, returning its index id.
///
/// `pivot_carry` names a pivot accessor field to carry through even though
/// it is undeclared; the pivot creator consumes it afterwards.
pub(crate) fn normalize_record(
    ctx: &mut NormalizeContext<'_>,
    data: &mut NormalizedData,
    entity: &str,
    input: &Map<String, Value>,
    pivot_carry: Option<&str>,
) -> OrmResult<String> {
    let schema = ctx.registry.schema(entity)?;
    let fields = schema.fields().clone();
    let key = schema.key().clone();

    let mut record = Record::new();
    build_fields(ctx, data, entity, &fields, input, &mut record, true)?;

    if let Some(accessor) = pivot_carry {
        if let Some(extra @ Value::Object(_)) = input.get(accessor) {
            record.insert(accessor.to_string(), extra.clone());
        }
    }

    let id = match index_id(&key, &record) {
        Some(id) => id,
        None => {
            let id = ctx.sequence.next_id();
            trace!(entity, id = %id, "assigning synthetic id");
            id
        }
    };

    let attach_fields: Vec<String> = fields
        .iter()
        .filter(|(name, field)| field.as_relation().is_some() && record.contains_key(*name))
        .map(|(name, _)| name.clone())
        .collect();

    data.merge_record(entity, id.clone(), record);

    for name in attach_fields {
        if let Some(relation) = fields.get(&name).and_then(Field::as_relation) {
            relation
                .resolver()
                .attach(&name, entity, &id, ctx.registry, data)?;
        }
    }

    Ok(id)
}

/// Copy declared fields from `input` into `record`, normalizing relation
/// values recursively. Undeclared input fields are dropped. Relations are
/// only honored at the top level of a record; inside grouped sub-objects
/// their values are copied verbatim.
fn build_fields(
    ctx: &mut NormalizeContext<'_>,
    data: &mut NormalizedData,
    entity: &str,
    fields: &FieldMap,
    input: &Map<String, Value>,
    record: &mut Record,
    allow_relations: bool,
) -> OrmResult<()> {
    for (name, field) in fields {
        let Some(value) = input.get(name) else {
            continue;
        };
        match field {
            Field::Attr(_) => {
                record.insert(name.clone(), value.clone());
            }
            Field::Nested(sub_fields) => {
                if let Value::Object(sub_input) = value {
                    let mut sub_record = Record::new();
                    build_fields(ctx, data, entity, sub_fields, sub_input, &mut sub_record, false)?;
                    record.insert(name.clone(), Value::Object(sub_record));
                }
            }
            Field::Relation(relation) => {
                if !allow_relations {
                    record.insert(name.clone(), value.clone());
                } else if value.is_null() {
                    record.insert(name.clone(), Value::Null);
                } else {
                    let normalized =
                        normalize_relation_value(ctx, data, input, relation, value)?;
                    record.insert(name.clone(), normalized);
                }
            }
        }
    }
    Ok(())
}

/// Normalize the value of one relation field, replacing nested records by
/// their index ids. Scalar values are treated as already-normalized id
/// references and pass through untouched.
fn normalize_relation_value(
    ctx: &mut NormalizeContext<'_>,
    data: &mut NormalizedData,
    input: &Map<String, Value>,
    relation: &Relationship,
    value: &Value,
) -> OrmResult<Value> {
    let target = match relation {
        Relationship::MorphTo(morph) => input
            .get(&morph.type_field)
            .and_then(Value::as_str)
            .map(ToString::to_string),
        other => other.related_entity().map(ToString::to_string),
    };
    let Some(target) = target else {
        debug!("skipping polymorphic value with unresolved type field");
        return Ok(value.clone());
    };

    let pivot_carry = match relation {
        Relationship::BelongsToMany(many) => Some(many.pivot_accessor.as_str()),
        _ => None,
    };

    if relation.is_collection() {
        let items: Vec<&Value> = match value {
            Value::Array(items) => items.iter().collect(),
            Value::Object(_) => vec![value],
            _ => return Ok(value.clone()),
        };
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Value::Object(object) => {
                    let id = normalize_record(ctx, data, &target, object, pivot_carry)?;
                    ids.push(Value::String(id));
                }
                Value::Null => {}
                other => ids.push(other.clone()),
            }
        }
        Ok(Value::Array(ids))
    } else {
        match value {
            Value::Object(object) => {
                let id = normalize_record(ctx, data, &target, object, pivot_carry)?;
                Ok(Value::String(id))
            }
            other => Ok(other.clone()),
        }
    }
}
