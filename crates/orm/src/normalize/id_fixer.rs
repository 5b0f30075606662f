//! Id/Key Fixer - reconciles synthetic ids with real ones
//!
//! A record can receive a `_no_key_<n>` id at normalization time and only
//! later gain its real primary key, e.g. when a nested parent assigns the
//! foreign key the child is keyed by, or when an auto-increment field is
//! assigned at persist time. This pass re-keys such records and rewrites
//! stale references held in other records' relation fields.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::error::OrmResult;
use crate::normalize::{NoKeySequence, NormalizedData};
use crate::schema::{index_id, SchemaRegistry, ID_FIELD};

/// Re-key every synthetically-keyed record whose primary key has become
/// derivable, preserving table position, and rewrite references to the old
/// ids. Safe to call repeatedly.
pub fn fix_ids(registry: &SchemaRegistry, data: &mut NormalizedData) -> OrmResult<()> {
    let mut renames: Vec<(String, String, String)> = Vec::new();
    for (entity, table) in data.tables() {
        let key = registry.primary_key(entity)?;
        for (id, record) in table {
            if NoKeySequence::is_synthetic(id) {
                if let Some(real) = index_id(key, record) {
                    renames.push((entity.to_string(), id.clone(), real));
                }
            }
        }
    }
    if renames.is_empty() {
        return Ok(());
    }

    // Synthetic ids are unique across entities, so a flat alias map works.
    let alias: HashMap<String, String> = renames
        .iter()
        .map(|(_, old, new)| (old.clone(), new.clone()))
        .collect();

    for (entity, old, new) in &renames {
        let table = data.table_mut(entity);
        if let Some((index, _, mut record)) = table.shift_remove_full(old) {
            record.insert(ID_FIELD.to_string(), Value::String(new.clone()));
            table.shift_insert(index, new.clone(), record);
        }
    }

    for (_, table) in data.tables_mut() {
        for record in table.values_mut() {
            for value in record.values_mut() {
                rewrite(value, &alias);
            }
        }
    }

    debug!(count = renames.len(), "reconciled synthetic ids");
    Ok(())
}

fn rewrite(value: &mut Value, alias: &HashMap<String, String>) {
    match value {
        Value::String(id) if NoKeySequence::is_synthetic(id) => {
            if let Some(real) = alias.get(id) {
                *id = real.clone();
            }
        }
        Value::Array(items) => {
            for item in items {
                rewrite(item, alias);
            }
        }
        _ => {}
    }
}
