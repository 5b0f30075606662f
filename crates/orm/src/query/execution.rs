//! Query execution - condition resolution, hydration, and aggregates

use std::cmp::Ordering;
use std::collections::HashSet;

use serde_json::Value;

use crate::error::OrmResult;
use crate::query::builder::Query;
use crate::query::has::HasFilter;
use crate::query::ordering::{compare_values, OrderDirection};
use crate::query::where_clause::{matches, Boolean, Condition, Predicate};
use crate::query::with::eager_load_into;
use crate::schema::{Field, FieldMap};
use crate::store::Store;
use crate::Record;

impl<'a> Query<'a> {
    /// Execute the query: filter hydrated copies, stable sort, paginate,
    /// then eager-load onto the final page.
    pub fn get(self) -> OrmResult<Vec<Record>> {
        self.get_filtered(|_| true)
    }

    /// Alias of [`Query::get`].
    pub fn all(self) -> OrmResult<Vec<Record>> {
        self.get()
    }

    /// First record of the result, if any.
    pub fn first(self) -> OrmResult<Option<Record>> {
        Ok(self.limit(1).get()?.into_iter().next())
    }

    /// Direct primary-key lookup, bypassing conditions and ordering but
    /// honoring eager loads. Composite-key entities take an array id.
    pub fn find(self, id: &Value) -> OrmResult<Option<Record>> {
        let Query {
            store,
            entity,
            loads,
            ..
        } = self;
        let key = store.entry_key(&entity, id)?;
        let Some(record) = store.table(&entity)?.get(&key).cloned() else {
            return Ok(None);
        };
        let mut rows = vec![record];
        hydrate_all(store, &entity, &mut rows)?;
        eager_load_into(store, &entity, &mut rows, &loads)?;
        Ok(rows.pop())
    }

    /// Number of records the query yields.
    pub fn count(self) -> OrmResult<usize> {
        Ok(self.get()?.len())
    }

    /// True when the query yields at least one record.
    pub fn exists(self) -> OrmResult<bool> {
        Ok(!self.limit(1).get()?.is_empty())
    }

    /// Largest numeric value of `field` over the result, if any.
    pub fn max(self, field: &str) -> OrmResult<Option<f64>> {
        let field = field.to_string();
        Ok(fold_numeric(&self.get()?, &field, f64::max))
    }

    /// Smallest numeric value of `field` over the result, if any.
    pub fn min(self, field: &str) -> OrmResult<Option<f64>> {
        let field = field.to_string();
        Ok(fold_numeric(&self.get()?, &field, f64::min))
    }

    /// Execute with an extra borrowed row filter; the shared path behind
    /// `get` and relation fetches.
    pub(crate) fn get_filtered<K>(self, keep: K) -> OrmResult<Vec<Record>>
    where
        K: Fn(&Record) -> bool,
    {
        let Query {
            store,
            entity,
            conditions,
            orders,
            limit,
            offset,
            loads,
            has_filters,
        } = self;
        let conditions = resolve_conditions(store, &entity, conditions, has_filters)?;

        // Conditions see hydrated copies so schema defaults are
        // filterable even when the stored record omits the field.
        let fields = store.registry().fields(&entity)?;
        let mut rows: Vec<Record> = store
            .table(&entity)?
            .iter()
            .filter_map(|(key, record)| {
                let mut record = record.clone();
                hydrate_record(&mut record, fields);
                (keep(&record) && matches(&record, key, &conditions)).then_some(record)
            })
            .collect();

        if !orders.is_empty() {
            rows.sort_by(|a, b| {
                for order in &orders {
                    let left = a.get(&order.field).unwrap_or(&Value::Null);
                    let right = b.get(&order.field).unwrap_or(&Value::Null);
                    let ordering = match order.direction {
                        OrderDirection::Asc => compare_values(left, right),
                        OrderDirection::Desc => compare_values(right, left),
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        if offset > 0 {
            let offset = offset.min(rows.len());
            rows.drain(..offset);
        }
        if let Some(limit) = limit {
            rows.truncate(limit);
        }

        eager_load_into(store, &entity, &mut rows, &loads)?;
        Ok(rows)
    }

    /// Table keys of the records matching the conditions alone; used to
    /// reduce nested groups to id membership.
    pub(crate) fn matching_ids(self) -> OrmResult<HashSet<String>> {
        let Query {
            store,
            entity,
            conditions,
            has_filters,
            ..
        } = self;
        let conditions = resolve_conditions(store, &entity, conditions, has_filters)?;
        let fields = store.registry().fields(&entity)?;
        Ok(store
            .table(&entity)?
            .iter()
            .filter(|(key, record)| {
                let mut record = (*record).clone();
                hydrate_record(&mut record, fields);
                matches(&record, key, &conditions)
            })
            .map(|(key, _)| key.clone())
            .collect())
    }
}

/// Reduce sub-query predicates to concrete id sets so row iteration
/// stays a pure record test.
fn resolve_conditions(
    store: &Store,
    entity: &str,
    conditions: Vec<Condition>,
    has_filters: Vec<HasFilter>,
) -> OrmResult<Vec<Condition>> {
    let mut resolved = Vec::with_capacity(conditions.len() + has_filters.len());
    for condition in conditions {
        let predicate = match condition.predicate {
            Predicate::Nested(scope) => {
                let sub = scope(Query::new(store, entity)?);
                Predicate::IdIn(sub.matching_ids()?)
            }
            other => other,
        };
        resolved.push(Condition {
            predicate,
            boolean: condition.boolean,
        });
    }
    for filter in &has_filters {
        resolved.push(Condition {
            predicate: Predicate::IdIn(filter.matching_ids(store, entity)?),
            boolean: Boolean::And,
        });
    }
    Ok(resolved)
}

fn hydrate_all(store: &Store, entity: &str, rows: &mut [Record]) -> OrmResult<()> {
    let fields = store.registry().fields(entity)?;
    for record in rows {
        hydrate_record(record, fields);
    }
    Ok(())
}

/// Fill missing attributes with their declared defaults and apply
/// read-time mutators. Relation fields keep their stored form; grouped
/// sub-objects hydrate recursively.
fn hydrate_record(record: &mut Record, fields: &FieldMap) {
    for (name, field) in fields {
        match field {
            Field::Attr(attr) => {
                let mut value = record
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| attr.default.clone());
                if let Some(mutator) = &attr.mutator {
                    value = mutator(&value);
                }
                record.insert(name.clone(), value);
            }
            Field::Nested(group) => {
                let mut inner = record
                    .get(name)
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                hydrate_record(&mut inner, group);
                record.insert(name.clone(), Value::Object(inner));
            }
            Field::Relation(_) => {}
        }
    }
}

fn fold_numeric(rows: &[Record], field: &str, pick: fn(f64, f64) -> f64) -> Option<f64> {
    rows.iter()
        .filter_map(|record| record.get(field))
        .filter_map(Value::as_f64)
        .fold(None, |best, value| {
            Some(best.map_or(value, |best| pick(best, value)))
        })
}
