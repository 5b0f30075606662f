//! Where clauses - condition kinds and the AND/OR combination rule

use std::cmp::Ordering;
use std::collections::HashSet;
use std::rc::Rc;

use serde_json::Value;

use crate::query::builder::Query;
use crate::query::ordering::compare_values;
use crate::query::with::QueryScope;
use crate::Record;

/// How a condition joins the clause list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Boolean {
    And,
    Or,
}

/// Predicate forms a condition can take. Closures are held behind `Rc`
/// so conditions stay cheap to move through the builder.
pub(crate) enum Predicate {
    /// Field equals a literal; numbers compare numerically
    Equals(String, Value),
    /// Field is one of the given literals
    In(String, Vec<Value>),
    /// Closure over one field's value (missing fields read as null)
    Field(String, Rc<dyn Fn(&Value) -> bool>),
    /// Closure over the whole record
    Record(Rc<dyn Fn(&Record) -> bool>),
    /// Nested condition group built by a sub-query scope
    Nested(QueryScope),
    /// Resolved id membership; nested groups and existence filters
    /// reduce to this before row iteration
    IdIn(HashSet<String>),
}

pub(crate) struct Condition {
    pub predicate: Predicate,
    pub boolean: Boolean,
}

impl<'a> Query<'a> {
    fn push(mut self, predicate: Predicate, boolean: Boolean) -> Self {
        self.conditions.push(Condition { predicate, boolean });
        self
    }

    /// AND: `field` equals `value`.
    pub fn where_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(Predicate::Equals(field.into(), value.into()), Boolean::And)
    }

    /// OR: `field` equals `value`.
    pub fn or_where_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(Predicate::Equals(field.into(), value.into()), Boolean::Or)
    }

    /// AND: `field` is one of `values`.
    pub fn where_in<I, V>(self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.push(Predicate::In(field.into(), values), Boolean::And)
    }

    /// OR: `field` is one of `values`.
    pub fn or_where_in<I, V>(self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.push(Predicate::In(field.into(), values), Boolean::Or)
    }

    /// AND: closure over `field`'s value.
    pub fn where_field<F>(self, field: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + 'static,
    {
        self.push(
            Predicate::Field(field.into(), Rc::new(predicate)),
            Boolean::And,
        )
    }

    /// OR: closure over `field`'s value.
    pub fn or_where_field<F>(self, field: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + 'static,
    {
        self.push(
            Predicate::Field(field.into(), Rc::new(predicate)),
            Boolean::Or,
        )
    }

    /// AND: closure over the whole record.
    pub fn where_record<F>(self, predicate: F) -> Self
    where
        F: Fn(&Record) -> bool + 'static,
    {
        self.push(Predicate::Record(Rc::new(predicate)), Boolean::And)
    }

    /// OR: closure over the whole record.
    pub fn or_where_record<F>(self, predicate: F) -> Self
    where
        F: Fn(&Record) -> bool + 'static,
    {
        self.push(Predicate::Record(Rc::new(predicate)), Boolean::Or)
    }

    /// AND: nested condition group over the same entity. The group's own
    /// AND/OR rule applies inside before joining the outer clause list.
    pub fn where_query<F>(self, scope: F) -> Self
    where
        F: for<'q> Fn(Query<'q>) -> Query<'q> + 'static,
    {
        self.push(Predicate::Nested(Rc::new(scope)), Boolean::And)
    }

    /// OR: nested condition group over the same entity.
    pub fn or_where_query<F>(self, scope: F) -> Self
    where
        F: for<'q> Fn(Query<'q>) -> Query<'q> + 'static,
    {
        self.push(Predicate::Nested(Rc::new(scope)), Boolean::Or)
    }
}

/// Combination rule over the clause list: a record matches when it
/// satisfies every AND clause, or any single OR clause. No clauses
/// matches everything.
pub(crate) fn matches(record: &Record, key: &str, conditions: &[Condition]) -> bool {
    let mut all_ands = true;
    let mut any_and = false;
    let mut any_or_hit = false;
    let mut any_or = false;
    for condition in conditions {
        let hit = predicate_matches(record, key, &condition.predicate);
        match condition.boolean {
            Boolean::And => {
                any_and = true;
                all_ands &= hit;
            }
            Boolean::Or => {
                any_or = true;
                any_or_hit |= hit;
            }
        }
    }
    if !any_and && !any_or {
        return true;
    }
    (any_and && all_ands) || any_or_hit
}

fn predicate_matches(record: &Record, key: &str, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::Equals(field, value) => {
            let actual = record.get(field).unwrap_or(&Value::Null);
            compare_values(actual, value) == Ordering::Equal
        }
        Predicate::In(field, values) => {
            let actual = record.get(field).unwrap_or(&Value::Null);
            values
                .iter()
                .any(|value| compare_values(actual, value) == Ordering::Equal)
        }
        Predicate::Field(field, f) => f(record.get(field).unwrap_or(&Value::Null)),
        Predicate::Record(f) => f(record),
        // replaced by IdIn during condition resolution
        Predicate::Nested(_) => true,
        Predicate::IdIn(ids) => ids.contains(key),
    }
}
