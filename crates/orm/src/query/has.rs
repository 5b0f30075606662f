//! Existence filters - constrain base records by related-record counts
//!
//! A filter loads the relation path onto a throwaway copy of the table,
//! counts the loaded rows per record, and reduces to an id-membership
//! condition joined with AND. Dotted paths count the leaf level, summed
//! across intermediate collections.

use std::collections::HashSet;
use std::rc::Rc;

use serde_json::Value;

use crate::error::{OrmError, OrmResult};
use crate::query::builder::Query;
use crate::query::with::{eager_load_into, EagerLoadSpec, QueryScope};
use crate::schema::ID_FIELD;
use crate::store::Store;
use crate::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CountOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CountOp {
    fn parse(operator: &str) -> OrmResult<Self> {
        match operator {
            "=" | "==" => Ok(Self::Eq),
            "!=" | "<>" => Ok(Self::Ne),
            ">" => Ok(Self::Gt),
            ">=" => Ok(Self::Ge),
            "<" => Ok(Self::Lt),
            "<=" => Ok(Self::Le),
            other => Err(OrmError::Schema(format!(
                "unsupported count operator '{other}'"
            ))),
        }
    }

    fn compare(self, count: i64, value: i64) -> bool {
        match self {
            Self::Eq => count == value,
            Self::Ne => count != value,
            Self::Gt => count > value,
            Self::Ge => count >= value,
            Self::Lt => count < value,
            Self::Le => count <= value,
        }
    }
}

pub(crate) struct HasFilter {
    path: String,
    op: CountOp,
    count: i64,
    negate: bool,
    constraints: Vec<QueryScope>,
}

impl HasFilter {
    /// Spec chain for the dotted path; constraints apply to the first
    /// relation level.
    fn spec(&self) -> EagerLoadSpec {
        let mut spec: Option<EagerLoadSpec> = None;
        for segment in self.path.rsplit('.') {
            let mut node = EagerLoadSpec::named(segment.trim());
            if let Some(child) = spec.take() {
                node.nested.push(child);
            }
            spec = Some(node);
        }
        let mut spec = spec.unwrap_or_else(|| EagerLoadSpec::named(self.path.as_str()));
        spec.constraints.clone_from(&self.constraints);
        spec
    }

    /// Table keys of the base records the filter keeps.
    pub(crate) fn matching_ids(&self, store: &Store, entity: &str) -> OrmResult<HashSet<String>> {
        let mut rows: Vec<Record> = store.table(entity)?.values().cloned().collect();
        let spec = self.spec();
        eager_load_into(store, entity, &mut rows, std::slice::from_ref(&spec))?;
        let segments: Vec<&str> = self.path.split('.').collect();
        let mut ids = HashSet::new();
        for row in &rows {
            let count = count_path(row, &segments);
            if self.op.compare(count, self.count) != self.negate {
                if let Some(id) = row.get(ID_FIELD).and_then(Value::as_str) {
                    ids.insert(id.to_string());
                }
            }
        }
        Ok(ids)
    }
}

fn count_path(record: &Record, segments: &[&str]) -> i64 {
    let Some((head, rest)) = segments.split_first() else {
        return 0;
    };
    match record.get(*head) {
        Some(Value::Array(items)) => {
            if rest.is_empty() {
                items.len() as i64
            } else {
                items
                    .iter()
                    .filter_map(Value::as_object)
                    .map(|item| count_path(item, rest))
                    .sum()
            }
        }
        Some(Value::Object(inner)) => {
            if rest.is_empty() {
                1
            } else {
                count_path(inner, rest)
            }
        }
        _ => 0,
    }
}

impl<'a> Query<'a> {
    fn push_has(
        mut self,
        path: &str,
        op: CountOp,
        count: i64,
        negate: bool,
        constraints: Vec<QueryScope>,
    ) -> Self {
        self.has_filters.push(HasFilter {
            path: path.to_string(),
            op,
            count,
            negate,
            constraints,
        });
        self
    }

    /// Keep records with at least one related record under `path`.
    pub fn has(self, path: &str) -> Self {
        self.push_has(path, CountOp::Ge, 1, false, Vec::new())
    }

    /// Keep records with at least `count` related records.
    pub fn has_count(self, path: &str, count: i64) -> Self {
        self.push_has(path, CountOp::Ge, count, false, Vec::new())
    }

    /// Keep records whose related count satisfies `operator` (`=`, `!=`,
    /// `>`, `>=`, `<`, `<=`) against `count`.
    pub fn has_op(self, path: &str, operator: &str, count: i64) -> OrmResult<Self> {
        let op = CountOp::parse(operator)?;
        Ok(self.push_has(path, op, count, false, Vec::new()))
    }

    /// Keep records with no related records under `path`.
    pub fn has_not(self, path: &str) -> Self {
        self.push_has(path, CountOp::Ge, 1, true, Vec::new())
    }

    /// Existence filter with a constraint on the relation's sub-query.
    pub fn where_has<F>(self, path: &str, constraint: F) -> Self
    where
        F: for<'q> Fn(Query<'q>) -> Query<'q> + 'static,
    {
        self.push_has(path, CountOp::Ge, 1, false, vec![Rc::new(constraint)])
    }

    /// Inverse existence filter with a constraint: keep records with no
    /// related record satisfying it.
    pub fn where_has_not<F>(self, path: &str, constraint: F) -> Self
    where
        F: for<'q> Fn(Query<'q>) -> Query<'q> + 'static,
    {
        self.push_has(path, CountOp::Ge, 1, true, vec![Rc::new(constraint)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn to_record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => Record::new(),
        }
    }

    #[test]
    fn count_path_over_arrays_and_objects() {
        let record = to_record(json!({
            "posts": [
                { "comments": [{}, {}] },
                { "comments": [{}] },
            ],
            "profile": { "avatar": {} },
        }));
        assert_eq!(count_path(&record, &["posts"]), 2);
        assert_eq!(count_path(&record, &["posts", "comments"]), 3);
        assert_eq!(count_path(&record, &["profile"]), 1);
        assert_eq!(count_path(&record, &["missing"]), 0);
    }

    #[test]
    fn count_operator_parsing() {
        assert!(CountOp::parse(">=").is_ok());
        assert!(CountOp::parse("<>").is_ok());
        assert!(matches!(
            CountOp::parse("~"),
            Err(OrmError::Schema(_))
        ));
    }
}
