//! Join-dictionary helpers shared by the relation resolvers
//!
//! An in-memory join is a dictionary built from the related rows keyed by
//! the join field, matched against each base record. Row order inside a
//! many-dictionary bucket follows the order the rows were fetched in.

use std::collections::HashMap;

use serde_json::Value;

use crate::schema::key_string;
use crate::Record;

/// Key form of a record's field value, skipping null/missing.
pub(crate) fn field_key(record: &Record, field: &str) -> Option<String> {
    record
        .get(field)
        .filter(|value| !value.is_null())
        .map(key_string)
}

/// Id references held in a relation field value: a single scalar or an
/// array of scalars. Nulls and non-scalars are skipped.
pub(crate) fn ids_of(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter(|item| !item.is_null() && !item.is_object())
            .map(key_string)
            .collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(Value::Object(_)) => Vec::new(),
        Some(scalar) => vec![key_string(scalar)],
    }
}

/// One related row per join key; later rows win on collision.
pub(crate) fn build_dictionary(rows: &[Record], key: &str) -> HashMap<String, Record> {
    let mut dictionary = HashMap::with_capacity(rows.len());
    for row in rows {
        if let Some(join_key) = field_key(row, key) {
            dictionary.insert(join_key, row.clone());
        }
    }
    dictionary
}

/// All related rows per join key, in fetch order.
pub(crate) fn build_many_dictionary(rows: &[Record], key: &str) -> HashMap<String, Vec<Record>> {
    let mut dictionary: HashMap<String, Vec<Record>> = HashMap::new();
    for row in rows {
        if let Some(join_key) = field_key(row, key) {
            dictionary.entry(join_key).or_default().push(row.clone());
        }
    }
    dictionary
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn many_dictionary_preserves_fetch_order() {
        let rows = vec![
            row(&[("id", json!(1)), ("user_id", json!(7))]),
            row(&[("id", json!(2)), ("user_id", json!(7))]),
            row(&[("id", json!(3)), ("user_id", json!(8))]),
        ];
        let dictionary = build_many_dictionary(&rows, "user_id");
        let ids: Vec<_> = dictionary["7"].iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!(1), json!(2)]);
        assert_eq!(dictionary["8"].len(), 1);
    }

    #[test]
    fn ids_of_handles_scalars_and_arrays() {
        assert_eq!(ids_of(Some(&json!(5))), vec!["5".to_string()]);
        assert_eq!(
            ids_of(Some(&json!(["a", 2, null]))),
            vec!["a".to_string(), "2".to_string()]
        );
        assert!(ids_of(Some(&Value::Null)).is_empty());
        assert!(ids_of(None).is_empty());
    }
}
