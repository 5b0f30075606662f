//! Ordering - stable multi-key sort with a cross-type total order

use std::cmp::Ordering;

use serde_json::Value;

use crate::query::builder::Query;

/// Sort direction for one ordering key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub(crate) struct Order {
    pub field: String,
    pub direction: OrderDirection,
}

impl<'a> Query<'a> {
    /// Sort ascending by `field`. Repeated calls append tie-breaker keys;
    /// records equal under every key keep their insertion order.
    pub fn order_by(self, field: impl Into<String>) -> Self {
        self.order_by_direction(field, OrderDirection::Asc)
    }

    /// Sort descending by `field`.
    pub fn order_by_desc(self, field: impl Into<String>) -> Self {
        self.order_by_direction(field, OrderDirection::Desc)
    }

    /// Sort by `field` in the given direction.
    pub fn order_by_direction(
        mut self,
        field: impl Into<String>,
        direction: OrderDirection,
    ) -> Self {
        self.orders.push(Order {
            field: field.into(),
            direction,
        });
        self
    }
}

/// Total order across JSON values: null < bool < number < string <
/// array < object. Numbers compare as f64, arrays lexicographically.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NEG_INFINITY);
            let y = y.as_f64().unwrap_or(f64::NEG_INFINITY);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (left, right) in x.iter().zip(y.iter()) {
                let ordering = compare_values(left, right);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => rank(a).cmp(&rank(b)),
    }
}
