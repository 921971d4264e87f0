//! Declared collection ordering.
//!
//! An ordering is a list of field names, `-field` meaning descending. Later
//! keys break ties left by earlier ones and equal records keep their relative
//! position, so re-sorting a patched list is deterministic.

use std::cmp::Ordering;

use serde_json::Value;

use crate::model::Record;

// == Order Key ==
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderKey {
    pub field: String,
    pub descending: bool,
}

impl OrderKey {
    pub fn parse(term: &str) -> Self {
        match term.strip_prefix('-') {
            Some(field) => Self {
                field: field.to_string(),
                descending: true,
            },
            None => Self {
                field: term.to_string(),
                descending: false,
            },
        }
    }

    fn compare(&self, a: &Record, b: &Record) -> Ordering {
        let ord = compare_values(a.get(&self.field), b.get(&self.field));
        if self.descending {
            ord.reverse()
        } else {
            ord
        }
    }
}

// == Sort Order ==
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortOrder(Vec<OrderKey>);

impl SortOrder {
    pub fn parse<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(fields.into_iter().map(|f| OrderKey::parse(f.as_ref())).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> &[OrderKey] {
        &self.0
    }

    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        self.0
            .iter()
            .map(|key| key.compare(a, b))
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    /// Stable sort; a no-op for an empty ordering.
    pub fn sort(&self, records: &mut [Record]) {
        if !self.is_empty() {
            records.sort_by(|a, b| self.compare(a, b));
        }
    }
}

/// Total order over JSON field values: absent/null < bool < number < string,
/// anything else compared by its serialized form.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.unwrap_or(&Value::Null);
    let b = b.unwrap_or(&Value::Null);

    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let x = x.as_f64().unwrap_or(f64::NAN);
                let y = y.as_f64().unwrap_or(f64::NAN);
                x.total_cmp(&y)
            }
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => {
            let (ra, rb) = (rank(a), rank(b));
            if ra != rb {
                ra.cmp(&rb)
            } else {
                a.to_string().cmp(&b.to_string())
            }
        }
    }
}

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
