use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::{StoreError, StoreResult};

/// A single column value as seen by the record store.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    /// Only valid as the operand of an `__in` condition.
    List(Vec<Value>),
}

impl Value {
    /// Convert a platform snowflake into a BIGINT value.
    pub fn from_id(id: u64) -> StoreResult<Self> {
        i64::try_from(id)
            .map(Value::Int)
            .map_err(|_| StoreError::OutOfRange(format!("id {id}")))
    }

    /// Build an `__in` operand from anything convertible into values.
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// SQL comparison: `None` when either side is NULL or the kinds are incomparable.
    pub fn sql_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Ordering used for `ORDER BY`: NULLs sort after every other value.
    pub(crate) fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self.is_null(), other.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self.sql_cmp(other).unwrap_or(Ordering::Equal),
        }
    }

    /// Render as a SQL literal. Used for column defaults and log output only.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_owned(),
            Value::Bool(true) => "TRUE".to_owned(),
            Value::Bool(false) => "FALSE".to_owned(),
            Value::Int(value) => value.to_string(),
            Value::Float(value) => value.to_string(),
            Value::Text(value) => quote_literal(value),
            Value::Timestamp(value) => quote_literal(&value.to_rfc3339()),
            Value::List(items) => {
                let rendered: Vec<String> = items.iter().map(Value::to_sql_literal).collect();
                format!("({})", rendered.join(", "))
            }
        }
    }
}

fn quote_literal(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', "''"))
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Timestamp(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// One row: column name to value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn get_i64(&self, field: &str) -> StoreResult<i64> {
        match self.get(field) {
            Some(Value::Int(value)) => Ok(*value),
            _ => Err(decode_error(field, "an integer")),
        }
    }

    /// Read a BIGINT column back into a platform snowflake.
    pub fn get_id(&self, field: &str) -> StoreResult<u64> {
        let raw = self.get_i64(field)?;
        u64::try_from(raw).map_err(|_| StoreError::OutOfRange(format!("{field} row value")))
    }

    pub fn get_bool(&self, field: &str) -> StoreResult<bool> {
        match self.get(field) {
            Some(Value::Bool(value)) => Ok(*value),
            _ => Err(decode_error(field, "a boolean")),
        }
    }

    pub fn get_text(&self, field: &str) -> StoreResult<&str> {
        match self.get(field) {
            Some(Value::Text(value)) => Ok(value),
            _ => Err(decode_error(field, "text")),
        }
    }

    pub fn get_opt_text(&self, field: &str) -> StoreResult<Option<&str>> {
        match self.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Text(value)) => Ok(Some(value)),
            Some(_) => Err(decode_error(field, "text")),
        }
    }

    pub fn get_timestamp(&self, field: &str) -> StoreResult<DateTime<Utc>> {
        match self.get(field) {
            Some(Value::Timestamp(value)) => Ok(*value),
            _ => Err(decode_error(field, "a timestamp")),
        }
    }

    pub fn get_opt_timestamp(&self, field: &str) -> StoreResult<Option<DateTime<Utc>>> {
        match self.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Timestamp(value)) => Ok(Some(*value)),
            Some(_) => Err(decode_error(field, "a timestamp")),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (field, value) in iter {
            record.insert(field, value);
        }
        record
    }
}

fn decode_error(field: &str, expected: &'static str) -> StoreError {
    StoreError::Decode {
        field: field.to_owned(),
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snowflakes_beyond_i64_are_rejected() {
        assert_eq!(Value::from_id(42).unwrap(), Value::Int(42));
        assert!(Value::from_id(u64::MAX).is_err());
    }

    #[test]
    fn literals_escape_quotes() {
        assert_eq!(Value::from("it's").to_sql_literal(), "'it''s'");
        assert_eq!(Value::Null.to_sql_literal(), "NULL");
        assert_eq!(Value::list([1_i64, 2]).to_sql_literal(), "(1, 2)");
    }

    #[test]
    fn comparisons_against_null_are_unknown() {
        assert_eq!(Value::Int(1).sql_cmp(&Value::Null), None);
        assert_eq!(Value::Int(1).sql_cmp(&Value::Float(1.5)), Some(Ordering::Less));
        assert_eq!(Value::Null.sort_cmp(&Value::Int(1)), Ordering::Greater);
    }

    #[test]
    fn typed_getters_report_mismatches() {
        let record = Record::new()
            .with("guild_id", 7_i64)
            .with("reason", Option::<String>::None)
            .with("completed", false);

        assert_eq!(record.get_id("guild_id").unwrap(), 7);
        assert_eq!(record.get_opt_text("reason").unwrap(), None);
        assert!(!record.get_bool("completed").unwrap());
        assert!(record.get_text("guild_id").is_err());
    }
}
