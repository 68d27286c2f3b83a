//! Scalar values flowing through row batches

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Timestamp text format used for rendering and template substitution.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Scalar type of a column, as reported by adapters and inferred from values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    Boolean,
    Integer,
    Float,
    Text,
    Timestamp,
    /// Type could not be determined (all-null column, exotic adapter type)
    Unknown,
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScalarType::Boolean => "boolean",
            ScalarType::Integer => "integer",
            ScalarType::Float => "float",
            ScalarType::Text => "text",
            ScalarType::Timestamp => "timestamp",
            ScalarType::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A single cell value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Timestamp(NaiveDateTime),
    Text(String),
}

/// Hashable projection of a [`Value`], used for GROUP BY keys and
/// duplicate elimination. Integral floats collapse onto integers so that
/// `1` and `1.0` group together.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(u64),
    Timestamp(i64),
    Text(String),
}

impl Value {
    /// Whether this is SQL NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The scalar type of this value (`Unknown` for NULL)
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Value::Null => ScalarType::Unknown,
            Value::Boolean(_) => ScalarType::Boolean,
            Value::Integer(_) => ScalarType::Integer,
            Value::Float(_) => ScalarType::Float,
            Value::Timestamp(_) => ScalarType::Timestamp,
            Value::Text(_) => ScalarType::Text,
        }
    }

    /// Boolean view of the value; NULL and non-booleans yield `None`
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer view of the value (integral floats included)
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    /// Numeric view of the value
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Text view of the value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// SQL comparison. Returns `None` when either side is NULL or the types
    /// cannot be compared. Text compared with a timestamp is parsed as one.
    pub fn sql_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Text(b)) => parse_timestamp(b).map(|b| a.cmp(&b)),
            (Value::Text(a), Value::Timestamp(b)) => parse_timestamp(a).map(|a| a.cmp(b)),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => None,
            },
        }
    }

    /// SQL equality with three-valued logic (`None` is UNKNOWN)
    pub fn sql_eq(&self, other: &Value) -> Option<bool> {
        self.sql_cmp(other).map(|o| o == Ordering::Equal)
    }

    /// Total order used by ORDER BY: NULLs sort first, incomparable values
    /// fall back to type rank.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self.is_null(), other.is_null()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }
        self.sql_cmp(other)
            .unwrap_or_else(|| self.type_rank().cmp(&other.type_rank()))
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Integer(_) | Value::Float(_) => 2,
            Value::Timestamp(_) => 3,
            Value::Text(_) => 4,
        }
    }

    /// Hashable key for grouping and deduplication
    pub fn group_key(&self) -> GroupKey {
        match self {
            Value::Null => GroupKey::Null,
            Value::Boolean(b) => GroupKey::Boolean(*b),
            Value::Integer(i) => GroupKey::Integer(*i),
            Value::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                GroupKey::Integer(*f as i64)
            }
            Value::Float(f) => GroupKey::Float(f.to_bits()),
            Value::Timestamp(t) => GroupKey::Timestamp(t.and_utc().timestamp_micros()),
            Value::Text(s) => GroupKey::Text(s.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Timestamp(t) => write!(f, "{}", t.format(TIMESTAMP_FORMAT)),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// Parse a timestamp from the textual forms accepted in SQL literals.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    for fmt in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
    ] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_cross_type_compare() {
        assert_eq!(
            Value::Integer(2).sql_cmp(&Value::Float(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(Value::Integer(3).sql_eq(&Value::Float(3.0)), Some(true));
    }

    #[test]
    fn test_null_comparisons_are_unknown() {
        assert_eq!(Value::Null.sql_eq(&Value::Integer(1)), None);
        assert_eq!(Value::Integer(1).sql_cmp(&Value::Null), None);
    }

    #[test]
    fn test_timestamp_against_text() {
        let ts = parse_timestamp("2020-01-02 00:00:00").unwrap();
        let v = Value::Timestamp(ts);
        assert_eq!(
            v.sql_cmp(&Value::from("2020-01-01 00:00:00")),
            Some(Ordering::Greater)
        );
        assert_eq!(v.sql_cmp(&Value::from("2020-01-02")), Some(Ordering::Equal));
        assert_eq!(v.sql_cmp(&Value::from("not a date")), None);
    }

    #[test]
    fn test_group_key_collapses_integral_floats() {
        assert_eq!(Value::Float(1.0).group_key(), Value::Integer(1).group_key());
        assert_ne!(Value::Float(1.5).group_key(), Value::Integer(1).group_key());
    }

    #[test]
    fn test_sort_cmp_nulls_first() {
        let mut values = vec![Value::Integer(3), Value::Null, Value::Integer(1)];
        values.sort_by(|a, b| a.sort_cmp(b));
        assert_eq!(values, vec![Value::Null, Value::Integer(1), Value::Integer(3)]);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Float(62.5).to_string(), "62.5");
        let ts = parse_timestamp("2020-01-03").unwrap();
        assert_eq!(Value::Timestamp(ts).to_string(), "2020-01-03 00:00:00");
    }
}
