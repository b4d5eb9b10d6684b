//! Dynamic values exchanged between typed entities and the document store.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Text form of every timestamp leaving the layer.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A raw document as the store sees it: stored field name to stored value.
pub type Document = BTreeMap<String, Value>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Timestamp(NaiveDateTime),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{:?}", fl),
            Value::String(s) => write!(f, "{}", s),
            Value::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT)),
            Value::List(_) | Value::Map(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Timestamp(_) => "timestamp",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// False when a float anywhere inside is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        match self {
            Value::Float(f) => f.is_finite(),
            Value::List(items) => items.iter().all(Value::is_finite),
            Value::Map(map) => map.values().all(Value::is_finite),
            _ => true,
        }
    }

    /// Falsy values are replaced by the kind's zero value when used as a default.
    pub fn is_falsy(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::Float(f) => *f == 0.0,
            Value::String(s) => s.is_empty(),
            Value::Timestamp(_) => false,
            Value::List(items) => items.is_empty(),
            Value::Map(map) => map.is_empty(),
        }
    }

    /// Ordering used by filter evaluation and client-side sorting.
    ///
    /// Integers and floats compare numerically with each other; lists and
    /// maps only compare equal or not at all. Mixed types are incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::List(_), Value::List(_)) | (Value::Map(_), Value::Map(_)) => {
                (self == other).then_some(Ordering::Equal)
            }
            _ => None,
        }
    }

    /// Total order used for client-side sorting.
    ///
    /// Values rank by type first: null, bool, number, string, timestamp,
    /// list, map. Integers and floats share the number rank and order by
    /// numeric value, with `f64::total_cmp` placing NaN after every other
    /// number.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            // Ties between an int and a float that rounds to it put the float
            // first, so every int stays ordered against its neighbours.
            (Value::Int(a), Value::Float(b)) => {
                (*a as f64).total_cmp(b).then(Ordering::Greater)
            }
            (Value::Float(a), Value::Int(b)) => a.total_cmp(&(*b as f64)).then(Ordering::Less),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b) {
                    let ordering = x.total_cmp(y);
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Map(a), Value::Map(b)) => {
                for ((ka, va), (kb, vb)) in a.iter().zip(b) {
                    let ordering = ka.cmp(kb).then_with(|| va.total_cmp(vb));
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::String(_) => 3,
            Value::Timestamp(_) => 4,
            Value::List(_) => 5,
            Value::Map(_) => 6,
        }
    }

    /// Converts to plain JSON. Timestamps become formatted text and
    /// non-finite floats become null.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::Number((*i).into()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Timestamp(ts) => {
                serde_json::Value::String(ts.format(TIMESTAMP_FORMAT).to_string())
            }
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

macro_rules! impl_from_int {
    ($($t:ty),+) => {
        $(
            impl From<$t> for Value {
                fn from(value: $t) -> Self {
                    Value::Int(value as i64)
                }
            }
        )+
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::Timestamp(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Timestamp(value.naive_utc())
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Value::from_json(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::List(value.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(value: BTreeMap<String, Value>) -> Self {
        Value::Map(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Bridge between a typed struct field and its dynamic [`Value`].
///
/// `from_value` hands back the rejected value so the caller can report it
/// against the field it was bound to.
pub trait FieldValue: Sized {
    fn to_value(&self) -> Value;
    fn from_value(value: Value) -> Result<Self, Value>;
}

impl FieldValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        Ok(value)
    }
}

impl FieldValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(other),
        }
    }
}

macro_rules! impl_field_value_int {
    ($($t:ty),+) => {
        $(
            impl FieldValue for $t {
                fn to_value(&self) -> Value {
                    Value::Int(*self as i64)
                }

                fn from_value(value: Value) -> Result<Self, Value> {
                    match value {
                        Value::Int(i) => <$t>::try_from(i).map_err(|_| Value::Int(i)),
                        other => Err(other),
                    }
                }
            }
        )+
    };
}

impl_field_value_int!(i8, i16, i32, i64, u8, u16, u32);

impl FieldValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Int(i) => Ok(i as f64),
            other => Err(other),
        }
    }
}

impl FieldValue for f32 {
    fn to_value(&self) -> Value {
        Value::Float(*self as f64)
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        f64::from_value(value).map(|f| f as f32)
    }
}

impl FieldValue for String {
    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(other),
        }
    }
}

impl FieldValue for NaiveDateTime {
    fn to_value(&self) -> Value {
        Value::Timestamp(*self)
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Timestamp(ts) => Ok(ts),
            Value::String(s) => {
                NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT).map_err(|_| Value::String(s))
            }
            other => Err(other),
        }
    }
}

impl FieldValue for DateTime<Utc> {
    fn to_value(&self) -> Value {
        Value::Timestamp(self.naive_utc())
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        NaiveDateTime::from_value(value).map(|ts| ts.and_utc())
    }
}

impl FieldValue for serde_json::Value {
    fn to_value(&self) -> Value {
        Value::from_json(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        Ok(value.to_json())
    }
}

impl FieldValue for serde_json::Map<String, serde_json::Value> {
    fn to_value(&self) -> Value {
        Value::from_json(serde_json::Value::Object(self.clone()))
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Map(_) => match value.to_json() {
                serde_json::Value::Object(map) => Ok(map),
                _ => Err(value),
            },
            other => Err(other),
        }
    }
}

impl<T: FieldValue> FieldValue for Vec<T> {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(FieldValue::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(other),
        }
    }
}

impl<T: FieldValue> FieldValue for BTreeMap<String, T> {
    fn to_value(&self) -> Value {
        Value::Map(
            self.iter()
                .map(|(k, v)| (k.clone(), v.to_value()))
                .collect(),
        )
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Map(map) => map
                .into_iter()
                .map(|(k, v)| T::from_value(v).map(|v| (k, v)))
                .collect(),
            other => Err(other),
        }
    }
}

impl<T: FieldValue> FieldValue for HashMap<String, T> {
    fn to_value(&self) -> Value {
        Value::Map(
            self.iter()
                .map(|(k, v)| (k.clone(), v.to_value()))
                .collect(),
        )
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        BTreeMap::<String, T>::from_value(value).map(|map| map.into_iter().collect())
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(inner) => inner.to_value(),
            None => Value::Null,
        }
    }

    /// Null, and any falsy value the inner type rejects (such as the empty
    /// string zero value of a key reference), read as `None`.
    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Null => Ok(None),
            other => match T::from_value(other) {
                Ok(inner) => Ok(Some(inner)),
                Err(rejected) if rejected.is_falsy() => Ok(None),
                Err(rejected) => Err(rejected),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn numbers_compare_across_int_and_float() {
        assert_eq!(Value::Int(2).compare(&Value::Float(2.5)), Some(Ordering::Less));
        assert_eq!(Value::Float(3.0).compare(&Value::Int(3)), Some(Ordering::Equal));
        assert_eq!(Value::Int(1).compare(&Value::String("1".into())), None);
        assert_eq!(Value::Bool(true).compare(&Value::Int(1)), None);
    }

    #[test]
    fn total_cmp_ranks_types_and_orders_nan_last() {
        let mut values = vec![
            Value::from("b"),
            Value::Float(f64::NAN),
            Value::Int(3),
            Value::Null,
            Value::Float(2.5),
            Value::Bool(true),
            Value::from("a"),
            Value::Int(-1),
            Value::List(vec![Value::Int(1)]),
        ];
        values.sort_by(Value::total_cmp);
        assert_eq!(values[..4], [
            Value::Null,
            Value::Bool(true),
            Value::Int(-1),
            Value::Float(2.5),
        ]);
        assert_eq!(values[4], Value::Int(3));
        assert!(matches!(values[5], Value::Float(f) if f.is_nan()));
        assert_eq!(values[6..], [
            Value::from("a"),
            Value::from("b"),
            Value::List(vec![Value::Int(1)]),
        ]);
    }

    #[test]
    fn total_cmp_keeps_int_float_ties_consistent() {
        let big = 1i64 << 53;
        let a = Value::Int(big);
        let b = Value::Int(big + 1);
        let f = Value::Float(big as f64);
        assert_eq!(a.total_cmp(&b), Ordering::Less);
        assert_eq!(f.total_cmp(&a), Ordering::Less);
        assert_eq!(f.total_cmp(&b), Ordering::Less);
        assert_eq!(Value::Int(2).total_cmp(&Value::Float(2.0)), Ordering::Greater);
    }

    #[test]
    fn falsy_values() {
        assert!(Value::Null.is_falsy());
        assert!(Value::Int(0).is_falsy());
        assert!(Value::String(String::new()).is_falsy());
        assert!(Value::List(vec![]).is_falsy());
        assert!(!Value::Int(7).is_falsy());
        assert!(!Value::String("x".into()).is_falsy());
    }

    #[test]
    fn json_conversion_formats_timestamps() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|d| d.and_hms_opt(7, 5, 1))
            .unwrap();
        let value = Value::List(vec![Value::Timestamp(ts), Value::Int(4)]);
        assert_eq!(value.to_json(), serde_json::json!(["2024-03-09 07:05:01", 4]));
    }

    #[test]
    fn json_numbers_keep_integer_kind() {
        assert_eq!(Value::from_json(serde_json::json!(5)), Value::Int(5));
        assert_eq!(Value::from_json(serde_json::json!(5.5)), Value::Float(5.5));
    }

    #[test]
    fn field_values_reject_wrong_variant() {
        assert_eq!(i64::from_value(Value::Bool(true)), Err(Value::Bool(true)));
        assert_eq!(i32::from_value(Value::Int(i64::MAX)), Err(Value::Int(i64::MAX)));
        assert_eq!(Option::<String>::from_value(Value::Null), Ok(None));
        assert_eq!(
            Vec::<i64>::from_value(Value::List(vec![Value::Int(1), Value::Int(2)])),
            Ok(vec![1, 2])
        );
    }
}
