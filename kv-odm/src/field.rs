//! Typed field descriptors.
//!
//! A [`Field`] is declared once per entity type by `#[derive(Entity)]` and
//! lives for the rest of the process. It validates values, converts them to
//! and from their stored representation, produces defaults and builds
//! [`Filter`]s. Comparisons are explicit methods (`eq`, `lt`, ...) rather
//! than operator overloads so every predicate is visible at the call site.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::error::Error;
use crate::filter::{Filter, Operator};
use crate::value::Value;

/// Prefix marking a descending sort key.
pub const DESCENDING: char = '-';

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Any,
    Bool,
    Int,
    Float,
    String,
    Timestamp,
    Json,
    List,
    Map,
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Any => "any",
            FieldKind::Bool => "bool",
            FieldKind::Int => "int",
            FieldKind::Float => "float",
            FieldKind::String => "string",
            FieldKind::Timestamp => "timestamp",
            FieldKind::Json => "json",
            FieldKind::List => "list",
            FieldKind::Map => "map",
        }
    }

    /// JSON kinds are stored as JSON text.
    pub fn is_json(&self) -> bool {
        matches!(self, FieldKind::Json | FieldKind::List | FieldKind::Map)
    }

    /// Structural type predicate. Booleans are never integers.
    pub fn check_type(&self, value: &Value) -> bool {
        match self {
            FieldKind::Any => true,
            FieldKind::Bool => matches!(value, Value::Bool(_)),
            FieldKind::Int => matches!(value, Value::Int(_)),
            FieldKind::Float => matches!(value, Value::Float(_)),
            FieldKind::String => matches!(value, Value::String(_)),
            FieldKind::Timestamp => matches!(value, Value::Timestamp(_)),
            FieldKind::Json => matches!(
                value,
                Value::Bool(_)
                    | Value::Int(_)
                    | Value::Float(_)
                    | Value::String(_)
                    | Value::List(_)
                    | Value::Map(_)
            ),
            FieldKind::List => matches!(value, Value::List(_)),
            FieldKind::Map => matches!(value, Value::Map(_)),
        }
    }

    pub fn zero(&self) -> Value {
        match self {
            FieldKind::Any => Value::Null,
            FieldKind::Bool => Value::Bool(false),
            FieldKind::Int => Value::Int(0),
            FieldKind::Float => Value::Float(0.0),
            FieldKind::String => Value::String(String::new()),
            FieldKind::Timestamp => Value::Timestamp(DateTime::<Utc>::UNIX_EPOCH.naive_utc()),
            FieldKind::Json | FieldKind::Map => Value::Map(Default::default()),
            FieldKind::List => Value::List(Vec::new()),
        }
    }

    /// Converts a domain value into its stored form, coercing scalars.
    /// Returns the value back when it cannot be coerced.
    fn coerce(&self, value: Value) -> Result<Value, Value> {
        // NaN and infinities have no JSON form, so no store can hold them.
        if !value.is_finite() {
            return Err(value);
        }
        if self.is_json() {
            return Ok(Value::String(value.to_json().to_string()));
        }
        match (self, value) {
            (FieldKind::Any | FieldKind::Timestamp, value) => Ok(value),
            (FieldKind::Bool, value) => Ok(Value::Bool(!value.is_falsy())),
            (FieldKind::Int, Value::Int(i)) => Ok(Value::Int(i)),
            (FieldKind::Int, Value::Bool(b)) => Ok(Value::Int(b as i64)),
            (FieldKind::Int, Value::Float(f)) => Ok(Value::Int(f.trunc() as i64)),
            (FieldKind::Int, Value::String(s)) => {
                let parsed = s.trim().parse::<i64>();
                parsed.map(Value::Int).map_err(|_| Value::String(s))
            }
            (FieldKind::Float, Value::Float(f)) => Ok(Value::Float(f)),
            (FieldKind::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
            (FieldKind::Float, Value::Bool(b)) => Ok(Value::Float(if b { 1.0 } else { 0.0 })),
            (FieldKind::Float, Value::String(s)) => {
                let parsed = s.trim().parse::<f64>().ok().filter(|f| f.is_finite());
                parsed.map(Value::Float).ok_or(Value::String(s))
            }
            (FieldKind::String, Value::String(s)) => Ok(Value::String(s)),
            (FieldKind::String, Value::Null) => Err(Value::Null),
            (FieldKind::String, value) => Ok(Value::String(value.to_string())),
            (_, value) => Err(value),
        }
    }
}

/// How a field produces its default.
#[derive(Clone, Debug)]
pub enum DefaultFactory {
    /// No declared default; the kind's zero value is used.
    Zero,
    Static(Value),
    /// Evaluated on every access.
    Producer(fn() -> Value),
}

#[derive(Clone, Debug)]
pub struct Field {
    name: &'static str,
    kind: FieldKind,
    enforce_type: bool,
    default: DefaultFactory,
}

impl Field {
    pub fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            enforce_type: false,
            default: DefaultFactory::Zero,
        }
    }

    pub fn enforce_type(mut self, enforce: bool) -> Self {
        self.enforce_type = enforce;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = DefaultFactory::Static(value.into());
        self
    }

    pub fn default_with(mut self, producer: fn() -> Value) -> Self {
        self.default = DefaultFactory::Producer(producer);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn enforces_type(&self) -> bool {
        self.enforce_type
    }

    pub fn check_type(&self, value: &Value) -> bool {
        self.kind.check_type(value)
    }

    /// The declared default, or the kind's zero value when the declared one
    /// is absent or falsy. Never cached, so list and map defaults are fresh
    /// for every caller.
    pub fn default(&self) -> Value {
        let declared = match &self.default {
            DefaultFactory::Zero => Value::Null,
            DefaultFactory::Static(value) => value.clone(),
            DefaultFactory::Producer(producer) => producer(),
        };
        if declared.is_falsy() {
            self.kind.zero()
        } else {
            declared
        }
    }

    fn ensure_type(&self, value: &Value) -> Result<(), Error> {
        if self.enforce_type && !self.check_type(value) {
            return Err(Error::type_mismatch(self.name, value));
        }
        Ok(())
    }

    fn coerce(&self, value: Value) -> Result<Value, Error> {
        self.kind
            .coerce(value)
            .map_err(|rejected| Error::type_mismatch(self.name, &rejected))
    }

    /// Domain value to stored representation.
    pub fn dumps(&self, value: Value) -> Result<Value, Error> {
        self.ensure_type(&value)?;
        if value.is_null() {
            return Ok(Value::Null);
        }
        self.coerce(value)
    }

    /// Stored representation back to a domain value. Only JSON kinds parse;
    /// everything else is returned as stored.
    pub fn loads(&self, stored: Value) -> Result<Value, Error> {
        match (self.kind.is_json(), stored) {
            (true, Value::String(text)) => {
                let json: serde_json::Value = serde_json::from_str(&text)?;
                Ok(Value::from_json(json))
            }
            (_, stored) => Ok(stored),
        }
    }

    // Only enforced fields can fail here. Null and values that do not
    // coerce are compared as given.
    fn operand(&self, value: Value) -> Result<Value, Error> {
        self.ensure_type(&value)?;
        if value.is_null() {
            return Ok(Value::Null);
        }
        Ok(self.kind.coerce(value).unwrap_or_else(|raw| raw))
    }

    fn filter(&self, op: Operator, value: impl Into<Value>) -> Result<Filter, Error> {
        Ok(Filter::new(self.name, op, self.operand(value.into())?))
    }

    pub fn eq(&self, value: impl Into<Value>) -> Result<Filter, Error> {
        self.filter(Operator::Eq, value)
    }

    pub fn ne(&self, value: impl Into<Value>) -> Result<Filter, Error> {
        self.filter(Operator::Ne, value)
    }

    pub fn lt(&self, value: impl Into<Value>) -> Result<Filter, Error> {
        self.filter(Operator::Lt, value)
    }

    pub fn gt(&self, value: impl Into<Value>) -> Result<Filter, Error> {
        self.filter(Operator::Gt, value)
    }

    pub fn le(&self, value: impl Into<Value>) -> Result<Filter, Error> {
        self.filter(Operator::Le, value)
    }

    pub fn ge(&self, value: impl Into<Value>) -> Result<Filter, Error> {
        self.filter(Operator::Ge, value)
    }

    fn membership(&self, op: Operator, values: Value) -> Result<Filter, Error> {
        let Value::List(items) = values else {
            return Err(Error::InvalidOperand {
                field: self.name.to_string(),
                reason: format!("{} expects a list, got {}", op, values.type_name()),
            });
        };
        let items = items
            .into_iter()
            .map(|item| self.operand(item))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Filter::new(self.name, op, Value::List(items)))
    }

    pub fn in_(&self, values: impl Into<Value>) -> Result<Filter, Error> {
        self.membership(Operator::In, values.into())
    }

    pub fn not_in(&self, values: impl Into<Value>) -> Result<Filter, Error> {
        self.membership(Operator::NotIn, values.into())
    }

    /// Exclusive range as two filters: `> smaller` then `< larger`,
    /// whichever order the bounds are given in.
    pub fn between(
        &self,
        a: impl Into<Value>,
        b: impl Into<Value>,
    ) -> Result<[Filter; 2], Error> {
        let (a, b) = (a.into(), b.into());
        let (low, high) = match a.compare(&b) {
            Some(Ordering::Greater) => (b, a),
            Some(_) => (a, b),
            None => {
                return Err(Error::InvalidOperand {
                    field: self.name.to_string(),
                    reason: format!("cannot order {} against {}", a, b),
                });
            }
        };
        Ok([
            self.filter(Operator::Gt, low)?,
            self.filter(Operator::Lt, high)?,
        ])
    }

    pub fn asc(&self) -> String {
        self.name.to_string()
    }

    pub fn desc(&self) -> String {
        format!("{}{}", DESCENDING, self.name)
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "< {} name={} >", self.kind.name(), self.name)
    }
}
