use std::cmp::Ordering;

use crate::value::{Document, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    In,
    NotIn,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Le => "<=",
            Operator::Ge => ">=",
            Operator::In => "IN",
            Operator::NotIn => "NOT_IN",
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One predicate against a stored field. The operand is already in stored
/// form, so stores compare it directly against document values.
#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    field_name: &'static str,
    operator: Operator,
    operand: Value,
}

impl Filter {
    pub fn new(field_name: &'static str, operator: Operator, operand: Value) -> Self {
        Self {
            field_name,
            operator,
            operand,
        }
    }

    pub fn field_name(&self) -> &'static str {
        self.field_name
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn operand(&self) -> &Value {
        &self.operand
    }

    /// Evaluates the predicate against a raw document. A missing field
    /// reads as null.
    pub fn matches(&self, document: &Document) -> bool {
        let value = document.get(self.field_name).unwrap_or(&Value::Null);
        let ordering = || value.compare(&self.operand);
        match self.operator {
            Operator::Eq => ordering() == Some(Ordering::Equal),
            Operator::Ne => ordering() != Some(Ordering::Equal),
            Operator::Lt => ordering() == Some(Ordering::Less),
            Operator::Gt => ordering() == Some(Ordering::Greater),
            Operator::Le => matches!(ordering(), Some(Ordering::Less | Ordering::Equal)),
            Operator::Ge => matches!(ordering(), Some(Ordering::Greater | Ordering::Equal)),
            Operator::In => self.contains(value),
            Operator::NotIn => !self.contains(value),
        }
    }

    fn contains(&self, value: &Value) -> bool {
        match &self.operand {
            Value::List(items) => items
                .iter()
                .any(|item| value.compare(item) == Some(Ordering::Equal)),
            _ => false,
        }
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.field_name, self.operator, self.operand)
    }
}

/// Anything that can be handed to a query as a set of ANDed filters.
pub trait IntoFilters {
    fn into_filters(self) -> Vec<Filter>;
}

impl IntoFilters for Filter {
    fn into_filters(self) -> Vec<Filter> {
        vec![self]
    }
}

impl IntoFilters for Vec<Filter> {
    fn into_filters(self) -> Vec<Filter> {
        self
    }
}

impl<const N: usize> IntoFilters for [Filter; N] {
    fn into_filters(self) -> Vec<Filter> {
        self.into()
    }
}

impl IntoFilters for () {
    fn into_filters(self) -> Vec<Filter> {
        Vec::new()
    }
}
