//! # Predicates
//!
//! Immutable, composable filter expressions over an entity type's
//! serialized fields, independent of where the query runs.
//!
//! ## Evaluation Sites
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     One Predicate, Two Executors                        │
//! │                                                                         │
//! │  Predicate::eq("lastName", "Lovelace") & Predicate::contains(...)     │
//! │       │                                                                 │
//! │       ├── FromLocalCache ──► Predicate::matches(&Value)   (this file)  │
//! │       │                                                                 │
//! │       └── FromServer ──────► data service translation (e.g. SQL)       │
//! │                                                                         │
//! │  Both sides must agree, so the semantics are pinned down here:         │
//! │  • missing field == null                                               │
//! │  • numbers compare numerically, strings bytewise                       │
//! │  • Contains / StartsWith are ASCII case-insensitive                    │
//! │  • mismatched types never compare (ordering ops are false)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::cmp::Ordering;
use std::ops::{BitAnd, BitOr, Not};

use serde::{Deserialize, Serialize};
use serde_json::Value;

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    Contains,
    StartsWith,
}

///
/// ComparePredicate
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComparePredicate {
    /// Serialized field name; dots address nested objects.
    pub field: String,
    pub op: CompareOp,
    pub value: Value,
}

impl ComparePredicate {
    pub fn new(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        ComparePredicate {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    fn matches(&self, entity: &Value) -> bool {
        let actual = field_value(entity, &self.field);

        match self.op {
            CompareOp::Eq => values_equal(actual, &self.value),
            CompareOp::Ne => !values_equal(actual, &self.value),
            CompareOp::Lt => compare(actual, &self.value) == Some(Ordering::Less),
            CompareOp::Lte => matches!(
                compare(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            CompareOp::Gt => compare(actual, &self.value) == Some(Ordering::Greater),
            CompareOp::Gte => matches!(
                compare(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            CompareOp::In => match &self.value {
                Value::Array(candidates) => candidates.iter().any(|c| values_equal(actual, c)),
                _ => false,
            },
            CompareOp::Contains => text_pair(actual, &self.value)
                .is_some_and(|(haystack, needle)| haystack.contains(&needle)),
            CompareOp::StartsWith => text_pair(actual, &self.value)
                .is_some_and(|(haystack, prefix)| haystack.starts_with(&prefix)),
        }
    }
}

///
/// Predicate
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    True,
    False,
    And(Vec<Self>),
    Or(Vec<Self>),
    Not(Box<Self>),
    Compare(ComparePredicate),
    IsNull { field: String },
}

impl Default for Predicate {
    fn default() -> Self {
        Predicate::True
    }
}

impl Predicate {
    #[must_use]
    pub const fn and(preds: Vec<Self>) -> Self {
        Self::And(preds)
    }

    #[must_use]
    pub const fn or(preds: Vec<Self>) -> Self {
        Self::Or(preds)
    }

    #[must_use]
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Compare(ComparePredicate::new(field, CompareOp::Eq, value))
    }

    #[must_use]
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Compare(ComparePredicate::new(field, CompareOp::Ne, value))
    }

    #[must_use]
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Compare(ComparePredicate::new(field, CompareOp::Lt, value))
    }

    #[must_use]
    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Compare(ComparePredicate::new(field, CompareOp::Lte, value))
    }

    #[must_use]
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Compare(ComparePredicate::new(field, CompareOp::Gt, value))
    }

    #[must_use]
    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Compare(ComparePredicate::new(field, CompareOp::Gte, value))
    }

    #[must_use]
    pub fn in_<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        Self::Compare(ComparePredicate::new(field, CompareOp::In, Value::Array(values)))
    }

    #[must_use]
    pub fn contains(field: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Compare(ComparePredicate::new(
            field,
            CompareOp::Contains,
            Value::String(text.into()),
        ))
    }

    #[must_use]
    pub fn starts_with(field: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Compare(ComparePredicate::new(
            field,
            CompareOp::StartsWith,
            Value::String(text.into()),
        ))
    }

    #[must_use]
    pub fn is_null(field: impl Into<String>) -> Self {
        Self::IsNull {
            field: field.into(),
        }
    }

    /// True when this predicate trivially matches everything.
    pub fn is_true(&self) -> bool {
        match self {
            Predicate::True => true,
            Predicate::And(preds) => preds.iter().all(Predicate::is_true),
            _ => false,
        }
    }

    /// Evaluates the predicate against one serialized entity.
    pub fn matches(&self, entity: &Value) -> bool {
        match self {
            Predicate::True => true,
            Predicate::False => false,
            Predicate::And(preds) => preds.iter().all(|p| p.matches(entity)),
            Predicate::Or(preds) => preds.iter().any(|p| p.matches(entity)),
            Predicate::Not(inner) => !inner.matches(entity),
            Predicate::Compare(cmp) => cmp.matches(entity),
            Predicate::IsNull { field } => field_value(entity, field).is_null(),
        }
    }
}

impl BitAnd for Predicate {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Predicate::True, other) | (other, Predicate::True) => other,
            (Predicate::And(mut left), Predicate::And(right)) => {
                left.extend(right);
                Predicate::And(left)
            }
            (Predicate::And(mut left), other) => {
                left.push(other);
                Predicate::And(left)
            }
            (lhs, rhs) => Predicate::And(vec![lhs, rhs]),
        }
    }
}

impl BitAnd for &Predicate {
    type Output = Predicate;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.clone() & rhs.clone()
    }
}

impl BitOr for Predicate {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Predicate::Or(mut left), Predicate::Or(right)) => {
                left.extend(right);
                Predicate::Or(left)
            }
            (lhs, rhs) => Predicate::Or(vec![lhs, rhs]),
        }
    }
}

impl BitOr for &Predicate {
    type Output = Predicate;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.clone() | rhs.clone()
    }
}

impl Not for Predicate {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            Predicate::Not(inner) => *inner,
            other => Predicate::Not(Box::new(other)),
        }
    }
}

// =============================================================================
// Value helpers
// =============================================================================

static NULL: Value = Value::Null;

fn field_value<'a>(entity: &'a Value, field: &str) -> &'a Value {
    field
        .split('.')
        .try_fold(entity, |current, segment| current.get(segment))
        .unwrap_or(&NULL)
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
        },
        (Value::String(a), Value::String(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        _ => compare(left, right) == Some(Ordering::Equal),
    }
}

fn text_pair(actual: &Value, pattern: &Value) -> Option<(String, String)> {
    match (actual, pattern) {
        (Value::String(a), Value::String(p)) => Some((a.to_ascii_lowercase(), p.to_ascii_lowercase())),
        _ => None,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ada() -> Value {
        json!({
            "id": "1",
            "firstName": "Ada",
            "lastName": "Lovelace",
            "age": 36,
            "rate": 12.5,
            "active": true,
            "middleName": null,
            "address": { "city": "London" }
        })
    }

    #[test]
    fn test_equality() {
        assert!(Predicate::eq("firstName", "Ada").matches(&ada()));
        assert!(!Predicate::eq("firstName", "ada").matches(&ada()));
        assert!(Predicate::eq("age", 36).matches(&ada()));
        assert!(Predicate::eq("age", 36.0).matches(&ada()));
        assert!(Predicate::eq("active", true).matches(&ada()));
        assert!(Predicate::ne("lastName", "Byron").matches(&ada()));
    }

    #[test]
    fn test_missing_field_is_null() {
        assert!(Predicate::is_null("middleName").matches(&ada()));
        assert!(Predicate::is_null("nickname").matches(&ada()));
        assert!(Predicate::ne("nickname", "x").matches(&ada()));
        assert!(!Predicate::lt("nickname", "x").matches(&ada()));
    }

    #[test]
    fn test_ordering() {
        assert!(Predicate::gt("age", 30).matches(&ada()));
        assert!(Predicate::gte("age", 36).matches(&ada()));
        assert!(Predicate::lt("rate", 13).matches(&ada()));
        assert!(Predicate::lte("lastName", "Lovelace").matches(&ada()));
        // mismatched types never compare
        assert!(!Predicate::gt("age", "10").matches(&ada()));
    }

    #[test]
    fn test_text_operators_ignore_ascii_case() {
        assert!(Predicate::contains("lastName", "LACE").matches(&ada()));
        assert!(Predicate::starts_with("lastName", "love").matches(&ada()));
        assert!(!Predicate::starts_with("lastName", "lace").matches(&ada()));
    }

    #[test]
    fn test_in_and_nested_fields() {
        assert!(Predicate::in_("firstName", ["Grace", "Ada"]).matches(&ada()));
        assert!(!Predicate::in_("firstName", Vec::<String>::new()).matches(&ada()));
        assert!(Predicate::eq("address.city", "London").matches(&ada()));
    }

    #[test]
    fn test_composition() {
        let both = Predicate::eq("firstName", "Ada") & Predicate::gt("age", 30);
        assert!(both.matches(&ada()));
        assert!(matches!(&both, Predicate::And(parts) if parts.len() == 2));

        let flattened = both & Predicate::eq("active", true);
        assert!(matches!(&flattened, Predicate::And(parts) if parts.len() == 3));

        let either = Predicate::eq("firstName", "Grace") | Predicate::eq("lastName", "Lovelace");
        assert!(either.matches(&ada()));

        assert!(!(!Predicate::True).matches(&ada()));
        assert_eq!(!!Predicate::eq("age", 36), Predicate::eq("age", 36));
    }

    #[test]
    fn test_true_is_identity_for_and() {
        let p = Predicate::True & Predicate::eq("age", 36);
        assert_eq!(p, Predicate::eq("age", 36));
        assert!(Predicate::True.is_true());
        assert!(Predicate::and(vec![Predicate::True, Predicate::True]).is_true());
        assert!(!Predicate::eq("age", 36).is_true());
    }
}
