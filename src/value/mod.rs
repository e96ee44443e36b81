//! Typed value tree shared by the codec, the filter engine and the store backends.

pub mod document;
pub mod object_id;

use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};

pub use document::{Document, ID_FIELD};
pub use object_id::{InvalidObjectId, ObjectId};

/// A single document value.
///
/// Numbers keep their declared width (`Int`, `Long`, `Double`) so a value read back
/// from the store is re-encoded with the same type it was written with; equality
/// and ordering still compare numbers across widths.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    String(String),
    /// Millisecond precision, always UTC.
    Date(DateTime<Utc>),
    ObjectId(ObjectId),
    Binary { subtype: u8, bytes: Vec<u8> },
    Document(Document),
    Array(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Long(_) | Value::Double(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v as i64),
            Value::Long(v) => Some(*v),
            Value::Double(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Long(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Narrowest integer variant that holds `v`.
    pub fn integer(v: i64) -> Value {
        match i32::try_from(v) {
            Ok(small) => Value::Int(small),
            Err(_) => Value::Long(v),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::ObjectId(_) => "objectId",
            Value::Binary { .. } => "binData",
            Value::Document(_) => "object",
            Value::Array(_) => "array",
        }
    }

    /// Position in the cross-type sort order used by document stores.
    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 1,
            Value::Int(_) | Value::Long(_) | Value::Double(_) => 2,
            Value::String(_) => 3,
            Value::Document(_) => 4,
            Value::Array(_) => 5,
            Value::Binary { .. } => 6,
            Value::ObjectId(_) => 7,
            Value::Bool(_) => 8,
            Value::Date(_) => 9,
        }
    }

    /// True when both values belong to the same comparison family, which is the
    /// precondition for range operators like `$gt`.
    pub fn same_family(&self, other: &Value) -> bool {
        self.type_rank() == other.type_rank()
    }

    /// Total ordering: type rank first, then value within the family.
    pub fn compare(&self, other: &Value) -> Ordering {
        let rank = self.type_rank().cmp(&other.type_rank());
        if rank != Ordering::Equal {
            return rank;
        }
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Long(a), Value::Long(b)) => a.cmp(b),
            (Value::Int(a), Value::Long(b)) => (*a as i64).cmp(b),
            (Value::Long(a), Value::Int(b)) => a.cmp(&(*b as i64)),
            (a, b) if a.is_number() => compare_f64(a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0)),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Document(a), Value::Document(b)) => compare_documents(a, b),
            (Value::Array(a), Value::Array(b)) => compare_sequences(a, b),
            (Value::Binary { subtype: sa, bytes: a }, Value::Binary { subtype: sb, bytes: b }) => {
                a.len().cmp(&b.len()).then(sa.cmp(sb)).then_with(|| a.cmp(b))
            }
            (Value::ObjectId(a), Value::ObjectId(b)) => a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

fn compare_f64(a: f64, b: f64) -> Ordering {
    // NaN sorts below every other number
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

fn compare_sequences(a: &[Value], b: &[Value]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        let ord = x.compare(y);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

fn compare_documents(a: &Document, b: &Document) -> Ordering {
    for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
        let ord = va.type_rank().cmp(&vb.type_rank()).then_with(|| ka.cmp(kb)).then_with(|| va.compare(vb));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if self.is_number() && other.is_number() {
            return self.compare(other) == Ordering::Equal;
        }
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::ObjectId(a), Value::ObjectId(b)) => a == b,
            (Value::Binary { subtype: sa, bytes: a }, Value::Binary { subtype: sb, bytes: b }) => sa == sb && a == b,
            (Value::Document(a), Value::Document(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            _ => false,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&crate::codec::encode(self))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(v) => Value::integer(v),
            Err(_) => Value::Double(v as f64),
        }
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::from(v as u64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Date(v)
    }
}

impl From<ObjectId> for Value {
    fn from(v: ObjectId) -> Self {
        Value::ObjectId(v)
    }
}

impl From<Document> for Value {
    fn from(v: Document) -> Self {
        Value::Document(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
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
    use crate::doc;

    #[test]
    fn numbers_compare_across_widths() {
        assert_eq!(Value::Int(5), Value::Long(5));
        assert_eq!(Value::Int(5), Value::Double(5.0));
        assert_ne!(Value::Int(5), Value::String("5".into()));
        assert_eq!(Value::Long(3).compare(&Value::Double(3.5)), Ordering::Less);
    }

    #[test]
    fn type_order_puts_null_first_and_dates_last() {
        let mut values = vec![
            Value::Date(Utc::now()),
            Value::Bool(true),
            Value::from("a"),
            Value::Int(1),
            Value::Null,
            Value::ObjectId(ObjectId::new()),
        ];
        values.sort_by(|a, b| a.compare(b));
        let names: Vec<_> = values.iter().map(Value::type_name).collect();
        assert_eq!(names, vec!["null", "int", "string", "objectId", "bool", "date"]);
    }

    #[test]
    fn documents_compare_field_by_field() {
        let a = Value::from(doc! { "a" => 1 });
        let b = Value::from(doc! { "a" => 2 });
        assert_eq!(a.compare(&b), Ordering::Less);
        assert_eq!(a, Value::from(doc! { "a" => 1i64 }));
    }

    #[test]
    fn integer_picks_narrowest_variant() {
        assert!(matches!(Value::integer(7), Value::Int(7)));
        assert!(matches!(Value::integer(1_584_963_168_123_123_000), Value::Long(_)));
    }
}
