use std::fmt::{Display, Formatter};

use crate::value::{ObjectId, Value};

/// Marker that forces the rest of a path segment to be read as a string.
pub const STRING_MARKER: char = '\'';

/// Primary key parsed out of a URL path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    ObjectId(ObjectId),
    Integer(i64),
    String(String),
}

impl Identifier {
    /// Classifies a raw path segment. Never fails: anything that is neither an
    /// object id nor an integer, and carries no string marker, is kept verbatim.
    ///
    /// Order: 24 hex digits, then a full base-10 integer, then `'`-prefixed text
    /// (marker stripped), then the raw text.
    pub fn resolve(segment: &str) -> Self {
        if let Ok(id) = ObjectId::parse_str(segment) {
            return Identifier::ObjectId(id);
        }
        if let Ok(n) = segment.parse::<i64>() {
            return Identifier::Integer(n);
        }
        if let Some(rest) = segment.strip_prefix(STRING_MARKER) {
            return Identifier::String(rest.to_string());
        }
        Identifier::String(segment.to_string())
    }

    /// Maps a stored `_id` back to an identifier, if it is one of the addressable kinds.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::ObjectId(id) => Some(Identifier::ObjectId(*id)),
            Value::Int(n) => Some(Identifier::Integer(*n as i64)),
            Value::Long(n) => Some(Identifier::Integer(*n)),
            Value::String(s) => Some(Identifier::String(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Identifier::ObjectId(id) => Value::ObjectId(*id),
            Identifier::Integer(n) => Value::integer(*n),
            Identifier::String(s) => Value::String(s.clone()),
        }
    }

    /// Renders the identifier so that [Identifier::resolve] yields it back. Strings
    /// that would otherwise resolve to another variant, or that start with the
    /// marker themselves, get the marker prepended.
    pub fn to_path_segment(&self) -> String {
        match self {
            Identifier::ObjectId(id) => id.to_hex(),
            Identifier::Integer(n) => n.to_string(),
            Identifier::String(s) => {
                if Identifier::resolve(s) == Identifier::String(s.clone()) && !s.starts_with(STRING_MARKER) {
                    s.clone()
                } else {
                    format!("{}{}", STRING_MARKER, s)
                }
            }
        }
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_path_segment())
    }
}

impl From<Identifier> for Value {
    fn from(id: Identifier) -> Self {
        id.to_value()
    }
}
