//! Extended JSON codec.
//!
//! Bodies are plain JSON where an object whose key set is exactly one of the
//! type wrappers below carries a typed scalar:
//!
//! | wrapper | value |
//! |---|---|
//! | `{"$oid": "<24 hex>"}` | [Value::ObjectId] |
//! | `{"$date": "<ISO-8601>" \| {"$numberLong": "<ms>"} \| <ms>}` | [Value::Date] |
//! | `{"$numberLong": "<i64>"}` | [Value::Long] |
//! | `{"$numberInt": "<i32>"}` | [Value::Int] |
//! | `{"$numberDouble": "<f64> \| NaN \| Infinity \| -Infinity"}` | [Value::Double] |
//! | `{"$binary": {"base64": "..", "subType": "hh"}}` | [Value::Binary] |
//!
//! Every other object, including query operators such as `{"$gt": 1}`, is an
//! ordinary [Document].

use base64::Engine as _;
use chrono::{DateTime, Datelike, SecondsFormat, TimeZone, Utc};
use serde_json::{json, Map, Number};
use thiserror::Error;

use crate::value::{Document, ObjectId, Value};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    #[error("Invalid JSON in request: {0}")]
    Syntax(String),

    #[error("Invalid extended JSON value for {tag}: {reason}")]
    InvalidWrapper { tag: &'static str, reason: String },
}

impl CodecError {
    fn wrapper(tag: &'static str, reason: impl Into<String>) -> Self {
        CodecError::InvalidWrapper { tag, reason: reason.into() }
    }
}

/// Decodes extended JSON text. Empty or whitespace-only text is "no document".
pub fn decode(text: &str) -> Result<Option<Value>, CodecError> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    let raw: serde_json::Value = serde_json::from_str(text).map_err(|e| CodecError::Syntax(e.to_string()))?;
    from_json(raw).map(Some)
}

pub fn encode(value: &Value) -> String {
    to_json(value).to_string()
}

pub fn encode_document(doc: &Document) -> String {
    document_to_json(doc).to_string()
}

pub fn from_json(raw: serde_json::Value) -> Result<Value, CodecError> {
    Ok(match raw {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => number_to_value(&n),
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => {
            Value::Array(items.into_iter().map(from_json).collect::<Result<_, _>>()?)
        }
        serde_json::Value::Object(map) => match decode_wrapper(&map)? {
            Some(value) => value,
            None => {
                let mut doc = Document::new();
                for (key, item) in map {
                    doc.insert(key, from_json(item)?);
                }
                Value::Document(doc)
            }
        },
    })
}

fn number_to_value(n: &Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::integer(i)
    } else {
        // u64 beyond i64 range and every non-integral literal
        Value::Double(n.as_f64().unwrap_or(f64::NAN))
    }
}

fn decode_wrapper(map: &Map<String, serde_json::Value>) -> Result<Option<Value>, CodecError> {
    if map.len() == 2 {
        if let (Some(data), Some(subtype)) = (map.get("$binary"), map.get("$type")) {
            return decode_legacy_binary(data, subtype).map(Some);
        }
        return Ok(None);
    }
    if map.len() != 1 {
        return Ok(None);
    }
    let Some((key, payload)) = map.iter().next() else {
        return Ok(None);
    };
    let value = match key.as_str() {
        "$oid" => {
            let text = payload.as_str().ok_or_else(|| CodecError::wrapper("$oid", "expected a string"))?;
            Value::ObjectId(ObjectId::parse_str(text).map_err(|e| CodecError::wrapper("$oid", e.to_string()))?)
        }
        "$date" => Value::Date(decode_date(payload)?),
        "$numberLong" => Value::Long(decode_long("$numberLong", payload)?),
        "$numberInt" => {
            let text = payload.as_str().ok_or_else(|| CodecError::wrapper("$numberInt", "expected a string"))?;
            Value::Int(text.parse().map_err(|_| CodecError::wrapper("$numberInt", format!("'{}' is not a 32-bit integer", text)))?)
        }
        "$numberDouble" => {
            let text = payload.as_str().ok_or_else(|| CodecError::wrapper("$numberDouble", "expected a string"))?;
            Value::Double(parse_double(text).ok_or_else(|| CodecError::wrapper("$numberDouble", format!("'{}' is not a number", text)))?)
        }
        "$binary" => decode_binary(payload)?,
        "$numberDecimal" => return Err(CodecError::wrapper("$numberDecimal", "decimal128 values are not supported")),
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn decode_long(tag: &'static str, payload: &serde_json::Value) -> Result<i64, CodecError> {
    match payload {
        serde_json::Value::String(text) => {
            text.parse().map_err(|_| CodecError::wrapper(tag, format!("'{}' is not a 64-bit integer", text)))
        }
        serde_json::Value::Number(n) => n.as_i64().ok_or_else(|| CodecError::wrapper(tag, "expected an integer")),
        _ => Err(CodecError::wrapper(tag, "expected a string")),
    }
}

fn decode_date(payload: &serde_json::Value) -> Result<DateTime<Utc>, CodecError> {
    let millis = match payload {
        serde_json::Value::String(text) => {
            let parsed = DateTime::parse_from_rfc3339(text)
                .map_err(|e| CodecError::wrapper("$date", format!("'{}': {}", text, e)))?;
            return Ok(truncate_millis(parsed.with_timezone(&Utc)));
        }
        serde_json::Value::Object(inner) => match inner.get("$numberLong") {
            Some(v) if inner.len() == 1 => decode_long("$date", v)?,
            _ => return Err(CodecError::wrapper("$date", "expected {\"$numberLong\": \"<millis>\"}")),
        },
        serde_json::Value::Number(n) => n.as_i64().ok_or_else(|| CodecError::wrapper("$date", "expected integer milliseconds"))?,
        _ => return Err(CodecError::wrapper("$date", "expected an ISO-8601 string or milliseconds")),
    };
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| CodecError::wrapper("$date", format!("{} is out of range", millis)))
}

fn truncate_millis(dt: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(dt.timestamp_millis()).single().unwrap_or(dt)
}

fn decode_binary(payload: &serde_json::Value) -> Result<Value, CodecError> {
    let inner = payload
        .as_object()
        .ok_or_else(|| CodecError::wrapper("$binary", "expected {\"base64\": .., \"subType\": ..}"))?;
    let data = inner.get("base64").and_then(|v| v.as_str());
    let subtype = inner.get("subType").and_then(|v| v.as_str());
    match (data, subtype) {
        (Some(data), Some(subtype)) if inner.len() == 2 => binary_value(data, subtype),
        _ => Err(CodecError::wrapper("$binary", "expected {\"base64\": .., \"subType\": ..}")),
    }
}

fn decode_legacy_binary(data: &serde_json::Value, subtype: &serde_json::Value) -> Result<Value, CodecError> {
    match (data.as_str(), subtype.as_str()) {
        (Some(data), Some(subtype)) => binary_value(data, subtype),
        _ => Err(CodecError::wrapper("$binary", "legacy form expects string $binary and $type")),
    }
}

fn binary_value(data: &str, subtype: &str) -> Result<Value, CodecError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| CodecError::wrapper("$binary", e.to_string()))?;
    let subtype = u8::from_str_radix(subtype, 16)
        .map_err(|_| CodecError::wrapper("$binary", format!("'{}' is not a hex subtype", subtype)))?;
    Ok(Value::Binary { subtype, bytes })
}

fn parse_double(text: &str) -> Option<f64> {
    match text {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        other => other.parse().ok(),
    }
}

pub fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => json!(b),
        Value::Int(i) => json!(i),
        Value::Long(l) => json!({ "$numberLong": l.to_string() }),
        Value::Double(d) => match Number::from_f64(*d) {
            Some(n) => serde_json::Value::Number(n),
            None => json!({ "$numberDouble": format_non_finite(*d) }),
        },
        Value::String(s) => json!(s),
        Value::Date(dt) => encode_date(dt),
        Value::ObjectId(id) => json!({ "$oid": id.to_hex() }),
        Value::Binary { subtype, bytes } => json!({
            "$binary": {
                "base64": base64::engine::general_purpose::STANDARD.encode(bytes),
                "subType": format!("{:02x}", subtype),
            }
        }),
        Value::Document(doc) => document_to_json(doc),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
    }
}

pub fn document_to_json(doc: &Document) -> serde_json::Value {
    let mut map = Map::with_capacity(doc.len());
    for (key, value) in doc.iter() {
        map.insert(key.clone(), to_json(value));
    }
    serde_json::Value::Object(map)
}

fn format_non_finite(d: f64) -> &'static str {
    if d.is_nan() {
        "NaN"
    } else if d > 0.0 {
        "Infinity"
    } else {
        "-Infinity"
    }
}

fn encode_date(dt: &DateTime<Utc>) -> serde_json::Value {
    if (1970..=9999).contains(&dt.year()) {
        let format = if dt.timestamp_subsec_millis() == 0 { SecondsFormat::Secs } else { SecondsFormat::Millis };
        json!({ "$date": dt.to_rfc3339_opts(format, true) })
    } else {
        json!({ "$date": { "$numberLong": dt.timestamp_millis().to_string() } })
    }
}
