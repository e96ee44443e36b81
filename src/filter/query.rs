//! Translation of URL query parameters into a [Filter].
//!
//! `?name=bob&age__gte=21&owner_id=5ec7cb151a1878fbefce4119&__sort=-age&__limit=10`
//! becomes `{name: "bob", age: {$gte: 21}, owner_id: ObjectId(..)}` sorted by
//! descending age, ten at most. `__filter` replaces the generated predicate with a
//! raw extended-JSON filter document.

use indexmap::IndexMap;

use super::error::FilterError;
use super::filter::Filter;
use super::filter_order::FilterOrder;
use super::types::{FilterOp, FilterOptions};
use crate::codec;
use crate::value::{Document, ObjectId, Value};

pub const FILTER_PARAM: &str = "__filter";
pub const SORT_PARAM: &str = "__sort";
pub const OFFSET_PARAM: &str = "__offset";
pub const LIMIT_PARAM: &str = "__limit";
pub const TOKEN_PARAM: &str = "token";

const OP_SEPARATOR: &str = "__";

pub fn translate(params: &[(String, String)], options: &FilterOptions) -> Result<Filter, FilterError> {
    let mut raw_filter: Option<&str> = None;
    let mut sort = Vec::new();
    let mut limit = None;
    let mut offset = None;
    let mut fields: IndexMap<&str, Vec<(FilterOp, Value)>> = IndexMap::new();

    for (name, raw) in params {
        match name.as_str() {
            FILTER_PARAM => raw_filter = Some(raw.as_str()),
            SORT_PARAM => sort = FilterOrder::parse_order_string(raw)?,
            LIMIT_PARAM => {
                limit = Some(raw.trim().parse::<usize>().map_err(|_| FilterError::InvalidLimit(raw.clone()))?);
            }
            OFFSET_PARAM => {
                offset = Some(raw.trim().parse::<usize>().map_err(|_| FilterError::InvalidOffset(raw.clone()))?);
            }
            TOKEN_PARAM => {}
            _ => {
                let (field, op) = split_param(name)?;
                let value = convert(field, op, raw)?;
                let entry = fields.entry(field).or_default();
                entry.retain(|(existing, _)| *existing != op);
                entry.push((op, value));
            }
        }
    }

    let where_data = match raw_filter {
        Some(text) => parse_raw_filter(text, options)?,
        None => build_conditions(fields),
    };
    if options.debug_logging {
        tracing::debug!("query filter: {}", codec::encode_document(&where_data));
    }

    let mut filter = Filter::new();
    filter.where_clause(where_data)?;
    filter.order(sort).limit(limit, offset, options);
    Ok(filter)
}

/// Splits `field__op` at the last separator. A trailing segment that is not an
/// operator is an error, so field names may not end in `__<word>`.
fn split_param(name: &str) -> Result<(&str, FilterOp), FilterError> {
    let Some((field, suffix)) = name.rsplit_once(OP_SEPARATOR) else {
        return Ok((name, FilterOp::Eq));
    };
    if field.is_empty() {
        return Err(FilterError::InvalidWhereClause(format!("unknown reserved parameter '{}'", name)));
    }
    let op = FilterOp::from_suffix(suffix).ok_or_else(|| FilterError::UnsupportedOperator(suffix.to_string()))?;
    Ok((field, op))
}

fn convert(field: &str, op: FilterOp, raw: &str) -> Result<Value, FilterError> {
    Ok(match op {
        FilterOp::In | FilterOp::NIn => Value::Array(raw.split(',').map(|item| typed_value(field, item)).collect()),
        FilterOp::Exists => match raw {
            "true" | "1" | "" => Value::Bool(true),
            "false" | "0" => Value::Bool(false),
            other => return Err(FilterError::InvalidOperatorData(format!("exists expects true or false, got '{}'", other))),
        },
        FilterOp::Regex => Value::String(raw.to_string()),
        _ => typed_value(field, raw),
    })
}

/// Types a raw parameter value. Fields whose name ends in `_id` holding 24 hex
/// digits become object ids.
pub fn typed_value(field: &str, raw: &str) -> Value {
    if field.ends_with("_id") {
        if let Ok(id) = ObjectId::parse_str(raw) {
            return Value::ObjectId(id);
        }
    }
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Value::integer(n);
    }
    if looks_decimal(raw) {
        if let Ok(d) = raw.parse::<f64>() {
            return Value::Double(d);
        }
    }
    Value::String(raw.to_string())
}

// Rust's float parser also accepts "inf" and "NaN", which should stay strings here.
fn looks_decimal(raw: &str) -> bool {
    let digits = raw.trim_start_matches(['-', '+']);
    !digits.is_empty()
        && digits.chars().next().map(|c| c.is_ascii_digit() || c == '.').unwrap_or(false)
        && digits.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '-' | '+'))
}

fn build_conditions(fields: IndexMap<&str, Vec<(FilterOp, Value)>>) -> Document {
    let mut where_data = Document::new();
    for (field, ops) in fields {
        if let [(FilterOp::Eq, value)] = ops.as_slice() {
            where_data.insert(field, value.clone());
            continue;
        }
        let condition: Document = ops.into_iter().map(|(op, value)| (op.key(), value)).collect();
        where_data.insert(field, condition);
    }
    where_data
}

fn parse_raw_filter(text: &str, options: &FilterOptions) -> Result<Document, FilterError> {
    if !options.allow_raw {
        return Err(FilterError::InvalidWhereClause(format!("{} is disabled", FILTER_PARAM)));
    }
    match codec::decode(text)? {
        None => Ok(Document::new()),
        Some(Value::Document(doc)) => Ok(doc),
        Some(other) => Err(FilterError::InvalidWhereClause(format!(
            "{} must be an object, got {}",
            FILTER_PARAM,
            other.type_name()
        ))),
    }
}
