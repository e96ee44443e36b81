use std::cmp::Ordering;

use regex::RegexBuilder;

use super::error::FilterError;
use super::types::{FieldTest, FilterClause, FilterOp, FilterWhereInfo};
use crate::value::{Document, Value};

/// A parsed filter document, ready to be evaluated against stored documents.
#[derive(Debug, Clone, Default)]
pub struct FilterWhere {
    clauses: Vec<FilterClause>,
}

impl FilterWhere {
    pub fn parse(where_data: &Document) -> Result<Self, FilterError> {
        Ok(Self {
            clauses: Self::parse_where_data(where_data)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, doc: &Document) -> bool {
        all_clauses(&self.clauses, doc)
    }

    fn parse_where_data(where_data: &Document) -> Result<Vec<FilterClause>, FilterError> {
        let mut clauses = Vec::with_capacity(where_data.len());
        for (key, value) in where_data.iter() {
            if key.starts_with('$') {
                clauses.push(Self::parse_logical_operator(key, value)?);
            } else {
                clauses.push(FilterClause::Field(Self::parse_field_condition(key, value)?));
            }
        }
        Ok(clauses)
    }

    fn parse_logical_operator(op: &str, value: &Value) -> Result<FilterClause, FilterError> {
        let branches = || -> Result<Vec<Vec<FilterClause>>, FilterError> {
            let arr = value
                .as_array()
                .filter(|a| !a.is_empty())
                .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires a non-empty array", op)))?;
            arr.iter()
                .map(|item| match item {
                    Value::Document(sub) => Self::parse_where_data(sub),
                    _ => Err(FilterError::InvalidOperatorData(format!("{} entries must be objects", op))),
                })
                .collect()
        };
        match op {
            "$and" => Ok(FilterClause::And(branches()?)),
            "$or" => Ok(FilterClause::Or(branches()?)),
            "$nor" => Ok(FilterClause::NOr(branches()?)),
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn parse_field_condition(field: &str, value: &Value) -> Result<FilterWhereInfo, FilterError> {
        if field.is_empty() {
            return Err(FilterError::InvalidWhereClause("field name cannot be empty".to_string()));
        }
        let tests = match value {
            Value::Document(ops) if is_operator_document(ops) => Self::parse_operators(ops)?,
            // Implicit equality: { field: value }
            other => vec![FieldTest::Eq(other.clone())],
        };
        Ok(FilterWhereInfo {
            column: field.to_string(),
            tests,
        })
    }

    fn parse_operators(ops: &Document) -> Result<Vec<FieldTest>, FilterError> {
        let mut tests = Vec::with_capacity(ops.len());
        for (key, data) in ops.iter() {
            let operator = Self::map_operator(key)?;
            let test = match operator {
                FilterOp::Eq => FieldTest::Eq(data.clone()),
                FilterOp::Ne => FieldTest::Ne(data.clone()),
                FilterOp::Gt => FieldTest::Gt(data.clone()),
                FilterOp::Gte => FieldTest::Gte(data.clone()),
                FilterOp::Lt => FieldTest::Lt(data.clone()),
                FilterOp::Lte => FieldTest::Lte(data.clone()),
                FilterOp::In => FieldTest::In(expect_array(operator, data)?),
                FilterOp::NIn => FieldTest::NIn(expect_array(operator, data)?),
                FilterOp::All => FieldTest::All(expect_array(operator, data)?),
                FilterOp::Exists => FieldTest::Exists(truthy(data)),
                FilterOp::Size => {
                    let size = data
                        .as_i64()
                        .and_then(|n| usize::try_from(n).ok())
                        .ok_or_else(|| FilterError::InvalidOperatorData("$size requires a non-negative integer".to_string()))?;
                    FieldTest::Size(size)
                }
                FilterOp::Regex => {
                    let options = match ops.get(FilterOp::Options.key()) {
                        None => "",
                        Some(Value::String(s)) => s.as_str(),
                        Some(_) => return Err(FilterError::InvalidOperatorData("$options must be a string".to_string())),
                    };
                    FieldTest::Regex(compile_regex(data, options)?)
                }
                FilterOp::Options => {
                    if !ops.contains_key(FilterOp::Regex.key()) {
                        return Err(FilterError::InvalidOperatorData("$options needs a $regex".to_string()));
                    }
                    continue;
                }
                FilterOp::Not => match data {
                    Value::Document(inner) if is_operator_document(inner) => FieldTest::Not(Self::parse_operators(inner)?),
                    _ => return Err(FilterError::InvalidOperatorData("$not needs an operator object".to_string())),
                },
            };
            tests.push(test);
        }
        Ok(tests)
    }

    fn map_operator(op_key: &str) -> Result<FilterOp, FilterError> {
        FilterOp::from_key(op_key).ok_or_else(|| FilterError::UnsupportedOperator(op_key.to_string()))
    }
}

fn is_operator_document(doc: &Document) -> bool {
    doc.keys().next().map(|k| k.starts_with('$')).unwrap_or(false)
}

fn expect_array(op: FilterOp, data: &Value) -> Result<Vec<Value>, FilterError> {
    data.as_array()
        .cloned()
        .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires an array", op.key())))
}

fn truthy(data: &Value) -> bool {
    match data {
        Value::Null => false,
        Value::Bool(b) => *b,
        other if other.is_number() => other.as_f64().map(|n| n != 0.0).unwrap_or(false),
        _ => true,
    }
}

fn compile_regex(pattern: &Value, options: &str) -> Result<regex::Regex, FilterError> {
    let pattern = pattern
        .as_str()
        .ok_or_else(|| FilterError::InvalidOperatorData("$regex requires a string".to_string()))?;
    let mut builder = RegexBuilder::new(pattern);
    for flag in options.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            other => return Err(FilterError::InvalidOperatorData(format!("unknown $options flag '{}'", other))),
        };
    }
    builder
        .build()
        .map_err(|e| FilterError::InvalidOperatorData(format!("invalid $regex: {}", e)))
}

fn all_clauses(clauses: &[FilterClause], doc: &Document) -> bool {
    clauses.iter().all(|clause| clause_matches(clause, doc))
}

fn clause_matches(clause: &FilterClause, doc: &Document) -> bool {
    match clause {
        FilterClause::Field(info) => {
            let found = resolve_path(doc, &info.column);
            info.tests.iter().all(|test| test_matches(test, &found))
        }
        FilterClause::And(branches) => branches.iter().all(|b| all_clauses(b, doc)),
        FilterClause::Or(branches) => branches.iter().any(|b| all_clauses(b, doc)),
        FilterClause::NOr(branches) => !branches.iter().any(|b| all_clauses(b, doc)),
    }
}

/// Every value reachable at `path`. Array hops fan out over document elements
/// unless the segment is a numeric index.
fn resolve_path<'a>(doc: &'a Document, path: &str) -> Vec<&'a Value> {
    let parts: Vec<&str> = path.split('.').collect();
    let mut out = Vec::new();
    if let Some(first) = doc.get(parts[0]) {
        descend(first, &parts[1..], &mut out);
    }
    out
}

fn descend<'a>(value: &'a Value, rest: &[&str], out: &mut Vec<&'a Value>) {
    let Some((head, tail)) = rest.split_first() else {
        out.push(value);
        return;
    };
    match value {
        Value::Document(doc) => {
            if let Some(next) = doc.get(head) {
                descend(next, tail, out);
            }
        }
        Value::Array(items) => {
            if let Ok(index) = head.parse::<usize>() {
                if let Some(next) = items.get(index) {
                    descend(next, tail, out);
                }
            } else {
                for item in items {
                    if let Value::Document(_) = item {
                        descend(item, rest, out);
                    }
                }
            }
        }
        _ => {}
    }
}

/// The candidate itself, followed by its elements when it is an array.
fn expand<'a>(found: &[&'a Value]) -> Vec<&'a Value> {
    let mut out = Vec::with_capacity(found.len());
    for value in found {
        out.push(*value);
        if let Value::Array(items) = value {
            out.extend(items.iter());
        }
    }
    out
}

fn equals_any(found: &[&Value], expected: &Value) -> bool {
    if expected.is_null() && found.is_empty() {
        return true;
    }
    expand(found).into_iter().any(|v| v == expected)
}

fn range_matches(found: &[&Value], expected: &Value, accept: fn(Ordering) -> bool) -> bool {
    expand(found)
        .into_iter()
        .any(|v| v.same_family(expected) && accept(v.compare(expected)))
}

fn test_matches(test: &FieldTest, found: &[&Value]) -> bool {
    match test {
        FieldTest::Eq(expected) => equals_any(found, expected),
        FieldTest::Ne(expected) => !equals_any(found, expected),
        FieldTest::Gt(expected) => range_matches(found, expected, |o| o == Ordering::Greater),
        FieldTest::Gte(expected) => range_matches(found, expected, |o| o != Ordering::Less),
        FieldTest::Lt(expected) => range_matches(found, expected, |o| o == Ordering::Less),
        FieldTest::Lte(expected) => range_matches(found, expected, |o| o != Ordering::Greater),
        FieldTest::In(list) => list.iter().any(|expected| equals_any(found, expected)),
        FieldTest::NIn(list) => !list.iter().any(|expected| equals_any(found, expected)),
        FieldTest::Exists(wanted) => !found.is_empty() == *wanted,
        FieldTest::Regex(re) => expand(found)
            .into_iter()
            .any(|v| v.as_str().map(|s| re.is_match(s)).unwrap_or(false)),
        FieldTest::Size(size) => found.iter().any(|v| v.as_array().map(|a| a.len() == *size).unwrap_or(false)),
        FieldTest::All(list) => {
            !list.is_empty()
                && found.iter().any(|v| match v {
                    Value::Array(items) => list.iter().all(|expected| items.iter().any(|item| item == expected)),
                    scalar => list.iter().all(|expected| *scalar == expected),
                })
        }
        FieldTest::Not(tests) => !tests.iter().all(|t| test_matches(t, found)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::doc;

    fn filter(text: &str) -> FilterWhere {
        match codec::decode(text).unwrap() {
            Some(Value::Document(d)) => FilterWhere::parse(&d).unwrap(),
            other => panic!("not a document: {:?}", other),
        }
    }

    fn sample() -> Document {
        doc! {
            "_id" => 1,
            "name" => "Widget",
            "qty" => 15,
            "tags" => vec![Value::from("red"), Value::from("blue")],
            "dims" => doc! { "h" => 10, "w" => 2.5 },
            "parts" => vec![Value::from(doc! { "sku" => "a1" }), Value::from(doc! { "sku" => "b2" })],
            "gone" => Value::Null,
        }
    }

    #[test]
    fn implicit_equality_and_arrays() {
        let d = sample();
        assert!(filter(r#"{"name": "Widget"}"#).matches(&d));
        assert!(filter(r#"{"tags": "blue"}"#).matches(&d));
        assert!(!filter(r#"{"tags": "green"}"#).matches(&d));
        assert!(filter(r#"{"qty": {"$numberLong": "15"}}"#).matches(&d));
    }

    #[test]
    fn null_matches_missing_fields() {
        let d = sample();
        assert!(filter(r#"{"nope": null}"#).matches(&d));
        assert!(filter(r#"{"gone": null}"#).matches(&d));
        assert!(!filter(r#"{"name": null}"#).matches(&d));
    }

    #[test]
    fn range_operators_stay_within_type_family() {
        let d = sample();
        assert!(filter(r#"{"qty": {"$gt": 10, "$lte": 15}}"#).matches(&d));
        assert!(!filter(r#"{"qty": {"$gt": "10"}}"#).matches(&d));
        assert!(filter(r#"{"dims.w": {"$lt": 3}}"#).matches(&d));
    }

    #[test]
    fn dotted_paths_fan_out_over_arrays() {
        let d = sample();
        assert!(filter(r#"{"parts.sku": "b2"}"#).matches(&d));
        assert!(filter(r#"{"parts.0.sku": "a1"}"#).matches(&d));
        assert!(!filter(r#"{"parts.1.sku": "a1"}"#).matches(&d));
    }

    #[test]
    fn membership_and_existence() {
        let d = sample();
        assert!(filter(r#"{"name": {"$in": ["Gadget", "Widget"]}}"#).matches(&d));
        assert!(filter(r#"{"name": {"$nin": ["Gadget"]}}"#).matches(&d));
        assert!(filter(r#"{"dims": {"$exists": true}}"#).matches(&d));
        assert!(filter(r#"{"color": {"$exists": false}}"#).matches(&d));
        assert!(filter(r#"{"tags": {"$all": ["blue", "red"], "$size": 2}}"#).matches(&d));
    }

    #[test]
    fn regex_with_options() {
        let d = sample();
        assert!(filter(r#"{"name": {"$regex": "^wid", "$options": "i"}}"#).matches(&d));
        assert!(!filter(r#"{"name": {"$regex": "^wid"}}"#).matches(&d));
        assert!(filter(r#"{"name": {"$not": {"$regex": "^gad"}}}"#).matches(&d));
    }

    #[test]
    fn logical_operators() {
        let d = sample();
        assert!(filter(r#"{"$or": [{"qty": 1}, {"name": "Widget"}]}"#).matches(&d));
        assert!(!filter(r#"{"$and": [{"qty": 15}, {"name": "Gadget"}]}"#).matches(&d));
        assert!(filter(r#"{"$nor": [{"qty": 1}, {"name": "Gadget"}]}"#).matches(&d));
    }

    #[test]
    fn rejects_unknown_operators() {
        let parse = |text: &str| match codec::decode(text).unwrap() {
            Some(Value::Document(d)) => FilterWhere::parse(&d),
            _ => unreachable!(),
        };
        assert!(matches!(parse(r#"{"a": {"$near": 1}}"#), Err(FilterError::UnsupportedOperator(_))));
        assert!(matches!(parse(r#"{"$where": "1"}"#), Err(FilterError::UnsupportedOperator(_))));
        assert!(matches!(parse(r#"{"$or": []}"#), Err(FilterError::InvalidOperatorData(_))));
        assert!(matches!(parse(r#"{"a": {"$regex": "("}}"#), Err(FilterError::InvalidOperatorData(_))));
    }
}
