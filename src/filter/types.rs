use regex::Regex;

use crate::value::Value;

/// Operators understood inside a field condition document such as `{"age": {"$gt": 5}}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NIn,
    Exists,
    Regex,
    Options,
    Size,
    All,
    Not,
}

impl FilterOp {
    /// Operator for a `$`-prefixed key in a filter document.
    pub fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "$eq" => FilterOp::Eq,
            "$ne" => FilterOp::Ne,
            "$gt" => FilterOp::Gt,
            "$gte" => FilterOp::Gte,
            "$lt" => FilterOp::Lt,
            "$lte" => FilterOp::Lte,
            "$in" => FilterOp::In,
            "$nin" => FilterOp::NIn,
            "$exists" => FilterOp::Exists,
            "$regex" => FilterOp::Regex,
            "$options" => FilterOp::Options,
            "$size" => FilterOp::Size,
            "$all" => FilterOp::All,
            "$not" => FilterOp::Not,
            _ => return None,
        })
    }

    /// Operator for the `__op` suffix of a query parameter.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Some(match suffix {
            "eq" => FilterOp::Eq,
            "ne" => FilterOp::Ne,
            "gt" => FilterOp::Gt,
            "gte" => FilterOp::Gte,
            "lt" => FilterOp::Lt,
            "lte" => FilterOp::Lte,
            "in" => FilterOp::In,
            "nin" => FilterOp::NIn,
            "exists" => FilterOp::Exists,
            "regex" => FilterOp::Regex,
            _ => return None,
        })
    }

    pub fn key(&self) -> &'static str {
        match self {
            FilterOp::Eq => "$eq",
            FilterOp::Ne => "$ne",
            FilterOp::Gt => "$gt",
            FilterOp::Gte => "$gte",
            FilterOp::Lt => "$lt",
            FilterOp::Lte => "$lte",
            FilterOp::In => "$in",
            FilterOp::NIn => "$nin",
            FilterOp::Exists => "$exists",
            FilterOp::Regex => "$regex",
            FilterOp::Options => "$options",
            FilterOp::Size => "$size",
            FilterOp::All => "$all",
            FilterOp::Not => "$not",
        }
    }
}

/// A compiled test applied to the value(s) found at a field path.
#[derive(Debug, Clone)]
pub enum FieldTest {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    NIn(Vec<Value>),
    Exists(bool),
    Regex(Regex),
    Size(usize),
    All(Vec<Value>),
    Not(Vec<FieldTest>),
}

#[derive(Debug, Clone)]
pub struct FilterWhereInfo {
    pub column: String,
    pub tests: Vec<FieldTest>,
}

/// One top-level entry of a filter document. Entries are implicitly AND-ed.
#[derive(Debug, Clone)]
pub enum FilterClause {
    Field(FilterWhereInfo),
    And(Vec<Vec<FilterClause>>),
    Or(Vec<Vec<FilterClause>>),
    NOr(Vec<Vec<FilterClause>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOrderInfo {
    pub column: String,
    pub sort: SortDirection,
}

/// Knobs that come from configuration rather than from the request.
#[derive(Debug, Clone)]
pub struct FilterOptions {
    pub max_limit: Option<usize>,
    pub allow_raw: bool,
    pub debug_logging: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            max_limit: Some(1000),
            allow_raw: true,
            debug_logging: false,
        }
    }
}
