use std::cmp::Ordering;

use super::error::FilterError;
use super::types::{FilterOrderInfo, SortDirection};
use crate::value::{Document, Value};

pub struct FilterOrder;

impl FilterOrder {
    /// Parses a comma-separated sort list. Each entry is `field`, `+field`, `-field`,
    /// or `field asc|desc`.
    pub fn parse_order_string(s: &str) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let mut out = Vec::new();
        for part in s.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }
            let mut it = trimmed.split_whitespace();
            let Some(token) = it.next() else { continue };
            let (column, mut sort) = match token.strip_prefix('-') {
                Some(rest) => (rest, SortDirection::Desc),
                None => (token.strip_prefix('+').unwrap_or(token), SortDirection::Asc),
            };
            if let Some(dir) = it.next() {
                sort = match dir.to_ascii_lowercase().as_str() {
                    "asc" | "1" => SortDirection::Asc,
                    "desc" | "-1" => SortDirection::Desc,
                    other => return Err(FilterError::InvalidSort(format!("unknown direction '{}'", other))),
                };
            }
            if column.is_empty() {
                return Err(FilterError::InvalidSort(format!("missing field in '{}'", trimmed)));
            }
            out.push(FilterOrderInfo {
                column: column.to_string(),
                sort,
            });
        }
        Ok(out)
    }

    /// Stable sort by each key in turn. Missing fields compare as null.
    pub fn sort(docs: &mut [Document], infos: &[FilterOrderInfo]) {
        if infos.is_empty() {
            return;
        }
        docs.sort_by(|a, b| Self::compare(a, b, infos));
    }

    pub fn compare(a: &Document, b: &Document, infos: &[FilterOrderInfo]) -> Ordering {
        static NULL: Value = Value::Null;
        for info in infos {
            let left = a.get_path(&info.column).unwrap_or(&NULL);
            let right = b.get_path(&info.column).unwrap_or(&NULL);
            let ord = match info.sort {
                SortDirection::Asc => left.compare(right),
                SortDirection::Desc => right.compare(left),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}
