// handlers/data/utils.rs - Shared request shaping for the data routes

use crate::error::ApiError;
use crate::identifier::Identifier;
use crate::value::{Document, Value, ID_FIELD};

/// Resolves the `:id` path segment into the `_id` value it addresses.
pub fn resolve_id(segment: &str) -> Value {
    Identifier::resolve(segment).to_value()
}

/// Splits a bulk body into `(index, _id, item)` triples. Every item must be a
/// document carrying a non-null `_id`; the first violation rejects the whole batch.
pub fn bulk_items(items: Vec<Value>) -> Result<Vec<(usize, Value, Document)>, ApiError> {
    if items.is_empty() {
        return Err(ApiError::body_shape("Request body must not be an empty array"));
    }
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let Value::Document(doc) = item else {
                return Err(ApiError::body_shape(format!("Request body element {} must be an object", index)));
            };
            match doc.get(ID_FIELD) {
                Some(id) if !id.is_null() => Ok((index, id.clone(), doc)),
                _ => Err(ApiError::body_shape(format!("Missing _id in update (index {})", index))),
            }
        })
        .collect()
}

/// Body of a create-many request: one document or a non-empty array of them.
pub fn insert_items(body: Option<Value>) -> Result<Vec<Document>, ApiError> {
    match body {
        None => Err(ApiError::body_shape("Missing request body")),
        Some(Value::Document(doc)) => Ok(vec![doc]),
        Some(Value::Array(items)) => {
            if items.is_empty() {
                return Err(ApiError::body_shape("Request body must not be an empty array"));
            }
            items
                .into_iter()
                .enumerate()
                .map(|(index, item)| match item {
                    Value::Document(doc) => Ok(doc),
                    _ => Err(ApiError::body_shape(format!("Request body element {} must be an object", index))),
                })
                .collect()
        }
        Some(_) => Err(ApiError::body_shape("Request body must be an object or an array of objects")),
    }
}
