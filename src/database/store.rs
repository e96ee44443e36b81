use async_trait::async_trait;
use thiserror::Error;

use crate::codec;
use crate::filter::Filter;
use crate::value::{Document, ObjectId, Value, ID_FIELD};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("E11000 duplicate key error collection: {collection} index: _id_ dup key: {{ _id: {key} }}")]
    Duplicate { collection: String, key: String },

    #[error("Performing an update on the path '_id' would modify the immutable field '_id'")]
    ImmutableId,

    #[error("The '_id' value cannot be of type {0}")]
    InvalidId(&'static str),

    #[error("Invalid update: {0}")]
    InvalidUpdate(String),

    #[error("Invalid collection name: {0}")]
    InvalidCollection(String),

    #[error("Corrupt document {key} in {collection}: {reason}")]
    Corrupt { collection: String, key: String, reason: String },

    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Outcome of an update or replace against a single document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteResult {
    pub deleted_count: u64,
}

/// Schema-less document storage, addressed by collection name.
///
/// Collections spring into existence on first insert. Every document carries a
/// unique `_id`; inserts generate an [ObjectId] when it is missing.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn kind(&self) -> &'static str;

    async fn insert_one(&self, collection: &str, doc: Document) -> Result<Value, StoreError>;

    /// Inserts every document or none of them.
    async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<Vec<Value>, StoreError>;

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError>;

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>, StoreError>;

    /// Applies `$set` semantics (top-level and dotted keys) to the first match.
    async fn update_one(&self, collection: &str, filter: &Filter, set: &Document) -> Result<UpdateResult, StoreError>;

    /// Replaces the first match, keeping its `_id`. With `upsert`, inserts the
    /// replacement when nothing matched.
    async fn replace_one(
        &self,
        collection: &str,
        filter: &Filter,
        replacement: Document,
        upsert: bool,
    ) -> Result<UpdateResult, StoreError>;

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<DeleteResult, StoreError>;

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<DeleteResult, StoreError>;

    async fn health(&self) -> Result<(), StoreError>;

    /// Releases connections on shutdown.
    async fn close(&self) {}
}

/// Canonical key text for an `_id`. Integral numbers share a key regardless of width.
pub fn id_key(id: &Value) -> String {
    match id {
        Value::Int(_) | Value::Long(_) => codec::encode(&Value::integer(id.as_i64().unwrap_or_default())),
        Value::Double(d) if d.fract() == 0.0 && d.is_finite() && d.abs() < 9.0e15 => {
            codec::encode(&Value::integer(*d as i64))
        }
        other => codec::encode(other),
    }
}

/// Makes sure `doc` has a usable `_id` in first position and returns it.
pub fn ensure_id(doc: &mut Document) -> Result<Value, StoreError> {
    let id = match doc.id() {
        Some(Value::Array(_)) => return Err(StoreError::InvalidId("array")),
        Some(id) => id.clone(),
        None => Value::ObjectId(ObjectId::new()),
    };
    doc.set_id(id.clone());
    Ok(id)
}

/// Applies a `$set` document. Returns the updated document; `_id` may appear only
/// with its current value.
pub fn apply_set(current: &Document, set: &Document) -> Result<Document, StoreError> {
    let mut updated = current.clone();
    for (path, value) in set.iter() {
        if path == ID_FIELD {
            if Some(value) != current.id() {
                return Err(StoreError::ImmutableId);
            }
            continue;
        }
        if path.is_empty() || path.starts_with('$') || path.split('.').any(str::is_empty) {
            return Err(StoreError::InvalidUpdate(format!("invalid field name '{}'", path)));
        }
        updated.set_path(path, value.clone()).map_err(StoreError::InvalidUpdate)?;
    }
    Ok(updated)
}

/// Builds the stored form of a replacement for the document whose id is `id`.
pub fn prepare_replacement(id: &Value, mut replacement: Document) -> Result<Document, StoreError> {
    if let Some(given) = replacement.id() {
        if given != id {
            return Err(StoreError::ImmutableId);
        }
    }
    replacement.set_id(id.clone());
    Ok(replacement)
}

/// `_id` for a document created by an upsert: the filter's pinned id, else the
/// replacement's own, else a fresh object id.
pub fn upsert_id(filter: &Filter, replacement: &Document) -> Value {
    filter
        .id_lookup()
        .or_else(|| replacement.id())
        .cloned()
        .unwrap_or_else(|| Value::ObjectId(ObjectId::new()))
}

/// True when two stored forms differ in content, field order included.
pub fn changed(before: &Document, after: &Document) -> bool {
    codec::encode_document(before) != codec::encode_document(after)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn integral_ids_share_a_key() {
        assert_eq!(id_key(&Value::Int(7)), id_key(&Value::Long(7)));
        assert_eq!(id_key(&Value::Int(7)), id_key(&Value::Double(7.0)));
        assert_ne!(id_key(&Value::Int(7)), id_key(&Value::from("7")));
    }

    #[test]
    fn ensure_id_generates_object_ids() {
        let mut d = doc! { "a" => 1 };
        let id = ensure_id(&mut d).unwrap();
        assert!(matches!(id, Value::ObjectId(_)));
        assert_eq!(d.keys().next().map(String::as_str), Some(ID_FIELD));

        let mut bad = doc! { "_id" => vec![Value::Int(1)] };
        assert!(matches!(ensure_id(&mut bad), Err(StoreError::InvalidId(_))));
    }

    #[test]
    fn apply_set_handles_dotted_paths_and_id() {
        let current = doc! { "_id" => 1, "a" => doc! { "b" => 1 } };
        let updated = apply_set(&current, &doc! { "_id" => 1, "a.b" => 2, "c" => "x" }).unwrap();
        assert_eq!(updated.get_path("a.b"), Some(&Value::Int(2)));
        assert_eq!(updated.get("c"), Some(&Value::from("x")));
        assert!(matches!(apply_set(&current, &doc! { "_id" => 2 }), Err(StoreError::ImmutableId)));
        assert!(matches!(apply_set(&current, &doc! { "a..b" => 2 }), Err(StoreError::InvalidUpdate(_))));
    }

    #[test]
    fn replacement_keeps_existing_id() {
        let out = prepare_replacement(&Value::Int(1), doc! { "x" => 1 }).unwrap();
        assert_eq!(out.id(), Some(&Value::Int(1)));
        assert!(prepare_replacement(&Value::Int(1), doc! { "_id" => 2 }).is_err());
    }

    #[test]
    fn changed_detects_width_changes() {
        assert!(!changed(&doc! { "a" => 1 }, &doc! { "a" => 1 }));
        assert!(changed(&doc! { "a" => 1 }, &doc! { "a" => 1i64 }));
    }
}
