use std::sync::Arc;

use super::store::{DeleteResult, DocumentStore, StoreError, UpdateResult};
use crate::filter::Filter;
use crate::value::{Document, Value};

const MAX_NAME_LEN: usize = 120;
const RESERVED_PREFIX: &str = "system.";

/// A store handle bound to one validated collection name.
#[derive(Clone)]
pub struct Collection {
    name: String,
    store: Arc<dyn DocumentStore>,
}

impl Collection {
    pub fn new(store: Arc<dyn DocumentStore>, name: &str) -> Result<Self, StoreError> {
        Self::validate_name(name)?;
        Ok(Self {
            name: name.to_string(),
            store,
        })
    }

    /// Accepts 1 to 120 characters of `[A-Za-z0-9_.-]` not starting with `system.`.
    pub fn validate_name(name: &str) -> Result<(), StoreError> {
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(StoreError::InvalidCollection(format!(
                "collection names must be 1 to {} characters",
                MAX_NAME_LEN
            )));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')) {
            return Err(StoreError::InvalidCollection(format!("'{}' contains invalid characters", name)));
        }
        if name.starts_with(RESERVED_PREFIX) {
            return Err(StoreError::InvalidCollection(format!("'{}' is reserved", name)));
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn insert_one(&self, doc: Document) -> Result<Value, StoreError> {
        self.store.insert_one(&self.name, doc).await
    }

    pub async fn insert_many(&self, docs: Vec<Document>) -> Result<Vec<Value>, StoreError> {
        self.store.insert_many(&self.name, docs).await
    }

    pub async fn find(&self, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        self.store.find(&self.name, filter).await
    }

    pub async fn find_one(&self, filter: &Filter) -> Result<Option<Document>, StoreError> {
        self.store.find_one(&self.name, filter).await
    }

    pub async fn update_one(&self, filter: &Filter, set: &Document) -> Result<UpdateResult, StoreError> {
        self.store.update_one(&self.name, filter, set).await
    }

    pub async fn replace_one(&self, filter: &Filter, replacement: Document, upsert: bool) -> Result<UpdateResult, StoreError> {
        self.store.replace_one(&self.name, filter, replacement, upsert).await
    }

    pub async fn delete_one(&self, filter: &Filter) -> Result<DeleteResult, StoreError> {
        self.store.delete_one(&self.name, filter).await
    }

    pub async fn delete_many(&self, filter: &Filter) -> Result<DeleteResult, StoreError> {
        self.store.delete_many(&self.name, filter).await
    }
}
