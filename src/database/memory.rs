use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::RwLock;

use super::store::{
    apply_set, changed, ensure_id, id_key, prepare_replacement, upsert_id, DeleteResult, DocumentStore, StoreError,
    UpdateResult,
};
use crate::filter::Filter;
use crate::value::{Document, Value};

/// Documents of one collection keyed by [id_key], in insertion order.
type CollectionMap = IndexMap<String, Document>;

/// Process-local store. Each collection sits behind its own lock so writers to
/// different collections never wait on each other.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Arc<RwLock<CollectionMap>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn existing(&self, name: &str) -> Option<Arc<RwLock<CollectionMap>>> {
        self.collections.read().await.get(name).cloned()
    }

    async fn get_or_create(&self, name: &str) -> Arc<RwLock<CollectionMap>> {
        // Fast path: try read lock
        if let Some(found) = self.existing(name).await {
            return found;
        }
        let mut collections = self.collections.write().await;
        collections.entry(name.to_string()).or_default().clone()
    }
}

fn duplicate(collection: &str, id: &Value) -> StoreError {
    StoreError::Duplicate {
        collection: collection.to_string(),
        key: id.to_string(),
    }
}

/// Key of the first document matching `filter`.
fn first_match(map: &CollectionMap, filter: &Filter) -> Option<String> {
    if let Some(id) = filter.id_lookup() {
        let key = id_key(id);
        return map.get(&key).filter(|doc| filter.matches(doc)).map(|_| key);
    }
    map.iter().find(|(_, doc)| filter.matches(doc)).map(|(key, _)| key.clone())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn insert_one(&self, collection: &str, doc: Document) -> Result<Value, StoreError> {
        let mut ids = self.insert_many(collection, vec![doc]).await?;
        Ok(ids.remove(0))
    }

    async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<Vec<Value>, StoreError> {
        let handle = self.get_or_create(collection).await;
        let mut map = handle.write().await;

        let mut prepared = Vec::with_capacity(docs.len());
        let mut batch_keys = HashSet::with_capacity(docs.len());
        for mut doc in docs {
            let id = ensure_id(&mut doc)?;
            let key = id_key(&id);
            if map.contains_key(&key) || !batch_keys.insert(key.clone()) {
                return Err(duplicate(collection, &id));
            }
            prepared.push((key, id, doc));
        }

        let mut ids = Vec::with_capacity(prepared.len());
        for (key, id, doc) in prepared {
            map.insert(key, doc);
            ids.push(id);
        }
        Ok(ids)
    }

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        let Some(handle) = self.existing(collection).await else {
            return Ok(vec![]);
        };
        let map = handle.read().await;
        let matched: Vec<Document> = match filter.id_lookup() {
            Some(id) => map.get(&id_key(id)).filter(|d| filter.matches(d)).cloned().into_iter().collect(),
            None => {
                let budget = filter.scan_budget().unwrap_or(usize::MAX);
                map.values().filter(|d| filter.matches(d)).take(budget).cloned().collect()
            }
        };
        Ok(filter.apply(matched))
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>, StoreError> {
        let Some(handle) = self.existing(collection).await else {
            return Ok(None);
        };
        let map = handle.read().await;
        Ok(first_match(&map, filter).and_then(|key| map.get(&key).cloned()))
    }

    async fn update_one(&self, collection: &str, filter: &Filter, set: &Document) -> Result<UpdateResult, StoreError> {
        let Some(handle) = self.existing(collection).await else {
            return Ok(UpdateResult::default());
        };
        let mut map = handle.write().await;
        let Some(key) = first_match(&map, filter) else {
            return Ok(UpdateResult::default());
        };
        let Some(current) = map.get_mut(&key) else {
            return Ok(UpdateResult::default());
        };
        let updated = apply_set(current, set)?;
        let modified = changed(current, &updated);
        if modified {
            *current = updated;
        }
        Ok(UpdateResult {
            matched_count: 1,
            modified_count: modified as u64,
            upserted_id: None,
        })
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: &Filter,
        replacement: Document,
        upsert: bool,
    ) -> Result<UpdateResult, StoreError> {
        let handle = if upsert {
            self.get_or_create(collection).await
        } else {
            match self.existing(collection).await {
                Some(handle) => handle,
                None => return Ok(UpdateResult::default()),
            }
        };
        let mut map = handle.write().await;

        if let Some(key) = first_match(&map, filter) {
            if let Some(current) = map.get_mut(&key) {
                let id = current.id().cloned().unwrap_or_default();
                let replaced = prepare_replacement(&id, replacement)?;
                let modified = changed(current, &replaced);
                if modified {
                    *current = replaced;
                }
                return Ok(UpdateResult {
                    matched_count: 1,
                    modified_count: modified as u64,
                    upserted_id: None,
                });
            }
        }
        if !upsert {
            return Ok(UpdateResult::default());
        }

        let id = upsert_id(filter, &replacement);
        let mut doc = prepare_replacement(&id, replacement)?;
        let id = ensure_id(&mut doc)?;
        let key = id_key(&id);
        if map.contains_key(&key) {
            return Err(duplicate(collection, &id));
        }
        map.insert(key, doc);
        Ok(UpdateResult {
            matched_count: 0,
            modified_count: 0,
            upserted_id: Some(id),
        })
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<DeleteResult, StoreError> {
        let Some(handle) = self.existing(collection).await else {
            return Ok(DeleteResult::default());
        };
        let mut map = handle.write().await;
        let deleted = match first_match(&map, filter) {
            Some(key) => map.shift_remove(&key).is_some() as u64,
            None => 0,
        };
        Ok(DeleteResult { deleted_count: deleted })
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<DeleteResult, StoreError> {
        let Some(handle) = self.existing(collection).await else {
            return Ok(DeleteResult::default());
        };
        let mut map = handle.write().await;
        let before = map.len();
        map.retain(|_, doc| !filter.matches(doc));
        Ok(DeleteResult {
            deleted_count: (before - map.len()) as u64,
        })
    }

    async fn health(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    fn by_field(field: &str, value: impl Into<Value>) -> Filter {
        let mut filter = Filter::new();
        filter.where_clause(doc! { field => value }).unwrap();
        filter
    }

    #[tokio::test]
    async fn insert_many_is_all_or_nothing() {
        let store = MemoryStore::new();
        store.insert_one("things", doc! { "_id" => 1 }).await.unwrap();

        let err = store
            .insert_many("things", vec![doc! { "_id" => 2 }, doc! { "_id" => 1i64 }])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
        assert_eq!(store.find("things", &Filter::new()).await.unwrap().len(), 1);

        let err = store
            .insert_many("things", vec![doc! { "_id" => "a" }, doc! { "_id" => "a" }])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
        assert_eq!(store.find("things", &Filter::new()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_counts_only_real_changes() {
        let store = MemoryStore::new();
        store.insert_one("c", doc! { "_id" => 1, "n" => 1 }).await.unwrap();
        let filter = Filter::by_id(Value::Int(1));

        let same = store.update_one("c", &filter, &doc! { "n" => 1 }).await.unwrap();
        assert_eq!((same.matched_count, same.modified_count), (1, 0));

        let changed = store.update_one("c", &filter, &doc! { "n" => 2, "m.x" => true }).await.unwrap();
        assert_eq!((changed.matched_count, changed.modified_count), (1, 1));
        let doc = store.find_one("c", &filter).await.unwrap().unwrap();
        assert_eq!(doc.get_path("m.x"), Some(&Value::Bool(true)));

        let missing = store.update_one("c", &Filter::by_id(Value::Int(9)), &doc! { "n" => 1 }).await.unwrap();
        assert_eq!(missing.matched_count, 0);
    }

    #[tokio::test]
    async fn replace_with_upsert_inserts_under_filter_id() {
        let store = MemoryStore::new();
        let result = store
            .replace_one("c", &Filter::by_id(Value::from("k")), doc! { "v" => 1 }, true)
            .await
            .unwrap();
        assert_eq!(result.upserted_id, Some(Value::from("k")));
        let again = store
            .replace_one("c", &Filter::by_id(Value::from("k")), doc! { "v" => 2 }, true)
            .await
            .unwrap();
        assert_eq!((again.matched_count, again.modified_count, again.upserted_id), (1, 1, None));
    }

    #[tokio::test]
    async fn deletes_by_filter() {
        let store = MemoryStore::new();
        store
            .insert_many("c", (0..6).map(|n| doc! { "_id" => n, "odd" => n % 2 == 1 }).collect())
            .await
            .unwrap();
        assert_eq!(store.delete_one("c", &by_field("odd", true)).await.unwrap().deleted_count, 1);
        assert_eq!(store.delete_many("c", &by_field("odd", true)).await.unwrap().deleted_count, 2);
        assert_eq!(store.delete_many("c", &Filter::new()).await.unwrap().deleted_count, 3);
        assert_eq!(store.delete_many("missing", &Filter::new()).await.unwrap().deleted_count, 0);
    }
}
