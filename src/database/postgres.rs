use std::collections::HashSet;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::{postgres::PgPoolOptions, PgConnection, PgPool};
use tracing::info;

use super::store::{
    apply_set, changed, ensure_id, id_key, prepare_replacement, upsert_id, DeleteResult, DocumentStore, StoreError,
    UpdateResult,
};
use crate::codec;
use crate::config::DatabaseConfig;
use crate::filter::Filter;
use crate::value::{Document, Value};

const UNIQUE_VIOLATION: &str = "23505";

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id_key TEXT NOT NULL,
    seq BIGSERIAL,
    body TEXT NOT NULL,
    PRIMARY KEY (collection, id_key)
)";

const CREATE_SEQ_INDEX: &str = "CREATE INDEX IF NOT EXISTS documents_collection_seq ON documents (collection, seq)";

/// Stores every collection in one `documents` table. Each row holds the extended
/// JSON text of a document; filters are evaluated after decoding, so the table
/// needs no per-collection schema.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let base = config.url.as_deref().ok_or(StoreError::ConfigMissing("DATABASE_URL"))?;
        let connection_string = Self::build_connection_string(base, &config.name)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&connection_string)
            .await?;
        let store = Self::from_pool(pool).await?;

        info!("Connected document store to database: {}", config.name);
        Ok(store)
    }

    pub async fn from_pool(pool: PgPool) -> Result<Self, StoreError> {
        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        sqlx::query(CREATE_SEQ_INDEX).execute(&pool).await?;
        Ok(Self { pool })
    }

    fn build_connection_string(base: &str, database_name: &str) -> Result<String, StoreError> {
        let mut url = url::Url::parse(base).map_err(|_| StoreError::InvalidDatabaseUrl)?;
        // Replace the path to the database name (ensure leading slash)
        url.set_path(&format!("/{}", database_name));
        Ok(url.into())
    }

    /// Matching rows as `(id_key, document)` in insertion order. Stops after `max`
    /// matches; `lock` takes row locks for a following write in the same transaction.
    async fn scan(
        conn: &mut PgConnection,
        collection: &str,
        filter: &Filter,
        max: Option<usize>,
        lock: bool,
    ) -> Result<Vec<(String, Document)>, StoreError> {
        let lock_clause = if lock { " FOR UPDATE" } else { "" };
        let pinned = filter.id_lookup().map(id_key);
        let sql = match pinned {
            Some(_) => format!(
                "SELECT id_key, body FROM documents WHERE collection = $1 AND id_key = $2{}",
                lock_clause
            ),
            None => format!(
                "SELECT id_key, body FROM documents WHERE collection = $1 ORDER BY seq{}",
                lock_clause
            ),
        };

        let mut query = sqlx::query_as::<_, (String, String)>(&sql).bind(collection);
        if let Some(key) = pinned {
            query = query.bind(key);
        }

        let max = max.unwrap_or(usize::MAX);
        let mut out = Vec::new();
        let mut rows = query.fetch(&mut *conn);
        while let Some((key, body)) = rows.try_next().await? {
            let doc = decode_row(collection, &key, &body)?;
            if filter.matches(&doc) {
                out.push((key, doc));
                if out.len() >= max {
                    break;
                }
            }
        }
        Ok(out)
    }

    async fn insert_row(conn: &mut PgConnection, collection: &str, key: &str, doc: &Document) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO documents (collection, id_key, body) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(key)
            .bind(codec::encode_document(doc))
            .execute(&mut *conn)
            .await
            .map_err(|e| map_unique(e, collection, doc))?;
        Ok(())
    }

    async fn update_row(conn: &mut PgConnection, collection: &str, key: &str, doc: &Document) -> Result<(), StoreError> {
        sqlx::query("UPDATE documents SET body = $3 WHERE collection = $1 AND id_key = $2")
            .bind(collection)
            .bind(key)
            .bind(codec::encode_document(doc))
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}

fn decode_row(collection: &str, key: &str, body: &str) -> Result<Document, StoreError> {
    let corrupt = |reason: String| StoreError::Corrupt {
        collection: collection.to_string(),
        key: key.to_string(),
        reason,
    };
    match codec::decode(body).map_err(|e| corrupt(e.to_string()))? {
        Some(Value::Document(doc)) => Ok(doc),
        _ => Err(corrupt("stored body is not a document".to_string())),
    }
}

fn map_unique(err: sqlx::Error, collection: &str, doc: &Document) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => StoreError::Duplicate {
            collection: collection.to_string(),
            key: doc.id().map(|id| id.to_string()).unwrap_or_default(),
        },
        _ => StoreError::Sqlx(err),
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    fn kind(&self) -> &'static str {
        "postgres"
    }

    async fn insert_one(&self, collection: &str, mut doc: Document) -> Result<Value, StoreError> {
        let id = ensure_id(&mut doc)?;
        let mut conn = self.pool.acquire().await?;
        Self::insert_row(&mut conn, collection, &id_key(&id), &doc).await?;
        Ok(id)
    }

    async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<Vec<Value>, StoreError> {
        let mut prepared = Vec::with_capacity(docs.len());
        let mut batch_keys = HashSet::with_capacity(docs.len());
        for mut doc in docs {
            let id = ensure_id(&mut doc)?;
            let key = id_key(&id);
            if !batch_keys.insert(key.clone()) {
                return Err(StoreError::Duplicate {
                    collection: collection.to_string(),
                    key: id.to_string(),
                });
            }
            prepared.push((key, id, doc));
        }

        // Dropping the transaction on error rolls back the rows already written
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(prepared.len());
        for (key, id, doc) in prepared {
            Self::insert_row(&mut tx, collection, &key, &doc).await?;
            ids.push(id);
        }
        tx.commit().await?;
        Ok(ids)
    }

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let rows = Self::scan(&mut conn, collection, filter, filter.scan_budget(), false).await?;
        Ok(filter.apply(rows.into_iter().map(|(_, doc)| doc).collect()))
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let rows = Self::scan(&mut conn, collection, filter, Some(1), false).await?;
        Ok(rows.into_iter().next().map(|(_, doc)| doc))
    }

    async fn update_one(&self, collection: &str, filter: &Filter, set: &Document) -> Result<UpdateResult, StoreError> {
        let mut tx = self.pool.begin().await?;
        let Some((key, current)) = Self::scan(&mut tx, collection, filter, Some(1), true).await?.into_iter().next() else {
            return Ok(UpdateResult::default());
        };
        let updated = apply_set(&current, set)?;
        let modified = changed(&current, &updated);
        if modified {
            Self::update_row(&mut tx, collection, &key, &updated).await?;
        }
        tx.commit().await?;
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
        let mut tx = self.pool.begin().await?;
        let found = Self::scan(&mut tx, collection, filter, Some(1), true).await?.into_iter().next();

        let result = match found {
            Some((key, current)) => {
                let id = current.id().cloned().unwrap_or_default();
                let replaced = prepare_replacement(&id, replacement)?;
                let modified = changed(&current, &replaced);
                if modified {
                    Self::update_row(&mut tx, collection, &key, &replaced).await?;
                }
                UpdateResult {
                    matched_count: 1,
                    modified_count: modified as u64,
                    upserted_id: None,
                }
            }
            None if upsert => {
                let id = upsert_id(filter, &replacement);
                let mut doc = prepare_replacement(&id, replacement)?;
                let id = ensure_id(&mut doc)?;
                Self::insert_row(&mut tx, collection, &id_key(&id), &doc).await?;
                UpdateResult {
                    matched_count: 0,
                    modified_count: 0,
                    upserted_id: Some(id),
                }
            }
            None => UpdateResult::default(),
        };
        tx.commit().await?;
        Ok(result)
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<DeleteResult, StoreError> {
        let mut tx = self.pool.begin().await?;
        let Some((key, _)) = Self::scan(&mut tx, collection, filter, Some(1), true).await?.into_iter().next() else {
            return Ok(DeleteResult::default());
        };
        let done = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id_key = $2")
            .bind(collection)
            .bind(key)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(DeleteResult {
            deleted_count: done.rows_affected(),
        })
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<DeleteResult, StoreError> {
        if filter.where_data().is_empty() {
            let done = sqlx::query("DELETE FROM documents WHERE collection = $1")
                .bind(collection)
                .execute(&self.pool)
                .await?;
            return Ok(DeleteResult {
                deleted_count: done.rows_affected(),
            });
        }

        let mut tx = self.pool.begin().await?;
        let keys: Vec<String> = Self::scan(&mut tx, collection, filter, None, true)
            .await?
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        if keys.is_empty() {
            return Ok(DeleteResult::default());
        }
        let done = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id_key = ANY($2)")
            .bind(collection)
            .bind(keys)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(DeleteResult {
            deleted_count: done.rows_affected(),
        })
    }

    async fn health(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("Closed document store pool");
    }
}
