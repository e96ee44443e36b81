pub mod collection;
pub mod memory;
pub mod postgres;
pub mod store;

use std::sync::Arc;

pub use collection::Collection;
pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use store::{DeleteResult, DocumentStore, StoreError, UpdateResult};

use crate::config::{DatabaseConfig, StoreBackend};

/// Opens the backend selected by configuration.
pub async fn open_store(config: &DatabaseConfig) -> Result<Arc<dyn DocumentStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackend::Postgres => Ok(Arc::new(PostgresStore::connect(config).await?)),
    }
}
