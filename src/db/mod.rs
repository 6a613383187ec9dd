pub mod file_store;
pub mod job_repository;
pub mod memory_store;
pub mod models;
pub mod store;

use std::sync::Arc;

pub use file_store::JsonFileStore;
pub use job_repository::JobRepository;
pub use memory_store::InMemoryJobStore;
pub use store::{JobStore, StoreError};

use crate::config::StoreBackend;

/// Open the configured store; PostgreSQL also gets its migrations applied.
pub async fn open_store(backend: &StoreBackend) -> Result<Arc<dyn JobStore>, StoreError> {
    match backend {
        StoreBackend::Postgres {
            database_url,
            max_connections,
        } => Ok(Arc::new(JobRepository::connect(database_url, *max_connections).await?)),
        StoreBackend::File { path } => Ok(Arc::new(JsonFileStore::open(path.clone()).await?)),
        StoreBackend::Memory => Ok(Arc::new(InMemoryJobStore::new())),
    }
}
