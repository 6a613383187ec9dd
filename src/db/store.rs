use async_trait::async_trait;

use crate::engine::model::{Job, JobId};

/// Durable mapping from job id to the full job document.
///
/// `put` rewrites the whole job and is last-writer-wins. `put_all` must be
/// atomic across the given jobs.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn get(&self, id: JobId) -> Result<Option<Job>, StoreError>;

    /// All jobs, oldest first.
    async fn list_all(&self) -> Result<Vec<Job>, StoreError>;

    async fn put(&self, job: &Job) -> Result<(), StoreError>;

    async fn put_all(&self, jobs: &[Job]) -> Result<(), StoreError>;

    /// Cheap reachability check for readiness probes.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn close(&self) {}
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage error: {0}")]
    Storage(String),
}
