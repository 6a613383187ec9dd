use crate::db::StoreError;
use crate::engine::model::JobId;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("job {id} is inconsistent: {reason}")]
    InvalidJob { id: JobId, reason: String },
    #[error("job task aborted: {0}")]
    TaskAborted(String),
}
