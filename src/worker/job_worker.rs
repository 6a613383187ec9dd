use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::engine::error::EngineError;
use crate::engine::model::JobId;
use crate::engine::PassOutcome;

/// Handle to one background processing pass.
///
/// Dropping the handle detaches the pass; it keeps running.
#[derive(Debug)]
pub struct JobHandle {
    job_id: JobId,
    join: JoinHandle<Result<PassOutcome, EngineError>>,
}

impl JobHandle {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Wait for the pass to end.
    pub async fn wait(self) -> Result<PassOutcome, EngineError> {
        match self.join.await {
            Ok(result) => result,
            Err(e) => Err(EngineError::TaskAborted(e.to_string())),
        }
    }
}

/// Runs processing passes as tokio tasks
///
/// # Concurrency Model
/// - Every dispatched pass is spawned immediately and returns a handle
/// - A pass waits for a semaphore permit before doing any work
/// - At most `max_concurrent_jobs` passes make progress at once
/// - The permit is released when the pass finishes
pub struct JobWorker {
    semaphore: Arc<Semaphore>,
}

impl JobWorker {
    pub fn new(max_concurrent_jobs: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
        }
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn dispatch<F>(&self, job_id: JobId, pass: F) -> JobHandle
    where
        F: Future<Output = Result<PassOutcome, EngineError>> + Send + 'static,
    {
        let semaphore = self.semaphore.clone();

        let join = tokio::spawn(async move {
            let permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| EngineError::TaskAborted(e.to_string()))?;
            info!(job_id = %job_id, "Got semaphore permit for job");

            let result = pass.await;
            match &result {
                Ok(outcome) => info!(job_id = %job_id, outcome = ?outcome, "Pass finished"),
                Err(e) => error!(job_id = %job_id, error = %e, "Pass aborted"),
            }

            drop(permit);
            info!(job_id = %job_id, "Released semaphore permit for job");
            result
        });

        JobHandle { job_id, join }
    }
}
