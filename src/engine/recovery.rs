use std::sync::Arc;

use tracing::{info, warn};

use super::error::EngineError;
use super::job_engine::{JobEngine, StartOutcome};
use crate::worker::JobHandle;

/// Jobs re-entered by a recovery sweep.
#[derive(Debug, Default)]
pub struct RecoveryReport {
    pub scanned: usize,
    pub handles: Vec<JobHandle>,
}

/// Re-enter every job left `pending` or `processing` by a previous process.
///
/// Segment status is durable, so completed segments are skipped and only
/// unfinished work is dispatched again.
pub async fn recover(engine: &Arc<JobEngine>) -> Result<RecoveryReport, EngineError> {
    info!("Checking for jobs to resume...");

    let jobs = engine.store().list_all().await?;
    let scanned = jobs.len();
    let candidates: Vec<_> = jobs
        .into_iter()
        .filter(|job| job.status.is_resumable())
        .collect();

    info!("Found {} of {} jobs to resume", candidates.len(), scanned);

    let mut handles = Vec::with_capacity(candidates.len());
    for job in candidates {
        match engine.start(job.id).await {
            Ok(StartOutcome::Started(handle)) => {
                info!(job_id = %job.id, status = %job.status, "Re-entered job");
                handles.push(handle);
            }
            Ok(outcome) => info!(job_id = %job.id, outcome = ?outcome, "Job not re-entered"),
            Err(e) => warn!(job_id = %job.id, error = %e, "Failed to re-enter job"),
        }
    }

    Ok(RecoveryReport { scanned, handles })
}
