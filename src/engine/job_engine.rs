use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tracing::{error, info, warn};

use super::error::EngineError;
use super::model::{Job, JobId, JobStatus};
use super::retry::RetryPolicy;
use super::scheduler::{BatchScheduler, DrainOutcome, PassState};
use crate::db::JobStore;
use crate::llm::GenerationClient;
use crate::worker::{JobHandle, JobWorker};

/// Processing knobs fixed for the lifetime of the engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub batch_size: usize,
    pub max_concurrent_jobs: usize,
    pub retry: RetryPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            batch_size: 2,
            max_concurrent_jobs: 4,
            retry: RetryPolicy::default(),
        }
    }
}

/// How a processing pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PassOutcome {
    Completed,
    Failed { failed_segments: usize },
    /// Stopped at a batch boundary on shutdown; the job stays `processing`.
    Interrupted,
}

#[derive(Debug)]
pub enum StartOutcome {
    Started(JobHandle),
    AlreadyRunning,
    AlreadyCompleted,
}

#[derive(Debug)]
pub enum ResumeOutcome {
    Resumed { reset_segments: usize, handle: JobHandle },
    AlreadyProcessing,
    AlreadyCompleted,
}

impl ResumeOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            ResumeOutcome::Resumed { .. } => "Resumed and failed segments reset",
            ResumeOutcome::AlreadyProcessing => "Job is already processing",
            ResumeOutcome::AlreadyCompleted => "Job is already completed",
        }
    }
}

/// Releases a job's slot in the live-pass registry on drop.
struct PassClaim {
    job_id: JobId,
    active: Arc<watch::Sender<HashSet<JobId>>>,
}

impl Drop for PassClaim {
    fn drop(&mut self) {
        let job_id = self.job_id;
        self.active.send_modify(|set| {
            set.remove(&job_id);
        });
    }
}

/// Owns the job state machine and launches processing passes.
///
/// At most one pass per job is live in the process at any time; the claim
/// registry is the authority on whether a job is being processed here.
pub struct JobEngine {
    store: Arc<dyn JobStore>,
    client: Arc<dyn GenerationClient>,
    settings: EngineSettings,
    worker: JobWorker,
    active: Arc<watch::Sender<HashSet<JobId>>>,
    shutdown: watch::Receiver<bool>,
}

impl JobEngine {
    pub fn new(
        store: Arc<dyn JobStore>,
        client: Arc<dyn GenerationClient>,
        settings: EngineSettings,
        shutdown: watch::Receiver<bool>,
    ) -> Arc<Self> {
        let (active, _) = watch::channel(HashSet::new());
        Arc::new(Self {
            store,
            client,
            worker: JobWorker::new(settings.max_concurrent_jobs),
            settings,
            active: Arc::new(active),
            shutdown,
        })
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn is_running(&self, job_id: JobId) -> bool {
        self.active.borrow().contains(&job_id)
    }

    pub fn running_jobs(&self) -> usize {
        self.active.borrow().len()
    }

    /// Resolves once no pass is live.
    pub async fn wait_idle(&self) {
        let mut rx = self.active.subscribe();
        let _ = rx.wait_for(|set| set.is_empty()).await;
    }

    fn claim(&self, job_id: JobId) -> Option<PassClaim> {
        let inserted = self.active.send_if_modified(|set| set.insert(job_id));
        inserted.then(|| PassClaim {
            job_id,
            active: self.active.clone(),
        })
    }

    async fn load(&self, job_id: JobId) -> Result<Job, EngineError> {
        self.store
            .get(job_id)
            .await?
            .ok_or(EngineError::NotFound(job_id))
    }

    /// Launch a processing pass for the job.
    pub async fn start(self: &Arc<Self>, job_id: JobId) -> Result<StartOutcome, EngineError> {
        let Some(claim) = self.claim(job_id) else {
            info!(job_id = %job_id, "Job already has a live pass");
            return Ok(StartOutcome::AlreadyRunning);
        };

        let job = self.load(job_id).await?;
        if job.status == JobStatus::Completed {
            info!(job_id = %job_id, "Job already completed");
            return Ok(StartOutcome::AlreadyCompleted);
        }

        Ok(StartOutcome::Started(self.launch(claim)))
    }

    /// Reset failed segments and start a new pass.
    ///
    /// Completed jobs are left untouched. A job with a live pass is reported
    /// as already processing without any reset.
    pub async fn resume(self: &Arc<Self>, job_id: JobId) -> Result<ResumeOutcome, EngineError> {
        let Some(claim) = self.claim(job_id) else {
            info!(job_id = %job_id, "Job is already processing");
            return Ok(ResumeOutcome::AlreadyProcessing);
        };

        let mut job = self.load(job_id).await?;
        match job.status {
            JobStatus::Completed => {
                info!(job_id = %job_id, "Resume requested for completed job, nothing to do");
                return Ok(ResumeOutcome::AlreadyCompleted);
            }
            JobStatus::Processing => {
                warn!(job_id = %job_id, "Job is marked processing without a live pass, re-entering");
            }
            JobStatus::Pending | JobStatus::Failed => {}
        }

        let reset_segments = job.reset_failed();
        self.store.put(&job).await?;
        info!(job_id = %job_id, reset_segments, "Job reset to pending");

        Ok(ResumeOutcome::Resumed {
            reset_segments,
            handle: self.launch(claim),
        })
    }

    fn launch(self: &Arc<Self>, claim: PassClaim) -> JobHandle {
        let engine = Arc::clone(self);
        let job_id = claim.job_id;

        self.worker.dispatch(job_id, async move {
            let _claim = claim;
            engine.run_pass(job_id).await
        })
    }

    /// One pass: enter `processing`, drain pending segments, decide the outcome.
    async fn run_pass(&self, job_id: JobId) -> Result<PassOutcome, EngineError> {
        let mut job = self.load(job_id).await?;
        if job.status == JobStatus::Completed {
            return Ok(PassOutcome::Completed);
        }
        job.check_layout()
            .map_err(|reason| EngineError::InvalidJob { id: job_id, reason })?;

        let reclaimed = job.begin_pass();
        if reclaimed > 0 {
            warn!(job_id = %job_id, reclaimed, "Reclaimed segments left processing by an earlier pass");
        }
        self.store.put(&job).await?;
        info!(
            job_id = %job_id,
            batch_size = self.settings.batch_size,
            total = job.total_segments(),
            "Job status set to processing"
        );

        let state = Mutex::new(PassState::new(job));
        match self.drive(&state).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.abandon(&state, &e).await;
                Err(e)
            }
        }
    }

    async fn drive(&self, state: &Mutex<PassState>) -> Result<PassOutcome, EngineError> {
        let scheduler = BatchScheduler {
            store: self.store.as_ref(),
            client: self.client.as_ref(),
            retry: &self.settings.retry,
            batch_size: self.settings.batch_size,
            shutdown: &self.shutdown,
        };

        if scheduler.drain(state).await? == DrainOutcome::Interrupted {
            let state = state.lock().await;
            info!(job_id = %state.job.id, "Pass interrupted at batch boundary");
            return Ok(PassOutcome::Interrupted);
        }

        let mut state = state.lock().await;
        let status = state.finish();
        self.store.put(&state.job).await?;

        let job = &state.job;
        if status == JobStatus::Completed {
            info!(job_id = %job.id, "Job completed all segments");
            Ok(PassOutcome::Completed)
        } else {
            let failed_segments = job.failed_count();
            warn!(job_id = %job.id, failed_segments, "Job finished with failures");
            Ok(PassOutcome::Failed { failed_segments })
        }
    }

    /// Best-effort write after a store failure so the job is resumable.
    async fn abandon(&self, state: &Mutex<PassState>, cause: &EngineError) {
        let mut state = state.lock().await;
        state.job.abandon();
        match self.store.put(&state.job).await {
            Ok(()) => warn!(job_id = %state.job.id, cause = %cause, "Pass aborted, job left resumable"),
            Err(e) => error!(
                job_id = %state.job.id,
                cause = %cause,
                error = %e,
                "Pass aborted and job state could not be saved; recovery will re-enter it"
            ),
        }
    }
}
