//! Batch scheduler for one job's processing pass.
//!
//! Pending segments are drained in ascending-index batches of at most
//! `batch_size`. Segments inside a batch run concurrently; the next batch is
//! selected only after every segment of the current one has settled. The job
//! is persisted after every segment transition.

use std::panic::AssertUnwindSafe;

use futures_util::future::join_all;
use futures_util::FutureExt;
use tokio::sync::{Mutex, watch};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::model::{Job, JobStatus};
use super::retry::RetryPolicy;
use crate::db::{JobStore, StoreError};
use crate::llm::GenerationClient;

/// Prepended to every job instruction.
pub const SYSTEM_PREAMBLE: &str =
    "You are an assistant that modifies documents based on a prompt. Return the result as text.";

pub fn system_instruction(instruction: &str) -> String {
    format!("{} {}", SYSTEM_PREAMBLE, instruction)
}

/// The job under processing plus its once-per-pass completion guard.
#[derive(Debug)]
pub struct PassState {
    pub job: Job,
    finalized: bool,
}

impl PassState {
    pub fn new(job: Job) -> Self {
        Self {
            job,
            finalized: false,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Authoritative completion check.
    ///
    /// Marks the job completed the first time every segment is completed.
    /// Returns true only on the call that performed the transition.
    pub fn try_complete(&mut self) -> bool {
        if self.finalized || !self.job.all_completed() {
            return false;
        }
        self.job.mark_completed();
        self.finalized = true;
        true
    }

    /// Final decision once no pending segment is left.
    pub fn finish(&mut self) -> JobStatus {
        if !self.finalized && !self.try_complete() {
            self.job.mark_failed();
            self.finalized = true;
        }
        self.job.status
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// No pending segment is left
    Drained,
    /// Shutdown was requested at a batch boundary
    Interrupted,
}

/// Terminal result of the per-segment retry procedure.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentOutcome {
    Generated { text: String, attempts: u32 },
    Exhausted { error: String, attempts: u32 },
}

pub struct BatchScheduler<'a> {
    pub store: &'a dyn JobStore,
    pub client: &'a dyn GenerationClient,
    pub retry: &'a RetryPolicy,
    pub batch_size: usize,
    pub shutdown: &'a watch::Receiver<bool>,
}

impl BatchScheduler<'_> {
    /// Process batches until no segment is pending.
    ///
    /// A store error aborts the drain once the current batch has settled.
    pub async fn drain(&self, state: &Mutex<PassState>) -> Result<DrainOutcome, StoreError> {
        let batch_size = self.batch_size.max(1);
        let mut round = 0usize;

        loop {
            if *self.shutdown.borrow() {
                return Ok(DrainOutcome::Interrupted);
            }

            let (job_id, batch) = {
                let state = state.lock().await;
                (state.job.id, state.job.pending_indices(batch_size))
            };
            if batch.is_empty() {
                info!(job_id = %job_id, rounds = round, "No more pending segments");
                return Ok(DrainOutcome::Drained);
            }

            round += 1;
            info!(job_id = %job_id, round, segments = ?batch, "Processing batch");

            let settled = join_all(batch.into_iter().map(|index| self.process_segment(state, index))).await;
            settled.into_iter().collect::<Result<Vec<()>, StoreError>>()?;
        }
    }

    async fn process_segment(&self, state: &Mutex<PassState>, index: usize) -> Result<(), StoreError> {
        let (job_id, system, content) = {
            let mut state = state.lock().await;
            let segment = &mut state.job.segments[index];
            segment.mark_processing();
            let content = segment.content.clone();
            let system = system_instruction(&state.job.instruction);
            self.store.put(&state.job).await?;
            (state.job.id, system, content)
        };
        debug!(job_id = %job_id, segment = index, "Segment status set to processing");

        let outcome = self.generate(job_id, index, &system, &content).await;

        let mut state = state.lock().await;
        match outcome {
            SegmentOutcome::Generated { text, attempts } => {
                state.job.segments[index].mark_completed(text, attempts);
                info!(job_id = %job_id, segment = index, attempts, "Segment completed");
            }
            SegmentOutcome::Exhausted { error, attempts } => {
                error!(job_id = %job_id, segment = index, attempts, error = %error, "Segment failed");
                state.job.segments[index].mark_failed(error, attempts);
            }
        }

        state.job.refresh_progress();
        info!(
            job_id = %job_id,
            completed = state.job.completed_count(),
            total = state.job.total_segments(),
            progress = state.job.progress(),
            "Job progress updated"
        );

        if state.try_complete() {
            info!(job_id = %job_id, "Job fully completed during segment update");
        }

        self.store.put(&state.job).await
    }

    /// Bounded retry loop around one segment's generation call.
    ///
    /// Errors and panics from the client both count as failed attempts.
    /// Backoff sleeps suspend only this segment.
    pub async fn generate(
        &self,
        job_id: super::model::JobId,
        index: usize,
        system: &str,
        content: &str,
    ) -> SegmentOutcome {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(job_id = %job_id, segment = index, attempt, "Requesting generation");

            let call = AssertUnwindSafe(self.client.complete(system, content))
                .catch_unwind()
                .await;
            let error = match call {
                Ok(Ok(text)) => return SegmentOutcome::Generated { text, attempts: attempt },
                Ok(Err(e)) => e.to_string(),
                Err(_) => "generation call panicked".to_string(),
            };

            warn!(job_id = %job_id, segment = index, attempt, error = %error, "Generation attempt failed");

            if !self.retry.should_retry(attempt) {
                return SegmentOutcome::Exhausted { error, attempts: attempt };
            }

            let delay = self.retry.delay_for_attempt(attempt);
            info!(job_id = %job_id, segment = index, delay = ?delay, "Retrying segment");
            sleep(delay).await;
        }
    }
}
