use serde::Serialize;

use crate::engine::{JobId, JobStatus, ResumeOutcome};

/// Response for job creation
#[derive(Serialize)]
pub struct CreateJobResponse {
    pub message: String,
    pub job_id: JobId,
    pub total_segments: usize,
}

/// Response for a resume request
#[derive(Serialize)]
pub struct ResumeJobResponse {
    pub message: String,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_segments: Option<usize>,
}

impl From<&ResumeOutcome> for ResumeJobResponse {
    fn from(outcome: &ResumeOutcome) -> Self {
        let (tag, reset_segments) = match outcome {
            ResumeOutcome::Resumed { reset_segments, .. } => ("resumed", Some(*reset_segments)),
            ResumeOutcome::AlreadyProcessing => ("already_processing", None),
            ResumeOutcome::AlreadyCompleted => ("already_completed", None),
        };
        Self {
            message: outcome.message().to_string(),
            outcome: tag,
            reset_segments,
        }
    }
}

/// Compact row for job listings
#[derive(Serialize)]
pub struct JobSummary {
    pub id: JobId,
    pub name: String,
    pub status: JobStatus,
    pub progress: u8,
    pub total_segments: usize,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<&crate::engine::Job> for JobSummary {
    fn from(job: &crate::engine::Job) -> Self {
        Self {
            id: job.id,
            name: job.name.clone(),
            status: job.status,
            progress: job.progress(),
            total_segments: job.total_segments(),
            created_at: job.created_at,
        }
    }
}
