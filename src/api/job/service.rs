use actix_web::{HttpResponse, ResponseError};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::api::validation::ErrorResponse;
use crate::engine::{
    EngineError, FixedWidthSegmenter, Job, JobEngine, JobId, ResumeOutcome, Segmenter, StartOutcome,
};
use crate::worker::JobHandle;

/// Service-level errors
#[derive(Debug)]
pub enum ServiceError {
    /// Engine or store operation failed
    Engine(EngineError),

    /// Validation failed
    ValidationError(String),

    /// Job not found
    NotFound(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Engine(e) => write!(f, "Engine error: {}", e),
            ServiceError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            ServiceError::NotFound(id) => write!(f, "Job not found: {}", id),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<EngineError> for ServiceError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound(id) => ServiceError::NotFound(id.to_string()),
            other => ServiceError::Engine(other),
        }
    }
}

/// Client-facing text for an engine failure; details stay in the logs.
fn engine_error_message(err: &EngineError) -> &'static str {
    match err {
        EngineError::NotFound(_) => "Job not found",
        EngineError::Store(_) => "Storage error occurred",
        EngineError::TaskAborted(_) => "Job processing task was aborted",
        EngineError::InvalidJob { .. } => "Stored job is inconsistent",
    }
}

impl ResponseError for ServiceError {
    fn error_response(&self) -> HttpResponse {
        match self {
            ServiceError::Engine(e) => {
                error!("Engine error: {}", e);
                HttpResponse::InternalServerError().json(ErrorResponse {
                    error: "Failed to process request".to_string(),
                    fields: serde_json::json!({"message": engine_error_message(e)}),
                })
            }
            ServiceError::ValidationError(msg) => {
                warn!("Validation error: {}", msg);
                HttpResponse::BadRequest().json(ErrorResponse {
                    error: "Validation failed".to_string(),
                    fields: serde_json::json!({"message": msg}),
                })
            }
            ServiceError::NotFound(id) => {
                warn!("Job not found: {}", id);
                HttpResponse::NotFound().json(ErrorResponse {
                    error: "Not found".to_string(),
                    fields: serde_json::json!({"message": format!("Job with id {} not found", id)}),
                })
            }
        }
    }
}

/// A freshly created job and its processing pass, if one was launched
#[derive(Debug)]
pub struct SubmittedJob {
    pub job: Job,
    pub handle: Option<JobHandle>,
}

/// Job service containing the operations exposed to callers
pub struct JobService {
    engine: Arc<JobEngine>,
    segmenter: Arc<dyn Segmenter>,
    chunk_size: usize,
}

impl JobService {
    pub fn new(engine: Arc<JobEngine>, chunk_size: usize) -> Self {
        Self {
            engine,
            segmenter: Arc::new(FixedWidthSegmenter),
            chunk_size,
        }
    }

    /// Parse a job id received from a caller
    pub fn parse_id(raw: &str) -> Result<JobId, ServiceError> {
        raw.parse()
            .map_err(|_| ServiceError::ValidationError(format!("Invalid job id: {}", raw)))
    }

    /// Create a job from extracted text and start processing it
    ///
    /// # Business Logic
    /// - Splits the text into fixed-width segments
    /// - Persists the job with every segment pending
    /// - Launches a background processing pass
    pub async fn create_job(
        &self,
        name: &str,
        instruction: &str,
        raw_text: &str,
    ) -> Result<SubmittedJob, ServiceError> {
        if instruction.trim().is_empty() {
            return Err(ServiceError::ValidationError("Instruction must not be empty".to_string()));
        }

        info!("Service: Chunking text with size: {}", self.chunk_size);
        let chunks = self.segmenter.split(raw_text, self.chunk_size);
        let job = Job::new(name, instruction, chunks);
        info!(
            "Service: Creating job id={}, name={}, segments={}",
            job.id,
            job.name,
            job.total_segments()
        );

        self.engine
            .store()
            .put(&job)
            .await
            .map_err(|e| ServiceError::Engine(e.into()))?;

        let handle = match self.engine.start(job.id).await? {
            StartOutcome::Started(handle) => Some(handle),
            outcome => {
                warn!("Service: Job {} was not started: {:?}", job.id, outcome);
                None
            }
        };

        Ok(SubmittedJob { job, handle })
    }

    pub async fn get_job(&self, id: JobId) -> Result<Job, ServiceError> {
        self.engine
            .store()
            .get(id)
            .await
            .map_err(|e| ServiceError::Engine(e.into()))?
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))
    }

    pub async fn list_jobs(&self) -> Result<Vec<Job>, ServiceError> {
        self.engine
            .store()
            .list_all()
            .await
            .map_err(|e| ServiceError::Engine(e.into()))
    }

    pub async fn resume_job(&self, id: JobId) -> Result<ResumeOutcome, ServiceError> {
        info!("Service: Resuming job {}", id);
        Ok(self.engine.resume(id).await?)
    }
}
