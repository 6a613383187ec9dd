//! Job/segment processing engine.
//!
//! ## Components
//!
//! - `model`: `Job` and `Segment` with their status state machines
//! - `segmenter`: fixed-width text slicing
//! - `retry`: per-segment attempt limit and backoff
//! - `scheduler`: bounded concurrent batches with persist-after-every-change
//! - `job_engine`: start, resume and completion for one job at a time
//! - `recovery`: startup sweep over unfinished jobs

pub mod error;
pub mod job_engine;
pub mod model;
pub mod recovery;
pub mod retry;
pub mod scheduler;
pub mod segmenter;

pub use error::EngineError;
pub use job_engine::{EngineSettings, JobEngine, PassOutcome, ResumeOutcome, StartOutcome};
pub use model::{Job, JobId, JobStatus, Segment, SegmentStatus};
pub use recovery::{recover, RecoveryReport};
pub use retry::{BackoffStrategy, RetryPolicy};
pub use segmenter::{FixedWidthSegmenter, Segmenter};
