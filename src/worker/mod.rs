pub mod job_worker;

pub use job_worker::{JobHandle, JobWorker};
