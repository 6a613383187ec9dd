use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for JobId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Job status enum representing the lifecycle of a job
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Jobs in these states are re-entered by the recovery sweep.
    pub fn is_resumable(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Processing)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// One fixed-size slice of the source text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    pub index: usize,
    pub content: String,
    pub status: SegmentStatus,
    /// Set only while `status` is `Completed`.
    pub result: Option<String>,
    /// Generation attempts used by the most recent dispatch
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub error: Option<String>,
}

impl Segment {
    pub fn new(index: usize, content: String) -> Self {
        Self {
            index,
            content,
            status: SegmentStatus::Pending,
            result: None,
            attempts: 0,
            error: None,
        }
    }

    pub fn mark_processing(&mut self) {
        self.status = SegmentStatus::Processing;
        self.result = None;
        self.attempts = 0;
    }

    pub fn mark_completed(&mut self, result: String, attempts: u32) {
        self.status = SegmentStatus::Completed;
        self.result = Some(result);
        self.attempts = attempts;
        self.error = None;
    }

    pub fn mark_failed(&mut self, error: String, attempts: u32) {
        self.status = SegmentStatus::Failed;
        self.result = None;
        self.attempts = attempts;
        self.error = Some(error);
    }

    pub fn reset(&mut self) {
        self.status = SegmentStatus::Pending;
        self.result = None;
        self.error = None;
    }
}

/// One document-processing request, from upload to assembled output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub instruction: String,
    pub status: JobStatus,
    progress: u8,
    total_segments: usize,
    pub segments: Vec<Segment>,
    pub results: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Build a pending job with one pending segment per chunk.
    pub fn new(name: impl Into<String>, instruction: impl Into<String>, chunks: Vec<String>) -> Self {
        let now = Utc::now();
        let segments: Vec<Segment> = chunks
            .into_iter()
            .enumerate()
            .map(|(index, content)| Segment::new(index, content))
            .collect();

        Self {
            id: JobId::new(),
            name: name.into(),
            instruction: instruction.into(),
            status: JobStatus::Pending,
            progress: 0,
            total_segments: segments.len(),
            segments,
            results: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn total_segments(&self) -> usize {
        self.total_segments
    }

    /// Every segment must sit at the position named by its index.
    pub fn check_layout(&self) -> Result<(), String> {
        if self.segments.len() != self.total_segments {
            return Err(format!(
                "{} segments stored but total_segments is {}",
                self.segments.len(),
                self.total_segments
            ));
        }
        match self.segments.iter().enumerate().find(|(pos, s)| s.index != *pos) {
            Some((pos, segment)) => Err(format!("segment at position {} has index {}", pos, segment.index)),
            None => Ok(()),
        }
    }

    pub fn count(&self, status: SegmentStatus) -> usize {
        self.segments.iter().filter(|s| s.status == status).count()
    }

    pub fn completed_count(&self) -> usize {
        self.count(SegmentStatus::Completed)
    }

    pub fn failed_count(&self) -> usize {
        self.count(SegmentStatus::Failed)
    }

    /// Indices of up to `limit` pending segments, lowest index first.
    pub fn pending_indices(&self, limit: usize) -> Vec<usize> {
        self.segments
            .iter()
            .filter(|s| s.status == SegmentStatus::Pending)
            .map(|s| s.index)
            .take(limit)
            .collect()
    }

    pub fn refresh_progress(&mut self) {
        let completed = self.completed_count() as f64;
        let total = self.total_segments.max(1) as f64;
        self.progress = (100.0 * completed / total).round() as u8;
        self.touch();
    }

    /// Enter `processing` for a new pass.
    ///
    /// Segments still marked `processing` can only be left over from a pass
    /// that died mid-batch, so they go back to `pending`. Returns how many
    /// were reclaimed.
    pub fn begin_pass(&mut self) -> usize {
        let mut reclaimed = 0;
        for segment in &mut self.segments {
            if segment.status == SegmentStatus::Processing {
                segment.reset();
                reclaimed += 1;
            }
        }
        self.status = JobStatus::Processing;
        self.refresh_progress();
        reclaimed
    }

    /// Put every failed segment back to `pending` and the job to `pending`.
    pub fn reset_failed(&mut self) -> usize {
        let mut reset = 0;
        for segment in &mut self.segments {
            if segment.status == SegmentStatus::Failed {
                segment.reset();
                reset += 1;
            }
        }
        self.status = JobStatus::Pending;
        self.results.clear();
        self.refresh_progress();
        reset
    }

    /// True when every segment has completed.
    pub fn all_completed(&self) -> bool {
        self.completed_count() == self.total_segments
    }

    /// Mark the job completed and assemble results in index order.
    ///
    /// Callers must check `all_completed` first.
    pub fn mark_completed(&mut self) {
        self.status = JobStatus::Completed;
        self.results = self
            .segments
            .iter()
            .map(|s| s.result.clone().unwrap_or_default())
            .collect();
        self.touch();
    }

    pub fn mark_failed(&mut self) {
        self.status = JobStatus::Failed;
        self.results.clear();
        self.touch();
    }

    /// State to leave behind when a pass aborts on a store error.
    pub fn abandon(&mut self) {
        for segment in &mut self.segments {
            if segment.status == SegmentStatus::Processing {
                segment.reset();
            }
        }
        if self.status != JobStatus::Completed {
            self.mark_failed();
        }
        self.refresh_progress();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
