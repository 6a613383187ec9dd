use chrono::{DateTime, Utc};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

use crate::engine::model::Job;

/// Database representation of a job; `document` holds the full job state
#[derive(Debug, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub name: String,
    pub status: String,
    pub document: Json<Job>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRow {
    pub fn into_job(self) -> Job {
        self.document.0
    }
}
