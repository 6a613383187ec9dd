use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::store::{JobStore, StoreError};
use crate::engine::model::{Job, JobId};

#[derive(Deserialize)]
struct Document {
    jobs: Vec<Job>,
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    jobs: &'a [Job],
}

/// Single JSON document holding every job.
///
/// Each write replaces the whole file through a temp file and a rename, so a
/// crash mid-write leaves the previous document intact.
pub struct JsonFileStore {
    path: PathBuf,
    jobs: Mutex<Vec<Job>>,
}

impl JsonFileStore {
    /// Load the document at `path`, starting empty if it does not exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let jobs = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => Vec::new(),
            Ok(bytes) => serde_json::from_slice::<Document>(&bytes)?.jobs,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent).await?;
                }
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        info!("Opened job file {} with {} jobs", path.display(), jobs.len());

        Ok(Self {
            path,
            jobs: Mutex::new(jobs),
        })
    }


    async fn write_document(&self, jobs: &[Job]) -> Result<(), StoreError> {
        let body = serde_json::to_vec_pretty(&DocumentRef { jobs })?;
        let tmp_path = self.path.with_extension("json.tmp");

        tokio::fs::write(&tmp_path, body).await.map_err(|e| {
            StoreError::Storage(format!("failed to write {}: {}", tmp_path.display(), e))
        })?;
        tokio::fs::rename(&tmp_path, &self.path).await.map_err(|e| {
            StoreError::Storage(format!(
                "failed to rename {} to {}: {}",
                tmp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        debug!("Wrote {} jobs to {}", jobs.len(), self.path.display());
        Ok(())
    }
}

fn upsert(jobs: &mut Vec<Job>, job: &Job) {
    match jobs.iter_mut().find(|j| j.id == job.id) {
        Some(existing) => *existing = job.clone(),
        None => jobs.push(job.clone()),
    }
}

#[async_trait]
impl JobStore for JsonFileStore {
    async fn get(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.lock().await.iter().find(|j| j.id == id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Job>, StoreError> {
        Ok(self.jobs.lock().await.clone())
    }

    async fn put(&self, job: &Job) -> Result<(), StoreError> {
        let mut jobs = self.jobs.lock().await;
        let mut next = jobs.clone();
        upsert(&mut next, job);
        self.write_document(&next).await?;
        *jobs = next;
        Ok(())
    }

    async fn put_all(&self, batch: &[Job]) -> Result<(), StoreError> {
        let mut jobs = self.jobs.lock().await;
        let mut next = jobs.clone();
        for job in batch {
            upsert(&mut next, job);
        }
        self.write_document(&next).await?;
        *jobs = next;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(dir) => tokio::fs::metadata(dir).await.map(|_| ()).map_err(Into::into),
            None => Ok(()),
        }
    }
}
