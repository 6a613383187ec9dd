#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::Instant;

use doc_processor::db::{InMemoryJobStore, JobStore, StoreError};
use doc_processor::engine::{EngineSettings, Job, JobEngine, JobId, RetryPolicy};
use doc_processor::llm::{GenerationClient, GenerationError};

/// What the scripted client does for one call.
#[derive(Clone, Debug)]
pub enum Reply {
    Ok(String),
    Fail(String),
    Panic,
}

/// Generation client driven by per-content scripts.
///
/// Content without a script (or with an exhausted one) is answered with its
/// uppercase form. Every call is recorded with its start instant.
pub struct ScriptedClient {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<(String, Instant)>>,
    latency: Duration,
}

impl ScriptedClient {
    pub fn new() -> Arc<Self> {
        Self::with_latency(Duration::ZERO)
    }

    pub fn with_latency(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            latency,
        })
    }

    pub fn script(&self, content: &str, replies: impl IntoIterator<Item = Reply>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(content.to_string(), replies.into_iter().collect());
    }

    pub fn always_fail(&self, content: &str, times: usize) {
        self.script(content, (0..times).map(|i| Reply::Fail(format!("boom {}", i + 1))));
    }

    pub fn calls(&self) -> Vec<(String, Instant)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, content: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| c == content)
            .count()
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn complete(&self, _system_instruction: &str, user_text: &str) -> Result<String, GenerationError> {
        self.calls
            .lock()
            .unwrap()
            .push((user_text.to_string(), Instant::now()));

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let reply = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(user_text)
            .and_then(|queue| queue.pop_front());

        match reply {
            Some(Reply::Ok(text)) => Ok(text),
            Some(Reply::Fail(message)) => Err(GenerationError::ApiRequestFailed(message)),
            Some(Reply::Panic) => panic!("scripted panic"),
            None => Ok(user_text.to_uppercase()),
        }
    }
}

/// In-memory store whose writes start failing after a budget is spent.
pub struct FailingStore {
    inner: InMemoryJobStore,
    remaining_writes: AtomicUsize,
}

impl FailingStore {
    pub fn new(allowed_writes: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryJobStore::new(),
            remaining_writes: AtomicUsize::new(allowed_writes),
        })
    }

    fn spend(&self) -> Result<(), StoreError> {
        self.remaining_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map(|_| ())
            .map_err(|_| StoreError::Storage("disk full".to_string()))
    }
}

#[async_trait]
impl JobStore for FailingStore {
    async fn get(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        self.inner.get(id).await
    }

    async fn list_all(&self) -> Result<Vec<Job>, StoreError> {
        self.inner.list_all().await
    }

    async fn put(&self, job: &Job) -> Result<(), StoreError> {
        self.spend()?;
        self.inner.put(job).await
    }

    async fn put_all(&self, jobs: &[Job]) -> Result<(), StoreError> {
        self.spend()?;
        self.inner.put_all(jobs).await
    }
}

/// In-memory store that rejects exactly one write, counted from 1.
pub struct FailOnceStore {
    pub inner: InMemoryJobStore,
    fail_on: usize,
    seen: AtomicUsize,
}

impl FailOnceStore {
    pub fn new(fail_on: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryJobStore::new(),
            fail_on,
            seen: AtomicUsize::new(0),
        })
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.seen.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_on {
            return Err(StoreError::Storage("transient write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for FailOnceStore {
    async fn get(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        self.inner.get(id).await
    }

    async fn list_all(&self) -> Result<Vec<Job>, StoreError> {
        self.inner.list_all().await
    }

    async fn put(&self, job: &Job) -> Result<(), StoreError> {
        self.check()?;
        self.inner.put(job).await
    }

    async fn put_all(&self, jobs: &[Job]) -> Result<(), StoreError> {
        self.check()?;
        self.inner.put_all(jobs).await
    }
}

pub fn settings(batch_size: usize) -> EngineSettings {
    EngineSettings {
        batch_size,
        max_concurrent_jobs: 4,
        retry: RetryPolicy::fixed(3, Duration::from_secs(10)),
    }
}

pub struct TestEngine {
    pub engine: Arc<JobEngine>,
    pub store: Arc<InMemoryJobStore>,
    pub client: Arc<ScriptedClient>,
    pub shutdown: watch::Sender<bool>,
}

impl TestEngine {
    pub fn new(batch_size: usize, client: Arc<ScriptedClient>) -> Self {
        Self::with_store(batch_size, client, Arc::new(InMemoryJobStore::new()))
    }

    pub fn with_store(batch_size: usize, client: Arc<ScriptedClient>, store: Arc<InMemoryJobStore>) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let engine = JobEngine::new(store.clone(), client.clone(), settings(batch_size), shutdown_rx);
        Self {
            engine,
            store,
            client,
            shutdown,
        }
    }

    /// Persist a fresh job with one segment per chunk.
    pub async fn seed(&self, chunks: &[&str]) -> Job {
        let job = Job::new(
            "doc.txt",
            "Uppercase everything.",
            chunks.iter().map(|c| c.to_string()).collect(),
        );
        self.store.put(&job).await.unwrap();
        job
    }

    pub async fn load(&self, id: JobId) -> Job {
        self.store.get(id).await.unwrap().expect("job should exist")
    }
}
