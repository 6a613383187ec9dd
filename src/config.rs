use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::engine::retry::{BackoffStrategy, RetryPolicy};

/// Where job state is persisted
#[derive(Clone, Debug, PartialEq)]
pub enum StoreBackend {
    Postgres {
        database_url: String,
        max_connections: u32,
    },
    /// Single JSON document rewritten on every change
    File { path: PathBuf },
    /// Nothing survives the process; CLI one-shot runs and tests
    Memory,
}

/// Settings for the OpenAI-compatible generation endpoint
#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: String,
    /// Base URL, with any trailing `/chat/completions` removed later
    pub base_url: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    pub store: StoreBackend,

    pub host: String,
    pub port: u16,

    /// Maximum payload size for all requests (in bytes)
    /// Default: 10MB (10 * 1024 * 1024)
    pub max_payload_size: usize,

    /// Directory for the rolling log files
    pub log_dir: String,

    /// Segment width in characters
    pub chunk_size: usize,

    /// Segments dispatched concurrently per batch
    pub batch_size: usize,

    /// Jobs processed at the same time across the process
    pub max_concurrent_jobs: usize,

    pub retry: RetryPolicy,

    pub llm: LlmConfig,

    /// How long shutdown waits for running jobs to reach a batch boundary
    pub shutdown_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// A `.env` file is read first when present. See `from_lookup` for the
    /// variables and defaults.
    pub fn from_env() -> Result<Self, String> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup.
    ///
    /// Optional variables and defaults:
    /// - STORE_BACKEND: postgres | file | memory (default: postgres when DATABASE_URL is set, else file)
    /// - DATABASE_URL, MAX_DB_CONNECTIONS (5), DB_PATH (db.json)
    /// - HOST (127.0.0.1), PORT (5000), MAX_PAYLOAD_SIZE (10485760), LOG_DIR (logs)
    /// - CHUNK_SIZE (2000), BATCH_SIZE or PAGES_PER_BATCH (2), MAX_CONCURRENT_JOBS (4)
    /// - MAX_ATTEMPTS (3), RETRY_DELAY_SECS (10), RETRY_MAX_DELAY_SECS (300), RETRY_BACKOFF (fixed), RETRY_JITTER (0.0)
    /// - OPENAI_API_KEY, OPENAI_COMPLETIONS_URL, MODEL_ID (gpt-4o), LLM_TIMEOUT_SECS (120)
    /// - SHUTDOWN_TIMEOUT_SECS (30)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL");
        let backend = get("STORE_BACKEND").map(|s| s.to_ascii_lowercase());
        let store = match (backend.as_deref(), database_url) {
            (Some("memory"), _) => StoreBackend::Memory,
            (Some("file"), _) | (None, None) => StoreBackend::File {
                path: PathBuf::from(get("DB_PATH").unwrap_or_else(|| "db.json".to_string())),
            },
            (Some("postgres"), Some(database_url)) | (None, Some(database_url)) => {
                StoreBackend::Postgres {
                    database_url,
                    max_connections: parse(&get, "MAX_DB_CONNECTIONS", 5)?,
                }
            }
            (Some("postgres"), None) => {
                return Err("DATABASE_URL must be set when STORE_BACKEND=postgres".to_string());
            }
            (Some(other), _) => return Err(format!("Unknown STORE_BACKEND: {}", other)),
        };

        let batch_size = match get("BATCH_SIZE") {
            Some(_) => parse(&get, "BATCH_SIZE", 2)?,
            None => parse(&get, "PAGES_PER_BATCH", 2)?,
        };

        let strategy = match get("RETRY_BACKOFF") {
            Some(raw) => raw.parse::<BackoffStrategy>()?,
            None => BackoffStrategy::Fixed,
        };
        let base_delay = Duration::from_secs(parse(&get, "RETRY_DELAY_SECS", 10)?);
        let max_delay = Duration::from_secs(parse(&get, "RETRY_MAX_DELAY_SECS", 300)?);
        let retry = RetryPolicy {
            max_attempts: parse(&get, "MAX_ATTEMPTS", 3)?,
            base_delay,
            max_delay: if strategy == BackoffStrategy::Fixed { base_delay } else { max_delay },
            strategy,
            jitter: 0.0,
        }
        .with_jitter(parse(&get, "RETRY_JITTER", 0.0)?);

        let config = Config {
            store,
            host: get("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse(&get, "PORT", 5000)?,
            max_payload_size: parse(&get, "MAX_PAYLOAD_SIZE", 10 * 1024 * 1024)?,
            log_dir: get("LOG_DIR").unwrap_or_else(|| "logs".to_string()),
            chunk_size: parse(&get, "CHUNK_SIZE", 2000)?,
            batch_size,
            max_concurrent_jobs: parse(&get, "MAX_CONCURRENT_JOBS", 4)?,
            retry,
            llm: LlmConfig {
                api_key: get("OPENAI_API_KEY").unwrap_or_default(),
                base_url: get("OPENAI_COMPLETIONS_URL"),
                model: get("MODEL_ID").unwrap_or_else(|| "gpt-4o".to_string()),
                timeout: Duration::from_secs(parse(&get, "LLM_TIMEOUT_SECS", 120)?),
            },
            shutdown_timeout: Duration::from_secs(parse(&get, "SHUTDOWN_TIMEOUT_SECS", 30)?),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        let at_least_one = [
            ("CHUNK_SIZE", self.chunk_size),
            ("BATCH_SIZE", self.batch_size),
            ("MAX_CONCURRENT_JOBS", self.max_concurrent_jobs),
            ("MAX_ATTEMPTS", self.retry.max_attempts as usize),
        ];
        for (name, value) in at_least_one {
            if value == 0 {
                return Err(format!("{} must be at least 1", name));
            }
        }
        Ok(())
    }
}

fn parse<T, G>(get: &G, key: &str, default: T) -> Result<T, String>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| format!("{} has an invalid value: {}", key, raw)),
        None => Ok(default),
    }
}
