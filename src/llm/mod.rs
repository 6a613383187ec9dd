pub mod openai_client;

use async_trait::async_trait;

pub use openai_client::OpenAiClient;

/// External text-transformation service invoked once per segment attempt.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn complete(
        &self,
        system_instruction: &str,
        user_text: &str,
    ) -> Result<String, GenerationError>;
}

/// Every variant is treated as transient and consumes one retry attempt.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("api request failed: {0}")]
    ApiRequestFailed(String),
    #[error("rate limited")]
    RateLimited,
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}
