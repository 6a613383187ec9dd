use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{GenerationClient, GenerationError};
use crate::config::LlmConfig;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat-completions client for OpenAI and compatible servers.
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GenerationError::ApiRequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            base_url: normalize_base_url(config.base_url.as_deref()),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Accept either a base URL or a full `/chat/completions` endpoint.
pub fn normalize_base_url(raw: Option<&str>) -> String {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(url) => {
            let url = url.trim_end_matches('/');
            url.strip_suffix("/chat/completions")
                .unwrap_or(url)
                .trim_end_matches('/')
                .to_string()
        }
        None => DEFAULT_BASE_URL.to_string(),
    }
}

/// Pull the first choice's text out of a chat-completions body.
pub fn parse_completion(body: &str) -> Result<String, GenerationError> {
    let response: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

    response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| GenerationError::InvalidResponse("empty choices".to_string()))?
        .message
        .content
        .ok_or_else(|| GenerationError::InvalidResponse("choice has no text content".to_string()))
}

#[async_trait]
impl GenerationClient for OpenAiClient {
    async fn complete(
        &self,
        system_instruction: &str,
        user_text: &str,
    ) -> Result<String, GenerationError> {
        let request_body = ChatCompletionRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_instruction,
                },
                ChatMessage {
                    role: "user",
                    content: user_text,
                },
            ],
        };

        debug!(model = %self.model, chars = user_text.len(), "Requesting completion");

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&request_body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GenerationError::ApiRequestFailed(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GenerationError::RateLimited);
        }

        let body = response
            .text()
            .await
            .map_err(|e| GenerationError::ApiRequestFailed(e.to_string()))?;

        if !status.is_success() {
            return Err(GenerationError::ApiRequestFailed(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        parse_completion(&body)
    }
}
