use std::time::Duration;

use async_trait::async_trait;
use log::error;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::app_config::OracleConfig;
use crate::errors::OracleError;

/// Text-analysis oracle that turns a prompt into a free-text completion
///
/// Implementations are single-shot; retry policy lives in the extractor.
#[async_trait]
pub trait PhraseOracle: Send + Sync {
    /// Send one prompt and return the completion text
    async fn complete(&self, prompt: &str) -> Result<String, OracleError>;
}

/// Completion request body
#[derive(Debug, Serialize)]
struct CompletionRequest {
    #[serde(rename = "modelUri")]
    model_uri: String,
    #[serde(rename = "completionOptions")]
    completion_options: CompletionOptions,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct CompletionOptions {
    stream: bool,
    temperature: f32,
    #[serde(rename = "maxTokens")]
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    text: String,
}

/// Completion response body
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    result: CompletionResult,
}

#[derive(Debug, Deserialize)]
struct CompletionResult {
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    message: Message,
}

/// YandexGPT-backed oracle client
pub struct YandexGpt {
    endpoint: String,
    api_key: String,
    model_uri: String,
    temperature: f32,
    max_tokens: u32,
    client: Client,
}

impl YandexGpt {
    /// Build a client from the oracle configuration
    pub fn new(config: &OracleConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model_uri: format!("gpt://{}/{}", config.folder_id, config.model),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_seconds))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl PhraseOracle for YandexGpt {
    async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        let request = CompletionRequest {
            model_uri: self.model_uri.clone(),
            completion_options: CompletionOptions {
                stream: false,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            },
            messages: vec![Message {
                role: "user".to_string(),
                text: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| OracleError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Oracle API error ({}): {}", status, message);
            return Err(OracleError::ApiError {
                status_code: status.as_u16(),
                message,
            });
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| OracleError::MalformedResponse(e.to_string()))?;

        let text = body
            .result
            .alternatives
            .into_iter()
            .next()
            .map(|alt| alt.message.text)
            .ok_or(OracleError::EmptyCompletion)?;

        if text.trim().is_empty() {
            return Err(OracleError::EmptyCompletion);
        }

        Ok(text)
    }
}
