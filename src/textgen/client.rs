//! OpenAI-compatible chat completions client with ordered model fallback.
//!
//! A transient failure (429, 5xx, network) is retried once against the same model
//! before the client moves on to the next one.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::error::{classify_http_status, TextGenError, TextGenErrorKind};
use super::TextGenerator;
use crate::config::TextGenConfig;

/// Chat completions client that walks its model list until one answers.
pub struct ChatCompletionsClient {
    client: Client,
    api_url: String,
    api_key: String,
    models: Vec<String>,
    retry_delay: Duration,
}

/// Pause before re-asking a model that failed transiently.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

impl ChatCompletionsClient {
    pub fn new(api_url: String, api_key: String, models: Vec<String>) -> Self {
        Self {
            client: Client::new(),
            api_url,
            api_key,
            models,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Build a client from config; `None` when no API key is configured.
    pub fn from_config(config: &TextGenConfig) -> Option<Self> {
        let api_key = config.api_key.clone()?;
        if config.models.is_empty() {
            return None;
        }
        Some(Self::new(
            config.api_url.clone(),
            api_key,
            config.models.clone(),
        ))
    }

    fn create_error(status: reqwest::StatusCode, body: &str) -> TextGenError {
        let status_code = status.as_u16();
        match classify_http_status(status_code) {
            TextGenErrorKind::RateLimited => TextGenError::rate_limited(body.to_string()),
            TextGenErrorKind::ClientError => {
                TextGenError::client_error(status_code, body.to_string())
            }
            _ => TextGenError::server_error(status_code, body.to_string()),
        }
    }

    /// Execute a request, retrying once if the first attempt fails transiently.
    async fn execute_with_retry(&self, request: &ChatRequest<'_>) -> Result<String, TextGenError> {
        match self.execute_request(request).await {
            Err(error) if error.is_transient() => {
                tracing::warn!(
                    model = %request.model,
                    error = %error,
                    "Transient failure, retrying in {:?}",
                    self.retry_delay
                );
                tokio::time::sleep(self.retry_delay).await;
                self.execute_request(request).await
            }
            result => result,
        }
    }

    /// Execute a single request against one model.
    async fn execute_request(&self, request: &ChatRequest<'_>) -> Result<String, TextGenError> {
        let response = match self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                if e.is_timeout() {
                    return Err(TextGenError::network_error(format!("Request timeout: {}", e)));
                } else if e.is_connect() {
                    return Err(TextGenError::network_error(format!("Connection failed: {}", e)));
                } else {
                    return Err(TextGenError::network_error(format!("Request failed: {}", e)));
                }
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(Self::create_error(status, &body));
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            TextGenError::parse_error(format!("Failed to parse response: {}", e))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| TextGenError::parse_error("No content in response".to_string()))
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionsClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, TextGenError> {
        let mut last_error: Option<TextGenError> = None;

        for model in &self.models {
            let request = ChatRequest {
                model,
                stream: false,
                messages: vec![
                    ChatMessage {
                        role: "system",
                        content: system,
                    },
                    ChatMessage {
                        role: "user",
                        content: user,
                    },
                ],
            };

            match self.execute_with_retry(&request).await {
                Ok(content) => {
                    tracing::debug!(model = %model, "Text generation succeeded");
                    return Ok(content);
                }
                Err(error) if error.should_fallback() => {
                    tracing::warn!(model = %model, error = %error, "Model failed, trying next");
                    last_error = Some(error);
                }
                Err(error) => return Err(error),
            }
        }

        Err(TextGenError::unavailable(
            last_error
                .map(|e| e.message)
                .unwrap_or_else(|| "No models configured".to_string()),
        ))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    stream: bool,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}
