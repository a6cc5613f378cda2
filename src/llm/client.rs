//! Chat-completions backend for OpenAI-compatible APIs.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{Endpoint, ServiceConfig};
use crate::error::ServiceError;

/// Maximum characters of an error body kept in [`ServiceError::Status`].
const MAX_ERROR_BODY: usize = 500;

/// One text-generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    /// Number of independent completions requested in this single call.
    pub count: usize,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Text-generation collaborator.
///
/// `Ok(vec![])` means the backend answered successfully with zero
/// choices; transport and status failures are `Err`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Vec<String>, ServiceError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    n: usize,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP client for the chat-completions endpoint.
pub struct ChatCompletionsClient {
    http: Client,
    url: String,
    endpoint: Endpoint,
    api_key: String,
}

impl ChatCompletionsClient {
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(ServiceError::Request)?;

        Ok(Self {
            http,
            url: config.endpoint.url(),
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl CompletionBackend for ChatCompletionsClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Vec<String>, ServiceError> {
        let model = match &self.endpoint {
            Endpoint::OpenAi { model, .. } => Some(model.as_str()),
            Endpoint::Azure { .. } => None,
        };

        let body = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            max_tokens: request.max_tokens,
            n: request.count,
            temperature: request.temperature,
        };

        debug!(
            "POST {} (n={}, max_tokens={}, prompt {} chars)",
            self.url,
            request.count,
            request.max_tokens,
            request.user_prompt.len()
        );

        let builder = self.http.post(&self.url).json(&body);
        let builder = match &self.endpoint {
            Endpoint::Azure { .. } => builder.header("api-key", &self.api_key),
            Endpoint::OpenAi { .. } => builder.bearer_auth(&self.api_key),
        };

        let response = builder.send().await.map_err(ServiceError::Request)?;
        let status = response.status();

        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unavailable>".to_string());
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;

        Ok(parsed
            .choices
            .into_iter()
            .map(|choice| choice.message.content.unwrap_or_default())
            .collect())
    }
}
