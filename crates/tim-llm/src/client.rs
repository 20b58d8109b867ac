//! Minimal OpenAI-compatible HTTP client: chat completions and embeddings.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::{LlmError, LlmResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Serialize)]
pub(crate) struct EmbeddingRequest {
    pub model: String,
    pub input: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmbeddingResponse {
    pub data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmbeddingData {
    pub index: usize,
    pub embedding: Vec<f32>,
}

/// Text completion backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, system: &str, user: &str) -> LlmResult<String>;
}

/// Vector embedding backend.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn embed(&self, inputs: &[String]) -> LlmResult<Vec<Vec<f32>>>;
}

pub struct ChatClient {
    config: LlmConfig,
    api_key: Option<String>,
    http: reqwest::Client,
    permits: Semaphore,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("base_url", &self.config.base_url)
            .field("chat_model", &self.config.chat_model)
            .field("embedding_model", &self.config.embedding_model)
            .finish()
    }
}

impl ChatClient {
    /// Validates the config and resolves the API key up front.
    pub fn new(config: LlmConfig) -> LlmResult<Self> {
        config.validate()?;
        let api_key = config.api_key()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let permits = Semaphore::new(config.max_concurrent_requests);
        Ok(Self {
            config,
            api_key,
            http,
            permits,
        })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// One system + user exchange; returns the first choice's content.
    pub async fn complete(&self, system: &str, user: &str) -> LlmResult<String> {
        let body = self.chat_body(system, user);
        let response: ChatResponse = self.post("chat/completions", &body).await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(LlmError::EmptyResponse)?;
        if content.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(content)
    }

    /// Embeddings for `inputs`, in input order.
    pub async fn embeddings(&self, inputs: &[String]) -> LlmResult<Vec<Vec<f32>>> {
        let body = EmbeddingRequest {
            model: self.config.embedding_model.clone(),
            input: inputs.to_vec(),
        };
        let response: EmbeddingResponse = self.post("embeddings", &body).await?;
        order_embeddings(response, inputs.len())
    }

    pub(crate) fn chat_body(&self, system: &str, user: &str) -> ChatRequest {
        ChatRequest {
            model: self.config.chat_model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature: self.config.temperature,
        }
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> LlmResult<R>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| LlmError::Config(format!("request limiter closed: {e}")))?;

        let url = self.config.endpoint(path);
        let mut request = self.http.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        debug!(event = "llm.request", url = %url);
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ChatModel for ChatClient {
    async fn chat(&self, system: &str, user: &str) -> LlmResult<String> {
        self.complete(system, user).await
    }
}

#[async_trait]
impl EmbeddingModel for ChatClient {
    async fn embed(&self, inputs: &[String]) -> LlmResult<Vec<Vec<f32>>> {
        self.embeddings(inputs).await
    }
}

/// Sort by `index` and check that every input got exactly one vector.
pub(crate) fn order_embeddings(response: EmbeddingResponse, expected: usize) -> LlmResult<Vec<Vec<f32>>> {
    let mut data = response.data;
    data.sort_by_key(|d| d.index);
    if data.len() != expected || data.iter().enumerate().any(|(i, d)| d.index != i) {
        return Err(LlmError::Parse(format!(
            "expected {expected} embeddings, got {}",
            data.len()
        )));
    }
    Ok(data.into_iter().map(|d| d.embedding).collect())
}
