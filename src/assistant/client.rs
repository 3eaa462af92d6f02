use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::assistant::dto::{ChatMessage, CompletionRequest, CompletionResponse};
use crate::config::AssistantConfig;

/// Disease prediction model behind an HTTP endpoint.
#[async_trait]
pub trait DiseasePredictor: Send + Sync {
    async fn predict(&self, text: &str) -> anyhow::Result<Value>;
}

/// Conversational model: given the history, produce the next assistant turn.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<ChatMessage>;
}

pub fn http_client(cfg: &AssistantConfig) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .build()
        .context("build http client")
}

#[derive(Clone)]
pub struct HttpPredictor {
    http: reqwest::Client,
    url: String,
}

impl HttpPredictor {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl DiseasePredictor for HttpPredictor {
    async fn predict(&self, text: &str) -> anyhow::Result<Value> {
        let res = self
            .http
            .post(&self.url)
            .json(&json!({ "text": text }))
            .send()
            .await
            .context("ml request")?
            .error_for_status()
            .context("ml status")?;
        let body = res.json::<Value>().await.context("ml response body")?;
        debug!("prediction received");
        Ok(body)
    }
}

#[derive(Clone)]
pub struct ChatCompletions {
    http: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

impl ChatCompletions {
    pub fn new(http: reqwest::Client, cfg: &AssistantConfig) -> Self {
        Self {
            http,
            url: cfg.llm_api_url.clone(),
            api_key: cfg.llm_api_key.clone(),
            model: cfg.llm_model.clone(),
        }
    }
}

#[async_trait]
impl ChatModel for ChatCompletions {
    async fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<ChatMessage> {
        let res = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&CompletionRequest {
                model: &self.model,
                messages,
            })
            .send()
            .await
            .context("llm request")?
            .error_for_status()
            .context("llm status")?;

        let body = res
            .json::<CompletionResponse>()
            .await
            .context("llm response body")?;
        let reply = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| anyhow::anyhow!("llm returned no choices"))?;
        debug!(model = %self.model, chars = reply.content.len(), "llm reply received");
        Ok(reply)
    }
}
