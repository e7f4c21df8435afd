use crate::config::Config;
use crate::error::{NlSqlError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Message in OpenAI chat format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String, // "system", "user"
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

/// External text-generation collaborator.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Whether credentials are present. Unconfigured services are never called.
    fn is_configured(&self) -> bool {
        true
    }

    /// Model id stamped on requests.
    fn model(&self) -> &str;

    /// Budget for generation calls.
    fn max_tokens(&self) -> u32;

    /// Returns the reply text. Transport and protocol failures are `NlSqlError::Service`.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

#[derive(Clone)]
pub struct LlmClient {
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(api_key: String, model: String, base_url: String, max_tokens: u32, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NlSqlError::Configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            max_tokens,
            http,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.openai_api_key.clone(),
            config.openai_model.clone(),
            config.openai_base_url.clone(),
            config.openai_max_tokens,
            Duration::from_secs(config.openai_timeout_secs),
        )
    }
}

#[async_trait]
impl CompletionService for LlmClient {
    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        debug!("Calling {} with {} messages", request.model, request.messages.len());

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| NlSqlError::Service(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| NlSqlError::Service(format!("Failed to parse LLM response: {}", e)))?;

        if !status.is_success() {
            let message = response_json["error"]["message"]
                .as_str()
                .unwrap_or("unknown error");
            return Err(NlSqlError::Service(format!(
                "LLM API returned {}: {}",
                status, message
            )));
        }

        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| NlSqlError::Service("No content in LLM response".to_string()))?;

        Ok(content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let request = CompletionRequest {
            model: "gpt-4".to_string(),
            messages: vec![ChatMessage::system("be precise"), ChatMessage::user("list tables")],
            max_tokens: 2000,
            temperature: 0.1,
            top_p: Some(0.9),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "list tables");
        assert_eq!(json["max_tokens"], 2000);
        assert!(json.get("top_p").is_some());
    }

    #[test]
    fn test_top_p_omitted_when_unset() {
        let request = CompletionRequest {
            model: "gpt-4".to_string(),
            messages: vec![],
            max_tokens: 500,
            temperature: 0.3,
            top_p: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("top_p").is_none());
    }

    #[test]
    fn test_client_without_key_is_unconfigured() {
        let client = LlmClient::new(
            String::new(),
            "gpt-4".to_string(),
            "https://api.openai.com/v1/".to_string(),
            2000,
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(!client.is_configured());
        assert_eq!(client.base_url, "https://api.openai.com/v1");
    }
}
