//! Chat-completion gateways for answer generation and query rewriting.
//!
//! [`OpenAiChat`] posts to `{base_url}/chat/completions` and returns the
//! first choice's message content. Model, temperature, and token cap come
//! from each [`CompletionRequest`], so one client serves both the answer
//! model and the faster rewrite model.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use adaptive_rag_core::completion::{CompletionGateway, CompletionRequest};

use crate::config::CompletionConfig;

/// Build the gateway selected by `[completion].provider`.
pub fn create_completer(config: &CompletionConfig) -> Result<Arc<dyn CompletionGateway>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiChat::new(config)?)),
        "disabled" => Ok(Arc::new(DisabledChat)),
        other => bail!("Unknown completion provider: {}", other),
    }
}

pub struct DisabledChat;

#[async_trait]
impl CompletionGateway for DisabledChat {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
        bail!("Completion provider is disabled")
    }
}

pub struct OpenAiChat {
    client: reqwest::Client,
    endpoint: String,
}

impl OpenAiChat {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: format!(
                "{}/chat/completions",
                config.base_url.trim_end_matches('/')
            ),
        })
    }
}

/// Request body for the chat completions API.
pub fn request_body(request: &CompletionRequest) -> serde_json::Value {
    serde_json::json!({
        "model": request.model,
        "messages": request.messages,
        "temperature": request.temperature,
        "max_tokens": request.max_tokens,
    })
}

#[async_trait]
impl CompletionGateway for OpenAiChat {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let api_key =
            std::env::var("OPENAI_API_KEY").map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request_body(request))
            .send()
            .await
            .context("completion request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_chat_response(&json)
    }
}

/// Extract `choices[0].message.content`.
pub fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use adaptive_rag_core::models::ChatMessage;
    use serde_json::json;

    #[test]
    fn parse_first_choice() {
        let body = json!({
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "Paris."}},
                {"index": 1, "message": {"role": "assistant", "content": "Lyon."}}
            ]
        });
        assert_eq!(parse_chat_response(&body).unwrap(), "Paris.");
    }

    #[test]
    fn parse_rejects_null_content() {
        let body = json!({"choices": [{"message": {"role": "assistant", "content": null}}]});
        assert!(parse_chat_response(&body).is_err());
        assert!(parse_chat_response(&json!({"choices": []})).is_err());
    }

    #[test]
    fn body_carries_request_settings() {
        let req = CompletionRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![ChatMessage::system("s"), ChatMessage::user("u")],
            temperature: 0.3,
            max_tokens: 200,
        };
        let body = request_body(&req);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 200);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "u");
    }
}
