//! Embedding gateways.
//!
//! - **[`OpenAiEmbeddings`]**: `POST {base_url}/embeddings` on any
//!   OpenAI-compatible endpoint, the whole batch in one request.
//! - **[`DisabledEmbeddings`]**: always fails; selected by
//!   `embedding.provider = "disabled"`. Full-context mode keeps working,
//!   retrieval-mode chats fail with a gateway error.
//!
//! There is no retry or backoff. A failed call aborts the request that
//! triggered it; the only timeout is the client timeout from config.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use adaptive_rag_core::embedding::EmbeddingGateway;

use crate::config::EmbeddingConfig;

/// Build the gateway selected by `[embedding].provider`.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingGateway>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiEmbeddings::new(config)?)),
        "disabled" => Ok(Arc::new(DisabledEmbeddings {
            dims: config.dims,
        })),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

pub struct DisabledEmbeddings {
    dims: usize,
}

#[async_trait]
impl EmbeddingGateway for DisabledEmbeddings {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("Embedding provider is disabled")
    }
}

/// Embedding client for the OpenAI embeddings API.
///
/// Requires `OPENAI_API_KEY`; it is read on each call so a key added to
/// the environment after startup is picked up.
pub struct OpenAiEmbeddings {
    client: reqwest::Client,
    model: String,
    dims: usize,
    endpoint: String,
}

impl OpenAiEmbeddings {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            model: config.model.clone(),
            dims: config.dims,
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl EmbeddingGateway for OpenAiEmbeddings {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let api_key =
            std::env::var("OPENAI_API_KEY").map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await
            .context("embedding request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        let embeddings = parse_openai_response(&json)?;
        if embeddings.len() != texts.len() {
            bail!(
                "OpenAI returned {} embeddings for {} inputs",
                embeddings.len(),
                texts.len()
            );
        }
        Ok(embeddings)
    }
}

/// Parse the OpenAI embeddings response JSON.
///
/// Items are ordered by their `index` field when present, falling back to
/// array position.
pub fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing embedding"))?;

        let vec = embedding
            .iter()
            .map(|v| {
                v.as_f64()
                    .map(|x| x as f32)
                    .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: non-numeric value"))
            })
            .collect::<Result<Vec<f32>>>()?;

        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((index, vec));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}
