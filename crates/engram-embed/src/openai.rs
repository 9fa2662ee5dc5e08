//! OpenAI-compatible HTTP embedding provider.
//!
//! Implements the same `Embedder` capability set as the local ONNX model
//! against `POST {base_url}/embeddings`. Requests carry a 30 s timeout and
//! bearer auth; responses are re-ordered by `index` so batch order is
//! preserved regardless of server behavior.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use engram_config::OpenAiConfig;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::EmbedError;
use crate::service::{Embedder, zero_vector};

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

/// HTTP embedding provider speaking the OpenAI embeddings contract.
pub struct OpenAiEmbedder {
    config: OpenAiConfig,
    version: String,
    client: reqwest::blocking::Client,
    closed: AtomicBool,
}

impl OpenAiEmbedder {
    /// Build the provider.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError::ConfigMissing`] when no API key is configured,
    /// [`EmbedError::InitFailed`] when the HTTP client cannot be built.
    pub fn new(config: OpenAiConfig) -> Result<Self, EmbedError> {
        if !config.is_configured() {
            return Err(EmbedError::ConfigMissing(
                "openai.api_key is required for the HTTP embedding provider".to_string(),
            ));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbedError::InitFailed(format!("http client: {e}")))?;

        let version = format!("openai:{}", config.model);
        Ok(Self {
            config,
            version,
            client,
            closed: AtomicBool::new(false),
        })
    }

    fn request(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let url = format!("{}/embeddings", self.config.base_url.trim_end_matches('/'));
        let body = json!({
            "input": inputs,
            "model": self.config.model,
            "encoding_format": "float",
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .map_err(|e| EmbedError::EmbedFailure(format!("embedding request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EmbedError::Http {
                model: self.config.model.clone(),
                status: status.as_u16(),
            });
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .map_err(|e| EmbedError::EmbedFailure(format!("embedding response: {e}")))?;

        debug!(count = parsed.data.len(), model = %self.config.model, "embeddings received");

        // Server may reorder; `index` restores input order.
        let mut ordered: Vec<Option<Vec<f32>>> = vec![None; inputs.len()];
        for item in parsed.data {
            if item.index >= ordered.len() {
                return Err(EmbedError::EmbedFailure(format!(
                    "response index {} out of range for batch of {}",
                    item.index,
                    ordered.len()
                )));
            }
            ordered[item.index] = Some(item.embedding);
        }
        ordered
            .into_iter()
            .enumerate()
            .map(|(i, v)| {
                v.ok_or_else(|| {
                    EmbedError::EmbedFailure(format!("response missing embedding for index {i}"))
                })
            })
            .collect()
    }
}

impl Embedder for OpenAiEmbedder {
    fn name(&self) -> &str {
        &self.config.model
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EmbedError::Shutdown);
        }
        if text.trim().is_empty() {
            return Ok(zero_vector(self.config.dimensions));
        }
        let mut out = self.request(&[text])?;
        out.pop()
            .ok_or_else(|| EmbedError::EmbedFailure("empty response batch".to_string()))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EmbedError::Shutdown);
        }
        let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let mut live_indices = Vec::new();
        let mut live_texts: Vec<&str> = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            if text.trim().is_empty() {
                results[i] = Some(zero_vector(self.config.dimensions));
            } else {
                live_indices.push(i);
                live_texts.push(text.as_str());
            }
        }
        if !live_texts.is_empty() {
            let vectors = self.request(&live_texts)?;
            for (idx, vector) in live_indices.into_iter().zip(vectors) {
                results[idx] = Some(vector);
            }
        }
        Ok(results.into_iter().flatten().collect())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
