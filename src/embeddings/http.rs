//! Blocking client for OpenAI-compatible `/embeddings` endpoints
//!
//! Failures of any kind (connect, timeout, non-2xx, malformed body) surface
//! as `EncodingUnavailable`. Retry policy belongs to whoever calls the
//! item-creation path, so there is none here.

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::EmbeddingEngine;
use crate::error::{RecError, Result};

pub struct HttpEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimension: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: Option<&str>,
        dimension: usize,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(!model.trim().is_empty(), "missing embedding model name");

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            let auth = format!("Bearer {}", key.trim());
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth)
                    .map_err(|e| anyhow::anyhow!("invalid embedding API key: {}", e))?,
            );
        }

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build embedding HTTP client: {}", e))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
            dimension,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl EmbeddingEngine for HttpEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: [text],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    RecError::EncodingUnavailable(format!("{} timed out", self.endpoint))
                } else {
                    RecError::EncodingUnavailable(format!("{}: {}", self.endpoint, e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(RecError::EncodingUnavailable(format!(
                "embedding request failed ({}): {}",
                status, body
            )));
        }

        let parsed: EmbeddingResponse = response.json().map_err(|e| {
            RecError::EncodingUnavailable(format!("malformed embedding response: {}", e))
        })?;

        let embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| {
                RecError::EncodingUnavailable("embedding response had no data".to_string())
            })?;

        if embedding.len() != self.dimension {
            return Err(RecError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    /// The reqwest client carries the configured timeout
    fn enforces_timeout(&self) -> bool {
        true
    }
}
