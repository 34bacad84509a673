//! Embeddings module - turn item text into fixed-length vectors
//!
//! Provides trait-based abstraction over the text encoder. The recommendation
//! core only calls `embed` once per new item, never per request.

mod deadline;
mod hashing;
mod http;

pub use deadline::DeadlineEmbedder;
pub use hashing::HashingEmbedder;
pub use http::HttpEmbedder;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{EmbeddingConfig, EmbeddingProvider};
use crate::error::Result;

/// Trait for embedding generation engines
///
/// Requires Send + Sync so one encoder can serve every worker thread.
pub trait EmbeddingEngine: Send + Sync {
    /// Generate embedding for a single text
    ///
    /// Fails with `EncodingUnavailable` when the encoder cannot answer.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get embedding dimension (e.g., 384 for all-MiniLM-L6-v2)
    fn dimension(&self) -> usize;

    /// Get model name
    fn model_name(&self) -> &str;

    /// True when `embed` gives up on its own once the configured timeout passes
    fn enforces_timeout(&self) -> bool {
        false
    }
}

/// Factory function to create embedder from configuration
///
/// An embedder without a timeout of its own is wrapped in a deadline so a
/// hung encoder surfaces as `EncodingUnavailable` instead of blocking the
/// caller.
pub fn create_embedder(config: &EmbeddingConfig) -> anyhow::Result<Arc<dyn EmbeddingEngine>> {
    let timeout = Duration::from_secs(config.timeout_secs);

    let inner: Arc<dyn EmbeddingEngine> = match config.provider {
        EmbeddingProvider::Hashing => Arc::new(HashingEmbedder::new(config.dimension)),
        EmbeddingProvider::Http => {
            let api_key = std::env::var(&config.api_key_env).ok();
            Arc::new(HttpEmbedder::new(
                &config.endpoint,
                &config.model,
                api_key.as_deref(),
                config.dimension,
                timeout,
            )?)
        }
    };

    Ok(with_deadline(inner, timeout))
}

/// Wrap `inner` in a [`DeadlineEmbedder`] unless it already enforces one
pub fn with_deadline(
    inner: Arc<dyn EmbeddingEngine>,
    timeout: Duration,
) -> Arc<dyn EmbeddingEngine> {
    if inner.enforces_timeout() {
        inner
    } else {
        Arc::new(DeadlineEmbedder::new(inner, timeout))
    }
}
