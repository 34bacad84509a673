//! Caller-imposed timeout around any embedder
//!
//! The wrapped call runs on a helper thread; if it has not answered within
//! the deadline the caller gets `EncodingUnavailable` and the helper's late
//! answer is discarded.
//!
//! Each call costs one OS thread. A helper stuck in a call that never returns
//! is never reclaimed, so only encoders without a timeout of their own get
//! wrapped (see [`super::with_deadline`]).

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use super::EmbeddingEngine;
use crate::error::{RecError, Result};

pub struct DeadlineEmbedder {
    inner: Arc<dyn EmbeddingEngine>,
    timeout: Duration,
}

impl DeadlineEmbedder {
    pub fn new(inner: Arc<dyn EmbeddingEngine>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

impl EmbeddingEngine for DeadlineEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let text = text.to_string();

        std::thread::Builder::new()
            .name("embed".to_string())
            .spawn(move || {
                let _ = tx.send(inner.embed(&text));
            })
            .map_err(|e| RecError::EncodingUnavailable(format!("failed to spawn encoder: {}", e)))?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(RecError::EncodingUnavailable(format!(
                "{} did not answer within {:?}",
                self.inner.model_name(),
                self.timeout
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(RecError::EncodingUnavailable(format!(
                "{} stopped without answering",
                self.inner.model_name()
            ))),
        }
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn enforces_timeout(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingEmbedder;

    struct SlowEmbedder(Duration);

    impl EmbeddingEngine for SlowEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            std::thread::sleep(self.0);
            Ok(vec![1.0])
        }

        fn dimension(&self) -> usize {
            1
        }

        fn model_name(&self) -> &str {
            "slow"
        }
    }

    struct PanickingEmbedder;

    impl EmbeddingEngine for PanickingEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            panic!("model crashed");
        }

        fn dimension(&self) -> usize {
            1
        }

        fn model_name(&self) -> &str {
            "panicky"
        }
    }

    #[test]
    fn test_passes_through_fast_answers() {
        let embedder = DeadlineEmbedder::new(
            Arc::new(HashingEmbedder::new(8)),
            Duration::from_secs(5),
        );
        assert_eq!(embedder.embed("hello world").unwrap().len(), 8);
        assert_eq!(embedder.dimension(), 8);
    }

    #[test]
    fn test_hung_encoder_times_out() {
        let embedder = DeadlineEmbedder::new(
            Arc::new(SlowEmbedder(Duration::from_secs(2))),
            Duration::from_millis(50),
        );
        let err = embedder.embed("anything").unwrap_err();
        assert!(matches!(err, RecError::EncodingUnavailable(_)));
        assert!(err.to_string().contains("did not answer"));
    }

    #[test]
    fn test_panicking_encoder_is_unavailable() {
        let embedder =
            DeadlineEmbedder::new(Arc::new(PanickingEmbedder), Duration::from_secs(5));
        assert!(matches!(
            embedder.embed("anything"),
            Err(RecError::EncodingUnavailable(_))
        ));
    }
}
