//! Feature-hashing embedder
//!
//! Deterministic and offline: each lowercase word and adjacent word pair is
//! hashed into one signed bucket, then the vector is L2-normalized. Texts
//! sharing vocabulary land close together, which is enough for demos, seeds
//! and tests without a model download.

use super::EmbeddingEngine;
use crate::error::Result;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn bucket(&self, feature: &str) -> (usize, f32) {
        let hash = feature.bytes().fold(FNV_OFFSET, |acc, b| {
            (acc ^ u64::from(b)).wrapping_mul(FNV_PRIME)
        });
        let index = (hash % self.dimension as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        (index, sign)
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

impl EmbeddingEngine for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0_f32; self.dimension];
        if self.dimension == 0 {
            return Ok(vector);
        }

        let tokens = tokenize(text);
        for token in &tokens {
            let (index, sign) = self.bucket(token);
            vector[index] += sign;
        }
        for pair in tokens.windows(2) {
            let (index, sign) = self.bucket(&format!("{} {}", pair[0], pair[1]));
            vector[index] += 0.5 * sign;
        }

        // Blank text stays the zero vector
        crate::vectors::normalize(&mut vector);
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "feature-hashing"
    }
}
