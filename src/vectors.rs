//! Similarity metrics and byte encoding for embeddings

use zerocopy::AsBytes;

use crate::error::{RecError, Result};

/// Dot product of two equal-length vectors, accumulated in f64
///
/// Any finite f32 inputs give a finite result; an f32 sum overflows once
/// components pass ~1.8e19.
pub fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum()
}

/// L2 norm, accumulated in f64
pub fn norm(a: &[f32]) -> f64 {
    a.iter()
        .map(|x| f64::from(*x) * f64::from(*x))
        .sum::<f64>()
        .sqrt()
}

/// Scale a vector to unit length in place; the zero vector is left alone
pub fn normalize(vector: &mut [f32]) {
    let magnitude = norm(vector);
    if magnitude > 0.0 && magnitude.is_finite() {
        vector
            .iter_mut()
            .for_each(|v| *v = (f64::from(*v) / magnitude) as f32);
    }
}

/// Compute cosine similarity between two embedding vectors
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 = same direction
/// - 0.0 = orthogonal, or either vector has zero magnitude
/// - -1.0 = opposite directions
///
/// Unlike a bare metric this never panics: differing lengths are a
/// `DimensionMismatch` against `a`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(RecError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let magnitude_a = norm(a);
    let magnitude_b = norm(b);

    // Zero magnitude means "no preference", scored as neutral
    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return Ok(0.0);
    }

    let similarity = dot(a, b) / (magnitude_a * magnitude_b);
    if similarity.is_nan() {
        // Only reachable when a preference sum overflowed to infinity
        return Ok(0.0);
    }
    // Rounding can land just outside [-1, 1]
    Ok(similarity.clamp(-1.0, 1.0) as f32)
}

/// Serialize an embedding to little-endian f32 bytes (SQLite BLOB format)
pub fn to_blob(vector: &[f32]) -> Vec<u8> {
    if cfg!(target_endian = "little") {
        vector.as_bytes().to_vec()
    } else {
        vector.iter().flat_map(|v| v.to_le_bytes()).collect()
    }
}

/// Decode little-endian f32 bytes back into an embedding
pub fn from_blob(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(RecError::Storage(format!(
            "embedding blob length {} is not a multiple of 4",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
