//! Vector math over speaker embeddings.
//!
//! Pure functions only: no I/O, no state. Embeddings are `f64` slices of a
//! fixed dimension (192 for the deployed model).

use thiserror::Error;

/// Errors from embedding arithmetic
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VectorError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Degenerate input: {0}")]
    DegenerateInput(String),
}

/// Cosine similarity of two equal-length vectors, clamped to [-1, 1].
///
/// Returns 0 when either vector has zero magnitude.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Result<f64, VectorError> {
    if a.is_empty() || b.is_empty() {
        return Err(VectorError::InvalidInput(
            "vectors must not be empty".to_string(),
        ));
    }
    if a.len() != b.len() {
        return Err(VectorError::InvalidInput(format!(
            "vector lengths differ: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let magnitude_a = norm_a.sqrt();
    let magnitude_b = norm_b.sqrt();
    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return Ok(0.0);
    }

    Ok((dot / (magnitude_a * magnitude_b)).clamp(-1.0, 1.0))
}

/// Element-wise mean of the embeddings, re-normalized to unit L2 norm.
pub fn average_embeddings(embeddings: &[Vec<f64>]) -> Result<Vec<f64>, VectorError> {
    let first = embeddings
        .first()
        .ok_or_else(|| VectorError::InvalidInput("no embeddings to average".to_string()))?;
    let dim = first.len();

    if let Some((idx, other)) = embeddings
        .iter()
        .enumerate()
        .find(|(_, e)| e.len() != dim)
    {
        return Err(VectorError::InvalidInput(format!(
            "embedding {} has length {}, expected {}",
            idx,
            other.len(),
            dim
        )));
    }

    let count = embeddings.len() as f64;
    let mut mean = vec![0.0; dim];
    for embedding in embeddings {
        for (acc, value) in mean.iter_mut().zip(embedding) {
            *acc += value;
        }
    }
    for value in &mut mean {
        *value /= count;
    }

    let norm = l2_norm(&mean);
    if norm == 0.0 {
        return Err(VectorError::DegenerateInput(
            "mean embedding has zero norm".to_string(),
        ));
    }

    for value in &mut mean {
        *value /= norm;
    }
    Ok(mean)
}

/// True when the vector has exactly `expected_dim` finite elements.
pub fn validate_embedding(vector: &[f64], expected_dim: usize) -> bool {
    vector.len() == expected_dim && vector.iter().all(|v| v.is_finite())
}

/// Same check for untyped JSON input.
///
/// Rejects non-arrays and any element that is not a finite number.
pub fn validate_embedding_value(value: &serde_json::Value, expected_dim: usize) -> bool {
    let Some(items) = value.as_array() else {
        return false;
    };
    items.len() == expected_dim
        && items
            .iter()
            .all(|item| item.as_f64().is_some_and(f64::is_finite))
}

/// Euclidean norm
pub fn l2_norm(vector: &[f64]) -> f64 {
    vector.iter().map(|v| v * v).sum::<f64>().sqrt()
}
