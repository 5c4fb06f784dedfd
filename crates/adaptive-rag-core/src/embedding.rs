//! Embedding gateway trait and vector utilities.
//!
//! Defines the [`EmbeddingGateway`] trait that network-backed embedding
//! clients implement, plus pure helpers for normalization, scoring, and
//! byte encoding of vectors.
//!
//! Concrete gateways (OpenAI-compatible HTTP) live in the `adaptive-rag`
//! app crate.

use anyhow::Result;
use async_trait::async_trait;

use crate::error::CoreError;

/// Text → fixed-width vector.
///
/// Implementations must return exactly one vector per input text, in
/// input order, each of length [`dims`](EmbeddingGateway::dims).
#[async_trait]
pub trait EmbeddingGateway: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;
    /// Embed a batch of texts in a single call.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed one query text.
pub async fn embed_one(gateway: &dyn EmbeddingGateway, text: &str) -> Result<Vec<f32>> {
    gateway
        .embed(&[text.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
}

/// Euclidean norm.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale `v` to unit length in place.
///
/// Zero, NaN, and infinite norms are rejected as [`CoreError::InvalidInput`].
pub fn normalize_l2(v: &mut [f32]) -> Result<(), CoreError> {
    let norm = l2_norm(v);
    if !norm.is_finite() || norm <= f32::EPSILON {
        return Err(CoreError::invalid(
            "cannot normalize a zero or non-finite vector",
        ));
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
    Ok(())
}

/// Inner product. Equals cosine similarity when both inputs are unit length.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Encode a float vector as little-endian `f32` bytes.
///
/// # Example
///
/// ```rust
/// use adaptive_rag_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Reverses [`vec_to_blob`]. Trailing bytes that do not form a full `f32`
/// are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
