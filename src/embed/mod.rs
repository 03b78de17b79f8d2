//! Embedding boundary and vector helpers.

use async_trait::async_trait;

use crate::error::{PipelineError, Result};

mod api;

pub use api::ApiEmbedder;

/// Text → dense vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// [`embed`](Self::embed) followed by L2 normalisation.
    async fn embed_normalized(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = self.embed(text).await?;
        if v.is_empty() {
            return Err(PipelineError::Embedding(format!(
                "{} returned an empty vector",
                self.model_name()
            )));
        }
        normalize_l2(&mut v);
        Ok(v)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// In-place unit scaling; an all-zero vector stays as it is.
pub fn normalize_l2(vector: &mut [f32]) {
    let norm = dot(vector, vector).sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
}

/// Cosine of two vectors that are already unit length (see
/// [`Embedder::embed_normalized`]), i.e. their dot product, clamped to
/// `[-1, 1]` against rounding. Vectors of different length score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    dot(a, b).clamp(-1.0, 1.0)
}
