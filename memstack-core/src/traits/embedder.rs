//! [`Embedder`] — the vector-math-free embedding boundary (spec.md §1
//! Non-goals: "no vector-math library of its own — it consumes an
//! embedder").

use async_trait::async_trait;

/// Errors from the embedding provider.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum EmbedderError {
    /// The provider call itself failed.
    #[error("embedding provider error: {0}")]
    ProviderFailed(String),
}

/// Produces fixed-dimension embeddings for text. Implementations wrap a
/// concrete provider (OpenAI, local model, etc.) — out of scope per
/// spec.md §1, this crate only needs the boundary.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single string.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;

    /// The fixed dimension this embedder always produces. Used for
    /// dimension-compatibility checks (spec.md §4.7).
    fn dimension(&self) -> usize;
}
