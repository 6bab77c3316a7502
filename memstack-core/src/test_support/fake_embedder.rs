//! FakeEmbedder — deterministic hash-based embedder for testing.

use crate::traits::{Embedder, EmbedderError};
use async_trait::async_trait;

/// Produces a deterministic fixed-dimension vector from a string hash.
/// Two calls with the same text always return the same vector; this is
/// enough to exercise dimension-compatibility and vector-search code
/// paths without pulling in a real model.
pub struct FakeEmbedder {
    dimension: usize,
}

impl FakeEmbedder {
    /// Create an embedder that always produces vectors of `dimension`.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for FakeEmbedder {
    fn default() -> Self {
        Self::new(8)
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let mut seed: u64 = 1469598103934665603;
        for byte in text.bytes() {
            seed ^= byte as u64;
            seed = seed.wrapping_mul(1099511628211);
        }
        let mut vector = Vec::with_capacity(self.dimension);
        let mut state = seed;
        for _ in 0..self.dimension {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            let value = ((state >> 33) as f32 / u32::MAX as f32) * 2.0 - 1.0;
            vector.push(value);
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
