//! Deterministic mock embedder.
//!
//! Used when no provider credentials are configured, and in tests. Vectors
//! are derived from a blake3 hash of the text, so identical text always maps
//! to the identical unit vector and unrelated texts land roughly orthogonal.

use async_trait::async_trait;
use dojo_core::{DEFAULT_EMBEDDING_DIMENSION, EmbedError, Embedder};

/// Hash-derived embedder with no external dependencies.
///
/// # Example
///
/// ```rust
/// use dojo_core::Embedder;
/// use dojo_embed::MockEmbedder;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let embedder = MockEmbedder::with_dimension(8);
/// let a = embedder.embed("discount policy").await?;
/// let b = embedder.embed("discount policy").await?;
///
/// assert_eq!(a.len(), 8);
/// assert_eq!(a, b);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    /// Create a mock embedder with the default dimension (1536).
    #[must_use]
    pub fn new() -> Self {
        Self::with_dimension(DEFAULT_EMBEDDING_DIMENSION)
    }

    #[must_use]
    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut bytes = vec![0u8; self.dimension * 4];
        let mut hasher = blake3::Hasher::new();
        hasher.update(text.as_bytes());
        hasher.finalize_xof().fill(&mut bytes);

        let mut vector: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|b| {
                let raw = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
                (f64::from(raw) / f64::from(u32::MAX) * 2.0 - 1.0) as f32
            })
            .collect();

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    fn model_name(&self) -> &str {
        "mock"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|text| self.vector_for(text)).collect())
    }
}
