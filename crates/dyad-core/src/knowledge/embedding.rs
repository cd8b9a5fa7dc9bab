//! Embedding seam: trait + the default model-free implementation.
//!
//! The engine only needs "text in, fixed-width normalized vector out".
//! `HashEmbedder` hashes lowercase tokens into `dim` buckets and
//! L2-normalizes the result. Deterministic, dependency-free, and good
//! enough for relative similarity over a small corpus. A model-backed
//! embedder plugs in behind the same trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::info;

use crate::error::{CoreError, CoreResult};

/// Produces fixed-dimension normalized vectors from text.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Idempotent; loads the backing model at most once. Concurrent callers
    /// observe a single initialization.
    async fn initialize(&self) -> CoreResult<()>;

    /// Output length of every vector this embedder produces.
    fn dimension(&self) -> usize;

    async fn embed_text(&self, text: &str) -> CoreResult<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> CoreResult<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed_text(text).await?);
        }
        Ok(out)
    }
}

/// Deterministic bag-of-hashed-tokens embedder.
pub struct HashEmbedder {
    dim: usize,
    init: OnceCell<()>,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            init: OnceCell::new(),
        }
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn initialize(&self) -> CoreResult<()> {
        self.init
            .get_or_init(|| async {
                info!(target: "dyad::embedding", dim = self.dim, "HashEmbedder initialized");
            })
            .await;
        Ok(())
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    async fn embed_text(&self, text: &str) -> CoreResult<Vec<f32>> {
        self.initialize().await?;
        if self.dim == 0 {
            return Err(CoreError::Embedding("embedder dimension is zero".into()));
        }
        let mut vector = vec![0.0f32; self.dim];
        for token in tokenize(text) {
            let bucket = token_hash(token) as usize % self.dim;
            vector[bucket] += 1.0;
        }
        l2_normalize(&mut vector);
        Ok(vector)
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
}

fn token_hash(token: &str) -> u64 {
    // FNV-1a over the lowercase token.
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for c in token.chars().flat_map(|c| c.to_lowercase()) {
        let mut buf = [0u8; 4];
        for byte in c.encode_utf8(&mut buf).as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
    }
    hash
}

fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_embed_is_deterministic_and_normalized() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed_text("Machine learning basics").await.unwrap();
        let b = embedder.embed_text("machine LEARNING basics!").await.unwrap();
        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let embedder = HashEmbedder::new(16);
        let v = embedder.embed_text("").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn test_batch_matches_single() {
        let embedder = HashEmbedder::new(32);
        let single = embedder.embed_text("quantum computing").await.unwrap();
        let batch = embedder
            .embed_batch(&["quantum computing".to_string()])
            .await
            .unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0], single);
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let embedder = HashEmbedder::new(8);
        embedder.initialize().await.unwrap();
        embedder.initialize().await.unwrap();
        assert_eq!(embedder.dimension(), 8);
    }

    #[tokio::test]
    async fn test_related_texts_are_closer_than_unrelated() {
        let embedder = HashEmbedder::new(128);
        let a = embedder.embed_text("neural networks deep learning").await.unwrap();
        let b = embedder.embed_text("deep learning with neural networks").await.unwrap();
        let c = embedder.embed_text("medieval castle architecture").await.unwrap();
        let dot = |x: &[f32], y: &[f32]| x.iter().zip(y).map(|(p, q)| p * q).sum::<f32>();
        assert!(dot(&a, &b) > dot(&a, &c));
    }
}
