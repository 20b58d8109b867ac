//! Embedding sources: text → integer signature for the bucket hasher.
//!
//! The memory only needs a deterministic integer per text. Three reference
//! implementations are provided:
//! - `CharSumEmbedding`: sum of Unicode scalar values (cheap, no semantics)
//! - `ProjectionEmbedding`: random-projection LSH over any `VectorEmbedder`
//! - `HashedTokenEmbedder`: offline feature-hashing vectors to feed it

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::{CollaboratorError, CollaboratorResult, MemoryError, MemoryResult};
use crate::hasher::Signature;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Text → integer signature.
///
/// Guarantees:
/// - Equal texts yield equal signatures.
/// - Any `i64` may be returned, including negatives; the hasher normalizes.
#[async_trait]
pub trait EmbeddingSource: Send + Sync {
    async fn embed(&self, text: &str) -> CollaboratorResult<Signature>;
}

/// Text → dense vector of a fixed dimension.
#[async_trait]
pub trait VectorEmbedder: Send + Sync {
    /// Length of every vector returned by `embed_vector`.
    fn dimension(&self) -> usize;

    async fn embed_vector(&self, text: &str) -> CollaboratorResult<Vec<f32>>;

    /// One vector per text, in input order. The default embeds texts one at
    /// a time; remote embedders override it with a single batched request.
    async fn embed_vectors(&self, texts: &[String]) -> CollaboratorResult<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed_vector(text).await?);
        }
        Ok(vectors)
    }
}

// ---------------------------------------------------------------------------
// CharSumEmbedding
// ---------------------------------------------------------------------------

/// Signature = sum of the text's Unicode scalar values.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharSumEmbedding;

impl CharSumEmbedding {
    pub fn new() -> Self {
        Self
    }

    pub fn signature(text: &str) -> Signature {
        text.chars()
            .fold(0i64, |acc, c| acc.wrapping_add(i64::from(u32::from(c))))
    }
}

#[async_trait]
impl EmbeddingSource for CharSumEmbedding {
    async fn embed(&self, text: &str) -> CollaboratorResult<Signature> {
        Ok(Self::signature(text))
    }
}

// ---------------------------------------------------------------------------
// HashedTokenEmbedder
// ---------------------------------------------------------------------------

/// Signed feature hashing of lowercase whitespace tokens, L2-normalized.
///
/// Texts that share tokens point in similar directions, which is enough for
/// `ProjectionEmbedding` to co-locate them without a model.
#[derive(Debug, Clone)]
pub struct HashedTokenEmbedder {
    dimension: usize,
}

impl HashedTokenEmbedder {
    pub fn new(dimension: usize) -> MemoryResult<Self> {
        if dimension == 0 {
            return Err(MemoryError::InvalidArgument(
                "embedding dimension must be at least 1".to_string(),
            ));
        }
        Ok(Self { dimension })
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dimension];
        for token in text.to_lowercase().split_whitespace() {
            let digest = Sha256::digest(token.as_bytes());
            let slot = (read_u64(&digest[..8]) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            v[slot] += sign;
        }
        normalize(&mut v);
        v
    }
}

#[async_trait]
impl VectorEmbedder for HashedTokenEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_vector(&self, text: &str) -> CollaboratorResult<Vec<f32>> {
        Ok(self.vectorize(text))
    }
}

// ---------------------------------------------------------------------------
// ProjectionEmbedding
// ---------------------------------------------------------------------------

/// Random-projection LSH: `F(x) = argmax([xR; -xR])`.
///
/// `R` is a `dimension × planes` matrix derived from `seed`, so two processes
/// with the same seed agree on every signature. Signatures fall in
/// `[0, 2 * planes)`; ties resolve to the lowest index.
pub struct ProjectionEmbedding {
    embedder: Arc<dyn VectorEmbedder>,
    planes: usize,
    seed: u64,
    /// Row-major: `projection[row * planes + plane]`.
    projection: Vec<f32>,
}

impl ProjectionEmbedding {
    pub fn new(embedder: Arc<dyn VectorEmbedder>, planes: usize, seed: u64) -> MemoryResult<Self> {
        if planes == 0 {
            return Err(MemoryError::InvalidArgument(
                "projection needs at least one plane".to_string(),
            ));
        }
        let dimension = embedder.dimension();
        if dimension == 0 {
            return Err(MemoryError::InvalidArgument(
                "vector embedder reports dimension 0".to_string(),
            ));
        }

        let mut projection = Vec::with_capacity(dimension * planes);
        for row in 0..dimension {
            for plane in 0..planes {
                projection.push(projection_coefficient(seed, row, plane));
            }
        }

        Ok(Self {
            embedder,
            planes,
            seed,
            projection,
        })
    }

    /// Number of distinct signatures this projection can produce.
    pub fn signature_range(&self) -> usize {
        self.planes * 2
    }

    fn project(&self, v: &[f32]) -> Signature {
        let mut best_index = 0usize;
        let mut best_value = f32::NEG_INFINITY;

        let mut projected = vec![0f32; self.planes];
        for (row, x) in v.iter().enumerate() {
            let coefficients = &self.projection[row * self.planes..(row + 1) * self.planes];
            for (acc, r) in projected.iter_mut().zip(coefficients) {
                *acc += x * r;
            }
        }

        let both_signs = projected
            .iter()
            .copied()
            .chain(projected.iter().map(|p| -p));
        for (index, value) in both_signs.enumerate() {
            if value > best_value {
                best_value = value;
                best_index = index;
            }
        }
        best_index as Signature
    }
}

impl std::fmt::Debug for ProjectionEmbedding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectionEmbedding")
            .field("dimension", &self.embedder.dimension())
            .field("planes", &self.planes)
            .field("seed", &self.seed)
            .finish()
    }
}

#[async_trait]
impl EmbeddingSource for ProjectionEmbedding {
    async fn embed(&self, text: &str) -> CollaboratorResult<Signature> {
        let v = self.embedder.embed_vector(text).await?;
        let expected = self.embedder.dimension();
        if v.len() != expected {
            return Err(CollaboratorError::Embedding(format!(
                "vector has {} dimensions, projection expects {expected}",
                v.len()
            )));
        }
        Ok(self.project(&v))
    }
}

fn projection_coefficient(seed: u64, row: usize, plane: usize) -> f32 {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_le_bytes());
    hasher.update((row as u64).to_le_bytes());
    hasher.update((plane as u64).to_le_bytes());
    let digest = hasher.finalize();
    let unit = read_u64(&digest[..8]) as f64 / u64::MAX as f64;
    (unit * 2.0 - 1.0) as f32
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}

pub(crate) fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_char_sum_matches_code_points() {
        let e = CharSumEmbedding::new();
        assert_eq!(e.embed("").await.unwrap(), 0);
        assert_eq!(e.embed("ab").await.unwrap(), 97 + 98);
        assert_eq!(e.embed("é").await.unwrap(), 0xE9);
    }

    #[tokio::test]
    async fn test_char_sum_deterministic() {
        let e = CharSumEmbedding::new();
        let a = e.embed("The capital of China is Beijing.").await.unwrap();
        let b = e.embed("The capital of China is Beijing.").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_hashed_tokens_normalized_and_case_insensitive() {
        let e = HashedTokenEmbedder::new(32).unwrap();
        let a = e.embed_vector("John works as an actor.").await.unwrap();
        let b = e.embed_vector("JOHN works AS an actor.").await.unwrap();
        assert_eq!(a.len(), 32);
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_hashed_tokens_empty_text_is_zero_vector() {
        let e = HashedTokenEmbedder::new(8).unwrap();
        let v = e.embed_vector("   ").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn test_default_batch_matches_single_embeds() {
        let e = HashedTokenEmbedder::new(16).unwrap();
        let inputs = vec!["John works as an actor.".to_string(), String::new()];
        let batch = e.embed_vectors(&inputs).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], e.embed_vector(&inputs[0]).await.unwrap());
        assert_eq!(batch[1], e.embed_vector(&inputs[1]).await.unwrap());
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(HashedTokenEmbedder::new(0).is_err());
    }

    #[tokio::test]
    async fn test_projection_signature_in_range_and_stable() {
        let vectors = Arc::new(HashedTokenEmbedder::new(64).unwrap());
        let p = ProjectionEmbedding::new(vectors, 4, 7).unwrap();
        for text in ["Mike works as a teacher.", "", "The Little Prince"] {
            let s = p.embed(text).await.unwrap();
            assert!((0..8).contains(&s));
            assert_eq!(s, p.embed(text).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_projection_same_seed_agrees() {
        let vectors = Arc::new(HashedTokenEmbedder::new(64).unwrap());
        let a = ProjectionEmbedding::new(vectors.clone(), 5, 99).unwrap();
        let b = ProjectionEmbedding::new(vectors, 5, 99).unwrap();
        let text = "Recommend book is \"The Little Prince\".";
        assert_eq!(a.embed(text).await.unwrap(), b.embed(text).await.unwrap());
    }

    #[tokio::test]
    async fn test_projection_zero_vector_picks_first_index() {
        let vectors = Arc::new(HashedTokenEmbedder::new(16).unwrap());
        let p = ProjectionEmbedding::new(vectors, 3, 1).unwrap();
        assert_eq!(p.embed("").await.unwrap(), 0);
    }

    struct WrongDimension;

    #[async_trait]
    impl VectorEmbedder for WrongDimension {
        fn dimension(&self) -> usize {
            4
        }

        async fn embed_vector(&self, _text: &str) -> CollaboratorResult<Vec<f32>> {
            Ok(vec![1.0, 2.0])
        }
    }

    #[tokio::test]
    async fn test_projection_rejects_dimension_mismatch() {
        let p = ProjectionEmbedding::new(Arc::new(WrongDimension), 2, 0).unwrap();
        let err = p.embed("anything").await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Embedding(_)));
    }

    #[test]
    fn test_projection_requires_planes() {
        let vectors = Arc::new(HashedTokenEmbedder::new(4).unwrap());
        assert!(ProjectionEmbedding::new(vectors, 0, 0).is_err());
    }
}
