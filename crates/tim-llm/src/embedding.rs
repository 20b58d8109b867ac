//! `VectorEmbedder` over an embeddings endpoint.

use std::sync::Arc;

use async_trait::async_trait;

use tim_core::{CollaboratorResult, VectorEmbedder};

use crate::client::EmbeddingModel;
use crate::error::LlmError;

/// Checks every vector length against the configured dimension, so a model
/// swap cannot silently reshape buckets. Batches go out as one request.
#[derive(Clone)]
pub struct LlmEmbedder {
    model: Arc<dyn EmbeddingModel>,
    dimension: usize,
}

impl LlmEmbedder {
    pub fn new(model: Arc<dyn EmbeddingModel>, dimension: usize) -> Self {
        Self { model, dimension }
    }

    fn check_dimension(&self, vector: &[f32]) -> CollaboratorResult<()> {
        if vector.len() != self.dimension {
            return Err(LlmError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            }
            .into_embedding());
        }
        Ok(())
    }
}

#[async_trait]
impl VectorEmbedder for LlmEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_vector(&self, text: &str) -> CollaboratorResult<Vec<f32>> {
        let mut vectors = self
            .model
            .embed(&[text.to_string()])
            .await
            .map_err(LlmError::into_embedding)?;
        let vector = vectors.pop().ok_or_else(|| LlmError::EmptyResponse.into_embedding())?;
        self.check_dimension(&vector)?;
        Ok(vector)
    }

    async fn embed_vectors(&self, texts: &[String]) -> CollaboratorResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self.model.embed(texts).await.map_err(LlmError::into_embedding)?;
        if vectors.len() != texts.len() {
            return Err(LlmError::Parse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            ))
            .into_embedding());
        }
        for vector in &vectors {
            self.check_dimension(vector)?;
        }
        Ok(vectors)
    }
}
