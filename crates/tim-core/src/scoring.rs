//! Fine-stage relevance scoring strategies for recall.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::embedding::VectorEmbedder;
use crate::error::{CollaboratorError, CollaboratorResult};

/// Scores every thought of a bucket against a query. Higher is more relevant.
///
/// Must return exactly one score per thought, in input order.
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    fn name(&self) -> &str;

    async fn score(&self, query: &str, thoughts: &[String]) -> CollaboratorResult<Vec<f64>>;
}

/// A recalled thought with its score and insertion position in the bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredThought {
    pub text: String,
    pub score: f64,
    pub position: usize,
}

/// Rank by score (descending), then by position (later insertion wins), and
/// keep the first `top_k`.
pub fn rank(thoughts: Vec<String>, scores: Vec<f64>, top_k: usize) -> CollaboratorResult<Vec<ScoredThought>> {
    if scores.len() != thoughts.len() {
        return Err(CollaboratorError::Scoring(format!(
            "scorer returned {} scores for {} thoughts",
            scores.len(),
            thoughts.len()
        )));
    }

    let mut scored: Vec<ScoredThought> = thoughts
        .into_iter()
        .zip(scores)
        .enumerate()
        .map(|(position, (text, score))| ScoredThought {
            text,
            score,
            position,
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.position.cmp(&a.position))
    });
    scored.truncate(top_k);
    Ok(scored)
}

// ---------------------------------------------------------------------------
// TokenOverlapScorer
// ---------------------------------------------------------------------------

/// Size of the intersection of lowercase whitespace-split token sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenOverlapScorer;

impl TokenOverlapScorer {
    pub fn tokens(text: &str) -> HashSet<String> {
        text.to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    pub fn overlap(query_tokens: &HashSet<String>, thought: &str) -> usize {
        Self::tokens(thought)
            .iter()
            .filter(|t| query_tokens.contains(*t))
            .count()
    }
}

#[async_trait]
impl RelevanceScorer for TokenOverlapScorer {
    fn name(&self) -> &str {
        "token_overlap"
    }

    async fn score(&self, query: &str, thoughts: &[String]) -> CollaboratorResult<Vec<f64>> {
        let query_tokens = Self::tokens(query);
        Ok(thoughts
            .iter()
            .map(|t| Self::overlap(&query_tokens, t) as f64)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// EmbeddingSimilarityScorer
// ---------------------------------------------------------------------------

/// Cosine similarity between query and thought vectors.
pub struct EmbeddingSimilarityScorer {
    embedder: Arc<dyn VectorEmbedder>,
}

impl EmbeddingSimilarityScorer {
    pub fn new(embedder: Arc<dyn VectorEmbedder>) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl RelevanceScorer for EmbeddingSimilarityScorer {
    fn name(&self) -> &str {
        "embedding_cosine"
    }

    async fn score(&self, query: &str, thoughts: &[String]) -> CollaboratorResult<Vec<f64>> {
        let mut inputs = Vec::with_capacity(thoughts.len() + 1);
        inputs.push(query.to_string());
        inputs.extend_from_slice(thoughts);

        let vectors = self
            .embedder
            .embed_vectors(&inputs)
            .await
            .map_err(|e| CollaboratorError::Scoring(e.to_string()))?;
        if vectors.len() != inputs.len() {
            return Err(CollaboratorError::Scoring(format!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                inputs.len()
            )));
        }

        let (q, rest) = vectors.split_at(1);
        rest.iter().map(|v| cosine(&q[0], v)).collect()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> CollaboratorResult<f64> {
    if a.len() != b.len() {
        return Err(CollaboratorError::Scoring(format!(
            "vector length mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    let (mut dot, mut na, mut nb) = (0f64, 0f64, 0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (na.sqrt() * nb.sqrt()))
}
