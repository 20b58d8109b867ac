//! `tim.toml` loading and collaborator wiring.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tim_core::{
    CharSumEmbedding, EmbeddingSource, HashedTokenEmbedder, KeepAllOracle, MemoryConfig,
    ProjectionEmbedding, Responder, ThoughtMemory, ThoughtOracle, VectorEmbedder,
};
use tim_llm::{ChatClient, LlmConfig, LlmEmbedder, LlmOracle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingKind {
    /// Sum of code points; no vectors involved.
    #[default]
    CharSum,
    /// Random-projection LSH over a vector embedder.
    Projection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorSource {
    #[default]
    Hashed,
    Llm,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub kind: EmbeddingKind,
    pub dimension: usize,
    pub planes: usize,
    pub seed: u64,
    pub source: VectorSource,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            kind: EmbeddingKind::CharSum,
            dimension: 256,
            planes: 8,
            seed: 0,
            source: VectorSource::Hashed,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimConfig {
    pub memory: MemoryConfig,
    pub embedding: EmbeddingConfig,
    pub llm: Option<LlmConfig>,
}

impl TimConfig {
    /// Read `path`, or fall back to defaults with `TIM_*` overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                Self::parse(&text).with_context(|| format!("Invalid config {}", path.display()))?
            }
            None => Self {
                memory: MemoryConfig::from_env().context("Invalid TIM_* environment")?,
                ..Self::default()
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.memory.validate()?;
        if self.embedding.kind == EmbeddingKind::Projection
            && self.embedding.source == VectorSource::Llm
            && self.llm.is_none()
        {
            bail!("embedding.source = \"llm\" requires an [llm] section");
        }
        if let Some(llm) = &self.llm {
            llm.validate()?;
        }
        Ok(())
    }

    /// Build the memory and, when `[llm]` is present, a responder for `ask`.
    pub fn build(&self) -> Result<Collaborators> {
        let client = match &self.llm {
            Some(llm) => Some(Arc::new(
                ChatClient::new(llm.clone()).context("Failed to set up LLM client")?,
            )),
            None => None,
        };

        let (embedder, signature_range) = self.embedding_source(client.as_ref())?;
        let (oracle, responder) = match &client {
            Some(client) => {
                let llm = Arc::new(LlmOracle::new(client.clone()));
                let oracle: Arc<dyn ThoughtOracle> = llm.clone();
                let responder: Arc<dyn Responder> = llm;
                (oracle, Some(responder))
            }
            None => {
                let oracle: Arc<dyn ThoughtOracle> = Arc::new(KeepAllOracle);
                (oracle, None)
            }
        };

        let memory = ThoughtMemory::new(self.memory.clone(), embedder, oracle)?;
        let num_buckets = memory.num_buckets();
        let reachable_buckets = signature_range.map_or(num_buckets, |range| range.min(num_buckets));
        if reachable_buckets < num_buckets {
            warn!(
                event = "memory.unreachable_buckets",
                num_buckets,
                reachable_buckets,
                "projection yields fewer signatures than buckets; raise embedding.planes"
            );
        }
        info!(
            event = "memory.created",
            memory_id = %memory.id(),
            num_buckets,
            reachable_buckets,
            embedding = ?self.embedding.kind,
            llm = client.is_some(),
        );
        Ok(Collaborators {
            memory: Arc::new(memory),
            responder,
            reachable_buckets,
        })
    }

    /// The embedding source plus how many distinct signatures it can emit,
    /// when that is bounded.
    fn embedding_source(
        &self,
        client: Option<&Arc<ChatClient>>,
    ) -> Result<(Arc<dyn EmbeddingSource>, Option<usize>)> {
        let cfg = &self.embedding;
        if cfg.kind == EmbeddingKind::CharSum {
            return Ok((Arc::new(CharSumEmbedding::new()), None));
        }

        let vectors: Arc<dyn VectorEmbedder> = match (cfg.source, client) {
            (VectorSource::Hashed, _) => Arc::new(HashedTokenEmbedder::new(cfg.dimension)?),
            (VectorSource::Llm, Some(client)) => Arc::new(LlmEmbedder::new(client.clone(), cfg.dimension)),
            (VectorSource::Llm, None) => bail!("embedding.source = \"llm\" requires an [llm] section"),
        };
        let projection = ProjectionEmbedding::new(vectors, cfg.planes, cfg.seed)?;
        let range = projection.signature_range();
        Ok((Arc::new(projection), Some(range)))
    }
}

/// Everything a session needs.
pub struct Collaborators {
    pub memory: Arc<ThoughtMemory>,
    pub responder: Option<Arc<dyn Responder>>,
    /// Buckets the embedding source can actually hash into.
    pub reachable_buckets: usize,
}
