//! Recall, respond, post-think, insert: one agent turn over a memory.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{MemoryError, MemoryResult};
use crate::hasher::BucketId;
use crate::oracle::Responder;
use crate::store::ThoughtMemory;

/// Record of one completed turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub query: String,
    pub recalled: Vec<String>,
    pub response: String,
    /// Thought distilled after answering; `None` when nothing was stored.
    pub thought: Option<String>,
    /// Bucket the thought went to.
    pub bucket: Option<BucketId>,
    pub at: DateTime<Utc>,
}

/// Drives a `Responder` against a `ThoughtMemory`.
pub struct ThinkInMemory {
    memory: Arc<ThoughtMemory>,
    responder: Arc<dyn Responder>,
    top_k: usize,
}

impl ThinkInMemory {
    /// Uses the memory's configured `default_top_k`.
    pub fn new(memory: Arc<ThoughtMemory>, responder: Arc<dyn Responder>) -> Self {
        let top_k = memory.config().default_top_k;
        Self {
            memory,
            responder,
            top_k,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn memory(&self) -> &Arc<ThoughtMemory> {
        &self.memory
    }

    /// Run one turn. A failing collaborator aborts the turn before the
    /// thought is inserted.
    pub async fn turn(&self, query: &str) -> MemoryResult<Turn> {
        let recalled = self.memory.recall(query, self.top_k).await?;
        debug!(event = "turn.recalled", memory_id = %self.memory.id(), recalled = recalled.len());

        let response = self
            .responder
            .respond(query, &recalled)
            .await
            .map_err(MemoryError::from)?;

        let thought = self
            .responder
            .post_think(query, &response)
            .await
            .map_err(MemoryError::from)?
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let bucket = match &thought {
            Some(text) => Some(self.memory.insert(text).await?.bucket),
            None => None,
        };

        info!(
            event = "turn.completed",
            memory_id = %self.memory.id(),
            recalled = recalled.len(),
            stored = thought.is_some(),
        );

        Ok(Turn {
            query: query.to_string(),
            recalled,
            response,
            thought,
            bucket,
            at: Utc::now(),
        })
    }
}
