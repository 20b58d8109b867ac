//! In-memory collaborator fakes (testing only)
//!
//! Provides deterministic embedding sources, oracles and a responder that
//! satisfy the collaborator contracts without any model behind them.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::embedding::EmbeddingSource;
use crate::error::{CollaboratorError, CollaboratorResult};
use crate::hasher::Signature;
use crate::oracle::{Responder, ThoughtOracle};

// ---------------------------------------------------------------------------
// FixedEmbedding
// ---------------------------------------------------------------------------

/// Looks signatures up in a table; unknown texts get `default`.
#[derive(Debug, Clone, Default)]
pub struct FixedEmbedding {
    table: HashMap<String, Signature>,
    default: Signature,
}

impl FixedEmbedding {
    /// Every text maps to `signature`.
    pub fn constant(signature: Signature) -> Self {
        Self {
            table: HashMap::new(),
            default: signature,
        }
    }

    pub fn with(mut self, text: &str, signature: Signature) -> Self {
        self.table.insert(text.to_string(), signature);
        self
    }
}

#[async_trait]
impl EmbeddingSource for FixedEmbedding {
    async fn embed(&self, text: &str) -> CollaboratorResult<Signature> {
        Ok(self.table.get(text).copied().unwrap_or(self.default))
    }
}

// ---------------------------------------------------------------------------
// FailingEmbedding
// ---------------------------------------------------------------------------

/// Fails for the listed texts (or for everything when the list is empty)
/// and delegates the rest.
pub struct FailingEmbedding<E> {
    inner: E,
    failing: HashSet<String>,
}

impl<E: EmbeddingSource> FailingEmbedding<E> {
    pub fn always(inner: E) -> Self {
        Self {
            inner,
            failing: HashSet::new(),
        }
    }

    pub fn on(inner: E, texts: &[&str]) -> Self {
        Self {
            inner,
            failing: texts.iter().map(|t| t.to_string()).collect(),
        }
    }
}

#[async_trait]
impl<E: EmbeddingSource> EmbeddingSource for FailingEmbedding<E> {
    async fn embed(&self, text: &str) -> CollaboratorResult<Signature> {
        if self.failing.is_empty() || self.failing.contains(text) {
            return Err(CollaboratorError::Embedding(format!(
                "embedding unavailable for {text:?}"
            )));
        }
        self.inner.embed(text).await
    }
}

// ---------------------------------------------------------------------------
// ScriptedOracle
// ---------------------------------------------------------------------------

/// Oracle driven by fixed rules:
/// - forget: every thought listed via `forgetting` that is in the group
/// - merge: an exact-input lookup table; unmatched groups come back as-is
///
/// Both rules are deterministic, so organizing twice is a no-op.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    obsolete: HashSet<String>,
    merges: HashMap<Vec<String>, Vec<String>>,
    forget_calls: AtomicUsize,
    merge_calls: AtomicUsize,
    seen: Mutex<Vec<Vec<String>>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forgetting(mut self, thoughts: &[&str]) -> Self {
        self.obsolete
            .extend(thoughts.iter().map(|t| t.to_string()));
        self
    }

    pub fn merging(mut self, input: &[&str], output: &[&str]) -> Self {
        self.merges.insert(
            input.iter().map(|t| t.to_string()).collect(),
            output.iter().map(|t| t.to_string()).collect(),
        );
        self
    }

    pub fn forget_calls(&self) -> usize {
        self.forget_calls.load(Ordering::SeqCst)
    }

    pub fn merge_calls(&self) -> usize {
        self.merge_calls.load(Ordering::SeqCst)
    }

    /// Every group the oracle was shown, in call order.
    pub fn seen_groups(&self) -> Vec<Vec<String>> {
        self.seen.lock().map(|g| g.clone()).unwrap_or_default()
    }

    fn record(&self, thoughts: &[String]) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(thoughts.to_vec());
        }
    }
}

#[async_trait]
impl ThoughtOracle for ScriptedOracle {
    async fn identify_obsolete(&self, thoughts: &[String]) -> CollaboratorResult<HashSet<String>> {
        self.forget_calls.fetch_add(1, Ordering::SeqCst);
        self.record(thoughts);
        Ok(thoughts
            .iter()
            .filter(|t| self.obsolete.contains(*t))
            .cloned()
            .collect())
    }

    async fn merge_group(&self, thoughts: &[String]) -> CollaboratorResult<Vec<String>> {
        self.merge_calls.fetch_add(1, Ordering::SeqCst);
        self.record(thoughts);
        Ok(self
            .merges
            .get(thoughts)
            .cloned()
            .unwrap_or_else(|| thoughts.to_vec()))
    }
}

// ---------------------------------------------------------------------------
// FailingOracle
// ---------------------------------------------------------------------------

/// Which oracle capability should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailingStep {
    Forget,
    Merge,
}

/// Wraps an oracle and fails one of its capabilities.
pub struct FailingOracle<O> {
    inner: O,
    step: FailingStep,
}

impl<O: ThoughtOracle> FailingOracle<O> {
    pub fn new(inner: O, step: FailingStep) -> Self {
        Self { inner, step }
    }
}

#[async_trait]
impl<O: ThoughtOracle> ThoughtOracle for FailingOracle<O> {
    async fn identify_obsolete(&self, thoughts: &[String]) -> CollaboratorResult<HashSet<String>> {
        if self.step == FailingStep::Forget {
            return Err(CollaboratorError::Oracle("forget model unavailable".to_string()));
        }
        self.inner.identify_obsolete(thoughts).await
    }

    async fn merge_group(&self, thoughts: &[String]) -> CollaboratorResult<Vec<String>> {
        if self.step == FailingStep::Merge {
            return Err(CollaboratorError::Oracle("merge model unavailable".to_string()));
        }
        self.inner.merge_group(thoughts).await
    }
}

// ---------------------------------------------------------------------------
// EchoResponder
// ---------------------------------------------------------------------------

/// Responds with the recalled thoughts joined together and post-thinks the
/// thought registered for the query, if any.
#[derive(Debug, Default)]
pub struct EchoResponder {
    thoughts: HashMap<String, String>,
}

impl EchoResponder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn thinking(mut self, query: &str, thought: &str) -> Self {
        self.thoughts.insert(query.to_string(), thought.to_string());
        self
    }
}

#[async_trait]
impl Responder for EchoResponder {
    async fn respond(&self, query: &str, recalled: &[String]) -> CollaboratorResult<String> {
        if recalled.is_empty() {
            return Ok(format!("no memory for: {query}"));
        }
        Ok(format!("{query} -> {}", recalled.join("; ")))
    }

    async fn post_think(&self, query: &str, _response: &str) -> CollaboratorResult<Option<String>> {
        Ok(self.thoughts.get(query).cloned())
    }
}
