//! Thought oracle and responder collaborator traits.
//!
//! The oracle owns every language-understanding decision the memory needs:
//! which thoughts are obsolete and how a group of thoughts should be phrased
//! after merging. The memory only applies those decisions structurally.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::CollaboratorResult;

/// Forget and merge decisions over one bucket's thoughts.
///
/// Implementations used with `organize` should be deterministic: feeding a
/// bucket's post-organize content back in must not change it further.
#[async_trait]
pub trait ThoughtOracle: Send + Sync {
    /// Return the thoughts that are obsolete or contradicted by others in the
    /// group. Texts not present in `thoughts` are ignored by the caller.
    async fn identify_obsolete(&self, thoughts: &[String]) -> CollaboratorResult<HashSet<String>>;

    /// Return the full replacement for `thoughts` after merging redundant
    /// statements. Untouched thoughts must be carried over.
    async fn merge_group(&self, thoughts: &[String]) -> CollaboratorResult<Vec<String>>;
}

/// Generates answers from recalled thoughts and distills new thoughts from a
/// finished exchange.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, query: &str, recalled: &[String]) -> CollaboratorResult<String>;

    /// The inductive thought for a query/response pair, or `None` when the
    /// exchange holds nothing worth remembering.
    async fn post_think(&self, query: &str, response: &str) -> CollaboratorResult<Option<String>>;
}

/// Oracle that never forgets and never merges.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepAllOracle;

#[async_trait]
impl ThoughtOracle for KeepAllOracle {
    async fn identify_obsolete(&self, _thoughts: &[String]) -> CollaboratorResult<HashSet<String>> {
        Ok(HashSet::new())
    }

    async fn merge_group(&self, thoughts: &[String]) -> CollaboratorResult<Vec<String>> {
        Ok(thoughts.to_vec())
    }
}
