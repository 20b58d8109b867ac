//! Structured observability hooks for memory operations.
//!
//! Events are emitted at `debug!`/`info!` level with an `event` field; the
//! `memory_id` field tells instances apart when several share a process.

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::hasher::BucketId;
use crate::reconcile::OrganizeMode;

/// Span covering one reconciliation pass. Attach it with
/// `tracing::Instrument` so it follows the future across awaits.
pub fn organize_span(memory_id: Uuid, bucket: BucketId, mode: OrganizeMode) -> tracing::Span {
    tracing::info_span!(
        "tim.organize",
        memory_id = %memory_id,
        bucket = bucket,
        mode = %mode,
    )
}

pub fn emit_thought_inserted(memory_id: Uuid, bucket: BucketId, bucket_len: usize) {
    debug!(
        event = "thought.inserted",
        memory_id = %memory_id,
        bucket = bucket,
        bucket_len = bucket_len,
    );
}

pub fn emit_duplicate_skipped(memory_id: Uuid, bucket: BucketId) {
    debug!(event = "thought.duplicate", memory_id = %memory_id, bucket = bucket);
}

pub fn emit_recall(memory_id: Uuid, bucket: BucketId, candidates: usize, returned: usize, scorer: &str) {
    debug!(
        event = "thought.recalled",
        memory_id = %memory_id,
        bucket = bucket,
        candidates = candidates,
        returned = returned,
        scorer = %scorer,
    );
}

pub fn emit_organized(
    memory_id: Uuid,
    bucket: BucketId,
    mode: OrganizeMode,
    before: usize,
    after: usize,
    forgotten: usize,
) {
    info!(
        event = "bucket.organized",
        memory_id = %memory_id,
        bucket = bucket,
        mode = %mode,
        before = before,
        after = after,
        forgotten = forgotten,
    );
}

/// Warn-level: a collaborator failed and the operation was abandoned.
pub fn emit_collaborator_failure(memory_id: Uuid, operation: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "collaborator.failed",
        memory_id = %memory_id,
        operation = %operation,
        error = %error,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_organize_span_create() {
        let span = organize_span(Uuid::new_v4(), 3, OrganizeMode::All);
        let _entered = span.enter();
    }
}
