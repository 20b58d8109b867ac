//! Offline copy of one memory into another with a different layout.
//!
//! The bucket count of a live memory never changes. To re-bucket, build a
//! fresh memory with the new hasher or embedding source and copy into it.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::MemoryResult;
use crate::store::ThoughtMemory;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebucketReport {
    /// Thoughts newly inserted into the target.
    pub copied: usize,
    /// Thoughts the target already held in their bucket.
    pub duplicates: usize,
    /// Non-empty buckets in the target afterwards.
    pub buckets: usize,
}

/// Copy every thought of `source` into `target`, bucket by bucket in id
/// order and in insertion order within a bucket.
///
/// Stops at the first failing insert; thoughts copied before it stay in
/// `target`.
pub async fn rebucket(source: &ThoughtMemory, target: &ThoughtMemory) -> MemoryResult<RebucketReport> {
    let mut report = RebucketReport::default();

    for dump in source.dump().await {
        for thought in &dump.thoughts {
            if target.insert(thought).await?.inserted {
                report.copied += 1;
            } else {
                report.duplicates += 1;
            }
        }
    }

    report.buckets = target.stats().await.non_empty_buckets;
    info!(
        event = "memory.rebucketed",
        source = %source.id(),
        target = %target.id(),
        from_buckets = source.num_buckets(),
        to_buckets = target.num_buckets(),
        copied = report.copied,
        duplicates = report.duplicates,
    );
    Ok(report)
}
