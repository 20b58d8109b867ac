//! The bucketed thought memory.
//!
//! `ThoughtMemory` owns a fixed vector of buckets. Each bucket has its own
//! `RwLock`, so operations on different buckets never contend, plus an
//! organize gate that serializes reconciliation passes on the same bucket.
//!
//! Collaborators (embedding source, scorer, oracle) are always called before
//! the bucket's write lock is taken, except under `OracleLockPolicy::Hold`.
//! A collaborator failure therefore never leaves a bucket half-edited.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{MemoryConfig, OracleLockPolicy};
use crate::embedding::EmbeddingSource;
use crate::error::{CollaboratorError, MemoryError, MemoryResult};
use crate::hasher::{BucketHasher, BucketId};
use crate::metrics::MemoryMetrics;
use crate::obs;
use crate::oracle::ThoughtOracle;
use crate::reconcile::{apply_forget, apply_merge, splice_tail, OrganizeMode};
use crate::scoring::{rank, RelevanceScorer, ScoredThought, TokenOverlapScorer};

#[derive(Debug, Default)]
struct BucketSlot {
    thoughts: RwLock<Vec<String>>,
    organize_gate: Mutex<()>,
}

/// Where an insert landed and whether it added anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insertion {
    pub bucket: BucketId,
    /// False when the exact text was already in the bucket.
    pub inserted: bool,
}

/// Outcome of one `organize` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizeReport {
    pub bucket: BucketId,
    pub mode: OrganizeMode,
    /// Out-of-range or empty bucket; nothing was done.
    pub skipped: bool,
    pub before: usize,
    pub after: usize,
    pub forgotten: Vec<String>,
    /// The merge step changed the bucket content.
    pub merged: bool,
    /// Thoughts inserted while the oracle was running, appended after the
    /// reconciled content.
    pub concurrent_inserts: usize,
}

impl OrganizeReport {
    fn skipped(bucket: BucketId, mode: OrganizeMode, before: usize) -> Self {
        Self {
            bucket,
            mode,
            skipped: true,
            before,
            after: before,
            forgotten: Vec::new(),
            merged: false,
            concurrent_inserts: 0,
        }
    }

    pub fn changed(&self) -> bool {
        !self.forgotten.is_empty() || self.merged
    }
}

/// Summary of the whole memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub memory_id: Uuid,
    pub num_buckets: usize,
    pub total_thoughts: usize,
    pub non_empty_buckets: usize,
    /// `(bucket, len)` of the fullest bucket; lowest id wins ties.
    pub largest_bucket: Option<(BucketId, usize)>,
    pub taken_at: DateTime<Utc>,
}

/// One non-empty bucket in a `dump`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketDump {
    pub bucket: BucketId,
    pub thoughts: Vec<String>,
}

struct ReconcilePlan {
    result: Vec<String>,
    forgotten: Vec<String>,
    merged: bool,
    merged_away: usize,
}

/// Long-term memory of condensed thoughts, partitioned into buckets by a
/// locality-sensitive signature.
pub struct ThoughtMemory {
    id: Uuid,
    config: MemoryConfig,
    hasher: BucketHasher,
    buckets: Vec<BucketSlot>,
    embedder: Arc<dyn EmbeddingSource>,
    oracle: Arc<dyn ThoughtOracle>,
    scorer: Arc<dyn RelevanceScorer>,
    metrics: MemoryMetrics,
}

impl std::fmt::Debug for ThoughtMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThoughtMemory")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("scorer", &self.scorer.name())
            .finish()
    }
}

impl ThoughtMemory {
    /// Create an empty memory. Every bucket in `[0, num_buckets)` exists from
    /// the start. Recall ranks with `TokenOverlapScorer` unless replaced via
    /// [`ThoughtMemory::with_scorer`].
    pub fn new(
        config: MemoryConfig,
        embedder: Arc<dyn EmbeddingSource>,
        oracle: Arc<dyn ThoughtOracle>,
    ) -> MemoryResult<Self> {
        config.validate()?;
        let hasher = BucketHasher::new(config.num_buckets)?;
        let buckets = (0..hasher.num_buckets())
            .map(|_| BucketSlot::default())
            .collect();

        Ok(Self {
            id: Uuid::new_v4(),
            config,
            hasher,
            buckets,
            embedder,
            oracle,
            scorer: Arc::new(TokenOverlapScorer),
            metrics: MemoryMetrics::new(),
        })
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn RelevanceScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn num_buckets(&self) -> usize {
        self.hasher.num_buckets()
    }

    pub fn metrics(&self) -> &MemoryMetrics {
        &self.metrics
    }

    /// Bucket a text hashes to.
    pub async fn bucket_of_text(&self, text: &str) -> MemoryResult<BucketId> {
        self.locate(text, "locate").await
    }

    /// Append a thought to its bucket. Inserting a text already present in
    /// that bucket is a no-op.
    pub async fn insert(&self, text: &str) -> MemoryResult<Insertion> {
        let bucket = self.locate(text, "insert").await?;
        let mut thoughts = self.buckets[bucket].thoughts.write().await;

        if thoughts.iter().any(|t| t == text) {
            drop(thoughts);
            self.metrics.inc_duplicate_inserts();
            obs::emit_duplicate_skipped(self.id, bucket);
            return Ok(Insertion {
                bucket,
                inserted: false,
            });
        }

        thoughts.push(text.to_string());
        let bucket_len = thoughts.len();
        drop(thoughts);

        self.metrics.inc_inserts();
        obs::emit_thought_inserted(self.id, bucket, bucket_len);
        Ok(Insertion {
            bucket,
            inserted: true,
        })
    }

    /// Up to `top_k` thoughts from the query's bucket, most relevant first.
    pub async fn recall(&self, query: &str, top_k: usize) -> MemoryResult<Vec<String>> {
        self.recall_with(query, top_k, self.scorer.as_ref()).await
    }

    /// `recall` with an explicit scoring strategy.
    pub async fn recall_with(
        &self,
        query: &str,
        top_k: usize,
        scorer: &dyn RelevanceScorer,
    ) -> MemoryResult<Vec<String>> {
        let ranked = self.recall_ranked(query, top_k, scorer).await?;
        Ok(ranked.into_iter().map(|s| s.text).collect())
    }

    /// `recall` returning scores and bucket positions.
    pub async fn recall_scored(&self, query: &str, top_k: usize) -> MemoryResult<Vec<ScoredThought>> {
        self.recall_ranked(query, top_k, self.scorer.as_ref()).await
    }

    async fn recall_ranked(
        &self,
        query: &str,
        top_k: usize,
        scorer: &dyn RelevanceScorer,
    ) -> MemoryResult<Vec<ScoredThought>> {
        let bucket = self.locate(query, "recall").await?;
        let candidates = self.buckets[bucket].thoughts.read().await.clone();
        self.metrics.inc_recalls();

        if candidates.is_empty() || top_k == 0 {
            obs::emit_recall(self.id, bucket, candidates.len(), 0, scorer.name());
            return Ok(Vec::new());
        }

        let candidate_count = candidates.len();
        let scores = scorer
            .score(query, &candidates)
            .await
            .map_err(|e| self.collaborator_failure("recall", e))?;
        let ranked =
            rank(candidates, scores, top_k).map_err(|e| self.collaborator_failure("recall", e))?;

        obs::emit_recall(self.id, bucket, candidate_count, ranked.len(), scorer.name());
        Ok(ranked)
    }

    /// Current content of a bucket, in insertion order.
    pub async fn snapshot(&self, bucket: BucketId) -> MemoryResult<Vec<String>> {
        let slot = self.slot(bucket).ok_or(MemoryError::BucketOutOfRange {
            bucket,
            num_buckets: self.num_buckets(),
        })?;
        Ok(slot.thoughts.read().await.clone())
    }

    /// Run forget and/or merge on one bucket.
    ///
    /// Out-of-range ids and empty buckets are skipped without error. On a
    /// collaborator failure the bucket is left exactly as it was.
    pub async fn organize(&self, bucket: BucketId, mode: OrganizeMode) -> MemoryResult<OrganizeReport> {
        let Some(slot) = self.slot(bucket) else {
            return Ok(OrganizeReport::skipped(bucket, mode, 0));
        };

        let span = obs::organize_span(self.id, bucket, mode);
        async move {
            let _gate = slot.organize_gate.lock().await;
            let report = match self.config.oracle_lock {
                OracleLockPolicy::Release => self.organize_released(slot, bucket, mode).await?,
                OracleLockPolicy::Hold => self.organize_held(slot, bucket, mode).await?,
            };

            if !report.skipped {
                self.metrics.inc_organizes();
                obs::emit_organized(
                    self.id,
                    bucket,
                    mode,
                    report.before,
                    report.after,
                    report.forgotten.len(),
                );
            }
            Ok::<_, MemoryError>(report)
        }
        .instrument(span)
        .await
    }

    /// Organize every bucket concurrently. Returns one report per bucket id,
    /// or the first error in bucket order.
    pub async fn organize_all(&self, mode: OrganizeMode) -> MemoryResult<Vec<OrganizeReport>> {
        let passes = (0..self.num_buckets()).map(|bucket| self.organize(bucket, mode));
        join_all(passes).await.into_iter().collect()
    }

    /// Snapshot, think without the lock, then install the result together
    /// with anything inserted meanwhile.
    async fn organize_released(
        &self,
        slot: &BucketSlot,
        bucket: BucketId,
        mode: OrganizeMode,
    ) -> MemoryResult<OrganizeReport> {
        let snapshot = slot.thoughts.read().await.clone();
        if snapshot.is_empty() {
            return Ok(OrganizeReport::skipped(bucket, mode, 0));
        }

        let mut plan = self.plan(&snapshot, mode).await?;

        let mut thoughts = slot.thoughts.write().await;
        let (next, appended) = splice_tail(std::mem::take(&mut plan.result), &thoughts, snapshot.len());
        *thoughts = next;
        let after = thoughts.len();
        drop(thoughts);

        Ok(self.finish(bucket, mode, snapshot.len(), after, plan, appended))
    }

    /// Think while holding the write lock.
    async fn organize_held(
        &self,
        slot: &BucketSlot,
        bucket: BucketId,
        mode: OrganizeMode,
    ) -> MemoryResult<OrganizeReport> {
        let mut thoughts = slot.thoughts.write().await;
        if thoughts.is_empty() {
            return Ok(OrganizeReport::skipped(bucket, mode, 0));
        }

        let before = thoughts.len();
        let mut plan = self.plan(&thoughts, mode).await?;
        *thoughts = std::mem::take(&mut plan.result);
        let after = thoughts.len();
        drop(thoughts);

        Ok(self.finish(bucket, mode, before, after, plan, 0))
    }

    async fn plan(&self, snapshot: &[String], mode: OrganizeMode) -> MemoryResult<ReconcilePlan> {
        let mut current = snapshot.to_vec();
        let mut forgotten = Vec::new();

        if mode.forgets() {
            let candidates = self
                .oracle
                .identify_obsolete(&current)
                .await
                .map_err(|e| self.collaborator_failure("organize.forget", e))?;
            let outcome = apply_forget(&current, &candidates);
            current = outcome.kept;
            forgotten = outcome.forgotten;
        }

        let mut merged = false;
        let mut merged_away = 0;
        if mode.merges() && !current.is_empty() {
            let output = self
                .oracle
                .merge_group(&current)
                .await
                .map_err(|e| self.collaborator_failure("organize.merge", e))?;
            let output = apply_merge(output);
            merged = output != current;
            merged_away = current.len().saturating_sub(output.len());
            current = output;
        }

        Ok(ReconcilePlan {
            result: current,
            forgotten,
            merged,
            merged_away,
        })
    }

    fn finish(
        &self,
        bucket: BucketId,
        mode: OrganizeMode,
        before: usize,
        after: usize,
        plan: ReconcilePlan,
        concurrent_inserts: usize,
    ) -> OrganizeReport {
        self.metrics.add_forgotten(plan.forgotten.len() as u64);
        self.metrics.add_merged_away(plan.merged_away as u64);
        OrganizeReport {
            bucket,
            mode,
            skipped: false,
            before,
            after,
            forgotten: plan.forgotten,
            merged: plan.merged,
            concurrent_inserts,
        }
    }

    /// Counts across all buckets.
    pub async fn stats(&self) -> MemoryStats {
        let mut total_thoughts = 0;
        let mut non_empty_buckets = 0;
        let mut largest_bucket: Option<(BucketId, usize)> = None;

        for (bucket, slot) in self.buckets.iter().enumerate() {
            let len = slot.thoughts.read().await.len();
            total_thoughts += len;
            if len > 0 {
                non_empty_buckets += 1;
                if largest_bucket.map_or(true, |(_, best)| len > best) {
                    largest_bucket = Some((bucket, len));
                }
            }
        }

        MemoryStats {
            memory_id: self.id,
            num_buckets: self.num_buckets(),
            total_thoughts,
            non_empty_buckets,
            largest_bucket,
            taken_at: Utc::now(),
        }
    }

    /// Every non-empty bucket, in bucket id order.
    pub async fn dump(&self) -> Vec<BucketDump> {
        let mut out = Vec::new();
        for (bucket, slot) in self.buckets.iter().enumerate() {
            let thoughts = slot.thoughts.read().await.clone();
            if !thoughts.is_empty() {
                out.push(BucketDump { bucket, thoughts });
            }
        }
        out
    }

    fn slot(&self, bucket: BucketId) -> Option<&BucketSlot> {
        self.buckets.get(bucket)
    }

    async fn locate(&self, text: &str, operation: &str) -> MemoryResult<BucketId> {
        let signature = self
            .embedder
            .embed(text)
            .await
            .map_err(|e| self.collaborator_failure(operation, e))?;
        Ok(self.hasher.bucket_of(signature))
    }

    fn collaborator_failure(&self, operation: &str, err: CollaboratorError) -> MemoryError {
        self.metrics.inc_collaborator_failures();
        obs::emit_collaborator_failure(self.id, operation, &err);
        MemoryError::Collaborator(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::CharSumEmbedding;
    use crate::oracle::KeepAllOracle;

    fn memory(num_buckets: usize) -> ThoughtMemory {
        ThoughtMemory::new(
            MemoryConfig::default().with_num_buckets(num_buckets),
            Arc::new(CharSumEmbedding),
            Arc::new(KeepAllOracle),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_all_buckets_exist_from_start() {
        let m = memory(4);
        assert_eq!(m.num_buckets(), 4);
        for b in 0..4 {
            assert!(m.snapshot(b).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_zero_buckets_rejected() {
        let err = ThoughtMemory::new(
            MemoryConfig::default().with_num_buckets(0),
            Arc::new(CharSumEmbedding),
            Arc::new(KeepAllOracle),
        )
        .unwrap_err();
        assert!(matches!(err, MemoryError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_insert_lands_in_char_sum_bucket() {
        let m = memory(5);
        let text = "The capital of China is Beijing.";
        let expected = (CharSumEmbedding::signature(text) % 5) as usize;
        let ins = m.insert(text).await.unwrap();
        assert_eq!(ins.bucket, expected);
        assert!(ins.inserted);
        assert_eq!(m.snapshot(expected).await.unwrap(), vec![text.to_string()]);
        assert_eq!(m.bucket_of_text(text).await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_empty_string_is_a_thought() {
        let m = memory(3);
        let ins = m.insert("").await.unwrap();
        assert_eq!(ins.bucket, 0);
        assert_eq!(m.snapshot(0).await.unwrap(), vec![String::new()]);
    }

    #[tokio::test]
    async fn test_snapshot_out_of_range_is_strict() {
        let m = memory(3);
        let err = m.snapshot(3).await.unwrap_err();
        assert!(matches!(
            err,
            MemoryError::BucketOutOfRange {
                bucket: 3,
                num_buckets: 3
            }
        ));
    }

    #[tokio::test]
    async fn test_organize_out_of_range_is_skipped() {
        let m = memory(3);
        let report = m.organize(99, OrganizeMode::All).await.unwrap();
        assert!(report.skipped);
        assert!(!report.changed());
        assert_eq!(m.metrics().snapshot().organizes, 0);
    }

    #[tokio::test]
    async fn test_stats_and_dump() {
        let m = memory(1);
        m.insert("a").await.unwrap();
        m.insert("b").await.unwrap();
        m.insert("a").await.unwrap();

        let stats = m.stats().await;
        assert_eq!(stats.memory_id, m.id());
        assert_eq!(stats.total_thoughts, 2);
        assert_eq!(stats.non_empty_buckets, 1);
        assert_eq!(stats.largest_bucket, Some((0, 2)));

        let dump = m.dump().await;
        assert_eq!(dump.len(), 1);
        assert_eq!(dump[0].thoughts, vec!["a".to_string(), "b".to_string()]);

        let metrics = m.metrics().snapshot();
        assert_eq!(metrics.inserts, 2);
        assert_eq!(metrics.duplicate_inserts, 1);
    }

    #[tokio::test]
    async fn test_recall_top_k_zero_is_empty() {
        let m = memory(1);
        m.insert("Mike works as a teacher.").await.unwrap();
        assert!(m.recall("Mike", 0).await.unwrap().is_empty());
    }
}
