//! A failing collaborator surfaces as an error and leaves every bucket
//! exactly as it was.

use std::sync::Arc;

use async_trait::async_trait;

use tim_core::fakes::{FailingEmbedding, FailingOracle, FailingStep, FixedEmbedding, ScriptedOracle};
use tim_core::{
    CollaboratorError, CollaboratorResult, KeepAllOracle, MemoryConfig, MemoryError, OracleLockPolicy,
    OrganizeMode, RelevanceScorer, ThoughtMemory, ThoughtOracle,
};

fn memory_with(
    policy: OracleLockPolicy,
    oracle: impl ThoughtOracle + 'static,
) -> ThoughtMemory {
    ThoughtMemory::new(
        MemoryConfig::default()
            .with_num_buckets(2)
            .with_oracle_lock(policy),
        Arc::new(FixedEmbedding::constant(0)),
        Arc::new(oracle),
    )
    .unwrap()
}

async fn seeded(policy: OracleLockPolicy, step: FailingStep) -> ThoughtMemory {
    let oracle = FailingOracle::new(
        ScriptedOracle::new()
            .forgetting(&["stale"])
            .merging(&["fresh"], &["merged"]),
        step,
    );
    let m = memory_with(policy, oracle);
    m.insert("stale").await.unwrap();
    m.insert("fresh").await.unwrap();
    m
}

#[tokio::test]
async fn test_failed_merge_discards_forget_result() {
    for policy in [OracleLockPolicy::Release, OracleLockPolicy::Hold] {
        let m = seeded(policy, FailingStep::Merge).await;

        let err = m.organize(0, OrganizeMode::All).await.unwrap_err();
        assert!(err.is_collaborator());
        assert_eq!(m.snapshot(0).await.unwrap(), vec!["stale", "fresh"]);
        assert_eq!(m.metrics().snapshot().organizes, 0);
        assert_eq!(m.metrics().snapshot().collaborator_failures, 1);
    }
}

#[tokio::test]
async fn test_failed_forget_leaves_bucket_unchanged() {
    for policy in [OracleLockPolicy::Release, OracleLockPolicy::Hold] {
        let m = seeded(policy, FailingStep::Forget).await;

        let err = m.organize(0, OrganizeMode::Forget).await.unwrap_err();
        assert!(matches!(
            err,
            MemoryError::Collaborator(CollaboratorError::Oracle(_))
        ));
        assert_eq!(m.snapshot(0).await.unwrap(), vec!["stale", "fresh"]);

        // Merge alone does not touch the failing capability.
        m.organize(0, OrganizeMode::Merge).await.unwrap();
        assert_eq!(m.snapshot(0).await.unwrap(), vec!["stale", "fresh"]);
    }
}

#[tokio::test]
async fn test_organize_all_surfaces_failure() {
    let m = seeded(OracleLockPolicy::Release, FailingStep::Forget).await;
    let err = m.organize_all(OrganizeMode::All).await.unwrap_err();
    assert!(err.is_collaborator());
    assert_eq!(m.stats().await.total_thoughts, 2);
}

#[tokio::test]
async fn test_failed_embedding_on_insert_and_recall() {
    let m = ThoughtMemory::new(
        MemoryConfig::default().with_num_buckets(1),
        Arc::new(FailingEmbedding::on(FixedEmbedding::constant(0), &["poison"])),
        Arc::new(KeepAllOracle),
    )
    .unwrap();
    m.insert("fine").await.unwrap();

    let err = m.insert("poison").await.unwrap_err();
    assert!(matches!(
        err,
        MemoryError::Collaborator(CollaboratorError::Embedding(_))
    ));
    assert!(m.recall("poison", 3).await.unwrap_err().is_collaborator());
    assert_eq!(m.snapshot(0).await.unwrap(), vec!["fine"]);
    assert_eq!(m.metrics().snapshot().collaborator_failures, 2);
}

struct ShortScorer;

#[async_trait]
impl RelevanceScorer for ShortScorer {
    fn name(&self) -> &str {
        "short"
    }

    async fn score(&self, _query: &str, _thoughts: &[String]) -> CollaboratorResult<Vec<f64>> {
        Ok(vec![1.0])
    }
}

#[tokio::test]
async fn test_scorer_length_mismatch_is_collaborator_failure() {
    let m = memory_with(OracleLockPolicy::Release, KeepAllOracle);
    m.insert("one").await.unwrap();
    m.insert("two").await.unwrap();

    let err = m.recall_with("one", 2, &ShortScorer).await.unwrap_err();
    assert!(matches!(
        err,
        MemoryError::Collaborator(CollaboratorError::Scoring(_))
    ));
}
