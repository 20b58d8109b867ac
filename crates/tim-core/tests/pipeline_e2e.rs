//! End-to-end agent turns and offline rebucketing.

use std::sync::Arc;

use async_trait::async_trait;

use tim_core::fakes::{EchoResponder, FixedEmbedding, ScriptedOracle};
use tim_core::{
    rebucket, CharSumEmbedding, CollaboratorError, CollaboratorResult, KeepAllOracle, MemoryConfig,
    MemoryError, OrganizeMode, Responder, ThinkInMemory, ThoughtMemory,
};

const MIKE: &str = "Mike works as a teacher.";
const QUERY: &str = "What does Mike do";

fn shared_memory() -> Arc<ThoughtMemory> {
    Arc::new(
        ThoughtMemory::new(
            MemoryConfig::default().with_num_buckets(1),
            Arc::new(FixedEmbedding::constant(0)),
            Arc::new(
                ScriptedOracle::new()
                    .merging(&[MIKE, "Mike teaches math."], &["Mike works as a math teacher."]),
            ),
        )
        .unwrap(),
    )
}

#[tokio::test]
async fn test_turn_recalls_responds_and_stores_thought() {
    let memory = shared_memory();
    memory.insert(MIKE).await.unwrap();

    let tim = ThinkInMemory::new(
        memory.clone(),
        Arc::new(EchoResponder::new().thinking(QUERY, "Mike teaches math.")),
    );
    let turn = tim.turn(QUERY).await.unwrap();

    assert_eq!(turn.recalled, vec![MIKE]);
    assert_eq!(turn.response, format!("{QUERY} -> {MIKE}"));
    assert_eq!(turn.thought.as_deref(), Some("Mike teaches math."));
    assert_eq!(turn.bucket, Some(0));
    assert_eq!(memory.snapshot(0).await.unwrap(), vec![MIKE, "Mike teaches math."]);

    // The stored thought feeds the next organize.
    memory.organize(0, OrganizeMode::Merge).await.unwrap();
    assert_eq!(
        memory.snapshot(0).await.unwrap(),
        vec!["Mike works as a math teacher."]
    );
}

#[tokio::test]
async fn test_turn_without_thought_leaves_memory_alone() {
    let memory = shared_memory();
    let tim = ThinkInMemory::new(memory.clone(), Arc::new(EchoResponder::new())).with_top_k(1);

    let turn = tim.turn(QUERY).await.unwrap();
    assert!(turn.recalled.is_empty());
    assert_eq!(turn.response, format!("no memory for: {QUERY}"));
    assert_eq!(turn.thought, None);
    assert_eq!(memory.stats().await.total_thoughts, 0);
}

struct BrokenResponder;

#[async_trait]
impl Responder for BrokenResponder {
    async fn respond(&self, _query: &str, _recalled: &[String]) -> CollaboratorResult<String> {
        Ok("answer".to_string())
    }

    async fn post_think(&self, _query: &str, _response: &str) -> CollaboratorResult<Option<String>> {
        Err(CollaboratorError::Responder("model timed out".to_string()))
    }
}

#[tokio::test]
async fn test_failed_post_think_aborts_turn() {
    let memory = shared_memory();
    memory.insert(MIKE).await.unwrap();
    let tim = ThinkInMemory::new(memory.clone(), Arc::new(BrokenResponder));

    let err = tim.turn(QUERY).await.unwrap_err();
    assert!(matches!(
        err,
        MemoryError::Collaborator(CollaboratorError::Responder(_))
    ));
    assert_eq!(memory.snapshot(0).await.unwrap(), vec![MIKE]);
}

#[tokio::test]
async fn test_rebucket_into_wider_memory() {
    let thoughts = [
        "The capital of China is Beijing.",
        "John works as an actor.",
        "John works as a director.",
        MIKE,
    ];
    let source = ThoughtMemory::new(
        MemoryConfig::default().with_num_buckets(1),
        Arc::new(CharSumEmbedding::new()),
        Arc::new(KeepAllOracle),
    )
    .unwrap();
    for t in thoughts {
        source.insert(t).await.unwrap();
    }
    let target = ThoughtMemory::new(
        MemoryConfig::default().with_num_buckets(5),
        Arc::new(CharSumEmbedding::new()),
        Arc::new(KeepAllOracle),
    )
    .unwrap();

    let report = rebucket(&source, &target).await.unwrap();
    assert_eq!(report.copied, 4);
    assert_eq!(report.duplicates, 0);
    assert_eq!(report.buckets, target.stats().await.non_empty_buckets);

    for t in thoughts {
        let bucket = CharSumEmbedding::signature(t).rem_euclid(5) as usize;
        assert!(target.snapshot(bucket).await.unwrap().contains(&t.to_string()));
    }

    let again = rebucket(&source, &target).await.unwrap();
    assert_eq!(again.copied, 0);
    assert_eq!(again.duplicates, 4);
    assert_eq!(source.num_buckets(), 1);
}

#[tokio::test]
async fn test_turn_record_serializes() {
    let memory = shared_memory();
    let tim = ThinkInMemory::new(memory, Arc::new(EchoResponder::new()));
    let turn = tim.turn(QUERY).await.unwrap();

    let json = serde_json::to_value(&turn).unwrap();
    assert_eq!(json["query"], QUERY);
    assert_eq!(json["response"], format!("no memory for: {QUERY}"));
    assert!(json["thought"].is_null());

    let back: tim_core::Turn = serde_json::from_value(json).unwrap();
    assert_eq!(back, turn);
}
