//! TiM Core: Think-in-Memory long-term thought store
//!
//! Stores condensed "thoughts" in buckets chosen by a locality-sensitive
//! signature, recalls the most relevant ones for a query, and reconciles a
//! bucket by forgetting obsolete thoughts and merging redundant ones.
//!
//! ## Key Components
//!
//! - `ThoughtMemory`: bucketed store with insert, two-stage recall and organize
//! - `BucketHasher`: signature to bucket id
//! - `EmbeddingSource` / `ThoughtOracle` / `Responder`: host-supplied collaborators
//! - `ThinkInMemory`: recall, respond, post-think, insert
//!
//! The crate performs no network or disk I/O.

pub mod config;
pub mod embedding;
pub mod error;
pub mod fakes;
pub mod hasher;
pub mod metrics;
pub mod migrate;
pub mod obs;
pub mod oracle;
pub mod pipeline;
pub mod reconcile;
pub mod scoring;
pub mod store;
pub mod telemetry;

pub use config::{validate_top_k, MemoryConfig, OracleLockPolicy};
pub use embedding::{
    CharSumEmbedding, EmbeddingSource, HashedTokenEmbedder, ProjectionEmbedding, VectorEmbedder,
};
pub use error::{CollaboratorError, CollaboratorResult, MemoryError, MemoryResult};
pub use hasher::{BucketHasher, BucketId, Signature};
pub use metrics::{MemoryMetrics, MetricsSnapshot};
pub use migrate::{rebucket, RebucketReport};
pub use oracle::{KeepAllOracle, Responder, ThoughtOracle};
pub use pipeline::{ThinkInMemory, Turn};
pub use reconcile::OrganizeMode;
pub use scoring::{EmbeddingSimilarityScorer, RelevanceScorer, ScoredThought, TokenOverlapScorer};
pub use store::{BucketDump, Insertion, MemoryStats, OrganizeReport, ThoughtMemory};
pub use telemetry::init_tracing;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
