//! TiM LLM: OpenAI-compatible collaborators for the thought memory
//!
//! - `ChatClient`: HTTP client for `/v1/chat/completions` and `/v1/embeddings`
//! - `LlmOracle`: forget/merge oracle and responder backed by a chat model
//! - `LlmEmbedder`: vector embedder backed by an embeddings model

pub mod client;
pub mod config;
pub mod embedding;
pub mod error;
pub mod oracle;
pub mod prompts;

pub use client::{ChatClient, ChatModel, EmbeddingModel};
pub use config::LlmConfig;
pub use embedding::LlmEmbedder;
pub use error::{LlmError, LlmResult};
pub use oracle::{parse_string_list, parse_thought, LlmOracle};
