//! Chat-model implementations of `ThoughtOracle` and `Responder`.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use tim_core::{CollaboratorResult, Responder, ThoughtOracle};

use crate::client::ChatModel;
use crate::error::{LlmError, LlmResult};
use crate::prompts;

/// Asks a chat model to forget, merge, answer and post-think.
#[derive(Clone)]
pub struct LlmOracle {
    model: Arc<dyn ChatModel>,
}

impl LlmOracle {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl ThoughtOracle for LlmOracle {
    async fn identify_obsolete(&self, thoughts: &[String]) -> CollaboratorResult<HashSet<String>> {
        let raw = self
            .model
            .chat(prompts::FORGET_SYSTEM, &prompts::group_user(thoughts))
            .await
            .map_err(LlmError::into_oracle)?;
        let listed = parse_string_list(&raw).map_err(LlmError::into_oracle)?;
        debug!(event = "llm.forget", group = thoughts.len(), flagged = listed.len());
        Ok(listed.into_iter().collect())
    }

    async fn merge_group(&self, thoughts: &[String]) -> CollaboratorResult<Vec<String>> {
        let raw = self
            .model
            .chat(prompts::MERGE_SYSTEM, &prompts::group_user(thoughts))
            .await
            .map_err(LlmError::into_oracle)?;
        let merged = parse_string_list(&raw).map_err(LlmError::into_oracle)?;
        if merged.is_empty() && !thoughts.is_empty() {
            return Err(LlmError::Parse("merge returned no thoughts".to_string()).into_oracle());
        }
        debug!(event = "llm.merge", group = thoughts.len(), merged = merged.len());
        Ok(merged)
    }
}

#[async_trait]
impl Responder for LlmOracle {
    async fn respond(&self, query: &str, recalled: &[String]) -> CollaboratorResult<String> {
        self.model
            .chat(prompts::RESPOND_SYSTEM, &prompts::respond_user(query, recalled))
            .await
            .map(|r| r.trim().to_string())
            .map_err(LlmError::into_responder)
    }

    async fn post_think(&self, query: &str, response: &str) -> CollaboratorResult<Option<String>> {
        let raw = self
            .model
            .chat(prompts::POST_THINK_SYSTEM, &prompts::post_think_user(query, response))
            .await
            .map_err(LlmError::into_responder)?;
        Ok(parse_thought(&raw))
    }
}

fn code_fence() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)^\s*```[A-Za-z]*\s*\n?(.*?)\s*```\s*$").ok())
        .as_ref()
}

/// Parse a JSON array of strings, optionally wrapped in a Markdown fence.
///
/// Entries come back verbatim: forget and merge match thoughts by exact
/// text, so whitespace and empty strings inside the array are kept.
pub fn parse_string_list(raw: &str) -> LlmResult<Vec<String>> {
    let body = match code_fence().and_then(|re| re.captures(raw)) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()),
        None => raw.trim(),
    };
    serde_json::from_str(body)
        .map_err(|e| LlmError::Parse(format!("expected a JSON array of strings: {e}")))
}

/// One-line thought, or `None` for the no-thought marker or blank output.
pub fn parse_thought(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = line.trim_matches('"').trim();
    if line.is_empty() || line.eq_ignore_ascii_case(prompts::NO_THOUGHT) {
        return None;
    }
    Some(line.to_string())
}
