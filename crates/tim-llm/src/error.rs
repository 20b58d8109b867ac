//! Errors from the HTTP model backend.

use thiserror::Error;
use tim_core::CollaboratorError;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("model returned no content")]
    EmptyResponse,

    #[error("could not parse model output: {0}")]
    Parse(String),

    #[error("api key variable {0} is not set")]
    MissingApiKey(String),

    #[error("embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid llm config: {0}")]
    Config(String),
}

pub type LlmResult<T> = std::result::Result<T, LlmError>;

impl LlmError {
    pub fn into_oracle(self) -> CollaboratorError {
        CollaboratorError::Oracle(self.to_string())
    }

    pub fn into_responder(self) -> CollaboratorError {
        CollaboratorError::Responder(self.to_string())
    }

    pub fn into_embedding(self) -> CollaboratorError {
        CollaboratorError::Embedding(self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collaborator_mapping_keeps_message() {
        let err = LlmError::Api {
            status: 429,
            body: "slow down".to_string(),
        };
        assert_eq!(
            err.into_oracle(),
            CollaboratorError::Oracle("api error 429: slow down".to_string())
        );
        assert!(matches!(
            LlmError::EmptyResponse.into_responder(),
            CollaboratorError::Responder(_)
        ));
        assert!(matches!(
            LlmError::DimensionMismatch { expected: 4, actual: 3 }.into_embedding(),
            CollaboratorError::Embedding(m) if m.contains("expected 4")
        ));
    }
}
