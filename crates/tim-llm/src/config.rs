//! Connection settings for an OpenAI-compatible endpoint.

use serde::{Deserialize, Serialize};

use crate::error::{LlmError, LlmResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Server root, without the `/v1` suffix.
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    /// Environment variable holding the bearer token. `None` for local
    /// servers that take no key.
    pub api_key_env: Option<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Upper bound on in-flight requests; `organize_all` fans out per bucket.
    pub max_concurrent_requests: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            api_key_env: Some("OPENAI_API_KEY".to_string()),
            temperature: 0.0,
            timeout_secs: 60,
            max_concurrent_requests: 2,
        }
    }
}

impl LlmConfig {
    pub fn validate(&self) -> LlmResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(LlmError::Config("base_url is empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(LlmError::Config(format!(
                "temperature must be within [0, 2], got {}",
                self.temperature
            )));
        }
        if self.timeout_secs == 0 {
            return Err(LlmError::Config("timeout_secs must be positive".to_string()));
        }
        if self.max_concurrent_requests == 0 {
            return Err(LlmError::Config(
                "max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Read the key from the configured environment variable.
    pub fn api_key(&self) -> LlmResult<Option<String>> {
        self.api_key_from(|name| std::env::var(name).ok())
    }

    fn api_key_from(&self, lookup: impl Fn(&str) -> Option<String>) -> LlmResult<Option<String>> {
        match &self.api_key_env {
            None => Ok(None),
            Some(name) => lookup(name)
                .filter(|k| !k.trim().is_empty())
                .map(Some)
                .ok_or_else(|| LlmError::MissingApiKey(name.clone())),
        }
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        LlmConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg: LlmConfig = toml::from_str(
            r#"
            base_url = "http://localhost:11434/"
            chat_model = "llama3"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.chat_model, "llama3");
        assert_eq!(cfg.timeout_secs, 60);
        assert_eq!(cfg.endpoint("chat/completions"), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut cfg = LlmConfig {
            temperature: 3.0,
            ..LlmConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(LlmError::Config(_))));
        cfg.temperature = 0.2;
        cfg.max_concurrent_requests = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_api_key_lookup() {
        let cfg = LlmConfig::default();
        assert_eq!(
            cfg.api_key_from(|_| Some("sk-test".to_string())).unwrap(),
            Some("sk-test".to_string())
        );
        assert!(matches!(
            cfg.api_key_from(|_| None),
            Err(LlmError::MissingApiKey(name)) if name == "OPENAI_API_KEY"
        ));

        let local = LlmConfig {
            api_key_env: None,
            ..LlmConfig::default()
        };
        assert_eq!(local.api_key_from(|_| None).unwrap(), None);
    }
}
