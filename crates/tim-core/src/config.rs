//! Memory configuration.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, MemoryResult};

/// How `organize` treats the bucket lock while the oracle is thinking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleLockPolicy {
    /// Snapshot, release the lock, call the oracle, re-lock to install the
    /// result. Inserts made meanwhile are appended after the result.
    #[default]
    Release,
    /// Hold the bucket's write lock across the oracle calls. Reads and
    /// inserts on that bucket wait for the oracle.
    Hold,
}

impl FromStr for OracleLockPolicy {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "release" => Ok(Self::Release),
            "hold" => Ok(Self::Hold),
            other => Err(MemoryError::InvalidArgument(format!(
                "unknown oracle lock policy: {other} (expected release or hold)"
            ))),
        }
    }
}

/// Settings fixed at memory construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Number of buckets. Immutable for the life of the memory.
    pub num_buckets: usize,
    /// Recall size used by the think-in-memory pipeline.
    pub default_top_k: usize,
    pub oracle_lock: OracleLockPolicy,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            num_buckets: 10,
            default_top_k: 3,
            oracle_lock: OracleLockPolicy::Release,
        }
    }
}

impl MemoryConfig {
    pub fn with_num_buckets(mut self, num_buckets: usize) -> Self {
        self.num_buckets = num_buckets;
        self
    }

    pub fn with_default_top_k(mut self, top_k: usize) -> Self {
        self.default_top_k = top_k;
        self
    }

    pub fn with_oracle_lock(mut self, policy: OracleLockPolicy) -> Self {
        self.oracle_lock = policy;
        self
    }

    pub fn validate(&self) -> MemoryResult<()> {
        if self.num_buckets == 0 {
            return Err(MemoryError::InvalidArgument(
                "num_buckets must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Defaults overridden by environment variables.
    ///
    /// Reads:
    /// - TIM_NUM_BUCKETS (optional, default: 10)
    /// - TIM_TOP_K (optional, default: 3)
    /// - TIM_ORACLE_LOCK (optional, "release" | "hold", default: "release")
    pub fn from_env() -> MemoryResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> MemoryResult<Self> {
        let mut config = Self::default();
        if let Some(v) = lookup("TIM_NUM_BUCKETS") {
            config.num_buckets = parse_usize("TIM_NUM_BUCKETS", &v)?;
        }
        if let Some(v) = lookup("TIM_TOP_K") {
            config.default_top_k = parse_usize("TIM_TOP_K", &v)?;
        }
        if let Some(v) = lookup("TIM_ORACLE_LOCK") {
            config.oracle_lock = v.parse()?;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Convert a signed, host-supplied top-k into the unsigned recall size.
pub fn validate_top_k(top_k: i64) -> MemoryResult<usize> {
    usize::try_from(top_k)
        .map_err(|_| MemoryError::InvalidArgument(format!("top_k must be >= 0, got {top_k}")))
}

fn parse_usize(key: &str, value: &str) -> MemoryResult<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| MemoryError::InvalidArgument(format!("{key} must be a non-negative integer, got {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let c = MemoryConfig::default();
        assert_eq!(c.num_buckets, 10);
        assert_eq!(c.default_top_k, 3);
        assert_eq!(c.oracle_lock, OracleLockPolicy::Release);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_zero_buckets_invalid() {
        assert!(MemoryConfig::default().with_num_buckets(0).validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let c = MemoryConfig::from_lookup(lookup(&[
            ("TIM_NUM_BUCKETS", "5"),
            ("TIM_TOP_K", "7"),
            ("TIM_ORACLE_LOCK", "hold"),
        ]))
        .unwrap();
        assert_eq!(c.num_buckets, 5);
        assert_eq!(c.default_top_k, 7);
        assert_eq!(c.oracle_lock, OracleLockPolicy::Hold);
    }

    #[test]
    fn test_env_rejects_garbage() {
        assert!(MemoryConfig::from_lookup(lookup(&[("TIM_NUM_BUCKETS", "-3")])).is_err());
        assert!(MemoryConfig::from_lookup(lookup(&[("TIM_NUM_BUCKETS", "0")])).is_err());
        assert!(MemoryConfig::from_lookup(lookup(&[("TIM_ORACLE_LOCK", "sometimes")])).is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let c: MemoryConfig = toml::from_str("num_buckets = 5").unwrap();
        assert_eq!(c.num_buckets, 5);
        assert_eq!(c.default_top_k, 3);

        let c: MemoryConfig = toml::from_str("oracle_lock = \"hold\"").unwrap();
        assert_eq!(c.oracle_lock, OracleLockPolicy::Hold);
    }

    #[test]
    fn test_validate_top_k() {
        assert_eq!(validate_top_k(0).unwrap(), 0);
        assert_eq!(validate_top_k(3).unwrap(), 3);
        assert!(matches!(
            validate_top_k(-1),
            Err(MemoryError::InvalidArgument(_))
        ));
    }
}
