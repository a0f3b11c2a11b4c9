use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::recovery::classifier::ClassifierConfig;
use crate::recovery::planner::RecoveryConfig;

/// Error produced when engine tunables fail validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config decode: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("max_retries must be at least 1")]
    ZeroMaxRetries,
    #[error("base_delay_ms must be greater than zero")]
    ZeroBaseDelay,
    #[error("max_delay_ms ({max}) must not be below base_delay_ms ({base})")]
    MaxDelayBelowBase { base: u64, max: u64 },
    #[error("{0} must be greater than zero")]
    ZeroThreshold(&'static str),
    #[error("memory_sample_interval_ms must be greater than zero")]
    ZeroSampleInterval,
    #[error("history_capacity must be greater than zero")]
    ZeroHistoryCapacity,
}

/// Every tunable the engine consults, grouped per component.
///
/// Documents may be partial; missing fields take the `standard` values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub recovery: RecoveryConfig,
    pub classifier: ClassifierConfig,
    /// Period of the background heap sampler.
    pub memory_sample_interval_ms: u64,
    /// Capacity of the per-session error history.
    pub history_capacity: usize,
}

impl EngineConfig {
    /// Safe default balancing retries against time-to-fallback.
    pub fn standard() -> Self {
        Self {
            recovery: RecoveryConfig::default(),
            classifier: ClassifierConfig::default(),
            memory_sample_interval_ms: 30_000,
            history_capacity: 50,
        }
    }

    /// Gives up sooner: one retry, tighter performance thresholds.
    pub fn conservative() -> Self {
        Self {
            recovery: RecoveryConfig {
                max_retries: 1,
                base_delay_ms: 500,
                max_delay_ms: 4_000,
                max_jitter_ms: 500,
            },
            classifier: ClassifierConfig {
                performance_threshold_ms: 3_000,
                network_timeout_ms: 6_000,
                stall_threshold: 2,
            },
            memory_sample_interval_ms: 15_000,
            history_capacity: 20,
        }
    }

    /// Parses a JSON document and validates the result.
    pub fn from_json(document: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let recovery = &self.recovery;
        if recovery.max_retries == 0 {
            return Err(ConfigError::ZeroMaxRetries);
        }
        if recovery.base_delay_ms == 0 {
            return Err(ConfigError::ZeroBaseDelay);
        }
        if recovery.max_delay_ms < recovery.base_delay_ms {
            return Err(ConfigError::MaxDelayBelowBase {
                base: recovery.base_delay_ms,
                max: recovery.max_delay_ms,
            });
        }
        let classifier = &self.classifier;
        if classifier.performance_threshold_ms == 0 {
            return Err(ConfigError::ZeroThreshold("performance_threshold_ms"));
        }
        if classifier.network_timeout_ms == 0 {
            return Err(ConfigError::ZeroThreshold("network_timeout_ms"));
        }
        if classifier.stall_threshold == 0 {
            return Err(ConfigError::ZeroThreshold("stall_threshold"));
        }
        if self.memory_sample_interval_ms == 0 {
            return Err(ConfigError::ZeroSampleInterval);
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::ZeroHistoryCapacity);
        }
        Ok(())
    }

    /// Stable ID derived from the normalized configuration.
    pub fn config_id(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        fingerprint(&bytes)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::standard()
    }
}

/// Lowercase hex SHA-256 of `bytes`.
pub(crate) fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|byte| format!("{:02x}", byte)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_validate() {
        assert!(EngineConfig::standard().validate().is_ok());
        assert!(EngineConfig::conservative().validate().is_ok());
    }

    #[test]
    fn partial_document_uses_defaults() {
        let config = EngineConfig::from_json(r#"{"recovery":{"max_retries":5}}"#).unwrap();
        assert_eq!(config.recovery.max_retries, 5);
        assert_eq!(config.recovery.base_delay_ms, 1_000);
        assert_eq!(config.classifier, ClassifierConfig::default());
        assert_eq!(config.history_capacity, 50);
    }

    #[test]
    fn rejects_zero_retries() {
        let err = EngineConfig::from_json(r#"{"recovery":{"max_retries":0}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroMaxRetries));
    }

    #[test]
    fn rejects_inverted_delays() {
        let mut config = EngineConfig::standard();
        config.recovery.max_delay_ms = 10;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MaxDelayBelowBase { base: 1_000, max: 10 })
        ));
    }

    #[test]
    fn config_id_is_deterministic_and_distinguishes_presets() {
        let standard = EngineConfig::standard();
        assert_eq!(standard.config_id(), EngineConfig::default().config_id());
        assert_ne!(standard.config_id(), EngineConfig::conservative().config_id());
    }
}
