//! Assigns exactly one [`ErrorKind`] to a playback failure.
//!
//! A failure can satisfy several predicates at once (an offline decode error
//! is both network and codec), so rules are evaluated in a fixed precedence
//! order and the first match wins.
use serde::{Deserialize, Serialize};

use super::ErrorKind;
use crate::capability::ConnectionClass;
use crate::catalog::SourceDescriptor;
use crate::monitor::{NetworkStatus, PerformanceSample};

const NETWORK_PATTERNS: &[&str] = &["network", "connection", "timeout", "fetch", "cors"];
const CODEC_PATTERNS: &[&str] = &["codec", "format", "decode", "unsupported"];
const TIMEOUT_PATTERNS: &[&str] = &["timeout"];

/// HTML media element error codes.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaErrorCode {
    Aborted = 1,
    Network = 2,
    Decode = 3,
    SrcNotSupported = 4,
}

impl MediaErrorCode {
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(MediaErrorCode::Aborted),
            2 => Some(MediaErrorCode::Network),
            3 => Some(MediaErrorCode::Decode),
            4 => Some(MediaErrorCode::SrcNotSupported),
            _ => None,
        }
    }

    fn is_codec(&self) -> bool {
        matches!(self, MediaErrorCode::Decode | MediaErrorCode::SrcNotSupported)
    }
}

/// Failure reported by the playback surface.
///
/// `code` is present when the media element itself is in an error state;
/// failures raised elsewhere (fetch, play promise) carry only a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaError {
    pub code: Option<MediaErrorCode>,
    pub message: String,
}

impl MediaError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Error reported by the media element with a numeric code.
    pub fn from_element(code: u16, message: impl Into<String>) -> Self {
        Self {
            code: MediaErrorCode::from_code(code),
            message: message.into(),
        }
    }
}

/// Environment at the moment of failure.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorContext {
    pub source: Option<SourceDescriptor>,
    /// Time since the current load started.
    pub load_time_ms: Option<u64>,
    pub network: NetworkStatus,
    pub connection: ConnectionClass,
    pub performance: PerformanceSample,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            source: None,
            load_time_ms: None,
            network: NetworkStatus::default(),
            connection: ConnectionClass::FourG,
            performance: PerformanceSample::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Load time above which a failure is blamed on performance.
    pub performance_threshold_ms: u64,
    /// Load time above which a failure is treated as a timeout.
    pub network_timeout_ms: u64,
    /// Stall count above which a failure is blamed on performance.
    pub stall_threshold: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            performance_threshold_ms: 5_000,
            network_timeout_ms: 10_000,
            stall_threshold: 3,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ErrorClassifier {
    config: ClassifierConfig,
}

impl ErrorClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn classify(&self, error: &MediaError, context: &ErrorContext) -> ErrorKind {
        let message = error.message.to_ascii_lowercase();
        let load_ms = context.load_time_ms.unwrap_or(0);

        if !context.network.online
            || context.connection == ConnectionClass::Slow2g
            || matches_any(&message, NETWORK_PATTERNS)
        {
            return ErrorKind::Network;
        }

        if error.code.map_or(false, |code| code.is_codec()) || matches_any(&message, CODEC_PATTERNS) {
            return ErrorKind::Codec;
        }

        let perf = &context.performance;
        if load_ms > self.config.performance_threshold_ms
            || perf.stall_count > self.config.stall_threshold
            || perf.memory_pressure_high
        {
            return ErrorKind::Performance;
        }

        if matches_any(&message, TIMEOUT_PATTERNS) || load_ms > self.config.network_timeout_ms {
            return ErrorKind::Timeout;
        }

        if error.code.is_some() {
            return ErrorKind::Playback;
        }

        ErrorKind::Loading
    }
}

fn matches_any(message: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|pattern| message.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn online() -> ErrorContext {
        ErrorContext::default()
    }

    fn classify(error: &MediaError, context: &ErrorContext) -> ErrorKind {
        ErrorClassifier::default().classify(error, context)
    }

    #[test]
    fn offline_fetch_failure_is_network() {
        let context = ErrorContext {
            network: NetworkStatus {
                online: false,
                ..NetworkStatus::default()
            },
            ..online()
        };
        let error = MediaError::new("NetworkError: fetch failed");
        assert_eq!(classify(&error, &context), ErrorKind::Network);
    }

    #[test]
    fn slow_2g_is_network_regardless_of_message() {
        let context = ErrorContext {
            connection: ConnectionClass::Slow2g,
            ..online()
        };
        let error = MediaError::from_element(3, "PIPELINE_ERROR_DECODE");
        assert_eq!(classify(&error, &context), ErrorKind::Network);
    }

    #[test]
    fn src_not_supported_is_codec() {
        let error = MediaError::from_element(4, "MEDIA_ERR_SRC_NOT_SUPPORTED");
        assert_eq!(classify(&error, &online()), ErrorKind::Codec);
    }

    #[test]
    fn codec_text_without_code_is_codec() {
        let error = MediaError::new("Unsupported format");
        assert_eq!(classify(&error, &online()), ErrorKind::Codec);
    }

    #[test]
    fn codec_outranks_performance() {
        let context = ErrorContext {
            load_time_ms: Some(9_000),
            ..online()
        };
        let error = MediaError::from_element(3, "decode failure");
        assert_eq!(classify(&error, &context), ErrorKind::Codec);
    }

    #[test]
    fn slow_load_stalls_or_memory_is_performance() {
        let error = MediaError::new("play() rejected");
        let slow_load = ErrorContext {
            load_time_ms: Some(5_001),
            ..online()
        };
        assert_eq!(classify(&error, &slow_load), ErrorKind::Performance);

        let stalls = ErrorContext {
            performance: PerformanceSample {
                stall_count: 4,
                ..PerformanceSample::default()
            },
            ..online()
        };
        assert_eq!(classify(&error, &stalls), ErrorKind::Performance);

        let memory = ErrorContext {
            performance: PerformanceSample {
                memory_pressure_high: true,
                ..PerformanceSample::default()
            },
            ..online()
        };
        assert_eq!(classify(&error, &memory), ErrorKind::Performance);
    }

    #[test]
    fn load_past_network_timeout_is_timeout_when_performance_threshold_is_higher() {
        let classifier = ErrorClassifier::new(ClassifierConfig {
            performance_threshold_ms: 20_000,
            ..ClassifierConfig::default()
        });
        let context = ErrorContext {
            load_time_ms: Some(12_000),
            ..online()
        };
        let error = MediaError::new("play() rejected");
        assert_eq!(classifier.classify(&error, &context), ErrorKind::Timeout);
    }

    #[test]
    fn element_error_without_other_signal_is_playback() {
        let error = MediaError::from_element(1, "MEDIA_ERR_ABORTED");
        assert_eq!(classify(&error, &online()), ErrorKind::Playback);
    }

    #[test]
    fn default_is_loading() {
        let error = MediaError::new("play() rejected");
        assert_eq!(classify(&error, &online()), ErrorKind::Loading);
    }
}
