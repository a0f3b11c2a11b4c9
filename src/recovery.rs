//! Failure taxonomy and recovery state for one playback session.
//!
//! [`classifier`] maps a failure to an [`ErrorKind`]; [`planner`] turns the
//! kind plus the current [`RecoveryState`] into exactly one
//! [`RecoveryAction`]. Both are pure: no timers, no logging, no I/O. The
//! session adapter owns scheduling.
use serde::Serialize;

use crate::catalog::QualityTier;
use crate::ring::RingBuffer;

pub mod classifier;
pub mod planner;

pub use classifier::{ErrorClassifier, ErrorContext, MediaError, MediaErrorCode};
pub use planner::{FixedJitter, JitterSource, RandomJitter, RecoveryPlanner};

/// Cause assigned to a playback failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    Network,
    Codec,
    Performance,
    Timeout,
    Playback,
    Loading,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 6] = [
        ErrorKind::Network,
        ErrorKind::Codec,
        ErrorKind::Performance,
        ErrorKind::Timeout,
        ErrorKind::Playback,
        ErrorKind::Loading,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Codec => "codec",
            ErrorKind::Performance => "performance",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Playback => "playback",
            ErrorKind::Loading => "loading",
        }
    }
}

/// Why a quality reduction was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DegradeReason {
    SlowNetwork,
    CodecIncompatibility,
    Performance,
    RepeatedFailure,
}

impl DegradeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DegradeReason::SlowNetwork => "slow network",
            DegradeReason::CodecIncompatibility => "codec incompatibility",
            DegradeReason::Performance => "performance",
            DegradeReason::RepeatedFailure => "repeated failure",
        }
    }
}

/// The single decision produced per failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecoveryAction {
    /// Reload against the next candidate after `delay_ms`.
    Retry { delay_ms: u64 },
    /// Switch to a lower-tier asset. `to <= from` always holds.
    ReduceQuality {
        from: QualityTier,
        to: QualityTier,
        reason: DegradeReason,
    },
    /// Replace the video with a static background.
    StaticFallback,
    /// Remove the video feature for the rest of the session.
    DisableVideo,
}

impl RecoveryAction {
    /// Static fallback and disable end the session's video attempts.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RecoveryAction::StaticFallback | RecoveryAction::DisableVideo)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryAction::Retry { .. } => "retry",
            RecoveryAction::ReduceQuality { .. } => "reduce_quality",
            RecoveryAction::StaticFallback => "static_fallback",
            RecoveryAction::DisableVideo => "disable_video",
        }
    }
}

/// Retry/backoff state advanced by [`RecoveryPlanner::plan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryState {
    pub retry_count: u32,
    pub current_tier: QualityTier,
    pub last_action_ms: Option<u64>,
}

impl RecoveryState {
    pub fn new(tier: QualityTier) -> Self {
        Self {
            retry_count: 0,
            current_tier: tier,
            last_action_ms: None,
        }
    }

    /// Called on a successful playback start. The tier stays degraded.
    pub fn reset_after_success(&mut self) {
        self.retry_count = 0;
    }
}

/// Immutable record of one classified failure.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub raw_cause: String,
    pub context: ErrorContext,
    pub timestamp_ms: u64,
    pub retry_count_at_time: u32,
}

/// Append-only, bounded failure history.
#[derive(Debug, Clone)]
pub struct ErrorHistory {
    records: RingBuffer<ErrorRecord>,
}

impl ErrorHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: RingBuffer::new(capacity),
        }
    }

    pub fn append(&mut self, record: ErrorRecord) {
        self.records.push(record);
    }

    pub fn latest(&self) -> Option<&ErrorRecord> {
        self.records.latest()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ErrorRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of retained records of `kind`.
    pub fn count(&self, kind: ErrorKind) -> usize {
        self.records.iter().filter(|record| record.kind == kind).count()
    }

    /// Per-kind counts in [`ErrorKind::ALL`] order, omitting zeroes.
    pub fn summary(&self) -> Vec<(ErrorKind, usize)> {
        ErrorKind::ALL
            .iter()
            .map(|kind| (*kind, self.count(*kind)))
            .filter(|(_, count)| *count > 0)
            .collect()
    }
}
