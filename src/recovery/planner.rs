//! Recovery state machine.
//!
//! `plan` is the only transition function. It picks one action per failure
//! and advances [`RecoveryState`]; scheduling the resulting delay is the
//! caller's job.
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{DegradeReason, ErrorKind, ErrorRecord, RecoveryAction, RecoveryState};
use crate::catalog::QualityTier;
use crate::monitor::NetworkStatus;

/// Playback/loading failures retry this many times before degrading.
const GENERIC_RETRY_LIMIT: u32 = 2;
const PERFORMANCE_TIER_DROP: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    /// Upper bound on any retry delay, jitter included.
    pub max_delay_ms: u64,
    /// Jitter is drawn uniformly from `0..=max_jitter_ms`.
    pub max_jitter_ms: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
            max_jitter_ms: 1_000,
        }
    }
}

/// Source of backoff jitter.
pub trait JitterSource {
    /// Returns a value in `0..=max_ms`.
    fn jitter_ms(&mut self, max_ms: u64) -> u64;
}

impl<J: JitterSource + ?Sized> JitterSource for Box<J> {
    fn jitter_ms(&mut self, max_ms: u64) -> u64 {
        (**self).jitter_ms(max_ms)
    }
}

/// Uniform jitter from the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomJitter;

impl JitterSource for RandomJitter {
    fn jitter_ms(&mut self, max_ms: u64) -> u64 {
        rand::thread_rng().gen_range(0..=max_ms)
    }
}

/// Constant jitter, clamped to the requested maximum.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedJitter(pub u64);

impl JitterSource for FixedJitter {
    fn jitter_ms(&mut self, max_ms: u64) -> u64 {
        self.0.min(max_ms)
    }
}

#[derive(Debug, Clone)]
pub struct RecoveryPlanner<J = RandomJitter> {
    config: RecoveryConfig,
    jitter: J,
}

impl RecoveryPlanner<RandomJitter> {
    pub fn new(config: RecoveryConfig) -> Self {
        Self::with_jitter(config, RandomJitter)
    }
}

impl Default for RecoveryPlanner<RandomJitter> {
    fn default() -> Self {
        Self::new(RecoveryConfig::default())
    }
}

impl<J: JitterSource> RecoveryPlanner<J> {
    pub fn with_jitter(config: RecoveryConfig, jitter: J) -> Self {
        Self { config, jitter }
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Chooses the recovery action for `record` and advances `state`.
    ///
    /// # Guarantees
    /// * Only `Retry` increments `retry_count`, and never past `max_retries`.
    /// * Once `retry_count >= max_retries` the answer depends on the error kind
    ///   alone and `state.retry_count` no longer moves.
    /// * `ReduceQuality` never raises the tier.
    pub fn plan(
        &mut self,
        record: &ErrorRecord,
        state: &mut RecoveryState,
        network: &NetworkStatus,
    ) -> RecoveryAction {
        let action = self.decide(record.kind, state, network);
        match action {
            RecoveryAction::Retry { .. } => {
                state.retry_count = state.retry_count.saturating_add(1);
            }
            RecoveryAction::ReduceQuality { to, .. } => {
                state.current_tier = to;
            }
            RecoveryAction::StaticFallback | RecoveryAction::DisableVideo => {}
        }
        state.last_action_ms = Some(record.timestamp_ms);
        action
    }

    fn decide(&mut self, kind: ErrorKind, state: &RecoveryState, network: &NetworkStatus) -> RecoveryAction {
        if state.retry_count >= self.config.max_retries {
            return terminal_action(kind);
        }

        match kind {
            ErrorKind::Network => {
                if !network.online {
                    RecoveryAction::StaticFallback
                } else if network.slow {
                    reduce(state.current_tier, 1, DegradeReason::SlowNetwork)
                } else {
                    self.retry(state.retry_count)
                }
            }
            ErrorKind::Codec => reduce(state.current_tier, 1, DegradeReason::CodecIncompatibility),
            ErrorKind::Performance => reduce(
                state.current_tier,
                PERFORMANCE_TIER_DROP,
                DegradeReason::Performance,
            ),
            ErrorKind::Timeout => self.retry(state.retry_count),
            ErrorKind::Playback | ErrorKind::Loading => {
                if state.retry_count < GENERIC_RETRY_LIMIT {
                    self.retry(state.retry_count)
                } else {
                    reduce(state.current_tier, 1, DegradeReason::RepeatedFailure)
                }
            }
        }
    }

    fn retry(&mut self, retry_count: u32) -> RecoveryAction {
        let jitter = self.jitter.jitter_ms(self.config.max_jitter_ms);
        RecoveryAction::Retry {
            delay_ms: backoff_delay(&self.config, retry_count, jitter),
        }
    }
}

/// `min(base * 2^retry_count + jitter, max)`, saturating.
pub fn backoff_delay(config: &RecoveryConfig, retry_count: u32, jitter_ms: u64) -> u64 {
    let factor = 1u64.checked_shl(retry_count).unwrap_or(u64::MAX);
    config
        .base_delay_ms
        .saturating_mul(factor)
        .saturating_add(jitter_ms)
        .min(config.max_delay_ms)
}

fn terminal_action(kind: ErrorKind) -> RecoveryAction {
    match kind {
        ErrorKind::Performance => RecoveryAction::DisableVideo,
        ErrorKind::Network
        | ErrorKind::Codec
        | ErrorKind::Timeout
        | ErrorKind::Playback
        | ErrorKind::Loading => RecoveryAction::StaticFallback,
    }
}

fn reduce(from: QualityTier, steps: u8, reason: DegradeReason) -> RecoveryAction {
    RecoveryAction::ReduceQuality {
        from,
        to: from.step_down(steps),
        reason,
    }
}
