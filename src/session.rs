//! Playback session adapter.
//!
//! Wires the pure core (probe, selector, classifier, planner) to a playback
//! surface. The surface feeds [`MediaEvent`]s and [`EnvironmentEvent`]s in and
//! receives [`SessionDirective`]s out. Backoff delays and heap sampling run on
//! tokio timers owned by the session and aborted when it is closed or dropped,
//! so no recovery action fires against a disposed element.
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::capability::{CapabilityProbe, CapabilitySnapshot, CapabilitySource};
use crate::catalog::{CatalogError, QualityTier, SourceCatalog, SourceDescriptor};
use crate::config::{ConfigError, EngineConfig};
use crate::monitor::{NetworkMonitor, NetworkStatus, PerformanceMonitor, PerformanceSample};
use crate::recovery::{
    ErrorClassifier, ErrorContext, ErrorHistory, ErrorRecord, JitterSource, MediaError, RandomJitter,
    RecoveryAction, RecoveryPlanner, RecoveryState,
};
use crate::selector::{PreloadHint, Selection, SourceCandidateList, SourceSelector};

/// Lifecycle events reported by the media element.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    LoadStart,
    LoadedMetadata,
    CanPlay,
    Stalled,
    Error(MediaError),
}

/// Capability-affecting environment changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentEvent {
    Resize,
    OrientationChange,
    ConnectionChange,
    BatteryChange,
    Online,
    Offline,
}

/// Instruction for the playback surface.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionDirective {
    /// Point the media element at `source` and (re)load.
    Load {
        source: SourceDescriptor,
        preload: PreloadHint,
    },
    /// Replace the video with the static background.
    ShowStaticFallback,
    /// Remove the video feature for the rest of the session.
    DisableVideo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Created,
    Loading,
    Playing,
    StaticFallback,
    Disabled,
    Closed,
}

impl SessionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionPhase::StaticFallback | SessionPhase::Disabled | SessionPhase::Closed
        )
    }
}

/// Errors emitted from the session adapter.
///
/// Playback failures never surface here; they are answered with directives.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid engine config: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid source catalog: {0}")]
    Catalog(#[from] CatalogError),
    #[error("directive receiver dropped")]
    ReceiverDropped,
}

/// One playback surface's recovery session.
///
/// Handlers take `&mut self`, so classification and planning for one failure
/// always complete before the next event is processed. `start` and any
/// handler that may schedule a retry must run inside a tokio runtime.
pub struct PlaybackSession {
    id: Uuid,
    config: EngineConfig,
    probe: CapabilityProbe,
    selector: SourceSelector,
    catalog: SourceCatalog,
    classifier: ErrorClassifier,
    planner: RecoveryPlanner<Box<dyn JitterSource + Send>>,
    snapshot: CapabilitySnapshot,
    network: NetworkMonitor,
    performance: Arc<Mutex<PerformanceMonitor>>,
    recovery: RecoveryState,
    history: ErrorHistory,
    candidates: SourceCandidateList,
    cursor: usize,
    preload: PreloadHint,
    degraded_uris: HashSet<String>,
    phase: SessionPhase,
    started: Instant,
    load_started_ms: Option<u64>,
    directives: mpsc::UnboundedSender<SessionDirective>,
    retry_timer: Option<JoinHandle<()>>,
    sampler: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("id", &self.id)
            .field("phase", &self.phase)
            .field("recovery", &self.recovery)
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

impl PlaybackSession {
    /// Builds a session with random backoff jitter.
    ///
    /// # Errors
    /// Returns `SessionError::Config` or `SessionError::Catalog` when either
    /// input fails validation.
    pub fn new(
        source: Arc<dyn CapabilitySource>,
        catalog: SourceCatalog,
        config: EngineConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SessionDirective>), SessionError> {
        Self::with_jitter(source, catalog, config, Box::new(RandomJitter))
    }

    /// Builds a session with a caller-supplied jitter source.
    pub fn with_jitter(
        source: Arc<dyn CapabilitySource>,
        catalog: SourceCatalog,
        config: EngineConfig,
        jitter: Box<dyn JitterSource + Send>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SessionDirective>), SessionError> {
        config.validate()?;
        catalog.validate()?;

        let probe = CapabilityProbe::new(source);
        let snapshot = probe.snapshot();
        let network = NetworkMonitor::from_snapshot(&snapshot);
        let performance = PerformanceMonitor::new(snapshot.device_memory_gb);
        let (tx, rx) = mpsc::unbounded_channel();

        let session = Self {
            id: Uuid::new_v4(),
            classifier: ErrorClassifier::new(config.classifier.clone()),
            planner: RecoveryPlanner::with_jitter(config.recovery.clone(), jitter),
            history: ErrorHistory::new(config.history_capacity),
            config,
            probe,
            selector: SourceSelector::default(),
            catalog,
            snapshot,
            network,
            performance: Arc::new(Mutex::new(performance)),
            recovery: RecoveryState::new(QualityTier::High),
            candidates: SourceCandidateList::new(),
            cursor: 0,
            preload: PreloadHint::Metadata,
            degraded_uris: HashSet::new(),
            phase: SessionPhase::Created,
            started: Instant::now(),
            load_started_ms: None,
            directives: tx,
            retry_timer: None,
            sampler: None,
        };
        Ok((session, rx))
    }

    /// Replaces the default tier/preload tables.
    pub fn with_selector(mut self, selector: SourceSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Probes, selects and emits the first `Load`. Starts the heap sampler.
    ///
    /// Calling `start` again after the first time is a no-op.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Created {
            return Ok(());
        }
        self.refresh_snapshot();
        let selection = self.select();
        self.recovery.current_tier = selection.tier;
        info!(
            session_id = %self.id,
            device = self.snapshot.device_class.as_str(),
            connection = self.snapshot.connection_class.as_str(),
            tier = selection.tier.as_str(),
            candidates = selection.candidates.len(),
            catalog_id = %self.catalog.config_id(),
            "playback session started"
        );
        self.adopt(selection);
        self.spawn_sampler();
        self.load_current()
    }

    pub fn on_media_event(&mut self, event: MediaEvent) -> Result<(), SessionError> {
        if self.phase.is_terminal() {
            debug!(session_id = %self.id, ?event, "event ignored after terminal action");
            return Ok(());
        }
        if self.phase == SessionPhase::Created {
            debug!(session_id = %self.id, ?event, "event ignored before start");
            return Ok(());
        }
        let now = self.now_ms();
        match event {
            MediaEvent::LoadStart => {
                self.load_started_ms = Some(now);
            }
            MediaEvent::LoadedMetadata => {
                debug!(session_id = %self.id, "metadata loaded");
            }
            MediaEvent::CanPlay => {
                if let Some(start) = self.load_started_ms.take() {
                    self.performance.lock().record_load(now.saturating_sub(start));
                }
                self.cancel_retry();
                self.recovery.reset_after_success();
                self.phase = SessionPhase::Playing;
                info!(
                    session_id = %self.id,
                    uri = self.current_source().map(|s| s.uri.as_str()).unwrap_or(""),
                    tier = self.recovery.current_tier.as_str(),
                    "playback started"
                );
            }
            MediaEvent::Stalled => {
                self.performance.lock().record_stall(now);
            }
            MediaEvent::Error(error) => return self.handle_failure(error),
        }
        Ok(())
    }

    /// Re-probes wholesale and re-selects, never above the source in use.
    ///
    /// A pending retry is left alone unless the capped selection prefers a
    /// different, lower source.
    pub fn on_environment_event(&mut self, event: EnvironmentEvent) -> Result<(), SessionError> {
        if self.phase.is_terminal() {
            return Ok(());
        }
        self.refresh_snapshot();
        match event {
            EnvironmentEvent::Online => {
                self.network.set_online(true);
            }
            EnvironmentEvent::Offline => {
                self.network.set_online(false);
            }
            _ => {}
        }
        debug!(
            session_id = %self.id,
            ?event,
            connection = self.snapshot.connection_class.as_str(),
            "capabilities re-evaluated"
        );
        if self.phase == SessionPhase::Created {
            return Ok(());
        }

        let ceiling = self
            .current_source()
            .map_or(self.recovery.current_tier, |source| source.quality_tier)
            .min(self.recovery.current_tier);
        let selection = self.select_within(ceiling);
        if selection.candidates.is_empty() {
            return Ok(());
        }
        if selection.tier < self.recovery.current_tier {
            self.recovery.current_tier = selection.tier;
        }
        let current_uri = self.current_source().map(|s| s.uri.clone());
        let next_uri = selection.candidates.first().map(|s| s.uri.clone());
        if current_uri == next_uri {
            self.preload = selection.preload;
            self.candidates = selection.candidates;
            self.cursor = 0;
            return Ok(());
        }
        info!(
            session_id = %self.id,
            from = current_uri.as_deref().unwrap_or(""),
            to = next_uri.as_deref().unwrap_or(""),
            "switching source after environment change"
        );
        self.cancel_retry();
        self.adopt(selection);
        self.load_current()
    }

    /// Explicit reset entry point: zeroes the retry count, keeps the tier.
    pub fn reset(&mut self) {
        self.recovery.reset_after_success();
    }

    /// Stops timers and marks the session closed.
    pub fn close(mut self) {
        self.shutdown();
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn snapshot(&self) -> &CapabilitySnapshot {
        &self.snapshot
    }

    pub fn recovery_state(&self) -> &RecoveryState {
        &self.recovery
    }

    pub fn history(&self) -> &ErrorHistory {
        &self.history
    }

    pub fn candidates(&self) -> &SourceCandidateList {
        &self.candidates
    }

    pub fn current_source(&self) -> Option<&SourceDescriptor> {
        self.candidates.get(self.cursor)
    }

    pub fn preload(&self) -> PreloadHint {
        self.preload
    }

    pub fn network_status(&self) -> NetworkStatus {
        self.network.status()
    }

    pub fn performance_sample(&self) -> PerformanceSample {
        self.performance.lock().sample()
    }

    /// True while a backoff timer is waiting to emit a `Load`.
    pub fn retry_pending(&self) -> bool {
        self.retry_timer
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    fn handle_failure(&mut self, error: MediaError) -> Result<(), SessionError> {
        let now = self.now_ms();
        let context = ErrorContext {
            source: self.current_source().cloned(),
            load_time_ms: self.load_started_ms.map(|start| now.saturating_sub(start)),
            network: self.network.status(),
            connection: self.network.connection_class(),
            performance: self.performance.lock().sample(),
        };
        let kind = self.classifier.classify(&error, &context);
        let record = ErrorRecord {
            kind,
            raw_cause: error.message,
            context,
            timestamp_ms: now,
            retry_count_at_time: self.recovery.retry_count,
        };
        let network = self.network.status();
        let action = self.planner.plan(&record, &mut self.recovery, &network);
        warn!(
            session_id = %self.id,
            kind = kind.as_str(),
            action = action.as_str(),
            retry_count = self.recovery.retry_count,
            cause = %record.raw_cause,
            "playback failure"
        );
        self.history.append(record);
        self.apply(action)
    }

    fn apply(&mut self, action: RecoveryAction) -> Result<(), SessionError> {
        match action {
            RecoveryAction::Retry { delay_ms } => {
                if self.cursor + 1 < self.candidates.len() {
                    if let Some(failed) = self.current_source().map(|s| s.uri.clone()) {
                        self.degraded_uris.insert(failed);
                    }
                    self.cursor += 1;
                }
                self.schedule_retry(delay_ms)
            }
            RecoveryAction::ReduceQuality { from, to, reason } => {
                if let Some(failed) = self.current_source().map(|s| s.uri.clone()) {
                    self.degraded_uris.insert(failed);
                }
                self.cancel_retry();
                let selection = self.select();
                if selection.candidates.is_empty() {
                    info!(session_id = %self.id, "no lower-quality source left");
                    return self.enter_static_fallback();
                }
                debug!(
                    session_id = %self.id,
                    from = from.as_str(),
                    to = to.as_str(),
                    reason = reason.as_str(),
                    "reducing quality"
                );
                self.adopt(selection);
                self.load_current()
            }
            RecoveryAction::StaticFallback => self.enter_static_fallback(),
            RecoveryAction::DisableVideo => self.enter_disabled(),
        }
    }

    fn select(&self) -> Selection {
        self.select_within(self.recovery.current_tier)
    }

    /// Selection capped at `ceiling`, minus sources already failed away from.
    fn select_within(&self, ceiling: QualityTier) -> Selection {
        let mut selection = self
            .selector
            .select_capped(&self.snapshot, &self.catalog, ceiling);
        if !self.degraded_uris.is_empty() {
            selection.candidates = selection
                .candidates
                .iter()
                .filter(|source| !self.degraded_uris.contains(&source.uri))
                .cloned()
                .collect();
        }
        selection
    }

    fn adopt(&mut self, selection: Selection) {
        self.candidates = selection.candidates;
        self.preload = selection.preload;
        self.cursor = 0;
    }

    fn load_current(&mut self) -> Result<(), SessionError> {
        let Some(source) = self.current_source().cloned() else {
            return self.enter_static_fallback();
        };
        self.phase = SessionPhase::Loading;
        self.load_started_ms = Some(self.now_ms());
        info!(
            session_id = %self.id,
            uri = %source.uri,
            tier = source.quality_tier.as_str(),
            preload = self.preload.as_str(),
            "loading source"
        );
        self.emit(SessionDirective::Load {
            source,
            preload: self.preload,
        })
    }

    fn schedule_retry(&mut self, delay_ms: u64) -> Result<(), SessionError> {
        self.cancel_retry();
        let Some(source) = self.current_source().cloned() else {
            return self.enter_static_fallback();
        };
        if self.directives.is_closed() {
            return Err(SessionError::ReceiverDropped);
        }
        self.phase = SessionPhase::Loading;
        self.load_started_ms = None;
        let preload = self.preload;
        let tx = self.directives.clone();
        let id = self.id;
        debug!(session_id = %id, delay_ms, uri = %source.uri, "retry scheduled");
        self.retry_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            debug!(session_id = %id, uri = %source.uri, "retry timer fired");
            let _ = tx.send(SessionDirective::Load { source, preload });
        }));
        Ok(())
    }

    fn spawn_sampler(&mut self) {
        let performance = Arc::clone(&self.performance);
        let source = Arc::clone(self.probe.source());
        let period = Duration::from_millis(self.config.memory_sample_interval_ms);
        let started = self.started;
        self.sampler = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                if let Some(heap) = source.heap_usage() {
                    let timestamp_ms = started.elapsed().as_millis() as u64;
                    performance.lock().record_memory(heap, timestamp_ms);
                }
            }
        }));
    }

    fn enter_static_fallback(&mut self) -> Result<(), SessionError> {
        self.stop_timers();
        self.phase = SessionPhase::StaticFallback;
        info!(session_id = %self.id, "showing static fallback");
        self.emit(SessionDirective::ShowStaticFallback)
    }

    fn enter_disabled(&mut self) -> Result<(), SessionError> {
        self.stop_timers();
        self.phase = SessionPhase::Disabled;
        info!(session_id = %self.id, "video disabled for session");
        self.emit(SessionDirective::DisableVideo)
    }

    fn refresh_snapshot(&mut self) {
        self.snapshot = self.probe.snapshot();
        self.network.observe(&self.snapshot);
        self.performance
            .lock()
            .set_device_memory(self.snapshot.device_memory_gb);
    }

    fn emit(&self, directive: SessionDirective) -> Result<(), SessionError> {
        self.directives
            .send(directive)
            .map_err(|_| SessionError::ReceiverDropped)
    }

    fn cancel_retry(&mut self) {
        if let Some(handle) = self.retry_timer.take() {
            handle.abort();
        }
    }

    fn stop_timers(&mut self) {
        self.cancel_retry();
        if let Some(handle) = self.sampler.take() {
            handle.abort();
        }
    }

    fn shutdown(&mut self) {
        self.stop_timers();
        if self.phase != SessionPhase::Closed {
            debug!(session_id = %self.id, "playback session closed");
        }
        self.phase = SessionPhase::Closed;
    }

    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.stop_timers();
    }
}
