//! Adaptive background-video source selection and playback failure recovery.
//!
//! Reconciles device capability signals into a deterministic, quality-ordered
//! list of video sources, then classifies runtime playback failures and drives
//! a bounded recovery policy: retry, degrade quality, static fallback, disable.
//! The decision core is pure; [`session::PlaybackSession`] is the thin tokio
//! adapter that owns timers and talks to the playback surface.

pub mod capability;
pub mod catalog;
pub mod config;
pub mod monitor;
pub mod recovery;
pub mod ring;
pub mod selector;
pub mod session;

pub use capability::{
    CapabilityProbe, CapabilitySnapshot, CapabilitySource, ConnectionClass, DeviceClass, SignalSet,
    ThermalState,
};
pub use catalog::{CatalogEntry, CatalogError, QualityTier, SourceCatalog, SourceDescriptor};
pub use config::{ConfigError, EngineConfig};
pub use monitor::{NetworkMonitor, NetworkStatus, PerformanceMonitor, PerformanceSample};
pub use recovery::{
    DegradeReason, ErrorClassifier, ErrorContext, ErrorHistory, ErrorKind, ErrorRecord, MediaError,
    MediaErrorCode, RecoveryAction, RecoveryPlanner, RecoveryState,
};
pub use selector::{PreloadHint, Selection, SourceCandidateList, SourceSelector};
pub use session::{EnvironmentEvent, MediaEvent, PlaybackSession, SessionDirective, SessionError, SessionPhase};
