//! Runtime monitors consulted while recovering from playback failures.
//!
//! Both monitors are plain owned state updated by the caller; reads never
//! block and never touch the environment.
pub mod network;
pub mod performance;

pub use network::{NetworkMonitor, NetworkStatus};
pub use performance::{PerformanceMonitor, PerformanceSample};
