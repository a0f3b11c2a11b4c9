//! Online/offline and connection-class tracking.
use serde::Serialize;

use crate::capability::{CapabilitySnapshot, ConnectionClass};

const SLOW_DOWNLINK_MBPS: f64 = 1.5;

/// Last-known network condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NetworkStatus {
    pub online: bool,
    /// Connection is slow-2g/2g or measured bandwidth is under 1.5 Mbps.
    pub slow: bool,
    pub save_data: bool,
}

impl Default for NetworkStatus {
    fn default() -> Self {
        Self {
            online: true,
            slow: false,
            save_data: false,
        }
    }
}

/// Tracks network transitions for one playback session.
#[derive(Debug, Clone)]
pub struct NetworkMonitor {
    online: bool,
    connection: ConnectionClass,
    downlink_mbps: Option<f64>,
    save_data: bool,
}

impl NetworkMonitor {
    /// Creates a monitor assuming an online 4g link until told otherwise.
    pub fn new() -> Self {
        Self {
            online: true,
            connection: ConnectionClass::FourG,
            downlink_mbps: None,
            save_data: false,
        }
    }

    /// Seeds a monitor from a capability snapshot.
    pub fn from_snapshot(snapshot: &CapabilitySnapshot) -> Self {
        let mut monitor = Self::new();
        monitor.observe(snapshot);
        monitor
    }

    /// Pure read of the last-known state.
    pub fn status(&self) -> NetworkStatus {
        let slow_class = matches!(
            self.connection,
            ConnectionClass::Slow2g | ConnectionClass::TwoG
        );
        let slow_link = self
            .downlink_mbps
            .map_or(false, |mbps| mbps < SLOW_DOWNLINK_MBPS);
        NetworkStatus {
            online: self.online,
            slow: slow_class || slow_link,
            save_data: self.save_data,
        }
    }

    pub fn connection_class(&self) -> ConnectionClass {
        self.connection
    }

    /// Applies an online/offline signal. Returns whether `status()` changed.
    pub fn set_online(&mut self, online: bool) -> bool {
        let before = self.status();
        self.online = online;
        if online && self.connection == ConnectionClass::Offline {
            // The next connection-change signal will carry the real class.
            self.connection = ConnectionClass::FourG;
        }
        if !online {
            self.connection = ConnectionClass::Offline;
        }
        before != self.status()
    }

    /// Applies a connection-change signal. Returns whether `status()` changed.
    pub fn on_connection_change(
        &mut self,
        connection: ConnectionClass,
        downlink_mbps: Option<f64>,
        save_data: bool,
    ) -> bool {
        let before = self.status();
        self.connection = connection;
        self.online = connection != ConnectionClass::Offline;
        self.downlink_mbps = downlink_mbps;
        self.save_data = save_data;
        before != self.status()
    }

    /// Re-syncs from a freshly probed snapshot.
    ///
    /// The online flag only moves when the snapshot carries a real reading;
    /// otherwise the last `set_online` signal stands.
    pub fn observe(&mut self, snapshot: &CapabilitySnapshot) -> bool {
        let before = self.status();
        match snapshot.online {
            Some(online) => self.online = online,
            None if snapshot.connection_class == ConnectionClass::Offline => self.online = false,
            None => {}
        }
        self.connection = if self.online {
            snapshot.connection_class
        } else {
            ConnectionClass::Offline
        };
        self.downlink_mbps = snapshot.downlink_mbps;
        self.save_data = snapshot.save_data;
        before != self.status()
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}
