//! Device and network capability signals.
//!
//! Every ambient API a host may or may not expose (viewport, user agent,
//! connection, battery, thermal, memory, codec support) sits behind the
//! [`CapabilitySource`] trait with per-signal optionality. The probe turns
//! whatever is available into one immutable [`CapabilitySnapshot`]; decision
//! logic downstream never branches on API availability.
use serde::{Deserialize, Serialize};

pub mod probe;

pub use probe::CapabilityProbe;

/// Coarse screen class used to key the source catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Mobile,
    Tablet,
    Desktop,
}

impl DeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Mobile => "mobile",
            DeviceClass::Tablet => "tablet",
            DeviceClass::Desktop => "desktop",
        }
    }
}

/// Effective connection class, ordered from worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConnectionClass {
    #[serde(rename = "offline")]
    Offline,
    #[serde(rename = "slow-2g")]
    Slow2g,
    #[serde(rename = "2g")]
    TwoG,
    #[serde(rename = "3g")]
    ThreeG,
    #[serde(rename = "4g")]
    FourG,
    #[serde(rename = "wifi")]
    Wifi,
}

impl ConnectionClass {
    /// Parses an effective-type string as reported by the host.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "offline" | "none" => Some(ConnectionClass::Offline),
            "slow-2g" => Some(ConnectionClass::Slow2g),
            "2g" => Some(ConnectionClass::TwoG),
            "3g" => Some(ConnectionClass::ThreeG),
            "4g" => Some(ConnectionClass::FourG),
            "wifi" | "ethernet" => Some(ConnectionClass::Wifi),
            _ => None,
        }
    }

    /// Derives a class from measured downlink bandwidth.
    pub fn from_downlink(mbps: f64) -> Self {
        if mbps >= 10.0 {
            ConnectionClass::FourG
        } else if mbps >= 1.5 {
            ConnectionClass::ThreeG
        } else if mbps >= 0.15 {
            ConnectionClass::TwoG
        } else {
            ConnectionClass::Slow2g
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionClass::Offline => "offline",
            ConnectionClass::Slow2g => "slow-2g",
            ConnectionClass::TwoG => "2g",
            ConnectionClass::ThreeG => "3g",
            ConnectionClass::FourG => "4g",
            ConnectionClass::Wifi => "wifi",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThermalState {
    Nominal,
    Fair,
    Serious,
    Critical,
    Unknown,
}

impl ThermalState {
    /// Parses a host thermal-state string; anything unrecognized is `Unknown`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "nominal" => ThermalState::Nominal,
            "fair" => ThermalState::Fair,
            "serious" => ThermalState::Serious,
            "critical" => ThermalState::Critical,
            _ => ThermalState::Unknown,
        }
    }

    /// True for any reported state above nominal.
    pub fn is_elevated(&self) -> bool {
        !matches!(self, ThermalState::Nominal | ThermalState::Unknown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Battery reading; each half may be missing independently.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BatteryStatus {
    pub level: Option<f64>,
    pub charging: Option<bool>,
}

/// JS-heap style memory usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapUsage {
    pub used_bytes: u64,
    pub limit_bytes: u64,
}

impl HeapUsage {
    /// Used/limit ratio, or `None` when the limit is zero.
    pub fn ratio(&self) -> Option<f64> {
        if self.limit_bytes == 0 {
            None
        } else {
            Some(self.used_bytes as f64 / self.limit_bytes as f64)
        }
    }
}

/// Ambient signal provider implemented by the host environment.
///
/// Every method defaults to `None` so implementors only override the signals
/// they can actually read. Reads must not block.
pub trait CapabilitySource: Send + Sync {
    fn viewport(&self) -> Option<Viewport> {
        None
    }

    fn user_agent(&self) -> Option<String> {
        None
    }

    fn effective_type(&self) -> Option<String> {
        None
    }

    fn downlink_mbps(&self) -> Option<f64> {
        None
    }

    fn save_data(&self) -> Option<bool> {
        None
    }

    fn online(&self) -> Option<bool> {
        None
    }

    fn battery(&self) -> Option<BatteryStatus> {
        None
    }

    fn thermal_state(&self) -> Option<String> {
        None
    }

    fn device_memory_gb(&self) -> Option<f64> {
        None
    }

    fn heap_usage(&self) -> Option<HeapUsage> {
        None
    }

    fn pixel_ratio(&self) -> Option<f64> {
        None
    }

    fn hardware_acceleration(&self) -> Option<bool> {
        None
    }

    /// Whether the playback surface can decode `mime`.
    fn can_play_type(&self, _mime: &str) -> Option<bool> {
        None
    }
}

/// Plain-data signal set, for hosts that push readings in and for fixtures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalSet {
    pub viewport: Option<Viewport>,
    pub user_agent: Option<String>,
    pub effective_type: Option<String>,
    pub downlink_mbps: Option<f64>,
    pub save_data: Option<bool>,
    pub online: Option<bool>,
    pub battery: Option<BatteryStatus>,
    pub thermal_state: Option<String>,
    pub device_memory_gb: Option<f64>,
    pub heap_usage: Option<HeapUsage>,
    pub pixel_ratio: Option<f64>,
    pub hardware_acceleration: Option<bool>,
    pub webm_playable: Option<bool>,
}

impl CapabilitySource for SignalSet {
    fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    fn user_agent(&self) -> Option<String> {
        self.user_agent.clone()
    }

    fn effective_type(&self) -> Option<String> {
        self.effective_type.clone()
    }

    fn downlink_mbps(&self) -> Option<f64> {
        self.downlink_mbps
    }

    fn save_data(&self) -> Option<bool> {
        self.save_data
    }

    fn online(&self) -> Option<bool> {
        self.online
    }

    fn battery(&self) -> Option<BatteryStatus> {
        self.battery
    }

    fn thermal_state(&self) -> Option<String> {
        self.thermal_state.clone()
    }

    fn device_memory_gb(&self) -> Option<f64> {
        self.device_memory_gb
    }

    fn heap_usage(&self) -> Option<HeapUsage> {
        self.heap_usage
    }

    fn pixel_ratio(&self) -> Option<f64> {
        self.pixel_ratio
    }

    fn hardware_acceleration(&self) -> Option<bool> {
        self.hardware_acceleration
    }

    fn can_play_type(&self, mime: &str) -> Option<bool> {
        if mime.starts_with("video/webm") {
            self.webm_playable
        } else {
            None
        }
    }
}

/// One consistent read of every ambient signal.
///
/// Snapshots are never patched in place; any capability-affecting event
/// produces a fresh one via [`CapabilityProbe::snapshot`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapabilitySnapshot {
    pub device_class: DeviceClass,
    pub connection_class: ConnectionClass,
    /// Raw online reading; `None` when the host cannot tell.
    pub online: Option<bool>,
    pub pixel_ratio: f64,
    pub battery_level: Option<f64>,
    pub charging: Option<bool>,
    pub thermal_state: ThermalState,
    pub low_end_device: bool,
    pub hardware_acceleration: bool,
    pub viewport_width: Option<u32>,
    pub downlink_mbps: Option<f64>,
    pub save_data: bool,
    pub device_memory_gb: Option<f64>,
    pub supports_webm: bool,
}

impl CapabilitySnapshot {
    /// Battery below 20% with no charger attached. Unknown charging counts as
    /// not charging; unknown level never counts as low.
    pub fn battery_low(&self) -> bool {
        match self.battery_level {
            Some(level) => level < 0.2 && self.charging != Some(true),
            None => false,
        }
    }
}
