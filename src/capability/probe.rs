//! Classification of raw signals into a [`CapabilitySnapshot`].
use std::sync::Arc;

use super::{CapabilitySnapshot, CapabilitySource, ConnectionClass, DeviceClass, ThermalState};

const MOBILE_MAX_WIDTH: u32 = 767;
const TABLET_MAX_WIDTH: u32 = 1199;
const LOW_END_MEMORY_GB: f64 = 2.0;
const LOW_END_MIN_WIDTH: u32 = 360;
const LOW_END_DENSE_PIXEL_RATIO: f64 = 2.5;

const MOBILE_UA_TOKENS: &[&str] = &[
    "iphone",
    "ipod",
    "blackberry",
    "iemobile",
    "opera mini",
    "windows phone",
    "webos",
];
const TABLET_UA_TOKENS: &[&str] = &["ipad", "tablet", "kindle", "silk", "playbook"];

/// Reads a [`CapabilitySource`] and classifies it.
///
/// The probe holds no state beyond the source handle: every call to
/// [`snapshot`](Self::snapshot) reads the source afresh.
#[derive(Clone)]
pub struct CapabilityProbe {
    source: Arc<dyn CapabilitySource>,
}

impl std::fmt::Debug for CapabilityProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityProbe").finish_non_exhaustive()
    }
}

impl CapabilityProbe {
    pub fn new(source: Arc<dyn CapabilitySource>) -> Self {
        Self { source }
    }

    /// Underlying signal source.
    pub fn source(&self) -> &Arc<dyn CapabilitySource> {
        &self.source
    }

    /// Produces a snapshot of the current ambient state.
    ///
    /// # Guarantees
    /// * Never fails; unreadable signals resolve to documented defaults.
    /// * No caching across calls.
    pub fn snapshot(&self) -> CapabilitySnapshot {
        let src = self.source.as_ref();
        let viewport_width = src.viewport().map(|v| v.width);
        let user_agent = src.user_agent().map(|ua| ua.to_ascii_lowercase());

        let device_class = classify_device(user_agent.as_deref(), viewport_width);

        let pixel_ratio = src
            .pixel_ratio()
            .filter(|ratio| ratio.is_finite() && *ratio > 0.0)
            .unwrap_or(1.0);

        let downlink_mbps = src
            .downlink_mbps()
            .filter(|mbps| mbps.is_finite() && *mbps >= 0.0);
        let online = src.online();
        let connection_class = classify_connection(
            online,
            src.effective_type().as_deref(),
            downlink_mbps,
            device_class,
        );

        let battery = src.battery().unwrap_or_default();
        let battery_level = battery
            .level
            .filter(|level| !level.is_nan())
            .map(|level| level.clamp(0.0, 1.0));

        let thermal_state = src
            .thermal_state()
            .map(|state| ThermalState::parse(&state))
            .unwrap_or(ThermalState::Unknown);

        let device_memory_gb = src
            .device_memory_gb()
            .filter(|gb| gb.is_finite() && *gb > 0.0);
        let hardware_acceleration = src.hardware_acceleration().unwrap_or(true);

        let low_end_device = is_low_end(
            device_memory_gb,
            viewport_width,
            pixel_ratio,
            hardware_acceleration,
        );

        CapabilitySnapshot {
            device_class,
            connection_class,
            online,
            pixel_ratio,
            battery_level,
            charging: battery.charging,
            thermal_state,
            low_end_device,
            hardware_acceleration,
            viewport_width,
            downlink_mbps,
            save_data: src.save_data().unwrap_or(false),
            device_memory_gb,
            supports_webm: src.can_play_type("video/webm") == Some(true),
        }
    }
}

fn ua_is_mobile(ua: &str) -> bool {
    MOBILE_UA_TOKENS.iter().any(|token| ua.contains(token))
        || (ua.contains("android") && ua.contains("mobile"))
}

fn ua_is_tablet(ua: &str) -> bool {
    TABLET_UA_TOKENS.iter().any(|token| ua.contains(token))
        || (ua.contains("android") && !ua.contains("mobile"))
}

/// Mobile wins over tablet, tablet over desktop. `ua` must be lowercase.
pub(crate) fn classify_device(ua: Option<&str>, width: Option<u32>) -> DeviceClass {
    let ua = ua.unwrap_or("");
    if ua_is_mobile(ua) || width.map_or(false, |w| w <= MOBILE_MAX_WIDTH) {
        return DeviceClass::Mobile;
    }
    let tablet_width = width.map_or(false, |w| w > MOBILE_MAX_WIDTH && w <= TABLET_MAX_WIDTH);
    if ua_is_tablet(ua) || tablet_width {
        return DeviceClass::Tablet;
    }
    DeviceClass::Desktop
}

pub(crate) fn classify_connection(
    online: Option<bool>,
    effective_type: Option<&str>,
    downlink_mbps: Option<f64>,
    device: DeviceClass,
) -> ConnectionClass {
    if online == Some(false) {
        return ConnectionClass::Offline;
    }
    if let Some(class) = effective_type.and_then(ConnectionClass::parse) {
        return class;
    }
    if let Some(mbps) = downlink_mbps {
        return ConnectionClass::from_downlink(mbps);
    }
    match device {
        DeviceClass::Desktop => ConnectionClass::FourG,
        DeviceClass::Mobile | DeviceClass::Tablet => ConnectionClass::ThreeG,
    }
}

pub(crate) fn is_low_end(
    device_memory_gb: Option<f64>,
    width: Option<u32>,
    pixel_ratio: f64,
    hardware_acceleration: bool,
) -> bool {
    if device_memory_gb.map_or(false, |gb| gb < LOW_END_MEMORY_GB) {
        return true;
    }
    if let Some(w) = width {
        if w < LOW_END_MIN_WIDTH {
            return true;
        }
        if w <= MOBILE_MAX_WIDTH && pixel_ratio > LOW_END_DENSE_PIXEL_RATIO {
            return true;
        }
    }
    !hardware_acceleration
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{BatteryStatus, SignalSet, Viewport};

    const IPHONE_UA: &str =
        "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 Mobile/15E148";
    const IPAD_UA: &str = "Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X) AppleWebKit/605.1.15";
    const ANDROID_TABLET_UA: &str = "Mozilla/5.0 (Linux; Android 13; SM-X700) AppleWebKit/537.36";
    const DESKTOP_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 Chrome/126.0";

    fn probe(signals: SignalSet) -> CapabilitySnapshot {
        CapabilityProbe::new(Arc::new(signals)).snapshot()
    }

    fn viewport(width: u32) -> Option<Viewport> {
        Some(Viewport { width, height: 900 })
    }

    #[test]
    fn device_class_from_user_agent() {
        let iphone = IPHONE_UA.to_ascii_lowercase();
        let ipad = IPAD_UA.to_ascii_lowercase();
        let android_tablet = ANDROID_TABLET_UA.to_ascii_lowercase();
        let desktop = DESKTOP_UA.to_ascii_lowercase();
        assert_eq!(classify_device(Some(iphone.as_str()), Some(1400)), DeviceClass::Mobile);
        assert_eq!(classify_device(Some(ipad.as_str()), Some(1400)), DeviceClass::Tablet);
        assert_eq!(
            classify_device(Some(android_tablet.as_str()), Some(1400)),
            DeviceClass::Tablet
        );
        assert_eq!(classify_device(Some(desktop.as_str()), Some(1400)), DeviceClass::Desktop);
    }

    #[test]
    fn device_class_from_width_boundaries() {
        assert_eq!(classify_device(None, Some(767)), DeviceClass::Mobile);
        assert_eq!(classify_device(None, Some(768)), DeviceClass::Tablet);
        assert_eq!(classify_device(None, Some(1199)), DeviceClass::Tablet);
        assert_eq!(classify_device(None, Some(1200)), DeviceClass::Desktop);
        assert_eq!(classify_device(None, None), DeviceClass::Desktop);
    }

    #[test]
    fn connection_prefers_effective_type_then_downlink_then_default() {
        assert_eq!(
            classify_connection(None, Some("2g"), Some(50.0), DeviceClass::Desktop),
            ConnectionClass::TwoG
        );
        assert_eq!(
            classify_connection(None, Some("bogus"), Some(2.0), DeviceClass::Desktop),
            ConnectionClass::ThreeG
        );
        assert_eq!(
            classify_connection(None, None, None, DeviceClass::Desktop),
            ConnectionClass::FourG
        );
        assert_eq!(
            classify_connection(None, None, None, DeviceClass::Tablet),
            ConnectionClass::ThreeG
        );
        assert_eq!(
            classify_connection(Some(false), Some("4g"), None, DeviceClass::Desktop),
            ConnectionClass::Offline
        );
    }

    #[test]
    fn low_end_rules() {
        assert!(is_low_end(Some(1.0), Some(1400), 1.0, true));
        assert!(is_low_end(None, Some(320), 1.0, true));
        assert!(is_low_end(None, Some(412), 2.75, true));
        assert!(!is_low_end(None, Some(412), 2.5, true));
        assert!(is_low_end(None, Some(1400), 1.0, false));
        assert!(!is_low_end(Some(8.0), Some(1400), 2.0, true));
    }

    #[test]
    fn empty_source_yields_defaults() {
        let snap = probe(SignalSet::default());
        assert_eq!(snap.device_class, DeviceClass::Desktop);
        assert_eq!(snap.connection_class, ConnectionClass::FourG);
        assert_eq!(snap.pixel_ratio, 1.0);
        assert_eq!(snap.battery_level, None);
        assert_eq!(snap.charging, None);
        assert_eq!(snap.thermal_state, ThermalState::Unknown);
        assert!(snap.hardware_acceleration);
        assert!(!snap.low_end_device);
        assert!(!snap.supports_webm);
    }

    #[test]
    fn invalid_readings_are_sanitized() {
        let snap = probe(SignalSet {
            pixel_ratio: Some(-2.0),
            battery: Some(BatteryStatus {
                level: Some(1.7),
                charging: None,
            }),
            downlink_mbps: Some(f64::NAN),
            ..SignalSet::default()
        });
        assert_eq!(snap.pixel_ratio, 1.0);
        assert_eq!(snap.battery_level, Some(1.0));
        assert_eq!(snap.downlink_mbps, None);
    }

    #[test]
    fn snapshot_reads_source_every_call() {
        let signals = SignalSet {
            viewport: viewport(390),
            pixel_ratio: Some(3.0),
            effective_type: Some("4g".into()),
            webm_playable: Some(true),
            ..SignalSet::default()
        };
        let probe = CapabilityProbe::new(Arc::new(signals));
        let first = probe.snapshot();
        let second = probe.snapshot();
        assert_eq!(first, second);
        assert_eq!(first.device_class, DeviceClass::Mobile);
        assert!(first.supports_webm);
        assert!(first.low_end_device);
    }
}
