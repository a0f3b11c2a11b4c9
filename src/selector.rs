//! Source selection: capability snapshot + catalog → ordered candidates.
//!
//! Selection is referentially transparent. The selector holds only its
//! lookup tables; identical inputs always produce identical output.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::capability::{CapabilitySnapshot, ConnectionClass, DeviceClass};
use crate::catalog::{QualityTier, SourceCatalog, SourceDescriptor};

const RETINA_PIXEL_RATIO: f64 = 2.0;

/// How eagerly the playback surface should fetch the video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreloadHint {
    None,
    Metadata,
    Auto,
}

impl PreloadHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreloadHint::None => "none",
            PreloadHint::Metadata => "metadata",
            PreloadHint::Auto => "auto",
        }
    }
}

/// Ordered, uri-unique list of sources, most preferred first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceCandidateList {
    items: Vec<SourceDescriptor>,
}

impl SourceCandidateList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `source` unless its uri is already present.
    pub fn push(&mut self, source: SourceDescriptor) -> bool {
        if self.items.contains(&source) {
            return false;
        }
        self.items.push(source);
        true
    }

    pub fn first(&self) -> Option<&SourceDescriptor> {
        self.items.first()
    }

    pub fn get(&self, index: usize) -> Option<&SourceDescriptor> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceDescriptor> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[SourceDescriptor] {
        &self.items
    }

    pub fn position(&self, uri: &str) -> Option<usize> {
        self.items.iter().position(|source| source.uri == uri)
    }
}

impl FromIterator<SourceDescriptor> for SourceCandidateList {
    fn from_iter<I: IntoIterator<Item = SourceDescriptor>>(iter: I) -> Self {
        let mut list = SourceCandidateList::new();
        for source in iter {
            list.push(source);
        }
        list
    }
}

/// Result of one selection call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub candidates: SourceCandidateList,
    pub preload: PreloadHint,
    /// Tier of the primary candidate.
    pub tier: QualityTier,
}

/// Tier for one connection class, optionally refined by device class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TierRule {
    Fixed(QualityTier),
    PerDevice {
        mobile: QualityTier,
        tablet: QualityTier,
        desktop: QualityTier,
    },
}

impl TierRule {
    fn resolve(&self, device: DeviceClass) -> QualityTier {
        match *self {
            TierRule::Fixed(tier) => tier,
            TierRule::PerDevice {
                mobile,
                tablet,
                desktop,
            } => match device {
                DeviceClass::Mobile => mobile,
                DeviceClass::Tablet => tablet,
                DeviceClass::Desktop => desktop,
            },
        }
    }
}

/// Connection class → tier rule. Unlisted classes resolve to `Low`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierTable {
    rules: BTreeMap<ConnectionClass, TierRule>,
}

impl TierTable {
    pub fn empty() -> Self {
        Self {
            rules: BTreeMap::new(),
        }
    }

    pub fn with_rule(mut self, connection: ConnectionClass, rule: TierRule) -> Self {
        self.rules.insert(connection, rule);
        self
    }

    pub fn resolve(&self, connection: ConnectionClass, device: DeviceClass) -> QualityTier {
        self.rules
            .get(&connection)
            .map_or(QualityTier::Low, |rule| rule.resolve(device))
    }
}

impl Default for TierTable {
    fn default() -> Self {
        use QualityTier::{High, Low, Medium};
        TierTable::empty()
            .with_rule(ConnectionClass::Offline, TierRule::Fixed(Low))
            .with_rule(ConnectionClass::Slow2g, TierRule::Fixed(Low))
            .with_rule(ConnectionClass::TwoG, TierRule::Fixed(Low))
            .with_rule(
                ConnectionClass::ThreeG,
                TierRule::PerDevice {
                    mobile: Low,
                    tablet: Low,
                    desktop: Medium,
                },
            )
            .with_rule(
                ConnectionClass::FourG,
                TierRule::PerDevice {
                    mobile: Low,
                    tablet: Medium,
                    desktop: High,
                },
            )
            .with_rule(
                ConnectionClass::Wifi,
                TierRule::PerDevice {
                    mobile: Low,
                    tablet: High,
                    desktop: High,
                },
            )
    }
}

/// (device class, connection class) → preload hint, default `Metadata`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadTable {
    hints: BTreeMap<(DeviceClass, ConnectionClass), PreloadHint>,
}

impl PreloadTable {
    pub fn empty() -> Self {
        Self {
            hints: BTreeMap::new(),
        }
    }

    pub fn with_hint(mut self, device: DeviceClass, connection: ConnectionClass, hint: PreloadHint) -> Self {
        self.hints.insert((device, connection), hint);
        self
    }

    pub fn lookup(&self, device: DeviceClass, connection: ConnectionClass) -> PreloadHint {
        self.hints
            .get(&(device, connection))
            .copied()
            .unwrap_or(PreloadHint::Metadata)
    }
}

impl Default for PreloadTable {
    fn default() -> Self {
        let mut table = PreloadTable::empty()
            .with_hint(DeviceClass::Desktop, ConnectionClass::Wifi, PreloadHint::Auto)
            .with_hint(DeviceClass::Desktop, ConnectionClass::FourG, PreloadHint::Auto)
            .with_hint(DeviceClass::Tablet, ConnectionClass::Wifi, PreloadHint::Auto);
        for device in [DeviceClass::Mobile, DeviceClass::Tablet, DeviceClass::Desktop] {
            for connection in [ConnectionClass::Offline, ConnectionClass::Slow2g, ConnectionClass::TwoG] {
                table = table.with_hint(device, connection, PreloadHint::None);
            }
        }
        table
    }
}

#[derive(Debug, Clone, Default)]
pub struct SourceSelector {
    tiers: TierTable,
    preload: PreloadTable,
}

impl SourceSelector {
    pub fn new(tiers: TierTable, preload: PreloadTable) -> Self {
        Self { tiers, preload }
    }

    /// Tier for `snapshot` before any catalog lookup.
    pub fn resolve_tier(&self, snapshot: &CapabilitySnapshot) -> QualityTier {
        let base = self
            .tiers
            .resolve(snapshot.connection_class, snapshot.device_class);
        let fast_link = matches!(
            snapshot.connection_class,
            ConnectionClass::FourG | ConnectionClass::Wifi
        );
        if snapshot.device_class == DeviceClass::Mobile
            && snapshot.pixel_ratio > RETINA_PIXEL_RATIO
            && fast_link
            && base == QualityTier::Low
        {
            return QualityTier::Medium;
        }
        base
    }

    /// Preload hint after resource-pressure degradation.
    pub fn preload_hint(&self, snapshot: &CapabilitySnapshot) -> PreloadHint {
        if snapshot.low_end_device
            || snapshot.battery_low()
            || snapshot.thermal_state.is_elevated()
            || snapshot.save_data
        {
            return PreloadHint::None;
        }
        self.preload
            .lookup(snapshot.device_class, snapshot.connection_class)
    }

    pub fn select(&self, snapshot: &CapabilitySnapshot, catalog: &SourceCatalog) -> Selection {
        self.select_capped(snapshot, catalog, QualityTier::High)
    }

    /// Like [`select`](Self::select) with the resolved tier clamped to
    /// `ceiling`, so re-evaluation never climbs above an earlier degradation.
    pub fn select_capped(
        &self,
        snapshot: &CapabilitySnapshot,
        catalog: &SourceCatalog,
        ceiling: QualityTier,
    ) -> Selection {
        let tier = self.resolve_tier(snapshot).min(ceiling);
        let preload = self.preload_hint(snapshot);
        let device = snapshot.device_class;

        let Some(primary) = catalog.entry(device, tier) else {
            let candidates: SourceCandidateList =
                std::iter::once(catalog.fallback_descriptor()).collect();
            return Selection {
                candidates,
                preload,
                tier: QualityTier::Low,
            };
        };

        let include_webm = snapshot.supports_webm;
        let mut candidates = SourceCandidateList::new();
        for source in primary.descriptors(tier, include_webm) {
            candidates.push(source);
        }
        for (lower, entry) in catalog.tiers_below(device, tier) {
            for source in entry.descriptors(lower, include_webm) {
                candidates.push(source);
            }
        }

        Selection {
            candidates,
            preload,
            tier,
        }
    }
}
