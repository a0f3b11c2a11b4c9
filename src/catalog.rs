//! Static source catalog: device class × quality tier → video asset.
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capability::DeviceClass;
use crate::config::fingerprint;

/// Discrete bitrate/resolution demand level. `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Low,
    Medium,
    High,
}

impl QualityTier {
    /// All tiers, highest first.
    pub const DESCENDING: [QualityTier; 3] = [QualityTier::High, QualityTier::Medium, QualityTier::Low];

    /// Immediate lower neighbour, clamped at `Low`.
    pub fn lower(self) -> Self {
        self.step_down(1)
    }

    /// Drops `steps` tiers, clamped at `Low`.
    pub fn step_down(self, steps: u8) -> Self {
        let rank = (self as u8).saturating_sub(steps);
        match rank {
            0 => QualityTier::Low,
            1 => QualityTier::Medium,
            _ => QualityTier::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Low => "low",
            QualityTier::Medium => "medium",
            QualityTier::High => "high",
        }
    }
}

/// One playable asset handed to the playback surface.
///
/// Identity is the `uri`: two descriptors with the same uri are equal even if
/// their metadata differs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub uri: String,
    pub mime_type: String,
    pub quality_tier: QualityTier,
    pub resolution_label: String,
}

impl PartialEq for SourceDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
    }
}

impl Eq for SourceDescriptor {}

impl Hash for SourceDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uri.hash(state);
    }
}

/// Catalog row for one (device class, tier) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub mp4_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webm_path: Option<String>,
    pub resolution: String,
    pub bitrate_kbps: u32,
}

impl CatalogEntry {
    /// Descriptors for this entry; the WebM variant leads when allowed.
    pub fn descriptors(&self, tier: QualityTier, include_webm: bool) -> Vec<SourceDescriptor> {
        let mut out = Vec::with_capacity(2);
        if include_webm {
            if let Some(webm) = &self.webm_path {
                out.push(SourceDescriptor {
                    uri: webm.clone(),
                    mime_type: "video/webm".into(),
                    quality_tier: tier,
                    resolution_label: self.resolution.clone(),
                });
            }
        }
        out.push(SourceDescriptor {
            uri: self.mp4_path.clone(),
            mime_type: "video/mp4".into(),
            quality_tier: tier,
            resolution_label: self.resolution.clone(),
        });
        out
    }
}

/// Error produced when a catalog document fails to parse or validate.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog decode: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("default fallback asset path is empty")]
    EmptyDefaultAsset,
    #[error("{device}/{tier} entry has an empty mp4 path")]
    EmptyMp4Path { device: &'static str, tier: &'static str },
    #[error("{device}/{tier} entry has an empty webm path")]
    EmptyWebmPath { device: &'static str, tier: &'static str },
    #[error("{device}/{tier} entry has an empty resolution label")]
    EmptyResolution { device: &'static str, tier: &'static str },
}

/// Device class × quality tier → asset table plus a default fallback asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCatalog {
    pub default_asset: String,
    #[serde(default)]
    pub entries: BTreeMap<DeviceClass, BTreeMap<QualityTier, CatalogEntry>>,
}

impl SourceCatalog {
    /// Empty catalog that only knows its fallback asset.
    pub fn new(default_asset: impl Into<String>) -> Self {
        Self {
            default_asset: default_asset.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Builder-style insert.
    pub fn with_entry(mut self, device: DeviceClass, tier: QualityTier, entry: CatalogEntry) -> Self {
        self.insert(device, tier, entry);
        self
    }

    pub fn insert(&mut self, device: DeviceClass, tier: QualityTier, entry: CatalogEntry) {
        self.entries.entry(device).or_default().insert(tier, entry);
    }

    /// Parses and validates a JSON catalog document.
    pub fn from_json(document: &str) -> Result<Self, CatalogError> {
        let catalog: SourceCatalog = serde_json::from_str(document)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn to_json(&self) -> Result<String, CatalogError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.default_asset.trim().is_empty() {
            return Err(CatalogError::EmptyDefaultAsset);
        }
        for (device, tiers) in &self.entries {
            for (tier, entry) in tiers {
                let (device, tier) = (device.as_str(), tier.as_str());
                if entry.mp4_path.trim().is_empty() {
                    return Err(CatalogError::EmptyMp4Path { device, tier });
                }
                if entry.webm_path.as_deref().map_or(false, |p| p.trim().is_empty()) {
                    return Err(CatalogError::EmptyWebmPath { device, tier });
                }
                if entry.resolution.trim().is_empty() {
                    return Err(CatalogError::EmptyResolution { device, tier });
                }
            }
        }
        Ok(())
    }

    pub fn entry(&self, device: DeviceClass, tier: QualityTier) -> Option<&CatalogEntry> {
        self.entries.get(&device).and_then(|tiers| tiers.get(&tier))
    }

    /// Entries for `device` strictly below `tier`, highest first.
    pub fn tiers_below(
        &self,
        device: DeviceClass,
        tier: QualityTier,
    ) -> impl Iterator<Item = (QualityTier, &CatalogEntry)> {
        self.entries
            .get(&device)
            .into_iter()
            .flat_map(move |tiers| tiers.range(..tier).rev().map(|(t, e)| (*t, e)))
    }

    pub fn has_device(&self, device: DeviceClass) -> bool {
        self.entries.get(&device).map_or(false, |tiers| !tiers.is_empty())
    }

    /// Descriptor for the default fallback asset.
    pub fn fallback_descriptor(&self) -> SourceDescriptor {
        SourceDescriptor {
            uri: self.default_asset.clone(),
            mime_type: mime_for_path(&self.default_asset).into(),
            quality_tier: QualityTier::Low,
            resolution_label: "fallback".into(),
        }
    }

    /// Stable SHA-256 fingerprint of the catalog contents.
    ///
    /// Entries are held in ordered maps so the serialized form, and therefore
    /// the fingerprint, is independent of insertion order.
    pub fn config_id(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        fingerprint(&bytes)
    }

    /// Built-in catalog for the landing page hero video.
    pub fn landing_default() -> Self {
        let entry = |device: &str, tier: &str, resolution: &str, bitrate_kbps: u32| CatalogEntry {
            mp4_path: format!("/videos/hero-{device}-{tier}.mp4"),
            webm_path: Some(format!("/videos/hero-{device}-{tier}.webm")),
            resolution: resolution.into(),
            bitrate_kbps,
        };
        SourceCatalog::new("/videos/hero-fallback.mp4")
            .with_entry(DeviceClass::Mobile, QualityTier::Low, entry("mobile", "low", "360p", 400))
            .with_entry(DeviceClass::Mobile, QualityTier::Medium, entry("mobile", "medium", "480p", 800))
            .with_entry(DeviceClass::Mobile, QualityTier::High, entry("mobile", "high", "720p", 1500))
            .with_entry(DeviceClass::Tablet, QualityTier::Low, entry("tablet", "low", "480p", 700))
            .with_entry(DeviceClass::Tablet, QualityTier::Medium, entry("tablet", "medium", "720p", 1500))
            .with_entry(DeviceClass::Tablet, QualityTier::High, entry("tablet", "high", "1080p", 3000))
            .with_entry(DeviceClass::Desktop, QualityTier::Low, entry("desktop", "low", "480p", 900))
            .with_entry(DeviceClass::Desktop, QualityTier::Medium, entry("desktop", "medium", "720p", 2000))
            .with_entry(DeviceClass::Desktop, QualityTier::High, entry("desktop", "high", "1080p", 4500))
    }
}

impl Default for SourceCatalog {
    fn default() -> Self {
        Self::landing_default()
    }
}

fn mime_for_path(path: &str) -> &'static str {
    let lower = path.to_ascii_lowercase();
    if lower.ends_with(".webm") {
        "video/webm"
    } else if lower.ends_with(".ogv") || lower.ends_with(".ogg") {
        "video/ogg"
    } else {
        "video/mp4"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_ordering_and_stepping() {
        assert!(QualityTier::Low < QualityTier::Medium);
        assert!(QualityTier::Medium < QualityTier::High);
        assert_eq!(QualityTier::High.lower(), QualityTier::Medium);
        assert_eq!(QualityTier::Low.lower(), QualityTier::Low);
        assert_eq!(QualityTier::High.step_down(2), QualityTier::Low);
        assert_eq!(QualityTier::Medium.step_down(2), QualityTier::Low);
    }

    #[test]
    fn descriptor_equality_is_by_uri() {
        let a = SourceDescriptor {
            uri: "/a.mp4".into(),
            mime_type: "video/mp4".into(),
            quality_tier: QualityTier::High,
            resolution_label: "1080p".into(),
        };
        let b = SourceDescriptor {
            quality_tier: QualityTier::Low,
            resolution_label: "360p".into(),
            ..a.clone()
        };
        assert_eq!(a, b);
    }

    #[test]
    fn tiers_below_descend() {
        let catalog = SourceCatalog::landing_default();
        let tiers: Vec<_> = catalog
            .tiers_below(DeviceClass::Desktop, QualityTier::High)
            .map(|(tier, _)| tier)
            .collect();
        assert_eq!(tiers, vec![QualityTier::Medium, QualityTier::Low]);
        assert_eq!(catalog.tiers_below(DeviceClass::Desktop, QualityTier::Low).count(), 0);
    }

    #[test]
    fn json_round_trip_keeps_config_id() {
        let catalog = SourceCatalog::landing_default();
        let json = catalog.to_json().unwrap();
        assert!(json.contains("\"desktop\""));
        let parsed = SourceCatalog::from_json(&json).unwrap();
        assert_eq!(parsed, catalog);
        assert_eq!(parsed.config_id(), catalog.config_id());
        assert_eq!(catalog.config_id().len(), 64);
    }

    #[test]
    fn rejects_empty_paths() {
        let err = SourceCatalog::from_json(r#"{"default_asset":"  ","entries":{}}"#).unwrap_err();
        assert!(matches!(err, CatalogError::EmptyDefaultAsset));

        let doc = r#"{
            "default_asset": "/v/fallback.mp4",
            "entries": {"mobile": {"low": {"mp4_path": "", "resolution": "360p", "bitrate_kbps": 300}}}
        }"#;
        let err = SourceCatalog::from_json(doc).unwrap_err();
        assert!(matches!(err, CatalogError::EmptyMp4Path { device: "mobile", tier: "low" }));

        assert!(matches!(
            SourceCatalog::from_json("{not json").unwrap_err(),
            CatalogError::Decode(_)
        ));
    }

    #[test]
    fn fallback_descriptor_infers_mime() {
        let catalog = SourceCatalog::new("/v/poster-loop.webm");
        let fallback = catalog.fallback_descriptor();
        assert_eq!(fallback.mime_type, "video/webm");
        assert_eq!(fallback.quality_tier, QualityTier::Low);
    }
}
