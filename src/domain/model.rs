use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub type ProductId = String;

/// How a product's shipping weight was obtained. Rendered as the one-letter
/// legend code next to every weight in the packing UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeightConfidence {
    Measured,
    CategoryAverage,
    Default,
}

impl WeightConfidence {
    /// P = product-specific, C = category average, D = default fallback.
    pub fn legend_code(&self) -> char {
        match self {
            WeightConfidence::Measured => 'P',
            WeightConfidence::CategoryAverage => 'C',
            WeightConfidence::Default => 'D',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedWeight {
    pub weight_g: u32,
    pub confidence: WeightConfidence,
}

/// Per-unit dimensions from the product catalog, when recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionsMm {
    pub length_mm: u32,
    pub width_mm: u32,
    pub height_mm: u32,
}

impl DimensionsMm {
    pub fn volume_cm3(&self) -> f64 {
        (self.length_mm as f64 / 10.0)
            * (self.width_mm as f64 / 10.0)
            * (self.height_mm as f64 / 10.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoxAssignment {
    pub parcel_id: u32,
    pub qty: u32,
}

/// One transfer line. `quantity_packed` is deliberately unconstrained
/// relative to `quantity_planned`; over-pack is a valid state, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub quantity_planned: u32,
    pub quantity_packed: u32,
    pub unit_weight_g: u32,
    pub weight_confidence: WeightConfidence,
    pub box_assignments: Vec<BoxAssignment>,
}

impl Item {
    pub fn status(&self) -> ItemStatus {
        ItemStatus::derive(self.quantity_planned, self.quantity_packed)
    }

    pub fn assigned_qty(&self) -> u32 {
        self.box_assignments.iter().map(|a| a.qty).sum()
    }
}

/// Business status of a line, derived from quantities. Total over all
/// non-negative inputs; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemStatus {
    Zero,
    Under,
    Ok,
    Over,
}

impl ItemStatus {
    pub fn derive(planned: u32, packed: u32) -> ItemStatus {
        if packed == 0 {
            ItemStatus::Zero
        } else if packed < planned {
            ItemStatus::Under
        } else if packed == planned {
            ItemStatus::Ok
        } else {
            ItemStatus::Over
        }
    }

    /// A discrepancy gates the finish action behind an explicit
    /// acknowledgment; it is never an error by itself.
    pub fn is_discrepancy(&self) -> bool {
        matches!(self, ItemStatus::Zero | ItemStatus::Under | ItemStatus::Over)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParcelKind {
    Satchel,
    Box,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParcelLine {
    pub product_id: ProductId,
    pub qty: u32,
}

/// One packed box or satchel. Weight and volume are derived from contents at
/// pack time; parcels are a projection of the item list, not independently
/// persisted until the session completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parcel {
    pub parcel_id: u32,
    pub kind: ParcelKind,
    pub max_weight_kg: f64,
    pub max_volume_m3: Option<f64>,
    pub contents: Vec<ParcelLine>,
    pub weight_kg: f64,
    pub volume_m3: Option<f64>,
    /// Set only for the single-oversized-unit exception; every other parcel
    /// respects `weight_kg <= max_weight_kg`.
    pub over_limit: bool,
}

/// A line whose single unit is heavier than the box cap. Fatal to that
/// line's automatic packing only; other lines pack normally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnpackableLine {
    pub product_id: ProductId,
    pub unit_weight_g: u32,
    pub max_weight_kg: f64,
}

/// Aggregate view of a packed manifest, used for rate requests and the UI
/// weight console.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestSummary {
    pub parcel_count: usize,
    pub satchel_count: usize,
    pub total_weight_kg: f64,
    pub total_volume_m3: Option<f64>,
    /// max(actual, volumetric) when dimensions are known, else actual.
    pub billable_weight_kg: f64,
    pub missing_dimensions: Vec<ProductId>,
    pub fingerprint: u64,
}

impl ManifestSummary {
    /// `volumetric_factor` is cm3 per kg (carrier convention, default 5000).
    pub fn from_parcels(
        parcels: &[Parcel],
        missing_dimensions: Vec<ProductId>,
        volumetric_factor: f64,
    ) -> Self {
        let total_weight_kg: f64 = parcels.iter().map(|p| p.weight_kg).sum();
        let satchel_count = parcels
            .iter()
            .filter(|p| p.kind == ParcelKind::Satchel)
            .count();

        let total_volume_m3 = if !parcels.is_empty() && parcels.iter().all(|p| p.volume_m3.is_some())
        {
            Some(parcels.iter().filter_map(|p| p.volume_m3).sum())
        } else {
            None
        };

        let billable_weight_kg = match total_volume_m3 {
            Some(v) if volumetric_factor > 0.0 => {
                let volumetric_kg = v * 1_000_000.0 / volumetric_factor;
                total_weight_kg.max(volumetric_kg)
            }
            _ => total_weight_kg,
        };

        let fingerprint = Self::fingerprint_of(parcels);

        ManifestSummary {
            parcel_count: parcels.len(),
            satchel_count,
            total_weight_kg,
            total_volume_m3,
            billable_weight_kg,
            missing_dimensions,
            fingerprint,
        }
    }

    /// Stable hash over parcel structure and integer-gram weights. Any
    /// manifest-affecting edit changes this value, which is what keys (and
    /// invalidates) the quote cache.
    fn fingerprint_of(parcels: &[Parcel]) -> u64 {
        let mut hasher = DefaultHasher::new();
        parcels.len().hash(&mut hasher);
        for parcel in parcels {
            parcel.kind.hash(&mut hasher);
            ((parcel.weight_kg * 1000.0).round() as u64).hash(&mut hasher);
            for line in &parcel.contents {
                line.product_id.hash(&mut hasher);
                line.qty.hash(&mut hasher);
            }
        }
        hasher.finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ShipmentType {
    Delivery,
    Pickup,
    Dropoff,
}

impl std::fmt::Display for ShipmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ShipmentType::Delivery => "delivery",
            ShipmentType::Pickup => "pickup",
            ShipmentType::Dropoff => "dropoff",
        };
        write!(f, "{}", name)
    }
}

/// Ordered by speed: a request at a given level admits that level and
/// anything faster.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ServiceLevel {
    Standard,
    Express,
    Overnight,
}

impl std::fmt::Display for ServiceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ServiceLevel::Standard => "standard",
            ServiceLevel::Express => "express",
            ServiceLevel::Overnight => "overnight",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteTag {
    Recommended,
    Cheapest,
    Fastest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarrierQuote {
    pub carrier_name: String,
    pub service_level: ServiceLevel,
    pub service_name: String,
    pub price: f64,
    pub eta_days: u32,
    #[serde(default)]
    pub tags: Vec<QuoteTag>,
}

impl CarrierQuote {
    pub fn has_tag(&self, tag: QuoteTag) -> bool {
        self.tags.contains(&tag)
    }
}

/// Destination as the UI supplies it: loose, partially filled, field names
/// varying between layouts. Normalized before any rating happens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInput {
    #[serde(default, alias = "dest_addr1", alias = "address1")]
    pub address1: String,
    #[serde(default, alias = "dest_addr2", alias = "address2")]
    pub address2: String,
    #[serde(default, alias = "dest_suburb")]
    pub suburb: String,
    #[serde(default, alias = "dest_city")]
    pub city: String,
    #[serde(default, alias = "dest_postcode")]
    pub postcode: String,
    #[serde(default, alias = "dest_country")]
    pub country: String,
}

/// Normalized destination. Hashable so it can key the quote cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub building_name: Option<String>,
    pub street: String,
    pub suburb: Option<String>,
    pub city: String,
    pub postcode: String,
    pub country_code: String,
    pub rural: bool,
}

/// Transfer line as the loader hands it over. Field names are inconsistent
/// across the UI variants, hence the aliases; everything is normalized into
/// `Item` at the session boundary.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTransferItem {
    #[serde(alias = "id")]
    pub product_id: ProductId,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default, alias = "product_name")]
    pub name: Option<String>,
    #[serde(default, alias = "qty", alias = "qty_planned", alias = "quantity")]
    pub quantity_planned: Option<u32>,
    #[serde(default, alias = "qty_packed")]
    pub quantity_packed: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Planning,
    Packing,
    FreightSelected,
    Completed,
}

/// Full-session snapshot for autosave and final persistence. Writes are
/// idempotent whole-state overwrites; last write wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub transfer_id: String,
    pub state: SessionState,
    pub items: Vec<Item>,
    pub parcels: Vec<Parcel>,
    pub unpackable: Vec<UnpackableLine>,
    pub selected_quote: Option<CarrierQuote>,
    pub saved_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_derivation_is_total() {
        assert_eq!(ItemStatus::derive(5, 0), ItemStatus::Zero);
        assert_eq!(ItemStatus::derive(5, 3), ItemStatus::Under);
        assert_eq!(ItemStatus::derive(5, 5), ItemStatus::Ok);
        assert_eq!(ItemStatus::derive(5, 8), ItemStatus::Over);
        // zero planned: any packed quantity is an over-pack
        assert_eq!(ItemStatus::derive(0, 0), ItemStatus::Zero);
        assert_eq!(ItemStatus::derive(0, 1), ItemStatus::Over);
    }

    #[test]
    fn test_legend_codes() {
        assert_eq!(WeightConfidence::Measured.legend_code(), 'P');
        assert_eq!(WeightConfidence::CategoryAverage.legend_code(), 'C');
        assert_eq!(WeightConfidence::Default.legend_code(), 'D');
    }

    #[test]
    fn test_manifest_fingerprint_tracks_contents() {
        let parcel = |qty: u32, weight_kg: f64| Parcel {
            parcel_id: 1,
            kind: ParcelKind::Box,
            max_weight_kg: 25.0,
            max_volume_m3: None,
            contents: vec![ParcelLine {
                product_id: "prod-a".to_string(),
                qty,
            }],
            weight_kg,
            volume_m3: None,
            over_limit: false,
        };

        let a = ManifestSummary::from_parcels(&[parcel(10, 5.0)], vec![], 5000.0);
        let same = ManifestSummary::from_parcels(&[parcel(10, 5.0)], vec![], 5000.0);
        let edited = ManifestSummary::from_parcels(&[parcel(11, 5.5)], vec![], 5000.0);

        assert_eq!(a.fingerprint, same.fingerprint);
        assert_ne!(a.fingerprint, edited.fingerprint);
    }

    #[test]
    fn test_billable_weight_uses_volumetric_when_larger() {
        let bulky = Parcel {
            parcel_id: 1,
            kind: ParcelKind::Box,
            max_weight_kg: 25.0,
            max_volume_m3: None,
            contents: vec![ParcelLine {
                product_id: "pillow".to_string(),
                qty: 4,
            }],
            weight_kg: 2.0,
            volume_m3: Some(0.05), // 50_000 cm3 -> 10 kg volumetric at 5000
            over_limit: false,
        };

        let summary = ManifestSummary::from_parcels(&[bulky], vec![], 5000.0);
        assert!((summary.billable_weight_kg - 10.0).abs() < 1e-9);
        assert!((summary.total_weight_kg - 2.0).abs() < 1e-9);
    }
}
