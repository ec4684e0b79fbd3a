use crate::domain::model::{
    Address, CarrierQuote, DimensionsMm, ManifestSummary, ServiceLevel, SessionSnapshot,
    ShipmentType,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Backing data for weight resolution. Implementations answer point lookups;
/// the resolver applies the Measured > CategoryAverage > Default order and
/// caches results per session.
pub trait WeightSource: Send + Sync {
    /// Product-specific recorded weight, if one exists.
    fn measured_weight_g(&self, product_id: &str) -> Option<u32>;

    /// Category the product is classified under, if known.
    fn category_of(&self, product_id: &str) -> Option<String>;

    /// Average weight across the category's products, if computable.
    fn category_average_g(&self, category_id: &str) -> Option<u32>;

    /// Per-unit dimensions, when the catalog has them.
    fn dimensions(&self, product_id: &str) -> Option<DimensionsMm>;
}

/// One rate request as handed to a provider. The destination is already
/// normalized and validated by the rate engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateRequest {
    pub manifest: ManifestSummary,
    pub destination: Address,
    pub shipment_type: ShipmentType,
    pub service_level: ServiceLevel,
}

/// The only network-bound port in the engine. Providers return raw,
/// untagged quotes; ranking and tagging happen in the rate engine.
#[async_trait]
pub trait RateProvider: Send + Sync {
    async fn fetch_rates(&self, request: &RateRequest) -> Result<Vec<CarrierQuote>>;
}

/// Session persistence. Saves are idempotent full-snapshot overwrites, so
/// last-write-wins is the consistency model.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<()>;
    async fn load(&self, transfer_id: &str) -> Result<Option<SessionSnapshot>>;
}
