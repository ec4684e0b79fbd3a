pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;
pub use crate::config::EngineConfig;

pub use crate::adapters::{HttpRateProvider, LocalSnapshotStore, TableRateProvider, WeightCatalog};
pub use crate::core::coordinator::{CoordinatorSettings, SessionCoordinator};
pub use crate::core::packer::{BoxPacker, PackConstraints, PackLine, PackOutcome};
pub use crate::core::rates::{CarrierRateEngine, RateOutcome, RecommendWeights, RetryPolicy};
pub use crate::core::session::PackingSession;
pub use crate::core::weight::WeightResolver;
pub use crate::utils::error::{FreightError, Result};
