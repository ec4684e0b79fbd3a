// Adapters layer: concrete implementations of the domain ports (weight
// catalog, rate providers, snapshot persistence).

pub mod catalog;
pub mod rates_http;
pub mod rates_table;
pub mod snapshot;

pub use catalog::WeightCatalog;
pub use rates_http::HttpRateProvider;
pub use rates_table::TableRateProvider;
pub use snapshot::LocalSnapshotStore;
