pub mod coordinator;
pub mod packer;
pub mod rates;
pub mod session;
pub mod weight;

pub use crate::domain::model::{
    CarrierQuote, Item, ItemStatus, ManifestSummary, Parcel, ParcelKind, SessionState,
    UnpackableLine, WeightConfidence,
};
pub use crate::domain::ports::{RateProvider, SnapshotStore, WeightSource};
pub use crate::utils::error::Result;
