use crate::core::packer::{lines_from_quantities, BoxPacker};
use crate::core::weight::WeightResolver;
use crate::domain::model::{
    BoxAssignment, CarrierQuote, Item, ItemStatus, ManifestSummary, Parcel, ProductId,
    RawTransferItem, ResolvedWeight, SessionSnapshot, SessionState, UnpackableLine,
};
use crate::domain::ports::WeightSource;
use crate::utils::error::{FreightError, Result};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Edit rejections. Only a completed transfer refuses edits; everything
/// else (discrepancies, missing weights, bad addresses) stays editable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("transfer is completed; no further edits allowed")]
    SessionCompleted,
    #[error("unknown product {0}")]
    UnknownProduct(ProductId),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectQuoteError {
    #[error("no quote at index {0}")]
    NoSuchQuote(usize),
    #[error("nothing with weight has been packed yet")]
    NothingPacked,
    #[error("cannot select freight in state {0:?}")]
    WrongState(SessionState),
}

/// Reasons the finish action is refused. All are business gates, not
/// failures: the operator resolves them and finishes again.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FinishError {
    #[error("cannot finish in state {0:?}")]
    WrongState(SessionState),
    #[error("lines too heavy to pack: {0:?}")]
    UnpackableLines(Vec<ProductId>),
    #[error("quantity discrepancies not acknowledged: {0:?}")]
    UnacknowledgedDiscrepancies(Vec<ProductId>),
    #[error("manifest is out of date with the item quantities")]
    ManifestOutOfDate,
}

/// State machine for one transfer's packing workflow. Owns the item list
/// (normalized at the boundary), the derived parcel projection, and the
/// freight selection. All external I/O lives in the coordinator; this type
/// is pure state and synchronous.
pub struct PackingSession<W: WeightSource> {
    transfer_id: String,
    items: Vec<Item>,
    parcels: Vec<Parcel>,
    unpackable: Vec<UnpackableLine>,
    missing_dimensions: Vec<ProductId>,
    quotes: Vec<CarrierQuote>,
    selected_quote: Option<CarrierQuote>,
    state: SessionState,
    resolver: WeightResolver<W>,
    packer: BoxPacker,
    oversized_ok: HashSet<ProductId>,
}

impl<W: WeightSource> PackingSession<W> {
    pub fn new(
        transfer_id: impl Into<String>,
        raw_items: Vec<RawTransferItem>,
        mut resolver: WeightResolver<W>,
        packer: BoxPacker,
    ) -> Self {
        let items: Vec<Item> = raw_items
            .into_iter()
            .map(|raw| {
                let resolved = resolver.resolve_one(&raw.product_id);
                Item {
                    sku: raw.sku.unwrap_or_default(),
                    name: raw.name.unwrap_or_else(|| "Unknown".to_string()),
                    quantity_planned: raw.quantity_planned.unwrap_or(0),
                    quantity_packed: raw.quantity_packed.unwrap_or(0),
                    unit_weight_g: resolved.weight_g,
                    weight_confidence: resolved.confidence,
                    box_assignments: Vec::new(),
                    product_id: raw.product_id,
                }
            })
            .collect();

        let state = if items.iter().any(|i| i.quantity_packed > 0) {
            SessionState::Packing
        } else {
            SessionState::Planning
        };

        let mut session = Self {
            transfer_id: transfer_id.into(),
            items,
            parcels: Vec::new(),
            unpackable: Vec::new(),
            missing_dimensions: Vec::new(),
            quotes: Vec::new(),
            selected_quote: None,
            state,
            resolver,
            packer,
            oversized_ok: HashSet::new(),
        };
        if session.state == SessionState::Packing {
            session.repack();
        }
        session
    }

    /// Accepts the loader's loose JSON shapes (field names vary between the
    /// UI layouts) and normalizes them before the engine ever sees them.
    pub fn from_json(
        transfer_id: impl Into<String>,
        values: Vec<serde_json::Value>,
        resolver: WeightResolver<W>,
        packer: BoxPacker,
    ) -> Result<Self> {
        let raw_items = values
            .into_iter()
            .map(serde_json::from_value::<RawTransferItem>)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self::new(transfer_id, raw_items, resolver, packer))
    }

    /// Rebuilds a session from a persisted snapshot, repacking so the
    /// parcel projection matches the restored quantities.
    pub fn resume(
        snapshot: SessionSnapshot,
        resolver: WeightResolver<W>,
        packer: BoxPacker,
    ) -> Self {
        let mut session = Self {
            transfer_id: snapshot.transfer_id,
            items: snapshot.items,
            parcels: Vec::new(),
            unpackable: Vec::new(),
            missing_dimensions: Vec::new(),
            quotes: Vec::new(),
            selected_quote: snapshot.selected_quote,
            state: snapshot.state,
            resolver,
            packer,
            oversized_ok: HashSet::new(),
        };
        if session.state != SessionState::Planning {
            session.repack();
        }
        session
    }

    pub fn transfer_id(&self) -> &str {
        &self.transfer_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn parcels(&self) -> &[Parcel] {
        &self.parcels
    }

    pub fn unpackable(&self) -> &[UnpackableLine] {
        &self.unpackable
    }

    pub fn quotes(&self) -> &[CarrierQuote] {
        &self.quotes
    }

    pub fn selected_quote(&self) -> Option<&CarrierQuote> {
        self.selected_quote.as_ref()
    }

    /// Per-item status labels for the UI. Derived on every call.
    pub fn item_statuses(&self) -> Vec<(ProductId, ItemStatus)> {
        self.items
            .iter()
            .map(|i| (i.product_id.clone(), i.status()))
            .collect()
    }

    /// Compact weight-confidence legend over the transfer's products.
    pub fn legend_summary(&self) -> String {
        let weights: HashMap<ProductId, ResolvedWeight> = self
            .items
            .iter()
            .map(|i| {
                (
                    i.product_id.clone(),
                    ResolvedWeight {
                        weight_g: i.unit_weight_g,
                        confidence: i.weight_confidence,
                    },
                )
            })
            .collect();
        WeightResolver::<W>::legend_summary(&weights)
    }

    /// Applies one quantity edit. Transitions Planning -> Packing on the
    /// first non-zero packed quantity, and drops a stale freight selection
    /// back to Packing so it can never silently survive a changed manifest.
    /// Does not repack; the coordinator debounces that.
    pub fn set_packed(&mut self, product_id: &str, qty: u32) -> std::result::Result<(), EditError> {
        if self.state == SessionState::Completed {
            return Err(EditError::SessionCompleted);
        }
        let item = self
            .items
            .iter_mut()
            .find(|i| i.product_id == product_id)
            .ok_or_else(|| EditError::UnknownProduct(product_id.to_string()))?;
        item.quantity_packed = qty;

        match self.state {
            SessionState::Planning if qty > 0 => {
                tracing::info!("Transfer {}: packing started", self.transfer_id);
                self.state = SessionState::Packing;
            }
            SessionState::FreightSelected => {
                tracing::info!(
                    "Transfer {}: manifest changed, freight selection cleared",
                    self.transfer_id
                );
                self.selected_quote = None;
                self.state = SessionState::Packing;
            }
            _ => {}
        }
        Ok(())
    }

    /// Operator override for the single-oversized-unit exception: the
    /// product ships as one flagged parcel per unit instead of being
    /// reported unpackable.
    pub fn allow_oversized(&mut self, product_id: &str) {
        self.oversized_ok.insert(product_id.to_string());
    }

    /// Recomputes the parcel projection from current quantities and rewrites
    /// each item's box assignments from the parcel contents.
    pub fn repack(&mut self) {
        let quantities: Vec<(ProductId, u32)> = self
            .items
            .iter()
            .map(|i| (i.product_id.clone(), i.quantity_packed))
            .collect();
        let lines = lines_from_quantities(&mut self.resolver, &quantities);
        let outcome = self.packer.pack_with_oversized(&lines, &self.oversized_ok);

        self.parcels = outcome.parcels;
        self.unpackable = outcome.unpackable;
        self.missing_dimensions = outcome.missing_dimensions;

        for item in &mut self.items {
            item.box_assignments = self
                .parcels
                .iter()
                .flat_map(|p| {
                    p.contents
                        .iter()
                        .filter(|l| l.product_id == item.product_id)
                        .map(|l| BoxAssignment {
                            parcel_id: p.parcel_id,
                            qty: l.qty,
                        })
                })
                .collect();
        }
    }

    pub fn manifest_summary(&self) -> ManifestSummary {
        ManifestSummary::from_parcels(
            &self.parcels,
            self.missing_dimensions.clone(),
            self.packer.constraints().volumetric_factor,
        )
    }

    /// Stores the latest ranked quotes for display and selection.
    pub fn apply_quotes(&mut self, quotes: Vec<CarrierQuote>) {
        self.quotes = quotes;
    }

    /// Chooses a quote from the last ranked list. Requires something with
    /// weight in the manifest; moves Packing -> FreightSelected.
    pub fn select_quote(&mut self, index: usize) -> std::result::Result<(), SelectQuoteError> {
        match self.state {
            SessionState::Packing | SessionState::FreightSelected => {}
            other => return Err(SelectQuoteError::WrongState(other)),
        }
        if !self.parcels.iter().any(|p| p.weight_kg > 0.0) {
            return Err(SelectQuoteError::NothingPacked);
        }
        let quote = self
            .quotes
            .get(index)
            .ok_or(SelectQuoteError::NoSuchQuote(index))?;
        self.selected_quote = Some(quote.clone());
        self.state = SessionState::FreightSelected;
        tracing::info!(
            "Transfer {}: freight selected ({})",
            self.transfer_id,
            quote.service_name
        );
        Ok(())
    }

    /// Explicit finish. Discrepancies (Zero/Under/Over lines) are allowed
    /// only with `acknowledge_discrepancies`; unpackable lines always block
    /// until resolved. Returns the finalized manifest handed to label
    /// issuance.
    pub fn finish(
        &mut self,
        acknowledge_discrepancies: bool,
    ) -> std::result::Result<&[Parcel], FinishError> {
        if self.state != SessionState::FreightSelected {
            return Err(FinishError::WrongState(self.state));
        }
        if !self.unpackable.is_empty() {
            return Err(FinishError::UnpackableLines(
                self.unpackable.iter().map(|u| u.product_id.clone()).collect(),
            ));
        }

        // Guard the assignment invariant: every packed unit is in a parcel.
        if self
            .items
            .iter()
            .any(|i| i.assigned_qty() != i.quantity_packed)
        {
            return Err(FinishError::ManifestOutOfDate);
        }

        let discrepancies: Vec<ProductId> = self
            .items
            .iter()
            .filter(|i| i.status().is_discrepancy())
            .map(|i| i.product_id.clone())
            .collect();
        if !discrepancies.is_empty() && !acknowledge_discrepancies {
            return Err(FinishError::UnacknowledgedDiscrepancies(discrepancies));
        }

        self.state = SessionState::Completed;
        tracing::info!(
            "Transfer {}: completed with {} parcels",
            self.transfer_id,
            self.parcels.len()
        );
        Ok(&self.parcels)
    }

    /// Full-state snapshot for autosave and final persistence.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            transfer_id: self.transfer_id.clone(),
            state: self.state,
            items: self.items.clone(),
            parcels: self.parcels.clone(),
            unpackable: self.unpackable.clone(),
            selected_quote: self.selected_quote.clone(),
            saved_at: Utc::now(),
        }
    }
}

impl From<EditError> for FreightError {
    fn from(e: EditError) -> Self {
        FreightError::SessionError {
            message: e.to_string(),
        }
    }
}
