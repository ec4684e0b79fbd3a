use crate::core::rates::{CarrierRateEngine, RateOutcome};
use crate::core::session::{EditError, FinishError, PackingSession, SelectQuoteError};
use crate::domain::model::{AddressInput, Parcel, ServiceLevel, SessionSnapshot, ShipmentType};
use crate::domain::ports::{RateProvider, SnapshotStore, WeightSource};
use crate::utils::error::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinatorSettings {
    /// Quiet period after an edit before repack + rate fetch fire.
    pub debounce: Duration,
    /// Interval between settled-snapshot persists.
    pub autosave_every: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(250),
            autosave_every: Duration::from_secs(30),
        }
    }
}

/// Drives one `PackingSession` through its async surroundings: debounced
/// recompute on quantity edits, last-request-wins on the network-bound rate
/// fetch, and periodic autosave of settled state.
///
/// Every edit bumps a generation counter. The debounced task proceeds only
/// if its generation is still the newest, and checks again after the quote
/// call returns, so a superseded in-flight response is discarded rather
/// than applied. Autosave only persists when the settled generation has
/// caught up with the edit generation, which keeps half-updated manifests
/// out of storage.
pub struct SessionCoordinator<W, P, S>
where
    W: WeightSource + Send + 'static,
    P: RateProvider + 'static,
    S: SnapshotStore + 'static,
{
    session: Arc<Mutex<PackingSession<W>>>,
    rates: Arc<CarrierRateEngine<P>>,
    store: Arc<S>,
    destination: Arc<Mutex<AddressInput>>,
    shipment: Arc<Mutex<(ShipmentType, ServiceLevel)>>,
    generation: Arc<AtomicU64>,
    settled: Arc<AtomicU64>,
    latest_rates: Arc<Mutex<Option<RateOutcome>>>,
    settings: CoordinatorSettings,
}

impl<W, P, S> Clone for SessionCoordinator<W, P, S>
where
    W: WeightSource + Send + 'static,
    P: RateProvider + 'static,
    S: SnapshotStore + 'static,
{
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            rates: Arc::clone(&self.rates),
            store: Arc::clone(&self.store),
            destination: Arc::clone(&self.destination),
            shipment: Arc::clone(&self.shipment),
            generation: Arc::clone(&self.generation),
            settled: Arc::clone(&self.settled),
            latest_rates: Arc::clone(&self.latest_rates),
            settings: self.settings,
        }
    }
}

impl<W, P, S> SessionCoordinator<W, P, S>
where
    W: WeightSource + Send + 'static,
    P: RateProvider + 'static,
    S: SnapshotStore + 'static,
{
    pub fn new(
        session: PackingSession<W>,
        rates: CarrierRateEngine<P>,
        store: S,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            rates: Arc::new(rates),
            store: Arc::new(store),
            destination: Arc::new(Mutex::new(AddressInput::default())),
            shipment: Arc::new(Mutex::new((ShipmentType::Delivery, ServiceLevel::Standard))),
            generation: Arc::new(AtomicU64::new(0)),
            settled: Arc::new(AtomicU64::new(0)),
            latest_rates: Arc::new(Mutex::new(None)),
            settings,
        }
    }

    /// Applies one quantity edit and schedules the debounced recompute.
    pub async fn note_edit(
        &self,
        product_id: &str,
        qty: u32,
    ) -> std::result::Result<(), EditError> {
        {
            let mut session = self.session.lock().await;
            session.set_packed(product_id, qty)?;
        }
        self.schedule_recompute();
        Ok(())
    }

    pub async fn set_destination(&self, destination: AddressInput) {
        *self.destination.lock().await = destination;
        self.schedule_recompute();
    }

    pub async fn set_shipment(&self, shipment_type: ShipmentType, service_level: ServiceLevel) {
        *self.shipment.lock().await = (shipment_type, service_level);
        self.schedule_recompute();
    }

    fn schedule_recompute(&self) {
        let gen = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(this.settings.debounce).await;
            if this.generation.load(Ordering::SeqCst) != gen {
                // A newer edit arrived during the quiet period.
                return;
            }
            this.run_recompute(gen).await;
        });
    }

    /// Immediate repack + rate fetch, bypassing the debounce. Used by the
    /// CLI and anywhere a synchronous refresh is wanted.
    pub async fn recompute_now(&self) -> Option<RateOutcome> {
        let gen = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.run_recompute(gen).await;
        self.latest_rates.lock().await.clone()
    }

    async fn run_recompute(&self, gen: u64) {
        let summary = {
            let mut session = self.session.lock().await;
            session.repack();
            session.manifest_summary()
        };

        if summary.parcel_count == 0 {
            let mut session = self.session.lock().await;
            session.apply_quotes(Vec::new());
            *self.latest_rates.lock().await = None;
            if self.generation.load(Ordering::SeqCst) == gen {
                self.settled.store(gen, Ordering::SeqCst);
            }
            return;
        }

        let destination = self.destination.lock().await.clone();
        let (shipment_type, service_level) = *self.shipment.lock().await;

        let outcome = self
            .rates
            .quote(&summary, &destination, shipment_type, service_level)
            .await;

        if self.generation.load(Ordering::SeqCst) != gen {
            tracing::debug!("Discarding superseded quote response (gen {})", gen);
            return;
        }

        let mut session = self.session.lock().await;
        match &outcome {
            RateOutcome::Quotes(quotes) => session.apply_quotes(quotes.clone()),
            _ => session.apply_quotes(Vec::new()),
        }
        *self.latest_rates.lock().await = Some(outcome);
        self.settled.store(gen, Ordering::SeqCst);
    }

    /// Background autosave loop. Persists the latest settled snapshot on
    /// each tick, skipping ticks while edits are debouncing or a recompute
    /// is in flight. Abort the handle to stop it.
    pub fn spawn_autosave(&self) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(this.settings.autosave_every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; nothing has changed yet.
            interval.tick().await;
            loop {
                interval.tick().await;
                this.autosave_once().await;
            }
        })
    }

    async fn autosave_once(&self) {
        if self.settled.load(Ordering::SeqCst) != self.generation.load(Ordering::SeqCst) {
            tracing::debug!("Autosave skipped: recompute in flight");
            return;
        }
        let snapshot = self.session.lock().await.snapshot();
        if let Err(e) = self.store.save(&snapshot).await {
            tracing::warn!("Autosave failed: {}", e);
        }
    }

    pub async fn select_quote(&self, index: usize) -> std::result::Result<(), SelectQuoteError> {
        self.session.lock().await.select_quote(index)
    }

    /// Finish the transfer and materialize the final snapshot. The returned
    /// parcels are the manifest handed to label issuance.
    pub async fn finish(
        &self,
        acknowledge_discrepancies: bool,
    ) -> std::result::Result<Vec<Parcel>, FinishError> {
        let snapshot = {
            let mut session = self.session.lock().await;
            session.finish(acknowledge_discrepancies)?;
            session.snapshot()
        };
        if let Err(e) = self.store.save(&snapshot).await {
            tracing::warn!("Final snapshot persist failed: {}", e);
        }
        Ok(snapshot.parcels)
    }

    pub async fn latest_rates(&self) -> Option<RateOutcome> {
        self.latest_rates.lock().await.clone()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.session.lock().await.snapshot()
    }

    /// Shared handle to the underlying session for read access from the
    /// presentation layer.
    pub fn session(&self) -> Arc<Mutex<PackingSession<W>>> {
        Arc::clone(&self.session)
    }

    /// Persist the current state immediately, regardless of settledness.
    /// Used on explicit operator save.
    pub async fn save_now(&self) -> Result<()> {
        let snapshot = self.session.lock().await.snapshot();
        self.store.save(&snapshot).await
    }
}
