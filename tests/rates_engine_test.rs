use async_trait::async_trait;
use freight_engine::core::rates::{RateOutcome, RecommendWeights, RetryPolicy};
use freight_engine::domain::model::{
    AddressInput, CarrierQuote, ManifestSummary, Parcel, ParcelKind, ParcelLine, QuoteTag,
    ServiceLevel, ShipmentType,
};
use freight_engine::domain::ports::{RateProvider, RateRequest};
use freight_engine::utils::error::FreightError;
use freight_engine::CarrierRateEngine;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Provider whose per-call success is scripted by a predicate over the
/// 1-based call number.
struct FlakyProvider {
    calls: Arc<AtomicU32>,
    fail_when: fn(u32) -> bool,
}

#[async_trait]
impl RateProvider for FlakyProvider {
    async fn fetch_rates(&self, _request: &RateRequest) -> freight_engine::Result<Vec<CarrierQuote>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if (self.fail_when)(call) {
            return Err(FreightError::ProcessingError {
                message: format!("simulated outage on call {}", call),
            });
        }
        Ok(vec![
            CarrierQuote {
                carrier_name: "NZ Post".to_string(),
                service_level: ServiceLevel::Standard,
                service_name: "NZ Post Standard".to_string(),
                price: 9.80,
                eta_days: 3,
                tags: vec![],
            },
            CarrierQuote {
                carrier_name: "NZ Courier".to_string(),
                service_level: ServiceLevel::Overnight,
                service_name: "NZ Courier Overnight".to_string(),
                price: 14.20,
                eta_days: 1,
                tags: vec![],
            },
        ])
    }
}

fn manifest(weight_kg: f64) -> ManifestSummary {
    let parcel = Parcel {
        parcel_id: 1,
        kind: ParcelKind::Box,
        max_weight_kg: 25.0,
        max_volume_m3: None,
        contents: vec![ParcelLine {
            product_id: "tee-black".to_string(),
            qty: (weight_kg * 4.0) as u32,
        }],
        weight_kg,
        volume_m3: None,
        over_limit: false,
    };
    ManifestSummary::from_parcels(&[parcel], vec![], 5000.0)
}

fn destination() -> AddressInput {
    AddressInput {
        address1: "12 High St".to_string(),
        city: "Auckland".to_string(),
        postcode: "1010".to_string(),
        ..AddressInput::default()
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        initial_delay: Duration::from_millis(5),
    }
}

fn engine(
    provider: FlakyProvider,
    ttl: Duration,
) -> CarrierRateEngine<FlakyProvider> {
    CarrierRateEngine::new(provider, RecommendWeights::default(), ttl, fast_retry())
}

#[tokio::test]
async fn test_quotes_come_back_ranked_and_tagged() {
    let calls = Arc::new(AtomicU32::new(0));
    let engine = engine(
        FlakyProvider {
            calls: calls.clone(),
            fail_when: |_| false,
        },
        Duration::from_secs(120),
    );

    let outcome = engine
        .quote(
            &manifest(6.6),
            &destination(),
            ShipmentType::Delivery,
            ServiceLevel::Standard,
        )
        .await;

    match outcome {
        RateOutcome::Quotes(quotes) => {
            assert_eq!(quotes.len(), 2);
            assert_eq!(
                quotes
                    .iter()
                    .filter(|q| q.has_tag(QuoteTag::Cheapest))
                    .count(),
                1
            );
            assert_eq!(
                quotes
                    .iter()
                    .filter(|q| q.has_tag(QuoteTag::Fastest))
                    .count(),
                1
            );
            assert_eq!(
                quotes
                    .iter()
                    .filter(|q| q.has_tag(QuoteTag::Recommended))
                    .count(),
                1
            );
        }
        other => panic!("expected quotes, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_postcode_is_a_first_class_outcome() {
    let calls = Arc::new(AtomicU32::new(0));
    let engine = engine(
        FlakyProvider {
            calls: calls.clone(),
            fail_when: |_| false,
        },
        Duration::from_secs(120),
    );

    let incomplete = AddressInput {
        address1: "12 High St".to_string(),
        city: "Auckland".to_string(),
        ..AddressInput::default()
    };

    let outcome = engine
        .quote(
            &manifest(6.6),
            &incomplete,
            ShipmentType::Delivery,
            ServiceLevel::Standard,
        )
        .await;

    assert_eq!(
        outcome,
        RateOutcome::AddressValidationRequired {
            missing_fields: vec!["postcode".to_string()]
        }
    );
    // The provider must never be hit for an invalid destination.
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cache_hit_within_ttl_skips_provider() {
    let calls = Arc::new(AtomicU32::new(0));
    let engine = engine(
        FlakyProvider {
            calls: calls.clone(),
            fail_when: |_| false,
        },
        Duration::from_secs(120),
    );

    let m = manifest(6.6);
    for _ in 0..3 {
        let outcome = engine
            .quote(
                &m,
                &destination(),
                ShipmentType::Delivery,
                ServiceLevel::Standard,
            )
            .await;
        assert!(matches!(outcome, RateOutcome::Quotes(_)));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // A manifest-affecting edit changes the fingerprint and misses.
    let edited = manifest(7.1);
    engine
        .quote(
            &edited,
            &destination(),
            ShipmentType::Delivery,
            ServiceLevel::Standard,
        )
        .await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_expired_cache_entry_refetches() {
    let calls = Arc::new(AtomicU32::new(0));
    let engine = engine(
        FlakyProvider {
            calls: calls.clone(),
            fail_when: |_| false,
        },
        Duration::from_millis(40),
    );

    let m = manifest(6.6);
    engine
        .quote(
            &m,
            &destination(),
            ShipmentType::Delivery,
            ServiceLevel::Standard,
        )
        .await;
    tokio::time::sleep(Duration::from_millis(60)).await;
    engine
        .quote(
            &m,
            &destination(),
            ShipmentType::Delivery,
            ServiceLevel::Standard,
        )
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let calls = Arc::new(AtomicU32::new(0));
    // Fails twice; the third attempt (second retry) succeeds.
    let engine = engine(
        FlakyProvider {
            calls: calls.clone(),
            fail_when: |call| call <= 2,
        },
        Duration::from_secs(120),
    );

    let outcome = engine
        .quote(
            &manifest(6.6),
            &destination(),
            ShipmentType::Delivery,
            ServiceLevel::Standard,
        )
        .await;

    assert!(matches!(outcome, RateOutcome::Quotes(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_exhausted_retries_without_cache_reports_unavailable() {
    let calls = Arc::new(AtomicU32::new(0));
    let engine = engine(
        FlakyProvider {
            calls: calls.clone(),
            fail_when: |_| true,
        },
        Duration::from_secs(120),
    );

    let outcome = engine
        .quote(
            &manifest(6.6),
            &destination(),
            ShipmentType::Delivery,
            ServiceLevel::Standard,
        )
        .await;

    assert!(matches!(outcome, RateOutcome::RatesUnavailable { .. }));
    // Initial attempt plus two retries.
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_exhausted_retries_fall_back_to_stale_cache() {
    let calls = Arc::new(AtomicU32::new(0));
    // First request succeeds and caches; everything after fails.
    let engine = engine(
        FlakyProvider {
            calls: calls.clone(),
            fail_when: |call| call > 1,
        },
        Duration::from_millis(30),
    );

    let m = manifest(6.6);
    let first = engine
        .quote(
            &m,
            &destination(),
            ShipmentType::Delivery,
            ServiceLevel::Standard,
        )
        .await;
    let RateOutcome::Quotes(cached) = first else {
        panic!("expected quotes on first call");
    };

    // Entry expires, then the provider goes down hard.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let engine_down = CarrierRateEngine::new(
        AlwaysDown,
        RecommendWeights::default(),
        Duration::from_millis(30),
        fast_retry(),
    );
    // Different engine instance has no cache: unavailable.
    let outcome = engine_down
        .quote(
            &m,
            &destination(),
            ShipmentType::Delivery,
            ServiceLevel::Standard,
        )
        .await;
    assert!(matches!(outcome, RateOutcome::RatesUnavailable { .. }));

    // The original engine still has the stale entry and serves it.
    let outcome = engine
        .quote(
            &m,
            &destination(),
            ShipmentType::Delivery,
            ServiceLevel::Standard,
        )
        .await;
    assert_eq!(outcome, RateOutcome::Quotes(cached));
}

struct AlwaysDown;

#[async_trait]
impl RateProvider for AlwaysDown {
    async fn fetch_rates(&self, _request: &RateRequest) -> freight_engine::Result<Vec<CarrierQuote>> {
        Err(FreightError::ProcessingError {
            message: "provider down".to_string(),
        })
    }
}
