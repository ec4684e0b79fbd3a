use crate::domain::model::{
    Address, AddressInput, CarrierQuote, ManifestSummary, QuoteTag, ServiceLevel, ShipmentType,
};
use crate::domain::ports::{RateProvider, RateRequest};
use crate::utils::error::Result;
use crate::utils::validation::is_valid_nz_postcode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Carrier field length caps (GSS contact model).
const MAX_FIELD_LEN: usize = 50;
const MAX_POSTCODE_LEN: usize = 10;

/// Outcome of a rate request. All three arms are first-class results the
/// caller branches on; none of them is an error that crosses the session
/// boundary as an exception.
#[derive(Debug, Clone, PartialEq)]
pub enum RateOutcome {
    Quotes(Vec<CarrierQuote>),
    AddressValidationRequired { missing_fields: Vec<String> },
    RatesUnavailable { reason: String },
}

/// Weighting for the `recommended` tag score. Configuration, not business
/// logic: `score = price_weight * norm(price) + eta_weight * norm(eta)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecommendWeights {
    pub price_weight: f64,
    pub eta_weight: f64,
}

impl Default for RecommendWeights {
    fn default() -> Self {
        Self {
            price_weight: 0.7,
            eta_weight: 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct QuoteKey {
    manifest_fingerprint: u64,
    destination: Address,
    shipment_type: ShipmentType,
    service_level: ServiceLevel,
}

struct CacheEntry {
    quotes: Vec<CarrierQuote>,
    fetched_at: Instant,
}

/// Produces ranked, tagged carrier quotes for a manifest and destination.
///
/// Quotes are cached per (manifest fingerprint, destination, shipment type,
/// service level) for a short TTL so keystroke-triggered recomputes do not
/// refetch; a manifest-affecting edit changes the fingerprint and misses
/// the cache naturally. Transient provider failures are retried with
/// backoff, then fall back to the last cached quotes for the key even when
/// expired.
pub struct CarrierRateEngine<P: RateProvider> {
    provider: P,
    weights: RecommendWeights,
    ttl: Duration,
    retry: RetryPolicy,
    cache: Mutex<HashMap<QuoteKey, CacheEntry>>,
}

impl<P: RateProvider> CarrierRateEngine<P> {
    pub fn new(provider: P, weights: RecommendWeights, ttl: Duration, retry: RetryPolicy) -> Self {
        Self {
            provider,
            weights,
            ttl,
            retry,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub async fn quote(
        &self,
        manifest: &ManifestSummary,
        destination: &AddressInput,
        shipment_type: ShipmentType,
        service_level: ServiceLevel,
    ) -> RateOutcome {
        let normalized = normalize_address(destination);
        if !normalized.missing_fields.is_empty() {
            return RateOutcome::AddressValidationRequired {
                missing_fields: normalized.missing_fields,
            };
        }

        let key = QuoteKey {
            manifest_fingerprint: manifest.fingerprint,
            destination: normalized.address.clone(),
            shipment_type,
            service_level,
        };

        {
            let cache = self.cache.lock().await;
            if let Some(entry) = cache.get(&key) {
                if entry.fetched_at.elapsed() < self.ttl {
                    tracing::debug!("Quote cache hit for manifest {:x}", key.manifest_fingerprint);
                    return RateOutcome::Quotes(entry.quotes.clone());
                }
            }
        }

        let request = RateRequest {
            manifest: manifest.clone(),
            destination: normalized.address,
            shipment_type,
            service_level,
        };

        match self.fetch_with_retry(&request).await {
            Ok(raw) if raw.is_empty() => RateOutcome::RatesUnavailable {
                reason: "No carrier offered a rate for this manifest".to_string(),
            },
            Ok(raw) => {
                let ranked = rank_quotes(raw, self.weights);
                let mut cache = self.cache.lock().await;
                cache.insert(
                    key,
                    CacheEntry {
                        quotes: ranked.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                RateOutcome::Quotes(ranked)
            }
            Err(e) => {
                let cache = self.cache.lock().await;
                if let Some(entry) = cache.get(&key) {
                    tracing::warn!("Rate fetch failed ({}); serving last cached quotes", e);
                    RateOutcome::Quotes(entry.quotes.clone())
                } else {
                    RateOutcome::RatesUnavailable {
                        reason: e.to_string(),
                    }
                }
            }
        }
    }

    async fn fetch_with_retry(&self, request: &RateRequest) -> Result<Vec<CarrierQuote>> {
        let mut delay = self.retry.initial_delay;
        let mut attempt = 0u32;
        loop {
            match self.provider.fetch_rates(request).await {
                Ok(quotes) => return Ok(quotes),
                Err(e) => {
                    if attempt >= self.retry.max_retries {
                        return Err(e);
                    }
                    attempt += 1;
                    tracing::warn!(
                        "Rate fetch attempt {} failed: {}; retrying in {:?}",
                        attempt,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }
}

/// Tags exactly one cheapest, one fastest and one recommended quote, then
/// orders the list by recommendation score. One quote may carry several
/// tags; with a single quote it carries all three.
pub fn rank_quotes(mut quotes: Vec<CarrierQuote>, weights: RecommendWeights) -> Vec<CarrierQuote> {
    if quotes.is_empty() {
        return quotes;
    }

    for quote in &mut quotes {
        quote.tags.clear();
    }

    // Stable base order so tagging ties break the same way every run.
    quotes.sort_by(|a, b| {
        a.price
            .total_cmp(&b.price)
            .then_with(|| a.carrier_name.cmp(&b.carrier_name))
            .then_with(|| a.service_name.cmp(&b.service_name))
    });

    let min_price = quotes.iter().map(|q| q.price).fold(f64::INFINITY, f64::min);
    let max_price = quotes
        .iter()
        .map(|q| q.price)
        .fold(f64::NEG_INFINITY, f64::max);
    let min_eta = quotes.iter().map(|q| q.eta_days).min().unwrap_or(0);
    let max_eta = quotes.iter().map(|q| q.eta_days).max().unwrap_or(0);

    let norm = |value: f64, min: f64, max: f64| {
        if max <= min {
            0.0
        } else {
            (value - min) / (max - min)
        }
    };

    let score = |q: &CarrierQuote| {
        weights.price_weight * norm(q.price, min_price, max_price)
            + weights.eta_weight * norm(q.eta_days as f64, min_eta as f64, max_eta as f64)
    };

    // Base order is (price, carrier): index 0 is the cheapest.
    let cheapest = 0usize;

    let mut fastest = 0usize;
    for (i, q) in quotes.iter().enumerate() {
        if q.eta_days < quotes[fastest].eta_days {
            fastest = i;
        }
    }

    let mut recommended = 0usize;
    let mut best_score = f64::INFINITY;
    for (i, q) in quotes.iter().enumerate() {
        let s = score(q);
        if s < best_score {
            best_score = s;
            recommended = i;
        }
    }

    quotes[cheapest].tags.push(QuoteTag::Cheapest);
    quotes[fastest].tags.push(QuoteTag::Fastest);
    quotes[recommended].tags.push(QuoteTag::Recommended);

    // Present recommended-first, then by score.
    let mut scored: Vec<(f64, CarrierQuote)> = quotes.into_iter().map(|q| (score(&q), q)).collect();
    scored.sort_by(|a, b| {
        a.0.total_cmp(&b.0)
            .then_with(|| a.1.price.total_cmp(&b.1.price))
            .then_with(|| a.1.carrier_name.cmp(&b.1.carrier_name))
    });
    scored.into_iter().map(|(_, q)| q).collect()
}

pub struct NormalizedAddress {
    pub address: Address,
    pub missing_fields: Vec<String>,
}

/// Normalizes the loose UI address into the strict `Address`:
/// unit/level/building text in line two becomes the building name, fields
/// are trimmed and truncated to carrier caps, the country code defaults to
/// NZ, and rural hints are detected from the street line. Required-field
/// gaps are reported, not thrown.
pub fn normalize_address(input: &AddressInput) -> NormalizedAddress {
    let addr1 = input.address1.trim();
    let addr2 = input.address2.trim();
    let suburb = input.suburb.trim();
    let city = input.city.trim();
    let postcode = input.postcode.trim();
    let country_raw = input.country.trim().to_uppercase();

    let addr2_is_building = {
        let lower = addr2.to_lowercase();
        const UNIT_KEYWORDS: [&str; 10] = [
            "unit", "level", "floor", "fl", "apt", "apartment", "suite", "ste", "building", "bldg",
        ];
        !addr2.is_empty() && UNIT_KEYWORDS.iter().any(|kw| lower.contains(kw))
    };

    let (building_name, street) = if addr2_is_building {
        (Some(addr2.to_string()), addr1.to_string())
    } else if !addr2.is_empty() && !addr1.is_empty() {
        (None, format!("{}, {}", addr2, addr1))
    } else if !addr2.is_empty() {
        (None, addr2.to_string())
    } else {
        (None, addr1.to_string())
    };

    let country_code = if country_raw.len() == 2 && country_raw.chars().all(|c| c.is_ascii_alphabetic()) {
        country_raw
    } else {
        if !country_raw.is_empty() {
            tracing::warn!("Invalid country code '{}', defaulting to NZ", country_raw);
        }
        "NZ".to_string()
    };

    let street = truncate_field("street", street, MAX_FIELD_LEN);
    let suburb = truncate_field("suburb", suburb.to_string(), MAX_FIELD_LEN);
    let city = truncate_field("city", city.to_string(), MAX_FIELD_LEN);
    let postcode = truncate_field("postcode", postcode.to_string(), MAX_POSTCODE_LEN);
    let building_name =
        building_name.map(|b| truncate_field("building_name", b, MAX_FIELD_LEN));

    let mut missing_fields = Vec::new();
    if street.is_empty() {
        missing_fields.push("street".to_string());
    }
    if city.is_empty() {
        missing_fields.push("city".to_string());
    }
    if postcode.is_empty() || (country_code == "NZ" && !is_valid_nz_postcode(&postcode)) {
        missing_fields.push("postcode".to_string());
    }

    let rural = is_rural_street(&street);

    NormalizedAddress {
        address: Address {
            building_name,
            street,
            suburb: if suburb.is_empty() {
                None
            } else {
                Some(suburb)
            },
            city,
            postcode,
            country_code,
            rural,
        },
        missing_fields,
    }
}

fn truncate_field(name: &str, value: String, max_len: usize) -> String {
    if value.chars().count() > max_len {
        tracing::warn!("Address field '{}' truncated to {} characters", name, max_len);
        value.chars().take(max_len).collect()
    } else {
        value
    }
}

/// Rural delivery hint: an "RD"/"SH" token or a rural/highway word in the
/// street line. Token-based so "Main Road" does not count as rural.
fn is_rural_street(street: &str) -> bool {
    street
        .split(|c: char| c.is_whitespace() || c == ',')
        .any(|token| {
            token == "RD"
                || token == "SH"
                || token.eq_ignore_ascii_case("rural")
                || token.eq_ignore_ascii_case("highway")
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(carrier: &str, price: f64, eta: u32) -> CarrierQuote {
        CarrierQuote {
            carrier_name: carrier.to_string(),
            service_level: ServiceLevel::Standard,
            service_name: format!("{} Standard", carrier),
            price,
            eta_days: eta,
            tags: vec![],
        }
    }

    #[test]
    fn test_tags_are_exclusive_counts() {
        let ranked = rank_quotes(
            vec![
                quote("NZ Post", 9.80, 3),
                quote("NZ Courier", 12.40, 1),
                quote("Fastway", 8.90, 4),
            ],
            RecommendWeights::default(),
        );

        let count = |tag: QuoteTag| ranked.iter().filter(|q| q.has_tag(tag)).count();
        assert_eq!(count(QuoteTag::Cheapest), 1);
        assert_eq!(count(QuoteTag::Fastest), 1);
        assert_eq!(count(QuoteTag::Recommended), 1);

        let cheapest = ranked
            .iter()
            .find(|q| q.has_tag(QuoteTag::Cheapest))
            .unwrap();
        assert_eq!(cheapest.carrier_name, "Fastway");
        let fastest = ranked
            .iter()
            .find(|q| q.has_tag(QuoteTag::Fastest))
            .unwrap();
        assert_eq!(fastest.carrier_name, "NZ Courier");
    }

    #[test]
    fn test_single_quote_carries_all_tags() {
        let ranked = rank_quotes(vec![quote("NZ Post", 9.80, 3)], RecommendWeights::default());
        assert_eq!(ranked.len(), 1);
        assert!(ranked[0].has_tag(QuoteTag::Cheapest));
        assert!(ranked[0].has_tag(QuoteTag::Fastest));
        assert!(ranked[0].has_tag(QuoteTag::Recommended));
    }

    #[test]
    fn test_recommended_respects_weights() {
        let quotes = vec![quote("Cheap", 5.0, 5), quote("Fast", 20.0, 1)];

        let price_led = rank_quotes(
            quotes.clone(),
            RecommendWeights {
                price_weight: 1.0,
                eta_weight: 0.0,
            },
        );
        assert!(price_led
            .iter()
            .find(|q| q.has_tag(QuoteTag::Recommended))
            .unwrap()
            .carrier_name
            .contains("Cheap"));

        let eta_led = rank_quotes(
            quotes,
            RecommendWeights {
                price_weight: 0.0,
                eta_weight: 1.0,
            },
        );
        assert!(eta_led
            .iter()
            .find(|q| q.has_tag(QuoteTag::Recommended))
            .unwrap()
            .carrier_name
            .contains("Fast"));
    }

    #[test]
    fn test_missing_postcode_is_reported_not_thrown() {
        let input = AddressInput {
            address1: "12 High St".to_string(),
            city: "Auckland".to_string(),
            ..AddressInput::default()
        };
        let normalized = normalize_address(&input);
        assert_eq!(normalized.missing_fields, vec!["postcode".to_string()]);
    }

    #[test]
    fn test_unit_line_becomes_building_name() {
        let input = AddressInput {
            address1: "12 High St".to_string(),
            address2: "Unit 4B".to_string(),
            city: "Auckland".to_string(),
            postcode: "1010".to_string(),
            ..AddressInput::default()
        };
        let normalized = normalize_address(&input);
        assert!(normalized.missing_fields.is_empty());
        assert_eq!(normalized.address.building_name.as_deref(), Some("Unit 4B"));
        assert_eq!(normalized.address.street, "12 High St");
    }

    #[test]
    fn test_second_line_without_unit_prefixes_street() {
        let input = AddressInput {
            address1: "Main Depot".to_string(),
            address2: "45 Wharf Rd".to_string(),
            city: "Tauranga".to_string(),
            postcode: "3110".to_string(),
            ..AddressInput::default()
        };
        let normalized = normalize_address(&input);
        assert_eq!(normalized.address.street, "45 Wharf Rd, Main Depot");
    }

    #[test]
    fn test_country_defaults_to_nz() {
        let input = AddressInput {
            address1: "1 Quay St".to_string(),
            city: "Auckland".to_string(),
            postcode: "1010".to_string(),
            country: "New Zealand".to_string(), // not an ISO alpha-2 code
            ..AddressInput::default()
        };
        let normalized = normalize_address(&input);
        assert_eq!(normalized.address.country_code, "NZ");
    }

    #[test]
    fn test_rural_detection_is_token_based() {
        let rural = AddressInput {
            address1: "1296 State Highway 2, RD 4".to_string(),
            city: "Katikati".to_string(),
            postcode: "3181".to_string(),
            ..AddressInput::default()
        };
        assert!(normalize_address(&rural).address.rural);

        let urban = AddressInput {
            address1: "14 Broadway Road".to_string(),
            city: "Hamilton".to_string(),
            postcode: "3216".to_string(),
            ..AddressInput::default()
        };
        assert!(!normalize_address(&urban).address.rural);
    }

    #[test]
    fn test_overlong_field_truncated() {
        let input = AddressInput {
            address1: "A".repeat(80),
            city: "Auckland".to_string(),
            postcode: "1010".to_string(),
            ..AddressInput::default()
        };
        let normalized = normalize_address(&input);
        assert_eq!(normalized.address.street.len(), 50);
        assert!(normalized.missing_fields.is_empty());
    }
}
