use crate::config::toml_config::CarrierServiceConfig;
use crate::domain::model::{CarrierQuote, ShipmentType};
use crate::domain::ports::{RateProvider, RateRequest};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Rate provider backed by configured rate cards, for installations without
/// live carrier credentials. Pricing per card:
/// `base + per_kg * billable_weight + per_parcel * parcels`, plus the rural
/// surcharge per parcel on rural deliveries.
pub struct TableRateProvider {
    cards: Vec<CarrierServiceConfig>,
}

impl TableRateProvider {
    pub fn new(cards: Vec<CarrierServiceConfig>) -> Self {
        Self { cards }
    }
}

#[async_trait]
impl RateProvider for TableRateProvider {
    async fn fetch_rates(&self, request: &RateRequest) -> Result<Vec<CarrierQuote>> {
        let parcels = request.manifest.parcel_count as f64;
        let billable_kg = request.manifest.billable_weight_kg;

        let quotes = self
            .cards
            .iter()
            // The requested level is a floor: express admits overnight too.
            .filter(|card| card.service_level >= request.service_level)
            .map(|card| {
                let mut price =
                    card.base_price + card.per_kg * billable_kg + card.per_parcel * parcels;
                if request.destination.rural && request.shipment_type == ShipmentType::Delivery {
                    price += card.rural_surcharge * parcels;
                }
                CarrierQuote {
                    carrier_name: card.carrier.clone(),
                    service_level: card.service_level,
                    service_name: card.service_name.clone(),
                    price: (price * 100.0).round() / 100.0,
                    eta_days: card.eta_days,
                    tags: vec![],
                }
            })
            .collect();

        Ok(quotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Address, ManifestSummary, Parcel, ParcelKind, ServiceLevel};

    fn manifest(weight_kg: f64, parcels: usize) -> ManifestSummary {
        let parcel = Parcel {
            parcel_id: 1,
            kind: ParcelKind::Box,
            max_weight_kg: 25.0,
            max_volume_m3: None,
            contents: vec![],
            weight_kg: weight_kg / parcels as f64,
            volume_m3: None,
            over_limit: false,
        };
        let parcels: Vec<Parcel> = (0..parcels).map(|_| parcel.clone()).collect();
        ManifestSummary::from_parcels(&parcels, vec![], 5000.0)
    }

    fn destination(rural: bool) -> Address {
        Address {
            building_name: None,
            street: "12 High St".to_string(),
            suburb: None,
            city: "Auckland".to_string(),
            postcode: "1010".to_string(),
            country_code: "NZ".to_string(),
            rural,
        }
    }

    fn card(level: ServiceLevel, base: f64, per_kg: f64, eta: u32) -> CarrierServiceConfig {
        CarrierServiceConfig {
            carrier: "NZ Post".to_string(),
            service_name: format!("NZ Post {:?}", level),
            service_level: level,
            base_price: base,
            per_kg,
            per_parcel: 0.0,
            rural_surcharge: 3.50,
            eta_days: eta,
        }
    }

    #[tokio::test]
    async fn test_price_follows_rate_card() {
        let provider = TableRateProvider::new(vec![card(ServiceLevel::Standard, 5.50, 2.20, 3)]);
        let request = RateRequest {
            manifest: manifest(10.0, 1),
            destination: destination(false),
            shipment_type: ShipmentType::Delivery,
            service_level: ServiceLevel::Standard,
        };

        let quotes = provider.fetch_rates(&request).await.unwrap();
        assert_eq!(quotes.len(), 1);
        assert!((quotes[0].price - 27.50).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_rural_surcharge_applies_per_parcel_on_delivery() {
        let provider = TableRateProvider::new(vec![card(ServiceLevel::Standard, 5.00, 1.00, 3)]);
        let request = RateRequest {
            manifest: manifest(4.0, 2),
            destination: destination(true),
            shipment_type: ShipmentType::Delivery,
            service_level: ServiceLevel::Standard,
        };

        let quotes = provider.fetch_rates(&request).await.unwrap();
        // 5.00 + 1.00 * 4 kg + 3.50 * 2 parcels
        assert!((quotes[0].price - 16.00).abs() < 1e-9);

        let pickup = RateRequest {
            shipment_type: ShipmentType::Pickup,
            ..request
        };
        let quotes = provider.fetch_rates(&pickup).await.unwrap();
        assert!((quotes[0].price - 9.00).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_service_level_is_a_floor() {
        let provider = TableRateProvider::new(vec![
            card(ServiceLevel::Standard, 5.00, 1.00, 3),
            card(ServiceLevel::Express, 9.00, 2.00, 1),
            card(ServiceLevel::Overnight, 12.00, 3.00, 1),
        ]);
        let request = RateRequest {
            manifest: manifest(2.0, 1),
            destination: destination(false),
            shipment_type: ShipmentType::Delivery,
            service_level: ServiceLevel::Express,
        };

        let quotes = provider.fetch_rates(&request).await.unwrap();
        assert_eq!(quotes.len(), 2);
        assert!(quotes
            .iter()
            .all(|q| q.service_level >= ServiceLevel::Express));
    }
}
