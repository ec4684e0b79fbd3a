use crate::core::coordinator::CoordinatorSettings;
use crate::core::packer::PackConstraints;
use crate::core::rates::{RecommendWeights, RetryPolicy};
use crate::domain::model::ServiceLevel;
use crate::utils::error::{FreightError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_positive_weight, validate_range, validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub packing: PackingConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub recommend: RecommendConfig,
    #[serde(default)]
    pub quotes: QuotesConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub carriers: Vec<CarrierServiceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackingConfig {
    pub max_weight_kg: f64,
    pub satchel_limit_kg: f64,
    pub volumetric_factor: Option<f64>,
    pub transfer_ceiling_kg: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolverConfig {
    pub default_weight_g: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendConfig {
    pub price_weight: Option<f64>,
    pub eta_weight: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuotesConfig {
    /// "table" (built-in rate cards) or "http" (remote rates endpoint).
    pub provider: Option<String>,
    pub endpoint: Option<String>,
    pub ttl_seconds: Option<u64>,
    pub retry_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    pub debounce_ms: Option<u64>,
    pub autosave_seconds: Option<u64>,
}

/// One carrier/service rate card: price = base + per_kg * billable weight
/// + per_parcel * parcels (+ rural surcharge per parcel).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarrierServiceConfig {
    pub carrier: String,
    pub service_name: String,
    pub service_level: ServiceLevel,
    pub base_price: f64,
    pub per_kg: f64,
    #[serde(default)]
    pub per_parcel: f64,
    #[serde(default)]
    pub rural_surcharge: f64,
    pub eta_days: u32,
}

impl EngineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(FreightError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content);
        Ok(toml::from_str(&processed)?)
    }

    /// Replaces `${VAR_NAME}` placeholders from the environment; unknown
    /// variables are left as-is.
    fn substitute_env_vars(content: &str) -> String {
        use regex::Regex;
        use std::sync::OnceLock;
        static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
        let re = PLACEHOLDER
            .get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("static placeholder pattern"));

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .to_string()
    }

    pub fn pack_constraints(&self) -> PackConstraints {
        PackConstraints {
            max_weight_kg: self.packing.max_weight_kg,
            satchel_limit_kg: self.packing.satchel_limit_kg,
            volumetric_factor: self.packing.volumetric_factor.unwrap_or(5000.0),
            transfer_ceiling_kg: self.packing.transfer_ceiling_kg,
        }
    }

    pub fn default_weight_g(&self) -> u32 {
        self.resolver.default_weight_g.unwrap_or(100)
    }

    pub fn recommend_weights(&self) -> RecommendWeights {
        let defaults = RecommendWeights::default();
        RecommendWeights {
            price_weight: self.recommend.price_weight.unwrap_or(defaults.price_weight),
            eta_weight: self.recommend.eta_weight.unwrap_or(defaults.eta_weight),
        }
    }

    pub fn quote_ttl(&self) -> Duration {
        Duration::from_secs(self.quotes.ttl_seconds.unwrap_or(120))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy {
            max_retries: self.quotes.retry_attempts.unwrap_or(defaults.max_retries),
            initial_delay: self
                .quotes
                .retry_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.initial_delay),
        }
    }

    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        let defaults = CoordinatorSettings::default();
        CoordinatorSettings {
            debounce: self
                .session
                .debounce_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.debounce),
            autosave_every: self
                .session
                .autosave_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.autosave_every),
        }
    }

    pub fn rates_provider(&self) -> &str {
        self.quotes.provider.as_deref().unwrap_or("table")
    }
}

impl Default for EngineConfig {
    /// Built-in defaults mirroring the standard NZ carrier set, so the
    /// engine runs without a config file.
    fn default() -> Self {
        Self {
            packing: PackingConfig {
                max_weight_kg: 25.0,
                satchel_limit_kg: 2.0,
                volumetric_factor: Some(5000.0),
                transfer_ceiling_kg: Some(30.0),
            },
            resolver: ResolverConfig::default(),
            recommend: RecommendConfig::default(),
            quotes: QuotesConfig::default(),
            session: SessionConfig::default(),
            carriers: vec![
                CarrierServiceConfig {
                    carrier: "NZ Post".to_string(),
                    service_name: "NZ Post Standard".to_string(),
                    service_level: ServiceLevel::Standard,
                    base_price: 5.50,
                    per_kg: 2.20,
                    per_parcel: 0.0,
                    rural_surcharge: 3.50,
                    eta_days: 3,
                },
                CarrierServiceConfig {
                    carrier: "NZ Post".to_string(),
                    service_name: "NZ Post Express".to_string(),
                    service_level: ServiceLevel::Express,
                    base_price: 8.90,
                    per_kg: 3.50,
                    per_parcel: 0.0,
                    rural_surcharge: 3.50,
                    eta_days: 1,
                },
                CarrierServiceConfig {
                    carrier: "NZ Courier".to_string(),
                    service_name: "NZ Courier Standard".to_string(),
                    service_level: ServiceLevel::Standard,
                    base_price: 6.20,
                    per_kg: 2.50,
                    per_parcel: 1.00,
                    rural_surcharge: 4.50,
                    eta_days: 2,
                },
                CarrierServiceConfig {
                    carrier: "NZ Courier".to_string(),
                    service_name: "NZ Courier Overnight".to_string(),
                    service_level: ServiceLevel::Overnight,
                    base_price: 12.50,
                    per_kg: 4.00,
                    per_parcel: 1.00,
                    rural_surcharge: 4.50,
                    eta_days: 1,
                },
            ],
        }
    }
}

impl Validate for EngineConfig {
    fn validate(&self) -> Result<()> {
        validate_positive_weight("packing.max_weight_kg", self.packing.max_weight_kg)?;
        validate_positive_weight("packing.satchel_limit_kg", self.packing.satchel_limit_kg)?;
        if self.packing.satchel_limit_kg >= self.packing.max_weight_kg {
            return Err(FreightError::InvalidConfigValueError {
                field: "packing.satchel_limit_kg".to_string(),
                value: self.packing.satchel_limit_kg.to_string(),
                reason: "Satchel limit must be below the box weight cap".to_string(),
            });
        }
        if let Some(factor) = self.packing.volumetric_factor {
            validate_positive_weight("packing.volumetric_factor", factor)?;
        }

        let weights = self.recommend_weights();
        validate_range("recommend.price_weight", weights.price_weight, 0.0, 1.0)?;
        validate_range("recommend.eta_weight", weights.eta_weight, 0.0, 1.0)?;
        if weights.price_weight + weights.eta_weight <= 0.0 {
            return Err(FreightError::InvalidConfigValueError {
                field: "recommend".to_string(),
                value: "0/0".to_string(),
                reason: "At least one recommendation weight must be positive".to_string(),
            });
        }

        match self.rates_provider() {
            "table" => {
                if self.carriers.is_empty() {
                    return Err(FreightError::ConfigError {
                        message: "Table rate provider needs at least one [[carriers]] entry"
                            .to_string(),
                    });
                }
                for carrier in &self.carriers {
                    validate_non_empty_string("carriers.carrier", &carrier.carrier)?;
                    validate_non_empty_string("carriers.service_name", &carrier.service_name)?;
                }
            }
            "http" => {
                let endpoint = self.quotes.endpoint.as_deref().unwrap_or("");
                validate_url("quotes.endpoint", endpoint)?;
            }
            other => {
                return Err(FreightError::InvalidConfigValueError {
                    field: "quotes.provider".to_string(),
                    value: other.to_string(),
                    reason: "Supported providers: table, http".to_string(),
                });
            }
        }

        Ok(())
    }
}
