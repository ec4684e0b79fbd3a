use crate::domain::model::{ProductId, ResolvedWeight, WeightConfidence};
use crate::domain::ports::WeightSource;
use std::collections::HashMap;

/// Resolves shipping weights with the Measured > CategoryAverage > Default
/// order. Resolution never fails: a product with no data at all still gets
/// the configured default weight at `Default` confidence, so missing weight
/// data can only ever show up as a confidence indicator, never block
/// packing.
///
/// Results are cached for the lifetime of the resolver (one per session),
/// keyed by product id; repeated calls with the same ids are idempotent.
pub struct WeightResolver<W: WeightSource> {
    source: W,
    default_weight_g: u32,
    cache: HashMap<ProductId, ResolvedWeight>,
}

impl<W: WeightSource> WeightResolver<W> {
    pub fn new(source: W, default_weight_g: u32) -> Self {
        Self {
            source,
            default_weight_g,
            cache: HashMap::new(),
        }
    }

    pub fn resolve(&mut self, product_ids: &[ProductId]) -> HashMap<ProductId, ResolvedWeight> {
        product_ids
            .iter()
            .map(|id| (id.clone(), self.resolve_one(id)))
            .collect()
    }

    pub fn resolve_one(&mut self, product_id: &str) -> ResolvedWeight {
        if let Some(hit) = self.cache.get(product_id) {
            return *hit;
        }

        let resolved = if let Some(weight_g) = self.source.measured_weight_g(product_id) {
            ResolvedWeight {
                weight_g,
                confidence: WeightConfidence::Measured,
            }
        } else if let Some(avg_g) = self
            .source
            .category_of(product_id)
            .and_then(|category| self.source.category_average_g(&category))
        {
            ResolvedWeight {
                weight_g: avg_g,
                confidence: WeightConfidence::CategoryAverage,
            }
        } else {
            tracing::debug!("No weight data for product {}, using default", product_id);
            ResolvedWeight {
                weight_g: self.default_weight_g,
                confidence: WeightConfidence::Default,
            }
        };

        self.cache.insert(product_id.to_string(), resolved);
        resolved
    }

    pub fn unit_volume_cm3(&self, product_id: &str) -> Option<f64> {
        self.source
            .dimensions(product_id)
            .map(|dims| dims.volume_cm3())
    }

    /// Compact tier legend for the weight console, e.g. "11P/3C/2D".
    /// Tiers with zero products are omitted; an empty map renders empty.
    pub fn legend_summary(weights: &HashMap<ProductId, ResolvedWeight>) -> String {
        let mut measured = 0usize;
        let mut category = 0usize;
        let mut default = 0usize;
        for resolved in weights.values() {
            match resolved.confidence {
                WeightConfidence::Measured => measured += 1,
                WeightConfidence::CategoryAverage => category += 1,
                WeightConfidence::Default => default += 1,
            }
        }

        let mut parts = Vec::new();
        if measured > 0 {
            parts.push(format!("{}P", measured));
        }
        if category > 0 {
            parts.push(format!("{}C", category));
        }
        if default > 0 {
            parts.push(format!("{}D", default));
        }
        parts.join("/")
    }
}
