use crate::domain::model::DimensionsMm;
use crate::domain::ports::WeightSource;
use crate::utils::error::{FreightError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// In-memory weight catalog: measured product weights, product-to-category
/// classification, category averages, and optional dimensions. Loadable
/// from TOML, or built up programmatically for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct WeightCatalog {
    measured: HashMap<String, u32>,
    categories: HashMap<String, String>,
    category_averages: HashMap<String, u32>,
    dimensions: HashMap<String, DimensionsMm>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    products: Vec<ProductEntry>,
    #[serde(default)]
    categories: Vec<CategoryEntry>,
}

#[derive(Debug, Deserialize)]
struct ProductEntry {
    id: String,
    weight_g: Option<u32>,
    category: Option<String>,
    length_mm: Option<u32>,
    width_mm: Option<u32>,
    height_mm: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CategoryEntry {
    id: String,
    avg_weight_g: u32,
}

impl WeightCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(FreightError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(content)?;
        let mut catalog = Self::new();

        for category in file.categories {
            catalog
                .category_averages
                .insert(category.id, category.avg_weight_g);
        }
        for product in file.products {
            if let Some(weight_g) = product.weight_g {
                catalog.measured.insert(product.id.clone(), weight_g);
            }
            if let Some(category) = product.category {
                catalog.categories.insert(product.id.clone(), category);
            }
            if let (Some(l), Some(w), Some(h)) =
                (product.length_mm, product.width_mm, product.height_mm)
            {
                catalog.dimensions.insert(
                    product.id,
                    DimensionsMm {
                        length_mm: l,
                        width_mm: w,
                        height_mm: h,
                    },
                );
            }
        }
        Ok(catalog)
    }

    pub fn with_measured(mut self, product_id: &str, weight_g: u32) -> Self {
        self.measured.insert(product_id.to_string(), weight_g);
        self
    }

    pub fn with_category(mut self, product_id: &str, category_id: &str) -> Self {
        self.categories
            .insert(product_id.to_string(), category_id.to_string());
        self
    }

    pub fn with_category_average(mut self, category_id: &str, avg_weight_g: u32) -> Self {
        self.category_averages
            .insert(category_id.to_string(), avg_weight_g);
        self
    }

    pub fn with_dimensions(mut self, product_id: &str, dims: DimensionsMm) -> Self {
        self.dimensions.insert(product_id.to_string(), dims);
        self
    }
}

impl WeightSource for WeightCatalog {
    fn measured_weight_g(&self, product_id: &str) -> Option<u32> {
        self.measured.get(product_id).copied()
    }

    fn category_of(&self, product_id: &str) -> Option<String> {
        self.categories.get(product_id).cloned()
    }

    fn category_average_g(&self, category_id: &str) -> Option<u32> {
        self.category_averages.get(category_id).copied()
    }

    fn dimensions(&self, product_id: &str) -> Option<DimensionsMm> {
        self.dimensions.get(product_id).copied()
    }
}
