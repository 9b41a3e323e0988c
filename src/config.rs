//! Runtime configuration

use crate::error::{DealError, Result};
use crate::vat::DEFAULT_VAT_FRACTION;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Record-store table names
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableNames {
    pub orders: String,
    pub inventory: String,
    pub sellers: String,
    pub buyers: String,
    pub skus: String,
    pub offer_messages: String,
    pub sales: String,
    pub affiliate_sales: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            orders: "Orders".to_string(),
            inventory: "Inventory".to_string(),
            sellers: "Sellers".to_string(),
            buyers: "Buyers".to_string(),
            skus: "SKU Master".to_string(),
            offer_messages: "Offer Messages".to_string(),
            sales: "Sales".to_string(),
            affiliate_sales: "Affiliate Sales".to_string(),
        }
    }
}

impl TableNames {
    fn all(&self) -> [(&'static str, &str); 8] {
        [
            ("orders", &self.orders),
            ("inventory", &self.inventory),
            ("sellers", &self.sellers),
            ("buyers", &self.buyers),
            ("skus", &self.skus),
            ("offer_messages", &self.offer_messages),
            ("sales", &self.sales),
            ("affiliate_sales", &self.affiliate_sales),
        ]
    }
}

/// DealDesk configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DealConfig {
    pub tables: TableNames,
    /// VAT fraction used when a seller reports no usable rate
    pub default_vat_fraction: f64,
    pub currency_symbol: String,
}

impl Default for DealConfig {
    fn default() -> Self {
        Self {
            tables: TableNames::default(),
            default_vat_fraction: DEFAULT_VAT_FRACTION,
            currency_symbol: "€".to_string(),
        }
    }
}

impl DealConfig {
    /// Load from an optional JSON file; missing keys keep their defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                tracing::debug!("Reading configuration from {}", path.display());
                let raw = std::fs::read_to_string(path)?;
                Self::from_json(&raw)?
            }
            None => Self::default(),
        };

        config.validate()?;
        tracing::debug!("Configuration loaded: {:?}", config);
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| DealError::Configuration(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        for (key, name) in self.tables.all() {
            if name.trim().is_empty() {
                return Err(DealError::InvalidConfig(format!(
                    "table name '{}' must not be empty",
                    key
                )));
            }
        }

        if !(self.default_vat_fraction > 0.0 && self.default_vat_fraction <= 1.0) {
            return Err(DealError::InvalidConfig(format!(
                "default_vat_fraction must be in (0, 1], got {}",
                self.default_vat_fraction
            )));
        }

        Ok(())
    }
}
