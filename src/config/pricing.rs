//! Pricing configuration loading from pricing.toml
//!
//! The discount table consumed by [`crate::ledger::pricing::DiscountTable`]
//! is kept in a TOML file next to the database. A missing file is not an
//! error: the built-in defaults apply.

use crate::entities::PricingGroup;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Configuration structure representing the entire pricing.toml file
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PricingConfig {
    /// Discount applied per group when no plan matches
    #[serde(default)]
    pub defaults: GroupDefaults,
    /// Named discount plans offered at checkout
    #[serde(default)]
    pub plans: Vec<PlanConfig>,
}

/// Default discount per pricing group.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GroupDefaults {
    /// Internal consumption is free unless configured otherwise
    #[serde(rename = "self", default)]
    pub self_use: f64,
    /// Member discount
    #[serde(default = "default_vip")]
    pub vip: f64,
    /// Promotion discount
    #[serde(default = "default_full_price")]
    pub temp: f64,
}

impl Default for GroupDefaults {
    fn default() -> Self {
        Self {
            self_use: 0.0,
            vip: default_vip(),
            temp: default_full_price(),
        }
    }
}

const fn default_vip() -> f64 {
    0.8
}

const fn default_full_price() -> f64 {
    1.0
}

/// Configuration for a single discount plan
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PlanConfig {
    /// Stable identifier referenced by orders
    pub id: String,
    /// Group the plan belongs to
    pub group: PricingGroup,
    /// Display name
    pub name: String,
    /// Multiplier on the base price (0.8 = 20% off)
    pub discount: f64,
    /// Optional note
    #[serde(default)]
    pub remark: Option<String>,
}

impl PricingConfig {
    /// Checks that every discount is a finite, non-negative number and that
    /// plan ids are unique.
    pub fn validate(&self) -> Result<()> {
        let defaults = [
            ("self", self.defaults.self_use),
            ("vip", self.defaults.vip),
            ("temp", self.defaults.temp),
        ];
        for (group, discount) in defaults {
            if !discount.is_finite() || discount < 0.0 {
                return Err(Error::Config {
                    message: format!("default discount for {group} must be non-negative, got {discount}"),
                });
            }
        }

        let mut seen = std::collections::HashSet::new();
        for plan in &self.plans {
            if !plan.discount.is_finite() || plan.discount < 0.0 {
                return Err(Error::Config {
                    message: format!("plan {} has invalid discount {}", plan.id, plan.discount),
                });
            }
            if !seen.insert(plan.id.as_str()) {
                return Err(Error::Config {
                    message: format!("duplicate pricing plan id: {}", plan.id),
                });
            }
        }
        Ok(())
    }
}

/// Parses and validates pricing configuration from a TOML string.
pub fn parse_pricing_config(contents: &str) -> Result<PricingConfig> {
    let config: PricingConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse pricing config: {e}"),
    })?;
    config.validate()?;
    Ok(config)
}

/// Loads pricing configuration from a TOML file.
///
/// # Errors
/// Returns an error if the file exists but cannot be read, has invalid TOML
/// syntax, or contains a negative discount.
pub fn load_pricing_config<P: AsRef<Path>>(path: P) -> Result<PricingConfig> {
    let path = path.as_ref();
    if !path.exists() {
        info!("No pricing config at {:?}, using built-in defaults", path);
        return Ok(PricingConfig::default());
    }

    debug!("Loading pricing config from {:?}", path);
    let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("Failed to read pricing config {path:?}: {e}"),
    })?;
    parse_pricing_config(&contents)
}

/// Loads pricing configuration from `PRICING_CONFIG` or ./pricing.toml
pub fn load_default_pricing_config() -> Result<PricingConfig> {
    let path = std::env::var("PRICING_CONFIG").unwrap_or_else(|_| "pricing.toml".to_string());
    load_pricing_config(path)
}
