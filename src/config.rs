//! Run configuration and the source-file → table mapping.
//!
//! Configuration is an explicit value built once per pipeline run and handed
//! to each component. It can be loaded from a TOML file; every field has a
//! default matching the stock Olist layout.

use crate::error::{EltError, EltResult};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Base URL of the public-holiday feed. `/{year}/BR` is appended per call.
pub const PUBLIC_HOLIDAYS_URL: &str = "https://date.nager.at/api/v3/publicholidays";

/// Configuration for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding the source CSV files.
    pub dataset_dir: PathBuf,
    /// Directory holding the catalog's `.sql` files.
    pub queries_dir: PathBuf,
    /// Directory chart specifications are written to.
    pub charts_dir: PathBuf,
    /// SQLite connection URL, e.g. `sqlite://olist.db`.
    pub database_url: String,
    /// Base URL of the public-holiday feed.
    pub holidays_url: String,
    /// Year the holiday feed and the per-day order report cover.
    pub holiday_year: i32,
    /// Retries applied uniformly to each stage after the first attempt.
    pub retries: u32,
    /// Delay between retry attempts, in seconds.
    pub retry_delay_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dataset_dir: PathBuf::from("dataset"),
            queries_dir: PathBuf::from("queries"),
            charts_dir: PathBuf::from("charts"),
            database_url: "sqlite://olist.db?mode=rwc".to_string(),
            holidays_url: PUBLIC_HOLIDAYS_URL.to_string(),
            holiday_year: 2017,
            retries: 1,
            retry_delay_secs: 300,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> EltResult<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| EltError::Config(e.to_string()))
    }

    /// Load from the platform config dir (`olist-elt/config.toml`) when the
    /// file exists, falling back to defaults otherwise.
    pub fn load_default() -> EltResult<Self> {
        let path = dirs::config_dir().map(|d| d.join("olist-elt").join("config.toml"));
        match path {
            Some(p) if p.exists() => Self::from_file(&p),
            _ => Ok(Self::default()),
        }
    }
}

/// The source-file → destination-table mapping.
///
/// Order is significant: extract and load walk the entries in this order, so
/// runs are deterministic.
pub fn csv_table_mapping() -> Vec<(&'static str, &'static str)> {
    vec![
        ("olist_customers_dataset.csv", "olist_customers"),
        ("olist_geolocation_dataset.csv", "olist_geolocation"),
        ("olist_order_items_dataset.csv", "olist_order_items"),
        ("olist_order_payments_dataset.csv", "olist_order_payments"),
        ("olist_order_reviews_dataset.csv", "olist_order_reviews"),
        ("olist_orders_dataset.csv", "olist_orders"),
        ("olist_products_dataset.csv", "olist_products"),
        ("olist_sellers_dataset.csv", "olist_sellers"),
        (
            "product_category_name_translation.csv",
            "product_category_name_translation",
        ),
    ]
}

/// Table name the holiday feed is persisted under.
pub const PUBLIC_HOLIDAYS_TABLE: &str = "public_holidays";

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mapping_has_nine_entries() {
        let mapping = csv_table_mapping();
        assert_eq!(mapping.len(), 9);
        assert_eq!(mapping[0].1, "olist_customers");
        assert_eq!(mapping[8].1, "product_category_name_translation");
    }

    #[test]
    fn test_config_from_toml() {
        let cfg: PipelineConfig = toml::from_str(
            r#"
            dataset_dir = "/data/olist"
            holiday_year = 2018
            retries = 2
            "#,
        )
        .expect("Failed to parse config");
        assert_eq!(cfg.dataset_dir, PathBuf::from("/data/olist"));
        assert_eq!(cfg.holiday_year, 2018);
        assert_eq!(cfg.retries, 2);
        // Unset fields keep their defaults.
        assert_eq!(cfg.holidays_url, PUBLIC_HOLIDAYS_URL);
    }

    #[test]
    fn test_default_year() {
        assert_eq!(PipelineConfig::default().holiday_year, 2017);
    }
}
