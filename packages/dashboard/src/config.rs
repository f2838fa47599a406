//! Dashboard tuning: cache timings, retry policy, page size, and top-N
//! limits.
//!
//! Every field has a default, so an absent or partial TOML file is fine:
//!
//! ```toml
//! dedup_interval_ms = 2000
//! error_retry_count = 3
//! page_size = 25
//! ```

use std::path::Path;
use std::time::Duration;

use ev_dashboard_cache::CachePolicy;
use serde::{Deserialize, Serialize};

use crate::DashboardError;

/// Environment variable naming an optional TOML config file.
pub const CONFIG_ENV: &str = "EV_DASHBOARD_CONFIG";

/// Tunable dashboard settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// How long a result is reused before refetching.
    pub dedup_interval_ms: u64,
    /// Retries after a failed fetch.
    pub error_retry_count: u32,
    /// Delay between retries.
    pub error_retry_interval_ms: u64,
    /// Rows per table page.
    pub page_size: u64,
    /// Rows in the county distribution.
    pub county_limit: usize,
    /// Rows in the make distribution, before `"Others"`.
    pub make_limit: usize,
    /// Models fetched for the top-models ranking.
    pub top_models_limit: usize,
    /// Models shown from that ranking.
    pub top_models_display: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            dedup_interval_ms: 2000,
            error_retry_count: 3,
            error_retry_interval_ms: 5000,
            page_size: 50,
            county_limit: 10,
            make_limit: 10,
            top_models_limit: 20,
            top_models_display: 15,
        }
    }
}

impl DashboardConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::ConfigParse`] if the document is malformed.
    pub fn from_toml_str(s: &str) -> Result<Self, DashboardError> {
        Ok(toml::de::from_str(s)?)
    }

    /// Reads and parses the TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, DashboardError> {
        let contents = std::fs::read_to_string(path).map_err(|source| DashboardError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&contents)?;
        log::info!("Loaded dashboard config from {}", path.display());
        Ok(config)
    }

    /// Loads the file named by [`CONFIG_ENV`], or defaults when unset.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError`] if the variable is set but the file cannot
    /// be read or parsed.
    pub fn from_env() -> Result<Self, DashboardError> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::load(Path::new(path.trim())),
            _ => {
                log::debug!("{CONFIG_ENV} not set, using default dashboard config");
                Ok(Self::default())
            }
        }
    }

    /// Cache policy for every query slot.
    #[must_use]
    pub const fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            dedup_interval: Duration::from_millis(self.dedup_interval_ms),
            retry_count: self.error_retry_count,
            retry_interval: Duration::from_millis(self.error_retry_interval_ms),
        }
    }
}
