//! Analytics settings.
//!
//! Stored as JSON; every field has a default so partial files are accepted.

use crate::calendar::Frequency;
use crate::portfolio::{
    CostParams, TableView, TurnoverParams, DEFAULT_ATTRIBUTION_SPAN, DEFAULT_BETA_SPAN,
    DEFAULT_ROLL_PERIOD,
};
use crate::Result;
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Tunable constants of the analytics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Trailing window of the turnover table
    pub turnover_roll_period: usize,
    /// Trailing window of the cost table
    pub costs_roll_period: usize,
    /// Notional the portfolio is assumed to run at for participation
    pub trade_level: f64,
    /// EWM span of portfolio benchmark betas
    pub beta_span: usize,
    /// EWM span of benchmark attribution
    pub attribution_span: usize,
    pub attribution_freq: Frequency,
    /// Sampling of weight tables
    pub weights_freq: Frequency,
    /// Period of instrument return tables
    pub periodic_freq: Frequency,
    pub periods_per_year: usize,
    /// Annual risk-free rate for Sharpe and Sortino ratios
    pub risk_free_rate: f64,
    /// Where portfolios are stored; see [`crate::PortfolioStore::default_root`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            turnover_roll_period: DEFAULT_ROLL_PERIOD,
            costs_roll_period: DEFAULT_ROLL_PERIOD,
            trade_level: 100_000_000.0,
            beta_span: DEFAULT_BETA_SPAN,
            attribution_span: DEFAULT_ATTRIBUTION_SPAN,
            attribution_freq: Frequency::Business,
            weights_freq: Frequency::Weekly(Weekday::Wed),
            periodic_freq: Frequency::Monthly,
            periods_per_year: 252,
            risk_free_rate: 0.0,
            data_dir: None,
        }
    }
}

impl AnalyticsConfig {
    /// Get the default config file path.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = env::var("FOLIO_CONFIG") {
            return PathBuf::from(path);
        }

        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".folio/config.json"))
            .unwrap_or_else(|| PathBuf::from("folio.json"))
    }

    /// Load config from the default path.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::default_path())
    }

    /// Load config from a specific path; a missing file gives the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save config to a specific path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Turnover options for `view` using the configured window.
    pub fn turnover_params(&self, view: TableView) -> TurnoverParams {
        TurnoverParams {
            view,
            roll_period: Some(self.turnover_roll_period),
            ..TurnoverParams::default()
        }
    }

    /// Cost options for `view` using the configured window.
    pub fn cost_params(&self, view: TableView) -> CostParams {
        CostParams {
            view,
            roll_period: Some(self.costs_roll_period),
            ..CostParams::default()
        }
    }
}
