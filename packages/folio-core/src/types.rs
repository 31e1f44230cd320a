//! Core data types shared across the analytics.

use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Inclusive date window used to slice any table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TimePeriod {
    /// First date kept (unbounded if `None`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDate>,
    /// Last date kept (unbounded if `None`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDate>,
}

impl TimePeriod {
    /// Create a period between two dates, both inclusive.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Period starting at `start` with no upper bound.
    pub fn since(start: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    /// Whether `date` falls inside the period.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmt_date = |d: Option<NaiveDate>| d.map_or_else(|| "..".to_string(), |d| d.to_string());
        write!(f, "{}:{}", fmt_date(self.start), fmt_date(self.end))
    }
}

/// Which instrument-level attribution to report.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttributionMetric {
    /// P&L attribution; sums to portfolio performance
    Pnl,
    /// P&L risk attribution; sums to 100%
    PnlRisk,
    /// Instrument P&L navs
    InstPnl,
}

impl AttributionMetric {
    /// Display title for the metric.
    pub fn title(self) -> &'static str {
        match self {
            AttributionMetric::Pnl => "P&L Attribution, sum=portfolio performance",
            AttributionMetric::PnlRisk => "P&L Risk Attribution, sum=100%",
            AttributionMetric::InstPnl => "Instrument P&L",
        }
    }
}

impl FromStr for AttributionMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pnl" => Ok(AttributionMetric::Pnl),
            "pnl_risk" => Ok(AttributionMetric::PnlRisk),
            "inst_pnl" => Ok(AttributionMetric::InstPnl),
            other => Err(Error::NotImplemented(format!("attribution metric {other}"))),
        }
    }
}

/// API response wrapper for success cases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response.
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_time_period_contains() {
        let period = TimePeriod::new(date(5), date(10));
        assert!(!period.contains(date(4)));
        assert!(period.contains(date(5)));
        assert!(period.contains(date(10)));
        assert!(!period.contains(date(11)));

        let open = TimePeriod::since(date(5));
        assert!(open.contains(date(31)));
        assert!(TimePeriod::default().contains(date(1)));
    }

    #[test]
    fn test_attribution_metric_parse() {
        assert_eq!(
            "pnl".parse::<AttributionMetric>().unwrap(),
            AttributionMetric::Pnl
        );
        assert_eq!(
            "PNL_RISK".parse::<AttributionMetric>().unwrap(),
            AttributionMetric::PnlRisk
        );
        let err = "sharpe".parse::<AttributionMetric>().unwrap_err();
        assert!(matches!(err, Error::NotImplemented(ref m) if m.contains("sharpe")));
    }

    #[test]
    fn test_api_response() {
        let response: ApiResponse<String> = ApiResponse::ok("test".to_string());
        assert!(response.ok);
        assert_eq!(response.data, Some("test".to_string()));

        let err_response: ApiResponse<String> = ApiResponse::err("error");
        assert!(!err_response.ok);
        assert_eq!(err_response.error, Some("error".to_string()));
    }
}
