//! Folio Core - Portfolio accounting and analytics library.
//!
//! This crate turns a simulated portfolio (nav, instrument prices, weights and
//! units over time) into the tables a factsheet is built from:
//!
//! - **Accounting**: average-cost realized / mark-to-market P&L per instrument
//! - **Aggregation**: group, net-long and net-short roll-ups of any instrument table
//! - **Trading activity**: turnover, costs, market-cap and volume participation
//! - **Attribution**: instrument P&L, EWM benchmark betas and benchmark attribution
//! - **Persistence**: CSV snapshots of a portfolio keyed by ticker
//!
//! # Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use folio_core::{Frame, PortfolioData, Series};
//!
//! let index: Vec<NaiveDate> = (1..=3)
//!     .map(|d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap())
//!     .collect();
//! let nav = Series::new("Fund", index.clone(), vec![100.0, 101.0, 102.0]).unwrap();
//! let prices = Frame::new(
//!     index.clone(),
//!     vec!["SPY".to_string()],
//!     vec![vec![10.0], vec![11.0], vec![12.0]],
//! )
//! .unwrap();
//! let units = Frame::new(
//!     index,
//!     vec!["SPY".to_string()],
//!     vec![vec![0.0], vec![10.0], vec![5.0]],
//! )
//! .unwrap();
//!
//! let portfolio = PortfolioData::builder(nav)
//!     .prices(prices)
//!     .units(units)
//!     .build()
//!     .unwrap();
//!
//! let ledger = portfolio.compute_realized_pnl(None).unwrap();
//! // sold 5 units at 12 against an average cost of 11
//! assert_eq!(ledger.realized_pnl.get(2, 0), 5.0);
//! ```

pub mod calendar;
pub mod config;
pub mod frame;
pub mod models;
pub mod portfolio;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use calendar::Frequency;
pub use config::AnalyticsConfig;
pub use frame::{Frame, Series};
pub use types::{ApiResponse, AttributionMetric, TimePeriod};

// Re-export main functionality
pub use models::EwmLinearModel;
pub use portfolio::{
    compute_realized_pnl, Aggregator, CostBasisLedger, CostParams, GroupTable, Grouping,
    InstrumentPerformance, PerformanceData, PerformanceSummary, PortfolioData,
    PortfolioDataBuilder, RealizedPnl, TableView, TurnoverParams,
};
pub use store::PortfolioStore;

/// Error types for folio-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Shape error: {0}")]
    Shape(String),

    #[error("Misaligned data: {0}")]
    Misaligned(String),

    #[error("Unknown instrument: {0}")]
    UnknownInstrument(String),

    #[error("Missing data: {0}")]
    MissingData(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),
}

/// Result type for folio-core operations.
pub type Result<T> = std::result::Result<T, Error>;
