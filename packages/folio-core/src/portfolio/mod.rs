//! Portfolio data and analytics module.
//!
//! Provides the portfolio aggregate, average-cost accounting, grouped
//! roll-ups, trading activity and attribution views.

mod accounting;
mod attribution;
mod data;
mod exposures;
mod grouping;
mod performance;
mod risk;
mod turnover;

pub use accounting::{compute_realized_pnl, CostBasisLedger, RealizedPnl, TRADE_EPSILON};
pub use attribution::{
    InstrumentPerformance, PerformanceData, DEFAULT_ATTRIBUTION_SPAN, DEFAULT_BETA_SPAN,
    RESIDUAL_COLUMN,
};
pub use data::{PortfolioData, PortfolioDataBuilder};
pub use exposures::PNL_TOTAL_COLUMN;
pub use grouping::{Aggregator, GroupTable, Grouping};
pub use performance::{
    annualize_return, holding_period_return, returns_to_nav, time_weighted_return, total_returns,
    PerformanceSummary,
};
pub use risk::{max_drawdown, nan_std, sharpe_ratio, sortino_ratio, volatility};
pub use turnover::{CostParams, TableView, TurnoverParams, DEFAULT_ROLL_PERIOD, MAX_UNGROUPED_COLUMNS};
