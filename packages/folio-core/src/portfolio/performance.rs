//! Nav construction and headline performance statistics.

use super::data::PortfolioData;
use super::risk::{max_drawdown, sharpe_ratio, sortino_ratio, volatility};
use crate::frame::{nan_to_zero, Frame, Series};
use crate::types::TimePeriod;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Headline statistics of a nav series, as shown on a factsheet.
///
/// Returns and ratios are decimals (0.1 for 10%).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerformanceSummary {
    /// Portfolio identifier
    pub name: String,
    /// Number of return periods
    pub num_periods: usize,
    /// Total return over the whole nav
    pub total_return: f64,
    /// Compounded annual return
    pub annualized_return: f64,
    /// Annualized volatility
    pub volatility: f64,
    /// Annualized Sharpe ratio
    pub sharpe_ratio: f64,
    /// Annualized Sortino ratio
    pub sortino_ratio: f64,
    /// Maximum peak-to-trough decline
    pub max_drawdown: f64,
}

impl PerformanceSummary {
    /// Summarize a nav series.
    pub fn from_nav(nav: &Series, periods_per_year: usize, risk_free_rate: f64) -> Result<Self> {
        let returns: Vec<f64> = nav
            .pct_change()
            .values()
            .iter()
            .copied()
            .filter(|r| r.is_finite())
            .collect();
        if returns.is_empty() {
            return Err(Error::InsufficientData(format!(
                "nav {} needs at least two observations",
                nav.name()
            )));
        }

        let total_return = time_weighted_return(nav.values());
        Ok(Self {
            name: nav.name().to_string(),
            num_periods: returns.len(),
            total_return,
            annualized_return: annualize_return(total_return, returns.len(), periods_per_year),
            volatility: volatility(&returns, periods_per_year),
            sharpe_ratio: sharpe_ratio(&returns, risk_free_rate, periods_per_year),
            sortino_ratio: sortino_ratio(&returns, risk_free_rate, periods_per_year),
            max_drawdown: max_drawdown(&returns),
        })
    }
}

impl PortfolioData {
    /// Headline statistics of the portfolio nav over the window.
    pub fn get_performance_summary(
        &self,
        time_period: Option<&TimePeriod>,
        periods_per_year: usize,
        risk_free_rate: f64,
    ) -> Result<PerformanceSummary> {
        let nav = self.get_portfolio_nav(time_period, None);
        PerformanceSummary::from_nav(&nav, periods_per_year, risk_free_rate)
    }
}

/// Compound per-period returns into navs starting at 1.0.
///
/// The first row is the starting level; NaN returns count as flat periods.
/// With `constant_trade_level` returns are added instead of compounded.
pub fn returns_to_nav(returns: &Frame, constant_trade_level: bool) -> Frame {
    let mut level = vec![1.0; returns.n_cols()];
    let values = (0..returns.n_rows())
        .map(|t| {
            if t > 0 {
                for (nav, r) in level.iter_mut().zip(returns.row(t)) {
                    let r = nan_to_zero(*r);
                    if constant_trade_level {
                        *nav += r;
                    } else {
                        *nav *= 1.0 + r;
                    }
                }
            }
            level.clone()
        })
        .collect();
    Frame::from_parts(returns.index().to_vec(), returns.columns().to_vec(), values)
}

/// Total return of each column from its first to its last observed level.
pub fn total_returns(navs: &Frame) -> Vec<f64> {
    (0..navs.n_cols())
        .map(|j| {
            let observed: Vec<f64> = navs
                .column_values(j)
                .into_iter()
                .filter(|v| !v.is_nan())
                .collect();
            match (observed.first(), observed.last()) {
                (Some(first), Some(last)) => holding_period_return(*first, *last),
                _ => f64::NAN,
            }
        })
        .collect()
}

/// Time-weighted return of a series of portfolio values.
pub fn time_weighted_return(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }

    let mut twr = 1.0;
    for i in 1..values.len() {
        if values[i - 1] > 0.0 {
            twr *= values[i] / values[i - 1];
        }
    }

    twr - 1.0
}

/// Holding period return between two values.
pub fn holding_period_return(initial_value: f64, final_value: f64) -> f64 {
    if initial_value <= 0.0 {
        return f64::NAN;
    }
    (final_value - initial_value) / initial_value
}

/// Annualize a total return given the number of periods and periods per year.
pub fn annualize_return(total_return: f64, periods: usize, periods_per_year: usize) -> f64 {
    if periods == 0 || periods_per_year == 0 {
        return 0.0;
    }

    let years = periods as f64 / periods_per_year as f64;
    (1.0 + total_return).powf(1.0 / years) - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn dates(n: u32) -> Vec<NaiveDate> {
        (1..=n)
            .map(|d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap())
            .collect()
    }

    #[test]
    fn test_time_weighted_return() {
        let values = vec![10000.0, 10500.0, 10200.0, 11000.0];
        assert_relative_eq!(time_weighted_return(&values), 0.10, epsilon = 1e-9);
    }

    #[test]
    fn test_holding_period_return() {
        assert_relative_eq!(holding_period_return(10000.0, 11500.0), 0.15, epsilon = 1e-12);
        assert!(holding_period_return(0.0, 1.0).is_nan());
    }

    #[test]
    fn test_annualize_return() {
        // 10% over half a year
        assert_relative_eq!(annualize_return(0.10, 6, 12), 0.21, epsilon = 1e-9);
    }

    #[test]
    fn test_returns_to_nav() {
        let returns = Frame::new(
            dates(3),
            vec!["a".into()],
            vec![vec![f64::NAN], vec![0.1], vec![-0.5]],
        )
        .unwrap();
        let navs = returns_to_nav(&returns, false);
        assert_eq!(navs.get(0, 0), 1.0);
        assert_relative_eq!(navs.get(1, 0), 1.1, epsilon = 1e-12);
        assert_relative_eq!(navs.get(2, 0), 0.55, epsilon = 1e-12);

        let additive = returns_to_nav(&returns, true);
        assert_relative_eq!(additive.get(2, 0), 0.6, epsilon = 1e-12);

        assert_relative_eq!(total_returns(&navs)[0], -0.45, epsilon = 1e-12);
    }

    #[test]
    fn test_performance_summary() {
        let nav = Series::new("Fund", dates(5), vec![100.0, 110.0, 99.0, 104.0, 115.0]).unwrap();
        let summary = PerformanceSummary::from_nav(&nav, 252, 0.0).unwrap();
        assert_eq!(summary.num_periods, 4);
        assert_relative_eq!(summary.total_return, 0.15, epsilon = 1e-12);
        assert_relative_eq!(summary.max_drawdown, 0.1, epsilon = 1e-12);
        assert!(summary.volatility > 0.0);
    }

    #[test]
    fn test_performance_summary_needs_two_points() {
        let nav = Series::new("Fund", dates(1), vec![100.0]).unwrap();
        assert!(matches!(
            PerformanceSummary::from_nav(&nav, 252, 0.0),
            Err(Error::InsufficientData(_))
        ));
    }
}
