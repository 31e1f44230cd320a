//! Performance attribution: by instrument and against benchmarks.

use super::data::PortfolioData;
use super::performance::{returns_to_nav, total_returns};
use super::risk::nan_std;
use crate::calendar::Frequency;
use crate::frame::Frame;
use crate::models::EwmLinearModel;
use crate::types::{AttributionMetric, TimePeriod};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// Span of the EWM regression behind portfolio benchmark betas (about a quarter).
pub const DEFAULT_BETA_SPAN: usize = 65;

/// Span used when attributing returns to benchmarks.
pub const DEFAULT_ATTRIBUTION_SPAN: usize = 63;

/// Label of the unexplained part of a benchmark attribution.
pub const RESIDUAL_COLUMN: &str = "Residual";

/// Result of [`PortfolioData::get_performance_data`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceData {
    /// One value per instrument
    ByInstrument(Vec<(String, f64)>),
    /// Instrument navs over time
    Navs(Frame),
}

/// One row of the instrument performance table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstrumentPerformance {
    pub instrument: String,
    /// Average weight over the window
    pub weight: f64,
    /// Total return of the instrument over the window
    pub asset_return: f64,
    /// `weight * asset_return`
    pub contribution: f64,
}

fn to_returns(prices: &Frame, freq: Option<Frequency>, is_log: bool) -> Frame {
    let prices = match freq {
        Some(freq) => prices.resample_last(freq),
        None => prices.clone(),
    };
    if is_log {
        prices.log_returns()
    } else {
        prices.pct_change()
    }
}

impl PortfolioData {
    /// Running sum of `price return * previous weight` per instrument.
    pub fn compute_cumulative_attribution(&self) -> Result<Frame> {
        let attribution = self
            .prices()
            .pct_change()
            .mul(&self.weights().shift(1))?;
        Ok(attribution.cumsum())
    }

    /// Portfolio beta to each benchmark over time.
    ///
    /// Instrument log returns are regressed on benchmark log returns with an
    /// EWM model of `span`, and the instrument betas are summed under the
    /// portfolio's weights. Dates where the exposure nets to zero carry the
    /// previous value.
    pub fn compute_portfolio_benchmark_betas(
        &self,
        benchmark_prices: &Frame,
        time_period: Option<&TimePeriod>,
        freq: Option<Frequency>,
        span: usize,
    ) -> Result<Frame> {
        let prices = self.prices();
        let benchmark_prices = benchmark_prices.reindex_ffill(prices.index());
        let model = EwmLinearModel::estimate(
            &to_returns(&benchmark_prices, freq, true),
            &to_returns(prices, freq, true),
            span,
            true,
        )?;
        let exposures = self.weights().reindex_ffill(model.index());
        let betas = model
            .factor_exposures(&exposures)?
            .map(|b| if b == 0.0 { f64::NAN } else { b })
            .ffill();
        Ok(match time_period {
            Some(period) => betas.locate(period),
            None => betas,
        })
    }

    /// Cumulative attribution of portfolio returns to benchmarks.
    ///
    /// Each benchmark earns its return times the portfolio's beta to it on
    /// the previous date; whatever the nav return leaves unexplained
    /// accumulates in a `Residual` column.
    pub fn compute_portfolio_benchmark_attribution(
        &self,
        benchmark_prices: &Frame,
        time_period: Option<&TimePeriod>,
        freq: Option<Frequency>,
        span: usize,
    ) -> Result<Frame> {
        debug!(portfolio = %self.name(), span, "attributing returns to benchmarks");
        let betas = self.compute_portfolio_benchmark_betas(benchmark_prices, None, freq, span)?;
        let benchmark_returns = benchmark_prices.reindex_ffill(betas.index()).pct_change();
        let explained = betas.shift(1).mul(&benchmark_returns)?;

        let nav_returns = self.nav().reindex_ffill(betas.index()).to_frame().pct_change();
        let residual: Vec<f64> = nav_returns
            .column_values(0)
            .iter()
            .zip(explained.row_nansum())
            .map(|(total, attributed)| total - attributed)
            .collect();

        let mut attribution = explained;
        let pos = attribution.n_cols();
        attribution.insert_column(pos, RESIDUAL_COLUMN, residual)?;
        let attribution = match time_period {
            Some(period) => attribution.locate(period),
            None => attribution,
        };
        Ok(attribution.cumsum())
    }

    /// Simple price returns per instrument; the first row is NaN.
    pub fn get_instruments_returns(&self, time_period: Option<&TimePeriod>) -> Frame {
        let returns = self.prices().pct_change();
        match time_period {
            Some(period) => returns.locate(period),
            None => returns,
        }
    }

    /// Instrument returns compounded over each period of `freq`.
    pub fn get_instruments_periodic_returns(
        &self,
        time_period: Option<&TimePeriod>,
        freq: Frequency,
    ) -> Frame {
        let navs = returns_to_nav(&self.get_instruments_returns(time_period), false);
        to_returns(&navs, Some(freq), false)
    }

    /// Total return of each instrument's P&L nav over the window.
    pub fn get_instruments_performance_attribution(
        &self,
        time_period: Option<&TimePeriod>,
        constant_trade_level: bool,
    ) -> Result<Vec<(String, f64)>> {
        let navs = self.get_instruments_navs(time_period, constant_trade_level)?;
        Ok(navs
            .columns()
            .iter()
            .cloned()
            .zip(total_returns(&navs))
            .collect())
    }

    /// Share of P&L dispersion contributed by each instrument: the standard
    /// deviation of its non-zero P&L, normalized to sum to one.
    pub fn get_instruments_pnl_risk_attribution(
        &self,
        time_period: Option<&TimePeriod>,
    ) -> Result<Vec<(String, f64)>> {
        let pnl = self
            .get_instruments_pnl(false, time_period, false)?
            .map(|x| if x == 0.0 { f64::NAN } else { x });
        let risk: Vec<f64> = (0..pnl.n_cols())
            .map(|j| nan_std(&pnl.column_values(j)))
            .collect();
        let total: f64 = risk.iter().filter(|r| !r.is_nan()).sum();
        Ok(pnl
            .columns()
            .iter()
            .zip(risk)
            .map(|(instrument, r)| (self.rename_for_display(instrument), r / total))
            .collect())
    }

    /// The attribution view selected by `metric`.
    pub fn get_performance_data(
        &self,
        metric: AttributionMetric,
        time_period: Option<&TimePeriod>,
    ) -> Result<PerformanceData> {
        Ok(match metric {
            AttributionMetric::Pnl => PerformanceData::ByInstrument(
                self.get_instruments_performance_attribution(time_period, false)?,
            ),
            AttributionMetric::PnlRisk => PerformanceData::ByInstrument(
                self.get_instruments_pnl_risk_attribution(time_period)?,
            ),
            AttributionMetric::InstPnl => {
                PerformanceData::Navs(self.get_instruments_navs(time_period, false)?)
            }
        })
    }

    /// Average weight, total return and their product per instrument,
    /// heaviest first. Instruments contributing nothing are left out.
    pub fn get_instruments_performance_table(
        &self,
        time_period: Option<&TimePeriod>,
    ) -> Vec<InstrumentPerformance> {
        let navs = returns_to_nav(&self.get_instruments_returns(time_period), false);
        let asset_returns = total_returns(&navs);
        let weights = match time_period {
            Some(period) => self.weights().locate(period),
            None => self.weights().clone(),
        };

        let mut rows: Vec<InstrumentPerformance> = weights
            .columns()
            .iter()
            .zip(weights.col_nanmean())
            .zip(asset_returns)
            .map(|((instrument, weight), asset_return)| InstrumentPerformance {
                instrument: self.rename_for_display(instrument),
                weight,
                asset_return,
                contribution: weight * asset_return,
            })
            .filter(|row| row.contribution != 0.0 && row.contribution.is_finite())
            .collect();
        rows.sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(Ordering::Equal));
        rows
    }

    /// Periodic instrument returns times the weight held at the end of the
    /// previous period. The first period has no prior weight and is dropped.
    pub fn get_attribution_table_by_instrument(
        &self,
        time_period: Option<&TimePeriod>,
        freq: Frequency,
    ) -> Result<Frame> {
        let returns = self.get_instruments_periodic_returns(time_period, freq);
        let weights = self.weights().reindex_ffill(returns.index()).shift(1);
        let attribution = returns.mul(&weights)?.skip_rows(1);
        Ok(self.display_frame(attribution))
    }
}
