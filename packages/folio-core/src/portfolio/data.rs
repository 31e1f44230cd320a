//! The portfolio aggregate and its construction.

use super::grouping::Grouping;
use crate::calendar::Frequency;
use crate::frame::{Frame, Series};
use crate::types::TimePeriod;
use crate::{Error, Result};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Simulated portfolio: nav plus the instrument-level tables it was built from.
///
/// Every instrument table shares the nav's index and the price universe's
/// columns. Apart from benchmark prices and grouping, the data is fixed once
/// built; every derived view is recomputed on request.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioData {
    nav: Series,
    prices: Frame,
    weights: Frame,
    units: Frame,
    instrument_pnl: Frame,
    realized_costs: Frame,
    input_weights: Option<Frame>,
    grouping: Grouping,
    benchmark_prices: Option<Frame>,
    tickers_to_names_map: Option<HashMap<String, String>>,
}

/// Builder for [`PortfolioData`]; every table except the nav is optional.
#[derive(Debug, Clone)]
pub struct PortfolioDataBuilder {
    nav: Series,
    prices: Option<Frame>,
    weights: Option<Frame>,
    units: Option<Frame>,
    instrument_pnl: Option<Frame>,
    realized_costs: Option<Frame>,
    input_weights: Option<Frame>,
    group_data: Option<BTreeMap<String, String>>,
    group_order: Option<Vec<String>>,
    benchmark_prices: Option<Frame>,
    tickers_to_names_map: Option<HashMap<String, String>>,
}

impl PortfolioDataBuilder {
    pub fn prices(mut self, prices: Frame) -> Self {
        self.prices = Some(prices);
        self
    }

    pub fn weights(mut self, weights: Frame) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn units(mut self, units: Frame) -> Self {
        self.units = Some(units);
        self
    }

    /// Per-period P&L contribution by instrument, if computed upstream.
    pub fn instrument_pnl(mut self, instrument_pnl: Frame) -> Self {
        self.instrument_pnl = Some(instrument_pnl);
        self
    }

    pub fn realized_costs(mut self, realized_costs: Frame) -> Self {
        self.realized_costs = Some(realized_costs);
        self
    }

    /// Target weights fed into the simulation (e.g. on rebalancing dates).
    pub fn input_weights(mut self, input_weights: Frame) -> Self {
        self.input_weights = Some(input_weights);
        self
    }

    pub fn group_data(mut self, group_data: BTreeMap<String, String>) -> Self {
        self.group_data = Some(group_data);
        self
    }

    pub fn group_order(mut self, group_order: Vec<String>) -> Self {
        self.group_order = Some(group_order);
        self
    }

    pub fn benchmark_prices(mut self, benchmark_prices: Frame) -> Self {
        self.benchmark_prices = Some(benchmark_prices);
        self
    }

    pub fn tickers_to_names_map(mut self, names: HashMap<String, String>) -> Self {
        self.tickers_to_names_map = Some(names);
        self
    }

    /// Validate the inputs and fill every missing table with its default.
    pub fn build(self) -> Result<PortfolioData> {
        let nav = self.nav;
        if nav.is_empty() {
            return Err(Error::InsufficientData(format!(
                "nav {} has no observations",
                nav.name()
            )));
        }
        if nav.values().iter().any(|v| v.is_nan()) {
            return Err(Error::MissingData(format!(
                "nav {} has missing values",
                nav.name()
            )));
        }
        let index = nav.index().to_vec();

        let prices = match self.prices {
            Some(prices) => align_index(prices, &index, "prices"),
            None => nav.to_frame(),
        };
        let universe = prices.columns().to_vec();

        // delta-one portfolio of the nav unless told otherwise
        let holdings = |frame: Option<Frame>, label: &str| -> Result<Frame> {
            match frame {
                Some(f) => align_index(f, &index, label).conform_columns(&universe, 0.0),
                None => Ok(Frame::filled(index.clone(), universe.clone(), 1.0)),
            }
        };
        let weights = holdings(self.weights, "weights")?;
        let units = holdings(self.units, "units")?;

        let instrument_pnl = match self.instrument_pnl {
            Some(pnl) => {
                require_index(&pnl, &index, "instrument_pnl")?;
                pnl.conform_columns(&universe, 0.0)?
            }
            None => prices.pct_change().mul(&weights.shift(1))?.fill_nan(0.0),
        };

        let realized_costs = match self.realized_costs {
            Some(costs) => {
                require_index(&costs, &index, "realized_costs")?;
                costs.conform_columns(&universe, 0.0)?
            }
            None => Frame::filled(index.clone(), universe.clone(), 0.0),
        };

        let input_weights = self
            .input_weights
            .map(|w| w.conform_columns(&universe, 0.0))
            .transpose()?;

        let grouping = match (self.group_data, self.group_order) {
            (None, None) => Grouping::identity(&universe),
            (data, order) => Grouping::new(data.unwrap_or_default(), order, &universe)?,
        };

        let benchmark_prices = self.benchmark_prices.map(|b| b.reindex_ffill(&index));

        debug!(
            portfolio = %nav.name(),
            rows = index.len(),
            instruments = universe.len(),
            "built portfolio data"
        );

        Ok(PortfolioData {
            nav,
            prices,
            weights,
            units,
            instrument_pnl,
            realized_costs,
            input_weights,
            grouping,
            benchmark_prices,
            tickers_to_names_map: self.tickers_to_names_map,
        })
    }
}

fn align_index(frame: Frame, index: &[NaiveDate], label: &str) -> Frame {
    if frame.index() == index {
        frame
    } else {
        debug!(table = label, "forward-filling onto the nav index");
        frame.reindex_ffill(index)
    }
}

fn require_index(frame: &Frame, index: &[NaiveDate], label: &str) -> Result<()> {
    if frame.index() != index {
        return Err(Error::Misaligned(format!(
            "{label} must share the nav index ({} rows vs {})",
            frame.n_rows(),
            index.len()
        )));
    }
    Ok(())
}

impl PortfolioData {
    /// Start building a portfolio around its nav; the nav's name identifies the portfolio.
    pub fn builder(nav: Series) -> PortfolioDataBuilder {
        PortfolioDataBuilder {
            nav,
            prices: None,
            weights: None,
            units: None,
            instrument_pnl: None,
            realized_costs: None,
            input_weights: None,
            group_data: None,
            group_order: None,
            benchmark_prices: None,
            tickers_to_names_map: None,
        }
    }

    /// Portfolio identifier (the nav's name).
    pub fn name(&self) -> &str {
        self.nav.name()
    }

    pub fn nav(&self) -> &Series {
        &self.nav
    }

    pub fn index(&self) -> &[NaiveDate] {
        self.nav.index()
    }

    pub fn prices(&self) -> &Frame {
        &self.prices
    }

    pub fn weights(&self) -> &Frame {
        &self.weights
    }

    pub fn units(&self) -> &Frame {
        &self.units
    }

    pub fn instrument_pnl(&self) -> &Frame {
        &self.instrument_pnl
    }

    pub fn realized_costs(&self) -> &Frame {
        &self.realized_costs
    }

    pub fn input_weights(&self) -> Option<&Frame> {
        self.input_weights.as_ref()
    }

    pub fn grouping(&self) -> &Grouping {
        &self.grouping
    }

    pub fn group_data(&self) -> &BTreeMap<String, String> {
        self.grouping.group_data()
    }

    pub fn group_order(&self) -> &[String] {
        self.grouping.group_order()
    }

    pub fn benchmark_prices(&self) -> Option<&Frame> {
        self.benchmark_prices.as_ref()
    }

    pub fn tickers_to_names_map(&self) -> Option<&HashMap<String, String>> {
        self.tickers_to_names_map.as_ref()
    }

    /// Store benchmark prices, forward-filled onto the nav index.
    pub fn set_benchmark_prices(&mut self, benchmark_prices: &Frame) {
        self.benchmark_prices = Some(benchmark_prices.reindex_ffill(self.nav.index()));
    }

    /// Replace the grouping; without an order the groups are listed as first met.
    pub fn set_group_data(
        &mut self,
        group_data: BTreeMap<String, String>,
        group_order: Option<Vec<String>>,
    ) -> Result<()> {
        self.grouping = Grouping::new(group_data, group_order, self.prices.columns())?;
        Ok(())
    }

    pub fn set_tickers_to_names_map(&mut self, names: HashMap<String, String>) {
        self.tickers_to_names_map = Some(names);
    }

    /// Label for a total column next to `existing` columns: the portfolio name,
    /// suffixed when an instrument or group already carries it.
    pub(crate) fn total_label(&self, existing: &[String]) -> String {
        let name = self.name();
        if existing.iter().any(|c| c == name) {
            format!("{name} Total")
        } else {
            name.to_string()
        }
    }

    pub(crate) fn rename_for_display(&self, name: &str) -> String {
        self.tickers_to_names_map
            .as_ref()
            .and_then(|names| names.get(name))
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    pub(crate) fn display_frame(&self, frame: Frame) -> Frame {
        match &self.tickers_to_names_map {
            Some(names) => frame.rename_columns(names),
            None => frame,
        }
    }

    /// Portfolio nav, optionally windowed and sampled at `freq`.
    pub fn get_portfolio_nav(
        &self,
        time_period: Option<&TimePeriod>,
        freq: Option<Frequency>,
    ) -> Series {
        let nav = match time_period {
            Some(period) => self.nav.locate(period),
            None => self.nav.clone(),
        };
        match freq {
            Some(freq) => nav.resample_last(freq),
            None => nav,
        }
    }

    /// Portfolio nav with benchmark prices alongside (when set). A benchmark
    /// sharing the portfolio's name pushes the nav column to `"{name} Total"`.
    pub fn get_portfolio_nav_with_benchmark_prices(
        &self,
        time_period: Option<&TimePeriod>,
        freq: Option<Frequency>,
    ) -> Result<Frame> {
        let nav = self.get_portfolio_nav(time_period, freq);
        match &self.benchmark_prices {
            Some(benchmarks) => {
                let benchmarks = benchmarks.reindex_ffill(nav.index());
                let navs = nav.rename(self.total_label(benchmarks.columns())).to_frame();
                Frame::concat(&[&navs, &benchmarks])
            }
            None => Ok(nav.to_frame()),
        }
    }

    /// Prices of `benchmark` for a regime overlay, optionally aligned onto `index`.
    pub fn regime_benchmark_prices(
        &self,
        benchmark: &str,
        index: Option<&[NaiveDate]>,
    ) -> Result<Series> {
        let benchmarks = self.benchmark_prices.as_ref().ok_or_else(|| {
            Error::MissingData(format!(
                "benchmark prices are not set for {}; cannot classify regimes by {benchmark}",
                self.name()
            ))
        })?;
        let prices = benchmarks.column(benchmark)?;
        Ok(match index {
            Some(index) => prices.reindex_ffill(index),
            None => prices,
        })
    }
}
