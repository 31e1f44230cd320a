//! Trading activity: turnover, costs and market participation.

use super::data::PortfolioData;
use super::grouping::Aggregator;
use crate::calendar::Frequency;
use crate::frame::Frame;
use crate::types::TimePeriod;
use crate::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Instrument tables wider than this are reported by group.
pub const MAX_UNGROUPED_COLUMNS: usize = 10;

/// Trailing window of the default turnover and cost views (about one trading year).
pub const DEFAULT_ROLL_PERIOD: usize = 260;

/// Shape of a turnover or cost table.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TableView {
    /// One column per instrument (grouped anyway past [`MAX_UNGROUPED_COLUMNS`])
    #[default]
    ByInstrument,
    /// One column per group
    Grouped,
    /// A single portfolio column
    Aggregate,
}

/// Options of [`PortfolioData::get_turnover`].
#[derive(Debug, Clone, PartialEq)]
pub struct TurnoverParams {
    pub view: TableView,
    pub time_period: Option<TimePeriod>,
    /// Trailing sum window; takes precedence over `freq`
    pub roll_period: Option<usize>,
    /// Lead with a portfolio total column (ignored by the aggregate view)
    pub add_total: bool,
    /// Sum turnover per period instead of rolling
    pub freq: Option<Frequency>,
}

impl Default for TurnoverParams {
    fn default() -> Self {
        Self {
            view: TableView::ByInstrument,
            time_period: None,
            roll_period: Some(DEFAULT_ROLL_PERIOD),
            add_total: true,
            freq: None,
        }
    }
}

/// Options of [`PortfolioData::get_costs`].
#[derive(Debug, Clone, PartialEq)]
pub struct CostParams {
    pub view: TableView,
    pub time_period: Option<TimePeriod>,
    pub add_total: bool,
    /// Express costs as a fraction of nav
    pub normalize: bool,
    pub roll_period: Option<usize>,
}

impl Default for CostParams {
    fn default() -> Self {
        Self {
            view: TableView::ByInstrument,
            time_period: None,
            add_total: true,
            normalize: true,
            roll_period: Some(DEFAULT_ROLL_PERIOD),
        }
    }
}

impl PortfolioData {
    /// Traded notional per instrument as a fraction of gross exposure:
    /// `|Δunits| * price / Σ|units * price|`. The first row is NaN.
    pub fn turnover_by_instrument(&self) -> Result<Frame> {
        let traded = self.units().diff().map(f64::abs).mul(self.prices())?;
        let gross: Vec<f64> = self
            .units()
            .mul(self.prices())?
            .map(f64::abs)
            .row_nansum();
        traded.div_rows(&gross)
    }

    /// Portfolio turnover, per instrument, per group or in aggregate, rolled
    /// over a trailing window or summed per period.
    pub fn get_turnover(&self, params: &TurnoverParams) -> Result<Frame> {
        debug!(portfolio = %self.name(), view = ?params.view, "computing turnover");
        let turnover = self.turnover_by_instrument()?;
        let table = self.shape_table(turnover, params.view, params.add_total)?;
        let table = match (params.roll_period, params.freq) {
            (Some(window), _) => table.rolling_sum(window),
            (None, Some(freq)) => table.resample_sum(freq),
            (None, None) => table,
        };
        Ok(match &params.time_period {
            Some(period) => table.locate(period),
            None => table,
        })
    }

    /// Realized trading costs, optionally as a fraction of nav, shaped and
    /// rolled like turnover.
    pub fn get_costs(&self, params: &CostParams) -> Result<Frame> {
        let costs = if params.normalize {
            self.realized_costs().div_rows(self.nav().values())?
        } else {
            self.realized_costs().clone()
        };
        let table = self.shape_table(costs, params.view, params.add_total)?;
        let table = match params.roll_period {
            Some(window) => table.rolling_sum(window),
            None => table,
        };
        Ok(match &params.time_period {
            Some(period) => table.locate(period),
            None => table,
        })
    }

    fn shape_table(&self, frame: Frame, view: TableView, add_total: bool) -> Result<Frame> {
        let view = match view {
            TableView::ByInstrument if frame.n_cols() > MAX_UNGROUPED_COLUMNS => TableView::Grouped,
            view => view,
        };
        match view {
            TableView::Aggregate => {
                let mut total = Frame::filled(frame.index().to_vec(), Vec::new(), f64::NAN);
                total.insert_column(0, self.name(), frame.row_nansum())?;
                Ok(total)
            }
            TableView::Grouped => {
                let total = add_total.then(|| self.total_label(self.group_order()));
                Ok(self
                    .grouping()
                    .reduce(&frame, Aggregator::Sum, total.as_deref()))
            }
            TableView::ByInstrument => {
                let mut frame = frame;
                if add_total {
                    let label = self.total_label(frame.columns());
                    let total = frame.row_nansum();
                    frame.insert_column(0, label, total)?;
                }
                Ok(frame)
            }
        }
    }

    /// Share of each instrument's market cap the portfolio would hold when
    /// run at `trade_level` notional.
    ///
    /// `mcap` is forward-filled onto the nav index; instruments it lacks are NaN.
    pub fn compute_mcap_participation(&self, mcap: &Frame, trade_level: f64) -> Result<Frame> {
        let exposure = self
            .units()
            .mul(self.prices())?
            .div_rows(self.nav().values())?;
        let mcap = mcap
            .reindex_ffill(self.index())
            .project_columns(self.prices().columns(), f64::NAN);
        Ok(exposure.div(&mcap)?.scale(trade_level))
    }

    /// Share of traded volume the portfolio's turnover would take when run
    /// at `trade_level` notional, with turnover summed over `roll_period`.
    pub fn compute_volume_participation(
        &self,
        volumes: &Frame,
        trade_level: f64,
        roll_period: Option<usize>,
    ) -> Result<Frame> {
        let turnover = self.turnover_by_instrument()?;
        let turnover = match roll_period {
            Some(window) => turnover.rolling_sum(window),
            None => turnover,
        };
        let volumes = volumes
            .reindex_ffill(self.index())
            .project_columns(self.prices().columns(), f64::NAN);
        Ok(turnover.div(&volumes)?.scale(trade_level))
    }
}
