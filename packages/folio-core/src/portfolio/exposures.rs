//! P&L, nav and exposure views of a portfolio.

use super::data::PortfolioData;
use super::grouping::{Aggregator, GroupTable};
use super::performance::returns_to_nav;
use crate::calendar::Frequency;
use crate::frame::{Frame, Series};
use crate::types::TimePeriod;
use crate::Result;
use tracing::debug;

/// Label of the all-instrument column in P&L tables.
pub const PNL_TOTAL_COLUMN: &str = "Total";

fn windowed(frame: Frame, time_period: Option<&TimePeriod>) -> Frame {
    match time_period {
        Some(period) => frame.locate(period),
        None => frame,
    }
}

impl PortfolioData {
    /// Per-period instrument P&L.
    ///
    /// With `add_total` a leading `Total` column carries the NaN-skipping sum
    /// across instruments. `is_compounded` maps log P&L to simple returns.
    pub fn get_instruments_pnl(
        &self,
        add_total: bool,
        time_period: Option<&TimePeriod>,
        is_compounded: bool,
    ) -> Result<Frame> {
        let mut pnl = self.instrument_pnl().clone();
        if add_total {
            let total = pnl.row_nansum();
            pnl.insert_column(0, PNL_TOTAL_COLUMN, total)?;
        }
        let pnl = windowed(pnl, time_period);
        Ok(if is_compounded {
            pnl.map(f64::exp_m1)
        } else {
            pnl
        })
    }

    /// P&L accumulated over the window for each column of
    /// [`PortfolioData::get_instruments_pnl`].
    pub fn get_performance_attribution(
        &self,
        add_total: bool,
        time_period: Option<&TimePeriod>,
        is_compounded: bool,
    ) -> Result<Vec<(String, f64)>> {
        let pnl = self.get_instruments_pnl(add_total, time_period, false)?;
        let totals: Vec<f64> = if is_compounded {
            (0..pnl.n_cols())
                .map(|j| {
                    pnl.column_values(j)
                        .into_iter()
                        .filter(|r| !r.is_nan())
                        .fold(1.0, |acc, r| acc * (1.0 + r))
                        - 1.0
                })
                .collect()
        } else {
            pnl.col_nansum()
        };
        Ok(pnl.columns().iter().cloned().zip(totals).collect())
    }

    /// Navs built from each instrument's P&L, missing P&L counted as flat.
    pub fn get_instruments_navs(
        &self,
        time_period: Option<&TimePeriod>,
        constant_trade_level: bool,
    ) -> Result<Frame> {
        let pnl = self
            .get_instruments_pnl(false, time_period, false)?
            .fill_nan(0.0);
        Ok(returns_to_nav(&pnl, constant_trade_level))
    }

    /// Navs of each group's P&L, led by the whole portfolio under its own name.
    pub fn get_group_navs(
        &self,
        time_period: Option<&TimePeriod>,
        constant_trade_level: bool,
    ) -> Result<Frame> {
        let pnl = self.get_instruments_pnl(false, time_period, false)?;
        let total = self.total_label(self.group_order());
        let grouped = self.grouping().reduce(&pnl, Aggregator::Sum, Some(&total));
        Ok(returns_to_nav(&grouped, constant_trade_level))
    }

    /// Held weights, or the target weights fed into the simulation when
    /// `is_input_weights` is set and they exist.
    ///
    /// With `freq` the weights are sampled at period ends and forward-filled.
    pub fn get_weights(
        &self,
        is_input_weights: bool,
        columns: Option<&[String]>,
        time_period: Option<&TimePeriod>,
        freq: Option<Frequency>,
    ) -> Result<Frame> {
        let weights = match (is_input_weights, self.input_weights()) {
            (true, Some(input)) => input,
            _ => self.weights(),
        };
        let weights = match columns {
            Some(columns) => weights.select(columns)?,
            None => weights.clone(),
        };
        let weights = windowed(weights, time_period);
        Ok(match freq {
            Some(freq) => weights.resample_last(freq).ffill(),
            None => weights,
        })
    }

    /// Instrument weights, or group exposures (NaN-skipping sums) when
    /// `is_grouped`, led by the whole portfolio if `add_total`.
    pub fn get_exposures(
        &self,
        time_period: Option<&TimePeriod>,
        is_grouped: bool,
        add_total: bool,
    ) -> Frame {
        let exposures = if is_grouped {
            let total = add_total.then(|| self.total_label(self.group_order()));
            self.grouping()
                .reduce(self.weights(), Aggregator::Sum, total.as_deref())
        } else {
            self.weights().clone()
        };
        windowed(exposures, time_period)
    }

    /// Net long and net short exposures of every group, with the group's
    /// instrument exposures.
    pub fn get_grouped_exposures(&self, time_period: Option<&TimePeriod>) -> Result<Vec<GroupTable>> {
        let exposures = self.get_exposures(time_period, false, false);
        self.grouping().direction_tables(&exposures, &exposures)
    }

    /// Cumulative P&L of every group split by the direction of the position
    /// that earned it, with the group's cumulative instrument P&L.
    pub fn get_grouped_cum_pnls(&self, time_period: Option<&TimePeriod>) -> Result<Vec<GroupTable>> {
        let pnl = self
            .get_instruments_pnl(false, time_period, false)?
            .fill_nan(0.0);
        let exposures = self.get_exposures(time_period, false, false);
        debug!(portfolio = %self.name(), "cumulating grouped pnl by direction");
        Ok(self
            .grouping()
            .direction_tables(&pnl, &exposures)?
            .into_iter()
            .map(|table| GroupTable {
                group: table.group,
                aggregate: table.aggregate.cumsum(),
                by_instrument: table.by_instrument.cumsum(),
            })
            .collect())
    }

    /// Number of instruments with a non-zero weight at each date.
    pub fn get_num_investable_instruments(&self, time_period: Option<&TimePeriod>) -> Series {
        let weights = windowed(self.weights().clone(), time_period);
        let counts = (0..weights.n_rows())
            .map(|t| {
                weights
                    .row(t)
                    .iter()
                    .filter(|w| w.is_finite() && **w != 0.0)
                    .count() as f64
            })
            .collect();
        Series::from_parts(self.name().to_string(), weights.index().to_vec(), counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn dates(n: u32) -> Vec<NaiveDate> {
        (1..=n)
            .map(|d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap())
            .collect()
    }

    fn columns() -> Vec<String> {
        ["SPY", "QQQ", "TLT"].iter().map(|s| s.to_string()).collect()
    }

    fn portfolio() -> PortfolioData {
        let nav = Series::new("Fund", dates(3), vec![100.0, 101.0, 103.0]).unwrap();
        let pnl = Frame::new(
            dates(3),
            columns(),
            vec![
                vec![0.0, 0.0, 0.0],
                vec![0.01, -0.005, f64::NAN],
                vec![0.02, 0.01, -0.01],
            ],
        )
        .unwrap();
        let weights = Frame::new(
            dates(3),
            columns(),
            vec![
                vec![0.6, -0.2, 0.0],
                vec![0.5, -0.3, 0.4],
                vec![0.5, 0.1, 0.4],
            ],
        )
        .unwrap();
        let groups = BTreeMap::from([
            ("SPY".to_string(), "Equities".to_string()),
            ("QQQ".to_string(), "Equities".to_string()),
            ("TLT".to_string(), "Bonds".to_string()),
        ]);
        PortfolioData::builder(nav)
            .prices(Frame::filled(dates(3), columns(), 1.0))
            .weights(weights)
            .instrument_pnl(pnl)
            .group_data(groups)
            .build()
            .unwrap()
    }

    #[test]
    fn test_instruments_pnl_total_first() {
        let pnl = portfolio().get_instruments_pnl(true, None, false).unwrap();
        assert_eq!(pnl.columns(), &["Total", "SPY", "QQQ", "TLT"]);
        assert_relative_eq!(pnl.get(1, 0), 0.005, epsilon = 1e-12);
    }

    #[test]
    fn test_compounded_pnl() {
        let pnl = portfolio().get_instruments_pnl(false, None, true).unwrap();
        assert_relative_eq!(pnl.get(2, 0), 0.02f64.exp_m1(), epsilon = 1e-12);
    }

    #[test]
    fn test_performance_attribution() {
        let data = portfolio();
        let summed = data.get_performance_attribution(true, None, false).unwrap();
        assert_eq!(summed[0].0, "Total");
        assert_relative_eq!(summed[0].1, 0.025, epsilon = 1e-12);
        assert_relative_eq!(summed[1].1, 0.03, epsilon = 1e-12);

        let compounded = data.get_performance_attribution(false, None, true).unwrap();
        assert_relative_eq!(compounded[0].1, 1.01 * 1.02 - 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_group_navs_lead_with_portfolio() {
        let navs = portfolio().get_group_navs(None, false).unwrap();
        assert_eq!(navs.columns(), &["Fund", "Equities", "Bonds"]);
        assert_eq!(navs.row(0), &[1.0, 1.0, 1.0]);
        assert_relative_eq!(navs.get(1, 1), 1.005, epsilon = 1e-12);
    }

    #[test]
    fn test_grouped_exposures_total() {
        let exposures = portfolio().get_exposures(None, true, true);
        assert_eq!(exposures.columns(), &["Fund", "Equities", "Bonds"]);
        assert_relative_eq!(exposures.get(1, 0), 0.6, epsilon = 1e-12);
        assert_relative_eq!(exposures.get(1, 1), 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_grouped_exposures_by_direction() {
        let tables = portfolio().get_grouped_exposures(None).unwrap();
        let equities = &tables[0];
        assert_eq!(equities.group, "Equities");
        assert_relative_eq!(equities.aggregate.get(0, 1), 0.6, epsilon = 1e-12);
        assert_relative_eq!(equities.aggregate.get(0, 2), -0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_grouped_cum_pnls_split_on_exposure_sign() {
        let tables = portfolio().get_grouped_cum_pnls(None).unwrap();
        let equities = &tables[0];
        // QQQ short on day two, long on day three
        assert_relative_eq!(equities.aggregate.get(2, 1), 0.01 + 0.02 + 0.01, epsilon = 1e-12);
        assert_relative_eq!(equities.aggregate.get(2, 2), -0.005, epsilon = 1e-12);
        assert_relative_eq!(
            equities.by_instrument.get(2, 1),
            -0.005 + 0.01,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_weights_resampled_and_selected() {
        let data = portfolio();
        let weights = data
            .get_weights(true, Some(["TLT".to_string()].as_slice()), None, None)
            .unwrap();
        assert_eq!(weights.columns(), &["TLT"]);

        let monthly = data
            .get_weights(false, None, None, Some(Frequency::Monthly))
            .unwrap();
        assert_eq!(monthly.n_rows(), 1);
        assert_eq!(monthly.row(0), &[0.5, 0.1, 0.4]);
    }

    #[test]
    fn test_num_investable_instruments() {
        let counts = portfolio().get_num_investable_instruments(None);
        assert_eq!(counts.values(), &[2.0, 3.0, 3.0]);
    }
}
