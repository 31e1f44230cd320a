//! Group reduction.
//!
//! One reduction serves every grouped view: instrument columns are rolled up
//! into group columns in display order with an [`Aggregator`], optionally
//! deciding the long/short split on a separate sign source (exposures for
//! P&L tables). Groups missing from the display order are filtered out of
//! the group columns but still count towards the total column.

use crate::frame::{nan_to_zero, Frame};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

/// How instrument values are summed within a group.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Aggregator {
    /// Every value counts
    Sum,
    /// Only values whose sign source is positive
    NetLong,
    /// Only values whose sign source is negative; reported with its raw (negative) sign
    NetShort,
}

impl Aggregator {
    /// Column label used in direction tables.
    pub fn label(self) -> &'static str {
        match self {
            Aggregator::Sum => "Total",
            Aggregator::NetLong => "Net Long",
            Aggregator::NetShort => "Net Short",
        }
    }

    fn admits(self, sign: f64) -> bool {
        match self {
            Aggregator::Sum => true,
            Aggregator::NetLong => sign > 0.0,
            Aggregator::NetShort => sign < 0.0,
        }
    }

    /// NaN-skipping reduction over `cols` of one row. No columns gives NaN.
    fn reduce(self, values: &[f64], signs: &[f64], cols: &[usize]) -> f64 {
        if cols.is_empty() {
            return f64::NAN;
        }
        cols.iter()
            .filter(|&&j| self.admits(signs[j]))
            .map(|&j| nan_to_zero(values[j]))
            .sum()
    }
}

/// Aggregate and per-instrument tables for one group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupTable {
    pub group: String,
    /// Columns `Total`, `Net Long`, `Net Short`
    pub aggregate: Frame,
    /// The group's instrument columns
    pub by_instrument: Frame,
}

/// Instrument → group mapping plus the display order of groups.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Grouping {
    group_data: BTreeMap<String, String>,
    group_order: Vec<String>,
}

impl Grouping {
    /// Every instrument in its own group, in instrument order.
    pub fn identity(instruments: &[String]) -> Self {
        Self {
            group_data: instruments
                .iter()
                .map(|i| (i.clone(), i.clone()))
                .collect(),
            group_order: instruments.to_vec(),
        }
    }

    /// Build a grouping over `instruments`.
    ///
    /// Instruments without an entry fall back to their own group. Without an
    /// explicit order the distinct groups are listed in instrument order.
    pub fn new(
        mut group_data: BTreeMap<String, String>,
        group_order: Option<Vec<String>>,
        instruments: &[String],
    ) -> Result<Self> {
        for instrument in instruments {
            if !group_data.contains_key(instrument) {
                warn!(%instrument, "no group for instrument, using the instrument itself");
                group_data.insert(instrument.clone(), instrument.clone());
            }
        }

        let group_order = match group_order {
            Some(order) => {
                let mut seen = HashSet::new();
                if let Some(dup) = order.iter().find(|g| !seen.insert(g.as_str())) {
                    return Err(Error::InvalidOperation(format!(
                        "group {dup} listed twice in group order"
                    )));
                }
                for group in instruments.iter().filter_map(|i| group_data.get(i)) {
                    if !seen.contains(group.as_str()) {
                        warn!(%group, "group not in group order, excluded from grouped views");
                    }
                }
                order
            }
            None => {
                let mut order: Vec<String> = Vec::new();
                for group in instruments.iter().filter_map(|i| group_data.get(i)) {
                    if !order.contains(group) {
                        order.push(group.clone());
                    }
                }
                order
            }
        };

        Ok(Self {
            group_data,
            group_order,
        })
    }

    pub fn group_data(&self) -> &BTreeMap<String, String> {
        &self.group_data
    }

    pub fn group_order(&self) -> &[String] {
        &self.group_order
    }

    pub fn group_of(&self, instrument: &str) -> Option<&str> {
        self.group_data.get(instrument).map(String::as_str)
    }

    /// Column positions of each ordered group's members within `columns`.
    pub fn members(&self, columns: &[String]) -> Vec<(String, Vec<usize>)> {
        self.group_order
            .iter()
            .map(|group| {
                let cols = columns
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| self.group_of(c) == Some(group.as_str()))
                    .map(|(j, _)| j)
                    .collect();
                (group.clone(), cols)
            })
            .collect()
    }

    /// Roll `frame` up into one column per ordered group, plus a leading total
    /// column over all instruments when `total_column` is given.
    pub fn reduce(&self, frame: &Frame, aggregator: Aggregator, total_column: Option<&str>) -> Frame {
        self.reduce_with_signs(frame, frame, aggregator, total_column)
    }

    /// Like [`Grouping::reduce`] but the long/short split follows `signs`.
    pub fn reduce_masked(
        &self,
        frame: &Frame,
        signs: &Frame,
        aggregator: Aggregator,
        total_column: Option<&str>,
    ) -> Result<Frame> {
        frame.check_aligned(signs)?;
        Ok(self.reduce_with_signs(frame, signs, aggregator, total_column))
    }

    fn reduce_with_signs(
        &self,
        frame: &Frame,
        signs: &Frame,
        aggregator: Aggregator,
        total_column: Option<&str>,
    ) -> Frame {
        let members = self.members(frame.columns());
        let all: Vec<usize> = (0..frame.n_cols()).collect();

        let mut columns: Vec<String> = Vec::with_capacity(members.len() + 1);
        if let Some(total) = total_column {
            columns.push(total.to_string());
        }
        columns.extend(members.iter().map(|(g, _)| g.clone()));

        let values = (0..frame.n_rows())
            .map(|t| {
                let (row, sign_row) = (frame.row(t), signs.row(t));
                let mut out = Vec::with_capacity(columns.len());
                if total_column.is_some() {
                    out.push(aggregator.reduce(row, sign_row, &all));
                }
                out.extend(
                    members
                        .iter()
                        .map(|(_, cols)| aggregator.reduce(row, sign_row, cols)),
                );
                out
            })
            .collect();

        Frame::from_parts(frame.index().to_vec(), columns, values)
    }

    /// Per ordered group: `Total`/`Net Long`/`Net Short` of `frame` (split on
    /// the sign of `signs`) and the group's instrument columns.
    pub fn direction_tables(&self, frame: &Frame, signs: &Frame) -> Result<Vec<GroupTable>> {
        frame.check_aligned(signs)?;
        let aggregators = [Aggregator::Sum, Aggregator::NetLong, Aggregator::NetShort];
        let labels: Vec<String> = aggregators.iter().map(|a| a.label().to_string()).collect();

        Ok(self
            .members(frame.columns())
            .into_iter()
            .map(|(group, cols)| {
                let values = (0..frame.n_rows())
                    .map(|t| {
                        aggregators
                            .iter()
                            .map(|a| a.reduce(frame.row(t), signs.row(t), &cols))
                            .collect()
                    })
                    .collect();
                GroupTable {
                    group,
                    aggregate: Frame::from_parts(frame.index().to_vec(), labels.clone(), values),
                    by_instrument: frame.take_columns(&cols),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn instruments() -> Vec<String> {
        ["SPY", "QQQ", "TLT", "GLD"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn grouping() -> Grouping {
        let data: BTreeMap<String, String> = [
            ("SPY", "Equities"),
            ("QQQ", "Equities"),
            ("TLT", "Bonds"),
            ("GLD", "Commodities"),
        ]
        .iter()
        .map(|(i, g)| (i.to_string(), g.to_string()))
        .collect();
        Grouping::new(data, None, &instruments()).unwrap()
    }

    fn exposures() -> Frame {
        let index = (1..=2)
            .map(|d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap())
            .collect();
        Frame::new(
            index,
            instruments(),
            vec![vec![0.5, -0.2, 0.4, f64::NAN], vec![0.3, 0.1, -0.6, 0.2]],
        )
        .unwrap()
    }

    #[test]
    fn test_default_order_follows_instruments() {
        assert_eq!(
            grouping().group_order(),
            &["Equities", "Bonds", "Commodities"]
        );
    }

    #[test]
    fn test_missing_instrument_falls_back_to_identity() {
        let data = BTreeMap::from([("SPY".to_string(), "Equities".to_string())]);
        let g = Grouping::new(data, None, &instruments()).unwrap();
        assert_eq!(g.group_of("TLT"), Some("TLT"));
        assert_eq!(g.group_order().len(), 4);
    }

    #[test]
    fn test_duplicate_group_order_rejected() {
        let result = Grouping::new(
            BTreeMap::new(),
            Some(vec!["A".to_string(), "A".to_string()]),
            &instruments(),
        );
        assert!(matches!(result, Err(Error::InvalidOperation(_))));
    }

    #[test]
    fn test_group_sums_match_total() {
        let g = grouping();
        let reduced = g.reduce(&exposures(), Aggregator::Sum, Some("Fund"));
        assert_eq!(
            reduced.columns(),
            &["Fund", "Equities", "Bonds", "Commodities"]
        );
        for t in 0..reduced.n_rows() {
            let groups: f64 = reduced.row(t)[1..].iter().sum();
            assert_relative_eq!(groups, reduced.get(t, 0), epsilon = 1e-12);
        }
        assert_relative_eq!(reduced.get(0, 1), 0.3, epsilon = 1e-12);
        // all-NaN group member sums to zero
        assert_eq!(reduced.get(0, 3), 0.0);
    }

    #[test]
    fn test_net_long_plus_net_short_is_total() {
        let g = grouping();
        let f = exposures();
        let total = g.reduce(&f, Aggregator::Sum, Some("Fund"));
        let long = g.reduce(&f, Aggregator::NetLong, Some("Fund"));
        let short = g.reduce(&f, Aggregator::NetShort, Some("Fund"));
        for t in 0..f.n_rows() {
            for j in 0..total.n_cols() {
                assert_relative_eq!(
                    long.get(t, j) + short.get(t, j),
                    total.get(t, j),
                    epsilon = 1e-12
                );
            }
        }
        // net short keeps its raw negative sign
        assert_relative_eq!(short.get(0, 1), -0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_groups_outside_order_are_filtered_but_totalled() {
        let data = grouping().group_data().clone();
        let g = Grouping::new(data, Some(vec!["Equities".to_string()]), &instruments()).unwrap();
        let reduced = g.reduce(&exposures(), Aggregator::Sum, Some("Fund"));
        assert_eq!(reduced.columns(), &["Fund", "Equities"]);
        assert_relative_eq!(reduced.get(1, 0), 0.0, epsilon = 1e-12);
        assert_relative_eq!(reduced.get(1, 1), 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_group_is_nan() {
        let data = grouping().group_data().clone();
        let order = vec!["Equities".to_string(), "Credit".to_string()];
        let g = Grouping::new(data, Some(order), &instruments()).unwrap();
        let reduced = g.reduce(&exposures(), Aggregator::Sum, None);
        assert!(reduced.get(0, 1).is_nan());
    }

    #[test]
    fn test_direction_tables_split_on_sign_source() {
        let g = grouping();
        let f = exposures();
        let pnl = f.map(|_| 1.0);
        let tables = g.direction_tables(&pnl, &f).unwrap();
        assert_eq!(tables.len(), 3);
        let equities = &tables[0];
        assert_eq!(equities.group, "Equities");
        assert_eq!(equities.by_instrument.columns(), &["SPY", "QQQ"]);
        // day one: SPY long, QQQ short
        assert_eq!(equities.aggregate.row(0), &[2.0, 1.0, 1.0]);
        // day two: both long
        assert_eq!(equities.aggregate.row(1), &[2.0, 2.0, 0.0]);
    }
}
