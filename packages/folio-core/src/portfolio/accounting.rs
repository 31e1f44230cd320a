//! Long-only average-cost accounting.
//!
//! Units and prices are walked forward one date at a time. Each instrument
//! carries its average entry cost and previous holding; purchases blend the
//! new lot into the average, sales book realized P&L against it.

use super::data::PortfolioData;
use crate::frame::Frame;
use crate::types::TimePeriod;
use crate::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Unit changes inside `[-TRADE_EPSILON, TRADE_EPSILON]` are not trades.
pub const TRADE_EPSILON: f64 = 1e-16;

/// Per-date, per-instrument accounting output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostBasisLedger {
    /// Average entry cost after the date's trade
    pub avg_cost: Frame,
    /// P&L booked by sales on the date
    pub realized_pnl: Frame,
    /// Unrealized gain on the carried position, net of what was just realized
    pub mtm_pnl: Frame,
    /// Units traded on the date
    pub trade_delta: Frame,
}

/// The ledger as reported: realized P&L cumulated over the reporting window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RealizedPnl {
    pub avg_costs: Frame,
    /// Cumulative realized P&L
    pub realized_pnl: Frame,
    pub mtm_pnl: Frame,
    /// Cumulative realized plus mark-to-market
    pub total_pnl: Frame,
    pub trades: Frame,
}

struct Step {
    realized: f64,
    mtm: f64,
    delta: f64,
}

#[derive(Debug, Clone, Copy)]
struct CostState {
    avg_cost: f64,
    units: f64,
}

impl CostState {
    fn open(price: f64, units: f64) -> Self {
        let avg_cost = if units > TRADE_EPSILON { price } else { 0.0 };
        Self { avg_cost, units }
    }

    fn step(&mut self, price: f64, units: f64) -> Step {
        let delta = units - self.units;
        let is_purchase = delta > TRADE_EPSILON;
        let is_sell = delta < -TRADE_EPSILON;

        let realized = if is_sell {
            -delta * (price - self.avg_cost)
        } else {
            0.0
        };
        let mtm = self.units * (price - self.avg_cost) - realized;

        if is_purchase && units.abs() > TRADE_EPSILON {
            self.avg_cost = (delta * price + self.units * self.avg_cost) / units;
        }
        self.units = units;

        Step {
            realized,
            mtm,
            delta,
        }
    }
}

/// Run the average-cost recurrence over aligned `prices` and `units`.
///
/// A NaN price on a purchase, or on a sale of a held position, makes that
/// instrument's average cost NaN. Every later purchase blends the previous
/// cost back in, so the NaN stays even across a full exit and re-entry.
/// Trade deltas are unaffected.
pub fn compute_realized_pnl(prices: &Frame, units: &Frame) -> Result<CostBasisLedger> {
    prices.check_aligned(units)?;

    let n_rows = prices.n_rows();
    let n_cols = prices.n_cols();
    let mut avg_cost = Vec::with_capacity(n_rows);
    let mut realized_pnl = Vec::with_capacity(n_rows);
    let mut mtm_pnl = Vec::with_capacity(n_rows);
    let mut trade_delta = Vec::with_capacity(n_rows);

    if n_rows > 0 {
        let mut states: Vec<CostState> = prices
            .row(0)
            .iter()
            .zip(units.row(0))
            .map(|(p, u)| CostState::open(*p, *u))
            .collect();
        avg_cost.push(states.iter().map(|s| s.avg_cost).collect::<Vec<_>>());
        realized_pnl.push(vec![0.0; n_cols]);
        mtm_pnl.push(vec![0.0; n_cols]);
        trade_delta.push(vec![0.0; n_cols]);

        for t in 1..n_rows {
            let steps: Vec<Step> = states
                .iter_mut()
                .zip(prices.row(t).iter().zip(units.row(t)))
                .map(|(state, (p, u))| state.step(*p, *u))
                .collect();
            avg_cost.push(states.iter().map(|s| s.avg_cost).collect());
            realized_pnl.push(steps.iter().map(|s| s.realized).collect());
            mtm_pnl.push(steps.iter().map(|s| s.mtm).collect());
            trade_delta.push(steps.iter().map(|s| s.delta).collect());
        }
    }

    let shaped = |values| {
        Frame::from_parts(prices.index().to_vec(), prices.columns().to_vec(), values)
    };
    Ok(CostBasisLedger {
        avg_cost: shaped(avg_cost),
        realized_pnl: shaped(realized_pnl),
        mtm_pnl: shaped(mtm_pnl),
        trade_delta: shaped(trade_delta),
    })
}

impl PortfolioData {
    /// Average costs, cumulative realized P&L, mark-to-market and total P&L
    /// and trades of the portfolio's units, optionally restricted to a window.
    pub fn compute_realized_pnl(&self, time_period: Option<&TimePeriod>) -> Result<RealizedPnl> {
        debug!(portfolio = %self.name(), "computing realized pnl");
        let ledger = compute_realized_pnl(self.prices(), self.units())?;
        let window = |f: Frame| match time_period {
            Some(period) => f.locate(period),
            None => f,
        };

        let avg_costs = window(ledger.avg_cost);
        let realized_pnl = window(ledger.realized_pnl).cumsum();
        let mtm_pnl = window(ledger.mtm_pnl);
        let trades = window(ledger.trade_delta);
        let total_pnl = realized_pnl.zip_with(&mtm_pnl, |r, m| r + m)?;

        Ok(RealizedPnl {
            avg_costs,
            realized_pnl,
            mtm_pnl,
            total_pnl,
            trades,
        })
    }
}
