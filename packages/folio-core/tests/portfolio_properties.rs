//! End-to-end properties of the portfolio analytics.

use approx::assert_relative_eq;
use chrono::{Datelike, Days, NaiveDate, Weekday};
use folio_core::{
    compute_realized_pnl, Aggregator, Frame, PortfolioData, PortfolioStore, Series, TableView,
    TurnoverParams,
};
use std::collections::{BTreeMap, HashMap};
use tempfile::tempdir;

fn weekdays(n: usize) -> Vec<NaiveDate> {
    let mut date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let mut out = Vec::with_capacity(n);
    while out.len() < n {
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            out.push(date);
        }
        date = date + Days::new(1);
    }
    out
}

fn instruments() -> Vec<String> {
    ["SPY", "QQQ", "TLT", "IEF", "GLD"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Deterministic wiggle in [-1, 1].
fn wiggle(t: usize, j: usize) -> f64 {
    (((t * 7 + j * 13) % 17) as f64 / 8.0) - 1.0
}

fn sample_portfolio(n: usize) -> PortfolioData {
    let index = weekdays(n);
    let columns = instruments();

    let mut level = vec![100.0, 300.0, 90.0, 95.0, 180.0];
    let prices: Vec<Vec<f64>> = (0..n)
        .map(|t| {
            if t > 0 {
                for (j, p) in level.iter_mut().enumerate() {
                    *p *= 1.0 + 0.01 * wiggle(t, j);
                }
            }
            level.clone()
        })
        .collect();
    let units: Vec<Vec<f64>> = (0..n)
        .map(|t| {
            (0..columns.len())
                .map(|j| (10.0 + 5.0 * wiggle(t / 3, j)).max(0.0))
                .collect()
        })
        .collect();
    let weights: Vec<Vec<f64>> = (0..n)
        .map(|t| (0..columns.len()).map(|j| 0.2 + 0.3 * wiggle(t, j + 1)).collect())
        .collect();
    let nav: Vec<f64> = (0..n).map(|t| 1000.0 * (1.0 + 0.002 * t as f64)).collect();

    let groups = BTreeMap::from([
        ("SPY".to_string(), "Equities".to_string()),
        ("QQQ".to_string(), "Equities".to_string()),
        ("TLT".to_string(), "Rates".to_string()),
        ("IEF".to_string(), "Rates".to_string()),
        ("GLD".to_string(), "Commodities".to_string()),
    ]);

    PortfolioData::builder(Series::new("Fund", index.clone(), nav).unwrap())
        .prices(Frame::new(index.clone(), columns.clone(), prices).unwrap())
        .units(Frame::new(index.clone(), columns.clone(), units).unwrap())
        .weights(Frame::new(index, columns, weights).unwrap())
        .group_data(groups)
        .build()
        .unwrap()
}

#[test]
fn trade_delta_is_the_unit_change() {
    let data = sample_portfolio(30);
    let ledger = compute_realized_pnl(data.prices(), data.units()).unwrap();
    let units = data.units();
    for t in 1..units.n_rows() {
        for j in 0..units.n_cols() {
            assert_eq!(
                ledger.trade_delta.get(t, j),
                units.get(t, j) - units.get(t - 1, j)
            );
        }
    }
}

#[test]
fn closed_position_books_its_whole_gain() {
    let index = weekdays(5);
    let column = vec!["SPY".to_string()];
    let rows = |xs: [f64; 5]| -> Vec<Vec<f64>> { xs.iter().map(|x| vec![*x]).collect() };
    let prices = Frame::new(index.clone(), column.clone(), rows([10.0, 10.0, 12.0, 12.0, 15.0])).unwrap();
    let units = Frame::new(index.clone(), column, rows([0.0, 10.0, 10.0, 5.0, 0.0])).unwrap();

    let data = PortfolioData::builder(Series::new("Fund", index, vec![100.0; 5]).unwrap())
        .prices(prices)
        .units(units)
        .build()
        .unwrap();
    let pnl = data.compute_realized_pnl(None).unwrap();

    // cumulative: sells of 5 at 12 and 5 at 15 against a cost of 10
    assert_eq!(pnl.realized_pnl.column_values(0), vec![0.0, 0.0, 0.0, 10.0, 35.0]);
    assert_eq!(pnl.mtm_pnl.column_values(0), vec![0.0, 0.0, 20.0, 10.0, 0.0]);
    assert_eq!(pnl.total_pnl.get(4, 0), 10.0 * (15.0 - 10.0) - 5.0 * (15.0 - 12.0));
}

#[test]
fn group_columns_add_up_to_the_total() {
    let data = sample_portfolio(20);
    let grouped = data
        .grouping()
        .reduce(data.weights(), Aggregator::Sum, Some("Total"));
    assert_eq!(grouped.columns(), &["Total", "Equities", "Rates", "Commodities"]);
    for t in 0..grouped.n_rows() {
        let groups: f64 = grouped.row(t)[1..].iter().sum();
        assert_relative_eq!(groups, grouped.get(t, 0), epsilon = 1e-12);
    }
}

#[test]
fn net_long_and_net_short_partition_the_total() {
    let data = sample_portfolio(20);
    for table in data.get_grouped_exposures(None).unwrap() {
        for t in 0..table.aggregate.n_rows() {
            let row = table.aggregate.row(t);
            assert_relative_eq!(row[1] + row[2], row[0], epsilon = 1e-12);
            assert!(row[2] <= 0.0);
        }
    }
}

#[test]
fn turnover_is_never_negative() {
    let data = sample_portfolio(40);
    for view in [TableView::ByInstrument, TableView::Grouped, TableView::Aggregate] {
        let params = TurnoverParams {
            view,
            roll_period: Some(5),
            ..TurnoverParams::default()
        };
        let turnover = data.get_turnover(&params).unwrap();
        for t in 0..turnover.n_rows() {
            assert!(turnover
                .row(t)
                .iter()
                .filter(|x| !x.is_nan())
                .all(|x| *x >= 0.0));
        }
    }
}

#[test]
fn benchmark_attribution_explains_the_nav_return() {
    let data = sample_portfolio(40);
    let benchmarks = data
        .prices()
        .select(&["SPY", "TLT"])
        .unwrap()
        .rename_columns(&HashMap::from([
            ("SPY".to_string(), "Equity Index".to_string()),
            ("TLT".to_string(), "Bond Index".to_string()),
        ]));
    let attribution = data
        .compute_portfolio_benchmark_attribution(&benchmarks, None, None, 10)
        .unwrap();
    assert_eq!(attribution.columns(), &["Equity Index", "Bond Index", "Residual"]);

    let nav = data.nav().values();
    let realized: f64 = (1..nav.len()).map(|t| nav[t] / nav[t - 1] - 1.0).sum();
    let explained: f64 = attribution
        .last_row()
        .unwrap()
        .iter()
        .filter(|x| !x.is_nan())
        .sum();
    assert_relative_eq!(explained, realized, epsilon = 1e-10);
}

#[test]
fn delta_one_book_has_unit_beta() {
    let index = weekdays(30);
    let nav: Vec<f64> = (0..30).map(|t| 100.0 * (1.0 + 0.01 * wiggle(t, 0)) + t as f64).collect();
    let data = PortfolioData::builder(Series::new("Fund", index, nav).unwrap())
        .build()
        .unwrap();
    let benchmark = data.nav().clone().rename("Bench").to_frame();

    let betas = data
        .compute_portfolio_benchmark_betas(&benchmark, None, None, 65)
        .unwrap();
    for t in 1..betas.n_rows() {
        assert_relative_eq!(betas.get(t, 0), 1.0, epsilon = 1e-9);
    }

    let attribution = data
        .compute_portfolio_benchmark_attribution(&benchmark, None, None, 63)
        .unwrap();
    let residual = attribution.column("Residual").unwrap();
    let (_, last) = residual.last().unwrap();
    // the first return has no lagged beta and stays in the residual
    assert_relative_eq!(last, data.nav().values()[1] / data.nav().values()[0] - 1.0, epsilon = 1e-9);
}

#[test]
fn saved_portfolio_loads_back_identical() {
    let dir = tempdir().unwrap();
    let store = PortfolioStore::new(dir.path());
    let data = sample_portfolio(25);

    store.save(&data, "FUND").unwrap();
    let loaded = store.load("FUND").unwrap();

    assert_eq!(loaded.index(), data.index());
    assert_eq!(loaded.group_data(), data.group_data());
    assert_eq!(loaded.group_order(), data.group_order());
    assert_eq!(loaded, data);
}
