//! CSV persistence of portfolios.
//!
//! A portfolio saved under `ticker` becomes one file per table,
//! `{ticker}_{key}.csv`, in a single directory. Tables have a leading `date`
//! column in ISO format; missing values are empty fields.

use crate::config::AnalyticsConfig;
use crate::frame::Frame;
use crate::portfolio::PortfolioData;
use crate::{Error, Result};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const DATE_COLUMN: &str = "date";
const DATE_FORMAT: &str = "%Y-%m-%d";

const NAV: &str = "nav";
const PRICES: &str = "prices";
const WEIGHTS: &str = "weights";
const UNITS: &str = "units";
const INSTRUMENT_PNL: &str = "instrument_pnl";
const REALIZED_COSTS: &str = "realized_costs";
const GROUP_DATA: &str = "group_data";
const GROUP_ORDER: &str = "group_order";

fn table_path(dir: &Path, ticker: &str, key: &str) -> PathBuf {
    dir.join(format!("{ticker}_{key}.csv"))
}

fn existing_path(dir: &Path, ticker: &str, key: &str) -> Result<PathBuf> {
    let path = table_path(dir, ticker, key);
    if !path.exists() {
        return Err(Error::MissingData(format!(
            "{key} of {ticker} not found at {}",
            path.display()
        )));
    }
    Ok(path)
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}

fn parse_value(field: &str) -> Result<f64> {
    let field = field.trim();
    if field.is_empty() || field.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    field
        .parse()
        .map_err(|_| Error::Parse(format!("invalid number {field:?}")))
}

/// Write `frame` as CSV with a leading date column.
pub fn write_frame(path: &Path, frame: &Frame) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    let header = std::iter::once(DATE_COLUMN).chain(frame.columns().iter().map(String::as_str));
    writer.write_record(header)?;
    for (t, date) in frame.index().iter().enumerate() {
        let record = std::iter::once(date.format(DATE_FORMAT).to_string())
            .chain(frame.row(t).iter().map(|v| format_value(*v)));
        writer.write_record(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a CSV written by [`write_frame`]: first column dates, the rest numbers.
pub fn read_frame(path: &Path) -> Result<Frame> {
    let mut reader = csv::Reader::from_path(path)?;
    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .skip(1)
        .map(str::to_string)
        .collect();

    let mut index = Vec::new();
    let mut values = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut fields = record.iter();
        let date = fields
            .next()
            .ok_or_else(|| Error::Parse(format!("empty row in {}", path.display())))?;
        index.push(
            NaiveDate::parse_from_str(date.trim(), DATE_FORMAT)
                .map_err(|e| Error::Parse(format!("invalid date {date:?}: {e}")))?,
        );
        values.push(fields.map(parse_value).collect::<Result<Vec<f64>>>()?);
    }
    Frame::new(index, columns, values)
}

fn write_group_data(path: &Path, group_data: &BTreeMap<String, String>) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["instrument", "group"])?;
    for (instrument, group) in group_data {
        writer.write_record([instrument, group])?;
    }
    writer.flush()?;
    Ok(())
}

fn read_group_data(path: &Path) -> Result<BTreeMap<String, String>> {
    let mut reader = csv::Reader::from_path(path)?;
    reader
        .records()
        .map(|record| -> Result<(String, String)> {
            let record = record?;
            match (record.get(0), record.get(1)) {
                (Some(instrument), Some(group)) => Ok((instrument.to_string(), group.to_string())),
                _ => Err(Error::Parse(format!(
                    "group data row needs instrument and group in {}",
                    path.display()
                ))),
            }
        })
        .collect()
}

fn write_group_order(path: &Path, group_order: &[String]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["group"])?;
    for group in group_order {
        writer.write_record([group])?;
    }
    writer.flush()?;
    Ok(())
}

fn read_group_order(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::Reader::from_path(path)?;
    reader
        .records()
        .map(|record| -> Result<String> { Ok(record?.get(0).unwrap_or_default().to_string()) })
        .collect()
}

impl PortfolioData {
    /// Write every table of the portfolio to `dir` under `ticker`.
    pub fn save(&self, ticker: &str, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        let tables = [
            (NAV, self.nav().to_frame()),
            (PRICES, self.prices().clone()),
            (WEIGHTS, self.weights().clone()),
            (UNITS, self.units().clone()),
            (INSTRUMENT_PNL, self.instrument_pnl().clone()),
            (REALIZED_COSTS, self.realized_costs().clone()),
        ];
        for (key, frame) in &tables {
            write_frame(&table_path(dir, ticker, key), frame)?;
        }
        write_group_data(&table_path(dir, ticker, GROUP_DATA), self.group_data())?;
        write_group_order(&table_path(dir, ticker, GROUP_ORDER), self.group_order())?;

        info!(ticker, dir = %dir.display(), "saved portfolio");
        Ok(())
    }

    /// Read a portfolio saved by [`PortfolioData::save`].
    pub fn load(ticker: &str, dir: &Path) -> Result<Self> {
        let table = |key: &str| -> Result<Frame> { read_frame(&existing_path(dir, ticker, key)?) };

        let navs = table(NAV)?;
        if navs.n_cols() != 1 {
            return Err(Error::Shape(format!(
                "nav of {ticker} has {} columns",
                navs.n_cols()
            )));
        }
        let nav = navs.column_at(0);

        let mut builder = PortfolioData::builder(nav)
            .prices(table(PRICES)?)
            .weights(table(WEIGHTS)?)
            .units(table(UNITS)?)
            .instrument_pnl(table(INSTRUMENT_PNL)?)
            .realized_costs(table(REALIZED_COSTS)?)
            .group_data(read_group_data(&existing_path(dir, ticker, GROUP_DATA)?)?);

        let order_path = table_path(dir, ticker, GROUP_ORDER);
        if order_path.exists() {
            builder = builder.group_order(read_group_order(&order_path)?);
        } else {
            debug!(ticker, "no group order saved, deriving it from group data");
        }

        let data = builder.build()?;
        info!(ticker, dir = %dir.display(), rows = data.index().len(), "loaded portfolio");
        Ok(data)
    }
}

/// Directory of saved portfolios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortfolioStore {
    root: PathBuf,
}

impl PortfolioStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the default storage directory.
    pub fn default_root() -> PathBuf {
        if let Ok(path) = env::var("FOLIO_DATA_DIR") {
            return PathBuf::from(path);
        }

        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".folio/portfolios"))
            .unwrap_or_else(|| PathBuf::from("portfolios"))
    }

    /// Store at the configured directory, or the default one.
    pub fn from_config(config: &AnalyticsConfig) -> Self {
        Self::new(config.data_dir.clone().unwrap_or_else(Self::default_root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn save(&self, data: &PortfolioData, ticker: &str) -> Result<()> {
        data.save(ticker, &self.root)
    }

    pub fn load(&self, ticker: &str) -> Result<PortfolioData> {
        PortfolioData::load(ticker, &self.root)
    }

    /// Whether a portfolio is saved under `ticker`.
    pub fn contains(&self, ticker: &str) -> bool {
        table_path(&self.root, ticker, NAV).exists()
    }

    /// Tickers of every saved portfolio, sorted.
    pub fn tickers(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let suffix = format!("_{NAV}.csv");
        let mut tickers: Vec<String> = fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .and_then(|name| name.strip_suffix(&suffix))
                    .map(str::to_string)
            })
            .collect();
        tickers.sort();
        Ok(tickers)
    }
}
