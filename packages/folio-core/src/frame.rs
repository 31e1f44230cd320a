//! Date-indexed tables.
//!
//! A [`Frame`] is a row-major matrix with one row per date and one named
//! column per instrument (or group, or benchmark). A [`Series`] is a single
//! named column. Missing observations are `f64::NAN` and propagate through
//! arithmetic; the NaN-skipping reductions say so in their names.

use crate::calendar::Frequency;
use crate::types::TimePeriod;
use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub(crate) fn nan_to_zero(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x
    }
}

/// `x / divisor`, NaN when the divisor is zero.
pub(crate) fn nan_div(x: f64, divisor: f64) -> f64 {
    if divisor == 0.0 {
        f64::NAN
    } else {
        x / divisor
    }
}

fn check_index(index: &[NaiveDate]) -> Result<()> {
    if let Some(pos) = index.windows(2).position(|w| w[0] >= w[1]) {
        return Err(Error::Shape(format!(
            "index must be strictly increasing, found {} followed by {}",
            index[pos],
            index[pos + 1]
        )));
    }
    Ok(())
}

/// A named column of values indexed by date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Series {
    name: String,
    index: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl Series {
    /// Create a series, checking the index is strictly increasing and matches the values.
    pub fn new(name: impl Into<String>, index: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        let name = name.into();
        if index.len() != values.len() {
            return Err(Error::Shape(format!(
                "series {name}: {} dates but {} values",
                index.len(),
                values.len()
            )));
        }
        check_index(&index)?;
        Ok(Self {
            name,
            index,
            values,
        })
    }

    pub(crate) fn from_parts(name: String, index: Vec<NaiveDate>, values: Vec<f64>) -> Self {
        Self {
            name,
            index,
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> &[NaiveDate] {
        &self.index
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Return the series under a new name.
    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Last date and value, if any.
    pub fn last(&self) -> Option<(NaiveDate, f64)> {
        self.index.last().copied().zip(self.values.last().copied())
    }

    /// One-column frame holding this series.
    pub fn to_frame(&self) -> Frame {
        Frame::from_parts(
            self.index.clone(),
            vec![self.name.clone()],
            self.values.iter().map(|v| vec![*v]).collect(),
        )
    }

    fn via_frame(&self, op: impl FnOnce(&Frame) -> Frame) -> Series {
        op(&self.to_frame()).column_at(0)
    }

    pub fn pct_change(&self) -> Series {
        self.via_frame(Frame::pct_change)
    }

    pub fn locate(&self, period: &TimePeriod) -> Series {
        self.via_frame(|f| f.locate(period))
    }

    pub fn reindex_ffill(&self, index: &[NaiveDate]) -> Series {
        self.via_frame(|f| f.reindex_ffill(index))
    }

    pub fn resample_last(&self, freq: Frequency) -> Series {
        self.via_frame(|f| f.resample_last(freq))
    }
}

/// Row-major table: one row per date, one named column per entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Frame {
    index: Vec<NaiveDate>,
    columns: Vec<String>,
    values: Vec<Vec<f64>>,
}

impl Frame {
    /// Create a frame, validating its shape, index ordering and column uniqueness.
    pub fn new(index: Vec<NaiveDate>, columns: Vec<String>, values: Vec<Vec<f64>>) -> Result<Self> {
        if values.len() != index.len() {
            return Err(Error::Shape(format!(
                "{} dates but {} rows",
                index.len(),
                values.len()
            )));
        }
        if let Some((row, width)) = values
            .iter()
            .map(Vec::len)
            .enumerate()
            .find(|(_, width)| *width != columns.len())
        {
            return Err(Error::Shape(format!(
                "row {row} has {width} values for {} columns",
                columns.len()
            )));
        }
        check_index(&index)?;
        let mut seen = HashSet::new();
        if let Some(dup) = columns.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(Error::Shape(format!("duplicate column {dup}")));
        }
        Ok(Self {
            index,
            columns,
            values,
        })
    }

    pub(crate) fn from_parts(
        index: Vec<NaiveDate>,
        columns: Vec<String>,
        values: Vec<Vec<f64>>,
    ) -> Self {
        Self {
            index,
            columns,
            values,
        }
    }

    /// Frame with every cell set to `value`.
    pub fn filled(index: Vec<NaiveDate>, columns: Vec<String>, value: f64) -> Self {
        let values = vec![vec![value; columns.len()]; index.len()];
        Self::from_parts(index, columns, values)
    }

    /// Place frames side by side; they must share one index.
    pub fn concat(frames: &[&Frame]) -> Result<Self> {
        let first = frames
            .first()
            .ok_or_else(|| Error::Shape("no frames to combine".to_string()))?;
        if frames.iter().any(|f| f.index != first.index) {
            return Err(Error::Misaligned(
                "frames to combine must share an index".to_string(),
            ));
        }
        let columns = frames.iter().flat_map(|f| f.columns.clone()).collect();
        let values = (0..first.n_rows())
            .map(|t| {
                frames
                    .iter()
                    .flat_map(|f| f.values[t].iter().copied())
                    .collect()
            })
            .collect();
        Self::new(first.index.clone(), columns, values)
    }

    pub fn index(&self) -> &[NaiveDate] {
        &self.index
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_rows(&self) -> usize {
        self.index.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Value at (row, column) position.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row][col]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.values[row]
    }

    pub fn last_row(&self) -> Option<&[f64]> {
        self.values.last().map(Vec::as_slice)
    }

    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column_values(&self, col: usize) -> Vec<f64> {
        self.values.iter().map(|row| row[col]).collect()
    }

    pub fn column_at(&self, col: usize) -> Series {
        Series::from_parts(
            self.columns[col].clone(),
            self.index.clone(),
            self.column_values(col),
        )
    }

    /// Column by name.
    pub fn column(&self, name: &str) -> Result<Series> {
        self.column_position(name)
            .map(|col| self.column_at(col))
            .ok_or_else(|| Error::UnknownInstrument(name.to_string()))
    }

    /// Sub-frame with the named columns, in the given order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Frame> {
        let positions = names
            .iter()
            .map(|n| {
                self.column_position(n.as_ref())
                    .ok_or_else(|| Error::UnknownInstrument(n.as_ref().to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(self.take_columns(&positions))
    }

    pub(crate) fn take_columns(&self, positions: &[usize]) -> Frame {
        let columns = positions.iter().map(|&j| self.columns[j].clone()).collect();
        let values = self
            .values
            .iter()
            .map(|row| positions.iter().map(|&j| row[j]).collect())
            .collect();
        Frame::from_parts(self.index.clone(), columns, values)
    }

    /// Lay the frame out on `universe`: columns not held are filled with `fill`,
    /// columns outside the universe are rejected.
    pub fn conform_columns(&self, universe: &[String], fill: f64) -> Result<Frame> {
        if let Some(unknown) = self.columns.iter().find(|c| !universe.contains(c)) {
            return Err(Error::UnknownInstrument(unknown.clone()));
        }
        Ok(self.project_columns(universe, fill))
    }

    /// Like [`Frame::conform_columns`] but silently drops columns outside the universe.
    pub fn project_columns(&self, universe: &[String], fill: f64) -> Frame {
        let positions: Vec<Option<usize>> =
            universe.iter().map(|c| self.column_position(c)).collect();
        let values = self
            .values
            .iter()
            .map(|row| {
                positions
                    .iter()
                    .map(|p| p.map_or(fill, |j| row[j]))
                    .collect()
            })
            .collect();
        Frame::from_parts(self.index.clone(), universe.to_vec(), values)
    }

    /// Align onto `index`: each date takes the last row observed on or before it.
    /// Dates before the first observation are NaN; nothing is filled backwards.
    pub fn reindex_ffill(&self, index: &[NaiveDate]) -> Frame {
        let n_cols = self.n_cols();
        let mut values = Vec::with_capacity(index.len());
        let mut next = 0usize;
        let mut last: Option<usize> = None;
        for date in index {
            while next < self.index.len() && self.index[next] <= *date {
                last = Some(next);
                next += 1;
            }
            values.push(match last {
                Some(row) => self.values[row].clone(),
                None => vec![f64::NAN; n_cols],
            });
        }
        Frame::from_parts(index.to_vec(), self.columns.clone(), values)
    }

    /// Rows whose date falls in `period`.
    pub fn locate(&self, period: &TimePeriod) -> Frame {
        let (index, values) = self
            .index
            .iter()
            .zip(&self.values)
            .filter(|(date, _)| period.contains(**date))
            .map(|(date, row)| (*date, row.clone()))
            .unzip();
        Frame::from_parts(index, self.columns.clone(), values)
    }

    /// Drop the first `n` rows.
    pub fn skip_rows(&self, n: usize) -> Frame {
        let n = n.min(self.n_rows());
        Frame::from_parts(
            self.index[n..].to_vec(),
            self.columns.clone(),
            self.values[n..].to_vec(),
        )
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Frame {
        let values = self
            .values
            .iter()
            .map(|row| row.iter().map(|x| f(*x)).collect())
            .collect();
        Frame::from_parts(self.index.clone(), self.columns.clone(), values)
    }

    pub fn fill_nan(&self, value: f64) -> Frame {
        self.map(|x| if x.is_nan() { value } else { x })
    }

    pub fn scale(&self, factor: f64) -> Frame {
        self.map(|x| x * factor)
    }

    /// Values lagged by `periods` rows; the first rows become NaN.
    pub fn shift(&self, periods: usize) -> Frame {
        let n_cols = self.n_cols();
        let values = (0..self.n_rows())
            .map(|t| {
                if t < periods {
                    vec![f64::NAN; n_cols]
                } else {
                    self.values[t - periods].clone()
                }
            })
            .collect();
        Frame::from_parts(self.index.clone(), self.columns.clone(), values)
    }

    fn lagged(&self, f: impl Fn(f64, f64) -> f64) -> Frame {
        let n_cols = self.n_cols();
        let values = (0..self.n_rows())
            .map(|t| {
                if t == 0 {
                    vec![f64::NAN; n_cols]
                } else {
                    self.values[t]
                        .iter()
                        .zip(&self.values[t - 1])
                        .map(|(cur, prev)| f(*cur, *prev))
                        .collect()
                }
            })
            .collect();
        Frame::from_parts(self.index.clone(), self.columns.clone(), values)
    }

    /// First difference; first row NaN.
    pub fn diff(&self) -> Frame {
        self.lagged(|cur, prev| cur - prev)
    }

    /// Simple returns; first row NaN.
    pub fn pct_change(&self) -> Frame {
        self.lagged(|cur, prev| cur / prev - 1.0)
    }

    /// Log returns; first row NaN.
    pub fn log_returns(&self) -> Frame {
        self.lagged(|cur, prev| (cur / prev).ln())
    }

    /// Running sum per column, skipping NaN (which stays NaN in place).
    pub fn cumsum(&self) -> Frame {
        let mut running = vec![0.0; self.n_cols()];
        let values = self
            .values
            .iter()
            .map(|row| {
                row.iter()
                    .zip(running.iter_mut())
                    .map(|(x, acc)| {
                        if x.is_nan() {
                            f64::NAN
                        } else {
                            *acc += x;
                            *acc
                        }
                    })
                    .collect()
            })
            .collect();
        Frame::from_parts(self.index.clone(), self.columns.clone(), values)
    }

    /// Trailing sum over `window` rows; NaN until the window holds `window`
    /// non-NaN observations.
    pub fn rolling_sum(&self, window: usize) -> Frame {
        let window = window.max(1);
        let values = (0..self.n_rows())
            .map(|t| {
                let rows = &self.values[(t + 1).saturating_sub(window)..=t];
                (0..self.n_cols())
                    .map(|j| {
                        let (sum, count) = rows
                            .iter()
                            .map(|row| row[j])
                            .filter(|x| !x.is_nan())
                            .fold((0.0, 0usize), |(s, c), x| (s + x, c + 1));
                        if count >= window {
                            sum
                        } else {
                            f64::NAN
                        }
                    })
                    .collect()
            })
            .collect();
        Frame::from_parts(self.index.clone(), self.columns.clone(), values)
    }

    /// Replace NaN with the last non-NaN value above it in the same column.
    pub fn ffill(&self) -> Frame {
        let mut last = vec![f64::NAN; self.n_cols()];
        let values = self
            .values
            .iter()
            .map(|row| {
                row.iter()
                    .zip(last.iter_mut())
                    .map(|(x, prev)| {
                        if !x.is_nan() {
                            *prev = *x;
                        }
                        *prev
                    })
                    .collect()
            })
            .collect();
        Frame::from_parts(self.index.clone(), self.columns.clone(), values)
    }

    pub(crate) fn check_aligned(&self, other: &Frame) -> Result<()> {
        if self.index != other.index {
            return Err(Error::Misaligned(format!(
                "index of {} rows vs {} rows",
                self.n_rows(),
                other.n_rows()
            )));
        }
        if self.columns != other.columns {
            return Err(Error::Misaligned(format!(
                "columns {:?} vs {:?}",
                self.columns, other.columns
            )));
        }
        Ok(())
    }

    /// Elementwise combination of two frames with identical index and columns.
    pub fn zip_with(&self, other: &Frame, f: impl Fn(f64, f64) -> f64) -> Result<Frame> {
        self.check_aligned(other)?;
        let values = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| a.iter().zip(b).map(|(x, y)| f(*x, *y)).collect())
            .collect();
        Ok(Frame::from_parts(
            self.index.clone(),
            self.columns.clone(),
            values,
        ))
    }

    pub fn mul(&self, other: &Frame) -> Result<Frame> {
        self.zip_with(other, |a, b| a * b)
    }

    pub fn div(&self, other: &Frame) -> Result<Frame> {
        self.zip_with(other, |a, b| a / b)
    }

    /// Divide every row by the matching entry of `divisor`; rows over a zero
    /// divisor become NaN.
    pub fn div_rows(&self, divisor: &[f64]) -> Result<Frame> {
        if divisor.len() != self.n_rows() {
            return Err(Error::Shape(format!(
                "{} divisors for {} rows",
                divisor.len(),
                self.n_rows()
            )));
        }
        let values = self
            .values
            .iter()
            .zip(divisor)
            .map(|(row, d)| row.iter().map(|x| nan_div(*x, *d)).collect())
            .collect();
        Ok(Frame::from_parts(
            self.index.clone(),
            self.columns.clone(),
            values,
        ))
    }

    /// Sum across each row, NaN counted as zero.
    pub fn row_nansum(&self) -> Vec<f64> {
        self.values
            .iter()
            .map(|row| row.iter().copied().map(nan_to_zero).sum())
            .collect()
    }

    /// Sum down each column, NaN counted as zero.
    pub fn col_nansum(&self) -> Vec<f64> {
        (0..self.n_cols())
            .map(|j| self.values.iter().map(|row| nan_to_zero(row[j])).sum())
            .collect()
    }

    /// Mean of each column over its non-NaN values; NaN if there are none.
    pub fn col_nanmean(&self) -> Vec<f64> {
        (0..self.n_cols())
            .map(|j| {
                let (sum, count) = self
                    .values
                    .iter()
                    .map(|row| row[j])
                    .filter(|x| !x.is_nan())
                    .fold((0.0, 0usize), |(s, c), x| (s + x, c + 1));
                if count == 0 {
                    f64::NAN
                } else {
                    sum / count as f64
                }
            })
            .collect()
    }

    /// Insert a column at `pos` (clamped to the end).
    pub fn insert_column(
        &mut self,
        pos: usize,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<()> {
        let name = name.into();
        if values.len() != self.n_rows() {
            return Err(Error::Shape(format!(
                "column {name} has {} values for {} rows",
                values.len(),
                self.n_rows()
            )));
        }
        if self.columns.contains(&name) {
            return Err(Error::Shape(format!("duplicate column {name}")));
        }
        let pos = pos.min(self.n_cols());
        self.columns.insert(pos, name);
        for (row, v) in self.values.iter_mut().zip(values) {
            row.insert(pos, v);
        }
        Ok(())
    }

    /// Rename columns found in `names`; others keep their label.
    pub fn rename_columns(&self, names: &HashMap<String, String>) -> Frame {
        let columns = self
            .columns
            .iter()
            .map(|c| names.get(c).cloned().unwrap_or_else(|| c.clone()))
            .collect();
        Frame::from_parts(self.index.clone(), columns, self.values.clone())
    }

    /// Sample at period ends, each taking the last row observed on or before it.
    pub fn resample_last(&self, freq: Frequency) -> Frame {
        match (self.index.first(), self.index.last()) {
            (Some(first), Some(last)) => self.reindex_ffill(&freq.calendar(*first, *last)),
            _ => self.clone(),
        }
    }

    /// Sum rows falling in each period, NaN counted as zero.
    pub fn resample_sum(&self, freq: Frequency) -> Frame {
        let (Some(first), Some(last)) = (self.index.first(), self.index.last()) else {
            return self.clone();
        };
        let calendar = freq.calendar(*first, *last);
        let mut values = vec![vec![0.0; self.n_cols()]; calendar.len()];
        for (date, row) in self.index.iter().zip(&self.values) {
            if let Ok(bucket) = calendar.binary_search(&freq.period_end(*date)) {
                for (acc, x) in values[bucket].iter_mut().zip(row) {
                    *acc += nan_to_zero(*x);
                }
            }
        }
        Frame::from_parts(calendar, self.columns.clone(), values)
    }
}
