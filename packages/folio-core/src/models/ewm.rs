//! Exponentially weighted linear factor model.
//!
//! Asset returns `y` are regressed on factor returns `x` date by date using
//! uncentred EWM second moments:
//!
//! ```text
//! Sxx(t) = lambda * Sxx(t-1) + (1 - lambda) * x(t) x(t)'
//! Sxy(t) = lambda * Sxy(t-1) + (1 - lambda) * x(t) y(t)'
//! beta(t) = Sxx(t)^-1 Sxy(t)
//! ```
//!
//! with `lambda = 1 - 2 / (span + 1)` and both moments starting at zero.

use crate::frame::{nan_to_zero, Frame};
use crate::{Error, Result};
use chrono::NaiveDate;
use nalgebra::{DMatrix, DVector};
use tracing::debug;

/// Time series of factor betas, one `factors × assets` matrix per date.
#[derive(Debug, Clone)]
pub struct EwmLinearModel {
    index: Vec<NaiveDate>,
    factors: Vec<String>,
    assets: Vec<String>,
    betas: Vec<DMatrix<f64>>,
}

impl EwmLinearModel {
    /// Estimate betas of every column of `y` on the columns of `x`.
    ///
    /// With `is_x_correlated` the full factor second-moment matrix is
    /// inverted; otherwise each factor is regressed on its own. Singular or
    /// near-singular moments give NaN betas. NaN returns count as zero.
    pub fn estimate(x: &Frame, y: &Frame, span: usize, is_x_correlated: bool) -> Result<Self> {
        if span == 0 {
            return Err(Error::InvalidOperation(
                "ewm span must be at least 1".to_string(),
            ));
        }
        if x.n_cols() == 0 {
            return Err(Error::Shape("no factor returns to regress on".to_string()));
        }
        if x.index() != y.index() {
            return Err(Error::Misaligned(format!(
                "factor returns have {} rows, asset returns {}",
                x.n_rows(),
                y.n_rows()
            )));
        }

        let lambda = 1.0 - 2.0 / (span as f64 + 1.0);
        let (k, n) = (x.n_cols(), y.n_cols());
        let mut sxx = DMatrix::<f64>::zeros(k, k);
        let mut sxy = DMatrix::<f64>::zeros(k, n);
        let mut betas = Vec::with_capacity(x.n_rows());

        for t in 0..x.n_rows() {
            let xt = DVector::from_iterator(k, x.row(t).iter().copied().map(nan_to_zero));
            let yt = DVector::from_iterator(n, y.row(t).iter().copied().map(nan_to_zero));
            sxx = sxx * lambda + (&xt * xt.transpose()) * (1.0 - lambda);
            sxy = sxy * lambda + (&xt * yt.transpose()) * (1.0 - lambda);
            betas.push(solve(&sxx, &sxy, is_x_correlated));
        }

        debug!(factors = k, assets = n, rows = betas.len(), span, "estimated ewm betas");
        Ok(Self {
            index: x.index().to_vec(),
            factors: x.columns().to_vec(),
            assets: y.columns().to_vec(),
            betas,
        })
    }

    pub fn index(&self) -> &[NaiveDate] {
        &self.index
    }

    pub fn factors(&self) -> &[String] {
        &self.factors
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    /// Betas of every asset to `factor` over time.
    pub fn asset_betas(&self, factor: &str) -> Result<Frame> {
        let f = self
            .factors
            .iter()
            .position(|c| c == factor)
            .ok_or_else(|| Error::UnknownInstrument(factor.to_string()))?;
        let values = self
            .betas
            .iter()
            .map(|beta| beta.row(f).iter().copied().collect())
            .collect();
        Ok(Frame::from_parts(
            self.index.clone(),
            self.assets.clone(),
            values,
        ))
    }

    /// Factor exposures of a book holding `asset_exposures`: for each factor,
    /// the NaN-skipping sum of exposure times beta across assets.
    pub fn factor_exposures(&self, asset_exposures: &Frame) -> Result<Frame> {
        if asset_exposures.index() != self.index.as_slice()
            || asset_exposures.columns() != self.assets.as_slice()
        {
            return Err(Error::Misaligned(
                "asset exposures must share the model's index and assets".to_string(),
            ));
        }
        let values = self
            .betas
            .iter()
            .enumerate()
            .map(|(t, beta)| {
                let weights = asset_exposures.row(t);
                (0..self.factors.len())
                    .map(|f| {
                        weights
                            .iter()
                            .zip(beta.row(f).iter())
                            .map(|(w, b)| nan_to_zero(w * b))
                            .sum()
                    })
                    .collect()
            })
            .collect();
        Ok(Frame::from_parts(
            self.index.clone(),
            self.factors.clone(),
            values,
        ))
    }
}

/// Moments whose determinant is this small relative to the product of their
/// diagonal are treated as singular.
const SINGULAR_TOLERANCE: f64 = 1e-10;

fn is_singular(sxx: &DMatrix<f64>) -> bool {
    let scale: f64 = sxx.diagonal().iter().product();
    scale.is_nan() || scale <= 0.0 || sxx.determinant().abs() <= SINGULAR_TOLERANCE * scale
}

fn solve(sxx: &DMatrix<f64>, sxy: &DMatrix<f64>, is_x_correlated: bool) -> DMatrix<f64> {
    let (k, n) = sxy.shape();
    if is_x_correlated {
        let inverse = if is_singular(sxx) {
            None
        } else {
            sxx.clone().try_inverse()
        };
        match inverse {
            Some(inverse) => inverse * sxy,
            None => DMatrix::from_element(k, n, f64::NAN),
        }
    } else {
        DMatrix::from_fn(k, n, |f, a| {
            let variance = sxx[(f, f)];
            if variance > 0.0 {
                sxy[(f, a)] / variance
            } else {
                f64::NAN
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn dates(n: u32) -> Vec<NaiveDate> {
        (1..=n)
            .map(|d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap())
            .collect()
    }

    fn frame(columns: &[&str], rows: Vec<Vec<f64>>) -> Frame {
        Frame::new(
            dates(rows.len() as u32),
            columns.iter().map(|c| c.to_string()).collect(),
            rows,
        )
        .unwrap()
    }

    #[test]
    fn test_single_factor_beta() {
        let x = frame(&["SPX"], vec![vec![f64::NAN], vec![0.01], vec![-0.02], vec![0.03]]);
        let y = x.map(|r| 2.0 * r);
        let model = EwmLinearModel::estimate(&x, &y, 10, true).unwrap();
        let betas = model.asset_betas("SPX").unwrap();
        assert!(betas.get(0, 0).is_nan());
        for t in 1..4 {
            assert_relative_eq!(betas.get(t, 0), 2.0, epsilon = 1e-12);
        }

        let diagonal = EwmLinearModel::estimate(&x, &y, 10, false).unwrap();
        assert_relative_eq!(
            diagonal.asset_betas("SPX").unwrap().get(3, 0),
            2.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_two_factor_betas() {
        let x = frame(
            &["A", "B"],
            vec![vec![0.01, 0.0], vec![0.0, 0.02], vec![0.01, -0.01]],
        );
        let y = frame(
            &["asset"],
            (0..3)
                .map(|t| vec![1.0 * x.get(t, 0) + 3.0 * x.get(t, 1)])
                .collect(),
        );
        let model = EwmLinearModel::estimate(&x, &y, 5, true).unwrap();
        // one observation cannot separate two factors
        assert!(model.asset_betas("A").unwrap().get(0, 0).is_nan());
        assert_relative_eq!(model.asset_betas("A").unwrap().get(2, 0), 1.0, epsilon = 1e-9);
        assert_relative_eq!(model.asset_betas("B").unwrap().get(2, 0), 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_factor_exposures() {
        let x = frame(&["SPX"], vec![vec![0.01], vec![0.02]]);
        let y = frame(&["a", "b"], vec![vec![0.01, 0.02], vec![0.02, 0.04]]);
        let model = EwmLinearModel::estimate(&x, &y, 3, true).unwrap();
        let weights = frame(&["a", "b"], vec![vec![0.5, 0.25], vec![1.0, f64::NAN]]);
        let exposures = model.factor_exposures(&weights).unwrap();
        assert_eq!(exposures.columns(), &["SPX"]);
        assert_relative_eq!(exposures.get(0, 0), 0.5 + 0.5, epsilon = 1e-12);
        assert_relative_eq!(exposures.get(1, 0), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let x = frame(&["SPX"], vec![vec![0.01], vec![0.02]]);
        let y = frame(&["a"], vec![vec![0.01]]);
        assert!(matches!(
            EwmLinearModel::estimate(&x, &y, 3, true),
            Err(Error::Misaligned(_))
        ));
        assert!(matches!(
            EwmLinearModel::estimate(&x, &x, 0, true),
            Err(Error::InvalidOperation(_))
        ));
        let model = EwmLinearModel::estimate(&x, &x, 3, true).unwrap();
        assert!(matches!(
            model.asset_betas("NDX"),
            Err(Error::UnknownInstrument(_))
        ));
    }
}
