//! Return-series risk statistics.
//!
//! Provides volatility, Sharpe ratio, Sortino ratio, max drawdown and the
//! dispersion measure behind P&L risk attribution.

/// Population standard deviation of the non-NaN values; NaN when there are none.
pub fn nan_std(values: &[f64]) -> f64 {
    let observed: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if observed.is_empty() {
        return f64::NAN;
    }
    let n = observed.len() as f64;
    let mean = observed.iter().sum::<f64>() / n;
    let variance = observed.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// Calculate maximum drawdown from a series of returns.
///
/// Returns the maximum peak-to-trough decline as a decimal (e.g., 0.15 for 15% drawdown).
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let mut cum = 1.0;
    let mut running_max = 1.0;
    let mut max_drawdown = 0.0;

    for r in returns {
        cum *= 1.0 + r;
        if cum > running_max {
            running_max = cum;
        }
        let drawdown = (running_max - cum) / running_max;
        if drawdown > max_drawdown {
            max_drawdown = drawdown;
        }
    }

    max_drawdown
}

/// Calculate annualized Sharpe ratio from per-period returns.
///
/// # Arguments
///
/// * `returns` - Per-period returns
/// * `risk_free_rate` - Annual risk-free rate
/// * `periods_per_year` - Return periods in a year (252 for daily)
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64, periods_per_year: usize) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let std = nan_std(returns);

    if std <= 0.0 {
        return 0.0;
    }

    let ppy = periods_per_year as f64;
    (mean - risk_free_rate / ppy) / std * ppy.sqrt()
}

/// Calculate annualized Sortino ratio from per-period returns.
pub fn sortino_ratio(returns: &[f64], risk_free_rate: f64, periods_per_year: usize) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;

    let downside: Vec<f64> = returns.iter().filter(|&&r| r < 0.0).copied().collect();
    if downside.is_empty() {
        return f64::INFINITY; // No downside = infinite Sortino
    }
    let downside_std =
        (downside.iter().map(|r| r.powi(2)).sum::<f64>() / downside.len() as f64).sqrt();
    if downside_std <= 0.0 {
        return f64::INFINITY;
    }

    let ppy = periods_per_year as f64;
    (mean - risk_free_rate / ppy) / downside_std * ppy.sqrt()
}

/// Calculate annualized volatility from per-period returns.
pub fn volatility(returns: &[f64], periods_per_year: usize) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    nan_std(returns) * (periods_per_year as f64).sqrt()
}
