//! Bollinger Bands indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//! - Position: (close - lower) / (upper - lower)
//!
//! StdDev is the sample standard deviation (divides by N-1). A zero-width band
//! is floored at `BAND_WIDTH_EPSILON` so position stays finite.
//!
//! Default parameters: period=20, multiplier=2.0
//! Warmup: first (period-1) entries are absent.

use super::stddev::sample_stddev;

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_MULTIPLIER: f64 = 2.0;
pub const BAND_WIDTH_EPSILON: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerPoint {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub position: f64,
}

pub fn calculate_bollinger(
    closes: &[f64],
    period: usize,
    multiplier: f64,
) -> Vec<Option<BollingerPoint>> {
    let mut values = Vec::with_capacity(closes.len());

    for i in 0..closes.len() {
        if period < 2 || i + 1 < period {
            values.push(None);
            continue;
        }
        let window = &closes[i + 1 - period..=i];
        let middle = window.iter().sum::<f64>() / period as f64;
        let stddev = sample_stddev(window).unwrap_or(0.0);
        let upper = middle + multiplier * stddev;
        let lower = middle - multiplier * stddev;
        let width = (upper - lower).max(BAND_WIDTH_EPSILON);

        values.push(Some(BollingerPoint {
            upper,
            middle,
            lower,
            position: (closes[i] - lower) / width,
        }));
    }

    values
}
