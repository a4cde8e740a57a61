//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9
//! The line is defined from index slow-1; signal and histogram from
//! slow-1 + signal-1.

use super::calculate_ema;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

/// One MACD observation. `signal` and `histogram` stay absent until the
/// signal EMA has been seeded.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MacdPoint {
    pub line: Option<f64>,
    pub signal: Option<f64>,
    pub histogram: Option<f64>,
}

pub fn calculate_macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Vec<MacdPoint> {
    if fast == 0 || slow == 0 || signal_period == 0 {
        return vec![MacdPoint::default(); closes.len()];
    }

    let ema_fast = calculate_ema(closes, fast);
    let ema_slow = calculate_ema(closes, slow);

    let line: Vec<Option<f64>> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    // Signal EMA runs over the defined part of the line only.
    let first_defined = line.iter().position(Option::is_some);
    let mut signal: Vec<Option<f64>> = vec![None; closes.len()];
    if let Some(start) = first_defined {
        let defined: Vec<f64> = line[start..].iter().map(|v| v.unwrap_or(0.0)).collect();
        for (offset, value) in calculate_ema(&defined, signal_period).into_iter().enumerate() {
            signal[start + offset] = value;
        }
    }

    line.into_iter()
        .zip(signal)
        .map(|(line, signal)| MacdPoint {
            line,
            signal,
            histogram: match (line, signal) {
                (Some(l), Some(s)) => Some(l - s),
                _ => None,
            },
        })
        .collect()
}

pub fn calculate_macd_default(closes: &[f64]) -> Vec<MacdPoint> {
    calculate_macd(closes, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rising(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    #[test]
    fn macd_warmup_default() {
        let series = calculate_macd_default(&rising(40));
        let line_warmup = DEFAULT_SLOW - 1;
        let signal_warmup = DEFAULT_SLOW - 1 + DEFAULT_SIGNAL - 1;

        assert!(series[line_warmup - 1].line.is_none());
        assert!(series[line_warmup].line.is_some());
        assert!(series[signal_warmup - 1].signal.is_none());
        assert!(series[signal_warmup].signal.is_some());
        assert!(series[signal_warmup].histogram.is_some());
    }

    #[test]
    fn macd_positive_in_uptrend() {
        let series = calculate_macd_default(&rising(60));
        let last = series.last().unwrap();
        assert!(last.line.unwrap() > 0.0);
    }

    #[test]
    fn histogram_is_line_minus_signal() {
        let closes: Vec<f64> = (0..60)
            .map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0)
            .collect();
        for p in calculate_macd_default(&closes) {
            if let (Some(l), Some(s), Some(h)) = (p.line, p.signal, p.histogram) {
                assert!((h - (l - s)).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn macd_constant_prices_is_zero() {
        let series = calculate_macd(&[10.0; 20], 3, 6, 3);
        let last = series.last().unwrap();
        assert!(last.line.unwrap().abs() < 1e-12);
        assert!(last.histogram.unwrap().abs() < 1e-12);
    }

    #[test]
    fn macd_short_series_all_absent() {
        let series = calculate_macd_default(&rising(10));
        assert!(series.iter().all(|p| p.line.is_none() && p.signal.is_none()));
    }
}
