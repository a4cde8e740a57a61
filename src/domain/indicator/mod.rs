//! Technical indicator implementations over closing-price series.
//!
//! Every calculator returns one entry per input price. Entries whose trailing
//! window is not yet filled are `None`: an undefined indicator is absent,
//! never zero.

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod stddev;

pub use bollinger::{BollingerPoint, calculate_bollinger};
pub use ema::calculate_ema;
pub use macd::{MacdPoint, calculate_macd};
pub use rsi::calculate_rsi;
pub use stddev::{rolling_sample_stddev, sample_stddev};

/// A per-observation indicator series; `None` during warmup.
pub type IndicatorSeries = Vec<Option<f64>>;

/// Simple moving average.
/// SMA(n)[i] = mean(C[i-n+1..=i]). Warmup: first (n-1) entries are `None`.
pub fn calculate_sma(closes: &[f64], period: usize) -> IndicatorSeries {
    if period == 0 {
        return vec![None; closes.len()];
    }
    let mut values = Vec::with_capacity(closes.len());
    let mut sum = 0.0;
    for (i, &close) in closes.iter().enumerate() {
        sum += close;
        if i >= period {
            sum -= closes[i - period];
        }
        if i + 1 >= period {
            values.push(Some(sum / period as f64));
        } else {
            values.push(None);
        }
    }
    values
}

/// Rolling return: C[i] / C[i-n] - 1. Undefined for i < n.
pub fn calculate_rolling_return(closes: &[f64], window: usize) -> IndicatorSeries {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            if window == 0 || i < window {
                return None;
            }
            let base = closes[i - window];
            if base > 0.0 {
                Some(close / base - 1.0)
            } else {
                None
            }
        })
        .collect()
}

/// Daily percent change; the first entry is `None`.
pub fn calculate_pct_change(closes: &[f64]) -> IndicatorSeries {
    calculate_rolling_return(closes, 1)
}
