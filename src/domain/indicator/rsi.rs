//! RSI (Relative Strength Index) indicator.
//!
//! Simple rolling averages of gains and losses over the last n price changes:
//! - gain = max(change, 0), loss = max(-change, 0)
//! - avg_gain / avg_loss = arithmetic mean over the trailing n changes
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Warmup: first n entries are absent (need n price changes).

use super::IndicatorSeries;

pub const DEFAULT_PERIOD: usize = 14;

pub fn calculate_rsi(closes: &[f64], period: usize) -> IndicatorSeries {
    if period == 0 || closes.len() < 2 {
        return vec![None; closes.len()];
    }

    let mut gains = Vec::with_capacity(closes.len() - 1);
    let mut losses = Vec::with_capacity(closes.len() - 1);
    for w in closes.windows(2) {
        let change = w[1] - w[0];
        gains.push(change.max(0.0));
        losses.push((-change).max(0.0));
    }

    let mut out = Vec::with_capacity(closes.len());
    out.push(None);

    for i in 1..closes.len() {
        // change index i-1 is the change into bar i
        if i < period {
            out.push(None);
            continue;
        }
        let start = i - period;
        let avg_gain = gains[start..i].iter().sum::<f64>() / period as f64;
        let avg_loss = losses[start..i].iter().sum::<f64>() / period as f64;
        out.push(Some(rsi_from_averages(avg_gain, avg_loss)));
    }

    out
}

/// RSI from average gain/loss, with zero average loss mapped to full strength.
pub fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}
