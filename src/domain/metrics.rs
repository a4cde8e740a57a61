//! Performance metrics over a finished run's NAV history.

use chrono::NaiveDate;
use serde::Serialize;

use super::backtest::{NavPoint, TRADING_DAYS_PER_YEAR, TradeAction, TradeRecord};
use super::rounding::round2;

/// All percentages are in percent units and rounded to two decimals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestMetrics {
    pub total_return: f64,
    pub annual_return: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub trade_count: usize,
    pub cash_ratio: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub final_nav: f64,
    pub initial_capital: f64,
}

impl BacktestMetrics {
    /// `None` when fewer than two NAV points exist.
    pub fn compute(
        nav_history: &[NavPoint],
        trades: &[TradeRecord],
        initial_capital: f64,
        risk_free_rate: f64,
    ) -> Option<Self> {
        if nav_history.len() < 2 {
            return None;
        }
        let first = nav_history.first()?;
        let last = nav_history.last()?;

        let total_return = if initial_capital > 0.0 {
            (last.nav / initial_capital - 1.0) * 100.0
        } else {
            0.0
        };

        let days = nav_history.len() as f64;
        let growth = 1.0 + total_return / 100.0;
        let annual_return = if growth > 0.0 {
            (growth.powf(TRADING_DAYS_PER_YEAR / days) - 1.0) * 100.0
        } else {
            -100.0
        };

        let navs: Vec<f64> = nav_history.iter().map(|p| p.nav).collect();
        let cash_days = nav_history.iter().filter(|p| p.holding.is_flat()).count();

        Some(BacktestMetrics {
            total_return: round2(total_return),
            annual_return: round2(annual_return),
            max_drawdown: round2(max_drawdown_pct(&navs)),
            sharpe_ratio: round2(sharpe_ratio(&navs, risk_free_rate)),
            trade_count: trades
                .iter()
                .filter(|t| t.action == TradeAction::Buy)
                .count(),
            cash_ratio: round2(cash_days as f64 / days * 100.0),
            start_date: first.date,
            end_date: last.date,
            final_nav: round2(last.nav),
            initial_capital,
        })
    }
}

/// Deepest fall from the running peak, in percent (zero or negative).
pub fn max_drawdown_pct(navs: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &nav in navs {
        peak = peak.max(nav);
        if peak > 0.0 {
            worst = worst.min((nav - peak) / peak * 100.0);
        }
    }
    worst
}

/// Annualized Sharpe ratio of daily NAV returns using the sample standard
/// deviation. Zero with fewer than two returns or zero variance.
pub fn sharpe_ratio(navs: &[f64], risk_free_rate: f64) -> f64 {
    let returns: Vec<f64> = navs
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let stddev = variance.sqrt();
    if stddev <= 0.0 || !stddev.is_finite() {
        return 0.0;
    }

    (mean * TRADING_DAYS_PER_YEAR - risk_free_rate) / (stddev * TRADING_DAYS_PER_YEAR.sqrt())
}
