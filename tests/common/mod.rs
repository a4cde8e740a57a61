#![allow(dead_code)]

use chrono::NaiveDate;
use etfrotator::domain::backtest::BacktestConfig;
use etfrotator::domain::error::RotatorError;
use etfrotator::domain::price::{Instrument, InstrumentSeries, PricePoint};
use etfrotator::ports::data_port::DataPort;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<PricePoint>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_prices(mut self, code: &str, prices: Vec<PricePoint>) -> Self {
        self.data.insert(code.to_string(), prices);
        self
    }

    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_prices(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PricePoint>, RotatorError> {
        if let Some(reason) = self.errors.get(code) {
            return Err(RotatorError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(code)
            .map(|prices| {
                prices
                    .iter()
                    .filter(|p| p.date >= start_date && p.date <= end_date)
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_symbols(&self) -> Result<Vec<String>, RotatorError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        code: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, RotatorError> {
        if let Some(reason) = self.errors.get(code) {
            return Err(RotatorError::Data {
                reason: reason.clone(),
            });
        }
        match self.data.get(code) {
            Some(prices) if !prices.is_empty() => {
                let min = prices.iter().map(|p| p.date).min().unwrap();
                let max = prices.iter().map(|p| p.date).max().unwrap();
                Ok(Some((min, max, prices.len())))
            }
            _ => Ok(None),
        }
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// First date of every generated series.
pub fn series_start() -> NaiveDate {
    date(2024, 1, 1)
}

/// Daily points from [`series_start`]; open equals close.
pub fn make_prices(closes: &[f64]) -> Vec<PricePoint> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| PricePoint::new(series_start() + chrono::Duration::days(i as i64), c, c))
        .collect()
}

pub fn make_series(code: &str, closes: &[f64]) -> InstrumentSeries {
    InstrumentSeries::new(Instrument::new(code, format!("{} fund", code)), make_prices(closes))
}

/// `n` closes compounding at `daily` from `base`.
pub fn geometric(n: usize, base: f64, daily: f64) -> Vec<f64> {
    (0..n).map(|i| base * (1.0 + daily).powi(i as i32)).collect()
}

/// Flat at `base` for `flat_days`, then compounding at `daily`.
pub fn flat_then_rising(n: usize, base: f64, flat_days: usize, daily: f64) -> Vec<f64> {
    (0..n)
        .map(|i| base * (1.0 + daily).powi(i.saturating_sub(flat_days) as i32))
        .collect()
}

/// Compounding at `daily` for `rising_days`, then flat.
pub fn rising_then_flat(n: usize, base: f64, rising_days: usize, daily: f64) -> Vec<f64> {
    (0..n)
        .map(|i| base * (1.0 + daily).powi(i.min(rising_days) as i32))
        .collect()
}

/// One rising leader and four flat instruments.
pub fn leader_universe(n: usize) -> Vec<InstrumentSeries> {
    let mut universe = vec![make_series("A", &geometric(n, 10.0, 0.01))];
    for code in ["B", "C", "D", "E"] {
        universe.push(make_series(code, &vec![10.0; n]));
    }
    universe
}

/// Five instruments all falling two percent a day.
pub fn falling_universe(n: usize) -> Vec<InstrumentSeries> {
    ["A", "B", "C", "D", "E"]
        .iter()
        .map(|c| make_series(c, &geometric(n, 20.0, -0.02)))
        .collect()
}

/// Backtest starting `offset` days after [`series_start`].
pub fn config_from(offset: i64) -> BacktestConfig {
    BacktestConfig::new(series_start() + chrono::Duration::days(offset))
}
