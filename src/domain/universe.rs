//! Instrument catalogue and universe loading.
//!
//! Parses code and name lists from configuration and loads each instrument's
//! history through a [`DataPort`], skipping codes that cannot be used.

use crate::domain::error::RotatorError;
use crate::domain::feature::MIN_HISTORY;
use crate::domain::price::{Instrument, InstrumentSeries};
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::{info, warn};

pub const DEFAULT_BENCHMARK: &str = "510300";

/// Display name of the cash sentinel.
pub const CASH_NAME: &str = "Cash (money market)";

const DEFAULT_INSTRUMENTS: [(&str, &str); 10] = [
    ("510300", "CSI 300 ETF"),
    ("510500", "CSI 500 ETF"),
    ("159915", "ChiNext ETF"),
    ("588000", "STAR 50 ETF"),
    ("512880", "Securities ETF"),
    ("515030", "New Energy Vehicle ETF"),
    ("512480", "Semiconductor ETF"),
    ("512690", "Liquor ETF"),
    ("512170", "Healthcare ETF"),
    ("518880", "Gold ETF"),
];

#[derive(Debug, Clone, PartialEq)]
pub struct Universe {
    pub instruments: Vec<Instrument>,
    pub benchmark: Option<Instrument>,
}

impl Universe {
    /// The ten-fund default catalogue benchmarked against the CSI 300 fund.
    pub fn default_etfs() -> Self {
        let instruments: Vec<Instrument> = DEFAULT_INSTRUMENTS
            .iter()
            .map(|(code, name)| Instrument::new(*code, *name))
            .collect();
        let benchmark = instruments
            .iter()
            .find(|i| i.code == DEFAULT_BENCHMARK)
            .cloned();
        Universe {
            instruments,
            benchmark,
        }
    }

    /// Builds a universe from codes and optional names. Codes without a
    /// supplied name fall back to the default catalogue, then to the code.
    pub fn from_codes(
        codes: Vec<String>,
        names: Option<Vec<String>>,
        benchmark: Option<String>,
    ) -> Result<Self, UniverseError> {
        if let Some(names) = &names {
            if names.len() != codes.len() {
                return Err(UniverseError::NameCountMismatch {
                    codes: codes.len(),
                    names: names.len(),
                });
            }
        }
        let instruments: Vec<Instrument> = codes
            .into_iter()
            .enumerate()
            .map(|(i, code)| {
                let name = names
                    .as_ref()
                    .map(|n| n[i].clone())
                    .unwrap_or_else(|| default_name(&code));
                Instrument::new(code, name)
            })
            .collect();
        let benchmark = benchmark.map(|code| {
            instruments
                .iter()
                .find(|i| i.code == code)
                .cloned()
                .unwrap_or_else(|| {
                    let name = default_name(&code);
                    Instrument::new(code, name)
                })
        });
        Ok(Universe {
            instruments,
            benchmark,
        })
    }

    pub fn count(&self) -> usize {
        self.instruments.len()
    }

    pub fn name_of(&self, code: &str) -> Option<&str> {
        self.instruments
            .iter()
            .find(|i| i.code == code)
            .map(|i| i.name.as_str())
    }
}

fn default_name(code: &str) -> String {
    DEFAULT_INSTRUMENTS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| code.to_string())
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in code list")]
    EmptyToken,

    #[error("duplicate code: {0}")]
    DuplicateCode(String),

    #[error("{codes} codes but {names} names")]
    NameCountMismatch { codes: usize, names: usize },
}

pub fn parse_codes(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut codes = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let code = trimmed.to_uppercase();
        if !seen.insert(code.clone()) {
            return Err(UniverseError::DuplicateCode(code));
        }
        codes.push(code);
    }

    Ok(codes)
}

pub fn parse_names(input: &str) -> Result<Vec<String>, UniverseError> {
    input
        .split(',')
        .map(|token| {
            let trimmed = token.trim();
            if trimmed.is_empty() {
                Err(UniverseError::EmptyToken)
            } else {
                Ok(trimmed.to_string())
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoData(String),
    InsufficientHistory { observations: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedCode {
    pub code: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone)]
pub struct LoadedUniverse {
    pub series: Vec<InstrumentSeries>,
    pub benchmark: Option<InstrumentSeries>,
    pub skipped: Vec<SkippedCode>,
}

impl LoadedUniverse {
    /// Latest date present in any loaded instrument series.
    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.series
            .iter()
            .filter_map(|s| s.last().map(|p| p.date))
            .max()
    }
}

/// Loads every instrument and the benchmark over `[start_date, end_date]`.
/// Fetch failures and short histories are logged and skipped, never fatal.
pub fn load_universe(
    data_port: &dyn DataPort,
    universe: &Universe,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> LoadedUniverse {
    let mut series = Vec::new();
    let mut skipped = Vec::new();

    for instrument in &universe.instruments {
        let prices = match data_port.fetch_prices(&instrument.code, start_date, end_date) {
            Ok(prices) => prices,
            Err(e) => {
                warn!(code = instrument.code.as_str(), error = %e, "skipping instrument");
                skipped.push(SkippedCode {
                    code: instrument.code.clone(),
                    reason: SkipReason::NoData(e.to_string()),
                });
                continue;
            }
        };

        if prices.len() < MIN_HISTORY {
            warn!(
                code = instrument.code.as_str(),
                observations = prices.len(),
                minimum = MIN_HISTORY,
                "skipping instrument with insufficient history"
            );
            skipped.push(SkippedCode {
                code: instrument.code.clone(),
                reason: SkipReason::InsufficientHistory {
                    observations: prices.len(),
                },
            });
            continue;
        }

        info!(code = instrument.code.as_str(), observations = prices.len(), "loaded");
        series.push(InstrumentSeries::new(instrument.clone(), prices));
    }

    let benchmark = universe.benchmark.as_ref().and_then(|bench| {
        if let Some(loaded) = series.iter().find(|s| s.code() == bench.code) {
            return Some(loaded.clone());
        }
        match data_port.fetch_prices(&bench.code, start_date, end_date) {
            Ok(prices) if !prices.is_empty() => {
                Some(InstrumentSeries::new(bench.clone(), prices))
            }
            Ok(_) => {
                warn!(code = bench.code.as_str(), "benchmark has no data, bear check disabled");
                None
            }
            Err(e) => {
                warn!(code = bench.code.as_str(), error = %e, "benchmark unavailable, bear check disabled");
                None
            }
        }
    });

    if !skipped.is_empty() {
        info!(
            loaded = series.len(),
            requested = universe.count(),
            "universe loaded with skips"
        );
    }

    LoadedUniverse {
        series,
        benchmark,
        skipped,
    }
}
