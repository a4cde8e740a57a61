//! Price points, instrument series and the shared trading calendar.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// One instrument's open/close on one trading day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub open: f64,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, open: f64, close: f64) -> Self {
        Self { date, open, close }
    }

    /// A point is usable when both prices are finite and close is positive.
    pub fn is_valid(&self) -> bool {
        self.open.is_finite() && self.close.is_finite() && self.close > 0.0
    }
}

/// A tradable instrument: exchange code plus display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    pub code: String,
    pub name: String,
}

impl Instrument {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }
}

/// An instrument with its ordered price history.
#[derive(Debug, Clone)]
pub struct InstrumentSeries {
    pub instrument: Instrument,
    pub prices: Vec<PricePoint>,
    date_index: HashMap<NaiveDate, usize>,
}

impl InstrumentSeries {
    /// Builds a series, sorting by date and keeping the first point seen for
    /// any duplicated date.
    pub fn new(instrument: Instrument, mut prices: Vec<PricePoint>) -> Self {
        prices.sort_by_key(|p| p.date);
        prices.dedup_by_key(|p| p.date);
        let date_index = prices
            .iter()
            .enumerate()
            .map(|(i, p)| (p.date, i))
            .collect();
        Self {
            instrument,
            prices,
            date_index,
        }
    }

    pub fn code(&self) -> &str {
        &self.instrument.code
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.date_index.get(&date).copied()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&PricePoint> {
        self.index_of(date).map(|i| &self.prices[i])
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.prices.last()
    }

    /// Every point dated on or before `date`.
    pub fn up_to(&self, date: NaiveDate) -> &[PricePoint] {
        let end = self.prices.partition_point(|p| p.date <= date);
        &self.prices[..end]
    }
}

/// Trailing return over `window` observations ending at the last point.
/// Requires more than `window` points.
pub fn trailing_return(prices: &[PricePoint], window: usize) -> Option<f64> {
    if window == 0 || prices.len() <= window {
        return None;
    }
    let last = prices[prices.len() - 1].close;
    let base = prices[prices.len() - 1 - window].close;
    if base > 0.0 {
        Some(last / base - 1.0)
    } else {
        None
    }
}

/// Dates present in every series, ascending.
pub fn common_dates<'a, I>(series: I) -> Vec<NaiveDate>
where
    I: IntoIterator<Item = &'a [PricePoint]>,
{
    let mut common: Option<BTreeSet<NaiveDate>> = None;
    for prices in series {
        let dates: BTreeSet<NaiveDate> = prices.iter().map(|p| p.date).collect();
        common = Some(match common {
            None => dates,
            Some(acc) => acc.intersection(&dates).copied().collect(),
        });
    }
    common.map(|c| c.into_iter().collect()).unwrap_or_default()
}
