//! Feature frames: the per-date technical snapshot that strategies score.
//!
//! [`compute_features`] turns an ordered price series into a parallel series
//! of [`FeatureFrame`]s. Each field is `None` until its trailing window has
//! enough history.

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::indicator::{
    bollinger, calculate_bollinger, calculate_macd, calculate_pct_change,
    calculate_rolling_return, calculate_rsi, calculate_sma, macd, rolling_sample_stddev, rsi,
};
use super::error::RotatorError;
use super::price::{InstrumentSeries, PricePoint};

/// Minimum observations before a series yields any frames.
pub const MIN_HISTORY: usize = 30;

const VOLATILITY_WINDOW: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct FeatureFrame {
    pub date: NaiveDate,
    pub close: f64,
    pub return_5: Option<f64>,
    pub return_10: Option<f64>,
    pub return_20: Option<f64>,
    pub ma5: Option<f64>,
    pub ma20: Option<f64>,
    pub ma60: Option<f64>,
    pub ma20_bias: Option<f64>,
    pub volatility: Option<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_lower: Option<f64>,
    pub bb_position: Option<f64>,
    pub trend: Option<u8>,
}

impl FeatureFrame {
    pub fn get(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::Return5 => self.return_5,
            Feature::Return10 => self.return_10,
            Feature::Return20 => self.return_20,
            Feature::Ma20Bias => self.ma20_bias,
            Feature::Volatility => self.volatility,
        }
    }
}

/// Features that can carry a weight in a linear scoring table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    #[serde(rename = "return_5")]
    Return5,
    #[serde(rename = "return_10")]
    Return10,
    #[serde(rename = "return_20")]
    Return20,
    #[serde(rename = "ma20_bias")]
    Ma20Bias,
    Volatility,
}

impl Feature {
    pub const ALL: [Feature; 5] = [
        Feature::Return5,
        Feature::Return10,
        Feature::Return20,
        Feature::Ma20Bias,
        Feature::Volatility,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Feature::Return5 => "return_5",
            Feature::Return10 => "return_10",
            Feature::Return20 => "return_20",
            Feature::Ma20Bias => "ma20_bias",
            Feature::Volatility => "volatility",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .into_iter()
            .find(|f| f.name() == s.trim())
            .ok_or_else(|| format!("unknown feature '{}'", s.trim()))
    }
}

/// Computes one frame per price point, or `None` when the series is shorter
/// than [`MIN_HISTORY`].
pub fn compute_features(prices: &[PricePoint]) -> Option<Vec<FeatureFrame>> {
    if prices.len() < MIN_HISTORY {
        return None;
    }

    let closes: Vec<f64> = prices.iter().map(|p| p.close).collect();

    let return_5 = calculate_rolling_return(&closes, 5);
    let return_10 = calculate_rolling_return(&closes, 10);
    let return_20 = calculate_rolling_return(&closes, 20);
    let ma5 = calculate_sma(&closes, 5);
    let ma20 = calculate_sma(&closes, 20);
    let ma60 = calculate_sma(&closes, 60);
    let volatility = rolling_sample_stddev(&calculate_pct_change(&closes), VOLATILITY_WINDOW);
    let rsi = calculate_rsi(&closes, rsi::DEFAULT_PERIOD);
    let macd = calculate_macd(
        &closes,
        macd::DEFAULT_FAST,
        macd::DEFAULT_SLOW,
        macd::DEFAULT_SIGNAL,
    );
    let bands = calculate_bollinger(
        &closes,
        bollinger::DEFAULT_PERIOD,
        bollinger::DEFAULT_MULTIPLIER,
    );

    let frames = prices
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let ma20_bias = ma20[i].filter(|m| *m != 0.0).map(|m| (p.close - m) / m);
            let trend = match (ma5[i], ma20[i], ma60[i]) {
                (Some(a), Some(b), Some(c)) => Some(u8::from(a > b && b > c)),
                _ => None,
            };
            let band = bands[i];
            FeatureFrame {
                date: p.date,
                close: p.close,
                return_5: return_5[i],
                return_10: return_10[i],
                return_20: return_20[i],
                ma5: ma5[i],
                ma20: ma20[i],
                ma60: ma60[i],
                ma20_bias,
                volatility: volatility[i],
                rsi: rsi[i],
                macd: macd[i].line,
                macd_signal: macd[i].signal,
                macd_histogram: macd[i].histogram,
                bb_middle: band.map(|b| b.middle),
                bb_upper: band.map(|b| b.upper),
                bb_lower: band.map(|b| b.lower),
                bb_position: band.map(|b| b.position),
                trend,
            }
        })
        .collect();

    Some(frames)
}

/// An instrument with its frames, one per price point.
#[derive(Debug, Clone)]
pub struct FeatureSet<'a> {
    pub series: &'a InstrumentSeries,
    pub frames: Vec<FeatureFrame>,
}

impl<'a> FeatureSet<'a> {
    /// Features for `series`; fails with `InsufficientHistory` below
    /// [`MIN_HISTORY`] observations.
    pub fn build(series: &'a InstrumentSeries) -> Result<Self, RotatorError> {
        compute_features(&series.prices)
            .map(|frames| FeatureSet { series, frames })
            .ok_or_else(|| RotatorError::InsufficientHistory {
                code: series.code().to_string(),
                observations: series.len(),
                minimum: MIN_HISTORY,
            })
    }

    /// Frames dated on or before `date`.
    pub fn frames_through(&self, date: chrono::NaiveDate) -> &[FeatureFrame] {
        let end = self.frames.partition_point(|f| f.date <= date);
        &self.frames[..end]
    }
}

/// An instrument left out of scoring, with the reason.
#[derive(Debug)]
pub struct SkippedSeries<'a> {
    pub series: &'a InstrumentSeries,
    pub error: RotatorError,
}

/// Computes features for every instrument on the rayon pool. Instruments with
/// insufficient history are returned in the second vector, input order kept.
pub fn compute_universe_features(
    universe: &[InstrumentSeries],
) -> (Vec<FeatureSet<'_>>, Vec<SkippedSeries<'_>>) {
    let computed: Vec<(&InstrumentSeries, Result<FeatureSet<'_>, RotatorError>)> = universe
        .par_iter()
        .map(|series| (series, FeatureSet::build(series)))
        .collect();

    let mut ready = Vec::with_capacity(computed.len());
    let mut skipped = Vec::new();
    for (series, built) in computed {
        match built {
            Ok(set) => ready.push(set),
            Err(error) => skipped.push(SkippedSeries { series, error }),
        }
    }
    (ready, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::price::Instrument;

    fn make_prices(closes: &[f64]) -> Vec<PricePoint> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PricePoint::new(start + chrono::Duration::days(i as i64), c, c))
            .collect()
    }

    fn rising(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    #[test]
    fn short_series_yields_nothing() {
        assert!(compute_features(&make_prices(&rising(29))).is_none());
        assert!(compute_features(&make_prices(&rising(30))).is_some());
    }

    #[test]
    fn frames_parallel_the_input() {
        let prices = make_prices(&rising(45));
        let frames = compute_features(&prices).unwrap();
        assert_eq!(frames.len(), 45);
        assert_eq!(frames[10].date, prices[10].date);
    }

    #[test]
    fn windows_are_absent_until_filled() {
        let frames = compute_features(&make_prices(&rising(70))).unwrap();
        assert!(frames[4].return_5.is_none());
        assert!(frames[5].return_5.is_some());
        assert!(frames[18].ma20.is_none());
        assert!(frames[19].ma20.is_some());
        assert!(frames[19].volatility.is_none());
        assert!(frames[20].volatility.is_some());
        assert!(frames[58].trend.is_none());
        assert!(frames[59].trend.is_some());
    }

    #[test]
    fn bias_matches_definition() {
        let frames = compute_features(&make_prices(&rising(40))).unwrap();
        let f = frames[39];
        let ma20 = f.ma20.unwrap();
        assert!((f.ma20_bias.unwrap() - (f.close - ma20) / ma20).abs() < 1e-12);
    }

    #[test]
    fn uptrend_sets_trend_flag() {
        let frames = compute_features(&make_prices(&rising(70))).unwrap();
        assert_eq!(frames[69].trend, Some(1));
        let falling: Vec<f64> = (0..70).map(|i| 200.0 - i as f64).collect();
        let frames = compute_features(&make_prices(&falling)).unwrap();
        assert_eq!(frames[69].trend, Some(0));
    }

    #[test]
    fn rsi_of_monotonic_rise_is_full_strength() {
        let frames = compute_features(&make_prices(&rising(40))).unwrap();
        assert_eq!(frames[39].rsi, Some(100.0));
    }

    #[test]
    fn feature_names_round_trip() {
        for f in Feature::ALL {
            assert_eq!(f.name().parse::<Feature>().unwrap(), f);
        }
        assert!("momentum".parse::<Feature>().is_err());
    }

    #[test]
    fn universe_split_keeps_order() {
        let universe = vec![
            InstrumentSeries::new(Instrument::new("A", "A"), make_prices(&rising(40))),
            InstrumentSeries::new(Instrument::new("B", "B"), make_prices(&rising(10))),
            InstrumentSeries::new(Instrument::new("C", "C"), make_prices(&rising(40))),
        ];
        let (ready, skipped) = compute_universe_features(&universe);
        let codes: Vec<&str> = ready.iter().map(|f| f.series.code()).collect();
        assert_eq!(codes, vec!["A", "C"]);
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].series.code(), "B");
    }

    #[test]
    fn short_series_reports_insufficient_history() {
        let series = InstrumentSeries::new(Instrument::new("B", "B"), make_prices(&rising(12)));
        match FeatureSet::build(&series) {
            Err(RotatorError::InsufficientHistory {
                code,
                observations,
                minimum,
            }) => {
                assert_eq!(code, "B");
                assert_eq!(observations, 12);
                assert_eq!(minimum, MIN_HISTORY);
            }
            other => panic!("expected insufficient history, got {:?}", other.map(|s| s.frames.len())),
        }
    }
}
