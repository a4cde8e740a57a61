//! Scoring model: feature frames to a bounded score, and the cash decision.
//!
//! Every strategy starts from [`NEUTRAL_SCORE`] and is clipped to [0, 100] and
//! rounded to two decimals. Dispatch is by [`StrategyKind`]; each branch reads
//! its numbers from the [`StrategyConfig`] preset or override.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use super::feature::{Feature, FeatureFrame};
use super::price::{PricePoint, trailing_return};
use super::rounding::round2;
use super::strategy::{StrategyConfig, StrategyKind};

pub const NEUTRAL_SCORE: f64 = 50.0;
pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// Average score under which a directionless market forces cash.
pub const FLAT_MARKET_AVERAGE: f64 = 40.0;
/// Max-minus-average spread under which the market counts as directionless.
pub const FLAT_MARKET_SPREAD: f64 = 10.0;

const MARKET_LOOKBACK: usize = 5;

// Balanced sub-signal weights.
const TREND_WEIGHT: f64 = 0.30;
const RSI_WEIGHT: f64 = 0.20;
const MACD_WEIGHT: f64 = 0.25;
const BOLLINGER_WEIGHT: f64 = 0.15;

/// A diagnostic value recorded while scoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SignalValue {
    Number(f64),
    Flag(bool),
}

impl SignalValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            SignalValue::Number(v) => Some(*v),
            SignalValue::Flag(_) => None,
        }
    }
}

pub type SignalMap = BTreeMap<String, SignalValue>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreResult {
    pub score: f64,
    pub signals: SignalMap,
}

impl ScoreResult {
    fn neutral() -> Self {
        ScoreResult {
            score: NEUTRAL_SCORE,
            signals: SignalMap::new(),
        }
    }
}

fn record(signals: &mut SignalMap, name: &str, value: f64) {
    signals.insert(name.to_string(), SignalValue::Number(round2(value)));
}

fn clip_score(score: f64) -> f64 {
    if score.is_nan() {
        return NEUTRAL_SCORE;
    }
    round2(score.clamp(MIN_SCORE, MAX_SCORE))
}

impl StrategyKind {
    /// Scores the last frame of `frames`; the frame before it, when present,
    /// is the prior bar for crossover detection.
    pub fn evaluate(self, frames: &[FeatureFrame], config: &StrategyConfig) -> ScoreResult {
        let Some(current) = frames.last() else {
            return ScoreResult::neutral();
        };
        let previous = frames.len().checked_sub(2).map(|i| &frames[i]);

        let mut signals = SignalMap::new();
        let raw = match self {
            StrategyKind::Momentum | StrategyKind::Growth => {
                NEUTRAL_SCORE + weighted_sum(current, config, &mut signals)
            }
            StrategyKind::Value => value_score(current, config, &mut signals),
            StrategyKind::Balanced => balanced_score(current, previous, config, &mut signals),
        };

        record(&mut signals, "raw_score", raw);
        ScoreResult {
            score: clip_score(raw),
            signals,
        }
    }
}

/// Linear combination of the configured features. Absent features are
/// skipped. Volatility scores inversely against `max_volatility`.
fn weighted_sum(frame: &FeatureFrame, config: &StrategyConfig, signals: &mut SignalMap) -> f64 {
    let mut total = 0.0;
    for &(feature, weight) in &config.weights {
        let Some(value) = frame.get(feature) else {
            continue;
        };
        if feature == Feature::Volatility {
            let vol_score = if config.max_volatility > 0.0 {
                (1.0 - value / config.max_volatility).max(0.0) * 50.0
            } else {
                0.0
            };
            total += (vol_score - 25.0) * weight.abs();
        } else {
            total += value * weight * 100.0;
        }
        record(signals, feature.name(), value * 100.0);
    }
    total
}

/// Moving-average defense: a close under MA20 replaces the weighted sum with
/// a fixed tier by breach depth.
fn value_score(frame: &FeatureFrame, config: &StrategyConfig, signals: &mut SignalMap) -> f64 {
    if config.ma_stop_loss {
        if let Some(bias) = frame.ma20_bias.filter(|b| *b < 0.0) {
            let tier = if bias < -0.05 {
                30.0
            } else if bias < -0.02 {
                40.0
            } else {
                45.0
            };
            record(signals, Feature::Ma20Bias.name(), bias * 100.0);
            signals.insert("ma_stop_loss".to_string(), SignalValue::Flag(true));
            return tier;
        }
        signals.insert("ma_stop_loss".to_string(), SignalValue::Flag(false));
    }
    NEUTRAL_SCORE + weighted_sum(frame, config, signals)
}

fn balanced_score(
    current: &FeatureFrame,
    previous: Option<&FeatureFrame>,
    config: &StrategyConfig,
    signals: &mut SignalMap,
) -> f64 {
    let trend = trend_tier(current);
    let rsi = rsi_tier(current.rsi);
    let macd = macd_tier(current, previous);
    let bollinger = bollinger_tier(current.bb_position);

    record(signals, "trend_signal", trend);
    record(signals, "rsi_signal", rsi);
    record(signals, "macd_signal", macd);
    record(signals, "bollinger_signal", bollinger);
    if let Some(v) = current.rsi {
        record(signals, "rsi", v);
    }
    if let Some(v) = current.bb_position {
        record(signals, "bb_position", v * 100.0);
    }

    let mut score = NEUTRAL_SCORE;
    score += (trend - 50.0) * TREND_WEIGHT;
    score += (rsi - 50.0) * RSI_WEIGHT;
    score += (macd - 50.0) * MACD_WEIGHT;
    score += (bollinger - 50.0) * BOLLINGER_WEIGHT;

    if let Some(vol) = current.volatility {
        record(signals, "volatility", vol * 100.0);
        let penalty = if vol > config.max_volatility * 1.5 {
            20.0
        } else if vol > config.max_volatility {
            10.0
        } else {
            0.0
        };
        if penalty > 0.0 {
            record(signals, "volatility_penalty", -penalty);
            score -= penalty;
        }
    }

    score
}

/// Moving-average ordering: 85 full bull alignment, 15 full bear alignment,
/// 70 short above mid, 30 mid above long only, else 50.
pub fn trend_tier(frame: &FeatureFrame) -> f64 {
    let (Some(ma5), Some(ma20)) = (frame.ma5, frame.ma20) else {
        return 50.0;
    };
    match frame.ma60 {
        Some(ma60) if ma5 > ma20 && ma20 > ma60 => 85.0,
        Some(ma60) if ma5 < ma20 && ma20 < ma60 => 15.0,
        _ if ma5 > ma20 => 70.0,
        Some(ma60) if ma20 > ma60 => 30.0,
        _ => 50.0,
    }
}

/// Oversold readings score high, overbought readings low.
pub fn rsi_tier(rsi: Option<f64>) -> f64 {
    match rsi {
        Some(v) if v < 20.0 => 80.0,
        Some(v) if v < 30.0 => 70.0,
        Some(v) if v > 80.0 => 20.0,
        Some(v) if v > 70.0 => 30.0,
        _ => 50.0,
    }
}

/// Compares the MACD-vs-signal relationship on the current and prior bar.
pub fn macd_tier(current: &FeatureFrame, previous: Option<&FeatureFrame>) -> f64 {
    let (Some(line), Some(signal)) = (current.macd, current.macd_signal) else {
        return 50.0;
    };
    let above_now = line > signal;
    let above_before = previous.and_then(|p| match (p.macd, p.macd_signal) {
        (Some(l), Some(s)) => Some(l > s),
        _ => None,
    });
    match (above_before, above_now) {
        (Some(false), true) => 80.0,
        (Some(true), false) => 20.0,
        (_, true) => 70.0,
        (_, false) => 30.0,
    }
}

/// Near the lower band scores high, near the upper band low.
pub fn bollinger_tier(position: Option<f64>) -> f64 {
    match position {
        Some(p) if p < 0.1 => 75.0,
        Some(p) if p < 0.3 => 60.0,
        Some(p) if p > 0.9 => 25.0,
        Some(p) if p > 0.7 => 40.0,
        _ => 50.0,
    }
}

/// Why the model does or does not hold cash.
#[derive(Debug, Clone, PartialEq)]
pub enum CashReason {
    NoData,
    BelowThreshold { max_score: f64, threshold: f64 },
    BearMarket { market_return_5: f64 },
    FlatMarket { average: f64 },
    Favorable,
}

impl fmt::Display for CashReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CashReason::NoData => write!(f, "no valid data"),
            CashReason::BelowThreshold {
                max_score,
                threshold,
            } => write!(
                f,
                "top score {:.2} below threshold {:.2}",
                max_score, threshold
            ),
            CashReason::BearMarket { market_return_5 } => write!(
                f,
                "benchmark 5-day return {:.2}%",
                market_return_5 * 100.0
            ),
            CashReason::FlatMarket { average } => {
                write!(f, "flat market (average score {:.2})", average)
            }
            CashReason::Favorable => write!(f, "signals favorable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CashDecision {
    pub hold_cash: bool,
    pub reason: CashReason,
}

/// A strategy configuration bound to its scoring and cash rules.
#[derive(Debug, Clone)]
pub struct ScoringModel {
    config: StrategyConfig,
}

impl ScoringModel {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn kind(&self) -> StrategyKind {
        self.config.kind
    }

    /// Scores an instrument from its frames through the evaluation day and
    /// annotates the benchmark state.
    pub fn score(&self, frames: &[FeatureFrame], benchmark: Option<&[PricePoint]>) -> ScoreResult {
        if frames.is_empty() {
            return ScoreResult::neutral();
        }
        let mut result = self.config.kind.evaluate(frames, &self.config);

        let mut market_bear = false;
        if let Some(market_return_5) = benchmark.and_then(benchmark_return) {
            market_bear = market_return_5 < self.config.market_bear_threshold;
            record(&mut result.signals, "market_return_5", market_return_5 * 100.0);
        }
        result
            .signals
            .insert("market_bear".to_string(), SignalValue::Flag(market_bear));
        result
    }

    /// Decides whether the whole universe should move to cash. Checks run in
    /// order: no scores, top score under threshold, bearish benchmark, flat
    /// market.
    pub fn should_hold_cash(
        &self,
        scores: &BTreeMap<String, f64>,
        benchmark: Option<&[PricePoint]>,
    ) -> CashDecision {
        if scores.is_empty() {
            return CashDecision {
                hold_cash: true,
                reason: CashReason::NoData,
            };
        }

        let max_score = scores.values().copied().fold(f64::NEG_INFINITY, f64::max);
        let average = scores.values().sum::<f64>() / scores.len() as f64;

        if max_score < self.config.cash_threshold {
            return CashDecision {
                hold_cash: true,
                reason: CashReason::BelowThreshold {
                    max_score,
                    threshold: self.config.cash_threshold,
                },
            };
        }

        if let Some(market_return_5) = benchmark.and_then(benchmark_return) {
            if market_return_5 < self.config.market_bear_threshold {
                return CashDecision {
                    hold_cash: true,
                    reason: CashReason::BearMarket { market_return_5 },
                };
            }
        }

        if average < FLAT_MARKET_AVERAGE && max_score - average < FLAT_MARKET_SPREAD {
            return CashDecision {
                hold_cash: true,
                reason: CashReason::FlatMarket { average },
            };
        }

        CashDecision {
            hold_cash: false,
            reason: CashReason::Favorable,
        }
    }
}

/// Benchmark trailing 5-day return; needs more than five observations.
pub fn benchmark_return(benchmark: &[PricePoint]) -> Option<f64> {
    trailing_return(benchmark, MARKET_LOOKBACK)
}

/// The highest-scoring instrument. Iteration is ascending by code and only a
/// strictly greater score displaces the incumbent, so ties go to the lowest
/// code.
pub fn select_target(scores: &BTreeMap<String, f64>) -> Option<(&str, f64)> {
    let mut best: Option<(&str, f64)> = None;
    for (code, &score) in scores {
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((code.as_str(), score)),
        }
    }
    best
}
