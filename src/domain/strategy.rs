//! Strategy variants and their immutable configuration records.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::feature::Feature;

/// The fixed set of scoring behaviors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Momentum,
    Value,
    Balanced,
    Growth,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::Momentum,
        StrategyKind::Value,
        StrategyKind::Balanced,
        StrategyKind::Growth,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::Momentum => "momentum",
            StrategyKind::Value => "value",
            StrategyKind::Balanced => "balanced",
            StrategyKind::Growth => "growth",
        }
    }

    /// Whether the recommendation and backtest entry points accept this kind.
    pub fn is_production_ready(self) -> bool {
        !matches!(self, StrategyKind::Growth)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        StrategyKind::ALL
            .into_iter()
            .find(|k| k.name() == wanted)
            .ok_or_else(|| format!("unknown strategy '{}'", s.trim()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyConfig {
    pub kind: StrategyKind,
    /// Ordered feature weights; the order fixes the summation order.
    pub weights: Vec<(Feature, f64)>,
    pub cash_threshold: f64,
    pub market_bear_threshold: f64,
    pub max_volatility: f64,
    /// Moving-average stop-loss: a close under MA20 caps the score.
    pub ma_stop_loss: bool,
}

impl StrategyConfig {
    /// The preset configuration for a strategy kind.
    pub fn preset(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::Momentum => StrategyConfig {
                kind,
                weights: vec![
                    (Feature::Return5, 0.25),
                    (Feature::Return10, 0.20),
                    (Feature::Return20, 0.25),
                    (Feature::Ma20Bias, 0.20),
                    (Feature::Volatility, -0.10),
                ],
                cash_threshold: 45.0,
                market_bear_threshold: -0.05,
                max_volatility: 0.03,
                ma_stop_loss: false,
            },
            StrategyKind::Value => StrategyConfig {
                kind,
                weights: vec![
                    (Feature::Return5, 0.10),
                    (Feature::Return10, 0.15),
                    (Feature::Return20, 0.20),
                    (Feature::Ma20Bias, 0.35),
                    (Feature::Volatility, -0.20),
                ],
                cash_threshold: 48.0,
                market_bear_threshold: -0.04,
                max_volatility: 0.025,
                ma_stop_loss: true,
            },
            StrategyKind::Balanced => StrategyConfig {
                kind,
                weights: Vec::new(),
                cash_threshold: 45.0,
                market_bear_threshold: -0.05,
                max_volatility: 0.03,
                ma_stop_loss: false,
            },
            StrategyKind::Growth => StrategyConfig {
                kind,
                weights: vec![
                    (Feature::Return5, 0.15),
                    (Feature::Return10, 0.25),
                    (Feature::Return20, 0.35),
                    (Feature::Ma20Bias, 0.15),
                    (Feature::Volatility, -0.10),
                ],
                cash_threshold: 42.0,
                market_bear_threshold: -0.06,
                max_volatility: 0.04,
                ma_stop_loss: false,
            },
        }
    }

    pub fn weight(&self, feature: Feature) -> Option<f64> {
        self.weights
            .iter()
            .find(|(f, _)| *f == feature)
            .map(|(_, w)| *w)
    }
}

/// Parses a weight table such as `return_5:0.25, volatility:-0.1`.
pub fn parse_weights(input: &str) -> Result<Vec<(Feature, f64)>, String> {
    let mut weights: Vec<(Feature, f64)> = Vec::new();
    for token in input.split(',') {
        let token = token.trim();
        if token.is_empty() {
            return Err("empty token in weight list".to_string());
        }
        let (name, value) = token
            .split_once(':')
            .ok_or_else(|| format!("expected feature:weight, got '{}'", token))?;
        let feature: Feature = name.parse()?;
        let weight: f64 = value
            .trim()
            .parse()
            .map_err(|_| format!("invalid weight for {}: '{}'", feature, value.trim()))?;
        if !weight.is_finite() {
            return Err(format!("weight for {} must be finite", feature));
        }
        if weights.iter().any(|(f, _)| *f == feature) {
            return Err(format!("duplicate feature: {}", feature));
        }
        weights.push((feature, weight));
    }
    Ok(weights)
}
