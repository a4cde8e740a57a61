//! Latest-day recommendation: score every instrument on its most recent
//! frame, rank them, and pick a holding or cash.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

use super::error::RotatorError;
use super::feature::compute_universe_features;
use super::portfolio::CASH_LABEL;
use super::price::InstrumentSeries;
use super::rounding::{round2, round3};
use super::scoring::{ScoringModel, SignalMap, select_target};
use super::universe::CASH_NAME;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarketStatus {
    Normal,
    Bearish,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedScore {
    pub code: String,
    pub name: String,
    pub score: f64,
    pub is_cash: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentDetail {
    pub name: String,
    pub score: f64,
    pub price: f64,
    pub change_pct: f64,
    pub signals: SignalMap,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub date: NaiveDate,
    /// Instrument code, or `CASH`.
    pub recommendation: String,
    pub recommend_name: String,
    pub confidence: f64,
    pub cash_reason: Option<String>,
    pub should_cash: bool,
    /// Cash entry first, then instruments by score descending, ties by code.
    pub all_scores: Vec<RankedScore>,
    pub details: BTreeMap<String, InstrumentDetail>,
    pub market_status: MarketStatus,
}

/// Scores `universe` on its latest data. Instruments with fewer than
/// [`MIN_HISTORY`](super::feature::MIN_HISTORY) observations are skipped.
pub fn recommend(
    universe: &[InstrumentSeries],
    benchmark: Option<&InstrumentSeries>,
    model: &ScoringModel,
) -> Result<Recommendation, RotatorError> {
    let (ready, skipped) = compute_universe_features(universe);
    for skip in &skipped {
        warn!(code = skip.series.code(), error = %skip.error, "not scoring instrument");
    }

    let date = ready
        .iter()
        .filter_map(|set| set.frames.last().map(|f| f.date))
        .max()
        .ok_or(RotatorError::NoScorableInstruments)?;
    let bench_history = benchmark.map(|b| b.up_to(date));

    let mut scores: BTreeMap<String, f64> = BTreeMap::new();
    let mut details: BTreeMap<String, InstrumentDetail> = BTreeMap::new();
    for set in &ready {
        let result = model.score(&set.frames, bench_history);
        let prices = &set.series.prices;
        let Some(latest) = prices.last() else {
            continue;
        };
        let change_pct = match prices.len().checked_sub(2).map(|i| prices[i].close) {
            Some(prev) if prev > 0.0 => (latest.close - prev) / prev * 100.0,
            _ => 0.0,
        };

        let code = set.series.code().to_string();
        scores.insert(code.clone(), result.score);
        details.insert(
            code,
            InstrumentDetail {
                name: set.series.instrument.name.clone(),
                score: result.score,
                price: round3(latest.close),
                change_pct: round2(change_pct),
                signals: result.signals,
            },
        );
    }

    let cash = model.should_hold_cash(&scores, bench_history);
    let chosen = if cash.hold_cash {
        None
    } else {
        select_target(&scores)
    };

    let (recommendation, recommend_name, confidence) = match chosen {
        Some((code, score)) => (
            code.to_string(),
            details
                .get(code)
                .map(|d| d.name.clone())
                .unwrap_or_else(|| code.to_string()),
            score,
        ),
        None => (CASH_LABEL.to_string(), CASH_NAME.to_string(), 0.0),
    };
    let should_cash = chosen.is_none();

    let mut ranked: Vec<(&String, f64)> = scores.iter().map(|(c, s)| (c, *s)).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let mut all_scores = Vec::with_capacity(ranked.len() + 1);
    all_scores.push(RankedScore {
        code: CASH_LABEL.to_string(),
        name: CASH_NAME.to_string(),
        score: 0.0,
        is_cash: true,
    });
    all_scores.extend(ranked.into_iter().map(|(code, score)| RankedScore {
        code: code.clone(),
        name: details
            .get(code)
            .map(|d| d.name.clone())
            .unwrap_or_else(|| code.clone()),
        score,
        is_cash: false,
    }));

    info!(
        %date,
        recommendation = recommendation.as_str(),
        confidence,
        scored = scores.len(),
        "recommendation ready"
    );

    Ok(Recommendation {
        date,
        recommendation,
        recommend_name,
        confidence,
        cash_reason: should_cash.then(|| cash.reason.to_string()),
        should_cash,
        all_scores,
        details,
        market_status: if should_cash {
            MarketStatus::Bearish
        } else {
            MarketStatus::Normal
        },
    })
}
