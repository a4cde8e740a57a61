//! Daily rotation simulator.
//!
//! One holding at a time: an instrument or cash. The decision for trading day
//! `t` is scored from data dated on or before `t - 1` (the signal day) and
//! filled at day `t`'s open; NAV is marked at day `t`'s close.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

use super::error::RotatorError;
use super::execution::{ExecutionConfig, Fill, buy_all, sell_all};
use super::feature::{FeatureSet, compute_universe_features};
use super::portfolio::{Holding, Portfolio};
use super::price::{InstrumentSeries, PricePoint, common_dates};
use super::rounding::{round2, round3};
use super::scoring::{CashReason, ScoringModel, select_target};

pub const DEFAULT_INITIAL_CAPITAL: f64 = 100_000.0;
pub const DEFAULT_CASH_ANNUAL_YIELD: f64 = 0.02;
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.03;
pub const DEFAULT_MIN_INSTRUMENTS: usize = 5;
pub const MIN_TRADING_DAYS: usize = 2;
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;
pub const DEFAULT_DECISION_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub initial_capital: f64,
    pub commission_rate: f64,
    pub min_commission: f64,
    pub cash_annual_yield: f64,
    pub risk_free_rate: f64,
    pub min_instruments: usize,
}

impl BacktestConfig {
    pub fn new(start_date: NaiveDate) -> Self {
        let execution = ExecutionConfig::default();
        BacktestConfig {
            start_date,
            end_date: None,
            initial_capital: DEFAULT_INITIAL_CAPITAL,
            commission_rate: execution.commission_rate,
            min_commission: execution.min_commission,
            cash_annual_yield: DEFAULT_CASH_ANNUAL_YIELD,
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            min_instruments: DEFAULT_MIN_INSTRUMENTS,
        }
    }

    pub fn execution(&self) -> ExecutionConfig {
        ExecutionConfig {
            commission_rate: self.commission_rate,
            min_commission: self.min_commission,
        }
    }

    pub fn daily_cash_rate(&self) -> f64 {
        self.cash_annual_yield / TRADING_DAYS_PER_YEAR
    }

    fn in_range(&self, date: NaiveDate) -> bool {
        date >= self.start_date && self.end_date.is_none_or(|end| date <= end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DecisionAction {
    Hold,
    Buy,
    Sell,
    Switch,
    Cash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    Buy,
    Sell,
    Cash,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    pub date: NaiveDate,
    pub action: TradeAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shares: Option<f64>,
    /// Gross fill value, or the cash balance for a `CASH` record.
    pub value: f64,
    pub commission: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl TradeRecord {
    fn from_fill(date: NaiveDate, action: TradeAction, fill: &Fill, score: Option<f64>) -> Self {
        TradeRecord {
            date,
            action,
            code: Some(fill.code.clone()),
            price: Some(round3(fill.price)),
            shares: Some(round2(fill.shares)),
            value: round2(fill.value),
            commission: round2(fill.commission),
            score,
            reason: None,
        }
    }

    fn cash(date: NaiveDate, cash: f64, reason: &CashReason) -> Self {
        TradeRecord {
            date,
            action: TradeAction::Cash,
            code: None,
            price: None,
            shares: None,
            value: round2(cash),
            commission: 0.0,
            score: None,
            reason: Some(reason.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyDecision {
    pub date: NaiveDate,
    pub previous_holding: Holding,
    /// Scores evaluated from the signal day's close.
    pub scores: BTreeMap<String, f64>,
    /// `None` on the first trading day, which has no signal day.
    pub target: Option<Holding>,
    pub action: DecisionAction,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavPoint {
    pub date: NaiveDate,
    pub nav: f64,
    pub holding: Holding,
    pub return_pct: f64,
}

/// Everything a finished run produced. Immutable once returned.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestRun {
    pub initial_capital: f64,
    pub nav_history: Vec<NavPoint>,
    pub trades: Vec<TradeRecord>,
    pub decisions: Vec<DailyDecision>,
    /// Instruments dropped for insufficient history.
    pub skipped: Vec<String>,
}

impl BacktestRun {
    /// The newest `limit` decisions, newest first.
    pub fn recent_decisions(&self, limit: usize) -> Vec<&DailyDecision> {
        self.decisions.iter().rev().take(limit).collect()
    }

    pub fn trades_on(&self, date: NaiveDate) -> Vec<&TradeRecord> {
        self.trades.iter().filter(|t| t.date == date).collect()
    }
}

/// Runs the rotation over `universe` with `model`. `benchmark`, when given,
/// joins the calendar and feeds the bear-market check.
pub fn run_backtest(
    universe: &[InstrumentSeries],
    benchmark: Option<&InstrumentSeries>,
    model: &ScoringModel,
    config: &BacktestConfig,
) -> Result<BacktestRun, RotatorError> {
    let (ready, skipped) = compute_universe_features(universe);
    for skip in &skipped {
        warn!(code = skip.series.code(), error = %skip.error, "skipping instrument");
    }
    if ready.len() < config.min_instruments {
        return Err(RotatorError::InsufficientInstruments {
            found: ready.len(),
            minimum: config.min_instruments,
        });
    }

    let calendar = trading_calendar(&ready, benchmark, config);
    if calendar.len() < MIN_TRADING_DAYS {
        return Err(RotatorError::InsufficientTradingDays {
            found: calendar.len(),
            minimum: MIN_TRADING_DAYS,
        });
    }
    info!(
        strategy = %model.kind(),
        instruments = ready.len(),
        days = calendar.len(),
        start = %calendar[0],
        end = %calendar[calendar.len() - 1],
        "starting backtest"
    );

    let by_code: HashMap<&str, &FeatureSet<'_>> =
        ready.iter().map(|set| (set.series.code(), set)).collect();
    let execution = config.execution();
    let daily_rate = config.daily_cash_rate();

    let mut portfolio = Portfolio::new(config.initial_capital);
    let mut trades = Vec::new();
    let mut decisions = Vec::with_capacity(calendar.len());
    let mut nav_history = Vec::with_capacity(calendar.len());

    for (i, &day) in calendar.iter().enumerate() {
        let previous_holding = portfolio.holding.clone();

        let decision = if i == 0 {
            DailyDecision {
                date: day,
                previous_holding,
                scores: BTreeMap::new(),
                target: None,
                action: DecisionAction::Hold,
                reason: "first trading day, no prior signal".to_string(),
            }
        } else {
            let signal_day = calendar[i - 1];
            let bench_history: Option<&[PricePoint]> = benchmark.map(|b| b.up_to(signal_day));

            let scores: BTreeMap<String, f64> = ready
                .iter()
                .filter_map(|set| {
                    let frames = set.frames_through(signal_day);
                    if frames.is_empty() {
                        return None;
                    }
                    let result = model.score(frames, bench_history);
                    Some((set.series.code().to_string(), result.score))
                })
                .collect();

            let cash = model.should_hold_cash(&scores, bench_history);
            let (target, target_score, reason) = match select_target(&scores) {
                Some((code, score)) if !cash.hold_cash => (
                    Holding::Instrument(code.to_string()),
                    Some(score),
                    format!("top score {:.2}", score),
                ),
                Some(_) => (Holding::Cash, None, cash.reason.to_string()),
                None => (Holding::Cash, None, CashReason::NoData.to_string()),
            };

            let open_of = |code: &str| -> Option<f64> {
                by_code
                    .get(code)
                    .and_then(|set| set.series.get(day))
                    .map(|p| p.open)
            };

            let mut action = classify(&previous_holding, &target);
            let mut reason = reason;

            if action != DecisionAction::Hold {
                if let Some(code) = previous_holding.code() {
                    let sold = open_of(code)
                        .and_then(|open| sell_all(&mut portfolio, open, &execution));
                    if let Some(fill) = sold {
                        trades.push(TradeRecord::from_fill(day, TradeAction::Sell, &fill, None));
                    }
                }

                match &target {
                    Holding::Instrument(code) => {
                        let filled = open_of(code)
                            .and_then(|open| buy_all(&mut portfolio, code, open, &execution));
                        match filled {
                            Some(fill) => trades.push(TradeRecord::from_fill(
                                day,
                                TradeAction::Buy,
                                &fill,
                                target_score,
                            )),
                            None => {
                                warn!(%day, code = code.as_str(), cash = portfolio.cash, "buy skipped");
                                portfolio.holding = Holding::Cash;
                                reason.push_str(", buy skipped: cash does not cover commission");
                                action = match (action, &previous_holding) {
                                    (DecisionAction::Switch, _) => {
                                        trades.push(TradeRecord::cash(day, portfolio.cash, &cash.reason));
                                        DecisionAction::Sell
                                    }
                                    (_, Holding::Unallocated) => {
                                        trades.push(TradeRecord::cash(day, portfolio.cash, &cash.reason));
                                        DecisionAction::Cash
                                    }
                                    _ => DecisionAction::Hold,
                                };
                            }
                        }
                    }
                    _ => {
                        portfolio.holding = Holding::Cash;
                        trades.push(TradeRecord::cash(day, portfolio.cash, &cash.reason));
                    }
                }
            } else {
                reason.push_str(" (hold)");
            }

            debug!(%day, %signal_day, target = %target, ?action, "decision");
            DailyDecision {
                date: day,
                previous_holding,
                scores,
                target: Some(target),
                action,
                reason,
            }
        };
        decisions.push(decision);

        portfolio.accrue_cash_yield(daily_rate);
        let close = portfolio
            .holding
            .code()
            .and_then(|code| by_code.get(code))
            .and_then(|set| set.series.get(day))
            .map(|p| p.close);
        let nav = portfolio.nav(close);
        nav_history.push(NavPoint {
            date: day,
            nav: round2(nav),
            holding: portfolio.holding.clone(),
            return_pct: round2(portfolio.return_pct(nav)),
        });
    }

    info!(
        strategy = %model.kind(),
        trades = trades.len(),
        final_nav = nav_history.last().map(|p| p.nav).unwrap_or(config.initial_capital),
        "backtest finished"
    );

    Ok(BacktestRun {
        initial_capital: config.initial_capital,
        nav_history,
        trades,
        decisions,
        skipped: skipped.iter().map(|s| s.series.code().to_string()).collect(),
    })
}

/// Dates shared by every qualifying instrument and the benchmark, within the
/// configured range.
fn trading_calendar(
    ready: &[FeatureSet<'_>],
    benchmark: Option<&InstrumentSeries>,
    config: &BacktestConfig,
) -> Vec<NaiveDate> {
    let series = ready
        .iter()
        .map(|set| set.series.prices.as_slice())
        .chain(benchmark.map(|b| b.prices.as_slice()));
    common_dates(series)
        .into_iter()
        .filter(|d| config.in_range(*d))
        .collect()
}

fn classify(current: &Holding, target: &Holding) -> DecisionAction {
    match (current, target) {
        (Holding::Instrument(a), Holding::Instrument(b)) if a == b => DecisionAction::Hold,
        (Holding::Instrument(_), Holding::Instrument(_)) => DecisionAction::Switch,
        (Holding::Instrument(_), _) => DecisionAction::Sell,
        (_, Holding::Instrument(_)) => DecisionAction::Buy,
        (Holding::Unallocated, _) => DecisionAction::Cash,
        (Holding::Cash, _) => DecisionAction::Hold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::price::Instrument;
    use crate::domain::strategy::{StrategyConfig, StrategyKind};

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn make_series(code: &str, closes: &[f64]) -> InstrumentSeries {
        let prices = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PricePoint::new(start() + chrono::Duration::days(i as i64), c, c))
            .collect();
        InstrumentSeries::new(Instrument::new(code, code), prices)
    }

    fn geometric(n: usize, base: f64, daily: f64) -> Vec<f64> {
        (0..n).map(|i| base * (1.0 + daily).powi(i as i32)).collect()
    }

    fn momentum() -> ScoringModel {
        ScoringModel::new(StrategyConfig::preset(StrategyKind::Momentum))
    }

    fn config_from(day: i64) -> BacktestConfig {
        BacktestConfig::new(start() + chrono::Duration::days(day))
    }

    fn rising_leader() -> Vec<InstrumentSeries> {
        vec![
            make_series("A", &geometric(60, 10.0, 0.01)),
            make_series("B", &[10.0; 60]),
            make_series("C", &[10.0; 60]),
            make_series("D", &[10.0; 60]),
            make_series("E", &[10.0; 60]),
        ]
    }

    fn all_falling() -> Vec<InstrumentSeries> {
        ["A", "B", "C", "D", "E"]
            .iter()
            .map(|code| make_series(code, &geometric(60, 20.0, -0.02)))
            .collect()
    }

    #[test]
    fn config_defaults() {
        let c = config_from(0);
        assert!((c.initial_capital - 100_000.0).abs() < f64::EPSILON);
        assert!((c.commission_rate - 0.0001).abs() < f64::EPSILON);
        assert!((c.min_commission - 5.0).abs() < f64::EPSILON);
        assert!((c.daily_cash_rate() - 0.02 / 252.0).abs() < 1e-15);
        assert_eq!(c.min_instruments, 5);
        assert!(c.end_date.is_none());
    }

    #[test]
    fn classify_transitions() {
        let a = Holding::Instrument("A".into());
        let b = Holding::Instrument("B".into());
        assert_eq!(classify(&a, &a), DecisionAction::Hold);
        assert_eq!(classify(&a, &b), DecisionAction::Switch);
        assert_eq!(classify(&a, &Holding::Cash), DecisionAction::Sell);
        assert_eq!(classify(&Holding::Cash, &a), DecisionAction::Buy);
        assert_eq!(classify(&Holding::Unallocated, &a), DecisionAction::Buy);
        assert_eq!(classify(&Holding::Unallocated, &Holding::Cash), DecisionAction::Cash);
        assert_eq!(classify(&Holding::Cash, &Holding::Cash), DecisionAction::Hold);
    }

    #[test]
    fn too_few_instruments_fails() {
        let universe = &rising_leader()[..4];
        let err = run_backtest(universe, None, &momentum(), &config_from(30)).unwrap_err();
        assert!(matches!(
            err,
            RotatorError::InsufficientInstruments { found: 4, minimum: 5 }
        ));
    }

    #[test]
    fn short_histories_count_against_minimum() {
        let mut universe = rising_leader();
        universe[4] = make_series("E", &[10.0; 20]);
        let err = run_backtest(&universe, None, &momentum(), &config_from(30)).unwrap_err();
        assert!(matches!(err, RotatorError::InsufficientInstruments { found: 4, .. }));
    }

    #[test]
    fn single_trading_day_fails() {
        let err = run_backtest(&rising_leader(), None, &momentum(), &config_from(59)).unwrap_err();
        assert!(matches!(
            err,
            RotatorError::InsufficientTradingDays { found: 1, minimum: 2 }
        ));
    }

    #[test]
    fn first_day_holds_without_trades() {
        let run = run_backtest(&rising_leader(), None, &momentum(), &config_from(30)).unwrap();
        let first = &run.decisions[0];
        assert_eq!(first.action, DecisionAction::Hold);
        assert!(first.scores.is_empty());
        assert!(first.target.is_none());
        assert!(run.trades_on(first.date).is_empty());
    }

    #[test]
    fn buys_the_leader_on_day_one() {
        let run = run_backtest(&rising_leader(), None, &momentum(), &config_from(30)).unwrap();
        let second = &run.decisions[1];
        assert_eq!(second.action, DecisionAction::Buy);
        assert_eq!(second.target, Some(Holding::Instrument("A".into())));
        assert_eq!(second.scores.len(), 5);
        assert!((second.scores["B"] - 52.5).abs() < 1e-9);

        let trades = run.trades_on(second.date);
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].action, TradeAction::Buy);
        assert_eq!(trades[0].code.as_deref(), Some("A"));
        assert_eq!(trades[0].score, Some(second.scores["A"]));

        assert!(run.decisions[2..].iter().all(|d| d.action == DecisionAction::Hold));
        assert_eq!(run.nav_history.last().unwrap().holding, Holding::Instrument("A".into()));
    }

    #[test]
    fn falling_market_moves_to_cash_once() {
        let run = run_backtest(&all_falling(), None, &momentum(), &config_from(30)).unwrap();
        let second = &run.decisions[1];
        assert_eq!(second.action, DecisionAction::Cash);
        assert_eq!(second.target, Some(Holding::Cash));

        let trades = run.trades_on(second.date);
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].action, TradeAction::Cash);
        assert!(trades[0].code.is_none());

        assert!(run.decisions[2..].iter().all(|d| d.action == DecisionAction::Hold));
        assert!(run.trades.iter().all(|t| t.action == TradeAction::Cash));
    }

    #[test]
    fn cash_compounds_every_flat_day() {
        let run = run_backtest(&all_falling(), None, &momentum(), &config_from(30)).unwrap();
        let rate: f64 = 1.0 + 0.02 / 252.0;
        for (i, point) in run.nav_history.iter().enumerate() {
            let expected = 100_000.0 * rate.powi(i as i32 + 1);
            assert!((point.nav - round2(expected)).abs() < 0.011, "day {}", i);
            assert!(point.holding.is_flat());
        }
    }

    #[test]
    fn one_nav_point_per_day_in_order() {
        let run = run_backtest(&rising_leader(), None, &momentum(), &config_from(30)).unwrap();
        assert_eq!(run.nav_history.len(), 30);
        assert_eq!(run.decisions.len(), 30);
        assert!(run.nav_history.windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn end_date_bounds_calendar() {
        let mut config = config_from(30);
        config.end_date = Some(start() + chrono::Duration::days(39));
        let run = run_backtest(&rising_leader(), None, &momentum(), &config).unwrap();
        assert_eq!(run.nav_history.len(), 10);
    }

    #[test]
    fn benchmark_joins_calendar() {
        let bench = make_series("510300", &geometric(50, 4.0, 0.001));
        let run =
            run_backtest(&rising_leader(), Some(&bench), &momentum(), &config_from(30)).unwrap();
        assert_eq!(run.nav_history.len(), 20);
    }

    #[test]
    fn recent_decisions_newest_first() {
        let run = run_backtest(&rising_leader(), None, &momentum(), &config_from(30)).unwrap();
        let recent = run.recent_decisions(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].date, run.decisions[29].date);
        assert_eq!(recent[2].date, run.decisions[27].date);
        assert_eq!(run.recent_decisions(500).len(), 30);
    }

    #[test]
    fn skipped_codes_reported() {
        let mut universe = rising_leader();
        universe.push(make_series("F", &[10.0; 12]));
        let run = run_backtest(&universe, None, &momentum(), &config_from(30)).unwrap();
        assert_eq!(run.skipped, vec!["F".to_string()]);
    }
}
