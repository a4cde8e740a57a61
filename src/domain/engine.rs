//! Per-strategy engines and the registry that owns them.
//!
//! A [`RotationEngine`] is immutable: every backtest builds its own portfolio
//! and histories, so one engine can serve concurrent callers through an
//! `Arc`. The [`StrategyRegistry`] is built once and only read afterwards.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

use super::backtest::{BacktestConfig, BacktestRun, DailyDecision, NavPoint, TradeRecord, run_backtest};
use super::chart::{ChartPeriod, ChartPoint, project};
use super::error::RotatorError;
use super::metrics::BacktestMetrics;
use super::price::InstrumentSeries;
use super::recommendation::{Recommendation, recommend};
use super::scoring::ScoringModel;
use super::strategy::{StrategyConfig, StrategyKind};

#[derive(Debug, Clone)]
pub struct RotationEngine {
    model: ScoringModel,
}

impl RotationEngine {
    pub fn new(config: StrategyConfig) -> Self {
        Self {
            model: ScoringModel::new(config),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        self.model.kind()
    }

    pub fn config(&self) -> &StrategyConfig {
        self.model.config()
    }

    fn ensure_ready(&self) -> Result<(), RotatorError> {
        if self.kind().is_production_ready() {
            Ok(())
        } else {
            Err(RotatorError::UnimplementedStrategy {
                strategy: self.kind().to_string(),
            })
        }
    }

    pub fn recommend(
        &self,
        universe: &[InstrumentSeries],
        benchmark: Option<&InstrumentSeries>,
    ) -> Result<Recommendation, RotatorError> {
        self.ensure_ready()?;
        recommend(universe, benchmark, &self.model)
    }

    pub fn run_backtest(
        &self,
        universe: &[InstrumentSeries],
        benchmark: Option<&InstrumentSeries>,
        config: &BacktestConfig,
    ) -> Result<BacktestRun, RotatorError> {
        self.ensure_ready()?;
        run_backtest(universe, benchmark, &self.model, config)
    }

    /// Runs a backtest and shapes the outcome for presentation.
    pub fn backtest_report(
        &self,
        universe: &[InstrumentSeries],
        benchmark: Option<&InstrumentSeries>,
        config: &BacktestConfig,
        period: ChartPeriod,
        decision_limit: usize,
    ) -> BacktestResponse {
        match self.run_backtest(universe, benchmark, config) {
            Ok(run) => BacktestResponse::Completed(BacktestReport::from_run(
                self.kind(),
                &run,
                config,
                period,
                decision_limit,
            )),
            Err(e) => BacktestResponse::from_error(self.kind(), e),
        }
    }

    pub fn recommendation_report(
        &self,
        universe: &[InstrumentSeries],
        benchmark: Option<&InstrumentSeries>,
    ) -> RecommendationResponse {
        match self.recommend(universe, benchmark) {
            Ok(rec) => RecommendationResponse::Completed(rec),
            Err(RotatorError::UnimplementedStrategy { .. }) => {
                RecommendationResponse::Unimplemented {
                    strategy: self.kind(),
                }
            }
            Err(e) => {
                warn!(strategy = %self.kind(), error = %e, "recommendation failed");
                RecommendationResponse::Failed {
                    message: e.to_string(),
                }
            }
        }
    }
}

/// One engine per strategy kind, fixed at construction.
#[derive(Debug, Clone)]
pub struct StrategyRegistry {
    engines: BTreeMap<StrategyKind, Arc<RotationEngine>>,
}

impl StrategyRegistry {
    pub fn with_presets() -> Self {
        Self::with_configs(StrategyKind::ALL.into_iter().map(StrategyConfig::preset))
    }

    /// Presets for every kind, replaced by any config supplied for that kind.
    pub fn with_configs<I>(configs: I) -> Self
    where
        I: IntoIterator<Item = StrategyConfig>,
    {
        let mut engines: BTreeMap<StrategyKind, Arc<RotationEngine>> = StrategyKind::ALL
            .into_iter()
            .map(|k| (k, Arc::new(RotationEngine::new(StrategyConfig::preset(k)))))
            .collect();
        for config in configs {
            engines.insert(config.kind, Arc::new(RotationEngine::new(config)));
        }
        Self { engines }
    }

    pub fn get(&self, kind: StrategyKind) -> Option<Arc<RotationEngine>> {
        self.engines.get(&kind).cloned()
    }

    pub fn kinds(&self) -> impl Iterator<Item = StrategyKind> + '_ {
        self.engines.keys().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestReport {
    pub strategy: StrategyKind,
    pub metrics: Option<BacktestMetrics>,
    pub nav_history: Vec<NavPoint>,
    pub trade_log: Vec<TradeRecord>,
    /// Every decision of the run, newest first.
    pub decision_history: Vec<DailyDecision>,
    /// The newest `decision_limit` entries of `decision_history`.
    pub recent_decisions: Vec<DailyDecision>,
    pub chart_data: Vec<ChartPoint>,
    pub period: ChartPeriod,
    pub skipped: Vec<String>,
}

impl BacktestReport {
    pub fn from_run(
        strategy: StrategyKind,
        run: &BacktestRun,
        config: &BacktestConfig,
        period: ChartPeriod,
        decision_limit: usize,
    ) -> Self {
        BacktestReport {
            strategy,
            metrics: BacktestMetrics::compute(
                &run.nav_history,
                &run.trades,
                run.initial_capital,
                config.risk_free_rate,
            ),
            nav_history: run.nav_history.clone(),
            trade_log: run.trades.clone(),
            decision_history: run.decisions.iter().rev().cloned().collect(),
            recent_decisions: run
                .recent_decisions(decision_limit)
                .into_iter()
                .cloned()
                .collect(),
            chart_data: project(&run.nav_history, period),
            period,
            skipped: run.skipped.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BacktestResponse {
    Completed(BacktestReport),
    Unimplemented { strategy: StrategyKind },
    Failed { strategy: StrategyKind, message: String },
}

impl BacktestResponse {
    fn from_error(strategy: StrategyKind, err: RotatorError) -> Self {
        match err {
            RotatorError::UnimplementedStrategy { .. } => {
                BacktestResponse::Unimplemented { strategy }
            }
            e => {
                warn!(%strategy, error = %e, "backtest failed");
                BacktestResponse::Failed {
                    strategy,
                    message: e.to_string(),
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecommendationResponse {
    Completed(Recommendation),
    Unimplemented { strategy: StrategyKind },
    Failed { message: String },
}
