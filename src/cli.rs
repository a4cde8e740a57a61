//! CLI definition and dispatch.

use chrono::{Duration, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::{JsonReportAdapter, STDOUT_PATH};
use crate::domain::backtest::{BacktestConfig, DEFAULT_DECISION_LIMIT};
use crate::domain::chart::ChartPeriod;
use crate::domain::config_validation::{read_date, read_double, read_int, read_string, validate_all};
use crate::domain::engine::{BacktestResponse, RecommendationResponse, StrategyRegistry};
use crate::domain::error::RotatorError;
use crate::domain::strategy::{StrategyConfig, StrategyKind, parse_weights};
use crate::domain::universe::{DEFAULT_BENCHMARK, Universe, load_universe, parse_codes, parse_names};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

/// Calendar days of history loaded ahead of the first simulated day.
pub const WARMUP_DAYS: i64 = 60;
/// Calendar days of history loaded for a recommendation.
pub const RECOMMENDATION_LOOKBACK_DAYS: i64 = 60;
pub const DEFAULT_BACKTEST_DAYS: i64 = 365;
pub const DEFAULT_STRATEGY: StrategyKind = StrategyKind::Momentum;

const KNOWN_SECTIONS: [&str; 5] = ["backtest", "universe", "data", "strategy", "report"];

#[derive(Parser, Debug)]
#[command(name = "etfrotator", about = "Single-asset ETF rotation backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a rotation backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Strategy kind, overriding [strategy] kind
        #[arg(short, long)]
        strategy: Option<String>,
        /// Chart period: week, month, half, year or all
        #[arg(short, long)]
        period: Option<String>,
        /// Output path, or - for stdout
        #[arg(short, long)]
        output: Option<String>,
        /// Number of entries in the recent decisions list
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Recommend a holding from the latest data
    Recommend {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        strategy: Option<String>,
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List instruments available in the data directory
    ListSymbols {
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Show the data range of the configured instruments
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        code: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    init_tracing();
    match cli.command {
        Command::Backtest {
            config,
            strategy,
            period,
            output,
            limit,
            dry_run,
        } => {
            let overrides = Overrides {
                strategy,
                period,
                output,
                limit,
            };
            if dry_run {
                run_dry_run(&config, &overrides)
            } else {
                run_backtest(&config, &overrides)
            }
        }
        Command::Recommend {
            config,
            strategy,
            output,
        } => run_recommend(
            &config,
            &Overrides {
                strategy,
                output,
                ..Overrides::default()
            },
        ),
        Command::Validate { config } => run_validate(&config),
        Command::ListSymbols { data_dir, config } => {
            run_list_symbols(data_dir.as_deref(), config.as_deref())
        }
        Command::Info { config, code } => run_info(&config, code.as_deref()),
    }
}

/// Installs the stderr subscriber; `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A second call in the same process keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub strategy: Option<String>,
    pub period: Option<String>,
    pub output: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportOptions {
    pub period: ChartPeriod,
    pub output: String,
    pub decision_limit: usize,
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = RotatorError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn load_and_validate(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    eprintln!("Loading config from {}", path.display());
    let adapter = load_config(path)?;
    validate_all(&adapter).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })?;
    Ok(adapter)
}

pub fn build_strategy_config(
    config: &dyn ConfigPort,
    kind_override: Option<&str>,
) -> Result<StrategyConfig, RotatorError> {
    let kind: StrategyKind = match kind_override
        .map(str::to_string)
        .or_else(|| read_string(config, "strategy", "kind"))
    {
        Some(name) => name.parse().map_err(|reason| RotatorError::ConfigInvalid {
            section: "strategy".into(),
            key: "kind".into(),
            reason,
        })?,
        None => DEFAULT_STRATEGY,
    };

    let mut strategy = StrategyConfig::preset(kind);
    if let Some(v) = read_double(config, "strategy", "cash_threshold")? {
        strategy.cash_threshold = v;
    }
    if let Some(v) = read_double(config, "strategy", "market_bear_threshold")? {
        strategy.market_bear_threshold = v;
    }
    if let Some(v) = read_double(config, "strategy", "max_volatility")? {
        strategy.max_volatility = v;
    }
    strategy.ma_stop_loss = config.get_bool("strategy", "ma_stop_loss", strategy.ma_stop_loss);
    if let Some(s) = read_string(config, "strategy", "weights") {
        strategy.weights = parse_weights(&s).map_err(|reason| RotatorError::ConfigInvalid {
            section: "strategy".into(),
            key: "weights".into(),
            reason,
        })?;
    }
    Ok(strategy)
}

/// The configured universe, or the default catalogue when no codes are set.
pub fn build_universe(config: &dyn ConfigPort) -> Result<Universe, RotatorError> {
    let invalid = |key: &str, reason: String| RotatorError::ConfigInvalid {
        section: "universe".into(),
        key: key.into(),
        reason,
    };
    let benchmark =
        read_string(config, "universe", "benchmark").unwrap_or_else(|| DEFAULT_BENCHMARK.into());

    let Some(codes) = read_string(config, "universe", "codes") else {
        let mut universe = Universe::default_etfs();
        if universe.benchmark.as_ref().map(|b| b.code.as_str()) != Some(benchmark.as_str()) {
            universe = Universe::from_codes(
                universe.instruments.into_iter().map(|i| i.code).collect(),
                None,
                Some(benchmark),
            )
            .map_err(|e| invalid("benchmark", e.to_string()))?;
        }
        return Ok(universe);
    };

    let codes = parse_codes(&codes).map_err(|e| invalid("codes", e.to_string()))?;
    let names = read_string(config, "universe", "names")
        .map(|s| parse_names(&s))
        .transpose()
        .map_err(|e| invalid("names", e.to_string()))?;
    Universe::from_codes(codes, names, Some(benchmark.to_uppercase()))
        .map_err(|e| invalid("names", e.to_string()))
}

/// Resolves the simulated window. The end defaults to `latest_data`, the
/// start to `days` calendar days before the end.
pub fn resolve_window(
    config: &dyn ConfigPort,
    latest_data: Option<NaiveDate>,
) -> Result<(NaiveDate, NaiveDate), RotatorError> {
    let end = match read_date(config, "backtest", "end_date")? {
        Some(end) => end,
        None => latest_data.ok_or_else(|| RotatorError::Data {
            reason: "no price data available for the configured universe".into(),
        })?,
    };
    let start = match read_date(config, "backtest", "start_date")? {
        Some(start) => start,
        None => {
            let days = read_int(config, "backtest", "days")?.unwrap_or(DEFAULT_BACKTEST_DAYS);
            Duration::try_days(days)
                .and_then(|span| end.checked_sub_signed(span))
                .ok_or_else(|| RotatorError::ConfigInvalid {
                    section: "backtest".into(),
                    key: "days".into(),
                    reason: format!("{} days before {} is out of range", days, end),
                })?
        }
    };
    if start >= end {
        return Err(RotatorError::ConfigInvalid {
            section: "backtest".into(),
            key: "start_date".into(),
            reason: format!("start {} is not before end {}", start, end),
        });
    }
    Ok((start, end))
}

/// `date` moved back `days` calendar days, clamped to the earliest date.
fn days_before(date: NaiveDate, days: i64) -> NaiveDate {
    Duration::try_days(days)
        .and_then(|span| date.checked_sub_signed(span))
        .unwrap_or(NaiveDate::MIN)
}

pub fn build_backtest_config(
    config: &dyn ConfigPort,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<BacktestConfig, RotatorError> {
    let mut bt = BacktestConfig::new(start_date);
    bt.end_date = Some(end_date);
    if let Some(v) = read_double(config, "backtest", "initial_capital")? {
        bt.initial_capital = v;
    }
    if let Some(v) = read_double(config, "backtest", "commission_rate")? {
        bt.commission_rate = v;
    }
    if let Some(v) = read_double(config, "backtest", "min_commission")? {
        bt.min_commission = v;
    }
    if let Some(v) = read_double(config, "backtest", "cash_annual_yield")? {
        bt.cash_annual_yield = v;
    }
    if let Some(v) = read_double(config, "backtest", "risk_free_rate")? {
        bt.risk_free_rate = v;
    }
    if let Some(v) = read_int(config, "backtest", "min_instruments")? {
        bt.min_instruments = usize::try_from(v).map_err(|_| RotatorError::ConfigInvalid {
            section: "backtest".into(),
            key: "min_instruments".into(),
            reason: "min_instruments must be at least 1".into(),
        })?;
    }
    Ok(bt)
}

pub fn build_report_options(
    config: &dyn ConfigPort,
    overrides: &Overrides,
) -> Result<ReportOptions, RotatorError> {
    let period: ChartPeriod = match overrides
        .period
        .clone()
        .or_else(|| read_string(config, "report", "period"))
    {
        Some(p) => p.parse().map_err(|reason| RotatorError::ConfigInvalid {
            section: "report".into(),
            key: "period".into(),
            reason,
        })?,
        None => ChartPeriod::default(),
    };
    let decision_limit = match overrides.limit {
        Some(n) => n,
        None => read_int(config, "report", "decision_limit")?
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(DEFAULT_DECISION_LIMIT),
    };
    let output = overrides
        .output
        .clone()
        .or_else(|| read_string(config, "report", "output"))
        .unwrap_or_else(|| STDOUT_PATH.to_string());
    Ok(ReportOptions {
        period,
        output,
        decision_limit,
    })
}

fn data_directory(config: &dyn ConfigPort) -> Result<PathBuf, RotatorError> {
    read_string(config, "data", "directory")
        .map(PathBuf::from)
        .ok_or_else(|| RotatorError::ConfigMissing {
            section: "data".into(),
            key: "directory".into(),
        })
}

/// Latest observation date across the universe, from the data port's ranges.
pub fn latest_data_date(data_port: &dyn DataPort, universe: &Universe) -> Option<NaiveDate> {
    universe
        .instruments
        .iter()
        .filter_map(|i| data_port.get_data_range(&i.code).ok().flatten())
        .map(|(_, last, _)| last)
        .max()
}

/// Loads data, runs the configured strategy and shapes the response.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    config: &dyn ConfigPort,
    overrides: &Overrides,
) -> Result<(BacktestResponse, ReportOptions), RotatorError> {
    let strategy = build_strategy_config(config, overrides.strategy.as_deref())?;
    let universe = build_universe(config)?;
    let options = build_report_options(config, overrides)?;

    let (start, end) = resolve_window(config, latest_data_date(data_port, &universe))?;
    let bt_config = build_backtest_config(config, start, end)?;

    eprintln!(
        "Running backtest: {} strategy, {} instruments, {} to {}",
        strategy.kind,
        universe.count(),
        start,
        end
    );

    let registry = StrategyRegistry::with_configs([strategy.clone()]);
    let engine = registry
        .get(strategy.kind)
        .ok_or_else(|| RotatorError::UnimplementedStrategy {
            strategy: strategy.kind.to_string(),
        })?;

    let loaded = load_universe(
        data_port,
        &universe,
        days_before(start, WARMUP_DAYS),
        end,
    );
    let mut response = engine.backtest_report(
        &loaded.series,
        loaded.benchmark.as_ref(),
        &bt_config,
        options.period,
        options.decision_limit,
    );
    if let BacktestResponse::Completed(report) = &mut response {
        report
            .skipped
            .extend(loaded.skipped.iter().map(|s| s.code.clone()));
        report.skipped.sort();
        report.skipped.dedup();
    }
    Ok((response, options))
}

/// Loads the trailing window and recommends a holding for the latest day.
pub fn run_recommend_pipeline(
    data_port: &dyn DataPort,
    config: &dyn ConfigPort,
    overrides: &Overrides,
) -> Result<RecommendationResponse, RotatorError> {
    let strategy = build_strategy_config(config, overrides.strategy.as_deref())?;
    let universe = build_universe(config)?;
    let end = match read_date(config, "backtest", "end_date")? {
        Some(end) => end,
        None => latest_data_date(data_port, &universe).ok_or_else(|| RotatorError::Data {
            reason: "no price data available for the configured universe".into(),
        })?,
    };

    eprintln!(
        "Scoring {} instruments with {} strategy as of {}",
        universe.count(),
        strategy.kind,
        end
    );

    let registry = StrategyRegistry::with_configs([strategy.clone()]);
    let engine = registry
        .get(strategy.kind)
        .ok_or_else(|| RotatorError::UnimplementedStrategy {
            strategy: strategy.kind.to_string(),
        })?;
    let loaded = load_universe(
        data_port,
        &universe,
        days_before(end, RECOMMENDATION_LOOKBACK_DAYS),
        end,
    );
    Ok(engine.recommendation_report(&loaded.series, loaded.benchmark.as_ref()))
}

pub fn backtest_exit_code(response: &BacktestResponse) -> ExitCode {
    match response {
        BacktestResponse::Completed(_) => ExitCode::SUCCESS,
        BacktestResponse::Unimplemented { .. } => ExitCode::from(6),
        BacktestResponse::Failed { .. } => ExitCode::from(5),
    }
}

pub fn recommendation_exit_code(response: &RecommendationResponse) -> ExitCode {
    match response {
        RecommendationResponse::Completed(_) => ExitCode::SUCCESS,
        RecommendationResponse::Unimplemented { .. } => ExitCode::from(6),
        RecommendationResponse::Failed { .. } => ExitCode::from(5),
    }
}

fn run_backtest(config_path: &Path, overrides: &Overrides) -> ExitCode {
    // Stage 1: Load and validate config
    let adapter = match load_and_validate(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    // Stage 2: Data port
    let data_dir = match data_directory(&adapter) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let data_port = CsvAdapter::new(data_dir);

    // Stage 3: Simulate
    let (response, options) = match run_backtest_pipeline(&data_port, &adapter, overrides) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 4: Console summary
    match &response {
        BacktestResponse::Completed(report) => {
            if let Some(metrics) = &report.metrics {
                eprintln!("\n=== Backtest Results ===");
                eprintln!("Period:           {} to {}", metrics.start_date, metrics.end_date);
                eprintln!("Total Return:     {:.2}%", metrics.total_return);
                eprintln!("Annualized:       {:.2}%", metrics.annual_return);
                eprintln!("Sharpe Ratio:     {:.2}", metrics.sharpe_ratio);
                eprintln!("Max Drawdown:     {:.2}%", metrics.max_drawdown);
                eprintln!("Trades:           {}", metrics.trade_count);
                eprintln!("Cash Ratio:       {:.2}%", metrics.cash_ratio);
                eprintln!("Final NAV:        {:.2}", metrics.final_nav);
            }
            if !report.skipped.is_empty() {
                eprintln!("Skipped:          {}", report.skipped.join(", "));
            }
        }
        BacktestResponse::Unimplemented { strategy } => {
            eprintln!("strategy '{}' is not implemented", strategy);
        }
        BacktestResponse::Failed { message, .. } => {
            eprintln!("backtest failed: {}", message);
        }
    }

    // Stage 5: Report
    if let Err(e) = JsonReportAdapter::new().write_backtest(&response, &options.output) {
        eprintln!("error: failed to write report: {e}");
        return (&e).into();
    }
    if options.output != STDOUT_PATH {
        eprintln!("\nReport written to: {}", options.output);
    }
    backtest_exit_code(&response)
}

fn run_recommend(config_path: &Path, overrides: &Overrides) -> ExitCode {
    let adapter = match load_and_validate(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let data_port = match data_directory(&adapter) {
        Ok(d) => CsvAdapter::new(d),
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let response = match run_recommend_pipeline(&data_port, &adapter, overrides) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    if let RecommendationResponse::Completed(rec) = &response {
        eprintln!(
            "\nRecommendation for {}: {} ({}), confidence {:.2}",
            rec.date, rec.recommendation, rec.recommend_name, rec.confidence
        );
        if let Some(reason) = &rec.cash_reason {
            eprintln!("Holding cash: {}", reason);
        }
    }

    let output = overrides
        .output
        .clone()
        .or_else(|| read_string(&adapter, "report", "output"))
        .unwrap_or_else(|| STDOUT_PATH.to_string());
    if let Err(e) = JsonReportAdapter::new().write_recommendation(&response, &output) {
        eprintln!("error: failed to write report: {e}");
        return (&e).into();
    }
    recommendation_exit_code(&response)
}

pub fn run_dry_run(config_path: &Path, overrides: &Overrides) -> ExitCode {
    let adapter = match load_and_validate(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    eprintln!("Config validated successfully");

    let resolved = build_strategy_config(&adapter, overrides.strategy.as_deref()).and_then(|s| {
        Ok((
            s,
            build_universe(&adapter)?,
            build_report_options(&adapter, overrides)?,
        ))
    });
    let (strategy, universe, options) = match resolved {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!("\nStrategy: {}", strategy.kind);
    if !strategy.kind.is_production_ready() {
        eprintln!("  warning: this strategy is not implemented and will not run");
    }
    eprintln!("  cash_threshold:        {}", strategy.cash_threshold);
    eprintln!("  market_bear_threshold: {}", strategy.market_bear_threshold);
    eprintln!("  max_volatility:        {}", strategy.max_volatility);
    eprintln!("  ma_stop_loss:          {}", strategy.ma_stop_loss);
    for (feature, weight) in &strategy.weights {
        eprintln!("  weight {}: {}", feature, weight);
    }

    eprintln!("\nUniverse:");
    for instrument in &universe.instruments {
        eprintln!("  {}  {}", instrument.code, instrument.name);
    }
    if let Some(bench) = &universe.benchmark {
        eprintln!("  benchmark: {}", bench.code);
    }

    eprintln!("\nReport: period {}, output {}", options.period, options.output);
    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    match load_and_validate(config_path) {
        Ok(adapter) => {
            for section in adapter.sections() {
                if !KNOWN_SECTIONS.contains(&section.as_str()) {
                    warn!(section = section.as_str(), "ignoring unknown config section");
                }
            }
            eprintln!("Configuration is valid.");
            ExitCode::SUCCESS
        }
        Err(code) => code,
    }
}

fn run_list_symbols(data_dir: Option<&Path>, config_path: Option<&Path>) -> ExitCode {
    let directory = match (data_dir, config_path) {
        (Some(dir), _) => dir.to_path_buf(),
        (None, Some(path)) => {
            let config = match load_config(path) {
                Ok(c) => c,
                Err(code) => return code,
            };
            match data_directory(&config) {
                Ok(d) => d,
                Err(e) => {
                    eprintln!("error: {e}");
                    return (&e).into();
                }
            }
        }
        (None, None) => {
            eprintln!("error: --data-dir or --config is required for list-symbols");
            return ExitCode::from(2);
        }
    };

    let symbols = match CsvAdapter::new(directory.clone()).list_symbols() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    if symbols.is_empty() {
        eprintln!("No symbols found in {}", directory.display());
    } else {
        for symbol in &symbols {
            println!("{}", symbol);
        }
        eprintln!("{} symbols found", symbols.len());
    }
    ExitCode::SUCCESS
}

fn run_info(config_path: &Path, code: Option<&str>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let (data_port, codes) = match data_directory(&config).and_then(|dir| {
        let codes = match code {
            Some(c) => vec![c.trim().to_uppercase()],
            None => build_universe(&config)?
                .instruments
                .into_iter()
                .map(|i| i.code)
                .collect(),
        };
        Ok((CsvAdapter::new(dir), codes))
    }) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    for c in &codes {
        match data_port.get_data_range(c) {
            Ok(Some((first, last, count))) => {
                println!("{}: {} observations, {} to {}", c, count, first, last);
            }
            Ok(None) => eprintln!("{}: no data found", c),
            Err(e) => eprintln!("error querying {}: {}", c, e),
        }
    }
    ExitCode::SUCCESS
}
