//! Configuration validation.
//!
//! Validates every recognised key before a run. Absent keys fall back to
//! defaults; present keys must parse and lie in range.

use crate::domain::chart::ChartPeriod;
use crate::domain::error::RotatorError;
use crate::domain::strategy::{StrategyKind, parse_weights};
use crate::domain::universe::{parse_codes, parse_names};
use crate::ports::config_port::{ConfigPort, parse_bool};
use chrono::NaiveDate;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Upper bound for `[backtest] days`, about a century of calendar days.
pub const MAX_BACKTEST_DAYS: i64 = 36_500;

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> RotatorError {
    RotatorError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// A present, non-blank value.
pub fn read_string(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn read_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, RotatorError> {
    match read_string(config, section, key) {
        None => Ok(None),
        Some(s) => s
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| invalid(section, key, format!("'{}' is not a number", s))),
    }
}

pub fn read_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<i64>, RotatorError> {
    match read_string(config, section, key) {
        None => Ok(None),
        Some(s) => s
            .parse::<i64>()
            .map(Some)
            .map_err(|_| invalid(section, key, format!("'{}' is not an integer", s))),
    }
}

pub fn read_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<NaiveDate>, RotatorError> {
    match read_string(config, section, key) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(&s, DATE_FORMAT)
            .map(Some)
            .map_err(|_| invalid(section, key, "invalid date format, expected YYYY-MM-DD")),
    }
}

fn check_range(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    accept: impl Fn(f64) -> bool,
    reason: &str,
) -> Result<(), RotatorError> {
    match read_double(config, section, key)? {
        Some(v) if !accept(v) => Err(invalid(section, key, reason)),
        _ => Ok(()),
    }
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), RotatorError> {
    check_range(
        config,
        "backtest",
        "initial_capital",
        |v| v > 0.0,
        "initial_capital must be positive",
    )?;
    check_range(
        config,
        "backtest",
        "commission_rate",
        |v| (0.0..1.0).contains(&v),
        "commission_rate must be between 0 and 1",
    )?;
    check_range(
        config,
        "backtest",
        "min_commission",
        |v| v >= 0.0,
        "min_commission must be non-negative",
    )?;
    check_range(
        config,
        "backtest",
        "cash_annual_yield",
        |v| (0.0..1.0).contains(&v),
        "cash_annual_yield must be between 0 and 1",
    )?;
    check_range(
        config,
        "backtest",
        "risk_free_rate",
        |v| (0.0..1.0).contains(&v),
        "risk_free_rate must be between 0 and 1",
    )?;
    validate_dates(config)?;

    if let Some(n) = read_int(config, "backtest", "days")? {
        if !(2..=MAX_BACKTEST_DAYS).contains(&n) {
            return Err(invalid(
                "backtest",
                "days",
                format!("days must be between 2 and {}", MAX_BACKTEST_DAYS),
            ));
        }
    }
    if let Some(n) = read_int(config, "backtest", "min_instruments")? {
        if n < 1 {
            return Err(invalid(
                "backtest",
                "min_instruments",
                "min_instruments must be at least 1",
            ));
        }
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), RotatorError> {
    let start = read_date(config, "backtest", "start_date")?;
    let end = read_date(config, "backtest", "end_date")?;
    if let (Some(start), Some(end)) = (start, end) {
        if start >= end {
            return Err(invalid(
                "backtest",
                "start_date",
                "start_date must be before end_date",
            ));
        }
    }
    Ok(())
}

pub fn validate_universe_config(config: &dyn ConfigPort) -> Result<(), RotatorError> {
    let codes = match read_string(config, "universe", "codes") {
        Some(s) => Some(parse_codes(&s).map_err(|e| invalid("universe", "codes", e.to_string()))?),
        None => None,
    };
    if let Some(s) = read_string(config, "universe", "names") {
        let names = parse_names(&s).map_err(|e| invalid("universe", "names", e.to_string()))?;
        let Some(codes) = codes else {
            return Err(RotatorError::ConfigMissing {
                section: "universe".to_string(),
                key: "codes".to_string(),
            });
        };
        if names.len() != codes.len() {
            return Err(invalid(
                "universe",
                "names",
                format!("{} names for {} codes", names.len(), codes.len()),
            ));
        }
    }
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), RotatorError> {
    match read_string(config, "data", "directory") {
        Some(_) => Ok(()),
        None => Err(RotatorError::ConfigMissing {
            section: "data".to_string(),
            key: "directory".to_string(),
        }),
    }
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), RotatorError> {
    if let Some(kind) = read_string(config, "strategy", "kind") {
        kind.parse::<StrategyKind>()
            .map_err(|e| invalid("strategy", "kind", e))?;
    }
    check_range(
        config,
        "strategy",
        "cash_threshold",
        |v| (0.0..=100.0).contains(&v),
        "cash_threshold must be between 0 and 100",
    )?;
    check_range(
        config,
        "strategy",
        "market_bear_threshold",
        |v| v > -1.0 && v < 1.0,
        "market_bear_threshold must be between -1 and 1",
    )?;
    check_range(
        config,
        "strategy",
        "max_volatility",
        |v| v > 0.0,
        "max_volatility must be positive",
    )?;
    if let Some(s) = read_string(config, "strategy", "ma_stop_loss") {
        if parse_bool(&s).is_none() {
            return Err(invalid("strategy", "ma_stop_loss", "expected a boolean"));
        }
    }
    if let Some(s) = read_string(config, "strategy", "weights") {
        parse_weights(&s).map_err(|e| invalid("strategy", "weights", e))?;
    }
    Ok(())
}

pub fn validate_report_config(config: &dyn ConfigPort) -> Result<(), RotatorError> {
    if let Some(p) = read_string(config, "report", "period") {
        p.parse::<ChartPeriod>()
            .map_err(|e| invalid("report", "period", e))?;
    }
    if let Some(n) = read_int(config, "report", "decision_limit")? {
        if n < 1 {
            return Err(invalid(
                "report",
                "decision_limit",
                "decision_limit must be at least 1",
            ));
        }
    }
    Ok(())
}

/// Every section a run reads.
pub fn validate_all(config: &dyn ConfigPort) -> Result<(), RotatorError> {
    validate_backtest_config(config)?;
    validate_universe_config(config)?;
    validate_data_config(config)?;
    validate_strategy_config(config)?;
    validate_report_config(config)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn invalid_key(err: RotatorError) -> String {
        match err {
            RotatorError::ConfigInvalid { key, .. } => key,
            other => panic!("expected ConfigInvalid, got {other:?}"),
        }
    }

    #[test]
    fn full_config_passes() {
        let config = make_config(
            r#"
[backtest]
start_date = 2023-01-01
end_date = 2024-01-01
initial_capital = 100000
commission_rate = 0.0001
min_commission = 5
cash_annual_yield = 0.02
risk_free_rate = 0.03
min_instruments = 5

[universe]
codes = 510300,510500,159915
names = CSI 300,CSI 500,ChiNext
benchmark = 510300

[data]
directory = ./data

[strategy]
kind = balanced
cash_threshold = 45
max_volatility = 0.03
ma_stop_loss = no
weights = return_5:0.3,volatility:-0.1

[report]
period = year
"#,
        );
        assert!(validate_all(&config).is_ok());
    }

    #[test]
    fn empty_sections_use_defaults() {
        let config = make_config("[data]\ndirectory = ./data\n");
        assert!(validate_all(&config).is_ok());
    }

    #[test]
    fn initial_capital_must_be_positive() {
        let config = make_config("[backtest]\ninitial_capital = 0\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert_eq!(invalid_key(err), "initial_capital");
    }

    #[test]
    fn unparseable_number_is_rejected() {
        let config = make_config("[backtest]\ninitial_capital = lots\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert_eq!(invalid_key(err), "initial_capital");
    }

    #[test]
    fn commission_rate_range() {
        let config = make_config("[backtest]\ncommission_rate = -0.1\n");
        assert_eq!(invalid_key(validate_backtest_config(&config).unwrap_err()), "commission_rate");
    }

    #[test]
    fn min_commission_negative_fails() {
        let config = make_config("[backtest]\nmin_commission = -5\n");
        assert_eq!(invalid_key(validate_backtest_config(&config).unwrap_err()), "min_commission");
    }

    #[test]
    fn risk_free_rate_out_of_range_fails() {
        let config = make_config("[backtest]\nrisk_free_rate = 1.5\n");
        assert_eq!(invalid_key(validate_backtest_config(&config).unwrap_err()), "risk_free_rate");
    }

    #[test]
    fn invalid_date_format_fails() {
        let config = make_config("[backtest]\nstart_date = 2020/01/01\n");
        assert_eq!(invalid_key(validate_backtest_config(&config).unwrap_err()), "start_date");
    }

    #[test]
    fn start_after_end_fails() {
        let config = make_config("[backtest]\nstart_date = 2024-12-31\nend_date = 2020-01-01\n");
        assert_eq!(invalid_key(validate_backtest_config(&config).unwrap_err()), "start_date");
    }

    #[test]
    fn days_must_cover_two_sessions() {
        let config = make_config("[backtest]\ndays = 1\n");
        assert_eq!(invalid_key(validate_backtest_config(&config).unwrap_err()), "days");
    }

    #[test]
    fn days_are_capped() {
        let config = make_config(&format!("[backtest]\ndays = {}\n", MAX_BACKTEST_DAYS));
        assert!(validate_backtest_config(&config).is_ok());
        let config = make_config(&format!("[backtest]\ndays = {}\n", MAX_BACKTEST_DAYS + 1));
        assert_eq!(invalid_key(validate_backtest_config(&config).unwrap_err()), "days");
    }

    #[test]
    fn duplicate_codes_fail() {
        let config = make_config("[universe]\ncodes = 510300,510300\n");
        assert_eq!(invalid_key(validate_universe_config(&config).unwrap_err()), "codes");
    }

    #[test]
    fn names_must_match_codes() {
        let config = make_config("[universe]\ncodes = A,B\nnames = a\n");
        assert_eq!(invalid_key(validate_universe_config(&config).unwrap_err()), "names");
    }

    #[test]
    fn names_without_codes_fail() {
        let config = make_config("[universe]\nnames = a,b\n");
        let err = validate_universe_config(&config).unwrap_err();
        assert!(matches!(err, RotatorError::ConfigMissing { key, .. } if key == "codes"));
    }

    #[test]
    fn missing_data_directory_fails() {
        let config = make_config("[backtest]\n");
        let err = validate_data_config(&config).unwrap_err();
        assert!(matches!(err, RotatorError::ConfigMissing { key, .. } if key == "directory"));
    }

    #[test]
    fn unknown_strategy_fails() {
        let config = make_config("[strategy]\nkind = aggressive\n");
        assert_eq!(invalid_key(validate_strategy_config(&config).unwrap_err()), "kind");
    }

    #[test]
    fn growth_kind_passes_validation() {
        let config = make_config("[strategy]\nkind = growth\n");
        assert!(validate_strategy_config(&config).is_ok());
    }

    #[test]
    fn max_volatility_must_be_positive() {
        let config = make_config("[strategy]\nmax_volatility = 0\n");
        assert_eq!(invalid_key(validate_strategy_config(&config).unwrap_err()), "max_volatility");
    }

    #[test]
    fn cash_threshold_range() {
        let config = make_config("[strategy]\ncash_threshold = 101\n");
        assert_eq!(invalid_key(validate_strategy_config(&config).unwrap_err()), "cash_threshold");
    }

    #[test]
    fn bad_weights_fail() {
        let config = make_config("[strategy]\nweights = return_5=0.3\n");
        assert_eq!(invalid_key(validate_strategy_config(&config).unwrap_err()), "weights");
    }

    #[test]
    fn bad_boolean_fails() {
        let config = make_config("[strategy]\nma_stop_loss = maybe\n");
        assert_eq!(invalid_key(validate_strategy_config(&config).unwrap_err()), "ma_stop_loss");
    }

    #[test]
    fn unknown_period_fails() {
        let config = make_config("[report]\nperiod = decade\n");
        assert_eq!(invalid_key(validate_report_config(&config).unwrap_err()), "period");
    }
}
