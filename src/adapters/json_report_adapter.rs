//! JSON report adapter.

use crate::domain::engine::{BacktestResponse, RecommendationResponse};
use crate::domain::error::RotatorError;
use crate::ports::report_port::ReportPort;
use serde::Serialize;
use std::fs;
use std::io::Write;

/// Path that sends the report to stdout instead of a file.
pub const STDOUT_PATH: &str = "-";

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonReportAdapter {
    pub compact: bool,
}

impl JsonReportAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render<T: Serialize>(&self, value: &T) -> Result<String, RotatorError> {
        let json = if self.compact {
            serde_json::to_string(value)?
        } else {
            serde_json::to_string_pretty(value)?
        };
        Ok(json)
    }

    fn emit<T: Serialize>(&self, value: &T, output_path: &str) -> Result<(), RotatorError> {
        let mut json = self.render(value)?;
        json.push('\n');
        if output_path == STDOUT_PATH {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(json.as_bytes())?;
            stdout.flush()?;
        } else {
            fs::write(output_path, json)?;
        }
        Ok(())
    }
}

impl ReportPort for JsonReportAdapter {
    fn write_backtest(
        &self,
        response: &BacktestResponse,
        output_path: &str,
    ) -> Result<(), RotatorError> {
        self.emit(response, output_path)
    }

    fn write_recommendation(
        &self,
        response: &RecommendationResponse,
        output_path: &str,
    ) -> Result<(), RotatorError> {
        self.emit(response, output_path)
    }
}
