//! Report output port.

use crate::domain::engine::{BacktestResponse, RecommendationResponse};
use crate::domain::error::RotatorError;

pub trait ReportPort {
    fn write_backtest(
        &self,
        response: &BacktestResponse,
        output_path: &str,
    ) -> Result<(), RotatorError>;

    fn write_recommendation(
        &self,
        response: &RecommendationResponse,
        output_path: &str,
    ) -> Result<(), RotatorError>;
}
