//! Price data access port.

use crate::domain::error::RotatorError;
use crate::domain::price::PricePoint;
use chrono::NaiveDate;

pub trait DataPort {
    /// Valid price points for `code` dated within `[start_date, end_date]`,
    /// ascending by date.
    fn fetch_prices(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PricePoint>, RotatorError>;

    fn list_symbols(&self) -> Result<Vec<String>, RotatorError>;

    /// First date, last date and observation count, or `None` when the code
    /// has no data.
    fn get_data_range(
        &self,
        code: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, RotatorError>;
}
