//! Fill simulation at the open: full-position sells and all-in buys.
//!
//! Every leg pays `max(value * commission_rate, min_commission)`. Buys take
//! the commission out of available cash and invest the remainder in
//! fractional shares.

use super::portfolio::{Holding, Portfolio};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionConfig {
    pub commission_rate: f64,
    pub min_commission: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            commission_rate: 0.0001,
            min_commission: 5.0,
        }
    }
}

pub fn calculate_commission(trade_value: f64, config: &ExecutionConfig) -> f64 {
    (trade_value * config.commission_rate).max(config.min_commission)
}

/// One executed leg.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub code: String,
    pub price: f64,
    pub shares: f64,
    /// Gross value of the shares at the fill price.
    pub value: f64,
    pub commission: f64,
}

/// Sells the whole position at `open`. The portfolio ends FLAT in
/// [`Holding::Cash`]. Returns `None` when nothing is held.
pub fn sell_all(portfolio: &mut Portfolio, open: f64, config: &ExecutionConfig) -> Option<Fill> {
    let code = portfolio.holding.code()?.to_string();

    let value = portfolio.shares * open;
    let commission = calculate_commission(value, config);
    let fill = Fill {
        code,
        price: open,
        shares: portfolio.shares,
        value,
        commission,
    };

    portfolio.cash += value - commission;
    portfolio.shares = 0.0;
    portfolio.holding = Holding::Cash;

    Some(fill)
}

/// Invests all cash in `code` at `open`. Returns `None`, leaving the
/// portfolio untouched, when cash does not exceed the commission or the price
/// is not positive.
pub fn buy_all(
    portfolio: &mut Portfolio,
    code: &str,
    open: f64,
    config: &ExecutionConfig,
) -> Option<Fill> {
    if open <= 0.0 || !open.is_finite() {
        return None;
    }
    let commission = calculate_commission(portfolio.cash, config);
    let investable = portfolio.cash - commission;
    if investable <= 0.0 {
        return None;
    }

    let shares = investable / open;
    portfolio.cash = 0.0;
    portfolio.shares = shares;
    portfolio.holding = Holding::Instrument(code.to_string());

    Some(Fill {
        code: code.to_string(),
        price: open,
        shares,
        value: investable,
        commission,
    })
}
