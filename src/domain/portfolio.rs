//! Single-holding portfolio state for the rotation simulator.

use serde::{Serialize, Serializer};
use std::fmt;

/// Label shown for every flat state.
pub const CASH_LABEL: &str = "CASH";

/// What the portfolio holds between two decisions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Holding {
    /// Before the first decision; economically identical to [`Holding::Cash`].
    #[default]
    Unallocated,
    Cash,
    Instrument(String),
}

impl Holding {
    pub fn is_flat(&self) -> bool {
        !matches!(self, Holding::Instrument(_))
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Holding::Instrument(code) => Some(code),
            _ => None,
        }
    }

    pub fn label(&self) -> &str {
        self.code().unwrap_or(CASH_LABEL)
    }
}

impl fmt::Display for Holding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Holding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub shares: f64,
    pub holding: Holding,
    pub initial_capital: f64,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            shares: 0.0,
            holding: Holding::Unallocated,
            initial_capital,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.holding.is_flat()
    }

    /// Net asset value: marked-to-close shares when invested, cash otherwise.
    pub fn nav(&self, close: Option<f64>) -> f64 {
        match (&self.holding, close) {
            (Holding::Instrument(_), Some(price)) => self.shares * price,
            _ => self.cash,
        }
    }

    /// Compounds idle cash by one trading day; no-op when invested.
    pub fn accrue_cash_yield(&mut self, daily_rate: f64) {
        if self.is_flat() {
            self.cash *= 1.0 + daily_rate;
        }
    }

    pub fn return_pct(&self, nav: f64) -> f64 {
        if self.initial_capital > 0.0 {
            (nav / self.initial_capital - 1.0) * 100.0
        } else {
            0.0
        }
    }
}
