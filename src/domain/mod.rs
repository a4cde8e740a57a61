//! Core domain types and logic.

pub mod backtest;
pub mod chart;
pub mod config_validation;
pub mod engine;
pub mod error;
pub mod execution;
pub mod feature;
pub mod indicator;
pub mod metrics;
pub mod portfolio;
pub mod price;
pub mod recommendation;
pub mod rounding;
pub mod scoring;
pub mod strategy;
pub mod universe;
