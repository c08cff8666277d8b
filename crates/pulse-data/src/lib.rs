//! Parsing and aggregation for stock-pulse.
//!
//! Turns raw CSV text into records or pivot totals, folds stock rows into
//! filtered bucket totals, and builds the month-aligned dashboard series.

pub mod aggregator;
pub mod analysis;
pub mod export;
pub mod pivot;
pub mod reader;

pub use pulse_core as core;
