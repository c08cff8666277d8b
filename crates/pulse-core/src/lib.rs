//! Shared domain types for stock-pulse: source records, filters, dashboard
//! shapes, lenient numeric coercion, unit conversion and CLI settings.

pub mod data_processors;
pub mod error;
pub mod formatting;
pub mod models;
pub mod notifications;
pub mod settings;
pub mod time_utils;
pub mod units;
