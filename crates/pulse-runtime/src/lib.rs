//! Runtime layer for stock-pulse.
//!
//! Owns the key/value store boundary, the ingestion entry point, the cached
//! dashboard manager and the async watch loop.

pub mod data_manager;
pub mod ingest;
pub mod orchestrator;
pub mod store;

pub use pulse_core as core;
pub use pulse_data as data;
