//! Ingestion entry point: raw upload bytes → stored, parsed source data.
//!
//! Each call handles exactly one source. A rejected or empty upload leaves
//! every stored value untouched, so the three sources never affect each
//! other's state.

use std::path::Path;

use pulse_core::error::{PulseError, Result};
use pulse_core::models::SourceType;
use pulse_core::notifications::{DataUploaded, Publisher};
use pulse_data::pivot::extract_pivot_totals;
use pulse_data::reader::{parse_records, ParseOptions};
use serde::Serialize;
use tracing::info;

use crate::store::KeyValueStore;

const CSV_CONTENT_TYPE: &str = "text/csv";

/// Successful ingestion summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutcome {
    pub source_type: SourceType,
    pub storage_key: String,
    pub record_count: usize,
}

/// `true` when the upload is a CSV by content type or file name.
pub fn is_csv(file_name: &str, content_type: Option<&str>) -> bool {
    let by_type = content_type
        .map(|t| t.trim().eq_ignore_ascii_case(CSV_CONTENT_TYPE))
        .unwrap_or(false);
    by_type || file_name.to_ascii_lowercase().ends_with(".csv")
}

/// Parse `bytes` as `source`, store the result and publish a data event.
///
/// Rejects non-CSV uploads before parsing and uploads that parse to
/// nothing before storing.
pub fn ingest(
    store: &dyn KeyValueStore,
    publisher: &dyn Publisher,
    source: SourceType,
    file_name: &str,
    content_type: Option<&str>,
    bytes: &[u8],
) -> Result<IngestOutcome> {
    if !is_csv(file_name, content_type) {
        return Err(PulseError::WrongFileType {
            file_name: file_name.to_string(),
        });
    }

    let text = String::from_utf8_lossy(bytes);
    let (json, record_count) = if source.is_pivot() {
        let totals = extract_pivot_totals(&text);
        (serde_json::to_string(&totals)?, totals.cell_count())
    } else {
        let records = parse_records(&text, &ParseOptions::default());
        (serde_json::to_string(&records)?, records.len())
    };

    if record_count == 0 {
        return Err(PulseError::NoRecords {
            source_type: source,
        });
    }

    let storage_key = source.storage_key();
    store.put(storage_key, &json)?;

    let event = DataUploaded {
        source_type: source,
        storage_key: storage_key.to_string(),
        record_count,
    };
    publisher.publish(&event);

    info!(
        source = %source,
        file = file_name,
        records = record_count,
        key = storage_key,
        "ingested upload"
    );

    Ok(IngestOutcome {
        source_type: source,
        storage_key: storage_key.to_string(),
        record_count,
    })
}

/// Read `path` asynchronously and [`ingest`] it. The content type is
/// unknown, so the file name decides whether it is a CSV.
pub async fn ingest_path(
    store: &dyn KeyValueStore,
    publisher: &dyn Publisher,
    source: SourceType,
    path: &Path,
) -> Result<IngestOutcome> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    // Reject before touching the disk.
    if !is_csv(&file_name, None) {
        return Err(PulseError::WrongFileType { file_name });
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| PulseError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

    ingest(store, publisher, source, &file_name, None, &bytes)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
