//! Delimited text parsing for back-office CSV exports.
//!
//! Cells are tokenized by the `csv` crate. [`parse_records`] feeds it one
//! physical line at a time for conventional single-header tables;
//! [`split_rows`] feeds it whole rows (a quoted field may span lines) for the
//! pivot extractor. Neither ever fails: malformed quoting is read best-effort.

use pulse_core::models::Record;
use tracing::debug;

const BOM: char = '\u{feff}';

// ── ParseOptions ──────────────────────────────────────────────────────────────

/// Options for [`parse_records`].
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    pub delimiter: u8,
    /// When `false`, blank body lines become all-empty records.
    pub skip_empty_lines: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            skip_empty_lines: true,
        }
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Parse `text` into records keyed by the first non-blank line's cells.
///
/// Short rows are right-padded with `""`; cells beyond the header width are
/// dropped. Empty or whitespace-only input yields no records.
pub fn parse_records(text: &str, options: &ParseOptions) -> Vec<Record> {
    let normalized = normalize_line_endings(text);
    let mut lines = normalized.trim_start_matches(BOM).split('\n');

    let Some(header_line) = lines.by_ref().find(|l| !is_blank(l)) else {
        return Vec::new();
    };
    let headers = split_line(header_line, options.delimiter);

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for line in lines {
        if options.skip_empty_lines && is_blank(line) {
            skipped += 1;
            continue;
        }
        let cells = split_line(line, options.delimiter);
        let record: Record = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), cells.get(i).cloned().unwrap_or_default()))
            .collect();
        records.push(record);
    }

    debug!(
        columns = headers.len(),
        records = records.len(),
        blank_lines_skipped = skipped,
        "parsed delimited records"
    );
    records
}

/// Split `text` into raw trimmed cell rows without header inference.
///
/// Blank lines are kept as empty rows because they delimit pivot blocks. A
/// line break inside a quoted field belongs to that field.
pub fn split_rows(text: &str, delimiter: u8) -> Vec<Vec<String>> {
    let normalized = normalize_line_endings(text);
    let body = normalized.trim_start_matches(BOM);
    quoted_rows(body, delimiter)
        .into_iter()
        .map(|row| {
            if is_blank(row) {
                Vec::new()
            } else {
                split_line(row, delimiter)
            }
        })
        .collect()
}

/// Split one row into trimmed cells, honouring double-quoted fields.
///
/// Inside quotes, `""` is a literal quote and the delimiter is ordinary
/// text. An unterminated quote runs to the end of the row.
pub fn split_line(line: &str, delimiter: u8) -> Vec<String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .delimiter(delimiter)
        .from_reader(line.as_bytes());

    let mut cells = Vec::new();
    for record in reader.records() {
        match record {
            Ok(record) => cells.extend(record.iter().map(str::to_string)),
            Err(e) => {
                debug!(error = %e, "unreadable cell data; keeping cells read so far");
                break;
            }
        }
    }
    cells
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Cut `text` at line breaks that fall outside a quoted field.
///
/// A quote opens a field only at the start of that field, the same rule the
/// `csv` tokenizer applies, so stray quotes inside bare text are literal.
fn quoted_rows(text: &str, delimiter: u8) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut rows = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut field_start = true;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if in_quotes {
            if b == b'"' {
                if bytes.get(i + 1) == Some(&b'"') {
                    i += 1;
                } else {
                    in_quotes = false;
                }
            }
        } else if b == b'\n' {
            rows.push(&text[start..i]);
            start = i + 1;
            field_start = true;
        } else if b == delimiter {
            field_start = true;
        } else if b == b'"' && field_start {
            in_quotes = true;
            field_start = false;
        } else {
            field_start = false;
        }
        i += 1;
    }

    // A trailing newline does not open another row.
    if start < bytes.len() {
        rows.push(&text[start..]);
    }
    rows
}

// ── Tests ─────────────────────────────────────────────────────────────────────
