//! Recovery of monthly totals from multi-block pivot sheets.
//!
//! Distributor sales reports stack several pivot tables in one CSV. Each
//! table starts with a header row whose cells name a month and year
//! (`22-Jan`, `Jan-2022`, ...); the rows beneath it, up to a blank row or
//! the next header row, are summed per column into [`MonthlyTotals`].

use std::collections::BTreeMap;
use std::sync::OnceLock;

use pulse_core::data_processors::NumberParser;
use pulse_core::models::{Month, MonthlyTotals};
use pulse_core::time_utils::resolve_year;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::reader::split_rows;

/// First cells of roll-up rows that would double-count if summed.
const SUMMARY_LABELS: [&str; 4] = ["Totals", "Total", "Grand Total", "Compared to Month PY"];

fn year_month_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:\d{2,4}-[a-z]{3}|[a-z]{3}-\d{2,4})$").expect("regex is valid")
    })
}

// ── Types ─────────────────────────────────────────────────────────────────────

/// One output column of a header block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderColumn {
    pub index: usize,
    pub year: i32,
    pub month: Month,
}

/// Columns discovered in one header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderBlock {
    pub columns: Vec<HeaderColumn>,
}

/// Extraction result: the same totals as a nested map and as a flat
/// `"YYYY-MM"` index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotTotals {
    pub totals_by_year: MonthlyTotals,
    pub totals_by_index: BTreeMap<String, f64>,
}

impl PivotTotals {
    fn from_totals(totals: MonthlyTotals) -> Self {
        let totals_by_year = totals.rounded();
        let totals_by_index = totals_by_year.by_index();
        Self {
            totals_by_year,
            totals_by_index,
        }
    }

    /// Number of `(year, month)` cells holding a value.
    pub fn cell_count(&self) -> usize {
        self.totals_by_year.cell_count()
    }
}

// ── Header detection ──────────────────────────────────────────────────────────

/// `true` when `cell` looks like a month-year label.
pub fn is_year_month_label(cell: &str) -> bool {
    year_month_regex().is_match(cell.trim())
}

/// `true` when any cell of `row` looks like a month-year label.
pub fn is_header_row(row: &[String]) -> bool {
    row.iter().any(|c| is_year_month_label(c))
}

/// Resolve a label such as `22-Jan` or `Jan-2022` into `(year, month)`.
///
/// `None` when the label does not match or the month token is not a month.
pub fn parse_year_month(label: &str) -> Option<(i32, Month)> {
    let label = label.trim();
    if !is_year_month_label(label) {
        return None;
    }
    let (left, right) = label.split_once('-')?;
    let (year_token, month_token) = if left.starts_with(|c: char| c.is_ascii_digit()) {
        (left, right)
    } else {
        (right, left)
    };
    Some((resolve_year(year_token)?, Month::from_prefix(month_token)?))
}

/// Column mapping for `row`, `None` when no cell resolves to a month.
pub fn detect_header(row: &[String]) -> Option<HeaderBlock> {
    let columns: Vec<HeaderColumn> = row
        .iter()
        .enumerate()
        .filter_map(|(index, cell)| {
            parse_year_month(cell).map(|(year, month)| HeaderColumn { index, year, month })
        })
        .collect();

    if columns.is_empty() {
        None
    } else {
        Some(HeaderBlock { columns })
    }
}

/// `true` for roll-up rows that must not be summed.
pub fn is_summary_row(row: &[String]) -> bool {
    let first = row.first().map(|c| c.trim()).unwrap_or("");
    SUMMARY_LABELS.contains(&first) || starts_with_ignore_case(first, "compared to")
}

// ── Extraction ────────────────────────────────────────────────────────────────

/// Extract monthly totals from pivot-shaped CSV `text`.
///
/// Contributions for the same `(year, month)` from any block or column are
/// summed; totals are rounded to two decimals once, at the end.
pub fn extract_pivot_totals(text: &str) -> PivotTotals {
    let rows = split_rows(text, b',');
    let totals = accumulate_blocks(&rows);
    PivotTotals::from_totals(totals)
}

fn accumulate_blocks(rows: &[Vec<String>]) -> MonthlyTotals {
    let mut totals = MonthlyTotals::new();
    let mut blocks = 0usize;
    let mut body_rows = 0usize;
    let mut skipped = 0usize;

    let mut i = 0;
    while i < rows.len() {
        let Some(block) = detect_header(&rows[i]) else {
            i += 1;
            continue;
        };
        blocks += 1;

        let mut r = i + 1;
        while r < rows.len() {
            let row = &rows[r];
            if is_blank_row(row) || is_header_row(row) {
                break;
            }
            if is_summary_row(row) {
                skipped += 1;
            } else {
                body_rows += 1;
                for col in &block.columns {
                    let raw = row.get(col.index).map(String::as_str).unwrap_or("");
                    totals.add(col.year, col.month, NumberParser::accounting(raw));
                }
            }
            r += 1;
        }

        // The terminator is either a blank row (nothing to detect) or the
        // next header, which the outer loop picks up.
        i = r.max(i + 1);
    }

    debug!(
        rows = rows.len(),
        blocks,
        body_rows,
        summary_rows_skipped = skipped,
        cells = totals.cell_count(),
        "extracted pivot totals"
    );
    totals
}

fn is_blank_row(row: &[String]) -> bool {
    row.iter().all(|c| c.is_empty())
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len()
        && s.is_char_boundary(prefix.len())
        && s[..prefix.len()].eq_ignore_ascii_case(prefix)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    // ── Header detection ──────────────────────────────────────────────────────

    #[test]
    fn test_label_shapes() {
        for label in ["22-Jan", "Jan-22", "2022-Jan", "Jan-2022", "jan-22", "22-JAN"] {
            assert!(is_year_month_label(label), "{label}");
        }
        for label in ["Jan 22", "January-2022", "22/01", "Item", "", "1-Jan"] {
            assert!(!is_year_month_label(label), "{label}");
        }
    }

    #[test]
    fn test_parse_year_month() {
        assert_eq!(parse_year_month("22-Jan"), Some((2022, Month::Jan)));
        assert_eq!(parse_year_month("Feb-22"), Some((2022, Month::Feb)));
        assert_eq!(parse_year_month("2021-dec"), Some((2021, Month::Dec)));
        assert_eq!(parse_year_month("Mar-98"), Some((1998, Month::Mar)));
        // Matches the shape but "Xyz" is not a month.
        assert_eq!(parse_year_month("Xyz-22"), None);
    }

    #[test]
    fn test_detect_header_keeps_column_indexes() {
        let block = detect_header(&cells(&["Item", "22-Jan", "", "Feb-22"])).unwrap();
        assert_eq!(
            block.columns,
            vec![
                HeaderColumn {
                    index: 1,
                    year: 2022,
                    month: Month::Jan,
                },
                HeaderColumn {
                    index: 3,
                    year: 2022,
                    month: Month::Feb,
                },
            ]
        );
    }

    #[test]
    fn test_detect_header_without_real_months() {
        assert!(detect_header(&cells(&["Item", "Abc-22"])).is_none());
        assert!(detect_header(&cells(&["Item", "Qty"])).is_none());
    }

    #[test]
    fn test_summary_rows() {
        for first in ["Totals", "Total", "Grand Total", "Compared to Month PY", "compared to LY"] {
            assert!(is_summary_row(&cells(&[first, "1"])), "{first}");
        }
        assert!(!is_summary_row(&cells(&["Totally Wine", "1"])));
        assert!(!is_summary_row(&[]));
    }

    // ── Extraction ────────────────────────────────────────────────────────────

    #[test]
    fn test_single_block_with_accounting_negative() {
        let result = extract_pivot_totals("Item,22-Jan,Feb-22\nWidget,10,(5)\n");

        assert_eq!(result.totals_by_year.get(2022, Month::Jan), Some(10.0));
        assert_eq!(result.totals_by_year.get(2022, Month::Feb), Some(-5.0));
        assert_eq!(result.totals_by_year.cell_count(), 2);

        let expected: BTreeMap<String, f64> =
            [("2022-01".to_string(), 10.0), ("2022-02".to_string(), -5.0)]
                .into_iter()
                .collect();
        assert_eq!(result.totals_by_index, expected);
    }

    #[test]
    fn test_json_shape() {
        let result = extract_pivot_totals("Item,22-Jan,Feb-22\nWidget,10,(5)\n");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["totalsByYear"]["2022"]["Jan"], 10.0);
        assert_eq!(json["totalsByYear"]["2022"]["Feb"], -5.0);
        assert_eq!(json["totalsByIndex"]["2022-01"], 10.0);

        let back: PivotTotals = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn test_thousands_separators_and_rounding() {
        let text = "Item,Jan-23\nA,\"1,234.555\"\nB,0.001\n";
        let result = extract_pivot_totals(text);
        assert_eq!(result.totals_by_year.get(2023, Month::Jan), Some(1234.56));
    }

    #[test]
    fn test_unparseable_cells_count_as_zero() {
        let result = extract_pivot_totals("Item,Jan-23\nA,n/a\nB,\nC,4\n");
        assert_eq!(result.totals_by_year.get(2023, Month::Jan), Some(4.0));
    }

    #[test]
    fn test_multiple_blocks_accumulate() {
        let text = "\
Region A,,
Item,Jan-23,Feb-23
Wine,1,2
Beer,3,4

Region B,,
Item,Jan-23,Mar-23
Wine,10,20
";
        let result = extract_pivot_totals(text);
        let t = &result.totals_by_year;
        assert_eq!(t.get(2023, Month::Jan), Some(14.0));
        assert_eq!(t.get(2023, Month::Feb), Some(6.0));
        assert_eq!(t.get(2023, Month::Mar), Some(20.0));
    }

    #[test]
    fn test_next_header_terminates_block_without_blank_row() {
        let text = "Item,Jan-23\nA,5\nItem,Jan-24\nA,7\n";
        let result = extract_pivot_totals(text);
        assert_eq!(result.totals_by_year.get(2023, Month::Jan), Some(5.0));
        assert_eq!(result.totals_by_year.get(2024, Month::Jan), Some(7.0));
    }

    #[test]
    fn test_rows_after_blank_row_are_not_summed() {
        let text = "Item,Jan-23\nA,5\n\nStray,100\n";
        let result = extract_pivot_totals(text);
        assert_eq!(result.totals_by_year.get(2023, Month::Jan), Some(5.0));
    }

    #[test]
    fn test_block_order_does_not_matter() {
        let a = "Item,Jan-23,Feb-23\nX,1.5,2\nY,3,(1)\n";
        let b = "Item,23-Mar,Jan-23\nZ,7,8.25\n";
        let forward = extract_pivot_totals(&format!("{a}\n{b}"));
        let reversed = extract_pivot_totals(&format!("{b}\n{a}"));
        assert_eq!(forward, reversed);
        assert_eq!(forward.totals_by_year.get(2023, Month::Jan), Some(12.75));
    }

    #[test]
    fn test_totals_row_does_not_contribute() {
        let with = "Item,Jan-23,Feb-23\nX,1,2\nTotals,999,999\nY,3,4\n";
        let without = "Item,Jan-23,Feb-23\nX,1,2\nY,3,4\n";
        assert_eq!(extract_pivot_totals(with), extract_pivot_totals(without));
    }

    #[test]
    fn test_compared_to_rows_skipped() {
        let text = "Item,Jan-23\nX,1\nCompared to Month PY,50\nCompared to last year,60\n";
        let result = extract_pivot_totals(text);
        assert_eq!(result.totals_by_year.get(2023, Month::Jan), Some(1.0));
    }

    #[test]
    fn test_no_header_rows_yields_empty() {
        let result = extract_pivot_totals("Item,Qty\nA,1\n");
        assert_eq!(result.cell_count(), 0);
        assert!(result.totals_by_index.is_empty());
        assert_eq!(extract_pivot_totals("").cell_count(), 0);
    }

    #[test]
    fn test_bom_and_crlf() {
        let result = extract_pivot_totals("\u{feff}Item,22-Jan\r\nWidget,10\r\n");
        assert_eq!(result.totals_by_year.get(2022, Month::Jan), Some(10.0));
    }

    #[test]
    fn test_quoted_label_spanning_lines_keeps_its_values() {
        let result = extract_pivot_totals("Item,Jan-23\n\"Wine\nRed\",5\n");
        assert_eq!(result.totals_by_index.get("2023-01"), Some(&5.0));
    }
}
