//! Lenient numeric coercion for spreadsheet cells.
//!
//! Nothing here returns an error: a cell that cannot be read as a number is
//! worth zero.

// ── NumberParser ──────────────────────────────────────────────────────────────

/// Turns the assorted numeric spellings found in exports into `f64`.
pub struct NumberParser;

impl NumberParser {
    /// Parse a pivot-table cell.
    ///
    /// Handles:
    /// * thousands separators: `"1,234.5"` → `1234.5`
    /// * accounting negatives: `"(5)"` → `-5`
    /// * empty or unparseable text → `0`
    pub fn accounting(raw: &str) -> f64 {
        let cleaned: String = raw
            .trim()
            .chars()
            .filter(|c| *c != ',' && *c != ')')
            .map(|c| if c == '(' { '-' } else { c })
            .collect();
        let cleaned = cleaned.trim();

        if cleaned.is_empty() {
            return 0.0;
        }

        cleaned
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    }

    /// Parse a quantity cell using its longest leading numeric prefix.
    ///
    /// `"12"` → `12`, `"12.5 cases"` → `12.5`, `"-3e2"` → `-300`,
    /// `"n/a"` → `0`, `""` → `0`.
    pub fn leading_float(raw: &str) -> f64 {
        let s = raw.trim_start();
        let bytes = s.as_bytes();
        let mut end = 0;

        if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
            end += 1;
        }
        let int_start = end;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        let mut digits = end - int_start;

        if end < bytes.len() && bytes[end] == b'.' {
            let frac_start = end + 1;
            let mut frac_end = frac_start;
            while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
                frac_end += 1;
            }
            digits += frac_end - frac_start;
            if digits > 0 {
                end = frac_end;
            }
        }

        if digits == 0 {
            return 0.0;
        }

        // Optional exponent, only taken when it has at least one digit.
        if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
            let mut exp_end = end + 1;
            if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
                exp_end += 1;
            }
            let exp_digits_start = exp_end;
            while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
                exp_end += 1;
            }
            if exp_end > exp_digits_start {
                end = exp_end;
            }
        }

        s[..end]
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    }
}

// ── Rounding ──────────────────────────────────────────────────────────────────

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Round to the nearest integer, halves going towards positive infinity
/// (`2.5` → `3`, `-2.5` → `-2`).
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
