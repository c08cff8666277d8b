/// Format a quantity with thousands separators and `decimals` places.
///
/// # Examples
///
/// ```
/// use pulse_core::formatting::format_quantity;
///
/// assert_eq!(format_quantity(1234.5, 1), "1,234.5");
/// assert_eq!(format_quantity(1234567.0, 0), "1,234,567");
/// assert_eq!(format_quantity(-9876.25, 2), "-9,876.25");
/// assert_eq!(format_quantity(0.0, 2), "0.00");
/// ```
pub fn format_quantity(value: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut grouped = group_thousands(int_part);
    if let Some(frac) = frac_part {
        grouped.push('.');
        grouped.push_str(frac);
    }

    // "-0" and "-0.00" read as noise.
    let is_zero = fixed.chars().all(|c| c == '0' || c == '.');
    if value < 0.0 && !is_zero {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Whole-case figure for KPI display, e.g. `"13,400 cases"`.
pub fn format_cases(value: f64) -> String {
    format!("{} cases", format_quantity(value, 0))
}

/// Insert `,` every three digits from the right.
fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
