//! Per-source unit-of-measure conversion into canonical cases.
//!
//! Each back-office system spells its pack sizes differently, so every
//! stock source carries its own table. Labels not in a table pass the
//! quantity through unchanged.

use crate::data_processors::NumberParser;
use crate::models::{Record, SourceType};

/// How a unit label scales a raw quantity into cases.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnitOp {
    Multiply(f64),
    Divide(f64),
}

impl UnitOp {
    pub fn apply(self, quantity: f64) -> f64 {
        match self {
            UnitOp::Multiply(f) => quantity * f,
            UnitOp::Divide(d) => quantity / d,
        }
    }
}

/// Conversion table for one source system.
#[derive(Debug)]
pub struct UnitTable {
    /// Column holding the raw quantity.
    pub quantity_field: &'static str,
    /// Columns holding the unit label, first non-empty wins.
    pub unit_fields: &'static [&'static str],
    /// Unit label → conversion. Labels compare case-insensitively.
    pub conversions: &'static [(&'static str, UnitOp)],
}

/// Warehouse system: dozens count double, eaches are sixths of a case.
pub static MANHATTAN_UNITS: UnitTable = UnitTable {
    quantity_field: "Available",
    unit_fields: &["Units"],
    conversions: &[
        ("Dozen", UnitOp::Multiply(2.0)),
        ("Eaches", UnitOp::Divide(6.0)),
    ],
};

/// Inventory system: 12-packs double, single bottles halve, litres and
/// generic items are sixths of a case.
pub static CIN7_UNITS: UnitTable = UnitTable {
    quantity_field: "Available",
    unit_fields: &["Unit", "Units"],
    conversions: &[
        ("12x750ml", UnitOp::Multiply(2.0)),
        ("1x750ml", UnitOp::Divide(2.0)),
        ("Litre", UnitOp::Divide(6.0)),
        ("Item", UnitOp::Divide(6.0)),
    ],
};

impl UnitTable {
    /// Table for `source`, `None` for sources that carry no unit column.
    pub fn for_source(source: SourceType) -> Option<&'static UnitTable> {
        match source {
            SourceType::Cin7 => Some(&CIN7_UNITS),
            SourceType::Manhattan => Some(&MANHATTAN_UNITS),
            SourceType::Sales => None,
        }
    }

    /// Conversion registered for `unit`, if any.
    pub fn lookup(&self, unit: &str) -> Option<UnitOp> {
        let unit = unit.trim();
        self.conversions
            .iter()
            .find(|(label, _)| label.eq_ignore_ascii_case(unit))
            .map(|(_, op)| *op)
    }

    /// Convert `quantity` expressed in `unit` into cases.
    pub fn convert(&self, quantity: f64, unit: &str) -> f64 {
        match self.lookup(unit) {
            Some(op) => op.apply(quantity),
            None => quantity,
        }
    }

    /// Raw unit label of `record`, `""` when absent.
    pub fn unit_of<'r>(&self, record: &'r Record) -> &'r str {
        record.first_non_empty(self.unit_fields).unwrap_or("")
    }

    /// Canonical case quantity of `record`. Missing or non-numeric
    /// quantities are zero.
    pub fn normalize(&self, record: &Record) -> f64 {
        let quantity = NumberParser::leading_float(record.get_or_empty(self.quantity_field));
        self.convert(quantity, self.unit_of(record))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn row(available: &str, unit_field: &str, unit: &str) -> Record {
        [("Available", available), (unit_field, unit)]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_manhattan_dozen_doubles() {
        assert_eq!(MANHATTAN_UNITS.normalize(&row("3", "Units", "Dozen")), 6.0);
    }

    #[test]
    fn test_manhattan_eaches_divide_by_six() {
        assert_eq!(MANHATTAN_UNITS.normalize(&row("12", "Units", "Eaches")), 2.0);
    }

    #[test]
    fn test_cin7_conversions() {
        assert_eq!(CIN7_UNITS.normalize(&row("5", "Unit", "12x750ml")), 10.0);
        assert_eq!(CIN7_UNITS.normalize(&row("5", "Unit", "1x750ml")), 2.5);
        assert_eq!(CIN7_UNITS.normalize(&row("12", "Unit", "Litre")), 2.0);
        assert_eq!(CIN7_UNITS.normalize(&row("18", "Units", "Item")), 3.0);
    }

    #[test]
    fn test_unit_labels_are_case_insensitive() {
        assert_eq!(MANHATTAN_UNITS.convert(3.0, "dozen"), 6.0);
        assert_eq!(CIN7_UNITS.convert(6.0, " LITRE "), 1.0);
    }

    #[test]
    fn test_unknown_unit_passes_through() {
        assert_eq!(MANHATTAN_UNITS.normalize(&row("7", "Units", "Pallet")), 7.0);
        assert_eq!(CIN7_UNITS.normalize(&row("7", "Unit", "")), 7.0);
        assert_eq!(MANHATTAN_UNITS.lookup("12x750ml"), None);
    }

    #[test]
    fn test_non_numeric_quantity_is_zero() {
        assert_eq!(MANHATTAN_UNITS.normalize(&row("n/a", "Units", "Dozen")), 0.0);
        let missing: Record = [("Units", "Dozen")].into_iter().collect();
        assert_eq!(MANHATTAN_UNITS.normalize(&missing), 0.0);
    }

    #[test]
    fn test_normalization_is_linear() {
        let labels = ["Dozen", "Eaches", "12x750ml", "1x750ml", "Litre", "Item", "Other"];
        for table in [&MANHATTAN_UNITS, &CIN7_UNITS] {
            for label in labels {
                let single = table.convert(4.5, label);
                let double = table.convert(9.0, label);
                assert!((double - 2.0 * single).abs() < 1e-12, "{label}");
            }
        }
    }

    #[test]
    fn test_for_source() {
        assert!(UnitTable::for_source(SourceType::Cin7).is_some());
        assert!(UnitTable::for_source(SourceType::Manhattan).is_some());
        assert!(UnitTable::for_source(SourceType::Sales).is_none());
    }
}
