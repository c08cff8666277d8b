//! Dashboard pipeline: stored source data + filters → [`DashboardData`].
//!
//! Everything here is a pure function of its inputs. The stock sources
//! carry no time dimension, so the stock trend repeats the current family
//! totals across the calendar and the stock comparison reuses those same
//! totals for every month of the selected range. That comparison is an
//! approximation of prior-period stock, not real history.

use std::collections::BTreeMap;

use pulse_core::data_processors::{round2, round_half_up};
use pulse_core::models::{
    index_key, ComparisonData, ComparisonPeriod, ComparisonPoint, DashboardData, DateRange,
    FamilyTotals, Filters, Month, MonthlyTotals, Record, StockPoint, TimeSeriesPoint,
};
use pulse_core::time_utils::{month_label, months_in_range, shift_month};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregator::aggregate_stock;
use crate::pivot::PivotTotals;

/// Year-over-year uplift applied to last year's actual in the sales forecast.
const PRIOR_YEAR_GROWTH: f64 = 1.05;
/// Uplift applied to the comparison series' actual.
const COMPARISON_UPLIFT: f64 = 1.02;

// ── MonthlyLookup ─────────────────────────────────────────────────────────────

/// Anything that can answer "what was the value for this month".
pub trait MonthlyLookup {
    /// Value for `(year, month)`, `0.0` when absent.
    fn value(&self, year: i32, month: Month) -> f64;
}

impl MonthlyLookup for MonthlyTotals {
    fn value(&self, year: i32, month: Month) -> f64 {
        self.value_or_zero(year, month)
    }
}

/// Flat `"YYYY-MM"` index.
impl MonthlyLookup for BTreeMap<String, f64> {
    fn value(&self, year: i32, month: Month) -> f64 {
        self.get(&index_key(year, month)).copied().unwrap_or(0.0)
    }
}

impl MonthlyLookup for PivotTotals {
    fn value(&self, year: i32, month: Month) -> f64 {
        self.totals_by_year.value(year, month)
    }
}

// ── Sales series ──────────────────────────────────────────────────────────────

/// One point per calendar month of `range`, empty when `from > to`.
///
/// `forecast` blends last year's value grown by 5% with this year's actual.
pub fn build_sales_series<L: MonthlyLookup + ?Sized>(
    lookup: &L,
    range: &DateRange,
) -> Vec<TimeSeriesPoint> {
    months_in_range(range.from, range.to)
        .into_iter()
        .map(|(year, month)| {
            let actual = lookup.value(year, month);
            let previous_actual = lookup.value(year - 1, month);
            TimeSeriesPoint {
                label: month_label(year, month),
                actual: round2(actual),
                forecast: round_half_up((previous_actual * PRIOR_YEAR_GROWTH + actual) / 2.0),
                previous_actual: round2(previous_actual),
            }
        })
        .collect()
}

/// Comparison series aligned to the months of `range`, each point drawn from
/// the month `period` places back. Labels are the aligned month's label.
pub fn build_comparison_series<L: MonthlyLookup + ?Sized>(
    lookup: &L,
    range: &DateRange,
    period: ComparisonPeriod,
) -> Vec<ComparisonPoint> {
    let months = months_in_range(range.from, range.to);
    let back = period.months_back(months.len() as u32) as i32;

    months
        .into_iter()
        .map(|(year, month)| {
            let (src_year, src_month) = shift_month(year, month, -back);
            let actual = lookup.value(src_year, src_month);
            ComparisonPoint {
                label: month_label(year, month),
                actual: round2(actual),
                forecast: round_half_up(actual * COMPARISON_UPLIFT),
            }
        })
        .collect()
}

// ── Stock series ──────────────────────────────────────────────────────────────

fn stock_point(label: String, families: &FamilyTotals) -> StockPoint {
    StockPoint {
        label,
        sauvignon_blanc: round_half_up(families.sab),
        pinot_noir: round_half_up(families.pin),
        chardonnay: round_half_up(families.chr),
    }
}

/// Twelve points, `Jan` through `Dec`, each carrying the rounded family totals.
pub fn build_stock_trend(families: &FamilyTotals) -> Vec<StockPoint> {
    Month::ALL
        .into_iter()
        .map(|m| stock_point(m.abbrev().to_string(), families))
        .collect()
}

/// Stock comparison aligned to `range`, reusing the current family totals
/// for every month.
pub fn build_stock_comparison(families: &FamilyTotals, range: &DateRange) -> Vec<StockPoint> {
    months_in_range(range.from, range.to)
        .into_iter()
        .map(|(year, month)| stock_point(month_label(year, month), families))
        .collect()
}

// ── Dashboard ─────────────────────────────────────────────────────────────────

/// Decoded contents of the store, one optional value per source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceData {
    pub cin7: Option<Vec<Record>>,
    pub manhattan: Option<Vec<Record>>,
    pub sales: Option<PivotTotals>,
}

/// Run one full aggregation over `data` under `filters`.
///
/// A missing stock source contributes nothing; a missing sales source
/// leaves both sales series empty.
pub fn build_dashboard(data: &SourceData, filters: &Filters) -> DashboardData {
    let stock = aggregate_stock(data.cin7.as_deref(), data.manhattan.as_deref(), filters);
    let (family_totals, distributor_summaries) = stock.into_parts();

    let range = &filters.date_range;
    let (sales_series, comparison_sales) = match &data.sales {
        Some(sales) => (
            build_sales_series(sales, range),
            build_comparison_series(sales, range, filters.comparison_period),
        ),
        None => (Vec::new(), Vec::new()),
    };

    let dashboard = DashboardData {
        stock_series: build_stock_trend(&family_totals),
        sales_series,
        comparison: ComparisonData {
            sales: comparison_sales,
            stock: build_stock_comparison(&family_totals, range),
        },
        distributor_summaries,
        family_totals,
    };

    debug!(
        region = filters.region.as_str(),
        brand = filters.brand.as_str(),
        from = %range.from,
        to = %range.to,
        sales_points = dashboard.sales_series.len(),
        distributors = dashboard.distributor_summaries.len(),
        "built dashboard"
    );
    dashboard
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pulse_core::models::{Brand, Region};
    use pulse_core::time_utils::months_between;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn range(from: NaiveDate, to: NaiveDate) -> DateRange {
        DateRange { from, to }
    }

    fn sales() -> MonthlyTotals {
        let mut t = MonthlyTotals::new();
        t.add(2023, Month::Jan, 100.0);
        t.add(2023, Month::Feb, 80.0);
        t.add(2024, Month::Jan, 120.0);
        t.add(2024, Month::Feb, 90.556);
        t.add(2023, Month::Nov, 40.0);
        t.add(2023, Month::Dec, 50.0);
        t
    }

    fn filters(from: NaiveDate, to: NaiveDate) -> Filters {
        Filters {
            region: Region::Global,
            brand: Brand::All,
            date_range: range(from, to),
            comparison_period: ComparisonPeriod::LastYear,
        }
    }

    // ── Sales series ──────────────────────────────────────────────────────────

    #[test]
    fn test_sales_series_values() {
        let series = build_sales_series(&sales(), &range(d(2024, 1, 1), d(2024, 2, 29)));
        assert_eq!(series.len(), 2);

        assert_eq!(series[0].label, "Jan 24");
        assert_eq!(series[0].actual, 120.0);
        assert_eq!(series[0].previous_actual, 100.0);
        // (100 * 1.05 + 120) / 2 = 112.5 → 113
        assert_eq!(series[0].forecast, 113.0);

        assert_eq!(series[1].label, "Feb 24");
        assert_eq!(series[1].actual, 90.56);
        assert_eq!(series[1].previous_actual, 80.0);
        // (84 + 90.556) / 2 = 87.278 → 87
        assert_eq!(series[1].forecast, 87.0);
    }

    #[test]
    fn test_sales_series_missing_months_are_zero() {
        let series = build_sales_series(&sales(), &range(d(2025, 6, 1), d(2025, 6, 30)));
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].actual, 0.0);
        assert_eq!(series[0].previous_actual, 0.0);
        assert_eq!(series[0].forecast, 0.0);
    }

    #[test]
    fn test_sales_series_point_count() {
        let from = d(2023, 3, 15);
        for to in [d(2023, 3, 20), d(2023, 12, 1), d(2024, 11, 30)] {
            let series = build_sales_series(&sales(), &range(from, to));
            assert_eq!(series.len() as i32, months_between(from, to) + 1);
        }
        assert!(build_sales_series(&sales(), &range(d(2024, 5, 1), d(2024, 4, 1))).is_empty());
    }

    #[test]
    fn test_lookups_agree() {
        let totals = sales();
        let index = totals.by_index();
        let r = range(d(2023, 1, 1), d(2024, 12, 31));
        assert_eq!(build_sales_series(&totals, &r), build_sales_series(&index, &r));
    }

    // ── Comparison series ─────────────────────────────────────────────────────

    #[test]
    fn test_comparison_last_year() {
        let series = build_comparison_series(
            &sales(),
            &range(d(2024, 1, 1), d(2024, 2, 29)),
            ComparisonPeriod::LastYear,
        );
        assert_eq!(series[0].label, "Jan 24");
        assert_eq!(series[0].actual, 100.0);
        assert_eq!(series[0].forecast, 102.0);
        assert_eq!(series[1].actual, 80.0);
        // 80 * 1.02 = 81.6 → 82
        assert_eq!(series[1].forecast, 82.0);
    }

    #[test]
    fn test_comparison_last_month_and_previous_period() {
        let r = range(d(2024, 1, 1), d(2024, 2, 29));

        let last_month = build_comparison_series(&sales(), &r, ComparisonPeriod::LastMonth);
        assert_eq!(last_month[0].actual, 50.0); // Dec 23
        assert_eq!(last_month[1].actual, 120.0); // Jan 24

        let previous = build_comparison_series(&sales(), &r, ComparisonPeriod::PreviousPeriod);
        assert_eq!(previous[0].actual, 40.0); // Nov 23
        assert_eq!(previous[1].actual, 50.0); // Dec 23
        assert_eq!(previous[0].label, "Jan 24");
    }

    #[test]
    fn test_comparison_last_quarter() {
        let r = range(d(2024, 2, 1), d(2024, 2, 29));
        let series = build_comparison_series(&sales(), &r, ComparisonPeriod::LastQuarter);
        assert_eq!(series[0].actual, 40.0); // Nov 23
    }

    // ── Stock series ──────────────────────────────────────────────────────────

    #[test]
    fn test_stock_trend_has_twelve_rounded_points() {
        let families = FamilyTotals {
            sab: 10.5,
            pin: 2.4,
            chr: 0.0,
            ..FamilyTotals::default()
        };
        let trend = build_stock_trend(&families);
        assert_eq!(trend.len(), 12);
        assert_eq!(trend[0].label, "Jan");
        assert_eq!(trend[11].label, "Dec");
        assert!(trend.iter().all(|p| p.sauvignon_blanc == 11.0 && p.pinot_noir == 2.0));
    }

    #[test]
    fn test_stock_comparison_aligned_to_range() {
        let families = FamilyTotals {
            chr: 7.0,
            ..FamilyTotals::default()
        };
        let points = build_stock_comparison(&families, &range(d(2023, 11, 1), d(2024, 1, 31)));
        let labels: Vec<&str> = points.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["Nov 23", "Dec 23", "Jan 24"]);
        assert!(points.iter().all(|p| p.chardonnay == 7.0));
    }

    // ── Dashboard ─────────────────────────────────────────────────────────────

    #[test]
    fn test_dashboard_without_data() {
        let dash = build_dashboard(&SourceData::default(), &filters(d(2024, 1, 1), d(2024, 3, 31)));
        assert!(dash.sales_series.is_empty());
        assert!(dash.comparison.sales.is_empty());
        assert_eq!(dash.stock_series.len(), 12);
        assert_eq!(dash.comparison.stock.len(), 3);
        assert!(dash.distributor_summaries.is_empty());
        assert_eq!(dash.family_totals, FamilyTotals::default());
    }

    #[test]
    fn test_dashboard_end_to_end() {
        let cin7: Vec<Record> = vec![[
            ("AdditionalAttribute2", "USA"),
            ("Brand", "JT"),
            ("Available", "5"),
            ("Unit", "12x750ml"),
            ("Location", "Seattle"),
            ("Status", "Active"),
            ("ClientStockDescription", "JT Pinot Noir"),
        ]
        .into_iter()
        .collect()];
        let manhattan: Vec<Record> = vec![[
            ("ClientStockDescription", "JT Sauvignon Blanc"),
            ("Available", "3"),
            ("Units", "Dozen"),
        ]
        .into_iter()
        .collect()];
        let data = SourceData {
            cin7: Some(cin7),
            manhattan: Some(manhattan),
            sales: Some(crate::pivot::extract_pivot_totals(
                "Item,Jan-23,Jan-24\nWine,100,120\n",
            )),
        };

        let dash = build_dashboard(&data, &filters(d(2024, 1, 1), d(2024, 1, 31)));
        assert_eq!(dash.family_totals.available, 16.0);
        assert_eq!(dash.family_totals.usa_available, 10.0);
        assert_eq!(dash.family_totals.sab, 6.0);
        assert_eq!(dash.family_totals.pin, 10.0);
        assert_eq!(dash.stock_series[5].sauvignon_blanc, 6.0);
        assert_eq!(dash.sales_series[0].actual, 120.0);
        assert_eq!(dash.comparison.sales[0].actual, 100.0);
        assert_eq!(dash.distributor_summaries[0].name, "Seattle");
        assert_eq!(dash.distributor_summaries[0].current_stock, 10.0);

        let json = serde_json::to_value(&dash).unwrap();
        assert!(json["stockSeries"].is_array());
        assert_eq!(json["familyTotals"]["USA_Available"], 10.0);
        assert_eq!(json["salesSeries"][0]["previousActual"], 100.0);
    }

    #[test]
    fn test_dashboard_is_idempotent() {
        let data = SourceData {
            sales: Some(crate::pivot::extract_pivot_totals("Item,Jan-24\nA,1\n")),
            ..SourceData::default()
        };
        let f = filters(d(2024, 1, 1), d(2024, 6, 30));
        assert_eq!(build_dashboard(&data, &f), build_dashboard(&data, &f));
    }
}
