use std::fmt::Write;

use pulse_core::formatting::{format_cases, format_quantity};
use pulse_core::models::{DashboardData, Filters};

/// Plain-text dashboard summary for the terminal.
pub fn render_summary(dashboard: &DashboardData, filters: &Filters) -> String {
    let mut out = String::new();
    let totals = &dashboard.family_totals;

    let _ = writeln!(
        out,
        "Stock Pulse  region={} brand={} range={}..{} comparison={}",
        filters.region.as_str(),
        filters.brand.as_str(),
        filters.date_range.from,
        filters.date_range.to,
        filters.comparison_period.as_str(),
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "  Stock float          {}", format_cases(totals.available));
    let _ = writeln!(out, "  USA distributor stock {}", format_cases(totals.usa_available));
    let _ = writeln!(
        out,
        "  Families             SAB {}  PIN {}  CHR {}",
        format_quantity(totals.sab, 0),
        format_quantity(totals.pin, 0),
        format_quantity(totals.chr, 0),
    );

    let _ = writeln!(out);
    if dashboard.sales_series.is_empty() {
        let _ = writeln!(out, "  Sales: no data");
    } else {
        let _ = writeln!(
            out,
            "  {:<8} {:>12} {:>12} {:>12} {:>12}",
            "Month", "Actual", "Forecast", "Prior year", "Comparison"
        );
        for (i, point) in dashboard.sales_series.iter().enumerate() {
            let comparison = dashboard
                .comparison
                .sales
                .get(i)
                .map(|c| format_quantity(c.actual, 2))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "  {:<8} {:>12} {:>12} {:>12} {:>12}",
                point.label,
                format_quantity(point.actual, 2),
                format_quantity(point.forecast, 0),
                format_quantity(point.previous_actual, 2),
                comparison,
            );
        }
    }

    let _ = writeln!(out);
    if dashboard.distributor_summaries.is_empty() {
        let _ = writeln!(out, "  Distributors: none");
    } else {
        let _ = writeln!(
            out,
            "  {:<24} {:<8} {:<12} {:>12}",
            "Distributor", "Region", "Status", "Stock"
        );
        for d in &dashboard.distributor_summaries {
            let _ = writeln!(
                out,
                "  {:<24} {:<8} {:<12} {:>12}",
                d.name,
                d.region,
                d.stock_status,
                format_quantity(d.current_stock, 1),
            );
        }
    }

    out
}
