//! CSV export of the built series.

use std::io;
use std::path::Path;

use pulse_core::error::Result;
use pulse_core::models::{StockPoint, TimeSeriesPoint};
use tracing::info;

/// Write `label,actual,forecast` rows for the sales series.
pub fn write_sales_csv<W: io::Write>(writer: W, series: &[TimeSeriesPoint]) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(["label", "actual", "forecast"])
        .map_err(io::Error::from)?;
    for point in series {
        out.write_record([
            point.label.clone(),
            point.actual.to_string(),
            point.forecast.to_string(),
        ])
        .map_err(io::Error::from)?;
    }
    out.flush()?;
    Ok(())
}

/// Write `label,sauvignon_blanc,pinot_noir,chardonnay` rows for the stock trend.
pub fn write_stock_csv<W: io::Write>(writer: W, series: &[StockPoint]) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(["label", "sauvignon_blanc", "pinot_noir", "chardonnay"])
        .map_err(io::Error::from)?;
    for point in series {
        out.write_record([
            point.label.clone(),
            point.sauvignon_blanc.to_string(),
            point.pinot_noir.to_string(),
            point.chardonnay.to_string(),
        ])
        .map_err(io::Error::from)?;
    }
    out.flush()?;
    Ok(())
}

pub fn export_sales(path: &Path, series: &[TimeSeriesPoint]) -> Result<()> {
    write_sales_csv(std::fs::File::create(path)?, series)?;
    info!(path = %path.display(), rows = series.len(), "exported sales series");
    Ok(())
}

pub fn export_stock(path: &Path, series: &[StockPoint]) -> Result<()> {
    write_stock_csv(std::fs::File::create(path)?, series)?;
    info!(path = %path.display(), rows = series.len(), "exported stock trend");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
