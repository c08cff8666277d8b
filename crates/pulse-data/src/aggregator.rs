//! Stock aggregation over the tabular inventory and warehouse sources.
//!
//! Rows are folded into a [`StockTotals`] accumulator: named buckets
//! (overall, USA, product family) plus per-distributor summaries. Each
//! run starts from [`StockTotals::default`]; nothing is shared between runs.

use std::collections::{BTreeMap, HashMap};

use pulse_core::models::{
    Brand, DistributorSummary, FamilyTotals, Filters, Record, Region, SourceType,
};
use pulse_core::units::{UnitTable, CIN7_UNITS, MANHATTAN_UNITS};
use tracing::{debug, warn};

/// Free-text column scanned for product families and description brands.
pub const DESCRIPTION_FIELD: &str = "ClientStockDescription";

// ── Bucket ────────────────────────────────────────────────────────────────────

/// Named total a row's quantity can be credited to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Sab,
    Pin,
    Chr,
    Available,
    UsaAvailable,
}

impl Bucket {
    pub const FAMILIES: [Bucket; 3] = [Bucket::Sab, Bucket::Pin, Bucket::Chr];

    pub fn name(self) -> &'static str {
        match self {
            Bucket::Sab => "SAB",
            Bucket::Pin => "PIN",
            Bucket::Chr => "CHR",
            Bucket::Available => "Available",
            Bucket::UsaAvailable => "USA_Available",
        }
    }

    /// Description keywords for family buckets; empty for the others.
    fn keywords(self) -> &'static [&'static str] {
        match self {
            Bucket::Sab => &["sab", "sauvignon"],
            Bucket::Pin => &["pin", "pinot"],
            Bucket::Chr => &["chr", "chardonnay"],
            Bucket::Available | Bucket::UsaAvailable => &[],
        }
    }
}

/// Family buckets whose keywords appear in `description`, case-insensitively.
pub fn families_in(description: &str) -> Vec<Bucket> {
    let lower = description.to_lowercase();
    Bucket::FAMILIES
        .into_iter()
        .filter(|b| b.keywords().iter().any(|k| lower.contains(k)))
        .collect()
}

fn credit(totals: &mut FamilyTotals, bucket: Bucket, quantity: f64) {
    let slot = match bucket {
        Bucket::Sab => &mut totals.sab,
        Bucket::Pin => &mut totals.pin,
        Bucket::Chr => &mut totals.chr,
        Bucket::Available => &mut totals.available,
        Bucket::UsaAvailable => &mut totals.usa_available,
    };
    *slot += quantity;
}

// ── SourceProfile ─────────────────────────────────────────────────────────────

/// How a brand filter is tested against a row.
#[derive(Debug, Clone, Copy)]
pub enum BrandMatch {
    /// Exact code in a structured column.
    Code(&'static str),
    /// Case-insensitive containment in a free-text column.
    Description(&'static str),
}

impl BrandMatch {
    pub fn passes(self, brand: Brand, record: &Record) -> bool {
        match self {
            BrandMatch::Code(field) => brand.matches_code(record.get_or_empty(field)),
            BrandMatch::Description(field) => {
                brand.matches_description(record.get_or_empty(field))
            }
        }
    }
}

/// Where one stock source keeps the columns aggregation needs.
#[derive(Debug)]
pub struct SourceProfile {
    pub source: SourceType,
    pub units: &'static UnitTable,
    /// Column carrying the region code, `None` when the whole source sits
    /// in [`SourceProfile::fixed_region`].
    pub region_field: Option<&'static str>,
    pub fixed_region: &'static str,
    pub brand: BrandMatch,
    /// Whether USA rows feed [`Bucket::UsaAvailable`].
    pub tracks_usa: bool,
    /// Distributor name column, `None` for sources without distributors.
    pub location_field: Option<&'static str>,
    pub status_field: &'static str,
}

pub static CIN7_PROFILE: SourceProfile = SourceProfile {
    source: SourceType::Cin7,
    units: &CIN7_UNITS,
    region_field: Some("AdditionalAttribute2"),
    fixed_region: "",
    brand: BrandMatch::Code("Brand"),
    tracks_usa: true,
    location_field: Some("Location"),
    status_field: "Status",
};

pub static MANHATTAN_PROFILE: SourceProfile = SourceProfile {
    source: SourceType::Manhattan,
    units: &MANHATTAN_UNITS,
    region_field: None,
    fixed_region: "NZL",
    brand: BrandMatch::Description(DESCRIPTION_FIELD),
    tracks_usa: false,
    location_field: None,
    status_field: "Status",
};

impl SourceProfile {
    /// Profile for a tabular stock source; `None` for the pivot source.
    pub fn for_source(source: SourceType) -> Option<&'static SourceProfile> {
        match source {
            SourceType::Cin7 => Some(&CIN7_PROFILE),
            SourceType::Manhattan => Some(&MANHATTAN_PROFILE),
            SourceType::Sales => None,
        }
    }

    /// Raw region code of `record`.
    pub fn region_code<'r>(&self, record: &'r Record) -> &'r str {
        match self.region_field {
            Some(field) => record.get_or_empty(field).trim(),
            None => self.fixed_region,
        }
    }
}

// ── StockTotals ───────────────────────────────────────────────────────────────

/// Accumulator threaded through [`StockTotals::fold_row`].
#[derive(Debug, Clone, Default)]
pub struct StockTotals {
    pub families: FamilyTotals,
    distributors: Vec<DistributorSummary>,
    distributor_index: HashMap<String, usize>,
    /// Unit labels with no conversion, and how many rows carried them.
    pub unknown_units: BTreeMap<String, usize>,
    pub rows: usize,
}

impl StockTotals {
    /// Add one row of `profile`'s source under `filters`.
    pub fn fold_row(mut self, profile: &SourceProfile, filters: &Filters, record: &Record) -> Self {
        self.rows += 1;

        let unit = profile.units.unit_of(record);
        if !unit.trim().is_empty() && profile.units.lookup(unit).is_none() {
            *self.unknown_units.entry(unit.trim().to_string()).or_insert(0) += 1;
        }
        let cases = profile.units.normalize(record);

        let region = profile.region_code(record);
        let brand_ok = profile.brand.passes(filters.brand, record);

        if brand_ok && filters.region.includes(region) {
            credit(&mut self.families, Bucket::Available, cases);
        }
        if brand_ok && profile.tracks_usa && Region::from_code(region) == Region::Usa {
            credit(&mut self.families, Bucket::UsaAvailable, cases);
        }

        // Families ignore the region and brand filters.
        for family in families_in(record.get_or_empty(DESCRIPTION_FIELD)) {
            credit(&mut self.families, family, cases);
        }

        if let Some(field) = profile.location_field {
            self.add_distributor(record.get_or_empty(field).trim(), record, profile, cases);
        }
        self
    }

    fn add_distributor(
        &mut self,
        name: &str,
        record: &Record,
        profile: &SourceProfile,
        cases: f64,
    ) {
        if name.is_empty() {
            return;
        }
        let status = record.get_or_empty(profile.status_field).trim().to_string();
        let region = profile.region_code(record);

        match self.distributor_index.get(name) {
            Some(&i) => {
                let entry = &mut self.distributors[i];
                entry.stock_status = status;
                if !region.is_empty() {
                    entry.region = region.to_string();
                }
                entry.current_stock += cases;
            }
            None => {
                self.distributor_index
                    .insert(name.to_string(), self.distributors.len());
                self.distributors.push(DistributorSummary {
                    name: name.to_string(),
                    stock_status: status,
                    region: region.to_string(),
                    current_stock: cases,
                });
            }
        }
    }

    /// Distributor summaries in first-seen order.
    pub fn distributors(&self) -> &[DistributorSummary] {
        &self.distributors
    }

    pub fn into_parts(self) -> (FamilyTotals, Vec<DistributorSummary>) {
        (self.families, self.distributors)
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Fold every row of `records` from `source` into `acc`.
///
/// The pivot source carries no stock rows and leaves `acc` unchanged.
pub fn aggregate_source(
    acc: StockTotals,
    source: SourceType,
    records: &[Record],
    filters: &Filters,
) -> StockTotals {
    let Some(profile) = SourceProfile::for_source(source) else {
        return acc;
    };
    let before = acc.rows;
    let acc = records
        .iter()
        .fold(acc, |acc, record| acc.fold_row(profile, filters, record));

    debug!(
        source = %source,
        rows = acc.rows - before,
        available = acc.families.available,
        "aggregated stock source"
    );
    acc
}

/// Aggregate both stock sources from a fresh accumulator.
pub fn aggregate_stock(
    cin7: Option<&[Record]>,
    manhattan: Option<&[Record]>,
    filters: &Filters,
) -> StockTotals {
    let mut acc = StockTotals::default();
    if let Some(rows) = manhattan {
        acc = aggregate_source(acc, SourceType::Manhattan, rows, filters);
    }
    if let Some(rows) = cin7 {
        acc = aggregate_source(acc, SourceType::Cin7, rows, filters);
    }

    for (unit, count) in &acc.unknown_units {
        warn!(unit = %unit, rows = count, "unrecognised unit label, quantity used as cases");
    }
    acc
}

// ── Tests ─────────────────────────────────────────────────────────────────────
