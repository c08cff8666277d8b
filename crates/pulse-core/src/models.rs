use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ── SourceType ────────────────────────────────────────────────────────────────

/// The three back-office systems whose exports can be ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Inventory / stock system (Cin7). Tabular CSV.
    Cin7,
    /// Warehouse / production system (Manhattan). Tabular CSV.
    Manhattan,
    /// Distributor sales reports. Multi-block pivot CSV.
    Sales,
}

impl SourceType {
    pub const ALL: [SourceType; 3] = [SourceType::Cin7, SourceType::Manhattan, SourceType::Sales];

    /// Key under which this source's parsed result is stored.
    pub fn storage_key(self) -> &'static str {
        match self {
            SourceType::Cin7 => "vc_cin7_data",
            SourceType::Manhattan => "vc_manhattan_data",
            SourceType::Sales => "vc_sales_data",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Cin7 => "cin7",
            SourceType::Manhattan => "manhattan",
            SourceType::Sales => "sales",
        }
    }

    /// `true` for sources that arrive as multi-block pivot sheets.
    pub fn is_pivot(self) -> bool {
        matches!(self, SourceType::Sales)
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cin7" => Ok(SourceType::Cin7),
            "manhattan" => Ok(SourceType::Manhattan),
            "sales" => Ok(SourceType::Sales),
            other => Err(format!("unknown source type: {other}")),
        }
    }
}

// ── Record ────────────────────────────────────────────────────────────────────

/// One parsed CSV row: column name → raw string value, in header order.
///
/// Serialises as a JSON object whose key order follows the header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to `value`. A repeated column name keeps its first position
    /// and takes the latest value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Value for `name`, or `None` when the column does not exist.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Value for `name`, or `""` when the column does not exist.
    pub fn get_or_empty(&self, name: &str) -> &str {
        self.get(name).unwrap_or("")
    }

    /// First non-empty value among `names`.
    pub fn first_non_empty(&self, names: &[&str]) -> Option<&str> {
        names
            .iter()
            .filter_map(|n| self.get(n))
            .find(|v| !v.trim().is_empty())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RecordVisitor;

        impl<'de> Visitor<'de> for RecordVisitor {
            type Value = Record;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of column name to string value")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Record, A::Error> {
                let mut record = Record::new();
                while let Some((k, v)) = access.next_entry::<String, String>()? {
                    record.insert(k, v);
                }
                Ok(record)
            }
        }

        deserializer.deserialize_map(RecordVisitor)
    }
}

// ── Month ─────────────────────────────────────────────────────────────────────

/// Calendar month. Ordering follows the calendar, not the alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Month {
    Jan,
    Feb,
    Mar,
    Apr,
    May,
    Jun,
    Jul,
    Aug,
    Sep,
    Oct,
    Nov,
    Dec,
}

impl Month {
    pub const ALL: [Month; 12] = [
        Month::Jan,
        Month::Feb,
        Month::Mar,
        Month::Apr,
        Month::May,
        Month::Jun,
        Month::Jul,
        Month::Aug,
        Month::Sep,
        Month::Oct,
        Month::Nov,
        Month::Dec,
    ];

    /// 1-based month number.
    pub fn number(self) -> u32 {
        self as u32 + 1
    }

    /// Month for a 1-based number, `None` outside `1..=12`.
    pub fn from_number(n: u32) -> Option<Self> {
        Self::ALL.get((n as usize).checked_sub(1)?).copied()
    }

    /// Canonical three-letter name, e.g. `"Jan"`.
    pub fn abbrev(self) -> &'static str {
        match self {
            Month::Jan => "Jan",
            Month::Feb => "Feb",
            Month::Mar => "Mar",
            Month::Apr => "Apr",
            Month::May => "May",
            Month::Jun => "Jun",
            Month::Jul => "Jul",
            Month::Aug => "Aug",
            Month::Sep => "Sep",
            Month::Oct => "Oct",
            Month::Nov => "Nov",
            Month::Dec => "Dec",
        }
    }

    /// Case-insensitive match on the first three letters of `token`.
    ///
    /// `"jan"`, `"JAN"` and `"January"` all resolve to [`Month::Jan`].
    pub fn from_prefix(token: &str) -> Option<Self> {
        let prefix: String = token.chars().take(3).collect::<String>().to_lowercase();
        if prefix.chars().count() < 3 {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|m| m.abbrev().to_lowercase() == prefix)
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbrev())
    }
}

// ── MonthlyTotals ─────────────────────────────────────────────────────────────

/// `"YYYY-MM"` key for a year and month, zero-padded so that keys sort in
/// calendar order.
pub fn index_key(year: i32, month: Month) -> String {
    format!("{:04}-{:02}", year, month.number())
}

/// Accumulated values keyed by year, then by calendar month.
///
/// Only months that received at least one contribution are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonthlyTotals {
    by_year: BTreeMap<i32, BTreeMap<Month, f64>>,
}

impl MonthlyTotals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `value` to the running total for `(year, month)`.
    pub fn add(&mut self, year: i32, month: Month, value: f64) {
        *self
            .by_year
            .entry(year)
            .or_default()
            .entry(month)
            .or_insert(0.0) += value;
    }

    /// Total for `(year, month)`, `None` when nothing was recorded.
    pub fn get(&self, year: i32, month: Month) -> Option<f64> {
        self.by_year.get(&year)?.get(&month).copied()
    }

    /// Total for `(year, month)`, `0.0` when nothing was recorded.
    pub fn value_or_zero(&self, year: i32, month: Month) -> f64 {
        self.get(year, month).unwrap_or(0.0)
    }

    /// Copy with every value rounded to two decimal places.
    pub fn rounded(&self) -> Self {
        let by_year = self
            .by_year
            .iter()
            .map(|(year, months)| {
                let months = months
                    .iter()
                    .map(|(m, v)| (*m, crate::data_processors::round2(*v)))
                    .collect();
                (*year, months)
            })
            .collect();
        Self { by_year }
    }

    /// Flat `"YYYY-MM" → value` view for chronological lookups.
    pub fn by_index(&self) -> BTreeMap<String, f64> {
        self.iter()
            .map(|(year, month, value)| (index_key(year, month), value))
            .collect()
    }

    /// Iterate `(year, month, value)` in calendar order.
    pub fn iter(&self) -> impl Iterator<Item = (i32, Month, f64)> + '_ {
        self.by_year
            .iter()
            .flat_map(|(year, months)| months.iter().map(move |(m, v)| (*year, *m, *v)))
    }

    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.by_year.keys().copied()
    }

    /// Number of `(year, month)` cells holding a value.
    pub fn cell_count(&self) -> usize {
        self.by_year.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_count() == 0
    }
}

// ── Filters ───────────────────────────────────────────────────────────────────

/// Region filter. Raw three-letter region codes map onto these variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    #[default]
    Global,
    Nz,
    Usa,
    Other,
}

impl Region {
    /// Map a raw region code onto a filter value. `NZL` and `USA` are known;
    /// every other code, including empty, is [`Region::Other`].
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "NZL" => Region::Nz,
            "USA" => Region::Usa,
            _ => Region::Other,
        }
    }

    /// `true` when a row tagged with `code` passes this filter.
    pub fn includes(self, code: &str) -> bool {
        self == Region::Global || Region::from_code(code) == self
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Region::Global => "global",
            Region::Nz => "nz",
            Region::Usa => "usa",
            Region::Other => "other",
        }
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "global" => Ok(Region::Global),
            "nz" => Ok(Region::Nz),
            "usa" => Ok(Region::Usa),
            "other" => Ok(Region::Other),
            other => Err(format!("unknown region: {other}")),
        }
    }
}

/// Brand filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Brand {
    #[default]
    All,
    Jt,
    Otq,
    Tbh,
}

impl Brand {
    /// Brand code as it appears in source data, `None` for [`Brand::All`].
    pub fn code(self) -> Option<&'static str> {
        match self {
            Brand::All => None,
            Brand::Jt => Some("JT"),
            Brand::Otq => Some("OTQ"),
            Brand::Tbh => Some("TBH"),
        }
    }

    /// Gate for structured sources: exact match on a brand column.
    pub fn matches_code(self, field: &str) -> bool {
        match self.code() {
            None => true,
            Some(code) => field.trim() == code,
        }
    }

    /// Gate for free-text sources: case-insensitive containment in a
    /// description.
    pub fn matches_description(self, description: &str) -> bool {
        match self.code() {
            None => true,
            Some(code) => description
                .to_lowercase()
                .contains(&code.to_lowercase()),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Brand::All => "all",
            Brand::Jt => "jt",
            Brand::Otq => "otq",
            Brand::Tbh => "tbh",
        }
    }
}

impl FromStr for Brand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Brand::All),
            "jt" => Ok(Brand::Jt),
            "otq" => Ok(Brand::Otq),
            "tbh" => Ok(Brand::Tbh),
            other => Err(format!("unknown brand: {other}")),
        }
    }
}

/// Which earlier window the comparison sales series is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonPeriod {
    LastMonth,
    #[default]
    LastYear,
    LastQuarter,
    PreviousPeriod,
}

impl ComparisonPeriod {
    /// Months to shift back for a range spanning `range_months` months.
    pub fn months_back(self, range_months: u32) -> u32 {
        match self {
            ComparisonPeriod::LastMonth => 1,
            ComparisonPeriod::LastYear => 12,
            ComparisonPeriod::LastQuarter => 3,
            ComparisonPeriod::PreviousPeriod => range_months.max(1),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ComparisonPeriod::LastMonth => "last_month",
            ComparisonPeriod::LastYear => "last_year",
            ComparisonPeriod::LastQuarter => "last_quarter",
            ComparisonPeriod::PreviousPeriod => "previous_period",
        }
    }
}

impl FromStr for ComparisonPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last_month" => Ok(ComparisonPeriod::LastMonth),
            "last_year" | "previous_year" => Ok(ComparisonPeriod::LastYear),
            "last_quarter" => Ok(ComparisonPeriod::LastQuarter),
            "previous_period" => Ok(ComparisonPeriod::PreviousPeriod),
            other => Err(format!("unknown comparison period: {other}")),
        }
    }
}

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// Named date ranges resolved against "today".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateRangePreset {
    ThisMonth,
    LastMonth,
    ThisYear,
    LastYear,
    #[default]
    Last12Months,
}

impl FromStr for DateRangePreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "this_month" => Ok(DateRangePreset::ThisMonth),
            "last_month" => Ok(DateRangePreset::LastMonth),
            "this_year" => Ok(DateRangePreset::ThisYear),
            "last_year" => Ok(DateRangePreset::LastYear),
            "last_12_months" => Ok(DateRangePreset::Last12Months),
            other => Err(format!("unknown date range: {other}")),
        }
    }
}

/// Immutable filter snapshot. A new snapshot means a full recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filters {
    pub region: Region,
    pub brand: Brand,
    pub date_range: DateRange,
    pub comparison_period: ComparisonPeriod,
}

// ── Output types ──────────────────────────────────────────────────────────────

/// One month of the primary sales series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesPoint {
    /// Axis label, e.g. `"Jan 24"`.
    pub label: String,
    pub actual: f64,
    pub forecast: f64,
    /// Same month one calendar year earlier.
    pub previous_actual: f64,
}

/// One month of the comparison sales series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonPoint {
    pub label: String,
    pub actual: f64,
    pub forecast: f64,
}

/// Family stock levels under one axis label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockPoint {
    pub label: String,
    pub sauvignon_blanc: f64,
    pub pinot_noir: f64,
    pub chardonnay: f64,
}

/// Stock held at one distributor location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributorSummary {
    pub name: String,
    pub stock_status: String,
    pub region: String,
    pub current_stock: f64,
}

/// Named stock buckets in canonical cases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FamilyTotals {
    #[serde(rename = "SAB")]
    pub sab: f64,
    #[serde(rename = "PIN")]
    pub pin: f64,
    #[serde(rename = "CHR")]
    pub chr: f64,
    /// Stock passing the active region and brand filters.
    #[serde(rename = "Available")]
    pub available: f64,
    /// US distributor stock passing the brand filter.
    #[serde(rename = "USA_Available")]
    pub usa_available: f64,
}

/// Comparison series shown alongside the primary charts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonData {
    pub sales: Vec<ComparisonPoint>,
    pub stock: Vec<StockPoint>,
}

/// Everything the presentation layer consumes from one aggregation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub stock_series: Vec<StockPoint>,
    pub sales_series: Vec<TimeSeriesPoint>,
    pub comparison: ComparisonData,
    pub distributor_summaries: Vec<DistributorSummary>,
    pub family_totals: FamilyTotals,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
