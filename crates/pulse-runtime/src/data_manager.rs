//! Cached dashboard over the stored sources.
//!
//! [`DataManager`] keeps the last [`DashboardData`] it built and rebuilds it
//! from the store when the filters change or when a data-uploaded event
//! marks it stale. Every rebuild is a full run from zero totals.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pulse_core::error::Result;
use pulse_core::models::{DashboardData, Filters, Record, SourceType};
use pulse_core::notifications::{DataUploaded, EventBus};
use pulse_data::analysis::{build_dashboard, SourceData};
use pulse_data::pivot::PivotTotals;
use serde::de::DeserializeOwned;

use crate::store::KeyValueStore;

// ── DataManager ───────────────────────────────────────────────────────────────

pub struct DataManager {
    store: Arc<dyn KeyValueStore>,
    filters: Filters,
    /// Most recently built dashboard.
    cache: Option<DashboardData>,
    /// Set by data-uploaded events; cleared by a rebuild.
    stale: Arc<AtomicBool>,
    /// Human-readable description of the last error encountered.
    last_error: Option<String>,
}

impl DataManager {
    pub fn new(store: Arc<dyn KeyValueStore>, filters: Filters) -> Self {
        Self {
            store,
            filters,
            cache: None,
            stale: Arc::new(AtomicBool::new(true)),
            last_error: None,
        }
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// Register on `bus` so that every upload invalidates the cache.
    pub fn subscribe(&self, bus: &EventBus) {
        let stale = Arc::clone(&self.stale);
        bus.subscribe(Arc::new(move |event: &DataUploaded| {
            tracing::debug!(source = %event.source_type, "data uploaded; dashboard stale");
            stale.store(true, Ordering::SeqCst);
        }));
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    /// Replace the filter snapshot. A different snapshot invalidates the cache.
    pub fn set_filters(&mut self, filters: Filters) {
        if filters != self.filters {
            self.filters = filters;
            self.invalidate_cache();
        }
    }

    /// Current dashboard, rebuilt first when stale.
    ///
    /// On a store failure the error is recorded and returned; the previous
    /// dashboard stays available through [`DataManager::cached`].
    pub fn get_dashboard(&mut self) -> Result<&DashboardData> {
        let stale = self.stale.swap(false, Ordering::SeqCst);
        if stale || self.cache.is_none() {
            match self.load_sources() {
                Ok(data) => {
                    self.cache = Some(build_dashboard(&data, &self.filters));
                    self.last_error = None;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "could not load stored sources");
                    self.last_error = Some(e.to_string());
                    self.stale.store(true, Ordering::SeqCst);
                    return Err(e);
                }
            }
        }
        // Populated by the branch above.
        Ok(&*self.cache.get_or_insert_with(DashboardData::default))
    }

    /// Last successfully built dashboard, without rebuilding.
    pub fn cached(&self) -> Option<&DashboardData> {
        self.cache.as_ref()
    }

    /// Discard the current dashboard, forcing the next call to rebuild.
    pub fn invalidate_cache(&mut self) {
        self.cache = None;
        self.stale.store(true, Ordering::SeqCst);
        tracing::debug!("dashboard cache invalidated");
    }

    pub fn is_stale(&self) -> bool {
        self.cache.is_none() || self.stale.load(Ordering::SeqCst)
    }

    /// Human-readable description of the last error, or `None`.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Read and decode every source from the store.
    ///
    /// A missing key is no data for that source. A value that fails to
    /// decode is logged and also treated as no data.
    pub fn load_sources(&self) -> Result<SourceData> {
        Ok(SourceData {
            cin7: self.load::<Vec<Record>>(SourceType::Cin7)?,
            manhattan: self.load::<Vec<Record>>(SourceType::Manhattan)?,
            sales: self.load::<PivotTotals>(SourceType::Sales)?,
        })
    }

    // ── Private helpers ───────────────────────────────────────────────────

    fn load<T: DeserializeOwned>(&self, source: SourceType) -> Result<Option<T>> {
        let key = source.storage_key();
        let Some(raw) = self.store.get(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key, error = %e, "stored value is not decodable; ignoring");
                Ok(None)
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::ingest;
    use crate::store::{FileStore, MemoryStore};
    use chrono::NaiveDate;
    use pulse_core::error::PulseError;
    use pulse_core::models::{Brand, ComparisonPeriod, DateRange, Region};
    use pulse_core::notifications::Publisher;

    const CIN7_CSV: &str =
        "Location,AdditionalAttribute2,Brand,Available\nSeattle,USA,JT,5\nAuckland,NZL,OTQ,3\n";

    fn filters(region: Region) -> Filters {
        Filters {
            region,
            brand: Brand::All,
            date_range: DateRange {
                from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                to: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            },
            comparison_period: ComparisonPeriod::LastYear,
        }
    }

    fn setup() -> (DataManager, Arc<MemoryStore>, EventBus) {
        let store = Arc::new(MemoryStore::new());
        let bus = EventBus::new();
        let mgr = DataManager::new(store.clone(), filters(Region::Global));
        mgr.subscribe(&bus);
        (mgr, store, bus)
    }

    // ── empty store ───────────────────────────────────────────────────────

    #[test]
    fn test_empty_store_builds_empty_dashboard() {
        let (mut mgr, _store, _bus) = setup();
        let dash = mgr.get_dashboard().unwrap();
        assert!(dash.sales_series.is_empty());
        assert_eq!(dash.family_totals.available, 0.0);
        assert!(mgr.last_error().is_none());
    }

    // ── data events ───────────────────────────────────────────────────────

    #[test]
    fn test_upload_event_triggers_rebuild() {
        let (mut mgr, store, bus) = setup();
        assert_eq!(mgr.get_dashboard().unwrap().family_totals.available, 0.0);
        assert!(!mgr.is_stale());

        ingest(store.as_ref(), &bus, SourceType::Cin7, "c.csv", None, CIN7_CSV.as_bytes())
            .unwrap();
        assert!(mgr.is_stale());
        assert_eq!(mgr.get_dashboard().unwrap().family_totals.available, 8.0);
    }

    #[test]
    fn test_cache_reused_without_events() {
        let (mut mgr, store, _bus) = setup();
        mgr.get_dashboard().unwrap();

        // Written behind the manager's back, no event published.
        store
            .put("vc_cin7_data", r#"[{"Available":"9"}]"#)
            .unwrap();
        assert_eq!(mgr.get_dashboard().unwrap().family_totals.available, 0.0);

        mgr.invalidate_cache();
        assert_eq!(mgr.get_dashboard().unwrap().family_totals.available, 9.0);
    }

    // ── filters ───────────────────────────────────────────────────────────

    #[test]
    fn test_filter_change_recomputes() {
        let (mut mgr, store, bus) = setup();
        ingest(store.as_ref(), &bus, SourceType::Cin7, "c.csv", None, CIN7_CSV.as_bytes())
            .unwrap();
        assert_eq!(mgr.get_dashboard().unwrap().family_totals.available, 8.0);

        mgr.set_filters(filters(Region::Usa));
        assert!(mgr.is_stale());
        assert_eq!(mgr.get_dashboard().unwrap().family_totals.available, 5.0);
        assert_eq!(mgr.filters().region, Region::Usa);
    }

    #[test]
    fn test_same_filters_keep_cache() {
        let (mut mgr, _store, _bus) = setup();
        mgr.get_dashboard().unwrap();
        mgr.set_filters(filters(Region::Global));
        assert!(!mgr.is_stale());
    }

    // ── decoding ──────────────────────────────────────────────────────────

    #[test]
    fn test_undecodable_value_is_no_data() {
        let (mut mgr, store, bus) = setup();
        store.put("vc_sales_data", "not json").unwrap();
        ingest(store.as_ref(), &bus, SourceType::Cin7, "c.csv", None, CIN7_CSV.as_bytes())
            .unwrap();

        let data = mgr.load_sources().unwrap();
        assert!(data.sales.is_none());
        assert_eq!(data.cin7.as_ref().map(Vec::len), Some(2));
        assert!(mgr.get_dashboard().unwrap().sales_series.is_empty());
    }

    // ── store failure ─────────────────────────────────────────────────────

    #[test]
    fn test_store_failure_is_surfaced() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("vc_cin7_data.json")).unwrap();
        let store = Arc::new(FileStore::new(tmp.path()));
        let mut mgr = DataManager::new(store, filters(Region::Global));

        let err = mgr.get_dashboard().unwrap_err();
        assert!(matches!(err, PulseError::StoreRead { .. }));
        assert!(mgr.last_error().is_some());
        assert!(mgr.cached().is_none());
    }

    #[test]
    fn test_direct_publish_marks_stale() {
        let (mut mgr, _store, bus) = setup();
        mgr.get_dashboard().unwrap();
        bus.publish(&DataUploaded {
            source_type: SourceType::Sales,
            storage_key: "vc_sales_data".to_string(),
            record_count: 1,
        });
        assert!(mgr.is_stale());
    }
}
