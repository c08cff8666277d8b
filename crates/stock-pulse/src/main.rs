mod bootstrap;
mod render;

use std::sync::Arc;

use anyhow::Result;
use pulse_core::models::{DashboardData, Filters};
use pulse_core::notifications::EventBus;
use pulse_core::settings::Settings;
use pulse_core::time_utils;
use pulse_data::export;
use pulse_runtime::data_manager::DataManager;
use pulse_runtime::ingest::ingest_path;
use pulse_runtime::orchestrator::WatchOrchestrator;
use pulse_runtime::store::{FileStore, KeyValueStore};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();
    let store_dir = settings.store_dir();

    bootstrap::ensure_directories(&store_dir)?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("stock-pulse v{} starting", env!("CARGO_PKG_VERSION"));

    let today = time_utils::today_in(&settings.timezone);
    let filters = settings.filters(today)?;
    tracing::info!(
        "Region: {}, Brand: {}, Range: {}..{}, Timezone: {}",
        filters.region.as_str(),
        filters.brand.as_str(),
        filters.date_range.from,
        filters.date_range.to,
        settings.timezone
    );

    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(&store_dir));

    if settings.watch {
        run_watch(&settings, store, filters).await
    } else {
        run_once(&settings, store, filters).await
    }
}

/// Import the given files, build the dashboard once and print it.
async fn run_once(
    settings: &Settings,
    store: Arc<dyn KeyValueStore>,
    filters: Filters,
) -> Result<()> {
    let bus = EventBus::new();
    let mut data_manager = DataManager::new(Arc::clone(&store), filters);
    data_manager.subscribe(&bus);

    // Each source is independent: one failing import does not stop the rest.
    for (source, path) in settings.imports() {
        match ingest_path(store.as_ref(), &bus, source, &path).await {
            Ok(outcome) => eprintln!(
                "Imported {} records from {} ({})",
                outcome.record_count,
                path.display(),
                source
            ),
            Err(e) => {
                tracing::error!(source = %source, error = %e, "import failed");
                eprintln!("Import of {} failed: {}", path.display(), e);
            }
        }
    }

    let dashboard = data_manager.get_dashboard()?.clone();
    publish(settings, &dashboard, &filters)
}

/// Keep re-importing changed files and print each new dashboard until Ctrl+C.
async fn run_watch(
    settings: &Settings,
    store: Arc<dyn KeyValueStore>,
    filters: Filters,
) -> Result<()> {
    tracing::info!("Watching imports every {}s", settings.refresh_rate);

    let orchestrator = WatchOrchestrator::new(
        u64::from(settings.refresh_rate),
        store,
        settings.imports(),
        filters,
    );
    let (mut rx, handle) = orchestrator.start();

    loop {
        tokio::select! {
            update = rx.recv() => {
                let Some(update) = update else {
                    tracing::debug!("watch loop ended");
                    break;
                };
                for outcome in &update.ingested {
                    eprintln!(
                        "Imported {} records ({})",
                        outcome.record_count, outcome.source_type
                    );
                }
                if let Err(e) = publish(settings, &update.dashboard, &update.filters) {
                    tracing::error!(error = %e, "could not publish dashboard");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received; shutting down watch task");
                break;
            }
        }
    }

    handle.abort();
    Ok(())
}

/// Print the dashboard in the chosen format and write any requested exports.
fn publish(settings: &Settings, dashboard: &DashboardData, filters: &Filters) -> Result<()> {
    match settings.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(dashboard)?),
        _ => print!("{}", render::render_summary(dashboard, filters)),
    }

    if let Some(path) = &settings.export_sales {
        export::export_sales(path, &dashboard.sales_series)?;
    }
    if let Some(path) = &settings.export_stock {
        export::export_stock(path, &dashboard.stock_series)?;
    }
    Ok(())
}
