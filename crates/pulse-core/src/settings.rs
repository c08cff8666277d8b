use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::error::{PulseError, Result};
use crate::models::{
    Brand, ComparisonPeriod, DateRange, DateRangePreset, Filters, Region, SourceType,
};
use crate::time_utils;

/// Directory under the home directory holding persisted state.
pub const APP_DIR: &str = ".stock-pulse";

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Stock and sales reporting from back-office CSV exports
#[derive(Parser, Debug, Clone)]
#[command(
    name = "stock-pulse",
    about = "Stock and sales reporting from back-office CSV exports",
    version
)]
pub struct Settings {
    /// Directory holding the stored source data
    #[arg(long)]
    pub store_dir: Option<PathBuf>,

    /// Import an inventory (Cin7) CSV export
    #[arg(long)]
    pub cin7: Option<PathBuf>,

    /// Import a warehouse (Manhattan) CSV export
    #[arg(long)]
    pub manhattan: Option<PathBuf>,

    /// Import a distributor sales pivot CSV
    #[arg(long)]
    pub sales: Option<PathBuf>,

    /// Region filter
    #[arg(long, default_value = "global", value_parser = ["global", "nz", "usa", "other"])]
    pub region: String,

    /// Brand filter
    #[arg(long, default_value = "all", value_parser = ["all", "jt", "otq", "tbh"])]
    pub brand: String,

    /// Named date range
    #[arg(
        long,
        default_value = "last_12_months",
        value_parser = ["this_month", "last_month", "this_year", "last_year", "last_12_months"]
    )]
    pub range: String,

    /// Range start (YYYY-MM-DD), overrides --range
    #[arg(long)]
    pub from: Option<String>,

    /// Range end (YYYY-MM-DD), overrides --range
    #[arg(long)]
    pub to: Option<String>,

    /// Comparison period for the secondary sales series
    #[arg(
        long,
        default_value = "last_year",
        value_parser = ["last_month", "last_year", "last_quarter", "previous_period"]
    )]
    pub comparison: String,

    /// Timezone used to resolve "today" (auto-detected if not specified)
    #[arg(long, default_value = "auto")]
    pub timezone: String,

    /// Output format
    #[arg(long, default_value = "summary", value_parser = ["summary", "json"])]
    pub format: String,

    /// Write the sales series to this CSV file
    #[arg(long)]
    pub export_sales: Option<PathBuf>,

    /// Write the stock trend to this CSV file
    #[arg(long)]
    pub export_stock: Option<PathBuf>,

    /// Keep running, re-importing files when they change
    #[arg(long)]
    pub watch: bool,

    /// Watch polling interval in seconds (1-60)
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u32).range(1..=60))]
    pub refresh_rate: u32,

    /// Logging level
    #[arg(
        long,
        default_value = "INFO",
        value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"]
    )]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.stock-pulse/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl LastUsedParams {
    /// Return the default path to the persisted config file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&home_dir())
    }

    /// Return the config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(APP_DIR).join("last_used.json")
    }

    /// Load persisted params from an explicit path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to an explicit path.
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at an explicit path if it exists.
    pub fn clear_at(path: &Path) -> std::io::Result<()> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with last-used params where no explicit CLI
    /// value was provided, resolve `"auto"` values, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Full implementation – accepts args and an explicit config path so that
    /// tests can redirect to a temporary directory.
    pub fn load_with_last_used_impl(args: Vec<std::ffi::OsString>, config_path: &Path) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            let _ = LastUsedParams::clear_at(config_path);
            return Self::resolve_auto_values(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // CLI always wins over persisted values.
        let merge = |field: &mut String, id: &str, persisted: Option<String>| {
            if !is_arg_explicitly_set(&matches, id) {
                if let Some(v) = persisted {
                    *field = v;
                }
            }
        };
        merge(&mut settings.region, "region", last.region);
        merge(&mut settings.brand, "brand", last.brand);
        merge(&mut settings.range, "range", last.range);
        merge(&mut settings.comparison, "comparison", last.comparison);
        merge(&mut settings.timezone, "timezone", last.timezone);
        merge(&mut settings.format, "format", last.format);

        settings = Self::resolve_auto_values(settings);

        let params = LastUsedParams::from(&settings);
        if let Err(e) = params.save_to(config_path) {
            tracing::warn!(error = %e, "could not persist last-used settings");
        }

        settings
    }

    /// Resolve `"auto"` sentinel values and apply the `--debug` flag.
    fn resolve_auto_values(mut settings: Settings) -> Settings {
        if settings.timezone == "auto" {
            settings.timezone = time_utils::get_system_timezone();
        }

        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }

        settings
    }

    /// Store directory, defaulting to `~/.stock-pulse/store`.
    pub fn store_dir(&self) -> PathBuf {
        self.store_dir
            .clone()
            .unwrap_or_else(|| home_dir().join(APP_DIR).join("store"))
    }

    /// Import files given on the command line, paired with their source.
    pub fn imports(&self) -> Vec<(SourceType, PathBuf)> {
        [
            (SourceType::Cin7, &self.cin7),
            (SourceType::Manhattan, &self.manhattan),
            (SourceType::Sales, &self.sales),
        ]
        .into_iter()
        .filter_map(|(source, path)| path.clone().map(|p| (source, p)))
        .collect()
    }

    /// Date range from `--from`/`--to` when given, otherwise from `--range`
    /// resolved against `today`.
    pub fn date_range(&self, today: NaiveDate) -> Result<DateRange> {
        let preset: DateRangePreset = self.range.parse().map_err(PulseError::Config)?;
        let resolved = preset.resolve(today);

        let from = match &self.from {
            Some(s) => time_utils::parse_date(s)?,
            None => resolved.from,
        };
        let to = match &self.to {
            Some(s) => time_utils::parse_date(s)?,
            None => resolved.to,
        };
        Ok(DateRange { from, to })
    }

    /// Filter snapshot described by these settings.
    pub fn filters(&self, today: NaiveDate) -> Result<Filters> {
        Ok(Filters {
            region: self.region.parse::<Region>().map_err(PulseError::Config)?,
            brand: self.brand.parse::<Brand>().map_err(PulseError::Config)?,
            date_range: self.date_range(today)?,
            comparison_period: self
                .comparison
                .parse::<ComparisonPeriod>()
                .map_err(PulseError::Config)?,
        })
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            region: Some(s.region.clone()),
            brand: Some(s.brand.clone()),
            range: Some(s.range.clone()),
            comparison: Some(s.comparison.clone()),
            timezone: Some(s.timezone.clone()),
            format: Some(s.format.clone()),
        }
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

// ── Tests ──────────────────────────────────────────────────────────────────────
