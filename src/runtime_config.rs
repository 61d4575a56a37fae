// =============================================================================
// Scanner Configuration — JSON settings with env overrides and atomic save
// =============================================================================
//
// All fields carry a serde default so that adding new fields never breaks
// loading an older config file. Persistence uses an atomic tmp + rename.
//
// Environment overrides (applied by `apply_env`):
//   EMA_SCANNER_MARKET       us | india
//   EMA_SCANNER_TIMEFRAME    daily | hourly | 15m | weekly
//   EMA_SCANNER_CONCURRENCY  positive integer
// =============================================================================

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::instrument_source::{SourceLimits, DEFAULT_MAX_FILE_BYTES, DEFAULT_MAX_INSTRUMENTS};
use crate::types::{Market, Timeframe};

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    1
}

fn default_max_instruments() -> usize {
    DEFAULT_MAX_INSTRUMENTS
}

fn default_max_upload_bytes() -> u64 {
    DEFAULT_MAX_FILE_BYTES
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_us_list_path() -> PathBuf {
    PathBuf::from("data/us_stocks.csv")
}

fn default_india_list_path() -> PathBuf {
    PathBuf::from("data/india_stocks.csv")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

// =============================================================================
// ScannerConfig
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    // --- Scan selection -----------------------------------------------------

    #[serde(default)]
    pub market: Market,

    #[serde(default)]
    pub timeframe: Timeframe,

    /// Maximum fetches in flight. 1 keeps the scan strictly sequential.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    // --- Instrument lists ---------------------------------------------------

    #[serde(default = "default_max_instruments")]
    pub max_instruments: usize,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    #[serde(default = "default_us_list_path")]
    pub us_list_path: PathBuf,

    #[serde(default = "default_india_list_path")]
    pub india_list_path: PathBuf,

    // --- Provider -------------------------------------------------------------

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Reuse fetched series within their staleness window. The cache is
    /// in-memory, so within one `scan` run it only saves repeated symbols.
    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    // --- Output -------------------------------------------------------------

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            market: Market::default(),
            timeframe: Timeframe::default(),
            concurrency: default_concurrency(),
            max_instruments: default_max_instruments(),
            max_upload_bytes: default_max_upload_bytes(),
            us_list_path: default_us_list_path(),
            india_list_path: default_india_list_path(),
            request_timeout_secs: default_request_timeout_secs(),
            cache_enabled: true,
            output_dir: default_output_dir(),
        }
    }
}

impl ScannerConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scanner config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse scanner config from {}", path.display()))?;

        info!(
            path = %path.display(),
            market = %config.market,
            timeframe = %config.timeframe,
            "scanner config loaded"
        );

        Ok(config)
    }

    /// Persist the configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise scanner config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "scanner config saved (atomic)");
        Ok(())
    }

    /// Apply `EMA_SCANNER_*` environment overrides. Invalid values are
    /// ignored with a warning.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup("EMA_SCANNER_MARKET") {
            match raw.parse() {
                Ok(market) => self.market = market,
                Err(e) => warn!(value = %raw, error = %e, "ignoring EMA_SCANNER_MARKET"),
            }
        }
        if let Some(raw) = lookup("EMA_SCANNER_TIMEFRAME") {
            match raw.parse() {
                Ok(timeframe) => self.timeframe = timeframe,
                Err(e) => warn!(value = %raw, error = %e, "ignoring EMA_SCANNER_TIMEFRAME"),
            }
        }
        if let Some(raw) = lookup("EMA_SCANNER_CONCURRENCY") {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => self.concurrency = n,
                _ => warn!(value = %raw, "ignoring EMA_SCANNER_CONCURRENCY"),
            }
        }
    }

    pub fn source_limits(&self) -> SourceLimits {
        SourceLimits {
            max_instruments: self.max_instruments,
            max_file_bytes: self.max_upload_bytes,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Configured default list path for `market`.
    pub fn list_path(&self, market: Market) -> &Path {
        match market {
            Market::Us => &self.us_list_path,
            Market::India => &self.india_list_path,
        }
    }
}
