pub mod validation;

use crate::chart::palette::PalettePolicy;
use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};
use validation::validate_config;

/// Main settings for traceroute-analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Log level for application logging (e.g., "info", "debug", "warn", "error")
    pub log_level: String,
    /// Where artifacts are written; defaults to the parent of the measurements directory
    pub output_dir: Option<PathBuf>,
    /// Probe origin lookup
    pub geolocation: GeolocationSettings,
    /// Chart rendering
    pub chart: ChartSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeolocationSettings {
    /// Disable to rely on the cache file only
    pub enabled: bool,
    /// ipapi.co compatible endpoint
    pub base_url: String,
    /// Per lookup timeout in milliseconds
    pub timeout_ms: u64,
    /// Cache file name, relative to the output directory
    pub cache_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartSettings {
    pub width: u32,
    pub height: u32,
    /// Behaviour once a chart has more probes than palette colors
    pub palette_policy: PalettePolicy,
    /// measurement id -> display name used in the chart title
    pub measurement_labels: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            output_dir: None,
            geolocation: GeolocationSettings::default(),
            chart: ChartSettings::default(),
        }
    }
}

impl Default for GeolocationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://ipapi.co".to_string(),
            timeout_ms: 5000,
            cache_file: "probe_origin.json".to_string(),
        }
    }
}

impl GeolocationSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 1000,
            palette_policy: PalettePolicy::default(),
            measurement_labels: BTreeMap::from([
                ("57017288".to_string(), "Netflix".to_string()),
                ("57017289".to_string(), "HBO".to_string()),
                ("57017290".to_string(), "StarPlus".to_string()),
            ]),
        }
    }
}

impl Settings {
    /// Load configuration from a config file, env vars take priority still
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let settings: Settings = ConfigBuilder::builder()
            .add_source(File::with_name(&path.as_ref().to_string_lossy()))
            .add_source(
                Environment::with_prefix("TRACEROUTE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        validate_config(&settings)?;

        Ok(settings)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self> {
        // NOTE: It's ok if this fails (file might not exist)
        let _ = dotenvy::dotenv();

        let settings: Settings = ConfigBuilder::builder()
            .add_source(
                Environment::with_prefix("TRACEROUTE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        validate_config(&settings)?;

        Ok(settings)
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Settings {{\n\
             \tLog Level: {}\n\
             \tOutput Dir: {:?}\n\
             \tGeolocation: {} ({}, timeout {}ms)\n\
             \tChart Size: {}x{}\n\
             \tPalette Policy: {:?}\n\
             }}",
            self.log_level,
            self.output_dir,
            self.geolocation.base_url,
            if self.geolocation.enabled { "enabled" } else { "disabled" },
            self.geolocation.timeout_ms,
            self.chart.width,
            self.chart.height,
            self.chart.palette_policy,
        )
    }
}
