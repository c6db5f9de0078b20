use crate::settings::Settings;
use anyhow::{Result, bail};
use url::Url;

/// Validate the configuration values
pub fn validate_config(settings: &Settings) -> Result<()> {
    let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_log_levels.contains(&settings.log_level.to_lowercase().as_str()) {
        bail!(
            "Invalid log level '{}'. Valid options are: {:?}",
            settings.log_level,
            valid_log_levels
        );
    }

    match Url::parse(&settings.geolocation.base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(_) => bail!("Geolocation base URL must start with http:// or https://"),
        Err(e) => bail!(
            "Invalid geolocation base URL '{}': {}",
            settings.geolocation.base_url,
            e
        ),
    }

    if settings.geolocation.timeout_ms == 0 {
        bail!("Geolocation timeout_ms must be greater than 0");
    }

    if settings.geolocation.cache_file.is_empty() {
        bail!("Geolocation cache file name cannot be empty");
    }

    if settings.chart.width == 0 || settings.chart.height == 0 {
        bail!(
            "Chart dimensions must be non-zero, got {}x{}",
            settings.chart.width,
            settings.chart.height
        );
    }

    Ok(())
}
