use crate::{
    aggregator::{MeasurementAggregate, aggregate, probe_sources},
    chart::{
        ChartBuilder, ChartModel, chart_title,
        palette::DEFAULT_PALETTE,
        render_svg,
        scale::ScaleTable,
    },
    decoder::{MeasurementId, decode},
    geolocation::{GeoCache, IpApiLocator, OfflineLocator, OriginLocator},
    projector::{TableRow, project, read_table, write_table},
    settings::Settings,
    summary::{render_summaries, summarize},
};
use anyhow::{Context, Result, anyhow};
use chrono::Local;
use std::{
    fmt, fs,
    path::{Path, PathBuf},
};
use tracing::{debug, error, info, warn};

const STATS_PREFIX: &str = "stats_";
const TABLE_PREFIX: &str = "table_";
const CHART_PREFIX: &str = "chart_";

/// Outcome of one pipeline stage.
///
/// Only input files are counted here. Failing to write an artifact aborts the
/// stage with an error instead.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StageReport {
    pub processed: usize,
    pub failed: usize,
}

impl StageReport {
    /// The loaded input, or `None` after logging and counting the failure
    fn admit<T>(&mut self, file: &Path, loaded: Result<T>) -> Option<T> {
        match loaded {
            Ok(input) => Some(input),
            Err(e) => {
                error!("Failed to process {}: {:#}", file.display(), e);
                self.failed += 1;
                None
            }
        }
    }
}

impl fmt::Display for StageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} processed, {} failed", self.processed, self.failed)
    }
}

/// Live locator when geolocation is enabled, cache-only otherwise
pub fn locator_from_settings(settings: &Settings) -> Result<Box<dyn OriginLocator>> {
    if !settings.geolocation.enabled {
        info!("Geolocation disabled, using cached origins only");
        return Ok(Box::new(OfflineLocator));
    }
    let locator = IpApiLocator::new(
        &settings.geolocation.base_url,
        settings.geolocation.timeout(),
    )
    .context("Failed to build geolocation client")?;
    Ok(Box::new(locator))
}

/// Resolve where artifacts go: explicit override, then settings, then next to the measurements
pub fn resolve_output_dir(
    override_dir: Option<&Path>,
    settings: &Settings,
    measurements_dir: &Path,
) -> PathBuf {
    override_dir
        .map(Path::to_path_buf)
        .or_else(|| settings.output_dir.clone())
        .or_else(|| {
            measurements_dir
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
        })
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Runs the aggregate, tabulate and chart stages over a batch of measurement files
pub struct Pipeline {
    settings: Settings,
    output_dir: PathBuf,
    locator: Box<dyn OriginLocator>,
    print_summary: bool,
}

impl Pipeline {
    /// `output_dir` is usually the result of [`resolve_output_dir`]
    pub fn new(
        settings: Settings,
        output_dir: impl Into<PathBuf>,
        locator: Box<dyn OriginLocator>,
    ) -> Self {
        let output_dir = output_dir.into();
        Self {
            settings,
            output_dir,
            locator,
            print_summary: false,
        }
    }

    /// Print per-probe statistics while aggregating
    pub fn with_summary(mut self, print_summary: bool) -> Self {
        self.print_summary = print_summary;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn cache_path(&self) -> PathBuf {
        self.output_dir.join(&self.settings.geolocation.cache_file)
    }

    fn ensure_output_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!(
                "Failed to create output directory {}",
                self.output_dir.display()
            )
        })
    }

    /// Decode and aggregate every measurement file, writing `stats_{id}.json` per file
    pub async fn write_traceroute_data(&self, measurements_dir: &Path) -> Result<StageReport> {
        if !measurements_dir.is_dir() {
            return Err(anyhow!(
                "Measurements directory {} does not exist",
                measurements_dir.display()
            ));
        }
        self.ensure_output_dir()?;

        let files = list_files(measurements_dir, |_| true)?;
        info!(
            "Aggregating {} measurement files from {}",
            files.len(),
            measurements_dir.display()
        );

        let mut cache = GeoCache::load_or_default(&self.cache_path());
        let mut report = StageReport::default();
        for file in files {
            let loaded = self.aggregate_file(&file, &mut cache).await;
            if let Some(measurement) = report.admit(&file, loaded) {
                self.write_stats(&measurement)?;
                report.processed += 1;

                if self.print_summary {
                    println!("\nMeasurement {}", measurement.measurement_id);
                    println!("{}", render_summaries(&summarize(&measurement, &cache)));
                }
            }
        }

        cache.save().with_context(|| {
            format!(
                "Failed to save geolocation cache {}",
                cache.path().display()
            )
        })?;

        info!("Aggregate stage: {}", report);
        Ok(report)
    }

    async fn aggregate_file(
        &self,
        file: &Path,
        cache: &mut GeoCache,
    ) -> Result<MeasurementAggregate> {
        let bytes = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
        let records = decode(&bytes)?;
        let measurement = aggregate(&records)?;

        for (probe_id, address) in probe_sources(&records) {
            cache
                .resolve(self.locator.as_ref(), probe_id, address)
                .await;
        }

        Ok(measurement)
    }

    fn write_stats(&self, measurement: &MeasurementAggregate) -> Result<PathBuf> {
        let path = self.artifact_path(STATS_PREFIX, measurement.measurement_id, "json");
        fs::write(&path, serde_json::to_string_pretty(measurement)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!(
            "Wrote {} samples for {} probes to {}",
            measurement.sample_count(),
            measurement.probes.len(),
            path.display()
        );
        Ok(path)
    }

    /// Project every `stats_*.json` artifact into `table_{id}.csv`
    pub fn generate_csv_tables(&self) -> Result<StageReport> {
        self.ensure_output_dir()?;
        let files = list_files(&self.output_dir, |name| {
            name.starts_with(STATS_PREFIX) && name.ends_with(".json")
        })?;
        info!("Tabulating {} aggregate files", files.len());

        let cache = GeoCache::load_or_default(&self.cache_path());
        let mut report = StageReport::default();
        for file in files {
            let loaded = self.tabulate_file(&file, &cache);
            if let Some((measurement_id, rows)) = report.admit(&file, loaded) {
                let path = self.artifact_path(TABLE_PREFIX, measurement_id, "csv");
                write_table(&path, &rows)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                report.processed += 1;
            }
        }

        info!("Tabulate stage: {}", report);
        Ok(report)
    }

    fn tabulate_file(
        &self,
        file: &Path,
        cache: &GeoCache,
    ) -> Result<(MeasurementId, Vec<TableRow>)> {
        let contents =
            fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
        let measurement: MeasurementAggregate = serde_json::from_slice(&contents)?;
        let rows = project(&measurement, cache, &Local)?;
        Ok((measurement.measurement_id, rows))
    }

    /// Render every `table_*.csv` artifact into `chart_{id}.svg`
    pub fn generate_charts(&self) -> Result<StageReport> {
        self.ensure_output_dir()?;
        let files = list_files(&self.output_dir, |name| {
            name.starts_with(TABLE_PREFIX) && name.ends_with(".csv")
        })?;
        info!("Charting {} tables", files.len());

        let scales = ScaleTable::default();
        let builder = ChartBuilder::new(
            &DEFAULT_PALETTE,
            self.settings.chart.palette_policy,
            &scales,
        );

        let mut report = StageReport::default();
        for file in files {
            let loaded = self.chart_file(&builder, &file);
            if let Some(model) = report.admit(&file, loaded) {
                let path = self.artifact_path(CHART_PREFIX, model.measurement_id, "svg");
                render_svg(
                    &model,
                    &path,
                    (self.settings.chart.width, self.settings.chart.height),
                )
                .with_context(|| format!("Failed to write {}", path.display()))?;
                report.processed += 1;
            }
        }

        info!("Chart stage: {}", report);
        Ok(report)
    }

    fn chart_file(&self, builder: &ChartBuilder<'_>, file: &Path) -> Result<ChartModel> {
        let measurement_id = measurement_id_from_name(file, TABLE_PREFIX)?;
        let rows = read_table(file)?;
        let title = chart_title(measurement_id, &self.settings.chart.measurement_labels);
        Ok(builder.build(measurement_id, title, &rows)?)
    }

    fn artifact_path(&self, prefix: &str, measurement_id: MeasurementId, ext: &str) -> PathBuf {
        self.output_dir
            .join(format!("{prefix}{measurement_id}.{ext}"))
    }
}

/// Regular files of `dir` whose names pass `filter`, sorted by name
fn list_files<F>(dir: &Path, filter: F) -> Result<Vec<PathBuf>>
where
    F: Fn(&str) -> bool,
{
    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to read directory {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        match path.file_name().and_then(|n| n.to_str()) {
            Some(name) if filter(name) => files.push(path),
            Some(_) => {}
            None => warn!("Skipping non UTF-8 file name {}", path.display()),
        }
    }
    files.sort();
    Ok(files)
}

fn measurement_id_from_name(file: &Path, prefix: &str) -> Result<MeasurementId> {
    let stem = file
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("Invalid file name {}", file.display()))?;
    stem.strip_prefix(prefix)
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| anyhow!("Cannot read a measurement id from {}", file.display()))
}
