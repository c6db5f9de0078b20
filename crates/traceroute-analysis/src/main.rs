use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use traceroute_analysis::{
    pipeline::{Pipeline, locator_from_settings, resolve_output_dir},
    settings::Settings,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "traceroute-analysis",
    about = "Per-probe latency and hop summaries, tables and charts from traceroute measurements",
    version,
    author,
    after_help = r#"Configuration:
    Configuration can be provided via:
    1. Environment variables with TRACEROUTE__ prefix (e.g., TRACEROUTE__GEOLOCATION__ENABLED=false)
    2. .env file in the current directory
    3. Config file with -c option (TOML)

Examples:
    # Run every stage, artifacts land next to the measurements directory
    traceroute-analysis data/measurements

    # Only rebuild charts from existing tables
    traceroute-analysis data/measurements --chart

    # Aggregate and print per-probe statistics
    traceroute-analysis data/measurements -a --summary"#
)]
pub struct Cli {
    /// Directory holding the raw traceroute measurement files
    #[arg(value_name = "MEASUREMENTS_PATH")]
    pub measurements_path: PathBuf,

    /// Decode and aggregate measurements into stats_{id}.json
    #[arg(short = 'a', long)]
    pub aggregate: bool,

    /// Project aggregates into table_{id}.csv
    #[arg(short = 't', long)]
    pub tabulate: bool,

    /// Render tables into chart_{id}.svg
    #[arg(short = 'g', long = "chart")]
    pub chart: bool,

    /// Print per-probe statistics while aggregating
    #[arg(long)]
    pub summary: bool,

    /// Path to the configuration file (TOML format)
    ///
    /// If not provided, will attempt to load from environment variables
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory for generated artifacts
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
}

impl Cli {
    /// No stage flag means every stage
    fn stages(&self) -> (bool, bool, bool) {
        if !self.aggregate && !self.tabulate && !self.chart {
            return (true, true, true);
        }
        (self.aggregate, self.tabulate, self.chart)
    }

    pub async fn run(self) -> Result<()> {
        let settings = if let Some(config_path) = &self.config {
            Settings::from_path(config_path)?
        } else {
            Settings::from_env()?
        };
        init_logging(&settings.log_level)?;

        let output_dir = resolve_output_dir(
            self.output_dir.as_deref(),
            &settings,
            &self.measurements_path,
        );
        info!("{}", settings);

        let (aggregate, tabulate, chart) = self.stages();
        let locator = locator_from_settings(&settings)?;
        let pipeline =
            Pipeline::new(settings, output_dir, locator).with_summary(self.summary);

        let mut failed = 0;
        if aggregate {
            failed += pipeline
                .write_traceroute_data(&self.measurements_path)
                .await?
                .failed;
        }
        if tabulate {
            failed += pipeline.generate_csv_tables()?.failed;
        }
        if chart {
            failed += pipeline.generate_charts()?.failed;
        }

        if failed > 0 {
            warn!("{} files could not be processed", failed);
        }
        info!("Artifacts written to {}", pipeline.output_dir().display());
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.run().await
}

fn init_logging(log_level: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}
