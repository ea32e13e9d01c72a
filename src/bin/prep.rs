//! Preprocessing CLI.
//!
//! Two subcommands:
//!
//! ```bash
//! # Full pipeline: collect metadata, classify map outputs, write viewer data
//! ecoviz-prep preproc -p project.xml -o ./viewer-out --stats-file stats.json
//!
//! # Complete an extension CSV log onto a fixed time grid
//! ecoviz-prep timesteps -i fire-log.csv -f fire-log-full \
//!     --timestep-column Time --timestep-interval 10 --min-time 0 --max-time 100
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Log level (default: info)

use std::env;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use ecoviz_prep::config::QueryConfig;
use ecoviz_prep::services::{
    attach_map_statistics, classify_outputs, exporter, JsonStatsProvider, MetadataCollector,
    TimeGrid,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Prepares simulation output for the web viewer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Collects project metadata, classifies map outputs and writes viewer data.
    Preproc {
        /// Project definition XML file
        #[arg(short = 'p', long = "projectfile")]
        project_file: PathBuf,

        /// Output folder for viewer data
        #[arg(short = 'o', long = "outputfolder")]
        output_folder: PathBuf,

        /// Precomputed raster statistics document (JSON); without it map
        /// outputs carry no legend
        #[arg(long = "stats-file")]
        stats_file: Option<PathBuf>,

        /// Query configuration override (TOML)
        #[arg(long = "query-config")]
        query_config: Option<PathBuf>,
    },

    /// Creates a new CSV file with all time steps.
    Timesteps {
        /// Extension CSV log file
        #[arg(short = 'i', long = "inputfile")]
        input: PathBuf,

        /// Output CSV file name
        #[arg(short = 'f', long = "outputfile")]
        output: String,

        /// Time-step column name
        #[arg(long = "timestep-column")]
        timestep_column: String,

        /// Time-step interval
        #[arg(long = "timestep-interval")]
        timestep_interval: i64,

        /// Minimum time step
        #[arg(long = "min-time")]
        min_time: i64,

        /// Maximum time step
        #[arg(long = "max-time")]
        max_time: i64,

        /// Group-by column name
        #[arg(short = 'g', long = "groupby")]
        group_by: Option<String>,
    },
}

fn main() {
    FmtSubscriber::builder()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let start = Instant::now();

    let result = match cli.command {
        Command::Preproc {
            project_file,
            output_folder,
            stats_file,
            query_config,
        } => run_preproc(&project_file, &output_folder, stats_file, query_config),
        Command::Timesteps {
            input,
            output,
            timestep_column,
            timestep_interval,
            min_time,
            max_time,
            group_by,
        } => run_timesteps(
            &input,
            &output,
            &timestep_column,
            timestep_interval,
            min_time,
            max_time,
            group_by.as_deref(),
        ),
    };

    match result {
        Ok(()) => {
            info!(elapsed = ?start.elapsed(), "done");
        }
        Err(err) => {
            error!("{:#}", err);
            std::process::exit(1);
        }
    }
}

fn run_preproc(
    project_file: &std::path::Path,
    output_folder: &std::path::Path,
    stats_file: Option<PathBuf>,
    query_config: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = match query_config {
        Some(path) => QueryConfig::load(&path)
            .with_context(|| format!("loading query configuration {}", path.display()))?,
        None => QueryConfig::builtin(),
    };

    let collector = MetadataCollector::new(&config);
    let mut project = collector
        .collect(project_file)
        .with_context(|| format!("collecting metadata from {}", project_file.display()))?;

    match stats_file {
        Some(path) => {
            let provider = JsonStatsProvider::from_file(&path)
                .with_context(|| format!("loading statistics document {}", path.display()))?;
            attach_map_statistics(&mut project, &provider)?;
            classify_outputs(&mut project)?;
        }
        None => {
            info!("no statistics document given; map outputs will carry no legend");
        }
    }

    std::fs::create_dir_all(output_folder)?;
    exporter::export(&project, output_folder)
        .with_context(|| format!("writing viewer data to {}", output_folder.display()))?;
    info!(output = %output_folder.display(), "viewer data written");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_timesteps(
    input: &std::path::Path,
    output: &str,
    timestep_column: &str,
    timestep_interval: i64,
    min_time: i64,
    max_time: i64,
    group_by: Option<&str>,
) -> anyhow::Result<()> {
    let grid = TimeGrid::new(min_time, max_time, timestep_interval)?;
    ecoviz_prep::services::complete_csv_log(input, output, timestep_column, &grid, group_by)
        .with_context(|| format!("completing {}", input.display()))?;
    Ok(())
}
