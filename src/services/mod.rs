//! Service layer for the preprocessing pipeline.
//!
//! Services implement the pipeline steps on top of the passive data model:
//! metadata collection, statistics ingestion, legend classification,
//! time-series completion and output writing.

pub mod classification;

pub mod collector;

pub mod exporter;

pub mod stats_provider;

pub mod timesteps;

pub use classification::classify;
pub use collector::MetadataCollector;
pub use exporter::export;
pub use stats_provider::{
    attach_map_statistics, classify_outputs, JsonStatsProvider, RasterStatsProvider,
};
pub use timesteps::{complete_csv_log, complete_time_steps, TimeGrid};
