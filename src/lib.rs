//! # Ecological-Simulation Visualization Preprocessor
//!
//! This crate prepares the output of an ecological-simulation run
//! (scenarios × extensions × map/table outputs over time) for a
//! browser-based viewer.
//!
//! ## Features
//!
//! - **Metadata Collection**: Build one consistent project tree from the
//!   project document and scattered per-scenario metadata directories
//! - **Consistency Validation**: Cross-extension replication metadata must
//!   agree per scenario; any mismatch aborts the run
//! - **Time-Series Completion**: Normalize sparse extension CSV logs onto a
//!   fixed time grid
//! - **Legend Classification**: Turn per-year raster statistics into map
//!   legend class boundaries and color-schema decisions
//! - **Export**: Emit the metadata/statistics JSON documents and viewer
//!   settings the frontend consumes
//!
//! ## Architecture
//!
//! - [`api`]: Handle types and the consolidated public type surface
//! - [`config`]: Typed query configuration (element paths, attribute names)
//! - [`models`]: The passive Project → Scenario → Extension → Output tree
//! - [`services`]: Collection, classification, completion and export steps
//! - [`xml`]: Element-tree XML query service
//!
//! Raster processing (statistics computation, tiling, reprojection) is an
//! external collaborator behind [`services::RasterStatsProvider`].

pub mod api;

pub mod config;
pub mod error;

pub mod models;

pub mod services;

pub mod xml;
