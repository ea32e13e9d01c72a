//! Raster statistics records.
//!
//! Per-year statistics are produced by the external raster collaborator;
//! this module only stores them and folds them into one overall record per
//! output for legend classification.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Statistics of one raster year, as reported by the raster collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearStats {
    pub min: f64,
    pub max: f64,
    pub middle: f64,
    /// Distinct values observed outside the nodata mask.
    #[serde(default)]
    pub unique_values_masked: Vec<f64>,
}

/// Statistics folded over every available year of one map output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallStats {
    pub min: f64,
    pub max: f64,
    pub middle: f64,
    /// Sorted distinct values observed across all years.
    pub unique_values: Vec<f64>,
}

impl OverallStats {
    /// Fold per-year statistics into one record. Overall min/max are the
    /// extrema over years; the overall middle is the median of the yearly
    /// middles; unique values are the sorted union. Returns `None` when no
    /// year is available.
    pub fn from_years(years: &BTreeMap<i64, YearStats>) -> Option<Self> {
        if years.is_empty() {
            return None;
        }

        let mut min = f64::MAX;
        let mut max = f64::MIN;
        let mut middles: Vec<f64> = Vec::with_capacity(years.len());
        let mut unique_values: Vec<f64> = Vec::new();

        for stats in years.values() {
            min = min.min(stats.min);
            max = max.max(stats.max);
            middles.push(stats.middle);
            unique_values.extend_from_slice(&stats.unique_values_masked);
        }

        middles.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let middle = if middles.len() % 2 == 0 {
            (middles[middles.len() / 2 - 1] + middles[middles.len() / 2]) / 2.0
        } else {
            middles[middles.len() / 2]
        };

        unique_values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        unique_values.dedup();

        Some(Self {
            min,
            max,
            middle,
            unique_values,
        })
    }
}
