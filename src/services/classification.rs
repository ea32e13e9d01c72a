//! Legend classification engine.
//!
//! Turns the overall statistics of one map output into a legend
//! specification: color-schema family, drawing orientation and "nicely
//! rounded" class boundaries. Classification of one output is independent
//! of every other output.

use std::cmp::Ordering;

use crate::error::{PrepResult, PreprocError};
use crate::models::legend::{ColorSchema, LegendSpec};
use crate::models::project::DataType;
use crate::models::stats::OverallStats;

/// Produce the legend specification for one map output.
///
/// `class_count` is the project-wide initial class count and only affects
/// continuous outputs.
pub fn classify(
    data_type: DataType,
    stats: &OverallStats,
    class_count: u32,
) -> PrepResult<LegendSpec> {
    match data_type {
        DataType::Nominal => Ok(classify_nominal(stats)),
        DataType::Ordinal => Ok(classify_ordinal(stats)),
        DataType::Continuous => classify_continuous(stats, class_count),
    }
}

/// Color schema and orientation from the sign of the observed range.
/// Nominal data never reaches this; it is always qualitative.
fn schema_for_range(min: f64, max: f64) -> (ColorSchema, bool) {
    if min < 0.0 && max > 0.0 {
        (ColorSchema::Diverging, false)
    } else if min < 0.0 {
        (ColorSchema::Sequential, true)
    } else {
        (ColorSchema::Sequential, false)
    }
}

/// Rounding granularity for a value: 10 for anything below five digits,
/// otherwise two orders of magnitude below the value's own.
pub(crate) fn rounding_operator(value: f64) -> f64 {
    let digits = if value == 0.0 {
        0
    } else {
        value.abs().log10().trunc() as i32
    };
    if digits <= 3 {
        10.0
    } else {
        10f64.powi(digits - 2)
    }
}

fn classify_nominal(stats: &OverallStats) -> LegendSpec {
    LegendSpec {
        draw_reverse: false,
        legend_min: stats.min,
        legend_max: stats.max,
        legend_middle: stats.middle,
        color_schema: ColorSchema::Qualitative,
        classes: stats.unique_values.clone(),
    }
}

fn classify_ordinal(stats: &OverallStats) -> LegendSpec {
    let (color_schema, draw_reverse) = schema_for_range(stats.min, stats.max);
    let lo = stats.min.round() as i64;
    let hi = stats.max.round() as i64;
    LegendSpec {
        draw_reverse,
        legend_min: stats.min,
        legend_max: stats.max,
        legend_middle: stats.middle,
        color_schema,
        classes: (lo..=hi).map(|v| v as f64).collect(),
    }
}

fn classify_continuous(stats: &OverallStats, class_count: u32) -> PrepResult<LegendSpec> {
    if class_count == 0 {
        return Err(PreprocError::domain(
            "continuous classification requires a positive class count",
        ));
    }

    let (color_schema, draw_reverse) = schema_for_range(stats.min, stats.max);

    let op_min = rounding_operator(stats.min);
    let mut legend_min = (stats.min / op_min).floor() * op_min;
    if legend_min == 0.0 {
        legend_min = 1.0;
    }

    let op_max = rounding_operator(stats.max);
    let legend_max = (stats.max / op_max).ceil() * op_max;
    let legend_middle = (stats.middle / op_max).round() * op_max;

    // A collapsed half-range leaves the class-step division undefined.
    if legend_max == legend_middle || legend_middle == legend_min {
        return Err(PreprocError::domain(format!(
            "zero-width legend range (min {}, middle {}, max {})",
            legend_min, legend_middle, legend_max
        )));
    }

    let steps_per_half = (class_count / 2).saturating_sub(1);
    let half_count = class_count as f64 / 2.0;

    let mut classes = vec![legend_middle];
    extend_half(
        &mut classes,
        legend_middle,
        (legend_max - legend_middle) / half_count,
        steps_per_half,
        1.0,
    );
    extend_half(
        &mut classes,
        legend_middle,
        (legend_middle - legend_min) / half_count,
        steps_per_half,
        -1.0,
    );
    classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    Ok(LegendSpec {
        draw_reverse,
        legend_min,
        legend_max,
        legend_middle,
        color_schema,
        classes,
    })
}

/// Walk one half of the break list. The base step is fixed for the half;
/// each accumulated value is re-rounded with its own operator, so the
/// granularity adapts as the magnitude grows.
fn extend_half(
    classes: &mut Vec<f64>,
    start: f64,
    raw_step: f64,
    steps: u32,
    direction: f64,
) {
    let op = rounding_operator(raw_step);
    let step = (raw_step / op).round() * op;

    let mut current = start;
    for _ in 0..steps {
        let value = current + direction * step;
        let op = rounding_operator(value);
        current = (value / op).round() * op;
        classes.push(current);
    }
}
