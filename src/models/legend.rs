//! Legend specification attached to map outputs.

use serde::{Deserialize, Serialize};

/// Color schema family the frontend should draw a map legend with.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSchema {
    /// One-directional magnitude.
    Sequential,
    /// Magnitude around a meaningful zero.
    Diverging,
    /// Categorical values without order.
    Qualitative,
}

impl std::fmt::Display for ColorSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ColorSchema::Sequential => "sequential",
            ColorSchema::Diverging => "diverging",
            ColorSchema::Qualitative => "qualitative",
        };
        write!(f, "{}", name)
    }
}

/// Legend class boundaries and drawing hints for one map output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegendSpec {
    pub draw_reverse: bool,
    pub legend_min: f64,
    pub legend_max: f64,
    pub legend_middle: f64,
    pub color_schema: ColorSchema,
    /// Ascending class boundaries. Duplicate values are possible for
    /// narrow ranges and are kept as produced.
    pub classes: Vec<f64>,
}
