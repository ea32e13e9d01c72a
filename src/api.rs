//! Public type surface of the preprocessing library.
//!
//! This file consolidates the handle types used to address nodes of the
//! project tree and re-exports the model and service types consumers need.
//! Handles are plain index triples: they stay valid for the lifetime of the
//! tree because collection is append-only.

pub use crate::models::legend::{ColorSchema, LegendSpec};
pub use crate::models::project::{
    BasemapSettings, DataType, Extension, FieldDescriptor, GeoExtent, LegendPalettes, MapOutput,
    Output, OutputKind, Project, ReplicationInfo, Scenario, TableOutput, ZoomSettings,
};
pub use crate::models::stats::{OverallStats, YearStats};

use serde::{Deserialize, Serialize};

/// Handle to a Scenario within a Project.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScenarioId(pub usize);

/// Handle to an Extension within a Project.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtensionId {
    pub scenario: usize,
    pub extension: usize,
}

/// Handle to an Output within a Project.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputId {
    pub scenario: usize,
    pub extension: usize,
    pub output: usize,
}

impl ScenarioId {
    pub fn new(value: usize) -> Self {
        ScenarioId(value)
    }

    pub fn value(&self) -> usize {
        self.0
    }
}

impl ExtensionId {
    pub fn new(scenario: ScenarioId, extension: usize) -> Self {
        ExtensionId {
            scenario: scenario.0,
            extension,
        }
    }

    pub fn scenario_id(&self) -> ScenarioId {
        ScenarioId(self.scenario)
    }
}

impl OutputId {
    pub fn new(extension: ExtensionId, output: usize) -> Self {
        OutputId {
            scenario: extension.scenario,
            extension: extension.extension,
            output,
        }
    }

    pub fn extension_id(&self) -> ExtensionId {
        ExtensionId {
            scenario: self.scenario,
            extension: self.extension,
        }
    }

    pub fn scenario_id(&self) -> ScenarioId {
        ScenarioId(self.scenario)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for ExtensionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.scenario, self.extension)
    }
}

impl std::fmt::Display for OutputId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.scenario, self.extension, self.output)
    }
}
