//! Hierarchical project tree: Project → Scenario → Extension → Output.
//!
//! The tree is a passive container. Nodes are appended during metadata
//! collection and never removed; every append returns a typed handle
//! (`ScenarioId`, `ExtensionId`, `OutputId`) that stays valid for the whole
//! run and is the only way to mutate a node afterwards.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::api::{ExtensionId, OutputId, ScenarioId};
use crate::error::{PrepResult, PreprocError};
use crate::models::legend::LegendSpec;
use crate::models::stats::{OverallStats, YearStats};

/// Zoom limits for the map view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoomSettings {
    pub min: i32,
    pub max: i32,
    pub init: i32,
}

/// Basemap rendering adjustments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasemapSettings {
    pub brightness: f64,
    pub contrast: f64,
    pub saturation: f64,
    pub source: String,
}

/// Geographic extent as upper-left / lower-right corner coordinates, in the
/// project's own spatial reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoExtent {
    pub ulx: f64,
    pub uly: f64,
    pub lrx: f64,
    pub lry: f64,
}

impl GeoExtent {
    /// Center point, midway between the corners.
    pub fn center(&self) -> (f64, f64) {
        (
            self.ulx + (self.lrx - self.ulx) / 2.0,
            self.lry + (self.uly - self.lry) / 2.0,
        )
    }

    /// `[min_x, min_y, max_x, max_y]` bounding box.
    pub fn bounds(&self) -> [f64; 4] {
        [
            self.ulx.min(self.lrx),
            self.uly.min(self.lry),
            self.ulx.max(self.lrx),
            self.uly.max(self.lry),
        ]
    }
}

/// Color palette identifiers for the three legend families.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegendPalettes {
    pub sequential: String,
    pub diverging: String,
    pub qualitative: String,
}

/// Measurement scale of a map output.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Nominal,
    Ordinal,
    Continuous,
}

impl FromStr for DataType {
    type Err = PreprocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nominal" => Ok(DataType::Nominal),
            "ordinal" => Ok(DataType::Ordinal),
            "continuous" => Ok(DataType::Continuous),
            other => Err(PreprocError::configuration(format!(
                "unknown data type '{}' (expected nominal, ordinal or continuous)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DataType::Nominal => "nominal",
            DataType::Ordinal => "ordinal",
            DataType::Continuous => "continuous",
        };
        write!(f, "{}", name)
    }
}

/// One column of a table output, as described by its field-metadata
/// document. `attributes` keeps every attribute of the field element except
/// the name itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
}

/// Map-variant payload of an output.
#[derive(Debug, Clone)]
pub struct MapOutput {
    /// Absolute path template with a `{timestep}` placeholder.
    file_path_template: String,
    pub map_unit: String,
    pub data_type: DataType,
    year_stats: BTreeMap<i64, YearStats>,
    legend: Option<LegendSpec>,
}

impl MapOutput {
    /// Create a map payload. Literal bracket characters are stripped from
    /// the template; some metadata writers wrap the placeholder in them.
    pub fn new(file_path_template: &str, map_unit: impl Into<String>, data_type: DataType) -> Self {
        Self {
            file_path_template: file_path_template.replace(['[', ']'], ""),
            map_unit: map_unit.into(),
            data_type,
            year_stats: BTreeMap::new(),
            legend: None,
        }
    }

    /// The normalized path template.
    pub fn file_path_template(&self) -> &str {
        &self.file_path_template
    }

    /// Raster path for one simulation year.
    pub fn raster_path(&self, year: i64) -> PathBuf {
        PathBuf::from(self.file_path_template.replace("{timestep}", &year.to_string()))
    }

    /// Attach statistics for one year. Re-attaching a year replaces the
    /// previous record.
    pub fn add_year_stats(&mut self, year: i64, stats: YearStats) {
        self.year_stats.insert(year, stats);
    }

    /// Years with attached statistics, ascending.
    pub fn stat_years(&self) -> impl Iterator<Item = i64> + '_ {
        self.year_stats.keys().copied()
    }

    /// Per-year statistics, keyed by year.
    pub fn year_stats(&self) -> &BTreeMap<i64, YearStats> {
        &self.year_stats
    }

    /// Fold the attached years into one overall record. `None` until at
    /// least one year of statistics has been attached.
    pub fn overall_stats(&self) -> Option<OverallStats> {
        OverallStats::from_years(&self.year_stats)
    }

    /// Attach the legend produced by the classification engine.
    pub fn set_legend(&mut self, legend: LegendSpec) {
        self.legend = Some(legend);
    }

    pub fn legend(&self) -> Option<&LegendSpec> {
        self.legend.as_ref()
    }
}

/// Table-variant payload of an output.
#[derive(Debug, Clone)]
pub struct TableOutput {
    pub csv_path: PathBuf,
    fields: Vec<FieldDescriptor>,
}

impl TableOutput {
    pub fn new(csv_path: PathBuf) -> Self {
        Self {
            csv_path,
            fields: Vec::new(),
        }
    }

    pub fn add_field(&mut self, field: FieldDescriptor) {
        self.fields.push(field);
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }
}

/// Variant payload of an output. The variant is fixed at creation.
#[derive(Debug, Clone)]
pub enum OutputKind {
    Map(MapOutput),
    Table(TableOutput),
}

impl OutputKind {
    /// Lowercase tag used in exported documents.
    pub fn type_name(&self) -> &'static str {
        match self {
            OutputKind::Map(_) => "map",
            OutputKind::Table(_) => "table",
        }
    }
}

/// One artifact produced by an extension, sampled over time.
#[derive(Debug, Clone)]
pub struct Output {
    pub name: String,
    pub index: usize,
    pub kind: OutputKind,
}

impl Output {
    pub fn as_map(&self) -> Option<&MapOutput> {
        match &self.kind {
            OutputKind::Map(map) => Some(map),
            OutputKind::Table(_) => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut MapOutput> {
        match &mut self.kind {
            OutputKind::Map(map) => Some(map),
            OutputKind::Table(_) => None,
        }
    }

    pub fn as_table(&self) -> Option<&TableOutput> {
        match &self.kind {
            OutputKind::Table(table) => Some(table),
            OutputKind::Map(_) => None,
        }
    }
}

/// A named sub-model of a scenario producing outputs on a fixed interval.
#[derive(Debug, Clone)]
pub struct Extension {
    pub name: String,
    pub index: usize,
    pub time_interval: i64,
    outputs: Vec<Output>,
}

impl Extension {
    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }
}

/// Replication metadata reported by an extension document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplicationInfo {
    pub time_max: i64,
    pub cell_size: f64,
}

/// One simulation run's output set within a project.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub index: usize,
    /// Last simulated year; set by the first extension that reports it.
    pub time_max: Option<i64>,
    /// Raster cell size; set by the first extension that reports it.
    pub raster_cell_size: Option<f64>,
    extensions: Vec<Extension>,
}

impl Scenario {
    pub fn extensions(&self) -> &[Extension] {
        &self.extensions
    }
}

/// The complete project tree for one preprocessing run.
#[derive(Debug, Clone)]
pub struct Project {
    pub name: String,
    pub zoom: ZoomSettings,
    pub basemap: BasemapSettings,
    /// Spatial reference definition, stored as given (well-known text).
    pub srs_wkt: String,
    pub extent: GeoExtent,
    pub palettes: LegendPalettes,
    pub init_class_count: u32,
    /// Hex SHA-256 of the project document this tree was collected from.
    pub source_checksum: String,
    scenarios: Vec<Scenario>,
    registered: bool,
}

impl Project {
    /// Create an empty project. Header fields start with neutral values and
    /// are filled by the collector before any scenario is appended.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            zoom: ZoomSettings {
                min: 0,
                max: 0,
                init: 0,
            },
            basemap: BasemapSettings {
                brightness: 0.0,
                contrast: 0.0,
                saturation: 0.0,
                source: String::new(),
            },
            srs_wkt: String::new(),
            extent: GeoExtent {
                ulx: 0.0,
                uly: 0.0,
                lrx: 0.0,
                lry: 0.0,
            },
            palettes: LegendPalettes {
                sequential: String::new(),
                diverging: String::new(),
                qualitative: String::new(),
            },
            init_class_count: 0,
            source_checksum: String::new(),
            scenarios: Vec::new(),
            registered: false,
        }
    }

    /// Append a scenario; its index is its position in the project.
    pub fn push_scenario(&mut self, name: impl Into<String>) -> ScenarioId {
        let index = self.scenarios.len();
        self.scenarios.push(Scenario {
            name: name.into(),
            index,
            time_max: None,
            raster_cell_size: None,
            extensions: Vec::new(),
        });
        ScenarioId(index)
    }

    /// Append an extension to a scenario.
    pub fn push_extension(
        &mut self,
        scenario: ScenarioId,
        name: impl Into<String>,
        time_interval: i64,
    ) -> ExtensionId {
        let node = &mut self.scenarios[scenario.0];
        let index = node.extensions.len();
        node.extensions.push(Extension {
            name: name.into(),
            index,
            time_interval,
            outputs: Vec::new(),
        });
        ExtensionId::new(scenario, index)
    }

    /// Append an output to an extension.
    pub fn push_output(
        &mut self,
        extension: ExtensionId,
        name: impl Into<String>,
        kind: OutputKind,
    ) -> OutputId {
        let node = &mut self.scenarios[extension.scenario].extensions[extension.extension];
        let index = node.outputs.len();
        node.outputs.push(Output {
            name: name.into(),
            index,
            kind,
        });
        OutputId::new(extension, index)
    }

    /// Apply replication metadata reported by one extension document. The
    /// first report per scenario is authoritative; any later report must
    /// agree exactly or the whole collection is invalid.
    pub fn apply_replication(
        &mut self,
        scenario: ScenarioId,
        info: ReplicationInfo,
    ) -> PrepResult<()> {
        let node = &mut self.scenarios[scenario.0];

        match node.time_max {
            None => node.time_max = Some(info.time_max),
            Some(existing) if existing != info.time_max => {
                return Err(PreprocError::configuration(format!(
                    "scenario '{}': timeMax {} does not match previously collected value {}",
                    node.name, info.time_max, existing
                )));
            }
            Some(_) => {}
        }

        match node.raster_cell_size {
            None => node.raster_cell_size = Some(info.cell_size),
            Some(existing) if existing != info.cell_size => {
                return Err(PreprocError::configuration(format!(
                    "scenario '{}': rasterOutputCellSize {} does not match previously collected value {}",
                    node.name, info.cell_size, existing
                )));
            }
            Some(_) => {}
        }

        Ok(())
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    pub fn scenario(&self, id: ScenarioId) -> &Scenario {
        &self.scenarios[id.0]
    }

    pub fn extension(&self, id: ExtensionId) -> &Extension {
        &self.scenarios[id.scenario].extensions[id.extension]
    }

    pub fn output(&self, id: OutputId) -> &Output {
        &self.scenarios[id.scenario].extensions[id.extension].outputs[id.output]
    }

    pub fn output_mut(&mut self, id: OutputId) -> &mut Output {
        &mut self.scenarios[id.scenario].extensions[id.extension].outputs[id.output]
    }

    /// Handles of every output, in tree order.
    pub fn output_ids(&self) -> Vec<OutputId> {
        let mut ids = Vec::new();
        for scenario in &self.scenarios {
            for extension in &scenario.extensions {
                for output in &extension.outputs {
                    ids.push(OutputId {
                        scenario: scenario.index,
                        extension: extension.index,
                        output: output.index,
                    });
                }
            }
        }
        ids
    }

    /// Handles of every map output, in tree order.
    pub fn map_output_ids(&self) -> Vec<OutputId> {
        self.output_ids()
            .into_iter()
            .filter(|id| self.output(*id).as_map().is_some())
            .collect()
    }

    /// Mark collection as complete. Downstream consumers refuse
    /// unregistered projects.
    pub fn register(&mut self) {
        self.registered = true;
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }
}
