//! Output writers.
//!
//! Consumes a registered project tree and produces the artifacts the web
//! viewer reads: the output directory scaffold, copied table CSVs, the
//! scenario and extension metadata documents, per-output statistics
//! documents, and the patched viewer settings file. Writers run after
//! collection and classification have succeeded, so a failed run leaves no
//! partial output behind.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::api::{OutputId, Project};
use crate::error::{PrepResult, PreprocError};
use crate::models::legend::LegendSpec;
use crate::models::project::FieldDescriptor;
use crate::models::stats::OverallStats;

const DATA_DIR: &str = "data";
const METADATA_DIR: &str = "metadata";
const MODELDATA_DIR: &str = "modeldata";
const SETTINGS_FILE: &str = "config/default_settings.json";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScenariosDocument<'a> {
    project_name: &'a str,
    source_checksum: &'a str,
    scenarios: Vec<ScenarioRecord<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScenarioRecord<'a> {
    index: usize,
    name: &'a str,
    time_max: Option<i64>,
    raster_output_cell_size: Option<f64>,
    extensions: Vec<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExtensionsDocument<'a> {
    extensions: Vec<ExtensionRecord<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExtensionRecord<'a> {
    scenario_index: usize,
    index: usize,
    name: &'a str,
    time_interval: i64,
    outputs: Vec<OutputRecord<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OutputRecord<'a> {
    index: usize,
    name: &'a str,
    output_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    map_unit: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a [FieldDescriptor]>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OutputStatsDocument<'a> {
    classification: &'a LegendSpec,
    over_time: &'a OverallStats,
}

/// Run every writer against an output directory.
pub fn export(project: &Project, out_dir: &Path) -> PrepResult<()> {
    scaffold_output_dirs(project, out_dir)?;
    copy_table_outputs(project, out_dir)?;
    write_metadata(project, out_dir)?;
    write_output_stats(project, out_dir)?;

    if out_dir.join(SETTINGS_FILE).is_file() {
        update_settings(project, out_dir)?;
    } else {
        // The settings file ships with the web assets, which an external
        // step copies into the output directory.
        warn!(
            settings = %out_dir.join(SETTINGS_FILE).display(),
            "settings file not present; skipping settings update"
        );
    }
    Ok(())
}

/// Create the output directory scaffold: `data/metadata` plus one directory
/// per scenario/extension/output index, each with a lowercase `__slug__`
/// marker directory naming the node. Extensions without visualized outputs
/// are skipped.
pub fn scaffold_output_dirs(project: &Project, out_dir: &Path) -> PrepResult<()> {
    require_registered(project)?;
    let modeldata = out_dir.join(DATA_DIR).join(MODELDATA_DIR);
    fs::create_dir_all(out_dir.join(DATA_DIR).join(METADATA_DIR))?;
    fs::create_dir_all(&modeldata)?;

    for scenario in project.scenarios() {
        let scenario_dir = modeldata.join(scenario.index.to_string());
        fs::create_dir_all(&scenario_dir)?;
        fs::create_dir_all(scenario_dir.join(marker(&scenario.name)))?;

        for extension in scenario.extensions() {
            if extension.outputs().is_empty() {
                continue;
            }
            let extension_dir = scenario_dir.join(extension.index.to_string());
            fs::create_dir_all(&extension_dir)?;
            fs::create_dir_all(extension_dir.join(marker(&extension.name)))?;

            for output in extension.outputs() {
                let output_dir = extension_dir.join(output.index.to_string());
                fs::create_dir_all(&output_dir)?;
                fs::create_dir_all(output_dir.join(marker(&output.name)))?;
            }
        }
    }

    info!(dir = %modeldata.display(), "output directories created");
    Ok(())
}

/// Copy each table output's source CSV into its output directory as
/// `<index>.csv`.
pub fn copy_table_outputs(project: &Project, out_dir: &Path) -> PrepResult<()> {
    require_registered(project)?;
    for id in project.output_ids() {
        let output = project.output(id);
        let Some(table) = output.as_table() else {
            continue;
        };
        if !table.csv_path.is_file() {
            return Err(PreprocError::file_not_found(&table.csv_path));
        }
        let destination = output_dir(out_dir, id).join(format!("{}.csv", id.output));
        fs::copy(&table.csv_path, &destination)?;
        info!(
            from = %table.csv_path.display(),
            to = %destination.display(),
            "table output copied"
        );
    }
    Ok(())
}

/// Write the scenario and extension metadata documents.
pub fn write_metadata(project: &Project, out_dir: &Path) -> PrepResult<()> {
    require_registered(project)?;
    let metadata_dir = out_dir.join(DATA_DIR).join(METADATA_DIR);

    let scenarios = ScenariosDocument {
        project_name: &project.name,
        source_checksum: &project.source_checksum,
        scenarios: project
            .scenarios()
            .iter()
            .map(|s| ScenarioRecord {
                index: s.index,
                name: &s.name,
                time_max: s.time_max,
                raster_output_cell_size: s.raster_cell_size,
                extensions: s.extensions().iter().map(|e| e.index).collect(),
            })
            .collect(),
    };
    write_json(&metadata_dir.join("metadata.scenarios.json"), &scenarios)?;

    let mut extensions = Vec::new();
    for scenario in project.scenarios() {
        for extension in scenario.extensions() {
            extensions.push(ExtensionRecord {
                scenario_index: scenario.index,
                index: extension.index,
                name: &extension.name,
                time_interval: extension.time_interval,
                outputs: extension
                    .outputs()
                    .iter()
                    .map(|output| OutputRecord {
                        index: output.index,
                        name: &output.name,
                        output_type: output.kind.type_name(),
                        map_unit: output.as_map().map(|m| m.map_unit.as_str()),
                        data_type: output.as_map().map(|m| m.data_type.to_string()),
                        fields: output.as_table().map(|t| t.fields()),
                    })
                    .collect(),
            });
        }
    }
    write_json(
        &metadata_dir.join("metadata.extensions.json"),
        &ExtensionsDocument { extensions },
    )?;

    info!(dir = %metadata_dir.display(), "metadata documents written");
    Ok(())
}

/// Write one statistics document per classified map output.
pub fn write_output_stats(project: &Project, out_dir: &Path) -> PrepResult<()> {
    require_registered(project)?;
    for id in project.map_output_ids() {
        let map = project
            .output(id)
            .as_map()
            .expect("map_output_ids only yields map outputs");
        let (Some(legend), Some(over_time)) = (map.legend(), map.overall_stats()) else {
            continue;
        };
        let document = OutputStatsDocument {
            classification: legend,
            over_time: &over_time,
        };
        write_json(&output_dir(out_dir, id).join("metadata.stats.json"), &document)?;
    }
    Ok(())
}

/// Patch the viewer settings file with this project's display parameters.
pub fn update_settings(project: &Project, out_dir: &Path) -> PrepResult<()> {
    require_registered(project)?;
    let settings_path = out_dir.join(SETTINGS_FILE);
    if !settings_path.is_file() {
        return Err(PreprocError::file_not_found(&settings_path));
    }

    let text = fs::read_to_string(&settings_path)?;
    let mut settings: Value = serde_json::from_str(&text)?;

    let root = as_object(&mut settings, &settings_path)?;
    root.insert("projectname".into(), Value::String(project.name.clone()));

    let map = ensure_object(root, "map");
    map.insert("zoom".into(), serde_json::to_value(project.zoom)?);
    map.insert(
        "center".into(),
        serde_json::to_value(project.extent.center())?,
    );
    map.insert(
        "extent".into(),
        serde_json::to_value(project.extent.bounds())?,
    );

    let basemap = ensure_object(map, "basemap");
    basemap.insert("brightness".into(), project.basemap.brightness.into());
    basemap.insert("contrast".into(), project.basemap.contrast.into());
    basemap.insert("saturation".into(), project.basemap.saturation.into());
    basemap.insert(
        "source".into(),
        Value::String(project.basemap.source.clone()),
    );

    let legend = ensure_object(map, "legend");
    legend.insert(
        "seqCol".into(),
        Value::String(project.palettes.sequential.clone()),
    );
    legend.insert(
        "divCol".into(),
        Value::String(project.palettes.diverging.clone()),
    );
    legend.insert(
        "qualCol".into(),
        Value::String(project.palettes.qualitative.clone()),
    );
    legend.insert(
        "initClassCount".into(),
        Value::from(project.init_class_count),
    );

    fs::write(&settings_path, serde_json::to_string_pretty(&settings)?)?;
    info!(settings = %settings_path.display(), "viewer settings updated");
    Ok(())
}

fn require_registered(project: &Project) -> PrepResult<()> {
    if !project.is_registered() {
        return Err(PreprocError::configuration(
            "project tree is not registered; collection did not complete",
        ));
    }
    Ok(())
}

fn output_dir(out_dir: &Path, id: OutputId) -> PathBuf {
    out_dir
        .join(DATA_DIR)
        .join(MODELDATA_DIR)
        .join(id.scenario.to_string())
        .join(id.extension.to_string())
        .join(id.output.to_string())
}

/// Lowercase directory-marker form of a node name: filesystem-hostile
/// character runs collapse to a single underscore.
fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_separator = false;
    for c in name.to_lowercase().chars() {
        if matches!(c, '\\' | '/' | ':' | '"' | '*' | '?' | '<' | '>' | '|' | ' ') {
            pending_separator = !out.is_empty() || pending_separator;
        } else {
            if pending_separator {
                out.push('_');
                pending_separator = false;
            }
            out.push(c);
        }
    }
    out
}

fn marker(name: &str) -> String {
    format!("__{}__", slug(name))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> PrepResult<()> {
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

fn as_object<'v>(
    value: &'v mut Value,
    path: &Path,
) -> PrepResult<&'v mut serde_json::Map<String, Value>> {
    value.as_object_mut().ok_or_else(|| {
        PreprocError::configuration_in(path, "settings document is not a JSON object".to_string())
    })
}

fn ensure_object<'m>(
    object: &'m mut serde_json::Map<String, Value>,
    key: &str,
) -> &'m mut serde_json::Map<String, Value> {
    if !object.get(key).map(Value::is_object).unwrap_or(false) {
        object.insert(key.to_string(), Value::Object(serde_json::Map::new()));
    }
    object
        .get_mut(key)
        .and_then(Value::as_object_mut)
        .expect("key was just ensured to be an object")
}
