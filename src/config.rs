//! Query configuration for the metadata collector.
//!
//! Every element path and attribute name the collector reads is a named
//! field here, resolved and validated once at load time. Defaults match the
//! stock metadata layout; a TOML file can override individual entries for
//! projects whose documents use different names.

use std::path::Path;

use serde::Deserialize;

use crate::error::{PrepResult, PreprocError};
use crate::xml::NodePath;

/// Queries against the project-definition document.
#[derive(Debug, Clone)]
pub struct ProjectQueries {
    pub name_path: NodePath,
    pub name_attr: String,
    pub zoom_path: NodePath,
    pub basemap_path: NodePath,
    pub legend_path: NodePath,
    pub srs_path: NodePath,
    pub srs_attr: String,
    pub extent_path: NodePath,
    pub scenarios_path: NodePath,
    pub scenario_path_attr: String,
    pub scenario_name_attr: String,
}

/// Queries against a per-extension metadata document.
#[derive(Debug, Clone)]
pub struct ExtensionQueries {
    pub replication_path: NodePath,
    pub time_max_attr: String,
    pub cell_size_attr: String,
    pub info_path: NodePath,
    pub name_attr: String,
    pub interval_attr: String,
    pub outputs_path: NodePath,
    pub output_type_attr: String,
    pub output_name_attr: String,
    pub visualize_attr: String,
    pub template_attr: String,
    pub unit_attr: String,
    pub data_type_attr: String,
    pub csv_path_attr: String,
    pub field_doc_attr: String,
    pub fields_path: NodePath,
    pub field_name_attr: String,
}

/// Fully resolved collector configuration.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Name of the per-scenario metadata directory.
    pub metadata_dir: String,
    /// Project title used when the project document carries none.
    pub default_project_title: String,
    pub project: ProjectQueries,
    pub extension: ExtensionQueries,
}

impl QueryConfig {
    /// Built-in configuration for the stock metadata layout.
    pub fn builtin() -> Self {
        RawQueryConfig::default()
            .resolve()
            .expect("built-in query configuration must be valid")
    }

    /// Load configuration from a TOML file. Entries missing from the file
    /// keep their built-in defaults; malformed paths are rejected here so
    /// the collector never sees an invalid query.
    pub fn load(path: &Path) -> PrepResult<Self> {
        if !path.is_file() {
            return Err(PreprocError::file_not_found(path));
        }
        let text = std::fs::read_to_string(path)?;
        let raw: RawQueryConfig = toml::from_str(&text).map_err(|e| {
            PreprocError::configuration_in(path, format!("invalid query configuration: {}", e))
        })?;
        raw.resolve()
            .map_err(|e| PreprocError::configuration_in(path, e.to_string()))
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self::builtin()
    }
}

// Raw (serde) form: plain strings, every field defaulted.

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawQueryConfig {
    metadata_dir: String,
    default_project_title: String,
    project: RawProjectQueries,
    extension: RawExtensionQueries,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawProjectQueries {
    name_path: String,
    name_attr: String,
    zoom_path: String,
    basemap_path: String,
    legend_path: String,
    srs_path: String,
    srs_attr: String,
    extent_path: String,
    scenarios_path: String,
    scenario_path_attr: String,
    scenario_name_attr: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawExtensionQueries {
    replication_path: String,
    time_max_attr: String,
    cell_size_attr: String,
    info_path: String,
    name_attr: String,
    interval_attr: String,
    outputs_path: String,
    output_type_attr: String,
    output_name_attr: String,
    visualize_attr: String,
    template_attr: String,
    unit_attr: String,
    data_type_attr: String,
    csv_path_attr: String,
    field_doc_attr: String,
    fields_path: String,
    field_name_attr: String,
}

impl Default for RawQueryConfig {
    fn default() -> Self {
        Self {
            metadata_dir: "metadata".into(),
            default_project_title: "Simulation Project".into(),
            project: RawProjectQueries::default(),
            extension: RawExtensionQueries::default(),
        }
    }
}

impl Default for RawProjectQueries {
    fn default() -> Self {
        Self {
            name_path: "visualizationProject".into(),
            name_attr: "name".into(),
            zoom_path: "visualizationProject/map/zoom".into(),
            basemap_path: "visualizationProject/map/basemap".into(),
            legend_path: "visualizationProject/map/legend".into(),
            srs_path: "visualizationProject/map/projection".into(),
            srs_attr: "wkt".into(),
            extent_path: "visualizationProject/map/extent".into(),
            scenarios_path: "visualizationProject/scenarios/scenario".into(),
            scenario_path_attr: "path".into(),
            scenario_name_attr: "name".into(),
        }
    }
}

impl Default for RawExtensionQueries {
    fn default() -> Self {
        Self {
            replication_path: "extensionMetadata/scenarioReplication".into(),
            time_max_attr: "timeMax".into(),
            cell_size_attr: "rasterOutputCellSize".into(),
            info_path: "extensionMetadata/extension".into(),
            name_attr: "name".into(),
            interval_attr: "timeInterval".into(),
            outputs_path: "extensionMetadata/outputs/output".into(),
            output_type_attr: "type".into(),
            output_name_attr: "name".into(),
            visualize_attr: "visualize".into(),
            template_attr: "filePathTemplate".into(),
            unit_attr: "mapUnit".into(),
            data_type_attr: "dataType".into(),
            csv_path_attr: "csvPath".into(),
            field_doc_attr: "fieldMetadataPath".into(),
            fields_path: "fieldMetadata/fields/field".into(),
            field_name_attr: "name".into(),
        }
    }
}

impl RawQueryConfig {
    fn resolve(self) -> PrepResult<QueryConfig> {
        let p = self.project;
        let e = self.extension;
        Ok(QueryConfig {
            metadata_dir: require(self.metadata_dir, "metadata_dir")?,
            default_project_title: require(self.default_project_title, "default_project_title")?,
            project: ProjectQueries {
                name_path: NodePath::parse(&p.name_path)?,
                name_attr: require(p.name_attr, "project.name_attr")?,
                zoom_path: NodePath::parse(&p.zoom_path)?,
                basemap_path: NodePath::parse(&p.basemap_path)?,
                legend_path: NodePath::parse(&p.legend_path)?,
                srs_path: NodePath::parse(&p.srs_path)?,
                srs_attr: require(p.srs_attr, "project.srs_attr")?,
                extent_path: NodePath::parse(&p.extent_path)?,
                scenarios_path: NodePath::parse(&p.scenarios_path)?,
                scenario_path_attr: require(p.scenario_path_attr, "project.scenario_path_attr")?,
                scenario_name_attr: require(p.scenario_name_attr, "project.scenario_name_attr")?,
            },
            extension: ExtensionQueries {
                replication_path: NodePath::parse(&e.replication_path)?,
                time_max_attr: require(e.time_max_attr, "extension.time_max_attr")?,
                cell_size_attr: require(e.cell_size_attr, "extension.cell_size_attr")?,
                info_path: NodePath::parse(&e.info_path)?,
                name_attr: require(e.name_attr, "extension.name_attr")?,
                interval_attr: require(e.interval_attr, "extension.interval_attr")?,
                outputs_path: NodePath::parse(&e.outputs_path)?,
                output_type_attr: require(e.output_type_attr, "extension.output_type_attr")?,
                output_name_attr: require(e.output_name_attr, "extension.output_name_attr")?,
                visualize_attr: require(e.visualize_attr, "extension.visualize_attr")?,
                template_attr: require(e.template_attr, "extension.template_attr")?,
                unit_attr: require(e.unit_attr, "extension.unit_attr")?,
                data_type_attr: require(e.data_type_attr, "extension.data_type_attr")?,
                csv_path_attr: require(e.csv_path_attr, "extension.csv_path_attr")?,
                field_doc_attr: require(e.field_doc_attr, "extension.field_doc_attr")?,
                fields_path: NodePath::parse(&e.fields_path)?,
                field_name_attr: require(e.field_name_attr, "extension.field_name_attr")?,
            },
        })
    }
}

fn require(value: String, field: &str) -> PrepResult<String> {
    if value.trim().is_empty() {
        return Err(PreprocError::configuration(format!(
            "query configuration field '{}' must not be empty",
            field
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_is_valid() {
        let config = QueryConfig::builtin();
        assert_eq!(config.metadata_dir, "metadata");
        assert_eq!(
            config.project.scenarios_path.to_string(),
            "visualizationProject/scenarios/scenario"
        );
        assert_eq!(config.extension.time_max_attr, "timeMax");
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let raw: RawQueryConfig = toml::from_str(
            r#"
            [project]
            name_path = "forestProject"
            "#,
        )
        .unwrap();
        let config = raw.resolve().unwrap();
        assert_eq!(config.project.name_path.to_string(), "forestProject");
        // untouched entries keep their defaults
        assert_eq!(config.project.name_attr, "name");
        assert_eq!(
            config.extension.outputs_path.to_string(),
            "extensionMetadata/outputs/output"
        );
    }

    #[test]
    fn test_invalid_path_rejected_at_load() {
        let raw: RawQueryConfig = toml::from_str(
            r#"
            [extension]
            outputs_path = "a//b"
            "#,
        )
        .unwrap();
        assert!(raw.resolve().is_err());
    }

    #[test]
    fn test_blank_attribute_rejected() {
        let raw: RawQueryConfig = toml::from_str(
            r#"
            [extension]
            visualize_attr = "  "
            "#,
        )
        .unwrap();
        assert!(raw.resolve().is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<RawQueryConfig, _> = toml::from_str(
            r#"
            [project]
            xpath = "legacy"
            "#,
        );
        assert!(result.is_err());
    }
}
