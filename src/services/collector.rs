//! Metadata collector.
//!
//! Builds the project tree from the project-definition document and the
//! per-scenario metadata directories. Collection is all-or-nothing: any
//! missing directory, missing document, missing attribute or inconsistent
//! replication value aborts the run and no project is returned.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::api::{Project, ScenarioId};
use crate::config::QueryConfig;
use crate::error::{PrepResult, PreprocError};
use crate::models::project::{
    BasemapSettings, DataType, FieldDescriptor, GeoExtent, LegendPalettes, MapOutput, OutputKind,
    ReplicationInfo, TableOutput, ZoomSettings,
};
use crate::xml::{AttributeMap, XmlDocument};

/// Collects scattered per-scenario metadata into one project tree.
pub struct MetadataCollector<'a> {
    config: &'a QueryConfig,
}

/// One scenario entry of the project document, resolved to a directory.
#[derive(Debug)]
struct ScenarioRef {
    name: String,
    dir: PathBuf,
}

impl<'a> MetadataCollector<'a> {
    pub fn new(config: &'a QueryConfig) -> Self {
        Self { config }
    }

    /// Build a fully populated, registered project from a project document.
    pub fn collect(&self, project_file: &Path) -> PrepResult<Project> {
        let doc = XmlDocument::open(project_file)?;
        info!(project = %project_file.display(), "collecting project metadata");

        let mut project = self.read_project_header(&doc)?;
        project.source_checksum = file_checksum(project_file)?;

        let base_dir = project_file.parent().unwrap_or_else(|| Path::new("."));
        for scenario_ref in self.read_scenario_refs(&doc, base_dir)? {
            let id = project.push_scenario(scenario_ref.name.clone());
            info!(scenario = %scenario_ref.name, index = id.value(), "collecting scenario");
            self.collect_scenario(&mut project, id, &scenario_ref.dir)?;
        }

        project.register();
        info!(
            scenarios = project.scenarios().len(),
            outputs = project.output_ids().len(),
            "metadata collection complete"
        );
        Ok(project)
    }

    fn read_project_header(&self, doc: &XmlDocument) -> PrepResult<Project> {
        let q = &self.config.project;

        let name = doc
            .attribute(&q.name_path, &q.name_attr)
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| self.config.default_project_title.clone());
        let mut project = Project::new(name);

        let zoom = first(doc.select_required(&q.zoom_path)?);
        project.zoom = ZoomSettings {
            min: parse_attr(&zoom, "min", doc)?,
            max: parse_attr(&zoom, "max", doc)?,
            init: parse_attr(&zoom, "init", doc)?,
        };

        let basemap = first(doc.select_required(&q.basemap_path)?);
        project.basemap = BasemapSettings {
            brightness: parse_attr(&basemap, "brightness", doc)?,
            contrast: parse_attr(&basemap, "contrast", doc)?,
            saturation: parse_attr(&basemap, "saturation", doc)?,
            source: attr(&basemap, "source", doc)?,
        };

        let legend = first(doc.select_required(&q.legend_path)?);
        project.init_class_count = parse_attr(&legend, "initClassCount", doc)?;
        project.palettes = LegendPalettes {
            sequential: attr(&legend, "sequentialCol", doc)?,
            diverging: attr(&legend, "divergingCol", doc)?,
            qualitative: attr(&legend, "qualitativeCol", doc)?,
        };

        project.srs_wkt = doc.attribute(&q.srs_path, &q.srs_attr).ok_or_else(|| {
            PreprocError::configuration_in(
                doc.source(),
                format!("missing spatial reference ('{}' @{})", q.srs_path, q.srs_attr),
            )
        })?;

        let extent = first(doc.select_required(&q.extent_path)?);
        project.extent = GeoExtent {
            ulx: parse_attr(&extent, "ulx", doc)?,
            uly: parse_attr(&extent, "uly", doc)?,
            lrx: parse_attr(&extent, "lrx", doc)?,
            lry: parse_attr(&extent, "lry", doc)?,
        };

        Ok(project)
    }

    fn read_scenario_refs(
        &self,
        doc: &XmlDocument,
        base_dir: &Path,
    ) -> PrepResult<Vec<ScenarioRef>> {
        let q = &self.config.project;
        let mut refs = Vec::new();

        for entry in doc.select_required(&q.scenarios_path)? {
            let raw_path = attr(&entry, &q.scenario_path_attr, doc)?;
            let dir = if Path::new(&raw_path).is_absolute() {
                PathBuf::from(&raw_path)
            } else {
                base_dir.join(&raw_path)
            };

            if !dir.is_dir() {
                return Err(PreprocError::configuration(format!(
                    "'{}' is not a valid scenario directory",
                    dir.display()
                )));
            }

            let name = entry
                .get(&q.scenario_name_attr)
                .map(|n| n.trim())
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| final_path_segment(&dir));

            refs.push(ScenarioRef { name, dir });
        }

        Ok(refs)
    }

    fn collect_scenario(
        &self,
        project: &mut Project,
        id: ScenarioId,
        scenario_dir: &Path,
    ) -> PrepResult<()> {
        let metadata_dir = scenario_dir.join(&self.config.metadata_dir);
        if !metadata_dir.is_dir() {
            return Err(PreprocError::configuration(format!(
                "'{}' is not a valid metadata directory",
                metadata_dir.display()
            )));
        }

        for extension_dir in sorted_subdirectories(&metadata_dir)? {
            let dir_name = final_path_segment(&extension_dir);
            let extension_file = extension_dir.join(format!("{}.xml", dir_name));
            if !extension_file.is_file() {
                return Err(PreprocError::configuration(format!(
                    "'{}' is missing its extension metadata file '{}.xml'",
                    extension_dir.display(),
                    dir_name
                )));
            }
            self.collect_extension(project, id, scenario_dir, &extension_file)?;
        }

        Ok(())
    }

    fn collect_extension(
        &self,
        project: &mut Project,
        scenario: ScenarioId,
        scenario_dir: &Path,
        extension_file: &Path,
    ) -> PrepResult<()> {
        let q = &self.config.extension;
        let doc = XmlDocument::open(extension_file)?;
        debug!(file = %extension_file.display(), "reading extension metadata");

        // Replication info first: its consistency across all extension
        // documents of the scenario is what makes the scenario usable.
        let replication = first(doc.select_required(&q.replication_path)?);
        project.apply_replication(
            scenario,
            ReplicationInfo {
                time_max: parse_attr(&replication, &q.time_max_attr, &doc)?,
                cell_size: parse_attr(&replication, &q.cell_size_attr, &doc)?,
            },
        )?;

        let info = first(doc.select_required(&q.info_path)?);
        let extension_name = attr(&info, &q.name_attr, &doc)?;
        let time_interval: i64 = parse_attr(&info, &q.interval_attr, &doc)?;
        if time_interval <= 0 {
            return Err(PreprocError::configuration_in(
                doc.source(),
                format!("timeInterval must be positive, got {}", time_interval),
            ));
        }

        let extension_id = project.push_extension(scenario, extension_name, time_interval);

        for output in doc.select_required(&q.outputs_path)? {
            let visualize = attr(&output, &q.visualize_attr, &doc)?;
            if !visualize.eq_ignore_ascii_case("true") {
                continue;
            }

            let output_name = attr(&output, &q.output_name_attr, &doc)?;
            let output_type = attr(&output, &q.output_type_attr, &doc)?;
            let kind = match output_type.to_ascii_lowercase().as_str() {
                "map" => {
                    let template = attr(&output, &q.template_attr, &doc)?;
                    let unit = attr(&output, &q.unit_attr, &doc)?;
                    let raw_type = attr(&output, &q.data_type_attr, &doc)?;
                    let data_type = DataType::from_str(&raw_type).map_err(|_| {
                        PreprocError::configuration_in(
                            doc.source(),
                            format!(
                                "output '{}' has unknown data type '{}'",
                                output_name,
                                raw_type.trim()
                            ),
                        )
                    })?;
                    let resolved = scenario_dir.join(&template);
                    OutputKind::Map(MapOutput::new(
                        &resolved.to_string_lossy(),
                        unit,
                        data_type,
                    ))
                }
                "table" => {
                    let csv_path = scenario_dir.join(attr(&output, &q.csv_path_attr, &doc)?);
                    let field_doc_path =
                        scenario_dir.join(attr(&output, &q.field_doc_attr, &doc)?);
                    let mut table = TableOutput::new(csv_path);
                    for field in self.read_fields(&field_doc_path)? {
                        table.add_field(field);
                    }
                    OutputKind::Table(table)
                }
                other => {
                    return Err(PreprocError::configuration_in(
                        doc.source(),
                        format!(
                            "output '{}' has unknown type '{}' (expected map or table)",
                            output_name, other
                        ),
                    ));
                }
            };

            project.push_output(extension_id, output_name, kind);
        }

        Ok(())
    }

    fn read_fields(&self, field_doc_path: &Path) -> PrepResult<Vec<FieldDescriptor>> {
        let q = &self.config.extension;
        let doc = XmlDocument::open(field_doc_path)?;
        let entries = doc.select_required(&q.fields_path)?;

        let mut fields = Vec::with_capacity(entries.len());
        for entry in entries {
            let name = attr(&entry, &q.field_name_attr, &doc)?;
            let attributes = entry
                .iter()
                .filter(|(key, _)| key.as_str() != q.field_name_attr)
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            fields.push(FieldDescriptor { name, attributes });
        }
        Ok(fields)
    }
}

/// Hex SHA-256 of a file's contents, recorded for provenance.
fn file_checksum(path: &Path) -> PrepResult<String> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// Subdirectories of a directory, sorted lexically by name so index
/// assignment does not depend on platform directory order.
fn sorted_subdirectories(dir: &Path) -> PrepResult<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(dir)?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort_by_key(|path| path.file_name().map(|n| n.to_os_string()));
    Ok(dirs)
}

fn final_path_segment(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn first(mut maps: Vec<AttributeMap>) -> AttributeMap {
    maps.swap_remove(0)
}

fn attr(map: &AttributeMap, name: &str, doc: &XmlDocument) -> PrepResult<String> {
    map.get(name).cloned().ok_or_else(|| {
        PreprocError::configuration_in(doc.source(), format!("missing attribute '{}'", name))
    })
}

fn parse_attr<T>(map: &AttributeMap, name: &str, doc: &XmlDocument) -> PrepResult<T>
where
    T: FromStr,
{
    let raw = attr(map, name, doc)?;
    raw.trim().parse().map_err(|_| {
        PreprocError::configuration_in(
            doc.source(),
            format!("attribute '{}' has invalid value '{}'", name, raw),
        )
    })
}
