//! Shared fixture builders for integration tests.
//!
//! Builds a miniature project layout on disk: one project document plus
//! per-scenario metadata directories, the way a simulation run leaves them
//! behind.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

pub struct FixtureProject {
    pub dir: TempDir,
    pub project_file: PathBuf,
}

impl FixtureProject {
    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}

pub fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("fixture directory should be creatable");
    }
    fs::write(path, content).expect("fixture file should be writable");
}

pub fn project_xml(name_attr: &str, scenario_entries: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<visualizationProject{name_attr}>
  <map>
    <zoom min="5" max="12" init="8"/>
    <basemap brightness="0.1" contrast="0.2" saturation="0.3" source="osm"/>
    <legend initClassCount="4" sequentialCol="YlGn" divergingCol="RdBu" qualitativeCol="Set2"/>
    <projection wkt="LOCAL_CS[&quot;test&quot;]"/>
    <extent ulx="0.0" uly="100.0" lrx="200.0" lry="0.0"/>
  </map>
  <scenarios>
{scenario_entries}
  </scenarios>
</visualizationProject>
"#
    )
}

pub fn extension_xml(
    time_max: i64,
    cell_size: f64,
    name: &str,
    time_interval: i64,
    outputs: &str,
) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<extensionMetadata>
  <scenarioReplication timeMax="{time_max}" rasterOutputCellSize="{cell_size}"/>
  <extension name="{name}" timeInterval="{time_interval}"/>
  <outputs>
{outputs}
  </outputs>
</extensionMetadata>
"#
    )
}

pub fn field_metadata_xml(fields: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<fieldMetadata>
  <fields>
{fields}
  </fields>
</fieldMetadata>
"#
    )
}

/// Standard two-scenario fixture:
///
/// - `scenario-a` (named "Baseline"): extensions `beetle` and `fire`, fire
///   carrying a continuous map output (bracketed template), a table output
///   and one non-visualized output
/// - `scenario-b` (unnamed, name falls back to the directory): extension
///   `fire` only
pub fn standard_fixture() -> FixtureProject {
    let dir = TempDir::new().expect("tempdir");
    let root = dir.path();

    let project_file = root.join("project.xml");
    write_file(
        &project_file,
        &project_xml(
            r#" name="Demo Project""#,
            r#"    <scenario path="scenario-a" name="Baseline"/>
    <scenario path="scenario-b"/>"#,
        ),
    );

    // scenario-a: two extensions; lexical order must put beetle before fire
    write_file(
        &root.join("scenario-a/metadata/beetle/beetle.xml"),
        &extension_xml(
            20,
            30.0,
            "Base Beetle",
            10,
            r#"    <output type="map" name="damage" visualize="true" filePathTemplate="out/beetle/damage-{timestep}.img" mapUnit="index" dataType="ordinal"/>"#,
        ),
    );
    write_file(
        &root.join("scenario-a/metadata/fire/fire.xml"),
        &extension_xml(
            20,
            30.0,
            "Base Fire",
            10,
            r#"    <output type="map" name="severity" visualize="true" filePathTemplate="out/fire/[severity]-{timestep}.img" mapUnit="class" dataType="continuous"/>
    <output type="table" name="summary" visualize="true" csvPath="out/fire/summary.csv" fieldMetadataPath="out/fire/summary-fields.xml"/>
    <output type="map" name="hidden" visualize="false" filePathTemplate="out/fire/hidden-{timestep}.img" mapUnit="x" dataType="nominal"/>"#,
        ),
    );
    write_file(
        &root.join("scenario-a/out/fire/summary-fields.xml"),
        &field_metadata_xml(
            r#"    <field name="Time" unit="year"/>
    <field name="BurnedArea" unit="ha" aggregate="sum"/>"#,
        ),
    );
    write_file(
        &root.join("scenario-a/out/fire/summary.csv"),
        "Time,BurnedArea\n0,12\n10,7\n",
    );

    // scenario-b: one extension, same replication values as its own first
    write_file(
        &root.join("scenario-b/metadata/fire/fire.xml"),
        &extension_xml(
            50,
            10.0,
            "Base Fire",
            25,
            r#"    <output type="map" name="severity" visualize="true" filePathTemplate="out/fire/severity-{timestep}.img" mapUnit="class" dataType="continuous"/>"#,
        ),
    );

    FixtureProject { dir, project_file }
}
