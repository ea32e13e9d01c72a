//! End-to-end pipeline test: collect → attach statistics → classify →
//! export, against a fixture directory tree and a precomputed statistics
//! document.

mod support;

use serde_json::{json, Value};

use ecoviz_prep::api::ScenarioId;
use ecoviz_prep::config::QueryConfig;
use ecoviz_prep::services::{
    attach_map_statistics, classify_outputs, exporter, JsonStatsProvider, MetadataCollector,
};

use support::standard_fixture;

#[test]
fn test_full_pipeline_writes_viewer_data() {
    let fixture = standard_fixture();
    let config = QueryConfig::builtin();
    let mut project = MetadataCollector::new(&config)
        .collect(&fixture.project_file)
        .expect("collection should succeed");

    // Statistics for scenario-a's two map outputs; scenario-b's raster is
    // deliberately absent so its output stays unclassified.
    let severity = project
        .scenario(ScenarioId::new(0))
        .extensions()[1]
        .outputs()[0]
        .as_map()
        .unwrap();
    let damage = project
        .scenario(ScenarioId::new(0))
        .extensions()[0]
        .outputs()[0]
        .as_map()
        .unwrap();

    let mut stats = serde_json::Map::new();
    for year in [0i64, 10, 20] {
        let mut severity_years = serde_json::Map::new();
        severity_years.insert(
            year.to_string(),
            json!({
                "min": 12.0 + year as f64,
                "max": 60.0 + year as f64,
                "middle": 40.0 + year as f64,
                "uniqueValuesMasked": []
            }),
        );
        stats.insert(
            severity.raster_path(year).display().to_string(),
            Value::Object(severity_years),
        );

        let mut damage_years = serde_json::Map::new();
        damage_years.insert(
            year.to_string(),
            json!({
                "min": 1.0,
                "max": 5.0,
                "middle": 3.0,
                "uniqueValuesMasked": [1.0, 3.0, 5.0]
            }),
        );
        stats.insert(
            damage.raster_path(year).display().to_string(),
            Value::Object(damage_years),
        );
    }
    let provider =
        JsonStatsProvider::from_json(&serde_json::to_string(&Value::Object(stats)).unwrap())
            .unwrap();

    attach_map_statistics(&mut project, &provider).unwrap();
    classify_outputs(&mut project).unwrap();

    let out_dir = fixture.root().join("viewer-out");
    std::fs::create_dir_all(&out_dir).unwrap();
    exporter::export(&project, &out_dir).unwrap();

    // metadata documents
    let scenarios: Value = serde_json::from_str(
        &std::fs::read_to_string(out_dir.join("data/metadata/metadata.scenarios.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(scenarios["scenarios"].as_array().unwrap().len(), 2);
    assert_eq!(scenarios["scenarios"][0]["timeMax"], 20);

    let extensions: Value = serde_json::from_str(
        &std::fs::read_to_string(out_dir.join("data/metadata/metadata.extensions.json")).unwrap(),
    )
    .unwrap();
    let records = extensions["extensions"].as_array().unwrap();
    assert_eq!(records.len(), 3);

    // classified continuous output: stats document with classification
    let severity_stats: Value = serde_json::from_str(
        &std::fs::read_to_string(out_dir.join("data/modeldata/0/1/0/metadata.stats.json"))
            .unwrap(),
    )
    .unwrap();
    assert_eq!(severity_stats["classification"]["colorSchema"], "sequential");
    assert_eq!(severity_stats["overTime"]["min"], 12.0);
    assert_eq!(severity_stats["overTime"]["max"], 80.0);
    assert!(severity_stats["classification"]["classes"]
        .as_array()
        .unwrap()
        .len()
        > 1);

    // ordinal output classified as well
    let damage_stats: Value = serde_json::from_str(
        &std::fs::read_to_string(out_dir.join("data/modeldata/0/0/0/metadata.stats.json"))
            .unwrap(),
    )
    .unwrap();
    assert_eq!(
        damage_stats["classification"]["classes"],
        json!([1.0, 2.0, 3.0, 4.0, 5.0])
    );

    // scenario-b's output had no statistics: no stats document
    assert!(!out_dir.join("data/modeldata/1/0/0/metadata.stats.json").exists());

    // table output copied under its index
    let copied = out_dir.join("data/modeldata/0/1/1/1.csv");
    assert!(copied.is_file());
    assert!(std::fs::read_to_string(copied).unwrap().contains("BurnedArea"));
}

#[test]
fn test_pipeline_without_statistics_still_exports_metadata() {
    let fixture = standard_fixture();
    let config = QueryConfig::builtin();
    let project = MetadataCollector::new(&config)
        .collect(&fixture.project_file)
        .unwrap();

    let out_dir = fixture.root().join("viewer-out");
    std::fs::create_dir_all(&out_dir).unwrap();
    exporter::export(&project, &out_dir).unwrap();

    assert!(out_dir.join("data/metadata/metadata.scenarios.json").is_file());
    assert!(out_dir.join("data/metadata/metadata.extensions.json").is_file());
    // no legends anywhere, so no stats documents
    assert!(!out_dir.join("data/modeldata/0/1/0/metadata.stats.json").exists());
}
