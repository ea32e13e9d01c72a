//! Raster statistics collaborator seam.
//!
//! Raster processing (GDAL, reprojection, tiling) lives outside this crate.
//! The pipeline only needs per-year statistics per raster, so the
//! collaborator is a trait; the shipped implementation reads a precomputed
//! statistics document, and the real raster worker plugs in behind the same
//! trait.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use tracing::{debug, warn};

use crate::api::Project;
use crate::error::{PrepResult, PreprocError};
use crate::models::stats::YearStats;

/// Source of per-year raster statistics.
pub trait RasterStatsProvider {
    /// Statistics for one raster year. `Ok(None)` means the raster for
    /// that year does not exist, which is normal for sparse outputs.
    fn year_stats(&self, raster_path: &Path, year: i64) -> PrepResult<Option<YearStats>>;
}

/// Statistics provider backed by a JSON document of the form
/// `{ "<raster path>": { "<year>": { "min": …, "max": …, "middle": …,
/// "uniqueValuesMasked": [...] } } }`.
#[derive(Debug)]
pub struct JsonStatsProvider {
    by_path: HashMap<String, BTreeMap<i64, YearStats>>,
}

impl JsonStatsProvider {
    pub fn from_file(path: &Path) -> PrepResult<Self> {
        if !path.is_file() {
            return Err(PreprocError::file_not_found(path));
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
            .map_err(|e| PreprocError::configuration_in(path, e.to_string()))
    }

    pub fn from_json(text: &str) -> PrepResult<Self> {
        let raw: HashMap<String, BTreeMap<String, YearStats>> = serde_json::from_str(text)?;
        let mut by_path = HashMap::with_capacity(raw.len());
        for (raster, years) in raw {
            let mut parsed = BTreeMap::new();
            for (year, stats) in years {
                let year: i64 = year.parse().map_err(|_| {
                    PreprocError::configuration(format!(
                        "statistics for '{}' carry a non-integer year '{}'",
                        raster, year
                    ))
                })?;
                parsed.insert(year, stats);
            }
            by_path.insert(raster, parsed);
        }
        Ok(Self { by_path })
    }
}

impl RasterStatsProvider for JsonStatsProvider {
    fn year_stats(&self, raster_path: &Path, year: i64) -> PrepResult<Option<YearStats>> {
        let key = raster_path.to_string_lossy();
        Ok(self
            .by_path
            .get(key.as_ref())
            .and_then(|years| years.get(&year))
            .cloned())
    }
}

/// Walk every map output's time grid and attach the statistics the provider
/// can serve. Years without a raster are skipped; provider failures abort.
pub fn attach_map_statistics(
    project: &mut Project,
    provider: &dyn RasterStatsProvider,
) -> PrepResult<()> {
    for id in project.map_output_ids() {
        let scenario = project.scenario(id.scenario_id());
        let time_max = scenario.time_max.ok_or_else(|| {
            PreprocError::configuration(format!(
                "scenario '{}' has no timeMax; cannot iterate output years",
                scenario.name
            ))
        })?;
        let interval = project.extension(id.extension_id()).time_interval;

        let map = project
            .output(id)
            .as_map()
            .expect("map_output_ids only yields map outputs");
        let paths: Vec<_> = (0..=time_max)
            .step_by(interval as usize)
            .map(|year| (year, map.raster_path(year)))
            .collect();

        let mut attached = 0usize;
        for (year, path) in paths {
            match provider.year_stats(&path, year)? {
                Some(stats) => {
                    attached += 1;
                    project
                        .output_mut(id)
                        .as_map_mut()
                        .expect("map output variant is fixed")
                        .add_year_stats(year, stats);
                }
                None => debug!(year, raster = %path.display(), "year not available"),
            }
        }
        debug!(output = %id, attached, "statistics attached");
    }
    Ok(())
}

/// Classify every map output that has statistics attached. Outputs without
/// statistics keep no legend and are reported; classification failures
/// abort the run.
pub fn classify_outputs(project: &mut Project) -> PrepResult<()> {
    let class_count = project.init_class_count;
    for id in project.map_output_ids() {
        let output = project.output(id);
        let name = output.name.clone();
        let map = output.as_map().expect("map_output_ids only yields map outputs");
        let data_type = map.data_type;

        let Some(stats) = map.overall_stats() else {
            warn!(output = %name, "no statistics attached; skipping legend");
            continue;
        };

        let legend = crate::services::classification::classify(data_type, &stats, class_count)
            .map_err(|e| match e {
                PreprocError::Domain { message } => {
                    PreprocError::domain(format!("output '{}': {}", name, message))
                }
                other => other,
            })?;
        project
            .output_mut(id)
            .as_map_mut()
            .expect("map output variant is fixed")
            .set_legend(legend);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{DataType, MapOutput, OutputKind, ReplicationInfo};
    use std::path::PathBuf;

    const STATS_JSON: &str = r#"{
        "out/fire/severity-0.img": {
            "0": { "min": 1.0, "max": 5.0, "middle": 3.0 }
        },
        "out/fire/severity-10.img": {
            "10": { "min": 2.0, "max": 9.0, "middle": 4.0 }
        }
    }"#;

    fn project_with_map() -> Project {
        let mut project = Project::new("p");
        project.init_class_count = 4;
        let sid = project.push_scenario("baseline");
        project
            .apply_replication(
                sid,
                ReplicationInfo {
                    time_max: 10,
                    cell_size: 30.0,
                },
            )
            .unwrap();
        let eid = project.push_extension(sid, "fire", 10);
        project.push_output(
            eid,
            "severity",
            OutputKind::Map(MapOutput::new(
                "out/fire/severity-{timestep}.img",
                "class",
                DataType::Continuous,
            )),
        );
        project
    }

    #[test]
    fn test_json_provider_lookup() {
        let provider = JsonStatsProvider::from_json(STATS_JSON).unwrap();
        let stats = provider
            .year_stats(&PathBuf::from("out/fire/severity-0.img"), 0)
            .unwrap()
            .unwrap();
        assert_eq!(stats.max, 5.0);
        assert!(provider
            .year_stats(&PathBuf::from("out/fire/severity-0.img"), 5)
            .unwrap()
            .is_none());
        assert!(provider
            .year_stats(&PathBuf::from("unknown.img"), 0)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_json_provider_rejects_bad_year_key() {
        let err =
            JsonStatsProvider::from_json(r#"{"a.img": {"soon": {"min":0,"max":1,"middle":0.5}}}"#)
                .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_attach_skips_missing_years() {
        let mut project = project_with_map();
        let provider = JsonStatsProvider::from_json(STATS_JSON).unwrap();
        attach_map_statistics(&mut project, &provider).unwrap();

        let id = project.map_output_ids()[0];
        let map = project.output(id).as_map().unwrap();
        let years: Vec<i64> = map.stat_years().collect();
        assert_eq!(years, vec![0, 10]);
    }

    #[test]
    fn test_classify_outputs_attaches_legend() {
        let mut project = project_with_map();
        let provider = JsonStatsProvider::from_json(STATS_JSON).unwrap();
        attach_map_statistics(&mut project, &provider).unwrap();
        classify_outputs(&mut project).unwrap();

        let id = project.map_output_ids()[0];
        let legend = project.output(id).as_map().unwrap().legend().unwrap();
        assert!(!legend.classes.is_empty());
    }

    #[test]
    fn test_classify_outputs_without_stats_skips() {
        let mut project = project_with_map();
        classify_outputs(&mut project).unwrap();
        let id = project.map_output_ids()[0];
        assert!(project.output(id).as_map().unwrap().legend().is_none());
    }
}
