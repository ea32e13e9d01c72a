//! Time-series completion for extension CSV logs.
//!
//! Simulation extensions only write log rows for years in which something
//! happened, so their CSV logs have gaps. Completion normalizes a log to a
//! fixed time grid: one row per expected step (or per group and step),
//! synthesizing zero rows where the log is silent.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{PrepResult, PreprocError};

/// Inclusive time grid with a fixed positive step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeGrid {
    pub min: i64,
    pub max: i64,
    pub step: i64,
}

impl TimeGrid {
    pub fn new(min: i64, max: i64, step: i64) -> PrepResult<Self> {
        if step <= 0 {
            return Err(PreprocError::configuration(format!(
                "time-step interval must be positive, got {}",
                step
            )));
        }
        if min > max {
            return Err(PreprocError::configuration(format!(
                "minimum time {} is greater than maximum time {}",
                min, max
            )));
        }
        Ok(Self { min, max, step })
    }

    /// All expected steps: min, min+step, …, ≤ max.
    pub fn expected_steps(&self) -> Vec<i64> {
        (self.min..=self.max).step_by(self.step as usize).collect()
    }
}

/// A tabular log: header plus rows of string cells, column order preserved.
#[derive(Debug, Clone, PartialEq)]
pub struct TableLog {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Where the log was read from; empty for in-memory logs.
    pub source: PathBuf,
}

impl TableLog {
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            header,
            rows,
            source: PathBuf::new(),
        }
    }

    fn column_index(&self, name: &str) -> PrepResult<usize> {
        self.header
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| PreprocError::column_not_found(name, &self.source))
    }
}

/// Read a CSV log. The file must exist and carry a `.csv` extension.
/// Columns with empty header names (trailing separators) are dropped.
pub fn read_csv_log(path: &Path) -> PrepResult<TableLog> {
    if !path.is_file() {
        return Err(PreprocError::file_not_found(path));
    }
    let is_csv = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if !is_csv {
        return Err(PreprocError::file_not_found(path));
    }

    let mut reader = csv::Reader::from_path(path)?;
    let raw_header = reader.headers()?.clone();
    let kept: Vec<usize> = raw_header
        .iter()
        .enumerate()
        .filter(|(_, name)| !name.trim().is_empty())
        .map(|(i, _)| i)
        .collect();
    let header: Vec<String> = kept.iter().map(|&i| raw_header[i].to_string()).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            kept.iter()
                .map(|&i| record.get(i).unwrap_or("").to_string())
                .collect(),
        );
    }

    Ok(TableLog {
        header,
        rows,
        source: path.to_path_buf(),
    })
}

/// Write a log back out as CSV.
pub fn write_csv_log(path: &Path, log: &TableLog) -> PrepResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&log.header)?;
    for row in &log.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Resolve the output path for a completed log: the given name with a
/// `.csv` extension, next to the input file. A name equal to the input
/// file's own stem would overwrite the source and is rejected.
pub fn resolve_output_path(input: &Path, output_name: &str) -> PrepResult<PathBuf> {
    let input_stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let output_stem = Path::new(output_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    if output_stem.is_empty() {
        return Err(PreprocError::configuration(
            "output file name must not be empty",
        ));
    }
    if output_stem.to_lowercase() == input_stem {
        return Err(PreprocError::configuration(format!(
            "output file name '{}' matches the input file name; choose a different name",
            output_name
        )));
    }

    let dir = input.parent().unwrap_or_else(|| Path::new(""));
    Ok(dir.join(format!("{}.csv", output_stem)))
}

/// Complete a log against a time grid.
///
/// Without grouping the result has one row per expected step; with a
/// group-by column, one row per (group, step) pair, groups in first-seen
/// order. An already-complete log (or group) passes through unchanged.
pub fn complete_time_steps(
    log: &TableLog,
    time_column: &str,
    grid: &TimeGrid,
    group_by: Option<&str>,
) -> PrepResult<TableLog> {
    let time_idx = log.column_index(time_column)?;
    let group_idx = group_by.map(|name| log.column_index(name)).transpose()?;

    let times: Vec<i64> = log
        .rows
        .iter()
        .map(|row| parse_time(time_column, &row[time_idx]))
        .collect::<PrepResult<_>>()?;

    let expected = grid.expected_steps();
    let expected_set: BTreeSet<i64> = expected.iter().copied().collect();

    let width = log.header.len();
    let rows = match group_idx {
        None => complete_rows(
            &log.rows,
            &times,
            &expected,
            &expected_set,
            time_idx,
            width,
            None,
        ),
        Some(group_idx) => {
            // Partition by the normalized label, first-seen order.
            let mut order: Vec<String> = Vec::new();
            let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
            for (i, row) in log.rows.iter().enumerate() {
                let label = normalize_group_label(&row[group_idx]).to_string();
                if !groups.contains_key(&label) {
                    order.push(label.clone());
                }
                groups.entry(label).or_default().push(i);
            }

            let mut rows = Vec::new();
            for label in &order {
                let members = &groups[label];
                let member_rows: Vec<Vec<String>> = members
                    .iter()
                    .map(|&i| {
                        let mut row = log.rows[i].clone();
                        row[group_idx] = label.clone();
                        row
                    })
                    .collect();
                let member_times: Vec<i64> = members.iter().map(|&i| times[i]).collect();
                rows.extend(complete_rows(
                    &member_rows,
                    &member_times,
                    &expected,
                    &expected_set,
                    time_idx,
                    width,
                    Some((group_idx, label.as_str())),
                ));
            }
            rows
        }
    };

    Ok(TableLog {
        header: log.header.clone(),
        rows,
        source: log.source.clone(),
    })
}

/// Read, complete and write a log in one step; returns the written path.
pub fn complete_csv_log(
    input: &Path,
    output_name: &str,
    time_column: &str,
    grid: &TimeGrid,
    group_by: Option<&str>,
) -> PrepResult<PathBuf> {
    let output_path = resolve_output_path(input, output_name)?;
    let log = read_csv_log(input)?;
    info!(
        input = %input.display(),
        rows = log.rows.len(),
        "completing time steps"
    );

    let completed = complete_time_steps(&log, time_column, grid, group_by)?;
    debug!(rows = completed.rows.len(), "completed row count");

    write_csv_log(&output_path, &completed)?;
    info!(output = %output_path.display(), "completed log written");
    Ok(output_path)
}

/// Labels differing only by a single leading space are the same group; the
/// trimmed form wins.
fn normalize_group_label(label: &str) -> &str {
    label.strip_prefix(' ').unwrap_or(label)
}

fn parse_time(column: &str, cell: &str) -> PrepResult<i64> {
    let trimmed = cell.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return Ok(value);
    }
    // Some writers emit integral floats ("10.0").
    if let Ok(value) = trimmed.parse::<f64>() {
        if value.is_finite() && value.fract() == 0.0 {
            return Ok(value as i64);
        }
    }
    Err(PreprocError::invalid_value(column, cell))
}

/// Per-step fill logic shared by the grouped and ungrouped paths. `group`
/// carries the column index and normalized label for synthesized rows.
fn complete_rows(
    rows: &[Vec<String>],
    times: &[i64],
    expected: &[i64],
    expected_set: &BTreeSet<i64>,
    time_idx: usize,
    width: usize,
    group: Option<(usize, &str)>,
) -> Vec<Vec<String>> {
    let observed: BTreeSet<i64> = times.iter().copied().collect();
    if observed == *expected_set {
        return rows.to_vec();
    }

    let mut first_match: HashMap<i64, usize> = HashMap::new();
    for (i, time) in times.iter().enumerate() {
        first_match.entry(*time).or_insert(i);
    }

    let mut result = Vec::with_capacity(expected.len());
    for step in expected {
        match first_match.get(step) {
            Some(&i) => result.push(rows[i].clone()),
            None => {
                let mut row = vec!["0".to_string(); width];
                row[time_idx] = step.to_string();
                if let Some((group_idx, label)) = group {
                    row[group_idx] = label.to_string();
                }
                result.push(row);
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn log(header: &[&str], rows: &[&[&str]]) -> TableLog {
        TableLog::new(
            header.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_grid_rejects_bad_parameters() {
        assert!(TimeGrid::new(0, 10, 0).is_err());
        assert!(TimeGrid::new(0, 10, -5).is_err());
        assert!(TimeGrid::new(10, 0, 5).is_err());
    }

    #[test]
    fn test_grid_expected_steps() {
        let grid = TimeGrid::new(0, 20, 10).unwrap();
        assert_eq!(grid.expected_steps(), vec![0, 10, 20]);
        // max not on the grid is simply not reached
        let grid = TimeGrid::new(0, 25, 10).unwrap();
        assert_eq!(grid.expected_steps(), vec![0, 10, 20]);
    }

    #[test]
    fn test_fills_missing_steps_with_zero_rows() {
        let input = log(&["t", "v"], &[&["0", "5"], &["10", "7"]]);
        let grid = TimeGrid::new(0, 20, 10).unwrap();
        let result = complete_time_steps(&input, "t", &grid, None).unwrap();
        assert_eq!(
            result.rows,
            vec![
                vec!["0".to_string(), "5".to_string()],
                vec!["10".to_string(), "7".to_string()],
                vec!["20".to_string(), "0".to_string()],
            ]
        );
    }

    #[test]
    fn test_complete_log_is_returned_unchanged() {
        // Rows out of grid order stay in their original order.
        let input = log(&["t", "v"], &[&["10", "7"], &["0", "5"], &["20", "1"]]);
        let grid = TimeGrid::new(0, 20, 10).unwrap();
        let result = complete_time_steps(&input, "t", &grid, None).unwrap();
        assert_eq!(result.rows, input.rows);
    }

    #[test]
    fn test_missing_time_column() {
        let input = log(&["year", "v"], &[&["0", "5"]]);
        let grid = TimeGrid::new(0, 10, 10).unwrap();
        let err = complete_time_steps(&input, "t", &grid, None).unwrap_err();
        assert!(matches!(err, PreprocError::ColumnNotFound { .. }));
    }

    #[test]
    fn test_missing_group_column() {
        let input = log(&["t", "v"], &[&["0", "5"]]);
        let grid = TimeGrid::new(0, 10, 10).unwrap();
        let err = complete_time_steps(&input, "t", &grid, Some("species")).unwrap_err();
        assert!(matches!(err, PreprocError::ColumnNotFound { .. }));
    }

    #[test]
    fn test_non_integer_time_value() {
        let input = log(&["t", "v"], &[&["soon", "5"]]);
        let grid = TimeGrid::new(0, 10, 10).unwrap();
        let err = complete_time_steps(&input, "t", &grid, None).unwrap_err();
        assert!(matches!(err, PreprocError::InvalidValue { .. }));
    }

    #[test]
    fn test_integral_float_time_accepted() {
        let input = log(&["t", "v"], &[&["10.0", "5"]]);
        let grid = TimeGrid::new(10, 10, 1).unwrap();
        let result = complete_time_steps(&input, "t", &grid, None).unwrap();
        assert_eq!(result.rows, input.rows);
    }

    #[test]
    fn test_grouped_fill_per_group() {
        let input = log(
            &["t", "species", "v"],
            &[
                &["0", "pine", "3"],
                &["0", "oak", "4"],
                &["10", "pine", "6"],
            ],
        );
        let grid = TimeGrid::new(0, 10, 10).unwrap();
        let result = complete_time_steps(&input, "t", &grid, Some("species")).unwrap();
        assert_eq!(
            result.rows,
            vec![
                vec!["0".to_string(), "pine".to_string(), "3".to_string()],
                vec!["10".to_string(), "pine".to_string(), "6".to_string()],
                vec!["0".to_string(), "oak".to_string(), "4".to_string()],
                vec!["10".to_string(), "oak".to_string(), "0".to_string()],
            ]
        );
    }

    #[test]
    fn test_group_label_leading_space_merges() {
        let input = log(
            &["t", "species", "v"],
            &[&["0", " fir", "3"], &["10", "fir", "6"]],
        );
        let grid = TimeGrid::new(0, 20, 10).unwrap();
        let result = complete_time_steps(&input, "t", &grid, Some("species")).unwrap();
        // one group, trimmed label everywhere, missing year synthesized
        assert_eq!(
            result.rows,
            vec![
                vec!["0".to_string(), "fir".to_string(), "3".to_string()],
                vec!["10".to_string(), "fir".to_string(), "6".to_string()],
                vec!["20".to_string(), "fir".to_string(), "0".to_string()],
            ]
        );
    }

    #[test]
    fn test_complete_group_passes_through() {
        let input = log(
            &["t", "species", "v"],
            &[
                &["10", "oak", "2"],
                &["0", "oak", "1"],
                &["0", "pine", "9"],
            ],
        );
        let grid = TimeGrid::new(0, 10, 10).unwrap();
        let result = complete_time_steps(&input, "t", &grid, Some("species")).unwrap();
        // oak is complete and keeps its original (unsorted) order
        assert_eq!(
            result.rows,
            vec![
                vec!["10".to_string(), "oak".to_string(), "2".to_string()],
                vec!["0".to_string(), "oak".to_string(), "1".to_string()],
                vec!["0".to_string(), "pine".to_string(), "9".to_string()],
                vec!["10".to_string(), "pine".to_string(), "0".to_string()],
            ]
        );
    }

    #[test]
    fn test_first_matching_row_wins_on_duplicates() {
        let input = log(&["t", "v"], &[&["0", "first"], &["0", "second"]]);
        let grid = TimeGrid::new(0, 0, 1).unwrap();
        let result = complete_time_steps(&input, "t", &grid, None).unwrap();
        // observed set equals expected set, so both rows pass through
        assert_eq!(result.rows, input.rows);

        let grid = TimeGrid::new(0, 10, 10).unwrap();
        let result = complete_time_steps(&input, "t", &grid, None).unwrap();
        assert_eq!(result.rows[0][1], "first");
        assert_eq!(result.rows[1][1], "0");
    }

    #[test]
    fn test_resolve_output_path() {
        let out = resolve_output_path(Path::new("/logs/fire-log.csv"), "fire-full").unwrap();
        assert_eq!(out, PathBuf::from("/logs/fire-full.csv"));
        // extension on the name is ignored
        let out = resolve_output_path(Path::new("/logs/fire-log.csv"), "fire-full.csv").unwrap();
        assert_eq!(out, PathBuf::from("/logs/fire-full.csv"));
    }

    #[test]
    fn test_resolve_output_path_rejects_collision() {
        let err = resolve_output_path(Path::new("/logs/fire-log.csv"), "Fire-Log").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_read_csv_log_missing_file() {
        let err = read_csv_log(Path::new("/nonexistent/log.csv")).unwrap_err();
        assert!(matches!(err, PreprocError::FileNotFound { .. }));
    }

    #[test]
    fn test_read_csv_log_rejects_non_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        std::fs::write(&path, "t,v\n0,5\n").unwrap();
        let err = read_csv_log(&path).unwrap_err();
        assert!(matches!(err, PreprocError::FileNotFound { .. }));
    }

    #[test]
    fn test_read_csv_log_drops_unnamed_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        std::fs::write(&path, "t,v,\n0,5,\n10,7,\n").unwrap();
        let log = read_csv_log(&path).unwrap();
        assert_eq!(log.header, vec!["t", "v"]);
        assert_eq!(log.rows[1], vec!["10".to_string(), "7".to_string()]);
    }

    #[test]
    fn test_complete_csv_log_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("fire-log.csv");
        std::fs::write(&input, "Time,Burned\n0,4\n20,9\n").unwrap();

        let grid = TimeGrid::new(0, 20, 10).unwrap();
        let written = complete_csv_log(&input, "fire-full", "Time", &grid, None).unwrap();
        assert_eq!(written, dir.path().join("fire-full.csv"));

        let completed = read_csv_log(&written).unwrap();
        assert_eq!(completed.header, vec!["Time", "Burned"]);
        assert_eq!(
            completed.rows,
            vec![
                vec!["0".to_string(), "4".to_string()],
                vec!["10".to_string(), "0".to_string()],
                vec!["20".to_string(), "9".to_string()],
            ]
        );
    }

    proptest! {
        #[test]
        fn prop_ungrouped_step_count(min in -50i64..50, span in 0i64..40, step in 1i64..7) {
            let max = min + span;
            let grid = TimeGrid::new(min, max, step).unwrap();
            let input = log(&["t", "v"], &[]);
            let result = complete_time_steps(&input, "t", &grid, None).unwrap();
            let expected_len = ((max - min) / step + 1) as usize;
            prop_assert_eq!(result.rows.len(), expected_len);
        }

        #[test]
        fn prop_grouped_step_count(min in 0i64..20, span in 0i64..30, step in 1i64..5) {
            let max = min + span;
            let grid = TimeGrid::new(min, max, step).unwrap();
            let first = min.to_string();
            let input = log(
                &["t", "g", "v"],
                &[
                    &[first.as_str(), "alpha", "1"],
                    &[first.as_str(), "beta", "2"],
                ],
            );
            let result = complete_time_steps(&input, "t", &grid, Some("g")).unwrap();
            let expected_len = ((max - min) / step + 1) as usize;
            prop_assert_eq!(result.rows.len(), expected_len * 2);
        }
    }
}
