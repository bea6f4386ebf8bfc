//! Archive profiling, persistence and cross-version regression together.

use std::path::Path;

use fimeval_core::persist::{read_stats_json, regression_report_to_csv, write_stats_csv, write_stats_json};
use fimeval_core::{
    compare, compute_stats, ArchiveLayout, ArchiveProfiler, ArtifactKind, ArtifactStore,
    ContingencyTable, FsArtifactStore, RegressionReport, StatValue,
};

fn seed_version(root: &Path, version: &str, table: ContingencyTable) {
    let layout = ArchiveLayout::default();
    let record = compute_stats(&table);
    write_stats_json(
        &root.join(layout.relative_path(version, "100yr", ArtifactKind::StatsJson)),
        &record,
    )
    .unwrap();
    write_stats_csv(
        &root.join(layout.relative_path(version, "100yr", ArtifactKind::StatsCsv)),
        &record,
    )
    .unwrap();
}

#[test]
fn profile_then_compare_against_every_version() {
    let dir = tempfile::tempdir().unwrap();
    seed_version(dir.path(), "fim_1_0", ContingencyTable::new(50, 10, 10, 30));
    seed_version(dir.path(), "fim_2_0", ContingencyTable::new(52, 8, 9, 31));
    // A version with only the raster for this interval.
    let store = FsArtifactStore::new(dir.path());
    store
        .write(Path::new("fim_0_9/100yr/agreement.tif"), b"raster")
        .unwrap();

    let profiler = ArchiveProfiler::new(store, ArchiveLayout::default());
    let archive = profiler.profile("100yr").unwrap();
    assert_eq!(archive.len(), 3);
    assert!(archive["fim_0_9"].stats_json.is_none());

    let previous: Vec<(String, _)> = archive
        .values()
        .filter_map(|entry| {
            entry
                .stats_json
                .as_ref()
                .map(|p| (entry.version.clone(), read_stats_json(p).unwrap()))
        })
        .collect();
    assert_eq!(previous.len(), 2);

    let current = compute_stats(&ContingencyTable::new(55, 5, 8, 32));
    let report = RegressionReport::build("dev", &current, &previous, true);
    assert!(report.is_complete());
    assert_eq!(
        report.columns(),
        vec!["fim_1_0", "fim_2_0", "dev", "fim_1_0_diff", "fim_2_0_diff"]
    );
    assert_eq!(
        report.row("true_positives"),
        vec![
            StatValue::Integer(30),
            StatValue::Integer(31),
            StatValue::Integer(32),
            StatValue::Integer(2),
            StatValue::Integer(1),
        ]
    );

    let csv = regression_report_to_csv(&report).unwrap();
    assert!(csv.starts_with("statistic,fim_1_0,fim_2_0,dev,fim_1_0_diff,fim_2_0_diff\n"));
    assert_eq!(csv.lines().count(), current.len() + 1);
}

#[test]
fn self_regression_has_no_change() {
    let record = compute_stats(&ContingencyTable::new(0, 0, 0, 0));
    let diff = compare(&record, &record).unwrap();
    for (name, value) in diff.iter() {
        match value {
            StatValue::Integer(v) => assert_eq!(v, 0, "{name}"),
            StatValue::Real(v) => assert_eq!(v, 0.0, "{name}"),
            StatValue::Undefined => {}
        }
    }
    assert_eq!(diff.get("pod_diff"), Some(StatValue::Undefined));
}
