//! Integration tests for batch evaluation over an on-disk test-cases tree.

use std::path::Path;
use std::sync::Arc;

use fimeval_core::persist::{read_stats_json, write_stats_json};
use fimeval_core::{
    compute_stats, ArtifactKind, ContingencyTable, Grid, GridSink, JsonGridCodec, MaskSet,
    StatValue, Statistic,
};
use fimeval_run::{run_batch, EvalConfig, JobRunner, JobStatus, TestCase};

const BRANCH: &str = "dev";

fn seed_pair(config: &EvalConfig, tc: &TestCase, ri: &str, benchmark: &Grid, predicted: &Grid) {
    let layout = config.layout();
    JsonGridCodec
        .write_grid(&layout.benchmark_raster(tc, ri), benchmark)
        .unwrap();
    JsonGridCodec
        .write_grid(&layout.predicted_raster(tc, BRANCH, ri), predicted)
        .unwrap();
}

fn runner(config: &EvalConfig, masks: MaskSet) -> Arc<JobRunner> {
    let codec = Arc::new(JsonGridCodec);
    Arc::new(
        JobRunner::new(config.layout(), codec.clone(), codec)
            .with_masks(masks)
            .with_layers(config.layers.clone())
            .compare_to_previous(config.compare_to_previous),
    )
}

fn config(root: &Path) -> EvalConfig {
    let mut cfg = EvalConfig::new(root, BRANCH);
    cfg.return_intervals = vec!["100yr".into(), "500yr".into()];
    cfg
}

#[tokio::test]
async fn batch_isolates_missing_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let tc: TestCase = "12090301_ble".parse().unwrap();

    // Only 100yr has rasters.
    let benchmark = Grid::from_rows(vec![vec![1.0, 1.0, 0.0]]).unwrap().with_cell_area(1.0).unwrap();
    let predicted = Grid::from_rows(vec![vec![1.0, 0.0, 0.0]]).unwrap();
    seed_pair(&cfg, &tc, "100yr", &benchmark, &predicted);

    let jobs = cfg.jobs(&[tc]);
    let report = run_batch(runner(&cfg, MaskSet::new()), jobs, 2).await.unwrap();

    assert_eq!(report.jobs.len(), 2);
    assert_eq!(report.completed_count(), 1);
    assert_eq!(report.skipped_count(), 1);
    assert_eq!(report.failed_count(), 0);
    assert!(report.success());

    assert_eq!(report.jobs[0].return_interval, "100yr");
    match &report.jobs[0].status {
        JobStatus::Completed(outcome) => {
            assert_eq!(outcome.csi, StatValue::Real(0.5));
            assert!(outcome.stats_json.is_file());
        }
        other => panic!("expected completed, got {other:?}"),
    }
    assert!(matches!(report.jobs[1].status, JobStatus::Skipped { .. }));
}

#[tokio::test]
async fn shape_mismatch_fails_only_its_job() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let good: TestCase = "12090301_ble".parse().unwrap();
    let bad: TestCase = "12040101_ifc".parse().unwrap();

    let grid = Grid::from_rows(vec![vec![1.0, 0.0]]).unwrap();
    for ri in ["100yr", "500yr"] {
        seed_pair(&cfg, &good, ri, &grid, &grid);
        seed_pair(&cfg, &bad, ri, &grid, &Grid::from_rows(vec![vec![1.0]]).unwrap());
    }

    let jobs = cfg.jobs(&[good, bad]);
    let report = run_batch(runner(&cfg, MaskSet::new()), jobs, 1).await.unwrap();

    assert_eq!(report.completed_count(), 2);
    assert_eq!(report.failed_count(), 2);
    assert!(!report.success());
    for job in report.jobs.iter().filter(|j| j.test_id == "12040101_ifc") {
        match &job.status {
            JobStatus::Failed { error } => assert!(error.contains("shape mismatch"), "{error}"),
            other => panic!("expected failure, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn masks_and_regression_report() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path());
    cfg.return_intervals = vec!["100yr".into()];
    cfg.compare_to_previous = true;
    let tc: TestCase = "12090301_ble".parse().unwrap();
    let layout = cfg.layout();

    let benchmark = Grid::from_rows(vec![vec![1.0, 1.0, 0.0, 0.0]]).unwrap();
    let predicted = Grid::from_rows(vec![vec![5.0, -1001.0, 1001.0, 0.0]]).unwrap();
    seed_pair(&cfg, &tc, "100yr", &benchmark, &predicted);

    // One previous version with a stats record, one with a stale key set.
    let archive = layout.previous_versions(&tc);
    let old = compute_stats(&ContingencyTable::new(1, 1, 0, 1));
    write_stats_json(
        &archive.join(cfg.archive.relative_path("fim_2_3", "100yr", ArtifactKind::StatsJson)),
        &old,
    )
    .unwrap();
    let mut stale = fimeval_core::StatisticsRecord::new();
    stale.insert("csi", StatValue::Real(0.1));
    write_stats_json(
        &archive.join(cfg.archive.relative_path("fim_1_0", "100yr", ArtifactKind::StatsJson)),
        &stale,
    )
    .unwrap();

    let masks: MaskSet = [1001].into_iter().collect();
    let report = run_batch(runner(&cfg, masks), cfg.jobs(&[tc]), 1).await.unwrap();

    let outcome = match &report.jobs[0].status {
        JobStatus::Completed(outcome) => outcome.clone(),
        other => panic!("expected completed, got {other:?}"),
    };
    let stats = read_stats_json(&outcome.stats_json).unwrap();
    // Two cells masked: TN 1, TP 1.
    assert_eq!(stats.stat(Statistic::TruePositives), Some(StatValue::Integer(1)));
    assert_eq!(stats.stat(Statistic::TrueNegatives), Some(StatValue::Integer(1)));
    assert_eq!(stats.stat(Statistic::FalseNegatives), Some(StatValue::Integer(0)));

    assert_eq!(outcome.regression_failures, vec!["fim_1_0".to_string()]);
    let csv = std::fs::read_to_string(outcome.regression_report.unwrap()).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("statistic,fim_1_0,fim_2_3,dev,fim_2_3_diff"));
    assert_eq!(lines.next(), Some("true_negatives,,1,1,0"));
    assert!(csv.contains("\nfalse_negatives,,1,0,-1\n"));
}

#[tokio::test]
async fn zero_workers_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let err = run_batch(runner(&cfg, MaskSet::new()), Vec::new(), 0).await.unwrap_err();
    assert!(err.to_string().contains("workers"));
}
