//! Evaluation of a single raster pair.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use fimeval_core::obs::{emit_job_finished, emit_job_started, emit_regression_compared, JobSpan};
use fimeval_core::persist::{read_stats_json, write_regression_report, write_stats_csv, write_stats_json};
use fimeval_core::{
    evaluate_pair, ArchiveProfiler, ArtifactKind, FimError, FsArtifactStore, Grid, GridSink,
    GridSource, MaskSet, RegressionReport, StatValue, Statistic, StatisticsRecord,
    TOTAL_AREA_LAYER,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Result, RunError};
use crate::layout::{CaseLayout, REGRESSION_REPORT_FILE};
use crate::spec::JobSpec;

/// Files written by one job.
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub job_id: String,
    pub test_id: String,
    pub return_interval: String,
    pub output_dir: PathBuf,
    pub agreement_raster: PathBuf,
    pub stats_csv: PathBuf,
    pub stats_json: PathBuf,
    /// Agreement raster per secondary layer.
    pub layer_rasters: BTreeMap<String, PathBuf>,
    pub regression_report: Option<PathBuf>,
    /// Previous versions whose diff failed.
    pub regression_failures: Vec<String>,
    pub csi: StatValue,
    pub duration_ms: u64,
}

/// Runs jobs against one test-cases directory with fixed inputs.
pub struct JobRunner {
    layout: CaseLayout,
    masks: MaskSet,
    layers: BTreeMap<String, PathBuf>,
    compare_to_previous: bool,
    source: Arc<dyn GridSource>,
    sink: Arc<dyn GridSink>,
}

impl JobRunner {
    pub fn new(layout: CaseLayout, source: Arc<dyn GridSource>, sink: Arc<dyn GridSink>) -> Self {
        Self {
            layout,
            masks: MaskSet::new(),
            layers: BTreeMap::new(),
            compare_to_previous: false,
            source,
            sink,
        }
    }

    pub fn with_masks(mut self, masks: MaskSet) -> Self {
        self.masks = masks;
        self
    }

    /// Secondary layers; relative paths resolve inside the job's
    /// validation-data directory.
    pub fn with_layers(mut self, layers: BTreeMap<String, PathBuf>) -> Self {
        self.layers = layers;
        self
    }

    pub fn compare_to_previous(mut self, compare: bool) -> Self {
        self.compare_to_previous = compare;
        self
    }

    pub fn layout(&self) -> &CaseLayout {
        &self.layout
    }

    /// Evaluate one raster pair and persist its artifacts.
    ///
    /// A missing benchmark or predicted raster fails with
    /// [`FimError::MissingArtifact`] before anything is written.
    pub fn run(&self, job: &JobSpec) -> Result<JobOutcome> {
        let test_id = job.test_case.id();
        let ri = job.return_interval.as_str();
        let _span = JobSpan::enter(&test_id, ri);
        emit_job_started(&test_id, ri, &job.branch);

        self.run_inner(job, &test_id)
            .map_err(|e| RunError::job(&test_id, ri, e))
    }

    fn run_inner(&self, job: &JobSpec, test_id: &str) -> std::result::Result<JobOutcome, FimError> {
        let start = Instant::now();
        let tc = &job.test_case;
        let ri = job.return_interval.as_str();

        let benchmark_path = self.layout.benchmark_raster(tc, ri);
        let predicted_path = self.layout.predicted_raster(tc, &job.branch, ri);
        let benchmark = self.read_input(&benchmark_path, "benchmark raster")?;
        let predicted = self.read_input(&predicted_path, "predicted raster")?;
        let layers = self.load_layers(&self.layout.validation_dir(tc, ri))?;

        let evaluation = evaluate_pair(
            &benchmark,
            &predicted,
            &self.masks,
            (!layers.is_empty()).then_some(&layers),
        )?;

        let output_dir = self.layout.branch_dir(tc, &job.branch, ri);
        let archive = self.layout.archive();
        let agreement_name = ArtifactKind::AgreementRaster.file_name(archive);
        let stats_csv_name = ArtifactKind::StatsCsv.file_name(archive);
        let stats_json_name = ArtifactKind::StatsJson.file_name(archive);

        let total = evaluation
            .total_stats()
            .ok_or_else(|| FimError::missing(test_id, "total_area statistics"))?;

        // Artifacts are written into a staging directory next to the outputs
        // and only moved into place once every write succeeded. The staging
        // directory is removed on drop.
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&output_dir)?;
        let mut staged = StagedArtifacts::new(staging.path());

        self.sink
            .write_grid(&staged.path(&agreement_name), &evaluation.agreement.to_grid())?;

        let mut layer_rasters = BTreeMap::new();
        for (layer, grid) in &evaluation.contingency.layer_grids {
            let raster_name = archive.layer_agreement_name(layer);
            self.sink.write_grid(&staged.path(&raster_name), &grid.to_grid())?;
            if let Some(stats) = evaluation.stats.get(layer) {
                write_stats_csv(&staged.path(&format!("{layer}_stats.csv")), stats)?;
                write_stats_json(&staged.path(&format!("{layer}_stats.json")), stats)?;
            }
            layer_rasters.insert(layer.clone(), output_dir.join(raster_name));
        }

        let (regression_report, regression_failures) = if self.compare_to_previous {
            let report = self.regression(job, total)?;
            write_regression_report(&staged.path(REGRESSION_REPORT_FILE), &report)?;
            emit_regression_compared(test_id, ri, report.versions.len(), report.failures.len());
            let failures = report.failures.into_iter().map(|f| f.version).collect();
            (Some(output_dir.join(REGRESSION_REPORT_FILE)), failures)
        } else {
            (None, Vec::new())
        };

        // The stats record goes last: its presence marks a finished version.
        write_stats_csv(&staged.path(&stats_csv_name), total)?;
        write_stats_json(&staged.path(&stats_json_name), total)?;
        staged.publish(&output_dir)?;

        let agreement_raster = output_dir.join(agreement_name);
        let stats_csv = output_dir.join(stats_csv_name);
        let stats_json = output_dir.join(stats_json_name);

        let csi = total.stat(Statistic::Csi).unwrap_or(StatValue::Undefined);
        let duration_ms = start.elapsed().as_millis() as u64;
        emit_job_finished(test_id, ri, duration_ms, csi.as_f64());

        Ok(JobOutcome {
            job_id: job.digest(),
            test_id: test_id.to_string(),
            return_interval: ri.to_string(),
            output_dir,
            agreement_raster,
            stats_csv,
            stats_json,
            layer_rasters,
            regression_report,
            regression_failures,
            csi,
            duration_ms,
        })
    }

    fn read_input(&self, path: &Path, what: &str) -> std::result::Result<Grid, FimError> {
        self.source.read_grid(path).map_err(|e| match e {
            FimError::MissingArtifact { id, .. } => FimError::missing(id, what),
            other => other,
        })
    }

    fn load_layers(&self, validation_dir: &Path) -> std::result::Result<BTreeMap<String, Grid>, FimError> {
        let mut grids = BTreeMap::new();
        for (name, path) in &self.layers {
            if name == TOTAL_AREA_LAYER {
                return Err(FimError::InvalidLayer(format!(
                    "secondary layer may not be named '{TOTAL_AREA_LAYER}'"
                )));
            }
            let path = if path.is_absolute() {
                path.clone()
            } else {
                validation_dir.join(path)
            };
            grids.insert(name.clone(), self.read_input(&path, "secondary layer")?);
        }
        Ok(grids)
    }

    /// Compare against every archived version that has a stats record.
    fn regression(
        &self,
        job: &JobSpec,
        current: &StatisticsRecord,
    ) -> std::result::Result<RegressionReport, FimError> {
        let store = FsArtifactStore::new(self.layout.previous_versions(&job.test_case));
        let profiler = ArchiveProfiler::new(store, self.layout.archive().clone());

        let mut previous = Vec::new();
        for (version, entry) in profiler.profile(&job.return_interval)? {
            let Some(path) = entry.stats_json else {
                debug!(version = %version, "no stats record archived; skipping");
                continue;
            };
            match read_stats_json(&path) {
                Ok(record) => previous.push((version, record)),
                Err(e) => warn!(version = %version, error = %e, "unreadable archived stats; skipping"),
            }
        }

        Ok(RegressionReport::build(&job.branch, current, &previous, true))
    }
}

/// File names written into a staging directory, in write order.
struct StagedArtifacts<'a> {
    dir: &'a Path,
    names: Vec<String>,
}

impl<'a> StagedArtifacts<'a> {
    fn new(dir: &'a Path) -> Self {
        Self {
            dir,
            names: Vec::new(),
        }
    }

    /// Staging path for `name`, recorded for [`StagedArtifacts::publish`].
    fn path(&mut self, name: &str) -> PathBuf {
        self.names.push(name.to_string());
        self.dir.join(name)
    }

    /// Move every staged file into `output_dir`, replacing earlier runs.
    fn publish(self, output_dir: &Path) -> std::result::Result<(), FimError> {
        for name in &self.names {
            std::fs::rename(self.dir.join(name), output_dir.join(name))?;
        }
        debug!(count = self.names.len(), dir = %output_dir.display(), "published artifacts");
        Ok(())
    }
}
