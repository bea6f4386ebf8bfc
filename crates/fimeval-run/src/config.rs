//! Evaluation run configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;

use fimeval_core::{ArchiveLayout, JsonGridCodec};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RunError};
use crate::layout::CaseLayout;
use crate::spec::{JobSpec, TestCase};

pub const DEFAULT_RETURN_INTERVALS: [&str; 3] = ["10yr", "100yr", "500yr"];
pub const DEFAULT_WORKERS: usize = 1;

/// Everything a batch needs; built by the CLI and passed in whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalConfig {
    pub test_cases_dir: PathBuf,
    pub branch: String,
    pub return_intervals: Vec<String>,
    pub workers: usize,
    pub compare_to_previous: bool,
    /// Lake list (column `ID`); used together with `hydro_table`.
    pub lake_feature_csv: Option<PathBuf>,
    /// Hydro table (columns `feature_id`, `HydroID`).
    pub hydro_table: Option<PathBuf>,
    /// Secondary layers counted beside `total_area`, by name.
    pub layers: BTreeMap<String, PathBuf>,
    pub archive: ArchiveLayout,
}

impl EvalConfig {
    pub fn new(test_cases_dir: impl Into<PathBuf>, branch: impl Into<String>) -> Self {
        Self {
            test_cases_dir: test_cases_dir.into(),
            branch: branch.into(),
            return_intervals: DEFAULT_RETURN_INTERVALS.iter().map(|s| s.to_string()).collect(),
            workers: DEFAULT_WORKERS,
            compare_to_previous: false,
            lake_feature_csv: None,
            hydro_table: None,
            layers: BTreeMap::new(),
            archive: ArchiveLayout::with_raster_ext(JsonGridCodec::EXTENSION),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(RunError::Config("workers must be at least 1".to_string()));
        }
        if self.branch.trim().is_empty() || self.branch.contains(['/', '\\']) {
            return Err(RunError::Config(format!(
                "branch name '{}' is not a valid directory name",
                self.branch
            )));
        }
        if self.return_intervals.is_empty() {
            return Err(RunError::Config("no return intervals given".to_string()));
        }
        if self.lake_feature_csv.is_some() != self.hydro_table.is_some() {
            return Err(RunError::Config(
                "lake feature list and hydro table must be given together".to_string(),
            ));
        }
        Ok(())
    }

    pub fn layout(&self) -> CaseLayout {
        CaseLayout::new(self.test_cases_dir.clone(), self.archive.clone())
    }

    /// One job per test case and return interval, in that order.
    pub fn jobs(&self, test_cases: &[TestCase]) -> Vec<JobSpec> {
        test_cases
            .iter()
            .flat_map(|tc| {
                self.return_intervals
                    .iter()
                    .map(move |ri| JobSpec::new(tc.clone(), ri.clone(), self.branch.clone()))
            })
            .collect()
    }
}
