//! On-disk layout of a test-cases directory.
//!
//! ```text
//! <root>/<test_id>/validation_data/<ri>/<cat>_huc_<huc>_inundation_extent_<ri>.<ext>
//! <root>/<test_id>/performance_archive/development_versions/<branch>/<ri>/
//! <root>/<test_id>/performance_archive/previous_versions/<version>/<ri>/
//! ```

use std::path::{Path, PathBuf};

use fimeval_core::ArchiveLayout;

use crate::spec::TestCase;

pub const REGRESSION_REPORT_FILE: &str = "regression_report.csv";

#[derive(Debug, Clone)]
pub struct CaseLayout {
    root: PathBuf,
    archive: ArchiveLayout,
}

impl CaseLayout {
    pub fn new(root: impl Into<PathBuf>, archive: ArchiveLayout) -> Self {
        Self {
            root: root.into(),
            archive,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn archive(&self) -> &ArchiveLayout {
        &self.archive
    }

    fn ext(&self) -> &str {
        &self.archive.raster_ext
    }

    pub fn test_case_dir(&self, tc: &TestCase) -> PathBuf {
        self.root.join(tc.id())
    }

    pub fn validation_dir(&self, tc: &TestCase, return_interval: &str) -> PathBuf {
        self.test_case_dir(tc).join("validation_data").join(return_interval)
    }

    pub fn benchmark_raster(&self, tc: &TestCase, return_interval: &str) -> PathBuf {
        self.validation_dir(tc, return_interval).join(format!(
            "{}_huc_{}_inundation_extent_{}.{}",
            tc.benchmark_category,
            tc.huc,
            return_interval,
            self.ext()
        ))
    }

    fn performance_archive(&self, tc: &TestCase) -> PathBuf {
        self.test_case_dir(tc).join("performance_archive")
    }

    /// Output directory of `branch` for one return interval.
    pub fn branch_dir(&self, tc: &TestCase, branch: &str, return_interval: &str) -> PathBuf {
        self.performance_archive(tc)
            .join("development_versions")
            .join(branch)
            .join(return_interval)
    }

    /// Inundation raster the mapping step wrote for `branch`.
    pub fn predicted_raster(&self, tc: &TestCase, branch: &str, return_interval: &str) -> PathBuf {
        self.branch_dir(tc, branch, return_interval)
            .join(format!("inundation_extent_{}.{}", tc.huc, self.ext()))
    }

    /// Root of the archive of earlier released versions.
    pub fn previous_versions(&self, tc: &TestCase) -> PathBuf {
        self.performance_archive(tc).join("previous_versions")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> (CaseLayout, TestCase) {
        (
            CaseLayout::new("/data/test_cases", ArchiveLayout::default()),
            "12090301_ble".parse().unwrap(),
        )
    }

    #[test]
    fn benchmark_path() {
        let (l, tc) = layout();
        assert_eq!(
            l.benchmark_raster(&tc, "100yr"),
            PathBuf::from(
                "/data/test_cases/12090301_ble/validation_data/100yr/ble_huc_12090301_inundation_extent_100yr.tif"
            )
        );
    }

    #[test]
    fn branch_and_predicted_paths() {
        let (l, tc) = layout();
        let dir = l.branch_dir(&tc, "dev-lakes", "500yr");
        assert_eq!(
            dir,
            PathBuf::from(
                "/data/test_cases/12090301_ble/performance_archive/development_versions/dev-lakes/500yr"
            )
        );
        assert_eq!(
            l.predicted_raster(&tc, "dev-lakes", "500yr"),
            dir.join("inundation_extent_12090301.tif")
        );
    }

    #[test]
    fn previous_versions_path() {
        let (l, tc) = layout();
        assert_eq!(
            l.previous_versions(&tc),
            PathBuf::from("/data/test_cases/12090301_ble/performance_archive/previous_versions")
        );
    }

    #[test]
    fn raster_ext_follows_archive_layout() {
        let tc: TestCase = "12090301_ble".parse().unwrap();
        let l = CaseLayout::new("/t", ArchiveLayout::with_raster_ext("grid.json"));
        assert!(l
            .benchmark_raster(&tc, "10yr")
            .to_string_lossy()
            .ends_with("_10yr.grid.json"));
    }
}
