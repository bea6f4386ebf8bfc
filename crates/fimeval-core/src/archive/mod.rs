//! Lookup of previously computed artifacts, keyed by version and return
//! interval.
//!
//! Layout: `<root>/<version>/<return_interval>/{agreement.<ext>, stats.csv, stats.json}`

pub mod fs;
pub mod memory;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

pub use fs::FsArtifactStore;
pub use memory::MemoryArtifactStore;

/// Default extension of archived agreement rasters.
pub const DEFAULT_RASTER_EXT: &str = "tif";

/// Artifacts the archive knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    AgreementRaster,
    StatsCsv,
    StatsJson,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [
        ArtifactKind::AgreementRaster,
        ArtifactKind::StatsCsv,
        ArtifactKind::StatsJson,
    ];

    /// File name of this artifact inside a return-interval directory.
    pub fn file_name(&self, layout: &ArchiveLayout) -> String {
        match self {
            ArtifactKind::AgreementRaster => format!("agreement.{}", layout.raster_ext),
            ArtifactKind::StatsCsv => "stats.csv".to_string(),
            ArtifactKind::StatsJson => "stats.json".to_string(),
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArtifactKind::AgreementRaster => "agreement_raster",
            ArtifactKind::StatsCsv => "stats_csv",
            ArtifactKind::StatsJson => "stats_json",
        };
        f.write_str(s)
    }
}

/// File naming inside an archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveLayout {
    pub raster_ext: String,
}

impl Default for ArchiveLayout {
    fn default() -> Self {
        Self {
            raster_ext: DEFAULT_RASTER_EXT.to_string(),
        }
    }
}

impl ArchiveLayout {
    pub fn with_raster_ext(raster_ext: impl Into<String>) -> Self {
        Self {
            raster_ext: raster_ext.into(),
        }
    }

    /// Path of `kind` relative to the archive root.
    pub fn relative_path(&self, version: &str, return_interval: &str, kind: ArtifactKind) -> PathBuf {
        Path::new(version)
            .join(return_interval)
            .join(kind.file_name(self))
    }

    /// Agreement raster restricted to a secondary layer.
    pub fn layer_agreement_name(&self, layer: &str) -> String {
        format!("{layer}_agreement.{}", self.raster_ext)
    }
}

/// Backing storage of an archive.
pub trait ArtifactStore: Send + Sync {
    /// Version names under the root, sorted. A missing root has none.
    fn versions(&self) -> Result<Vec<String>>;

    /// Whether `relative` exists.
    fn exists(&self, relative: &Path) -> Result<bool>;

    fn read(&self, relative: &Path) -> Result<Vec<u8>>;

    /// Write `data` at `relative`, creating parents, replacing atomically.
    fn write(&self, relative: &Path, data: &[u8]) -> Result<()>;

    /// Full path of `relative` as reported in archive entries.
    fn resolve(&self, relative: &Path) -> PathBuf;
}

/// Known artifacts of one version at one return interval.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub version: String,
    pub return_interval: String,
    pub agreement_raster: Option<PathBuf>,
    pub stats_csv: Option<PathBuf>,
    pub stats_json: Option<PathBuf>,
}

impl ArchiveEntry {
    pub fn path(&self, kind: ArtifactKind) -> Option<&Path> {
        match kind {
            ArtifactKind::AgreementRaster => self.agreement_raster.as_deref(),
            ArtifactKind::StatsCsv => self.stats_csv.as_deref(),
            ArtifactKind::StatsJson => self.stats_json.as_deref(),
        }
    }

    fn set(&mut self, kind: ArtifactKind, path: PathBuf) {
        match kind {
            ArtifactKind::AgreementRaster => self.agreement_raster = Some(path),
            ArtifactKind::StatsCsv => self.stats_csv = Some(path),
            ArtifactKind::StatsJson => self.stats_json = Some(path),
        }
    }
}

/// Read-only query over an [`ArtifactStore`].
pub struct ArchiveProfiler<S: ArtifactStore> {
    store: S,
    layout: ArchiveLayout,
}

impl<S: ArtifactStore> ArchiveProfiler<S> {
    pub fn new(store: S, layout: ArchiveLayout) -> Self {
        Self { store, layout }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn layout(&self) -> &ArchiveLayout {
        &self.layout
    }

    /// One entry per version, with only the existing artifacts populated.
    pub fn profile(&self, return_interval: &str) -> Result<BTreeMap<String, ArchiveEntry>> {
        let mut archive = BTreeMap::new();
        for version in self.store.versions()? {
            let mut entry = ArchiveEntry {
                version: version.clone(),
                return_interval: return_interval.to_string(),
                ..Default::default()
            };
            for kind in ArtifactKind::ALL {
                let relative = self.layout.relative_path(&version, return_interval, kind);
                if self.store.exists(&relative)? {
                    entry.set(kind, self.store.resolve(&relative));
                }
            }
            archive.insert(version, entry);
        }
        debug!(return_interval, versions = archive.len(), "profiled archive");
        Ok(archive)
    }
}
