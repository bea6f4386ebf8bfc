//! fimeval core library
//!
//! Agreement classification of a predicted flood-extent raster against a
//! benchmark raster, and the verification statistics derived from it.
//!
//! Pipeline: [`reclassify`] both grids, [`classify`] them into an
//! [`AgreementGrid`], [`apply_masks`], [`aggregate`] into contingency tables,
//! then [`compute_stats`]. [`evaluate_pair`] runs the whole chain.

pub mod agreement;
pub mod archive;
pub mod contingency;
pub mod error;
pub mod evaluate;
pub mod grid;
pub mod grid_io;
pub mod mask;
pub mod obs;
pub mod persist;
pub mod reclassify;
pub mod regression;
pub mod statistics;
pub mod telemetry;
pub mod zones;

pub use agreement::{classify, AgreementClass, AgreementGrid};
pub use archive::{
    ArchiveEntry, ArchiveLayout, ArchiveProfiler, ArtifactKind, ArtifactStore, FsArtifactStore,
    MemoryArtifactStore,
};
pub use contingency::{aggregate, ContingencyReport, ContingencyTable, TOTAL_AREA_LAYER};
pub use error::{FimError, Result};
pub use evaluate::{evaluate_pair, Evaluation};
pub use grid::{GeoTransform, Grid, Shape};
pub use grid_io::{GridDocument, GridSink, GridSource, JsonGridCodec};
pub use mask::{apply_masks, MaskSet};
pub use reclassify::{reclassify, Reclass, ReclassifiedGrid};
pub use regression::{compare, RegressionFailure, RegressionReport};
pub use statistics::{compute_stats, StatValue, Statistic, StatisticsRecord};
pub use zones::{stream_pixel_zones, Allocation, DistanceAllocator, ZoneGrid};

/// Crate version, recorded in batch reports.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
