//! Raster I/O seam.
//!
//! The core never parses raster formats itself. [`GridSource`] and
//! [`GridSink`] are implemented by whatever backend the caller has; the
//! bundled [`JsonGridCodec`] stores a grid as a plain JSON document.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::archive::fs::write_atomic;
use crate::error::{FimError, Result};
use crate::grid::{GeoTransform, Grid};

/// Loads a single-band raster.
pub trait GridSource: Send + Sync {
    fn read_grid(&self, path: &Path) -> Result<Grid>;
}

/// Stores a single-band raster.
pub trait GridSink: Send + Sync {
    fn write_grid(&self, path: &Path, grid: &Grid) -> Result<()>;
}

/// On-disk form used by [`JsonGridCodec`]. `null` cells are NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridDocument {
    pub rows: usize,
    pub cols: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodata: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<GeoTransform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell_area: Option<f64>,
    pub values: Vec<Option<f64>>,
}

impl GridDocument {
    pub fn from_grid(grid: &Grid) -> Result<Self> {
        if grid.nodata().is_some_and(f64::is_nan) {
            return Err(FimError::InvalidGrid(
                "a NaN nodata sentinel cannot be stored in a grid document".to_string(),
            ));
        }
        Ok(Self {
            rows: grid.rows(),
            cols: grid.cols(),
            nodata: grid.nodata(),
            transform: grid.transform(),
            cell_area: grid.cell_area(),
            values: grid
                .values()
                .iter()
                .map(|&v| if v.is_nan() { None } else { Some(v) })
                .collect(),
        })
    }

    pub fn into_grid(self) -> Result<Grid> {
        let values = self
            .values
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect();
        let mut grid = Grid::new(self.rows, self.cols, values)?;
        if let Some(nodata) = self.nodata {
            grid = grid.with_nodata(nodata);
        }
        if let Some(transform) = self.transform {
            grid = grid.with_transform(transform)?;
        }
        if let Some(cell_area) = self.cell_area {
            grid = grid.with_cell_area(cell_area)?;
        }
        Ok(grid)
    }
}

/// JSON grid documents with the `grid.json` extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonGridCodec;

impl JsonGridCodec {
    pub const EXTENSION: &'static str = "grid.json";
}

impl GridSource for JsonGridCodec {
    fn read_grid(&self, path: &Path) -> Result<Grid> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FimError::missing(path.display().to_string(), "raster")
            } else {
                FimError::Io(e)
            }
        })?;
        let document: GridDocument =
            serde_json::from_str(&content).map_err(|e| FimError::Parse {
                source_name: path.display().to_string(),
                detail: e.to_string(),
            })?;
        document.into_grid()
    }
}

impl GridSink for JsonGridCodec {
    fn write_grid(&self, path: &Path, grid: &Grid) -> Result<()> {
        let document = GridDocument::from_grid(grid)?;
        write_atomic(path, serde_json::to_string(&document)?.as_bytes())
    }
}
