//! In-memory raster model.
//!
//! A [`Grid`] is what the raster I/O collaborator hands to the core: a single
//! band of `f64` values in row-major order, an optional nodata sentinel and an
//! optional per-cell area. Grids are never mutated by the core; every stage
//! produces a new grid.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FimError, Result};

/// Grid dimensions as `(rows, cols)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    pub rows: usize,
    pub cols: usize,
}

impl Shape {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Number of cells, or `None` when `rows * cols` overflows.
    pub fn checked_len(&self) -> Option<usize> {
        self.rows.checked_mul(self.cols)
    }

    /// Number of cells. Saturates for shapes no grid can hold.
    pub fn len(&self) -> usize {
        self.checked_len().unwrap_or(usize::MAX)
    }

    /// Fail with [`FimError::InvalidGrid`] unless `count` cells fill this
    /// shape exactly.
    pub fn ensure_len(&self, count: usize, what: &str) -> Result<()> {
        match self.checked_len() {
            Some(len) if len == count => Ok(()),
            Some(_) => Err(FimError::InvalidGrid(format!(
                "{count} {what} do not fill a {self} grid"
            ))),
            None => Err(FimError::InvalidGrid(format!(
                "{self} grid has more cells than can be addressed"
            ))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

/// Affine pixel geometry of a north-up raster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    /// Usually negative for north-up rasters.
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// Area of one cell in squared map units.
    pub fn cell_area(&self) -> f64 {
        (self.pixel_width * self.pixel_height).abs()
    }
}

/// Accept a cell area only when it is positive and finite.
pub fn validate_cell_area(cell_area: f64) -> Result<f64> {
    if cell_area.is_finite() && cell_area > 0.0 {
        Ok(cell_area)
    } else {
        Err(FimError::InvalidGrid(format!(
            "cell area must be positive and finite, got {cell_area}"
        )))
    }
}

/// Single-band raster held fully in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    shape: Shape,
    values: Vec<f64>,
    nodata: Option<f64>,
    transform: Option<GeoTransform>,
    cell_area: Option<f64>,
}

impl Grid {
    /// Build a grid from row-major values.
    ///
    /// Fails with [`FimError::InvalidGrid`] when `values` does not hold exactly
    /// `rows * cols` cells.
    pub fn new(rows: usize, cols: usize, values: Vec<f64>) -> Result<Self> {
        let shape = Shape::new(rows, cols);
        shape.ensure_len(values.len(), "values")?;
        Ok(Self {
            shape,
            values,
            nodata: None,
            transform: None,
            cell_area: None,
        })
    }

    /// Build a grid from values already known to fill `shape`.
    pub(crate) fn from_shape(shape: Shape, values: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), shape.len());
        Self {
            shape,
            values,
            nodata: None,
            transform: None,
            cell_area: None,
        }
    }

    /// Build a grid from nested rows. All rows must have the same length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map(Vec::len).unwrap_or(0);
        if let Some((idx, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_cols) {
            return Err(FimError::InvalidGrid(format!(
                "row {} has {} columns, expected {}",
                idx,
                row.len(),
                n_cols
            )));
        }
        Self::new(n_rows, n_cols, rows.into_iter().flatten().collect())
    }

    /// Set the nodata sentinel.
    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = Some(nodata);
        self
    }

    /// Attach pixel geometry; the cell area is derived from it.
    ///
    /// A transform with a zero or non-finite pixel size is rejected.
    pub fn with_transform(mut self, transform: GeoTransform) -> Result<Self> {
        self.cell_area = Some(validate_cell_area(transform.cell_area())?);
        self.transform = Some(transform);
        Ok(self)
    }

    /// Override the cell area directly.
    pub fn with_cell_area(mut self, cell_area: f64) -> Result<Self> {
        self.cell_area = Some(validate_cell_area(cell_area)?);
        Ok(self)
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn rows(&self) -> usize {
        self.shape.rows
    }

    pub fn cols(&self) -> usize {
        self.shape.cols
    }

    /// Row-major cell values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.shape.rows || col >= self.shape.cols {
            return None;
        }
        self.values.get(row * self.shape.cols + col).copied()
    }

    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    pub fn transform(&self) -> Option<GeoTransform> {
        self.transform
    }

    pub fn cell_area(&self) -> Option<f64> {
        self.cell_area
    }

    /// Whether `value` equals this grid's nodata sentinel.
    ///
    /// A NaN sentinel matches NaN cells.
    pub fn is_nodata(&self, value: f64) -> bool {
        match self.nodata {
            Some(nd) if nd.is_nan() => value.is_nan(),
            Some(nd) => value == nd,
            None => false,
        }
    }

    /// Fail with [`FimError::ShapeMismatch`] unless `other` matches this grid.
    pub fn ensure_shape(&self, other: Shape, context: &str) -> Result<()> {
        if self.shape != other {
            return Err(FimError::shape_mismatch(context, self.shape, other));
        }
        Ok(())
    }
}
