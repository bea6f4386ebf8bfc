//! Normalisation of raw rasters into the ternary flood domain.

use serde::{Deserialize, Serialize};

use crate::grid::{Grid, Shape};

/// Ternary cell state after reclassification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reclass {
    /// Dry: value at or below zero.
    Negative,
    /// Wet: value above zero.
    Positive,
    NoData,
}

impl Reclass {
    /// Nodata sentinel used by reclassified and agreement rasters.
    pub const NODATA_CODE: u8 = 10;

    /// Integer code: 0, 1 or 10.
    pub fn code(self) -> u8 {
        match self {
            Reclass::Negative => 0,
            Reclass::Positive => 1,
            Reclass::NoData => Self::NODATA_CODE,
        }
    }
}

/// A grid whose cells are restricted to {0, 1, 10}.
#[derive(Debug, Clone, PartialEq)]
pub struct ReclassifiedGrid {
    shape: Shape,
    cells: Vec<Reclass>,
}

impl ReclassifiedGrid {
    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn cells(&self) -> &[Reclass] {
        &self.cells
    }

    /// Integer codes in row-major order.
    pub fn codes(&self) -> Vec<u8> {
        self.cells.iter().map(|c| c.code()).collect()
    }

    /// View as a plain grid with nodata 10.
    pub fn to_grid(&self) -> Grid {
        let values = self.cells.iter().map(|c| f64::from(c.code())).collect();
        Grid::from_shape(self.shape, values).with_nodata(f64::from(Reclass::NODATA_CODE))
    }
}

/// Reclassify one cell value against the grid's nodata sentinel.
pub fn reclassify_value(grid: &Grid, value: f64) -> Reclass {
    if grid.is_nodata(value) {
        Reclass::NoData
    } else if value > 0.0 {
        Reclass::Positive
    } else {
        Reclass::Negative
    }
}

/// Reclassify a raw raster: nodata → 10, positive → 1, everything else → 0.
pub fn reclassify(grid: &Grid) -> ReclassifiedGrid {
    let cells = grid
        .values()
        .iter()
        .map(|&v| reclassify_value(grid, v))
        .collect();
    ReclassifiedGrid {
        shape: grid.shape(),
        cells,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Grid {
        Grid::from_rows(vec![vec![2.5, 0.0, -3.0], vec![-9999.0, 0.001, 1.0]])
            .unwrap()
            .with_nodata(-9999.0)
    }

    #[test]
    fn test_reclassify_rules() {
        let out = reclassify(&sample());
        assert_eq!(out.codes(), vec![1, 0, 0, 10, 1, 1]);
    }

    #[test]
    fn test_reclassify_without_nodata_treats_sentinel_as_value() {
        let grid = Grid::from_rows(vec![vec![-9999.0, 5.0]]).unwrap();
        assert_eq!(reclassify(&grid).codes(), vec![0, 1]);
    }

    #[test]
    fn test_reclassify_is_idempotent() {
        let once = reclassify(&sample());
        let twice = reclassify(&once.to_grid());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_reclassify_preserves_shape() {
        let out = reclassify(&sample());
        assert_eq!(out.shape(), Shape::new(2, 3));
    }
}
