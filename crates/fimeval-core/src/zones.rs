//! Unique stream-pixel zones for distance allocation.

use crate::error::Result;
use crate::grid::{Grid, Shape};

/// Nodata of a zone grid.
pub const ZONE_NODATA: i64 = -1;

/// Integer grid where every stream cell carries its own identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneGrid {
    shape: Shape,
    zones: Vec<i64>,
}

impl ZoneGrid {
    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn zones(&self) -> &[i64] {
        &self.zones
    }

    /// Number of stream cells.
    pub fn zone_count(&self) -> usize {
        self.zones.iter().filter(|&&z| z != ZONE_NODATA).count()
    }

    /// View as a plain grid with nodata −1, keeping the source geometry.
    pub fn to_grid(&self, like: &Grid) -> Result<Grid> {
        let values = self.zones.iter().map(|&z| z as f64).collect();
        let mut grid = Grid::from_shape(self.shape, values).with_nodata(ZONE_NODATA as f64);
        if let Some(transform) = like.transform() {
            grid = grid.with_transform(transform)?;
        }
        Ok(grid)
    }
}

/// Give each stream cell (value exactly 1) its row-major linear index; every
/// other cell, nodata included, becomes [`ZONE_NODATA`].
pub fn stream_pixel_zones(streams: &Grid) -> ZoneGrid {
    let zones = streams
        .values()
        .iter()
        .enumerate()
        .map(|(idx, &v)| {
            if v == 1.0 && !streams.is_nodata(v) {
                idx as i64
            } else {
                ZONE_NODATA
            }
        })
        .collect();
    ZoneGrid {
        shape: streams.shape(),
        zones,
    }
}

/// Output of a distance allocation over a zone grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    /// Distance from each cell to its nearest zone, in map units.
    pub distance: Grid,
    /// Identifier of that nearest zone.
    pub allocation: Grid,
}

/// External proximity/allocation tool run over a zone grid.
pub trait DistanceAllocator: Send + Sync {
    fn allocate(&self, zones: &Grid) -> Result<Allocation>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GeoTransform;

    #[test]
    fn test_stream_cells_get_linear_index() {
        let streams = Grid::from_rows(vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 1.0]]).unwrap();
        let zones = stream_pixel_zones(&streams);
        assert_eq!(zones.zones(), &[0, -1, -1, -1, 4, 5]);
        assert_eq!(zones.zone_count(), 3);
    }

    #[test]
    fn test_only_exact_one_is_stream() {
        let streams = Grid::from_rows(vec![vec![2.0, 0.5, 1.0]]).unwrap();
        assert_eq!(stream_pixel_zones(&streams).zones(), &[-1, -1, 2]);
    }

    #[test]
    fn test_nodata_one_is_not_stream() {
        let streams = Grid::from_rows(vec![vec![1.0]]).unwrap().with_nodata(1.0);
        assert_eq!(stream_pixel_zones(&streams).zones(), &[-1]);
    }

    #[test]
    fn test_to_grid_keeps_geometry() {
        let streams = Grid::from_rows(vec![vec![1.0, 0.0]])
            .unwrap()
            .with_transform(GeoTransform::new(0.0, 0.0, 3.0, -3.0))
            .unwrap();
        let grid = stream_pixel_zones(&streams).to_grid(&streams).unwrap();
        assert_eq!(grid.nodata(), Some(-1.0));
        assert_eq!(grid.cell_area(), Some(9.0));
        assert_eq!(grid.values(), &[0.0, -1.0]);
    }
}
