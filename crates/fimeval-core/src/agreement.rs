//! Benchmark-vs-predicted agreement classification.
//!
//! Each cell code is `benchmark_bit + 2 * predicted_bit`, giving
//!
//! | code | meaning        |
//! |------|----------------|
//! | 0    | true negative  |
//! | 1    | false negative |
//! | 2    | false positive |
//! | 3    | true positive  |
//! | 4    | masked         |
//! | 10   | indeterminate  |
//!
//! Nodata in either source and the mask overlay are applied after the
//! arithmetic and always win over it.

use serde::{Deserialize, Serialize};

use crate::error::{FimError, Result};
use crate::grid::{Grid, Shape};
use crate::reclassify::{Reclass, ReclassifiedGrid};

/// Agreement class of one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgreementClass {
    TrueNegative,
    FalseNegative,
    FalsePositive,
    TruePositive,
    Masked,
    Indeterminate,
}

impl AgreementClass {
    /// Nodata value of persisted agreement rasters.
    pub const NODATA_CODE: u8 = 10;

    pub fn code(self) -> u8 {
        match self {
            AgreementClass::TrueNegative => 0,
            AgreementClass::FalseNegative => 1,
            AgreementClass::FalsePositive => 2,
            AgreementClass::TruePositive => 3,
            AgreementClass::Masked => 4,
            AgreementClass::Indeterminate => Self::NODATA_CODE,
        }
    }

    /// Map a raw code to its class; anything above 4 is indeterminate.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => AgreementClass::TrueNegative,
            1 => AgreementClass::FalseNegative,
            2 => AgreementClass::FalsePositive,
            3 => AgreementClass::TruePositive,
            4 => AgreementClass::Masked,
            _ => AgreementClass::Indeterminate,
        }
    }

    /// Whether this cell takes part in the contingency table.
    pub fn is_classified(self) -> bool {
        self.code() <= 3
    }
}

/// Grid of agreement classes.
#[derive(Debug, Clone, PartialEq)]
pub struct AgreementGrid {
    shape: Shape,
    cells: Vec<AgreementClass>,
}

impl AgreementGrid {
    /// Build from raw codes, e.g. a persisted agreement raster.
    pub fn from_codes(shape: Shape, codes: &[u8]) -> Result<Self> {
        shape.ensure_len(codes.len(), "agreement codes")?;
        Ok(Self {
            shape,
            cells: codes.iter().map(|&c| AgreementClass::from_code(c)).collect(),
        })
    }

    pub(crate) fn from_cells(shape: Shape, cells: Vec<AgreementClass>) -> Self {
        debug_assert_eq!(cells.len(), shape.len());
        Self { shape, cells }
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn cells(&self) -> &[AgreementClass] {
        &self.cells
    }

    pub fn codes(&self) -> Vec<u8> {
        self.cells.iter().map(|c| c.code()).collect()
    }

    /// Number of cells in `class`.
    pub fn count(&self, class: AgreementClass) -> u64 {
        self.cells.iter().filter(|&&c| c == class).count() as u64
    }

    /// View as a plain grid with nodata 10, ready for the raster writer.
    pub fn to_grid(&self) -> Grid {
        let values = self.cells.iter().map(|c| f64::from(c.code())).collect();
        Grid::from_shape(self.shape, values).with_nodata(f64::from(AgreementClass::NODATA_CODE))
    }
}

/// Combine reclassified benchmark and predicted grids into an agreement grid.
///
/// Fails with [`FimError::ShapeMismatch`] if the grids differ in shape. No
/// trimming or re-gridding is attempted.
pub fn classify(benchmark: &ReclassifiedGrid, predicted: &ReclassifiedGrid) -> Result<AgreementGrid> {
    if benchmark.shape() != predicted.shape() {
        return Err(FimError::shape_mismatch(
            "agreement classification (benchmark vs predicted)",
            benchmark.shape(),
            predicted.shape(),
        ));
    }

    let cells = benchmark
        .cells()
        .iter()
        .zip(predicted.cells())
        .map(|(&b, &p)| {
            if b == Reclass::NoData || p == Reclass::NoData {
                return AgreementClass::Indeterminate;
            }
            AgreementClass::from_code(b.code() + 2 * p.code())
        })
        .collect();

    Ok(AgreementGrid::from_cells(benchmark.shape(), cells))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reclassify::reclassify;

    fn grid(rows: Vec<Vec<f64>>) -> Grid {
        Grid::from_rows(rows).unwrap().with_nodata(10.0)
    }

    #[test]
    fn test_all_four_codes() {
        let benchmark = reclassify(&grid(vec![vec![0.0, 1.0, 0.0, 1.0]]));
        let predicted = reclassify(&grid(vec![vec![0.0, 0.0, 1.0, 1.0]]));
        let agreement = classify(&benchmark, &predicted).unwrap();
        assert_eq!(agreement.codes(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_nodata_in_either_source_dominates() {
        let benchmark = reclassify(&grid(vec![vec![10.0, 1.0, 10.0]]));
        let predicted = reclassify(&grid(vec![vec![1.0, 10.0, 10.0]]));
        let agreement = classify(&benchmark, &predicted).unwrap();
        assert_eq!(agreement.codes(), vec![10, 10, 10]);
    }

    #[test]
    fn test_shape_mismatch_is_an_error() {
        let benchmark = reclassify(&grid(vec![vec![0.0, 1.0, 0.0]]));
        let predicted = reclassify(&grid(vec![vec![0.0, 1.0]]));
        match classify(&benchmark, &predicted) {
            Err(FimError::ShapeMismatch {
                expected, found, ..
            }) => {
                assert_eq!(expected, Shape::new(1, 3));
                assert_eq!(found, Shape::new(1, 2));
            }
            other => panic!("expected ShapeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_is_deterministic() {
        let benchmark = reclassify(&grid(vec![vec![1.0, 0.0], vec![1.0, 10.0]]));
        let predicted = reclassify(&grid(vec![vec![1.0, 1.0], vec![0.0, 0.0]]));
        let a = classify(&benchmark, &predicted).unwrap();
        let b = classify(&benchmark, &predicted).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_from_code_coerces_out_of_range() {
        assert_eq!(AgreementClass::from_code(12), AgreementClass::Indeterminate);
        assert_eq!(AgreementClass::from_code(5), AgreementClass::Indeterminate);
        assert_eq!(AgreementClass::from_code(4), AgreementClass::Masked);
    }

    #[test]
    fn test_to_grid_uses_nodata_ten() {
        let agreement = AgreementGrid::from_codes(Shape::new(1, 2), &[3, 10]).unwrap();
        let out = agreement.to_grid();
        assert_eq!(out.nodata(), Some(10.0));
        assert_eq!(out.values(), &[3.0, 10.0]);
    }
}
