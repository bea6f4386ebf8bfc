//! Reduction of agreement grids into contingency tables.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::agreement::{AgreementClass, AgreementGrid};
use crate::error::{FimError, Result};
use crate::grid::{validate_cell_area, Grid};

/// Key of the table computed over the whole agreement grid.
pub const TOTAL_AREA_LAYER: &str = "total_area";

/// Four-count summary of a binary classification.
///
/// Masked and indeterminate cells are not part of the population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContingencyTable {
    pub true_negatives: u64,
    pub false_negatives: u64,
    pub false_positives: u64,
    pub true_positives: u64,
    /// Area of one cell; enables the areal statistics when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell_area: Option<f64>,
}

impl ContingencyTable {
    pub fn new(
        true_negatives: u64,
        false_negatives: u64,
        false_positives: u64,
        true_positives: u64,
    ) -> Self {
        Self {
            true_negatives,
            false_negatives,
            false_positives,
            true_positives,
            cell_area: None,
        }
    }

    /// Set the cell area; a present area must be positive and finite.
    pub fn with_cell_area(mut self, cell_area: Option<f64>) -> Result<Self> {
        self.cell_area = cell_area.map(validate_cell_area).transpose()?;
        Ok(self)
    }

    /// Count the classified cells of an agreement grid.
    pub fn from_agreement(agreement: &AgreementGrid, cell_area: Option<f64>) -> Result<Self> {
        let cell_area = cell_area.map(validate_cell_area).transpose()?;
        let mut counts = [0u64; 4];
        for class in agreement.cells() {
            if class.is_classified() {
                counts[class.code() as usize] += 1;
            }
        }
        Ok(Self {
            true_negatives: counts[AgreementClass::TrueNegative.code() as usize],
            false_negatives: counts[AgreementClass::FalseNegative.code() as usize],
            false_positives: counts[AgreementClass::FalsePositive.code() as usize],
            true_positives: counts[AgreementClass::TruePositive.code() as usize],
            cell_area,
        })
    }

    /// Total classified population `TN + FN + FP + TP`.
    pub fn population(&self) -> u64 {
        self.true_negatives + self.false_negatives + self.false_positives + self.true_positives
    }
}

/// Tables for the whole grid and every requested sub-layer.
#[derive(Debug, Clone, Default)]
pub struct ContingencyReport {
    /// Keyed by layer name; always contains [`TOTAL_AREA_LAYER`].
    pub tables: BTreeMap<String, ContingencyTable>,
    /// Agreement restricted to each secondary layer, for persistence.
    pub layer_grids: BTreeMap<String, AgreementGrid>,
}

impl ContingencyReport {
    pub fn total(&self) -> Option<&ContingencyTable> {
        self.tables.get(TOTAL_AREA_LAYER)
    }
}

/// Restrict an agreement grid to the cells where `layer` is positive.
///
/// Cells outside the layer (value ≤ 0 or the layer's nodata) become
/// indeterminate.
pub fn layer_agreement(agreement: &AgreementGrid, layer: &Grid) -> Result<AgreementGrid> {
    if agreement.shape() != layer.shape() {
        return Err(FimError::shape_mismatch(
            "secondary layer (agreement vs layer)",
            agreement.shape(),
            layer.shape(),
        ));
    }
    let cells = agreement
        .cells()
        .iter()
        .zip(layer.values())
        .map(|(&class, &v)| {
            if v > 0.0 && !layer.is_nodata(v) {
                class
            } else {
                AgreementClass::Indeterminate
            }
        })
        .collect();
    Ok(AgreementGrid::from_cells(agreement.shape(), cells))
}

/// Count the agreement grid and, optionally, each named secondary layer.
///
/// Each call gets its own result; `layers` is never retained.
pub fn aggregate(
    agreement: &AgreementGrid,
    cell_area: Option<f64>,
    layers: Option<&BTreeMap<String, Grid>>,
) -> Result<ContingencyReport> {
    let mut report = ContingencyReport::default();
    report.tables.insert(
        TOTAL_AREA_LAYER.to_string(),
        ContingencyTable::from_agreement(agreement, cell_area)?,
    );

    for (name, layer) in layers.into_iter().flatten() {
        if name == TOTAL_AREA_LAYER {
            return Err(FimError::InvalidLayer(format!(
                "secondary layer may not be named '{TOTAL_AREA_LAYER}'"
            )));
        }
        let restricted = layer_agreement(agreement, layer)?;
        let table = ContingencyTable::from_agreement(&restricted, cell_area)?;
        debug!(layer = %name, population = table.population(), "counted secondary layer");
        report.tables.insert(name.clone(), table);
        report.layer_grids.insert(name.clone(), restricted);
    }

    Ok(report)
}
