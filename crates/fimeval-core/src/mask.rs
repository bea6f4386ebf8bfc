//! Exclusion masks over an agreement grid.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::agreement::{AgreementClass, AgreementGrid};
use crate::error::{FimError, Result};
use crate::grid::Grid;

/// Identifiers whose cells are excluded from verification.
///
/// A cell is masked when the absolute raw predicted value equals one of the
/// identifiers (e.g. the hydro ids of lake catchments).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskSet {
    ids: BTreeSet<i64>,
}

impl MaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: i64) -> bool {
        self.ids.insert(id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.ids.iter().copied()
    }

    /// Whether a raw predicted value falls under any identifier.
    fn matches(&self, raw: f64) -> bool {
        let magnitude = raw.abs();
        if !magnitude.is_finite() || magnitude.fract() != 0.0 || magnitude > i64::MAX as f64 {
            return false;
        }
        self.ids.contains(&(magnitude as i64))
    }
}

impl FromIterator<i64> for MaskSet {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

/// Force every cell whose `|raw_predicted|` is a mask identifier to
/// [`AgreementClass::Masked`], whatever its current class.
///
/// Setting a cell to masked is idempotent, so identifier order is irrelevant.
/// Codes above 4 cannot survive: [`AgreementClass`] already folds them into
/// [`AgreementClass::Indeterminate`].
pub fn apply_masks(
    agreement: &AgreementGrid,
    raw_predicted: &Grid,
    masks: &MaskSet,
) -> Result<AgreementGrid> {
    if agreement.shape() != raw_predicted.shape() {
        return Err(FimError::shape_mismatch(
            "mask overlay (agreement vs raw predicted)",
            agreement.shape(),
            raw_predicted.shape(),
        ));
    }

    if masks.is_empty() {
        return Ok(agreement.clone());
    }

    let mut masked = 0usize;
    let cells = agreement
        .cells()
        .iter()
        .zip(raw_predicted.values())
        .map(|(&class, &raw)| {
            if masks.matches(raw) {
                masked += 1;
                AgreementClass::Masked
            } else {
                class
            }
        })
        .collect();

    debug!(mask_ids = masks.len(), masked_cells = masked, "applied masks");
    Ok(AgreementGrid::from_cells(agreement.shape(), cells))
}
