//! End-to-end verification of one benchmark/predicted raster pair.

use std::collections::BTreeMap;

use tracing::{debug, info_span};

use crate::agreement::{classify, AgreementGrid};
use crate::contingency::{aggregate, ContingencyReport, TOTAL_AREA_LAYER};
use crate::error::Result;
use crate::grid::Grid;
use crate::mask::{apply_masks, MaskSet};
use crate::reclassify::reclassify;
use crate::statistics::{compute_stats, StatisticsRecord};

/// Everything computed for one raster pair.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Masked agreement grid over the whole domain.
    pub agreement: AgreementGrid,
    pub contingency: ContingencyReport,
    /// Statistics per layer, keyed like `contingency.tables`.
    pub stats: BTreeMap<String, StatisticsRecord>,
}

impl Evaluation {
    /// Statistics of the whole grid.
    pub fn total_stats(&self) -> Option<&StatisticsRecord> {
        self.stats.get(TOTAL_AREA_LAYER)
    }
}

/// Reclassify, classify, mask, count and score one raster pair.
///
/// The cell area comes from the benchmark, falling back to the predicted
/// raster.
pub fn evaluate_pair(
    benchmark: &Grid,
    predicted: &Grid,
    masks: &MaskSet,
    layers: Option<&BTreeMap<String, Grid>>,
) -> Result<Evaluation> {
    let span = info_span!("fimeval.evaluate", shape = %benchmark.shape());
    let _enter = span.enter();

    let agreement = classify(&reclassify(benchmark), &reclassify(predicted))?;
    let agreement = apply_masks(&agreement, predicted, masks)?;

    let cell_area = benchmark.cell_area().or(predicted.cell_area());
    let contingency = aggregate(&agreement, cell_area, layers)?;

    let stats = contingency
        .tables
        .iter()
        .map(|(layer, table)| (layer.clone(), compute_stats(table)))
        .collect();

    debug!(
        layers = contingency.tables.len(),
        cell_area = ?cell_area,
        "evaluated raster pair"
    );

    Ok(Evaluation {
        agreement,
        contingency,
        stats,
    })
}
