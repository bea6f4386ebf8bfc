//! Lake mask crosswalk: lake feature ids to hydro ids.
//!
//! Predicted rasters are labelled with hydro ids while the lake list is keyed
//! by feature id, so the ids are translated through the hydro table before
//! they can mask anything.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use fimeval_core::{FimError, MaskSet};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

pub const LAKE_ID_COLUMN: &str = "ID";
pub const FEATURE_ID_COLUMN: &str = "feature_id";
pub const HYDRO_ID_COLUMN: &str = "HydroID";

/// Outcome counts of a crosswalk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CrosswalkSummary {
    pub lake_features: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub hydro_ids: usize,
}

#[derive(Debug, Deserialize)]
struct LakeRow {
    #[serde(rename = "ID")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct HydroRow {
    feature_id: String,
    #[serde(rename = "HydroID")]
    hydro_id: String,
}

/// Deserialize every row of a headed CSV table, failing early when a
/// required column is absent. Extra columns are ignored.
fn read_rows<T: DeserializeOwned>(source_name: &str, content: &str, required: &[&str]) -> Result<Vec<T>> {
    let parse_err = |detail: String| FimError::Parse {
        source_name: source_name.to_string(),
        detail,
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let header = reader.headers().map_err(|e| parse_err(e.to_string()))?;
    if let Some(column) = required.iter().find(|c| !header.iter().any(|h| h == **c)) {
        return Err(parse_err(format!("missing column '{column}'")).into());
    }

    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row.map_err(|e| parse_err(e.to_string()))?);
    }
    Ok(rows)
}

/// Parse an id cell; whole-number floats such as `5791828.0` are accepted.
fn parse_id(source_name: &str, cell: &str) -> Result<i64> {
    if let Ok(id) = cell.parse::<i64>() {
        return Ok(id);
    }
    match cell.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 => Ok(v as i64),
        _ => Err(FimError::Parse {
            source_name: source_name.to_string(),
            detail: format!("invalid id '{cell}'"),
        }
        .into()),
    }
}

/// Build the lake mask from CSV content.
///
/// Every hydro id listed for a lake feature id is masked. Feature ids absent
/// from the hydro table are skipped and counted.
pub fn crosswalk_masks(lake_csv: &str, hydro_table_csv: &str) -> Result<(MaskSet, CrosswalkSummary)> {
    let mut crosswalk: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
    let hydro_rows: Vec<HydroRow> =
        read_rows("hydro table", hydro_table_csv, &[FEATURE_ID_COLUMN, HYDRO_ID_COLUMN])?;
    for row in hydro_rows {
        let feature_id = parse_id("hydro table", &row.feature_id)?;
        let hydro_id = parse_id("hydro table", &row.hydro_id)?;
        crosswalk.entry(feature_id).or_default().insert(hydro_id);
    }

    let mut masks = MaskSet::new();
    let mut summary = CrosswalkSummary::default();
    let lake_rows: Vec<LakeRow> = read_rows("lake feature list", lake_csv, &[LAKE_ID_COLUMN])?;
    for row in lake_rows {
        summary.lake_features += 1;
        let feature_id = parse_id("lake feature list", &row.id)?;
        match crosswalk.get(&feature_id) {
            Some(hydro_ids) => {
                summary.matched += 1;
                for &id in hydro_ids {
                    masks.insert(id);
                }
            }
            None => {
                summary.unmatched += 1;
                debug!(feature_id, "lake feature id not in hydro table");
            }
        }
    }
    summary.hydro_ids = masks.len();

    if summary.unmatched > 0 {
        warn!(
            unmatched = summary.unmatched,
            lake_features = summary.lake_features,
            "lake feature ids without hydro ids were skipped"
        );
    }
    Ok((masks, summary))
}

/// Load the lake mask from the two CSV files.
pub fn load_masks(lake_csv: &Path, hydro_table: &Path) -> Result<(MaskSet, CrosswalkSummary)> {
    let lakes = read_input(lake_csv, "lake feature list")?;
    let table = read_input(hydro_table, "hydro table")?;
    crosswalk_masks(&lakes, &table)
}

fn read_input(path: &Path, what: &str) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            FimError::missing(path.display().to_string(), what).into()
        } else {
            e.into()
        }
    })
}
