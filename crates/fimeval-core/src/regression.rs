//! Cross-version comparison of statistics records.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::warn;

use crate::error::{FimError, Result};
use crate::statistics::{StatValue, StatisticsRecord};

/// Suffix appended to every statistic name in a diff record.
pub const DIFF_SUFFIX: &str = "_diff";

/// Compute `current - previous` for every statistic, keyed `<stat>_diff`.
///
/// Both records must carry exactly the same statistic names.
pub fn compare(current: &StatisticsRecord, previous: &StatisticsRecord) -> Result<StatisticsRecord> {
    let current_names: BTreeSet<&str> = current.names().collect();
    let previous_names: BTreeSet<&str> = previous.names().collect();
    if current_names != previous_names {
        return Err(FimError::RegressionKeyMismatch {
            only_in_current: current_names
                .difference(&previous_names)
                .map(|s| s.to_string())
                .collect(),
            only_in_previous: previous_names
                .difference(&current_names)
                .map(|s| s.to_string())
                .collect(),
        });
    }

    let mut diff = StatisticsRecord::new();
    for (name, value) in current.iter() {
        let before = previous.get(name).unwrap_or(StatValue::Undefined);
        diff.insert(format!("{name}{DIFF_SUFFIX}"), value.minus(&before));
    }
    Ok(diff)
}

/// A previous version whose diff could not be computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegressionFailure {
    pub version: String,
    pub reason: String,
}

/// Statistics of several versions side by side, with optional diffs.
#[derive(Debug, Clone, Serialize)]
pub struct RegressionReport {
    /// Row labels, in the current record's order.
    pub statistics: Vec<String>,
    /// Previous versions in the order given, current last.
    pub versions: Vec<String>,
    pub records: Vec<StatisticsRecord>,
    /// `(previous version, diff record)` for every successful comparison.
    pub diffs: Vec<(String, StatisticsRecord)>,
    pub failures: Vec<RegressionFailure>,
}

impl RegressionReport {
    /// Assemble a report for `current_version` against `previous` versions.
    ///
    /// A key mismatch on one previous version is recorded in `failures` and
    /// drops only that version's diff column.
    pub fn build(
        current_version: &str,
        current: &StatisticsRecord,
        previous: &[(String, StatisticsRecord)],
        with_diffs: bool,
    ) -> Self {
        let mut versions = Vec::with_capacity(previous.len() + 1);
        let mut records = Vec::with_capacity(previous.len() + 1);
        let mut diffs = Vec::new();
        let mut failures = Vec::new();

        for (version, record) in previous {
            versions.push(version.clone());
            records.push(record.clone());
            if !with_diffs {
                continue;
            }
            match compare(current, record) {
                Ok(diff) => diffs.push((version.clone(), diff)),
                Err(err) => {
                    warn!(version = %version, error = %err, "regression diff failed");
                    failures.push(RegressionFailure {
                        version: version.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        versions.push(current_version.to_string());
        records.push(current.clone());

        Self {
            statistics: current.names().map(str::to_string).collect(),
            versions,
            records,
            diffs,
            failures,
        }
    }

    /// Column labels after the leading `statistic` column.
    pub fn columns(&self) -> Vec<String> {
        let mut columns = self.versions.clone();
        columns.extend(
            self.diffs
                .iter()
                .map(|(version, _)| format!("{version}{DIFF_SUFFIX}")),
        );
        columns
    }

    /// Values of one statistic across [`Self::columns`].
    ///
    /// Absent entries read as undefined.
    pub fn row(&self, statistic: &str) -> Vec<StatValue> {
        let diff_key = format!("{statistic}{DIFF_SUFFIX}");
        self.records
            .iter()
            .map(|r| r.get(statistic).unwrap_or(StatValue::Undefined))
            .chain(
                self.diffs
                    .iter()
                    .map(|(_, d)| d.get(&diff_key).unwrap_or(StatValue::Undefined)),
            )
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contingency::ContingencyTable;
    use crate::statistics::compute_stats;

    fn record(pairs: &[(&str, StatValue)]) -> StatisticsRecord {
        let mut r = StatisticsRecord::new();
        for (name, value) in pairs {
            r.insert(*name, *value);
        }
        r
    }

    #[test]
    fn test_self_regression_is_all_zero_or_undefined() {
        let r = compute_stats(&ContingencyTable::new(3, 0, 2, 0).with_cell_area(Some(1.0)).unwrap());
        let diff = compare(&r, &r).unwrap();
        assert_eq!(diff.len(), r.len());
        for (name, value) in diff.iter() {
            assert!(name.ends_with(DIFF_SUFFIX));
            let original = r.get(name.trim_end_matches(DIFF_SUFFIX)).unwrap();
            match original {
                StatValue::Undefined => assert_eq!(value, StatValue::Undefined, "{name}"),
                StatValue::Integer(_) => assert_eq!(value, StatValue::Integer(0), "{name}"),
                StatValue::Real(_) => assert_eq!(value, StatValue::Real(0.0), "{name}"),
            }
        }
    }

    #[test]
    fn test_diff_types() {
        let current = record(&[
            ("true_positives", StatValue::Integer(10)),
            ("csi", StatValue::Real(0.5)),
            ("MCC", StatValue::Undefined),
        ]);
        let previous = record(&[
            ("true_positives", StatValue::Integer(7)),
            ("csi", StatValue::Real(0.25)),
            ("MCC", StatValue::Real(0.1)),
        ]);
        let diff = compare(&current, &previous).unwrap();
        assert_eq!(diff.get("true_positives_diff"), Some(StatValue::Integer(3)));
        assert_eq!(diff.get("csi_diff"), Some(StatValue::Real(0.25)));
        assert_eq!(diff.get("MCC_diff"), Some(StatValue::Undefined));
    }

    #[test]
    fn test_key_mismatch_lists_both_sides() {
        let current = record(&[("pod", StatValue::Real(1.0)), ("far", StatValue::Real(0.0))]);
        let previous = record(&[("pod", StatValue::Real(1.0)), ("csi", StatValue::Real(0.0))]);
        match compare(&current, &previous) {
            Err(FimError::RegressionKeyMismatch {
                only_in_current,
                only_in_previous,
            }) => {
                assert_eq!(only_in_current, vec!["far".to_string()]);
                assert_eq!(only_in_previous, vec!["csi".to_string()]);
            }
            other => panic!("expected key mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_report_isolates_failed_version() {
        let current = record(&[("pod", StatValue::Real(0.75))]);
        let good = record(&[("pod", StatValue::Real(0.5))]);
        let bad = record(&[("far", StatValue::Real(0.5))]);
        let report = RegressionReport::build(
            "dev",
            &current,
            &[("v1".to_string(), good), ("v0".to_string(), bad)],
            true,
        );

        assert_eq!(report.versions, vec!["v1", "v0", "dev"]);
        assert_eq!(report.columns(), vec!["v1", "v0", "dev", "v1_diff"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].version, "v0");
        assert!(!report.is_complete());

        let row = report.row("pod");
        assert_eq!(
            row,
            vec![
                StatValue::Real(0.5),
                StatValue::Undefined,
                StatValue::Real(0.75),
                StatValue::Real(0.25)
            ]
        );
    }

    #[test]
    fn test_report_without_diffs() {
        let current = record(&[("pod", StatValue::Real(0.75))]);
        let report = RegressionReport::build("dev", &current, &[("v1".to_string(), current.clone())], false);
        assert_eq!(report.columns(), vec!["v1", "dev"]);
        assert!(report.diffs.is_empty());
        assert!(report.is_complete());
    }
}
