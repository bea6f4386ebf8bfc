//! Verification statistics derived from a contingency table.
//!
//! The supported statistics form the closed [`Statistic`] enum; each one is
//! evaluated by a single `match` in [`Statistic::evaluate`]. A zero
//! denominator, or an areal statistic without a cell area, yields
//! [`StatValue::Undefined`] rather than `0`, `NaN` or an error, so regression
//! comparison can tell "worse" apart from "not computable".

use std::fmt;
use std::str::FromStr;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::contingency::ContingencyTable;
use crate::error::FimError;

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// One statistic value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatValue {
    /// Exact counts and their differences.
    Integer(i64),
    Real(f64),
    /// Zero denominator or missing cell area.
    Undefined,
}

impl StatValue {
    /// Build a real value; non-finite results are undefined.
    pub fn real(value: f64) -> Self {
        if value.is_finite() {
            StatValue::Real(value)
        } else {
            StatValue::Undefined
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            StatValue::Integer(v) => Some(v as f64),
            StatValue::Real(v) => Some(v),
            StatValue::Undefined => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, StatValue::Undefined)
    }

    /// `self - other`; undefined on either side stays undefined.
    pub fn minus(&self, other: &StatValue) -> StatValue {
        match (*self, *other) {
            (StatValue::Integer(a), StatValue::Integer(b)) => match a.checked_sub(b) {
                Some(d) => StatValue::Integer(d),
                None => StatValue::real(a as f64 - b as f64),
            },
            (StatValue::Undefined, _) | (_, StatValue::Undefined) => StatValue::Undefined,
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => StatValue::real(a - b),
                _ => StatValue::Undefined,
            },
        }
    }

    /// Cell text for tabular output; undefined is an empty cell.
    ///
    /// Reals always carry a decimal point or exponent so they read back as
    /// reals.
    pub fn to_cell(&self) -> String {
        match self {
            StatValue::Integer(v) => v.to_string(),
            StatValue::Real(v) => format!("{v:?}"),
            StatValue::Undefined => String::new(),
        }
    }
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatValue::Integer(v) => write!(f, "{v}"),
            StatValue::Real(v) => write!(f, "{v}"),
            StatValue::Undefined => f.write_str("undefined"),
        }
    }
}

impl Serialize for StatValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            StatValue::Integer(v) => serializer.serialize_i64(v),
            StatValue::Real(v) => serializer.serialize_f64(v),
            StatValue::Undefined => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for StatValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let number: Option<serde_json::Number> = Option::deserialize(deserializer)?;
        Ok(match number {
            None => StatValue::Undefined,
            Some(n) => match n.as_i64() {
                Some(i) => StatValue::Integer(i),
                None => n.as_f64().map(StatValue::real).unwrap_or(StatValue::Undefined),
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Statistic catalogue
// ---------------------------------------------------------------------------

/// Every statistic the engine emits, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Statistic {
    TrueNegatives,
    FalseNegatives,
    TruePositives,
    FalsePositives,
    PercentCorrect,
    Pod,
    Far,
    Csi,
    Bias,
    EquitableThreatScore,
    TpPerc,
    FpPerc,
    TnPerc,
    FnPerc,
    TpArea,
    FpArea,
    TnArea,
    FnArea,
    TotalArea,
    Prevalence,
    PredPositivePerc,
    PredNegativePerc,
    ObsPositivePerc,
    ObsNegativePerc,
    PredPositiveArea,
    PredNegativeArea,
    ObsPositiveArea,
    ObsNegativeArea,
    PositiveDiffArea,
    PositiveDiffPerc,
    Ppv,
    Npv,
    Tpr,
    Tnr,
    Acc,
    F1Score,
    BalAcc,
    Mcc,
}

impl Statistic {
    pub const ALL: [Statistic; 38] = [
        Statistic::TrueNegatives,
        Statistic::FalseNegatives,
        Statistic::TruePositives,
        Statistic::FalsePositives,
        Statistic::PercentCorrect,
        Statistic::Pod,
        Statistic::Far,
        Statistic::Csi,
        Statistic::Bias,
        Statistic::EquitableThreatScore,
        Statistic::TpPerc,
        Statistic::FpPerc,
        Statistic::TnPerc,
        Statistic::FnPerc,
        Statistic::TpArea,
        Statistic::FpArea,
        Statistic::TnArea,
        Statistic::FnArea,
        Statistic::TotalArea,
        Statistic::Prevalence,
        Statistic::PredPositivePerc,
        Statistic::PredNegativePerc,
        Statistic::ObsPositivePerc,
        Statistic::ObsNegativePerc,
        Statistic::PredPositiveArea,
        Statistic::PredNegativeArea,
        Statistic::ObsPositiveArea,
        Statistic::ObsNegativeArea,
        Statistic::PositiveDiffArea,
        Statistic::PositiveDiffPerc,
        Statistic::Ppv,
        Statistic::Npv,
        Statistic::Tpr,
        Statistic::Tnr,
        Statistic::Acc,
        Statistic::F1Score,
        Statistic::BalAcc,
        Statistic::Mcc,
    ];

    /// Persisted name of the statistic.
    pub fn name(&self) -> &'static str {
        match self {
            Statistic::TrueNegatives => "true_negatives",
            Statistic::FalseNegatives => "false_negatives",
            Statistic::TruePositives => "true_positives",
            Statistic::FalsePositives => "false_positives",
            Statistic::PercentCorrect => "percent_correct",
            Statistic::Pod => "pod",
            Statistic::Far => "far",
            Statistic::Csi => "csi",
            Statistic::Bias => "bias",
            Statistic::EquitableThreatScore => "equitable_threat_score",
            Statistic::TpPerc => "TP_perc",
            Statistic::FpPerc => "FP_perc",
            Statistic::TnPerc => "TN_perc",
            Statistic::FnPerc => "FN_perc",
            Statistic::TpArea => "TP_area",
            Statistic::FpArea => "FP_area",
            Statistic::TnArea => "TN_area",
            Statistic::FnArea => "FN_area",
            Statistic::TotalArea => "total_area",
            Statistic::Prevalence => "prevalence",
            Statistic::PredPositivePerc => "predPositive_perc",
            Statistic::PredNegativePerc => "predNegative_perc",
            Statistic::ObsPositivePerc => "obsPositive_perc",
            Statistic::ObsNegativePerc => "obsNegative_perc",
            Statistic::PredPositiveArea => "predPositive_area",
            Statistic::PredNegativeArea => "predNegative_area",
            Statistic::ObsPositiveArea => "obsPositive_area",
            Statistic::ObsNegativeArea => "obsNegative_area",
            Statistic::PositiveDiffArea => "positiveDiff_area",
            Statistic::PositiveDiffPerc => "positiveDiff_perc",
            Statistic::Ppv => "PPV",
            Statistic::Npv => "NPV",
            Statistic::Tpr => "TPR",
            Statistic::Tnr => "TNR",
            Statistic::Acc => "ACC",
            Statistic::F1Score => "F1_score",
            Statistic::BalAcc => "Bal_ACC",
            Statistic::Mcc => "MCC",
        }
    }

    /// Whether the value scales with the cell area.
    pub fn is_areal(&self) -> bool {
        self.name().ends_with("_area")
    }

    /// Evaluate this statistic for `t`.
    pub fn evaluate(&self, t: &ContingencyTable) -> StatValue {
        let tn = t.true_negatives as f64;
        let fn_ = t.false_negatives as f64;
        let fp = t.false_positives as f64;
        let tp = t.true_positives as f64;
        let n = t.population() as f64;

        // The six headline skill scores are rounded to 3 decimals; all other
        // ratios keep full precision. Archived records depend on this split.
        match self {
            Statistic::TrueNegatives => count(t.true_negatives),
            Statistic::FalseNegatives => count(t.false_negatives),
            Statistic::TruePositives => count(t.true_positives),
            Statistic::FalsePositives => count(t.false_positives),

            Statistic::PercentCorrect => round3(ratio(tp + tn, n)),
            Statistic::Pod => round3(ratio(tp, tp + fn_)),
            Statistic::Far => round3(ratio(fp, tp + fp)),
            Statistic::Csi => round3(ratio(tp, tp + fp + fn_)),
            Statistic::Bias => round3(ratio(tp + fp, tp + fn_)),
            Statistic::EquitableThreatScore => round3(equitable_threat_score(tp, fp, fn_, n)),

            Statistic::TpPerc => percent(tp, n),
            Statistic::FpPerc => percent(fp, n),
            Statistic::TnPerc => percent(tn, n),
            Statistic::FnPerc => percent(fn_, n),

            Statistic::TpArea => areal(tp, t.cell_area),
            Statistic::FpArea => areal(fp, t.cell_area),
            Statistic::TnArea => areal(tn, t.cell_area),
            Statistic::FnArea => areal(fn_, t.cell_area),
            Statistic::TotalArea => areal(n, t.cell_area),

            Statistic::Prevalence => ratio(tp + fn_, n),
            Statistic::PredPositivePerc => ratio(tp + fp, n),
            Statistic::PredNegativePerc => ratio(tn + fn_, n),
            Statistic::ObsPositivePerc => ratio(tp + fn_, n),
            Statistic::ObsNegativePerc => ratio(tn + fp, n),

            Statistic::PredPositiveArea => areal(tp + fp, t.cell_area),
            Statistic::PredNegativeArea => areal(tn + fn_, t.cell_area),
            Statistic::ObsPositiveArea => areal(tp + fn_, t.cell_area),
            Statistic::ObsNegativeArea => areal(tn + fp, t.cell_area),
            Statistic::PositiveDiffArea => {
                areal(tp + fp, t.cell_area).minus(&areal(tp + fn_, t.cell_area))
            }
            Statistic::PositiveDiffPerc => ratio(tp + fp, n).minus(&ratio(tp + fn_, n)),

            Statistic::Ppv => ratio(tp, tp + fp),
            Statistic::Npv => ratio(tn, tn + fn_),
            Statistic::Tpr => ratio(tp, tp + fn_),
            Statistic::Tnr => ratio(tn, tn + fp),
            Statistic::Acc => ratio(tp + tn, n),
            Statistic::F1Score => ratio(2.0 * tp, 2.0 * tp + fp + fn_),
            Statistic::BalAcc => match (ratio(tp, tp + fn_), ratio(tn, tn + fp)) {
                (StatValue::Real(tpr), StatValue::Real(tnr)) => StatValue::real((tpr + tnr) / 2.0),
                _ => StatValue::Undefined,
            },
            Statistic::Mcc => matthews(tp, fp, tn, fn_, t.cell_area),
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Statistic {
    type Err = FimError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Statistic::ALL
            .iter()
            .copied()
            .find(|stat| stat.name() == s)
            .ok_or_else(|| FimError::Parse {
                source_name: "statistic name".to_string(),
                detail: format!("unknown statistic '{s}'"),
            })
    }
}

fn count(value: u64) -> StatValue {
    i64::try_from(value)
        .map(StatValue::Integer)
        .unwrap_or_else(|_| StatValue::real(value as f64))
}

fn ratio(numerator: f64, denominator: f64) -> StatValue {
    if denominator == 0.0 {
        return StatValue::Undefined;
    }
    StatValue::real(numerator / denominator)
}

fn percent(part: f64, population: f64) -> StatValue {
    match ratio(part, population) {
        StatValue::Real(v) => StatValue::real(v * 100.0),
        other => other,
    }
}

fn areal(count: f64, cell_area: Option<f64>) -> StatValue {
    match cell_area {
        Some(area) => StatValue::real(count * area),
        None => StatValue::Undefined,
    }
}

fn round3(value: StatValue) -> StatValue {
    match value {
        StatValue::Real(v) => StatValue::real((v * 1000.0).round() / 1000.0),
        other => other,
    }
}

/// Gilbert skill score: hits corrected for those expected by chance.
fn equitable_threat_score(tp: f64, fp: f64, fn_: f64, n: f64) -> StatValue {
    if n == 0.0 {
        return StatValue::Undefined;
    }
    let a_ref = ((tp + fp) * (tp + fn_)) / n;
    ratio(tp - a_ref, tp - a_ref + fp + fn_)
}

/// Matthews correlation on areal quantities; needs a cell area.
fn matthews(tp: f64, fp: f64, tn: f64, fn_: f64, cell_area: Option<f64>) -> StatValue {
    let Some(area) = cell_area else {
        return StatValue::Undefined;
    };
    let (tp, fp, tn, fn_) = (tp * area, fp * area, tn * area, fn_ * area);
    let factors = [tp + fp, tp + fn_, tn + fp, tn + fn_];
    if factors.iter().any(|&f| f == 0.0) {
        return StatValue::Undefined;
    }
    let denominator = factors.iter().product::<f64>().sqrt();
    ratio(tp * tn - fp * fn_, denominator)
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Ordered mapping of statistic name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatisticsRecord {
    entries: Vec<(String, StatValue)>,
}

impl StatisticsRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `name`, keeping first-insertion order.
    pub fn insert(&mut self, name: impl Into<String>, value: StatValue) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<StatValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn stat(&self, stat: Statistic) -> Option<StatValue> {
        self.get(stat.name())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, StatValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for StatisticsRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for StatisticsRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RecordVisitor;

        impl<'de> Visitor<'de> for RecordVisitor {
            type Value = StatisticsRecord;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a flat map of statistic name to number or null")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut record = StatisticsRecord::new();
                while let Some((name, value)) = access.next_entry::<String, StatValue>()? {
                    if record.contains(&name) {
                        return Err(de::Error::custom(format!("duplicate statistic '{name}'")));
                    }
                    record.insert(name, value);
                }
                Ok(record)
            }
        }

        deserializer.deserialize_map(RecordVisitor)
    }
}

/// Derive the full statistics record for one contingency table.
pub fn compute_stats(table: &ContingencyTable) -> StatisticsRecord {
    let mut record = StatisticsRecord::new();
    for stat in Statistic::ALL {
        record.insert(stat.name(), stat.evaluate(table));
    }
    record
}
