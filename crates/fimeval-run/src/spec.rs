//! Test-case and job identity.

use std::fmt;
use std::str::FromStr;

use fimeval_core::FimError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A benchmark test case, written `<huc>_<benchmark_category>`
/// (e.g. `12090301_ble`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TestCase {
    pub huc: String,
    pub benchmark_category: String,
}

impl TestCase {
    pub fn id(&self) -> String {
        format!("{}_{}", self.huc, self.benchmark_category)
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.huc, self.benchmark_category)
    }
}

impl FromStr for TestCase {
    type Err = FimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |why: &str| FimError::InvalidTestId(format!("'{s}': {why}"));
        let (huc, category) = s
            .split_once('_')
            .ok_or_else(|| invalid("expected <huc>_<benchmark_category>"))?;
        if huc.is_empty() || !huc.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("huc must be a non-empty run of digits"));
        }
        if category.is_empty() || category.contains(['_', '/', '\\']) {
            return Err(invalid("benchmark category must be a single non-empty word"));
        }
        Ok(Self {
            huc: huc.to_string(),
            benchmark_category: category.to_string(),
        })
    }
}

/// One raster pair to evaluate: a test case at one return interval on one
/// branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub test_case: TestCase,
    pub return_interval: String,
    pub branch: String,
}

impl JobSpec {
    pub fn new(test_case: TestCase, return_interval: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            test_case,
            return_interval: return_interval.into(),
            branch: branch.into(),
        }
    }

    /// Stable SHA-256 identity of the job.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for part in [
            self.test_case.huc.as_str(),
            self.test_case.benchmark_category.as_str(),
            self.return_interval.as_str(),
            self.branch.as_str(),
        ] {
            hasher.update(part.as_bytes());
            hasher.update(b"\0");
        }
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_test_case() {
        let tc: TestCase = "12090301_ble".parse().unwrap();
        assert_eq!(tc.huc, "12090301");
        assert_eq!(tc.benchmark_category, "ble");
        assert_eq!(tc.id(), "12090301_ble");
        assert_eq!(tc.to_string(), tc.id());
    }

    #[test]
    fn test_malformed_ids_rejected() {
        for bad in ["12090301", "_ble", "12090301_", "abc_ble", "1209_ble_x", "1209_a/b"] {
            assert!(
                matches!(bad.parse::<TestCase>(), Err(FimError::InvalidTestId(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_digest_deterministic_and_sensitive() {
        let tc: TestCase = "12090301_ble".parse().unwrap();
        let a = JobSpec::new(tc.clone(), "100yr", "dev");
        let b = JobSpec::new(tc.clone(), "100yr", "dev");
        let c = JobSpec::new(tc, "500yr", "dev");
        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), c.digest());
        assert_eq!(a.digest().len(), 64);
    }
}
