//! Structured lifecycle events for verification jobs.
//!
//! Every event is an `info!` (or `warn!`) record with an `event` field, so a
//! JSON subscriber yields one machine-readable line per lifecycle step.

use tracing::{info, warn};

/// RAII guard that enters a `fimeval.job` span for one raster pair.
pub struct JobSpan {
    _span: tracing::span::EnteredSpan,
}

impl JobSpan {
    pub fn enter(test_id: &str, return_interval: &str) -> Self {
        let span = tracing::info_span!(
            "fimeval.job",
            test_id = %test_id,
            return_interval = %return_interval
        );
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_job_started(test_id: &str, return_interval: &str, branch: &str) {
    info!(
        event = "job.started",
        test_id = %test_id,
        return_interval = %return_interval,
        branch = %branch,
    );
}

/// Job finished with its headline score.
pub fn emit_job_finished(test_id: &str, return_interval: &str, duration_ms: u64, csi: Option<f64>) {
    info!(
        event = "job.finished",
        test_id = %test_id,
        return_interval = %return_interval,
        duration_ms = duration_ms,
        csi = ?csi,
    );
}

pub fn emit_job_skipped(test_id: &str, return_interval: &str, reason: &dyn std::fmt::Display) {
    warn!(
        event = "job.skipped",
        test_id = %test_id,
        return_interval = %return_interval,
        reason = %reason,
    );
}

pub fn emit_regression_compared(test_id: &str, return_interval: &str, versions: usize, failures: usize) {
    info!(
        event = "regression.compared",
        test_id = %test_id,
        return_interval = %return_interval,
        versions = versions,
        failures = failures,
    );
}

pub fn emit_batch_finished(batch_id: &str, succeeded: usize, failed: usize, duration_ms: u64) {
    info!(
        event = "batch.finished",
        batch_id = %batch_id,
        succeeded = succeeded,
        failed = failed,
        duration_ms = duration_ms,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_span_create() {
        let _span = JobSpan::enter("12090301_ble", "100yr");
        emit_job_started("12090301_ble", "100yr", "dev");
        emit_job_finished("12090301_ble", "100yr", 12, Some(0.5));
    }
}
