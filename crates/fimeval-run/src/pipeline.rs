//! Batch evaluation over a fixed-size worker pool.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use fimeval_core::obs::{emit_batch_finished, emit_job_skipped};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{Result, RunError};
use crate::runner::{JobOutcome, JobRunner};
use crate::spec::JobSpec;

/// How one job ended.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Completed(JobOutcome),
    /// An input raster was missing.
    Skipped { reason: String },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_id: String,
    pub test_id: String,
    pub return_interval: String,
    pub status: JobStatus,
}

/// Result of a whole batch, in job submission order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub fimeval_version: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub workers: usize,
    pub jobs: Vec<JobReport>,
}

impl BatchReport {
    pub fn completed_count(&self) -> usize {
        self.count(|s| matches!(s, JobStatus::Completed(_)))
    }

    pub fn skipped_count(&self) -> usize {
        self.count(|s| matches!(s, JobStatus::Skipped { .. }))
    }

    pub fn failed_count(&self) -> usize {
        self.count(|s| matches!(s, JobStatus::Failed { .. }))
    }

    pub fn success(&self) -> bool {
        self.failed_count() == 0
    }

    fn count(&self, pred: impl Fn(&JobStatus) -> bool) -> usize {
        self.jobs.iter().filter(|j| pred(&j.status)).count()
    }
}

fn classify_result(job: &JobSpec, result: Result<JobOutcome>) -> JobStatus {
    match result {
        Ok(outcome) => JobStatus::Completed(outcome),
        Err(e) if e.is_missing_input() => {
            emit_job_skipped(&job.test_case.id(), &job.return_interval, &e);
            JobStatus::Skipped {
                reason: e.to_string(),
            }
        }
        Err(e) => {
            error!(
                test_id = %job.test_case,
                return_interval = %job.return_interval,
                error = %e,
                "job failed"
            );
            JobStatus::Failed {
                error: e.to_string(),
            }
        }
    }
}

/// Run `jobs` with at most `workers` evaluating at once.
///
/// Each job runs on a blocking thread. A failing job never stops the others;
/// there is no retry.
pub async fn run_batch(runner: Arc<JobRunner>, jobs: Vec<JobSpec>, workers: usize) -> Result<BatchReport> {
    if workers == 0 {
        return Err(RunError::Config("workers must be at least 1".to_string()));
    }

    let batch_id = Uuid::new_v4();
    let started_at = Utc::now();
    let start = Instant::now();
    info!(batch_id = %batch_id, jobs = jobs.len(), workers, "starting batch");

    let sem = Arc::new(Semaphore::new(workers));
    let mut tasks = Vec::with_capacity(jobs.len());

    for job in jobs.iter().cloned() {
        let runner = Arc::clone(&runner);
        let sem = Arc::clone(&sem);
        tasks.push(tokio::spawn(async move {
            let _permit = sem
                .acquire_owned()
                .await
                .map_err(|e| RunError::Worker(e.to_string()))?;
            tokio::task::spawn_blocking(move || runner.run(&job))
                .await
                .map_err(|e| RunError::Worker(e.to_string()))?
        }));
    }

    let results = futures::future::join_all(tasks).await;

    let reports: Vec<JobReport> = jobs
        .iter()
        .zip(results)
        .map(|(job, joined)| {
            let result = joined.unwrap_or_else(|e| Err(RunError::Worker(e.to_string())));
            JobReport {
                job_id: job.digest(),
                test_id: job.test_case.id(),
                return_interval: job.return_interval.clone(),
                status: classify_result(job, result),
            }
        })
        .collect();

    let report = BatchReport {
        batch_id,
        fimeval_version: fimeval_core::VERSION.to_string(),
        started_at,
        finished_at: Utc::now(),
        workers,
        jobs: reports,
    };

    emit_batch_finished(
        &batch_id.to_string(),
        report.completed_count(),
        report.failed_count(),
        start.elapsed().as_millis() as u64,
    );
    Ok(report)
}
