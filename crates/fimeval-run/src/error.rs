//! Orchestration errors.

use fimeval_core::FimError;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Core(#[from] FimError),

    #[error("job {test_id}/{return_interval} failed: {source}")]
    Job {
        test_id: String,
        return_interval: String,
        #[source]
        source: FimError,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("worker task failed: {0}")]
    Worker(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunError {
    /// Attach job identity to a core error.
    pub fn job(test_id: &str, return_interval: &str, source: FimError) -> Self {
        RunError::Job {
            test_id: test_id.to_string(),
            return_interval: return_interval.to_string(),
            source,
        }
    }

    /// Whether the job was skipped for lack of an input rather than failing.
    pub fn is_missing_input(&self) -> bool {
        matches!(
            self,
            RunError::Core(FimError::MissingArtifact { .. })
                | RunError::Job {
                    source: FimError::MissingArtifact { .. },
                    ..
                }
        )
    }
}

pub type Result<T> = std::result::Result<T, RunError>;
