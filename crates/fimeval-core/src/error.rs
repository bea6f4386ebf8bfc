//! Error taxonomy for flood-extent verification.
//!
//! Undefined statistics are deliberately absent here: a zero denominator is a
//! [`StatValue::Undefined`](crate::statistics::StatValue) value, not an error.

use crate::grid::Shape;

/// Errors produced by the verification core.
#[derive(Debug, thiserror::Error)]
pub enum FimError {
    #[error("shape mismatch in {context}: expected {expected}, found {found}")]
    ShapeMismatch {
        context: String,
        expected: Shape,
        found: Shape,
    },

    #[error("missing artifact for {id}: {what}")]
    MissingArtifact { id: String, what: String },

    #[error(
        "regression key mismatch: only in current {only_in_current:?}, only in previous {only_in_previous:?}"
    )]
    RegressionKeyMismatch {
        only_in_current: Vec<String>,
        only_in_previous: Vec<String>,
    },

    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    #[error("invalid layer: {0}")]
    InvalidLayer(String),

    #[error("invalid test id: {0}")]
    InvalidTestId(String),

    #[error("parse error in {source_name}: {detail}")]
    Parse { source_name: String, detail: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl FimError {
    /// Shorthand for a [`FimError::ShapeMismatch`] raised by `context`.
    pub fn shape_mismatch(context: impl Into<String>, expected: Shape, found: Shape) -> Self {
        FimError::ShapeMismatch {
            context: context.into(),
            expected,
            found,
        }
    }

    /// Shorthand for a [`FimError::MissingArtifact`].
    pub fn missing(id: impl Into<String>, what: impl Into<String>) -> Self {
        FimError::MissingArtifact {
            id: id.into(),
            what: what.into(),
        }
    }
}

/// Result type for verification core operations.
pub type Result<T> = std::result::Result<T, FimError>;
