//! fimeval-run: test-case orchestration
//!
//! Turns test-case ids into raster-pair jobs, resolves their on-disk layout,
//! builds the lake mask, and runs the jobs over a fixed-size worker pool.

pub mod config;
pub mod error;
pub mod layout;
pub mod masks;
pub mod pipeline;
pub mod runner;
pub mod spec;

pub use config::EvalConfig;
pub use error::{Result, RunError};
pub use layout::CaseLayout;
pub use masks::{crosswalk_masks, load_masks, CrosswalkSummary};
pub use pipeline::{run_batch, BatchReport, JobReport, JobStatus};
pub use runner::{JobOutcome, JobRunner};
pub use spec::{JobSpec, TestCase};
