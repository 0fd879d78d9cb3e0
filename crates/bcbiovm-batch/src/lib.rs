//! # bcbiovm-batch
//!
//! Prepares shell scripts that submit a pipeline run to a batch scheduler.
//!
//! - **Scheduler**: supported schedulers and their directive syntax.
//! - **Submit**: the pipeline command line and the script writer.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod scheduler;
pub mod submit;

pub use scheduler::Scheduler;
pub use submit::{SubmitRequest, write_submit_script};
