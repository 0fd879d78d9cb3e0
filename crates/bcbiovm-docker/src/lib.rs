//! # bcbiovm-docker
//!
//! Everything needed to run the analysis pipeline inside its container:
//!
//! - **Remap**: rewrites file paths embedded in configuration documents
//!   between the host and container namespaces.
//! - **Run**: builds and drives the `docker run` invocation that mounts
//!   host directories and runs the pipeline as the calling user.
//! - **Image** and **Install**: local image checks, pulls, and upgrades of
//!   the tools and reference data inside the image.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod image;
pub mod install;
pub mod remap;
pub mod run;

pub use remap::{MountIndex, remap, remap_to_external, remap_to_internal, walk};
