//! # bcbiovm-cluster
//!
//! Drives elasticluster to manage the compute cluster a distributed run
//! executes on. Commands are assembled here and executed through the
//! [`bcbiovm_common::process::CommandRunner`] seam.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod elasticluster;

pub use elasticluster::{ClusterAction, ClusterOptions, ElastiCluster};
