//! Submission script generation.
//!
//! The script carries the scheduler directives for a small controller job,
//! which in turn launches the distributed pipeline run with the same
//! arguments a direct invocation would use.

use std::io::Write;
use std::path::{Path, PathBuf};

use bcbiovm_common::config::RunConfig;
use bcbiovm_common::constants::{SUBMIT_SCRIPT, is_cloud_queue};
use bcbiovm_common::error::{BcbioError, Result};

use crate::scheduler::Scheduler;

const PIPELINE_LAUNCHER: &str = "bcbio_vm.py";

/// Everything needed to prepare one submission script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    /// Sample configuration file passed to the pipeline.
    pub sample_config: String,
    /// Target scheduler.
    pub scheduler: Scheduler,
    /// Scheduler queue.
    pub queue: String,
    /// Total cores for the distributed run.
    pub numcores: u32,
    /// Scheduler resource requests (`-r key=value`).
    pub resources: Vec<String>,
    /// Run tag, used for job names.
    pub tag: Option<String>,
    /// Minutes to wait for cluster engines to start.
    pub timeout: Option<u32>,
    /// Times to retry a failed job.
    pub retries: Option<u32>,
    /// Local scratch directory on worker nodes.
    pub tmpdir: Option<String>,
    /// Flowcell directory for sequencer output.
    pub fcdir: Option<String>,
    /// Overriding system configuration passed to the distributed run.
    pub systemconfig: Option<String>,
}

impl SubmitRequest {
    /// Creates a request with no optional settings.
    #[must_use]
    pub fn new(
        sample_config: impl Into<String>,
        scheduler: Scheduler,
        queue: impl Into<String>,
        numcores: u32,
    ) -> Self {
        Self {
            sample_config: sample_config.into(),
            scheduler,
            queue: queue.into(),
            numcores,
            resources: Vec::new(),
            tag: None,
            timeout: None,
            retries: None,
            tmpdir: None,
            fcdir: None,
            systemconfig: None,
        }
    }

    /// Value of a `timelimit=...` resource, if one was requested.
    #[must_use]
    pub fn timelimit(&self) -> Option<&str> {
        self.resources
            .iter()
            .find_map(|r| r.strip_prefix("timelimit").and_then(|rest| rest.strip_prefix('=')))
    }

    fn has_timelimit(&self) -> bool {
        self.resources.iter().any(|r| r.starts_with("timelimit"))
    }

    /// Pipeline invocation the controller job runs.
    #[must_use]
    pub fn pipeline_args(&self, config: &RunConfig) -> Vec<String> {
        let mut cmd = vec![
            PIPELINE_LAUNCHER.to_owned(),
            format!("--datadir={}", config.data_dir),
            "ipython".into(),
            format!("--systemconfig={}", config.system_config),
            self.sample_config.clone(),
            self.scheduler.name().into(),
            self.queue.clone(),
            "--numcores".into(),
            self.numcores.to_string(),
        ];
        for resource in &self.resources {
            cmd.extend(["-r".to_owned(), resource.clone()]);
        }
        if !self.has_timelimit() && is_cloud_queue(&self.queue) {
            cmd.extend(["-r".to_owned(), "timelimit=0".to_owned()]);
        }

        let optional = [
            ("timeout", self.timeout.map(|v| v.to_string())),
            ("retries", self.retries.map(|v| v.to_string())),
            ("tag", self.tag.clone()),
            ("tmpdir", self.tmpdir.clone()),
            ("fcdir", self.fcdir.clone()),
            ("systemconfig", self.systemconfig.clone()),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                cmd.extend([format!("--{name}"), value]);
            }
        }
        cmd
    }

    /// Full script text: shebang, directives, pipeline command.
    #[must_use]
    pub fn script(&self, config: &RunConfig) -> String {
        format!(
            "#!/bin/bash\n{}\n{}\n",
            self.scheduler.header(self, config),
            self.pipeline_args(config).join(" ")
        )
    }
}

/// Writes the submission script into `dir` and returns its path.
///
/// # Errors
///
/// Returns an error if the script cannot be written.
pub fn write_submit_script(
    dir: &Path,
    request: &SubmitRequest,
    config: &RunConfig,
) -> Result<PathBuf> {
    let path = dir.join(SUBMIT_SCRIPT);
    let script = request.script(config);

    let mut file = std::fs::File::create(&path).map_err(|e| BcbioError::Io {
        path: path.clone(),
        source: e,
    })?;
    file.write_all(script.as_bytes()).map_err(|e| BcbioError::Io {
        path: path.clone(),
        source: e,
    })?;

    tracing::info!(
        scheduler = %request.scheduler,
        path = %path.display(),
        "wrote submission script"
    );
    Ok(path)
}
