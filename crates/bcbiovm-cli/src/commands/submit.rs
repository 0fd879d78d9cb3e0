//! `bcbiovm submit`: Prepare a batch scheduler submission script.

use std::path::Path;

use bcbiovm_batch::{Scheduler, SubmitRequest, write_submit_script};
use bcbiovm_common::config::RunConfig;
use clap::Args;

/// Arguments for the `submit` command.
#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Sample configuration file for the run.
    pub sample_config: String,

    /// Scheduler to submit to (slurm, sge, lsf, torque, pbspro).
    pub scheduler: String,

    /// Scheduler queue.
    pub queue: String,

    /// Total cores to use for processing.
    #[arg(short, long, default_value_t = 1)]
    pub numcores: u32,

    /// Scheduler resource request, e.g. `mem=4G`. May be repeated.
    #[arg(short, long = "resources")]
    pub resources: Vec<String>,

    /// Minutes to wait for the cluster to start.
    #[arg(long)]
    pub timeout: Option<u32>,

    /// Times to retry a failed job.
    #[arg(long)]
    pub retries: Option<u32>,

    /// Tag used to name scheduler jobs.
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Local scratch directory on worker nodes.
    #[arg(long)]
    pub tmpdir: Option<String>,

    /// Flowcell directory for sequencer output.
    #[arg(long)]
    pub fcdir: Option<String>,

    /// Alternative system configuration for the distributed run.
    #[arg(long)]
    pub systemconfig: Option<String>,
}

impl SubmitArgs {
    /// Validates the scheduler and assembles the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the scheduler is not supported.
    pub fn into_request(self) -> anyhow::Result<SubmitRequest> {
        let scheduler: Scheduler = self.scheduler.parse()?;
        let mut request =
            SubmitRequest::new(self.sample_config, scheduler, self.queue, self.numcores);
        request.resources = self.resources;
        request.timeout = self.timeout;
        request.retries = self.retries;
        request.tag = self.tag;
        request.tmpdir = self.tmpdir;
        request.fcdir = self.fcdir;
        request.systemconfig = self.systemconfig;
        Ok(request)
    }
}

/// Executes the `submit` command in the current directory.
///
/// # Errors
///
/// Returns an error if the scheduler is unsupported, the run configuration
/// is invalid, or the script cannot be written.
pub fn execute(args: SubmitArgs) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    prepare(&cwd, args)
}

fn prepare(dir: &Path, args: SubmitArgs) -> anyhow::Result<()> {
    let request = args.into_request()?;
    let config = RunConfig::load(dir)?;
    let path = write_submit_script(dir, &request, &config)?;

    println!("Submission script for {} written to {}", request.scheduler, path.display());
    println!(
        "Start analysis with: {} {}",
        request.scheduler.submit_command(),
        path.display()
    );
    Ok(())
}
