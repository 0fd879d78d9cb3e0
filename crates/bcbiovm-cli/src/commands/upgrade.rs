//! `bcbiovm upgrade`: Refresh the analysis image, its tools, and reference data.

use std::path::PathBuf;

use bcbiovm_common::constants::BIODATA_MOUNT;
use bcbiovm_common::process::SystemRunner;
use bcbiovm_docker::install::{InstallDefaults, UpgradeRequest, upgrade};
use bcbiovm_docker::run::{DockerRun, default_run_user};
use clap::Args;

/// Arguments for the `upgrade` command.
#[derive(Args, Debug)]
pub struct UpgradeArgs {
    /// bcbio data directory, mounted into the container for reference data.
    #[arg(long)]
    pub datadir: PathBuf,

    /// Image to upgrade. Defaults to the image saved by a previous upgrade.
    #[arg(short, long)]
    pub image: Option<String>,

    /// Pull the latest image with code and third party tools.
    #[arg(long)]
    pub tools: bool,

    /// Install or upgrade reference data.
    #[arg(long)]
    pub data: bool,

    /// Genome build to download. May be repeated.
    #[arg(long = "genomes")]
    pub genomes: Vec<String>,

    /// Aligner index to download. May be repeated.
    #[arg(long = "aligners")]
    pub aligners: Vec<String>,

    /// Extra data to install. May be repeated.
    #[arg(long)]
    pub datatarget: Vec<String>,

    /// Additional bind mount in `host:container[:mode]` form.
    #[arg(short = 'v', long = "mount")]
    pub mounts: Vec<String>,
}

impl UpgradeArgs {
    fn request(&self) -> UpgradeRequest {
        UpgradeRequest {
            image: self.image.clone(),
            tools: self.tools,
            data: self.data,
            genomes: self.genomes.clone(),
            aligners: self.aligners.clone(),
            datatarget: self.datatarget.clone(),
        }
    }

    fn base_run(&self, request: &UpgradeRequest) -> DockerRun {
        let datadir = format!("{}:{BIODATA_MOUNT}", self.datadir.display());
        DockerRun::new(request.image())
            .mount(datadir)
            .mounts(self.mounts.iter().cloned())
            .host_env(|key| std::env::var(key).ok())
    }
}

/// Executes the `upgrade` command.
///
/// # Errors
///
/// Returns an error if saved defaults cannot be read or written, or an
/// upgrade step fails.
pub fn execute(args: UpgradeArgs) -> anyhow::Result<()> {
    let mut saved = InstallDefaults::load(&args.datadir)?;
    let mut request = args.request();
    saved.apply(&mut request);

    let base = args.base_run(&request).run_as(default_run_user()?);
    let updated = upgrade(&SystemRunner, &request, &base)?;

    saved.record(&request);
    let path = saved.save(&args.datadir)?;
    tracing::debug!(path = %path.display(), "install defaults updated");

    if updated.is_empty() {
        println!("No update targets specified, need '--tools' or '--data'.");
    } else {
        println!("bcbio-nextgen-vm updated with latest {}", updated.join(" and "));
    }
    Ok(())
}
