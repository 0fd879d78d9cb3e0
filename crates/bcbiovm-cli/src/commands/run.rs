//! `bcbiovm run`: Run bcbio_nextgen.py inside the analysis container.

use bcbiovm_common::constants::DEFAULT_IMAGE;
use bcbiovm_common::process::SystemRunner;
use bcbiovm_docker::image::require_image;
use bcbiovm_docker::run::{DockerRun, default_run_user, run_bcbio_cmd};
use clap::Args;
use serde_json::Value;

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Image to run.
    #[arg(short, long, default_value = DEFAULT_IMAGE)]
    pub image: String,

    /// Bind mount in `host:container[:mode]` form. May be repeated.
    #[arg(short = 'v', long = "mount")]
    pub mounts: Vec<String>,

    /// Port to publish. May be repeated.
    #[arg(short, long = "port")]
    pub ports: Vec<String>,

    /// Arguments for bcbio_nextgen.py. Host paths under a mount are
    /// rewritten to their container locations.
    #[arg(last = true)]
    pub args: Vec<String>,
}

/// Executes the `run` command.
///
/// # Errors
///
/// Returns an error if a mount is malformed, the image is not available
/// locally, the user cannot be looked up, or the container fails.
pub fn execute(args: RunArgs) -> anyhow::Result<()> {
    let run = build_run(args)?.run_as(default_run_user()?);
    require_image(&SystemRunner, run.image())?;
    let cid = run_bcbio_cmd(&SystemRunner, &run)?;
    tracing::info!(container = %cid, "analysis finished");
    Ok(())
}

/// Builds the container invocation, remapping pipeline arguments into the
/// container namespace.
///
/// Mount mode suffixes such as `:ro` are passed to docker but are not part
/// of the container path arguments are rewritten to.
///
/// # Errors
///
/// Returns an error if a mount is malformed.
pub fn build_run(args: RunArgs) -> anyhow::Result<DockerRun> {
    let mut run = DockerRun::new(args.image)
        .mounts(args.mounts)
        .host_env(|key| std::env::var(key).ok());
    for port in args.ports {
        run = run.port(port);
    }
    let pipeline_args = internal_args(args.args, &run.remap_mounts())?;
    Ok(run.pipeline_args(pipeline_args))
}

fn internal_args(args: Vec<String>, mounts: &[&str]) -> anyhow::Result<Vec<String>> {
    let document = Value::Array(args.into_iter().map(Value::String).collect());
    let remapped = bcbiovm_docker::remap_to_internal(document, mounts)?;
    Ok(match remapped {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_paths_in_arguments_are_remapped() {
        let args = RunArgs {
            image: "img".into(),
            mounts: vec!["/home/u/project:/mnt/work".into()],
            ports: vec!["8085".into()],
            args: vec!["/home/u/project/sample.yaml".into(), "-n".into(), "8".into()],
        };
        let argv = build_run(args).expect("build").command().argv();
        assert!(argv.ends_with(&[
            "bcbio_nextgen.py".to_string(),
            "/mnt/work/sample.yaml".to_string(),
            "-n".to_string(),
            "8".to_string(),
        ]));
        assert!(argv.windows(2).any(|w| w == ["-v", "/home/u/project:/mnt/work"]));
        assert!(argv.windows(2).any(|w| w == ["-p", "8085"]));
    }

    #[test]
    fn read_only_mount_remaps_to_container_path() {
        let args = RunArgs {
            image: "img".into(),
            mounts: vec!["/data:/mnt/data:ro".into()],
            ports: Vec::new(),
            args: vec!["/data/sample.yaml".into()],
        };
        let argv = build_run(args).expect("build").command().argv();
        assert_eq!(argv.last().map(String::as_str), Some("/mnt/data/sample.yaml"));
        assert!(argv.windows(2).any(|w| w == ["-v", "/data:/mnt/data:ro"]));
    }

    #[test]
    fn malformed_mount_is_rejected() {
        let args = RunArgs {
            image: "img".into(),
            mounts: vec!["broken".into()],
            ports: Vec::new(),
            args: Vec::new(),
        };
        assert!(build_run(args).is_err());
    }
}
