//! `bcbiovm cluster`: Run and manage elasticluster clusters.

use std::path::PathBuf;
use std::process::ExitCode;

use bcbiovm_cluster::{ClusterAction, ClusterOptions, ElastiCluster};
use bcbiovm_common::constants::DEFAULT_CLUSTER;
use bcbiovm_common::process::SystemRunner;
use clap::{Args, Subcommand};

/// Arguments for the `cluster` command.
#[derive(Args, Debug)]
pub struct ClusterArgs {
    /// Cluster action.
    #[command(subcommand)]
    pub action: ClusterCommand,

    /// Elasticluster configuration file.
    #[arg(long, global = true, env = "BCBIO_ECONFIG")]
    pub econfig: Option<PathBuf>,

    /// Elasticluster storage directory.
    #[arg(long, global = true)]
    pub storage: Option<PathBuf>,

    /// Elasticluster cluster name.
    #[arg(short, long, global = true, default_value = DEFAULT_CLUSTER)]
    pub cluster: String,

    /// Quiet output when running Ansible playbooks.
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Cluster lifecycle actions.
#[derive(Subcommand, Debug)]
pub enum ClusterCommand {
    /// Start a bcbio cluster.
    Start {
        /// Only start the nodes, do not configure them.
        #[arg(long)]
        no_setup: bool,
    },
    /// Stop a bcbio cluster.
    Stop {
        /// Remove the cluster even if some nodes were not terminated.
        #[arg(long)]
        force: bool,
        /// Assume yes to all queries.
        #[arg(short, long)]
        yes: bool,
    },
    /// Rerun cluster configuration steps.
    Setup,
    /// SSH to a bcbio cluster.
    Ssh {
        /// Run this command on the frontend instead of opening a shell.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

impl From<ClusterCommand> for ClusterAction {
    fn from(command: ClusterCommand) -> Self {
        match command {
            ClusterCommand::Start { no_setup } => Self::Start { no_setup },
            ClusterCommand::Stop { force, yes } => Self::Stop {
                force,
                assume_yes: yes,
            },
            ClusterCommand::Setup => Self::Setup,
            ClusterCommand::Ssh { args } => Self::Ssh { args },
        }
    }
}

impl ClusterArgs {
    fn elasticluster(&self) -> ElastiCluster {
        ElastiCluster::new(ClusterOptions {
            config: self.econfig.clone(),
            storage: self.storage.clone(),
            verbose: !self.quiet,
        })
    }
}

/// Executes the `cluster` command and exits with elasticluster's status.
///
/// # Errors
///
/// Returns an error if elasticluster cannot be launched.
pub fn execute(args: ClusterArgs) -> anyhow::Result<ExitCode> {
    let ec = args.elasticluster();
    let action = ClusterAction::from(args.action);
    let code = ec.execute(&SystemRunner, &args.cluster, &action)?;
    Ok(exit_code(code))
}

fn exit_code(code: i32) -> ExitCode {
    u8::try_from(code).map_or(ExitCode::FAILURE, ExitCode::from)
}
