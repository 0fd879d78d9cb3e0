//! CLI command definitions and dispatch.

pub mod cluster;
pub mod remap;
pub mod run;
pub mod submit;
pub mod upgrade;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

/// bcbio-vm: run bcbio analyses in containers, on clusters, and on HPC schedulers.
#[derive(Parser, Debug)]
#[command(name = "bcbiovm", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rewrite file paths in a YAML or JSON document between host and container.
    Remap(remap::RemapArgs),
    /// Run bcbio_nextgen.py inside the analysis container.
    Run(run::RunArgs),
    /// Write a batch scheduler script that submits a distributed run.
    Submit(submit::SubmitArgs),
    /// Run and manage elasticluster clusters.
    Cluster(cluster::ClusterArgs),
    /// Upgrade the analysis image, its tools, and reference data.
    Upgrade(upgrade::UpgradeArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Command::Remap(args) => remap::execute(args).map(|()| ExitCode::SUCCESS),
        Command::Run(args) => run::execute(args).map(|()| ExitCode::SUCCESS),
        Command::Submit(args) => submit::execute(args).map(|()| ExitCode::SUCCESS),
        Command::Cluster(args) => cluster::execute(args),
        Command::Upgrade(args) => upgrade::execute(args).map(|()| ExitCode::SUCCESS),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
