//! Command construction for the elasticluster CLI.
//!
//! Every invocation carries an explicit configuration file and storage
//! directory, defaulting to the per-user bcbio locations, and exports the
//! NFS client options the cluster playbooks mount shared storage with.

use std::path::{Path, PathBuf};

use bcbiovm_common::constants::{
    ELASTICLUSTER_BIN, NFS_OPTIONS, NFS_OPTIONS_ENV, default_ec_config, default_ec_storage,
};
use bcbiovm_common::error::{BcbioError, Result};
use bcbiovm_common::process::{CommandLine, CommandRunner};

/// An elasticluster subcommand and its flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterAction {
    /// Create and, unless `no_setup`, configure the cluster.
    Start {
        /// Only start the nodes, skip configuration.
        no_setup: bool,
    },
    /// Terminate the cluster and all its nodes.
    Stop {
        /// Remove the cluster even if some nodes failed to terminate.
        force: bool,
        /// Answer yes to every prompt.
        assume_yes: bool,
    },
    /// Re-run the configuration playbooks.
    Setup,
    /// Connect to the frontend node, optionally running a remote command.
    Ssh {
        /// Remote command; an interactive shell when empty.
        args: Vec<String>,
    },
}

impl ClusterAction {
    /// Subcommand name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Stop { .. } => "stop",
            Self::Setup => "setup",
            Self::Ssh { .. } => "ssh",
        }
    }

    fn trailing_args(&self) -> Vec<String> {
        match self {
            Self::Start { no_setup } => flag(*no_setup, "--no-setup"),
            Self::Stop { force, assume_yes } => {
                let mut out = flag(*force, "--force");
                out.extend(flag(*assume_yes, "--yes"));
                out
            }
            Self::Setup => Vec::new(),
            Self::Ssh { args } => args.clone(),
        }
    }
}

fn flag(enabled: bool, name: &str) -> Vec<String> {
    if enabled { vec![name.to_owned()] } else { Vec::new() }
}

/// Global options shared by every elasticluster invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterOptions {
    /// Configuration file; the per-user default when `None`.
    pub config: Option<PathBuf>,
    /// Storage directory; the per-user default when `None`.
    pub storage: Option<PathBuf>,
    /// Ask elasticluster for verbose output.
    pub verbose: bool,
}

/// Builds and runs elasticluster commands.
#[derive(Debug, Clone)]
pub struct ElastiCluster {
    config: PathBuf,
    storage: PathBuf,
    storage_is_default: bool,
    verbose: bool,
}

impl ElastiCluster {
    /// Resolves `options` against the per-user defaults.
    #[must_use]
    pub fn new(options: ClusterOptions) -> Self {
        let storage_is_default = options.storage.is_none();
        Self {
            config: options.config.unwrap_or_else(default_ec_config),
            storage: options.storage.unwrap_or_else(default_ec_storage),
            storage_is_default,
            verbose: options.verbose,
        }
    }

    /// Configuration file in use.
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config
    }

    /// Storage directory in use.
    #[must_use]
    pub fn storage_path(&self) -> &Path {
        &self.storage
    }

    /// Saved state elasticluster keeps for `cluster`.
    #[must_use]
    pub fn state_file(&self, cluster: &str) -> PathBuf {
        self.storage.join(format!("{cluster}.pickle"))
    }

    /// Builds the command line for `action` on `cluster`.
    #[must_use]
    pub fn command(&self, cluster: &str, action: &ClusterAction) -> CommandLine {
        let mut cmd = CommandLine::new(ELASTICLUSTER_BIN)
            .arg("--config")
            .arg(self.config.to_string_lossy())
            .arg("--storage")
            .arg(self.storage.to_string_lossy());
        if self.verbose {
            cmd = cmd.arg("--verbose");
        }
        cmd.arg(action.name())
            .arg(cluster)
            .args(action.trailing_args())
            .env(NFS_OPTIONS_ENV, NFS_OPTIONS)
    }

    /// Removes state left over from a previous cluster of the same name.
    ///
    /// Only the default storage directory is cleaned; a caller-supplied
    /// storage directory is left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the stale file exists but cannot be removed.
    pub fn clean_stale_state(&self, cluster: &str) -> Result<bool> {
        if !self.storage_is_default {
            return Ok(false);
        }
        let state = self.state_file(cluster);
        if !state.exists() {
            return Ok(false);
        }
        tracing::info!(path = %state.display(), "removing stale cluster state");
        std::fs::remove_file(&state).map_err(|e| BcbioError::Io {
            path: state,
            source: e,
        })?;
        Ok(true)
    }

    /// Runs `action` on `cluster` and returns elasticluster's exit code.
    ///
    /// # Errors
    ///
    /// Returns an error if stale state cannot be cleaned or the program
    /// cannot be launched.
    pub fn execute(
        &self,
        runner: &dyn CommandRunner,
        cluster: &str,
        action: &ClusterAction,
    ) -> Result<i32> {
        if matches!(action, ClusterAction::Start { .. }) {
            let _ = self.clean_stale_state(cluster)?;
        }
        let command = self.command(cluster, action);
        tracing::info!(cluster, action = action.name(), "running elasticluster");
        let code = runner.status(&command)?;
        if code != 0 {
            tracing::warn!(cluster, action = action.name(), code, "elasticluster failed");
        }
        Ok(code)
    }
}
