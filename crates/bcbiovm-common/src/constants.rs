//! System-wide constants and default paths.

use std::path::PathBuf;

/// NFS client options handed to the elasticluster Ansible playbooks.
///
/// Async clients give better throughput on reads and writes.
pub const NFS_OPTIONS: &str = "rw,async,nfsvers=3";

/// Environment variable elasticluster reads the NFS options from.
pub const NFS_OPTIONS_ENV: &str = "nfsoptions";

/// Name of the elasticluster executable.
pub const ELASTICLUSTER_BIN: &str = "elasticluster";

/// Default elasticluster cluster name.
pub const DEFAULT_CLUSTER: &str = "bcbio";

/// Docker image used when none is given on the command line.
pub const DEFAULT_IMAGE: &str = "bcbio/bcbio:latest";

/// Install options remembered between upgrades, under `<datadir>/config`.
pub const INSTALL_PARAMS_FILE: &str = "install-params.yaml";

/// Container path the bcbio data directory is mounted at.
pub const BIODATA_MOUNT: &str = "/mnt/biodata";

/// Per-directory run configuration consulted when preparing batch scripts.
pub const RUN_CONFIG_FILE: &str = "aws_run_config.yaml";

/// File name of the generated batch submission script.
pub const SUBMIT_SCRIPT: &str = "bcbio_submit.sh";

/// Queue names that indicate a dedicated cloud queue.
pub const CLOUD_QUEUES: &[&str] = &["cloud"];

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_or_else(|_| PathBuf::from("."), PathBuf::from)
}

/// Returns the per-user bcbio directory (`~/.bcbio`).
pub fn bcbio_dir() -> PathBuf {
    home_dir().join(".bcbio")
}

/// Returns the default elasticluster configuration file.
pub fn default_ec_config() -> PathBuf {
    bcbio_dir().join("elasticluster").join("config")
}

/// Returns the default elasticluster storage directory.
pub fn default_ec_storage() -> PathBuf {
    bcbio_dir().join("elasticluster").join("storage")
}

/// Returns `true` if `queue` is a dedicated cloud queue.
pub fn is_cloud_queue(queue: &str) -> bool {
    CLOUD_QUEUES.contains(&queue)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ec_paths_live_under_bcbio_dir() {
        assert!(default_ec_config().starts_with(bcbio_dir()));
        assert!(default_ec_config().ends_with("elasticluster/config"));
        assert!(default_ec_storage().ends_with("elasticluster/storage"));
    }

    #[test]
    fn cloud_queue_detection() {
        assert!(is_cloud_queue("cloud"));
        assert!(!is_cloud_queue("general"));
    }
}
