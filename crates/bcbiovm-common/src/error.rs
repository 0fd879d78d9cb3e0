//! Unified error types for the bcbio-vm workspace.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum BcbioError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A mount specification is not of the form `host:container`.
    #[error("malformed mount specification \"{spec}\": expected host:container")]
    MalformedMount {
        /// The offending mount string.
        spec: String,
    },

    /// A path was handed to the prefix matcher without any mount covering it.
    #[error("no mount point matches path \"{path}\"")]
    NoMountMatch {
        /// The path that had no matching mount.
        path: String,
    },

    /// The requested batch scheduler has no directive generator.
    #[error("batch script preparation for {name} not yet supported")]
    UnsupportedScheduler {
        /// Scheduler name as given by the caller.
        name: String,
    },

    /// The container image is not present in the local docker repository.
    #[error("could not find docker image {image} in local repository")]
    MissingImage {
        /// Image reference, `repository:tag`.
        image: String,
    },

    /// An external program could not be launched or misbehaved.
    #[error("failed to run {program}: {message}")]
    Process {
        /// Program that was invoked.
        program: String,
        /// Description of the failure.
        message: String,
    },

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },

    /// YAML serialization or deserialization failed.
    #[error("YAML error: {source}")]
    Yaml {
        /// Underlying YAML error.
        #[from]
        source: serde_yaml::Error,
    },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, BcbioError>;
