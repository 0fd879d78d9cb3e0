//! Run configuration used when preparing batch submissions.
//!
//! Loaded once per invocation and passed by reference to every consumer.
//! Values come from an optional `aws_run_config.yaml` in the working
//! directory, layered over built-in defaults, with `$VAR` and `${VAR}`
//! references expanded from the environment.

use std::path::Path;

use serde::Deserialize;

use crate::error::{BcbioError, Result};

/// Directories and files the generated submission scripts refer to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Directory scheduler stdout/stderr logs are written to.
    pub output_dir: String,
    /// Working directory the job runs in.
    pub work_dir: String,
    /// bcbio data directory passed as `--datadir`.
    pub data_dir: String,
    /// bcbio system configuration passed as `--systemconfig`.
    pub system_config: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output_dir: "$HOME/testrun".into(),
            work_dir: "/mnt/S3/workdir".into(),
            data_dir: "$HOME/src/bcbio-nextgen/tests/data".into(),
            system_config: "$HOME/install/bcbio-vm/data/galaxy/bcbio_system.yaml".into(),
        }
    }
}

impl RunConfig {
    /// Loads the run configuration for `dir`.
    ///
    /// Missing keys, or a missing file, fall back to the defaults. Every
    /// value has environment references expanded.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(crate::constants::RUN_CONFIG_FILE);
        let config = if path.exists() {
            tracing::debug!(path = %path.display(), "loading run configuration");
            let content = std::fs::read_to_string(&path).map_err(|e| BcbioError::Io {
                path: path.clone(),
                source: e,
            })?;
            Self::from_yaml(&content)?
        } else {
            tracing::debug!(path = %path.display(), "no run configuration, using defaults");
            Self::default()
        };
        Ok(config.expanded(|name| std::env::var(name).ok()))
    }

    /// Parses a YAML document, filling absent keys with defaults.
    ///
    /// An empty document yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or a value has the wrong type.
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Returns a copy with every value passed through [`expand_vars`].
    #[must_use]
    pub fn expanded<F>(&self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            output_dir: expand_vars(&self.output_dir, &lookup),
            work_dir: expand_vars(&self.work_dir, &lookup),
            data_dir: expand_vars(&self.data_dir, &lookup),
            system_config: expand_vars(&self.system_config, &lookup),
        }
    }
}

/// Expands `$NAME` and `${NAME}` references using `lookup`.
///
/// Variable names are ASCII alphanumerics and underscores. References that
/// `lookup` cannot resolve, and unterminated `${`, are left verbatim.
pub fn expand_vars<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], end)
        };

        match (name.is_empty(), lookup(name)) {
            (false, Some(value)) => out.push_str(&value),
            _ => out.push_str(&rest[pos..=pos + consumed]),
        }
        rest = &rest[pos + 1 + consumed..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "HOME" => Some("/home/user".into()),
            "SCRATCH" => Some("/scratch".into()),
            _ => None,
        }
    }

    #[test]
    fn expand_plain_and_braced() {
        assert_eq!(expand_vars("$HOME/run", lookup), "/home/user/run");
        assert_eq!(expand_vars("${SCRATCH}work", lookup), "/scratchwork");
    }

    #[test]
    fn expand_leaves_unknown_untouched() {
        assert_eq!(expand_vars("$NOPE/x", lookup), "$NOPE/x");
        assert_eq!(expand_vars("${NOPE}/x", lookup), "${NOPE}/x");
    }

    #[test]
    fn expand_handles_lone_dollar_and_unterminated_brace() {
        assert_eq!(expand_vars("cost $5", lookup), "cost $5");
        assert_eq!(expand_vars("a$", lookup), "a$");
        assert_eq!(expand_vars("${HOME", lookup), "${HOME");
    }

    #[test]
    fn from_yaml_merges_over_defaults() {
        let config = RunConfig::from_yaml("work_dir: /scratch/work\n").expect("parse");
        assert_eq!(config.work_dir, "/scratch/work");
        assert_eq!(config.output_dir, RunConfig::default().output_dir);
    }

    #[test]
    fn from_empty_yaml_is_default() {
        assert_eq!(RunConfig::from_yaml("").expect("parse"), RunConfig::default());
    }

    #[test]
    fn expanded_resolves_defaults() {
        let config = RunConfig::default().expanded(lookup);
        assert_eq!(config.output_dir, "/home/user/testrun");
        assert_eq!(config.work_dir, "/mnt/S3/workdir");
    }

    #[test]
    fn load_without_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = RunConfig::load(dir.path()).expect("load");
        assert_eq!(config.work_dir, "/mnt/S3/workdir");
    }

    #[test]
    fn load_reads_file_in_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join(crate::constants::RUN_CONFIG_FILE),
            "output_dir: /results\ndata_dir: /data\n",
        )
        .expect("write");
        let config = RunConfig::load(dir.path()).expect("load");
        assert_eq!(config.output_dir, "/results");
        assert_eq!(config.data_dir, "/data");
    }

    #[test]
    fn load_rejects_invalid_yaml() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join(crate::constants::RUN_CONFIG_FILE),
            "output_dir: [unclosed\n",
        )
        .expect("write");
        assert!(RunConfig::load(dir.path()).is_err());
    }
}
