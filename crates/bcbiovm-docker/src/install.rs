//! Upgrading the tools and reference data inside the analysis image.
//!
//! Genomes, aligners and a non-default image chosen on one upgrade are
//! remembered in `<datadir>/config/install-params.yaml` and merged into the
//! next, so later upgrades need not repeat them.

use std::path::{Path, PathBuf};

use bcbiovm_common::constants::{DEFAULT_IMAGE, INSTALL_PARAMS_FILE};
use bcbiovm_common::error::{BcbioError, Result};
use bcbiovm_common::process::CommandRunner;
use serde::{Deserialize, Serialize};

use crate::image::{pull, require_image};
use crate::run::{DockerRun, run_bcbio_cmd};

/// What an upgrade should refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradeRequest {
    /// Image to upgrade; the saved or built-in default when `None`.
    pub image: Option<String>,
    /// Pull the image and refresh code and third party tools.
    pub tools: bool,
    /// Download reference data.
    pub data: bool,
    /// Genome builds to install.
    pub genomes: Vec<String>,
    /// Aligner indexes to install.
    pub aligners: Vec<String>,
    /// Extra data targets.
    pub datatarget: Vec<String>,
}

impl UpgradeRequest {
    /// Image reference the upgrade runs against.
    #[must_use]
    pub fn image(&self) -> &str {
        self.image.as_deref().unwrap_or(DEFAULT_IMAGE)
    }

    /// Arguments for the in-container `upgrade` command.
    #[must_use]
    pub fn pipeline_args(&self) -> Vec<String> {
        let mut args = vec!["upgrade".to_owned()];
        if self.data {
            args.push("--data".into());
            for (flag, values) in [
                ("--genomes", &self.genomes),
                ("--aligners", &self.aligners),
                ("--datatarget", &self.datatarget),
            ] {
                for value in values {
                    args.extend([flag.to_owned(), value.clone()]);
                }
            }
        }
        args
    }

    fn check_data_targets(&self) -> Result<()> {
        if !self.data {
            return Ok(());
        }
        let missing = if self.genomes.is_empty() {
            "genomes"
        } else if self.aligners.is_empty() {
            "aligners"
        } else {
            return Ok(());
        };
        Err(BcbioError::Config {
            message: format!("data not installed, no {missing} provided with `--{missing}`"),
        })
    }
}

/// Install options saved between upgrades.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallDefaults {
    /// Genome builds installed so far.
    pub genomes: Vec<String>,
    /// Aligner indexes installed so far.
    pub aligners: Vec<String>,
    /// Image used in place of the built-in default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl InstallDefaults {
    /// Location of the saved defaults for `datadir`.
    #[must_use]
    pub fn path(datadir: &Path) -> PathBuf {
        datadir.join("config").join(INSTALL_PARAMS_FILE)
    }

    /// Loads saved defaults. A missing or empty file yields no defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(datadir: &Path) -> Result<Self> {
        let path = Self::path(datadir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).map_err(|e| BcbioError::Io {
            path: path.clone(),
            source: e,
        })?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        tracing::debug!(path = %path.display(), "loaded install defaults");
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Writes the defaults, creating `<datadir>/config` as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, datadir: &Path) -> Result<PathBuf> {
        let path = Self::path(datadir);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| BcbioError::Io {
                path: dir.to_path_buf(),
                source: e,
            })?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(&path, content).map_err(|e| BcbioError::Io {
            path: path.clone(),
            source: e,
        })?;
        tracing::debug!(path = %path.display(), "saved install defaults");
        Ok(path)
    }

    /// Fills `request` with saved genomes, aligners and image.
    pub fn apply(&self, request: &mut UpgradeRequest) {
        merge(&mut request.genomes, &self.genomes);
        merge(&mut request.aligners, &self.aligners);
        if request.image.is_none() {
            request.image.clone_from(&self.image);
        }
    }

    /// Remembers the targets of `request` for later upgrades.
    pub fn record(&mut self, request: &UpgradeRequest) {
        merge(&mut self.genomes, &request.genomes);
        merge(&mut self.aligners, &request.aligners);
        if let Some(image) = request.image.as_ref().filter(|i| *i != DEFAULT_IMAGE) {
            self.image = Some(image.clone());
        }
    }
}

fn merge(into: &mut Vec<String>, from: &[String]) {
    for item in from {
        if !into.contains(item) {
            into.push(item.clone());
        }
    }
}

/// Runs the requested upgrade steps in containers built from `base`.
///
/// Returns a description of each part that was updated, in order.
///
/// # Errors
///
/// Returns an error if data is requested without genomes or aligners, the
/// image cannot be pulled or found, or an upgrade container fails.
pub fn upgrade(
    runner: &dyn CommandRunner,
    request: &UpgradeRequest,
    base: &DockerRun,
) -> Result<Vec<&'static str>> {
    request.check_data_targets()?;
    let mut updated = Vec::new();

    if request.tools {
        pull(runner, base.image())?;
        require_image(runner, base.image())?;
        let _ = run_bcbio_cmd(runner, &base.clone().pipeline_args(["upgrade"]))?;
        updated.push("bcbio-nextgen code and third party tools");
    }
    if request.data {
        require_image(runner, base.image())?;
        let _ = run_bcbio_cmd(runner, &base.clone().pipeline_args(request.pipeline_args()))?;
        updated.push("biological data");
    }
    Ok(updated)
}
