//! `bcbiovm remap`: Rewrite paths in a configuration document.

use std::path::{Path, PathBuf};

use bcbiovm_common::types::Direction;
use clap::{Args, ValueEnum};
use serde_json::Value;

/// Which namespace paths are translated into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Target {
    /// Host paths become container paths.
    Internal,
    /// Container paths become host paths.
    External,
}

impl From<Target> for Direction {
    fn from(target: Target) -> Self {
        match target {
            Target::Internal => Self::ToInternal,
            Target::External => Self::ToExternal,
        }
    }
}

/// Arguments for the `remap` subcommand.
#[derive(Args, Debug)]
pub struct RemapArgs {
    /// YAML or JSON document to remap.
    pub file: PathBuf,

    /// Bind mount in `host:container` form. May be repeated.
    #[arg(short = 'v', long = "mount", required = true)]
    pub mounts: Vec<String>,

    /// Namespace to translate paths into.
    #[arg(long, value_enum, default_value_t = Target::Internal)]
    pub to: Target,

    /// Write output to a file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Serialization format of a document, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `.json` files.
    Json,
    /// Everything else.
    Yaml,
}

impl Format {
    /// Picks the format for `path`.
    pub fn of(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }

    /// Parses a document.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid in this format.
    pub fn parse(self, text: &str) -> anyhow::Result<Value> {
        Ok(match self {
            Self::Json => serde_json::from_str(text)?,
            Self::Yaml => serde_yaml::from_str(text)?,
        })
    }

    /// Renders a document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render(self, document: &Value) -> anyhow::Result<String> {
        Ok(match self {
            Self::Json => serde_json::to_string_pretty(document)? + "\n",
            Self::Yaml => serde_yaml::to_string(document)?,
        })
    }
}

/// Executes the `remap` command.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, a mount is
/// malformed, or the output cannot be written.
pub fn execute(args: RemapArgs) -> anyhow::Result<()> {
    let input = &args.file;
    tracing::info!(path = %input.display(), to = ?args.to, "remapping document");

    if !input.exists() {
        anyhow::bail!("file not found: {}", input.display());
    }

    let rendered = remap_file(input, &args.mounts, args.to.into())?;

    if let Some(ref out_path) = args.output {
        std::fs::write(out_path, &rendered)?;
        println!("Remapped {} -> {}", input.display(), out_path.display());
    } else {
        print!("{rendered}");
    }

    Ok(())
}

/// Reads, remaps, and re-renders a document in its own format.
///
/// # Errors
///
/// Returns an error if reading, parsing, or remapping fails.
pub fn remap_file(path: &Path, mounts: &[String], direction: Direction) -> anyhow::Result<String> {
    let format = Format::of(path);
    let text = std::fs::read_to_string(path)?;
    let document = format.parse(&text)?;
    let remapped = bcbiovm_docker::remap(document, mounts, direction)?;
    format.render(&remapped)
}
