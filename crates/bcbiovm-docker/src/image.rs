//! Local image checks and retrieval.

use bcbiovm_common::error::{BcbioError, Result};
use bcbiovm_common::process::{CommandLine, CommandRunner};

const REPO_TAG_FORMAT: &str = "{{.Repository}}:{{.Tag}}";

/// Returns `true` if `image` is one of the local repository tags.
///
/// The reference is compared exactly, so `bcbio/bcbio` does not match a
/// local `bcbio/bcbio:latest`.
///
/// # Errors
///
/// Returns an error if `docker images` cannot be run or fails.
pub fn image_exists(runner: &dyn CommandRunner, image: &str) -> Result<bool> {
    let list = CommandLine::new("docker").args(["images", "--format", REPO_TAG_FORMAT]);
    let out = runner.output(&list)?;
    if out.exit_code != 0 {
        return Err(BcbioError::Process {
            program: "docker images".into(),
            message: format!("exit code {}: {}", out.exit_code, out.stderr.trim()),
        });
    }
    Ok(out.stdout.lines().any(|tag| tag.trim() == image))
}

/// Fails with [`BcbioError::MissingImage`] unless `image` exists locally.
///
/// # Errors
///
/// Returns an error if the image is missing or docker cannot be queried.
pub fn require_image(runner: &dyn CommandRunner, image: &str) -> Result<()> {
    if image_exists(runner, image)? {
        Ok(())
    } else {
        Err(BcbioError::MissingImage {
            image: image.into(),
        })
    }
}

/// Pulls the latest version of `image`.
///
/// # Errors
///
/// Returns an error if the image name is empty or `docker pull` fails.
pub fn pull(runner: &dyn CommandRunner, image: &str) -> Result<()> {
    if image.is_empty() {
        return Err(BcbioError::Config {
            message: "unspecified image name for docker pull".into(),
        });
    }
    tracing::info!(image, "retrieving docker image with code and tools");
    match runner.status(&CommandLine::new("docker").args(["pull", image]))? {
        0 => Ok(()),
        code => Err(BcbioError::Process {
            program: "docker pull".into(),
            message: format!("exit code {code} pulling {image}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use bcbiovm_common::process::CommandOutput;

    use super::*;

    struct ImageList {
        tags: &'static str,
        exit_code: i32,
        calls: RefCell<Vec<Vec<String>>>,
    }

    impl ImageList {
        fn new(tags: &'static str) -> Self {
            Self {
                tags,
                exit_code: 0,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl CommandRunner for ImageList {
        fn status(&self, command: &CommandLine) -> Result<i32> {
            self.calls.borrow_mut().push(command.argv());
            Ok(self.exit_code)
        }

        fn output(&self, command: &CommandLine) -> Result<CommandOutput> {
            self.calls.borrow_mut().push(command.argv());
            Ok(CommandOutput {
                stdout: self.tags.into(),
                stderr: String::new(),
                exit_code: self.exit_code,
            })
        }
    }

    #[test]
    fn finds_exact_repo_tag() {
        let runner = ImageList::new("ubuntu:22.04\nbcbio/bcbio:latest\n");
        assert!(image_exists(&runner, "bcbio/bcbio:latest").expect("query"));
        assert!(!image_exists(&runner, "bcbio/bcbio").expect("query"));
        assert_eq!(
            runner.calls.borrow()[0],
            ["docker", "images", "--format", "{{.Repository}}:{{.Tag}}"]
        );
    }

    #[test]
    fn missing_image_is_reported() {
        let runner = ImageList::new("ubuntu:22.04\n");
        let err = require_image(&runner, "bcbio/bcbio:latest").unwrap_err();
        assert!(
            matches!(err, BcbioError::MissingImage { ref image } if image == "bcbio/bcbio:latest")
        );
        assert!(err.to_string().contains("in local repository"));
    }

    #[test]
    fn failing_docker_query_is_an_error() {
        let runner = ImageList {
            exit_code: 1,
            ..ImageList::new("")
        };
        assert!(image_exists(&runner, "img").is_err());
    }

    #[test]
    fn pull_runs_docker_pull() {
        let runner = ImageList::new("");
        pull(&runner, "bcbio/bcbio:latest").expect("pull");
        assert_eq!(runner.calls.borrow()[0], ["docker", "pull", "bcbio/bcbio:latest"]);
    }

    #[test]
    fn pull_without_image_name_fails() {
        let runner = ImageList::new("");
        assert!(pull(&runner, "").is_err());
        assert!(runner.calls.borrow().is_empty());
    }
}
