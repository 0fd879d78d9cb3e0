//! Running the analysis pipeline inside a docker container.
//!
//! The container is started detached with host networking and the
//! requested bind mounts, then attached to until the pipeline exits. On
//! Linux the pipeline runs as the calling user so files it writes keep the
//! same ownership they would have outside the container.

use bcbiovm_common::error::{BcbioError, Result};
use bcbiovm_common::process::{CommandLine, CommandRunner};

/// Host environment variables forwarded into the container when set.
pub const PASS_THROUGH_ENV: &[&str] = &[
    "HTTP_PROXY",
    "http_proxy",
    "HTTPS_PROXY",
    "https_proxy",
    "ALL_PROXY",
    "all_proxy",
    "FTP_PROXY",
    "ftp_proxy",
    "RSYNC_PROXY",
    "rsync_proxy",
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
];

/// Setting this variable on the host runs the container privileged.
pub const PRIVILEGED_ENV: &str = "BCBIO_DOCKER_PRIVILEGED";

const PIPELINE_BIN: &str = "bcbio_nextgen.py";
const CREATE_USER_BIN: &str = "/sbin/createsetuser";
const PERL5LIB: &str = "PERL5LIB=/usr/local/lib/perl5";

/// Bind-mount options docker accepts after the container path.
const MOUNT_MODES: &[&str] = &["ro", "rw", "z", "Z"];

/// Returns the `host:container` pair of a docker `-v` value, dropping a
/// trailing mode suffix such as `:ro` or `:rw,z`.
///
/// Strings without a recognised suffix are returned unchanged.
#[must_use]
pub fn strip_mount_mode(mount: &str) -> &str {
    match mount.rsplit_once(':') {
        Some((pair, mode)) if pair.contains(':') && is_mount_mode(mode) => pair,
        _ => mount,
    }
}

fn is_mount_mode(mode: &str) -> bool {
    !mode.is_empty() && mode.split(',').all(|opt| MOUNT_MODES.contains(&opt))
}

/// Identity the pipeline runs as inside the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostUser {
    /// Login name.
    pub name: String,
    /// Numeric user id.
    pub uid: u32,
    /// Primary group name.
    pub group: String,
    /// Numeric group id.
    pub gid: u32,
}

impl HostUser {
    /// Looks up the user and primary group of the current process.
    ///
    /// # Errors
    ///
    /// Returns an error if either entry is missing from the user database.
    pub fn current() -> Result<Self> {
        let uid = nix::unistd::getuid();
        let gid = nix::unistd::getgid();
        let user = nix::unistd::User::from_uid(uid)
            .ok()
            .flatten()
            .ok_or_else(|| BcbioError::Config {
                message: format!("no passwd entry for uid {uid}"),
            })?;
        let group = nix::unistd::Group::from_gid(gid)
            .ok()
            .flatten()
            .ok_or_else(|| BcbioError::Config {
                message: format!("no group entry for gid {gid}"),
            })?;
        Ok(Self {
            name: user.name,
            uid: uid.as_raw(),
            group: group.name,
            gid: gid.as_raw(),
        })
    }
}

/// Builder for the `docker run` invocation of the pipeline.
#[derive(Debug, Clone)]
pub struct DockerRun {
    image: String,
    mounts: Vec<String>,
    ports: Vec<String>,
    env: Vec<(String, String)>,
    privileged: bool,
    user: Option<HostUser>,
    pipeline_args: Vec<String>,
}

impl DockerRun {
    /// Starts a builder for `image`.
    #[must_use]
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            mounts: Vec::new(),
            ports: Vec::new(),
            env: Vec::new(),
            privileged: false,
            user: None,
            pipeline_args: Vec::new(),
        }
    }

    /// Adds a `host:container` bind mount. Repeated mounts are kept once.
    #[must_use]
    pub fn mount(mut self, mount: impl Into<String>) -> Self {
        let mount = mount.into();
        if !self.mounts.contains(&mount) {
            self.mounts.push(mount);
        }
        self
    }

    /// Adds several bind mounts.
    #[must_use]
    pub fn mounts<I, S>(self, mounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        mounts.into_iter().fold(self, Self::mount)
    }

    /// Publishes a port (`host:container` or a single port).
    #[must_use]
    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.ports.push(port.into());
        self
    }

    /// Sets an environment variable inside the container.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Forwards proxy and credential variables, and the privileged flag,
    /// from a host environment lookup.
    #[must_use]
    pub fn host_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        for key in PASS_THROUGH_ENV {
            if let Some(value) = lookup(key) {
                self.env.push(((*key).to_owned(), value));
            }
        }
        self.privileged = lookup(PRIVILEGED_ENV).is_some();
        self
    }

    /// Runs the pipeline as `user` via the image's user-creation wrapper.
    #[must_use]
    pub fn run_as(mut self, user: Option<HostUser>) -> Self {
        self.user = user;
        self
    }

    /// Sets the pipeline arguments.
    #[must_use]
    pub fn pipeline_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pipeline_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Image the container is started from.
    #[must_use]
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Returns the bind mounts in declaration order.
    #[must_use]
    pub fn mount_list(&self) -> &[String] {
        &self.mounts
    }

    /// Returns the bind mounts as plain `host:container` pairs, ready for
    /// path remapping.
    #[must_use]
    pub fn remap_mounts(&self) -> Vec<&str> {
        self.mounts.iter().map(|m| strip_mount_mode(m)).collect()
    }

    /// Builds the detached `docker run` command.
    #[must_use]
    pub fn command(&self) -> CommandLine {
        let mut cmd = CommandLine::new("docker").args(["run", "-d", "-i"]);
        if self.privileged {
            cmd = cmd.arg("--privileged");
        }
        cmd = cmd.arg("--net=host");
        for port in &self.ports {
            cmd = cmd.args(["-p", port.as_str()]);
        }
        for mount in &self.mounts {
            cmd = cmd.args(["-v", mount.as_str()]);
        }
        for (key, value) in &self.env {
            cmd = cmd.args(["-e".to_owned(), format!("{key}={value}")]);
        }
        cmd = cmd.args(["-e", PERL5LIB]).arg(self.image.as_str());
        if let Some(user) = &self.user {
            cmd = cmd.args([
                CREATE_USER_BIN.to_owned(),
                user.name.clone(),
                user.uid.to_string(),
                user.group.clone(),
                user.gid.to_string(),
            ]);
        }
        cmd.arg(PIPELINE_BIN).args(self.pipeline_args.iter().cloned())
    }
}

/// Returns the identity to run as, or `None` where docker already maps the
/// host user (macOS runs the daemon inside a VM).
///
/// # Errors
///
/// Returns an error if the current user cannot be looked up.
pub fn default_run_user() -> Result<Option<HostUser>> {
    if cfg!(target_os = "macos") {
        Ok(None)
    } else {
        HostUser::current().map(Some)
    }
}

/// Starts the container, attaches until the pipeline exits, and cleans up.
///
/// The container is killed and removed whether or not the attach succeeds.
/// Returns the container id.
///
/// # Errors
///
/// Returns an error if the container cannot be started or the pipeline
/// exits with a non-zero status.
pub fn run_bcbio_cmd(runner: &dyn CommandRunner, run: &DockerRun) -> Result<String> {
    let started = runner.output(&run.command())?;
    let cid = started.stdout.trim().to_owned();
    if started.exit_code != 0 || cid.is_empty() {
        return Err(BcbioError::Process {
            program: "docker run".into(),
            message: format!("exit code {}: {}", started.exit_code, started.stderr.trim()),
        });
    }

    tracing::info!(container = %cid, "running in docker container");
    let attach = CommandLine::new("docker").args(["attach", "--no-stdin", cid.as_str()]);
    let attached = runner.status(&attach);

    if !matches!(attached, Ok(0)) {
        tracing::warn!(container = %cid, "stopping docker container");
    }
    for action in ["kill", "rm"] {
        let cleanup = CommandLine::new("docker").args([action, cid.as_str()]);
        if let Err(e) = runner.output(&cleanup) {
            tracing::debug!(container = %cid, action, error = %e, "container cleanup failed");
        }
    }

    match attached? {
        0 => Ok(cid),
        code => Err(BcbioError::Process {
            program: "docker attach".into(),
            message: format!("container {cid} exited with code {code}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use bcbiovm_common::process::CommandOutput;

    use super::*;

    struct ScriptedRunner {
        calls: RefCell<Vec<Vec<String>>>,
        attach_code: i32,
    }

    impl ScriptedRunner {
        fn new(attach_code: i32) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                attach_code,
            }
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn status(&self, command: &CommandLine) -> Result<i32> {
            self.calls.borrow_mut().push(command.argv());
            Ok(self.attach_code)
        }

        fn output(&self, command: &CommandLine) -> Result<CommandOutput> {
            self.calls.borrow_mut().push(command.argv());
            Ok(CommandOutput {
                stdout: "abc123\n".into(),
                stderr: String::new(),
                exit_code: 0,
            })
        }
    }

    fn analyst() -> HostUser {
        HostUser {
            name: "analyst".into(),
            uid: 1000,
            group: "staff".into(),
            gid: 50,
        }
    }

    #[test]
    fn command_layout_matches_docker_cli() {
        let run = DockerRun::new("bcbio/bcbio:latest")
            .mounts(["/data:/mnt/data", "/refs:/mnt/biodata"])
            .port("8085:8085")
            .run_as(Some(analyst()))
            .pipeline_args(["sample.yaml", "-n", "4"]);

        assert_eq!(
            run.command().argv(),
            vec![
                "docker",
                "run",
                "-d",
                "-i",
                "--net=host",
                "-p",
                "8085:8085",
                "-v",
                "/data:/mnt/data",
                "-v",
                "/refs:/mnt/biodata",
                "-e",
                "PERL5LIB=/usr/local/lib/perl5",
                "bcbio/bcbio:latest",
                "/sbin/createsetuser",
                "analyst",
                "1000",
                "staff",
                "50",
                "bcbio_nextgen.py",
                "sample.yaml",
                "-n",
                "4",
            ]
        );
    }

    #[test]
    fn duplicate_mounts_are_collapsed() {
        let run = DockerRun::new("img").mounts(["/a:/b", "/c:/d", "/a:/b"]);
        assert_eq!(run.mount_list(), ["/a:/b", "/c:/d"]);
    }

    #[test]
    fn mode_suffix_is_stripped_for_remapping() {
        assert_eq!(strip_mount_mode("/data:/mnt/data:ro"), "/data:/mnt/data");
        assert_eq!(strip_mount_mode("/data:/mnt/data:rw,Z"), "/data:/mnt/data");
        assert_eq!(strip_mount_mode("/data:/mnt/data"), "/data:/mnt/data");
        assert_eq!(strip_mount_mode("/data:ro"), "/data:ro");
        assert_eq!(strip_mount_mode("/data:/mnt/data:cached"), "/data:/mnt/data:cached");
    }

    #[test]
    fn remap_mounts_keep_flag_values_intact() {
        let run = DockerRun::new("img").mounts(["/data:/mnt/data:ro", "/refs:/mnt/biodata"]);
        assert_eq!(run.remap_mounts(), ["/data:/mnt/data", "/refs:/mnt/biodata"]);
        let argv = run.command().argv();
        assert!(argv.windows(2).any(|w| w == ["-v", "/data:/mnt/data:ro"]));
    }

    #[test]
    fn host_env_forwards_proxies_and_privileged_flag() {
        let run = DockerRun::new("img").host_env(|key| match key {
            "https_proxy" => Some("http://proxy:3128".into()),
            "BCBIO_DOCKER_PRIVILEGED" => Some("1".into()),
            _ => None,
        });
        let argv = run.command().argv();
        assert_eq!(argv[4], "--privileged");
        assert!(argv.windows(2).any(|w| w == ["-e", "https_proxy=http://proxy:3128"]));
        assert!(!argv.iter().any(|a| a.starts_with("HTTP_PROXY")));
    }

    #[test]
    fn without_user_runs_pipeline_directly() {
        let argv = DockerRun::new("img").command().argv();
        let image_pos = argv.iter().position(|a| a == "img").expect("image");
        assert_eq!(argv[image_pos + 1], "bcbio_nextgen.py");
    }

    #[test]
    fn run_attaches_then_cleans_up() {
        let runner = ScriptedRunner::new(0);
        let cid = run_bcbio_cmd(&runner, &DockerRun::new("img")).expect("run");
        assert_eq!(cid, "abc123");

        let calls = runner.calls.borrow();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[1], ["docker", "attach", "--no-stdin", "abc123"]);
        assert_eq!(calls[2], ["docker", "kill", "abc123"]);
        assert_eq!(calls[3], ["docker", "rm", "abc123"]);
    }

    #[test]
    fn failed_attach_still_cleans_up() {
        let runner = ScriptedRunner::new(2);
        let err = run_bcbio_cmd(&runner, &DockerRun::new("img")).unwrap_err();
        assert!(err.to_string().contains("exited with code 2"));
        assert_eq!(runner.calls.borrow().len(), 4);
    }
}
