//! Supported batch schedulers and their submission directives.

use std::fmt;
use std::str::FromStr;

use bcbiovm_common::config::RunConfig;
use bcbiovm_common::constants::is_cloud_queue;
use bcbiovm_common::error::BcbioError;

use crate::submit::SubmitRequest;

/// Slurm time limit outside of dedicated cloud queues.
const SLURM_DEFAULT_TIMELIMIT: &str = "1-00:00:00";

/// A batch scheduler a submission script can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheduler {
    /// Slurm (`sbatch`).
    Slurm,
    /// Sun/Univa Grid Engine (`qsub`).
    Sge,
    /// IBM Platform LSF (`bsub`).
    Lsf,
    /// Torque (`qsub`).
    Torque,
    /// PBS Professional (`qsub`), shares Torque's directives.
    PbsPro,
}

impl Scheduler {
    /// Every supported scheduler.
    pub const ALL: [Self; 5] = [Self::Slurm, Self::Sge, Self::Lsf, Self::Torque, Self::PbsPro];

    /// Name used on the command line and in the pipeline invocation.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Slurm => "slurm",
            Self::Sge => "sge",
            Self::Lsf => "lsf",
            Self::Torque => "torque",
            Self::PbsPro => "pbspro",
        }
    }

    /// Comment prefix the scheduler reads directives from.
    #[must_use]
    pub const fn directive_prefix(self) -> &'static str {
        match self {
            Self::Slurm => "#SBATCH",
            Self::Sge => "#$",
            Self::Lsf => "#BSUB",
            Self::Torque | Self::PbsPro => "#PBS",
        }
    }

    /// Program that submits a script to this scheduler.
    #[must_use]
    pub const fn submit_command(self) -> &'static str {
        match self {
            Self::Slurm => "sbatch",
            Self::Sge | Self::Torque | Self::PbsPro => "qsub",
            Self::Lsf => "bsub",
        }
    }

    /// Directive arguments, without the prefix, for a submission job.
    #[must_use]
    pub fn directives(self, request: &SubmitRequest, config: &RunConfig) -> Vec<String> {
        let mut cmds = match self {
            Self::Slurm => slurm_directives(request, config),
            Self::Sge => sge_directives(request),
            Self::Lsf => vec![format!("-q {}", request.queue), "-n 1".into()],
            Self::Torque | Self::PbsPro => vec![
                "-V".into(),
                "-j oe".into(),
                format!("-q {}", request.queue),
                "-l nodes=1:ppn=1".into(),
            ],
        };
        if let Some(tag) = &request.tag {
            let flag = match self {
                Self::Slurm | Self::Lsf => "-J",
                Self::Sge | Self::Torque | Self::PbsPro => "-N",
            };
            cmds.push(format!("{flag} {tag}-submit"));
        }
        cmds
    }

    /// Directive block ready to paste below the shebang line.
    #[must_use]
    pub fn header(self, request: &SubmitRequest, config: &RunConfig) -> String {
        let prefix = self.directive_prefix();
        self.directives(request, config)
            .iter()
            .map(|d| format!("{prefix} {d}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn slurm_directives(request: &SubmitRequest, config: &RunConfig) -> Vec<String> {
    // An explicit `timelimit=` resource takes precedence over the queue default.
    let timelimit = request.timelimit().unwrap_or(if is_cloud_queue(&request.queue) {
        "0"
    } else {
        SLURM_DEFAULT_TIMELIMIT
    });
    vec![
        "--cpus-per-task=1".into(),
        "--mem=2000".into(),
        format!("-p {}", request.queue),
        format!("-t {timelimit}"),
        format!("-o {}/slurm_%j.out", config.output_dir),
        format!("-e {}/slurm_%j.err", config.output_dir),
        format!("-D {}", config.work_dir),
        "-vvvv".into(),
    ]
}

fn sge_directives(request: &SubmitRequest) -> Vec<String> {
    let mut cmds = vec!["-cwd".into(), "-j y".into(), "-S /bin/bash".into()];
    if !request.queue.is_empty() {
        cmds.push(format!("-q {}", request.queue));
    }
    cmds
}

impl FromStr for Scheduler {
    type Err = BcbioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|sched| sched.name() == s)
            .ok_or_else(|| BcbioError::UnsupportedScheduler { name: s.into() })
    }
}

impl fmt::Display for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
