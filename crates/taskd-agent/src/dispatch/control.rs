//! Process-lifecycle capability.
//!
//! The dispatcher never signals processes or launches programs itself; it
//! goes through a [`ProcessControl`] so tests can substitute a recorder.

use std::io;
use std::process::{Command, ExitStatus, Stdio};

use taskd_core::Pid;
use thiserror::Error;
use tracing::{debug, warn};

use super::validate::PackageName;

/// Default program (and leading arguments) used to stop a package.
pub const DEFAULT_FORCE_STOP_COMMAND: [&str; 2] = ["am", "force-stop"];

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("kill({target}) failed: {source}")]
    Signal { target: i32, source: io::Error },

    #[error("{0} does not fit a kernel pid")]
    PidOutOfRange(Pid),

    #[error("refusing to signal reserved target {0}")]
    ReservedTarget(i32),

    #[error("no force-stop command configured")]
    NoCommand,

    #[error("failed to run {program}: {source}")]
    Spawn { program: String, source: io::Error },

    #[error("{program} exited with {status}")]
    Exited { program: String, status: ExitStatus },
}

/// Privileged process actions.
pub trait ProcessControl: Send + Sync {
    /// Sends SIGKILL to one process.
    fn kill(&self, pid: Pid) -> Result<(), ControlError>;

    /// Sends SIGKILL to every process in a group.
    fn kill_group(&self, pgid: Pid) -> Result<(), ControlError>;

    /// Stops an application package through the OS facility.
    fn stop_package(&self, package: &PackageName) -> Result<(), ControlError>;
}

/// The real thing: `kill(2)` and a package-stop program run without a shell.
#[derive(Debug, Clone)]
pub struct SystemControl {
    force_stop_command: Vec<String>,
}

impl Default for SystemControl {
    fn default() -> Self {
        Self::new(DEFAULT_FORCE_STOP_COMMAND.iter().map(|s| s.to_string()).collect())
    }
}

impl SystemControl {
    /// `force_stop_command` is the argv prefix; the package name is appended.
    pub fn new(force_stop_command: Vec<String>) -> Self {
        Self { force_stop_command }
    }
}

impl ProcessControl for SystemControl {
    fn kill(&self, pid: Pid) -> Result<(), ControlError> {
        let target = i32::try_from(pid).map_err(|_| ControlError::PidOutOfRange(pid))?;
        send_sigkill(target)
    }

    fn kill_group(&self, pgid: Pid) -> Result<(), ControlError> {
        let group = i32::try_from(pgid).map_err(|_| ControlError::PidOutOfRange(pgid))?;
        send_sigkill(-group)
    }

    fn stop_package(&self, package: &PackageName) -> Result<(), ControlError> {
        let (program, args) = self
            .force_stop_command
            .split_first()
            .ok_or(ControlError::NoCommand)?;

        debug!(program = %program, package = %package, "Running force-stop");
        let status = Command::new(program)
            .args(args)
            .arg(package.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|source| ControlError::Spawn {
                program: program.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(ControlError::Exited {
                program: program.clone(),
                status,
            })
        }
    }
}

fn send_sigkill(target: i32) -> Result<(), ControlError> {
    // 0 addresses the caller's own group and -1 every process.
    if target == 0 || target == -1 {
        return Err(ControlError::ReservedTarget(target));
    }

    // SAFETY: kill(2) takes plain integers and has no memory-safety
    // preconditions.
    let result = unsafe { libc::kill(target, libc::SIGKILL) };
    if result == 0 {
        Ok(())
    } else {
        let source = io::Error::last_os_error();
        warn!(kill_target = target, error = %source, "kill failed");
        Err(ControlError::Signal { target, source })
    }
}
