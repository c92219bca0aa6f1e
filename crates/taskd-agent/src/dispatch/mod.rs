//! Command dispatcher.
//!
//! Maps each decoded [`Command`] onto a snapshot read or a process action
//! and produces at most one [`Reply`]. The dispatcher holds no state of its
//! own between commands.
//!
//! # Blocking I/O
//!
//! `dispatch` reads procfs synchronously and `CPU_PING` sleeps for the
//! sample interval. The connection loop runs it on the blocking pool.
//!
//! # Panic-Free Guarantees
//!
//! Every failure becomes a negative reply, a zero value or a log line;
//! nothing here propagates an error to the connection.

pub mod control;
pub mod validate;

use std::sync::Arc;

use taskd_core::Pid;
use taskd_protocol::{Command, Reply};
use tracing::{debug, info, warn};

use crate::registry::ProcessRegistry;
use crate::snapshot::SnapshotReader;

pub use control::{ControlError, ProcessControl, SystemControl, DEFAULT_FORCE_STOP_COMMAND};
pub use validate::{PackageName, PackageNameError, MAX_PACKAGE_NAME_LEN};

/// What the connection loop should do after a command.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Send this reply and keep going
    Reply(Reply),

    /// Stop the agent; nothing is sent
    Stop,

    /// Nothing to send (unknown command)
    Silent,
}

/// Executes commands against the snapshot reader and a control capability.
pub struct Dispatcher {
    reader: Arc<SnapshotReader>,
    registry: ProcessRegistry,
    control: Box<dyn ProcessControl>,
}

impl Dispatcher {
    pub fn new(reader: Arc<SnapshotReader>, control: impl ProcessControl + 'static) -> Self {
        Self {
            registry: ProcessRegistry::new(Arc::clone(&reader)),
            reader,
            control: Box::new(control),
        }
    }

    pub fn dispatch(&self, command: &Command) -> DispatchOutcome {
        debug!(command = ?command, "Dispatching command");

        let reply = match command {
            Command::Ping => Reply::Pong,
            Command::Kill { pid } => Reply::KillResult(self.kill(*pid)),
            Command::KillGroup { pgid } => Reply::KillResult(self.kill_group(*pgid)),
            Command::ForceStop { package } => {
                Reply::KillResult(self.force_stop(package.as_deref()))
            }
            Command::StopSelf => {
                info!("Stop requested by supervisor");
                return DispatchOutcome::Stop;
            }
            Command::ListProcess => {
                let records = self.registry.collect_all();
                info!(count = records.len(), "Process list");
                Reply::ProcessList(records)
            }
            Command::CpuPing => {
                let usage = self.reader.system_cpu_usage();
                info!(usage, "CPU usage");
                Reply::Cpu(usage)
            }
            Command::SwapPing => {
                let swap = self.reader.swap_usage();
                info!(
                    used_bytes = swap.used_bytes,
                    total_bytes = swap.total_bytes,
                    "Swap usage"
                );
                Reply::Swap(swap)
            }
            Command::GpuPing => {
                let gpu = self.reader.gpu_usage();
                info!(gpu = %gpu, "GPU usage");
                Reply::Gpu(gpu)
            }
            Command::CpuTempPing => {
                let temp = self.reader.cpu_temperature();
                info!(celsius = %temp, "CPU temperature");
                Reply::CpuTemp(temp)
            }
            Command::PidCpuPing { pid } => {
                let usage = match pid {
                    Some(pid) => self.reader.process_cpu_usage(*pid),
                    None => {
                        warn!("PING_PID_CPU without a valid pid");
                        0.0
                    }
                };
                info!(pid = ?pid, usage, "Process CPU usage");
                Reply::PidCpu(usage)
            }
            Command::Unknown(raw) => {
                warn!(command = %raw, "Unknown command");
                return DispatchOutcome::Silent;
            }
        };

        DispatchOutcome::Reply(reply)
    }

    fn kill(&self, pid: Option<Pid>) -> bool {
        let Some(pid) = pid else {
            warn!("KILL without a valid pid");
            return false;
        };
        match self.control.kill(pid) {
            Ok(()) => {
                info!(pid, "Killed process");
                true
            }
            Err(e) => {
                warn!(pid, error = %e, "Kill failed");
                false
            }
        }
    }

    fn kill_group(&self, pgid: Option<Pid>) -> bool {
        let Some(pgid) = pgid else {
            warn!("KILL_GROUP without a valid group id");
            return false;
        };
        match self.control.kill_group(pgid) {
            Ok(()) => {
                info!(pgid, "Killed process group");
                true
            }
            Err(e) => {
                warn!(pgid, error = %e, "Group kill failed");
                false
            }
        }
    }

    fn force_stop(&self, package: Option<&str>) -> bool {
        let package = match PackageName::parse(package.unwrap_or_default()) {
            Ok(package) => package,
            Err(e) => {
                warn!(package = ?package, error = %e, "Rejected FORCE_STOP argument");
                return false;
            }
        };
        match self.control.stop_package(&package) {
            Ok(()) => {
                info!(package = %package, "Force-stopped package");
                true
            }
            Err(e) => {
                warn!(package = %package, error = %e, "Force-stop failed");
                false
            }
        }
    }
}
