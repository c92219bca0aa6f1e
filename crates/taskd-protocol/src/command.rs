//! Inbound command parsing.

use std::fmt;

use taskd_core::Pid;

/// A single decoded instruction line: `NAME` or `NAME:ARGUMENT`.
///
/// Only the first colon splits; the argument is passed through verbatim
/// (apart from trailing whitespace, which the codec already stripped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMessage {
    pub name: String,
    pub argument: Option<String>,
}

impl CommandMessage {
    /// Splits a framed line into name and optional argument.
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end();
        match line.split_once(':') {
            Some((name, argument)) => Self {
                name: name.to_string(),
                argument: Some(argument.to_string()),
            },
            None => Self {
                name: line.to_string(),
                argument: None,
            },
        }
    }

    /// Interprets the argument as a process or group ID.
    ///
    /// Anything that is not a strictly positive integer that fits a kernel
    /// pid (`0`, negatives, garbage, missing) is `None`, so a bad argument
    /// can never widen into "all processes" or "caller's group".
    pub fn pid_argument(&self) -> Option<Pid> {
        self.argument
            .as_deref()
            .map(str::trim)
            .and_then(|arg| arg.parse::<Pid>().ok())
            .filter(|pid| *pid != 0 && i32::try_from(*pid).is_ok())
    }
}

impl fmt::Display for CommandMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.argument {
            Some(arg) => write!(f, "{}:{}", self.name, arg),
            None => f.write_str(&self.name),
        }
    }
}

/// Typed view of a command understood by the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Liveness check
    Ping,

    /// Kill a single process
    Kill { pid: Option<Pid> },

    /// Kill a whole process group
    KillGroup { pgid: Option<Pid> },

    /// Stop an application package through the OS facility
    ForceStop { package: Option<String> },

    /// Stop the agent (`STOP_SELF` or `BUSY`)
    StopSelf,

    /// Full process list
    ListProcess,

    /// System-wide CPU usage
    CpuPing,

    /// Swap usage
    SwapPing,

    /// GPU load
    GpuPing,

    /// CPU temperature
    CpuTempPing,

    /// Lifetime CPU usage of one process
    PidCpuPing { pid: Option<Pid> },

    /// Anything else (logged, never answered)
    Unknown(String),
}

impl Command {
    /// Maps a decoded message onto a typed command.
    pub fn from_message(msg: &CommandMessage) -> Self {
        match msg.name.as_str() {
            "PING" => Self::Ping,
            "KILL" => Self::Kill {
                pid: msg.pid_argument(),
            },
            "KILL_GROUP" => Self::KillGroup {
                pgid: msg.pid_argument(),
            },
            "FORCE_STOP" => Self::ForceStop {
                package: msg.argument.clone(),
            },
            "STOP_SELF" | "BUSY" => Self::StopSelf,
            "LIST_PROCESS" => Self::ListProcess,
            "CPU_PING" => Self::CpuPing,
            "SWAP_PING" => Self::SwapPing,
            "GPU_PING" => Self::GpuPing,
            "CTEMP_PING" => Self::CpuTempPing,
            "PING_PID_CPU" => Self::PidCpuPing {
                pid: msg.pid_argument(),
            },
            _ => Self::Unknown(msg.to_string()),
        }
    }

    /// Parses a framed line directly.
    pub fn parse(line: &str) -> Self {
        Self::from_message(&CommandMessage::parse(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_name() {
        let msg = CommandMessage::parse("PING");
        assert_eq!(msg.name, "PING");
        assert_eq!(msg.argument, None);
    }

    #[test]
    fn test_parse_splits_on_first_colon_only() {
        let msg = CommandMessage::parse("FORCE_STOP:a:b");
        assert_eq!(msg.name, "FORCE_STOP");
        assert_eq!(msg.argument.as_deref(), Some("a:b"));
    }

    #[test]
    fn test_parse_strips_trailing_cr() {
        let msg = CommandMessage::parse("KILL:123\r");
        assert_eq!(msg.argument.as_deref(), Some("123"));
    }

    #[test]
    fn test_pid_argument_rejects_non_positive_and_garbage() {
        for line in ["KILL", "KILL:", "KILL:0", "KILL:-1", "KILL:abc", "KILL:12abc", "KILL:4294967295"] {
            assert_eq!(
                CommandMessage::parse(line).pid_argument(),
                None,
                "expected no pid for {line:?}"
            );
        }
        assert_eq!(CommandMessage::parse("KILL:1234").pid_argument(), Some(1234));
        assert_eq!(CommandMessage::parse("KILL: 77").pid_argument(), Some(77));
    }

    #[test]
    fn test_command_mapping() {
        assert_eq!(Command::parse("PING"), Command::Ping);
        assert_eq!(Command::parse("KILL:10"), Command::Kill { pid: Some(10) });
        assert_eq!(Command::parse("KILL_GROUP:0"), Command::KillGroup { pgid: None });
        assert_eq!(Command::parse("STOP_SELF"), Command::StopSelf);
        assert_eq!(Command::parse("BUSY"), Command::StopSelf);
        assert_eq!(Command::parse("LIST_PROCESS"), Command::ListProcess);
        assert_eq!(Command::parse("CPU_PING"), Command::CpuPing);
        assert_eq!(Command::parse("SWAP_PING"), Command::SwapPing);
        assert_eq!(Command::parse("GPU_PING"), Command::GpuPing);
        assert_eq!(Command::parse("CTEMP_PING"), Command::CpuTempPing);
        assert_eq!(
            Command::parse("PING_PID_CPU:99"),
            Command::PidCpuPing { pid: Some(99) }
        );
        assert_eq!(
            Command::parse("FORCE_STOP:com.example.app"),
            Command::ForceStop {
                package: Some("com.example.app".to_string())
            }
        );
    }

    #[test]
    fn test_unknown_command_keeps_raw_text() {
        assert_eq!(
            Command::parse("REBOOT:now"),
            Command::Unknown("REBOOT:now".to_string())
        );
        // Names are case-sensitive
        assert_eq!(Command::parse("ping"), Command::Unknown("ping".to_string()));
    }
}
