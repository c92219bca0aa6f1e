//! Outbound reply lines.

use taskd_core::{ProcessRecord, Reading, SwapUsage};

use crate::codec::CodecError;
use crate::wire::encode_process_list;

/// A reply to one command. Formats without the trailing newline; see
/// [`LineCodec::encode`](crate::LineCodec::encode).
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// `PONG`
    Pong,

    /// `KILL_RESULT:true|false` (shared by KILL, KILL_GROUP and FORCE_STOP)
    KillResult(bool),

    /// `CPU:<0-100>`
    Cpu(u8),

    /// `SWAP:<used>:<total>` in bytes
    Swap(SwapUsage),

    /// `GPU:<int|unknown>`
    Gpu(Reading),

    /// `CTEMP:<int|unknown>`
    CpuTemp(Reading),

    /// `CPU_PID:<float>` with six decimals
    PidCpu(f32),

    /// Compact JSON array of process entries
    ProcessList(Vec<ProcessRecord>),
}

impl Reply {
    pub fn to_line(&self) -> Result<String, CodecError> {
        let line = match self {
            Self::Pong => "PONG".to_string(),
            Self::KillResult(ok) => format!("KILL_RESULT:{ok}"),
            Self::Cpu(usage) => format!("CPU:{usage}"),
            Self::Swap(swap) => format!("SWAP:{}:{}", swap.used_bytes, swap.total_bytes),
            Self::Gpu(reading) => format!("GPU:{reading}"),
            Self::CpuTemp(reading) => format!("CTEMP:{reading}"),
            Self::PidCpu(usage) => format!("CPU_PID:{usage:.6}"),
            Self::ProcessList(records) => encode_process_list(records)?,
        };
        Ok(line)
    }

    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Pong => "pong",
            Self::KillResult(_) => "kill_result",
            Self::Cpu(_) => "cpu",
            Self::Swap(_) => "swap",
            Self::Gpu(_) => "gpu",
            Self::CpuTemp(_) => "cpu_temp",
            Self::PidCpu(_) => "pid_cpu",
            Self::ProcessList(_) => "process_list",
        }
    }
}
