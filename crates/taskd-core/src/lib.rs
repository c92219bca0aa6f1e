//! taskd Core - Shared types for the process telemetry agent
//!
//! This crate provides the domain types shared between the wire
//! protocol (taskd-protocol) and the agent (taskd-agent).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod policy;
pub mod process;
pub mod reading;
pub mod sample;

// Re-exports for convenience
pub use error::{SnapshotError, SnapshotResult};
pub use policy::{ForegroundPolicy, OomScoreThreshold, DEFAULT_FOREGROUND_THRESHOLD};
pub use process::{Pid, ProcessRecord};
pub use reading::{Reading, SwapUsage};
pub use sample::{elapsed_seconds, lifetime_cpu_percent, uptime_ticks, CpuSample};
