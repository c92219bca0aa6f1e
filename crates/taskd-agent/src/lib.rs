//! taskd Agent - Process and system telemetry agent
//!
//! This crate provides everything the `taskd` binary runs:
//! - `snapshot` - Reads process and system metrics from procfs/sysfs
//! - `registry` - Enumerates live processes into a process list
//! - `dispatch` - Maps protocol commands to reads and process actions
//! - `connection` - Serves one supervisor connection until stopped
//! - `config` - TOML configuration with environment/flag overrides
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         taskd agent                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  supervisor ◀──── socket ────▶ ┌─────────────────┐           │
//! │                                │ AgentConnection │           │
//! │                                │  (LineCodec)    │           │
//! │                                └────────┬────────┘           │
//! │                                         │ spawn_blocking     │
//! │                                         ▼                    │
//! │  ┌─────────────────┐           ┌─────────────────┐           │
//! │  │ ProcessControl  │◀──────────│   Dispatcher    │           │
//! │  │ (kill, am stop) │           └────────┬────────┘           │
//! │  └─────────────────┘                    │                    │
//! │                          ┌──────────────┴─────────────┐      │
//! │                          ▼                            ▼      │
//! │                 ┌─────────────────┐         ┌───────────────┐│
//! │                 │ ProcessRegistry │────────▶│SnapshotReader ││
//! │                 └─────────────────┘         │ (/proc, /sys) ││
//! │                                             └───────────────┘│
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - OS reads fail soft to zero/empty values

pub mod config;
pub mod connection;
pub mod dispatch;
pub mod registry;
pub mod snapshot;

pub use config::{AgentConfig, ConfigError, ENDPOINT_ENV};
pub use connection::{AgentConnection, ConnectionError, Endpoint, LoopExit, Transport};
pub use dispatch::{DispatchOutcome, Dispatcher, ProcessControl, SystemControl};
pub use registry::ProcessRegistry;
pub use snapshot::SnapshotReader;
