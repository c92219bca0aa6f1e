//! taskd - Process and system telemetry agent
//!
//! Connects to a supervisor over a local socket and answers its commands
//! until told to stop, the supervisor hangs up, or a signal arrives.
//!
//! # Usage
//!
//! ```bash
//! # Connect to the default abstract socket (@TaskmanagerD)
//! taskd
//!
//! # Use a filesystem socket or loopback TCP
//! taskd --endpoint unix:/run/taskd/supervisor.sock
//! TASKD_ENDPOINT=tcp:127.0.0.1:7878 taskd
//!
//! # Load settings from a file and detach
//! taskd --config /etc/taskd.toml --daemon
//!
//! # Enable debug logging
//! RUST_LOG=taskd_agent=debug taskd
//! ```
//!
//! # Exit Codes
//!
//! - 0: the connection loop ran and ended (for any reason)
//! - 1: startup failed (configuration, connect, signal setup)
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: stop at the next loop boundary

use std::env;
use std::ffi::CStr;
use std::fs::{self, File};
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use taskd_agent::{AgentConfig, AgentConnection, ENDPOINT_ENV};

/// taskd - process and system telemetry agent
#[derive(Parser, Debug)]
#[command(name = "taskd", version, about)]
struct Args {
    /// Supervisor endpoint (abstract:NAME, unix:PATH or tcp:HOST:PORT)
    #[arg(short, long)]
    endpoint: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run as a background daemon (fork to background)
    #[arg(short = 'd', long)]
    daemon: bool,
}

/// Returns the path to the log file used when daemonized.
fn log_file_path() -> PathBuf {
    dirs::state_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("taskd")
        .join("taskd.log")
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("taskd: {e:#}");
        process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => AgentConfig::load(path)?,
        None => AgentConfig::default(),
    }
    .with_overrides(env::var(ENDPOINT_ENV).ok(), args.endpoint.clone())?;

    if args.daemon {
        // Daemonize before starting tokio runtime
        daemonize()?;
    }

    run_agent(config)
}

/// Daemonizes the current process.
fn daemonize() -> Result<()> {
    use daemonize::Daemonize;

    let log_path = log_file_path();

    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).context("Failed to create log directory")?;
    }

    let stdout = File::create(&log_path).context("Failed to create log file for stdout")?;
    let stderr = stdout
        .try_clone()
        .context("Failed to create log file for stderr")?;

    Daemonize::new()
        .working_directory("/")
        .stdout(stdout)
        .stderr(stderr)
        .start()
        .context("Failed to daemonize")?;

    Ok(())
}

/// `RUST_LOG` when set, otherwise `info` for taskd's own crates.
fn log_filter(rust_log: Option<&str>) -> Result<EnvFilter> {
    let Some(spec) = rust_log else {
        return Ok(EnvFilter::default()
            .add_directive("taskd=info".parse()?)
            .add_directive("taskd_agent=info".parse()?)
            .add_directive("taskd_protocol=info".parse()?));
    };
    Ok(EnvFilter::new(spec))
}

/// Login name for `uid`, or `unknown` without a passwd entry.
fn user_name(uid: libc::uid_t) -> String {
    // SAFETY: getpwuid returns null or a pointer into static storage that
    // stays valid until the next passwd lookup; the name is copied out
    // before returning and nothing else in taskd reads the passwd database.
    unsafe {
        let pwd = libc::getpwuid(uid);
        if pwd.is_null() || (*pwd).pw_name.is_null() {
            return "unknown".to_string();
        }
        CStr::from_ptr((*pwd).pw_name).to_string_lossy().into_owned()
    }
}

/// Runs the agent (async entry point).
#[tokio::main]
async fn run_agent(config: AgentConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(env::var(EnvFilter::DEFAULT_ENV).ok().as_deref())?)
        .init();

    let endpoint = config.endpoint()?;

    // SAFETY: getuid(2) cannot fail and has no preconditions.
    let uid = unsafe { libc::getuid() };
    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        uid,
        user = %user_name(uid),
        endpoint = %endpoint,
        "taskd starting"
    );

    let cancel_token = CancellationToken::new();

    let mut shutdown = ShutdownSignals::install().context("Failed to install signal handlers")?;
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        shutdown.recv().await;
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let transport = endpoint.connect().await.map_err(|e| {
        error!(error = %e, "Unable to reach supervisor");
        e
    })?;
    info!(endpoint = %endpoint, "Connected to supervisor");

    let exit = AgentConnection::new(transport, config.dispatcher(), cancel_token)
        .with_poll_timeout(config.poll_timeout())
        .run()
        .await;

    info!(reason = ?exit, "taskd stopped");
    Ok(())
}

/// SIGTERM and SIGINT listeners, registered up front so setup failures are
/// startup failures.
struct ShutdownSignals {
    sigterm: tokio::signal::unix::Signal,
    sigint: tokio::signal::unix::Signal,
}

impl ShutdownSignals {
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            sigterm: signal(SignalKind::terminate())?,
            sigint: signal(SignalKind::interrupt())?,
        })
    }

    async fn recv(&mut self) {
        tokio::select! {
            _ = self.sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = self.sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_log_replaces_default_directives() {
        let filter = log_filter(Some("taskd_agent=debug")).unwrap().to_string();
        assert!(filter.contains("taskd_agent=debug"), "{filter}");
        assert!(!filter.contains("taskd_agent=info"), "{filter}");
    }

    #[test]
    fn test_default_directives_without_rust_log() {
        let filter = log_filter(None).unwrap().to_string();
        assert!(filter.contains("taskd=info"), "{filter}");
        assert!(filter.contains("taskd_agent=info"), "{filter}");
        assert!(filter.contains("taskd_protocol=info"), "{filter}");
    }

    #[test]
    fn test_user_name_lookup() {
        assert!(!user_name(0).is_empty());
        assert_eq!(user_name(3_999_999_999), "unknown");
    }
}
