//! Connection loop to the supervisor.
//!
//! The agent is the *client*: it connects once and then serves commands on
//! that single stream until it is told to stop, the supervisor hangs up, or
//! the stream fails. There is no reconnect.
//!
//! ```text
//! Connecting ──▶ Connected ──▶ Idle ◀──────────┐
//!                                │ readable    │ timeout / drained
//!                                ▼             │
//!                             Readable ────────┘
//!                                │ EOF / error / STOP_SELF / cancel
//!                                ▼
//!                             Closing ──▶ Terminated
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - I/O and codec errors end the loop with [`LoopExit::Failed`]

pub mod transport;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use taskd_protocol::{CodecError, Command, LineCodec, Reply};
use thiserror::Error;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::dispatch::{DispatchOutcome, Dispatcher};

pub use transport::{Endpoint, Transport, DEFAULT_ABSTRACT_NAME};

// ============================================================================
// Constants
// ============================================================================

/// Default bound on each readiness wait; the loop re-checks cancellation
/// at least this often.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Read buffer size for each `try_read`.
const READ_CHUNK_SIZE: usize = 4096;

// ============================================================================
// Errors
// ============================================================================

/// Errors that end (or prevent) a supervisor connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("invalid endpoint {0:?} (expected abstract:NAME, unix:PATH or tcp:HOST:PORT)")]
    InvalidEndpoint(String),

    #[error("failed to connect to {endpoint}: {source}")]
    Connect { endpoint: String, source: io::Error },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("peer accepted zero bytes")]
    WriteZero,

    #[error("Protocol error: {0}")]
    Codec(#[from] CodecError),

    #[error("dispatch task failed: {0}")]
    Dispatch(String),

    #[error("cancelled while sending")]
    Cancelled,
}

/// Why the loop ended.
#[derive(Debug)]
pub enum LoopExit {
    /// Cancellation token fired (signal or external shutdown)
    Cancelled,
    /// Supervisor sent `STOP_SELF` or `BUSY`
    StopRequested,
    /// Supervisor closed the stream
    PeerClosed,
    /// Unrecoverable read, write or framing error
    Failed(ConnectionError),
}

/// Bytes drained after one readiness event.
struct ReadBatch {
    lines: Vec<String>,
    peer_closed: bool,
}

enum Flow {
    Continue,
    Stop,
}

// ============================================================================
// Agent Connection
// ============================================================================

/// Owns the stream, the receive buffer and the stop token.
pub struct AgentConnection {
    transport: Box<dyn Transport>,
    codec: LineCodec,
    dispatcher: Arc<Dispatcher>,
    cancel: CancellationToken,
    poll_timeout: Duration,
}

impl AgentConnection {
    pub fn new(
        transport: Box<dyn Transport>,
        dispatcher: Arc<Dispatcher>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            codec: LineCodec::new(),
            dispatcher,
            cancel,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    /// Serves commands until the loop terminates. Drops the stream on return.
    pub async fn run(mut self) -> LoopExit {
        info!("Serving supervisor commands");

        let exit = loop {
            let ready = tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break LoopExit::Cancelled,

                ready = timeout(self.poll_timeout, self.transport.readable()) => ready,
            };

            match ready {
                Err(_) => {
                    trace!("Idle");
                    continue;
                }
                Ok(Err(e)) => break LoopExit::Failed(ConnectionError::Io(e.to_string())),
                Ok(Ok(())) => {}
            }

            let batch = match self.drain() {
                Ok(batch) => batch,
                Err(e) => break LoopExit::Failed(e),
            };

            match self.handle_lines(batch.lines).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => {
                    self.cancel.cancel();
                    break LoopExit::StopRequested;
                }
                Err(e) => break LoopExit::Failed(e),
            }

            if batch.peer_closed {
                break LoopExit::PeerClosed;
            }
        };

        match &exit {
            LoopExit::Cancelled => info!("Connection loop cancelled"),
            LoopExit::StopRequested => info!("Stopping on supervisor request"),
            LoopExit::PeerClosed => info!("Supervisor closed the connection"),
            LoopExit::Failed(e) => error!(error = %e, "Connection failed"),
        }
        exit
    }

    /// Reads until the socket would block, framing everything received.
    fn drain(&mut self) -> Result<ReadBatch, ConnectionError> {
        let mut buf = [0u8; READ_CHUNK_SIZE];
        let mut lines = Vec::new();

        loop {
            match self.transport.try_read(&mut buf) {
                Ok(0) => {
                    return Ok(ReadBatch {
                        lines,
                        peer_closed: true,
                    })
                }
                Ok(n) => {
                    let chunk = buf.get(..n).unwrap_or_default();
                    trace!(bytes = n, "Received chunk");
                    lines.extend(self.codec.feed(chunk)?);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(ReadBatch {
                        lines,
                        peer_closed: false,
                    })
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ConnectionError::Io(e.to_string())),
            }
        }
    }

    /// Dispatches framed commands in order.
    async fn handle_lines(&mut self, lines: Vec<String>) -> Result<Flow, ConnectionError> {
        let mut lines = lines.into_iter();

        while let Some(line) = lines.next() {
            debug!(command = %line, "Received command");
            let command = Command::parse(&line);

            let dispatcher = Arc::clone(&self.dispatcher);
            let outcome = tokio::task::spawn_blocking(move || dispatcher.dispatch(&command))
                .await
                .map_err(|e| ConnectionError::Dispatch(e.to_string()))?;

            match outcome {
                DispatchOutcome::Reply(reply) => self.send(&reply).await?,
                DispatchOutcome::Silent => {}
                DispatchOutcome::Stop => {
                    let discarded = lines.len();
                    if discarded > 0 {
                        warn!(discarded, "Discarding commands received after stop");
                    }
                    return Ok(Flow::Stop);
                }
            }
        }

        Ok(Flow::Continue)
    }

    /// Writes one reply line, looping over partial writes.
    async fn send(&self, reply: &Reply) -> Result<(), ConnectionError> {
        let bytes = LineCodec::encode(reply)?;
        let mut remaining = bytes.as_slice();

        while !remaining.is_empty() {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => return Err(ConnectionError::Cancelled),

                ready = self.transport.writable() => {
                    ready.map_err(|e| ConnectionError::Io(e.to_string()))?;
                }
            }

            match self.transport.try_write(remaining) {
                Ok(0) => return Err(ConnectionError::WriteZero),
                Ok(n) => remaining = remaining.get(n..).unwrap_or_default(),
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(ConnectionError::Io(e.to_string())),
            }
        }

        trace!(kind = reply.kind(), bytes = bytes.len(), "Sent reply");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::SystemControl;
    use crate::snapshot::SnapshotReader;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixStream;

    fn dispatcher() -> Arc<Dispatcher> {
        let dir = std::env::temp_dir().join("taskd-connection-unit-absent");
        Arc::new(Dispatcher::new(
            Arc::new(SnapshotReader::new(&dir, &dir)),
            SystemControl::new(Vec::new()),
        ))
    }

    #[tokio::test]
    async fn test_ping_then_peer_close() {
        let (agent_side, mut supervisor) = UnixStream::pair().unwrap();
        let conn = AgentConnection::new(Box::new(agent_side), dispatcher(), CancellationToken::new());
        let task = tokio::spawn(conn.run());

        supervisor.write_all(b"PING\n").await.unwrap();
        let mut buf = [0u8; 5];
        supervisor.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"PONG\n");

        drop(supervisor);
        assert!(matches!(task.await.unwrap(), LoopExit::PeerClosed));
    }

    #[tokio::test]
    async fn test_cancel_stops_idle_loop() {
        let (agent_side, _supervisor) = UnixStream::pair().unwrap();
        let cancel = CancellationToken::new();
        let conn = AgentConnection::new(Box::new(agent_side), dispatcher(), cancel.clone())
            .with_poll_timeout(Duration::from_millis(20));
        let task = tokio::spawn(conn.run());

        tokio::time::sleep(Duration::from_millis(60)).await;
        cancel.cancel();
        assert!(matches!(task.await.unwrap(), LoopExit::Cancelled));
    }

    #[tokio::test]
    async fn test_stop_self_cancels_token() {
        let (agent_side, mut supervisor) = UnixStream::pair().unwrap();
        let cancel = CancellationToken::new();
        let conn = AgentConnection::new(Box::new(agent_side), dispatcher(), cancel.clone());
        let task = tokio::spawn(conn.run());

        supervisor.write_all(b"STOP_SELF\nPING\n").await.unwrap();
        assert!(matches!(task.await.unwrap(), LoopExit::StopRequested));
        assert!(cancel.is_cancelled());

        // The PING after STOP_SELF was discarded and the stream dropped.
        let mut rest = Vec::new();
        supervisor.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }
}
