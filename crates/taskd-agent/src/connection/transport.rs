//! Byte-stream transports and supervisor endpoints.
//!
//! The loop only needs readiness plus non-blocking reads and writes, which
//! is exactly what tokio's socket types expose. Reading until `WouldBlock`
//! after each readiness event is what keeps the edge-triggered reactor
//! from missing data.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use tokio::net::{TcpStream, UnixStream};
use tracing::debug;

use super::ConnectionError;

/// Abstract socket name the supervisor listens on by default.
pub const DEFAULT_ABSTRACT_NAME: &str = "TaskmanagerD";

/// A connected duplex byte stream.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Waits until the stream may be readable.
    async fn readable(&self) -> io::Result<()>;

    /// Non-blocking read; `WouldBlock` once drained, `Ok(0)` at end of stream.
    fn try_read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Waits until the stream may be writable.
    async fn writable(&self) -> io::Result<()>;

    /// Non-blocking write of as much of `buf` as the socket accepts.
    fn try_write(&self, buf: &[u8]) -> io::Result<usize>;
}

#[async_trait]
impl Transport for UnixStream {
    async fn readable(&self) -> io::Result<()> {
        UnixStream::readable(self).await
    }

    fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
        UnixStream::try_read(self, buf)
    }

    async fn writable(&self) -> io::Result<()> {
        UnixStream::writable(self).await
    }

    fn try_write(&self, buf: &[u8]) -> io::Result<usize> {
        UnixStream::try_write(self, buf)
    }
}

#[async_trait]
impl Transport for TcpStream {
    async fn readable(&self) -> io::Result<()> {
        TcpStream::readable(self).await
    }

    fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
        TcpStream::try_read(self, buf)
    }

    async fn writable(&self) -> io::Result<()> {
        TcpStream::writable(self).await
    }

    fn try_write(&self, buf: &[u8]) -> io::Result<usize> {
        TcpStream::try_write(self, buf)
    }
}

// ============================================================================
// Endpoint
// ============================================================================

/// Where the supervisor listens.
///
/// Textual forms: `abstract:NAME`, `unix:/path`, a bare `/path`, and
/// `tcp:HOST:PORT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Linux abstract-namespace Unix socket
    Abstract(String),
    /// Filesystem Unix socket
    Path(PathBuf),
    /// TCP, normally loopback
    Tcp(SocketAddr),
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::Abstract(DEFAULT_ABSTRACT_NAME.to_string())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abstract(name) => write!(f, "abstract:{name}"),
            Self::Path(path) => write!(f, "unix:{}", path.display()),
            Self::Tcp(addr) => write!(f, "tcp:{addr}"),
        }
    }
}

impl FromStr for Endpoint {
    type Err = ConnectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConnectionError::InvalidEndpoint(s.to_string());

        if let Some(name) = s.strip_prefix("abstract:") {
            if name.is_empty() {
                return Err(invalid());
            }
            return Ok(Self::Abstract(name.to_string()));
        }
        if let Some(path) = s.strip_prefix("unix:") {
            if path.is_empty() {
                return Err(invalid());
            }
            return Ok(Self::Path(PathBuf::from(path)));
        }
        if let Some(addr) = s.strip_prefix("tcp:") {
            return addr.parse().map(Self::Tcp).map_err(|_| invalid());
        }
        if s.starts_with('/') {
            return Ok(Self::Path(PathBuf::from(s)));
        }
        Err(invalid())
    }
}

impl Endpoint {
    /// Connects to the supervisor.
    pub async fn connect(&self) -> Result<Box<dyn Transport>, ConnectionError> {
        let connect_error = |source: io::Error| ConnectionError::Connect {
            endpoint: self.to_string(),
            source,
        };

        let transport: Box<dyn Transport> = match self {
            Self::Abstract(name) => Box::new(connect_abstract(name).map_err(connect_error)?),
            Self::Path(path) => Box::new(UnixStream::connect(path).await.map_err(connect_error)?),
            Self::Tcp(addr) => {
                let stream = TcpStream::connect(addr).await.map_err(connect_error)?;
                // Replies are single short lines; don't hold them back.
                stream.set_nodelay(true).map_err(connect_error)?;
                Box::new(stream)
            }
        };

        debug!(endpoint = %self, "Transport connected");
        Ok(transport)
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn connect_abstract(name: &str) -> io::Result<UnixStream> {
    #[cfg(target_os = "android")]
    use std::os::android::net::SocketAddrExt;
    #[cfg(target_os = "linux")]
    use std::os::linux::net::SocketAddrExt;

    let addr = std::os::unix::net::SocketAddr::from_abstract_name(name.as_bytes())?;
    // Local connect completes immediately; no need to go through the reactor.
    let stream = std::os::unix::net::UnixStream::connect_addr(&addr)?;
    stream.set_nonblocking(true)?;
    UnixStream::from_std(stream)
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn connect_abstract(_name: &str) -> io::Result<UnixStream> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "abstract socket names require Linux or Android",
    ))
}
