//! # Network primitives: endpoint and connector.
//!
//! - [`Endpoint`] identifies the remote peer.
//! - [`Connector`] opens a byte stream to an endpoint. The worker applies the
//!   connect timeout around it, so implementations need not.
//! - [`TcpConnector`] is the production connector (`tokio::net::TcpStream`).
//!
//! Workers only need `AsyncRead + AsyncWrite`, so the stream is boxed as
//! [`BoxStream`]. Tests plug in `tokio::io::duplex` pipes.

use std::fmt;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Remote peer `(host, port)`, immutable for the supervisor's lifetime.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: Arc<str>,
    port: u16,
}

impl Endpoint {
    /// Creates an endpoint from a host name (or address literal) and port.
    pub fn new(host: impl Into<Arc<str>>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host name or address literal.
    #[inline]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    #[inline]
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Bidirectional byte stream a worker can own.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> AsyncStream for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// Boxed connection stream.
pub type BoxStream = Box<dyn AsyncStream>;

/// Opens connections to an [`Endpoint`].
///
/// ### Implementation requirements
/// - Be cancel-safe: the worker drops the future on abort or connect timeout.
/// - Return a fresh stream per call; the caller owns it exclusively.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Connects to `endpoint`.
    async fn connect(&self, endpoint: &Endpoint) -> io::Result<BoxStream>;
}

/// Plain TCP connector with `TCP_NODELAY` set.
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, endpoint: &Endpoint) -> io::Result<BoxStream> {
        let stream = TcpStream::connect((endpoint.host(), endpoint.port())).await?;
        stream.set_nodelay(true)?;
        Ok(Box::new(stream))
    }
}
