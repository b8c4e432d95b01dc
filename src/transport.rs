//! Connection management for the delivery socket.
//!
//! [`ConnectionManager`] owns the single outbound connection for one
//! output instance. The connection is created lazily on the first send,
//! cached across records, and discarded on `reset` without a graceful
//! close; the next send re-establishes it. When TLS is enabled the
//! manager always targets the fixed ingestion endpoint rather than the
//! configured host and port, matching the deployed behaviour of the
//! plugin this one replaces.

use std::{
    io::{self, Write},
    net::{SocketAddr, TcpStream, ToSocketAddrs},
    time::Duration,
};

use native_tls::{TlsConnector, TlsStream};

use crate::config::OutputConfig;

/// Fixed endpoint used for all TLS connections.
pub const TLS_ENDPOINT_HOST: &str = "api.logentries.com";
/// Fixed port used for all TLS connections.
pub const TLS_ENDPOINT_PORT: u16 = 20000;
/// Default timeout applied when establishing connections.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Whether an I/O error is a retryable connection failure.
///
/// Only refused and timed-out connections qualify; everything else is
/// fatal to the batch.
pub fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionRefused | io::ErrorKind::TimedOut
    )
}

/// Destination for formatted log lines.
///
/// Seams the retry machinery off from real sockets; tests substitute a
/// scripted implementation to observe attempts and resets.
pub trait LineSink {
    /// Write one line, appending the terminator, connecting first if needed.
    fn send_line(&mut self, line: &str) -> io::Result<()>;
    /// Discard any cached connection so the next send starts fresh.
    fn reset(&mut self);
}

/// An established connection, plain or TLS-wrapped.
pub enum ActiveConnection {
    PlainTcp(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl ActiveConnection {
    /// Write `line` plus a newline terminator and flush the socket.
    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        match self {
            ActiveConnection::PlainTcp(stream) => write_terminated(stream, line),
            ActiveConnection::Tls(stream) => write_terminated(stream.as_mut(), line),
        }
    }
}

fn write_terminated<W: Write>(writer: &mut W, line: &str) -> io::Result<()> {
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()
}

/// Owns the lazily-created outbound connection for one output instance.
pub struct ConnectionManager {
    host: String,
    port: u16,
    use_ssl: bool,
    connect_timeout: Duration,
    connection: Option<ActiveConnection>,
}

impl ConnectionManager {
    /// Build a manager targeting the endpoint described by `config`.
    pub fn from_config(config: &OutputConfig) -> Self {
        Self::new(config.host.clone(), config.port, config.use_ssl)
    }

    /// Build a manager from endpoint settings.
    pub fn new(host: String, port: u16, use_ssl: bool) -> Self {
        Self {
            host,
            port,
            use_ssl,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            connection: None,
        }
    }

    /// Override the connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Whether a connection is currently cached.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Return the cached connection, establishing one if absent.
    pub fn connection(&mut self) -> io::Result<&mut ActiveConnection> {
        let conn = match self.connection.take() {
            Some(conn) => conn,
            None => self.establish()?,
        };
        Ok(self.connection.insert(conn))
    }

    fn establish(&self) -> io::Result<ActiveConnection> {
        if self.use_ssl {
            let stream = connect_tcp(TLS_ENDPOINT_HOST, TLS_ENDPOINT_PORT, self.connect_timeout)?;
            let connector = TlsConnector::new().map_err(io::Error::other)?;
            let stream = connector
                .connect(TLS_ENDPOINT_HOST, stream)
                .map_err(io::Error::other)?;
            Ok(ActiveConnection::Tls(Box::new(stream)))
        } else {
            let stream = connect_tcp(&self.host, self.port, self.connect_timeout)?;
            Ok(ActiveConnection::PlainTcp(stream))
        }
    }
}

impl LineSink for ConnectionManager {
    fn send_line(&mut self, line: &str) -> io::Result<()> {
        self.connection()?.write_line(line)
    }

    fn reset(&mut self) {
        self.connection = None;
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("use_ssl", &self.use_ssl)
            .field("connected", &self.connection.is_some())
            .finish()
    }
}

fn connect_tcp(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::TimedOut,
            format!("unable to connect to {host}:{port}"),
        )
    }))
}
