//! TCP transport for amplifier communication.
//!
//! Hegel amplifiers accept a single control connection on TCP port 50001.
//! [`TcpTransport`] splits the socket into independently locked read and write
//! halves so that the session's background listener can sit in
//! [`receive`](Transport::receive) while a foreground command writes.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use hegel_core::error::{Error, Result};
use hegel_core::transport::Transport;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// TCP port of the amplifier's remote control interface.
pub const DEFAULT_PORT: u16 = 50001;

/// Default dial timeout.
///
/// Amplifiers live on the local network; anything slower than this means the
/// address is wrong or the device is in standby with networking off.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// TCP transport to an amplifier.
#[derive(Debug)]
pub struct TcpTransport {
    reader: Mutex<Option<OwnedReadHalf>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
    /// Cancelled by `close()` to release a reader parked in `receive()`.
    closed: CancellationToken,
    connected: AtomicBool,
    /// The address string for logging.
    addr: String,
}

/// Turn a user-supplied host into a `host:port` dial string.
///
/// A bare IP address or hostname gets [`DEFAULT_PORT`]; an explicit port is
/// kept as given.
pub fn resolve_addr(host: &str) -> String {
    let host = host.trim();
    if let Ok(ip) = host.parse::<IpAddr>() {
        return SocketAddr::new(ip, DEFAULT_PORT).to_string();
    }
    if host.parse::<SocketAddr>().is_ok() {
        return host.to_string();
    }
    match host.rsplit_once(':') {
        Some((_, port)) if port.parse::<u16>().is_ok() => host.to_string(),
        _ => format!("{host}:{DEFAULT_PORT}"),
    }
}

impl TcpTransport {
    /// Connect to an amplifier using the default timeout.
    ///
    /// `host` may be a bare address (`"192.168.1.40"`), in which case port
    /// 50001 is used, or a `host:port` pair.
    pub async fn connect(host: &str) -> Result<Self> {
        Self::connect_with_timeout(host, DEFAULT_CONNECT_TIMEOUT).await
    }

    /// Connect to an amplifier with a specified dial timeout.
    pub async fn connect_with_timeout(host: &str, timeout: Duration) -> Result<Self> {
        let addr = resolve_addr(host);
        tracing::debug!(
            addr = %addr,
            timeout_ms = timeout.as_millis(),
            "Connecting to amplifier"
        );

        let stream = tokio::time::timeout(timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| {
                tracing::error!(addr = %addr, "TCP connection timed out");
                Error::Timeout
            })?
            .map_err(|e| {
                tracing::error!(addr = %addr, error = %e, "TCP connection failed");
                map_connect_error(e, &addr)
            })?;

        // Frames are a handful of bytes; do not let Nagle hold them back.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(
                addr = %addr,
                error = %e,
                "Failed to set TCP_NODELAY (continuing anyway)"
            );
        }

        tracing::info!(addr = %addr, "TCP connection established");
        Ok(Self::from_stream(stream, addr))
    }

    /// Wrap an already connected `TcpStream`.
    pub fn from_stream(stream: TcpStream, addr: String) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: Mutex::new(Some(reader)),
            writer: Mutex::new(Some(writer)),
            closed: CancellationToken::new(),
            connected: AtomicBool::new(true),
            addr,
        }
    }

    /// Get the address this transport was connected to.
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&self, data: &[u8]) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(Error::NotConnected)?;

        tracing::trace!(addr = %self.addr, data = ?data, "Sending frame");

        writer.write_all(data).await.map_err(|e| {
            tracing::error!(addr = %self.addr, error = %e, "Failed to send data");
            map_io_error(e)
        })?;
        writer.flush().await.map_err(|e| {
            tracing::error!(addr = %self.addr, error = %e, "Failed to flush TCP stream");
            map_io_error(e)
        })?;

        Ok(())
    }

    async fn receive(&self, buf: &mut [u8]) -> Result<usize> {
        if self.closed.is_cancelled() {
            return Err(Error::NotConnected);
        }

        let mut guard = self.reader.lock().await;
        let reader = guard.as_mut().ok_or(Error::NotConnected)?;

        let n = tokio::select! {
            biased;
            _ = self.closed.cancelled() => return Err(Error::NotConnected),
            result = reader.read(buf) => result.map_err(|e| {
                tracing::error!(addr = %self.addr, error = %e, "Failed to receive data");
                map_io_error(e)
            })?,
        };

        if n == 0 {
            tracing::warn!(addr = %self.addr, "Peer closed connection (0 bytes read)");
            self.connected.store(false, Ordering::SeqCst);
            return Err(Error::ConnectionLost);
        }

        tracing::trace!(addr = %self.addr, data = ?&buf[..n], "Received data");
        Ok(n)
    }

    async fn close(&self) -> Result<()> {
        if self.closed.is_cancelled() {
            return Ok(());
        }
        self.closed.cancel();
        self.connected.store(false, Ordering::SeqCst);

        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                tracing::warn!(
                    addr = %self.addr,
                    error = %e,
                    "Failed to shutdown TCP stream (continuing anyway)"
                );
            }
        }
        // The cancelled token has released any parked reader by now.
        self.reader.lock().await.take();

        tracing::info!(addr = %self.addr, "TCP connection closed");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Map a connection-time I/O error to the appropriate [`Error`] variant.
fn map_connect_error(e: std::io::Error, addr: &str) -> Error {
    match e.kind() {
        std::io::ErrorKind::ConnectionRefused => {
            Error::Transport(format!("connection refused: {addr}"))
        }
        _ => Error::Io(e),
    }
}

/// Map a data-path I/O error to the appropriate [`Error`] variant.
fn map_io_error(e: std::io::Error) -> Error {
    match e.kind() {
        std::io::ErrorKind::ConnectionReset
        | std::io::ErrorKind::BrokenPipe
        | std::io::ErrorKind::NotConnected
        | std::io::ErrorKind::ConnectionAborted => Error::ConnectionLost,
        _ => Error::Io(e),
    }
}
