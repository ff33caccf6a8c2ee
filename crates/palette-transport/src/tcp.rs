//! TCP transport for the Palette link.
//!
//! This module provides [`TcpTransport`], which implements the [`Transport`]
//! trait over a TCP connection. Typical uses:
//! - Serial-over-network bridges (ser2net, ESP-Link) in front of a Palette
//! - A host patch and a device session running on different machines
//! - End-to-end tests over loopback
//!
//! TCP gives no "bytes waiting" query, so [`bytes_available`](Transport::bytes_available)
//! drains whatever the socket has ready into a look-ahead buffer without
//! waiting; [`receive`](Transport::receive) serves that buffer first.
//!
//! # Example
//!
//! ```no_run
//! use palette_transport::TcpTransport;
//! use palette_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> palette_core::Result<()> {
//! let mut transport = TcpTransport::connect("192.168.1.50:4000").await?;
//!
//! let mut reply = [0u8; 12];
//! transport.send(&[0u8; 12]).await?;
//! transport.read_exact(&mut reply, Duration::from_secs(1)).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use palette_core::error::{Error, Result};
use palette_core::transport::Transport;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Default connection timeout (5 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Size of one non-blocking read while filling the look-ahead buffer.
const LOOKAHEAD_CHUNK: usize = 512;

/// TCP transport for the Palette link.
///
/// The connection is established eagerly via [`connect`](TcpTransport::connect)
/// or [`connect_with_timeout`](TcpTransport::connect_with_timeout), or an
/// accepted stream is wrapped with [`from_stream`](TcpTransport::from_stream).
#[derive(Debug)]
pub struct TcpTransport {
    /// The underlying TCP stream, `None` after `close()` is called.
    stream: Option<TcpStream>,
    /// The address string for logging/debugging.
    addr: String,
    /// Bytes already pulled off the socket by `bytes_available()`.
    lookahead: BytesMut,
}

impl TcpTransport {
    /// Connect to a `host:port` endpoint using the default timeout.
    pub async fn connect(addr: &str) -> Result<Self> {
        Self::connect_with_timeout(addr, DEFAULT_CONNECT_TIMEOUT).await
    }

    /// Connect to a `host:port` endpoint with a specified timeout.
    pub async fn connect_with_timeout(addr: &str, timeout: Duration) -> Result<Self> {
        tracing::debug!(
            addr = %addr,
            timeout_ms = timeout.as_millis(),
            "Connecting to TCP endpoint"
        );

        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                tracing::error!(addr = %addr, "TCP connection timed out");
                Error::Timeout
            })?
            .map_err(|e| {
                tracing::error!(addr = %addr, error = %e, "TCP connection failed");
                map_connect_error(e, addr)
            })?;

        tracing::info!(addr = %addr, "TCP connection established");

        Ok(Self::from_stream(stream, addr.to_string()))
    }

    /// Wrap an existing `TcpStream` as a `TcpTransport`.
    ///
    /// This is how the device side of a link serves a host: accept on a
    /// listener and wrap the accepted stream.
    pub fn from_stream(stream: TcpStream, addr: String) -> Self {
        // Packets are small and latency-sensitive.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(
                addr = %addr,
                error = %e,
                "Failed to set TCP_NODELAY (continuing anyway)"
            );
        }

        Self {
            stream: Some(stream),
            addr,
            lookahead: BytesMut::new(),
        }
    }

    /// Get the address string this transport was connected to.
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        tracing::trace!(
            addr = %self.addr,
            bytes = data.len(),
            data = ?data,
            "Sending data"
        );

        stream.write_all(data).await.map_err(|e| {
            tracing::error!(
                addr = %self.addr,
                error = %e,
                "Failed to send data"
            );
            map_io_error(e)
        })?;

        stream.flush().await.map_err(|e| {
            tracing::error!(
                addr = %self.addr,
                error = %e,
                "Failed to flush TCP stream"
            );
            map_io_error(e)
        })?;

        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        if !self.lookahead.is_empty() {
            let n = self.lookahead.len().min(buf.len());
            buf[..n].copy_from_slice(&self.lookahead[..n]);
            self.lookahead.advance(n);
            return Ok(n);
        }

        tracing::trace!(
            addr = %self.addr,
            buf_len = buf.len(),
            timeout_ms = timeout.as_millis(),
            "Waiting for data"
        );

        match tokio::time::timeout(timeout, stream.read(buf)).await {
            Ok(Ok(0)) => {
                tracing::warn!(addr = %self.addr, "Peer closed connection (0 bytes read)");
                Err(Error::ConnectionLost)
            }
            Ok(Ok(n)) => {
                tracing::trace!(
                    addr = %self.addr,
                    bytes = n,
                    data = ?&buf[..n],
                    "Received data"
                );
                Ok(n)
            }
            Ok(Err(e)) => {
                tracing::error!(
                    addr = %self.addr,
                    error = %e,
                    "Failed to receive data"
                );
                Err(map_io_error(e))
            }
            Err(_) => {
                tracing::trace!(
                    addr = %self.addr,
                    timeout_ms = timeout.as_millis(),
                    "Timeout waiting for data"
                );
                Err(Error::Timeout)
            }
        }
    }

    fn bytes_available(&mut self) -> Result<usize> {
        let stream = self.stream.as_ref().ok_or(Error::NotConnected)?;

        let mut chunk = [0u8; LOOKAHEAD_CHUNK];
        loop {
            match stream.try_read(&mut chunk) {
                Ok(0) => {
                    if self.lookahead.is_empty() {
                        tracing::warn!(addr = %self.addr, "Peer closed connection");
                        return Err(Error::ConnectionLost);
                    }
                    break;
                }
                Ok(n) => self.lookahead.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(map_io_error(e)),
            }
        }

        Ok(self.lookahead.len())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            tracing::debug!(addr = %self.addr, "Closing TCP connection");

            if let Err(e) = stream.shutdown().await {
                tracing::warn!(
                    addr = %self.addr,
                    error = %e,
                    "Failed to shutdown TCP stream (continuing anyway)"
                );
            }

            tracing::info!(addr = %self.addr, "TCP connection closed");
        }
        self.lookahead.clear();

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if self.stream.is_some() {
            tracing::debug!(addr = %self.addr, "TcpTransport dropped, closing connection");
        }
    }
}

/// Map a connection-time I/O error to the appropriate [`Error`] variant.
fn map_connect_error(e: std::io::Error, addr: &str) -> Error {
    match e.kind() {
        std::io::ErrorKind::ConnectionRefused => {
            Error::Transport(format!("connection refused: {}", addr))
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
