//! Transport trait for the Palette link.
//!
//! The [`Transport`] trait abstracts over the physical byte stream between
//! the Palette and the Easel. Implementations exist for serial ports (USB CDC
//! virtual COM ports), TCP sockets (serial-over-network bridges), and scripted
//! transports for testing.
//!
//! The link session operates on a `Transport` rather than directly on a
//! serial port, enabling both real hardware and deterministic unit testing
//! with `ScriptedTransport` from the `palette-test-harness` crate.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{Error, Result};

/// Asynchronous, ordered, full-duplex byte transport.
///
/// The required methods are the primitives every link needs: a
/// non-blocking "how much input is waiting" query, a bounded read, and an
/// ordered write. The provided methods build the packet-level operations
/// (`read_exact`, `send_line`) on top of them.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes to the peer.
    ///
    /// Implementations should not return until all bytes have been handed
    /// to the underlying transport (serial TX buffer, TCP socket, etc.).
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the peer into the provided buffer.
    ///
    /// Returns the number of bytes actually read. Will wait up to `timeout`
    /// for data to arrive; returns [`Error::Timeout`] if no data is received
    /// within the deadline.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Number of received bytes that can be read without waiting.
    ///
    /// Must never block.
    fn bytes_available(&mut self) -> Result<usize>;

    /// Close the transport connection.
    ///
    /// After calling `close()`, subsequent `send()` and `receive()` calls
    /// should return [`Error::NotConnected`].
    async fn close(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;

    /// Whether any unread input is waiting.
    fn has_input(&mut self) -> Result<bool> {
        Ok(self.bytes_available()? > 0)
    }

    /// Fill `buf` completely, waiting at most `timeout` in total.
    ///
    /// Returns [`Error::Timeout`] if nothing arrived before the deadline and
    /// [`Error::IncompletePacket`] if only part of `buf` was filled. In both
    /// cases the contents of `buf` are unspecified.
    async fn read_exact(&mut self, buf: &mut [u8], timeout: Duration) -> Result<()> {
        let expected = buf.len();
        let deadline = tokio::time::Instant::now() + timeout;
        let mut filled = 0;

        while filled < expected {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(short_read(expected, filled));
            }

            match self.receive(&mut buf[filled..], remaining).await {
                Ok(0) => return Err(Error::ConnectionLost),
                Ok(n) => filled += n,
                Err(Error::Timeout) => return Err(short_read(expected, filled)),
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    /// Send `text` followed by a single `\n`.
    async fn send_line(&mut self, text: &str) -> Result<()> {
        let mut line = Vec::with_capacity(text.len() + 1);
        line.extend_from_slice(text.as_bytes());
        line.push(b'\n');
        self.send(&line).await
    }
}

fn short_read(expected: usize, received: usize) -> Error {
    if received == 0 {
        Error::Timeout
    } else {
        Error::IncompletePacket { expected, received }
    }
}
