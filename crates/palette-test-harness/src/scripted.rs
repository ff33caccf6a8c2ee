//! Scripted transport for deterministic testing of the link session.
//!
//! [`ScriptedTransport`] implements the [`Transport`] trait over an in-memory
//! inbound queue. Tests push bytes the peer "sent", run the code under test,
//! and then inspect what was written. Because the session takes ownership of
//! its transport, inspection goes through a cloneable [`ScriptHandle`] that
//! shares state with the transport.
//!
//! # Example
//!
//! ```
//! use palette_test_harness::ScriptedTransport;
//!
//! let (transport, handle) = ScriptedTransport::new();
//! // Bytes the peer sends; they become visible to bytes_available()/receive().
//! handle.push_inbound(&[0x12, 0x34, 0x56]);
//! // Bytes delivered in response to the next send().
//! handle.queue_reply(b"ok");
//! # drop(transport);
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use palette_core::error::{Error, Result};
use palette_core::transport::Transport;

#[derive(Debug)]
struct ScriptState {
    /// Bytes waiting to be received.
    inbound: VecDeque<u8>,
    /// Replies released into `inbound`, one per `send()` call.
    replies: VecDeque<Vec<u8>>,
    /// Log of every `send()` call.
    sent_log: Vec<Vec<u8>>,
    /// Largest chunk a single `receive()` call returns.
    max_chunk: usize,
    /// Bytes left to deliver before one `receive()` times out.
    stall_after: Option<usize>,
    connected: bool,
}

/// A [`Transport`] driven by a script instead of hardware.
///
/// `receive()` never waits: if nothing is queued it returns
/// [`Error::Timeout`] immediately, which keeps session tests free of real
/// sleeps.
#[derive(Debug)]
pub struct ScriptedTransport {
    state: Arc<Mutex<ScriptState>>,
}

/// Shared view of a [`ScriptedTransport`] for feeding and inspecting it.
#[derive(Debug, Clone)]
pub struct ScriptHandle {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedTransport {
    /// Create a connected transport with an empty script.
    pub fn new() -> (Self, ScriptHandle) {
        let state = Arc::new(Mutex::new(ScriptState {
            inbound: VecDeque::new(),
            replies: VecDeque::new(),
            sent_log: Vec::new(),
            max_chunk: usize::MAX,
            stall_after: None,
            connected: true,
        }));
        (
            ScriptedTransport {
                state: Arc::clone(&state),
            },
            ScriptHandle { state },
        )
    }

    fn state(&self) -> MutexGuard<'_, ScriptState> {
        lock(&self.state)
    }
}

impl ScriptHandle {
    /// Make `data` available to the reader.
    pub fn push_inbound(&self, data: &[u8]) {
        lock(&self.state).inbound.extend(data.iter().copied());
    }

    /// Release `data` into the inbound queue after the next unanswered
    /// `send()`. Replies are consumed in order.
    pub fn queue_reply(&self, data: &[u8]) {
        lock(&self.state).replies.push_back(data.to_vec());
    }

    /// Limit how many bytes one `receive()` call may return, to exercise
    /// reassembly of fragmented reads.
    pub fn set_max_chunk(&self, max_chunk: usize) {
        lock(&self.state).max_chunk = max_chunk.max(1);
    }

    /// After `bytes` more bytes have been received, make the next
    /// `receive()` time out once even if input is queued.
    ///
    /// Models a peer whose packet is split by a delay longer than the
    /// reader's timeout.
    pub fn stall_after(&self, bytes: usize) {
        lock(&self.state).stall_after = Some(bytes);
    }

    /// Bytes queued but not yet received.
    pub fn inbound_len(&self) -> usize {
        lock(&self.state).inbound.len()
    }

    /// Every `send()` call so far, one element per call.
    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        lock(&self.state).sent_log.clone()
    }

    /// Everything sent so far, concatenated.
    pub fn sent_bytes(&self) -> Vec<u8> {
        lock(&self.state).sent_log.concat()
    }

    /// Forget the send log.
    pub fn clear_sent(&self) {
        lock(&self.state).sent_log.clear();
    }

    /// Set the connected state.
    ///
    /// When set to `false`, subsequent `send()`, `receive()`, and
    /// `bytes_available()` calls return [`Error::NotConnected`].
    pub fn set_connected(&self, connected: bool) {
        lock(&self.state).connected = connected;
    }
}

fn lock(state: &Mutex<ScriptState>) -> MutexGuard<'_, ScriptState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.state();
        if !state.connected {
            return Err(Error::NotConnected);
        }

        state.sent_log.push(data.to_vec());
        if let Some(reply) = state.replies.pop_front() {
            state.inbound.extend(reply);
        }
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        let mut state = self.state();
        if !state.connected {
            return Err(Error::NotConnected);
        }
        if state.stall_after == Some(0) {
            state.stall_after = None;
            return Err(Error::Timeout);
        }
        if state.inbound.is_empty() {
            return Err(Error::Timeout);
        }

        let mut n = state.inbound.len().min(buf.len()).min(state.max_chunk);
        if let Some(left) = state.stall_after.as_mut() {
            n = n.min(*left);
            *left -= n;
        }
        for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn bytes_available(&mut self) -> Result<usize> {
        let state = self.state();
        if !state.connected {
            return Err(Error::NotConnected);
        }
        Ok(state.inbound.len())
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = self.state();
        state.connected = false;
        state.inbound.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state().connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pushed_bytes_are_received() {
        let (mut transport, handle) = ScriptedTransport::new();
        handle.push_inbound(&[1, 2, 3]);
        assert_eq!(transport.bytes_available().unwrap(), 3);

        let mut buf = [0u8; 8];
        let n = transport
            .receive(&mut buf, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(&buf[..n], &[1, 2, 3]);
        assert_eq!(handle.inbound_len(), 0);
    }

    #[tokio::test]
    async fn empty_receive_times_out() {
        let (mut transport, _handle) = ScriptedTransport::new();
        let mut buf = [0u8; 4];
        let result = transport.receive(&mut buf, Duration::from_millis(10)).await;
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn sends_are_logged_per_call() {
        let (mut transport, handle) = ScriptedTransport::new();
        transport.send(&[0x01, 0x02]).await.unwrap();
        transport.send_line("hi").await.unwrap();

        assert_eq!(handle.sent_data(), vec![vec![0x01, 0x02], b"hi\n".to_vec()]);
        assert_eq!(handle.sent_bytes(), vec![0x01, 0x02, b'h', b'i', b'\n']);

        handle.clear_sent();
        assert!(handle.sent_data().is_empty());
    }

    #[tokio::test]
    async fn replies_follow_sends_in_order() {
        let (mut transport, handle) = ScriptedTransport::new();
        handle.queue_reply(&[0xAA]);
        handle.queue_reply(&[0xBB, 0xCC]);
        assert_eq!(transport.bytes_available().unwrap(), 0);

        transport.send(&[0x01]).await.unwrap();
        assert_eq!(transport.bytes_available().unwrap(), 1);

        transport.send(&[0x02]).await.unwrap();
        let mut buf = [0u8; 3];
        transport
            .read_exact(&mut buf, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(buf, [0xAA, 0xBB, 0xCC]);

        // No replies left: sends no longer produce input.
        transport.send(&[0x03]).await.unwrap();
        assert_eq!(transport.bytes_available().unwrap(), 0);
    }

    #[tokio::test]
    async fn max_chunk_fragments_reads() {
        let (mut transport, handle) = ScriptedTransport::new();
        handle.set_max_chunk(2);
        handle.push_inbound(&[1, 2, 3, 4, 5]);

        let mut buf = [0u8; 5];
        let n = transport
            .receive(&mut buf, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(n, 2);

        // read_exact reassembles the remaining fragments.
        let mut rest = [0u8; 3];
        transport
            .read_exact(&mut rest, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(rest, [3, 4, 5]);
    }

    #[tokio::test]
    async fn stall_times_out_once_with_input_queued() {
        let (mut transport, handle) = ScriptedTransport::new();
        handle.push_inbound(&[1, 2, 3, 4, 5]);
        handle.stall_after(2);

        let mut buf = [0u8; 5];
        let n = transport
            .receive(&mut buf, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(&buf[..n], &[1, 2]);

        let result = transport.receive(&mut buf, Duration::from_millis(10)).await;
        assert!(matches!(result, Err(Error::Timeout)));
        assert_eq!(transport.bytes_available().unwrap(), 3);

        let n = transport
            .receive(&mut buf, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(&buf[..n], &[3, 4, 5]);
    }

    #[tokio::test]
    async fn disconnect_fails_operations() {
        let (mut transport, handle) = ScriptedTransport::new();
        assert!(transport.is_connected());

        handle.set_connected(false);
        assert!(!transport.is_connected());
        assert!(matches!(
            transport.send(&[0x01]).await,
            Err(Error::NotConnected)
        ));
        assert!(matches!(
            transport.bytes_available(),
            Err(Error::NotConnected)
        ));

        let mut buf = [0u8; 8];
        let result = transport.receive(&mut buf, Duration::from_millis(10)).await;
        assert!(matches!(result, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn close_drops_pending_input() {
        let (mut transport, handle) = ScriptedTransport::new();
        handle.push_inbound(&[9, 9, 9]);
        transport.close().await.unwrap();
        assert!(!transport.is_connected());
        assert_eq!(handle.inbound_len(), 0);
    }
}
