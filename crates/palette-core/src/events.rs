//! Link session event types.
//!
//! Events are emitted by the link session through a
//! [`tokio::sync::broadcast`] channel as it searches for a host and exchanges
//! packets. Monitors and front panels subscribe to them instead of polling.

/// An event emitted by a link session.
///
/// Events are delivered on a best-effort basis through a bounded broadcast
/// channel; slow consumers may miss events at high packet rates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// No host input was waiting, so the identity was announced.
    Announced,

    /// Host input was seen; the session is now exchanging packets.
    PeerDetected,

    /// One full inbound/outbound exchange completed.
    Exchanged {
        /// Number of exchanges completed so far, starting at 1.
        sequence: u64,
        /// Microseconds since the previous exchange completed.
        elapsed_micros: u64,
    },

    /// The inbound packet did not arrive before the read timeout.
    ReadTimedOut {
        /// Bytes of the packet that did arrive (discarded).
        received: usize,
    },

    /// The session gave up on the silent host and resumed announcing.
    ReturnedToSeeking,
}
