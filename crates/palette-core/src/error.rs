//! Error types for the Palette link.
//!
//! All fallible operations across the workspace return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport-layer, protocol-layer, and
//! hardware-stage errors are all captured here.

/// The error type for all Palette link operations.
///
/// Variants cover the failure modes of a point-to-point sample link:
/// physical transport failures, malformed announcements, bounded reads that
/// ran out of time, and failures reported by the DAC/ADC stages.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (serial port, TCP socket).
    #[error("transport error: {0}")]
    Transport(String),

    /// A protocol-level error (unparseable announcement, unexpected bytes).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Timed out before any byte of the expected packet arrived.
    ///
    /// On a live link this usually means the peer stopped sending.
    #[error("timeout waiting for data")]
    Timeout,

    /// Timed out part-way through a fixed-length packet.
    ///
    /// The bytes that did arrive are not a complete packet and must be
    /// discarded by the caller to resynchronize.
    #[error("incomplete packet: expected {expected} bytes, received {received}")]
    IncompletePacket {
        /// Length of the packet that was being read.
        expected: usize,
        /// Number of bytes received before the deadline.
        received: usize,
    },

    /// An invalid parameter was passed (bit depth, channel count, sample value).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The output (DAC) or input (ADC) stage reported a failure.
    #[error("hardware stage error: {0}")]
    Hardware(String),

    /// The transport has been closed or was never opened.
    #[error("not connected")]
    NotConnected,

    /// The connection to the peer was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_transport() {
        let e = Error::Transport("port busy".into());
        assert_eq!(e.to_string(), "transport error: port busy");
    }

    #[test]
    fn error_display_protocol() {
        let e = Error::Protocol("bad announcement".into());
        assert_eq!(e.to_string(), "protocol error: bad announcement");
    }

    #[test]
    fn error_display_timeout() {
        assert_eq!(Error::Timeout.to_string(), "timeout waiting for data");
    }

    #[test]
    fn error_display_incomplete_packet() {
        let e = Error::IncompletePacket {
            expected: 12,
            received: 5,
        };
        assert_eq!(
            e.to_string(),
            "incomplete packet: expected 12 bytes, received 5"
        );
    }

    #[test]
    fn error_display_invalid_parameter() {
        let e = Error::InvalidParameter("sample 5000 exceeds 12-bit range".into());
        assert_eq!(
            e.to_string(),
            "invalid parameter: sample 5000 exceeds 12-bit range"
        );
    }

    #[test]
    fn error_display_hardware() {
        let e = Error::Hardware("DAC not responding".into());
        assert_eq!(e.to_string(), "hardware stage error: DAC not responding");
    }

    #[test]
    fn error_display_connection_states() {
        assert_eq!(Error::NotConnected.to_string(), "not connected");
        assert_eq!(Error::ConnectionLost.to_string(), "connection lost");
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("pipe broken"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
