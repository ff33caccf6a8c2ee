//! Transport implementations for the Palette link.
//!
//! This crate provides concrete implementations of the
//! [`Transport`](palette_core::Transport) trait from `palette-core`:
//!
//! - [`SerialTransport`]: USB CDC virtual COM ports and UART connections
//! - [`TcpTransport`]: TCP connections to serial-over-network bridges and
//!   to peers running on another machine
//!
//! # Example
//!
//! ```no_run
//! use palette_transport::SerialTransport;
//! use palette_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> palette_core::Result<()> {
//! let mut transport = SerialTransport::open("/dev/ttyACM0", 115_200).await?;
//!
//! // Is the device announcing itself?
//! if transport.has_input()? {
//!     let mut buf = [0u8; 64];
//!     let n = transport.receive(&mut buf, Duration::from_millis(100)).await?;
//!     println!("{}", String::from_utf8_lossy(&buf[..n]));
//! }
//! # Ok(())
//! # }
//! ```

pub mod serial;
pub mod tcp;

pub use serial::{
    DataBits, FlowControl, Parity, SerialConfig, SerialTransport, StopBits, available_ports,
};
pub use tcp::TcpTransport;
