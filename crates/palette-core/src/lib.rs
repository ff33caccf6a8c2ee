//! palette-core: Core traits, types, and error definitions for the Palette link.
//!
//! This crate defines the hardware- and transport-agnostic pieces shared by
//! the codec, the link session, and the concrete transports.
//!
//! # Key types
//!
//! - [`Transport`] -- byte-level communication channel
//! - [`DeviceIdentity`] -- the configuration announced during discovery
//! - [`BitDepth`] / [`ChannelLayout`] -- shape of one direction's packets
//! - [`OutputStage`] / [`InputStage`] / [`StatusIndicator`] -- hardware seams
//! - [`SessionEvent`] -- asynchronous session notifications
//! - [`Error`] / [`Result`] -- error handling

pub mod clock;
pub mod error;
pub mod events;
pub mod identity;
pub mod stages;
pub mod transport;
pub mod types;

// Re-export key types at crate root for ergonomic `use palette_core::*`.
pub use clock::{Clock, MonotonicClock};
pub use error::{Error, Result};
pub use events::SessionEvent;
pub use identity::DeviceIdentity;
pub use stages::{DiscardOutput, InputStage, NoIndicator, OutputStage, StatusIndicator};
pub use transport::Transport;
pub use types::{BitDepth, ChannelLayout, PackingGroup, Sample};
