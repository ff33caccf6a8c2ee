//! # palette -- Palette/Easel Control-Rate Link
//!
//! `palette` is an asynchronous Rust library for the serial link between a
//! Palette analog I/O device and an Easel host patch. Both sides exchange
//! fixed-length packets of densely packed 12-bit samples at control rate.
//!
//! ## Quick Start
//!
//! Run the device side of the link on a USB CDC port:
//!
//! ```no_run
//! use palette::identity;
//! use palette::link::LinkSessionBuilder;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut session = LinkSessionBuilder::new(identity::palette())
//!         .serial_port("/dev/ttyACM0")
//!         .build()
//!         .await?;
//!     session.run(CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```
//!
//! Or talk to a device from the host side:
//!
//! ```no_run
//! use palette::link::EaselLink;
//! use palette::transport::SerialTransport;
//! use std::time::Duration;
//!
//! # async fn example() -> palette::Result<()> {
//! let transport = SerialTransport::open("/dev/ttyACM0", 115_200).await?;
//! let mut easel = EaselLink::discover(Box::new(transport), Duration::from_secs(2)).await?;
//! let inputs = easel.exchange(&[2048; 8]).await?;
//! println!("{} -> {:?}", easel.identity(), inputs);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! | Crate                | Purpose                                           |
//! |----------------------|---------------------------------------------------|
//! | `palette-core`       | [`Transport`] trait, identity, stages, errors     |
//! | `palette-codec`      | 12-bit pair packing and fixed-length packets      |
//! | `palette-transport`  | Serial and TCP transport implementations          |
//! | `palette-link`       | Device [`LinkSession`](link::LinkSession) and host [`EaselLink`](link::EaselLink) |
//! | **`palette`**        | This facade crate -- re-exports everything        |
//!
//! ## Wire Format
//!
//! While no host is talking, the device repeats a discovery line such as
//! `Palettev0.4.4 8 12 8 12`. After that, every inbound packet of output
//! values is answered by exactly one outbound packet of input values. Two
//! 12-bit samples occupy three bytes, so eight channels fit in 12 bytes.
//!
//! ## Session Events
//!
//! A [`LinkSession`](link::LinkSession) publishes [`SessionEvent`]s through
//! a broadcast channel:
//!
//! ```no_run
//! use palette::SessionEvent;
//! # async fn example(session: &palette::link::LinkSession) {
//! let mut events = session.subscribe();
//! while let Ok(event) = events.recv().await {
//!     if let SessionEvent::Exchanged { sequence, elapsed_micros } = event {
//!         println!("#{sequence}: {elapsed_micros} us");
//!     }
//! }
//! # }
//! ```

pub use palette_core::*;

/// Sample packing and fixed-length packets.
pub mod codec {
    pub use palette_codec::*;
}

/// The [`Transport`](transport::Transport) trait and its serial and TCP
/// implementations.
pub mod transport {
    pub use palette_core::transport::*;
    pub use palette_transport::*;
}

/// Device-side link session and host-side Easel link.
#[cfg(feature = "link")]
pub mod link {
    pub use palette_link::*;
}
