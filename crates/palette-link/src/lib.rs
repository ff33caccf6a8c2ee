//! palette-link: The Palette/Easel link protocol.
//!
//! The device side is a [`LinkSession`]: it announces the device identity
//! while no host is talking, then answers every inbound packet of output
//! values with one outbound packet of input values. The host side is an
//! [`EaselLink`], which discovers a device from its announcement and runs
//! round trips against it.
//!
//! # Example
//!
//! ```no_run
//! use palette_core::identity;
//! use palette_link::LinkSessionBuilder;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> palette_core::Result<()> {
//! let mut session = LinkSessionBuilder::new(identity::palette())
//!     .serial_port("/dev/ttyACM0")
//!     .build()
//!     .await?;
//! session.run(CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod easel;
pub mod session;
pub mod timing;

pub use builder::LinkSessionBuilder;
pub use easel::EaselLink;
pub use session::{LinkSession, LinkState, SessionConfig, TickOutcome};
pub use timing::{TimingInputStage, timing_metric};
