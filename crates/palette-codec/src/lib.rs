//! Bit-packing codec for the Palette link.
//!
//! This crate holds the pure, allocation-free transforms between Channel
//! Sets and packet bytes:
//!
//! - [`codec`] -- the 12-bit pair packing primitives and the general
//!   MSB-first bit stream they are a special case of
//! - [`packet`] -- [`PacketFormat`], a fixed-length packet for one direction
//!   of the link, with length and range validation
//!
//! # Example
//!
//! ```
//! use palette_codec::PacketFormat;
//! use palette_core::ChannelLayout;
//!
//! let inbound = PacketFormat::new(ChannelLayout::EIGHT_BY_TWELVE);
//! let bytes = inbound.encode_to_vec(&[0, 1, 2047, 2048, 4094, 4095, 0, 0])?;
//! assert_eq!(bytes.len(), 12);
//! assert_eq!(inbound.decode_to_vec(&bytes)?, [0, 1, 2047, 2048, 4094, 4095, 0, 0]);
//! # Ok::<(), palette_core::Error>(())
//! ```

pub mod codec;
pub mod packet;

pub use codec::{pack, unpack};
pub use packet::PacketFormat;
