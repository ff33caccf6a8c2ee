//! palette-test-harness: Scripted transports and hardware test doubles for
//! the Palette link.
//!
//! This crate provides [`ScriptedTransport`] for deterministic unit testing
//! of the link session without a serial port, plus a [`ManualClock`] and
//! recording implementations of the session's output, input, and status
//! indicator seams.

pub mod fixtures;
pub mod scripted;

pub use fixtures::{FixedInputStage, ManualClock, RecordingIndicator, RecordingOutputStage};
pub use scripted::{ScriptHandle, ScriptedTransport};
