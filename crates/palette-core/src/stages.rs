//! Hardware seams around the link session.
//!
//! The session never touches DACs, ADCs, or LEDs directly. It hands decoded
//! output values to an [`OutputStage`], asks an [`InputStage`] for fresh
//! input values, and pulses a [`StatusIndicator`] while searching for a host.
//! Real firmware plugs its drivers in here; tests plug in recorders.

use crate::error::Result;
use crate::types::Sample;

/// Receives each decoded output Channel Set for physical application.
pub trait OutputStage: Send {
    /// Apply one value per output channel, in channel order.
    fn apply(&mut self, samples: &[Sample]) -> Result<()>;
}

/// Produces each input Channel Set to be sent back to the host.
pub trait InputStage: Send {
    /// Fill `out` with one value per input channel.
    ///
    /// `elapsed_micros` is the time since the previous completed exchange
    /// (or since the session was created, for the first exchange). Stages
    /// that read real converters are free to ignore it.
    fn sample(&mut self, elapsed_micros: u64, out: &mut [Sample]) -> Result<()>;
}

/// A single binary output used to signal "searching for host".
pub trait StatusIndicator: Send {
    fn set(&mut self, high: bool);
}

/// Output stage that drops every Channel Set.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardOutput;

impl OutputStage for DiscardOutput {
    fn apply(&mut self, _samples: &[Sample]) -> Result<()> {
        Ok(())
    }
}

/// Indicator for builds without a status LED.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIndicator;

impl StatusIndicator for NoIndicator {
    fn set(&mut self, _high: bool) {}
}
