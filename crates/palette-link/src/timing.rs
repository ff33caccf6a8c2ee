//! Round-trip timing metric, the default input stage.
//!
//! Until real ADC sampling is wired in, every input channel reports how long
//! the previous round trip took, in tenths of a millisecond. At 12 bits this
//! covers 0 to 0.4095 s; slower round trips read as the maximum sample.

use palette_core::error::Result;
use palette_core::stages::InputStage;
use palette_core::types::{BitDepth, Sample};

/// Microseconds per metric unit (0.0001 s).
pub const MICROS_PER_UNIT: u64 = 100;

/// Convert an elapsed time to the timing metric at `depth`.
///
/// Rounds to the nearest unit and clamps to `depth.max_sample()`.
///
/// ```
/// use palette_core::BitDepth;
/// use palette_link::timing::timing_metric;
///
/// assert_eq!(timing_metric(50_000, BitDepth::TWELVE), 500);
/// assert_eq!(timing_metric(2_000_000, BitDepth::TWELVE), 4095);
/// ```
pub fn timing_metric(elapsed_micros: u64, depth: BitDepth) -> Sample {
    let units = elapsed_micros.saturating_add(MICROS_PER_UNIT / 2) / MICROS_PER_UNIT;
    let max = u64::from(depth.max_sample());
    // `units.min(max)` always fits: max_sample() is a Sample.
    units.min(max) as Sample
}

/// [`InputStage`] that reports the timing metric on every channel.
#[derive(Debug, Clone, Copy)]
pub struct TimingInputStage {
    depth: BitDepth,
}

impl TimingInputStage {
    pub fn new(depth: BitDepth) -> Self {
        Self { depth }
    }
}

impl InputStage for TimingInputStage {
    fn sample(&mut self, elapsed_micros: u64, out: &mut [Sample]) -> Result<()> {
        out.fill(timing_metric(elapsed_micros, self.depth));
        Ok(())
    }
}
