//! Sample and channel-layout types shared by the codec and the link session.

use std::fmt;

use crate::error::{Error, Result};

/// One control-rate sample: an unsigned value in `0..=depth.max_sample()`.
pub type Sample = u16;

/// Width of one sample on the wire, in bits (1 through 16).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitDepth(u8);

impl BitDepth {
    /// Widest supported sample.
    pub const MAX_BITS: u8 = 16;

    /// The Palette's DAC and ADC depth.
    pub const TWELVE: BitDepth = BitDepth(12);

    /// Validate and wrap a bit depth.
    pub fn new(bits: u8) -> Result<Self> {
        if bits == 0 || bits > Self::MAX_BITS {
            return Err(Error::InvalidParameter(format!(
                "bit depth {bits} outside 1..={}",
                Self::MAX_BITS
            )));
        }
        Ok(Self(bits))
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Largest representable sample (4095 for 12 bits).
    pub const fn max_sample(self) -> Sample {
        ((1u32 << self.0) - 1) as Sample
    }

    /// Whether `sample` fits in this depth.
    pub const fn contains(self, sample: Sample) -> bool {
        sample <= self.max_sample()
    }

    /// The smallest run of samples that ends on a byte boundary.
    ///
    /// For 12 bits this is 2 samples in 3 bytes; for 8 and 16 bits it is a
    /// single sample.
    pub const fn group(self) -> PackingGroup {
        let g = gcd(self.0 as usize, 8);
        PackingGroup {
            samples: 8 / g,
            bytes: self.0 as usize / g,
        }
    }

    /// Bytes needed for `channels` samples: `ceil(bits * channels / 8)`.
    pub const fn packet_len(self, channels: usize) -> usize {
        (self.0 as usize * channels).div_ceil(8)
    }
}

impl fmt::Display for BitDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.0)
    }
}

const fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// A byte-aligned run of packed samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackingGroup {
    /// Samples per group.
    pub samples: usize,
    /// Bytes per group.
    pub bytes: usize,
}

/// Channel count and bit depth for one direction of the link.
///
/// The channel count must fill whole packing groups, so a 12-bit layout
/// always has an even number of channels and its packet holds no padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelLayout {
    channels: usize,
    depth: BitDepth,
}

impl ChannelLayout {
    /// Eight 12-bit channels, the stock Palette layout in both directions.
    pub const EIGHT_BY_TWELVE: ChannelLayout = ChannelLayout {
        channels: 8,
        depth: BitDepth::TWELVE,
    };

    pub fn new(channels: usize, depth: BitDepth) -> Result<Self> {
        if channels == 0 {
            return Err(Error::InvalidParameter("channel count must be non-zero".into()));
        }
        let group = depth.group();
        if channels % group.samples != 0 {
            return Err(Error::InvalidParameter(format!(
                "{channels} channels at {depth} do not fill whole {}-sample groups",
                group.samples
            )));
        }
        Ok(Self { channels, depth })
    }

    pub const fn channels(&self) -> usize {
        self.channels
    }

    pub const fn depth(&self) -> BitDepth {
        self.depth
    }

    /// Length in bytes of one packet carrying this layout.
    pub const fn packet_len(&self) -> usize {
        self.depth.packet_len(self.channels)
    }
}
