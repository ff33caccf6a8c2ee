//! Fixed-length packets carrying one Channel Set.
//!
//! A [`PacketFormat`] binds a [`ChannelLayout`] to the codec. Each direction
//! of the link has one: the inbound format (Easel → Palette, output/DAC
//! values) and the outbound format (Palette → Easel, input/ADC values).
//! Channel values are carried in ascending channel order.

use palette_core::error::{Error, Result};
use palette_core::types::{BitDepth, ChannelLayout, PackingGroup, Sample};

use crate::codec::{self, PAIR_BYTES, PAIR_SAMPLES};

const PAIR_GROUP: PackingGroup = PackingGroup {
    samples: PAIR_SAMPLES,
    bytes: PAIR_BYTES,
};

/// Encoder/decoder for one direction's fixed-length packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketFormat {
    layout: ChannelLayout,
}

impl PacketFormat {
    pub const fn new(layout: ChannelLayout) -> Self {
        Self { layout }
    }

    pub const fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub const fn channels(&self) -> usize {
        self.layout.channels()
    }

    pub const fn depth(&self) -> BitDepth {
        self.layout.depth()
    }

    /// Packet length in bytes.
    pub const fn len(&self) -> usize {
        self.layout.packet_len()
    }

    /// Encode one sample per channel into `out`.
    ///
    /// Fails if either slice has the wrong length or a sample does not fit
    /// the layout's bit depth.
    pub fn encode(&self, samples: &[Sample], out: &mut [u8]) -> Result<()> {
        self.check_lengths(samples.len(), out.len())?;

        let depth = self.depth();
        if let Some((channel, &value)) = samples
            .iter()
            .enumerate()
            .find(|(_, s)| !depth.contains(**s))
        {
            return Err(Error::InvalidParameter(format!(
                "channel {channel} value {value} exceeds {depth} range (max {})",
                depth.max_sample()
            )));
        }

        if depth.group() == PAIR_GROUP {
            for (pair, bytes) in samples
                .chunks_exact(PAIR_SAMPLES)
                .zip(out.chunks_exact_mut(PAIR_BYTES))
            {
                bytes.copy_from_slice(&codec::pack(pair[0], pair[1]));
            }
        } else {
            codec::pack_bits(depth, samples, out);
        }
        Ok(())
    }

    /// Decode a packet into one sample per channel.
    pub fn decode(&self, bytes: &[u8], out: &mut [Sample]) -> Result<()> {
        self.check_lengths(out.len(), bytes.len())?;

        if self.depth().group() == PAIR_GROUP {
            for (trine, pair) in bytes
                .chunks_exact(PAIR_BYTES)
                .zip(out.chunks_exact_mut(PAIR_SAMPLES))
            {
                let (a, b) = codec::unpack(trine[0], trine[1], trine[2]);
                pair[0] = a;
                pair[1] = b;
            }
        } else {
            codec::unpack_bits(self.depth(), bytes, out);
        }
        Ok(())
    }

    /// Allocating form of [`encode`](Self::encode).
    pub fn encode_to_vec(&self, samples: &[Sample]) -> Result<Vec<u8>> {
        let mut out = vec![0u8; self.len()];
        self.encode(samples, &mut out)?;
        Ok(out)
    }

    /// Allocating form of [`decode`](Self::decode).
    pub fn decode_to_vec(&self, bytes: &[u8]) -> Result<Vec<Sample>> {
        let mut out = vec![0; self.channels()];
        self.decode(bytes, &mut out)?;
        Ok(out)
    }

    fn check_lengths(&self, samples: usize, bytes: usize) -> Result<()> {
        if samples != self.channels() {
            return Err(Error::InvalidParameter(format!(
                "expected {} channel values, got {samples}",
                self.channels()
            )));
        }
        if bytes != self.len() {
            return Err(Error::InvalidParameter(format!(
                "expected {}-byte packet, got {bytes} bytes",
                self.len()
            )));
        }
        Ok(())
    }
}
