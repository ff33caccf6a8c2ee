//! Sample packing.
//!
//! Samples are packed MSB first into a continuous bit stream with no gaps
//! between them. At 12 bits this is the familiar "two samples in three
//! bytes" layout:
//!
//! ```text
//!  byte0            byte1             byte2
//! [a11 .. a4]  [a3 .. a0 | b11 .. b8]  [b7 .. b0]
//! ```
//!
//! [`pack`] and [`unpack`] are the 12-bit pair primitives. [`pack_bits`] and
//! [`unpack_bits`] handle any [`BitDepth`] and produce identical bytes at
//! 12 bits.
//!
//! Because two 12-bit samples and three bytes both hold exactly 24 bits, the
//! pair mapping is a bijection: every byte triple is a valid encoding. Only
//! bit streams that end mid-byte carry pad bits, and those must be zero for
//! `pack_bits(unpack_bits(x)) == x` to hold.

use palette_core::types::{BitDepth, Sample};

/// Bytes produced by one [`pack`] call.
pub const PAIR_BYTES: usize = 3;

/// Samples consumed by one [`pack`] call.
pub const PAIR_SAMPLES: usize = 2;

const TWELVE_BIT_MASK: u32 = 0x0FFF;

/// Pack two 12-bit samples into three bytes.
///
/// Only the low 12 bits of each sample are used.
///
/// # Example
///
/// ```
/// use palette_codec::codec::pack;
///
/// assert_eq!(pack(0x123, 0x456), [0x12, 0x34, 0x56]);
/// ```
pub const fn pack(a: Sample, b: Sample) -> [u8; PAIR_BYTES] {
    // Widen before shifting: (a & 0xF) << 4 and b >> 8 must not be truncated
    // to a byte before they are combined.
    let a = a as u32 & TWELVE_BIT_MASK;
    let b = b as u32 & TWELVE_BIT_MASK;
    [
        (a >> 4) as u8,
        (((a & 0xF) << 4) | (b >> 8)) as u8,
        (b & 0xFF) as u8,
    ]
}

/// Unpack three bytes into two 12-bit samples.
///
/// # Example
///
/// ```
/// use palette_codec::codec::unpack;
///
/// assert_eq!(unpack(0x12, 0x34, 0x56), (0x123, 0x456));
/// ```
pub const fn unpack(byte0: u8, byte1: u8, byte2: u8) -> (Sample, Sample) {
    let (b0, b1, b2) = (byte0 as Sample, byte1 as Sample, byte2 as Sample);
    ((b0 << 4) | (b1 >> 4), ((b1 & 0xF) << 8) | b2)
}

/// Pack `samples` at `depth` into `out`, MSB first.
///
/// `out` must hold at least `depth.packet_len(samples.len())` bytes. Bits of
/// each sample above `depth` are ignored and trailing pad bits are zero.
/// Returns the number of bytes written.
pub fn pack_bits(depth: BitDepth, samples: &[Sample], out: &mut [u8]) -> usize {
    let bits = u32::from(depth.bits());
    let mask = u32::from(depth.max_sample());

    let mut acc: u32 = 0;
    let mut pending: u32 = 0;
    let mut written = 0;

    for &sample in samples {
        acc = (acc << bits) | (u32::from(sample) & mask);
        pending += bits;
        while pending >= 8 {
            pending -= 8;
            out[written] = (acc >> pending) as u8;
            written += 1;
        }
        acc &= (1 << pending) - 1;
    }

    if pending > 0 {
        out[written] = (acc << (8 - pending)) as u8;
        written += 1;
    }

    written
}

/// Unpack `out.len()` samples at `depth` from `bytes`, MSB first.
///
/// `bytes` should hold `depth.packet_len(out.len())` bytes; missing bytes
/// read as zero and extra bytes are ignored.
pub fn unpack_bits(depth: BitDepth, bytes: &[u8], out: &mut [Sample]) {
    let bits = u32::from(depth.bits());
    let mask = u32::from(depth.max_sample());

    let mut source = bytes.iter().copied();
    let mut acc: u32 = 0;
    let mut pending: u32 = 0;

    for slot in out.iter_mut() {
        while pending < bits {
            acc = (acc << 8) | u32::from(source.next().unwrap_or(0));
            pending += 8;
        }
        pending -= bits;
        *slot = ((acc >> pending) & mask) as Sample;
        acc &= (1 << pending) - 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    const BOUNDARIES: [Sample; 6] = [0, 1, 2047, 2048, 4094, 4095];

    // -----------------------------------------------------------------------
    // pack / unpack -- fixed vectors
    // -----------------------------------------------------------------------

    #[test]
    fn pack_splits_nibbles() {
        assert_eq!(pack(0x123, 0x456), [0x12, 0x34, 0x56]);
        assert_eq!(pack(0xABC, 0xDEF), [0xAB, 0xCD, 0xEF]);
    }

    #[test]
    fn pack_low_nibble_of_a_meets_high_nibble_of_b() {
        // a = 0x00F contributes only to byte1's high nibble,
        // b = 0xF00 contributes only to byte1's low nibble.
        assert_eq!(pack(0x00F, 0x000), [0x00, 0xF0, 0x00]);
        assert_eq!(pack(0x000, 0xF00), [0x00, 0x0F, 0x00]);
        assert_eq!(pack(0x00F, 0xF00), [0x00, 0xFF, 0x00]);
    }

    #[test]
    fn pack_boundaries() {
        assert_eq!(pack(0, 0), [0x00, 0x00, 0x00]);
        assert_eq!(pack(1, 1), [0x00, 0x10, 0x01]);
        assert_eq!(pack(2047, 2048), [0x7F, 0xF8, 0x00]);
        assert_eq!(pack(4094, 4095), [0xFF, 0xEF, 0xFF]);
        assert_eq!(pack(4095, 4095), [0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn unpack_boundaries() {
        assert_eq!(unpack(0x00, 0x00, 0x00), (0, 0));
        assert_eq!(unpack(0x00, 0x10, 0x01), (1, 1));
        assert_eq!(unpack(0x7F, 0xF8, 0x00), (2047, 2048));
        assert_eq!(unpack(0xFF, 0xEF, 0xFF), (4094, 4095));
        assert_eq!(unpack(0xFF, 0xFF, 0xFF), (4095, 4095));
    }

    #[test]
    fn pack_ignores_bits_above_twelve() {
        assert_eq!(pack(0xF123, 0x1456), pack(0x123, 0x456));
    }

    #[test]
    fn boundary_pairs_round_trip_both_directions() {
        for &a in &BOUNDARIES {
            for &b in &BOUNDARIES {
                let bytes = pack(a, b);
                assert_eq!(unpack(bytes[0], bytes[1], bytes[2]), (a, b));

                let (x, y) = unpack(bytes[0], bytes[1], bytes[2]);
                assert_eq!(pack(x, y), bytes);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Exhaustive sweeps
    // -----------------------------------------------------------------------

    #[test]
    fn every_sample_pair_round_trips() {
        for a in 0..=4095 {
            for b in 0..=4095 {
                let [x, y, z] = pack(a, b);
                assert_eq!(unpack(x, y, z), (a, b), "pair ({a}, {b})");
            }
        }
    }

    #[test]
    fn every_byte_triple_round_trips() {
        for x in 0..=255u8 {
            for y in 0..=255u8 {
                for z in 0..=255u8 {
                    let (a, b) = unpack(x, y, z);
                    assert!(a <= 4095 && b <= 4095);
                    assert_eq!(pack(a, b), [x, y, z]);
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // pack_bits / unpack_bits
    // -----------------------------------------------------------------------

    #[test]
    fn pack_bits_matches_pair_packing_at_twelve_bits() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0x5EED);
        for _ in 0..1_000 {
            let samples: [Sample; 8] = std::array::from_fn(|_| rng.gen_range(0..=4095));
            let mut generic = [0u8; 12];
            assert_eq!(pack_bits(BitDepth::TWELVE, &samples, &mut generic), 12);

            let pairs: Vec<u8> = samples
                .chunks_exact(PAIR_SAMPLES)
                .flat_map(|p| pack(p[0], p[1]))
                .collect();
            assert_eq!(generic.as_slice(), pairs.as_slice());
        }
    }

    #[test]
    fn bit_stream_round_trips_at_every_depth() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        for bits in 1..=BitDepth::MAX_BITS {
            let depth = BitDepth::new(bits).unwrap();
            for channels in 1..=9 {
                let samples: Vec<Sample> = (0..channels)
                    .map(|_| rng.gen_range(0..=depth.max_sample()))
                    .collect();
                let mut bytes = vec![0u8; depth.packet_len(channels)];
                let written = pack_bits(depth, &samples, &mut bytes);
                assert_eq!(written, bytes.len(), "{depth} x {channels}");

                let mut decoded = vec![0; channels];
                unpack_bits(depth, &bytes, &mut decoded);
                assert_eq!(decoded, samples, "{depth} x {channels}");
            }
        }
    }

    #[test]
    fn sixteen_bits_is_big_endian() {
        let mut bytes = [0u8; 4];
        pack_bits(BitDepth::new(16).unwrap(), &[0x1234, 0xABCD], &mut bytes);
        assert_eq!(bytes, [0x12, 0x34, 0xAB, 0xCD]);
    }

    #[test]
    fn partial_group_pads_with_zero_bits() {
        let mut bytes = [0xFFu8; 2];
        pack_bits(BitDepth::TWELVE, &[0xABC], &mut bytes);
        assert_eq!(bytes, [0xAB, 0xC0]);
    }

    #[test]
    fn nonzero_pad_bits_do_not_survive_a_round_trip() {
        // One 12-bit sample in two bytes leaves four pad bits.
        let dirty = [0xAB, 0xC7];
        let mut sample = [0];
        unpack_bits(BitDepth::TWELVE, &dirty, &mut sample);
        assert_eq!(sample, [0xABC]);

        let mut clean = [0u8; 2];
        pack_bits(BitDepth::TWELVE, &sample, &mut clean);
        assert_ne!(clean, dirty);
        assert_eq!(clean, [0xAB, 0xC0]);
    }
}
