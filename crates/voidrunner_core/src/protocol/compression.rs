//! Run-length compression for snapshot and room-list payloads.
//!
//! Snapshot payloads are often dominated by repeated bytes (zeroed entity
//! slots, quiet rooms with few state changes), so a simple RLE pass buys
//! real bandwidth for near-zero CPU. The codec sets
//! [`crate::protocol::packets::FLAG_COMPRESSED`] on the header when it
//! chooses to apply this and clears it otherwise.

/// Run-length encodes `data` as `(count, value)` byte pairs.
///
/// Runs are capped at 127 so `count` always fits the lower seven bits of a
/// byte; a run longer than that is split into multiple pairs.
#[must_use]
pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        let value = data[i];
        let mut count: u8 = 1;
        while i + 1 < data.len() && data[i + 1] == value && count < 127 {
            count += 1;
            i += 1;
        }
        output.push(count);
        output.push(value);
        i += 1;
    }
    output
}

/// Reverses [`compress`].
///
/// Tolerates a trailing unpaired byte by dropping it rather than erroring;
/// the codec only ever feeds this well-formed pairs, but corrupt or
/// truncated input must not panic.
#[must_use]
pub fn decompress(data: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(data.len());
    let mut pairs = data.chunks_exact(2);
    for pair in &mut pairs {
        let count = pair[0];
        let value = pair[1];
        output.resize(output.len() + count as usize, value);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_repeated_bytes() {
        let data = [0u8; 64];
        let packed = compress(&data);
        assert_eq!(packed.len(), 2);
        assert_eq!(decompress(&packed), data);
    }

    #[test]
    fn round_trips_mixed_runs() {
        let data = [1u8, 1, 1, 2, 3, 3, 3, 3, 3];
        let packed = compress(&data);
        assert_eq!(decompress(&packed), data);
    }

    #[test]
    fn splits_runs_longer_than_127() {
        let data = [7u8; 200];
        let packed = compress(&data);
        assert_eq!(packed, vec![127, 7, 73, 7]);
        assert_eq!(decompress(&packed), data);
    }

    #[test]
    fn empty_input_round_trips_to_empty() {
        assert!(compress(&[]).is_empty());
        assert!(decompress(&[]).is_empty());
    }

    #[test]
    fn decompress_drops_a_trailing_unpaired_byte_instead_of_panicking() {
        let malformed = [3u8, 9, 5];
        assert_eq!(decompress(&malformed), vec![9, 9, 9]);
    }
}
