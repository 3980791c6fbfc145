use crate::error::MathError;
use crate::math::bit_math::{least_significant_bit, most_significant_bit};
use crate::{FastMap, U256_1};
use alloy_primitives::U256;

/// Splits a compressed tick into its bitmap word index and the bit
/// position inside that word.
pub fn position(compressed: i32) -> (i16, u8) {
    ((compressed >> 8) as i16, (compressed % 256) as u8)
}

/// Reads a 256-tick word from the sparse bitmap; absent words are all
/// zeroes.
pub fn get_word(bitmap: &FastMap<i16, U256>, word: i16) -> U256 {
    *bitmap.get(&word).unwrap_or(&U256::ZERO)
}

/// Flips the initialized flag of `tick` in the bitmap. The tick must be
/// aligned to `tick_spacing`.
pub fn flip_tick(
    bitmap: &mut FastMap<i16, U256>,
    tick: i32,
    tick_spacing: i32,
) -> Result<(), MathError> {
    if tick % tick_spacing != 0 {
        return Err(MathError::OutOfBounds);
    }

    let (word_pos, bit_pos) = position(tick / tick_spacing);
    let mask = U256_1 << bit_pos;
    let word = get_word(bitmap, word_pos);
    bitmap.insert(word_pos, word ^ mask);
    Ok(())
}

/// Finds the next initialized tick within the same 256-tick word, at or
/// below `tick` when `lte` is set, strictly above it otherwise.
///
/// When the word holds no initialized tick in the requested direction the
/// word-edge tick is returned with `initialized == false`; the swap loop
/// re-queries from there. This word-bounded contract is what keeps a
/// single search step O(1).
pub fn next_initialized_tick_within_one_word(
    bitmap: &FastMap<i16, U256>,
    tick: i32,
    tick_spacing: i32,
    lte: bool,
) -> Result<(i32, bool), MathError> {
    let mut compressed = tick / tick_spacing;
    if tick < 0 && tick % tick_spacing != 0 {
        compressed -= 1; // round towards negative infinity
    }

    if lte {
        let (word_pos, bit_pos) = position(compressed);

        // all bits at or to the right of the current position
        let mask = (U256_1 << bit_pos) - U256_1 + (U256_1 << bit_pos);
        let masked = get_word(bitmap, word_pos) & mask;

        let initialized = !masked.is_zero();
        let next = if initialized {
            (compressed - (bit_pos - most_significant_bit(masked)?) as i32) * tick_spacing
        } else {
            (compressed - bit_pos as i32) * tick_spacing
        };
        Ok((next, initialized))
    } else {
        let (word_pos, bit_pos) = position(compressed + 1);

        // all bits at or to the left of the next position
        let mask = !((U256_1 << bit_pos) - U256_1);
        let masked = get_word(bitmap, word_pos) & mask;

        let initialized = !masked.is_zero();
        let next = if initialized {
            (compressed + 1 + (least_significant_bit(masked)? - bit_pos) as i32) * tick_spacing
        } else {
            (compressed + 1 + (255 - bit_pos) as i32) * tick_spacing
        };
        Ok((next, initialized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitmap_with(ticks: &[i32], spacing: i32) -> FastMap<i16, U256> {
        let mut bitmap = FastMap::default();
        for &t in ticks {
            flip_tick(&mut bitmap, t, spacing).unwrap();
        }
        bitmap
    }

    #[test]
    fn position_maps_words_and_bits() {
        assert_eq!(position(0), (0, 0));
        assert_eq!(position(255), (0, 255));
        assert_eq!(position(256), (1, 0));
        assert_eq!(position(300), (1, 44));
        assert_eq!(position(-1), (-1, 255));
        assert_eq!(position(-256), (-1, 0));
        assert_eq!(position(-257), (-2, 255));
    }

    #[test]
    fn flip_tick_toggles() {
        let mut bitmap = FastMap::default();
        flip_tick(&mut bitmap, 78, 1).unwrap();
        let (word, bit) = position(78);
        assert_eq!(get_word(&bitmap, word), U256_1 << bit);
        flip_tick(&mut bitmap, 78, 1).unwrap();
        assert_eq!(get_word(&bitmap, word), U256::ZERO);
    }

    #[test]
    fn flip_tick_rejects_unaligned() {
        let mut bitmap = FastMap::default();
        assert!(matches!(
            flip_tick(&mut bitmap, 5, 10),
            Err(MathError::OutOfBounds)
        ));
    }

    #[test]
    fn search_up_finds_next_strictly_above() {
        let bitmap = bitmap_with(&[-200, -55, -4, 70, 78, 84, 139, 240, 535], 1);

        let (next, init) = next_initialized_tick_within_one_word(&bitmap, 78, 1, false).unwrap();
        assert_eq!((next, init), (84, true));

        let (next, init) = next_initialized_tick_within_one_word(&bitmap, 77, 1, false).unwrap();
        assert_eq!((next, init), (78, true));

        let (next, init) = next_initialized_tick_within_one_word(&bitmap, -56, 1, false).unwrap();
        assert_eq!((next, init), (-55, true));
    }

    #[test]
    fn search_up_stops_at_word_edge() {
        let bitmap = bitmap_with(&[-200, -55, -4, 70, 78, 84, 139, 240, 535], 1);
        // no initialized tick in word 1 above 255 -> uninitialized edge
        let (next, init) = next_initialized_tick_within_one_word(&bitmap, 255, 1, false).unwrap();
        assert_eq!((next, init), (511, false));
    }

    #[test]
    fn search_down_is_inclusive() {
        let bitmap = bitmap_with(&[-200, -55, -4, 70, 78, 84, 139, 240, 535], 1);

        let (next, init) = next_initialized_tick_within_one_word(&bitmap, 78, 1, true).unwrap();
        assert_eq!((next, init), (78, true));

        let (next, init) = next_initialized_tick_within_one_word(&bitmap, 79, 1, true).unwrap();
        assert_eq!((next, init), (78, true));

        let (next, init) = next_initialized_tick_within_one_word(&bitmap, -54, 1, true).unwrap();
        assert_eq!((next, init), (-55, true));
    }

    #[test]
    fn search_down_stops_at_word_edge() {
        let bitmap = bitmap_with(&[535], 1);
        let (next, init) = next_initialized_tick_within_one_word(&bitmap, 255, 1, true).unwrap();
        assert_eq!((next, init), (0, false));
    }

    #[test]
    fn search_respects_tick_spacing() {
        let bitmap = bitmap_with(&[-120, 0, 60, 180], 60);

        let (next, init) = next_initialized_tick_within_one_word(&bitmap, 0, 60, false).unwrap();
        assert_eq!((next, init), (60, true));

        let (next, init) = next_initialized_tick_within_one_word(&bitmap, 61, 60, false).unwrap();
        assert_eq!((next, init), (180, true));

        // negative unaligned ticks round towards negative infinity
        let (next, init) = next_initialized_tick_within_one_word(&bitmap, -61, 60, true).unwrap();
        assert_eq!((next, init), (-120, true));
    }
}
