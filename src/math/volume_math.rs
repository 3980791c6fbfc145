use alloy_primitives::{I256, U256};

/// Cap on a single volume-per-liquidity contribution, `100_000 << 64`.
/// Contributions saturate here so one oversized trade cannot dominate
/// the rolling volume statistics.
pub const MAX_VOLUME_PER_LIQUIDITY: u128 = 100_000u128 << 64;

/// Floor integer square root of a `U256`.
pub fn integer_sqrt(x: U256) -> U256 {
    if x < U256::from(2u8) {
        return x;
    }

    // Newton iteration from a power-of-two guess >= sqrt(x); the sequence
    // decreases monotonically to floor(sqrt(x)).
    let bits = 256 - x.leading_zeros();
    let mut guess = U256::ONE << ((bits + 1) / 2);
    loop {
        let next = (guess + x / guess) >> 1usize;
        if next >= guess {
            return guess;
        }
        guess = next;
    }
}

/// Geometric-mean volume of a swap, scaled by the pool's active
/// liquidity and expressed in Q64 fixed point.
///
/// Zero liquidity is treated as one so the division is always defined;
/// the result saturates at [`MAX_VOLUME_PER_LIQUIDITY`].
pub fn volume_per_liquidity(liquidity: u128, amount0: I256, amount1: I256) -> u128 {
    let volume = integer_sqrt(amount0.unsigned_abs()) * integer_sqrt(amount1.unsigned_abs());
    let denominator = U256::from(if liquidity == 0 { 1 } else { liquidity });

    let shifted = if volume >= U256::ONE << 192usize {
        U256::MAX / denominator
    } else {
        (volume << 64usize) / denominator
    };

    if shifted >= U256::from(MAX_VOLUME_PER_LIQUIDITY) {
        MAX_VOLUME_PER_LIQUIDITY
    } else {
        shifted.to::<u128>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn sqrt_small_values() {
        for (x, expected) in [(0u64, 0u64), (1, 1), (2, 1), (3, 1), (4, 2), (8, 2), (9, 3)] {
            assert_eq!(integer_sqrt(U256::from(x)), U256::from(expected));
        }
    }

    #[test]
    fn sqrt_perfect_squares() {
        for root in [10u64, 1_000, 1_000_000, u32::MAX as u64] {
            let square = U256::from(root) * U256::from(root);
            assert_eq!(integer_sqrt(square), U256::from(root));
            assert_eq!(integer_sqrt(square - U256::ONE), U256::from(root - 1));
            assert_eq!(integer_sqrt(square + U256::ONE), U256::from(root));
        }
    }

    #[test]
    fn sqrt_of_max() {
        // floor(sqrt(2^256 - 1)) = 2^128 - 1
        assert_eq!(
            integer_sqrt(U256::MAX),
            U256::from_str("340282366920938463463374607431768211455").unwrap()
        );
    }

    #[test]
    fn volume_uses_geometric_mean() {
        // sqrt(400) * sqrt(100) = 200; liquidity 1 -> 200 << 64
        let v = volume_per_liquidity(1, I256::try_from(400).unwrap(), I256::try_from(100).unwrap());
        assert_eq!(v, 200u128 << 64);
    }

    #[test]
    fn volume_ignores_amount_signs() {
        let a = volume_per_liquidity(7, I256::try_from(400).unwrap(), I256::try_from(-100).unwrap());
        let b = volume_per_liquidity(7, I256::try_from(-400).unwrap(), I256::try_from(100).unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn volume_zero_liquidity_is_defined() {
        let v = volume_per_liquidity(0, I256::try_from(4).unwrap(), I256::try_from(4).unwrap());
        assert_eq!(v, 4u128 << 64);
    }

    #[test]
    fn volume_saturates_at_cap() {
        let huge = I256::try_from(u128::MAX).unwrap();
        let v = volume_per_liquidity(1, huge, huge);
        assert_eq!(v, MAX_VOLUME_PER_LIQUIDITY);
    }
}
