use crate::error::MathError;

/// Applies a signed liquidity delta to the current in-range liquidity.
///
/// Liquidity is a non-negative quantity: the operation fails with
/// `Underflow` before the result would go below zero, and with `Overflow`
/// past `u128::MAX`.
pub fn add_delta(x: u128, y: i128) -> Result<u128, MathError> {
    if y < 0 {
        x.checked_sub(y.unsigned_abs()).ok_or(MathError::Underflow)
    } else {
        x.checked_add(y as u128).ok_or(MathError::Overflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn applies_positive_delta() {
        assert_eq!(add_delta(100, 25).unwrap(), 125);
    }

    #[test]
    fn applies_negative_delta() {
        assert_eq!(add_delta(100, -25).unwrap(), 75);
    }

    #[test]
    fn zero_delta_is_identity() {
        assert_eq!(add_delta(987_654_321, 0).unwrap(), 987_654_321);
    }

    #[test]
    fn drains_to_exactly_zero() {
        assert_eq!(add_delta(1_000, -1_000).unwrap(), 0);
    }

    #[test]
    fn rejects_underflow() {
        assert!(matches!(add_delta(100, -101), Err(MathError::Underflow)));
        assert!(matches!(add_delta(0, -1), Err(MathError::Underflow)));
        assert!(matches!(add_delta(0, i128::MIN), Err(MathError::Underflow)));
    }

    #[test]
    fn rejects_overflow() {
        assert!(matches!(add_delta(u128::MAX, 1), Err(MathError::Overflow)));
        assert!(matches!(
            add_delta(u128::MAX - 5, 6),
            Err(MathError::Overflow)
        ));
    }

    proptest! {
        #[test]
        fn delta_then_inverse_restores(x in any::<u64>(), y in any::<i64>()) {
            let x = x as u128;
            let y = y as i128;
            if let Ok(z) = add_delta(x, y) {
                prop_assert_eq!(add_delta(z, -y).unwrap(), x);
            }
        }

        #[test]
        fn never_negative(x in any::<u128>(), y in any::<i128>()) {
            // either errors, or returns a valid non-negative liquidity
            // matching plain integer arithmetic
            match add_delta(x, y) {
                Ok(z) => {
                    let expected = (x as i128).checked_add(y);
                    if let Some(e) = expected {
                        if e >= 0 {
                            prop_assert_eq!(z as i128, e);
                        }
                    }
                }
                Err(e) => prop_assert!(matches!(
                    e,
                    MathError::Underflow | MathError::Overflow
                )),
            }
        }
    }
}
