use crate::error::MathError;
use alloy_primitives::U256;

/// Index (0-255) of the highest set bit of `x`, or `MathError::ZeroValue`
/// when `x` is zero.
pub fn most_significant_bit(x: U256) -> Result<u8, MathError> {
    if x.is_zero() {
        return Err(MathError::ZeroValue);
    }
    Ok(255 - x.leading_zeros() as u8)
}

/// Index (0-255) of the lowest set bit of `x`, or `MathError::ZeroValue`
/// when `x` is zero.
///
/// The bitmap search uses this to find the first initialized tick when
/// scanning towards higher ticks.
pub fn least_significant_bit(x: U256) -> Result<u8, MathError> {
    if x.is_zero() {
        return Err(MathError::ZeroValue);
    }
    Ok(x.trailing_zeros() as u8)
}
