use crate::error::MathError;
use alloy_primitives::U256;

const U256_TWO: U256 = U256::from_limbs([2, 0, 0, 0]);
const U256_THREE: U256 = U256::from_limbs([3, 0, 0, 0]);

#[cold]
#[inline(always)]
const fn cold_path() {}

/// Branch hint for conditions that are almost never true (error guards in
/// hot loops). Stable equivalent of the compiler intrinsic.
#[inline(always)]
pub(crate) const fn unlikely(b: bool) -> bool {
    if b {
        cold_path();
    }
    b
}

#[inline(always)]
pub(crate) const fn likely(b: bool) -> bool {
    if !b {
        cold_path();
    }
    b
}

/// Computes `a * b / denominator` with full 512-bit intermediate
/// precision, returning `MathError` on overflow or a zero denominator.
///
/// The result is floored. Most of the swap and liquidity arithmetic in
/// this crate funnels through here.
#[inline(always)]
pub fn mul_div(a: U256, b: U256, mut denominator: U256) -> Result<U256, MathError> {
    if unlikely(denominator.is_zero()) {
        return Err(MathError::DivisionByZero);
    }

    // 512-bit product as (prod1, prod0) via Chinese-remainder trick.
    let mm = a.mul_mod(b, U256::MAX);
    let mut prod0 = a.wrapping_mul(b);
    let (mut prod1, borrow) = mm.overflowing_sub(prod0);
    if borrow {
        prod1 = prod1.wrapping_sub(crate::U256_1);
    }

    // Short circuit: product fits in 256 bits.
    if likely(prod1.is_zero()) {
        return Ok(prod0.wrapping_div(denominator));
    }

    if unlikely(denominator <= prod1) {
        return Err(MathError::Overflow);
    }

    // Subtract the remainder so (prod1, prod0) is an exact multiple.
    let remainder = a.mul_mod(b, denominator);
    let (sub, borrow) = prod0.overflowing_sub(remainder);
    prod0 = sub;
    if borrow {
        prod1 = prod1.wrapping_sub(crate::U256_1);
    }

    // Factor powers of two out of the denominator.
    let twos = denominator & denominator.wrapping_neg();
    denominator = denominator.wrapping_div(twos);
    prod0 = prod0.wrapping_div(twos);
    prod0 |= prod1.wrapping_mul(
        twos.wrapping_neg()
            .wrapping_div(twos)
            .wrapping_add(crate::U256_1),
    );

    // Modular inverse of the now-odd denominator, six Newton steps.
    let mut inv = U256_THREE.wrapping_mul(denominator) ^ U256_TWO;
    for _ in 0..6 {
        inv = inv.wrapping_mul(U256_TWO.wrapping_sub(denominator.wrapping_mul(inv)));
    }

    Ok(prod0.wrapping_mul(inv))
}

/// Like [`mul_div`], but rounds up when the division leaves a remainder.
#[inline(always)]
pub fn mul_div_rounding_up(a: U256, b: U256, denominator: U256) -> Result<U256, MathError> {
    let mut result = mul_div(a, b, denominator)?;

    if a.mul_mod(b, denominator) > U256::ZERO {
        if result >= U256::MAX {
            return Err(MathError::Overflow);
        }
        result += U256::ONE;
    }
    Ok(result)
}

/// Divides `a` by `b`, rounding up on a non-zero remainder.
///
/// Panics on `b == 0`, mirroring primitive integer division; callers must
/// guarantee a non-zero divisor.
#[inline(always)]
pub fn div_rounding_up(a: U256, b: U256) -> U256 {
    let (quotient, remainder) = a.div_rem(b);
    if remainder.is_zero() {
        quotient
    } else {
        quotient + U256::ONE
    }
}
