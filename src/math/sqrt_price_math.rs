use crate::error::{Error, MathError, StateError};
use crate::math::math_helpers::{div_rounding_up, mul_div, mul_div_rounding_up, unlikely};
use crate::{Q96, RESOLUTION, U160_MAX};
use alloy_primitives::{I256, U256};

/// Next sqrt price after adding (`add = true`) or removing an `amount`
/// of token0 at `price` with the given liquidity. Rounds up so the pool
/// never gives out more than it received.
pub fn get_next_sqrt_price_from_amount_0_rounding_up(
    price: U256,
    liquidity: u128,
    amount: U256,
    add: bool,
) -> Result<U256, Error> {
    if amount.is_zero() {
        return Ok(price);
    }

    let numerator = U256::from(liquidity) << RESOLUTION;
    let product = amount.wrapping_mul(price);

    if add {
        // Precise path only when amount * price does not overflow.
        if product.wrapping_div(amount) == price {
            let denominator = numerator + product;
            if denominator >= numerator {
                return mul_div_rounding_up(numerator, price, denominator).map_err(Error::from);
            }
        }
        Ok(div_rounding_up(numerator, (numerator / price) + amount))
    } else {
        if product.wrapping_div(amount) != price || numerator <= product {
            return Err(StateError::InsufficientReserves.into());
        }
        let denominator = numerator - product;
        mul_div_rounding_up(numerator, price, denominator).map_err(Error::from)
    }
}

/// Next sqrt price after adding or removing an `amount` of token1.
/// Rounds down, again in the pool's favor.
pub fn get_next_sqrt_price_from_amount_1_rounding_down(
    price: U256,
    liquidity: u128,
    amount: U256,
    add: bool,
) -> Result<U256, Error> {
    let liquidity = U256::from(liquidity);
    if add {
        let quotient = if amount <= U160_MAX {
            (amount << RESOLUTION) / liquidity
        } else {
            mul_div(amount, Q96, liquidity)?
        };

        let result = price + quotient;
        if result <= U160_MAX {
            Ok(result)
        } else {
            Err(MathError::Overflow.into())
        }
    } else {
        let quotient = if amount <= U160_MAX {
            div_rounding_up(amount << RESOLUTION, liquidity)
        } else {
            mul_div_rounding_up(amount, Q96, liquidity)?
        };

        if price <= quotient {
            return Err(StateError::InsufficientReserves.into());
        }
        // always fits 160 bits, price did before
        Ok(price - quotient)
    }
}

/// Token0 amount between two sqrt prices at the given liquidity,
/// `liquidity / sqrt(lower) - liquidity / sqrt(upper)`.
pub fn get_amount_0_delta_base(
    mut price_a: U256,
    mut price_b: U256,
    liquidity: u128,
    round_up: bool,
) -> Result<U256, Error> {
    if price_a > price_b {
        (price_a, price_b) = (price_b, price_a);
    }
    if price_a.is_zero() {
        return Err(StateError::SqrtRatioIsZero.into());
    }

    let numerator1 = U256::from(liquidity) << RESOLUTION;
    let numerator2 = price_b - price_a;

    if round_up {
        Ok(div_rounding_up(
            mul_div_rounding_up(numerator1, numerator2, price_b)?,
            price_a,
        ))
    } else {
        Ok(mul_div(numerator1, numerator2, price_b)? / price_a)
    }
}

/// Token1 amount between two sqrt prices at the given liquidity,
/// `liquidity * (sqrt(upper) - sqrt(lower))`.
pub fn get_amount_1_delta_base(
    mut price_a: U256,
    mut price_b: U256,
    liquidity: u128,
    round_up: bool,
) -> Result<U256, MathError> {
    if price_a > price_b {
        (price_a, price_b) = (price_b, price_a);
    }
    let liquidity = U256::from(liquidity);

    if round_up {
        mul_div_rounding_up(liquidity, price_b - price_a, Q96)
    } else {
        mul_div(liquidity, price_b - price_a, Q96)
    }
}

/// Signed token0 delta for a signed liquidity change; negative liquidity
/// rounds down (amount owed to the caller), positive rounds up.
pub fn get_amount_0_delta(
    price_a: U256,
    price_b: U256,
    liquidity: i128,
) -> Result<I256, Error> {
    if liquidity < 0 {
        Ok(-I256::from_raw(get_amount_0_delta_base(
            price_a,
            price_b,
            liquidity.unsigned_abs(),
            false,
        )?))
    } else {
        Ok(I256::from_raw(get_amount_0_delta_base(
            price_a,
            price_b,
            liquidity as u128,
            true,
        )?))
    }
}

/// Signed token1 delta for a signed liquidity change.
pub fn get_amount_1_delta(
    price_a: U256,
    price_b: U256,
    liquidity: i128,
) -> Result<I256, MathError> {
    if liquidity < 0 {
        Ok(-I256::from_raw(get_amount_1_delta_base(
            price_a,
            price_b,
            liquidity.unsigned_abs(),
            false,
        )?))
    } else {
        Ok(I256::from_raw(get_amount_1_delta_base(
            price_a,
            price_b,
            liquidity as u128,
            true,
        )?))
    }
}

/// Next sqrt price after consuming `amount_in` of the input token in the
/// given direction.
pub fn get_next_sqrt_price_from_input(
    price: U256,
    liquidity: u128,
    amount_in: U256,
    zero_to_one: bool,
) -> Result<U256, Error> {
    if unlikely(price.is_zero()) {
        return Err(StateError::SqrtPriceIsZero.into());
    }
    if unlikely(liquidity == 0) {
        return Err(StateError::LiquidityIsZero.into());
    }

    if zero_to_one {
        get_next_sqrt_price_from_amount_0_rounding_up(price, liquidity, amount_in, true)
    } else {
        get_next_sqrt_price_from_amount_1_rounding_down(price, liquidity, amount_in, true)
    }
}

/// Next sqrt price after paying out `amount_out` of the output token in
/// the given direction.
pub fn get_next_sqrt_price_from_output(
    price: U256,
    liquidity: u128,
    amount_out: U256,
    zero_to_one: bool,
) -> Result<U256, Error> {
    if unlikely(price.is_zero()) {
        return Err(StateError::SqrtPriceIsZero.into());
    }
    if unlikely(liquidity == 0) {
        return Err(StateError::LiquidityIsZero.into());
    }

    if zero_to_one {
        get_next_sqrt_price_from_amount_1_rounding_down(price, liquidity, amount_out, false)
    } else {
        get_next_sqrt_price_from_amount_0_rounding_up(price, liquidity, amount_out, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn q96() -> U256 {
        U256::from_str("79228162514264337593543950336").unwrap()
    }

    #[test]
    fn next_price_from_input_guards() {
        let amount = U256::from(100_000u64);
        assert!(matches!(
            get_next_sqrt_price_from_input(U256::ZERO, 1, amount, true),
            Err(Error::StateError(StateError::SqrtPriceIsZero))
        ));
        assert!(matches!(
            get_next_sqrt_price_from_input(q96(), 0, amount, true),
            Err(Error::StateError(StateError::LiquidityIsZero))
        ));
    }

    #[test]
    fn next_price_from_input_zero_amount_is_identity() {
        for zero_to_one in [true, false] {
            let result =
                get_next_sqrt_price_from_input(q96(), 1e17 as u128, U256::ZERO, zero_to_one)
                    .unwrap();
            assert_eq!(result, q96());
        }
    }

    #[test]
    fn next_price_from_input_reference_values() {
        // 0.1 token1 in: price rises
        let result = get_next_sqrt_price_from_input(
            q96(),
            1e18 as u128,
            U256::from(100000000000000000u128),
            false,
        )
        .unwrap();
        assert_eq!(
            result,
            U256::from_str("87150978765690771352898345369").unwrap()
        );

        // 0.1 token0 in: price falls
        let result = get_next_sqrt_price_from_input(
            q96(),
            1e18 as u128,
            U256::from(100000000000000000u128),
            true,
        )
        .unwrap();
        assert_eq!(
            result,
            U256::from_str("72025602285694852357767227579").unwrap()
        );
    }

    #[test]
    fn next_price_from_input_cannot_underflow() {
        let result = get_next_sqrt_price_from_input(
            U256::ONE,
            1,
            U256::MAX >> 1usize,
            true,
        )
        .unwrap();
        assert_eq!(result, U256::ONE);
    }

    #[test]
    fn next_price_from_input_overflow_rejected() {
        let result = get_next_sqrt_price_from_input(U160_MAX, 1024, U256::from(1024u64), false);
        assert!(matches!(result, Err(Error::MathError(MathError::Overflow))));
    }

    #[test]
    fn next_price_from_output_guards() {
        assert!(matches!(
            get_next_sqrt_price_from_output(U256::ZERO, 1, U256::from(1u8), false),
            Err(Error::StateError(StateError::SqrtPriceIsZero))
        ));
        assert!(matches!(
            get_next_sqrt_price_from_output(q96(), 0, U256::from(1u8), false),
            Err(Error::StateError(StateError::LiquidityIsZero))
        ));
    }

    #[test]
    fn next_price_from_output_insufficient_reserves() {
        // asking for more token1 out than the range holds
        let result = get_next_sqrt_price_from_output(
            U256::from(20282409603651670423947251286016u128),
            1024,
            U256::from(262145u64),
            true,
        );
        assert!(matches!(
            result,
            Err(Error::StateError(StateError::InsufficientReserves))
        ));
    }

    #[test]
    fn next_price_from_output_reference_value() {
        // 0.1 token1 out: price falls
        let result = get_next_sqrt_price_from_output(
            q96(),
            1e18 as u128,
            U256::from(100000000000000000u128),
            true,
        )
        .unwrap();
        assert_eq!(
            result,
            U256::from_str("71305346262837903834189555302").unwrap()
        );
    }

    #[test]
    fn amount_0_delta_orders_prices() {
        let lo = q96();
        let hi = U256::from_str("87150978765690771352898345369").unwrap();
        let a = get_amount_0_delta_base(lo, hi, 1e18 as u128, true).unwrap();
        let b = get_amount_0_delta_base(hi, lo, 1e18 as u128, true).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn amount_0_delta_reference_value() {
        // price 1 -> 121/100, liquidity 1e18
        let hi = U256::from_str("87150978765690771352898345369").unwrap();
        let amount = get_amount_0_delta_base(q96(), hi, 1e18 as u128, true).unwrap();
        assert_eq!(amount, U256::from_str("90909090909090910").unwrap());

        let rounded_down = get_amount_0_delta_base(q96(), hi, 1e18 as u128, false).unwrap();
        assert_eq!(rounded_down, amount - U256::ONE);
    }

    #[test]
    fn amount_1_delta_reference_value() {
        let hi = U256::from_str("87150978765690771352898345369").unwrap();
        let amount = get_amount_1_delta_base(q96(), hi, 1e18 as u128, true).unwrap();
        assert_eq!(amount, U256::from_str("100000000000000000").unwrap());

        let rounded_down = get_amount_1_delta_base(q96(), hi, 1e18 as u128, false).unwrap();
        assert_eq!(rounded_down, amount - U256::ONE);
    }

    #[test]
    fn amount_0_delta_zero_liquidity_or_width() {
        let amount = get_amount_0_delta_base(q96(), q96(), 1e18 as u128, true).unwrap();
        assert_eq!(amount, U256::ZERO);
        let amount = get_amount_0_delta_base(q96(), q96() * U256::from(2u8), 0, true).unwrap();
        assert_eq!(amount, U256::ZERO);
    }

    #[test]
    fn signed_deltas_flip_sign_with_liquidity() {
        let hi = U256::from_str("87150978765690771352898345369").unwrap();
        let added = get_amount_0_delta(q96(), hi, 1_000_000i128).unwrap();
        let removed = get_amount_0_delta(q96(), hi, -1_000_000i128).unwrap();
        assert!(added > I256::ZERO);
        assert!(removed < I256::ZERO);
        // rounding favors the pool: pay in at least as much as you get out
        assert!(added >= -removed);

        let added = get_amount_1_delta(q96(), hi, 1_000_000i128).unwrap();
        let removed = get_amount_1_delta(q96(), hi, -1_000_000i128).unwrap();
        assert!(added >= -removed);
    }
}
