use crate::error::Error;
use crate::math::math_helpers::{mul_div, mul_div_rounding_up};
use crate::math::sqrt_price_math::{
    get_amount_0_delta_base, get_amount_1_delta_base, get_next_sqrt_price_from_input,
    get_next_sqrt_price_from_output,
};
use crate::{FEE_DENOMINATOR, U256_E6};
use alloy_primitives::{I256, U256};

/// Moves the price from `current_price` towards `target_price` as far as
/// the remaining amount allows, within a single liquidity range.
///
/// `amount_remaining >= 0` means exact input (fee comes out of the input
/// token), negative means exact output. `fee` is in hundredths of a
/// basis point. Returns `(next_price, amount_in, amount_out, fee_amount)`;
/// the direction is implied by which side of `current_price` the target
/// lies on.
pub fn compute_swap_step(
    current_price: U256,
    target_price: U256,
    liquidity: u128,
    amount_remaining: I256,
    fee: u32,
) -> Result<(U256, U256, U256, U256), Error> {
    let zero_to_one = current_price >= target_price;
    let exact_in = !amount_remaining.is_negative();

    let next_price: U256;
    let mut amount_in = U256::ZERO;
    let mut amount_out = U256::ZERO;

    if exact_in {
        let amount_remaining_less_fee = mul_div(
            amount_remaining.into_raw(),
            U256::from(FEE_DENOMINATOR - fee),
            U256_E6,
        )?;

        // Input needed to reach the target boundary.
        amount_in = if zero_to_one {
            get_amount_0_delta_base(target_price, current_price, liquidity, true)?
        } else {
            get_amount_1_delta_base(current_price, target_price, liquidity, true)?
        };

        next_price = if amount_remaining_less_fee >= amount_in {
            target_price
        } else {
            get_next_sqrt_price_from_input(
                current_price,
                liquidity,
                amount_remaining_less_fee,
                zero_to_one,
            )?
        };
    } else {
        amount_out = if zero_to_one {
            get_amount_1_delta_base(target_price, current_price, liquidity, false)?
        } else {
            get_amount_0_delta_base(current_price, target_price, liquidity, false)?
        };

        let requested = (-amount_remaining).into_raw();
        next_price = if requested >= amount_out {
            target_price
        } else {
            get_next_sqrt_price_from_output(current_price, liquidity, requested, zero_to_one)?
        };
    }

    let reached_target = next_price == target_price;

    // Recompute the amounts actually moved over [next_price, current_price];
    // whichever leg was already exact above is left untouched.
    if zero_to_one {
        if !reached_target || !exact_in {
            amount_in = get_amount_0_delta_base(next_price, current_price, liquidity, true)?;
        }
        if !reached_target || exact_in {
            amount_out = get_amount_1_delta_base(next_price, current_price, liquidity, false)?;
        }
    } else {
        if !reached_target || !exact_in {
            amount_in = get_amount_1_delta_base(current_price, next_price, liquidity, true)?;
        }
        if !reached_target || exact_in {
            amount_out = get_amount_0_delta_base(current_price, next_price, liquidity, false)?;
        }
    }

    // Exact output never pays out more than requested (rounding guard).
    if !exact_in {
        let requested = (-amount_remaining).into_raw();
        if amount_out > requested {
            amount_out = requested;
        }
    }

    let fee_amount = if exact_in && !reached_target {
        // Stopped short of the boundary: the entire leftover is the fee.
        amount_remaining.into_raw() - amount_in
    } else {
        mul_div_rounding_up(amount_in, U256::from(fee), U256::from(FEE_DENOMINATOR - fee))?
    };

    Ok((next_price, amount_in, amount_out, fee_amount))
}
