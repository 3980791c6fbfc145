use crate::error::{Error, MathError, StateError};
use crate::math::liquidity_math::add_delta;
use crate::FastMap;
use alloy_primitives::U256;

/// Bookkeeping record of one tick that has received liquidity.
///
/// The `outer_*` accumulators hold the portion of each global running
/// sum attributed to the far side of this tick, as of the last cross.
/// Only differences of these values are meaningful; a value within a
/// range is obtained by subtracting the two boundary snapshots from the
/// global total. Records are never deleted, even when all liquidity
/// referencing the tick is withdrawn, so old snapshots stay subtractable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tick {
    /// Total liquidity referencing this tick from either side.
    pub liquidity_gross: u128,
    /// Net change in active liquidity when the price crosses this tick
    /// left to right.
    pub liquidity_net: i128,
    pub outer_fee_growth0: U256,
    pub outer_fee_growth1: U256,
    pub outer_tick_cumulative: i64,
    pub outer_seconds_per_liquidity: U256,
    pub outer_seconds_spent: u32,
}

/// Registers a liquidity change against one boundary tick of a range.
///
/// `upper` picks the sign convention: liquidity added at a lower tick
/// comes into range when the price rises past it, liquidity added at an
/// upper tick leaves. A tick first entering the book snapshots the
/// current accumulators when it sits at or below the current tick, so
/// its "outer" values start consistent with the subtraction scheme.
///
/// Returns whether the tick flipped between referenced and unreferenced,
/// which is when the caller must toggle the bitmap bit.
#[allow(clippy::too_many_arguments)]
pub fn update(
    data: &mut Tick,
    tick: i32,
    current_tick: i32,
    liquidity_delta: i128,
    total_fee_growth0: U256,
    total_fee_growth1: U256,
    seconds_per_liquidity_cumulative: U256,
    tick_cumulative: i64,
    time: u32,
    upper: bool,
) -> Result<bool, Error> {
    let liquidity_gross_before = data.liquidity_gross;
    let liquidity_gross_after = add_delta(liquidity_gross_before, liquidity_delta)?;

    if liquidity_gross_before == 0 && tick <= current_tick {
        data.outer_fee_growth0 = total_fee_growth0;
        data.outer_fee_growth1 = total_fee_growth1;
        data.outer_seconds_per_liquidity = seconds_per_liquidity_cumulative;
        data.outer_tick_cumulative = tick_cumulative;
        data.outer_seconds_spent = time;
    }

    data.liquidity_gross = liquidity_gross_after;
    data.liquidity_net = if upper {
        data.liquidity_net
            .checked_sub(liquidity_delta)
            .ok_or(MathError::Overflow)?
    } else {
        data.liquidity_net
            .checked_add(liquidity_delta)
            .ok_or(MathError::Overflow)?
    };

    Ok((liquidity_gross_after == 0) != (liquidity_gross_before == 0))
}

/// Crosses `tick`, flipping every outer accumulator to its new far-side
/// value (`outer = global - outer`) and returning the tick's net
/// liquidity delta.
///
/// The swap loop negates the returned delta when the price is moving
/// down (token0 -> token1). Subtraction wraps: outer values are relative
/// snapshots, only their differences carry meaning.
pub fn cross(
    ticks: &mut FastMap<i32, Tick>,
    tick: i32,
    total_fee_growth0: U256,
    total_fee_growth1: U256,
    seconds_per_liquidity_cumulative: U256,
    tick_cumulative: i64,
    time: u32,
) -> Result<i128, Error> {
    let data = ticks
        .get_mut(&tick)
        .ok_or(StateError::TickNotFound)?;

    data.outer_seconds_spent = time.wrapping_sub(data.outer_seconds_spent);
    data.outer_seconds_per_liquidity =
        seconds_per_liquidity_cumulative.wrapping_sub(data.outer_seconds_per_liquidity);
    data.outer_tick_cumulative = tick_cumulative.wrapping_sub(data.outer_tick_cumulative);
    data.outer_fee_growth0 = total_fee_growth0.wrapping_sub(data.outer_fee_growth0);
    data.outer_fee_growth1 = total_fee_growth1.wrapping_sub(data.outer_fee_growth1);

    Ok(data.liquidity_net)
}
