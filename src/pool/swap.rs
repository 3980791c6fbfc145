use crate::error::{Error, StateError};
use crate::math::liquidity_math::add_delta;
use crate::math::math_helpers::{mul_div, unlikely};
use crate::math::sqrt_price_math::{get_amount_0_delta_base, get_amount_1_delta_base};
use crate::math::swap_math::compute_swap_step;
use crate::math::tick_bitmap::next_initialized_tick_within_one_word;
use crate::math::tick_math::{
    get_sqrt_ratio_at_tick, get_tick_at_sqrt_ratio, MAX_SQRT_RATIO, MAX_TICK, MIN_SQRT_RATIO,
    MIN_TICK,
};
use crate::math::volume_math::volume_per_liquidity;
use crate::pool::fee::{FeePolicy, MAX_FEE};
use crate::pool::state::{PoolState, COMMUNITY_FEE_DENOMINATOR};
use crate::pool::tick;
use crate::{FEE_DENOMINATOR, Q128, U256_E6};
use alloy_primitives::{I256, U256};
use tracing::{debug, trace};

/// One swap request.
#[derive(Copy, Clone, Debug)]
pub struct SwapParams {
    /// Direction: `true` for token0 -> token1 (price falls), `false` for
    /// token1 -> token0 (price rises).
    pub zero_to_one: bool,
    /// Signed amount. Positive fixes the input ("exact input"), negative
    /// fixes the output ("exact output").
    pub amount_required: I256,
    /// Q64.96 sqrt price the trajectory must not move past. Must lie
    /// strictly between the current price and the global bound on the
    /// direction's side.
    pub limit_price: U256,
}

impl SwapParams {
    #[inline]
    pub fn new(zero_to_one: bool, amount_required: I256, limit_price: U256) -> Self {
        Self {
            zero_to_one,
            amount_required,
            limit_price,
        }
    }
}

/// Settlement of a completed swap. `amount0`/`amount1` are from the
/// pool's point of view: positive flows in, negative flows out. Token
/// transfers themselves are the caller's job.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SwapResult {
    pub amount0: I256,
    pub amount1: I256,
    /// Price, tick and liquidity after the swap.
    pub price: U256,
    pub tick: i32,
    pub liquidity: u128,
    /// Total fee charged, in the input token, community share included.
    pub fees_paid: U256,
    /// Portion of `fees_paid` owed to the community pot.
    pub community_fee: U256,
}

// Values fixed for the duration of one swap call, plus the lazily
// fetched oracle snapshot the first tick crossing needs.
struct SwapCalculationCache {
    fee: u32,
    community_fee: u32,
    exact_input: bool,
    start_tick: i32,
    liquidity_start: u128,
    amount_required_initial: I256,
    timepoint_index: u16,
    computed_latest_timepoint: bool,
    tick_cumulative: i64,
    seconds_per_liquidity_cumulative: U256,
}

// State of one loop iteration.
#[derive(Default)]
struct PriceMovementStep {
    start_price: U256,
    next_tick: i32,
    initialized: bool,
    next_tick_price: U256,
    input: U256,
    output: U256,
    fee_amount: U256,
}

// Running totals across iterations; becomes the committed state.
struct SwapState {
    amount_required: I256,
    amount_calculated: I256,
    price: U256,
    tick: i32,
    liquidity: u128,
    fees_paid: U256,
    community_fee: U256,
    fee_growth: U256,
    crossings: Vec<Crossing>,
}

// A tick crossed mid-loop, with the global accumulator values in force
// at that moment; replayed into the registry at commit time.
struct Crossing {
    tick: i32,
    fee_growth0: U256,
    fee_growth1: U256,
    seconds_per_liquidity: U256,
    tick_cumulative: i64,
}

impl PoolState {
    /// Executes one swap against the pool.
    ///
    /// The unlocked flag guards against re-entry and is restored on
    /// every exit path; all intermediate state is buffered and committed
    /// in one step at the end, so a failed swap leaves the pool exactly
    /// as it was. `block_timestamp` drives the oracle: the first swap of
    /// each block writes a timepoint and refreshes the dynamic fee
    /// through `fee_policy`.
    pub fn swap<F: FeePolicy>(
        &mut self,
        params: SwapParams,
        fee_policy: &F,
        block_timestamp: u32,
    ) -> Result<SwapResult, Error> {
        if !self.global_state.unlocked {
            return Err(StateError::Reentrant.into());
        }
        self.global_state.unlocked = false;
        let result = self.swap_locked(params, fee_policy, block_timestamp);
        self.global_state.unlocked = true;
        result
    }

    fn swap_locked<F: FeePolicy>(
        &mut self,
        params: SwapParams,
        fee_policy: &F,
        block_timestamp: u32,
    ) -> Result<SwapResult, Error> {
        if unlikely(params.amount_required.is_zero()) {
            return Err(StateError::ZeroAmount.into());
        }

        let gs = self.global_state;
        let zero_to_one = params.zero_to_one;

        // the limit must sit strictly between the current price and the
        // global bound on the direction's side, checked before anything
        // else happens
        if zero_to_one {
            if unlikely(params.limit_price >= gs.price || params.limit_price <= MIN_SQRT_RATIO) {
                return Err(StateError::InvalidLimit.into());
            }
        } else if unlikely(params.limit_price <= gs.price || params.limit_price >= MAX_SQRT_RATIO)
        {
            return Err(StateError::InvalidLimit.into());
        }

        let mut cache = SwapCalculationCache {
            fee: if zero_to_one { gs.fee_zto } else { gs.fee_otz } as u32,
            community_fee: if zero_to_one {
                gs.community_fee_token0
            } else {
                gs.community_fee_token1
            } as u32,
            exact_input: params.amount_required.is_positive(),
            start_tick: gs.tick,
            liquidity_start: self.liquidity,
            amount_required_initial: params.amount_required,
            timepoint_index: gs.timepoint_index,
            computed_latest_timepoint: false,
            tick_cumulative: 0,
            seconds_per_liquidity_cumulative: U256::ZERO,
        };

        // the block's timepoint, buffered until commit
        let pending_timepoint = self.oracle.prepare_write(
            gs.timepoint_index,
            block_timestamp,
            gs.tick,
            self.liquidity,
            self.volume_per_liquidity_in_block,
        )?;

        let mut fees = (gs.fee_zto, gs.fee_otz);
        let mut volume_accumulator = self.volume_per_liquidity_in_block;
        if let Some((new_index, _)) = pending_timepoint {
            // first swap of this block: refresh the dynamic fee and start
            // a fresh per-block volume accumulator. The policy is handed
            // the last committed ring index; the block's own slot is
            // still buffered and the oracle projects current values from
            // the committed history.
            let (fee_zto, fee_otz) = fee_policy.get_fees(
                &self.oracle,
                block_timestamp,
                gs.tick,
                gs.timepoint_index,
                self.liquidity,
            );
            fees = (fee_zto.min(MAX_FEE), fee_otz.min(MAX_FEE));
            cache.fee = if zero_to_one { fees.0 } else { fees.1 } as u32;
            cache.timepoint_index = new_index;
            volume_accumulator = 0;
            debug!(
                fee_zto = fees.0,
                fee_otz = fees.1,
                timepoint_index = new_index,
                "fee refreshed for new block"
            );
        }

        let mut state = SwapState {
            amount_required: params.amount_required,
            amount_calculated: I256::ZERO,
            price: gs.price,
            tick: gs.tick,
            liquidity: self.liquidity,
            fees_paid: U256::ZERO,
            community_fee: U256::ZERO,
            fee_growth: U256::ZERO,
            crossings: Vec::new(),
        };

        while state.amount_required != I256::ZERO && state.price != params.limit_price {
            let mut step = PriceMovementStep {
                start_price: state.price,
                ..PriceMovementStep::default()
            };

            (step.next_tick, step.initialized) = next_initialized_tick_within_one_word(
                &self.tick_bitmap,
                state.tick,
                self.tick_spacing,
                zero_to_one,
            )?;
            step.next_tick = step.next_tick.clamp(MIN_TICK, MAX_TICK);
            step.next_tick_price = get_sqrt_ratio_at_tick(step.next_tick)?;

            // move no further than the caller's limit
            let target_price = if zero_to_one {
                step.next_tick_price.max(params.limit_price)
            } else {
                step.next_tick_price.min(params.limit_price)
            };

            (state.price, step.input, step.output, step.fee_amount) = compute_swap_step(
                state.price,
                target_price,
                state.liquidity,
                state.amount_required,
                cache.fee,
            )?;
            trace!(
                next_tick = step.next_tick,
                initialized = step.initialized,
                input = %step.input,
                output = %step.output,
                "price movement step"
            );

            if cache.exact_input {
                state.amount_required -= I256::from_raw(step.input + step.fee_amount);
                state.amount_calculated -= I256::from_raw(step.output);
            } else {
                state.amount_required += I256::from_raw(step.output);
                state.amount_calculated += I256::from_raw(step.input + step.fee_amount);
            }

            state.fees_paid += step.fee_amount;
            let mut growth_fee = step.fee_amount;
            if cache.community_fee > 0 {
                let delta = growth_fee * U256::from(cache.community_fee)
                    / U256::from(COMMUNITY_FEE_DENOMINATOR);
                growth_fee -= delta;
                state.community_fee += delta;
            }
            if state.liquidity > 0 {
                state.fee_growth += mul_div(growth_fee, Q128, U256::from(state.liquidity))?;
            }

            if state.price == step.next_tick_price {
                if step.initialized {
                    // the oracle snapshot for crossing is fetched once per
                    // swap, at the first crossed tick
                    if !cache.computed_latest_timepoint {
                        let cumulatives = self.oracle.get_single_timepoint(
                            block_timestamp,
                            0,
                            cache.start_tick,
                            gs.timepoint_index,
                            cache.liquidity_start,
                        )?;
                        cache.tick_cumulative = cumulatives.tick_cumulative;
                        cache.seconds_per_liquidity_cumulative =
                            cumulatives.seconds_per_liquidity_cumulative;
                        cache.computed_latest_timepoint = true;
                    }

                    let (fee_growth0, fee_growth1) = if zero_to_one {
                        (
                            self.total_fee_growth0 + state.fee_growth,
                            self.total_fee_growth1,
                        )
                    } else {
                        (
                            self.total_fee_growth0,
                            self.total_fee_growth1 + state.fee_growth,
                        )
                    };
                    state.crossings.push(Crossing {
                        tick: step.next_tick,
                        fee_growth0,
                        fee_growth1,
                        seconds_per_liquidity: cache.seconds_per_liquidity_cumulative,
                        tick_cumulative: cache.tick_cumulative,
                    });

                    let mut liquidity_net = self
                        .ticks
                        .get(&step.next_tick)
                        .ok_or(StateError::TickNotFound)?
                        .liquidity_net;
                    if zero_to_one {
                        liquidity_net = -liquidity_net;
                    }
                    state.liquidity = add_delta(state.liquidity, liquidity_net)?;
                }
                state.tick = if zero_to_one {
                    step.next_tick - 1
                } else {
                    step.next_tick
                };
            } else if state.price != step.start_price {
                // stopped inside a range (amount exhausted or limit hit):
                // derive the tick from the price
                state.tick = get_tick_at_sqrt_ratio(state.price)?;
            }
        }

        let (amount0, amount1) = if zero_to_one == cache.exact_input {
            (
                cache.amount_required_initial - state.amount_required,
                state.amount_calculated,
            )
        } else {
            (
                state.amount_calculated,
                cache.amount_required_initial - state.amount_required,
            )
        };

        // single commit point: everything above operated on copies
        if let Some((new_index, timepoint)) = pending_timepoint {
            self.oracle.store(new_index, timepoint);
        }
        for crossing in &state.crossings {
            tick::cross(
                &mut self.ticks,
                crossing.tick,
                crossing.fee_growth0,
                crossing.fee_growth1,
                crossing.seconds_per_liquidity,
                crossing.tick_cumulative,
                block_timestamp,
            )?;
        }
        self.global_state.price = state.price;
        self.global_state.tick = state.tick;
        self.global_state.timepoint_index = cache.timepoint_index;
        self.global_state.fee_zto = fees.0;
        self.global_state.fee_otz = fees.1;
        self.liquidity = state.liquidity;
        self.volume_per_liquidity_in_block =
            volume_accumulator.saturating_add(volume_per_liquidity(state.liquidity, amount0, amount1));
        if zero_to_one {
            self.total_fee_growth0 += state.fee_growth;
        } else {
            self.total_fee_growth1 += state.fee_growth;
        }

        debug!(
            amount0 = %amount0,
            amount1 = %amount1,
            crossed = state.crossings.len(),
            fees = %state.fees_paid,
            "swap finalized"
        );

        Ok(SwapResult {
            amount0,
            amount1,
            price: state.price,
            tick: state.tick,
            liquidity: state.liquidity,
            fees_paid: state.fees_paid,
            community_fee: state.community_fee,
        })
    }

    /// Dry-run swap tables: simulates up to `max_steps` consecutive
    /// tick-to-tick moves in each direction and reports, per step, the
    /// boundary tick, its price, the liquidity in force and the amounts
    /// a swap traversing the full step would inject and receive. Pure:
    /// no pool state is touched. Returned as
    /// `(token0 -> token1 table, token1 -> token0 table)`.
    pub fn max_swap_tables(
        &self,
        max_steps: usize,
    ) -> Result<(Vec<SwapTableEntry>, Vec<SwapTableEntry>), Error> {
        Ok((
            self.swap_table(true, max_steps)?,
            self.swap_table(false, max_steps)?,
        ))
    }

    fn swap_table(
        &self,
        zero_to_one: bool,
        max_steps: usize,
    ) -> Result<Vec<SwapTableEntry>, Error> {
        let mut entries = Vec::new();
        let mut price = self.global_state.price;
        let mut tick = self.global_state.tick;
        let mut liquidity = self.liquidity;
        let fee = if zero_to_one {
            self.global_state.fee_zto
        } else {
            self.global_state.fee_otz
        } as u32;

        'steps: while entries.len() < max_steps && tick > MIN_TICK && tick < MAX_TICK {
            // one table row per initialized boundary (or the global tick
            // bound); amounts accumulate across empty bitmap words
            let step_liquidity = liquidity;
            let mut amount_in = U256::ZERO;
            let mut amount_out = U256::ZERO;

            loop {
                let (next_tick, initialized) = next_initialized_tick_within_one_word(
                    &self.tick_bitmap,
                    tick,
                    self.tick_spacing,
                    zero_to_one,
                )?;
                let next_tick = next_tick.clamp(MIN_TICK, MAX_TICK);
                let next_price = get_sqrt_ratio_at_tick(next_tick)?;

                if zero_to_one {
                    amount_in += get_amount_0_delta_base(next_price, price, liquidity, true)?;
                    amount_out += get_amount_1_delta_base(next_price, price, liquidity, false)?;
                } else {
                    amount_in += get_amount_1_delta_base(price, next_price, liquidity, true)?;
                    amount_out += get_amount_0_delta_base(price, next_price, liquidity, false)?;
                }

                price = next_price;
                tick = if zero_to_one { next_tick - 1 } else { next_tick };

                if initialized || next_tick == MIN_TICK || next_tick == MAX_TICK {
                    entries.push(SwapTableEntry {
                        tick: next_tick,
                        price: next_price,
                        liquidity: step_liquidity,
                        // gross the injectable amount up by the fee
                        amount_in: mul_div(
                            amount_in,
                            U256_E6,
                            U256::from(FEE_DENOMINATOR - fee),
                        )?,
                        amount_out,
                    });

                    if initialized {
                        let mut liquidity_net = self
                            .ticks
                            .get(&next_tick)
                            .ok_or(StateError::TickNotFound)?
                            .liquidity_net;
                        if zero_to_one {
                            liquidity_net = -liquidity_net;
                        }
                        liquidity = add_delta(liquidity, liquidity_net)?;
                    }
                    continue 'steps;
                }
            }
        }
        Ok(entries)
    }
}

/// One row of a dry-run swap table: the state of a single tick-to-tick
/// step without committing it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SwapTableEntry {
    /// Boundary tick this step runs to.
    pub tick: i32,
    /// Price at that boundary.
    pub price: U256,
    /// Liquidity in force during the step.
    pub liquidity: u128,
    /// Input amount (fee included) a swap needs to traverse the step.
    pub amount_in: U256,
    /// Output amount the step yields.
    pub amount_out: U256,
}
