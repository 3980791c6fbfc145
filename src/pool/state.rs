use crate::error::{Error, MathError, StateError};
use crate::math::liquidity_math::add_delta;
use crate::math::tick_bitmap::flip_tick;
use crate::math::tick_math::{get_tick_at_sqrt_ratio, MAX_TICK, MIN_TICK};
use crate::pool::fee::BASE_FEE;
use crate::pool::oracle::{Timepoint, TimepointOracle};
use crate::pool::tick::{self, Tick};
use crate::FastMap;
use alloy_primitives::U256;

/// Highest configurable community fee share, in thousandths.
pub const MAX_COMMUNITY_FEE: u8 = 250;
/// Denominator of the community fee share: 1_000 corresponds to 100%.
pub const COMMUNITY_FEE_DENOMINATOR: u32 = 1_000;

/// The single mutable record describing where the pool currently stands.
///
/// `price` and `tick` stay mutually consistent: `tick` is always the
/// floor of the price under the tick <-> price conversion law.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GlobalState {
    /// Current sqrt price in Q64.96; zero only before initialization.
    pub price: U256,
    /// Tick containing the current price.
    pub tick: i32,
    /// Fee for token0 -> token1 swaps, hundredths of a bip.
    pub fee_zto: u16,
    /// Fee for token1 -> token0 swaps.
    pub fee_otz: u16,
    /// Ring index of the most recently written timepoint.
    pub timepoint_index: u16,
    /// Share of token0 fees diverted to the community pot, thousandths.
    pub community_fee_token0: u8,
    /// Share of token1 fees diverted, thousandths.
    pub community_fee_token1: u8,
    /// Mutual-exclusion guard: true whenever no state-mutating operation
    /// is in flight. Checked and cleared at every mutating entry point.
    pub unlocked: bool,
}

/// In-memory state of one pool: global record, active liquidity, fee
/// growth totals, the tick registry with its bitmap, and the timepoint
/// oracle.
///
/// Distinct pools are independent values; nothing is shared between
/// instances.
#[derive(Clone, Debug)]
pub struct PoolState {
    pub global_state: GlobalState,
    /// Liquidity active in the range containing the current tick.
    pub liquidity: u128,
    /// Volume-per-liquidity accumulated by swaps in the current block;
    /// flushed into the oracle by the first swap of the next block.
    pub volume_per_liquidity_in_block: u128,
    /// All-time fee growth per unit liquidity (Q128), token0.
    pub total_fee_growth0: U256,
    /// All-time fee growth per unit liquidity (Q128), token1.
    pub total_fee_growth1: U256,
    pub tick_spacing: i32,
    pub ticks: FastMap<i32, Tick>,
    pub tick_bitmap: FastMap<i16, U256>,
    pub oracle: TimepointOracle,
}

impl PoolState {
    /// An uninitialized pool; call [`initialize`](Self::initialize)
    /// before swapping.
    pub fn new(tick_spacing: i32) -> Self {
        Self {
            global_state: GlobalState::default(),
            liquidity: 0,
            volume_per_liquidity_in_block: 0,
            total_fee_growth0: U256::ZERO,
            total_fee_growth1: U256::ZERO,
            tick_spacing,
            ticks: FastMap::default(),
            tick_bitmap: FastMap::default(),
            oracle: TimepointOracle::new(),
        }
    }

    /// Sets the starting price, derives the matching tick, seeds the
    /// oracle's slot 0 and unlocks the pool.
    pub fn initialize(&mut self, price: U256, time: u32) -> Result<(), Error> {
        if !self.global_state.price.is_zero() {
            return Err(StateError::AlreadyInitialized.into());
        }
        let tick = get_tick_at_sqrt_ratio(price)?;

        self.global_state.price = price;
        self.global_state.tick = tick;
        self.global_state.fee_zto = BASE_FEE;
        self.global_state.fee_otz = BASE_FEE;
        self.oracle.initialize(time, tick);
        self.global_state.unlocked = true;
        Ok(())
    }

    /// Read-only tick registry lookup.
    pub fn tick(&self, tick: i32) -> Option<&Tick> {
        self.ticks.get(&tick)
    }

    /// Read-only timepoint lookup by ring index.
    pub fn timepoint(&self, index: u16) -> &Timepoint {
        self.oracle.timepoint(index)
    }

    /// Books a liquidity change over `[bottom_tick, top_tick)`: updates
    /// both boundary tick records, toggles bitmap bits for ticks flipping
    /// on or off, and adjusts active liquidity when the current tick lies
    /// inside the range.
    ///
    /// This is the registry-side bookkeeping of liquidity provision;
    /// position ownership and token amounts are the caller's concern.
    /// The change is applied atomically: a failed validation or an
    /// over-withdrawal leaves the pool untouched.
    pub fn apply_liquidity_delta(
        &mut self,
        bottom_tick: i32,
        top_tick: i32,
        liquidity_delta: i128,
        time: u32,
    ) -> Result<(), Error> {
        if !self.global_state.unlocked {
            return Err(StateError::Reentrant.into());
        }
        self.global_state.unlocked = false;
        let result = self.apply_liquidity_delta_locked(bottom_tick, top_tick, liquidity_delta, time);
        self.global_state.unlocked = true;
        result
    }

    fn apply_liquidity_delta_locked(
        &mut self,
        bottom_tick: i32,
        top_tick: i32,
        liquidity_delta: i128,
        time: u32,
    ) -> Result<(), Error> {
        if bottom_tick >= top_tick || bottom_tick < MIN_TICK || top_tick > MAX_TICK {
            return Err(StateError::TickOutOfBounds.into());
        }
        if bottom_tick % self.tick_spacing != 0 || top_tick % self.tick_spacing != 0 {
            return Err(MathError::OutOfBounds.into());
        }

        let gs = self.global_state;
        let cumulatives = self.oracle.get_single_timepoint(
            time,
            0,
            gs.tick,
            gs.timepoint_index,
            self.liquidity,
        )?;

        // work on copies so a failure further down leaves nothing changed
        let mut bottom = self.ticks.get(&bottom_tick).copied().unwrap_or_default();
        let mut top = self.ticks.get(&top_tick).copied().unwrap_or_default();

        let flipped_bottom = tick::update(
            &mut bottom,
            bottom_tick,
            gs.tick,
            liquidity_delta,
            self.total_fee_growth0,
            self.total_fee_growth1,
            cumulatives.seconds_per_liquidity_cumulative,
            cumulatives.tick_cumulative,
            time,
            false,
        )?;
        let flipped_top = tick::update(
            &mut top,
            top_tick,
            gs.tick,
            liquidity_delta,
            self.total_fee_growth0,
            self.total_fee_growth1,
            cumulatives.seconds_per_liquidity_cumulative,
            cumulatives.tick_cumulative,
            time,
            true,
        )?;

        let liquidity = if gs.tick >= bottom_tick && gs.tick < top_tick {
            add_delta(self.liquidity, liquidity_delta)?
        } else {
            self.liquidity
        };

        self.ticks.insert(bottom_tick, bottom);
        self.ticks.insert(top_tick, top);
        if flipped_bottom {
            flip_tick(&mut self.tick_bitmap, bottom_tick, self.tick_spacing)?;
        }
        if flipped_top {
            flip_tick(&mut self.tick_bitmap, top_tick, self.tick_spacing)?;
        }
        self.liquidity = liquidity;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::tick_math::get_sqrt_ratio_at_tick;
    use crate::math::tick_bitmap::next_initialized_tick_within_one_word;

    const T0: u32 = 1_700_000_000;

    fn initialized_pool() -> PoolState {
        let mut pool = PoolState::new(60);
        pool.initialize(get_sqrt_ratio_at_tick(0).unwrap(), T0).unwrap();
        pool
    }

    #[test]
    fn initialize_sets_consistent_price_and_tick() {
        let mut pool = PoolState::new(1);
        let price = get_sqrt_ratio_at_tick(1234).unwrap();
        pool.initialize(price, T0).unwrap();

        assert_eq!(pool.global_state.price, price);
        assert_eq!(pool.global_state.tick, 1234);
        assert!(pool.global_state.unlocked);
        assert!(pool.timepoint(0).initialized);
        assert_eq!(pool.timepoint(0).block_timestamp, T0);
    }

    #[test]
    fn initialize_twice_fails() {
        let mut pool = initialized_pool();
        let result = pool.initialize(get_sqrt_ratio_at_tick(0).unwrap(), T0);
        assert!(matches!(
            result,
            Err(Error::StateError(StateError::AlreadyInitialized))
        ));
    }

    #[test]
    fn initialize_rejects_out_of_range_price() {
        let mut pool = PoolState::new(1);
        assert!(pool.initialize(U256::from(1u8), T0).is_err());
    }

    #[test]
    fn liquidity_delta_in_range_activates() {
        let mut pool = initialized_pool();
        pool.apply_liquidity_delta(-120, 120, 5_000, T0).unwrap();

        assert_eq!(pool.liquidity, 5_000);
        assert_eq!(pool.tick(-120).unwrap().liquidity_net, 5_000);
        assert_eq!(pool.tick(120).unwrap().liquidity_net, -5_000);
        assert_eq!(pool.tick(120).unwrap().liquidity_gross, 5_000);

        // both boundary ticks are discoverable through the bitmap
        let (next, initialized) =
            next_initialized_tick_within_one_word(&pool.tick_bitmap, 0, 60, false).unwrap();
        assert_eq!((next, initialized), (120, true));
        let (next, initialized) =
            next_initialized_tick_within_one_word(&pool.tick_bitmap, 0, 60, true).unwrap();
        assert_eq!((next, initialized), (0, false));
        let (next, initialized) =
            next_initialized_tick_within_one_word(&pool.tick_bitmap, -1, 60, true).unwrap();
        assert_eq!((next, initialized), (-120, true));
    }

    #[test]
    fn liquidity_delta_out_of_range_does_not_activate() {
        let mut pool = initialized_pool();
        pool.apply_liquidity_delta(600, 1200, 5_000, T0).unwrap();
        assert_eq!(pool.liquidity, 0);
        assert_eq!(pool.tick(600).unwrap().liquidity_net, 5_000);
    }

    #[test]
    fn liquidity_removal_keeps_tick_record() {
        let mut pool = initialized_pool();
        pool.apply_liquidity_delta(-120, 120, 5_000, T0).unwrap();
        pool.apply_liquidity_delta(-120, 120, -5_000, T0 + 10).unwrap();

        assert_eq!(pool.liquidity, 0);
        // records survive with zero gross, bitmap bits are cleared
        assert_eq!(pool.tick(-120).unwrap().liquidity_gross, 0);
        let (_, initialized) =
            next_initialized_tick_within_one_word(&pool.tick_bitmap, 0, 60, false).unwrap();
        assert!(!initialized);
    }

    #[test]
    fn over_withdrawal_is_atomic() {
        let mut pool = initialized_pool();
        pool.apply_liquidity_delta(-120, 120, 5_000, T0).unwrap();
        let before_ticks = pool.ticks.clone();
        let before_liquidity = pool.liquidity;

        let result = pool.apply_liquidity_delta(-120, 120, -6_000, T0 + 5);
        assert!(result.is_err());
        assert_eq!(pool.ticks, before_ticks);
        assert_eq!(pool.liquidity, before_liquidity);
        assert!(pool.global_state.unlocked, "lock restored on failure");
    }

    #[test]
    fn rejects_inverted_or_out_of_bounds_range() {
        let mut pool = initialized_pool();
        assert!(pool.apply_liquidity_delta(120, -120, 1, T0).is_err());
        assert!(pool.apply_liquidity_delta(-120, -120, 1, T0).is_err());
        assert!(pool
            .apply_liquidity_delta(MIN_TICK - 60, 0, 1, T0)
            .is_err());
        assert!(pool
            .apply_liquidity_delta(0, MAX_TICK + 60, 1, T0)
            .is_err());
    }

    #[test]
    fn locked_pool_rejects_mutation() {
        let mut pool = initialized_pool();
        pool.global_state.unlocked = false;
        let result = pool.apply_liquidity_delta(-120, 120, 1, T0);
        assert!(matches!(
            result,
            Err(Error::StateError(StateError::Reentrant))
        ));
        assert!(!pool.global_state.unlocked, "flag keeps its pre-call value");
    }
}
