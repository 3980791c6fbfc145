use crate::error::{Error, MathError, StateError};
use alloy_primitives::{I256, U256};
use tracing::trace;

/// Number of slots in the circular timepoint array; indices are `u16`
/// values that wrap around the full range.
pub const TIMEPOINT_CAPACITY: usize = 1 << 16;

/// Length of the trailing averaging window, in seconds (one day).
pub const WINDOW: u32 = 86_400;

/// Right shift applied to the volume-per-liquidity average to strip the
/// bulk of the Q64 scale applied when contributions are accumulated.
pub const VOLUME_AVERAGE_SHIFT: usize = 57;

// Exclusive upper bounds of the narrow-width cumulative counters. The
// accumulators fail loudly instead of wrapping; only the 32-bit
// timestamp and the 16-bit ring index use modular arithmetic.
const SECONDS_PER_LIQUIDITY_BOUND: U256 = U256::from_limbs([0, 0, 4294967296, 0]); // 2^160
const VOLUME_PER_LIQUIDITY_BOUND: U256 = U256::from_limbs([0, 0, 65536, 0]); // 2^144
const VOLATILITY_BOUND: u128 = 1 << 88;

/// One sample of the pool's time series.
///
/// All `*_cumulative` fields are running sums since pool inception;
/// averages over a span are obtained by subtracting two samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Timepoint {
    pub initialized: bool,
    /// 32-bit block timestamp; wraps by design.
    pub block_timestamp: u32,
    /// Sum of `tick * dt` (56-bit accumulator law).
    pub tick_cumulative: i64,
    /// Sum of `dt / max(liquidity, 1)` in Q128 (160-bit law).
    pub seconds_per_liquidity_cumulative: U256,
    /// Sum of squared tick deviations from the rolling average tick
    /// (88-bit law); non-decreasing.
    pub volatility_cumulative: u128,
    /// Rolling average tick at the moment this sample was written.
    pub average_tick: i32,
    /// Sum of per-block volume-per-liquidity contributions in Q64
    /// (144-bit law); non-decreasing.
    pub volume_per_liquidity_cumulative: U256,
}

/// Cumulative values of the series at one instant, as returned by
/// [`TimepointOracle::get_single_timepoint`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cumulatives {
    pub tick_cumulative: i64,
    pub seconds_per_liquidity_cumulative: U256,
    pub volatility_cumulative: u128,
    pub volume_per_avg_liquidity: U256,
}

/// Fixed-capacity circular buffer of [`Timepoint`]s with binary-search
/// lookup of historical cumulative values.
///
/// At most one timepoint exists per block timestamp; writing again in
/// the same block is a no-op. Old slots are overwritten once the ring
/// wraps, which silently bounds how far back queries can reach.
#[derive(Clone)]
pub struct TimepointOracle {
    timepoints: Box<[Timepoint]>,
}

impl Default for TimepointOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TimepointOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimepointOracle")
            .field("capacity", &TIMEPOINT_CAPACITY)
            .finish_non_exhaustive()
    }
}

impl TimepointOracle {
    pub fn new() -> Self {
        Self {
            timepoints: vec![Timepoint::default(); TIMEPOINT_CAPACITY].into_boxed_slice(),
        }
    }

    /// Seeds slot 0 at pool initialization.
    pub fn initialize(&mut self, time: u32, tick: i32) {
        let slot = &mut self.timepoints[0];
        slot.initialized = true;
        slot.block_timestamp = time;
        slot.average_tick = tick;
    }

    /// The timepoint stored at a ring index (read-only query).
    pub fn timepoint(&self, index: u16) -> &Timepoint {
        &self.timepoints[index as usize]
    }

    /// `a <= b` under 32-bit circular time: both operands are interpreted
    /// relative to `current`, so values that wrapped past zero still order
    /// after values that have not.
    pub fn lte_considering_overflow(a: u32, b: u32, current: u32) -> bool {
        let a_wrapped = a > current;
        if a_wrapped == (b > current) {
            a <= b
        } else {
            a_wrapped
        }
    }

    /// Records a timepoint for `block_timestamp`, returning the new ring
    /// index. Idempotent per timestamp: if the slot at `index` already
    /// carries this timestamp the index is returned unchanged.
    pub fn write(
        &mut self,
        index: u16,
        block_timestamp: u32,
        tick: i32,
        liquidity: u128,
        volume_per_liquidity: u128,
    ) -> Result<u16, Error> {
        match self.prepare_write(index, block_timestamp, tick, liquidity, volume_per_liquidity)? {
            None => Ok(index),
            Some((new_index, timepoint)) => {
                self.store(new_index, timepoint);
                Ok(new_index)
            }
        }
    }

    /// Computes the slot a [`write`](Self::write) would fill, without
    /// mutating the ring. `None` means a timepoint for this timestamp
    /// already exists. The swap engine uses this to keep all state
    /// changes buffered until its single commit point.
    pub(crate) fn prepare_write(
        &self,
        index: u16,
        block_timestamp: u32,
        tick: i32,
        liquidity: u128,
        volume_per_liquidity: u128,
    ) -> Result<Option<(u16, Timepoint)>, Error> {
        let last = self.timepoints[index as usize];
        if last.block_timestamp == block_timestamp {
            return Ok(None);
        }

        let new_index = index.wrapping_add(1);
        let oldest_index = self.oldest_index(index);

        let average_tick = self.average_tick(
            block_timestamp,
            tick,
            index,
            oldest_index,
            last.block_timestamp,
            last.tick_cumulative,
        )?;
        let prev_tick = self.prev_tick(index, oldest_index, &last, tick);

        let timepoint = create_timepoint(
            &last,
            block_timestamp,
            tick,
            prev_tick,
            liquidity,
            average_tick,
            volume_per_liquidity,
        )?;
        Ok(Some((new_index, timepoint)))
    }

    pub(crate) fn store(&mut self, index: u16, timepoint: Timepoint) {
        trace!(
            index,
            timestamp = timepoint.block_timestamp,
            "timepoint written"
        );
        self.timepoints[index as usize] = timepoint;
    }

    /// Cumulative values at `time - seconds_ago`.
    ///
    /// With `seconds_ago == 0`, or a target newer than the last sample,
    /// the result is a counterfactual synthesized by projecting the trend
    /// between the last two samples forward; nothing is invented beyond
    /// the already-observed slope, and the ring is not mutated. A target
    /// inside stored history is answered by binary search; between two
    /// samples each cumulative is interpolated linearly in elapsed time,
    /// which is an approximation of a state the pool never actually held.
    ///
    /// Fails with `InsufficientHistory` when the target precedes the
    /// oldest surviving sample.
    pub fn get_single_timepoint(
        &self,
        time: u32,
        seconds_ago: u32,
        tick: i32,
        index: u16,
        liquidity: u128,
    ) -> Result<Cumulatives, Error> {
        let oldest_index = self.oldest_index(index);
        let timepoint =
            self.single_timepoint_at(time, seconds_ago, tick, index, oldest_index, liquidity)?;
        Ok(Cumulatives {
            tick_cumulative: timepoint.tick_cumulative,
            seconds_per_liquidity_cumulative: timepoint.seconds_per_liquidity_cumulative,
            volatility_cumulative: timepoint.volatility_cumulative,
            volume_per_avg_liquidity: timepoint.volume_per_liquidity_cumulative,
        })
    }

    /// Average volatility per second and average volume-per-liquidity
    /// over the trailing [`WINDOW`].
    ///
    /// When stored history does not yet span a full window, the actual
    /// elapsed span since the oldest sample is used as the divisor. The
    /// volume average is right-shifted by [`VOLUME_AVERAGE_SHIFT`] to
    /// strip the accumulation-time fixed-point scale.
    pub fn get_averages(
        &self,
        time: u32,
        tick: i32,
        index: u16,
        liquidity: u128,
    ) -> Result<(u128, U256), Error> {
        let oldest_index = self.oldest_index(index);
        let oldest = self.timepoints[oldest_index as usize];

        let end = self.single_timepoint_at(time, 0, tick, index, oldest_index, liquidity)?;

        if Self::lte_considering_overflow(oldest.block_timestamp, time.wrapping_sub(WINDOW), time)
        {
            let start =
                self.single_timepoint_at(time, WINDOW, tick, index, oldest_index, liquidity)?;
            Ok((
                (end.volatility_cumulative - start.volatility_cumulative) / WINDOW as u128,
                (end.volume_per_liquidity_cumulative - start.volume_per_liquidity_cumulative)
                    >> VOLUME_AVERAGE_SHIFT,
            ))
        } else if time != oldest.block_timestamp {
            let elapsed = time.wrapping_sub(oldest.block_timestamp);
            Ok((
                (end.volatility_cumulative - oldest.volatility_cumulative) / elapsed as u128,
                (end.volume_per_liquidity_cumulative - oldest.volume_per_liquidity_cumulative)
                    >> VOLUME_AVERAGE_SHIFT,
            ))
        } else {
            Ok((0, U256::ZERO))
        }
    }

    /// Index of the oldest surviving sample. After the ring wraps, the
    /// slot directly after the last written one is the oldest; before
    /// that it is the seed slot 0.
    fn oldest_index(&self, last_index: u16) -> u16 {
        let next = last_index.wrapping_add(1);
        if self.timepoints[next as usize].initialized {
            next
        } else {
            0
        }
    }

    /// Trend of the tick between the two most recent samples, used for
    /// counterfactual projection; falls back to the current tick when
    /// only one sample exists.
    fn prev_tick(&self, index: u16, oldest_index: u16, last: &Timepoint, tick: i32) -> i32 {
        if index == oldest_index {
            return tick;
        }
        let prev = &self.timepoints[index.wrapping_sub(1) as usize];
        let dt = last.block_timestamp.wrapping_sub(prev.block_timestamp);
        if dt == 0 {
            return tick;
        }
        ((last.tick_cumulative - prev.tick_cumulative) / dt as i64) as i32
    }

    /// Time-weighted average tick over the trailing window ending at
    /// `time` (or over all of history when it is younger than a window).
    fn average_tick(
        &self,
        time: u32,
        tick: i32,
        index: u16,
        oldest_index: u16,
        last_timestamp: u32,
        last_tick_cumulative: i64,
    ) -> Result<i32, Error> {
        let oldest = self.timepoints[oldest_index as usize];
        let window_start = time.wrapping_sub(WINDOW);

        if !Self::lte_considering_overflow(oldest.block_timestamp, window_start, time) {
            // history younger than the window: average over all of it
            return Ok(if last_timestamp == oldest.block_timestamp {
                tick
            } else {
                let dt = last_timestamp.wrapping_sub(oldest.block_timestamp);
                ((last_tick_cumulative - oldest.tick_cumulative) / dt as i64) as i32
            });
        }

        if Self::lte_considering_overflow(last_timestamp, window_start, time) {
            // even the last sample is older than the window: fall back to
            // the slope between the two most recent samples
            let prev = self.timepoints[index.wrapping_sub(1) as usize];
            if !prev.initialized || last_timestamp == prev.block_timestamp {
                return Ok(tick);
            }
            let dt = last_timestamp.wrapping_sub(prev.block_timestamp);
            return Ok(((last_tick_cumulative - prev.tick_cumulative) / dt as i64) as i32);
        }

        let start_of_window =
            self.single_timepoint_at(time, WINDOW, tick, index, oldest_index, 0)?;
        let dt = last_timestamp.wrapping_sub(window_start);
        Ok(((last_tick_cumulative - start_of_window.tick_cumulative) / dt as i64) as i32)
    }

    fn single_timepoint_at(
        &self,
        time: u32,
        seconds_ago: u32,
        tick: i32,
        index: u16,
        oldest_index: u16,
        liquidity: u128,
    ) -> Result<Timepoint, Error> {
        let target = time.wrapping_sub(seconds_ago);
        let last = self.timepoints[index as usize];

        if seconds_ago == 0
            || Self::lte_considering_overflow(last.block_timestamp, target, time)
        {
            if last.block_timestamp == target {
                return Ok(last);
            }
            // target is newer than anything stored: project forward
            let average_tick = self.average_tick(
                time,
                tick,
                index,
                oldest_index,
                last.block_timestamp,
                last.tick_cumulative,
            )?;
            let prev_tick = self.prev_tick(index, oldest_index, &last, tick);
            return create_timepoint(&last, target, tick, prev_tick, liquidity, average_tick, 0);
        }

        let oldest = self.timepoints[oldest_index as usize];
        if !Self::lte_considering_overflow(oldest.block_timestamp, target, time) {
            return Err(StateError::InsufficientHistory.into());
        }

        let (before_or_at, at_or_after) = self.binary_search(time, target, index, oldest_index);

        if at_or_after.block_timestamp == target {
            return Ok(at_or_after);
        }
        if before_or_at.block_timestamp == target {
            return Ok(before_or_at);
        }

        // between two samples: interpolate each cumulative linearly in
        // elapsed time
        let span = at_or_after
            .block_timestamp
            .wrapping_sub(before_or_at.block_timestamp);
        let elapsed = target.wrapping_sub(before_or_at.block_timestamp);

        let mut result = before_or_at;
        result.block_timestamp = target;
        result.tick_cumulative += (at_or_after.tick_cumulative - before_or_at.tick_cumulative)
            / span as i64
            * elapsed as i64;
        result.seconds_per_liquidity_cumulative += (at_or_after
            .seconds_per_liquidity_cumulative
            - before_or_at.seconds_per_liquidity_cumulative)
            * U256::from(elapsed)
            / U256::from(span);
        result.volatility_cumulative += (at_or_after.volatility_cumulative
            - before_or_at.volatility_cumulative)
            / span as u128
            * elapsed as u128;
        result.volume_per_liquidity_cumulative += (at_or_after.volume_per_liquidity_cumulative
            - before_or_at.volume_per_liquidity_cumulative)
            / U256::from(span)
            * U256::from(elapsed);
        Ok(result)
    }

    /// Finds the pair of initialized samples bracketing `target`.
    ///
    /// The logical search range is `[oldest_index, last_index]`; when the
    /// ring has wrapped (`last_index < oldest_index`) the upper bound is
    /// lifted by the capacity and physical indices are taken mod 2^16.
    /// Callers must have established that the target lies within stored
    /// history.
    fn binary_search(
        &self,
        time: u32,
        target: u32,
        last_index: u16,
        oldest_index: u16,
    ) -> (Timepoint, Timepoint) {
        let mut left = oldest_index as usize;
        let mut right = if last_index >= oldest_index {
            last_index as usize
        } else {
            last_index as usize + TIMEPOINT_CAPACITY
        };

        loop {
            let current = (left + right) >> 1;
            let before_or_at = self.timepoints[current as u16 as usize];

            if !before_or_at.initialized {
                // hole from an uninitialized region: move right
                left = current + 1;
                continue;
            }

            if !Self::lte_considering_overflow(before_or_at.block_timestamp, target, time) {
                right = current - 1;
                continue;
            }

            let at_or_after = self.timepoints[(current + 1) as u16 as usize];
            if !at_or_after.initialized {
                // the sample after the midpoint is the write frontier;
                // the pair collapses onto before_or_at
                return (before_or_at, before_or_at);
            }

            if Self::lte_considering_overflow(target, at_or_after.block_timestamp, time) {
                return (before_or_at, at_or_after);
            }
            left = current + 1;
        }
    }
}

/// Builds the sample that extends `last` to `block_timestamp`. Shared by
/// the write path and the counterfactual projection, so both obey the
/// same accumulation law.
fn create_timepoint(
    last: &Timepoint,
    block_timestamp: u32,
    tick: i32,
    prev_tick: i32,
    liquidity: u128,
    average_tick: i32,
    volume_per_liquidity: u128,
) -> Result<Timepoint, Error> {
    let delta = block_timestamp.wrapping_sub(last.block_timestamp);

    let mut timepoint = *last;
    timepoint.initialized = true;
    timepoint.block_timestamp = block_timestamp;

    timepoint.tick_cumulative = last
        .tick_cumulative
        .checked_add(tick as i64 * delta as i64)
        .ok_or(MathError::Overflow)?;

    // zero liquidity counts as one so the term stays defined
    let liquidity = if liquidity == 0 { 1 } else { liquidity };
    timepoint.seconds_per_liquidity_cumulative = last
        .seconds_per_liquidity_cumulative
        .checked_add((U256::from(delta) << 128usize) / U256::from(liquidity))
        .filter(|v| *v < SECONDS_PER_LIQUIDITY_BOUND)
        .ok_or(MathError::Overflow)?;

    timepoint.volatility_cumulative = last
        .volatility_cumulative
        .checked_add(volatility_on_range(
            delta as i64,
            prev_tick,
            tick,
            last.average_tick,
            average_tick,
        ))
        .filter(|v| *v < VOLATILITY_BOUND)
        .ok_or(MathError::Overflow)?;

    timepoint.average_tick = average_tick;

    timepoint.volume_per_liquidity_cumulative = last
        .volume_per_liquidity_cumulative
        .checked_add(U256::from(volume_per_liquidity))
        .filter(|v| *v < VOLUME_PER_LIQUIDITY_BOUND)
        .ok_or(MathError::Overflow)?;

    Ok(timepoint)
}

fn i256_from(value: i128) -> I256 {
    let magnitude = I256::from_raw(U256::from(value.unsigned_abs()));
    if value < 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Sum of squared deviations of the tick from the rolling average tick
/// over `(0; dt]`, assuming both move linearly between samples.
///
/// With tick `= k*t + b` and average tick `= p*t + q`, the deviation is
/// `m*t + n` for `m = k - p`, `n = b - q`, and the sum closes to
/// `m^2 * sum(t^2) + 2*m*n * sum(t) + n^2 * dt` using the standard
/// progressions for `sum(t)` and `sum(t^2)`. `K` and `B` below carry an
/// extra factor of `dt` to stay integral.
fn volatility_on_range(dt: i64, tick0: i32, tick1: i32, avg_tick0: i32, avg_tick1: i32) -> u128 {
    if dt == 0 {
        return 0;
    }

    let dt256 = i256_from(dt as i128);
    let one = i256_from(1);
    let six = i256_from(6);

    let k = i256_from(((tick1 - tick0) - (avg_tick1 - avg_tick0)) as i128); // m * dt
    let b = i256_from((tick0 - avg_tick0) as i128 * dt as i128); // n * dt
    let sum_of_squares_x6 = dt256 * (dt256 + one) * (dt256 + dt256 + one);
    let sum_of_sequence_x2 = dt256 * (dt256 + one);

    let volatility = (k * k * sum_of_squares_x6 + six * b * k * sum_of_sequence_x2
        + six * dt256 * b * b)
        / (six * dt256 * dt256);

    // bounded by dt * max_deviation^2 < 2^77, comfortably inside u128
    volatility.into_raw().to::<u128>()
}
