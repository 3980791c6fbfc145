use crate::error::{Error, StateError};
use alloy_primitives::{I256, U256};

/// Lowest tick the engine will ever quote; corresponds to a price ratio
/// of 2^-128 between the two tokens.
pub const MIN_TICK: i32 = -887272;
/// Highest tick, the mirror of [`MIN_TICK`].
pub const MAX_TICK: i32 = -MIN_TICK;

/// Sqrt price at [`MIN_TICK`]. Valid prices live in
/// `[MIN_SQRT_RATIO, MAX_SQRT_RATIO)`.
pub const MIN_SQRT_RATIO: U256 = U256::from_limbs([4295128739, 0, 0, 0]);
/// Sqrt price at [`MAX_TICK`] (exclusive upper bound for valid prices).
pub const MAX_SQRT_RATIO: U256 =
    U256::from_limbs([6743328256752651558, 17280870778742802505, 4294805859, 0]);

const SQRT_10001: I256 = I256::from_raw(U256::from_limbs([11745905768312294533, 13863, 0, 0]));
const TICK_LOW: I256 = I256::from_raw(U256::from_limbs([
    6552757943157144234,
    184476617836266586,
    0,
    0,
]));
const TICK_HIGH: I256 = I256::from_raw(U256::from_limbs([
    4998474450511881007,
    15793544031827761793,
    0,
    0,
]));

// Q128.128 multipliers for sqrt(1.0001)^-(2^k), k = 1..=19. Bit 0 of the
// tick seeds the accumulator directly.
const RATIO_MULTIPLIERS: [[u64; 2]; 19] = [
    [6459403834229662010, 18444899583751176498],
    [17226890335427755468, 18443055278223354162],
    [2032852871939366096, 18439367220385604838],
    [14545316742740207172, 18431993317065449817],
    [5129152022828963008, 18417254355718160513],
    [4894419605888772193, 18387811781193591352],
    [1280255884321894483, 18329067761203520168],
    [15924666964335305636, 18212142134806087854],
    [8010504389359918676, 17980523815641551639],
    [10668036004952895731, 17526086738831147013],
    [4878133418470705625, 16651378430235024244],
    [9537173718739605541, 15030750278693429944],
    [9972618978014552549, 12247334978882834399],
    [10428997489610666743, 8131365268884726200],
    [9305304367709015974, 3584323654723342297],
    [14301143598189091785, 696457651847595233],
    [7393154844743099908, 26294789957452057],
    [2209338891292245656, 37481735321082],
    [10518117631919034274, 76158723],
];

/// Sqrt price (Q64.96) at a given tick, or `TickOutOfBounds` when the
/// tick falls outside `[MIN_TICK, MAX_TICK]`.
pub fn get_sqrt_ratio_at_tick(tick: i32) -> Result<U256, StateError> {
    let abs_tick = tick.unsigned_abs();
    if abs_tick > MAX_TICK as u32 {
        return Err(StateError::TickOutOfBounds);
    }

    let mut ratio = if abs_tick & 1 != 0 {
        U256::from_limbs([12262481743371124737, 18445821805675392311, 0, 0])
    } else {
        U256::from_limbs([0, 0, 1, 0])
    };

    for (k, limbs) in RATIO_MULTIPLIERS.iter().enumerate() {
        if abs_tick & (1u32 << (k + 1)) != 0 {
            ratio = ratio.wrapping_mul(U256::from_limbs([limbs[0], limbs[1], 0, 0])) >> 128usize;
        }
    }

    if tick > 0 {
        ratio = U256::MAX / ratio;
    }

    // Q128.128 -> Q64.96, rounding up so the tick-of-price inverse stays
    // consistent at the boundary.
    let round_up = (ratio.as_limbs()[0] & 0xFFFF_FFFF) != 0;
    Ok((ratio >> 32usize) + U256::from(round_up as u64))
}

/// Tick whose price interval contains the given sqrt price (Q64.96);
/// the greatest tick with `get_sqrt_ratio_at_tick(tick) <= price`.
///
/// Rejects prices outside `[MIN_SQRT_RATIO, MAX_SQRT_RATIO)`.
pub fn get_tick_at_sqrt_ratio(price: U256) -> Result<i32, Error> {
    if price < MIN_SQRT_RATIO || price >= MAX_SQRT_RATIO {
        return Err(StateError::SqrtPriceOutOfBounds.into());
    }

    let ratio = price << 32usize;
    let msb = super::bit_math::most_significant_bit(ratio)? as u32;

    let mut r = if msb >= 128 {
        ratio >> (msb - 127) as usize
    } else {
        ratio << (127 - msb) as usize
    };

    let mut log_2: I256 =
        (I256::from_raw(U256::from(msb)) - I256::from_raw(U256::from(128u8))) << 64usize;

    // Fixed-point base-2 log refinement, one fractional bit per pass.
    for shift in (50usize..=63).rev() {
        r = r.overflowing_mul(r).0 >> 127usize;
        let f = r >> 128usize;
        log_2 |= I256::from_raw(f << shift);
        r >>= f.as_limbs()[0] as usize;
    }

    let log_sqrt10001 = log_2.wrapping_mul(SQRT_10001);
    let tick_low = ((log_sqrt10001 - TICK_LOW) >> 128usize).low_i32();
    let tick_high = ((log_sqrt10001 + TICK_HIGH) >> 128usize).low_i32();

    Ok(if tick_low == tick_high {
        tick_low
    } else if get_sqrt_ratio_at_tick(tick_high)? <= price {
        tick_high
    } else {
        tick_low
    })
}
