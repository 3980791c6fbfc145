//! Adaptive-fee concentrated-liquidity pool engine in pure Rust.
//!
//! This crate exposes:
//! - Low-level math primitives (`math::*`) for ticks, Q64.96 prices,
//!   per-step swap movement and the sparse tick bitmap.
//! - An in-memory [`PoolState`] that executes concentrated-liquidity swaps
//!   across initialized ticks, charging a per-direction fee.
//! - A timepoint oracle (`pool::oracle`) that records one observation per
//!   block and answers time-weighted average and trailing-volatility
//!   queries over a rolling window.
//!
//! The engine is deterministic: every operation is a function of the
//! explicit pool state and the caller-supplied block timestamp. Nothing in
//! here touches a clock, tokens or the outside world; settlement amounts
//! are returned to the caller.
//!
//! # Examples
//!
//! ```no_run
//! use clmm_engine::{
//!     math::tick_math::{get_sqrt_ratio_at_tick, MIN_SQRT_RATIO},
//!     pool::fee::FixedFee,
//!     pool::swap::SwapParams,
//!     I256, PoolState, U256,
//! };
//!
//! let price = get_sqrt_ratio_at_tick(0).unwrap();
//! let mut pool = PoolState::new(1);
//! pool.initialize(price, 1_700_000_000).unwrap();
//! pool.liquidity = 1_000_000_000_000_000_000u128;
//!
//! let params = SwapParams::new(
//!     true,                                     // token0 -> token1
//!     I256::from_raw(U256::from(1_000_000u64)), // exact input
//!     MIN_SQRT_RATIO + U256::from(1u8),
//! );
//! let fee_policy = FixedFee::new(100, 100);
//! let result = pool.swap(params, &fee_policy, 1_700_000_013).unwrap();
//! println!("amount0: {}, amount1: {}", result.amount0, result.amount1);
//! ```

pub use alloy_primitives::{I256, U256};

pub mod error;
mod hash;
pub mod math;
pub mod pool;

pub use hash::FastMap;
pub use pool::state::{GlobalState, PoolState};

/// Number of fractional bits in the Q64.96 sqrt-price representation.
pub const RESOLUTION: u8 = 96;

/// 2^96, the Q64.96 fixed-point one.
pub const Q96: U256 = U256::from_limbs([0, 4294967296, 0, 0]);

/// 2^128, the scale applied to fee growth per unit of liquidity.
pub const Q128: U256 = U256::from_limbs([0, 0, 1, 0]);

/// Denominator of swap fee rates: fees are expressed in hundredths of a
/// basis point, so 1_000_000 corresponds to 100%.
pub const FEE_DENOMINATOR: u32 = 1_000_000;

pub(crate) const U256_1: U256 = U256::from_limbs([1, 0, 0, 0]);

/// Largest value representable in 160 bits; sqrt prices must stay at or
/// below this bound.
pub(crate) const U160_MAX: U256 = U256::from_limbs([u64::MAX, u64::MAX, 4294967295, 0]);

pub(crate) const U256_E6: U256 = U256::from_limbs([1000000, 0, 0, 0]);
