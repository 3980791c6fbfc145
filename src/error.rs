use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MathError {
    #[error("math error - overflow")]
    Overflow,
    #[error("math error - underflow")]
    Underflow,
    #[error("math error - out of bounds")]
    OutOfBounds,
    #[error("math error - division by zero")]
    DivisionByZero,
    #[error("bit math error - zero input value")]
    ZeroValue,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    #[error("state error - pool is locked")]
    Reentrant,

    #[error("state error - pool already initialized")]
    AlreadyInitialized,

    #[error("state error - amount specified is zero")]
    ZeroAmount,

    #[error("state error - price limit on the wrong side of the current price")]
    InvalidLimit,

    #[error("oracle error - target timestamp precedes the oldest stored timepoint")]
    InsufficientHistory,

    #[error("state error - sqrtPrice out of bounds")]
    SqrtPriceOutOfBounds,
    #[error("state error - sqrtPrice is 0")]
    SqrtPriceIsZero,
    #[error("state error - sqrtRatio is 0")]
    SqrtRatioIsZero,

    #[error("state error - tick out of bounds")]
    TickOutOfBounds,

    #[error("state error - liquidity is 0")]
    LiquidityIsZero,

    #[error("state error - crossed tick has no registry record")]
    TickNotFound,

    #[error("state error - requested amount exceeds pool reserves")]
    InsufficientReserves,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    MathError(#[from] crate::error::MathError),

    #[error(transparent)]
    StateError(#[from] crate::error::StateError),
}
