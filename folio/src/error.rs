//! Error taxonomy.
//!
//! Five kinds, each a flat enum. Display output always carries a concrete
//! remediation hint; the engine never substitutes a guessed value for a
//! failed read.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// Target allocations must sum to exactly 10000 bps.
    AllocationSumMismatch,
    /// Token and allocation arrays must have equal, non-zero length.
    BadAllocationLength,
    EmptyTokenSet,
    DuplicateToken,
    /// Condition token must be part of the portfolio's token set.
    TokenNotInPortfolio,
    ZeroAmount,
    /// Threshold must be in (0, 10000] bps.
    InvalidThreshold,
    /// Swap fee must be below 10000 bps.
    InvalidFee,
    /// Liquidity must be added at the pool's current reserve ratio.
    LiquidityRatioMismatch,
    /// Token decimal counts above 18 are not representable in the WAD base.
    UnsupportedDecimals,
    /// Pools pair a token against the native asset; the native asset itself
    /// cannot be pooled.
    NativePair,
    NumericOverflow,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllocationSumMismatch => {
                write!(f, "allocations must sum to 10000 bps - adjust the target weights")
            }
            Self::BadAllocationLength => {
                write!(f, "token and allocation arrays differ in length - supply one weight per token")
            }
            Self::EmptyTokenSet => write!(f, "portfolio needs at least one token"),
            Self::DuplicateToken => write!(f, "duplicate token in set - each token may appear once"),
            Self::TokenNotInPortfolio => {
                write!(f, "condition token is not part of this portfolio's token set")
            }
            Self::ZeroAmount => write!(f, "amount is zero - supply a positive amount"),
            Self::InvalidThreshold => {
                write!(f, "rebalance threshold must be between 1 and 10000 bps")
            }
            Self::InvalidFee => {
                write!(f, "swap fee must be below 10000 bps - fix the engine parameters")
            }
            Self::LiquidityRatioMismatch => write!(
                f,
                "amounts do not match the pool ratio - quote the matching amount from current reserves first"
            ),
            Self::UnsupportedDecimals => {
                write!(f, "token decimals exceed 18 - not representable in the 1e18 base")
            }
            Self::NativePair => {
                write!(f, "cannot pool the native asset against itself - pass a token address")
            }
            Self::NumericOverflow => write!(f, "arithmetic overflow - reduce the amount"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiquidityError {
    /// Pool exists but one or both reserves are zero.
    PoolEmpty,
    /// No pool has been created for this token.
    NoPool,
    /// Requested output would drain the reserve.
    InsufficientReserve,
    InsufficientShares,
    /// Execution price moved too far from the oracle price.
    ExcessiveDeviation,
}

impl fmt::Display for LiquidityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PoolEmpty => {
                write!(f, "pool has no liquidity for this token - add liquidity first")
            }
            Self::NoPool => {
                write!(f, "no pool exists for this token - create one with add_liquidity")
            }
            Self::InsufficientReserve => {
                write!(f, "pool reserve too small for this trade - reduce the amount")
            }
            Self::InsufficientShares => {
                write!(f, "not enough pool shares - reduce the shares to burn")
            }
            Self::ExcessiveDeviation => write!(
                f,
                "swap price deviates from oracle beyond the configured bound - retry when prices converge"
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleError {
    NoPriceFeed,
    StalePrice,
    /// Feed answered with a zero price or an out-of-range decimal count.
    InvalidPrice,
    /// The feed could not be read at all.
    FeedUnavailable,
}

impl fmt::Display for OracleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPriceFeed => {
                write!(f, "no price feed bound for this token - call set_price_feed first")
            }
            Self::StalePrice => {
                write!(f, "price feed observation is stale - wait for a fresh oracle round")
            }
            Self::InvalidPrice => write!(
                f,
                "price feed returned an unusable answer - zero price or out-of-range decimals"
            ),
            Self::FeedUnavailable => write!(f, "price feed could not be read - check the feed source"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationError {
    NotOwner,
    NotAdmin,
}

impl fmt::Display for AuthorizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotOwner => write!(f, "caller is not the portfolio owner"),
            Self::NotAdmin => write!(f, "caller is not the engine admin"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    PortfolioNotFound,
    /// Portfolio was closed; no further mutation is allowed.
    PortfolioInactive,
    ActionNotFound,
    /// Action was already executed or cancelled.
    ActionNotPending,
    ActionNotReady,
    /// No entry/peak tracking exists for this (portfolio, token) pair.
    NoTracking,
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PortfolioNotFound => write!(f, "portfolio not found - check the id"),
            Self::PortfolioInactive => write!(f, "portfolio is closed and read-only"),
            Self::ActionNotFound => write!(f, "scheduled action not found - check the id"),
            Self::ActionNotPending => {
                write!(f, "action already executed or cancelled - schedule a new one")
            }
            Self::ActionNotReady => {
                write!(f, "action condition does not hold yet - poll get_ready_actions")
            }
            Self::NoTracking => {
                write!(f, "token is not tracked for this portfolio - it was never acquired")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    Validation(ValidationError),
    Liquidity(LiquidityError),
    Oracle(OracleError),
    Authorization(AuthorizationError),
    State(StateError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(e) => write!(f, "validation: {e}"),
            Self::Liquidity(e) => write!(f, "liquidity: {e}"),
            Self::Oracle(e) => write!(f, "oracle: {e}"),
            Self::Authorization(e) => write!(f, "authorization: {e}"),
            Self::State(e) => write!(f, "state: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<LiquidityError> for Error {
    fn from(e: LiquidityError) -> Self {
        Self::Liquidity(e)
    }
}

impl From<OracleError> for Error {
    fn from(e: OracleError) -> Self {
        Self::Oracle(e)
    }
}

impl From<AuthorizationError> for Error {
    fn from(e: AuthorizationError) -> Self {
        Self::Authorization(e)
    }
}

impl From<StateError> for Error {
    fn from(e: StateError) -> Self {
        Self::State(e)
    }
}
