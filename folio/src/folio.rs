//! Folio portfolio engine
//!
//! Deterministic core for AMM-backed multi-asset portfolios: constant-product
//! liquidity pools, oracle-based USD valuation, threshold rebalancing and a
//! scheduled-action queue. The engine owns its ledger (pools, portfolios,
//! actions) and is driven entirely by explicit calls: callers inject the
//! current timestamp and an [`OracleSource`] capability, so every operation
//! is reproducible in tests.
//!
//! All multi-step mutations are all-or-nothing: they stage against cloned
//! pool/balance state and commit only on success.

pub mod error;
pub mod math;
pub mod oracle;
pub mod pool;
pub mod portfolio;
pub mod rebalance;
pub mod schedule;

#[cfg(test)]
mod tests;

pub use error::{
    AuthorizationError, Error, LiquidityError, OracleError, StateError, ValidationError,
};
pub use oracle::{OracleSource, PriceFeedBinding};
pub use pool::{LiquidityPool, SwapSide};
pub use portfolio::{Portfolio, PortfolioView};
pub use rebalance::RebalanceOutcome;
pub use schedule::{ActionStatus, ActionTrigger, ScheduledAction, TokenTracking};

use std::collections::BTreeMap;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Opaque account/token identifier (32 bytes, chain-agnostic).
pub type Address = [u8; 32];

/// Sentinel address for the native asset.
pub const NATIVE: Address = [0u8; 32];

/// The native asset is fixed-point with 18 decimals.
pub const NATIVE_DECIMALS: u8 = 18;

/// Engine-wide tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineParams {
    /// Swap fee retained by pools, in basis points.
    pub swap_fee_bps: u16,
    /// Oracle observations older than this are rejected as stale.
    pub max_price_staleness_secs: u64,
    /// When set, a rebalance swap whose output value deviates from its
    /// oracle-priced input value by more than this many bps is aborted.
    /// `None` executes at AMM spot unconditionally.
    pub max_execution_deviation_bps: Option<u16>,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            swap_fee_bps: 30,
            max_price_staleness_secs: 3600,
            max_execution_deviation_bps: None,
        }
    }
}

/// The shared ledger: every mutation below serializes through `&mut Engine`.
#[derive(Debug, Clone)]
pub struct Engine {
    pub params: EngineParams,
    pub admin: Address,
    /// Price feed bindings, keyed by token. Doubles as the decimals
    /// registry: a token without a binding is unsupported for valuation.
    pub feeds: BTreeMap<Address, PriceFeedBinding>,
    /// One constant-product pool per token, paired against the native asset.
    pub pools: BTreeMap<Address, LiquidityPool>,
    pub portfolios: BTreeMap<u64, Portfolio>,
    pub actions: BTreeMap<u64, ScheduledAction>,
    /// Per (portfolio, token) entry/peak price bookkeeping.
    pub tracking: BTreeMap<(u64, Address), TokenTracking>,
    next_portfolio_id: u64,
    next_action_id: u64,
}

impl Engine {
    pub fn new(admin: Address, params: EngineParams) -> Self {
        Self {
            params,
            admin,
            feeds: BTreeMap::new(),
            pools: BTreeMap::new(),
            portfolios: BTreeMap::new(),
            actions: BTreeMap::new(),
            tracking: BTreeMap::new(),
            next_portfolio_id: 1,
            next_action_id: 1,
        }
    }

    /// A token is supported once it has a price feed bound.
    pub fn is_token_supported(&self, token: &Address) -> bool {
        *token == NATIVE || self.feeds.contains_key(token)
    }

    /// Decimal count for a token, from the feed-binding registry.
    /// This is the single normalization source; call sites never hardcode
    /// a decimal constant.
    pub fn token_decimals(&self, token: &Address) -> Result<u8> {
        if *token == NATIVE {
            return Ok(NATIVE_DECIMALS);
        }
        self.feeds
            .get(token)
            .map(|b| b.decimals)
            .ok_or(Error::Oracle(OracleError::NoPriceFeed))
    }

    pub(crate) fn alloc_portfolio_id(&mut self) -> u64 {
        let id = self.next_portfolio_id;
        self.next_portfolio_id += 1;
        id
    }

    pub(crate) fn alloc_action_id(&mut self) -> u64 {
        let id = self.next_action_id;
        self.next_action_id += 1;
        id
    }
}
