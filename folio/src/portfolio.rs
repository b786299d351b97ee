//! Portfolio registry and USD valuation.
//!
//! A portfolio is the durable record of an owner's token set, target
//! weights and raw balances. Valuation is never cached: every read walks
//! the live oracle, so two reads with no intervening mutation may differ
//! when the price moved - that is intended. Valuation reads also advance
//! the per-token peak-price tracking used by stop-loss conditions.

use crate::error::{
    AuthorizationError, Error, LiquidityError, StateError, ValidationError,
};
use crate::math::{mul_div, pow10, BPS_DENOM};
use crate::oracle::OracleSource;
use crate::pool::SwapSide;
use crate::schedule::TokenTracking;
use crate::{Address, Engine, Result, NATIVE};

use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Portfolio {
    pub id: u64,
    pub owner: Address,
    pub tokens: Vec<Address>,
    pub target_allocations_bps: Vec<u16>,
    /// Raw balances in each token's own decimal base, parallel to `tokens`.
    pub current_balances: Vec<u128>,
    pub rebalance_threshold_bps: u16,
    pub active: bool,
    pub created_at: u64,
    pub last_rebalance: u64,
}

impl Portfolio {
    pub fn token_index(&self, token: &Address) -> Option<usize> {
        self.tokens.iter().position(|t| t == token)
    }
}

/// Read model returned by `get_portfolio`: the stored record plus a fresh
/// USD valuation at 1e8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortfolioView {
    pub id: u64,
    pub owner: Address,
    pub tokens: Vec<Address>,
    pub target_allocations_bps: Vec<u16>,
    pub current_balances: Vec<u128>,
    pub rebalance_threshold_bps: u16,
    pub total_value_usd: u128,
    pub active: bool,
}

pub(crate) fn validate_targets(tokens: &[Address], allocations_bps: &[u16]) -> Result<()> {
    if tokens.is_empty() {
        return Err(ValidationError::EmptyTokenSet.into());
    }
    if tokens.len() != allocations_bps.len() {
        return Err(ValidationError::BadAllocationLength.into());
    }
    let unique: BTreeSet<&Address> = tokens.iter().collect();
    if unique.len() != tokens.len() {
        return Err(ValidationError::DuplicateToken.into());
    }
    let sum: u32 = allocations_bps.iter().map(|&b| b as u32).sum();
    if sum != BPS_DENOM as u32 {
        return Err(ValidationError::AllocationSumMismatch.into());
    }
    Ok(())
}

/// Split a native deposit across targets. Rounding dust goes to the last
/// token with a non-zero weight, so the split always sums to `deposit`.
pub(crate) fn split_deposit(deposit: u128, allocations_bps: &[u16]) -> Result<Vec<u128>> {
    let mut amounts = Vec::with_capacity(allocations_bps.len());
    let mut assigned = 0u128;
    for &bps in allocations_bps {
        let amt = mul_div(deposit, bps as u128, BPS_DENOM)?;
        assigned += amt;
        amounts.push(amt);
    }
    if let Some(last) = allocations_bps.iter().rposition(|&b| b > 0) {
        amounts[last] += deposit - assigned;
    }
    Ok(amounts)
}

impl Engine {
    /// Create a portfolio and swap `native_deposit` into the target mix.
    ///
    /// Fails atomically: no pool reserve or registry entry changes unless
    /// every sub-step succeeds.
    pub fn create_portfolio(
        &mut self,
        caller: Address,
        tokens: Vec<Address>,
        allocations_bps: Vec<u16>,
        rebalance_threshold_bps: u16,
        native_deposit: u128,
        oracle: &dyn OracleSource,
        now: u64,
    ) -> Result<u64> {
        validate_targets(&tokens, &allocations_bps)?;
        if rebalance_threshold_bps == 0 || rebalance_threshold_bps > BPS_DENOM as u16 {
            return Err(ValidationError::InvalidThreshold.into());
        }

        // Every token must be priceable now, and every non-native token
        // needs a pool to trade through.
        let mut prices = Vec::with_capacity(tokens.len());
        for token in &tokens {
            prices.push(self.get_token_price(oracle, now, token)?);
            if *token != NATIVE && !self.pools.contains_key(token) {
                return Err(LiquidityError::NoPool.into());
            }
        }

        // Stage the acquisition swaps against cloned pools.
        let mut staged_pools = self.pools.clone();
        let mut balances = vec![0u128; tokens.len()];
        if native_deposit > 0 {
            let splits = split_deposit(native_deposit, &allocations_bps)?;
            for (i, token) in tokens.iter().enumerate() {
                if splits[i] == 0 {
                    continue;
                }
                balances[i] = if *token == NATIVE {
                    splits[i]
                } else {
                    self.staged_swap(&mut staged_pools, token, SwapSide::NativeIn, splits[i])?
                };
            }
        }

        // Commit.
        self.pools = staged_pools;
        let id = self.alloc_portfolio_id();
        for (i, token) in tokens.iter().enumerate() {
            if balances[i] > 0 {
                self.ensure_tracking(id, *token, prices[i], now);
            }
        }
        self.portfolios.insert(
            id,
            Portfolio {
                id,
                owner: caller,
                tokens,
                target_allocations_bps: allocations_bps,
                current_balances: balances,
                rebalance_threshold_bps,
                active: true,
                created_at: now,
                last_rebalance: 0,
            },
        );
        Ok(id)
    }

    /// Fresh view of a portfolio, valued at current oracle prices.
    pub fn get_portfolio(
        &mut self,
        oracle: &dyn OracleSource,
        now: u64,
        id: u64,
    ) -> Result<PortfolioView> {
        let (total, _, _) = self.portfolio_values(oracle, now, id)?;
        let p = self
            .portfolios
            .get(&id)
            .ok_or(Error::State(StateError::PortfolioNotFound))?;
        Ok(PortfolioView {
            id: p.id,
            owner: p.owner,
            tokens: p.tokens.clone(),
            target_allocations_bps: p.target_allocations_bps.clone(),
            current_balances: p.current_balances.clone(),
            rebalance_threshold_bps: p.rebalance_threshold_bps,
            total_value_usd: total,
            active: p.active,
        })
    }

    pub fn get_user_portfolios(&self, owner: &Address) -> Vec<u64> {
        self.portfolios
            .values()
            .filter(|p| p.owner == *owner)
            .map(|p| p.id)
            .collect()
    }

    /// Top up a portfolio with native funds, bought into the target mix at
    /// current allocations. Atomic like creation.
    pub fn deposit(
        &mut self,
        caller: Address,
        id: u64,
        native_amount: u128,
        oracle: &dyn OracleSource,
        now: u64,
    ) -> Result<()> {
        if native_amount == 0 {
            return Err(ValidationError::ZeroAmount.into());
        }
        let p = self
            .portfolios
            .get(&id)
            .ok_or(Error::State(StateError::PortfolioNotFound))?;
        if p.owner != caller {
            return Err(AuthorizationError::NotOwner.into());
        }
        if !p.active {
            return Err(StateError::PortfolioInactive.into());
        }
        let tokens = p.tokens.clone();
        let allocations = p.target_allocations_bps.clone();

        let mut prices = Vec::with_capacity(tokens.len());
        for token in &tokens {
            prices.push(self.get_token_price(oracle, now, token)?);
        }

        let mut staged_pools = self.pools.clone();
        let splits = split_deposit(native_amount, &allocations)?;
        let mut bought = vec![0u128; tokens.len()];
        for (i, token) in tokens.iter().enumerate() {
            if splits[i] == 0 {
                continue;
            }
            bought[i] = if *token == NATIVE {
                splits[i]
            } else {
                self.staged_swap(&mut staged_pools, token, SwapSide::NativeIn, splits[i])?
            };
        }

        self.pools = staged_pools;
        for (i, token) in tokens.iter().enumerate() {
            if bought[i] > 0 {
                self.ensure_tracking(id, *token, prices[i], now);
            }
        }
        let p = self.portfolios.get_mut(&id).expect("checked above");
        for (i, amt) in bought.iter().enumerate() {
            p.current_balances[i] += amt;
        }
        Ok(())
    }

    /// Close a portfolio. Balances stay readable; all mutation stops.
    pub fn close_portfolio(&mut self, caller: Address, id: u64) -> Result<()> {
        let p = self
            .portfolios
            .get_mut(&id)
            .ok_or(Error::State(StateError::PortfolioNotFound))?;
        if p.owner != caller {
            return Err(AuthorizationError::NotOwner.into());
        }
        if !p.active {
            return Err(StateError::PortfolioInactive.into());
        }
        p.active = false;
        Ok(())
    }

    pub fn get_token_tracking(&self, id: u64, token: &Address) -> Result<TokenTracking> {
        if !self.portfolios.contains_key(&id) {
            return Err(StateError::PortfolioNotFound.into());
        }
        self.tracking
            .get(&(id, *token))
            .copied()
            .ok_or(Error::State(StateError::NoTracking))
    }

    /// Value every position at current oracle prices.
    ///
    /// Returns `(total_usd, per_token_usd, per_token_price)`, all at 1e8.
    /// As a side effect this is also the price observation point: peak
    /// tracking advances on every valuation read, not only in keeper
    /// cycles.
    pub(crate) fn portfolio_values(
        &mut self,
        oracle: &dyn OracleSource,
        now: u64,
        id: u64,
    ) -> Result<(u128, Vec<u128>, Vec<u128>)> {
        let p = self
            .portfolios
            .get(&id)
            .ok_or(Error::State(StateError::PortfolioNotFound))?;
        let tokens = p.tokens.clone();
        let balances = p.current_balances.clone();

        let mut prices = Vec::with_capacity(tokens.len());
        let mut values = Vec::with_capacity(tokens.len());
        let mut total = 0u128;
        for (i, token) in tokens.iter().enumerate() {
            let price = self.get_token_price(oracle, now, token)?;
            let decimals = self.token_decimals(token)?;
            let value = mul_div(balances[i], price, pow10(decimals))?;
            total = total
                .checked_add(value)
                .ok_or(Error::Validation(ValidationError::NumericOverflow))?;
            prices.push(price);
            values.push(value);
        }

        for (i, token) in tokens.iter().enumerate() {
            self.observe_price(id, token, prices[i], now);
        }
        Ok((total, values, prices))
    }

    /// Swap against a staged pool map (used by atomic multi-swap flows).
    pub(crate) fn staged_swap(
        &self,
        staged: &mut std::collections::BTreeMap<Address, crate::pool::LiquidityPool>,
        token: &Address,
        side: SwapSide,
        amount_in: u128,
    ) -> Result<u128> {
        use crate::math::{from_wad, to_wad};
        use crate::NATIVE_DECIMALS;

        let pool = staged
            .get_mut(token)
            .ok_or(Error::Liquidity(LiquidityError::NoPool))?;
        let (in_dec, out_dec) = match side {
            SwapSide::NativeIn => (NATIVE_DECIMALS, pool.token_decimals),
            SwapSide::TokenIn => (pool.token_decimals, NATIVE_DECIMALS),
        };
        let out_wad = pool.swap(side, to_wad(amount_in, in_dec)?, self.params.swap_fee_bps)?;
        Ok(from_wad(out_wad, out_dec))
    }
}
