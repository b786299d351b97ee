//! Scheduled actions and per-token price tracking.
//!
//! Actions are stored `Pending` and stay `Pending` until an explicit
//! execute call: readiness is a computed predicate, never a stored state.
//! Stop-loss and take-profit conditions evaluate against the per-token
//! tracking record, whose peak advances as a side effect of every price
//! observation (valuation reads included), not only during keeper cycles.

use crate::error::{
    AuthorizationError, Error, StateError, ValidationError,
};
use crate::math::{mul_div, BPS_DENOM};
use crate::oracle::OracleSource;
use crate::pool::SwapSide;
use crate::{Address, Engine, Result, NATIVE};

/// Entry/peak price bookkeeping for one (portfolio, token) pair.
/// `entry_price` is set once at first acquisition; `peak_price` is
/// monotonically non-decreasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTracking {
    pub entry_price: u128,
    pub peak_price: u128,
    pub peak_timestamp: u64,
    pub last_update_time: u64,
}

/// What makes an action ready. One payload shape per kind; interpreted
/// exhaustively everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionTrigger {
    /// Ready once `execute_after` has passed.
    TimeBased,
    /// Ready once the tracked peak-to-current drawdown reaches `drop_bps`.
    StopLoss { token: Address, drop_bps: u16 },
    /// Ready once the gain over entry price reaches `gain_bps`.
    TakeProfit { token: Address, gain_bps: u16 },
    /// Ready once portfolio drift reaches the rebalance threshold.
    Rebalance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStatus {
    Pending,
    Executed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledAction {
    pub id: u64,
    pub portfolio_id: u64,
    pub trigger: ActionTrigger,
    /// Not-before gate, unix seconds. Applies to every trigger kind; the
    /// `TimeBased` kind is ready on this alone.
    pub execute_after: u64,
    /// Replacement target allocations applied at execution (same token
    /// list as the portfolio). `None` keeps current targets.
    pub new_allocations_bps: Option<Vec<u16>>,
    pub status: ActionStatus,
    pub created_at: u64,
}

impl Engine {
    /// Queue an action. Only structural validation happens here; live
    /// price/time conditions are evaluated by the readiness check.
    pub fn schedule_action(
        &mut self,
        caller: Address,
        portfolio_id: u64,
        trigger: ActionTrigger,
        execute_after: u64,
        new_allocations_bps: Option<Vec<u16>>,
        now: u64,
    ) -> Result<u64> {
        let p = self
            .portfolios
            .get(&portfolio_id)
            .ok_or(Error::State(StateError::PortfolioNotFound))?;
        if p.owner != caller {
            return Err(AuthorizationError::NotOwner.into());
        }
        if !p.active {
            return Err(StateError::PortfolioInactive.into());
        }

        match trigger {
            ActionTrigger::StopLoss { token, drop_bps } => {
                if drop_bps == 0 || drop_bps as u128 > BPS_DENOM {
                    return Err(ValidationError::InvalidThreshold.into());
                }
                if p.token_index(&token).is_none() {
                    return Err(ValidationError::TokenNotInPortfolio.into());
                }
            }
            ActionTrigger::TakeProfit { token, gain_bps } => {
                if gain_bps == 0 {
                    return Err(ValidationError::InvalidThreshold.into());
                }
                if p.token_index(&token).is_none() {
                    return Err(ValidationError::TokenNotInPortfolio.into());
                }
            }
            ActionTrigger::TimeBased | ActionTrigger::Rebalance => {}
        }
        if let Some(allocs) = &new_allocations_bps {
            if allocs.len() != p.tokens.len() {
                return Err(ValidationError::BadAllocationLength.into());
            }
            let sum: u32 = allocs.iter().map(|&b| b as u32).sum();
            if sum != BPS_DENOM as u32 {
                return Err(ValidationError::AllocationSumMismatch.into());
            }
        }

        let id = self.alloc_action_id();
        self.actions.insert(
            id,
            ScheduledAction {
                id,
                portfolio_id,
                trigger,
                execute_after,
                new_allocations_bps,
                status: ActionStatus::Pending,
                created_at: now,
            },
        );
        Ok(id)
    }

    /// IDs of pending actions whose predicate currently holds. Never
    /// mutates status; a predicate that errors (stale feed, missing pool)
    /// counts as not ready this cycle.
    pub fn get_ready_actions(&mut self, oracle: &dyn OracleSource, now: u64) -> Vec<u64> {
        let pending: Vec<u64> = self
            .actions
            .values()
            .filter(|a| a.status == ActionStatus::Pending)
            .map(|a| a.id)
            .collect();
        pending
            .into_iter()
            .filter(|id| matches!(self.action_ready(*id, oracle, now), Ok(true)))
            .collect()
    }

    /// Pending actions, for external schedulers.
    pub fn pending_actions(&self) -> impl Iterator<Item = &ScheduledAction> {
        self.actions
            .values()
            .filter(|a| a.status == ActionStatus::Pending)
    }

    pub fn get_action(&self, id: u64) -> Result<&ScheduledAction> {
        self.actions
            .get(&id)
            .ok_or(Error::State(StateError::ActionNotFound))
    }

    /// Evaluate one action's readiness predicate.
    pub fn action_ready(
        &mut self,
        id: u64,
        oracle: &dyn OracleSource,
        now: u64,
    ) -> Result<bool> {
        let action = self.get_action(id)?;
        if action.status != ActionStatus::Pending {
            return Ok(false);
        }
        if now < action.execute_after {
            return Ok(false);
        }
        let portfolio_id = action.portfolio_id;
        let trigger = action.trigger;

        match self.portfolios.get(&portfolio_id) {
            Some(p) if p.active => {}
            _ => return Ok(false),
        }

        match trigger {
            ActionTrigger::TimeBased => Ok(true),
            ActionTrigger::Rebalance => {
                let (_, max_drift) = self.portfolio_drift(oracle, now, portfolio_id)?;
                let threshold = self.portfolios[&portfolio_id].rebalance_threshold_bps;
                Ok(max_drift >= threshold)
            }
            ActionTrigger::StopLoss { token, drop_bps } => {
                let price = self.get_token_price(oracle, now, &token)?;
                self.observe_price(portfolio_id, &token, price, now);
                let Some(tr) = self.tracking.get(&(portfolio_id, token)) else {
                    return Ok(false);
                };
                if tr.peak_price == 0 {
                    return Ok(false);
                }
                let drawdown = tr.peak_price.saturating_sub(price);
                Ok(mul_div(drawdown, BPS_DENOM, tr.peak_price)? >= drop_bps as u128)
            }
            ActionTrigger::TakeProfit { token, gain_bps } => {
                let price = self.get_token_price(oracle, now, &token)?;
                self.observe_price(portfolio_id, &token, price, now);
                let Some(tr) = self.tracking.get(&(portfolio_id, token)) else {
                    return Ok(false);
                };
                if tr.entry_price == 0 {
                    return Ok(false);
                }
                let gain = price.saturating_sub(tr.entry_price);
                Ok(mul_div(gain, BPS_DENOM, tr.entry_price)? >= gain_bps as u128)
            }
        }
    }

    /// Execute a ready action. Deliberately separate from readiness
    /// surfacing, and open to any caller so an external keeper can drive
    /// it; cancellation stays owner-only.
    pub fn execute_action(
        &mut self,
        _caller: Address,
        id: u64,
        oracle: &dyn OracleSource,
        now: u64,
    ) -> Result<()> {
        let action = self.get_action(id)?;
        if action.status != ActionStatus::Pending {
            return Err(StateError::ActionNotPending.into());
        }
        if !self.action_ready(id, oracle, now)? {
            return Err(StateError::ActionNotReady.into());
        }

        let action = self.get_action(id)?.clone();
        match action.trigger {
            ActionTrigger::TimeBased => {
                self.run_rebalance(
                    action.portfolio_id,
                    action.new_allocations_bps.clone(),
                    oracle,
                    now,
                    false,
                )?;
            }
            ActionTrigger::Rebalance => {
                self.run_rebalance(
                    action.portfolio_id,
                    action.new_allocations_bps.clone(),
                    oracle,
                    now,
                    true,
                )?;
            }
            ActionTrigger::StopLoss { token, .. } | ActionTrigger::TakeProfit { token, .. } => {
                self.liquidate_to_native(action.portfolio_id, token)?;
            }
        }

        self.actions
            .get_mut(&id)
            .expect("looked up above")
            .status = ActionStatus::Executed;
        Ok(())
    }

    /// Cancel a pending action. Owner only; a ready action that has not
    /// been executed is still pending and can be cancelled.
    pub fn cancel_action(&mut self, caller: Address, id: u64) -> Result<()> {
        let action = self.get_action(id)?;
        if action.status != ActionStatus::Pending {
            return Err(StateError::ActionNotPending.into());
        }
        let portfolio_id = action.portfolio_id;
        let p = self
            .portfolios
            .get(&portfolio_id)
            .ok_or(Error::State(StateError::PortfolioNotFound))?;
        if p.owner != caller {
            return Err(AuthorizationError::NotOwner.into());
        }
        self.actions
            .get_mut(&id)
            .expect("looked up above")
            .status = ActionStatus::Cancelled;
        Ok(())
    }

    /// Sell a token position entirely into the native asset (stop-loss and
    /// take-profit execution). The proceeds land on the portfolio's native
    /// position, which is appended with a zero target weight if absent.
    fn liquidate_to_native(&mut self, portfolio_id: u64, token: Address) -> Result<()> {
        let p = self
            .portfolios
            .get(&portfolio_id)
            .ok_or(Error::State(StateError::PortfolioNotFound))?;
        if !p.active {
            return Err(StateError::PortfolioInactive.into());
        }
        let idx = p
            .token_index(&token)
            .ok_or(Error::Validation(ValidationError::TokenNotInPortfolio))?;
        let amount = p.current_balances[idx];
        if amount == 0 || token == NATIVE {
            return Ok(());
        }

        let mut staged_pools = self.pools.clone();
        let out = self.staged_swap(&mut staged_pools, &token, SwapSide::TokenIn, amount)?;

        self.pools = staged_pools;
        let p = self.portfolios.get_mut(&portfolio_id).expect("checked above");
        p.current_balances[idx] = 0;
        match p.token_index(&NATIVE) {
            Some(n) => p.current_balances[n] += out,
            None => {
                p.tokens.push(NATIVE);
                p.target_allocations_bps.push(0);
                p.current_balances.push(out);
            }
        }
        Ok(())
    }

    /// Record a tracking entry at first acquisition. Entry price is set
    /// exactly once.
    pub(crate) fn ensure_tracking(&mut self, portfolio_id: u64, token: Address, price: u128, now: u64) {
        self.tracking
            .entry((portfolio_id, token))
            .or_insert(TokenTracking {
                entry_price: price,
                peak_price: price,
                peak_timestamp: now,
                last_update_time: now,
            });
    }

    /// Advance peak tracking with a fresh observation.
    pub(crate) fn observe_price(&mut self, portfolio_id: u64, token: &Address, price: u128, now: u64) {
        if let Some(tr) = self.tracking.get_mut(&(portfolio_id, *token)) {
            if price > tr.peak_price {
                tr.peak_price = price;
                tr.peak_timestamp = now;
            }
            tr.last_update_time = now;
        }
    }
}
