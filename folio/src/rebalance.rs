//! Threshold rebalancing.
//!
//! Drift is measured in bps of USD-weighted share versus target. Execution
//! always sells over-allocated tokens into the native asset first, then
//! spends the proceeds on under-allocated tokens, so no external funding is
//! ever needed mid-rebalance. The whole operation stages against cloned
//! pool/balance state and commits only when every swap succeeded.

use crate::error::{AuthorizationError, Error, LiquidityError, StateError, ValidationError};
use crate::math::{mul_div, pow10, share_bps, BPS_DENOM};
use crate::oracle::OracleSource;
use crate::pool::SwapSide;
use crate::{Address, Engine, Result, NATIVE, NATIVE_DECIMALS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebalanceOutcome {
    /// Max drift was below the portfolio threshold; nothing traded.
    Skipped { max_drift_bps: u16 },
    Executed {
        max_drift_bps: u16,
        swaps: u32,
        total_value_usd: u128,
    },
}

impl Engine {
    /// Rebalance a portfolio back to its stored targets if drift reaches
    /// the portfolio's threshold. Owner only.
    pub fn rebalance_now(
        &mut self,
        caller: Address,
        id: u64,
        oracle: &dyn OracleSource,
        now: u64,
    ) -> Result<RebalanceOutcome> {
        let p = self
            .portfolios
            .get(&id)
            .ok_or(Error::State(StateError::PortfolioNotFound))?;
        if p.owner != caller {
            return Err(AuthorizationError::NotOwner.into());
        }
        self.run_rebalance(id, None, oracle, now, true)
    }

    /// Per-token drift in bps (`current share - target`), plus the max
    /// absolute drift. Read-only apart from peak-tracking observation.
    pub fn portfolio_drift(
        &mut self,
        oracle: &dyn OracleSource,
        now: u64,
        id: u64,
    ) -> Result<(Vec<i32>, u16)> {
        let (total, values, _) = self.portfolio_values(oracle, now, id)?;
        let p = self
            .portfolios
            .get(&id)
            .ok_or(Error::State(StateError::PortfolioNotFound))?;
        let mut drifts = Vec::with_capacity(values.len());
        let mut max_abs = 0u16;
        for (i, value) in values.iter().enumerate() {
            let share = share_bps(*value, total)? as i32;
            let drift = share - p.target_allocations_bps[i] as i32;
            max_abs = max_abs.max(drift.unsigned_abs() as u16);
            drifts.push(drift);
        }
        Ok((drifts, max_abs))
    }

    /// Core rebalance path. `new_targets`, when given, replaces the target
    /// allocations (same token list) before drift is corrected; used by
    /// scheduled reallocation actions. `enforce_threshold = false` forces
    /// execution regardless of drift.
    pub(crate) fn run_rebalance(
        &mut self,
        id: u64,
        new_targets: Option<Vec<u16>>,
        oracle: &dyn OracleSource,
        now: u64,
        enforce_threshold: bool,
    ) -> Result<RebalanceOutcome> {
        let (total, values, prices) = self.portfolio_values(oracle, now, id)?;
        let p = self
            .portfolios
            .get(&id)
            .ok_or(Error::State(StateError::PortfolioNotFound))?;
        if !p.active {
            return Err(StateError::PortfolioInactive.into());
        }
        let tokens = p.tokens.clone();
        let balances = p.current_balances.clone();
        let threshold = p.rebalance_threshold_bps;

        let targets = match &new_targets {
            Some(t) => {
                if t.len() != tokens.len() {
                    return Err(ValidationError::BadAllocationLength.into());
                }
                let sum: u32 = t.iter().map(|&b| b as u32).sum();
                if sum != BPS_DENOM as u32 {
                    return Err(ValidationError::AllocationSumMismatch.into());
                }
                t.clone()
            }
            None => p.target_allocations_bps.clone(),
        };

        if total == 0 {
            return Ok(RebalanceOutcome::Skipped { max_drift_bps: 0 });
        }

        // Drift per token, in bps of total value.
        let mut drifts = Vec::with_capacity(tokens.len());
        let mut max_drift = 0u16;
        for (i, value) in values.iter().enumerate() {
            let share = share_bps(*value, total)? as i32;
            let drift = share - targets[i] as i32;
            max_drift = max_drift.max(drift.unsigned_abs() as u16);
            drifts.push(drift);
        }
        if enforce_threshold && max_drift < threshold {
            return Ok(RebalanceOutcome::Skipped {
                max_drift_bps: max_drift,
            });
        }

        // Oracle price of the native asset, needed to bound execution
        // prices when the deviation guard is configured.
        let native_price = match self.params.max_execution_deviation_bps {
            Some(_) => Some(self.get_token_price(oracle, now, &NATIVE)?),
            None => None,
        };

        let mut staged_pools = self.pools.clone();
        let mut staged_balances = balances;
        let mut pot: u128 = 0; // native proceeds, raw units
        let mut swaps = 0u32;

        // Sell pass: over-allocated tokens go back to native, in stored
        // token order.
        for (i, token) in tokens.iter().enumerate() {
            if drifts[i] <= 0 {
                continue;
            }
            let excess_usd = mul_div(total, drifts[i] as u128, BPS_DENOM)?.min(values[i]);
            if excess_usd == 0 {
                continue;
            }
            let decimals = self.token_decimals(token)?;
            let amount = mul_div(excess_usd, pow10(decimals), prices[i])?
                .min(staged_balances[i]);
            if amount == 0 {
                continue;
            }
            if *token == NATIVE {
                // Native never trades against itself; its excess funds
                // the buy pass directly.
                staged_balances[i] -= amount;
                pot += amount;
            } else {
                let out = self.staged_swap(&mut staged_pools, token, SwapSide::TokenIn, amount)?;
                if let Some(native_price) = native_price {
                    let v_in = mul_div(amount, prices[i], pow10(decimals))?;
                    let v_out = mul_div(out, native_price, pow10(NATIVE_DECIMALS))?;
                    self.check_deviation(v_in, v_out)?;
                }
                staged_balances[i] -= amount;
                pot += out;
                swaps += 1;
            }
        }

        // Buy pass: spend the pot across under-allocated tokens,
        // proportional to their USD deficits. The last non-native buy takes
        // the remainder unless native itself is under-allocated, in which
        // case the remainder simply stays native.
        let mut total_deficit: u128 = 0;
        let mut native_under: Option<usize> = None;
        let mut buy_idx: Vec<usize> = Vec::new();
        for (i, token) in tokens.iter().enumerate() {
            if drifts[i] >= 0 {
                continue;
            }
            total_deficit += mul_div(total, drifts[i].unsigned_abs() as u128, BPS_DENOM)?;
            if *token == NATIVE {
                native_under = Some(i);
            } else {
                buy_idx.push(i);
            }
        }

        if total_deficit > 0 && pot > 0 {
            let pot_start = pot;
            for (n, &i) in buy_idx.iter().enumerate() {
                let deficit_usd = mul_div(total, drifts[i].unsigned_abs() as u128, BPS_DENOM)?;
                let is_last = n + 1 == buy_idx.len() && native_under.is_none();
                let native_in = if is_last {
                    pot
                } else {
                    mul_div(pot_start, deficit_usd, total_deficit)?.min(pot)
                };
                if native_in == 0 {
                    continue;
                }
                let token = &tokens[i];
                let out = self.staged_swap(&mut staged_pools, token, SwapSide::NativeIn, native_in)?;
                if let Some(native_price) = native_price {
                    let decimals = self.token_decimals(token)?;
                    let v_in = mul_div(native_in, native_price, pow10(NATIVE_DECIMALS))?;
                    let v_out = mul_div(out, prices[i], pow10(decimals))?;
                    self.check_deviation(v_in, v_out)?;
                }
                pot -= native_in;
                staged_balances[i] += out;
                swaps += 1;
            }
            if let Some(i) = native_under {
                staged_balances[i] += pot;
                pot = 0;
            }
        }
        // Rounding can strand a few native units (deficits flooring to
        // zero on tiny portfolios). Park them in the native position when
        // one exists rather than burning them.
        if pot > 0 {
            if let Some(i) = tokens.iter().position(|t| *t == NATIVE) {
                staged_balances[i] += pot;
            } else if let Some(&i) = buy_idx.last() {
                let out =
                    self.staged_swap(&mut staged_pools, &tokens[i], SwapSide::NativeIn, pot)?;
                staged_balances[i] += out;
                swaps += 1;
            }
        }

        // Commit.
        self.pools = staged_pools;
        let p = self.portfolios.get_mut(&id).expect("checked above");
        p.current_balances = staged_balances;
        if let Some(t) = new_targets {
            p.target_allocations_bps = t;
        }
        p.last_rebalance = now;

        Ok(RebalanceOutcome::Executed {
            max_drift_bps: max_drift,
            swaps,
            total_value_usd: total,
        })
    }

    /// Abort when execution value drifts too far from oracle value.
    fn check_deviation(&self, value_in_usd: u128, value_out_usd: u128) -> Result<()> {
        let Some(bound) = self.params.max_execution_deviation_bps else {
            return Ok(());
        };
        if value_in_usd == 0 {
            return Ok(());
        }
        let diff = value_in_usd.abs_diff(value_out_usd);
        if mul_div(diff, BPS_DENOM, value_in_usd)? > bound as u128 {
            return Err(LiquidityError::ExcessiveDeviation.into());
        }
        Ok(())
    }
}
