//! Constant-product liquidity pools.
//!
//! One pool per token, paired against the native asset. Reserves are stored
//! WAD-normalized (1e18) so the x*y=k math never mixes decimal bases; the
//! engine-level wrappers convert to and from raw token amounts at the edge.
//!
//! Invariants:
//! - reserves are both zero (uninitialized/drained) or both positive;
//! - `native_reserve * token_reserve` is non-decreasing across any
//!   fee-bearing swap (the full input enters the reserve, only the
//!   fee-reduced input prices the output).

use crate::error::{Error, LiquidityError, ValidationError};
use crate::math::{from_wad, isqrt, mul_div, pow10, to_wad, BPS_DENOM, WAD};
use crate::{Address, Engine, Result, NATIVE, NATIVE_DECIMALS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapSide {
    /// Native in, token out.
    NativeIn,
    /// Token in, native out.
    TokenIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidityPool {
    /// Native-asset reserve, WAD.
    pub native_reserve: u128,
    /// Token reserve, WAD.
    pub token_reserve: u128,
    pub total_shares: u128,
    pub token_decimals: u8,
}

impl LiquidityPool {
    pub fn new(token_decimals: u8) -> Self {
        Self {
            native_reserve: 0,
            token_reserve: 0,
            total_shares: 0,
            token_decimals,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.native_reserve == 0 || self.token_reserve == 0
    }

    /// Add liquidity, WAD amounts.
    ///
    /// An empty pool bootstraps at exactly the supplied ratio and mints
    /// `isqrt(token * native)` shares. A live pool only accepts amounts at
    /// the current reserve ratio; excess on either side is rejected rather
    /// than silently donated.
    pub fn add_liquidity(&mut self, token_wad: u128, native_wad: u128) -> Result<u128> {
        if token_wad == 0 || native_wad == 0 {
            return Err(ValidationError::ZeroAmount.into());
        }

        let minted = if self.total_shares == 0 {
            // sqrt(a*b) == sqrt(a*b/1e18) * 1e9, keeping the product in range
            let scaled = mul_div(token_wad, native_wad, WAD)?;
            let shares = isqrt(scaled)
                .checked_mul(1_000_000_000)
                .ok_or(Error::Validation(ValidationError::NumericOverflow))?;
            if shares == 0 {
                return Err(ValidationError::ZeroAmount.into());
            }
            shares
        } else {
            let expected_native = mul_div(token_wad, self.native_reserve, self.token_reserve)?;
            if native_wad != expected_native {
                return Err(ValidationError::LiquidityRatioMismatch.into());
            }
            mul_div(self.total_shares, token_wad, self.token_reserve)?
        };

        self.token_reserve = self
            .token_reserve
            .checked_add(token_wad)
            .ok_or(Error::Validation(ValidationError::NumericOverflow))?;
        self.native_reserve = self
            .native_reserve
            .checked_add(native_wad)
            .ok_or(Error::Validation(ValidationError::NumericOverflow))?;
        self.total_shares += minted;
        Ok(minted)
    }

    /// Burn shares for a proportional cut of both reserves, WAD amounts out.
    pub fn remove_liquidity(&mut self, shares: u128) -> Result<(u128, u128)> {
        if shares == 0 {
            return Err(ValidationError::ZeroAmount.into());
        }
        if shares > self.total_shares {
            return Err(LiquidityError::InsufficientShares.into());
        }

        let token_out = mul_div(self.token_reserve, shares, self.total_shares)?;
        let native_out = mul_div(self.native_reserve, shares, self.total_shares)?;

        self.token_reserve -= token_out;
        self.native_reserve -= native_out;
        self.total_shares -= shares;
        Ok((token_out, native_out))
    }

    /// Price a swap without mutating reserves. WAD in, WAD out.
    pub fn quote(&self, side: SwapSide, amount_in_wad: u128, fee_bps: u16) -> Result<u128> {
        if amount_in_wad == 0 {
            return Ok(0);
        }
        if self.is_empty() {
            return Err(LiquidityError::PoolEmpty.into());
        }
        if fee_bps as u128 >= BPS_DENOM {
            return Err(ValidationError::InvalidFee.into());
        }

        let (reserve_in, reserve_out) = match side {
            SwapSide::NativeIn => (self.native_reserve, self.token_reserve),
            SwapSide::TokenIn => (self.token_reserve, self.native_reserve),
        };

        let in_less_fee = mul_div(amount_in_wad, BPS_DENOM - fee_bps as u128, BPS_DENOM)?;
        let denom = reserve_in
            .checked_add(in_less_fee)
            .ok_or(Error::Validation(ValidationError::NumericOverflow))?;
        let out = mul_div(reserve_out, in_less_fee, denom)?;
        if out >= reserve_out {
            return Err(LiquidityError::InsufficientReserve.into());
        }
        Ok(out)
    }

    /// Execute a swap. The full input joins the reserve; only the
    /// fee-reduced input prices the output, so k never decreases.
    ///
    /// Output on the token side is floored to the token's raw decimal
    /// grid before the reserve moves: only amounts the taker can actually
    /// hold leave the pool, sub-unit dust stays in the reserve.
    pub fn swap(&mut self, side: SwapSide, amount_in_wad: u128, fee_bps: u16) -> Result<u128> {
        let mut out = self.quote(side, amount_in_wad, fee_bps)?;
        if amount_in_wad == 0 {
            return Ok(0);
        }
        match side {
            SwapSide::NativeIn => {
                out -= out % pow10(18 - self.token_decimals);
                self.native_reserve += amount_in_wad;
                self.token_reserve -= out;
            }
            SwapSide::TokenIn => {
                self.token_reserve += amount_in_wad;
                self.native_reserve -= out;
            }
        }
        Ok(out)
    }
}

impl Engine {
    /// Add liquidity in raw token/native amounts, creating the pool on
    /// first call. The token must already have a price feed bound (the
    /// binding is also the decimals registry entry the pool math needs).
    pub fn add_liquidity(
        &mut self,
        token: Address,
        token_amount: u128,
        native_amount: u128,
    ) -> Result<u128> {
        if token == NATIVE {
            return Err(ValidationError::NativePair.into());
        }
        let decimals = self.token_decimals(&token)?;
        let token_wad = to_wad(token_amount, decimals)?;
        let native_wad = to_wad(native_amount, NATIVE_DECIMALS)?;

        let pool = self
            .pools
            .entry(token)
            .or_insert_with(|| LiquidityPool::new(decimals));
        pool.add_liquidity(token_wad, native_wad)
    }

    /// Burn pool shares; returns `(token_out, native_out)` in raw amounts.
    pub fn remove_liquidity(&mut self, token: Address, shares: u128) -> Result<(u128, u128)> {
        let pool = self
            .pools
            .get_mut(&token)
            .ok_or(Error::Liquidity(LiquidityError::NoPool))?;
        let (token_wad, native_wad) = pool.remove_liquidity(shares)?;
        let decimals = pool.token_decimals;
        Ok((from_wad(token_wad, decimals), from_wad(native_wad, NATIVE_DECIMALS)))
    }

    /// Current reserves in raw amounts: `(native_reserve, token_reserve)`.
    pub fn get_pool_reserves(&self, token: &Address) -> Result<(u128, u128)> {
        let pool = self
            .pools
            .get(token)
            .ok_or(Error::Liquidity(LiquidityError::NoPool))?;
        Ok((
            from_wad(pool.native_reserve, NATIVE_DECIMALS),
            from_wad(pool.token_reserve, pool.token_decimals),
        ))
    }

    /// Swap against a token's pool. Raw amount in, raw amount out.
    pub fn swap(&mut self, token: Address, side: SwapSide, amount_in: u128) -> Result<u128> {
        let fee = self.params.swap_fee_bps;
        let pool = self
            .pools
            .get_mut(&token)
            .ok_or(Error::Liquidity(LiquidityError::NoPool))?;
        let (in_dec, out_dec) = match side {
            SwapSide::NativeIn => (NATIVE_DECIMALS, pool.token_decimals),
            SwapSide::TokenIn => (pool.token_decimals, NATIVE_DECIMALS),
        };
        let out_wad = pool.swap(side, to_wad(amount_in, in_dec)?, fee)?;
        Ok(from_wad(out_wad, out_dec))
    }

    /// Price a swap without touching reserves. Raw amount in, raw out.
    pub fn quote_swap(&self, token: &Address, side: SwapSide, amount_in: u128) -> Result<u128> {
        let pool = self
            .pools
            .get(token)
            .ok_or(Error::Liquidity(LiquidityError::NoPool))?;
        let (in_dec, out_dec) = match side {
            SwapSide::NativeIn => (NATIVE_DECIMALS, pool.token_decimals),
            SwapSide::TokenIn => (pool.token_decimals, NATIVE_DECIMALS),
        };
        let out_wad = pool.quote(side, to_wad(amount_in, in_dec)?, self.params.swap_fee_bps)?;
        Ok(from_wad(out_wad, out_dec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_1000_1000() -> LiquidityPool {
        let mut p = LiquidityPool::new(18);
        p.add_liquidity(1000 * WAD, 1000 * WAD).unwrap();
        p
    }

    #[test]
    fn bootstrap_reproduces_ratio() {
        let mut p = LiquidityPool::new(18);
        p.add_liquidity(300 * WAD, 100 * WAD).unwrap();
        assert_eq!(p.token_reserve, 300 * WAD);
        assert_eq!(p.native_reserve, 100 * WAD);
        assert!(p.total_shares > 0);
    }

    #[test]
    fn second_add_requires_matching_ratio() {
        let mut p = pool_1000_1000();
        assert_eq!(
            p.add_liquidity(10 * WAD, 11 * WAD),
            Err(ValidationError::LiquidityRatioMismatch.into())
        );
        // Matching amounts mint proportional shares
        let before = p.total_shares;
        let minted = p.add_liquidity(10 * WAD, 10 * WAD).unwrap();
        assert_eq!(minted, before / 100);
    }

    #[test]
    fn swap_zero_is_a_noop() {
        let mut p = pool_1000_1000();
        let before = p;
        assert_eq!(p.swap(SwapSide::NativeIn, 0, 30).unwrap(), 0);
        assert_eq!(p, before);
    }

    #[test]
    fn fee_at_or_above_denominator_is_rejected() {
        let mut p = pool_1000_1000();
        for fee in [10_000u16, 20_000, u16::MAX] {
            assert_eq!(
                p.swap(SwapSide::NativeIn, WAD, fee),
                Err(ValidationError::InvalidFee.into())
            );
        }
        // 9999 bps is absurd but representable
        assert!(p.quote(SwapSide::NativeIn, WAD, 9_999).is_ok());
    }

    #[test]
    fn swap_on_empty_pool_fails() {
        let mut p = LiquidityPool::new(18);
        assert_eq!(
            p.swap(SwapSide::NativeIn, WAD, 30),
            Err(LiquidityError::PoolEmpty.into())
        );
    }

    #[test]
    fn feeless_swap_matches_constant_product() {
        // 1000/1000 reserves, 10 native in, no fee:
        // out = 1000 - 1000*1000/1010
        let mut p = pool_1000_1000();
        let out = p.swap(SwapSide::NativeIn, 10 * WAD, 0).unwrap();
        assert_eq!(out, mul_div(1000 * WAD, 10 * WAD, 1010 * WAD).unwrap());
        assert_eq!(p.native_reserve, 1010 * WAD);
        assert_eq!(p.token_reserve, 1000 * WAD - out);
    }

    #[test]
    fn k_non_decreasing_with_fee() {
        let mut p = pool_1000_1000();
        let k0 = mul_div(p.native_reserve, p.token_reserve, WAD).unwrap();
        p.swap(SwapSide::TokenIn, 37 * WAD, 30).unwrap();
        let k1 = mul_div(p.native_reserve, p.token_reserve, WAD).unwrap();
        assert!(k1 >= k0);
    }

    #[test]
    fn full_share_burn_drains_both_reserves() {
        let mut p = pool_1000_1000();
        let shares = p.total_shares;
        let (t, n) = p.remove_liquidity(shares).unwrap();
        assert_eq!((t, n), (1000 * WAD, 1000 * WAD));
        assert_eq!(p.total_shares, 0);
        assert!(p.is_empty());
    }
}
