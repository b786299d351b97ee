//! Price oracle adapter.
//!
//! The engine never talks to a feed directly; callers inject an
//! [`OracleSource`] capability. Prices are normalized to USD fixed-point at
//! 1e8 regardless of the feed's own decimal count, and every read goes back
//! to the source - there is no caching layer that could serve a stale value.

use crate::error::{AuthorizationError, Error, OracleError, ValidationError};
use crate::math::{mul_div, pow10, PRICE_SCALE};
use crate::{Address, Engine, Result, NATIVE, NATIVE_DECIMALS};

/// Read capability over external price feeds.
///
/// `latest_round_data` returns the raw feed price (in the feed's own decimal
/// fixed-point) and the unix time of the observation.
pub trait OracleSource {
    fn latest_round_data(&self, feed: &Address) -> core::result::Result<(u128, u64), OracleError>;
    fn decimals(&self, feed: &Address) -> core::result::Result<u8, OracleError>;
}

/// Binding of a token to its external feed.
///
/// `decimals` is the token's own decimal count; it also serves as the
/// engine-wide decimals registry entry for the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceFeedBinding {
    pub feed: Address,
    pub decimals: u8,
}

impl Engine {
    /// Bind (or rebind) a token's price feed. Admin only.
    ///
    /// The native asset uses the [`NATIVE`] sentinel and must be declared
    /// with 18 decimals.
    pub fn set_price_feed(
        &mut self,
        caller: Address,
        token: Address,
        feed: Address,
        token_decimals: u8,
    ) -> Result<()> {
        if caller != self.admin {
            return Err(AuthorizationError::NotAdmin.into());
        }
        if token_decimals > 18 || (token == NATIVE && token_decimals != NATIVE_DECIMALS) {
            return Err(ValidationError::UnsupportedDecimals.into());
        }
        self.feeds.insert(
            token,
            PriceFeedBinding {
                feed,
                decimals: token_decimals,
            },
        );
        Ok(())
    }

    /// Current USD price of a token, fixed-point at 1e8.
    ///
    /// Fails with `NoPriceFeed` for unbound tokens and `StalePrice` when the
    /// feed's observation is older than the configured staleness window.
    pub fn get_token_price(
        &self,
        oracle: &dyn OracleSource,
        now: u64,
        token: &Address,
    ) -> Result<u128> {
        let binding = self
            .feeds
            .get(token)
            .ok_or(Error::Oracle(OracleError::NoPriceFeed))?;

        let (raw_price, updated_at) = oracle.latest_round_data(&binding.feed)?;
        if raw_price == 0 {
            return Err(OracleError::InvalidPrice.into());
        }
        if now.saturating_sub(updated_at) > self.params.max_price_staleness_secs {
            return Err(OracleError::StalePrice.into());
        }

        let feed_decimals = oracle.decimals(&binding.feed)?;
        scale_price(raw_price, feed_decimals)
    }
}

/// Rescale a feed answer from its own decimals to 1e8.
fn scale_price(raw: u128, feed_decimals: u8) -> Result<u128> {
    // 10^39 exceeds u128; a feed claiming that many decimals is broken,
    // not merely unusual.
    if feed_decimals > 38 {
        return Err(OracleError::InvalidPrice.into());
    }
    if feed_decimals == 8 {
        Ok(raw)
    } else if feed_decimals < 8 {
        raw.checked_mul(pow10(8 - feed_decimals))
            .ok_or(Error::Validation(ValidationError::NumericOverflow))
    } else {
        mul_div(raw, PRICE_SCALE, pow10(feed_decimals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_up_and_down_to_1e8() {
        // 6-decimal feed reporting $1.50
        assert_eq!(scale_price(1_500_000, 6).unwrap(), 150_000_000);
        // 8-decimal feed passes through
        assert_eq!(scale_price(42, 8).unwrap(), 42);
        // 18-decimal feed reporting $2.00
        assert_eq!(scale_price(2_000_000_000_000_000_000, 18).unwrap(), 200_000_000);
    }

    #[test]
    fn rejects_unrepresentable_feed_decimals() {
        assert_eq!(scale_price(1, 38).unwrap(), 0); // floors, but no panic
        assert_eq!(
            scale_price(1, 39).unwrap_err(),
            Error::Oracle(OracleError::InvalidPrice)
        );
    }
}
