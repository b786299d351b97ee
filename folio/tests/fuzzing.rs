//! Invariant fuzzing for pools and valuation.
//! Run with: cargo test --features fuzz

#![cfg(feature = "fuzz")]

use folio::*;
use proptest::prelude::*;
use std::collections::BTreeMap;

const WAD: u128 = 1_000_000_000_000_000_000;
const USD: u128 = 100_000_000;

const ADMIN: Address = [0xAA; 32];
const ALICE: Address = [0x01; 32];
const TOKEN: Address = [0x02; 32];
const FEED: Address = [0xF2; 32];

struct MockOracle {
    feeds: BTreeMap<Address, (u128, u64, u8)>,
}

impl OracleSource for MockOracle {
    fn latest_round_data(&self, feed: &Address) -> Result<(u128, u64), OracleError> {
        self.feeds
            .get(feed)
            .map(|&(p, t, _)| (p, t))
            .ok_or(OracleError::FeedUnavailable)
    }

    fn decimals(&self, feed: &Address) -> Result<u8, OracleError> {
        self.feeds
            .get(feed)
            .map(|&(_, _, d)| d)
            .ok_or(OracleError::FeedUnavailable)
    }
}

fn engine_with_pool(token_reserve: u128, native_reserve: u128, fee_bps: u16) -> Engine {
    let mut engine = Engine::new(
        ADMIN,
        EngineParams {
            swap_fee_bps: fee_bps,
            ..EngineParams::default()
        },
    );
    engine.set_price_feed(ADMIN, TOKEN, FEED, 18).unwrap();
    engine
        .add_liquidity(TOKEN, token_reserve, native_reserve)
        .unwrap();
    engine
}

// Reserves up to ~1e9 whole tokens
fn reserve_strategy() -> impl Strategy<Value = u128> {
    (1u128..1_000_000_000).prop_map(|n| n * WAD)
}

fn amount_strategy() -> impl Strategy<Value = u128> {
    1u128..1_000_000
}

fn fee_strategy() -> impl Strategy<Value = u16> {
    0u16..=100
}

proptest! {
    // Constant product is non-decreasing across any swap, any fee.
    #[test]
    fn fuzz_k_non_decreasing(
        token_reserve in reserve_strategy(),
        native_reserve in reserve_strategy(),
        amounts in prop::collection::vec((amount_strategy(), any::<bool>()), 1..20),
        fee in fee_strategy(),
    ) {
        let mut engine = engine_with_pool(token_reserve, native_reserve, fee);
        let k = |e: &Engine| {
            let (n, t) = e.get_pool_reserves(&TOKEN).unwrap();
            (n / 1_000_000) * (t / 1_000_000)
        };
        let mut last = k(&engine);
        for (amount, native_in) in amounts {
            let side = if native_in { SwapSide::NativeIn } else { SwapSide::TokenIn };
            if engine.swap(TOKEN, side, amount * WAD).is_ok() {
                let now = k(&engine);
                prop_assert!(now >= last);
                last = now;
            }
        }
    }

    // Reserves never end up half-drained: both zero or both positive.
    #[test]
    fn fuzz_reserves_both_sides_positive(
        token_reserve in reserve_strategy(),
        native_reserve in reserve_strategy(),
        amount in amount_strategy(),
        fee in fee_strategy(),
    ) {
        let mut engine = engine_with_pool(token_reserve, native_reserve, fee);
        let _ = engine.swap(TOKEN, SwapSide::NativeIn, amount * WAD);
        let _ = engine.swap(TOKEN, SwapSide::TokenIn, amount * WAD);
        let (n, t) = engine.get_pool_reserves(&TOKEN).unwrap();
        prop_assert!(n > 0 && t > 0);
    }

    // A quote never differs from the swap it prices.
    #[test]
    fn fuzz_quote_matches_swap(
        token_reserve in reserve_strategy(),
        native_reserve in reserve_strategy(),
        amount in amount_strategy(),
        fee in fee_strategy(),
    ) {
        let mut engine = engine_with_pool(token_reserve, native_reserve, fee);
        let quoted = engine.quote_swap(&TOKEN, SwapSide::NativeIn, amount * WAD).unwrap();
        let swapped = engine.swap(TOKEN, SwapSide::NativeIn, amount * WAD).unwrap();
        prop_assert_eq!(quoted, swapped);
    }

    // One whole token at $1 values to exactly $1 for every decimal count:
    // the normalization regression, generalized.
    #[test]
    fn fuzz_valuation_normalizes_decimals(decimals in 0u8..=18) {
        let mut engine = Engine::new(ADMIN, EngineParams::default());
        engine.set_price_feed(ADMIN, TOKEN, FEED, decimals).unwrap();
        let one_token = 10u128.pow(decimals as u32);
        engine.add_liquidity(TOKEN, one_token * 1000, 1000 * WAD).unwrap();

        let oracle = MockOracle {
            feeds: [(FEED, (USD, 100, 8))].into_iter().collect(),
        };
        let id = engine
            .create_portfolio(ALICE, vec![TOKEN], vec![10000], 500, 0, &oracle, 100)
            .unwrap();
        engine.portfolios.get_mut(&id).unwrap().current_balances[0] = one_token;

        let view = engine.get_portfolio(&oracle, 100, id).unwrap();
        prop_assert_eq!(view.total_value_usd, USD);
    }

    // Rebalancing conserves value up to fees and slippage: the portfolio
    // can only lose a bounded fraction, never mint value out of thin air
    // when pool spot and oracle agree.
    #[test]
    fn fuzz_rebalance_bounded_value_change(
        target_a in 1000u16..9000,
        deposit in 100u128..10_000,
    ) {
        let (a, b) = ([0x03; 32], [0x04; 32]);
        let (feed_a, feed_b, feed_n) = ([0xFA; 32], [0xFB; 32], [0xFE; 32]);
        let mut engine = Engine::new(
            ADMIN,
            EngineParams { swap_fee_bps: 30, ..EngineParams::default() },
        );
        engine.set_price_feed(ADMIN, NATIVE, feed_n, 18).unwrap();
        engine.set_price_feed(ADMIN, a, feed_a, 18).unwrap();
        engine.set_price_feed(ADMIN, b, feed_b, 18).unwrap();
        engine.add_liquidity(a, 1_000_000 * WAD, 1_000_000 * WAD).unwrap();
        engine.add_liquidity(b, 1_000_000 * WAD, 1_000_000 * WAD).unwrap();

        let mut feeds = BTreeMap::new();
        feeds.insert(feed_n, (USD, 100u64, 8u8));
        feeds.insert(feed_a, (USD, 100, 8));
        feeds.insert(feed_b, (USD, 100, 8));
        let mut oracle = MockOracle { feeds };

        let id = engine
            .create_portfolio(
                ALICE,
                vec![a, b],
                vec![target_a, 10000 - target_a],
                100,
                deposit * WAD,
                &oracle,
                100,
            )
            .unwrap();
        let v0 = engine.get_portfolio(&oracle, 100, id).unwrap().total_value_usd;

        // Double A's price and rebalance at the new valuation
        oracle.feeds.insert(feed_a, (2 * USD, 200, 8));
        let v1 = engine.get_portfolio(&oracle, 200, id).unwrap().total_value_usd;
        engine.rebalance_now(ALICE, id, &oracle, 200).unwrap();
        let v2 = engine.get_portfolio(&oracle, 200, id).unwrap().total_value_usd;

        prop_assert!(v1 >= v0);
        // Lose at most 5% to fees/slippage against deep pools; oracle/spot
        // divergence on A caps the rest (A trades at $1 spot, valued at $2)
        prop_assert!(v2 <= v1 + v1 / 100);
        prop_assert!(v2 >= v1 / 2);
    }
}
