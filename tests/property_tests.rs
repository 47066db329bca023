//! Property-based tests for the clearing house.
//!
//! These tests drive random trade sequences through a live market and check the
//! invariants that must hold after every call.

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use vamm_perps::funding::{calculate_funding_rate, cum_funding_delta, lp_funding_growth, trader_funding_payment};
use vamm_perps::*;

const EUR: MarketId = MarketId(0);
const LP: AccountId = AccountId(10);
const TRADERS: [AccountId; 3] = [AccountId(1), AccountId(2), AccountId(3)];

fn eur() -> AssetId {
    AssetId::new("EUR")
}

/// Single LP market at price 1, every trader funded with `collateral`.
fn clearing_house(collateral: Decimal) -> ClearingHouse {
    let mut oracle = PriceOracle::new(3600);
    oracle.add_feed(eur(), 86_400);
    oracle.set_price(&eur(), dec!(1), Timestamp::from_secs(0)).unwrap();

    let mut ch = ClearingHouse::new(
        ClearingHouseConfig::default(),
        ClearingHouseParams::default(),
        AssetId::new("USDC"),
        oracle,
    )
    .unwrap();
    let pool = Box::new(ConstantProductPool::new("EUR/USD", dec!(0.001)));
    ch.add_market(MarketConfig::new("EUR-PERP", "EUR"), pool).unwrap();

    ch.deposit(LP, dec!(1_000_000), CollateralId::QUOTE).unwrap();
    ch.provide_liquidity(EUR, LP, [dec!(100_000), dec!(100_000)], Decimal::ZERO)
        .unwrap();
    for trader in TRADERS {
        ch.deposit(trader, collateral, CollateralId::QUOTE).unwrap();
    }
    ch
}

fn side_strategy() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Long), Just(Side::Short)]
}

fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (100i64..500_000i64).prop_map(|x| Decimal::new(x, 2)) // 1 to 5,000
}

// (trader index, direction, amount, seconds until the next block)
fn trade_strategy() -> impl Strategy<Value = (usize, Side, Decimal, i64)> {
    (0..TRADERS.len(), side_strategy(), amount_strategy(), 0i64..3_600i64)
}

fn advance(ch: &mut ClearingHouse, secs: i64, price: Decimal) {
    ch.advance_time(secs);
    let now = ch.time();
    ch.oracle_mut().set_price(&eur(), price, now).unwrap();
}

proptest! {
    /// A second update in the same block changes nothing.
    #[test]
    fn global_update_idempotent_within_block(
        trades in proptest::collection::vec(trade_strategy(), 1..10),
    ) {
        let mut ch = clearing_house(dec!(10_000));
        for (idx, side, amount, wait) in trades {
            let _ = ch.change_position(EUR, TRADERS[idx], amount, Decimal::ZERO, side);
            advance(&mut ch, wait, dec!(1));
        }

        ch.update_global_state().unwrap();
        let global = ch.market(EUR).unwrap().global_position().clone();
        let twap = ch.market(EUR).unwrap().twap().clone();
        let events = ch.events().len();

        ch.update_global_state().unwrap();
        prop_assert_eq!(ch.market(EUR).unwrap().global_position(), &global);
        prop_assert_eq!(ch.market(EUR).unwrap().twap(), &twap);
        prop_assert_eq!(ch.events().len(), events);
    }

    /// A long always holds negative quote and positive base, a short the reverse.
    #[test]
    fn position_legs_have_opposite_signs(
        trades in proptest::collection::vec(trade_strategy(), 1..25),
    ) {
        let mut ch = clearing_house(dec!(10_000));
        for (idx, side, amount, wait) in trades {
            let _ = ch.change_position(EUR, TRADERS[idx], amount, Decimal::ZERO, side);
            advance(&mut ch, wait, dec!(1));

            for (_, position) in ch.market(EUR).unwrap().traders() {
                prop_assert!(position.is_open());
                prop_assert!(
                    position.open_notional.is_sign_negative() != position.position_size.is_sign_negative(),
                    "legs share a sign: on {}, size {}",
                    position.open_notional,
                    position.position_size
                );
            }
        }
    }

    /// A trade against an open position reduces it or fails. it never flips the side.
    #[test]
    fn reduction_never_reverses(
        open_side in side_strategy(),
        open_amount in amount_strategy(),
        reduce_amount in amount_strategy(),
    ) {
        let mut ch = clearing_house(dec!(10_000));
        let trader = TRADERS[0];
        prop_assume!(ch.change_position(EUR, trader, open_amount, Decimal::ZERO, open_side).is_ok());

        let result = ch.change_position(EUR, trader, reduce_amount, Decimal::ZERO, open_side.opposite());
        let after = ch.market(EUR).unwrap().trader_position(trader).and_then(|p| p.side());
        match result {
            Ok(outcome) => {
                prop_assert!(!outcome.is_extend);
                prop_assert!(after.is_none() || after == Some(open_side));
            }
            Err(_) => prop_assert_eq!(after, Some(open_side)),
        }
    }

    /// A failed call leaves every ledger and the event log as they were.
    #[test]
    fn failed_trade_rolls_back(
        collateral in (1i64..200i64).prop_map(Decimal::from),
        side in side_strategy(),
        amount in amount_strategy(),
        wait in 1i64..3_600i64,
    ) {
        let mut ch = clearing_house(collateral);
        advance(&mut ch, wait, dec!(1));
        let trader = TRADERS[0];

        let pool = ch.market(EUR).unwrap().pool().balances();
        let global = ch.market(EUR).unwrap().global_position().clone();
        let balance = ch.vault().get_balance(trader, CollateralId::QUOTE);
        let insurance = ch.insurance_fund().clone();
        let events = ch.events().len();

        if ch.change_position(EUR, trader, amount, Decimal::ZERO, side).is_err() {
            prop_assert_eq!(ch.market(EUR).unwrap().pool().balances(), pool);
            prop_assert_eq!(ch.market(EUR).unwrap().global_position(), &global);
            prop_assert_eq!(ch.vault().get_balance(trader, CollateralId::QUOTE), balance);
            prop_assert_eq!(ch.insurance_fund(), &insurance);
            prop_assert_eq!(ch.events().len(), events);
            prop_assert!(!ch.is_position_open(EUR, trader).unwrap());
        } else {
            // a successful risk-increasing trade always meets the creation margin
            let free = ch.free_collateral(trader).unwrap();
            prop_assert!(!free.is_negative());
        }
    }

    /// What traders pay in funding, the LP receives.
    #[test]
    fn funding_is_conserved(
        trades in proptest::collection::vec(trade_strategy(), 1..15),
        drift in (-50i64..=50i64).prop_map(|x| Decimal::new(x, 3)),
    ) {
        let mut ch = clearing_house(dec!(10_000));
        for (idx, side, amount, wait) in trades {
            let _ = ch.change_position(EUR, TRADERS[idx], amount, Decimal::ZERO, side);
            advance(&mut ch, wait + 900, Decimal::ONE + drift);
        }
        advance(&mut ch, 900, Decimal::ONE + drift);
        for account in TRADERS.into_iter().chain([LP]) {
            ch.settle_account(account).unwrap();
        }

        let mut traders = Decimal::ZERO;
        let mut lp = Decimal::ZERO;
        let mut fees = Decimal::ZERO;
        for event in ch.events() {
            match &event.payload {
                EventPayload::FundingPaid(paid) if paid.is_trader => traders += paid.amount.value(),
                EventPayload::FundingPaid(paid) => lp += paid.amount.value(),
                EventPayload::PositionChanged(change) => fees += change.trading_fee.value(),
                _ => {}
            }
        }
        // the LP settlement carries the trading fees on top of funding
        let lp_funding = lp - fees;
        prop_assert!((traders + lp_funding).abs() < dec!(0.000001), "traders {} lp {}", traders, lp_funding);
    }

    /// The liquidator and the insurance fund split the reward without remainder.
    #[test]
    fn liquidation_reward_conserved(
        notional in (1i64..10_000_000i64).prop_map(|x| Decimal::new(x, 2)),
        share in (0i64..=100i64).prop_map(|x| Decimal::new(x, 2)),
    ) {
        let reward = calculate_liquidation_reward(Quote::new(-notional), dec!(0.015), share);
        prop_assert_eq!(reward.total.value(), notional * dec!(0.015));
        prop_assert_eq!(reward.liquidator_reward.add(reward.insurance_reward), reward.total);
        prop_assert!(!reward.insurance_reward.is_negative());
        prop_assert!(!reward.liquidator_reward.is_negative());
    }

    /// Longs pay when the market trades above the oracle, shorts receive.
    #[test]
    fn funding_direction_follows_premium(
        oracle in (50i64..200i64).prop_map(|x| Decimal::new(x, 2)),
        premium in (1i64..100i64).prop_map(|x| Decimal::new(x, 3)),
        size in (1i64..10_000i64).prop_map(Decimal::from),
        elapsed in 1i64..86_400i64,
    ) {
        let rate = calculate_funding_rate(Decimal::ONE, oracle + premium, oracle, elapsed);
        prop_assert!(rate > Decimal::ZERO);

        let delta = cum_funding_delta(rate, oracle);
        prop_assert!(trader_funding_payment(delta, size).is_negative());
        prop_assert!(trader_funding_payment(delta, -size).is_positive());
        prop_assert!(lp_funding_growth(delta, size, dec!(1000)) > Decimal::ZERO);
    }

    /// Swaps never shrink the pool's constant product.
    #[test]
    fn swaps_keep_product(
        amounts in proptest::collection::vec((side_strategy(), amount_strategy()), 1..20),
    ) {
        let mut pool = ConstantProductPool::new("EUR/USD", dec!(0.001));
        pool.add_liquidity([dec!(100_000), dec!(100_000)], Decimal::ZERO).unwrap();
        let mut k = dec!(100_000) * dec!(100_000);

        for (side, amount) in amounts {
            let (sell, buy) = match side {
                Side::Long => (VToken::Quote, VToken::Base),
                Side::Short => (VToken::Base, VToken::Quote),
            };
            pool.swap(sell, buy, amount, Decimal::ZERO).unwrap();
            let [quote, base] = pool.balances();
            let next = quote * base;
            prop_assert!(next >= k - dec!(0.0001), "k fell from {} to {}", k, next);
            k = next;
        }
    }
}
