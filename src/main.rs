//! vAMM perpetuals simulation.
//!
//! Walks the clearing house through a full lifecycle: LPs seed a pool, traders open
//! and close against it, funding accrues, an LP exits with its implicit position,
//! an underwater trader is liquidated and a flat account's collateral is seized.
//!
//! Run with `--verbose` to log every event. `RUST_LOG` overrides the filter.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing_subscriber::EnvFilter;
use vamm_perps::*;

const EUR: MarketId = MarketId(0);
const LP_1: AccountId = AccountId(10);
const LP_2: AccountId = AccountId(11);
const ALICE: AccountId = AccountId(1);
const BOB: AccountId = AccountId(2);
const KEEPER: AccountId = AccountId(99);

type SimResult = Result<(), ClearingHouseError>;

fn main() -> SimResult {
    let verbose = std::env::args().any(|arg| arg == "--verbose" || arg == "-v");
    let default_level = if verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    println!("vAMM Perpetuals Simulation");
    println!("EUR-PERP on a constant product pool, cross-market margin\n");

    scenario_1_open_and_close(verbose)?;
    scenario_2_funding(verbose)?;
    scenario_3_lp_exit(verbose)?;
    scenario_4_liquidation(verbose)?;
    scenario_5_seizure(verbose)?;

    println!("\nAll simulations completed successfully.");
    Ok(())
}

/// One market at price 1.10 with two LPs, clock seeded from the wall clock.
fn setup(verbose: bool) -> Result<(ClearingHouse, Timestamp), ClearingHouseError> {
    let start = Timestamp::now();
    let mut oracle = PriceOracle::new(3600);
    oracle.add_feed(AssetId::new("EUR"), 86_400);
    oracle.set_price(&AssetId::new("EUR"), dec!(1.10), start)?;

    let config = ClearingHouseConfig {
        verbose,
        ..ClearingHouseConfig::default()
    };
    let mut ch = ClearingHouse::new(config, ClearingHouseParams::default(), AssetId::new("USDC"), oracle)?;
    ch.set_time(start);

    let pool = Box::new(ConstantProductPool::new("EUR/USDC", dec!(0.001)));
    ch.add_market(MarketConfig::new("EUR-PERP", "EUR"), pool)?;

    for (lp, size) in [(LP_1, dec!(100_000)), (LP_2, dec!(50_000))] {
        ch.deposit(lp, size, CollateralId::QUOTE)?;
        ch.provide_liquidity(EUR, lp, [size * dec!(1.10), size], Decimal::ZERO)?;
    }
    Ok((ch, start))
}

fn scenario_1_open_and_close(verbose: bool) -> SimResult {
    println!("Scenario 1: Open and Close\n");
    let (mut ch, _) = setup(verbose)?;

    ch.deposit(ALICE, dec!(5_000), CollateralId::QUOTE)?;
    let open = ch.change_position(EUR, ALICE, dec!(10_000), Decimal::ZERO, Side::Long)?;
    println!(
        "  Alice sells 10,000 quote for {} EUR, fee {}, insurance fee {}",
        open.base_delta.round_dp(4),
        open.trading_fee,
        open.insurance_fee
    );
    println!("  Pool price now {}", ch.market(EUR)?.market_price()?.round_dp(6));
    println!("  Margin ratio {}", ch.margin_ratio(ALICE)?.round_dp(4));

    ch.advance_time(60);
    let amount = ch.proposed_amount_to_close(EUR, ALICE)?;
    let close = ch.change_position(EUR, ALICE, amount, Decimal::ZERO, Side::Short)?;
    println!("  Alice closes, realized pnl {}", close.pnl.value().round_dp(4));
    println!(
        "  Balance {}, position open: {}\n",
        ch.vault().get_balance(ALICE, CollateralId::QUOTE).round_dp(4),
        ch.is_position_open(EUR, ALICE)?
    );
    Ok(())
}

fn scenario_2_funding(verbose: bool) -> SimResult {
    println!("Scenario 2: Funding\n");
    let (mut ch, start) = setup(verbose)?;

    ch.deposit(ALICE, dec!(5_000), CollateralId::QUOTE)?;
    ch.deposit(BOB, dec!(5_000), CollateralId::QUOTE)?;
    ch.change_position(EUR, ALICE, dec!(20_000), Decimal::ZERO, Side::Long)?;
    ch.change_position(EUR, BOB, dec!(5_000), Decimal::ZERO, Side::Short)?;
    println!("  Alice long 20,000 quote, Bob short 5,000 base");
    println!("  Pool {} vs oracle 1.10", ch.market(EUR)?.market_price()?.round_dp(6));

    // the oracle keeps publishing while the pool stays rich
    for hour in 1..=8 {
        ch.set_time(start.plus_secs(hour * 3600));
        let now = ch.time();
        ch.oracle_mut().set_price(&AssetId::new("EUR"), dec!(1.10), now)?;
        ch.update_global_state()?;
    }

    let alice = ch.settle_account(ALICE)?;
    let bob = ch.settle_account(BOB)?;
    let lp = ch.settle_account(LP_1)?;
    let global = ch.market(EUR)?.global_position().clone();
    println!("  After 8 hours, cumulative funding {}", global.cum_funding_rate.round_dp(8));
    println!(
        "  Settled: alice {}, bob {}, lp_1 {}\n",
        alice.value().round_dp(4),
        bob.value().round_dp(4),
        lp.value().round_dp(4)
    );
    Ok(())
}

fn scenario_3_lp_exit(verbose: bool) -> SimResult {
    println!("Scenario 3: LP Exit\n");
    let (mut ch, start) = setup(verbose)?;

    ch.deposit(ALICE, dec!(10_000), CollateralId::QUOTE)?;
    ch.change_position(EUR, ALICE, dec!(30_000), Decimal::ZERO, Side::Long)?;
    println!("  Alice long 30,000 quote. LPs absorb the short side");

    let unlock = start.plus_secs(ch.market(EUR)?.params().lock_period);
    ch.set_time(unlock);
    let now = ch.time();
    ch.oracle_mut().set_price(&AssetId::new("EUR"), dec!(1.10), now)?;

    let implicit = ch.market(EUR)?.lp_position_after_withdrawal(LP_2)?;
    println!(
        "  LP_2 implicit position: {} EUR, {} quote",
        implicit.position_size.round_dp(4),
        implicit.open_notional.round_dp(4)
    );

    let balance = ch
        .market(EUR)?
        .lp_position(LP_2)
        .map_or(Decimal::ZERO, |lp| lp.liquidity_balance);
    let proposed = ch.lp_proposed_amount_to_close(EUR, LP_2)?;
    let removal = ch.remove_liquidity(EUR, LP_2, balance, [Decimal::ZERO; 2], proposed, Decimal::ZERO)?;
    println!(
        "  LP_2 burns {} tokens for {} quote and {} base, realized pnl {}",
        removal.liquidity_burned.round_dp(4),
        removal.quote_amount.round_dp(4),
        removal.base_amount.round_dp(4),
        removal.realized_pnl.value().round_dp(4)
    );
    println!("  House dust: {:?}\n", ch.market(EUR)?.dust_position());
    Ok(())
}

fn scenario_4_liquidation(verbose: bool) -> SimResult {
    println!("Scenario 4: Liquidation\n");
    let (mut ch, start) = setup(verbose)?;

    ch.deposit(ALICE, dec!(1_200), CollateralId::QUOTE)?;
    ch.deposit(KEEPER, dec!(1_000), CollateralId::QUOTE)?;
    ch.change_position(EUR, ALICE, dec!(10_000), Decimal::ZERO, Side::Long)?;
    println!("  Alice long 10,000 quote on 1,200 collateral");

    for (step, price) in [dec!(1.08), dec!(1.06), dec!(1.04), dec!(1.02)].into_iter().enumerate() {
        ch.set_time(start.plus_secs(60 * (step as i64 + 1)));
        let now = ch.time();
        ch.oracle_mut().set_price(&AssetId::new("EUR"), price, now)?;

        let status = ch.margin_status(ALICE)?;
        println!("  Oracle {}: margin ratio {}, {:?}", price, ch.margin_ratio(ALICE)?.round_dp(4), status);
        if status == MarginStatus::Liquidatable {
            let amount = ch.proposed_amount_to_close(EUR, ALICE)?;
            let result = ch.liquidate(EUR, KEEPER, ALICE, amount, true)?;
            println!(
                "  Liquidated {} notional, keeper earns {}, insurance {}",
                result.notional.abs(),
                result.reward.liquidator_reward,
                result.reward.insurance_reward
            );
            break;
        }
    }
    println!(
        "  Alice balance {}, insurance fund {}\n",
        ch.vault().get_balance(ALICE, CollateralId::QUOTE).round_dp(4),
        ch.insurance_fund().balance.value().round_dp(4)
    );
    Ok(())
}

fn scenario_5_seizure(verbose: bool) -> SimResult {
    println!("Scenario 5: Collateral Seizure\n");
    let (mut ch, start) = setup(verbose)?;

    let eth = AssetId::new("ETH");
    ch.oracle_mut().add_feed(eth.clone(), 86_400);
    ch.oracle_mut().set_price(&eth, dec!(2_000), start)?;
    let weth = ch.add_collateral(eth.clone(), dec!(0.8))?;

    // a short in quote debt, backed by ETH only
    ch.deposit(BOB, dec!(1), weth)?;
    ch.deposit(KEEPER, dec!(10_000), CollateralId::QUOTE)?;
    ch.change_position(EUR, BOB, dec!(10_000), Decimal::ZERO, Side::Short)?;

    ch.set_time(start.plus_secs(60));
    let now = ch.time();
    ch.oracle_mut().set_price(&AssetId::new("EUR"), dec!(1.24), now)?;
    ch.oracle_mut().set_price(&eth, dec!(1_500), now)?;

    let amount = ch.proposed_amount_to_close(EUR, BOB)?;
    ch.liquidate(EUR, KEEPER, BOB, amount, true)?;
    println!(
        "  Bob liquidated, quote balance {}",
        ch.vault().get_balance(BOB, CollateralId::QUOTE).round_dp(4)
    );

    // the remaining debt is small, lower the threshold so the keeper may act on it
    let params = ClearingHouseParams {
        ui_liquidation_threshold: dec!(100),
        ..ch.params().clone()
    };
    ch.set_params(params)?;

    match ch.seize_collateral(KEEPER, BOB) {
        Ok(seizure) => println!(
            "  Seized: debt {}, keeper paid {}, insurance covered {}, bad debt {}\n",
            seizure.debt.value().round_dp(4),
            seizure.paid_by_liquidator.value().round_dp(4),
            seizure.covered_by_insurance.value().round_dp(4),
            seizure.bad_debt.value().round_dp(4)
        ),
        Err(err) => println!("  Seizure not possible: {}\n", err),
    }
    Ok(())
}
