// 5.0: funding rates. traders pay or receive whenever the pool trades away from the oracle,
// LPs sit on the other side. 5.0 has the TWAP state, 5.1 onward the pure rate math.
// the market drives these once per block, see market/funding.rs.

use crate::types::{Quote, SECONDS_PER_DAY};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Cumulative price sums for the oracle and the pool, and the TWAPs derived from them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TwapState {
    pub oracle_cumulative: Decimal,
    pub market_cumulative: Decimal,
    pub oracle_cumulative_at_period_start: Decimal,
    pub market_cumulative_at_period_start: Decimal,
    pub oracle_twap: Decimal,
    pub market_twap: Decimal,
}

impl TwapState {
    /// Both TWAPs start at the launch price so the first period pays no funding.
    pub fn new(initial_price: Decimal) -> Self {
        Self {
            oracle_twap: initial_price,
            market_twap: initial_price,
            ..Self::default()
        }
    }

    // 5.0.1: price * seconds for both feeds
    pub fn accumulate(&mut self, oracle_price: Decimal, market_price: Decimal, elapsed: i64) {
        let elapsed = Decimal::from(elapsed);
        self.oracle_cumulative += oracle_price * elapsed;
        self.market_cumulative += market_price * elapsed;
    }

    // 5.0.2: close the current period and start the next one
    pub fn roll_period(&mut self, period_length: i64) {
        if period_length <= 0 {
            return;
        }
        let length = Decimal::from(period_length);
        self.oracle_twap = (self.oracle_cumulative - self.oracle_cumulative_at_period_start) / length;
        self.market_twap = (self.market_cumulative - self.market_cumulative_at_period_start) / length;
        self.oracle_cumulative_at_period_start = self.oracle_cumulative;
        self.market_cumulative_at_period_start = self.market_cumulative;
    }
}

// 5.1: rate accrued over `elapsed` seconds. positive = pool above oracle, longs pay.
pub fn calculate_funding_rate(
    sensitivity: Decimal,
    market_twap: Decimal,
    oracle_twap: Decimal,
    elapsed: i64,
) -> Decimal {
    if oracle_twap <= Decimal::ZERO || elapsed <= 0 {
        return Decimal::ZERO;
    }
    let premium = (market_twap - oracle_twap) / oracle_twap;
    sensitivity * premium * Decimal::from(elapsed) / Decimal::from(SECONDS_PER_DAY)
}

// 5.2: the accumulator is kept in quote per base unit
pub fn cum_funding_delta(funding_rate: Decimal, oracle_twap: Decimal) -> Decimal {
    funding_rate * oracle_twap
}

// 5.3: what traders pay in aggregate, spread over every LP token.
// floor of one token keeps a nearly empty pool from blowing up the per-token figure.
pub fn lp_funding_growth(cum_funding_delta: Decimal, net_trader_exposure: Decimal, lp_supply: Decimal) -> Decimal {
    cum_funding_delta * net_trader_exposure / lp_supply.max(Decimal::ONE)
}

// 5.4: positive = received
pub fn trader_funding_payment(cum_funding_delta: Decimal, position_size: Decimal) -> Quote {
    Quote::new(-cum_funding_delta * position_size)
}
