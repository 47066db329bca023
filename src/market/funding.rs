// 3.1 market/funding.rs: once-per-block TWAP and funding update, and per-account settlement.

use super::Market;
use crate::funding::{calculate_funding_rate, cum_funding_delta, lp_funding_growth};
use crate::types::{AccountId, Quote, Timestamp};
use rust_decimal::Decimal;

/// What the first call of a block changed.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalStateUpdate {
    pub funding_rate: Decimal,
    pub cum_funding_rate: Decimal,
    pub cum_funding_per_lp_token: Decimal,
    // Some when a TWAP period closed in this update
    pub twaps: Option<(Decimal, Decimal)>,
}

/// Quote owed to (positive) or by an LP at settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LpSettlement {
    pub funding: Quote,
    pub trading_fees: Quote,
}

impl LpSettlement {
    pub fn total(&self) -> Quote {
        self.funding.add(self.trading_fees)
    }
}

impl Market {
    // 3.1.1: no-op for every call after the first in a block
    pub(crate) fn update_global_state(&mut self, now: Timestamp, oracle_price: Decimal) -> Option<GlobalStateUpdate> {
        if now <= self.global.time_of_last_trade {
            return None;
        }

        let elapsed = now.seconds_since(self.global.time_of_last_trade);
        // an empty pool has no price of its own
        let market_price = self.pool.last_price().unwrap_or(oracle_price);
        self.twap.accumulate(oracle_price, market_price, elapsed);

        let since_twap = now.seconds_since(self.global.time_of_last_twap_update);
        let twaps = if since_twap >= self.config.params.twap_frequency {
            self.twap.roll_period(since_twap);
            self.global.time_of_last_twap_update = now;
            Some((self.twap.oracle_twap, self.twap.market_twap))
        } else {
            None
        };

        let funding_rate = calculate_funding_rate(
            self.config.params.sensitivity,
            self.twap.market_twap,
            self.twap.oracle_twap,
            elapsed,
        );
        let delta = cum_funding_delta(funding_rate, self.twap.oracle_twap);
        self.global.cum_funding_rate += delta;
        self.global.cum_funding_per_lp_token +=
            lp_funding_growth(delta, self.global.net_trader_exposure(), self.pool.total_supply());

        self.global.current_block_trade_amount = Decimal::ZERO;
        self.global.time_of_last_trade = now;

        Some(GlobalStateUpdate {
            funding_rate,
            cum_funding_rate: self.global.cum_funding_rate,
            cum_funding_per_lp_token: self.global.cum_funding_per_lp_token,
            twaps,
        })
    }

    // 3.1.2: pending funding of a trader, snapshot moved to the current accumulator
    pub(crate) fn settle_trader(&mut self, account: AccountId) -> Quote {
        let cum = self.global.cum_funding_rate;
        match self.traders.get_mut(&account) {
            Some(position) => {
                let payment = position.pending_funding(cum);
                position.cum_funding_rate = cum;
                payment
            }
            None => Quote::zero(),
        }
    }

    // 3.1.3: funding plus perp trading fees owed to an LP. AMM fee tokens are not
    // touched here, they are crystallized when liquidity moves.
    pub(crate) fn settle_lp(&mut self, account: AccountId) -> LpSettlement {
        let settlement = self.pending_lp_settlement(account);
        let global = &self.global;
        match self.lps.get_mut(&account) {
            Some(lp) => {
                lp.cum_funding_per_lp_token = global.cum_funding_per_lp_token;
                lp.total_trading_fees_growth = global.total_trading_fees_growth;
                settlement
            }
            None => LpSettlement::default(),
        }
    }

    pub fn pending_trader_funding(&self, account: AccountId) -> Quote {
        self.traders
            .get(&account)
            .map_or(Quote::zero(), |p| p.pending_funding(self.global.cum_funding_rate))
    }

    pub fn pending_lp_settlement(&self, account: AccountId) -> LpSettlement {
        self.lps
            .get(&account)
            .map_or(LpSettlement::default(), |lp| LpSettlement {
                funding: lp.pending_funding(&self.global),
                trading_fees: lp.pending_trading_fees(&self.global),
            })
    }
}
