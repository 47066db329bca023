// 4.0: position ledger records. open_notional is the signed quote leg, position_size the
// signed base leg. for a long, open_notional is the (negative) quote paid, so value = on + size * price.
// 4.1 has the trader position, 4.2 the LP position, 4.3 the market-wide global position.

use crate::types::{Quote, Side, SignedSize, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// 4.0.1: the two legs of any exposure. shared by trader positions, the LP ledger and the dust account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Exposure {
    pub open_notional: Decimal,
    pub position_size: Decimal,
}

impl Exposure {
    pub fn new(open_notional: Decimal, position_size: Decimal) -> Self {
        Self {
            open_notional,
            position_size,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.open_notional.is_zero() && self.position_size.is_zero()
    }

    pub fn size(&self) -> SignedSize {
        SignedSize::new(self.position_size)
    }

    pub fn side(&self) -> Option<Side> {
        self.size().side()
    }

    pub fn add(&self, other: Exposure) -> Self {
        Self {
            open_notional: self.open_notional + other.open_notional,
            position_size: self.position_size + other.position_size,
        }
    }

    pub fn scale(&self, ratio: Decimal) -> Self {
        Self {
            open_notional: self.open_notional * ratio,
            position_size: self.position_size * ratio,
        }
    }

    // 4.0.2: mark to market. what closing at `price` would realize, fees aside.
    pub fn unrealized_pnl(&self, price: Decimal) -> Quote {
        Quote::new(self.open_notional + self.position_size * price)
    }
}

/** 4.1: one trader's position in one market */
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TraderPosition {
    pub open_notional: Decimal,
    pub position_size: Decimal,
    // snapshot of GlobalPosition::cum_funding_rate at the last settlement
    pub cum_funding_rate: Decimal,
}

impl TraderPosition {
    pub fn new(cum_funding_rate: Decimal) -> Self {
        Self {
            cum_funding_rate,
            ..Self::default()
        }
    }

    pub fn is_open(&self) -> bool {
        !self.position_size.is_zero()
    }

    pub fn side(&self) -> Option<Side> {
        SignedSize::new(self.position_size).side()
    }

    pub fn exposure(&self) -> Exposure {
        Exposure::new(self.open_notional, self.position_size)
    }

    pub fn set_exposure(&mut self, exposure: Exposure) {
        self.open_notional = exposure.open_notional;
        self.position_size = exposure.position_size;
    }

    pub fn unrealized_pnl(&self, price: Decimal) -> Quote {
        self.exposure().unrealized_pnl(price)
    }

    // longs pay when the accumulator rises
    pub fn pending_funding(&self, global_cum_funding_rate: Decimal) -> Quote {
        crate::funding::trader_funding_payment(
            global_cum_funding_rate - self.cum_funding_rate,
            self.position_size,
        )
    }
}

/** 4.2: one LP's deposit and implicit exposure in one market */
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LiquidityProviderPosition {
    // net of vTokens supplied and received. zero right after a full round trip.
    pub open_notional: Decimal,
    pub position_size: Decimal,
    // pool LP tokens held
    pub liquidity_balance: Decimal,
    pub deposit_time: Timestamp,
    // growth snapshots, all per LP token
    pub total_trading_fees_growth: Decimal,
    pub total_base_fees_growth: Decimal,
    pub total_quote_fees_growth: Decimal,
    pub cum_funding_per_lp_token: Decimal,
}

impl LiquidityProviderPosition {
    pub fn is_open(&self) -> bool {
        !self.liquidity_balance.is_zero()
    }

    /// Nothing left to track: no pool share and a flat ledger.
    pub fn is_empty(&self) -> bool {
        self.liquidity_balance.is_zero() && self.exposure().is_zero()
    }

    pub fn exposure(&self) -> Exposure {
        Exposure::new(self.open_notional, self.position_size)
    }

    pub fn set_exposure(&mut self, exposure: Exposure) {
        self.open_notional = exposure.open_notional;
        self.position_size = exposure.position_size;
    }

    pub fn is_locked(&self, now: Timestamp, lock_period: i64) -> bool {
        now < self.deposit_time.plus_secs(lock_period)
    }

    pub fn snapshot_growth(&mut self, global: &GlobalPosition) {
        self.total_trading_fees_growth = global.total_trading_fees_growth;
        self.total_base_fees_growth = global.total_base_fees_growth;
        self.total_quote_fees_growth = global.total_quote_fees_growth;
        self.cum_funding_per_lp_token = global.cum_funding_per_lp_token;
    }

    pub fn pending_funding(&self, global: &GlobalPosition) -> Quote {
        Quote::new((global.cum_funding_per_lp_token - self.cum_funding_per_lp_token) * self.liquidity_balance)
    }

    pub fn pending_trading_fees(&self, global: &GlobalPosition) -> Quote {
        Quote::new((global.total_trading_fees_growth - self.total_trading_fees_growth) * self.liquidity_balance)
    }

    /// AMM fee tokens earned by `liquidity` of this position, `[quote, base]`.
    pub fn earned_fee_tokens(&self, global: &GlobalPosition, liquidity: Decimal) -> [Decimal; 2] {
        [
            (global.total_quote_fees_growth - self.total_quote_fees_growth) * liquidity,
            (global.total_base_fees_growth - self.total_base_fees_growth) * liquidity,
        ]
    }
}

/** 4.3: market-wide accumulators, one per market */
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GlobalPosition {
    pub time_of_last_trade: Timestamp,
    pub time_of_last_twap_update: Timestamp,
    pub cum_funding_rate: Decimal,
    pub cum_funding_per_lp_token: Decimal,
    pub total_quote_provided: Decimal,
    pub total_base_provided: Decimal,
    pub current_block_trade_amount: Decimal,
    pub total_trading_fees_growth: Decimal,
    pub total_base_fees_growth: Decimal,
    pub total_quote_fees_growth: Decimal,
    // aggregate |size| of trader longs and shorts. the house dust position is not counted,
    // it is funding exempt and LP funding is sized on trader exposure alone
    pub trader_longs: Decimal,
    pub trader_shorts: Decimal,
}

impl GlobalPosition {
    pub fn new(now: Timestamp) -> Self {
        Self {
            time_of_last_trade: now,
            time_of_last_twap_update: now,
            ..Self::default()
        }
    }

    // 4.3.1: move one trader's contribution to the long/short totals
    pub fn track_exposure(&mut self, before: Decimal, after: Decimal) {
        self.remove_exposure(before);
        if after > Decimal::ZERO {
            self.trader_longs += after;
        } else {
            self.trader_shorts += after.abs();
        }
    }

    fn remove_exposure(&mut self, size: Decimal) {
        if size > Decimal::ZERO {
            self.trader_longs = (self.trader_longs - size).max(Decimal::ZERO);
        } else {
            self.trader_shorts = (self.trader_shorts - size.abs()).max(Decimal::ZERO);
        }
    }

    pub fn net_trader_exposure(&self) -> Decimal {
        self.trader_longs - self.trader_shorts
    }
}
