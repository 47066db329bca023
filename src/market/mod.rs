// 3.0: one perpetual market. owns its pool, its global accumulators and every trader and
// LP position on it. all mutators are crate-private: only the clearing house drives a market,
// and it settles the collateral side of whatever a market call returns.

mod funding;
mod liquidity;
mod trading;

pub use funding::{GlobalStateUpdate, LpSettlement};
pub use liquidity::{LiquidityProvision, LiquidityRemoval};
pub use trading::{Reduction, TradeOutcome};

use crate::config::{ConfigError, MarketParams};
use crate::funding::TwapState;
use crate::pool::{AmmPool, PoolError};
use crate::position::{Exposure, GlobalPosition, LiquidityProviderPosition, TraderPosition};
use crate::types::{AccountId, AssetId, MarketId, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Human-readable name (e.g., "EUR-PERP")
    pub name: String,
    /// Oracle key of the base asset
    pub base_asset: AssetId,
    pub params: MarketParams,
}

impl MarketConfig {
    pub fn new(name: &str, base_asset: &str) -> Self {
        Self {
            name: name.to_string(),
            base_asset: AssetId::new(base_asset),
            params: MarketParams::default(),
        }
    }

    pub fn with_params(mut self, params: MarketParams) -> Self {
        self.params = params;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarketError {
    #[error("Amount must be positive")]
    ZeroAmount,

    #[error("Account {0:?} has no open position")]
    NoPosition(AccountId),

    #[error("Account {0:?} has no liquidity position")]
    NoLiquidityPosition(AccountId),

    #[error("Reduction of {amount} would reverse a position of size {size}")]
    AttemptReversePosition { amount: Decimal, size: Decimal },

    #[error("Position not closed, {remaining} base left")]
    PositionNotClosed { remaining: Decimal },

    #[error("Block trade amount {amount} exceeds max {max}")]
    BlockTradeAmountExceeded { amount: Decimal, max: Decimal },

    #[error("Position size {size} exceeds max {max}")]
    MaxPositionSizeExceeded { size: Decimal, max: Decimal },

    #[error("Liquidity {requested} exceeds max {max}")]
    MaxLiquidityProvided { requested: Decimal, max: Decimal },

    #[error("Invalid liquidity amount {requested}, balance {balance}")]
    InvalidLiquidityAmount { requested: Decimal, balance: Decimal },

    #[error("Liquidity locked until {unlock_at}")]
    LiquidityLocked { unlock_at: Timestamp },

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),
}

#[derive(Debug, Clone)]
pub struct Market {
    pub(crate) id: MarketId,
    pub(crate) config: MarketConfig,
    pub(crate) pool: Box<dyn AmmPool>,
    pub(crate) global: GlobalPosition,
    pub(crate) twap: TwapState,
    pub(crate) traders: HashMap<AccountId, TraderPosition>,
    pub(crate) lps: HashMap<AccountId, LiquidityProviderPosition>,
    // house position collecting swept dust. never settled, so it neither pays nor earns funding
    pub(crate) dust: Exposure,
}

impl Market {
    pub(crate) fn new(
        id: MarketId,
        config: MarketConfig,
        pool: Box<dyn AmmPool>,
        initial_price: Decimal,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            config,
            pool,
            global: GlobalPosition::new(now),
            twap: TwapState::new(initial_price),
            traders: HashMap::new(),
            lps: HashMap::new(),
            dust: Exposure::default(),
        }
    }

    pub fn id(&self) -> MarketId {
        self.id
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    pub fn params(&self) -> &MarketParams {
        &self.config.params
    }

    pub fn base_asset(&self) -> &AssetId {
        &self.config.base_asset
    }

    pub fn pool(&self) -> &dyn AmmPool {
        self.pool.as_ref()
    }

    pub fn global_position(&self) -> &GlobalPosition {
        &self.global
    }

    pub fn twap(&self) -> &TwapState {
        &self.twap
    }

    pub fn trader_position(&self, account: AccountId) -> Option<&TraderPosition> {
        self.traders.get(&account)
    }

    pub fn lp_position(&self, account: AccountId) -> Option<&LiquidityProviderPosition> {
        self.lps.get(&account)
    }

    pub fn dust_position(&self) -> Exposure {
        self.dust
    }

    pub fn is_position_open(&self, account: AccountId) -> bool {
        self.traders.get(&account).is_some_and(TraderPosition::is_open)
    }

    pub fn is_lp_position_open(&self, account: AccountId) -> bool {
        self.lps.get(&account).is_some_and(LiquidityProviderPosition::is_open)
    }

    pub fn traders(&self) -> impl Iterator<Item = (&AccountId, &TraderPosition)> {
        self.traders.iter()
    }

    pub fn liquidity_providers(&self) -> impl Iterator<Item = (&AccountId, &LiquidityProviderPosition)> {
        self.lps.iter()
    }

    pub fn market_price(&self) -> Result<Decimal, MarketError> {
        Ok(self.pool.last_price()?)
    }

    pub(crate) fn set_params(&mut self, params: MarketParams) -> Result<(), ConfigError> {
        params.validate()?;
        self.config.params = params;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::pool::ConstantProductPool;
    use rust_decimal_macros::dec;

    pub const LP: AccountId = AccountId(10);
    pub const ALICE: AccountId = AccountId(1);
    pub const BOB: AccountId = AccountId(2);

    pub fn t(secs: i64) -> Timestamp {
        Timestamp::from_secs(secs)
    }

    /// Market at price 1 with 10k/10k liquidity from `LP`, deposited at t=0.
    pub fn seeded_market() -> Market {
        let pool = Box::new(ConstantProductPool::new("EUR/USD", dec!(0.001)));
        let mut market = Market::new(MarketId(0), MarketConfig::new("EUR-PERP", "EUR"), pool, dec!(1), t(0));
        market
            .provide_liquidity(LP, [dec!(10_000), dec!(10_000)], Decimal::ZERO, t(0))
            .unwrap();
        market
    }
}
