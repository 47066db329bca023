// 8.0.2: result types and errors for clearing house operations.

use crate::config::ConfigError;
use crate::liquidation::LiquidationReward;
use crate::market::MarketError;
use crate::oracle::OracleError;
use crate::pool::PoolError;
use crate::types::{AccountId, CollateralId, MarketId, Quote};
use crate::vault::VaultError;
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub struct LiquidationResult {
    pub market_id: MarketId,
    pub liquidatee: AccountId,
    pub liquidator: AccountId,
    pub notional: Quote,
    pub reward: LiquidationReward,
    // pnl realized by the close, before the reward is taken
    pub realized_pnl: Quote,
    pub is_trader: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeizureResult {
    pub liquidatee: AccountId,
    pub liquidator: AccountId,
    pub debt: Quote,
    pub paid_by_liquidator: Quote,
    pub covered_by_insurance: Quote,
    pub bad_debt: Quote,
    pub tokens_sold: Vec<(CollateralId, Decimal)>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClearingHouseError {
    #[error("Market {0:?} not found")]
    MarketNotFound(MarketId),

    #[error("Account {0:?} is reserved")]
    ReservedAccount(AccountId),

    #[error("Free collateral {free_collateral} below zero at margin ratio {ratio}")]
    InsufficientMargin { free_collateral: Quote, ratio: Decimal },

    #[error("Open notional {open_notional} below minimum {min}")]
    UnderOpenNotionalAmountRequired { open_notional: Decimal, min: Decimal },

    #[error("Account is sufficiently collateralized, margin ratio {margin_ratio}")]
    SufficientMargin { margin_ratio: Decimal },

    #[error("Liquidation left {remaining} base open")]
    LiquidationPositionNotClosed { remaining: Decimal },

    #[error("Cannot liquidate own account")]
    SelfLiquidation,

    #[error("Account {0:?} still has open positions")]
    OpenPositionsRemain(AccountId),

    #[error("Collateral cannot be seized: quote balance {quote_balance}, discounted collateral {collateral}")]
    NotEligibleForSeizure { quote_balance: Decimal, collateral: Quote },

    #[error("Market error: {0}")]
    Market(#[from] MarketError),

    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}
