// 7.0 config.rs: governance parameters in one place. margins, rewards, discounts, market risk knobs.
// 7.1 every setter goes through validate(). nothing out of bounds ever reaches the engine.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Dust threshold in base units. residuals at or below this are swept to the house account.
pub const DUST_THRESHOLD: Decimal = dec!(0.1);

/** 7.2: cross-market parameters owned by the clearing house */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClearingHouseParams {
    // Maintenance margin ratio. below this an account can be liquidated
    pub min_margin: Decimal,
    // Stricter ratio enforced after any voluntary risk-increasing action
    pub min_margin_at_creation: Decimal,
    // Smallest |open_notional| an open position may keep
    pub min_positive_open_notional: Decimal,
    // Liquidation reward as a fraction of the liquidated |open_notional|
    pub liquidation_reward: Decimal,
    // Share of the liquidation reward routed to the insurance fund
    pub liquidation_reward_insurance_share: Decimal,
    // Fraction of oracle value the liquidator pays for seized collateral
    pub liquidation_discount: Decimal,
    // Valuation haircut used to decide whether collateral may be seized
    pub non_ui_liquidation_discount: Decimal,
    // Quote debt above which collateral may always be seized
    pub ui_liquidation_threshold: Decimal,
}

impl Default for ClearingHouseParams {
    fn default() -> Self {
        Self {
            min_margin: dec!(0.025),
            min_margin_at_creation: dec!(0.055),
            min_positive_open_notional: dec!(35),
            liquidation_reward: dec!(0.015),
            liquidation_reward_insurance_share: dec!(0.5),
            liquidation_discount: dec!(0.95),
            non_ui_liquidation_discount: dec!(0.95),
            ui_liquidation_threshold: dec!(10_000),
        }
    }
}

impl ClearingHouseParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("min_margin", self.min_margin, dec!(0.02), dec!(0.2))?;
        if self.min_margin_at_creation <= self.min_margin || self.min_margin_at_creation > dec!(0.5) {
            return Err(ConfigError::OutOfBounds {
                name: "min_margin_at_creation",
                value: self.min_margin_at_creation,
                reason: "must be above min_margin and at most 0.5".to_string(),
            });
        }
        check_range(
            "min_positive_open_notional",
            self.min_positive_open_notional,
            Decimal::ZERO,
            dec!(1000),
        )?;
        if self.liquidation_reward < dec!(0.01) || self.liquidation_reward >= self.min_margin {
            return Err(ConfigError::OutOfBounds {
                name: "liquidation_reward",
                value: self.liquidation_reward,
                reason: "must be at least 0.01 and below min_margin".to_string(),
            });
        }
        check_range(
            "liquidation_reward_insurance_share",
            self.liquidation_reward_insurance_share,
            Decimal::ZERO,
            Decimal::ONE,
        )?;
        check_range("liquidation_discount", self.liquidation_discount, dec!(0.7), Decimal::ONE)?;
        check_range(
            "non_ui_liquidation_discount",
            self.non_ui_liquidation_discount,
            dec!(0.7),
            Decimal::ONE,
        )?;
        if self.ui_liquidation_threshold < Decimal::ZERO {
            return Err(ConfigError::OutOfBounds {
                name: "ui_liquidation_threshold",
                value: self.ui_liquidation_threshold,
                reason: "must not be negative".to_string(),
            });
        }
        Ok(())
    }
}

/** 7.3: per-market risk and funding parameters */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketParams {
    // Multiplier applied to this market's debt in cross-market margin
    pub risk_weight: Decimal,
    // Cap on total quote liquidity provided to the pool
    pub max_liquidity_provided: Decimal,
    // TWAP period length in seconds
    pub twap_frequency: i64,
    // Funding rate sensitivity to the market/oracle premium
    pub sensitivity: Decimal,
    // Fee on extended notional routed to the insurance fund
    pub insurance_fee: Decimal,
    // LP debt = coefficient * |lp open notional|
    pub lp_debt_coefficient: Decimal,
    // Max absolute quote volume per block, liquidations excluded
    pub max_block_trade_amount: Decimal,
    // Seconds a fresh LP deposit stays locked
    pub lock_period: i64,
    // Max |position_size| a trader may extend to
    pub max_position_size: Decimal,
}

impl Default for MarketParams {
    fn default() -> Self {
        Self {
            risk_weight: Decimal::ONE,
            max_liquidity_provided: dec!(1_000_000),
            twap_frequency: 15 * 60,
            sensitivity: Decimal::ONE,
            insurance_fee: dec!(0.001),
            lp_debt_coefficient: dec!(3),
            max_block_trade_amount: dec!(100_000),
            lock_period: 60 * 60,
            max_position_size: dec!(100_000),
        }
    }
}

impl MarketParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("risk_weight", self.risk_weight, Decimal::ONE, dec!(10))?;
        check_positive("max_liquidity_provided", self.max_liquidity_provided)?;
        check_range(
            "twap_frequency",
            Decimal::from(self.twap_frequency),
            dec!(60),
            dec!(604_800),
        )?;
        check_range("sensitivity", self.sensitivity, dec!(0.2), dec!(50))?;
        check_range("insurance_fee", self.insurance_fee, dec!(0.0001), dec!(0.01))?;
        check_range("lp_debt_coefficient", self.lp_debt_coefficient, Decimal::ONE, dec!(20))?;
        if self.max_block_trade_amount < dec!(100) {
            return Err(ConfigError::OutOfBounds {
                name: "max_block_trade_amount",
                value: self.max_block_trade_amount,
                reason: "must be at least 100".to_string(),
            });
        }
        check_range(
            "lock_period",
            Decimal::from(self.lock_period),
            dec!(600),
            dec!(2_592_000),
        )?;
        check_positive("max_position_size", self.max_position_size)?;
        Ok(())
    }
}

fn check_range(name: &'static str, value: Decimal, min: Decimal, max: Decimal) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfBounds {
            name,
            value,
            reason: format!("must be within [{min}, {max}]"),
        });
    }
    Ok(())
}

fn check_positive(name: &'static str, value: Decimal) -> Result<(), ConfigError> {
    if value <= Decimal::ZERO {
        return Err(ConfigError::OutOfBounds {
            name,
            value,
            reason: "must be positive".to_string(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Parameter {name} = {value} out of bounds: {reason}")]
    OutOfBounds {
        name: &'static str,
        value: Decimal,
        reason: String,
    },
}
