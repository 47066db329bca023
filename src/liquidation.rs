//! Liquidation and collateral seizure rules.
//!
//! A position may be liquidated once its account falls below maintenance margin.
//! The liquidator closes it in full and earns a reward proportional to the closed
//! notional, part of which is routed to the insurance fund. Once an account has no
//! positions left but still owes quote, its other collateral can be seized.

use crate::margin::MarginSnapshot;
use crate::types::Quote;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationReward {
    pub total: Quote,
    pub liquidator_reward: Quote,
    pub insurance_reward: Quote,
}

// the liquidator gets whatever insurance does not, so the two always add up to total
pub fn calculate_liquidation_reward(
    notional: Quote,
    liquidation_reward: Decimal,
    insurance_share: Decimal,
) -> LiquidationReward {
    let total = notional.abs().mul(liquidation_reward);
    let insurance_reward = total.mul(insurance_share);
    let liquidator_reward = total.sub(insurance_reward);

    LiquidationReward {
        total,
        liquidator_reward,
        insurance_reward,
    }
}

pub fn is_liquidatable(snapshot: &MarginSnapshot, min_margin: Decimal) -> bool {
    snapshot.margin_ratio() < min_margin
}

/// Seizure is allowed once the quote debt outweighs the (haircut) value of the other
/// collateral, or once it is too large to wait for.
pub fn can_seize_collateral(
    quote_balance: Decimal,
    discounted_collateral: Quote,
    non_ui_liquidation_discount: Decimal,
    ui_liquidation_threshold: Decimal,
) -> bool {
    if quote_balance >= Decimal::ZERO {
        return false;
    }
    let debt = quote_balance.abs();
    debt > discounted_collateral.value() * non_ui_liquidation_discount || debt > ui_liquidation_threshold
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeizureSettlement {
    pub debt: Quote,
    pub paid_by_liquidator: Quote,
    pub shortfall: Quote,
}

pub fn settle_seizure(debt: Quote, paid_by_liquidator: Quote) -> SeizureSettlement {
    let shortfall = debt.abs().sub(paid_by_liquidator).max(Quote::zero());
    SeizureSettlement {
        debt: debt.abs(),
        paid_by_liquidator,
        shortfall,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn reward_split() {
        let reward = calculate_liquidation_reward(Quote::new(dec!(-50000)), dec!(0.015), dec!(0.4));

        assert_eq!(reward.total.value(), dec!(750));
        assert_eq!(reward.insurance_reward.value(), dec!(300));
        assert_eq!(reward.liquidator_reward.value(), dec!(450));
    }

    #[test]
    fn liquidatable_below_min_margin() {
        let debt = Quote::new(dec!(1000));
        assert!(is_liquidatable(&MarginSnapshot::new(Quote::new(dec!(24)), Quote::zero(), debt), dec!(0.025)));
        assert!(!is_liquidatable(&MarginSnapshot::new(Quote::new(dec!(25)), Quote::zero(), debt), dec!(0.025)));
        assert!(!is_liquidatable(&MarginSnapshot::new(Quote::zero(), Quote::zero(), Quote::zero()), dec!(0.025)));
    }

    #[test]
    fn seizure_eligibility() {
        // debt 150 vs 100 of collateral
        assert!(can_seize_collateral(dec!(-150), Quote::new(dec!(100)), dec!(0.95), dec!(10000)));
        // debt well covered
        assert!(!can_seize_collateral(dec!(-50), Quote::new(dec!(100)), dec!(0.95), dec!(10000)));
        // covered, but above the hard threshold
        assert!(can_seize_collateral(dec!(-50), Quote::new(dec!(100)), dec!(0.95), dec!(40)));
        // no debt at all
        assert!(!can_seize_collateral(dec!(10), Quote::zero(), dec!(0.95), Decimal::ZERO));
    }

    #[test]
    fn seizure_shortfall() {
        let settlement = settle_seizure(Quote::new(dec!(-150)), Quote::new(dec!(90)));
        assert_eq!(settlement.shortfall.value(), dec!(60));

        let settlement = settle_seizure(Quote::new(dec!(-50)), Quote::new(dec!(50)));
        assert!(settlement.shortfall.is_zero());
    }
}
