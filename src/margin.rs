//! Cross-market margin.
//!
//! An account's margin is one number across every market it touches:
//! `min(rv, rv + pnl) / debt`, where `rv` is the discounted collateral value,
//! `pnl` the unrealized profit or loss of all trader and LP positions and
//! `debt` the risk-weighted sum of their open notionals. Gains never count
//! toward margin, losses always do.

use crate::types::Quote;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Aggregated inputs of the margin formula for one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MarginSnapshot {
    pub reserve_value: Quote,
    pub pnl: Quote,
    pub debt: Quote,
}

impl MarginSnapshot {
    pub fn new(reserve_value: Quote, pnl: Quote, debt: Quote) -> Self {
        Self {
            reserve_value,
            pnl,
            debt,
        }
    }

    // unrealized gains are ignored
    pub fn effective_collateral(&self) -> Quote {
        self.reserve_value.min(self.reserve_value.add(self.pnl))
    }

    /// `Decimal::MAX` when there is no debt.
    pub fn margin_ratio(&self) -> Decimal {
        if self.debt.is_zero() {
            return Decimal::MAX;
        }
        self.effective_collateral().value() / self.debt.value()
    }

    pub fn free_collateral(&self, ratio: Decimal) -> Quote {
        self.effective_collateral().sub(self.debt.mul(ratio))
    }

    pub fn satisfies(&self, ratio: Decimal) -> bool {
        !self.free_collateral(ratio).is_negative()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarginStatus {
    /// Above the creation margin. any action allowed
    Healthy,
    /// Between maintenance and creation margin. only risk-reducing actions
    ReduceOnly,
    /// Below maintenance margin
    Liquidatable,
}

pub fn evaluate_margin_status(
    snapshot: &MarginSnapshot,
    min_margin: Decimal,
    min_margin_at_creation: Decimal,
) -> MarginStatus {
    if snapshot.satisfies(min_margin_at_creation) {
        MarginStatus::Healthy
    } else if snapshot.satisfies(min_margin) {
        MarginStatus::ReduceOnly
    } else {
        MarginStatus::Liquidatable
    }
}

pub fn weighted_debt(open_notional: Decimal, risk_weight: Decimal) -> Quote {
    Quote::new(open_notional.abs() * risk_weight)
}

// LPs carry a multiple of their ledger notional as debt
pub fn lp_debt(open_notional: Decimal, lp_debt_coefficient: Decimal) -> Quote {
    Quote::new(open_notional.abs() * lp_debt_coefficient)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn margin_ratio_ignores_gains() {
        let snapshot = MarginSnapshot::new(Quote::new(dec!(100)), Quote::new(dec!(50)), Quote::new(dec!(1000)));
        assert_eq!(snapshot.margin_ratio(), dec!(0.1));
    }

    #[test]
    fn margin_ratio_counts_losses() {
        let snapshot = MarginSnapshot::new(Quote::new(dec!(100)), Quote::new(dec!(-60)), Quote::new(dec!(1000)));
        assert_eq!(snapshot.margin_ratio(), dec!(0.04));
        assert_eq!(snapshot.free_collateral(dec!(0.025)).value(), dec!(15));
    }

    #[test]
    fn no_debt_is_max_ratio() {
        let snapshot = MarginSnapshot::new(Quote::new(dec!(100)), Quote::zero(), Quote::zero());
        assert_eq!(snapshot.margin_ratio(), Decimal::MAX);
        assert!(snapshot.satisfies(dec!(0.5)));
    }

    #[test]
    fn margin_status_thresholds() {
        let debt = Quote::new(dec!(1000));
        let healthy = MarginSnapshot::new(Quote::new(dec!(60)), Quote::zero(), debt);
        let reduce_only = MarginSnapshot::new(Quote::new(dec!(30)), Quote::zero(), debt);
        let liquidatable = MarginSnapshot::new(Quote::new(dec!(20)), Quote::zero(), debt);

        assert_eq!(evaluate_margin_status(&healthy, dec!(0.025), dec!(0.055)), MarginStatus::Healthy);
        assert_eq!(evaluate_margin_status(&reduce_only, dec!(0.025), dec!(0.055)), MarginStatus::ReduceOnly);
        assert_eq!(
            evaluate_margin_status(&liquidatable, dec!(0.025), dec!(0.055)),
            MarginStatus::Liquidatable
        );
    }

    #[test]
    fn debt_weights() {
        assert_eq!(weighted_debt(dec!(-200), dec!(1.5)).value(), dec!(300));
        assert_eq!(lp_debt(dec!(-10), dec!(3)).value(), dec!(30));
    }
}
