// 6.0 insurance.rs: backstop for losses no account can pay.
// receives the insurance fee on every extend and its share of liquidation rewards.
// whatever it cannot cover is tracked as system bad debt.

use serde::{Deserialize, Serialize};

use crate::types::Quote;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InsuranceFund {
    pub balance: Quote,
    pub total_deposits: Quote,
    pub total_payouts: Quote,
    // Losses the fund could not absorb
    pub system_bad_debt: Quote,
}

impl InsuranceFund {
    pub fn new(initial_balance: Quote) -> Self {
        Self {
            balance: initial_balance,
            total_deposits: initial_balance,
            ..Self::default()
        }
    }

    pub fn fund_insurance(&mut self, amount: Quote) {
        if !amount.is_positive() {
            return;
        }
        self.balance = self.balance.add(amount);
        self.total_deposits = self.total_deposits.add(amount);
    }

    // 6.1: pay as much of `amount` as the balance allows. the rest becomes bad debt.
    // returns the covered part.
    pub fn settle_debt(&mut self, amount: Quote) -> Quote {
        if !amount.is_positive() {
            return Quote::zero();
        }
        let covered = amount.min(self.balance);
        self.balance = self.balance.sub(covered);
        self.total_payouts = self.total_payouts.add(covered);

        let uncovered = amount.sub(covered);
        if uncovered.is_positive() {
            self.system_bad_debt = self.system_bad_debt.add(uncovered);
            tracing::warn!(%uncovered, total = %self.system_bad_debt, "insurance fund exhausted, bad debt recorded");
        }
        covered
    }

    pub fn can_cover(&self, amount: Quote) -> bool {
        self.balance >= amount
    }
}
