//! Collateral ledger.
//!
//! Balances are kept per account and per whitelisted collateral token. The quote token
//! (index 0) is the settlement currency: realized PnL, fees and funding all land there,
//! so its balance may go negative. Every other token is valued through the oracle and
//! discounted by its weight when margin is computed.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::oracle::{OracleError, PriceOracle};
use crate::types::{AccountId, AssetId, CollateralId, Quote, Timestamp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollateralToken {
    pub id: CollateralId,
    pub asset: AssetId,
    // Haircut applied to the oracle value in discounted valuations
    pub weight: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VaultError {
    #[error("Amount must be positive")]
    ZeroAmount,

    #[error("Collateral {0:?} is not whitelisted")]
    UnsupportedCollateral(CollateralId),

    #[error("Collateral {0} is already whitelisted")]
    DuplicateCollateral(AssetId),

    #[error("Collateral weight {0} must be within (0, 1]")]
    InvalidWeight(Decimal),

    #[error("Insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance { available: Decimal, requested: Decimal },

    #[error("Cannot withdraw collateral while quote balance is negative ({0})")]
    NegativeQuoteBalance(Decimal),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),
}

/// What a seizure moved between the two accounts.
#[derive(Debug, Clone, PartialEq)]
pub struct CollateralSale {
    /// Quote the liquidator paid into the liquidatee's account
    pub quote_paid: Quote,
    /// Collateral moved to the liquidator, per token
    pub tokens_sold: Vec<(CollateralId, Decimal)>,
}

#[derive(Debug, Clone)]
pub struct Vault {
    tokens: Vec<CollateralToken>,
    balances: HashMap<(AccountId, CollateralId), Decimal>,
}

impl Vault {
    pub fn new(quote_asset: AssetId) -> Self {
        Self {
            tokens: vec![CollateralToken {
                id: CollateralId::QUOTE,
                asset: quote_asset,
                weight: Decimal::ONE,
            }],
            balances: HashMap::new(),
        }
    }

    pub fn add_collateral(&mut self, asset: AssetId, weight: Decimal) -> Result<CollateralId, VaultError> {
        if self.tokens.iter().any(|t| t.asset == asset) {
            return Err(VaultError::DuplicateCollateral(asset));
        }
        check_weight(weight)?;
        let id = CollateralId(self.tokens.len() as u32);
        self.tokens.push(CollateralToken { id, asset, weight });
        Ok(id)
    }

    pub fn set_collateral_weight(&mut self, token: CollateralId, weight: Decimal) -> Result<(), VaultError> {
        check_weight(weight)?;
        let entry = self
            .tokens
            .iter_mut()
            .find(|t| t.id == token && !token.is_quote())
            .ok_or(VaultError::UnsupportedCollateral(token))?;
        entry.weight = weight;
        Ok(())
    }

    pub fn collateral(&self, token: CollateralId) -> Option<&CollateralToken> {
        self.tokens.get(token.0 as usize)
    }

    pub fn collaterals(&self) -> &[CollateralToken] {
        &self.tokens
    }

    pub fn get_balance(&self, account: AccountId, token: CollateralId) -> Decimal {
        self.balances.get(&(account, token)).copied().unwrap_or_default()
    }

    pub(crate) fn deposit(&mut self, account: AccountId, amount: Decimal, token: CollateralId) -> Result<(), VaultError> {
        if amount <= Decimal::ZERO {
            return Err(VaultError::ZeroAmount);
        }
        if self.collateral(token).is_none() {
            return Err(VaultError::UnsupportedCollateral(token));
        }
        *self.balances.entry((account, token)).or_default() += amount;
        Ok(())
    }

    pub(crate) fn withdraw(&mut self, account: AccountId, amount: Decimal, token: CollateralId) -> Result<(), VaultError> {
        if amount <= Decimal::ZERO {
            return Err(VaultError::ZeroAmount);
        }
        if self.collateral(token).is_none() {
            return Err(VaultError::UnsupportedCollateral(token));
        }
        if !token.is_quote() {
            let quote = self.get_balance(account, CollateralId::QUOTE);
            if quote < Decimal::ZERO {
                return Err(VaultError::NegativeQuoteBalance(quote));
            }
        }
        let available = self.get_balance(account, token);
        if available < amount {
            return Err(VaultError::InsufficientBalance {
                available,
                requested: amount,
            });
        }
        self.set_balance(account, token, available - amount);
        Ok(())
    }

    /// Book realized PnL, fees or funding against the quote balance.
    pub(crate) fn settle_pnl(&mut self, account: AccountId, amount: Quote) {
        if amount.is_zero() {
            return;
        }
        let balance = self.get_balance(account, CollateralId::QUOTE) + amount.value();
        self.set_balance(account, CollateralId::QUOTE, balance);
    }

    // 10.2: quote value of everything the account holds. quote counts 1:1 and may be
    // negative. other tokens are priced by the oracle and weighted when `discounted`.
    pub fn get_reserve_value(
        &self,
        account: AccountId,
        discounted: bool,
        oracle: &PriceOracle,
        now: Timestamp,
    ) -> Result<Quote, VaultError> {
        let quote = self.get_balance(account, CollateralId::QUOTE);
        let others = self.non_quote_value(account, discounted, oracle, now)?;
        Ok(Quote::new(quote).add(others))
    }

    pub fn non_quote_value(
        &self,
        account: AccountId,
        discounted: bool,
        oracle: &PriceOracle,
        now: Timestamp,
    ) -> Result<Quote, VaultError> {
        let mut total = Decimal::ZERO;
        for token in self.tokens.iter().filter(|t| !t.id.is_quote()) {
            let balance = self.get_balance(account, token.id);
            let price = oracle.get_price(&token.asset, balance, now)?;
            let value = balance * price;
            total += if discounted { value * token.weight } else { value };
        }
        Ok(Quote::new(total))
    }

    // 10.3: sell the liquidatee's non-quote collateral to the liquidator at
    // `oracle price * liquidation_discount` until the quote debt is covered or the
    // collateral runs out. the liquidator pays in quote.
    pub(crate) fn settle_liquidation_on_collaterals(
        &mut self,
        liquidator: AccountId,
        liquidatee: AccountId,
        liquidation_discount: Decimal,
        oracle: &PriceOracle,
        now: Timestamp,
    ) -> Result<CollateralSale, VaultError> {
        let mut debt = -self.get_balance(liquidatee, CollateralId::QUOTE);
        let mut quote_paid = Decimal::ZERO;
        let mut tokens_sold = Vec::new();

        let tokens: Vec<CollateralToken> = self.tokens.iter().filter(|t| !t.id.is_quote()).cloned().collect();
        for token in tokens {
            if debt <= Decimal::ZERO {
                break;
            }
            let balance = self.get_balance(liquidatee, token.id);
            if balance <= Decimal::ZERO {
                continue;
            }
            let price = oracle.get_price(&token.asset, balance, now)? * liquidation_discount;
            if price <= Decimal::ZERO {
                continue;
            }

            let sold = balance.min(debt / price);
            let paid = sold * price;

            self.set_balance(liquidatee, token.id, balance - sold);
            let liquidator_balance = self.get_balance(liquidator, token.id);
            self.set_balance(liquidator, token.id, liquidator_balance + sold);

            debt -= paid;
            quote_paid += paid;
            tokens_sold.push((token.id, sold));
        }

        let liquidator_quote = self.get_balance(liquidator, CollateralId::QUOTE);
        if liquidator_quote < quote_paid {
            return Err(VaultError::InsufficientBalance {
                available: liquidator_quote,
                requested: quote_paid,
            });
        }
        self.settle_pnl(liquidator, Quote::new(-quote_paid));
        self.settle_pnl(liquidatee, Quote::new(quote_paid));

        Ok(CollateralSale {
            quote_paid: Quote::new(quote_paid),
            tokens_sold,
        })
    }

    fn set_balance(&mut self, account: AccountId, token: CollateralId, value: Decimal) {
        if value.is_zero() {
            self.balances.remove(&(account, token));
        } else {
            self.balances.insert((account, token), value);
        }
    }
}

fn check_weight(weight: Decimal) -> Result<(), VaultError> {
    if weight <= Decimal::ZERO || weight > Decimal::ONE {
        return Err(VaultError::InvalidWeight(weight));
    }
    Ok(())
}
