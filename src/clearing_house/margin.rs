// 8.4 clearing_house/margin.rs: one margin number per account, across every market.

use super::core::ClearingHouse;
use super::results::ClearingHouseError;
use crate::margin::{evaluate_margin_status, weighted_debt, MarginSnapshot, MarginStatus};
use crate::types::{AccountId, MarketId, Quote};
use rust_decimal::Decimal;

impl ClearingHouse {
    /// Unrealized PnL of every trader and LP position of `account`, marked at oracle prices
    /// and including funding and fees not yet settled.
    pub fn total_pnl(&self, account: AccountId) -> Result<Quote, ClearingHouseError> {
        let mut pnl = Quote::zero();
        for market in &self.state.markets {
            let trader = market.trader_position(account).filter(|p| p.is_open());
            let lp = market.lp_position(account);
            if trader.is_none() && lp.is_none() {
                continue;
            }

            let price = self.index_price(market)?;
            if let Some(position) = trader {
                pnl = pnl
                    .add(position.unrealized_pnl(price))
                    .add(market.pending_trader_funding(account));
            }
            if lp.is_some() {
                pnl = pnl.add(market.lp_unrealized_pnl(account, price)?);
            }
        }
        Ok(pnl)
    }

    // 8.4.1: risk weighted |open notional| of trader positions plus LP debt
    pub fn total_debt(&self, account: AccountId) -> Quote {
        self.state
            .markets
            .iter()
            .map(|market| {
                let trader = market
                    .trader_position(account)
                    .map_or(Decimal::ZERO, |p| p.open_notional.abs());
                let lp = market.lp_debt(account).value();
                weighted_debt(trader + lp, market.params().risk_weight)
            })
            .sum()
    }

    pub fn margin_snapshot(&self, account: AccountId) -> Result<MarginSnapshot, ClearingHouseError> {
        let reserve_value = self
            .state
            .vault
            .get_reserve_value(account, true, &self.oracle, self.current_time)?;
        Ok(MarginSnapshot::new(
            reserve_value,
            self.total_pnl(account)?,
            self.total_debt(account),
        ))
    }

    pub fn margin_ratio(&self, account: AccountId) -> Result<Decimal, ClearingHouseError> {
        Ok(self.margin_snapshot(account)?.margin_ratio())
    }

    pub fn free_collateral_by_ratio(&self, account: AccountId, ratio: Decimal) -> Result<Quote, ClearingHouseError> {
        Ok(self.margin_snapshot(account)?.free_collateral(ratio))
    }

    pub fn free_collateral(&self, account: AccountId) -> Result<Quote, ClearingHouseError> {
        self.free_collateral_by_ratio(account, self.params.min_margin_at_creation)
    }

    pub fn margin_status(&self, account: AccountId) -> Result<MarginStatus, ClearingHouseError> {
        let snapshot = self.margin_snapshot(account)?;
        Ok(evaluate_margin_status(
            &snapshot,
            self.params.min_margin,
            self.params.min_margin_at_creation,
        ))
    }

    pub fn is_position_open(&self, market_id: MarketId, account: AccountId) -> Result<bool, ClearingHouseError> {
        Ok(self.market(market_id)?.is_position_open(account))
    }

    pub fn is_lp_position_open(&self, market_id: MarketId, account: AccountId) -> Result<bool, ClearingHouseError> {
        Ok(self.market(market_id)?.is_lp_position_open(account))
    }

    pub fn has_open_positions(&self, account: AccountId) -> bool {
        self.state
            .markets
            .iter()
            .any(|m| m.is_position_open(account) || m.lp_position(account).is_some())
    }

    pub fn proposed_amount_to_close(&self, market_id: MarketId, account: AccountId) -> Result<Decimal, ClearingHouseError> {
        Ok(self.market(market_id)?.proposed_amount_to_close(account)?)
    }

    pub fn lp_proposed_amount_to_close(
        &self,
        market_id: MarketId,
        account: AccountId,
    ) -> Result<Decimal, ClearingHouseError> {
        Ok(self.market(market_id)?.lp_proposed_amount_to_close(account)?)
    }

    // 8.4.2: post-trade check. `ratio` is the creation margin for risk-increasing actions
    pub(super) fn enforce_margin(&self, account: AccountId, ratio: Decimal) -> Result<(), ClearingHouseError> {
        let snapshot = self.margin_snapshot(account)?;
        let free_collateral = snapshot.free_collateral(ratio);
        if free_collateral.is_negative() {
            return Err(ClearingHouseError::InsufficientMargin {
                free_collateral,
                ratio: snapshot.margin_ratio(),
            });
        }
        Ok(())
    }

    // a position may be flat or above the minimum, nothing in between
    pub(super) fn enforce_min_open_notional(
        &self,
        market_id: MarketId,
        account: AccountId,
    ) -> Result<(), ClearingHouseError> {
        let min = self.params.min_positive_open_notional;
        let open_notional = self
            .market(market_id)?
            .trader_position(account)
            .map_or(Decimal::ZERO, |p| p.open_notional.abs());
        if !open_notional.is_zero() && open_notional < min {
            return Err(ClearingHouseError::UnderOpenNotionalAmountRequired { open_notional, min });
        }
        Ok(())
    }
}
