// 8.0 clearing_house/core.rs: state, collateral in and out, the unit-of-work wrapper, event emission.

use super::config::ClearingHouseConfig;
use super::results::ClearingHouseError;
use crate::config::ClearingHouseParams;
use crate::events::{
    DepositEvent, Event, EventLog, EventPayload, FundingPaidEvent, FundingRateUpdatedEvent, InsuranceFundedEvent,
    TwapUpdatedEvent, WithdrawalEvent,
};
use crate::insurance::InsuranceFund;
use crate::market::{Market, MarketConfig};
use crate::oracle::PriceOracle;
use crate::pool::AmmPool;
use crate::types::{AccountId, AssetId, CollateralId, MarketId, Quote, Timestamp, DUST_ACCOUNT};
use crate::vault::Vault;
use rust_decimal::Decimal;

/** 8.1: everything a failed call must leave untouched */
#[derive(Debug, Clone)]
pub(super) struct State {
    pub(super) markets: Vec<Market>,
    pub(super) vault: Vault,
    pub(super) insurance: InsuranceFund,
    pub(super) events: EventLog,
}

#[derive(Debug)]
pub struct ClearingHouse {
    pub(super) config: ClearingHouseConfig,
    pub(super) params: ClearingHouseParams,
    pub(super) state: State,
    pub(super) oracle: PriceOracle,
    pub(super) current_time: Timestamp,
}

impl ClearingHouse {
    pub fn new(
        config: ClearingHouseConfig,
        params: ClearingHouseParams,
        quote_asset: AssetId,
        oracle: PriceOracle,
    ) -> Result<Self, ClearingHouseError> {
        params.validate()?;
        let events = EventLog::new(config.max_events);
        Ok(Self {
            config,
            params,
            state: State {
                markets: Vec::new(),
                vault: Vault::new(quote_asset),
                insurance: InsuranceFund::default(),
                events,
            },
            oracle,
            current_time: Timestamp::default(),
        })
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, secs: i64) {
        self.current_time = self.current_time.plus_secs(secs);
    }

    // the launch price seeds both TWAPs
    pub fn add_market(&mut self, config: MarketConfig, pool: Box<dyn AmmPool>) -> Result<MarketId, ClearingHouseError> {
        config.params.validate()?;
        let initial_price = self.oracle.get_price(&config.base_asset, Decimal::ONE, self.current_time)?;
        let id = MarketId(self.state.markets.len() as u32);
        tracing::info!(market = id.0, name = %config.name, %initial_price, "market added");
        self.state
            .markets
            .push(Market::new(id, config, pool, initial_price, self.current_time));
        Ok(id)
    }

    pub fn add_collateral(&mut self, asset: AssetId, weight: Decimal) -> Result<CollateralId, ClearingHouseError> {
        Ok(self.state.vault.add_collateral(asset, weight)?)
    }

    pub fn market(&self, market_id: MarketId) -> Result<&Market, ClearingHouseError> {
        self.state
            .markets
            .get(market_id.0 as usize)
            .ok_or(ClearingHouseError::MarketNotFound(market_id))
    }

    pub(super) fn market_mut(&mut self, market_id: MarketId) -> Result<&mut Market, ClearingHouseError> {
        self.state
            .markets
            .get_mut(market_id.0 as usize)
            .ok_or(ClearingHouseError::MarketNotFound(market_id))
    }

    pub fn markets(&self) -> &[Market] {
        &self.state.markets
    }

    pub fn vault(&self) -> &Vault {
        &self.state.vault
    }

    pub fn insurance_fund(&self) -> &InsuranceFund {
        &self.state.insurance
    }

    pub fn oracle(&self) -> &PriceOracle {
        &self.oracle
    }

    pub fn oracle_mut(&mut self) -> &mut PriceOracle {
        &mut self.oracle
    }

    pub fn params(&self) -> &ClearingHouseParams {
        &self.params
    }

    pub fn events(&self) -> &[Event] {
        self.state.events.events()
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let events = self.state.events.events();
        let start = events.len().saturating_sub(count);
        &events[start..]
    }

    pub fn deposit(&mut self, account: AccountId, amount: Decimal, token: CollateralId) -> Result<(), ClearingHouseError> {
        if account == DUST_ACCOUNT {
            return Err(ClearingHouseError::ReservedAccount(account));
        }
        self.transact(|ch| {
            ch.prepare_account(account)?;
            ch.state.vault.deposit(account, amount, token)?;
            ch.emit_event(EventPayload::Deposit(DepositEvent {
                account_id: account,
                token,
                amount,
            }));
            Ok(())
        })
    }

    // withdrawing is risk-increasing, so the creation margin applies
    pub fn withdraw(&mut self, account: AccountId, amount: Decimal, token: CollateralId) -> Result<(), ClearingHouseError> {
        self.transact(|ch| {
            ch.prepare_account(account)?;
            ch.state.vault.withdraw(account, amount, token)?;
            ch.enforce_margin(account, ch.params.min_margin_at_creation)?;
            ch.emit_event(EventPayload::Withdrawal(WithdrawalEvent {
                account_id: account,
                token,
                amount,
            }));
            Ok(())
        })
    }

    pub fn fund_insurance(&mut self, amount: Quote) {
        self.state.insurance.fund_insurance(amount);
        let new_balance = self.state.insurance.balance;
        self.emit_event(EventPayload::InsuranceFunded(InsuranceFundedEvent { amount, new_balance }));
    }

    /// Realize pending funding and fees of `account` in every market.
    pub fn settle_account(&mut self, account: AccountId) -> Result<Quote, ClearingHouseError> {
        self.transact(|ch| ch.prepare_account(account))
    }

    /// Advance TWAPs and funding in every market. a no-op when already done this block.
    pub fn update_global_state(&mut self) -> Result<(), ClearingHouseError> {
        self.transact(|ch| ch.update_all_markets())
    }

    // 8.2: run `action`, restore the snapshot if it fails
    pub(super) fn transact<T>(
        &mut self,
        action: impl FnOnce(&mut Self) -> Result<T, ClearingHouseError>,
    ) -> Result<T, ClearingHouseError> {
        let snapshot = self.state.clone();
        match action(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                self.state = snapshot;
                tracing::debug!(error = %err, "call rolled back");
                Err(err)
            }
        }
    }

    pub(super) fn index_price(&self, market: &Market) -> Result<Decimal, ClearingHouseError> {
        Ok(self.oracle.get_price(market.base_asset(), Decimal::ONE, self.current_time)?)
    }

    fn update_all_markets(&mut self) -> Result<(), ClearingHouseError> {
        let now = self.current_time;
        for idx in 0..self.state.markets.len() {
            let price = self.index_price(&self.state.markets[idx])?;
            let market = &mut self.state.markets[idx];
            let market_id = market.id();
            let Some(update) = market.update_global_state(now, price) else {
                continue;
            };

            if let Some((oracle_twap, market_twap)) = update.twaps {
                self.emit_event(EventPayload::TwapUpdated(TwapUpdatedEvent {
                    market_id,
                    oracle_twap,
                    market_twap,
                }));
            }
            self.emit_event(EventPayload::FundingRateUpdated(FundingRateUpdatedEvent {
                market_id,
                funding_rate: update.funding_rate,
                cum_funding_rate: update.cum_funding_rate,
                cum_funding_per_lp_token: update.cum_funding_per_lp_token,
            }));
        }
        Ok(())
    }

    // 8.3: the pre step of every mutating call. returns what was booked to the quote balance.
    pub(super) fn prepare_account(&mut self, account: AccountId) -> Result<Quote, ClearingHouseError> {
        self.update_all_markets()?;

        let mut total = Quote::zero();
        for idx in 0..self.state.markets.len() {
            let market = &mut self.state.markets[idx];
            let market_id = market.id();
            let trader = market.settle_trader(account);
            let lp = market.settle_lp(account).total();

            for (amount, is_trader) in [(trader, true), (lp, false)] {
                if amount.is_zero() {
                    continue;
                }
                self.state.vault.settle_pnl(account, amount);
                self.emit_event(EventPayload::FundingPaid(FundingPaidEvent {
                    market_id,
                    account_id: account,
                    amount,
                    is_trader,
                }));
                total = total.add(amount);
            }
        }
        Ok(total)
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        if self.config.verbose {
            tracing::info!(time = %self.current_time, ?payload, "event");
        } else {
            tracing::debug!(time = %self.current_time, ?payload, "event");
        }
        self.state.events.record(self.current_time, payload);
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
    pub const EUR_MARKET: MarketId = MarketId(0);

    pub fn eur() -> AssetId {
        AssetId::new("EUR")
    }

    /// One EUR market at price 1. LP holds 10k/10k of liquidity backed by 100k of collateral.
    pub fn clearing_house() -> ClearingHouse {
        let mut oracle = PriceOracle::new(3600);
        oracle.add_feed(eur(), 86_400);
        oracle.set_price(&eur(), dec!(1), Timestamp::from_secs(0)).unwrap();

        let mut ch = ClearingHouse::new(
            ClearingHouseConfig::default(),
            ClearingHouseParams::default(),
            AssetId::new("USDC"),
            oracle,
        )
        .unwrap();
        let pool = Box::new(ConstantProductPool::new("EUR/USD", dec!(0.001)));
        ch.add_market(MarketConfig::new("EUR-PERP", "EUR"), pool).unwrap();

        ch.deposit(LP, dec!(100_000), CollateralId::QUOTE).unwrap();
        ch.provide_liquidity(EUR_MARKET, LP, [dec!(10_000), dec!(10_000)], Decimal::ZERO)
            .unwrap();
        ch
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::types::Side;
    use rust_decimal_macros::dec;

    #[test]
    fn test_deposit_and_withdraw() {
        let mut ch = clearing_house();
        ch.deposit(ALICE, dec!(500), CollateralId::QUOTE).unwrap();
        ch.withdraw(ALICE, dec!(200), CollateralId::QUOTE).unwrap();

        assert_eq!(ch.vault().get_balance(ALICE, CollateralId::QUOTE), dec!(300));
        assert!(matches!(
            ch.events().last().map(|e| &e.payload),
            Some(EventPayload::Withdrawal(_))
        ));
    }

    #[test]
    fn test_dust_account_reserved() {
        let mut ch = clearing_house();
        let result = ch.deposit(DUST_ACCOUNT, dec!(1), CollateralId::QUOTE);
        assert_eq!(result, Err(ClearingHouseError::ReservedAccount(DUST_ACCOUNT)));
    }

    #[test]
    fn test_failed_call_rolls_back_events() {
        let mut ch = clearing_house();
        ch.set_time(Timestamp::from_secs(60));
        let before = ch.events().len();

        // the pre step records funding events before the withdrawal fails
        let result = ch.withdraw(ALICE, dec!(1), CollateralId::QUOTE);
        assert!(result.is_err());
        assert_eq!(ch.events().len(), before);
        assert_eq!(ch.market(EUR_MARKET).unwrap().global_position().time_of_last_trade, Timestamp::from_secs(0));
    }

    #[test]
    fn test_withdraw_blocked_by_margin() {
        let mut ch = clearing_house();
        ch.deposit(ALICE, dec!(100), CollateralId::QUOTE).unwrap();
        ch.change_position(EUR_MARKET, ALICE, dec!(100), Decimal::ZERO, Side::Long)
            .unwrap();

        let result = ch.withdraw(ALICE, dec!(95), CollateralId::QUOTE);
        assert!(matches!(result, Err(ClearingHouseError::InsufficientMargin { .. })));
    }

    #[test]
    fn test_update_global_state_once_per_block() {
        let mut ch = clearing_house();
        ch.set_time(Timestamp::from_secs(900));
        ch.update_global_state().unwrap();
        let events = ch.events().len();
        let global = ch.market(EUR_MARKET).unwrap().global_position().clone();

        ch.update_global_state().unwrap();
        assert_eq!(ch.events().len(), events);
        assert_eq!(ch.market(EUR_MARKET).unwrap().global_position(), &global);
    }

    #[test]
    fn test_stale_oracle_blocks_everything() {
        let mut ch = clearing_house();
        ch.set_time(Timestamp::from_secs(86_401));
        let result = ch.deposit(ALICE, dec!(1), CollateralId::QUOTE);
        assert!(matches!(result, Err(ClearingHouseError::Oracle(_))));
        assert_eq!(ch.vault().get_balance(ALICE, CollateralId::QUOTE), Decimal::ZERO);
    }

    #[test]
    fn test_unknown_market() {
        let ch = clearing_house();
        assert!(matches!(ch.market(MarketId(7)), Err(ClearingHouseError::MarketNotFound(_))));
    }
}
