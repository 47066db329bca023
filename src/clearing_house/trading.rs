// 8.5 clearing_house/trading.rs: trader entry points. the market moves the position,
// the clearing house books the money and checks margin afterwards.

use super::core::ClearingHouse;
use super::results::ClearingHouseError;
use crate::events::{DustGeneratedEvent, EventPayload, PositionChangedEvent};
use crate::market::TradeOutcome;
use crate::types::{AccountId, MarketId, Side, DUST_ACCOUNT};
use rust_decimal::Decimal;

impl ClearingHouse {
    /// Trade `amount` in `direction`. a Long sells `amount` quote, a Short sells `amount` base.
    /// extends when flat or on the same side, reduces otherwise. a reduction never reverses.
    pub fn change_position(
        &mut self,
        market_id: MarketId,
        account: AccountId,
        amount: Decimal,
        min_amount: Decimal,
        direction: Side,
    ) -> Result<TradeOutcome, ClearingHouseError> {
        if account == DUST_ACCOUNT {
            return Err(ClearingHouseError::ReservedAccount(account));
        }
        self.transact(|ch| {
            ch.prepare_account(account)?;
            let outcome = ch.trade(market_id, account, amount, min_amount, direction, false)?;

            let ratio = if outcome.is_extend {
                ch.params.min_margin_at_creation
            } else {
                ch.params.min_margin
            };
            ch.enforce_margin(account, ratio)?;
            ch.enforce_min_open_notional(market_id, account)?;
            Ok(outcome)
        })
    }

    /// Close the current position and open `open_amount` on the other side, atomically.
    #[allow(clippy::too_many_arguments)]
    pub fn open_reverse_position(
        &mut self,
        market_id: MarketId,
        account: AccountId,
        close_amount: Decimal,
        close_min_amount: Decimal,
        open_amount: Decimal,
        open_min_amount: Decimal,
        direction: Side,
    ) -> Result<(TradeOutcome, TradeOutcome), ClearingHouseError> {
        self.transact(|ch| {
            ch.prepare_account(account)?;
            let (close, open) = ch.market_mut(market_id)?.open_reverse_position(
                account,
                close_amount,
                close_min_amount,
                open_amount,
                open_min_amount,
                direction,
            )?;
            ch.book_trade(market_id, account, &close, false);
            ch.book_trade(market_id, account, &open, false);

            ch.enforce_margin(account, ch.params.min_margin_at_creation)?;
            ch.enforce_min_open_notional(market_id, account)?;
            Ok((close, open))
        })
    }

    // 8.5.1: one market trade plus its bookings. no margin check, liquidations call this too
    pub(super) fn trade(
        &mut self,
        market_id: MarketId,
        account: AccountId,
        amount: Decimal,
        min_amount: Decimal,
        direction: Side,
        is_liquidation: bool,
    ) -> Result<TradeOutcome, ClearingHouseError> {
        let outcome =
            self.market_mut(market_id)?
                .change_position(account, amount, min_amount, direction, is_liquidation)?;
        self.book_trade(market_id, account, &outcome, is_liquidation);
        Ok(outcome)
    }

    fn book_trade(&mut self, market_id: MarketId, account: AccountId, outcome: &TradeOutcome, is_liquidation: bool) {
        self.state.vault.settle_pnl(account, outcome.settlement());
        self.state.insurance.fund_insurance(outcome.insurance_fee);

        self.emit_event(EventPayload::PositionChanged(PositionChangedEvent {
            market_id,
            account_id: account,
            direction: outcome.direction,
            added_open_notional: outcome.quote_delta,
            added_position_size: outcome.base_delta,
            trading_fee: outcome.trading_fee,
            insurance_fee: outcome.insurance_fee,
            realized_pnl: outcome.pnl,
            is_liquidation,
        }));
        if let Some(dust) = outcome.dust {
            self.emit_dust(market_id, account, dust);
        }
    }

    pub(super) fn emit_dust(&mut self, market_id: MarketId, account: AccountId, dust: crate::position::Exposure) {
        self.emit_event(EventPayload::DustGenerated(DustGeneratedEvent {
            market_id,
            account_id: account,
            position_size: dust.size(),
            open_notional: dust.open_notional,
        }));
    }
}
