// 8.6 clearing_house/liquidity.rs: LP entry points.

use super::core::ClearingHouse;
use super::results::ClearingHouseError;
use crate::events::{EventPayload, LiquidityProvidedEvent, LiquidityRemovedEvent};
use crate::market::{LiquidityProvision, LiquidityRemoval};
use crate::types::{AccountId, MarketId, DUST_ACCOUNT};
use rust_decimal::Decimal;

impl ClearingHouse {
    /// Supply `[quote, base]` to the pool. the LP's ledger is debited both amounts.
    pub fn provide_liquidity(
        &mut self,
        market_id: MarketId,
        account: AccountId,
        amounts: [Decimal; 2],
        min_lp_amount: Decimal,
    ) -> Result<LiquidityProvision, ClearingHouseError> {
        if account == DUST_ACCOUNT {
            return Err(ClearingHouseError::ReservedAccount(account));
        }
        self.transact(|ch| {
            ch.prepare_account(account)?;
            let now = ch.current_time;
            let provision = ch
                .market_mut(market_id)?
                .provide_liquidity(account, amounts, min_lp_amount, now)?;
            ch.state.vault.settle_pnl(account, provision.settlement());

            ch.emit_event(EventPayload::LiquidityProvided(LiquidityProvidedEvent {
                market_id,
                account_id: account,
                quote_amount: amounts[0],
                base_amount: amounts[1],
                liquidity_minted: provision.liquidity_minted,
            }));
            ch.enforce_margin(account, ch.params.min_margin_at_creation)?;
            Ok(provision)
        })
    }

    /// Burn `amount` LP tokens. `proposed_amount` optionally trades the implicit position
    /// down in the same call, zero leaves it on the LP's ledger.
    #[allow(clippy::too_many_arguments)]
    pub fn remove_liquidity(
        &mut self,
        market_id: MarketId,
        account: AccountId,
        amount: Decimal,
        min_vtoken_amounts: [Decimal; 2],
        proposed_amount: Decimal,
        min_amount: Decimal,
    ) -> Result<LiquidityRemoval, ClearingHouseError> {
        self.transact(|ch| {
            ch.prepare_account(account)?;
            let removal =
                ch.withdraw_liquidity(market_id, account, amount, min_vtoken_amounts, proposed_amount, min_amount, false)?;
            ch.enforce_margin(account, ch.params.min_margin)?;
            Ok(removal)
        })
    }

    // 8.6.1: market removal plus bookings. liquidations skip the lock and the margin check
    #[allow(clippy::too_many_arguments)]
    pub(super) fn withdraw_liquidity(
        &mut self,
        market_id: MarketId,
        account: AccountId,
        amount: Decimal,
        min_vtoken_amounts: [Decimal; 2],
        proposed_amount: Decimal,
        min_amount: Decimal,
        is_liquidation: bool,
    ) -> Result<LiquidityRemoval, ClearingHouseError> {
        let now = self.current_time;
        let removal = self.market_mut(market_id)?.remove_liquidity(
            account,
            amount,
            min_vtoken_amounts,
            proposed_amount,
            min_amount,
            is_liquidation,
            now,
        )?;
        self.state.vault.settle_pnl(account, removal.settlement());

        self.emit_event(EventPayload::LiquidityRemoved(LiquidityRemovedEvent {
            market_id,
            account_id: account,
            liquidity_burned: removal.liquidity_burned,
            quote_amount: removal.quote_amount,
            base_amount: removal.base_amount,
            realized_pnl: removal.realized_pnl,
        }));
        if let Some(dust) = removal.dust {
            self.emit_dust(market_id, account, dust);
        }
        Ok(removal)
    }
}
