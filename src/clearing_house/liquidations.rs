// 8.7 clearing_house/liquidations.rs: closing underwater positions and seizing collateral.
// a liquidation closes one trader or LP position in full. seizure comes after, once the
// account is flat but its quote balance is still negative.

use super::core::ClearingHouse;
use super::results::{ClearingHouseError, LiquidationResult, SeizureResult};
use crate::events::{EventPayload, LiquidationCallEvent, SeizeCollateralEvent};
use crate::liquidation::{calculate_liquidation_reward, can_seize_collateral, is_liquidatable, settle_seizure};
use crate::types::{AccountId, CollateralId, MarketId, Quote};
use rust_decimal::Decimal;

impl ClearingHouse {
    /// Close the trader (`is_trader`) or LP position of `liquidatee` in `market_id`.
    /// `proposed_amount` must bring the position back to flat.
    pub fn liquidate(
        &mut self,
        market_id: MarketId,
        liquidator: AccountId,
        liquidatee: AccountId,
        proposed_amount: Decimal,
        is_trader: bool,
    ) -> Result<LiquidationResult, ClearingHouseError> {
        if liquidator == liquidatee {
            return Err(ClearingHouseError::SelfLiquidation);
        }
        self.transact(|ch| {
            ch.prepare_account(liquidatee)?;
            ch.prepare_account(liquidator)?;

            let snapshot = ch.margin_snapshot(liquidatee)?;
            if !is_liquidatable(&snapshot, ch.params.min_margin) {
                return Err(ClearingHouseError::SufficientMargin {
                    margin_ratio: snapshot.margin_ratio(),
                });
            }

            let (notional, realized_pnl) = if is_trader {
                ch.liquidate_trader(market_id, liquidatee, proposed_amount)?
            } else {
                ch.liquidate_lp(market_id, liquidatee, proposed_amount)?
            };

            // 8.7.1: the liquidatee pays the whole reward, insurance takes its share
            let reward = calculate_liquidation_reward(
                notional,
                ch.params.liquidation_reward,
                ch.params.liquidation_reward_insurance_share,
            );
            ch.state.vault.settle_pnl(liquidatee, reward.total.negate());
            ch.state.vault.settle_pnl(liquidator, reward.liquidator_reward);
            ch.state.insurance.fund_insurance(reward.insurance_reward);

            ch.emit_event(EventPayload::LiquidationCall(LiquidationCallEvent {
                market_id,
                liquidatee,
                liquidator,
                notional,
                liquidator_reward: reward.liquidator_reward,
                insurance_reward: reward.insurance_reward,
                is_trader,
            }));
            tracing::info!(
                market = market_id.0,
                liquidatee = liquidatee.0,
                liquidator = liquidator.0,
                %notional,
                ratio = %snapshot.margin_ratio(),
                is_trader,
                "position liquidated"
            );

            Ok(LiquidationResult {
                market_id,
                liquidatee,
                liquidator,
                notional,
                reward,
                realized_pnl,
                is_trader,
            })
        })
    }

    fn liquidate_trader(
        &mut self,
        market_id: MarketId,
        liquidatee: AccountId,
        proposed_amount: Decimal,
    ) -> Result<(Quote, Quote), ClearingHouseError> {
        let position = self
            .market(market_id)?
            .trader_position(liquidatee)
            .cloned()
            .ok_or(crate::market::MarketError::NoPosition(liquidatee))?;
        let direction = position
            .side()
            .ok_or(crate::market::MarketError::NoPosition(liquidatee))?
            .opposite();

        let outcome = self.trade(market_id, liquidatee, proposed_amount, Decimal::ZERO, direction, true)?;
        if !outcome.position_after.is_zero() {
            return Err(ClearingHouseError::LiquidationPositionNotClosed {
                remaining: outcome.position_after.position_size,
            });
        }
        Ok((Quote::new(position.open_notional), outcome.pnl))
    }

    fn liquidate_lp(
        &mut self,
        market_id: MarketId,
        liquidatee: AccountId,
        proposed_amount: Decimal,
    ) -> Result<(Quote, Quote), ClearingHouseError> {
        let lp = self
            .market(market_id)?
            .lp_position(liquidatee)
            .cloned()
            .ok_or(crate::market::MarketError::NoLiquidityPosition(liquidatee))?;

        let removal = self.withdraw_liquidity(
            market_id,
            liquidatee,
            lp.liquidity_balance,
            [Decimal::ZERO; 2],
            proposed_amount,
            Decimal::ZERO,
            true,
        )?;
        if !removal.position_after.is_zero() {
            return Err(ClearingHouseError::LiquidationPositionNotClosed {
                remaining: removal.position_after.position_size,
            });
        }
        Ok((Quote::new(lp.open_notional), removal.realized_pnl))
    }

    /// Sell the non-quote collateral of a flat account with a quote debt to `liquidator`
    /// at a discount. whatever the sale does not cover goes to the insurance fund.
    pub fn seize_collateral(
        &mut self,
        liquidator: AccountId,
        liquidatee: AccountId,
    ) -> Result<SeizureResult, ClearingHouseError> {
        if liquidator == liquidatee {
            return Err(ClearingHouseError::SelfLiquidation);
        }
        self.transact(|ch| {
            ch.prepare_account(liquidatee)?;
            if ch.has_open_positions(liquidatee) {
                return Err(ClearingHouseError::OpenPositionsRemain(liquidatee));
            }

            let now = ch.current_time;
            let quote_balance = ch.state.vault.get_balance(liquidatee, CollateralId::QUOTE);
            let collateral = ch.state.vault.non_quote_value(liquidatee, true, &ch.oracle, now)?;
            if !can_seize_collateral(
                quote_balance,
                collateral,
                ch.params.non_ui_liquidation_discount,
                ch.params.ui_liquidation_threshold,
            ) {
                return Err(ClearingHouseError::NotEligibleForSeizure {
                    quote_balance,
                    collateral,
                });
            }

            let sale = ch.state.vault.settle_liquidation_on_collaterals(
                liquidator,
                liquidatee,
                ch.params.liquidation_discount,
                &ch.oracle,
                now,
            )?;
            let settlement = settle_seizure(Quote::new(quote_balance), sale.quote_paid);

            // 8.7.2: the fund pays what it can, the account is squared either way
            let covered_by_insurance = ch.state.insurance.settle_debt(settlement.shortfall);
            let bad_debt = settlement.shortfall.sub(covered_by_insurance);
            ch.state.vault.settle_pnl(liquidatee, settlement.shortfall);

            ch.emit_event(EventPayload::SeizeCollateral(SeizeCollateralEvent {
                liquidatee,
                liquidator,
                debt: settlement.debt,
                paid_by_liquidator: settlement.paid_by_liquidator,
                covered_by_insurance,
                bad_debt,
            }));
            tracing::info!(
                liquidatee = liquidatee.0,
                liquidator = liquidator.0,
                debt = %settlement.debt,
                paid = %settlement.paid_by_liquidator,
                %bad_debt,
                "collateral seized"
            );

            Ok(SeizureResult {
                liquidatee,
                liquidator,
                debt: settlement.debt,
                paid_by_liquidator: settlement.paid_by_liquidator,
                covered_by_insurance,
                bad_debt,
                tokens_sold: sale.tokens_sold,
            })
        })
    }
}
