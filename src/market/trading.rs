// 3.2 market/trading.rs: extend and reduce exposures against the pool.
// direction Long always sells quote for base, direction Short always sells base for quote.
// 3.2.1 is the swap leg shared by traders and LPs, 3.2.4 the trader entry point.

use super::{Market, MarketError};
use crate::config::DUST_THRESHOLD;
use crate::position::{Exposure, TraderPosition};
use crate::types::{AccountId, Quote, Side, VToken};
use rust_decimal::Decimal;

/// Result of reducing an exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reduction {
    pub quote_delta: Decimal,
    pub base_delta: Decimal,
    // share of the open notional the reduction closed
    pub released: Decimal,
    pub trading_fee: Quote,
    // quote_delta + released - trading_fee
    pub pnl: Quote,
}

/// Result of one `change_position` call.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeOutcome {
    pub direction: Side,
    pub is_extend: bool,
    pub quote_delta: Decimal,
    pub base_delta: Decimal,
    pub trading_fee: Quote,
    pub insurance_fee: Quote,
    // realized pnl net of the trading fee. insurance fee not included.
    pub pnl: Quote,
    // funding settled before the trade
    pub funding: Quote,
    // residual swept to the house position
    pub dust: Option<Exposure>,
    pub position_after: Exposure,
}

impl TradeOutcome {
    /// Everything the trader's quote balance moves by.
    pub fn settlement(&self) -> Quote {
        self.pnl.add(self.funding).sub(self.insurance_fee)
    }
}

impl Market {
    // 3.2.1: one swap. returns (quote_delta, base_delta) from the trader's side
    fn swap_exposure(
        &mut self,
        direction: Side,
        amount: Decimal,
        min_amount: Decimal,
        is_liquidation: bool,
    ) -> Result<(Decimal, Decimal), MarketError> {
        if amount <= Decimal::ZERO {
            return Err(MarketError::ZeroAmount);
        }

        let (sell, buy) = match direction {
            Side::Long => (VToken::Quote, VToken::Base),
            Side::Short => (VToken::Base, VToken::Quote),
        };
        if !is_liquidation {
            let quoted = match direction {
                Side::Long => amount,
                Side::Short => self.pool.get_dy(VToken::Base, amount)?.amount_out,
            };
            let traded = self.global.current_block_trade_amount + quoted;
            let max = self.config.params.max_block_trade_amount;
            if traded > max {
                return Err(MarketError::BlockTradeAmountExceeded { amount: traded, max });
            }
            self.global.current_block_trade_amount = traded;
        }

        let swap = self.pool.swap(sell, buy, amount, min_amount)?;

        // the AMM fee stays in the pool as tokens owed to LPs
        let supply = self.pool.total_supply();
        if supply > Decimal::ZERO {
            let growth = swap.fee / supply;
            match buy {
                VToken::Base => self.global.total_base_fees_growth += growth,
                VToken::Quote => self.global.total_quote_fees_growth += growth,
            }
        }

        let (quote_delta, base_delta) = match direction {
            Side::Long => (-amount, swap.amount_out),
            Side::Short => (swap.amount_out, -amount),
        };

        Ok((quote_delta, base_delta))
    }

    // 3.2.2: perp trading fee, credited to LPs per token
    fn charge_trading_fee(&mut self, quote_delta: Decimal) -> Quote {
        let supply = self.pool.total_supply();
        if supply.is_zero() {
            return Quote::zero();
        }
        let fee = quote_delta.abs() * self.pool.fee_rate();
        self.global.total_trading_fees_growth += fee / supply;
        Quote::new(fee)
    }

    // 3.2.3: reduce against the side of the exposure. a long sells `amount` base,
    // a short spends `amount` quote buying base back. never flips the side.
    pub(crate) fn reduce_exposure(
        &mut self,
        exposure: Exposure,
        amount: Decimal,
        min_amount: Decimal,
        is_liquidation: bool,
    ) -> Result<(Exposure, Reduction), MarketError> {
        let size = exposure.position_size;
        let direction = match exposure.side() {
            Some(side) => side.opposite(),
            None => return Err(MarketError::ZeroAmount),
        };

        match direction {
            Side::Short => {
                if amount > size {
                    return Err(MarketError::AttemptReversePosition { amount, size });
                }
            }
            Side::Long => {
                let bought = self.pool.get_dy(VToken::Quote, amount)?.amount_out;
                if bought > size.abs() + DUST_THRESHOLD {
                    return Err(MarketError::AttemptReversePosition { amount: bought, size });
                }
            }
        }

        let (quote_delta, base_delta) = self.swap_exposure(direction, amount, min_amount, is_liquidation)?;
        let ratio = (base_delta.abs() / size.abs()).min(Decimal::ONE);
        let released = exposure.open_notional * ratio;
        let trading_fee = self.charge_trading_fee(quote_delta);

        let after = Exposure::new(exposure.open_notional - released, size + base_delta);
        let reduction = Reduction {
            quote_delta,
            base_delta,
            released,
            trading_fee,
            pnl: Quote::new(quote_delta + released).sub(trading_fee),
        };
        Ok((after, reduction))
    }

    // 3.2.5: residuals of at most DUST_THRESHOLD base move to the house position
    pub(crate) fn sweep_dust(&mut self, exposure: Exposure) -> (Exposure, Option<Exposure>) {
        let size = exposure.position_size.abs();
        if size.is_zero() || size > DUST_THRESHOLD {
            return (exposure, None);
        }
        self.dust = self.dust.add(exposure);
        (Exposure::default(), Some(exposure))
    }

    // 3.2.4: extend when flat or on the same side, reduce otherwise
    pub(crate) fn change_position(
        &mut self,
        account: AccountId,
        amount: Decimal,
        min_amount: Decimal,
        direction: Side,
        is_liquidation: bool,
    ) -> Result<TradeOutcome, MarketError> {
        let funding = self.settle_trader(account);
        let mut position = self
            .traders
            .get(&account)
            .cloned()
            .unwrap_or_else(|| TraderPosition::new(self.global.cum_funding_rate));
        let before = position.exposure();
        let is_extend = before.side().map_or(true, |side| side == direction);

        let mut outcome = if is_extend {
            let (quote_delta, base_delta) = self.swap_exposure(direction, amount, min_amount, is_liquidation)?;
            let trading_fee = self.charge_trading_fee(quote_delta);
            let insurance_fee = Quote::new(quote_delta.abs() * self.config.params.insurance_fee);
            let after = before.add(Exposure::new(quote_delta, base_delta));

            let max = self.config.params.max_position_size;
            if !is_liquidation && after.position_size.abs() > max {
                return Err(MarketError::MaxPositionSizeExceeded {
                    size: after.position_size.abs(),
                    max,
                });
            }

            TradeOutcome {
                direction,
                is_extend,
                quote_delta,
                base_delta,
                trading_fee,
                insurance_fee,
                pnl: trading_fee.negate(),
                funding,
                dust: None,
                position_after: after,
            }
        } else {
            let (after, reduction) = self.reduce_exposure(before, amount, min_amount, is_liquidation)?;
            TradeOutcome {
                direction,
                is_extend,
                quote_delta: reduction.quote_delta,
                base_delta: reduction.base_delta,
                trading_fee: reduction.trading_fee,
                insurance_fee: Quote::zero(),
                pnl: reduction.pnl,
                funding,
                dust: None,
                position_after: after,
            }
        };

        if !outcome.is_extend {
            let (after, dust) = self.sweep_dust(outcome.position_after);
            outcome.position_after = after;
            outcome.dust = dust;
        }

        self.global.track_exposure(before.position_size, outcome.position_after.position_size);
        if outcome.position_after.is_zero() {
            self.traders.remove(&account);
        } else {
            position.set_exposure(outcome.position_after);
            self.traders.insert(account, position);
        }

        tracing::debug!(
            market = self.id.0,
            account = account.0,
            %direction,
            quote = %outcome.quote_delta,
            base = %outcome.base_delta,
            "position changed"
        );
        Ok(outcome)
    }

    // 3.2.6: close fully, then open the other side. both legs run or neither does.
    pub(crate) fn open_reverse_position(
        &mut self,
        account: AccountId,
        close_amount: Decimal,
        close_min_amount: Decimal,
        open_amount: Decimal,
        open_min_amount: Decimal,
        direction: Side,
    ) -> Result<(TradeOutcome, TradeOutcome), MarketError> {
        let current = self
            .traders
            .get(&account)
            .and_then(TraderPosition::side)
            .ok_or(MarketError::NoPosition(account))?;
        if current == direction {
            return Err(MarketError::AttemptReversePosition {
                amount: open_amount,
                size: self.traders.get(&account).map_or(Decimal::ZERO, |p| p.position_size),
            });
        }

        let close = self.change_position(account, close_amount, close_min_amount, direction, false)?;
        if !close.position_after.is_zero() {
            return Err(MarketError::PositionNotClosed {
                remaining: close.position_after.position_size,
            });
        }
        let open = self.change_position(account, open_amount, open_min_amount, direction, false)?;
        Ok((close, open))
    }

    // 3.2.7: amount that brings `exposure` back to flat
    pub fn proposed_amount_for(&self, exposure: Exposure) -> Result<Decimal, MarketError> {
        match exposure.side() {
            None => Ok(Decimal::ZERO),
            Some(Side::Long) => Ok(exposure.position_size),
            Some(Side::Short) => Ok(self.pool.get_dx(VToken::Base, exposure.position_size.abs())?),
        }
    }

    pub fn proposed_amount_to_close(&self, account: AccountId) -> Result<Decimal, MarketError> {
        let position = self.traders.get(&account).ok_or(MarketError::NoPosition(account))?;
        self.proposed_amount_for(position.exposure())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::MarketError;
    use crate::position::Exposure;
    use crate::types::Side;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    #[test]
    fn test_open_long() {
        let mut market = seeded_market();
        let outcome = market
            .change_position(ALICE, dec!(100), Decimal::ZERO, Side::Long, false)
            .unwrap();

        assert!(outcome.is_extend);
        assert_eq!(outcome.quote_delta, dec!(-100));
        assert!(outcome.base_delta > Decimal::ZERO && outcome.base_delta < dec!(100));
        assert_eq!(outcome.trading_fee.value(), dec!(0.1));
        assert_eq!(outcome.insurance_fee.value(), dec!(0.1));

        let position = market.trader_position(ALICE).unwrap();
        assert_eq!(position.open_notional, dec!(-100));
        assert_eq!(position.position_size, outcome.base_delta);
        assert_eq!(market.global_position().trader_longs, outcome.base_delta);
    }

    #[test]
    fn test_open_then_close_long() {
        let mut market = seeded_market();
        let open = market
            .change_position(ALICE, dec!(100), Decimal::ZERO, Side::Long, false)
            .unwrap();

        let amount = market.proposed_amount_to_close(ALICE).unwrap();
        assert_eq!(amount, open.base_delta);

        let close = market
            .change_position(ALICE, amount, Decimal::ZERO, Side::Short, false)
            .unwrap();
        assert!(!close.is_extend);
        assert!(close.position_after.is_zero());
        assert!(!market.is_position_open(ALICE));
        assert!(market.trader_position(ALICE).is_none());
        assert_eq!(market.global_position().trader_longs, Decimal::ZERO);
        // round trip costs fees
        assert!(close.pnl.is_negative());
    }

    #[test]
    fn test_close_short_with_proposed_amount() {
        let mut market = seeded_market();
        market
            .change_position(ALICE, dec!(50), Decimal::ZERO, Side::Short, false)
            .unwrap();

        let amount = market.proposed_amount_to_close(ALICE).unwrap();
        market
            .change_position(ALICE, amount, Decimal::ZERO, Side::Long, false)
            .unwrap();
        assert!(!market.is_position_open(ALICE));
        assert_eq!(market.global_position().trader_shorts, Decimal::ZERO);
    }

    #[test]
    fn test_long_cannot_be_reversed() {
        let mut market = seeded_market();
        let open = market
            .change_position(ALICE, dec!(100), Decimal::ZERO, Side::Long, false)
            .unwrap();

        let result = market.change_position(ALICE, open.base_delta + dec!(1), Decimal::ZERO, Side::Short, false);
        assert!(matches!(result, Err(MarketError::AttemptReversePosition { .. })));
    }

    #[test]
    fn test_short_cannot_be_reversed() {
        let mut market = seeded_market();
        market
            .change_position(ALICE, dec!(50), Decimal::ZERO, Side::Short, false)
            .unwrap();

        let result = market.change_position(ALICE, dec!(60), Decimal::ZERO, Side::Long, false);
        assert!(matches!(result, Err(MarketError::AttemptReversePosition { .. })));
    }

    #[test]
    fn test_partial_reduce_releases_notional() {
        let mut market = seeded_market();
        let open = market
            .change_position(ALICE, dec!(100), Decimal::ZERO, Side::Long, false)
            .unwrap();
        let half = open.base_delta / dec!(2);

        let reduce = market
            .change_position(ALICE, half, Decimal::ZERO, Side::Short, false)
            .unwrap();
        let position = market.trader_position(ALICE).unwrap();

        assert_eq!(reduce.base_delta, -half);
        assert!((position.open_notional + dec!(50)).abs() < dec!(0.000000001));
        assert!((position.position_size - half).abs() < dec!(0.000000001));
    }

    #[test]
    fn test_dust_swept_to_house() {
        let mut market = seeded_market();
        let open = market
            .change_position(ALICE, dec!(100), Decimal::ZERO, Side::Long, false)
            .unwrap();

        let outcome = market
            .change_position(ALICE, open.base_delta - dec!(0.05), Decimal::ZERO, Side::Short, false)
            .unwrap();

        let dust = outcome.dust.unwrap();
        assert_eq!(dust.position_size, dec!(0.05));
        assert!(!market.is_position_open(ALICE));
        assert_eq!(market.dust_position(), dust);
        assert_eq!(market.global_position().trader_longs, Decimal::ZERO);
    }

    #[test]
    fn test_block_trade_cap() {
        let mut market = seeded_market();
        let mut params = market.params().clone();
        params.max_block_trade_amount = dec!(150);
        market.set_params(params).unwrap();

        market
            .change_position(ALICE, dec!(100), Decimal::ZERO, Side::Long, false)
            .unwrap();
        let result = market.change_position(BOB, dec!(100), Decimal::ZERO, Side::Long, false);
        assert!(matches!(result, Err(MarketError::BlockTradeAmountExceeded { .. })));

        // liquidations bypass the cap
        market
            .change_position(BOB, dec!(100), Decimal::ZERO, Side::Long, true)
            .unwrap();
    }

    #[test]
    fn test_max_position_size() {
        let mut market = seeded_market();
        let mut params = market.params().clone();
        params.max_position_size = dec!(50);
        market.set_params(params).unwrap();

        let result = market.change_position(ALICE, dec!(100), Decimal::ZERO, Side::Long, false);
        assert!(matches!(result, Err(MarketError::MaxPositionSizeExceeded { .. })));
    }

    #[test]
    fn test_slippage_propagates() {
        let mut market = seeded_market();
        let result = market.change_position(ALICE, dec!(100), dec!(100), Side::Long, false);
        assert!(matches!(result, Err(MarketError::Pool(_))));
    }

    #[test]
    fn test_open_reverse_position() {
        let mut market = seeded_market();
        market
            .change_position(ALICE, dec!(100), Decimal::ZERO, Side::Long, false)
            .unwrap();
        let close_amount = market.proposed_amount_to_close(ALICE).unwrap();

        let (close, open) = market
            .open_reverse_position(ALICE, close_amount, Decimal::ZERO, dec!(40), Decimal::ZERO, Side::Short)
            .unwrap();

        assert!(close.position_after.is_zero());
        assert!(open.is_extend);
        assert_eq!(market.trader_position(ALICE).unwrap().position_size, dec!(-40));
    }

    #[test]
    fn test_proposed_amount_flat() {
        let market = seeded_market();
        assert_eq!(market.proposed_amount_for(Exposure::default()).unwrap(), Decimal::ZERO);
        assert!(matches!(
            market.proposed_amount_to_close(ALICE),
            Err(MarketError::NoPosition(_))
        ));
    }
}
