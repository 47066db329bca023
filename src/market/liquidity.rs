// 3.3 market/liquidity.rs: LP deposits and withdrawals.
// an LP's ledger starts at minus what it supplied. whatever the pool hands back on removal is
// netted against it, and the difference is the implicit position the LP took as counterparty.

use super::{Market, MarketError, Reduction};
use crate::position::{Exposure, LiquidityProviderPosition};
use crate::types::{AccountId, Quote, Side, Timestamp, VToken};
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub struct LiquidityProvision {
    pub liquidity_minted: Decimal,
    pub funding: Quote,
    pub trading_fees: Quote,
    // earned AMM fee tokens paid out in quote
    pub fee_credit: Quote,
}

impl LiquidityProvision {
    pub fn settlement(&self) -> Quote {
        self.funding.add(self.trading_fees).add(self.fee_credit)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiquidityRemoval {
    pub liquidity_burned: Decimal,
    // pool tokens received, fee tokens included
    pub quote_amount: Decimal,
    pub base_amount: Decimal,
    pub funding: Quote,
    pub trading_fees: Quote,
    pub fee_credit: Quote,
    pub reduction: Option<Reduction>,
    // pnl realized on the implicit position
    pub realized_pnl: Quote,
    pub dust: Option<Exposure>,
    pub position_after: Exposure,
}

impl LiquidityRemoval {
    pub fn settlement(&self) -> Quote {
        self.funding
            .add(self.trading_fees)
            .add(self.fee_credit)
            .add(self.realized_pnl)
    }
}

impl Market {
    // 3.3.1: fee tokens an LP earned are paid in quote and stand in for part of the new deposit
    pub(crate) fn provide_liquidity(
        &mut self,
        account: AccountId,
        amounts: [Decimal; 2],
        min_lp_amount: Decimal,
        now: Timestamp,
    ) -> Result<LiquidityProvision, MarketError> {
        let [quote, base] = amounts;
        if quote <= Decimal::ZERO || base <= Decimal::ZERO {
            return Err(MarketError::ZeroAmount);
        }
        let provided = self.global.total_quote_provided + quote;
        let max = self.config.params.max_liquidity_provided;
        if provided > max {
            return Err(MarketError::MaxLiquidityProvided { requested: provided, max });
        }

        let settled = self.settle_lp(account);
        let mut lp = self.lps.get(&account).cloned().unwrap_or_default();

        let [fee_quote, fee_base] = lp.earned_fee_tokens(&self.global, lp.liquidity_balance);
        let supplied = [quote - fee_quote, base - fee_base];
        if supplied.iter().any(|amount| *amount <= Decimal::ZERO) {
            return Err(MarketError::InvalidLiquidityAmount {
                requested: quote,
                balance: lp.liquidity_balance,
            });
        }
        let fee_credit = if fee_base.is_zero() {
            Quote::new(fee_quote)
        } else {
            Quote::new(fee_quote + fee_base * self.market_price()?)
        };

        let minted = self.pool.add_liquidity(supplied, min_lp_amount)?;

        lp.open_notional -= quote;
        lp.position_size -= base;
        lp.liquidity_balance += minted;
        lp.deposit_time = now;
        lp.snapshot_growth(&self.global);
        self.lps.insert(account, lp);

        self.global.total_quote_provided += quote;
        self.global.total_base_provided += base;

        tracing::debug!(market = self.id.0, account = account.0, %minted, "liquidity provided");
        Ok(LiquidityProvision {
            liquidity_minted: minted,
            funding: settled.funding,
            trading_fees: settled.trading_fees,
            fee_credit,
        })
    }

    // 3.3.2: burn `amount` LP tokens, net them against the ledger, then optionally trade the
    // implicit position down with `proposed_amount`. after a partial burn whatever is left
    // stays on the ledger. a full burn has to close the position.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn remove_liquidity(
        &mut self,
        account: AccountId,
        amount: Decimal,
        min_vtoken_amounts: [Decimal; 2],
        proposed_amount: Decimal,
        min_amount: Decimal,
        is_liquidation: bool,
        now: Timestamp,
    ) -> Result<LiquidityRemoval, MarketError> {
        let balance = self
            .lps
            .get(&account)
            .map(|lp| lp.liquidity_balance)
            .ok_or(MarketError::NoLiquidityPosition(account))?;
        if amount <= Decimal::ZERO || amount > balance {
            return Err(MarketError::InvalidLiquidityAmount {
                requested: amount,
                balance,
            });
        }

        let settled = self.settle_lp(account);
        let mut lp = self
            .lps
            .get(&account)
            .cloned()
            .ok_or(MarketError::NoLiquidityPosition(account))?;

        let lock_period = self.config.params.lock_period;
        if !is_liquidation && lp.is_locked(now, lock_period) {
            return Err(MarketError::LiquidityLocked {
                unlock_at: lp.deposit_time.plus_secs(lock_period),
            });
        }

        let price = self.market_price()?;
        let [fee_quote, fee_base] = lp.earned_fee_tokens(&self.global, amount);
        let withdrawn = self.pool.remove_liquidity(amount, min_vtoken_amounts)?;
        let fee_quote = fee_quote.max(Decimal::ZERO).min(withdrawn[0]);
        let fee_base = fee_base.max(Decimal::ZERO).min(withdrawn[1]);
        let fee_credit = Quote::new(fee_quote + fee_base * price);

        // split the ledger into the slice backing the burned tokens and the rest
        let ratio = amount / balance;
        let ledger = lp.exposure();
        let slice = ledger.scale(ratio);
        let rest = ledger.add(slice.scale(-Decimal::ONE));
        let mut implicit = slice.add(Exposure::new(withdrawn[0] - fee_quote, withdrawn[1] - fee_base));

        let mut realized_pnl = Quote::zero();
        let mut reduction = None;
        if !proposed_amount.is_zero() && !implicit.position_size.is_zero() {
            let (after, reduced) = self.reduce_exposure(implicit, proposed_amount, min_amount, is_liquidation)?;
            implicit = after;
            realized_pnl = realized_pnl.add(reduced.pnl);
            reduction = Some(reduced);
        }

        // a flat base leg leaves pure quote: realize it
        if implicit.position_size.is_zero() {
            realized_pnl = realized_pnl.add(Quote::new(implicit.open_notional));
            implicit = Exposure::default();
        }
        let (implicit, dust) = self.sweep_dust(implicit);

        let position_after = rest.add(implicit);
        // no liquidity would be left to close a residual with
        if amount == balance && !is_liquidation && !position_after.is_zero() {
            return Err(MarketError::PositionNotClosed {
                remaining: position_after.position_size,
            });
        }
        lp.set_exposure(position_after);
        lp.liquidity_balance -= amount;
        if lp.is_empty() {
            self.lps.remove(&account);
        } else {
            self.lps.insert(account, lp);
        }

        self.global.total_quote_provided = (self.global.total_quote_provided - withdrawn[0]).max(Decimal::ZERO);
        self.global.total_base_provided = (self.global.total_base_provided - withdrawn[1]).max(Decimal::ZERO);

        tracing::debug!(market = self.id.0, account = account.0, burned = %amount, "liquidity removed");
        Ok(LiquidityRemoval {
            liquidity_burned: amount,
            quote_amount: withdrawn[0],
            base_amount: withdrawn[1],
            funding: settled.funding,
            trading_fees: settled.trading_fees,
            fee_credit,
            reduction,
            realized_pnl,
            dust,
            position_after,
        })
    }

    // 3.3.3: the LP's exposure if it pulled all of its liquidity right now, fee tokens excluded
    pub fn lp_position_after_withdrawal(&self, account: AccountId) -> Result<Exposure, MarketError> {
        let lp = self.lps.get(&account).ok_or(MarketError::NoLiquidityPosition(account))?;
        let [quote, base] = self.lp_withdrawable(lp);
        let [fee_quote, fee_base] = lp.earned_fee_tokens(&self.global, lp.liquidity_balance);
        Ok(lp.exposure().add(Exposure::new(quote - fee_quote, base - fee_base)))
    }

    // 3.3.4: implicit position marked at `price`, plus everything pending settlement
    pub fn lp_unrealized_pnl(&self, account: AccountId, price: Decimal) -> Result<Quote, MarketError> {
        let lp = self.lps.get(&account).ok_or(MarketError::NoLiquidityPosition(account))?;
        let position = self.lp_position_after_withdrawal(account)?;
        let [fee_quote, fee_base] = lp.earned_fee_tokens(&self.global, lp.liquidity_balance);

        Ok(position
            .unrealized_pnl(price)
            .add(Quote::new(fee_quote + fee_base * price))
            .add(lp.pending_funding(&self.global))
            .add(lp.pending_trading_fees(&self.global)))
    }

    pub fn lp_debt(&self, account: AccountId) -> Quote {
        self.lps.get(&account).map_or(Quote::zero(), |lp| {
            crate::margin::lp_debt(lp.open_notional, self.config.params.lp_debt_coefficient)
        })
    }

    // 3.3.5: quoted against the pool as it will be once the LP's liquidity is out
    pub fn lp_proposed_amount_to_close(&self, account: AccountId) -> Result<Decimal, MarketError> {
        let lp = self.lps.get(&account).ok_or(MarketError::NoLiquidityPosition(account))?;
        let position = self.lp_position_after_withdrawal(account)?;
        match position.side() {
            None => Ok(Decimal::ZERO),
            Some(Side::Long) => Ok(position.position_size),
            Some(Side::Short) => {
                let mut pool = self.pool.clone();
                pool.remove_liquidity(lp.liquidity_balance, [Decimal::ZERO; 2])?;
                Ok(pool.get_dx(VToken::Base, position.position_size.abs())?)
            }
        }
    }

    fn lp_withdrawable(&self, lp: &LiquidityProviderPosition) -> [Decimal; 2] {
        let supply = self.pool.total_supply();
        if supply.is_zero() {
            return [Decimal::ZERO; 2];
        }
        let share = lp.liquidity_balance / supply;
        let balances = self.pool.balances();
        [balances[0] * share, balances[1] * share]
    }
}
