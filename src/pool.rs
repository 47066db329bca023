// 9.0 pool.rs: the AMM pool adapter. the core only talks to the AmmPool trait.
// ConstantProductPool is the reference pool used by the simulation and tests.

use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::VToken;

/// Result of a swap. `fee` is denominated in the bought token and stays in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapOutcome {
    pub amount_out: Decimal,
    pub fee: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("Amount must be positive")]
    ZeroAmount,

    #[error("Cannot swap {0:?} for itself")]
    SameToken(VToken),

    #[error("Pool holds no liquidity")]
    EmptyPool,

    #[error("Insufficient pool liquidity: requested {requested}, available {available}")]
    InsufficientLiquidity { requested: Decimal, available: Decimal },

    #[error("Slippage: minimum {minimum}, actual {actual}")]
    Slippage { minimum: Decimal, actual: Decimal },

    #[error("Invalid LP amount {requested}, total supply {supply}")]
    InvalidLpAmount { requested: Decimal, supply: Decimal },
}

// Anything that can hold the two virtual tokens of a market and trade them.
// the core never assumes a particular curve. it only reads prices, balances
// and fee rates, and executes swaps and liquidity changes through this trait.
pub trait AmmPool: Send + Sync {
    fn name(&self) -> &str;

    /// Pool balances indexed by `VToken::index`.
    fn balances(&self) -> [Decimal; 2];

    fn balance(&self, token: VToken) -> Decimal {
        self.balances()[token.index()]
    }

    /// Outstanding LP token supply.
    fn total_supply(&self) -> Decimal;

    /// Fraction of every swap output retained by the pool.
    fn fee_rate(&self) -> Decimal;

    /// Spot price, quote per base.
    fn last_price(&self) -> Result<Decimal, PoolError>;

    /// Quote a swap without executing it.
    fn get_dy(&self, sell: VToken, amount_in: Decimal) -> Result<SwapOutcome, PoolError>;

    /// Amount of the other token to sell to receive exactly `amount_out` of `buy`.
    fn get_dx(&self, buy: VToken, amount_out: Decimal) -> Result<Decimal, PoolError>;

    fn swap(
        &mut self,
        sell: VToken,
        buy: VToken,
        amount_in: Decimal,
        min_out: Decimal,
    ) -> Result<SwapOutcome, PoolError>;

    /// Deposit `[quote, base]`, returns LP tokens minted.
    fn add_liquidity(&mut self, amounts: [Decimal; 2], min_lp_out: Decimal) -> Result<Decimal, PoolError>;

    /// Burn LP tokens, returns `[quote, base]` withdrawn.
    fn remove_liquidity(&mut self, lp_in: Decimal, min_amounts: [Decimal; 2]) -> Result<[Decimal; 2], PoolError>;

    fn clone_box(&self) -> Box<dyn AmmPool>;
}

impl Clone for Box<dyn AmmPool> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

// need to implement Debug manually since trait objects don't auto derive
impl fmt::Debug for Box<dyn AmmPool> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AmmPool({}, balances {:?})", self.name(), self.balances())
    }
}

// x * y = k pool. the fee is taken from the output side and left in the pool,
// so k grows with every trade and LPs earn it through their pool share.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstantProductPool {
    name: String,
    balances: [Decimal; 2],
    total_supply: Decimal,
    fee_rate: Decimal,
}

impl ConstantProductPool {
    pub fn new(name: &str, fee_rate: Decimal) -> Self {
        debug_assert!(fee_rate >= Decimal::ZERO && fee_rate < Decimal::ONE);
        Self {
            name: name.to_string(),
            balances: [Decimal::ZERO; 2],
            total_supply: Decimal::ZERO,
            fee_rate,
        }
    }

    fn reserves(&self, sell: VToken) -> Result<(Decimal, Decimal), PoolError> {
        let x = self.balances[sell.index()];
        let y = self.balances[sell.other().index()];
        if x.is_zero() || y.is_zero() {
            return Err(PoolError::EmptyPool);
        }
        Ok((x, y))
    }
}

impl AmmPool for ConstantProductPool {
    fn name(&self) -> &str {
        &self.name
    }

    fn balances(&self) -> [Decimal; 2] {
        self.balances
    }

    fn total_supply(&self) -> Decimal {
        self.total_supply
    }

    fn fee_rate(&self) -> Decimal {
        self.fee_rate
    }

    fn last_price(&self) -> Result<Decimal, PoolError> {
        let (base, quote) = self.reserves(VToken::Base)?;
        Ok(quote / base)
    }

    fn get_dy(&self, sell: VToken, amount_in: Decimal) -> Result<SwapOutcome, PoolError> {
        if amount_in <= Decimal::ZERO {
            return Err(PoolError::ZeroAmount);
        }
        let (x, y) = self.reserves(sell)?;
        let gross = y * amount_in / (x + amount_in);
        let fee = gross * self.fee_rate;
        Ok(SwapOutcome {
            amount_out: gross - fee,
            fee,
        })
    }

    fn get_dx(&self, buy: VToken, amount_out: Decimal) -> Result<Decimal, PoolError> {
        if amount_out <= Decimal::ZERO {
            return Err(PoolError::ZeroAmount);
        }
        let (x, y) = self.reserves(buy.other())?;
        let gross = amount_out / (Decimal::ONE - self.fee_rate);
        if gross >= y {
            return Err(PoolError::InsufficientLiquidity {
                requested: gross,
                available: y,
            });
        }
        Ok(x * gross / (y - gross))
    }

    fn swap(
        &mut self,
        sell: VToken,
        buy: VToken,
        amount_in: Decimal,
        min_out: Decimal,
    ) -> Result<SwapOutcome, PoolError> {
        if sell == buy {
            return Err(PoolError::SameToken(sell));
        }
        let outcome = self.get_dy(sell, amount_in)?;
        if outcome.amount_out < min_out {
            return Err(PoolError::Slippage {
                minimum: min_out,
                actual: outcome.amount_out,
            });
        }
        self.balances[sell.index()] += amount_in;
        self.balances[buy.index()] -= outcome.amount_out;
        Ok(outcome)
    }

    fn add_liquidity(&mut self, amounts: [Decimal; 2], min_lp_out: Decimal) -> Result<Decimal, PoolError> {
        let [quote, base] = amounts;
        if quote < Decimal::ZERO || base < Decimal::ZERO || (quote.is_zero() && base.is_zero()) {
            return Err(PoolError::ZeroAmount);
        }

        let minted = if self.total_supply.is_zero() {
            // first deposit sets the price, so both sides are required
            if quote.is_zero() || base.is_zero() {
                return Err(PoolError::ZeroAmount);
            }
            (quote * base).sqrt().ok_or(PoolError::ZeroAmount)?
        } else {
            let (pool_quote, pool_base) = self.reserves(VToken::Quote)?;
            let share = (quote / pool_quote).min(base / pool_base);
            share * self.total_supply
        };

        if minted <= Decimal::ZERO {
            return Err(PoolError::ZeroAmount);
        }
        if minted < min_lp_out {
            return Err(PoolError::Slippage {
                minimum: min_lp_out,
                actual: minted,
            });
        }

        self.balances[VToken::Quote.index()] += quote;
        self.balances[VToken::Base.index()] += base;
        self.total_supply += minted;
        Ok(minted)
    }

    fn remove_liquidity(&mut self, lp_in: Decimal, min_amounts: [Decimal; 2]) -> Result<[Decimal; 2], PoolError> {
        if lp_in <= Decimal::ZERO || lp_in > self.total_supply {
            return Err(PoolError::InvalidLpAmount {
                requested: lp_in,
                supply: self.total_supply,
            });
        }

        let share = lp_in / self.total_supply;
        let withdrawn = [self.balances[0] * share, self.balances[1] * share];
        for (amount, minimum) in withdrawn.iter().zip(min_amounts.iter()) {
            if amount < minimum {
                return Err(PoolError::Slippage {
                    minimum: *minimum,
                    actual: *amount,
                });
            }
        }

        self.balances[0] -= withdrawn[0];
        self.balances[1] -= withdrawn[1];
        self.total_supply -= lp_in;
        Ok(withdrawn)
    }

    fn clone_box(&self) -> Box<dyn AmmPool> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn seeded_pool() -> ConstantProductPool {
        let mut pool = ConstantProductPool::new("EUR/USD", dec!(0.001));
        pool.add_liquidity([dec!(10_000), dec!(10_000)], Decimal::ZERO).unwrap();
        pool
    }

    #[test]
    fn test_first_deposit_mints_geometric_mean() {
        let mut pool = ConstantProductPool::new("EUR/USD", dec!(0.001));
        let minted = pool.add_liquidity([dec!(400), dec!(100)], Decimal::ZERO).unwrap();

        assert_eq!(minted, dec!(200));
        assert_eq!(pool.last_price().unwrap(), dec!(4));
    }

    #[test]
    fn test_first_deposit_needs_both_sides() {
        let mut pool = ConstantProductPool::new("EUR/USD", dec!(0.001));
        let result = pool.add_liquidity([dec!(400), Decimal::ZERO], Decimal::ZERO);
        assert!(matches!(result, Err(PoolError::ZeroAmount)));
    }

    #[test]
    fn test_swap_keeps_fee_in_pool() {
        let mut pool = seeded_pool();
        let outcome = pool.swap(VToken::Quote, VToken::Base, dec!(100), Decimal::ZERO).unwrap();

        assert!(outcome.fee > Decimal::ZERO);
        assert!(outcome.amount_out < dec!(100));
        // k only grows
        let k = pool.balance(VToken::Quote) * pool.balance(VToken::Base);
        assert!(k > dec!(100_000_000));
    }

    #[test]
    fn test_swap_slippage() {
        let mut pool = seeded_pool();
        let result = pool.swap(VToken::Quote, VToken::Base, dec!(100), dec!(100));
        assert!(matches!(result, Err(PoolError::Slippage { .. })));
        // state untouched on failure
        assert_eq!(pool.balance(VToken::Quote), dec!(10_000));
    }

    #[test]
    fn test_get_dx_inverts_get_dy() {
        let pool = seeded_pool();
        let dx = pool.get_dx(VToken::Base, dec!(50)).unwrap();
        let outcome = pool.get_dy(VToken::Quote, dx).unwrap();

        let diff = (outcome.amount_out - dec!(50)).abs();
        assert!(diff < dec!(0.000000001));
    }

    #[test]
    fn test_proportional_deposit_and_withdrawal() {
        let mut pool = seeded_pool();
        let minted = pool.add_liquidity([dec!(1000), dec!(1000)], Decimal::ZERO).unwrap();
        assert_eq!(minted, dec!(1000));

        let withdrawn = pool.remove_liquidity(minted, [Decimal::ZERO; 2]).unwrap();
        assert_eq!(withdrawn, [dec!(1000), dec!(1000)]);
        assert_eq!(pool.total_supply(), dec!(10_000));
    }

    #[test]
    fn test_remove_more_than_supply() {
        let mut pool = seeded_pool();
        let result = pool.remove_liquidity(dec!(20_000), [Decimal::ZERO; 2]);
        assert!(matches!(result, Err(PoolError::InvalidLpAmount { .. })));
    }

    #[test]
    fn test_boxed_pool_clones_state() {
        let pool: Box<dyn AmmPool> = Box::new(seeded_pool());
        let mut copy = pool.clone();
        copy.swap(VToken::Base, VToken::Quote, dec!(10), Decimal::ZERO).unwrap();

        assert_eq!(pool.balance(VToken::Base), dec!(10_000));
        assert_eq!(copy.balance(VToken::Base), dec!(10_010));
    }
}
