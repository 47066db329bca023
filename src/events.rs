// 11.0: every state change produces an event. the log is the audit trail of the clearing house
// and is part of the rollback snapshot, so a failed call leaves no trace in it.

use crate::types::{AccountId, CollateralId, MarketId, Quote, Side, SignedSize, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    // Collateral events
    Deposit(DepositEvent),
    Withdrawal(WithdrawalEvent),

    // Funding events
    TwapUpdated(TwapUpdatedEvent),
    FundingRateUpdated(FundingRateUpdatedEvent),
    FundingPaid(FundingPaidEvent),

    // Trading events
    PositionChanged(PositionChangedEvent),
    DustGenerated(DustGeneratedEvent),

    // Liquidity events
    LiquidityProvided(LiquidityProvidedEvent),
    LiquidityRemoved(LiquidityRemovedEvent),

    // Risk events
    LiquidationCall(LiquidationCallEvent),
    SeizeCollateral(SeizeCollateralEvent),
    InsuranceFunded(InsuranceFundedEvent),

    // Governance
    ParameterUpdated(ParameterUpdatedEvent),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositEvent {
    pub account_id: AccountId,
    pub token: CollateralId,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalEvent {
    pub account_id: AccountId,
    pub token: CollateralId,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwapUpdatedEvent {
    pub market_id: MarketId,
    pub oracle_twap: Decimal,
    pub market_twap: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingRateUpdatedEvent {
    pub market_id: MarketId,
    pub funding_rate: Decimal,
    pub cum_funding_rate: Decimal,
    pub cum_funding_per_lp_token: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingPaidEvent {
    pub market_id: MarketId,
    pub account_id: AccountId,
    pub amount: Quote, // positive = received
    pub is_trader: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionChangedEvent {
    pub market_id: MarketId,
    pub account_id: AccountId,
    pub direction: Side,
    pub added_open_notional: Decimal,
    pub added_position_size: Decimal,
    pub trading_fee: Quote,
    pub insurance_fee: Quote,
    pub realized_pnl: Quote,
    pub is_liquidation: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DustGeneratedEvent {
    pub market_id: MarketId,
    pub account_id: AccountId,
    pub position_size: SignedSize,
    pub open_notional: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityProvidedEvent {
    pub market_id: MarketId,
    pub account_id: AccountId,
    pub quote_amount: Decimal,
    pub base_amount: Decimal,
    pub liquidity_minted: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityRemovedEvent {
    pub market_id: MarketId,
    pub account_id: AccountId,
    pub liquidity_burned: Decimal,
    pub quote_amount: Decimal,
    pub base_amount: Decimal,
    pub realized_pnl: Quote,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationCallEvent {
    pub market_id: MarketId,
    pub liquidatee: AccountId,
    pub liquidator: AccountId,
    pub notional: Quote,
    pub liquidator_reward: Quote,
    pub insurance_reward: Quote,
    pub is_trader: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeizeCollateralEvent {
    pub liquidatee: AccountId,
    pub liquidator: AccountId,
    pub debt: Quote,
    pub paid_by_liquidator: Quote,
    pub covered_by_insurance: Quote,
    pub bad_debt: Quote,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsuranceFundedEvent {
    pub amount: Quote,
    pub new_balance: Quote,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterUpdatedEvent {
    pub market_id: Option<MarketId>,
    pub name: String,
}

// Bounded append-only log. oldest events drop off once `capacity` is hit.
#[derive(Debug, Clone, PartialEq)]
pub struct EventLog {
    events: Vec<Event>,
    next_id: u64,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Vec::new(),
            next_id: 1,
            capacity,
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn last(&self) -> Option<&Event> {
        self.events.last()
    }

    pub fn record(&mut self, timestamp: Timestamp, payload: EventPayload) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        self.events.push(Event::new(id, timestamp, payload));

        if self.events.len() > self.capacity {
            let excess = self.events.len() - self.capacity;
            self.events.drain(0..excess);
        }
        id
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn deposit(amount: Decimal) -> EventPayload {
        EventPayload::Deposit(DepositEvent {
            account_id: AccountId(1),
            token: CollateralId::QUOTE,
            amount,
        })
    }

    #[test]
    fn event_log_assigns_sequential_ids() {
        let mut log = EventLog::new(10);

        let first = log.record(Timestamp::from_secs(1000), deposit(dec!(10000)));
        let second = log.record(Timestamp::from_secs(1001), deposit(dec!(5)));

        assert_eq!(first, EventId(1));
        assert_eq!(second, EventId(2));
        assert_eq!(log.len(), 2);

        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn event_log_drops_oldest_past_capacity() {
        let mut log = EventLog::new(2);
        for i in 0..5 {
            log.record(Timestamp::from_secs(i), deposit(Decimal::from(i)));
        }

        assert_eq!(log.len(), 2);
        assert_eq!(log.events()[0].id, EventId(4));
        assert_eq!(log.last().map(|e| e.id), Some(EventId(5)));
    }

    #[test]
    fn liquidation_reward_split_is_visible() {
        let call = LiquidationCallEvent {
            market_id: MarketId(0),
            liquidatee: AccountId(42),
            liquidator: AccountId(99),
            notional: Quote::new(dec!(1000)),
            liquidator_reward: Quote::new(dec!(7.5)),
            insurance_reward: Quote::new(dec!(7.5)),
            is_trader: true,
        };

        let total = call.liquidator_reward.add(call.insurance_reward);
        assert_eq!(total.value(), dec!(15));
    }
}
