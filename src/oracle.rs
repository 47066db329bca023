// Price Oracle
//
// Prices for every market's base asset and every non-quote collateral come through here.
// A feed is a sequence of rounds. a read fails when the latest round is too old, was never
// answered, or when the upstream sequencer is down or has not been up for the grace period.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{AssetId, Timestamp};

/// One answered round of a feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundData {
    pub round_id: u64,
    pub answer: Decimal,
    pub updated_at: Timestamp,
    /// Round in which the answer was computed. lower than `round_id` means carried over.
    pub answered_in_round: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceFeed {
    /// Max seconds between updates before the feed is stale
    pub heartbeat: i64,
    latest: Option<RoundData>,
}

impl PriceFeed {
    pub fn new(heartbeat: i64) -> Self {
        Self { heartbeat, latest: None }
    }

    pub fn latest(&self) -> Option<&RoundData> {
        self.latest.as_ref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencerStatus {
    pub is_up: bool,
    /// When the current status started
    pub since: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("No price feed for {0}")]
    UnknownAsset(AssetId),

    #[error("Feed for {asset} has no rounds")]
    NoData { asset: AssetId },

    #[error("Stale price for {asset}: {age}s old, heartbeat {heartbeat}s")]
    StalePrice { asset: AssetId, age: i64, heartbeat: i64 },

    #[error("Invalid round {round_id} for {asset}")]
    InvalidRound { asset: AssetId, round_id: u64 },

    #[error("Non-positive price {price} for {asset}")]
    InvalidPrice { asset: AssetId, price: Decimal },

    #[error("Sequencer is down")]
    SequencerDown,

    #[error("Sequencer grace period not over, {remaining}s remaining")]
    GracePeriodNotOver { remaining: i64 },
}

#[derive(Debug, Clone)]
pub struct PriceOracle {
    feeds: HashMap<AssetId, PriceFeed>,
    sequencer: Option<SequencerStatus>,
    grace_period: i64,
}

impl Default for PriceOracle {
    fn default() -> Self {
        Self::new(3600)
    }
}

impl PriceOracle {
    pub fn new(grace_period: i64) -> Self {
        Self {
            feeds: HashMap::new(),
            sequencer: None,
            grace_period,
        }
    }

    pub fn add_feed(&mut self, asset: AssetId, heartbeat: i64) {
        self.feeds.entry(asset).or_insert_with(|| PriceFeed::new(heartbeat));
    }

    pub fn set_heartbeat(&mut self, asset: &AssetId, heartbeat: i64) -> Result<(), OracleError> {
        let feed = self
            .feeds
            .get_mut(asset)
            .ok_or_else(|| OracleError::UnknownAsset(asset.clone()))?;
        feed.heartbeat = heartbeat;
        Ok(())
    }

    /// Push a fresh answered round.
    pub fn set_price(&mut self, asset: &AssetId, price: Decimal, now: Timestamp) -> Result<(), OracleError> {
        let feed = self
            .feeds
            .get_mut(asset)
            .ok_or_else(|| OracleError::UnknownAsset(asset.clone()))?;
        let round_id = feed.latest.as_ref().map_or(1, |r| r.round_id + 1);
        feed.latest = Some(RoundData {
            round_id,
            answer: price,
            updated_at: now,
            answered_in_round: round_id,
        });
        Ok(())
    }

    /// Replace the latest round wholesale. used to replay upstream data.
    pub fn submit_round(&mut self, asset: &AssetId, round: RoundData) -> Result<(), OracleError> {
        let feed = self
            .feeds
            .get_mut(asset)
            .ok_or_else(|| OracleError::UnknownAsset(asset.clone()))?;
        feed.latest = Some(round);
        Ok(())
    }

    /// Track an L2 sequencer. without one, the liveness check is skipped.
    pub fn set_sequencer_status(&mut self, is_up: bool, since: Timestamp) {
        self.sequencer = Some(SequencerStatus { is_up, since });
    }

    pub fn set_grace_period(&mut self, grace_period: i64) {
        self.grace_period = grace_period;
    }

    pub fn feed(&self, asset: &AssetId) -> Option<&PriceFeed> {
        self.feeds.get(asset)
    }

    // 10.1: price of one unit of `asset` in quote. a zero balance never needs a price,
    // so it skips every check and returns zero.
    pub fn get_price(&self, asset: &AssetId, balance_hint: Decimal, now: Timestamp) -> Result<Decimal, OracleError> {
        if balance_hint.is_zero() {
            return Ok(Decimal::ZERO);
        }

        self.check_sequencer(now)?;

        let feed = self
            .feeds
            .get(asset)
            .ok_or_else(|| OracleError::UnknownAsset(asset.clone()))?;
        let round = feed
            .latest
            .as_ref()
            .ok_or_else(|| OracleError::NoData { asset: asset.clone() })?;

        if round.answered_in_round < round.round_id {
            return Err(OracleError::InvalidRound {
                asset: asset.clone(),
                round_id: round.round_id,
            });
        }

        let age = now.seconds_since(round.updated_at);
        if age > feed.heartbeat {
            return Err(OracleError::StalePrice {
                asset: asset.clone(),
                age,
                heartbeat: feed.heartbeat,
            });
        }

        if round.answer <= Decimal::ZERO {
            return Err(OracleError::InvalidPrice {
                asset: asset.clone(),
                price: round.answer,
            });
        }

        Ok(round.answer)
    }

    fn check_sequencer(&self, now: Timestamp) -> Result<(), OracleError> {
        let Some(status) = self.sequencer else {
            return Ok(());
        };
        if !status.is_up {
            return Err(OracleError::SequencerDown);
        }
        let up_for = now.seconds_since(status.since);
        if up_for <= self.grace_period {
            return Err(OracleError::GracePeriodNotOver {
                remaining: self.grace_period - up_for,
            });
        }
        Ok(())
    }
}
