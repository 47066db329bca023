// vamm-perps: perpetual futures on a virtual AMM.
// traders take exposure against a pool of virtual tokens, LPs are the counterparty.
// all computation is deterministic, time and prices come in from the caller.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: MarketId, AccountId, Side, VToken, Quote, Timestamp
//   3.x  market/: one market: pool, global accumulators, trader and LP ledgers
//   4.x  position.rs: exposure, trader, LP and global position records
//   5.x  funding.rs: TWAPs and funding rate math
//   6.x  insurance.rs: insurance fund and bad debt
//   6.5  liquidation.rs: reward split, seizure eligibility
//   7.x  config.rs: governance parameters and their bounds
//   8.x  clearing_house/: orchestration, margin checks, liquidations, governance
//   9.x  pool.rs: AMM pool trait and the constant product pool
//   10.x oracle.rs, vault.rs: prices and collateral
//   11.x events.rs: state transition events for audit
//   margin.rs: cross-market margin formula

// core modules
pub mod clearing_house;
pub mod funding;
pub mod market;
pub mod position;
pub mod types;

// risk modules
pub mod insurance;
pub mod liquidation;
pub mod margin;

// collaborators
pub mod config;
pub mod events;
pub mod oracle;
pub mod pool;
pub mod vault;

// re exports for convenience
pub use clearing_house::*;
pub use events::*;
pub use market::*;
pub use position::*;
pub use types::*;
pub use config::{ClearingHouseParams, ConfigError, MarketParams, DUST_THRESHOLD};
pub use insurance::InsuranceFund;
pub use liquidation::{calculate_liquidation_reward, LiquidationReward};
pub use margin::{MarginSnapshot, MarginStatus};
pub use oracle::{OracleError, PriceOracle, RoundData};
pub use pool::{AmmPool, ConstantProductPool, PoolError, SwapOutcome};
pub use vault::{CollateralToken, Vault, VaultError};
