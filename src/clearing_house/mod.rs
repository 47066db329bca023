// 8.0: the clearing house. the only caller allowed to mutate markets, the vault and the insurance fund.
// every public mutator runs as one unit of work: refresh funding, act, check margin, commit or roll back.

mod config;
mod core;
mod governance;
mod liquidations;
mod liquidity;
mod margin;
mod results;
mod trading;

pub use config::ClearingHouseConfig;
pub use core::ClearingHouse;
pub use results::{ClearingHouseError, LiquidationResult, SeizureResult};
