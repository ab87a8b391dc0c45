//! Local Oracles
//!
//! Config-backed implementations of the cost and bridge oracles:
//! - FeeSchedule: per-kind gas and call data from the `[costs]` table
//! - BridgeRegistry: bridge batch sizes and gas, with on-chain gas overrides
//!   and subsidies that can change at runtime

mod bridges;
mod fees;

pub use bridges::BridgeRegistry;
pub use fees::FeeSchedule;
