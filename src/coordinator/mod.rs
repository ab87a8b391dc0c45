//! Rollup Coordination Module
//!
//! This module implements the coordinator that packs pending transactions into
//! rollups under gas, call-data, capacity and bridge profitability limits:
//! - Ordering: defi claims ahead of everything else
//! - Admission: single pass with chain, resource and bridge checks
//! - Publish decision: flush, capacity, budget, timeout or pooled credit
//! - Commit: build inner groups, aggregate, publish
//!
//! Second-class transactions only ever fill space in a rollup that is already
//! going out.

mod admission;
mod coordinator;
mod interrupt;
mod ordering;
mod publish;
mod state;


pub use coordinator::Coordinator;
pub use interrupt::{InterruptHandle, Lifecycle};
pub use state::{BridgeBatch, SchedulerState};
