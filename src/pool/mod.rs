//! Transaction Pool Module
//!
//! This module manages transactions waiting to be rolled up:
//! - First-class transactions, which can trigger a rollup
//! - Second-class transactions, which only fill leftover space

mod tx_pool;

pub use tx_pool::PendingPool;
