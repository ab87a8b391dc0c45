//! Rollup Registry Module
//!
//! This module provides a database registry for published rollups and the
//! publisher that settles rollups into it.

mod database;
mod publisher;

pub use database::{RollupRecord, RollupRegistry};
pub use publisher::RegistryPublisher;
