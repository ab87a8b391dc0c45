//! API Module
//!
//! This module handles the JSON-RPC API of the coordinator service.
//! Clients submit rollup transactions, request flushes and read status here.

mod server;
pub use server::{AppState, Server};
