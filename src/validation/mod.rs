//! Transaction Validation Module
//!
//! This module validates submitted transactions before they enter the pool.
//! Checks bridge call data against the tx kind, commitments and duplicates.

mod validator;
pub use validator::Validator;
