//! This crate implements a rollup coordinator: the admission-control and
//! bin-packing scheduler that decides which pending transactions go into the
//! next rollup and when that rollup is published. It includes the coordinator
//! itself, its collaborator interfaces, local oracles and proof stand-ins, a
//! pending pool, a rollup registry and the service pipeline and API around it.

pub mod types; // Transactions, bridge call data, rollup profiles and proofs.
pub mod error; // Coordinator error type.
pub mod collaborators; // Interfaces to oracles, builder, aggregator and publisher.
pub mod config; // Defines and loads service configuration.
pub mod coordinator; // Admission, publish decision and commit of rollups.
pub mod oracle; // Cost and bridge oracles backed by configuration.
pub mod batch; // Local rollup building and the service pipeline.
pub mod pool; // Pending transaction pool.
pub mod validation; // Checks submitted transactions before pooling.
pub mod registry; // Persistent record of published rollups.
pub mod api; // JSON-RPC interface.

// Re-export commonly used types for easier access.
pub use types::*;
pub use collaborators::*;
pub use config::Config;
pub use coordinator::Coordinator;
pub use error::CoordinatorError;
