//! Rollup Production Module
//!
//! This module wires the coordinator into a running service:
//! - LocalRollupBuilder / LocalAggregator: in-process inner and outer rollups
//! - PublishTimeManager: epoch-aligned publish deadlines
//! - RollupPipeline: polling loop from the pending pool to the coordinator

mod engine;
mod trigger;
pub mod orchestrator;

pub use engine::{LocalAggregator, LocalRollupBuilder};
pub use orchestrator::{PipelineControl, PipelineStatus, RollupPipeline};
pub use trigger::PublishTimeManager;
