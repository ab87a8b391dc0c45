//! Rollup Pipeline Module
//!
//! This module implements the orchestration layer that connects the pending
//! pool to the coordinator. It runs a background loop that periodically hands
//! every pending transaction to the coordinator and removes whatever a
//! published rollup included.
//!
//! # Architecture Flow
//! 1. Wait for the poll interval (or shutdown)
//! 2. Pull first-class and second-class txs from `PendingPool`
//! 3. Call `Coordinator::process_pending_txs` (with a pending flush request)
//! 4. Drop published txs from the pool and record the profile
//! 5. After a collaborator failure start over with a fresh coordinator

use crate::{
    Collaborators, Coordinator, PendingTxSource, RollupProfile,
    config::{CoordinatorConfig, PipelineConfig},
    coordinator::Lifecycle,
    error::CoordinatorError,
    pool::PendingPool,
};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Snapshot of the pipeline exposed through the API
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub lifecycle: Lifecycle,
    pub rollups_published: u64,
    pub pending_first_class: usize,
    pub pending_second_class: usize,
    /// Profile returned by the most recent coordinator call
    pub last_profile: Option<RollupProfile>,
}

impl Default for PipelineStatus {
    fn default() -> Self {
        Self {
            lifecycle: Lifecycle::Idle,
            rollups_published: 0,
            pending_first_class: 0,
            pending_second_class: 0,
            last_profile: None,
        }
    }
}

/// Shared control surface of a running pipeline
#[derive(Default)]
pub struct PipelineControl {
    flush: AtomicBool,
    status: RwLock<PipelineStatus>,
    shutdown: CancellationToken,
}

impl PipelineControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish whatever is committed on the next round
    pub fn request_flush(&self) {
        self.flush.store(true, Ordering::SeqCst);
    }

    pub async fn status(&self) -> PipelineStatus {
        self.status.read().await.clone()
    }

    /// Stop the loop after the round in progress
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub(crate) fn take_flush(&self) -> bool {
        self.flush.swap(false, Ordering::SeqCst)
    }
}

/// Rollup pipeline
///
/// Owns the coordinator and drives it from the pending pool.
pub struct RollupPipeline {
    /// Pending transactions (validated API submissions)
    pool: Arc<PendingPool>,
    coordinator: Coordinator,
    /// Kept to rebuild the coordinator after a failed round
    coordinator_config: CoordinatorConfig,
    collaborators: Collaborators,
    control: Arc<PipelineControl>,
    config: PipelineConfig,
}

impl RollupPipeline {
    /// Creates a new rollup pipeline
    ///
    /// # Arguments
    /// * `pool` - Shared reference to the pending pool
    /// * `coordinator_config` - Rollup shape and limits
    /// * `collaborators` - Oracles, builder, aggregator and publisher
    /// * `control` - Flush, status and shutdown shared with the API
    /// * `config` - Poll interval
    pub fn new(
        pool: Arc<PendingPool>,
        coordinator_config: CoordinatorConfig,
        collaborators: Collaborators,
        control: Arc<PipelineControl>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            pool,
            coordinator: Coordinator::new(coordinator_config.clone(), collaborators.clone()),
            coordinator_config,
            collaborators,
            control,
            config,
        }
    }

    /// Run the polling loop until shutdown
    ///
    /// On shutdown the coordinator is interrupted so no further rollup is
    /// started.
    pub async fn start(mut self) -> anyhow::Result<()> {
        info!(
            "Rollup pipeline starting: {} inner x {} outer txs, poll every {}ms",
            self.coordinator_config.num_inner_rollup_txs,
            self.coordinator_config.num_outer_rollup_proofs,
            self.config.poll_interval_ms
        );
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            tokio::select! {
                _ = self.control.shutdown.cancelled() => break,
                _ = sleep(poll_interval) => {}
            }

            if !self.poll_once().await {
                break;
            }
        }

        if let Err(e) = self.coordinator.interrupt(true) {
            debug!("Interrupt on shutdown: {}", e);
        }
        self.refresh_status(None).await;
        info!("Rollup pipeline stopped");
        Ok(())
    }

    /// Run one round, consuming a pending flush request
    ///
    /// Returns false once the coordinator can no longer be driven.
    async fn poll_once(&mut self) -> bool {
        let flush = self.control.take_flush();
        match self.run_round(flush).await {
            Ok(profile) if profile.published => {
                info!(
                    "Rollup published with {} txs ({:?})",
                    profile.total_txs, profile.trigger
                );
            }
            Ok(profile) => {
                debug!("Holding {} txs for the next rollup", profile.total_txs);
            }
            Err(CoordinatorError::Collaborator(e)) => {
                warn!("Rollup round failed, starting over: {:?}", e);
                // The flush still applies to the fresh coordinator
                if flush {
                    self.control.request_flush();
                }
                self.coordinator =
                    Coordinator::new(self.coordinator_config.clone(), self.collaborators.clone());
            }
            Err(e) => {
                warn!("Coordinator stopped: {}", e);
                return false;
            }
        }
        true
    }

    /// One coordinator call over the current pool contents
    pub async fn run_round(&mut self, flush: bool) -> Result<RollupProfile, CoordinatorError> {
        let first_class = self.pool.pending_txs(self.pool.pending_count().await).await;
        let second_class = self
            .pool
            .second_class_txs(self.pool.second_class_count().await)
            .await;

        let profile = self
            .coordinator
            .process_pending_txs(&first_class, &second_class, flush)
            .await?;

        if profile.published {
            let removed = self.pool.remove(&profile.tx_ids).await;
            debug!("Removed {} published txs from the pool", removed);
        }
        self.refresh_status(Some(profile.clone())).await;
        Ok(profile)
    }

    async fn refresh_status(&self, profile: Option<RollupProfile>) {
        let pending_first_class = self.pool.pending_count().await;
        let pending_second_class = self.pool.second_class_count().await;
        let mut status = self.control.status.write().await;
        status.lifecycle = self.coordinator.lifecycle();
        status.pending_first_class = pending_first_class;
        status.pending_second_class = pending_second_class;
        if let Some(profile) = profile {
            if profile.published {
                status.rollups_published += 1;
            }
            status.last_profile = Some(profile);
        }
    }
}
