//! Rollup Coordinator
//!
//! Decides on each call which pending txs enter the next rollup, in what
//! order, and whether the rollup goes out now. When it does, the committed
//! txs are split into inner groups, built, aggregated and published.
//!
//! # Flow of one call
//! 1. Admission pass over first-class candidates (defi claims first)
//! 2. Publish decision
//! 3. Second-class fill into unused capacity
//! 4. Build each inner group, aggregate, publish
//! 5. Reset state once the publisher accepts the rollup

use super::admission::AdmissionContext;
use super::interrupt::{InterruptHandle, Lifecycle};
use super::state::SchedulerState;
use crate::{
    BridgeCallData, Collaborators, Commitment, PendingTx, RollupProfile,
    config::CoordinatorConfig, error::CoordinatorError,
};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Stateful admission-control and bin-packing scheduler for rollups
pub struct Coordinator {
    config: CoordinatorConfig,
    collaborators: Collaborators,
    state: SchedulerState,
    interrupt: InterruptHandle,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig, collaborators: Collaborators) -> Self {
        let interrupt = InterruptHandle::new(
            collaborators.builder.clone(),
            collaborators.aggregator.clone(),
        );
        Self {
            config,
            collaborators,
            state: SchedulerState::default(),
            interrupt,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.interrupt.lifecycle()
    }

    /// Handle that can interrupt this coordinator from another task
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    pub fn interrupt(&self, should_throw: bool) -> Result<(), CoordinatorError> {
        self.interrupt.interrupt(should_throw)
    }

    /// Select pending txs into the next rollup and publish it if it is ready
    ///
    /// # Arguments
    /// * `first_class` - Candidates that may trigger a publish
    /// * `second_class` - Filler candidates, only used once a publish is decided
    /// * `flush` - Publish whatever is committed, if anything
    ///
    /// # Returns
    /// The profile of the published rollup, or of the held state when nothing
    /// was published. Collaborator errors pass through unchanged and leave the
    /// state as it was at the point of failure.
    pub async fn process_pending_txs(
        &mut self,
        first_class: &[PendingTx],
        second_class: &[PendingTx],
        flush: bool,
    ) -> Result<RollupProfile, CoordinatorError> {
        self.interrupt.ensure_running()?;

        let ctx = AdmissionContext {
            config: &self.config,
            costs: self.collaborators.costs.as_ref(),
            bridges: self.collaborators.bridges.as_ref(),
        };
        let pending_outputs: HashSet<Commitment> = first_class
            .iter()
            .chain(second_class)
            .map(|tx| tx.output_commitment)
            .collect();

        let outcome = self.state.admit_first_class(first_class, &pending_outputs, &ctx);

        let committed: Vec<PendingTx> = self.state.committed_txs().cloned().collect();
        let timeouts = self.collaborators.deadlines.last_timeouts(&committed);
        let Some(trigger) =
            self.state
                .publish_trigger(flush, outcome.budget_exhausted, &timeouts, &ctx)
        else {
            debug!(
                "Rollup not ready: {} committed, {} provisional, credit {} of {}",
                self.state.committed_count(),
                self.state.provisional_count(),
                self.state.pooled_gas_credit(),
                self.state.max_capacity_cost(&ctx)
            );
            return Ok(self.state.pending_profile());
        };

        let filled = self.state.fill_second_class(second_class, &pending_outputs, &ctx);
        info!(
            "Publishing rollup ({:?}): {} txs ({} second-class), {} bridge calls",
            trigger,
            self.state.committed_count(),
            filled,
            self.state.admitted_bridge_count()
        );

        let profile = RollupProfile {
            published: true,
            total_txs: self.state.committed_count(),
            total_gas: self.state.committed_gas(),
            total_call_data: self.state.committed_call_data(),
            tx_ids: self.state.committed_txs().map(|tx| tx.id).collect(),
            trigger: Some(trigger),
        };

        if self.commit().await? {
            self.state = SchedulerState::default();
            Ok(profile)
        } else {
            warn!("Publisher rejected the rollup, keeping {} txs", profile.total_txs);
            self.state.undo_second_class_fill(filled);
            Ok(self.state.pending_profile())
        }
    }

    /// Build, aggregate and publish the committed txs
    async fn commit(&self) -> Result<bool, CoordinatorError> {
        let txs: Vec<PendingTx> = self.state.committed_txs().cloned().collect();
        let mut bridge_call_datas: Vec<BridgeCallData> =
            Vec::with_capacity(self.config.number_of_bridge_calls);
        let mut asset_ids = Vec::new();

        let mut groups = Vec::new();
        for chunk in txs.chunks(self.config.num_inner_rollup_txs) {
            let group = self
                .interrupt
                .run(self.collaborators.builder.build(
                    chunk,
                    &mut bridge_call_datas,
                    &mut asset_ids,
                ))
                .await?;
            debug!("Built inner rollup {:?} with {} txs", group.digest, group.tx_ids.len());
            groups.push(group);
        }
        bridge_call_datas.resize(self.config.number_of_bridge_calls, BridgeCallData::ZERO);

        let proof = self
            .interrupt
            .run(
                self.collaborators
                    .aggregator
                    .aggregate(groups, bridge_call_datas, asset_ids),
            )
            .await?;

        self.interrupt.begin_publishing()?;
        let published = self.collaborators.publisher.publish(proof).await;
        self.interrupt.finish_publishing();
        Ok(published?)
    }
}
