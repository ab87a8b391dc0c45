//! Publish decision
//!
//! Decides after each pass whether the committed set goes out now. Only
//! committed txs (non-defi txs and members of admitted bridge batches) can
//! justify a publish; provisional bridge members never do.

use super::admission::AdmissionContext;
use super::state::SchedulerState;
use crate::{PublishTrigger, RollupTimeouts};

impl SchedulerState {
    pub(crate) fn publish_trigger(
        &self,
        flush: bool,
        budget_exhausted: bool,
        timeouts: &RollupTimeouts,
        ctx: &AdmissionContext<'_>,
    ) -> Option<PublishTrigger> {
        if self.committed_count() == 0 {
            return None;
        }
        if flush {
            return Some(PublishTrigger::Flush);
        }
        if self.committed_count() == ctx.config.max_txs() {
            return Some(PublishTrigger::CapacityReached);
        }
        if budget_exhausted {
            return Some(PublishTrigger::BudgetExhausted);
        }
        if self.timed_out(timeouts) {
            return Some(PublishTrigger::Timeout);
        }
        if self.pooled_gas_credit() >= self.max_capacity_cost(ctx) {
            return Some(PublishTrigger::Profitable);
        }
        None
    }

    /// Whether the oldest committed tx was created before the last base deadline
    fn timed_out(&self, timeouts: &RollupTimeouts) -> bool {
        match (timeouts.base_timeout, self.oldest_committed()) {
            (Some(timeout), Some(oldest)) => oldest < timeout.deadline,
            _ => false,
        }
    }

    /// Cost of publishing the committed set in a maximum-capacity rollup
    ///
    /// Own gas of every committed tx, the base slot gas of every slot left
    /// empty, and the full cost of every admitted bridge call.
    pub(crate) fn max_capacity_cost(&self, ctx: &AdmissionContext<'_>) -> u64 {
        let own_gas = self
            .committed_txs()
            .fold(0u64, |acc, tx| acc.saturating_add(ctx.costs.gas_for(tx.kind)));
        let empty_slots = ctx.config.max_txs().saturating_sub(self.committed_count()) as u64;
        let padding = empty_slots.saturating_mul(ctx.costs.base_slot_gas());
        let bridges = self
            .batches
            .values()
            .filter(|b| b.admitted)
            .fold(0u64, |acc, b| acc.saturating_add(b.full_cost_at_admission));
        own_gas.saturating_add(padding).saturating_add(bridges)
    }
}
