//! Single-pass admission
//!
//! Walks the ordered candidates once and decides, for each, whether it is
//! committed, held provisionally in a bridge batch, or left for a later pass.
//! None of this suspends: the oracles are plain synchronous calls.

use super::ordering::order_candidates;
use super::state::{HeldTx, SchedulerState};
use crate::{
    BridgeCallData, Commitment, CostOracle, BridgeOracle, PendingTx, TxKind,
    config::CoordinatorConfig,
};
use std::collections::HashSet;
use tracing::{debug, info};

/// Borrowed view of the configuration and oracles used during a pass
pub(crate) struct AdmissionContext<'a> {
    pub config: &'a CoordinatorConfig,
    pub costs: &'a dyn CostOracle,
    pub bridges: &'a dyn BridgeOracle,
}

impl AdmissionContext<'_> {
    fn group_of(&self, position: usize) -> usize {
        position / self.config.num_inner_rollup_txs
    }
}

/// Why a candidate was not committed in this pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rejection {
    /// Consumes the output of a pending tx that is not committed
    ChainBroken,
    /// Would land in a different inner group than the tx it consumes
    GroupBoundary,
    OverCapacity,
    OverGas,
    OverCallData,
    TooManyAssets,
    MissingBridgeCallData,
    /// Bridge batch already holds `batch_size` members
    BridgeFull,
    /// Bridge lost the race for a bridge call slot in this rollup
    BridgeRejected,
    /// Second-class txs only join bridge batches that are already admitted
    BridgeNotAdmitted,
}

/// Where an accepted candidate ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    Committed,
    Provisional,
    /// Its arrival admitted the whole bridge batch
    Admitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Pending,
    Admitted,
    Dropped,
}

/// Which totals a resource check is made against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Budget {
    /// Committed and provisional txs, used by the first-class pass
    Held,
    /// Only what will actually be published, used by the second-class fill
    Publishable,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct PassOutcome {
    /// The publishable set alone leaves no room for any further candidate
    pub budget_exhausted: bool,
}

/// Cost of the cheapest candidate that could still be admitted
struct ResourceFloor {
    gas: u64,
    call_data: u64,
}

impl ResourceFloor {
    fn new(costs: &dyn CostOracle) -> Self {
        let gas = TxKind::ALL.iter().map(|k| costs.gas_for(*k)).min().unwrap_or(0);
        let call_data = TxKind::ALL
            .iter()
            .map(|k| costs.call_data_for(*k))
            .min()
            .unwrap_or(0);
        Self { gas, call_data }
    }
}

impl SchedulerState {
    /// Run the admission pass over first-class candidates
    pub(crate) fn admit_first_class(
        &mut self,
        candidates: &[PendingTx],
        pending_outputs: &HashSet<Commitment>,
        ctx: &AdmissionContext<'_>,
    ) -> PassOutcome {
        self.refresh_bridge_batches(ctx);

        let floor = ResourceFloor::new(ctx.costs);
        for tx in order_candidates(candidates) {
            if self.is_exhausted(&floor, Budget::Held, ctx) {
                debug!(
                    "Rollup budget exhausted with {} txs held, stopping pass",
                    self.held_count()
                );
                break;
            }
            if self.contains(&tx.id) {
                continue;
            }
            match self.admit_one(tx, pending_outputs, ctx) {
                Ok(placement) => debug!("Tx {:?} accepted: {:?}", tx.id, placement),
                Err(rejection) => debug!("Tx {:?} not committed this pass: {:?}", tx.id, rejection),
            }
        }

        // Provisional members fill the budget but never justify a publish
        PassOutcome {
            budget_exhausted: self.is_exhausted(&floor, Budget::Publishable, ctx),
        }
    }

    /// Append second-class candidates into capacity the publishable block leaves unused
    ///
    /// Returns how many were committed.
    pub(crate) fn fill_second_class(
        &mut self,
        candidates: &[PendingTx],
        pending_outputs: &HashSet<Commitment>,
        ctx: &AdmissionContext<'_>,
    ) -> usize {
        let mut added = 0;
        for tx in candidates {
            if self.committed_count() >= ctx.config.max_txs() {
                break;
            }
            if self.contains(&tx.id) {
                continue;
            }
            match self.fill_one(tx, pending_outputs, ctx) {
                Ok(()) => added += 1,
                Err(rejection) => debug!("Second-class tx {:?} skipped: {:?}", tx.id, rejection),
            }
        }
        added
    }

    /// Give second-class fills back after a rollup that was not published
    pub(crate) fn undo_second_class_fill(&mut self, count: usize) {
        for _ in 0..count {
            self.uncommit_last();
        }
    }

    /// Re-evaluate every unadmitted bridge batch against fresh oracle answers
    fn refresh_bridge_batches(&mut self, ctx: &AdmissionContext<'_>) {
        for bridge_call_data in self.batch_order.clone() {
            if self.try_admit(bridge_call_data, ctx) == Admission::Admitted {
                debug!("Bridge {} admitted on refresh", bridge_call_data);
            }
        }
    }

    fn is_exhausted(
        &self,
        floor: &ResourceFloor,
        budget: Budget,
        ctx: &AdmissionContext<'_>,
    ) -> bool {
        let (count, gas, call_data) = self.usage(budget);
        let remaining_gas = ctx.config.max_gas_for_rollup.saturating_sub(gas);
        let remaining_call_data = ctx.config.call_data_per_rollup.saturating_sub(call_data);
        count >= ctx.config.max_txs()
            || remaining_gas < floor.gas
            || remaining_call_data < floor.call_data
    }

    /// Tx count, gas and call data charged against `budget`
    fn usage(&self, budget: Budget) -> (usize, u64, u64) {
        match budget {
            Budget::Held => (self.held_count(), self.total_gas(), self.total_call_data()),
            Budget::Publishable => (
                self.committed_count(),
                self.committed_gas(),
                self.committed_call_data(),
            ),
        }
    }

    fn admit_one(
        &mut self,
        tx: &PendingTx,
        pending_outputs: &HashSet<Commitment>,
        ctx: &AdmissionContext<'_>,
    ) -> Result<Placement, Rejection> {
        let held = self.price(tx, ctx)?;
        match tx.kind {
            TxKind::DefiDeposit => self.admit_defi_deposit(held, pending_outputs, ctx),
            TxKind::Transfer
            | TxKind::Deposit
            | TxKind::WithdrawHighGas
            | TxKind::WithdrawToWallet
            | TxKind::Account
            | TxKind::DefiClaim => {
                self.check_chain(tx, Some(self.committed_count()), pending_outputs, ctx)?;
                self.check_resources(&held, Budget::Held, ctx)?;
                self.commit(held);
                Ok(Placement::Committed)
            }
        }
    }

    fn fill_one(
        &mut self,
        tx: &PendingTx,
        pending_outputs: &HashSet<Commitment>,
        ctx: &AdmissionContext<'_>,
    ) -> Result<(), Rejection> {
        let held = self.price(tx, ctx)?;
        self.check_chain(tx, Some(self.committed_count()), pending_outputs, ctx)?;
        self.check_resources(&held, Budget::Publishable, ctx)?;
        match tx.kind {
            TxKind::DefiDeposit => {
                let bridge_call_data = tx.bridge().ok_or(Rejection::MissingBridgeCallData)?;
                let batch_size = ctx
                    .bridges
                    .config_of(bridge_call_data.bridge_address_id())
                    .batch_size as usize;
                let batch = self
                    .batches
                    .get_mut(&bridge_call_data)
                    .filter(|b| b.admitted)
                    .ok_or(Rejection::BridgeNotAdmitted)?;
                if batch.members.len() >= batch_size {
                    return Err(Rejection::BridgeFull);
                }
                batch.members.push(tx.id);
                batch.accumulated_gas_credit =
                    batch.accumulated_gas_credit.saturating_add(tx.declared_gas);
                self.commit(held);
            }
            TxKind::Transfer
            | TxKind::Deposit
            | TxKind::WithdrawHighGas
            | TxKind::WithdrawToWallet
            | TxKind::Account
            | TxKind::DefiClaim => self.commit(held),
        }
        Ok(())
    }

    /// Gas and call data a candidate is charged against the rollup budgets
    fn price(&self, tx: &PendingTx, ctx: &AdmissionContext<'_>) -> Result<HeldTx, Rejection> {
        let own_gas = ctx.costs.gas_for(tx.kind);
        let gas = match tx.kind {
            TxKind::DefiDeposit => {
                let bridge_call_data = tx.bridge().ok_or(Rejection::MissingBridgeCallData)?;
                own_gas.saturating_add(ctx.costs.single_bridge_share(bridge_call_data))
            }
            TxKind::Transfer
            | TxKind::Deposit
            | TxKind::WithdrawHighGas
            | TxKind::WithdrawToWallet
            | TxKind::Account
            | TxKind::DefiClaim => own_gas,
        };
        Ok(HeldTx {
            tx: tx.clone(),
            gas,
            call_data: ctx.costs.call_data_for(tx.kind),
            fee_paying: ctx.costs.is_fee_paying_asset(tx.fee_asset_id),
        })
    }

    /// Check the tx a candidate consumes from.
    ///
    /// `landing` is the committed position the candidate would take, or `None`
    /// while it is only held provisionally.
    fn check_chain(
        &self,
        tx: &PendingTx,
        landing: Option<usize>,
        pending_outputs: &HashSet<Commitment>,
        ctx: &AdmissionContext<'_>,
    ) -> Result<(), Rejection> {
        let Some(consumed) = tx.consumed_commitment else {
            return Ok(());
        };
        if let Some(producer) = self.producer_position(&consumed) {
            if let Some(landing) = landing {
                if ctx.group_of(producer) != ctx.group_of(landing) {
                    return Err(Rejection::GroupBoundary);
                }
            }
            return Ok(());
        }
        // The producer is pending somewhere but not committed. An unknown
        // producer has already been settled.
        if self.provisional_outputs.contains(&consumed) || pending_outputs.contains(&consumed) {
            return Err(Rejection::ChainBroken);
        }
        Ok(())
    }

    fn check_resources(
        &self,
        held: &HeldTx,
        budget: Budget,
        ctx: &AdmissionContext<'_>,
    ) -> Result<(), Rejection> {
        let (count, gas, call_data) = self.usage(budget);
        if count + 1 > ctx.config.max_txs() {
            return Err(Rejection::OverCapacity);
        }
        if gas.saturating_add(held.gas) > ctx.config.max_gas_for_rollup {
            return Err(Rejection::OverGas);
        }
        if call_data.saturating_add(held.call_data) > ctx.config.call_data_per_rollup {
            return Err(Rejection::OverCallData);
        }
        if held.fee_paying
            && !self.uses_asset(held.tx.fee_asset_id)
            && self.distinct_assets() >= ctx.config.number_of_assets
        {
            return Err(Rejection::TooManyAssets);
        }
        Ok(())
    }

    fn admit_defi_deposit(
        &mut self,
        held: HeldTx,
        pending_outputs: &HashSet<Commitment>,
        ctx: &AdmissionContext<'_>,
    ) -> Result<Placement, Rejection> {
        let bridge_call_data = held.tx.bridge().ok_or(Rejection::MissingBridgeCallData)?;
        if self.rejected_bridges.contains(&bridge_call_data) {
            return Err(Rejection::BridgeRejected);
        }

        let admitted = self.batch(&bridge_call_data).is_some_and(|b| b.admitted);
        let landing = admitted.then(|| self.committed_count());
        self.check_chain(&held.tx, landing, pending_outputs, ctx)?;
        self.check_resources(&held, Budget::Held, ctx)?;

        let batch_size = ctx
            .bridges
            .config_of(bridge_call_data.bridge_address_id())
            .batch_size as usize;
        let batch = self.batch_entry(bridge_call_data);
        if batch.members.len() >= batch_size {
            return Err(Rejection::BridgeFull);
        }
        batch.members.push(held.tx.id);
        batch.accumulated_gas_credit = batch.accumulated_gas_credit.saturating_add(held.tx.declared_gas);

        if admitted {
            self.commit(held);
            return Ok(Placement::Committed);
        }

        self.hold_provisional(held);
        match self.try_admit(bridge_call_data, ctx) {
            Admission::Admitted => Ok(Placement::Admitted),
            Admission::Pending => Ok(Placement::Provisional),
            Admission::Dropped => Err(Rejection::BridgeRejected),
        }
    }

    /// Admit a bridge batch if its pooled credit plus any usable subsidy covers
    /// the full bridge cost.
    ///
    /// On admission the members move into the committed sequence in member
    /// order. Members whose producer sits in another inner group are ejected
    /// and do not count towards the credit.
    pub(crate) fn try_admit(
        &mut self,
        bridge_call_data: BridgeCallData,
        ctx: &AdmissionContext<'_>,
    ) -> Admission {
        let Some(batch) = self.batches.get(&bridge_call_data) else {
            return Admission::Pending;
        };
        if batch.admitted {
            return Admission::Admitted;
        }

        let full_cost = ctx.bridges.full_gas_cost(bridge_call_data);
        let subsidy = ctx.bridges.subsidy(bridge_call_data);
        let usable_subsidy =
            if subsidy.gas > 0 && self.subsidy_locks.is_available(&subsidy, bridge_call_data) {
                subsidy.gas
            } else {
                0
            };

        let base = self.committed_count();
        let mut kept = Vec::new();
        let mut ejected = Vec::new();
        let mut kept_credit = 0u64;
        for id in &batch.members {
            let Some(member) = self.provisional.get(id) else {
                continue;
            };
            let landing = base + kept.len();
            let crosses_group = member
                .tx
                .consumed_commitment
                .and_then(|consumed| self.producer_position(&consumed))
                .is_some_and(|producer| ctx.group_of(producer) != ctx.group_of(landing));
            if crosses_group {
                ejected.push(*id);
            } else {
                kept_credit = kept_credit.saturating_add(member.tx.declared_gas);
                kept.push(*id);
            }
        }

        if kept_credit.saturating_add(usable_subsidy) < full_cost {
            return Admission::Pending;
        }

        if self.admitted_bridge_count() >= ctx.config.number_of_bridge_calls {
            info!(
                "No bridge call slot left for bridge {}, dropping its {} txs from this rollup",
                bridge_call_data,
                batch.members.len()
            );
            self.drop_batch(bridge_call_data);
            return Admission::Dropped;
        }

        if usable_subsidy > 0 {
            self.subsidy_locks.claim(&subsidy, bridge_call_data);
        }
        for id in &ejected {
            self.release_provisional(id);
            debug!("Tx {:?} ejected from bridge {}: {:?}", id, bridge_call_data, Rejection::GroupBoundary);
        }
        for id in &kept {
            if let Some(member) = self.release_provisional(id) {
                self.commit(member);
            }
        }

        if let Some(batch) = self.batches.get_mut(&bridge_call_data) {
            batch.members = kept;
            batch.accumulated_gas_credit = kept_credit;
            batch.admitted = true;
            batch.full_cost_at_admission = full_cost;
            batch.claimed_subsidy = usable_subsidy;
            info!(
                "Bridge {} admitted with {} txs (credit {}, subsidy {}, full cost {})",
                bridge_call_data,
                batch.members.len(),
                kept_credit,
                usable_subsidy,
                full_cost
            );
        }
        Admission::Admitted
    }
}
