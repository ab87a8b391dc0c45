//! Scheduler State
//!
//! Everything the coordinator accumulates between calls until a rollup is
//! published. Committed txs live in an arena (`committed`) indexed by output
//! commitment, so chain checks are reverse lookups rather than graph walks.

use crate::{
    AssetId, BridgeAddressId, BridgeCallData, BridgeSubsidy, Commitment, PendingTx, RollupProfile,
    TxId,
};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

/// A tx held by the scheduler together with the resources it was charged
#[derive(Debug, Clone)]
pub(crate) struct HeldTx {
    pub tx: PendingTx,
    pub gas: u64,
    pub call_data: u64,
    pub fee_paying: bool,
}

/// Txs sharing one bridge call data
#[derive(Debug, Clone)]
pub struct BridgeBatch {
    pub bridge_call_data: BridgeCallData,
    pub members: Vec<TxId>,
    pub accumulated_gas_credit: u64,
    pub admitted: bool,
    pub full_cost_at_admission: u64,
    pub claimed_subsidy: u64,
}

impl BridgeBatch {
    fn new(bridge_call_data: BridgeCallData) -> Self {
        Self {
            bridge_call_data,
            members: Vec::new(),
            accumulated_gas_credit: 0,
            admitted: false,
            full_cost_at_admission: 0,
            claimed_subsidy: 0,
        }
    }
}

/// Subsidy claims for the rollup being built, keyed by `(bridge_address_id, criteria)`
#[derive(Debug, Clone, Default)]
pub(crate) struct SubsidyLocks {
    claims: HashMap<(BridgeAddressId, u64), BridgeCallData>,
}

impl SubsidyLocks {
    pub fn is_available(&self, subsidy: &BridgeSubsidy, claimant: BridgeCallData) -> bool {
        match self.claims.get(&(subsidy.bridge_address_id, subsidy.criteria)) {
            Some(owner) => *owner == claimant,
            None => true,
        }
    }

    pub fn claim(&mut self, subsidy: &BridgeSubsidy, claimant: BridgeCallData) {
        self.claims
            .entry((subsidy.bridge_address_id, subsidy.criteria))
            .or_insert(claimant);
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }
}

/// Scheduling state persisted across coordinator calls
///
/// Reset to `Default` exactly once, right after a successful publish.
#[derive(Debug, Clone, Default)]
pub struct SchedulerState {
    /// Publishable txs in block order
    pub(crate) committed: Vec<HeldTx>,
    /// Members of bridge batches that are not admitted yet
    pub(crate) provisional: HashMap<TxId, HeldTx>,
    pub(crate) output_positions: HashMap<Commitment, usize>,
    pub(crate) provisional_outputs: HashSet<Commitment>,
    pub(crate) batches: HashMap<BridgeCallData, BridgeBatch>,
    /// Bridge call data in first-seen order
    pub(crate) batch_order: Vec<BridgeCallData>,
    /// Bridges that lost the race for a bridge call slot in this rollup
    pub(crate) rejected_bridges: HashSet<BridgeCallData>,
    pub(crate) subsidy_locks: SubsidyLocks,
    held_ids: HashSet<TxId>,
    asset_usage: HashMap<AssetId, usize>,
    committed_gas: u64,
    committed_call_data: u64,
    provisional_gas: u64,
    provisional_call_data: u64,
}

impl SchedulerState {
    pub fn is_empty(&self) -> bool {
        self.held_ids.is_empty() && self.batches.is_empty() && self.rejected_bridges.is_empty()
    }

    pub fn contains(&self, id: &TxId) -> bool {
        self.held_ids.contains(id)
    }

    pub fn committed_count(&self) -> usize {
        self.committed.len()
    }

    pub fn provisional_count(&self) -> usize {
        self.provisional.len()
    }

    /// Committed plus provisional txs; both count against capacity
    pub fn held_count(&self) -> usize {
        self.committed.len() + self.provisional.len()
    }

    pub fn total_gas(&self) -> u64 {
        self.committed_gas + self.provisional_gas
    }

    pub fn total_call_data(&self) -> u64 {
        self.committed_call_data + self.provisional_call_data
    }

    pub fn committed_gas(&self) -> u64 {
        self.committed_gas
    }

    pub fn committed_call_data(&self) -> u64 {
        self.committed_call_data
    }

    pub fn committed_txs(&self) -> impl Iterator<Item = &PendingTx> {
        self.committed.iter().map(|held| &held.tx)
    }

    pub fn batch(&self, bridge_call_data: &BridgeCallData) -> Option<&BridgeBatch> {
        self.batches.get(bridge_call_data)
    }

    pub fn admitted_bridge_count(&self) -> usize {
        self.batches.values().filter(|b| b.admitted).count()
    }

    pub fn claimed_subsidies(&self) -> usize {
        self.subsidy_locks.len()
    }

    pub(crate) fn uses_asset(&self, asset_id: AssetId) -> bool {
        self.asset_usage.contains_key(&asset_id)
    }

    pub(crate) fn distinct_assets(&self) -> usize {
        self.asset_usage.len()
    }

    /// Gas credit declared by every committed tx
    pub fn pooled_gas_credit(&self) -> u64 {
        self.committed
            .iter()
            .fold(0u64, |acc, held| acc.saturating_add(held.tx.declared_gas))
    }

    pub fn oldest_committed(&self) -> Option<DateTime<Utc>> {
        self.committed.iter().map(|held| held.tx.created).min()
    }

    /// Position of the committed tx producing `commitment`
    pub(crate) fn producer_position(&self, commitment: &Commitment) -> Option<usize> {
        self.output_positions.get(commitment).copied()
    }

    pub(crate) fn batch_entry(&mut self, bridge_call_data: BridgeCallData) -> &mut BridgeBatch {
        if !self.batches.contains_key(&bridge_call_data) {
            self.batch_order.push(bridge_call_data);
        }
        self.batches
            .entry(bridge_call_data)
            .or_insert_with(|| BridgeBatch::new(bridge_call_data))
    }

    pub(crate) fn commit(&mut self, held: HeldTx) {
        self.output_positions
            .insert(held.tx.output_commitment, self.committed.len());
        self.held_ids.insert(held.tx.id);
        self.committed_gas += held.gas;
        self.committed_call_data += held.call_data;
        if held.fee_paying {
            *self.asset_usage.entry(held.tx.fee_asset_id).or_insert(0) += 1;
        }
        self.committed.push(held);
    }

    pub(crate) fn hold_provisional(&mut self, held: HeldTx) {
        self.provisional_outputs.insert(held.tx.output_commitment);
        self.held_ids.insert(held.tx.id);
        self.provisional_gas += held.gas;
        self.provisional_call_data += held.call_data;
        if held.fee_paying {
            *self.asset_usage.entry(held.tx.fee_asset_id).or_insert(0) += 1;
        }
        self.provisional.insert(held.tx.id, held);
    }

    /// Remove a provisional tx, giving back everything it was charged
    pub(crate) fn release_provisional(&mut self, id: &TxId) -> Option<HeldTx> {
        let held = self.provisional.remove(id)?;
        self.provisional_outputs.remove(&held.tx.output_commitment);
        self.held_ids.remove(id);
        self.provisional_gas -= held.gas;
        self.provisional_call_data -= held.call_data;
        if held.fee_paying {
            self.release_asset(held.tx.fee_asset_id);
        }
        Some(held)
    }

    /// Drop the most recently committed tx
    pub(crate) fn uncommit_last(&mut self) -> Option<HeldTx> {
        let held = self.committed.pop()?;
        self.output_positions.remove(&held.tx.output_commitment);
        self.held_ids.remove(&held.tx.id);
        self.committed_gas -= held.gas;
        self.committed_call_data -= held.call_data;
        if held.fee_paying {
            self.release_asset(held.tx.fee_asset_id);
        }
        if let Some(bridge_call_data) = held.tx.bridge() {
            if let Some(batch) = self.batches.get_mut(&bridge_call_data) {
                batch.members.retain(|id| *id != held.tx.id);
                batch.accumulated_gas_credit =
                    batch.accumulated_gas_credit.saturating_sub(held.tx.declared_gas);
            }
        }
        Some(held)
    }

    /// Remove a bridge batch and its provisional members for the rest of this rollup
    pub(crate) fn drop_batch(&mut self, bridge_call_data: BridgeCallData) {
        if let Some(batch) = self.batches.remove(&bridge_call_data) {
            for id in &batch.members {
                self.release_provisional(id);
            }
        }
        self.batch_order.retain(|bcd| *bcd != bridge_call_data);
        self.rejected_bridges.insert(bridge_call_data);
    }

    fn release_asset(&mut self, asset_id: AssetId) {
        if let Some(count) = self.asset_usage.get_mut(&asset_id) {
            *count -= 1;
            if *count == 0 {
                self.asset_usage.remove(&asset_id);
            }
        }
    }

    /// Profile reported while the rollup keeps accumulating
    pub fn pending_profile(&self) -> RollupProfile {
        RollupProfile {
            published: false,
            total_txs: self.held_count(),
            total_gas: self.total_gas(),
            total_call_data: self.total_call_data(),
            tx_ids: Vec::new(),
            trigger: None,
        }
    }
}
