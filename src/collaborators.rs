//! Collaborator Interfaces
//!
//! Everything the coordinator depends on but does not own. Oracles are
//! synchronous because the selection pass never suspends; the builder,
//! aggregator and publisher are the only await points.

use crate::{
    AggregatedProof, AssetId, BridgeAddressId, BridgeCallData, BridgeConfig, BridgeSubsidy,
    BuiltGroup, PendingTx, RollupTimeouts, TxKind,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Gas and call-data prices of rollup transactions
pub trait CostOracle: Send + Sync {
    /// Settlement gas a tx of this kind costs, excluding any bridge share
    fn gas_for(&self, kind: TxKind) -> u64;

    fn call_data_for(&self, kind: TxKind) -> u64;

    /// `ceil(full_bridge_gas / batch_size)` for the given bridge
    fn single_bridge_share(&self, bridge_call_data: BridgeCallData) -> u64;

    fn is_fee_paying_asset(&self, asset_id: AssetId) -> bool;

    /// Verification gas charged for a padding slot of a rollup
    fn base_slot_gas(&self) -> u64;
}

/// Bridge parameters and subsidies
///
/// Answers may change between calls (an on-chain gas limit can be updated at
/// any time), so callers must not cache them.
pub trait BridgeOracle: Send + Sync {
    fn config_of(&self, bridge_address_id: BridgeAddressId) -> BridgeConfig;

    /// Full gas of one bridge call; an on-chain value overrides the static estimate
    fn full_gas_cost(&self, bridge_call_data: BridgeCallData) -> u64;

    fn subsidy(&self, bridge_call_data: BridgeCallData) -> BridgeSubsidy;
}

/// Builds one inner rollup
#[async_trait]
pub trait BatchBuilder: Send + Sync {
    /// Build a group of at most `num_inner_rollup_txs` txs.
    ///
    /// Appends any bridge call data and fee-paying asset id not yet present to
    /// the two accumulators, preserving first-seen order.
    async fn build(
        &self,
        txs: &[PendingTx],
        bridge_call_datas: &mut Vec<BridgeCallData>,
        asset_ids: &mut Vec<AssetId>,
    ) -> anyhow::Result<BuiltGroup>;

    /// Best-effort cancellation of in-flight work
    fn interrupt(&self);
}

/// Aggregates inner rollups into the published proof
#[async_trait]
pub trait Aggregator: Send + Sync {
    async fn aggregate(
        &self,
        groups: Vec<BuiltGroup>,
        bridge_call_datas: Vec<BridgeCallData>,
        asset_ids: Vec<AssetId>,
    ) -> anyhow::Result<AggregatedProof>;

    fn interrupt(&self);
}

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Returns whether the settlement layer accepted the rollup
    async fn publish(&self, proof: AggregatedProof) -> anyhow::Result<bool>;
}

/// Read-only view over pending transactions
#[async_trait]
pub trait PendingTxSource: Send + Sync {
    async fn pending_count(&self) -> usize;

    /// Up to `limit` first-class txs in arrival order
    async fn pending_txs(&self, limit: usize) -> Vec<PendingTx>;

    async fn second_class_count(&self) -> usize;

    async fn second_class_txs(&self, limit: usize) -> Vec<PendingTx>;
}

/// Computes publish deadlines from creation times and the current time
pub trait DeadlineCalculator: Send + Sync {
    fn last_timeouts(&self, pending: &[PendingTx]) -> RollupTimeouts;
}

/// The full set of collaborators a coordinator is wired with
#[derive(Clone)]
pub struct Collaborators {
    pub costs: Arc<dyn CostOracle>,
    pub bridges: Arc<dyn BridgeOracle>,
    pub builder: Arc<dyn BatchBuilder>,
    pub aggregator: Arc<dyn Aggregator>,
    pub publisher: Arc<dyn Publisher>,
    pub deadlines: Arc<dyn DeadlineCalculator>,
}
