//! Local Rollup Engine
//!
//! In-process stand-ins for the proof pipeline. Each inner rollup is
//! represented by the keccak digest of its tx ids and each outer rollup by the
//! digest of its groups and public inputs. They keep the accumulator contract
//! of the real builder so the coordinator behaves identically against them.

use crate::{
    Aggregator, AggregatedProof, AssetId, BatchBuilder, BridgeCallData, BuiltGroup, CostOracle,
    PendingTx,
};
use async_trait::async_trait;
use ethers::types::H256;
use ethers::utils::keccak256;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Builds inner rollups
pub struct LocalRollupBuilder {
    costs: Arc<dyn CostOracle>,
    interrupted: AtomicBool,
}

impl LocalRollupBuilder {
    pub fn new(costs: Arc<dyn CostOracle>) -> Self {
        Self {
            costs,
            interrupted: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl BatchBuilder for LocalRollupBuilder {
    async fn build(
        &self,
        txs: &[PendingTx],
        bridge_call_datas: &mut Vec<BridgeCallData>,
        asset_ids: &mut Vec<AssetId>,
    ) -> anyhow::Result<BuiltGroup> {
        if self.interrupted.load(Ordering::SeqCst) {
            anyhow::bail!("rollup builder interrupted");
        }

        let mut preimage = Vec::with_capacity(txs.len() * 32);
        for tx in txs {
            if let Some(bridge_call_data) = tx.bridge() {
                if !bridge_call_datas.contains(&bridge_call_data) {
                    bridge_call_datas.push(bridge_call_data);
                }
            }
            if self.costs.is_fee_paying_asset(tx.fee_asset_id) && !asset_ids.contains(&tx.fee_asset_id) {
                asset_ids.push(tx.fee_asset_id);
            }
            preimage.extend_from_slice(tx.id.as_bytes());
        }

        Ok(BuiltGroup {
            tx_ids: txs.iter().map(|tx| tx.id).collect(),
            digest: H256::from(keccak256(preimage)),
        })
    }

    fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }
}

/// Aggregates inner rollups into sequentially numbered outer rollups
pub struct LocalAggregator {
    /// Next rollup ID to assign
    next_rollup_id: AtomicU64,
    interrupted: AtomicBool,
}

impl LocalAggregator {
    /// Creates an aggregator whose first rollup gets `next_rollup_id`
    pub fn new(next_rollup_id: u64) -> Self {
        Self {
            next_rollup_id: AtomicU64::new(next_rollup_id),
            interrupted: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Aggregator for LocalAggregator {
    async fn aggregate(
        &self,
        groups: Vec<BuiltGroup>,
        bridge_call_datas: Vec<BridgeCallData>,
        asset_ids: Vec<AssetId>,
    ) -> anyhow::Result<AggregatedProof> {
        if self.interrupted.load(Ordering::SeqCst) {
            anyhow::bail!("rollup aggregator interrupted");
        }

        let mut preimage = Vec::new();
        for group in &groups {
            preimage.extend_from_slice(group.digest.as_bytes());
        }
        for bridge_call_data in &bridge_call_datas {
            let mut word = [0u8; 32];
            bridge_call_data.0.to_big_endian(&mut word);
            preimage.extend_from_slice(&word);
        }
        for asset_id in &asset_ids {
            preimage.extend_from_slice(&asset_id.to_be_bytes());
        }

        Ok(AggregatedProof {
            rollup_id: self.next_rollup_id.fetch_add(1, Ordering::SeqCst),
            groups,
            bridge_call_datas,
            asset_ids,
            digest: H256::from(keccak256(preimage)),
            created: chrono::Utc::now(),
        })
    }

    fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TxKind, oracle::FeeSchedule};
    use crate::config::{BridgeDefaults, CostConfig, KindCost};
    use crate::oracle::BridgeRegistry;
    use chrono::Utc;

    fn builder() -> LocalRollupBuilder {
        let kind = KindCost {
            gas: 20_000,
            call_data: 184,
        };
        let costs = CostConfig {
            transfer: kind,
            deposit: kind,
            withdraw_high_gas: kind,
            withdraw_to_wallet: kind,
            account: kind,
            defi_deposit: kind,
            defi_claim: kind,
            base_slot_gas: 20_000,
            fee_paying_assets: vec![0, 1],
        };
        let bridges = Arc::new(BridgeRegistry::new(
            &BridgeDefaults {
                batch_size: 10,
                gas: 100_000,
            },
            &[],
        ));
        LocalRollupBuilder::new(Arc::new(FeeSchedule::new(costs, bridges)))
    }

    fn tx(n: u8, kind: TxKind, fee_asset_id: AssetId, bridge: Option<BridgeCallData>) -> PendingTx {
        PendingTx {
            id: H256::repeat_byte(n),
            kind,
            created: Utc::now(),
            fee_asset_id,
            declared_gas: 0,
            bridge_call_data: bridge,
            output_commitment: H256::repeat_byte(n),
            consumed_commitment: None,
            second_class: false,
        }
    }

    #[tokio::test]
    async fn test_builder_accumulates_distinct_bridges_and_fee_assets() {
        let builder = builder();
        let bridge_a = BridgeCallData::new(1, 0, 0);
        let bridge_b = BridgeCallData::new(2, 0, 0);
        let mut bridges = Vec::new();
        let mut assets = Vec::new();

        let first = vec![
            tx(1, TxKind::DefiDeposit, 1, Some(bridge_a)),
            tx(2, TxKind::Transfer, 0, None),
        ];
        let second = vec![
            tx(3, TxKind::DefiDeposit, 1, Some(bridge_b)),
            tx(4, TxKind::DefiDeposit, 9, Some(bridge_a)),
        ];
        builder.build(&first, &mut bridges, &mut assets).await.unwrap();
        let group = builder.build(&second, &mut bridges, &mut assets).await.unwrap();

        assert_eq!(bridges, vec![bridge_a, bridge_b]);
        assert_eq!(assets, vec![1, 0]);
        assert_eq!(group.tx_ids, vec![H256::repeat_byte(3), H256::repeat_byte(4)]);
    }

    #[tokio::test]
    async fn test_interrupted_builder_refuses_work() {
        let builder = builder();
        builder.interrupt();
        let result = builder
            .build(&[tx(1, TxKind::Transfer, 0, None)], &mut Vec::new(), &mut Vec::new())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_aggregator_numbers_rollups_sequentially() {
        let aggregator = LocalAggregator::new(7);
        let group = BuiltGroup {
            tx_ids: vec![H256::repeat_byte(1)],
            digest: H256::repeat_byte(9),
        };

        let first = aggregator
            .aggregate(vec![group.clone()], vec![BridgeCallData::ZERO; 4], vec![0])
            .await
            .unwrap();
        let second = aggregator
            .aggregate(vec![group], vec![BridgeCallData::ZERO; 4], vec![0])
            .await
            .unwrap();

        assert_eq!(first.rollup_id, 7);
        assert_eq!(second.rollup_id, 8);
        assert_eq!(first.tx_count(), 1);
        assert_eq!(first.digest, second.digest);
    }
}
