use super::{RollupRecord, RollupRegistry};
use crate::{AggregatedProof, Publisher};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// Publisher that settles rollups into the local registry
pub struct RegistryPublisher {
    registry: Arc<RollupRegistry>,
}

impl RegistryPublisher {
    pub fn new(registry: Arc<RollupRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Publisher for RegistryPublisher {
    async fn publish(&self, proof: AggregatedProof) -> anyhow::Result<bool> {
        let record = RollupRecord::from_proof(&proof, Utc::now());
        self.registry.store(&record).await?;
        info!(
            "Rollup #{} settled: {} txs in {} inner rollups, {} bridge calls",
            record.rollup_id, record.tx_count, record.group_count, record.bridge_call_count
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BridgeCallData, BuiltGroup};
    use ethers::types::H256;

    fn proof(rollup_id: u64) -> AggregatedProof {
        AggregatedProof {
            rollup_id,
            groups: vec![
                BuiltGroup {
                    tx_ids: vec![H256::repeat_byte(1), H256::repeat_byte(2)],
                    digest: H256::repeat_byte(10),
                },
                BuiltGroup {
                    tx_ids: vec![H256::repeat_byte(3)],
                    digest: H256::repeat_byte(11),
                },
            ],
            bridge_call_datas: vec![
                BridgeCallData::new(1, 0, 0),
                BridgeCallData::ZERO,
                BridgeCallData::ZERO,
            ],
            asset_ids: vec![0],
            digest: H256::repeat_byte(42),
            created: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_publish_records_rollup() {
        let registry = Arc::new(RollupRegistry::connect("sqlite::memory:").await.unwrap());
        let publisher = RegistryPublisher::new(registry.clone());

        assert!(publisher.publish(proof(3)).await.unwrap());

        let latest = registry.latest().await.unwrap().unwrap();
        assert_eq!(latest.rollup_id, 3);
        assert_eq!(latest.tx_count, 3);
        assert_eq!(latest.group_count, 2);
        assert_eq!(latest.bridge_call_count, 1);
        assert_eq!(latest.digest, H256::repeat_byte(42));
    }

    #[tokio::test]
    async fn test_publish_error_passes_through() {
        let registry = Arc::new(RollupRegistry::connect("sqlite::memory:").await.unwrap());
        let publisher = RegistryPublisher::new(registry);

        publisher.publish(proof(1)).await.unwrap();
        assert!(publisher.publish(proof(1)).await.is_err());
    }
}
