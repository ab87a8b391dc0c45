//! Pending Transaction Pool
//!
//! This module implements the pool of transactions waiting to be rolled up.
//! First-class and second-class transactions are kept in separate FIFO lanes.
//! Transactions stay in the pool until a published rollup includes them.

use crate::{PendingTx, PendingTxSource, TxId};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use tokio::sync::RwLock;

#[derive(Default)]
struct Lanes {
    first_class: VecDeque<PendingTx>,
    second_class: VecDeque<PendingTx>,
    ids: HashSet<TxId>,
}

/// Pool for pending rollup transactions
///
/// Protected by a RwLock for concurrent access from the API and the pipeline.
#[derive(Default)]
pub struct PendingPool {
    lanes: RwLock<Lanes>,
}

impl PendingPool {
    /// Creates a new empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validated transaction to the lane its `second_class` flag selects
    ///
    /// Returns `false` if a transaction with the same id is already pending.
    pub async fn add(&self, tx: PendingTx) -> bool {
        let mut lanes = self.lanes.write().await;
        if !lanes.ids.insert(tx.id) {
            return false;
        }
        if tx.second_class {
            lanes.second_class.push_back(tx);
        } else {
            lanes.first_class.push_back(tx);
        }
        true
    }

    pub async fn contains(&self, id: &TxId) -> bool {
        self.lanes.read().await.ids.contains(id)
    }

    /// Remove transactions that were published
    ///
    /// # Returns
    /// How many of the given ids were pending
    pub async fn remove(&self, ids: &[TxId]) -> usize {
        let gone: HashSet<TxId> = ids.iter().copied().collect();
        let mut lanes = self.lanes.write().await;
        let before = lanes.ids.len();
        lanes.first_class.retain(|tx| !gone.contains(&tx.id));
        lanes.second_class.retain(|tx| !gone.contains(&tx.id));
        lanes.ids.retain(|id| !gone.contains(id));
        before - lanes.ids.len()
    }
}

#[async_trait]
impl PendingTxSource for PendingPool {
    async fn pending_count(&self) -> usize {
        self.lanes.read().await.first_class.len()
    }

    async fn pending_txs(&self, limit: usize) -> Vec<PendingTx> {
        let lanes = self.lanes.read().await;
        lanes.first_class.iter().take(limit).cloned().collect()
    }

    async fn second_class_count(&self) -> usize {
        self.lanes.read().await.second_class.len()
    }

    async fn second_class_txs(&self, limit: usize) -> Vec<PendingTx> {
        let lanes = self.lanes.read().await;
        lanes.second_class.iter().take(limit).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TxKind;
    use chrono::Utc;
    use ethers::types::H256;

    fn tx(n: u8, second_class: bool) -> PendingTx {
        PendingTx {
            id: H256::repeat_byte(n),
            kind: TxKind::Transfer,
            created: Utc::now(),
            fee_asset_id: 0,
            declared_gas: 0,
            bridge_call_data: None,
            output_commitment: H256::repeat_byte(n),
            consumed_commitment: None,
            second_class,
        }
    }

    #[tokio::test]
    async fn test_lanes_keep_arrival_order() {
        let pool = PendingPool::new();
        assert!(pool.add(tx(1, false)).await);
        assert!(pool.add(tx(2, true)).await);
        assert!(pool.add(tx(3, false)).await);

        assert_eq!(pool.pending_count().await, 2);
        assert_eq!(pool.second_class_count().await, 1);
        let first: Vec<_> = pool.pending_txs(10).await.iter().map(|t| t.id).collect();
        assert_eq!(first, vec![H256::repeat_byte(1), H256::repeat_byte(3)]);
        assert_eq!(pool.pending_txs(1).await.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicates_are_refused() {
        let pool = PendingPool::new();
        assert!(pool.add(tx(1, false)).await);
        assert!(!pool.add(tx(1, true)).await);
        assert_eq!(pool.second_class_count().await, 0);
    }

    #[tokio::test]
    async fn test_remove_published() {
        let pool = PendingPool::new();
        pool.add(tx(1, false)).await;
        pool.add(tx(2, true)).await;
        pool.add(tx(3, false)).await;

        let removed = pool
            .remove(&[H256::repeat_byte(1), H256::repeat_byte(2), H256::repeat_byte(9)])
            .await;

        assert_eq!(removed, 2);
        assert!(!pool.contains(&H256::repeat_byte(1)).await);
        assert!(pool.contains(&H256::repeat_byte(3)).await);
        assert_eq!(pool.second_class_count().await, 0);
    }
}
