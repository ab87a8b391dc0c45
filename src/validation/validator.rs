use crate::{PendingTx, TxKind, ValidationError, pool::PendingPool};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct Validator {
    pool: Arc<PendingPool>,
}

impl Validator {
    pub fn new(pool: Arc<PendingPool>) -> Self {
        Self { pool }
    }

    /// Validate a submitted transaction
    /// Returns Ok(()) if valid, Err(ValidationError) if invalid
    pub async fn validate(&self, tx: &PendingTx) -> Result<(), ValidationError> {
        debug!("Validating {:?} tx {:?}", tx.kind, tx.id);

        // 1. Bridge call data only on defi deposits
        self.check_bridge_call_data(tx)?;

        // 2. Commitments
        self.check_commitments(tx)?;

        // 3. Not already pending
        self.check_duplicate(tx).await?;

        debug!("Transaction validation successful");
        Ok(())
    }

    fn check_bridge_call_data(&self, tx: &PendingTx) -> Result<(), ValidationError> {
        match (tx.kind, tx.bridge_call_data) {
            (TxKind::DefiDeposit, Some(bridge_call_data)) if !bridge_call_data.is_zero() => Ok(()),
            (TxKind::DefiDeposit, _) => {
                warn!("Defi deposit {:?} has no bridge call data", tx.id);
                Err(ValidationError::MissingBridgeCallData)
            }
            (_, Some(_)) => {
                warn!("{:?} tx {:?} carries bridge call data", tx.kind, tx.id);
                Err(ValidationError::UnexpectedBridgeCallData)
            }
            (_, None) => Ok(()),
        }
    }

    fn check_commitments(&self, tx: &PendingTx) -> Result<(), ValidationError> {
        if tx.output_commitment.is_zero() {
            return Err(ValidationError::EmptyOutputCommitment);
        }
        if tx.consumed_commitment == Some(tx.output_commitment) {
            return Err(ValidationError::SelfConsumingTx);
        }
        Ok(())
    }

    async fn check_duplicate(&self, tx: &PendingTx) -> Result<(), ValidationError> {
        if self.pool.contains(&tx.id).await {
            return Err(ValidationError::DuplicateTx { id: tx.id });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BridgeCallData;
    use chrono::Utc;
    use ethers::types::H256;

    fn tx(kind: TxKind, bridge_call_data: Option<BridgeCallData>) -> PendingTx {
        PendingTx {
            id: H256::repeat_byte(1),
            kind,
            created: Utc::now(),
            fee_asset_id: 0,
            declared_gas: 0,
            bridge_call_data,
            output_commitment: H256::repeat_byte(2),
            consumed_commitment: None,
            second_class: false,
        }
    }

    fn validator() -> (Validator, Arc<PendingPool>) {
        let pool = Arc::new(PendingPool::new());
        (Validator::new(pool.clone()), pool)
    }

    #[tokio::test]
    async fn test_accepts_well_formed_txs() {
        let (validator, _) = validator();
        let bridge = Some(BridgeCallData::new(1, 0, 0));
        assert_eq!(validator.validate(&tx(TxKind::Transfer, None)).await, Ok(()));
        assert_eq!(validator.validate(&tx(TxKind::DefiDeposit, bridge)).await, Ok(()));
    }

    #[tokio::test]
    async fn test_bridge_call_data_must_match_kind() {
        let (validator, _) = validator();
        let bridge = Some(BridgeCallData::new(1, 0, 0));

        assert_eq!(
            validator.validate(&tx(TxKind::DefiDeposit, None)).await,
            Err(ValidationError::MissingBridgeCallData)
        );
        assert_eq!(
            validator
                .validate(&tx(TxKind::DefiDeposit, Some(BridgeCallData::ZERO)))
                .await,
            Err(ValidationError::MissingBridgeCallData)
        );
        assert_eq!(
            validator.validate(&tx(TxKind::DefiClaim, bridge)).await,
            Err(ValidationError::UnexpectedBridgeCallData)
        );
    }

    #[tokio::test]
    async fn test_commitment_checks() {
        let (validator, _) = validator();

        let mut empty = tx(TxKind::Transfer, None);
        empty.output_commitment = H256::zero();
        assert_eq!(
            validator.validate(&empty).await,
            Err(ValidationError::EmptyOutputCommitment)
        );

        let mut self_consuming = tx(TxKind::Transfer, None);
        self_consuming.consumed_commitment = Some(self_consuming.output_commitment);
        assert_eq!(
            validator.validate(&self_consuming).await,
            Err(ValidationError::SelfConsumingTx)
        );
    }

    #[tokio::test]
    async fn test_rejects_pending_duplicate() {
        let (validator, pool) = validator();
        let tx = tx(TxKind::Transfer, None);
        pool.add(tx.clone()).await;

        assert_eq!(
            validator.validate(&tx).await,
            Err(ValidationError::DuplicateTx { id: tx.id })
        );
    }
}
