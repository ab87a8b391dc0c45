use chrono::{DateTime, Utc};
use ethers::types::{H256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hash identifying a pending transaction
pub type TxId = H256;

/// Note commitment produced or consumed by a transaction
pub type Commitment = H256;

/// Identifier of the asset a transaction pays its fee in
pub type AssetId = u32;

/// Identifier of a deployed bridge contract (the low 32 bits of a bridge call data)
pub type BridgeAddressId = u32;

/// Encoded bridge interaction
///
/// Transactions sharing the same value are settled by a single bridge call.
/// Bits 0..32 carry the bridge address id, bits 32..96 the subsidy criteria
/// (the asset pairing a subsidy is granted for) and the upper bits auxiliary
/// data the coordinator does not interpret.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BridgeCallData(pub U256);

impl BridgeCallData {
    /// Padding value used for unused bridge slots
    pub const ZERO: BridgeCallData = BridgeCallData(U256([0; 4]));

    pub fn new(bridge_address_id: BridgeAddressId, criteria: u64, aux: u64) -> Self {
        Self(
            (U256::from(aux) << 96usize)
                | (U256::from(criteria) << 32usize)
                | U256::from(bridge_address_id),
        )
    }

    pub fn bridge_address_id(&self) -> BridgeAddressId {
        self.0.low_u32()
    }

    pub fn criteria(&self) -> u64 {
        (self.0 >> 32usize).low_u64()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl From<U256> for BridgeCallData {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl fmt::Display for BridgeCallData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Kind of a rollup transaction
///
/// Every cost and admission decision matches on this exhaustively, so adding
/// a kind forces a review of each of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Transfer,
    Deposit,
    WithdrawHighGas,
    WithdrawToWallet,
    Account,
    DefiDeposit,
    DefiClaim,
}

impl TxKind {
    pub const ALL: [TxKind; 7] = [
        TxKind::Transfer,
        TxKind::Deposit,
        TxKind::WithdrawHighGas,
        TxKind::WithdrawToWallet,
        TxKind::Account,
        TxKind::DefiDeposit,
        TxKind::DefiClaim,
    ];
}

/// Transaction waiting to be rolled up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTx {
    pub id: TxId,
    pub kind: TxKind,
    pub created: DateTime<Utc>,
    pub fee_asset_id: AssetId,
    /// Fee headroom already converted to a gas-equivalent credit
    pub declared_gas: u64,
    /// Set only for defi deposits
    #[serde(default)]
    pub bridge_call_data: Option<BridgeCallData>,
    pub output_commitment: Commitment,
    /// Output commitment of another tx this one spends, if chained
    #[serde(default)]
    pub consumed_commitment: Option<Commitment>,
    #[serde(default)]
    pub second_class: bool,
}

impl PendingTx {
    /// Bridge this tx interacts with, if it is a defi deposit carrying one
    pub fn bridge(&self) -> Option<BridgeCallData> {
        match self.kind {
            TxKind::DefiDeposit => self.bridge_call_data,
            TxKind::Transfer
            | TxKind::Deposit
            | TxKind::WithdrawHighGas
            | TxKind::WithdrawToWallet
            | TxKind::Account
            | TxKind::DefiClaim => None,
        }
    }
}

/// Static bridge parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Number of txs one bridge call settles
    pub batch_size: u32,
    /// Static estimate of the gas a full bridge call costs
    pub gas: u64,
}

/// Externally granted gas subsidy for a bridge interaction
///
/// One subsidy exists per `(bridge_address_id, criteria)` pair, so only one
/// bridge call data may use it per rollup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeSubsidy {
    pub gas: u64,
    pub bridge_address_id: BridgeAddressId,
    pub criteria: u64,
}

/// A publish deadline on the epoch-aligned interval schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupTimeout {
    pub deadline: DateTime<Utc>,
    /// Index of the interval this deadline closes
    pub block_number: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupTimeouts {
    pub base_timeout: Option<RollupTimeout>,
}

/// Why a rollup was published
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishTrigger {
    Flush,
    CapacityReached,
    BudgetExhausted,
    Timeout,
    Profitable,
}

/// Outcome of one coordinator invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupProfile {
    pub published: bool,
    pub total_txs: usize,
    pub total_gas: u64,
    pub total_call_data: u64,
    /// Txs included in the published rollup, in block order
    pub tx_ids: Vec<TxId>,
    pub trigger: Option<PublishTrigger>,
}

/// One inner rollup produced by the batch builder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltGroup {
    pub tx_ids: Vec<TxId>,
    pub digest: H256,
}

/// Outer rollup proof ready to publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedProof {
    pub rollup_id: u64,
    pub groups: Vec<BuiltGroup>,
    /// Always exactly `number_of_bridge_calls` entries, zero padded
    pub bridge_call_datas: Vec<BridgeCallData>,
    pub asset_ids: Vec<AssetId>,
    pub digest: H256,
    pub created: DateTime<Utc>,
}

impl AggregatedProof {
    pub fn tx_count(&self) -> usize {
        self.groups.iter().map(|g| g.tx_ids.len()).sum()
    }
}

/// Validation errors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationError {
    MissingBridgeCallData,
    UnexpectedBridgeCallData,
    EmptyOutputCommitment,
    SelfConsumingTx,
    DuplicateTx { id: TxId },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingBridgeCallData => {
                write!(f, "Defi deposit is missing its bridge call data")
            }
            ValidationError::UnexpectedBridgeCallData => {
                write!(f, "Only defi deposits may carry bridge call data")
            }
            ValidationError::EmptyOutputCommitment => write!(f, "Output commitment is empty"),
            ValidationError::SelfConsumingTx => {
                write!(f, "Transaction consumes its own output commitment")
            }
            ValidationError::DuplicateTx { id } => {
                write!(f, "Transaction {:?} is already pending", id)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_call_data_carries_address_id() {
        let bcd = BridgeCallData::new(7, 3, 0xdead_beef);
        assert_eq!(bcd.bridge_address_id(), 7);
        assert_eq!(bcd.criteria(), 3);
        assert!(!bcd.is_zero());
        assert_ne!(bcd, BridgeCallData::new(7, 3, 1));
        assert!(BridgeCallData::ZERO.is_zero());
    }

    #[test]
    fn test_only_defi_deposits_expose_a_bridge() {
        let bcd = BridgeCallData::new(1, 0, 0);
        let mut tx = PendingTx {
            id: H256::repeat_byte(1),
            kind: TxKind::DefiDeposit,
            created: Utc::now(),
            fee_asset_id: 0,
            declared_gas: 0,
            bridge_call_data: Some(bcd),
            output_commitment: H256::repeat_byte(2),
            consumed_commitment: None,
            second_class: false,
        };
        assert_eq!(tx.bridge(), Some(bcd));

        tx.kind = TxKind::DefiClaim;
        assert_eq!(tx.bridge(), None);
    }
}
