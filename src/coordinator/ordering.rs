//! Candidate ordering
//!
//! Defi claims settle the outputs of earlier bridge interactions and never
//! depend on anything else in the pending set, so they go first. Relative
//! order inside each partition is preserved.

use crate::{PendingTx, TxKind};

fn goes_first(kind: TxKind) -> bool {
    match kind {
        TxKind::DefiClaim => true,
        TxKind::Transfer
        | TxKind::Deposit
        | TxKind::WithdrawHighGas
        | TxKind::WithdrawToWallet
        | TxKind::Account
        | TxKind::DefiDeposit => false,
    }
}

/// Order first-class candidates for the admission pass
pub(crate) fn order_candidates(candidates: &[PendingTx]) -> Vec<&PendingTx> {
    let (claims, rest): (Vec<&PendingTx>, Vec<&PendingTx>) =
        candidates.iter().partition(|tx| goes_first(tx.kind));
    claims.into_iter().chain(rest).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ethers::types::H256;

    fn tx(n: u8, kind: TxKind) -> PendingTx {
        PendingTx {
            id: H256::repeat_byte(n),
            kind,
            created: Utc::now(),
            fee_asset_id: 0,
            declared_gas: 0,
            bridge_call_data: None,
            output_commitment: H256::repeat_byte(n),
            consumed_commitment: None,
            second_class: false,
        }
    }

    #[test]
    fn test_defi_claims_move_ahead_preserving_order() {
        let txs = vec![
            tx(1, TxKind::Transfer),
            tx(2, TxKind::DefiClaim),
            tx(3, TxKind::Deposit),
            tx(4, TxKind::DefiClaim),
            tx(5, TxKind::Account),
        ];

        let ordered: Vec<u8> = order_candidates(&txs)
            .iter()
            .map(|tx| tx.id.as_bytes()[0])
            .collect();

        assert_eq!(ordered, vec![2, 4, 1, 3, 5]);
    }

    #[test]
    fn test_empty_candidate_list() {
        assert!(order_candidates(&[]).is_empty());
    }
}
