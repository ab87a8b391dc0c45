//! Publish Deadlines
//!
//! Publish deadlines fall on a fixed schedule aligned to the Unix epoch: with a
//! base interval of one hour a deadline passes at every full hour. A pending
//! tx has timed out once a deadline passed after it was created, so a partial
//! rollup is published at most one interval after its oldest tx arrived.

use crate::{DeadlineCalculator, PendingTx, RollupTimeout, RollupTimeouts};
use chrono::{DateTime, Utc};

/// Deadline calculator on epoch-aligned intervals
#[derive(Debug, Clone)]
pub struct PublishTimeManager {
    /// Base interval in seconds; no timeouts when unset
    base_interval_secs: Option<u64>,
}

impl PublishTimeManager {
    pub fn new(base_timeout_secs: Option<u64>) -> Self {
        Self {
            base_interval_secs: base_timeout_secs.filter(|secs| *secs > 0),
        }
    }

    /// Most recent deadline, reported only if some pending tx predates it
    pub fn last_timeouts_at(&self, pending: &[PendingTx], now: DateTime<Utc>) -> RollupTimeouts {
        let base_timeout = self
            .base_interval_secs
            .and_then(|interval| boundary(now, interval, 0))
            .filter(|timeout| pending.iter().any(|tx| tx.created < timeout.deadline));
        RollupTimeouts { base_timeout }
    }

    /// The deadline that will pass next
    pub fn next_timeouts_at(&self, now: DateTime<Utc>) -> RollupTimeouts {
        RollupTimeouts {
            base_timeout: self
                .base_interval_secs
                .and_then(|interval| boundary(now, interval, 1)),
        }
    }
}

impl DeadlineCalculator for PublishTimeManager {
    fn last_timeouts(&self, pending: &[PendingTx]) -> RollupTimeouts {
        self.last_timeouts_at(pending, Utc::now())
    }
}

/// Deadline `offset` intervals after the last one at or before `now`
fn boundary(now: DateTime<Utc>, interval_secs: u64, offset: u64) -> Option<RollupTimeout> {
    let elapsed = u64::try_from(now.timestamp()).ok()?;
    let block_number = elapsed / interval_secs + offset;
    let deadline_secs = i64::try_from(block_number.checked_mul(interval_secs)?).ok()?;
    let deadline = DateTime::from_timestamp(deadline_secs, 0)?;
    Some(RollupTimeout {
        deadline,
        block_number,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TxKind;
    use chrono::TimeZone;
    use ethers::types::H256;

    fn tx_created_at(created: DateTime<Utc>) -> PendingTx {
        PendingTx {
            id: H256::from_low_u64_be(created.timestamp() as u64),
            kind: TxKind::Transfer,
            created,
            fee_asset_id: 0,
            declared_gas: 0,
            bridge_call_data: None,
            output_commitment: H256::from_low_u64_be(created.timestamp() as u64 + 1),
            consumed_commitment: None,
            second_class: false,
        }
    }

    #[test]
    fn test_last_deadline_is_aligned_to_interval() {
        let manager = PublishTimeManager::new(Some(3600));
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap();
        let old = tx_created_at(Utc.with_ymd_and_hms(2024, 5, 1, 9, 50, 0).unwrap());

        let timeout = manager.last_timeouts_at(&[old], now).base_timeout.unwrap();

        assert_eq!(timeout.deadline, Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
        assert_eq!(timeout.block_number, now.timestamp() as u64 / 3600);
    }

    #[test]
    fn test_no_timeout_for_txs_created_after_the_deadline() {
        let manager = PublishTimeManager::new(Some(3600));
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap();
        let fresh = tx_created_at(Utc.with_ymd_and_hms(2024, 5, 1, 10, 10, 0).unwrap());

        assert_eq!(manager.last_timeouts_at(&[fresh], now).base_timeout, None);
        assert_eq!(manager.last_timeouts_at(&[], now).base_timeout, None);
    }

    #[test]
    fn test_disabled_without_interval() {
        let manager = PublishTimeManager::new(None);
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap();
        let old = tx_created_at(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());

        assert_eq!(manager.last_timeouts_at(&[old], now), RollupTimeouts::default());
        assert_eq!(manager.next_timeouts_at(now), RollupTimeouts::default());
    }

    #[test]
    fn test_next_deadline() {
        let manager = PublishTimeManager::new(Some(600));
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 31, 0).unwrap();

        let next = manager.next_timeouts_at(now).base_timeout.unwrap();

        assert_eq!(next.deadline, Utc.with_ymd_and_hms(2024, 5, 1, 10, 40, 0).unwrap());
    }
}
