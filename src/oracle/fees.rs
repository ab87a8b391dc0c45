use crate::{AssetId, BridgeCallData, BridgeOracle, CostOracle, TxKind, config::CostConfig};
use std::collections::HashSet;
use std::sync::Arc;

/// Cost oracle backed by the configured cost table
pub struct FeeSchedule {
    costs: CostConfig,
    fee_paying_assets: HashSet<AssetId>,
    bridges: Arc<dyn BridgeOracle>,
}

impl FeeSchedule {
    pub fn new(costs: CostConfig, bridges: Arc<dyn BridgeOracle>) -> Self {
        let fee_paying_assets = costs.fee_paying_assets.iter().copied().collect();
        Self {
            costs,
            fee_paying_assets,
            bridges,
        }
    }
}

impl CostOracle for FeeSchedule {
    fn gas_for(&self, kind: TxKind) -> u64 {
        self.costs.cost_of(kind).gas
    }

    fn call_data_for(&self, kind: TxKind) -> u64 {
        self.costs.cost_of(kind).call_data
    }

    fn single_bridge_share(&self, bridge_call_data: BridgeCallData) -> u64 {
        let batch_size = self
            .bridges
            .config_of(bridge_call_data.bridge_address_id())
            .batch_size
            .max(1);
        self.bridges
            .full_gas_cost(bridge_call_data)
            .div_ceil(u64::from(batch_size))
    }

    fn is_fee_paying_asset(&self, asset_id: AssetId) -> bool {
        self.fee_paying_assets.contains(&asset_id)
    }

    fn base_slot_gas(&self) -> u64 {
        self.costs.base_slot_gas
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BridgeDefaults, BridgeEntry, KindCost};
    use crate::oracle::BridgeRegistry;

    fn schedule() -> (FeeSchedule, Arc<BridgeRegistry>) {
        let kind = KindCost {
            gas: 20_000,
            call_data: 184,
        };
        let costs = CostConfig {
            transfer: kind,
            deposit: kind,
            withdraw_high_gas: KindCost { gas: 60_000, ..kind },
            withdraw_to_wallet: kind,
            account: kind,
            defi_deposit: KindCost { gas: 70_000, ..kind },
            defi_claim: kind,
            base_slot_gas: 20_000,
            fee_paying_assets: vec![0, 1],
        };
        let bridges = Arc::new(BridgeRegistry::new(
            &BridgeDefaults {
                batch_size: 32,
                gas: 300_000,
            },
            &[BridgeEntry {
                address_id: 1,
                batch_size: 3,
                gas: 1_000_000,
                subsidy: None,
            }],
        ));
        (FeeSchedule::new(costs, bridges.clone()), bridges)
    }

    #[test]
    fn test_bridge_share_rounds_up() {
        let (schedule, _) = schedule();
        assert_eq!(schedule.single_bridge_share(BridgeCallData::new(1, 0, 0)), 333_334);
    }

    #[test]
    fn test_bridge_share_follows_on_chain_gas() {
        let (schedule, bridges) = schedule();
        bridges.set_gas_override(1, 300_000);
        assert_eq!(schedule.single_bridge_share(BridgeCallData::new(1, 0, 0)), 100_000);
    }

    #[test]
    fn test_kind_costs_and_fee_assets() {
        let (schedule, _) = schedule();
        assert_eq!(schedule.gas_for(TxKind::DefiDeposit), 70_000);
        assert_eq!(schedule.gas_for(TxKind::WithdrawHighGas), 60_000);
        assert_eq!(schedule.call_data_for(TxKind::Transfer), 184);
        assert!(schedule.is_fee_paying_asset(1));
        assert!(!schedule.is_fee_paying_asset(7));
    }
}
