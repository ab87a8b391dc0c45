//! Bridge Registry
//!
//! Static bridge parameters from configuration, plus two runtime overlays:
//! on-chain gas limits (which take precedence over the static estimate) and
//! externally granted subsidies.

use crate::{
    BridgeAddressId, BridgeCallData, BridgeConfig, BridgeOracle, BridgeSubsidy,
    config::{BridgeDefaults, BridgeEntry},
};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::info;

pub struct BridgeRegistry {
    /// Used for bridges without an explicit entry
    defaults: BridgeConfig,
    configs: HashMap<BridgeAddressId, BridgeConfig>,
    /// Gas limits read from the settlement layer
    gas_overrides: RwLock<HashMap<BridgeAddressId, u64>>,
    /// Subsidy gas by `(bridge_address_id, criteria)`
    subsidies: RwLock<HashMap<(BridgeAddressId, u64), u64>>,
}

impl BridgeRegistry {
    pub fn new(defaults: &BridgeDefaults, entries: &[BridgeEntry]) -> Self {
        let configs = entries
            .iter()
            .map(|entry| {
                (
                    entry.address_id,
                    BridgeConfig {
                        batch_size: entry.batch_size,
                        gas: entry.gas,
                    },
                )
            })
            .collect();
        let subsidies = entries
            .iter()
            .filter_map(|entry| {
                entry
                    .subsidy
                    .as_ref()
                    .map(|s| ((entry.address_id, s.criteria), s.gas))
            })
            .collect();

        Self {
            defaults: BridgeConfig {
                batch_size: defaults.batch_size,
                gas: defaults.gas,
            },
            configs,
            gas_overrides: RwLock::new(HashMap::new()),
            subsidies: RwLock::new(subsidies),
        }
    }

    /// Record the gas limit the settlement layer currently enforces for a bridge
    pub fn set_gas_override(&self, bridge_address_id: BridgeAddressId, gas: u64) {
        info!("Bridge {} gas limit set on-chain to {}", bridge_address_id, gas);
        self.gas_overrides
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(bridge_address_id, gas);
    }

    pub fn clear_gas_override(&self, bridge_address_id: BridgeAddressId) {
        self.gas_overrides
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&bridge_address_id);
    }

    /// Grant (or with `gas = 0`, withdraw) a subsidy
    pub fn set_subsidy(&self, bridge_address_id: BridgeAddressId, criteria: u64, gas: u64) {
        let mut subsidies = self.subsidies.write().unwrap_or_else(PoisonError::into_inner);
        if gas == 0 {
            subsidies.remove(&(bridge_address_id, criteria));
        } else {
            subsidies.insert((bridge_address_id, criteria), gas);
        }
    }
}

impl BridgeOracle for BridgeRegistry {
    fn config_of(&self, bridge_address_id: BridgeAddressId) -> BridgeConfig {
        self.configs
            .get(&bridge_address_id)
            .copied()
            .unwrap_or(self.defaults)
    }

    fn full_gas_cost(&self, bridge_call_data: BridgeCallData) -> u64 {
        let bridge_address_id = bridge_call_data.bridge_address_id();
        let on_chain = self
            .gas_overrides
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&bridge_address_id)
            .copied();
        on_chain.unwrap_or_else(|| self.config_of(bridge_address_id).gas)
    }

    fn subsidy(&self, bridge_call_data: BridgeCallData) -> BridgeSubsidy {
        let bridge_address_id = bridge_call_data.bridge_address_id();
        let criteria = bridge_call_data.criteria();
        let gas = self
            .subsidies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(bridge_address_id, criteria))
            .copied()
            .unwrap_or(0);
        BridgeSubsidy {
            gas,
            bridge_address_id,
            criteria,
        }
    }
}
