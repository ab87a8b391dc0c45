//! Configuration Module
//!
//! This module defines all configuration structures for the rollup coordinator.
//! Configuration is loaded from TOML files and parsed using serde.

use crate::{AssetId, BridgeAddressId, TxKind};
use serde::Deserialize;
use std::fs;

/// Main configuration structure
///
/// Contains all configuration sections for the service.
/// Loaded from a TOML file (e.g., config/default.toml).
///
/// # Example TOML
/// ```toml
/// [coordinator]
/// num_inner_rollup_txs = 28
/// num_outer_rollup_proofs = 32
/// number_of_bridge_calls = 32
/// number_of_assets = 16
/// max_gas_for_rollup = 12000000
/// call_data_per_rollup = 120000
///
/// [timeouts]
/// base_timeout_secs = 3600
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    pub costs: CostConfig,
    pub bridge_defaults: BridgeDefaults,
    #[serde(default)]
    pub bridges: Vec<BridgeEntry>,
    pub pipeline: PipelineConfig,
    pub api: ApiConfig,
    pub database: DatabaseConfig,
}

/// Rollup shape and budgets
///
/// # Fields
/// - `num_inner_rollup_txs`: Transactions per inner rollup group
/// - `num_outer_rollup_proofs`: Inner groups per published rollup
/// - `number_of_bridge_calls`: Distinct bridge interactions per rollup
/// - `number_of_assets`: Distinct fee-paying assets per rollup
/// - `max_gas_for_rollup`: Settlement gas budget
/// - `call_data_per_rollup`: Call-data budget in bytes
#[derive(Debug, Clone, Deserialize)]
pub struct CoordinatorConfig {
    pub num_inner_rollup_txs: usize,
    pub num_outer_rollup_proofs: usize,
    pub number_of_bridge_calls: usize,
    pub number_of_assets: usize,
    pub max_gas_for_rollup: u64,
    pub call_data_per_rollup: u64,
}

impl CoordinatorConfig {
    /// Maximum number of transactions a published rollup can hold
    pub fn max_txs(&self) -> usize {
        self.num_inner_rollup_txs * self.num_outer_rollup_proofs
    }
}

/// Publish interval configuration
///
/// Without `base_timeout_secs` a partial rollup is only published by the
/// other triggers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeoutConfig {
    pub base_timeout_secs: Option<u64>,
}

/// Gas and call-data price of a single transaction kind
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct KindCost {
    pub gas: u64,
    pub call_data: u64,
}

/// Cost table used by the local fee schedule
#[derive(Debug, Clone, Deserialize)]
pub struct CostConfig {
    pub transfer: KindCost,
    pub deposit: KindCost,
    pub withdraw_high_gas: KindCost,
    pub withdraw_to_wallet: KindCost,
    pub account: KindCost,
    pub defi_deposit: KindCost,
    pub defi_claim: KindCost,
    pub base_slot_gas: u64,
    #[serde(default)]
    pub fee_paying_assets: Vec<AssetId>,
}

impl CostConfig {
    pub fn cost_of(&self, kind: TxKind) -> KindCost {
        match kind {
            TxKind::Transfer => self.transfer,
            TxKind::Deposit => self.deposit,
            TxKind::WithdrawHighGas => self.withdraw_high_gas,
            TxKind::WithdrawToWallet => self.withdraw_to_wallet,
            TxKind::Account => self.account,
            TxKind::DefiDeposit => self.defi_deposit,
            TxKind::DefiClaim => self.defi_claim,
        }
    }
}

/// Parameters applied to bridges without an explicit entry
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeDefaults {
    pub batch_size: u32,
    pub gas: u64,
}

/// A configured bridge
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeEntry {
    pub address_id: BridgeAddressId,
    pub batch_size: u32,
    pub gas: u64,
    #[serde(default)]
    pub subsidy: Option<SubsidyEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubsidyEntry {
    pub gas: u64,
    #[serde(default)]
    pub criteria: u64,
}

/// Pipeline loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub poll_interval_ms: u64,
}

/// API server configuration
///
/// # Fields
/// - `host`: IP address to bind to (e.g., "127.0.0.1" or "0.0.0.0")
/// - `port`: TCP port to listen on (e.g., 8545)
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

/// Database configuration
///
/// Settings for the rollup registry database.
///
/// # Fields
/// - `url`: Database connection URL (e.g., "sqlite://registry.db")
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the TOML configuration file
    ///
    /// # Returns
    /// * `Ok(Config)` if the file was successfully loaded and parsed
    /// * `Err` if the file couldn't be read or the TOML is invalid
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and sanity-check configuration from TOML text
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;

        let coordinator = &config.coordinator;
        if coordinator.num_inner_rollup_txs == 0 || coordinator.num_outer_rollup_proofs == 0 {
            anyhow::bail!("rollup shape must hold at least one transaction");
        }
        if coordinator.number_of_bridge_calls == 0 {
            anyhow::bail!("number_of_bridge_calls must be positive");
        }
        if config.bridge_defaults.batch_size == 0
            || config.bridges.iter().any(|b| b.batch_size == 0)
        {
            anyhow::bail!("bridge batch sizes must be positive");
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

    #[test]
    fn test_default_config_parses() {
        let config = Config::parse(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.coordinator.number_of_bridge_calls, 32);
        assert_eq!(
            config.coordinator.max_txs(),
            config.coordinator.num_inner_rollup_txs * config.coordinator.num_outer_rollup_proofs
        );
        assert!(!config.bridges.is_empty());
        assert_eq!(
            config.costs.cost_of(TxKind::DefiDeposit).gas,
            config.costs.defi_deposit.gas
        );
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let broken = DEFAULT_CONFIG.replacen("batch_size = 32", "batch_size = 0", 1);
        assert!(Config::parse(&broken).is_err());
    }
}
