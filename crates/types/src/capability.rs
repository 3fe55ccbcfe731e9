//! Capability configuration and how global, per chain and per DON settings are layered.
//!
//! Layering is a shallow key overwrite. Later layers replace whole values, nested tables are not
//! merged.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free form capability configuration.
pub type ConfigMap = toml::Table;

/// Global configuration of a capability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapabilityConfig {
    /// Path to the capability binary on the host. Only the file name is used inside containers.
    #[serde(default)]
    pub binary_path: Option<String>,
    /// Default configuration values.
    #[serde(default)]
    pub config: ConfigMap,
}

/// Per node set settings of a chain specific capability.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainCapabilityConfig {
    /// Chain ids the capability runs for.
    pub enabled_chains: Vec<u64>,
    /// Configuration overrides keyed by chain id.
    pub chain_overrides: BTreeMap<u64, ConfigMap>,
}

impl ChainCapabilityConfig {
    /// Whether the capability is enabled for `chain_id`.
    pub fn is_enabled_for(&self, chain_id: u64) -> bool {
        self.enabled_chains.contains(&chain_id)
    }
}

fn overwrite(into: &mut ConfigMap, from: &ConfigMap) {
    for (key, value) in from {
        into.insert(key.clone(), value.clone());
    }
}

/// Configuration of `flag` for a DON: the global defaults overwritten by the DON's overrides.
pub fn resolve_capability_config_for_don(
    flag: &str,
    global: &ConfigMap,
    don_overrides: &BTreeMap<String, ConfigMap>,
) -> ConfigMap {
    let mut merged = global.clone();
    if let Some(overrides) = don_overrides.get(flag) {
        overwrite(&mut merged, overrides);
    }

    merged
}

/// Configuration of `flag` for `chain_id` on a DON.
///
/// Returns `None` when the capability is not enabled for the chain. Otherwise layers global
/// defaults, then the chain overrides, then the DON overrides. Last write wins.
pub fn resolve_capability_for_chain(
    flag: &str,
    global: &ConfigMap,
    chain_capabilities: &BTreeMap<String, ChainCapabilityConfig>,
    don_overrides: &BTreeMap<String, ConfigMap>,
    chain_id: u64,
) -> Option<ConfigMap> {
    let chain_config = chain_capabilities.get(flag)?;
    if !chain_config.is_enabled_for(chain_id) {
        return None;
    }

    let mut merged = global.clone();
    if let Some(overrides) = chain_config.chain_overrides.get(&chain_id) {
        overwrite(&mut merged, overrides);
    }
    if let Some(overrides) = don_overrides.get(flag) {
        overwrite(&mut merged, overrides);
    }

    Some(merged)
}
