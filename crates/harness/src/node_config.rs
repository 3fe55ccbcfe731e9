//! Node TOML configuration for bootstrap and worker nodes.

use crate::{
    capabilities::{needs_web_api_gateway, VAULT, WORKFLOW, WRITE_EVM},
    config::{BlockchainConfig, EnvironmentConfig},
};
use alloy::primitives::Address;
use cre_types::{keys, DonMetadata, GatewayConnector, NodeMetadata, NodeRole, Topology};
use std::collections::BTreeMap;

/// Node config errors.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// worker nodes need a bootstrapper to peer with
    #[error("no bootstrap node available for DON {0}")]
    NoBootstrap(String),
    /// invalid DON metadata
    #[error(transparent)]
    Don(#[from] cre_types::don::Error),
}

/// EVM chain as seen by one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmChain<'a> {
    /// Chain.
    pub chain: &'a BlockchainConfig,
    /// Node's transmitter address, required for the workflow section.
    pub from_address: Option<String>,
    /// Keystone forwarder. When set together with `from_address` the node writes through it.
    pub forwarder: Option<Address>,
}

fn evm_section(out: &mut String, chains: &[EvmChain<'_>], worker: bool) {
    for evm in chains {
        let chain = evm.chain;
        out.push_str(&format!(
            r#"
[[EVM]]
ChainID = '{}'
AutoCreateKey = false
"#,
            chain.chain_id
        ));
        if worker {
            out.push_str("FinalityDepth = 1\nLogPollInterval = '5s'\n");
        }
        out.push_str(&format!(
            r#"
[[EVM.Nodes]]
Name = '{}'
WSURL = '{}'
HTTPURL = '{}'
"#,
            chain.name, chain.ws_rpc, chain.http_rpc
        ));

        if let (true, Some(from), Some(forwarder)) = (worker, &evm.from_address, evm.forwarder) {
            out.push_str(&format!(
                r#"
[EVM.Workflow]
FromAddress = '{from}'
ForwarderAddress = '{forwarder}'
GasLimitDefault = 400_000
TxAcceptanceState = 2
PollPeriod = '2s'
AcceptanceTimeout = '30s'

[EVM.Transactions]
ForwardersEnabled = true
"#
            ));
        }
    }
}

fn external_registry(out: &mut String, registry: Address, home_chain_id: u64) {
    out.push_str(&format!(
        r#"
[Capabilities.ExternalRegistry]
Address = '{registry}'
NetworkID = 'evm'
ChainID = '{home_chain_id}'
"#
    ));
}

const OCR_AND_FEATURES: &str = r#"[Feature]
LogPoller = true

[OCR2]
Enabled = true
DatabaseTimeout = '1s'
ContractPollInterval = '1s'
"#;

/// Config of a bootstrap node. It peers with itself on both networks.
pub fn bootstrap_node_config(
    peer_id: &str,
    home_chain_id: u64,
    capabilities_registry: Address,
    chains: &[EvmChain<'_>],
) -> String {
    let mut out = String::from(OCR_AND_FEATURES);
    out.push_str(&format!(
        r#"
[P2P.V2]
Enabled = true
ListenAddresses = ['0.0.0.0:5001']
DefaultBootstrappers = ['{peer_id}@localhost:5001']

[Capabilities.Peering.V2]
Enabled = true
ListenAddresses = ['0.0.0.0:6690']
DefaultBootstrappers = ['{peer_id}@localhost:6690']
"#
    ));
    evm_section(&mut out, chains, false);
    external_registry(&mut out, capabilities_registry, home_chain_id);

    out
}

/// Inputs of [`worker_node_config`].
#[derive(Debug, Clone)]
pub struct WorkerConfigInput<'a> {
    /// `peer@host:5001` of the DON's OCR bootstrapper.
    pub ocr_bootstrapper: String,
    /// `peer@host:6690` of the global capabilities bootstrapper.
    pub capabilities_bootstrapper: String,
    /// Home chain id.
    pub home_chain_id: u64,
    /// Capabilities registry.
    pub capabilities_registry: Address,
    /// Chains.
    pub chains: Vec<EvmChain<'a>>,
    /// Workflow registry, only for workflow DON nodes.
    pub workflow_registry: Option<Address>,
    /// Gateway connector and the node's home chain address, for DONs behind the gateway.
    pub gateway: Option<(&'a GatewayConnector, String)>,
}

/// Config of a worker node.
pub fn worker_node_config(input: &WorkerConfigInput<'_>) -> String {
    let mut out = String::from(OCR_AND_FEATURES);
    out.push_str(&format!(
        r#"
[P2P.V2]
Enabled = true
ListenAddresses = ['0.0.0.0:5001']
DefaultBootstrappers = ['{}']

[Capabilities.Peering.V2]
Enabled = true
ListenAddresses = ['0.0.0.0:6690']
DefaultBootstrappers = ['{}']
"#,
        input.ocr_bootstrapper, input.capabilities_bootstrapper
    ));
    evm_section(&mut out, &input.chains, true);
    external_registry(&mut out, input.capabilities_registry, input.home_chain_id);

    if let Some(registry) = input.workflow_registry {
        out.push_str(&format!(
            r#"
[Capabilities.WorkflowRegistry]
Address = '{registry}'
NetworkID = 'evm'
ChainID = '{}'
"#,
            input.home_chain_id
        ));
    }

    if let Some((connector, node_address)) = &input.gateway {
        out.push_str(&format!(
            r#"
[Capabilities.GatewayConnector]
DonID = 'workflows'
ChainIDForNodeKey = '{}'
NodeAddress = '{node_address}'

[[Capabilities.GatewayConnector.Gateways]]
Id = 'gateway0'
URL = '{}'
"#,
            input.home_chain_id,
            connector.url()
        ));
    }

    out
}

fn don_needs_gateway(don: &DonMetadata) -> bool {
    don.has_flag(WORKFLOW) || don.has_flag(VAULT) || needs_web_api_gateway(&don.flags)
}

fn chains_for_node<'a>(
    config: &'a EnvironmentConfig,
    don: &DonMetadata,
    node: &NodeMetadata,
) -> Vec<EvmChain<'a>> {
    config
        .blockchains
        .iter()
        .map(|chain| EvmChain {
            chain,
            from_address: node
                .label_value(&keys::address_key(chain.chain_selector))
                .ok()
                .map(str::to_string),
            forwarder: don
                .has_flag(WRITE_EVM)
                .then(|| config.contracts.forwarders.get(&chain.chain_id).copied())
                .flatten(),
        })
        .collect()
}

/// Generate the TOML config of every node, keyed by DON id and node index.
pub fn generate_node_configs(
    config: &EnvironmentConfig,
    topology: &Topology,
) -> Result<BTreeMap<(u32, usize), String>, Error> {
    let home = config.home_chain();
    let registry = config.contracts.capabilities_registry;
    let mut configs = BTreeMap::new();

    for don in &topology.dons {
        let don_bootstrap = don.bootstrap_node()?;

        for node in &don.nodes {
            let chains = chains_for_node(config, don, node);

            if node.has_role(NodeRole::Bootstrap) {
                let toml = bootstrap_node_config(node.peer_id()?, home.chain_id, registry, &chains);
                configs.insert((don.id, node.index), toml);
                continue;
            }

            let peering =
                topology.peering.as_ref().ok_or_else(|| Error::NoBootstrap(don.name.clone()))?;
            let ocr_bootstrapper = match don_bootstrap {
                Some(bootstrap) => format!(
                    "{}@{}:{}",
                    bootstrap.peer_id()?,
                    bootstrap.label_value(keys::HOST)?,
                    peering.ocr.port
                ),
                None => peering.ocr.bootstrapper(),
            };

            let gateway = match (&topology.gateway_connector, don_needs_gateway(don)) {
                (Some(connector), true) => {
                    let address =
                        node.label_value(&keys::address_key(topology.home_chain_selector))?;
                    Some((connector, address.to_string()))
                }
                _ => None,
            };

            let input = WorkerConfigInput {
                ocr_bootstrapper,
                capabilities_bootstrapper: peering.capabilities.bootstrapper(),
                home_chain_id: home.chain_id,
                capabilities_registry: registry,
                chains,
                workflow_registry: if don.id == topology.workflow_don_id {
                    config.contracts.workflow_registry
                } else {
                    None
                },
                gateway,
            };
            configs.insert((don.id, node.index), worker_node_config(&input));
        }
    }

    Ok(configs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> BlockchainConfig {
        BlockchainConfig {
            name: "anvil".into(),
            chain_id: 1337,
            chain_selector: 42,
            http_rpc: "http://anvil:8545".into(),
            ws_rpc: "ws://anvil:8545".into(),
        }
    }

    #[test]
    fn bootstrap_points_at_itself() {
        let chain = chain();
        let chains =
            [EvmChain { chain: &chain, from_address: None, forwarder: Some(Address::ZERO) }];
        let raw = bootstrap_node_config("12D3", 1337, Address::repeat_byte(0xc1), &chains);

        let parsed: toml::Table = raw.parse().unwrap();
        assert_eq!(
            parsed["P2P"]["V2"]["DefaultBootstrappers"][0].as_str(),
            Some("12D3@localhost:5001")
        );
        assert_eq!(parsed["EVM"][0]["ChainID"].as_str(), Some("1337"));
        // bootstrap nodes never transmit
        assert!(parsed["EVM"][0].get("Workflow").is_none());
        assert_eq!(parsed["Capabilities"]["ExternalRegistry"]["ChainID"].as_str(), Some("1337"));
    }

    #[test]
    fn worker_sections() {
        let chain = chain();
        let connector =
            GatewayConnector { host: "gateway-node0".into(), port: 5003, path: "/node".into() };
        let input = WorkerConfigInput {
            ocr_bootstrapper: "12D3@bootstrap:5001".into(),
            capabilities_bootstrapper: "12D3@bootstrap:6690".into(),
            home_chain_id: 1337,
            capabilities_registry: Address::repeat_byte(0xc1),
            chains: vec![EvmChain {
                chain: &chain,
                from_address: Some("0xabc".into()),
                forwarder: Some(Address::repeat_byte(0xf1)),
            }],
            workflow_registry: Some(Address::repeat_byte(0xee)),
            gateway: Some((&connector, "0xabc".into())),
        };

        let parsed: toml::Table = worker_node_config(&input).parse().unwrap();
        let evm = &parsed["EVM"][0];
        assert_eq!(evm["Workflow"]["FromAddress"].as_str(), Some("0xabc"));
        assert_eq!(evm["Transactions"]["ForwardersEnabled"].as_bool(), Some(true));
        assert_eq!(evm["Nodes"][0]["WSURL"].as_str(), Some("ws://anvil:8545"));

        let capabilities = &parsed["Capabilities"];
        assert_eq!(
            capabilities["Peering"]["V2"]["DefaultBootstrappers"][0].as_str(),
            Some("12D3@bootstrap:6690")
        );
        assert!(capabilities.get("WorkflowRegistry").is_some());
        assert_eq!(
            capabilities["GatewayConnector"]["Gateways"][0]["URL"].as_str(),
            Some("ws://gateway-node0:5003/node")
        );
    }

    #[test]
    fn worker_without_forwarder_or_gateway() {
        let chain = chain();
        let input = WorkerConfigInput {
            ocr_bootstrapper: "a@b:5001".into(),
            capabilities_bootstrapper: "a@b:6690".into(),
            home_chain_id: 1337,
            capabilities_registry: Address::ZERO,
            chains: vec![EvmChain {
                chain: &chain,
                from_address: Some("0xabc".into()),
                forwarder: None,
            }],
            workflow_registry: None,
            gateway: None,
        };

        let parsed: toml::Table = worker_node_config(&input).parse().unwrap();
        assert!(parsed["EVM"][0].get("Workflow").is_none());
        assert!(parsed["Capabilities"].get("GatewayConnector").is_none());
        assert!(parsed["Capabilities"].get("WorkflowRegistry").is_none());
    }
}
