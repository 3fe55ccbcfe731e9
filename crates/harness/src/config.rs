//! Environment configuration loaded from TOML.
//!
//! The file mirrors [`EnvironmentConfig`] except for maps keyed by chain id: TOML table keys are
//! strings, so those are deserialized into string keyed maps first and converted afterwards.

use crate::capabilities::{known_capability, Scope, WORKFLOW};
use alloy::primitives::Address;
use cre_types::{CapabilityConfig, ChainCapabilityConfig, ConfigMap};
use serde::Deserialize;
use std::{collections::BTreeMap, path::Path};

/// Env var overriding `jd.grpc_url`.
pub const ENV_JD_GRPC_URL: &str = "CRE_JD_GRPC_URL";
/// Env var holding the hex encoded private key used for registry transactions.
pub const ENV_DEPLOYER_PRIVATE_KEY: &str = "CRE_DEPLOYER_PRIVATE_KEY";

/// Configuration errors.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// failed to read the config file
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// config path
        path: String,
        /// io error
        source: std::io::Error,
    },
    /// failed to parse TOML
    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    /// a map key is not a chain id
    #[error("{section}: key {key:?} is not a numeric chain id")]
    InvalidChainId {
        /// where the key was found
        section: String,
        /// offending key
        key: String,
    },
    /// no node sets configured
    #[error("at least one node set must be configured")]
    NoNodeSets,
    /// no blockchains configured
    #[error("at least one blockchain must be configured")]
    NoBlockchains,
    /// node set without nodes
    #[error("node set {0} has no nodes")]
    NoNodes(String),
    /// duplicate node set name
    #[error("node set name {0} is used more than once")]
    DuplicateNodeSet(String),
    /// unknown capability flag
    #[error("node set {node_set}: unknown capability {flag}")]
    UnknownCapability {
        /// node set name
        node_set: String,
        /// flag
        flag: String,
    },
    /// chain capability section for a capability that is not chain scoped
    #[error("node set {node_set}: capability {flag} is not chain specific")]
    NotChainScoped {
        /// node set name
        node_set: String,
        /// flag
        flag: String,
    },
    /// node index out of range
    #[error("node set {node_set}: {field} {index} is out of range for {nodes} nodes")]
    IndexOutOfRange {
        /// node set name
        node_set: String,
        /// index field name
        field: &'static str,
        /// configured index
        index: i64,
        /// number of nodes
        nodes: usize,
    },
    /// enabled chain not among the configured blockchains
    #[error("node set {node_set}: capability {flag} enables chain {chain_id} which is not configured")]
    UnknownChain {
        /// node set name
        node_set: String,
        /// flag
        flag: String,
        /// chain id
        chain_id: u64,
    },
    /// no workflow DON
    #[error("no node set has the {} capability", WORKFLOW)]
    NoWorkflowDon,
}

/// Job distributor connection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JdConfig {
    /// gRPC endpoint, for example `http://localhost:14231`.
    pub grpc_url: String,
    /// Seconds to wait for nodes to connect after registration.
    #[serde(default = "default_wait_secs")]
    pub wait_for_connection_secs: u64,
}

const fn default_wait_secs() -> u64 {
    120
}

/// Outgoing HTTP the gateway allows besides ports 80 and 443.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GatewayHttpConfig {
    /// Extra allowed ports.
    pub extra_allowed_ports: Vec<u16>,
    /// Allowed IPs.
    pub extra_allowed_ips: Vec<String>,
    /// Allowed IP ranges in CIDR notation.
    pub extra_allowed_ips_cidr: Vec<String>,
}

/// A blockchain the nodes connect to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BlockchainConfig {
    /// Chain name, used as the node name in the EVM section.
    pub name: String,
    /// EVM chain id.
    pub chain_id: u64,
    /// Chain selector.
    pub chain_selector: u64,
    /// HTTP RPC url reachable from the nodes.
    pub http_rpc: String,
    /// WS RPC url reachable from the nodes.
    pub ws_rpc: String,
}

/// Deployed contracts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractsConfig {
    /// Capabilities registry on the home chain.
    pub capabilities_registry: Address,
    /// Workflow registry on the home chain.
    pub workflow_registry: Option<Address>,
    /// OCR3 capability contract on the home chain.
    pub ocr3_capability: Option<Address>,
    /// Keystone forwarders by chain id.
    pub forwarders: BTreeMap<u64, Address>,
}

/// A node of a node set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeConfig {
    /// Job distributor node id, if the node is already registered.
    pub node_id: Option<String>,
    /// CSA public key.
    pub csa_key: String,
    /// P2P peer id.
    pub p2p_id: String,
    /// 32 byte P2P public key, hex.
    pub p2p_key: Option<String>,
    /// Host name other nodes use.
    pub host: String,
    /// OCR2 key bundle id.
    pub ocr2_key_bundle_id: Option<String>,
    /// OCR2 on-chain signer address.
    pub ocr2_signer: Option<Address>,
    /// Workflow encryption public key, hex.
    pub encryption_key: Option<String>,
    /// Transmitter addresses by chain id.
    pub eth_addresses: BTreeMap<u64, Address>,
}

/// A node set, which becomes one DON.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeSetConfig {
    /// Node set name, also the DON name.
    pub name: String,
    /// Capability flags.
    pub capabilities: Vec<String>,
    /// Index of the bootstrap node, if any.
    pub bootstrap_node_index: Option<usize>,
    /// Index of the gateway node, if any.
    pub gateway_node_index: Option<usize>,
    /// Per capability config overrides for this DON.
    pub capability_overrides: BTreeMap<String, ConfigMap>,
    /// Chain specific capabilities.
    pub chain_capabilities: BTreeMap<String, ChainCapabilityConfig>,
    /// Nodes.
    pub nodes: Vec<NodeConfig>,
}

impl NodeSetConfig {
    /// Flags of the DON: the configured capabilities plus `<flag>-<chain id>` for every enabled
    /// chain capability.
    pub fn flags(&self) -> Vec<String> {
        let mut flags = self.capabilities.clone();
        for (flag, chains) in &self.chain_capabilities {
            for chain_id in &chains.enabled_chains {
                flags.push(format!("{flag}-{chain_id}"));
            }
        }

        flags
    }
}

/// The full environment configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentConfig {
    /// Job distributor.
    pub jd: JdConfig,
    /// Blockchains, the first one is the home chain.
    pub blockchains: Vec<BlockchainConfig>,
    /// Deployed contracts.
    pub contracts: ContractsConfig,
    /// Global capability configs by flag.
    pub capability_configs: BTreeMap<String, CapabilityConfig>,
    /// Node sets in DON id order.
    pub nodesets: Vec<NodeSetConfig>,
    /// Gateway HTTP allow lists.
    pub gateway: GatewayHttpConfig,
}

#[derive(Deserialize)]
struct ContractsRepr {
    capabilities_registry: Address,
    #[serde(default)]
    workflow_registry: Option<Address>,
    #[serde(default)]
    ocr3_capability: Option<Address>,
    #[serde(default)]
    forwarders: BTreeMap<String, Address>,
}

#[derive(Deserialize)]
struct NodeRepr {
    #[serde(default)]
    node_id: Option<String>,
    csa_key: String,
    p2p_id: String,
    #[serde(default)]
    p2p_key: Option<String>,
    host: String,
    #[serde(default)]
    ocr2_key_bundle_id: Option<String>,
    #[serde(default)]
    ocr2_signer: Option<Address>,
    #[serde(default)]
    encryption_key: Option<String>,
    #[serde(default)]
    eth_addresses: BTreeMap<String, Address>,
}

#[derive(Deserialize)]
struct ChainCapabilityRepr {
    #[serde(default)]
    enabled_chains: Vec<u64>,
    #[serde(default)]
    chain_overrides: BTreeMap<String, ConfigMap>,
}

#[derive(Deserialize)]
struct NodeSetRepr {
    name: String,
    #[serde(default)]
    capabilities: Vec<String>,
    #[serde(default)]
    bootstrap_node_index: Option<i64>,
    #[serde(default)]
    gateway_node_index: Option<i64>,
    #[serde(default)]
    capability_overrides: BTreeMap<String, ConfigMap>,
    #[serde(default)]
    chain_capabilities: BTreeMap<String, ChainCapabilityRepr>,
    #[serde(default)]
    nodes: Vec<NodeRepr>,
}

#[derive(Deserialize)]
struct EnvironmentRepr {
    jd: JdConfig,
    #[serde(default)]
    blockchains: Vec<BlockchainConfig>,
    contracts: ContractsRepr,
    #[serde(default)]
    capability_configs: BTreeMap<String, CapabilityConfig>,
    #[serde(default)]
    nodesets: Vec<NodeSetRepr>,
    #[serde(default)]
    gateway: GatewayHttpConfig,
}

fn chain_keyed<V>(section: &str, map: BTreeMap<String, V>) -> Result<BTreeMap<u64, V>, Error> {
    map.into_iter()
        .map(|(key, value)| {
            key.trim()
                .parse::<u64>()
                .map(|chain_id| (chain_id, value))
                .map_err(|_| Error::InvalidChainId { section: section.to_string(), key })
        })
        .collect()
}

fn node_index(
    node_set: &str,
    field: &'static str,
    index: Option<i64>,
    nodes: usize,
) -> Result<Option<usize>, Error> {
    match index {
        None | Some(-1) => Ok(None),
        Some(i) if i >= 0 && (i as usize) < nodes => Ok(Some(i as usize)),
        Some(i) => {
            Err(Error::IndexOutOfRange { node_set: node_set.to_string(), field, index: i, nodes })
        }
    }
}

impl TryFrom<NodeSetRepr> for NodeSetConfig {
    type Error = Error;

    fn try_from(repr: NodeSetRepr) -> Result<Self, Error> {
        let nodes = repr
            .nodes
            .into_iter()
            .enumerate()
            .map(|(i, n)| {
                Ok(NodeConfig {
                    node_id: n.node_id,
                    csa_key: n.csa_key,
                    p2p_id: n.p2p_id,
                    p2p_key: n.p2p_key,
                    host: n.host,
                    ocr2_key_bundle_id: n.ocr2_key_bundle_id,
                    ocr2_signer: n.ocr2_signer,
                    encryption_key: n.encryption_key,
                    eth_addresses: chain_keyed(
                        &format!("nodesets.{}.nodes[{i}].eth_addresses", repr.name),
                        n.eth_addresses,
                    )?,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let chain_capabilities = repr
            .chain_capabilities
            .into_iter()
            .map(|(flag, c)| {
                let section = format!("nodesets.{}.chain_capabilities.{flag}", repr.name);
                let config = ChainCapabilityConfig {
                    enabled_chains: c.enabled_chains,
                    chain_overrides: chain_keyed(&section, c.chain_overrides)?,
                };
                Ok((flag, config))
            })
            .collect::<Result<BTreeMap<_, _>, Error>>()?;

        Ok(Self {
            bootstrap_node_index: node_index(
                &repr.name,
                "bootstrap_node_index",
                repr.bootstrap_node_index,
                nodes.len(),
            )?,
            gateway_node_index: node_index(
                &repr.name,
                "gateway_node_index",
                repr.gateway_node_index,
                nodes.len(),
            )?,
            name: repr.name,
            capabilities: repr.capabilities,
            capability_overrides: repr.capability_overrides,
            chain_capabilities,
            nodes,
        })
    }
}

impl EnvironmentConfig {
    /// Read, parse and validate the config at `path`. `CRE_JD_GRPC_URL` overrides the JD url.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|source| Error::Read { path: path.display().to_string(), source })?;

        let mut config = Self::from_toml(&raw)?;
        if let Ok(url) = std::env::var(ENV_JD_GRPC_URL) {
            config.jd.grpc_url = url;
        }

        Ok(config)
    }

    /// Parse and validate TOML.
    pub fn from_toml(raw: &str) -> Result<Self, Error> {
        let repr: EnvironmentRepr = toml::from_str(raw)?;

        let contracts = ContractsConfig {
            capabilities_registry: repr.contracts.capabilities_registry,
            workflow_registry: repr.contracts.workflow_registry,
            ocr3_capability: repr.contracts.ocr3_capability,
            forwarders: chain_keyed("contracts.forwarders", repr.contracts.forwarders)?,
        };

        let nodesets =
            repr.nodesets.into_iter().map(NodeSetConfig::try_from).collect::<Result<_, _>>()?;

        let config = Self {
            jd: repr.jd,
            blockchains: repr.blockchains,
            contracts,
            capability_configs: repr.capability_configs,
            nodesets,
            gateway: repr.gateway,
        };
        config.validate()?;

        Ok(config)
    }

    /// Check the invariants parsing alone does not enforce.
    pub fn validate(&self) -> Result<(), Error> {
        if self.nodesets.is_empty() {
            return Err(Error::NoNodeSets);
        }
        if self.blockchains.is_empty() {
            return Err(Error::NoBlockchains);
        }

        let mut names = std::collections::HashSet::new();
        for node_set in &self.nodesets {
            if !names.insert(node_set.name.as_str()) {
                return Err(Error::DuplicateNodeSet(node_set.name.clone()));
            }
            if node_set.nodes.is_empty() {
                return Err(Error::NoNodes(node_set.name.clone()));
            }

            let unknown = |flag: &String| Error::UnknownCapability {
                node_set: node_set.name.clone(),
                flag: flag.clone(),
            };
            for flag in node_set.capabilities.iter().chain(node_set.capability_overrides.keys()) {
                known_capability(flag).ok_or_else(|| unknown(flag))?;
            }

            for (flag, chains) in &node_set.chain_capabilities {
                let known = known_capability(flag).ok_or_else(|| unknown(flag))?;
                if !matches!(known.scope, Scope::Chain | Scope::NodeConfig) {
                    return Err(Error::NotChainScoped {
                        node_set: node_set.name.clone(),
                        flag: flag.clone(),
                    });
                }

                let chain_ids = chains.enabled_chains.iter().chain(chains.chain_overrides.keys());
                for chain_id in chain_ids {
                    if self.blockchain(*chain_id).is_none() {
                        return Err(Error::UnknownChain {
                            node_set: node_set.name.clone(),
                            flag: flag.clone(),
                            chain_id: *chain_id,
                        });
                    }
                }
            }
        }

        if !self.nodesets.iter().any(|n| n.capabilities.iter().any(|c| c == WORKFLOW)) {
            return Err(Error::NoWorkflowDon);
        }

        Ok(())
    }

    /// The home chain, hosting the registries.
    pub fn home_chain(&self) -> &BlockchainConfig {
        &self.blockchains[0]
    }

    /// Blockchain with `chain_id`.
    pub fn blockchain(&self, chain_id: u64) -> Option<&BlockchainConfig> {
        self.blockchains.iter().find(|b| b.chain_id == chain_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toml::Value;

    const BASE: &str = r#"
[jd]
grpc_url = "http://localhost:14231"

[[blockchains]]
name = "anvil"
chain_id = 1337
chain_selector = 3379446385462418246
http_rpc = "http://anvil:8545"
ws_rpc = "ws://anvil:8545"

[contracts]
capabilities_registry = "0x00000000000000000000000000000000000000c1"

[contracts.forwarders]
"1337" = "0x00000000000000000000000000000000000000f1"

[capability_configs.evm]
binary_path = "./bin/evm"

[capability_configs.evm.config]
ReceiverGasMinimum = 500
"#;

    fn node_set(extra: &str) -> String {
        format!(
            r#"
[[nodesets]]
name = "workflow"
capabilities = ["workflow", "ocr3"]
{extra}

[[nodesets.nodes]]
csa_key = "csa0"
p2p_id = "p2p_0"
host = "workflow-node0"

[[nodesets.nodes]]
csa_key = "csa1"
p2p_id = "p2p_1"
host = "workflow-node1"

[nodesets.nodes.eth_addresses]
"1337" = "0x00000000000000000000000000000000000000a1"
"#
        )
    }

    #[test]
    fn parses_full_config() {
        let raw = format!(
            "{BASE}{}",
            node_set(
                r#"bootstrap_node_index = 0

[nodesets.capability_overrides.ocr3]
Foo = 1

[nodesets.chain_capabilities.evm]
enabled_chains = [1337]

[nodesets.chain_capabilities.evm.chain_overrides."1337"]
ReceiverGasMinimum = 1000"#
            )
        );
        let config = EnvironmentConfig::from_toml(&raw).unwrap();

        assert_eq!(config.jd.wait_for_connection_secs, 120);
        assert_eq!(config.home_chain().chain_id, 1337);
        assert!(config.contracts.forwarders.contains_key(&1337));
        assert_eq!(
            config.capability_configs["evm"].config["ReceiverGasMinimum"],
            Value::Integer(500)
        );

        let node_set = &config.nodesets[0];
        assert_eq!(node_set.bootstrap_node_index, Some(0));
        assert_eq!(node_set.gateway_node_index, None);
        assert_eq!(node_set.nodes[1].eth_addresses.len(), 1);
        assert_eq!(
            node_set.chain_capabilities["evm"].chain_overrides[&1337]["ReceiverGasMinimum"],
            Value::Integer(1000)
        );
        assert_eq!(node_set.flags(), vec!["workflow", "ocr3", "evm-1337"]);
    }

    #[test]
    fn parses_gateway_allow_lists() {
        let raw = format!(
            r#"{BASE}
[gateway]
extra_allowed_ports = [8080]
extra_allowed_ips = ["10.0.0.1"]
extra_allowed_ips_cidr = ["0.0.0.0/0"]
{}"#,
            node_set("")
        );
        let config = EnvironmentConfig::from_toml(&raw).unwrap();
        assert_eq!(config.gateway.extra_allowed_ports, vec![8080]);
        assert_eq!(config.gateway.extra_allowed_ips, vec!["10.0.0.1"]);
        assert_eq!(config.gateway.extra_allowed_ips_cidr, vec!["0.0.0.0/0"]);

        let config = EnvironmentConfig::from_toml(&format!("{BASE}{}", node_set(""))).unwrap();
        assert_eq!(config.gateway, GatewayHttpConfig::default());
    }

    #[test]
    fn minus_one_means_no_bootstrap() {
        let raw = format!("{BASE}{}", node_set("bootstrap_node_index = -1"));
        let config = EnvironmentConfig::from_toml(&raw).unwrap();
        assert_eq!(config.nodesets[0].bootstrap_node_index, None);
    }

    #[test]
    fn rejects_out_of_range_index() {
        let raw = format!("{BASE}{}", node_set("gateway_node_index = 2"));
        let err = EnvironmentConfig::from_toml(&raw).unwrap_err();
        assert!(matches!(
            err,
            Error::IndexOutOfRange { field: "gateway_node_index", index: 2, nodes: 2, .. }
        ));
    }

    #[test]
    fn rejects_unknown_capability() {
        let raw = format!("{BASE}{}", node_set("").replace("\"ocr3\"", "\"teleport\""));
        let err = EnvironmentConfig::from_toml(&raw).unwrap_err();
        assert!(matches!(err, Error::UnknownCapability { flag, .. } if flag == "teleport"));
    }

    #[test]
    fn rejects_unconfigured_chain() {
        let raw = format!(
            "{BASE}{}",
            node_set("[nodesets.chain_capabilities.evm]\nenabled_chains = [1]")
        );
        let err = EnvironmentConfig::from_toml(&raw).unwrap_err();
        assert!(matches!(err, Error::UnknownChain { chain_id: 1, .. }));
    }

    #[test]
    fn rejects_non_numeric_override_key() {
        let raw = format!(
            "{BASE}{}",
            node_set(
                "[nodesets.chain_capabilities.evm]\nenabled_chains = [1337]\n\n[nodesets.chain_capabilities.evm.chain_overrides.mainnet]\nA = 1"
            )
        );
        let err = EnvironmentConfig::from_toml(&raw).unwrap_err();
        assert!(matches!(err, Error::InvalidChainId { key, .. } if key == "mainnet"));
    }

    #[test]
    fn rejects_chain_section_for_don_capability() {
        let raw = format!(
            "{BASE}{}",
            node_set("[nodesets.chain_capabilities.cron]\nenabled_chains = [1337]")
        );
        let err = EnvironmentConfig::from_toml(&raw).unwrap_err();
        assert!(matches!(err, Error::NotChainScoped { flag, .. } if flag == "cron"));
    }

    #[test]
    fn requires_workflow_don_and_blockchains() {
        let raw = format!("{BASE}{}", node_set("").replace("\"workflow\", ", ""));
        assert!(matches!(EnvironmentConfig::from_toml(&raw).unwrap_err(), Error::NoWorkflowDon));

        let raw = BASE.replace("[[blockchains]]", "[[unused]]");
        let raw = format!("{raw}{}", node_set(""));
        assert!(matches!(EnvironmentConfig::from_toml(&raw).unwrap_err(), Error::NoBlockchains));
    }

    #[test]
    fn from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("env.toml");
        std::fs::write(&path, format!("{BASE}{}", node_set(""))).unwrap();

        let config = EnvironmentConfig::from_path(&path).unwrap();
        assert_eq!(config.nodesets.len(), 1);

        let err = EnvironmentConfig::from_path(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
    }
}
