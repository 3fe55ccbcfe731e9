//! Capabilities registry, workflow registry and forwarder configuration.
//!
//! [`RegistryPlan::from_topology`] turns the topology into the calls the registries expect;
//! [`apply`] submits them from a local signer.

use crate::{
    capabilities::{known_capability, KnownCapability, Registration, Scope},
    config::{BlockchainConfig, ContractsConfig},
};
use alloy::{
    network::EthereumWallet,
    primitives::{keccak256, Address, Bytes, TxHash, B256},
    providers::ProviderBuilder,
    signers::local::PrivateKeySigner,
    sol_types::SolValue,
};
use cre_contracts::{
    capabilities_registry::ICapabilitiesRegistry::{
        self, Capability, CapabilityConfiguration, NodeOperator, NodeParams,
    },
    keystone_forwarder::IKeystoneForwarder,
    workflow_registry::IWorkflowRegistry,
};
use cre_types::{keys, DonMetadata, NodeMetadata, Topology};
use std::{collections::BTreeMap, str::FromStr};
use tracing::{debug, info, instrument};

/// Version of every forwarder config the harness writes.
pub const FORWARDER_CONFIG_VERSION: u32 = 1;

/// Registry errors.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// flag without a registry entry
    #[error("capability {0} cannot be registered")]
    NotRegistrable(String),
    /// chain not among the configured blockchains
    #[error("chain {0} is not configured")]
    UnknownChain(u64),
    /// label that should hold a hex value does not
    #[error("node {index} of {don}: label {key} is not valid: {value}")]
    InvalidLabel {
        /// DON name
        don: String,
        /// node index
        index: usize,
        /// label key
        key: &'static str,
        /// label value
        value: String,
    },
    /// invalid DON metadata
    #[error(transparent)]
    Don(#[from] cre_types::don::Error),
    /// invalid rpc url
    #[error("invalid rpc url {0}")]
    InvalidRpcUrl(String),
    /// failed to send a transaction
    #[error("{step}: failed to send transaction: {source}")]
    Send {
        /// contract call
        step: &'static str,
        /// contract error
        source: alloy::contract::Error,
    },
    /// failed to get a receipt
    #[error("{step}: failed to get receipt: {reason}")]
    Receipt {
        /// contract call
        step: &'static str,
        /// why
        reason: String,
    },
    /// transaction reverted
    #[error("{step}: transaction {tx} reverted")]
    Reverted {
        /// contract call
        step: &'static str,
        /// transaction hash
        tx: TxHash,
    },
    /// failed to read from a contract
    #[error("{step}: call failed: {source}")]
    Call {
        /// contract call
        step: &'static str,
        /// contract error
        source: alloy::contract::Error,
    },
}

/// `keccak256(abi.encode(labelledName, version))`, the id the registry derives for a capability.
pub fn hashed_capability_id(labelled_name: &str, version: &str) -> B256 {
    keccak256((labelled_name.to_string(), version.to_string()).abi_encode_params())
}

const fn is_chain_scoped(known: &KnownCapability) -> bool {
    matches!(known.scope, Scope::Chain | Scope::NodeConfig)
}

/// Registration of `flag` and, for chain specific flags, the chain id.
///
/// A chain scoped capability without a chain suffix is not enabled anywhere and yields nothing.
fn registration_for(flag: &str) -> Result<Option<(Registration, Option<u64>)>, Error> {
    if let Some(known) = known_capability(flag) {
        if is_chain_scoped(known) {
            return Ok(None);
        }
        return Ok(known.registration.map(|r| (r, None)));
    }

    flag.rsplit_once('-')
        .and_then(|(base, chain)| Some((known_capability(base)?, chain.parse::<u64>().ok()?)))
        .filter(|(known, _)| is_chain_scoped(known))
        .map(|(known, chain_id)| known.registration.map(|r| (r, Some(chain_id))))
        .ok_or_else(|| Error::NotRegistrable(flag.to_string()))
}

/// Registry entries for the flags of a DON. Role only flags are skipped.
fn don_capabilities(
    don: &DonMetadata,
    blockchains: &[BlockchainConfig],
) -> Result<Vec<Capability>, Error> {
    let mut capabilities = Vec::new();
    for flag in &don.flags {
        let Some((registration, chain_id)) = registration_for(flag)? else {
            continue;
        };

        let labelled_name = match chain_id {
            Some(chain_id) => {
                let chain = blockchains
                    .iter()
                    .find(|b| b.chain_id == chain_id)
                    .ok_or(Error::UnknownChain(chain_id))?;
                registration.name_for_chain(chain_id, chain.chain_selector)
            }
            None => registration.labelled_name.to_string(),
        };

        capabilities.push(Capability {
            labelledName: labelled_name,
            version: registration.version.to_string(),
            capabilityType: registration.capability_type.into(),
            responseType: 0,
            configurationContract: Address::ZERO,
        });
    }

    Ok(capabilities)
}

fn hex_label(don: &DonMetadata, node: &NodeMetadata, key: &'static str) -> Result<B256, Error> {
    let value = node.label_value(key)?;
    B256::from_str(value).map_err(|_| Error::InvalidLabel {
        don: don.name.clone(),
        index: node.index,
        key,
        value: value.to_string(),
    })
}

fn signer_address(don: &DonMetadata, node: &NodeMetadata) -> Result<Address, Error> {
    let value = node.label_value(keys::OCR2_SIGNER)?;
    Address::from_str(value).map_err(|_| Error::InvalidLabel {
        don: don.name.clone(),
        index: node.index,
        key: keys::OCR2_SIGNER,
        value: value.to_string(),
    })
}

/// The signer address left aligned in 32 bytes, as the registry stores it.
fn signer_bytes(signer: Address) -> B256 {
    let mut bytes = [0u8; 32];
    bytes[..20].copy_from_slice(signer.as_slice());
    B256::from(bytes)
}

/// Arguments of one `addDON` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DonPlan {
    /// Topology DON id.
    pub don_id: u32,
    /// DON name.
    pub name: String,
    /// P2P ids of the worker nodes.
    pub nodes: Vec<B256>,
    /// Capabilities the DON exposes.
    pub capability_configurations: Vec<CapabilityConfiguration>,
    /// Whether other DONs may use the capabilities.
    pub is_public: bool,
    /// Whether the DON runs workflows.
    pub accepts_workflows: bool,
    /// Faulty nodes tolerated.
    pub f: u8,
    /// OCR2 signers of the worker nodes.
    pub signers: Vec<Address>,
}

/// Everything to submit to the capabilities registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryPlan {
    /// Unique capabilities across all DONs.
    pub capabilities: Vec<Capability>,
    /// One operator per DON, in DON order.
    pub node_operators: Vec<NodeOperator>,
    /// Worker nodes of every DON.
    pub nodes: Vec<NodeParams>,
    /// DONs in topology order.
    pub dons: Vec<DonPlan>,
    /// Topology id of the workflow DON.
    pub workflow_don_id: u32,
}

impl RegistryPlan {
    /// Plan the registry contents for `topology`. Node operators are administered by `admin`.
    pub fn from_topology(
        topology: &Topology,
        blockchains: &[BlockchainConfig],
        admin: Address,
    ) -> Result<Self, Error> {
        let mut plan = Self {
            capabilities: Vec::new(),
            node_operators: Vec::new(),
            nodes: Vec::new(),
            dons: Vec::new(),
            workflow_don_id: topology.workflow_don_id,
        };

        for (i, don) in topology.dons.iter().enumerate() {
            let capabilities = don_capabilities(don, blockchains)?;
            let hashed_ids: Vec<B256> = capabilities
                .iter()
                .map(|c| hashed_capability_id(&c.labelledName, &c.version))
                .collect();
            for capability in capabilities {
                if !plan.capabilities.contains(&capability) {
                    plan.capabilities.push(capability);
                }
            }

            plan.node_operators
                .push(NodeOperator { admin, name: format!("{} node operator", don.name) });
            let operator_id = i as u32 + 1;

            let mut p2p_ids = Vec::new();
            let mut signers = Vec::new();
            for node in don.worker_nodes()? {
                let signer = signer_address(don, node)?;
                let p2p_id = hex_label(don, node, keys::P2P_KEY)?;
                let encryption_key = match node.label_value(keys::ENCRYPTION_KEY) {
                    Ok(_) => hex_label(don, node, keys::ENCRYPTION_KEY)?,
                    Err(_) => B256::ZERO,
                };

                plan.nodes.push(NodeParams {
                    nodeOperatorId: operator_id,
                    signer: signer_bytes(signer),
                    p2pId: p2p_id,
                    encryptionPublicKey: encryption_key,
                    hashedCapabilityIds: hashed_ids.clone(),
                });
                p2p_ids.push(p2p_id);
                signers.push(signer);
            }

            let accepts_workflows = don.id == topology.workflow_don_id;
            plan.dons.push(DonPlan {
                don_id: don.id,
                name: don.name.clone(),
                nodes: p2p_ids,
                capability_configurations: hashed_ids
                    .into_iter()
                    .map(|id| CapabilityConfiguration { capabilityId: id, config: Bytes::new() })
                    .collect(),
                is_public: !accepts_workflows,
                accepts_workflows,
                f: don.max_faulty_nodes()?,
                signers,
            });
        }

        Ok(plan)
    }

    /// The workflow DON's plan.
    pub fn workflow_don(&self) -> Option<&DonPlan> {
        self.dons.iter().find(|d| d.don_id == self.workflow_don_id)
    }
}

/// Result of [`apply`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryOutput {
    /// On-chain DON id by topology DON id.
    pub don_ids: BTreeMap<u32, u32>,
    /// Next free on-chain DON id after applying.
    pub next_don_id: u32,
}

macro_rules! transact {
    ($step:expr, $call:expr) => {{
        let step: &'static str = $step;
        let receipt = $call
            .send()
            .await
            .map_err(|source| Error::Send { step, source })?
            .get_receipt()
            .await
            .map_err(|e| Error::Receipt { step, reason: e.to_string() })?;
        if !receipt.status() {
            return Err(Error::Reverted { step, tx: receipt.transaction_hash });
        }
        debug!(step, tx = %receipt.transaction_hash, "transaction confirmed");
    }};
}

/// Submit `plan` to the registries on the home chain and configure the forwarders.
///
/// On-chain DON ids are assigned sequentially starting at the registry's next DON id.
#[instrument(skip_all, fields(rpc = %home_chain.http_rpc))]
pub async fn apply(
    plan: &RegistryPlan,
    contracts: &ContractsConfig,
    home_chain: &BlockchainConfig,
    blockchains: &[BlockchainConfig],
    signer: PrivateKeySigner,
) -> Result<RegistryOutput, Error> {
    let admin = signer.address();
    let wallet = EthereumWallet::from(signer);
    let url = home_chain
        .http_rpc
        .parse()
        .map_err(|_| Error::InvalidRpcUrl(home_chain.http_rpc.clone()))?;
    let provider =
        ProviderBuilder::new().wallet(wallet.clone()).on_http(url);

    let registry = ICapabilitiesRegistry::new(contracts.capabilities_registry, &provider);
    let first_don_id = registry
        .getNextDONId()
        .call()
        .await
        .map_err(|source| Error::Call { step: "getNextDONId", source })?
        ._0;

    transact!("addCapabilities", registry.addCapabilities(plan.capabilities.clone()));
    transact!("addNodeOperators", registry.addNodeOperators(plan.node_operators.clone()));
    transact!("addNodes", registry.addNodes(plan.nodes.clone()));

    let mut output = RegistryOutput { don_ids: BTreeMap::new(), next_don_id: first_don_id };
    for don in &plan.dons {
        transact!(
            "addDON",
            registry.addDON(
                don.nodes.clone(),
                don.capability_configurations.clone(),
                don.is_public,
                don.accepts_workflows,
                don.f,
            )
        );
        info!(don = %don.name, on_chain_id = output.next_don_id, "DON added");
        output.don_ids.insert(don.don_id, output.next_don_id);
        output.next_don_id += 1;
    }

    let Some(workflow_don) = plan.workflow_don() else {
        return Ok(output);
    };
    let workflow_don_id = output.don_ids[&workflow_don.don_id];

    if let Some(address) = contracts.workflow_registry {
        let workflow_registry = IWorkflowRegistry::new(address, &provider);
        transact!(
            "updateAllowedDONs",
            workflow_registry.updateAllowedDONs(vec![workflow_don_id], true)
        );
        transact!(
            "updateAuthorizedAddresses",
            workflow_registry.updateAuthorizedAddresses(vec![admin], true)
        );
    }

    for (chain_id, forwarder) in &contracts.forwarders {
        let chain = blockchains
            .iter()
            .find(|b| b.chain_id == *chain_id)
            .ok_or(Error::UnknownChain(*chain_id))?;
        let url =
            chain.http_rpc.parse().map_err(|_| Error::InvalidRpcUrl(chain.http_rpc.clone()))?;
        let chain_provider =
            ProviderBuilder::new().wallet(wallet.clone()).on_http(url);

        let forwarder = IKeystoneForwarder::new(*forwarder, &chain_provider);
        transact!(
            "setConfig",
            forwarder.setConfig(
                workflow_don_id,
                FORWARDER_CONFIG_VERSION,
                workflow_don.f,
                workflow_don.signers.clone(),
            )
        );
        info!(chain_id, "forwarder configured");
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{CRON, EVM, OCR3, WORKFLOW};
    use alloy::primitives::b256;
    use cre_types::NodeRole;

    fn node(index: usize, role: NodeRole) -> NodeMetadata {
        let mut node = NodeMetadata { index, roles: vec![role], labels: vec![] };
        node.set_label(keys::OCR2_SIGNER, Address::repeat_byte(index as u8 + 1).to_string());
        node.set_label(keys::P2P_KEY, B256::repeat_byte(index as u8 + 0x10).to_string());
        node
    }

    fn don(id: u32, name: &str, flags: &[&str], workers: usize) -> DonMetadata {
        let mut nodes = vec![node(0, NodeRole::Bootstrap)];
        nodes.extend((1..=workers).map(|i| node(i, NodeRole::Worker)));
        DonMetadata {
            id,
            name: name.into(),
            flags: flags.iter().map(|f| f.to_string()).collect(),
            nodes,
        }
    }

    fn chains() -> Vec<BlockchainConfig> {
        vec![BlockchainConfig {
            name: "anvil".into(),
            chain_id: 1337,
            chain_selector: 42,
            http_rpc: "http://anvil:8545".into(),
            ws_rpc: "ws://anvil:8545".into(),
        }]
    }

    fn topology() -> Topology {
        Topology {
            workflow_don_id: 1,
            home_chain_selector: 42,
            dons: vec![
                don(1, "workflow", &[WORKFLOW, OCR3, CRON], 4),
                don(2, "capabilities", &[CRON, "evm-1337"], 1),
            ],
            peering: None,
            gateway_connector: None,
        }
    }

    #[test]
    fn hashed_id_matches_abi_encoding() {
        let encoded = ("cron-trigger".to_string(), "1.0.0".to_string()).abi_encode_params();
        // two offsets, then length and one padded word per string
        assert_eq!(encoded.len(), 32 * 6);
        assert_eq!(hashed_capability_id("cron-trigger", "1.0.0"), keccak256(encoded));
        assert_eq!(
            hashed_capability_id("cron-trigger", "1.0.0"),
            b256!("f6794352fcefcb42052fd2d04529f499e1be7f5f58cec692077a35cb57165b90")
        );
        assert_ne!(
            hashed_capability_id("cron-trigger", "1.0.0"),
            hashed_capability_id("cron-trigger", "1.0.1")
        );
    }

    #[test]
    fn plans_registry_contents() {
        let admin = Address::repeat_byte(0xad);
        let plan = RegistryPlan::from_topology(&topology(), &chains(), admin).unwrap();

        let names: Vec<_> = plan.capabilities.iter().map(|c| c.labelledName.as_str()).collect();
        // cron is shared and registered once
        assert_eq!(names, vec!["offchain_reporting", "cron-trigger", "evm:ChainSelector:42"]);

        assert_eq!(plan.node_operators.len(), 2);
        assert!(plan.node_operators.iter().all(|o| o.admin == admin));

        // bootstrap nodes are not registered
        assert_eq!(plan.nodes.len(), 5);
        assert_eq!(plan.nodes[4].nodeOperatorId, 2);
        assert_eq!(plan.nodes[0].hashedCapabilityIds.len(), 2);
        assert_eq!(&plan.nodes[0].signer[..20], Address::repeat_byte(2).as_slice());

        let workflow = plan.workflow_don().unwrap();
        assert!(workflow.accepts_workflows && !workflow.is_public);
        assert_eq!(workflow.f, 1);
        assert_eq!(workflow.signers.len(), 4);

        let capabilities = &plan.dons[1];
        assert!(capabilities.is_public && !capabilities.accepts_workflows);
        assert_eq!(capabilities.f, 0);
        assert_eq!(
            capabilities.capability_configurations[1].capabilityId,
            hashed_capability_id("evm:ChainSelector:42", "1.0.0")
        );
    }

    #[test]
    fn rejects_invalid_p2p_key() {
        let mut topology = topology();
        topology.dons[1].nodes[1].set_label(keys::P2P_KEY, "p2p_12D3");

        assert!(matches!(
            RegistryPlan::from_topology(&topology, &chains(), Address::ZERO),
            Err(Error::InvalidLabel { key: keys::P2P_KEY, index: 1, .. })
        ));
    }

    #[test]
    fn registration_by_flag() {
        let (cron, chain) = registration_for(CRON).unwrap().unwrap();
        assert_eq!((cron.labelled_name, chain), ("cron-trigger", None));

        let (write, chain) = registration_for("write-evm-1337").unwrap().unwrap();
        assert_eq!(write.name_for_chain(1337, 42), "write_evm_1337");
        assert_eq!(chain, Some(1337));

        assert!(registration_for(WORKFLOW).unwrap().is_none());
        assert!(registration_for(EVM).unwrap().is_none());
        assert!(matches!(registration_for("cron-1337"), Err(Error::NotRegistrable(_))));
        assert!(matches!(registration_for("teleport"), Err(Error::NotRegistrable(_))));
    }

    #[test]
    fn chain_capability_for_unknown_chain() {
        let mut topology = topology();
        topology.dons[1].flags.push(format!("{EVM}-1"));

        assert!(matches!(
            RegistryPlan::from_topology(&topology, &chains(), Address::ZERO),
            Err(Error::UnknownChain(1))
        ));
    }
}
