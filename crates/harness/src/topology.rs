//! Building the DON topology from the configured node sets.

use crate::{
    capabilities::WORKFLOW,
    config::{EnvironmentConfig, NodeSetConfig},
};
use cre_types::{
    keys, DonMetadata, GatewayConnector, NodeMetadata, NodeRole, Peering, Topology,
};

/// Port of the gateway's node facing server.
pub const GATEWAY_NODE_PORT: u16 = 5003;
/// Path of the gateway's node facing server.
pub const GATEWAY_NODE_PATH: &str = "/node";

/// Topology errors.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// no DON is flagged as workflow DON
    #[error("no DON has the {} flag", WORKFLOW)]
    NoWorkflowDon,
    /// node set references a chain that is not configured
    #[error("node {node} of {don} has an address for unknown chain {chain_id}")]
    UnknownChain {
        /// DON name
        don: String,
        /// node index
        node: usize,
        /// chain id
        chain_id: u64,
    },
    /// invalid DON metadata
    #[error(transparent)]
    Don(#[from] cre_types::don::Error),
}

fn node_metadata(
    config: &EnvironmentConfig,
    don_id: u32,
    node_set: &NodeSetConfig,
    index: usize,
) -> Result<NodeMetadata, Error> {
    let node = &node_set.nodes[index];
    let is_bootstrap = node_set.bootstrap_node_index == Some(index);
    let is_gateway = node_set.gateway_node_index == Some(index);

    let node_type = if is_bootstrap { NodeRole::Bootstrap } else { NodeRole::Worker };
    let mut roles = vec![node_type];
    if is_gateway {
        roles.push(NodeRole::Gateway);
    }

    let mut metadata = NodeMetadata { index, roles, labels: Vec::new() };
    metadata.set_label(keys::NODE_TYPE, node_type.to_string());
    metadata.set_label(keys::NODE_INDEX, index.to_string());
    metadata.set_label(keys::DON_ID, don_id.to_string());
    metadata.set_label(keys::DON_NAME, node_set.name.clone());
    metadata.set_label(keys::HOST, node.host.clone());
    metadata.set_label(keys::P2P_ID, node.p2p_id.clone());
    metadata.set_label(keys::CSA_KEY, node.csa_key.clone());
    if is_gateway {
        metadata.set_label(keys::EXTRA_ROLES, NodeRole::Gateway.to_string());
    }

    let optional = [
        (keys::NODE_ID, node.node_id.clone()),
        (keys::P2P_KEY, node.p2p_key.clone()),
        (keys::OCR2_KEY_BUNDLE_ID, node.ocr2_key_bundle_id.clone()),
        (keys::OCR2_SIGNER, node.ocr2_signer.map(|a| a.to_string())),
        (keys::ENCRYPTION_KEY, node.encryption_key.clone()),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            metadata.set_label(key, value);
        }
    }

    for (chain_id, address) in &node.eth_addresses {
        let chain = config.blockchain(*chain_id).ok_or_else(|| Error::UnknownChain {
            don: node_set.name.clone(),
            node: index,
            chain_id: *chain_id,
        })?;
        metadata.set_label(keys::address_key(chain.chain_selector), address.to_string());
    }

    Ok(metadata)
}

/// Build the topology. DON ids are the 1-based positions of the node sets.
pub fn build_topology(config: &EnvironmentConfig) -> Result<Topology, Error> {
    let mut dons = Vec::with_capacity(config.nodesets.len());
    for (i, node_set) in config.nodesets.iter().enumerate() {
        let id = i as u32 + 1;
        let nodes = (0..node_set.nodes.len())
            .map(|index| node_metadata(config, id, node_set, index))
            .collect::<Result<Vec<_>, _>>()?;

        let don = DonMetadata { id, name: node_set.name.clone(), flags: node_set.flags(), nodes };
        // fails on more than one bootstrap node
        don.bootstrap_node()?;
        dons.push(don);
    }

    let workflow_don_id = dons
        .iter()
        .find(|d| cre_types::has_flag(&d.flags, WORKFLOW))
        .map(|d| d.id)
        .ok_or(Error::NoWorkflowDon)?;

    let mut topology = Topology {
        workflow_don_id,
        home_chain_selector: config.home_chain().chain_selector,
        dons,
        peering: None,
        gateway_connector: None,
    };

    let peering = match topology.bootstrap_node()? {
        Some((_, node)) => Some(Peering::new(node.peer_id()?, node.label_value(keys::HOST)?)),
        None => None,
    };
    topology.peering = peering;

    let gateway_connector = match topology.dons.iter().find_map(|d| d.gateway_node()) {
        Some(node) => Some(GatewayConnector {
            host: node.label_value(keys::HOST)?.to_string(),
            port: GATEWAY_NODE_PORT,
            path: GATEWAY_NODE_PATH.to_string(),
        }),
        None => None,
    };
    topology.gateway_connector = gateway_connector;

    Ok(topology)
}
