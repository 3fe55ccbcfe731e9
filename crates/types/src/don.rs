//! DON, node and topology metadata.
//!
//! Nodes are described by a flat list of labels, the same labels the job distributor stores for
//! them. Everything else (node id, p2p id, per chain addresses) is looked up through
//! [`NodeMetadata::label_value`].

use crate::CapabilityFlag;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Well known label keys.
pub mod keys {
    /// Node role, one of [`super::NodeRole`]. Only `bootstrap` or `worker`.
    pub const NODE_TYPE: &str = "type";
    /// Position of the node in its node set.
    pub const NODE_INDEX: &str = "node_index";
    /// Id assigned by the job distributor.
    pub const NODE_ID: &str = "node_id";
    /// P2P peer id, with or without the `p2p_` prefix.
    pub const P2P_ID: &str = "p2p_id";
    /// Host name the node is reachable under from other nodes.
    pub const HOST: &str = "host";
    /// Comma separated additional roles, for example `gateway`.
    pub const EXTRA_ROLES: &str = "extra_roles";
    /// OCR2 key bundle id.
    pub const OCR2_KEY_BUNDLE_ID: &str = "ocr2_key_bundle_id";
    /// OCR2 on-chain signing address.
    pub const OCR2_SIGNER: &str = "ocr2_signer";
    /// Hex encoded CSA public key, used to register the node with the job distributor.
    pub const CSA_KEY: &str = "csa_key";
    /// Hex encoded 32 byte P2P public key, as stored in the capabilities registry.
    pub const P2P_KEY: &str = "p2p_key";
    /// Hex encoded 32 byte workflow encryption public key.
    pub const ENCRYPTION_KEY: &str = "encryption_key";
    /// Numeric DON id.
    pub const DON_ID: &str = "don_id";
    /// DON name.
    pub const DON_NAME: &str = "don_name";

    /// Key of the label holding a node's EVM address on the chain with `chain_selector`.
    pub fn address_key(chain_selector: u64) -> String {
        format!("{chain_selector}_public_address")
    }
}

/// Errors for DON and topology lookups.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// label missing from node
    #[error("label {key} not found on node {index}")]
    LabelNotFound {
        /// label key
        key: String,
        /// node index
        index: usize,
    },
    /// label present but empty
    #[error("label {key} on node {index} is empty")]
    EmptyLabel {
        /// label key
        key: String,
        /// node index
        index: usize,
    },
    /// more than one bootstrap node in a DON
    #[error("DON {don} has {count} bootstrap nodes, expected at most one")]
    MultipleBootstrapNodes {
        /// DON name
        don: String,
        /// number of bootstrap nodes found
        count: usize,
    },
    /// DON without worker nodes
    #[error("DON {0} has no worker nodes")]
    NoWorkerNodes(String),
    /// unknown DON id
    #[error("DON {0} not found in topology")]
    DonNotFound(u32),
    /// fault tolerance does not fit the on-chain `f`
    #[error("DON {don} has {workers} worker nodes, more than f fits")]
    TooManyWorkers {
        /// DON name
        don: String,
        /// number of worker nodes
        workers: usize,
    },
}

/// Role of a node within its DON.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// OCR and capabilities peering bootstrapper.
    Bootstrap,
    /// Runs capabilities and workflows.
    Worker,
    /// Runs the gateway job.
    Gateway,
}

/// Key/value label attached to a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Label key, see [`keys`].
    pub key: String,
    /// Label value.
    pub value: String,
}

impl Label {
    /// Create a new label.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into() }
    }
}

impl From<Label> for cre_proto::Label {
    fn from(label: Label) -> Self {
        Self::new(label.key, label.value)
    }
}

/// Metadata of a single node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeMetadata {
    /// Index within the node set.
    pub index: usize,
    /// Roles the node fulfills.
    pub roles: Vec<NodeRole>,
    /// Node labels.
    pub labels: Vec<Label>,
}

impl NodeMetadata {
    /// Value of the label with `key`. Missing and empty labels are both errors.
    pub fn label_value(&self, key: &str) -> Result<&str, Error> {
        let label = self
            .labels
            .iter()
            .find(|l| l.key == key)
            .ok_or_else(|| Error::LabelNotFound { key: key.to_string(), index: self.index })?;

        if label.value.is_empty() {
            return Err(Error::EmptyLabel { key: key.to_string(), index: self.index });
        }

        Ok(&label.value)
    }

    /// Sets `key` to `value`, replacing an existing label with the same key.
    pub fn set_label(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.labels.iter_mut().find(|l| l.key == key) {
            Some(label) => label.value = value,
            None => self.labels.push(Label { key, value }),
        }
    }

    /// Whether the node has `role`.
    pub fn has_role(&self, role: NodeRole) -> bool {
        self.roles.contains(&role)
    }

    /// Job distributor node id.
    pub fn node_id(&self) -> Result<&str, Error> {
        self.label_value(keys::NODE_ID)
    }

    /// P2P peer id without the `p2p_` prefix.
    pub fn peer_id(&self) -> Result<&str, Error> {
        let raw = self.label_value(keys::P2P_ID)?;
        Ok(raw.strip_prefix("p2p_").unwrap_or(raw))
    }
}

/// Metadata of a DON.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DonMetadata {
    /// 1-based DON id.
    pub id: u32,
    /// DON name.
    pub name: String,
    /// Capability flags enabled on the DON.
    pub flags: Vec<CapabilityFlag>,
    /// Nodes in the DON.
    pub nodes: Vec<NodeMetadata>,
}

impl DonMetadata {
    /// Whether the DON has `flag`, either exactly or for some chain (`<flag>-<chain id>`).
    pub fn has_flag(&self, flag: &str) -> bool {
        has_flag_for_any_chain(&self.flags, flag)
    }

    /// The bootstrap node, if the DON has one.
    pub fn bootstrap_node(&self) -> Result<Option<&NodeMetadata>, Error> {
        let mut bootstrap = self.nodes.iter().filter(|n| n.has_role(NodeRole::Bootstrap));
        let first = bootstrap.next();
        let rest = bootstrap.count();
        if rest > 0 {
            return Err(Error::MultipleBootstrapNodes { don: self.name.clone(), count: rest + 1 });
        }

        Ok(first)
    }

    /// All worker nodes. A DON without workers is an error.
    pub fn worker_nodes(&self) -> Result<Vec<&NodeMetadata>, Error> {
        let workers: Vec<_> = self.nodes.iter().filter(|n| n.has_role(NodeRole::Worker)).collect();
        if workers.is_empty() {
            return Err(Error::NoWorkerNodes(self.name.clone()));
        }

        Ok(workers)
    }

    /// The gateway node, if any.
    pub fn gateway_node(&self) -> Option<&NodeMetadata> {
        self.nodes.iter().find(|n| n.has_role(NodeRole::Gateway))
    }

    /// Maximum number of faulty worker nodes the DON tolerates (`f`).
    pub fn max_faulty_nodes(&self) -> Result<u8, Error> {
        let workers = self.worker_nodes()?.len();
        u8::try_from((workers - 1) / 3)
            .map_err(|_| Error::TooManyWorkers { don: self.name.clone(), workers })
    }
}

/// Default port for OCR peering.
pub const OCR_PEERING_PORT: u16 = 5001;
/// Default port for capabilities (DON to DON) peering.
pub const CAPABILITIES_PEERING_PORT: u16 = 6690;

/// Where nodes find the global peering bootstrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeeringData {
    /// P2P id of the bootstrapper, without `p2p_` prefix.
    pub global_bootstrapper_peer_id: String,
    /// Host of the bootstrapper.
    pub global_bootstrapper_host: String,
    /// Peering port.
    pub port: u16,
}

impl PeeringData {
    /// `peer_id@host:port`, as used in `DefaultBootstrappers`.
    pub fn bootstrapper(&self) -> String {
        format!(
            "{}@{}:{}",
            self.global_bootstrapper_peer_id, self.global_bootstrapper_host, self.port
        )
    }
}

/// OCR and capabilities peering for the whole topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peering {
    /// OCR peering, port 5001 by default.
    pub ocr: PeeringData,
    /// Capabilities peering, port 6690 by default.
    pub capabilities: PeeringData,
}

impl Peering {
    /// Peering data for both networks pointing at the same bootstrap node.
    pub fn new(peer_id: impl Into<String>, host: impl Into<String>) -> Self {
        let peer_id = peer_id.into();
        let host = host.into();
        Self {
            ocr: PeeringData {
                global_bootstrapper_peer_id: peer_id.clone(),
                global_bootstrapper_host: host.clone(),
                port: OCR_PEERING_PORT,
            },
            capabilities: PeeringData {
                global_bootstrapper_peer_id: peer_id,
                global_bootstrapper_host: host,
                port: CAPABILITIES_PEERING_PORT,
            },
        }
    }
}

/// Where worker nodes connect to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConnector {
    /// Gateway node host.
    pub host: String,
    /// Port of the node facing gateway server.
    pub port: u16,
    /// Path of the node facing gateway server.
    pub path: String,
}

impl GatewayConnector {
    /// Websocket URL worker nodes dial.
    pub fn url(&self) -> String {
        format!("ws://{}:{}{}", self.host, self.port, self.path)
    }
}

/// All DONs of an environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    /// Id of the DON running workflows.
    pub workflow_don_id: u32,
    /// Chain selector of the chain hosting the registries.
    pub home_chain_selector: u64,
    /// DONs ordered by id.
    pub dons: Vec<DonMetadata>,
    /// Global peering, `None` when no DON has a bootstrap node.
    pub peering: Option<Peering>,
    /// Gateway connector, `None` when no DON has a gateway node.
    pub gateway_connector: Option<GatewayConnector>,
}

impl Topology {
    /// The global bootstrap node: the bootstrap node of the first DON that has one.
    pub fn bootstrap_node(&self) -> Result<Option<(&DonMetadata, &NodeMetadata)>, Error> {
        for don in &self.dons {
            if let Some(node) = don.bootstrap_node()? {
                return Ok(Some((don, node)));
            }
        }

        Ok(None)
    }

    /// DON with `id`.
    pub fn don(&self, id: u32) -> Result<&DonMetadata, Error> {
        self.dons.iter().find(|d| d.id == id).ok_or(Error::DonNotFound(id))
    }

    /// The workflow DON.
    pub fn workflow_don(&self) -> Result<&DonMetadata, Error> {
        self.don(self.workflow_don_id)
    }
}

/// Whether `flags` contains exactly `flag`.
pub fn has_flag(flags: &[CapabilityFlag], flag: &str) -> bool {
    flags.iter().any(|f| f == flag)
}

/// Whether `flags` contains `flag`, or `flag` suffixed with a chain id (`evm-1337`).
pub fn has_flag_for_any_chain(flags: &[CapabilityFlag], flag: &str) -> bool {
    flags.iter().any(|f| {
        f == flag ||
            f.strip_prefix(flag)
                .and_then(|rest| rest.strip_prefix('-'))
                .is_some_and(|chain| chain.parse::<u64>().is_ok())
    })
}
