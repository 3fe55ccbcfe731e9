//! Job spec generation and proposal.
//!
//! Every job the harness creates comes from a [`JobSpecFactory`]. Factories look at the topology
//! and configuration and return proposals grouped by DON and [`cre_types::JobDescription`]; the
//! results of all factories are merged and handed to [`dispatch::create_jobs`].

use crate::{
    capabilities::{known_capabilities, Scope},
    config::{
        BlockchainConfig, ContractsConfig, EnvironmentConfig, GatewayHttpConfig, NodeSetConfig,
    },
};
use cre_types::{merge_job_specs, CapabilityConfig, DonMetadata, DonsToJobSpecs, Topology};
use std::{collections::BTreeMap, fmt::Debug, path::Path};
use tracing::debug;

pub mod consensus;
pub mod dispatch;
pub mod factory;
pub mod gateway;
pub mod spec;
pub mod template;

/// Directory holding capability binaries inside the node containers.
pub const DEFAULT_CONTAINER_DIR: &str = "/home/capabilities";

/// Job spec generation errors.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// enabled capability without a global config section
    #[error("capability {0} is enabled but has no capability_configs entry")]
    MissingConfig(String),
    /// capability config without a binary
    #[error("capability {0} has no binary_path")]
    MissingBinary(String),
    /// DON without a matching node set
    #[error("no node set for DON {0}")]
    NodeSetNotFound(String),
    /// chain not among the configured blockchains
    #[error("chain {0} is not configured")]
    UnknownChain(u64),
    /// chain id does not fit a TOML integer
    #[error("chain id {0} does not fit a TOML integer")]
    ChainIdOutOfRange(u64),
    /// contract address required by a job is not configured
    #[error("contract {0} is not configured")]
    MissingContract(&'static str),
    /// OCR workers need a bootstrap node
    #[error("no OCR bootstrap node for DON {0}")]
    NoBootstrap(String),
    /// config template failure
    #[error(transparent)]
    Template(#[from] template::Error),
    /// invalid DON metadata
    #[error(transparent)]
    Don(#[from] cre_types::don::Error),
    /// failed to serialize a job spec
    #[error("failed to serialize job spec: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Everything a factory may look at.
#[derive(Debug, Clone, Copy)]
pub struct JobSpecInput<'a> {
    /// DON topology, node ids must be set.
    pub topology: &'a Topology,
    /// Global capability configs by flag.
    pub capability_configs: &'a BTreeMap<String, CapabilityConfig>,
    /// Node sets in DON id order.
    pub node_sets: &'a [NodeSetConfig],
    /// Deployed contracts.
    pub contracts: &'a ContractsConfig,
    /// Blockchains, the first one is the home chain.
    pub blockchains: &'a [BlockchainConfig],
    /// Directory of the capability binaries inside the containers.
    pub container_dir: &'a Path,
}

impl<'a> JobSpecInput<'a> {
    /// Input for `topology` built from `config`.
    pub fn new(
        config: &'a EnvironmentConfig,
        topology: &'a Topology,
        container_dir: &'a Path,
    ) -> Self {
        Self {
            topology,
            capability_configs: &config.capability_configs,
            node_sets: &config.nodesets,
            contracts: &config.contracts,
            blockchains: &config.blockchains,
            container_dir,
        }
    }

    /// Node set a DON was built from.
    pub fn node_set(&self, don: &DonMetadata) -> Result<&'a NodeSetConfig, Error> {
        self.node_sets
            .iter()
            .find(|n| n.name == don.name)
            .ok_or_else(|| Error::NodeSetNotFound(don.name.clone()))
    }

    /// Blockchain with `chain_id`.
    pub fn blockchain(&self, chain_id: u64) -> Result<&'a BlockchainConfig, Error> {
        self.blockchains
            .iter()
            .find(|b| b.chain_id == chain_id)
            .ok_or(Error::UnknownChain(chain_id))
    }

    /// The home chain.
    pub fn home_chain(&self) -> Result<&'a BlockchainConfig, Error> {
        let selector = self.topology.home_chain_selector;
        self.blockchains
            .iter()
            .find(|b| b.chain_selector == selector)
            .ok_or(Error::UnknownChain(selector))
    }
}

/// Produces job proposals for a topology.
pub trait JobSpecFactory: Debug + Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Generate the proposals of this factory.
    fn generate_job_specs(&self, input: &JobSpecInput<'_>) -> Result<DonsToJobSpecs, Error>;
}

/// Factories for every known capability plus consensus and gateway.
pub fn default_factories(gateway: &GatewayHttpConfig) -> Vec<Box<dyn JobSpecFactory>> {
    let mut factories: Vec<Box<dyn JobSpecFactory>> = known_capabilities()
        .iter()
        .filter_map(|cap| match cap.scope {
            Scope::Don => Some(factory::CapabilityJobSpecFactory::don_level(cap)),
            Scope::Chain => Some(factory::CapabilityJobSpecFactory::chain_specific(cap)),
            Scope::Role | Scope::Custom | Scope::NodeConfig => None,
        })
        .map(|f| Box::new(f) as Box<dyn JobSpecFactory>)
        .collect();

    factories.push(Box::new(consensus::ConsensusJobSpecFactory));
    factories.push(Box::new(gateway::GatewayJobSpecFactory { http: gateway.clone() }));

    factories
}

/// Run every factory and merge the results.
pub fn generate_job_specs(
    factories: &[Box<dyn JobSpecFactory>],
    input: &JobSpecInput<'_>,
) -> Result<DonsToJobSpecs, Error> {
    let mut specs = DonsToJobSpecs::new();
    for factory in factories {
        let generated = factory.generate_job_specs(input)?;
        debug!(
            factory = factory.name(),
            jobs = cre_types::count_job_specs(&generated),
            "generated job specs"
        );
        merge_job_specs(generated, &mut specs);
    }

    Ok(specs)
}
