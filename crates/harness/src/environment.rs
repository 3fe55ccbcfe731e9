//! A loaded environment: configuration plus the topology built from it.

use crate::{
    config::{self, EnvironmentConfig},
    jobs::{self, JobSpecFactory, JobSpecInput},
    node_config, topology,
};
use cre_types::{DonsToJobSpecs, Topology};
use std::{collections::BTreeMap, path::Path};
use tracing::{info, instrument};

/// Environment errors.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// config error
    #[error(transparent)]
    Config(#[from] config::Error),
    /// topology error
    #[error(transparent)]
    Topology(#[from] topology::Error),
    /// job spec generation error
    #[error(transparent)]
    Jobs(#[from] jobs::Error),
    /// node config generation error
    #[error(transparent)]
    NodeConfig(#[from] node_config::Error),
}

/// Configuration and topology of one environment.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Parsed configuration.
    pub config: EnvironmentConfig,
    /// DONs built from the node sets.
    pub topology: Topology,
}

impl Environment {
    /// Build the environment from an already parsed configuration.
    pub fn new(config: EnvironmentConfig) -> Result<Self, Error> {
        let topology = topology::build_topology(&config)?;
        Ok(Self { config, topology })
    }

    /// Load the configuration at `path` and build its topology.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let env = Self::new(EnvironmentConfig::from_path(path)?)?;
        info!(
            dons = env.topology.dons.len(),
            workflow_don = env.topology.workflow_don_id,
            "environment loaded"
        );

        Ok(env)
    }

    /// Node TOML of every node, keyed by DON id and node index.
    pub fn node_configs(&self) -> Result<BTreeMap<(u32, usize), String>, Error> {
        Ok(node_config::generate_node_configs(&self.config, &self.topology)?)
    }

    /// Job specs of every factory. Every node must carry its job distributor node id.
    pub fn job_specs(
        &self,
        factories: &[Box<dyn JobSpecFactory>],
        container_dir: &Path,
    ) -> Result<DonsToJobSpecs, Error> {
        let input = JobSpecInput::new(&self.config, &self.topology, container_dir);
        Ok(jobs::generate_job_specs(factories, &input)?)
    }

    /// Ids of every registered node.
    pub fn node_ids(&self) -> Vec<String> {
        self.topology
            .dons
            .iter()
            .flat_map(|d| &d.nodes)
            .filter_map(|n| n.node_id().ok().map(str::to_string))
            .collect()
    }
}
