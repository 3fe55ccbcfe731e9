//! Standard capability job specs.

use super::{spec, template, Error, JobSpecFactory, JobSpecInput};
use crate::{capabilities::KnownCapability, config::BlockchainConfig, config::ContractsConfig};
use cre_types::{
    keys, push_job_spec, resolve_capability_config_for_don, resolve_capability_for_chain,
    CapabilityConfig, ConfigMap, DonMetadata, DonsToJobSpecs, JobDescription, NodeMetadata,
    NodeRole,
};
use std::path::{Path, PathBuf};
use toml::Value;
use tracing::debug;

/// What runtime value extraction may look at.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeInput<'a> {
    /// Node the job is for.
    pub node: &'a NodeMetadata,
    /// Chain of a chain specific job.
    pub chain: Option<&'a BlockchainConfig>,
    /// Deployed contracts.
    pub contracts: &'a ContractsConfig,
}

/// Extracts template values that are only known at runtime.
pub type RuntimeValuesFn = fn(&RuntimeInput<'_>) -> Result<ConfigMap, Error>;

/// No runtime values.
pub fn no_runtime_values(_: &RuntimeInput<'_>) -> Result<ConfigMap, Error> {
    Ok(ConfigMap::new())
}

/// Chain id, network family, selector, node address and forwarder of an EVM chain.
pub fn evm_runtime_values(input: &RuntimeInput<'_>) -> Result<ConfigMap, Error> {
    let mut values = ConfigMap::new();
    let Some(chain) = input.chain else {
        return Ok(values);
    };

    let chain_id =
        i64::try_from(chain.chain_id).map_err(|_| Error::ChainIdOutOfRange(chain.chain_id))?;
    values.insert("ChainID".into(), Value::Integer(chain_id));
    values.insert("NetworkFamily".into(), Value::String("evm".into()));
    values.insert("ChainSelector".into(), Value::String(chain.chain_selector.to_string()));

    let address = input.node.label_value(&keys::address_key(chain.chain_selector))?;
    values.insert("NodeAddress".into(), Value::String(address.to_string()));
    values.insert("FromAddress".into(), Value::String(address.to_string()));

    if let Some(forwarder) = input.contracts.forwarders.get(&chain.chain_id) {
        values.insert("CreForwarderAddress".into(), Value::String(forwarder.to_string()));
    }

    Ok(values)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Don,
    Chain,
}

/// One standard capability job per worker node, or per worker node and enabled chain.
#[derive(Debug, Clone)]
pub struct CapabilityJobSpecFactory {
    flag: String,
    level: Level,
    template: String,
    runtime_values: RuntimeValuesFn,
}

impl CapabilityJobSpecFactory {
    /// Factory for a capability configured per DON.
    pub fn don_level(capability: &KnownCapability) -> Self {
        Self {
            flag: capability.flag.to_string(),
            level: Level::Don,
            template: capability.config_template.to_string(),
            runtime_values: no_runtime_values,
        }
    }

    /// Factory for a capability configured per chain. Uses EVM runtime values.
    pub fn chain_specific(capability: &KnownCapability) -> Self {
        Self {
            flag: capability.flag.to_string(),
            level: Level::Chain,
            template: capability.config_template.to_string(),
            runtime_values: evm_runtime_values,
        }
    }

    fn global_config<'a>(&self, input: &JobSpecInput<'a>) -> Result<&'a CapabilityConfig, Error> {
        input
            .capability_configs
            .get(&self.flag)
            .ok_or_else(|| Error::MissingConfig(self.flag.clone()))
    }

    fn command(&self, global: &CapabilityConfig, container_dir: &Path) -> Result<PathBuf, Error> {
        let file_name = global
            .binary_path
            .as_deref()
            .and_then(|p| Path::new(p).file_name())
            .ok_or_else(|| Error::MissingBinary(self.flag.clone()))?;

        Ok(container_dir.join(file_name))
    }

    #[allow(clippy::too_many_arguments)]
    fn worker_jobs(
        &self,
        input: &JobSpecInput<'_>,
        don: &DonMetadata,
        name: &str,
        command: &str,
        config: &ConfigMap,
        chain: Option<&BlockchainConfig>,
        specs: &mut DonsToJobSpecs,
    ) -> Result<(), Error> {
        for node in don.worker_nodes()? {
            let runtime = (self.runtime_values)(&RuntimeInput {
                node,
                chain,
                contracts: input.contracts,
            })?;
            let values = template::apply_runtime_values(config.clone(), runtime);
            let rendered = template::render(&self.flag, &self.template, &values)?;

            let request =
                spec::worker_standard_capability(node.node_id()?, name, command, &rendered);
            push_job_spec(specs, don.id, JobDescription::new(name, NodeRole::Worker), request);
        }

        Ok(())
    }
}

impl JobSpecFactory for CapabilityJobSpecFactory {
    fn name(&self) -> &str {
        &self.flag
    }

    fn generate_job_specs(&self, input: &JobSpecInput<'_>) -> Result<DonsToJobSpecs, Error> {
        let mut specs = DonsToJobSpecs::new();

        for don in &input.topology.dons {
            let node_set = input.node_set(don)?;

            match self.level {
                Level::Don => {
                    if !cre_types::has_flag(&don.flags, &self.flag) {
                        continue;
                    }
                    let global = self.global_config(input)?;
                    let command = self.command(global, input.container_dir)?;
                    let config = resolve_capability_config_for_don(
                        &self.flag,
                        &global.config,
                        &node_set.capability_overrides,
                    );

                    debug!(flag = %self.flag, don = %don.name, "creating capability jobs");
                    self.worker_jobs(
                        input,
                        don,
                        &self.flag,
                        &command.to_string_lossy(),
                        &config,
                        None,
                        &mut specs,
                    )?;
                }
                Level::Chain => {
                    let Some(chains) = node_set.chain_capabilities.get(&self.flag) else {
                        continue;
                    };
                    if chains.enabled_chains.is_empty() {
                        continue;
                    }
                    let global = self.global_config(input)?;
                    let command = self.command(global, input.container_dir)?;

                    for &chain_id in &chains.enabled_chains {
                        let Some(config) = resolve_capability_for_chain(
                            &self.flag,
                            &global.config,
                            &node_set.chain_capabilities,
                            &node_set.capability_overrides,
                            chain_id,
                        ) else {
                            continue;
                        };
                        let chain = input.blockchain(chain_id)?;
                        let name = format!("{}-{chain_id}", self.flag);

                        debug!(
                            flag = %self.flag,
                            don = %don.name,
                            chain_id,
                            "creating capability jobs"
                        );
                        self.worker_jobs(
                            input,
                            don,
                            &name,
                            &command.to_string_lossy(),
                            &config,
                            Some(chain),
                            &mut specs,
                        )?;
                    }
                }
            }
        }

        Ok(specs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        capabilities::{known_capability, CRON, CUSTOM_COMPUTE, EVM},
        config::{ContractsConfig, NodeSetConfig},
    };
    use alloy::primitives::Address;
    use cre_types::{ChainCapabilityConfig, Topology};
    use std::collections::BTreeMap;

    fn node(index: usize, role: NodeRole) -> NodeMetadata {
        let mut node = NodeMetadata { index, roles: vec![role], labels: vec![] };
        node.set_label(keys::NODE_ID, format!("node-{index}"));
        node.set_label(keys::address_key(42), format!("0x{index:040x}"));
        node
    }

    fn topology(flags: &[&str]) -> Topology {
        Topology {
            workflow_don_id: 1,
            home_chain_selector: 42,
            dons: vec![DonMetadata {
                id: 1,
                name: "workflow".into(),
                flags: flags.iter().map(|f| f.to_string()).collect(),
                nodes: vec![
                    node(0, NodeRole::Bootstrap),
                    node(1, NodeRole::Worker),
                    node(2, NodeRole::Worker),
                ],
            }],
            peering: None,
            gateway_connector: None,
        }
    }

    struct Fixture {
        topology: Topology,
        configs: BTreeMap<String, CapabilityConfig>,
        node_sets: Vec<NodeSetConfig>,
        contracts: ContractsConfig,
        chains: Vec<BlockchainConfig>,
    }

    impl Fixture {
        fn new(flags: &[&str]) -> Self {
            let configs = BTreeMap::from([
                (
                    CRON.to_string(),
                    CapabilityConfig {
                        binary_path: Some("./bin/cron".into()),
                        config: ConfigMap::new(),
                    },
                ),
                (
                    EVM.to_string(),
                    CapabilityConfig {
                        binary_path: Some("/tmp/evm".into()),
                        config: "LogTriggerPollInterval = 1000\nReceiverGasMinimum = 500"
                            .parse()
                            .unwrap(),
                    },
                ),
            ]);
            Self {
                topology: topology(flags),
                configs,
                node_sets: vec![NodeSetConfig {
                    name: "workflow".into(),
                    capabilities: flags.iter().map(|f| f.to_string()).collect(),
                    ..Default::default()
                }],
                contracts: ContractsConfig {
                    forwarders: BTreeMap::from([(1337, Address::repeat_byte(0xf1))]),
                    ..Default::default()
                },
                chains: vec![BlockchainConfig {
                    name: "anvil".into(),
                    chain_id: 1337,
                    chain_selector: 42,
                    http_rpc: "http://anvil".into(),
                    ws_rpc: "ws://anvil".into(),
                }],
            }
        }

        fn input(&self) -> JobSpecInput<'_> {
            JobSpecInput {
                topology: &self.topology,
                capability_configs: &self.configs,
                node_sets: &self.node_sets,
                contracts: &self.contracts,
                blockchains: &self.chains,
                container_dir: Path::new("/home/capabilities"),
            }
        }
    }

    #[test]
    fn don_level_job_per_worker() {
        let fixture = Fixture::new(&["workflow", CRON]);
        let factory = CapabilityJobSpecFactory::don_level(known_capability(CRON).unwrap());

        let specs = factory.generate_job_specs(&fixture.input()).unwrap();
        let jobs = &specs[&1][&JobDescription::new(CRON, NodeRole::Worker)];

        let nodes: Vec<_> = jobs.iter().map(|j| j.node_id.as_str()).collect();
        assert_eq!(nodes, vec!["node-1", "node-2"]);

        let spec: toml::Table = jobs[0].spec.parse().unwrap();
        assert_eq!(spec["command"].as_str(), Some("/home/capabilities/cron"));
        assert_eq!(spec["config"].as_str(), Some(""));
    }

    #[test]
    fn skips_dons_without_the_flag() {
        let fixture = Fixture::new(&["workflow"]);
        let factory = CapabilityJobSpecFactory::don_level(known_capability(CRON).unwrap());
        assert!(factory.generate_job_specs(&fixture.input()).unwrap().is_empty());
    }

    #[test]
    fn missing_global_config_is_an_error() {
        let fixture = Fixture::new(&["workflow", CUSTOM_COMPUTE]);
        let factory =
            CapabilityJobSpecFactory::don_level(known_capability(CUSTOM_COMPUTE).unwrap());
        assert!(matches!(
            factory.generate_job_specs(&fixture.input()),
            Err(Error::MissingConfig(flag)) if flag == CUSTOM_COMPUTE
        ));
    }

    #[test]
    fn unresolved_placeholder_is_an_error() {
        let fixture = Fixture::new(&["workflow", CRON]);
        let factory = CapabilityJobSpecFactory {
            template: "{{.Schedule}}".into(),
            ..CapabilityJobSpecFactory::don_level(known_capability(CRON).unwrap())
        };
        assert!(matches!(
            factory.generate_job_specs(&fixture.input()),
            Err(Error::Template(template::Error::Unresolved { .. }))
        ));
    }

    #[test]
    fn quotes_in_config_values_survive() {
        let mut fixture = Fixture::new(&["workflow", CRON]);
        fixture.configs.get_mut(CRON).unwrap().config =
            r#"Schedule = "it's \"now\"""#.parse().unwrap();
        let factory = CapabilityJobSpecFactory {
            template: "Schedule = '{{.Schedule}}'".into(),
            ..CapabilityJobSpecFactory::don_level(known_capability(CRON).unwrap())
        };

        let specs = factory.generate_job_specs(&fixture.input()).unwrap();
        let jobs = &specs[&1][&JobDescription::new(CRON, NodeRole::Worker)];
        let spec: toml::Table = jobs[0].spec.parse().unwrap();
        assert_eq!(spec["config"].as_str(), Some(r#"Schedule = 'it's "now"'"#));
    }

    #[test]
    fn chain_specific_job_per_worker_and_chain() {
        let mut fixture = Fixture::new(&["workflow"]);
        fixture.node_sets[0].chain_capabilities.insert(
            EVM.to_string(),
            ChainCapabilityConfig {
                enabled_chains: vec![1337],
                chain_overrides: BTreeMap::from([(
                    1337,
                    "ReceiverGasMinimum = 1".parse().unwrap(),
                )]),
            },
        );
        let factory = CapabilityJobSpecFactory::chain_specific(known_capability(EVM).unwrap());

        let specs = factory.generate_job_specs(&fixture.input()).unwrap();
        let jobs = &specs[&1][&JobDescription::new("evm-1337", NodeRole::Worker)];
        assert_eq!(jobs.len(), 2);

        let spec: toml::Table = jobs[1].spec.parse().unwrap();
        assert_eq!(spec["name"].as_str(), Some("evm-1337"));
        let config: serde_json::Value =
            serde_json::from_str(spec["config"].as_str().unwrap()).unwrap();
        assert_eq!(config["chainId"], 1337);
        assert_eq!(config["receiverGasMinimum"], 1);
        assert_eq!(config["nodeAddress"], format!("0x{:040x}", 2));
        assert_eq!(config["creForwarderAddress"], Address::repeat_byte(0xf1).to_string());
    }

    #[test]
    fn chain_id_beyond_toml_integers_is_an_error() {
        let mut fixture = Fixture::new(&["workflow"]);
        fixture.chains[0].chain_id = u64::MAX;
        let node = &fixture.topology.dons[0].nodes[1];
        let input = RuntimeInput {
            node,
            chain: Some(&fixture.chains[0]),
            contracts: &fixture.contracts,
        };

        assert!(matches!(
            evm_runtime_values(&input),
            Err(Error::ChainIdOutOfRange(id)) if id == u64::MAX
        ));
    }

    #[test]
    fn chain_specific_skipped_without_enabled_chains() {
        let mut fixture = Fixture::new(&["workflow"]);
        fixture.node_sets[0]
            .chain_capabilities
            .insert(EVM.to_string(), ChainCapabilityConfig::default());
        let factory = CapabilityJobSpecFactory::chain_specific(known_capability(EVM).unwrap());
        assert!(factory.generate_job_specs(&fixture.input()).unwrap().is_empty());
    }
}
