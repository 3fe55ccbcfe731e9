//! Gateway job.

use super::{spec, Error, JobSpecFactory, JobSpecInput};
use crate::{
    capabilities::{needs_web_api_gateway, GATEWAY, VAULT, WORKFLOW},
    config::GatewayHttpConfig,
};
use cre_types::{keys, push_job_spec, DonMetadata, DonsToJobSpecs, JobDescription, NodeRole};

/// Handler serving workflow and web API capability DONs.
pub const WEB_API_HANDLER: &str = "web-api-capabilities";
/// Handler serving vault DONs.
pub const VAULT_HANDLER: &str = "vault";

/// One gateway job on every gateway node, serving each DON that talks to the gateway.
#[derive(Debug, Clone, Default)]
pub struct GatewayJobSpecFactory {
    /// Outgoing HTTP allowed besides ports 80 and 443.
    pub http: GatewayHttpConfig,
}

fn members(
    don: &DonMetadata,
    home_chain_selector: u64,
) -> Result<Vec<spec::GatewayDonMember>, Error> {
    let address_key = keys::address_key(home_chain_selector);
    don.worker_nodes()?
        .into_iter()
        .enumerate()
        .map(|(i, node)| {
            Ok(spec::GatewayDonMember {
                address: node.label_value(&address_key)?.to_string(),
                name: format!("DON {} - Node {i}", don.id),
            })
        })
        .collect()
}

fn handler_don(
    don_id: String,
    f: u8,
    handler: &str,
    members: Vec<spec::GatewayDonMember>,
) -> spec::GatewayDon {
    spec::GatewayDon {
        don_id,
        f,
        handler_name: handler.to_string(),
        handler_config: spec::HandlerConfig::standard(),
        members,
    }
}

impl GatewayJobSpecFactory {
    fn gateway_dons(&self, input: &JobSpecInput<'_>) -> Result<Vec<spec::GatewayDon>, Error> {
        let mut dons = Vec::new();

        for don in &input.topology.dons {
            let web_api =
                cre_types::has_flag(&don.flags, WORKFLOW) || needs_web_api_gateway(&don.flags);
            let vault = cre_types::has_flag(&don.flags, VAULT);
            if !web_api && !vault {
                continue;
            }

            let members = members(don, input.topology.home_chain_selector)?;
            let f = don.max_faulty_nodes()?;
            if web_api {
                dons.push(handler_don(don.id.to_string(), f, WEB_API_HANDLER, members.clone()));
            }
            if vault {
                dons.push(handler_don(VAULT_HANDLER.to_string(), f, VAULT_HANDLER, members));
            }
        }

        Ok(dons)
    }
}

impl JobSpecFactory for GatewayJobSpecFactory {
    fn name(&self) -> &str {
        GATEWAY
    }

    fn generate_job_specs(&self, input: &JobSpecInput<'_>) -> Result<DonsToJobSpecs, Error> {
        let mut specs = DonsToJobSpecs::new();
        let Some(connector) = &input.topology.gateway_connector else {
            return Ok(specs);
        };

        let dons = self.gateway_dons(input)?;
        if dons.is_empty() {
            return Ok(specs);
        }

        for don in &input.topology.dons {
            let Some(node) = don.gateway_node() else {
                continue;
            };

            let mut config =
                spec::GatewayConfig::new(dons.clone(), connector.port, &connector.path);
            let http = &mut config.http_client_config;
            http.allowed_ports.extend(&self.http.extra_allowed_ports);
            http.allowed_ips.extend(self.http.extra_allowed_ips.iter().cloned());
            http.allowed_ips_cidr.extend(self.http.extra_allowed_ips_cidr.iter().cloned());

            let request = spec::gateway(node.node_id()?, config)?;
            let description = JobDescription::new(GATEWAY, NodeRole::Gateway);
            push_job_spec(&mut specs, don.id, description, request);
        }

        Ok(specs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContractsConfig;
    use cre_types::{GatewayConnector, NodeMetadata, Topology};
    use std::{collections::BTreeMap, path::Path};

    fn node(don: u32, index: usize, roles: Vec<NodeRole>) -> NodeMetadata {
        let mut node = NodeMetadata { index, roles, labels: vec![] };
        node.set_label(keys::NODE_ID, format!("{don}-{index}"));
        node.set_label(keys::address_key(42), format!("0x{don}{index:039x}"));
        node
    }

    fn don(id: u32, flags: &[&str], nodes: Vec<NodeMetadata>) -> DonMetadata {
        DonMetadata {
            id,
            name: format!("don{id}"),
            flags: flags.iter().map(|f| f.to_string()).collect(),
            nodes,
        }
    }

    fn topology(connector: bool) -> Topology {
        Topology {
            workflow_don_id: 1,
            home_chain_selector: 42,
            dons: vec![
                don(
                    1,
                    &[WORKFLOW],
                    vec![
                        node(1, 0, vec![NodeRole::Worker]),
                        node(1, 1, vec![NodeRole::Worker, NodeRole::Gateway]),
                    ],
                ),
                don(2, &[VAULT], vec![node(2, 0, vec![NodeRole::Worker])]),
                don(3, &["cron"], vec![node(3, 0, vec![NodeRole::Worker])]),
            ],
            peering: None,
            gateway_connector: connector.then(|| GatewayConnector {
                host: "don1-node1".into(),
                port: 5003,
                path: "/node".into(),
            }),
        }
    }

    fn generate(topology: &Topology, factory: &GatewayJobSpecFactory) -> DonsToJobSpecs {
        let contracts = ContractsConfig::default();
        let configs = BTreeMap::new();
        let input = JobSpecInput {
            topology,
            capability_configs: &configs,
            node_sets: &[],
            contracts: &contracts,
            blockchains: &[],
            container_dir: Path::new("/home/capabilities"),
        };
        factory.generate_job_specs(&input).unwrap()
    }

    #[test]
    fn one_job_on_the_gateway_node() {
        let factory = GatewayJobSpecFactory {
            http: GatewayHttpConfig {
                extra_allowed_ports: vec![8080],
                extra_allowed_ips: vec!["10.0.0.7".into()],
                extra_allowed_ips_cidr: vec!["0.0.0.0/0".into(), "192.168.0.0/16".into()],
            },
        };
        let specs = generate(&topology(true), &factory);

        assert_eq!(specs.len(), 1);
        let jobs = &specs[&1][&JobDescription::new(GATEWAY, NodeRole::Gateway)];
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].node_id, "1-1");

        let spec: toml::Table = jobs[0].spec.parse().unwrap();
        let config = &spec["gatewayConfig"];
        let dons = config["Dons"].as_array().unwrap();
        let handlers: Vec<_> = dons
            .iter()
            .map(|d| (d["DonId"].as_str().unwrap(), d["HandlerName"].as_str().unwrap()))
            .collect();
        assert_eq!(handlers, vec![("1", WEB_API_HANDLER), ("vault", VAULT_HANDLER)]);
        assert_eq!(dons[0]["Members"].as_array().unwrap().len(), 2);
        assert_eq!(dons[0]["Members"][1]["Name"].as_str(), Some("DON 1 - Node 1"));

        let http = &config["HTTPClientConfig"];
        let ports: Vec<_> =
            http["AllowedPorts"].as_array().unwrap().iter().map(|p| p.as_integer()).collect();
        assert_eq!(ports, vec![Some(80), Some(443), Some(8080)]);
        let strings = |key: &str| -> Vec<String> {
            http[key].as_array().unwrap().iter().map(|v| v.as_str().unwrap().to_string()).collect()
        };
        assert_eq!(strings("AllowedIPs"), vec!["10.0.0.7"]);
        assert_eq!(strings("AllowedIPsCIDR"), vec!["0.0.0.0/0", "192.168.0.0/16"]);
    }

    #[test]
    fn nothing_without_connector() {
        assert!(generate(&topology(false), &GatewayJobSpecFactory::default()).is_empty());
    }
}
