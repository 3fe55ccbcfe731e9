use cre_harness::{
    environment, jd,
    jobs::{
        default_factories,
        dispatch::{self, DispatchConfig},
    },
    registry::RegistryPlan,
    Environment,
};
use cre_test_utils::{test_tracing, MockJobDistributor};
use cre_types::{count_job_specs, keys, DonsToJobSpecs, JobDescription, NodeRole};
use std::{path::Path, sync::Arc, time::Duration};

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/environment.toml");
const CONTAINER_DIR: &str = "/home/capabilities";

fn load() -> Environment {
    Environment::load(FIXTURE).unwrap()
}

fn job_specs(env: &Environment) -> Result<DonsToJobSpecs, environment::Error> {
    env.job_specs(&default_factories(&env.config.gateway), Path::new(CONTAINER_DIR))
}

async fn registered(jd: &MockJobDistributor) -> Environment {
    let mut env = load();
    jd::register_nodes(jd, &mut env.topology, "it").await.unwrap();
    jd::wait_for_nodes(jd, &env.topology, Duration::from_secs(10)).await.unwrap();
    env
}

#[test]
fn topology_from_fixture() {
    let env = load();
    let topology = &env.topology;

    assert_eq!(topology.workflow_don_id, 1);
    assert_eq!(topology.dons.len(), 2);
    assert_eq!(topology.dons[1].flags, vec!["cron", "evm-1337", "write-evm-1337"]);

    let peering = topology.peering.as_ref().unwrap();
    assert_eq!(peering.ocr.bootstrapper(), "12D3KooWDon1Node0@workflow-node0:5001");

    let connector = topology.gateway_connector.as_ref().unwrap();
    assert_eq!(connector.host, "workflow-node4");

    let gateway = topology.dons[0].gateway_node().unwrap();
    assert!(gateway.has_role(NodeRole::Worker));
}

#[test]
fn node_configs_for_every_node() {
    let configs = load().node_configs().unwrap();
    assert_eq!(configs.len(), 7);

    let parsed: Vec<toml::Table> = configs.values().map(|c| c.parse().unwrap()).collect();
    let bootstrap = &configs[&(1, 0)].parse::<toml::Table>().unwrap();
    assert_eq!(
        bootstrap["P2P"]["V2"]["DefaultBootstrappers"][0].as_str(),
        Some("12D3KooWDon1Node0@localhost:5001")
    );
    assert_eq!(parsed.len(), 7);

    let workflow_worker = configs[&(1, 1)].parse::<toml::Table>().unwrap();
    assert!(workflow_worker["Capabilities"].get("WorkflowRegistry").is_some());
    assert_eq!(
        workflow_worker["Capabilities"]["GatewayConnector"]["Gateways"][0]["URL"].as_str(),
        Some("ws://workflow-node4:5003/node")
    );
    // only DONs with write-evm send through the forwarder
    assert!(workflow_worker["EVM"][0].get("Workflow").is_none());

    let capability_worker = configs[&(2, 0)].parse::<toml::Table>().unwrap();
    assert!(capability_worker["Capabilities"].get("WorkflowRegistry").is_none());
    assert!(capability_worker["Capabilities"].get("GatewayConnector").is_none());
    assert_eq!(
        capability_worker["P2P"]["V2"]["DefaultBootstrappers"][0].as_str(),
        Some("12D3KooWDon1Node0@workflow-node0:5001")
    );
    assert_eq!(
        capability_worker["EVM"][0]["Workflow"]["ForwarderAddress"].as_str(),
        Some("0xCf7Ed3AccA5a467e9e704C703E8D87F634fB0Fc9")
    );
}

#[tokio::test]
async fn registering_twice_reuses_node_ids() {
    let jd = MockJobDistributor::new();
    let first = registered(&jd).await;
    let second = registered(&jd).await;

    assert_eq!(jd.nodes().len(), 7);
    assert_eq!(first.node_ids(), second.node_ids());
}

#[test]
fn job_specs_need_node_ids() {
    let env = load();
    assert!(job_specs(&env).is_err());
}

#[tokio::test]
async fn generates_job_specs_for_registered_nodes() {
    test_tracing();
    let jd = MockJobDistributor::new();
    let env = registered(&jd).await;
    assert_eq!(env.node_ids().len(), 7);

    let specs = job_specs(&env).unwrap();

    let workflow = &specs[&1];
    assert_eq!(workflow[&JobDescription::new("cron", NodeRole::Worker)].len(), 4);
    assert_eq!(workflow[&JobDescription::new("custom-compute", NodeRole::Worker)].len(), 4);
    assert_eq!(workflow[&JobDescription::new("ocr3", NodeRole::Bootstrap)].len(), 1);
    assert_eq!(workflow[&JobDescription::new("ocr3", NodeRole::Worker)].len(), 4);
    let gateway = &workflow[&JobDescription::new("gateway", NodeRole::Gateway)];
    assert_eq!(gateway.len(), 1);
    let gateway: toml::Table = gateway[0].spec.parse().unwrap();
    let http = &gateway["gatewayConfig"]["HTTPClientConfig"];
    assert_eq!(http["AllowedPorts"][2].as_integer(), Some(8080));
    assert_eq!(http["AllowedIPsCIDR"][0].as_str(), Some("0.0.0.0/0"));
    assert!(http["AllowedIPs"].as_array().unwrap().is_empty());

    let capabilities = &specs[&2];
    assert_eq!(capabilities[&JobDescription::new("cron", NodeRole::Worker)].len(), 2);
    let evm = &capabilities[&JobDescription::new("evm-1337", NodeRole::Worker)];
    assert_eq!(evm.len(), 2);
    let spec: toml::Table = evm[0].spec.parse().unwrap();
    assert_eq!(spec["command"].as_str(), Some("/home/capabilities/evm"));
    let config: serde_json::Value =
        serde_json::from_str(spec["config"].as_str().unwrap()).unwrap();
    assert_eq!(config["receiverGasMinimum"], 500);
    assert_eq!(config["creForwarderAddress"], "0xCf7Ed3AccA5a467e9e704C703E8D87F634fB0Fc9");

    assert_eq!(count_job_specs(&specs), 18);
}

#[tokio::test(start_paused = true)]
async fn proposes_every_job() {
    let jd = MockJobDistributor::new().with_delay(Duration::from_millis(50));
    let env = registered(&jd).await;
    let specs = job_specs(&env).unwrap();

    let jd = Arc::new(jd);
    let proposed =
        dispatch::create_jobs(Arc::clone(&jd), &env.topology, specs, &DispatchConfig::default())
            .await
            .unwrap();

    assert_eq!(proposed, 18);
    assert_eq!(jd.proposals().len(), 18);
    assert!(jd.max_in_flight() <= 5);
}

#[tokio::test(start_paused = true)]
async fn failing_node_fails_its_don() {
    let jd = MockJobDistributor::new();
    let env = registered(&jd).await;
    let specs = job_specs(&env).unwrap();

    let failing = env.topology.dons[0].nodes[2].node_id().unwrap().to_string();
    jd.fail_node(&failing);

    let err = dispatch::create_jobs(Arc::new(jd), &env.topology, specs, &DispatchConfig::default())
        .await
        .unwrap_err();

    assert!(matches!(err, dispatch::Error::Don { don_id: 1, .. }));
    // cron, custom-compute and ocr3 worker jobs on that node
    assert_eq!(err.failures().len(), 3);
    assert!(err.failures().iter().all(|f| f.node_id == failing));
}

#[test]
fn registry_plan_from_fixture() {
    let env = load();
    let plan = RegistryPlan::from_topology(
        &env.topology,
        &env.config.blockchains,
        alloy::primitives::Address::ZERO,
    )
    .unwrap();

    let names: Vec<_> = plan.capabilities.iter().map(|c| c.labelledName.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "offchain_reporting",
            "cron-trigger",
            "custom-compute",
            "evm:ChainSelector:3379446385462418246",
            "write_evm_1337",
        ]
    );
    assert_eq!(plan.nodes.len(), 6);
    assert_eq!(plan.workflow_don().unwrap().f, 1);
    assert!(env.topology.dons[1].nodes.iter().all(|n| n.label_value(keys::P2P_KEY).is_ok()));
}
