//! Job spec TOML for the jobs the harness proposes.

use alloy::primitives::{keccak256, Address};
use cre_proto::ProposeJobRequest;
use serde::Serialize;

/// OCR3 plugin binary inside the node image.
pub const OCR3_PLUGIN_COMMAND: &str = "/usr/local/bin/chainlink-ocr3-capability";
/// Name of the gateway job.
pub const GATEWAY_JOB_NAME: &str = "gateway";

/// External job id for `name` on `node_id`.
///
/// The id only depends on its inputs so proposing the same job twice yields the same id and the
/// job distributor treats the second proposal as a revision.
pub fn external_job_id(node_id: &str, name: &str) -> String {
    let hash = keccak256(format!("{node_id}/{name}"));
    let hex: String = hash[..16].iter().map(|b| format!("{b:02x}")).collect();

    format!("{}-{}-{}-{}-{}", &hex[..8], &hex[8..12], &hex[12..16], &hex[16..20], &hex[20..32])
}

fn request(node_id: &str, spec: String) -> ProposeJobRequest {
    ProposeJobRequest { node_id: node_id.to_string(), spec, labels: Vec::new() }
}

/// `value` as a TOML string.
fn quoted(value: &str) -> String {
    toml::Value::String(value.to_string()).to_string()
}

/// Standard capability job. `config` is the rendered capability config, empty for none.
pub fn worker_standard_capability(
    node_id: &str,
    name: &str,
    command: &str,
    config: &str,
) -> ProposeJobRequest {
    let spec = format!(
        r#"type = "standardcapabilities"
schemaVersion = 1
externalJobID = "{}"
name = {}
forwardingAllowed = false
command = {}
config = {}
"#,
        external_job_id(node_id, name),
        quoted(name),
        quoted(command),
        quoted(config),
    );

    request(node_id, spec)
}

/// OCR3 bootstrap job tracking the OCR3 capability contract.
pub fn bootstrap_ocr3(
    node_id: &str,
    name: &str,
    contract: Address,
    chain_id: u64,
) -> ProposeJobRequest {
    let spec = format!(
        r#"type = "bootstrap"
schemaVersion = 1
externalJobID = "{}"
name = "{name}"
contractID = "{contract}"
contractConfigTrackerPollInterval = "1s"
contractConfigConfirmations = 1
relay = "evm"

[relayConfig]
chainID = {chain_id}
providerType = "ocr3-capability"
"#,
        external_job_id(node_id, name)
    );

    request(node_id, spec)
}

/// Inputs of [`worker_ocr3`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ocr3WorkerJob<'a> {
    /// Job distributor node id.
    pub node_id: &'a str,
    /// Job name.
    pub name: &'a str,
    /// OCR3 capability contract.
    pub contract: Address,
    /// Transmitter address on the home chain.
    pub transmitter: &'a str,
    /// OCR2 key bundle id.
    pub ocr2_key_bundle_id: &'a str,
    /// `peer@host:port` bootstrappers.
    pub bootstrappers: Vec<String>,
    /// Home chain id.
    pub chain_id: u64,
}

/// OCR3 consensus job on a worker node.
pub fn worker_ocr3(job: &Ocr3WorkerJob<'_>) -> ProposeJobRequest {
    let bootstrappers =
        job.bootstrappers.iter().map(|b| format!("  \"{b}\",\n")).collect::<String>();
    let spec = format!(
        r#"type = "offchainreporting2"
schemaVersion = 1
externalJobID = "{id}"
name = "{name}"
forwardingAllowed = false
contractID = "{contract}"
ocrKeyBundleID = "{bundle}"
p2pv2Bootstrappers = [
{bootstrappers}]
relay = "evm"
pluginType = "plugin"
transmitterID = "{transmitter}"

[relayConfig]
chainID = "{chain_id}"

[pluginConfig]
command = "{OCR3_PLUGIN_COMMAND}"
ocrVersion = 3
pluginName = "ocr-capability"
providerType = "ocr3-capability"
telemetryType = "plugin"

[onchainSigningStrategy]
strategyName = "multi-chain"
[onchainSigningStrategy.config]
evm = "{bundle}"
"#,
        id = external_job_id(job.node_id, job.name),
        name = job.name,
        contract = job.contract,
        bundle = job.ocr2_key_bundle_id,
        transmitter = job.transmitter,
        chain_id = job.chain_id,
    );

    request(job.node_id, spec)
}

/// Gateway job spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayJobSpec {
    #[serde(rename = "type")]
    job_type: String,
    schema_version: u32,
    #[serde(rename = "externalJobID")]
    external_job_id: String,
    name: String,
    forwarding_allowed: bool,
    gateway_config: GatewayConfig,
}

/// Gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GatewayConfig {
    /// Node authentication.
    pub connection_manager_config: ConnectionManagerConfig,
    /// DONs served by the gateway.
    pub dons: Vec<GatewayDon>,
    /// Server the nodes connect to.
    pub node_server_config: ServerConfig,
    /// Server users connect to.
    pub user_server_config: ServerConfig,
    /// Outgoing HTTP.
    #[serde(rename = "HTTPClientConfig")]
    pub http_client_config: HttpClientConfig,
}

/// Node authentication settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
#[allow(missing_docs)]
pub struct ConnectionManagerConfig {
    pub auth_challenge_len: u32,
    pub auth_gateway_id: String,
    pub auth_timestamp_tolerance_sec: u32,
    pub heartbeat_interval_sec: u32,
}

/// A DON behind the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GatewayDon {
    /// DON id as the handler knows it.
    pub don_id: String,
    /// Faulty nodes tolerated.
    #[serde(rename = "F")]
    pub f: u8,
    /// `web-api-capabilities` or `vault`.
    pub handler_name: String,
    /// Handler settings.
    pub handler_config: HandlerConfig,
    /// Member nodes.
    pub members: Vec<GatewayDonMember>,
}

/// Handler settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
#[allow(missing_docs)]
pub struct HandlerConfig {
    pub max_allowed_message_age_sec: u32,
    pub node_rate_limiter: NodeRateLimiter,
}

/// Per handler rate limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
#[allow(missing_docs)]
pub struct NodeRateLimiter {
    pub global_burst: u32,
    #[serde(rename = "GlobalRPS")]
    pub global_rps: u32,
    pub per_sender_burst: u32,
    #[serde(rename = "PerSenderRPS")]
    pub per_sender_rps: u32,
}

/// Member node of a gateway DON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GatewayDonMember {
    /// Node's address on the home chain.
    pub address: String,
    /// Display name.
    pub name: String,
}

/// Node or user facing server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
#[allow(missing_docs)]
pub struct ServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type_header: Option<String>,
    pub handshake_timeout_millis: u32,
    pub max_request_bytes: u32,
    pub path: String,
    pub port: u16,
    pub read_timeout_millis: u32,
    pub request_timeout_millis: u32,
    pub write_timeout_millis: u32,
}

/// Outgoing HTTP restrictions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
#[allow(missing_docs)]
pub struct HttpClientConfig {
    pub max_response_bytes: u64,
    pub allowed_ports: Vec<u16>,
    #[serde(rename = "AllowedIPs")]
    pub allowed_ips: Vec<String>,
    #[serde(rename = "AllowedIPsCIDR")]
    pub allowed_ips_cidr: Vec<String>,
}

impl HandlerConfig {
    /// Settings shared by every handler the harness configures.
    pub fn standard() -> Self {
        Self {
            max_allowed_message_age_sec: 1_000,
            node_rate_limiter: NodeRateLimiter {
                global_burst: 10,
                global_rps: 50,
                per_sender_burst: 10,
                per_sender_rps: 10,
            },
        }
    }
}

impl GatewayConfig {
    /// Gateway serving `dons`, accepting node connections on `node_port` at `node_path`.
    pub fn new(dons: Vec<GatewayDon>, node_port: u16, node_path: &str) -> Self {
        Self {
            connection_manager_config: ConnectionManagerConfig {
                auth_challenge_len: 10,
                auth_gateway_id: "por_gateway".to_string(),
                auth_timestamp_tolerance_sec: 5,
                heartbeat_interval_sec: 20,
            },
            dons,
            node_server_config: ServerConfig {
                content_type_header: None,
                handshake_timeout_millis: 1_000,
                max_request_bytes: 100_000,
                path: node_path.to_string(),
                port: node_port,
                read_timeout_millis: 1_000,
                request_timeout_millis: 10_000,
                write_timeout_millis: 1_000,
            },
            user_server_config: ServerConfig {
                content_type_header: Some("application/jsonrpc".to_string()),
                handshake_timeout_millis: 1_000,
                max_request_bytes: 100_000,
                path: "/".to_string(),
                port: 5_002,
                read_timeout_millis: 1_000,
                request_timeout_millis: 10_000,
                write_timeout_millis: 1_000,
            },
            http_client_config: HttpClientConfig {
                max_response_bytes: 100_000_000,
                allowed_ports: vec![80, 443],
                allowed_ips: Vec::new(),
                allowed_ips_cidr: Vec::new(),
            },
        }
    }
}

/// Gateway job on `node_id`.
pub fn gateway(
    node_id: &str,
    config: GatewayConfig,
) -> Result<ProposeJobRequest, toml::ser::Error> {
    let spec = GatewayJobSpec {
        job_type: "gateway".to_string(),
        schema_version: 1,
        external_job_id: external_job_id(node_id, GATEWAY_JOB_NAME),
        name: GATEWAY_JOB_NAME.to_string(),
        forwarding_allowed: false,
        gateway_config: config,
    };

    Ok(request(node_id, toml::to_string(&spec)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_job_id_is_stable_and_uuid_shaped() {
        let id = external_job_id("node-1", "cron");
        assert_eq!(id, external_job_id("node-1", "cron"));
        assert_ne!(id, external_job_id("node-2", "cron"));
        assert_ne!(id, external_job_id("node-1", "evm-1337"));

        let groups: Vec<_> = id.split('-').map(str::len).collect();
        assert_eq!(groups, vec![8, 4, 4, 4, 12]);
    }

    #[test]
    fn standard_capability_without_config() {
        let req = worker_standard_capability("n1", "cron", "/home/capabilities/cron", "");
        assert_eq!(req.node_id, "n1");

        let spec: toml::Table = req.spec.parse().unwrap();
        assert_eq!(spec["type"].as_str(), Some("standardcapabilities"));
        assert_eq!(spec["command"].as_str(), Some("/home/capabilities/cron"));
        assert_eq!(spec["config"].as_str(), Some(""));
        assert_eq!(spec["externalJobID"].as_str().unwrap(), external_job_id("n1", "cron"));
    }

    #[test]
    fn standard_capability_config_is_escaped() {
        let config = "{\"chainId\":1337,\"label\":\"it's\"}\nNumWorkers = 3\n";
        let req = worker_standard_capability("n1", "evm-1337", "/home/o'neil/evm \"x\"", config);

        let spec: toml::Table = req.spec.parse().unwrap();
        assert_eq!(spec["config"].as_str(), Some(config));
        assert_eq!(spec["command"].as_str(), Some("/home/o'neil/evm \"x\""));
        assert_eq!(spec["name"].as_str(), Some("evm-1337"));
    }

    #[test]
    fn ocr3_jobs_parse() {
        let contract = Address::repeat_byte(0x03);
        let bootstrap: toml::Table =
            bootstrap_ocr3("b", "ocr3-bootstrap", contract, 1337).spec.parse().unwrap();
        assert_eq!(bootstrap["type"].as_str(), Some("bootstrap"));
        assert_eq!(bootstrap["relayConfig"]["chainID"].as_integer(), Some(1337));

        let job = Ocr3WorkerJob {
            node_id: "w",
            name: "consensus",
            contract,
            transmitter: "0xabc",
            ocr2_key_bundle_id: "bundle",
            bootstrappers: vec!["peer@bootstrap:5001".into()],
            chain_id: 1337,
        };
        let worker: toml::Table = worker_ocr3(&job).spec.parse().unwrap();
        assert_eq!(worker["type"].as_str(), Some("offchainreporting2"));
        assert_eq!(worker["p2pv2Bootstrappers"][0].as_str(), Some("peer@bootstrap:5001"));
        assert_eq!(worker["onchainSigningStrategy"]["config"]["evm"].as_str(), Some("bundle"));
        assert_eq!(worker["pluginConfig"]["command"].as_str(), Some(OCR3_PLUGIN_COMMAND));
    }

    #[test]
    fn gateway_job_serializes() {
        let don = GatewayDon {
            don_id: "1".into(),
            f: 1,
            handler_name: "web-api-capabilities".into(),
            handler_config: HandlerConfig::standard(),
            members: vec![GatewayDonMember {
                address: "0xabc".into(),
                name: "DON 1 - Node 0".into(),
            }],
        };
        let req = gateway("g", GatewayConfig::new(vec![don], 5003, "/node")).unwrap();

        let spec: toml::Table = req.spec.parse().unwrap();
        assert_eq!(spec["type"].as_str(), Some("gateway"));
        assert_eq!(spec["externalJobID"].as_str().unwrap(), external_job_id("g", GATEWAY_JOB_NAME));

        let config = &spec["gatewayConfig"];
        assert_eq!(config["Dons"][0]["F"].as_integer(), Some(1));
        assert_eq!(config["Dons"][0]["Members"][0]["Address"].as_str(), Some("0xabc"));
        assert_eq!(
            config["Dons"][0]["HandlerConfig"]["NodeRateLimiter"]["GlobalRPS"].as_integer(),
            Some(50)
        );
        assert_eq!(config["NodeServerConfig"]["Port"].as_integer(), Some(5003));
        assert!(config["NodeServerConfig"].get("ContentTypeHeader").is_none());
        assert_eq!(config["HTTPClientConfig"]["AllowedPorts"][1].as_integer(), Some(443));
    }
}
