//! Capabilities the harness knows how to configure.

use cre_contracts::capabilities_registry::CapabilityType;

/// Capability flag of the DON running workflows.
pub const WORKFLOW: &str = "workflow";
/// Capability flag of DONs hosting the gateway node.
pub const GATEWAY: &str = "gateway";
/// OCR3 consensus.
pub const OCR3: &str = "ocr3";
/// Cron trigger.
pub const CRON: &str = "cron";
/// Custom compute action.
pub const CUSTOM_COMPUTE: &str = "custom-compute";
/// Web API target.
pub const WEB_API_TARGET: &str = "web-api-target";
/// Web API trigger.
pub const WEB_API_TRIGGER: &str = "web-api-trigger";
/// HTTP action.
pub const HTTP_ACTION: &str = "http-action";
/// HTTP trigger.
pub const HTTP_TRIGGER: &str = "http-trigger";
/// Vault.
pub const VAULT: &str = "vault";
/// Mock capability used by tests.
pub const MOCK: &str = "mock";
/// EVM chain capability.
pub const EVM: &str = "evm";
/// Write target through the keystone forwarder, configured in the node TOML.
pub const WRITE_EVM: &str = "write-evm";
/// Contract reader.
pub const READ_CONTRACT: &str = "read-contract";
/// Log event trigger.
pub const LOG_EVENT_TRIGGER: &str = "log-event-trigger";

/// How a capability is deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Marks a DON role, no job of its own.
    Role,
    /// Dedicated job spec factory (consensus, gateway).
    Custom,
    /// One standard capability job per worker node.
    Don,
    /// One standard capability job per worker node and enabled chain.
    Chain,
    /// Only changes the node TOML; one registration per enabled chain.
    NodeConfig,
}

/// On-chain registration of a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    /// Labelled name. For chain scoped capabilities `{chain_id}` and `{chain_selector}` are
    /// substituted.
    pub labelled_name: &'static str,
    /// Semver version.
    pub version: &'static str,
    /// Capability type.
    pub capability_type: CapabilityType,
}

impl Registration {
    /// Labelled name for `chain_id`/`chain_selector`.
    pub fn name_for_chain(&self, chain_id: u64, chain_selector: u64) -> String {
        self.labelled_name
            .replace("{chain_id}", &chain_id.to_string())
            .replace("{chain_selector}", &chain_selector.to_string())
    }
}

/// A capability known to the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownCapability {
    /// Flag used in the configuration.
    pub flag: &'static str,
    /// Deployment scope.
    pub scope: Scope,
    /// Default config template of the standard capability job.
    pub config_template: &'static str,
    /// Registration in the capabilities registry, if any.
    pub registration: Option<Registration>,
    /// Whether DONs with this capability need the web API gateway handler.
    pub needs_web_api_gateway: bool,
}

const fn registration(
    labelled_name: &'static str,
    version: &'static str,
    capability_type: CapabilityType,
) -> Option<Registration> {
    Some(Registration { labelled_name, version, capability_type })
}

const EVM_TEMPLATE: &str = r#"{"chainId":{{.ChainID}},"network":"{{.NetworkFamily}}","logTriggerPollInterval":{{.LogTriggerPollInterval}},"creForwarderAddress":"{{.CreForwarderAddress}}","receiverGasMinimum":{{.ReceiverGasMinimum}},"nodeAddress":"{{.NodeAddress}}"}"#;
const READ_CONTRACT_TEMPLATE: &str = r#"{"chainId":{{.ChainID}},"network":"{{.NetworkFamily}}"}"#;
const LOG_EVENT_TRIGGER_TEMPLATE: &str = r#"{"chainId":"{{.ChainID}}","network":"{{.NetworkFamily}}","lookbackBlocks":{{.LookbackBlocks}},"pollPeriod":{{.PollPeriod}}}"#;
const CUSTOM_COMPUTE_TEMPLATE: &str = r#"NumWorkers = {{.NumWorkers}}
[rateLimiter]
globalRPS = {{.GlobalRPS}}
globalBurst = {{.GlobalBurst}}
perSenderRPS = {{.PerSenderRPS}}
perSenderBurst = {{.PerSenderBurst}}
"#;
const HTTP_ACTION_TEMPLATE: &str = r#"{"proxyMode":"{{.ProxyMode}}","incomingRateLimiter":{"globalRPS":{{.GlobalRPS}},"globalBurst":{{.GlobalBurst}}},"outgoingRateLimiter":{"globalRPS":{{.GlobalRPS}},"globalBurst":{{.GlobalBurst}}}}"#;

static KNOWN: &[KnownCapability] = &[
    KnownCapability {
        flag: WORKFLOW,
        scope: Scope::Role,
        config_template: "",
        registration: None,
        needs_web_api_gateway: false,
    },
    KnownCapability {
        flag: GATEWAY,
        scope: Scope::Role,
        config_template: "",
        registration: None,
        needs_web_api_gateway: false,
    },
    KnownCapability {
        flag: OCR3,
        scope: Scope::Custom,
        config_template: "",
        registration: registration("offchain_reporting", "1.0.0", CapabilityType::Consensus),
        needs_web_api_gateway: false,
    },
    KnownCapability {
        flag: CRON,
        scope: Scope::Don,
        config_template: "",
        registration: registration("cron-trigger", "1.0.0", CapabilityType::Trigger),
        needs_web_api_gateway: false,
    },
    KnownCapability {
        flag: CUSTOM_COMPUTE,
        scope: Scope::Don,
        config_template: CUSTOM_COMPUTE_TEMPLATE,
        registration: registration("custom-compute", "1.0.0", CapabilityType::Action),
        needs_web_api_gateway: true,
    },
    KnownCapability {
        flag: WEB_API_TARGET,
        scope: Scope::Don,
        config_template: "",
        registration: registration("web-api-target", "1.0.0", CapabilityType::Target),
        needs_web_api_gateway: true,
    },
    KnownCapability {
        flag: WEB_API_TRIGGER,
        scope: Scope::Don,
        config_template: "",
        registration: registration("web-api-trigger", "1.0.0", CapabilityType::Trigger),
        needs_web_api_gateway: true,
    },
    KnownCapability {
        flag: HTTP_ACTION,
        scope: Scope::Don,
        config_template: HTTP_ACTION_TEMPLATE,
        registration: registration("http-actions", "1.0.0-alpha", CapabilityType::Action),
        needs_web_api_gateway: true,
    },
    KnownCapability {
        flag: HTTP_TRIGGER,
        scope: Scope::Don,
        config_template: "",
        registration: registration("http-trigger", "1.0.0-alpha", CapabilityType::Trigger),
        needs_web_api_gateway: true,
    },
    KnownCapability {
        flag: VAULT,
        scope: Scope::Don,
        config_template: "",
        registration: registration("vault", "1.0.0", CapabilityType::Action),
        needs_web_api_gateway: false,
    },
    KnownCapability {
        flag: MOCK,
        scope: Scope::Don,
        config_template: "",
        registration: registration("mock", "1.0.0", CapabilityType::Trigger),
        needs_web_api_gateway: false,
    },
    KnownCapability {
        flag: EVM,
        scope: Scope::Chain,
        config_template: EVM_TEMPLATE,
        registration: registration(
            "evm:ChainSelector:{chain_selector}",
            "1.0.0",
            CapabilityType::Trigger,
        ),
        needs_web_api_gateway: false,
    },
    KnownCapability {
        flag: WRITE_EVM,
        scope: Scope::NodeConfig,
        config_template: "",
        registration: registration("write_evm_{chain_id}", "1.0.0", CapabilityType::Target),
        needs_web_api_gateway: false,
    },
    KnownCapability {
        flag: READ_CONTRACT,
        scope: Scope::Chain,
        config_template: READ_CONTRACT_TEMPLATE,
        registration: registration(
            "read-contract-evm-{chain_id}",
            "1.0.0",
            CapabilityType::Action,
        ),
        needs_web_api_gateway: false,
    },
    KnownCapability {
        flag: LOG_EVENT_TRIGGER,
        scope: Scope::Chain,
        config_template: LOG_EVENT_TRIGGER_TEMPLATE,
        registration: registration(
            "log-event-trigger-evm-{chain_id}",
            "1.0.0",
            CapabilityType::Trigger,
        ),
        needs_web_api_gateway: false,
    },
];

/// Every capability the harness knows.
pub fn known_capabilities() -> &'static [KnownCapability] {
    KNOWN
}

/// Look up a capability by flag.
pub fn known_capability(flag: &str) -> Option<&'static KnownCapability> {
    KNOWN.iter().find(|c| c.flag == flag)
}

/// Whether a DON with `flags` needs a web API gateway handler.
pub fn needs_web_api_gateway(flags: &[String]) -> bool {
    flags.iter().any(|f| known_capability(f).is_some_and(|c| c.needs_web_api_gateway))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn flags_are_unique() {
        let flags: HashSet<_> = known_capabilities().iter().map(|c| c.flag).collect();
        assert_eq!(flags.len(), known_capabilities().len());
    }

    #[test]
    fn standard_capabilities_are_registered() {
        for cap in known_capabilities() {
            if matches!(cap.scope, Scope::Don | Scope::Chain | Scope::NodeConfig) {
                assert!(cap.registration.is_some(), "{} has no registration", cap.flag);
            }
        }
    }

    #[test]
    fn chain_registration_names() {
        let evm = known_capability(EVM).unwrap().registration.unwrap();
        assert_eq!(evm.name_for_chain(1337, 42), "evm:ChainSelector:42");

        let read = known_capability(READ_CONTRACT).unwrap().registration.unwrap();
        assert_eq!(read.name_for_chain(1337, 42), "read-contract-evm-1337");
    }

    #[test]
    fn gateway_needs() {
        assert!(needs_web_api_gateway(&["cron".into(), "custom-compute".into()]));
        assert!(!needs_web_api_gateway(&["cron".into(), "vault".into()]));
        assert!(known_capability("nope").is_none());
    }
}
