//! Shared types for describing a CRE environment: DONs, their nodes, capability configuration and
//! the job specs proposed to them.

pub mod capability;
pub mod don;
pub mod job;
pub mod offchain;

pub use capability::{
    resolve_capability_config_for_don, resolve_capability_for_chain, CapabilityConfig,
    ChainCapabilityConfig, ConfigMap,
};
pub use don::{
    has_flag, has_flag_for_any_chain, keys, DonMetadata, GatewayConnector, Label, NodeMetadata,
    NodeRole, Peering, PeeringData, Topology,
};
pub use job::{
    count_job_specs, merge_job_specs, push_job_spec, DonJobs, DonsToJobSpecs, JobDescription,
};
pub use offchain::OffchainClient;

/// Capability flag, for example `cron` or `evm`. Chain specific flags carry a `-<chain id>`
/// suffix.
pub type CapabilityFlag = String;
