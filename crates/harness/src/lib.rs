//! Orchestration of CRE test environments.
//!
//! Loads an environment TOML, builds the DON topology from its node sets, renders node
//! configuration, generates capability job specs and proposes them through the job distributor.
//! The capabilities registry and the chain forwarders are configured from the same topology.

pub mod capabilities;
pub mod cli;
pub mod config;
pub mod environment;
pub mod jd;
pub mod jobs;
pub mod node_config;
pub mod registry;
pub mod retry;
pub mod topology;

pub use environment::Environment;
