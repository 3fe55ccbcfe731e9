//! Utilities for setting up tests.

use async_trait::async_trait;
use cre_proto::{
    ChainConfig, GetNodeRequest, GetNodeResponse, ListNodeChainConfigsRequest,
    ListNodeChainConfigsResponse, ListNodesRequest, ListNodesResponse, Node, Proposal,
    ProposalStatus, ProposeJobRequest, ProposeJobResponse, RegisterNodeRequest,
    RegisterNodeResponse,
};
use cre_types::OffchainClient;
use std::{
    collections::{BTreeMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};
use tracing_subscriber::EnvFilter;

/// Initialize a tracing subscriber for tests. Use `RUST_LOG` to set the filter level.
/// If the tracing subscriber has already been initialized in a previous test, this
/// function will silently fail due to `try_init()`, which does not reinitialize
/// the subscriber if one is already set.
pub fn test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

/// How long a hanging node takes to answer. Longer than any timeout used in tests.
pub const HANG_DURATION: Duration = Duration::from_secs(3600);

#[derive(Debug, Default)]
struct State {
    proposals: Vec<ProposeJobRequest>,
    failing_nodes: HashSet<String>,
    hanging_nodes: HashSet<String>,
    panicking_nodes: HashSet<String>,
    in_flight: usize,
    max_in_flight: usize,
    nodes: BTreeMap<String, Node>,
    polls: BTreeMap<String, usize>,
    chain_configs: Vec<ChainConfig>,
}

/// In-memory job distributor.
///
/// Records proposals and registrations, and can be told to reject, hang or panic for specific
/// nodes. Registered nodes report connected once they were polled `connect_after_polls` times.
#[derive(Debug, Clone, Default)]
pub struct MockJobDistributor {
    state: Arc<Mutex<State>>,
    delay: Duration,
    connect_after_polls: usize,
}

struct InFlight<'a>(&'a MockJobDistributor);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.state().in_flight -= 1;
    }
}

impl MockJobDistributor {
    /// A job distributor that accepts everything immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every proposal by `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Report registered nodes as connected only after `polls` calls to `get_node`.
    pub fn with_connect_after_polls(mut self, polls: usize) -> Self {
        self.connect_after_polls = polls;
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Reject proposals for `node_id`.
    pub fn fail_node(&self, node_id: &str) {
        self.state().failing_nodes.insert(node_id.to_string());
    }

    /// Never answer proposals for `node_id` within [`HANG_DURATION`].
    pub fn hang_node(&self, node_id: &str) {
        self.state().hanging_nodes.insert(node_id.to_string());
    }

    /// Panic when a job is proposed to `node_id`.
    pub fn panic_on_node(&self, node_id: &str) {
        self.state().panicking_nodes.insert(node_id.to_string());
    }

    /// Chain configs returned by `list_node_chain_configs`.
    pub fn add_chain_config(&self, config: ChainConfig) {
        self.state().chain_configs.push(config);
    }

    /// Accepted proposals in completion order.
    pub fn proposals(&self) -> Vec<ProposeJobRequest> {
        self.state().proposals.clone()
    }

    /// Highest number of concurrent `propose_job` calls seen.
    pub fn max_in_flight(&self) -> usize {
        self.state().max_in_flight
    }

    /// Registered nodes by id.
    pub fn nodes(&self) -> BTreeMap<String, Node> {
        self.state().nodes.clone()
    }
}

#[async_trait]
impl OffchainClient for MockJobDistributor {
    async fn propose_job(
        &self,
        request: ProposeJobRequest,
    ) -> Result<ProposeJobResponse, tonic::Status> {
        let (hang, fail) = {
            let mut state = self.state();
            if state.panicking_nodes.contains(&request.node_id) {
                drop(state);
                panic!("proposal to {} panicked", request.node_id);
            }
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            (
                state.hanging_nodes.contains(&request.node_id),
                state.failing_nodes.contains(&request.node_id),
            )
        };
        let _in_flight = InFlight(self);

        if hang {
            tokio::time::sleep(HANG_DURATION).await;
        } else if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if fail {
            let msg = format!("node {} rejected the job", request.node_id);
            return Err(tonic::Status::internal(msg));
        }

        let mut state = self.state();
        let proposal = Proposal {
            id: format!("proposal-{}", state.proposals.len()),
            revision: 1,
            status: ProposalStatus::Pending as i32,
            spec: request.spec.clone(),
            job_id: format!("job-{}", state.proposals.len()),
        };
        state.proposals.push(request);

        Ok(ProposeJobResponse { proposal: Some(proposal) })
    }

    async fn register_node(
        &self,
        request: RegisterNodeRequest,
    ) -> Result<RegisterNodeResponse, tonic::Status> {
        let mut state = self.state();
        if state.nodes.values().any(|n| n.public_key == request.public_key) {
            return Err(tonic::Status::already_exists(format!(
                "node with public key {} already registered",
                request.public_key
            )));
        }

        let node = Node {
            id: format!("node-{}", state.nodes.len() + 1),
            name: request.name,
            public_key: request.public_key,
            is_enabled: true,
            is_connected: self.connect_after_polls == 0,
            labels: request.labels,
        };
        state.nodes.insert(node.id.clone(), node.clone());

        Ok(RegisterNodeResponse { node: Some(node) })
    }

    async fn get_node(&self, request: GetNodeRequest) -> Result<GetNodeResponse, tonic::Status> {
        let mut state = self.state();
        let polls = {
            let polls = state.polls.entry(request.id.clone()).or_default();
            *polls += 1;
            *polls
        };
        let connect = polls >= self.connect_after_polls;

        let node = state
            .nodes
            .get_mut(&request.id)
            .ok_or_else(|| tonic::Status::not_found(format!("node {} not found", request.id)))?;
        node.is_connected |= connect;

        Ok(GetNodeResponse { node: Some(node.clone()) })
    }

    async fn list_nodes(
        &self,
        request: ListNodesRequest,
    ) -> Result<ListNodesResponse, tonic::Status> {
        let filter = request.filter.unwrap_or_default();
        let nodes = self
            .state()
            .nodes
            .values()
            .filter(|n| filter.ids.is_empty() || filter.ids.contains(&n.id))
            .filter(|n| filter.selectors.iter().all(|s| s.matches(&n.labels)))
            .cloned()
            .collect();

        Ok(ListNodesResponse { nodes })
    }

    async fn list_node_chain_configs(
        &self,
        request: ListNodeChainConfigsRequest,
    ) -> Result<ListNodeChainConfigsResponse, tonic::Status> {
        let chain_configs = self
            .state()
            .chain_configs
            .iter()
            .filter(|c| request.node_ids.contains(&c.node_id))
            .cloned()
            .collect();

        Ok(ListNodeChainConfigsResponse { chain_configs })
    }
}
