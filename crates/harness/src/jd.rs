//! Job distributor client and node registration.

use crate::retry::{self, retry, Attempt, RetryConfig};
use async_trait::async_trait;
use cre_proto::{
    GetNodeRequest, GetNodeResponse, JobServiceClient, Label, ListNodeChainConfigsRequest,
    ListNodeChainConfigsResponse, ListNodesFilter, ListNodesRequest, ListNodesResponse,
    NodeServiceClient, ProposeJobRequest, ProposeJobResponse, RegisterNodeRequest,
    RegisterNodeResponse, Selector,
};
use cre_types::{keys, Topology};
use std::time::Duration;
use tonic::{transport::Channel, Code, Status};
use tracing::{debug, info, instrument};

pub use cre_types::OffchainClient;

/// Label key of the product every node is registered for.
pub const PRODUCT_LABEL: &str = "product";
/// Product label value.
pub const PRODUCT: &str = "keystone";
/// Label key of the environment name.
pub const ENVIRONMENT_LABEL: &str = "environment";

/// First delay when waiting for a node to connect.
const CONNECTION_BACKOFF_BASE: Duration = Duration::from_secs(1);
/// Delay between chain config polls.
const CHAIN_CONFIG_POLL: Duration = Duration::from_secs(1);

/// Job distributor errors.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// invalid job distributor url
    #[error("invalid job distributor url {url}: {reason}")]
    InvalidUrl {
        /// url
        url: String,
        /// parse error
        reason: String,
    },
    /// failed to connect
    #[error("failed to connect to the job distributor: {0}")]
    Connect(#[from] tonic::transport::Error),
    /// request failed
    #[error("job distributor request failed: {0}")]
    Rpc(#[from] Status),
    /// response without the expected node
    #[error("job distributor returned no node for {0}")]
    MissingNode(String),
    /// node metadata problem
    #[error(transparent)]
    Don(#[from] cre_types::don::Error),
    /// node did not connect in time
    #[error("node {node_id} is not connected: {source}")]
    NotConnected {
        /// job distributor node id
        node_id: String,
        /// retry failure
        source: retry::Error<String>,
    },
    /// chain configs did not show up in time
    #[error("chain configs are missing: {0}")]
    ChainConfigs(retry::Error<String>),
}

/// gRPC client of the job distributor.
#[derive(Debug, Clone)]
pub struct JobDistributorClient {
    node: NodeServiceClient<Channel>,
    job: JobServiceClient<Channel>,
}

impl JobDistributorClient {
    /// Connect to the job distributor at `url`.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        debug!(url, "connecting to the job distributor");
        let channel = Channel::from_shared(url.to_string())
            .map_err(|e| Error::InvalidUrl { url: url.to_string(), reason: e.to_string() })?
            .connect()
            .await?;

        Ok(Self::new(channel))
    }

    /// Client over an existing channel.
    pub fn new(channel: Channel) -> Self {
        Self { node: NodeServiceClient::new(channel.clone()), job: JobServiceClient::new(channel) }
    }
}

// tonic clients take `&mut self`; they are cheap to clone and share the channel.
#[async_trait]
impl OffchainClient for JobDistributorClient {
    async fn propose_job(&self, request: ProposeJobRequest) -> Result<ProposeJobResponse, Status> {
        Ok(self.job.clone().propose_job(request).await?.into_inner())
    }

    async fn register_node(
        &self,
        request: RegisterNodeRequest,
    ) -> Result<RegisterNodeResponse, Status> {
        Ok(self.node.clone().register_node(request).await?.into_inner())
    }

    async fn get_node(&self, request: GetNodeRequest) -> Result<GetNodeResponse, Status> {
        Ok(self.node.clone().get_node(request).await?.into_inner())
    }

    async fn list_nodes(&self, request: ListNodesRequest) -> Result<ListNodesResponse, Status> {
        Ok(self.node.clone().list_nodes(request).await?.into_inner())
    }

    async fn list_node_chain_configs(
        &self,
        request: ListNodeChainConfigsRequest,
    ) -> Result<ListNodeChainConfigsResponse, Status> {
        Ok(self.node.clone().list_node_chain_configs(request).await?.into_inner())
    }
}

/// Register every node of `topology` and store the returned id in its `node_id` label.
///
/// Nodes that already carry a node id are left alone. Registration is sequential. A node whose
/// CSA key the job distributor already knows is looked up by its `p2p_id` label instead.
#[instrument(skip_all, fields(environment = %environment))]
pub async fn register_nodes<C>(
    client: &C,
    topology: &mut Topology,
    environment: &str,
) -> Result<usize, Error>
where
    C: OffchainClient + ?Sized,
{
    let mut registered = 0;
    for don in &mut topology.dons {
        for node in &mut don.nodes {
            if node.node_id().is_ok() {
                continue;
            }

            let p2p_id = node.label_value(keys::P2P_ID)?.to_string();
            let mut labels: Vec<Label> = [keys::NODE_TYPE, keys::DON_ID, keys::DON_NAME]
                .into_iter()
                .map(|key| Ok(Label::new(key, node.label_value(key)?)))
                .collect::<Result<_, Error>>()?;
            labels.push(Label::new(PRODUCT_LABEL, PRODUCT));
            labels.push(Label::new(ENVIRONMENT_LABEL, environment));
            labels.push(Label::new(keys::P2P_ID, p2p_id.as_str()));

            let request = RegisterNodeRequest {
                public_key: node.label_value(keys::CSA_KEY)?.to_string(),
                labels,
                name: format!("{}-node{}", don.name, node.index),
            };
            let name = request.name.clone();
            let id = match client.register_node(request).await {
                Ok(response) => {
                    let id = response.node.map(|n| n.id);
                    let id = id.ok_or_else(|| Error::MissingNode(name.clone()))?;
                    info!(node = %name, node_id = %id, "registered node");
                    id
                }
                Err(status) if status.code() == Code::AlreadyExists => {
                    let id = find_node_by_p2p_id(client, &p2p_id)
                        .await?
                        .ok_or_else(|| Error::MissingNode(name.clone()))?;
                    info!(node = %name, node_id = %id, "node already registered");
                    id
                }
                Err(status) => return Err(status.into()),
            };

            node.set_label(keys::NODE_ID, id);
            registered += 1;
        }
    }

    Ok(registered)
}

async fn find_node_by_p2p_id<C>(client: &C, p2p_id: &str) -> Result<Option<String>, Error>
where
    C: OffchainClient + ?Sized,
{
    let filter =
        ListNodesFilter { ids: vec![], selectors: vec![Selector::eq(keys::P2P_ID, p2p_id)] };
    let response = client.list_nodes(ListNodesRequest { filter: Some(filter) }).await?;
    Ok(response.nodes.into_iter().next().map(|n| n.id))
}

fn retryable(status: &Status) -> bool {
    matches!(status.code(), Code::NotFound | Code::Unavailable | Code::DeadlineExceeded)
}

/// Wait until the job distributor reports `node_id` connected.
pub async fn wait_for_node_connection<C>(
    client: &C,
    node_id: &str,
    max_duration: Duration,
) -> Result<(), Error>
where
    C: OffchainClient + ?Sized,
{
    let config = RetryConfig::fibonacci(CONNECTION_BACKOFF_BASE, max_duration);
    retry(config, move || async move {
        let request = GetNodeRequest { id: node_id.to_string() };
        match client.get_node(request).await {
            Ok(response) if response.node.as_ref().is_some_and(|n| n.is_connected) => Ok(()),
            Ok(_) => Err(Attempt::Retryable("not connected yet".to_string())),
            Err(status) if retryable(&status) => Err(Attempt::Retryable(status.to_string())),
            Err(status) => Err(Attempt::Permanent(status.to_string())),
        }
    })
    .await
    .map_err(|source| Error::NotConnected { node_id: node_id.to_string(), source })?;

    debug!(node_id, "node connected");
    Ok(())
}

/// Wait until every node of `topology` is connected.
pub async fn wait_for_nodes<C>(
    client: &C,
    topology: &Topology,
    max_duration: Duration,
) -> Result<(), Error>
where
    C: OffchainClient + ?Sized,
{
    for don in &topology.dons {
        for node in &don.nodes {
            wait_for_node_connection(client, node.node_id()?, max_duration).await?;
        }
    }

    Ok(())
}

/// Wait until each of `node_ids` reported at least `expected_per_node` chain configs.
pub async fn wait_for_chain_configs<C>(
    client: &C,
    node_ids: &[String],
    expected_per_node: usize,
    max_duration: Duration,
) -> Result<(), Error>
where
    C: OffchainClient + ?Sized,
{
    let config = RetryConfig::constant(CHAIN_CONFIG_POLL, max_duration);
    retry(config, move || async move {
        let request = ListNodeChainConfigsRequest { node_ids: node_ids.to_vec() };
        let response = client.list_node_chain_configs(request).await.map_err(|status| {
            if retryable(&status) {
                Attempt::Retryable(status.to_string())
            } else {
                Attempt::Permanent(status.to_string())
            }
        })?;

        let missing: Vec<&str> = node_ids
            .iter()
            .filter(|id| {
                response.chain_configs.iter().filter(|c| &c.node_id == *id).count() <
                    expected_per_node
            })
            .map(String::as_str)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Attempt::Retryable(format!("no chain configs for {}", missing.join(", "))))
        }
    })
    .await
    .map_err(Error::ChainConfigs)
}
