//! The job distributor operations the harness relies on.
//!
//! Abstracted as a trait so the gRPC client can be swapped for an in-memory one in tests.

use async_trait::async_trait;
use cre_proto::{
    GetNodeRequest, GetNodeResponse, ListNodeChainConfigsRequest, ListNodeChainConfigsResponse,
    ListNodesRequest, ListNodesResponse, ProposeJobRequest, ProposeJobResponse, RegisterNodeRequest,
    RegisterNodeResponse,
};

/// Client for the off-chain job distributor.
#[async_trait]
pub trait OffchainClient: Send + Sync {
    /// Propose a job spec to a node.
    async fn propose_job(
        &self,
        request: ProposeJobRequest,
    ) -> Result<ProposeJobResponse, tonic::Status>;

    /// Register a node by its CSA public key.
    async fn register_node(
        &self,
        request: RegisterNodeRequest,
    ) -> Result<RegisterNodeResponse, tonic::Status>;

    /// Look up a registered node.
    async fn get_node(&self, request: GetNodeRequest) -> Result<GetNodeResponse, tonic::Status>;

    /// Registered nodes matching the request filter.
    async fn list_nodes(
        &self,
        request: ListNodesRequest,
    ) -> Result<ListNodesResponse, tonic::Status>;

    /// Chain configs the given nodes reported.
    async fn list_node_chain_configs(
        &self,
        request: ListNodeChainConfigsRequest,
    ) -> Result<ListNodeChainConfigsResponse, tonic::Status>;
}
