//! The proto generated clients and messages for the job distributor API.
//!
//! Regenerate with `cargo run --manifest-path crates/scripts/proto-gen/Cargo.toml` from the repo
//! root after editing anything under `proto/`.

// We don't have control over tonic generated code so we ignore the
// lints it complains about
#![allow(clippy::all, clippy::missing_const_for_fn, unreachable_pub, missing_docs)]

/// Job distributor API.
pub mod api {
    /// Types shared across services.
    pub mod shared {
        /// Primitive types.
        pub mod ptypes {
            std::include!("api.shared.ptypes.rs");
        }
    }

    /// Node registration service.
    pub mod node {
        /// Version 1.
        pub mod v1 {
            std::include!("api.node.v1.rs");
        }
    }

    /// Job proposal service.
    pub mod job {
        /// Version 1.
        pub mod v1 {
            std::include!("api.job.v1.rs");
        }
    }
}

pub use api::{
    job::v1::{
        job_service_client::JobServiceClient, Proposal, ProposalStatus, ProposeJobRequest,
        ProposeJobResponse,
    },
    node::v1::{
        node_service_client::NodeServiceClient, Chain, ChainConfig, ChainType, GetNodeRequest,
        GetNodeResponse, ListNodeChainConfigsRequest, ListNodeChainConfigsResponse,
        ListNodesRequest, ListNodesResponse, Node, RegisterNodeRequest, RegisterNodeResponse,
    },
    shared::ptypes::{Label, Selector, SelectorOp},
};

pub use api::node::v1::list_nodes_request::Filter as ListNodesFilter;

impl Label {
    /// Create a label with a value.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: Some(value.into()) }
    }
}

impl Selector {
    /// Select labels `key` equal to `value`.
    pub fn eq(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), op: SelectorOp::Eq as i32, value: Some(value.into()) }
    }

    /// Whether `labels` satisfy this selector. Set membership values are comma separated.
    pub fn matches(&self, labels: &[Label]) -> bool {
        let label = labels.iter().find(|l| l.key == self.key);
        let value = label.and_then(|l| l.value.as_deref());
        let wanted = self.value.as_deref();
        let in_set = |v: Option<&str>| {
            v.zip(wanted).is_some_and(|(v, set)| set.split(',').any(|s| s.trim() == v))
        };

        match SelectorOp::try_from(self.op) {
            Ok(SelectorOp::Eq) => label.is_some() && value == wanted,
            Ok(SelectorOp::NotEq) => value != wanted,
            Ok(SelectorOp::In) => in_set(value),
            Ok(SelectorOp::NotIn) => !in_set(value),
            Ok(SelectorOp::Exist) => label.is_some(),
            Ok(SelectorOp::NotExist) => label.is_none(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_matches_labels() {
        let labels = vec![Label::new("p2p_id", "peer-1"), Label::new("type", "worker")];

        assert!(Selector::eq("p2p_id", "peer-1").matches(&labels));
        assert!(!Selector::eq("p2p_id", "peer-2").matches(&labels));
        assert!(!Selector::eq("missing", "peer-1").matches(&labels));

        let in_set = Selector {
            key: "type".into(),
            op: SelectorOp::In as i32,
            value: Some("bootstrap, worker".into()),
        };
        assert!(in_set.matches(&labels));

        let exists = Selector { key: "type".into(), op: SelectorOp::Exist as i32, value: None };
        assert!(exists.matches(&labels));
    }
}
