//! Proposing job specs to the job distributor.
//!
//! Every proposal runs in its own task. A semaphore bounds how many are in flight and each call
//! has its own timeout. All proposals are attempted; failures are collected and reported together
//! once every task finished.

use cre_proto::ProposeJobRequest;
use cre_types::{DonJobs, DonsToJobSpecs, JobDescription, OffchainClient, Topology};
use futures::FutureExt;
use std::{fmt, panic::AssertUnwindSafe, sync::Arc, time::Duration};
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{debug, info, instrument, warn};

/// Default number of proposals in flight.
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 5;
/// Default timeout of a single proposal.
pub const DEFAULT_PROPOSAL_TIMEOUT: Duration = Duration::from_secs(60);

/// Dispatcher settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Maximum proposals in flight. Zero is treated as one.
    pub concurrency_limit: usize,
    /// Timeout of each proposal.
    pub timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { concurrency_limit: DEFAULT_CONCURRENCY_LIMIT, timeout: DEFAULT_PROPOSAL_TIMEOUT }
    }
}

/// Why a proposal failed.
#[derive(Debug)]
pub enum FailureReason {
    /// The job distributor returned an error.
    Rejected(tonic::Status),
    /// No response within the timeout.
    TimedOut(Duration),
    /// The task proposing the job panicked.
    Panicked(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(status) => {
                write!(f, "rejected ({:?}): {}", status.code(), status.message())
            }
            Self::TimedOut(timeout) => write!(f, "timed out after {timeout:?}"),
            Self::Panicked(msg) => write!(f, "panicked: {msg}"),
        }
    }
}

/// A proposal that failed.
#[derive(Debug)]
pub struct ProposalFailure {
    /// Job the proposal belongs to.
    pub description: JobDescription,
    /// Node the job was proposed to.
    pub node_id: String,
    /// What went wrong.
    pub reason: FailureReason,
}

impl fmt::Display for ProposalFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on node {}: {}", self.description, self.node_id, self.reason)
    }
}

fn list_failures(failures: &[ProposalFailure]) -> String {
    failures.iter().map(|f| format!("\n  - {f}")).collect()
}

/// Dispatch errors.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// at least one proposal failed
    #[error("{} of {total} job proposals failed:{}", .failures.len(), list_failures(.failures))]
    Failed {
        /// number of proposals attempted
        total: usize,
        /// every failed proposal
        failures: Vec<ProposalFailure>,
    },
    /// proposals of a DON failed
    #[error("failed to create jobs for DON {don_id}: {source}")]
    Don {
        /// DON id
        don_id: u32,
        /// dispatch error of the DON
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Failed proposals, looking through DON context.
    pub fn failures(&self) -> &[ProposalFailure] {
        match self {
            Self::Failed { failures, .. } => failures,
            Self::Don { source, .. } => source.failures(),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

async fn propose<C>(
    client: Arc<C>,
    semaphore: Arc<Semaphore>,
    timeout: Duration,
    description: JobDescription,
    request: ProposeJobRequest,
) -> Result<(), ProposalFailure>
where
    C: OffchainClient + ?Sized,
{
    let node_id = request.node_id.clone();
    let fail = |reason| ProposalFailure {
        description: description.clone(),
        node_id: node_id.clone(),
        reason,
    };

    // the semaphore is never closed
    let Ok(_permit) = semaphore.acquire_owned().await else {
        return Err(fail(FailureReason::Panicked("semaphore closed".to_string())));
    };

    let call = AssertUnwindSafe(client.propose_job(request)).catch_unwind();
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(Ok(response))) => {
            let proposal_id = response.proposal.map(|p| p.id).unwrap_or_default();
            debug!(%description, node_id = %node_id, proposal_id, "job proposed");
            Ok(())
        }
        Ok(Ok(Err(status))) => Err(fail(FailureReason::Rejected(status))),
        Ok(Err(payload)) => Err(fail(FailureReason::Panicked(panic_message(payload.as_ref())))),
        Err(_) => Err(fail(FailureReason::TimedOut(timeout))),
    }
}

/// Propose every job in `jobs` and wait for all of them.
///
/// Returns the number of proposals on success. When any proposal fails the error lists every
/// failure, not only the first.
#[instrument(skip_all, fields(limit = config.concurrency_limit))]
pub async fn create<C>(
    client: Arc<C>,
    jobs: DonJobs,
    config: &DispatchConfig,
) -> Result<usize, Error>
where
    C: OffchainClient + ?Sized + 'static,
{
    let semaphore = Arc::new(Semaphore::new(config.concurrency_limit.max(1)));
    let mut tasks = JoinSet::new();
    let mut total = 0;

    for (description, requests) in jobs {
        for request in requests {
            total += 1;
            tasks.spawn(propose(
                Arc::clone(&client),
                Arc::clone(&semaphore),
                config.timeout,
                description.clone(),
                request,
            ));
        }
    }
    info!(total, "proposing jobs");

    let mut failures = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(failure)) => {
                warn!(%failure, "job proposal failed");
                failures.push(failure);
            }
            // panics are caught inside the task, so this only happens on runtime shutdown
            Err(e) => warn!(error = %e, "job proposal task did not complete"),
        }
    }

    if !failures.is_empty() {
        return Err(Error::Failed { total, failures });
    }

    Ok(total)
}

/// Propose the jobs of every DON in `topology`, one DON after the other.
///
/// Stops at the first DON with failed proposals. DONs without specs are skipped with a warning.
pub async fn create_jobs<C>(
    client: Arc<C>,
    topology: &Topology,
    mut specs: DonsToJobSpecs,
    config: &DispatchConfig,
) -> Result<usize, Error>
where
    C: OffchainClient + ?Sized + 'static,
{
    let mut proposed = 0;
    for don in &topology.dons {
        let Some(jobs) = specs.remove(&don.id) else {
            warn!(don_id = don.id, don = %don.name, "no job specs for DON");
            continue;
        };

        info!(don_id = don.id, don = %don.name, "creating jobs");
        proposed += create(Arc::clone(&client), jobs, config)
            .await
            .map_err(|e| Error::Don { don_id: don.id, source: Box::new(e) })?;
    }

    for don_id in specs.keys() {
        warn!(don_id, "job specs for a DON that is not in the topology were ignored");
    }

    Ok(proposed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cre_test_utils::MockJobDistributor;
    use cre_types::{push_job_spec, NodeRole};

    fn request(node_id: &str) -> ProposeJobRequest {
        ProposeJobRequest {
            node_id: node_id.into(),
            spec: "type = \"cron\"".into(),
            labels: vec![],
        }
    }

    fn jobs(nodes: &[&str]) -> DonJobs {
        let mut specs = DonsToJobSpecs::new();
        for node in nodes {
            let description = JobDescription::new("cron", NodeRole::Worker);
            push_job_spec(&mut specs, 1, description, request(node));
        }
        specs.remove(&1).unwrap_or_default()
    }

    #[tokio::test(start_paused = true)]
    async fn proposes_everything_within_the_limit() {
        let jd = Arc::new(MockJobDistributor::new().with_delay(Duration::from_millis(100)));
        let nodes: Vec<String> = (0..12).map(|i| format!("node-{i}")).collect();
        let nodes: Vec<&str> = nodes.iter().map(String::as_str).collect();

        let proposed =
            create(Arc::clone(&jd), jobs(&nodes), &DispatchConfig::default()).await.unwrap();

        assert_eq!(proposed, 12);
        assert_eq!(jd.proposals().len(), 12);
        assert_eq!(jd.max_in_flight(), DEFAULT_CONCURRENCY_LIMIT);
    }

    #[tokio::test(start_paused = true)]
    async fn reports_every_failure() {
        let jd = MockJobDistributor::new();
        jd.fail_node("node-1");
        jd.fail_node("node-3");
        jd.hang_node("node-4");
        let jd = Arc::new(jd);

        let config = DispatchConfig { concurrency_limit: 2, timeout: Duration::from_secs(60) };
        let err = create(
            Arc::clone(&jd),
            jobs(&["node-0", "node-1", "node-2", "node-3", "node-4"]),
            &config,
        )
        .await
        .unwrap_err();

        let Error::Failed { total, failures } = &err else { panic!("unexpected error {err}") };
        assert_eq!(*total, 5);

        let mut failed: Vec<_> = failures.iter().map(|f| f.node_id.as_str()).collect();
        failed.sort_unstable();
        assert_eq!(failed, vec!["node-1", "node-3", "node-4"]);

        let timed_out = failures.iter().find(|f| f.node_id == "node-4").unwrap();
        assert!(matches!(timed_out.reason, FailureReason::TimedOut(t) if t == config.timeout));
        assert!(err.to_string().starts_with("3 of 5 job proposals failed"));

        // the successful ones still went through
        assert_eq!(jd.proposals().len(), 4);
    }

    #[tokio::test]
    async fn catches_panics() {
        let jd = MockJobDistributor::new();
        jd.panic_on_node("node-0");
        let jd = Arc::new(jd);

        let err = create(jd, jobs(&["node-0", "node-1"]), &DispatchConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.failures().len(), 1);
        assert!(matches!(err.failures()[0].reason, FailureReason::Panicked(_)));
    }

    #[tokio::test]
    async fn empty_jobs_succeed() {
        let jd = Arc::new(MockJobDistributor::new());
        assert_eq!(create(jd, DonJobs::new(), &DispatchConfig::default()).await.unwrap(), 0);
    }
}
