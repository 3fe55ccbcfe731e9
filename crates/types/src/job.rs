//! Job spec collections produced by the job spec factories.

use crate::{CapabilityFlag, NodeRole};
use cre_proto::ProposeJobRequest;
use std::collections::BTreeMap;

/// What a group of job specs is for.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobDescription {
    /// Capability flag (or job name for non capability jobs such as `ocr3` and `gateway`).
    pub flag: CapabilityFlag,
    /// Type of node the jobs run on.
    pub node_type: NodeRole,
}

impl JobDescription {
    /// Create a new description.
    pub fn new(flag: impl Into<CapabilityFlag>, node_type: NodeRole) -> Self {
        Self { flag: flag.into(), node_type }
    }
}

impl std::fmt::Display for JobDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.flag, self.node_type)
    }
}

/// Job proposals of one DON.
pub type DonJobs = BTreeMap<JobDescription, Vec<ProposeJobRequest>>;

/// Job proposals keyed by DON id.
pub type DonsToJobSpecs = BTreeMap<u32, DonJobs>;

/// Append every proposal in `from` to `into`.
pub fn merge_job_specs(from: DonsToJobSpecs, into: &mut DonsToJobSpecs) {
    for (don_id, jobs) in from {
        let don_jobs = into.entry(don_id).or_default();
        for (description, mut requests) in jobs {
            don_jobs.entry(description).or_default().append(&mut requests);
        }
    }
}

/// Add a single proposal.
pub fn push_job_spec(
    specs: &mut DonsToJobSpecs,
    don_id: u32,
    description: JobDescription,
    request: ProposeJobRequest,
) {
    specs.entry(don_id).or_default().entry(description).or_default().push(request);
}

/// Number of proposals across all DONs.
pub fn count_job_specs(specs: &DonsToJobSpecs) -> usize {
    specs.values().flat_map(|jobs| jobs.values()).map(Vec::len).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(node_id: &str) -> ProposeJobRequest {
        ProposeJobRequest { node_id: node_id.into(), spec: String::new(), labels: vec![] }
    }

    #[test]
    fn merge_appends_to_existing_descriptions() {
        let cron = JobDescription::new("cron", NodeRole::Worker);
        let ocr = JobDescription::new("ocr3", NodeRole::Bootstrap);

        let mut into = DonsToJobSpecs::new();
        push_job_spec(&mut into, 1, cron.clone(), request("a"));

        let mut from = DonsToJobSpecs::new();
        push_job_spec(&mut from, 1, cron.clone(), request("b"));
        push_job_spec(&mut from, 1, ocr.clone(), request("c"));
        push_job_spec(&mut from, 2, cron.clone(), request("d"));

        merge_job_specs(from, &mut into);

        let nodes: Vec<_> = into[&1][&cron].iter().map(|r| r.node_id.as_str()).collect();
        assert_eq!(nodes, vec!["a", "b"]);
        assert_eq!(into[&1][&ocr].len(), 1);
        assert_eq!(into[&2][&cron][0].node_id, "d");
        assert_eq!(count_job_specs(&into), 4);
    }

    #[test]
    fn description_display() {
        let description = JobDescription::new("evm-1337", NodeRole::Worker);
        assert_eq!(description.to_string(), "evm-1337/worker");
    }
}
