//! OCR3 consensus jobs.

use super::{spec, Error, JobSpecFactory, JobSpecInput};
use crate::capabilities::OCR3;
use cre_types::{
    don::OCR_PEERING_PORT, keys, push_job_spec, DonsToJobSpecs, JobDescription, NodeRole,
};

/// Name of the OCR3 bootstrap job.
pub const BOOTSTRAP_JOB_NAME: &str = "ocr3-bootstrap";
/// Name of the OCR3 worker job.
pub const WORKER_JOB_NAME: &str = "ocr3-consensus";

/// Bootstrap and worker OCR3 jobs for DONs with the `ocr3` capability.
///
/// DONs without a bootstrap node of their own use the topology's bootstrap node.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsensusJobSpecFactory;

impl JobSpecFactory for ConsensusJobSpecFactory {
    fn name(&self) -> &str {
        OCR3
    }

    fn generate_job_specs(&self, input: &JobSpecInput<'_>) -> Result<DonsToJobSpecs, Error> {
        let mut specs = DonsToJobSpecs::new();

        for don in &input.topology.dons {
            if !cre_types::has_flag(&don.flags, OCR3) {
                continue;
            }

            let contract =
                input.contracts.ocr3_capability.ok_or(Error::MissingContract("ocr3_capability"))?;
            let home = input.home_chain()?;

            let bootstrap = match don.bootstrap_node()? {
                Some(node) => node,
                None => input
                    .topology
                    .bootstrap_node()?
                    .map(|(_, node)| node)
                    .ok_or_else(|| Error::NoBootstrap(don.name.clone()))?,
            };

            let bootstrap_job = spec::bootstrap_ocr3(
                bootstrap.node_id()?,
                BOOTSTRAP_JOB_NAME,
                contract,
                home.chain_id,
            );
            push_job_spec(
                &mut specs,
                don.id,
                JobDescription::new(OCR3, NodeRole::Bootstrap),
                bootstrap_job,
            );

            let bootstrapper = format!(
                "{}@{}:{OCR_PEERING_PORT}",
                bootstrap.peer_id()?,
                bootstrap.label_value(keys::HOST)?
            );
            let transmitter_key = keys::address_key(home.chain_selector);

            for node in don.worker_nodes()? {
                let job = spec::Ocr3WorkerJob {
                    node_id: node.node_id()?,
                    name: WORKER_JOB_NAME,
                    contract,
                    transmitter: node.label_value(&transmitter_key)?,
                    ocr2_key_bundle_id: node.label_value(keys::OCR2_KEY_BUNDLE_ID)?,
                    bootstrappers: vec![bootstrapper.clone()],
                    chain_id: home.chain_id,
                };
                push_job_spec(
                    &mut specs,
                    don.id,
                    JobDescription::new(OCR3, NodeRole::Worker),
                    spec::worker_ocr3(&job),
                );
            }
        }

        Ok(specs)
    }
}
