//! CLI for the CRE harness.

use crate::{
    config::ENV_DEPLOYER_PRIVATE_KEY,
    environment::{self, Environment},
    jd::{self, JobDistributorClient},
    jobs::{
        default_factories,
        dispatch::{self, DispatchConfig, DEFAULT_CONCURRENCY_LIMIT},
        DEFAULT_CONTAINER_DIR,
    },
    registry::{self, RegistryPlan},
};
use alloy::{primitives::hex, signers::local::LocalSigner};
use clap::{Parser, Subcommand};
use cre_contracts::DeployInfo;
use cre_types::count_job_specs;
use k256::ecdsa::SigningKey;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::{info, instrument, warn};

/// Errors from the harness CLI
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// private key was not set
    #[error("environment variable {} must be set", ENV_DEPLOYER_PRIVATE_KEY)]
    DeployerPrivKeyNotSet,
    /// private key was not valid hex
    #[error("private key was not valid hex")]
    InvalidPrivateKeyHex(#[from] hex::FromHexError),
    /// private key hex was too short
    #[error("private key hex was too short")]
    ShortPrivateKeyHex,
    /// errors from alloy signer local crate
    #[error(transparent)]
    SignerLocal(#[from] alloy::signers::local::LocalSignerError),
    /// environment error
    #[error(transparent)]
    Environment(#[from] environment::Error),
    /// job distributor error
    #[error(transparent)]
    Jd(#[from] jd::Error),
    /// job proposal error
    #[error(transparent)]
    Dispatch(#[from] dispatch::Error),
    /// registry error
    #[error(transparent)]
    Registry(#[from] registry::Error),
    /// failed to write deploy info
    #[error("failed to write deploy info: {0}")]
    DeployInfo(eyre::Report),
}

type K256LocalSigner = LocalSigner<SigningKey>;

fn signer_from_hex(secret: &str) -> Result<K256LocalSigner, Error> {
    if secret.as_bytes().len() < 64 {
        return Err(Error::ShortPrivateKeyHex);
    }

    let decoded = hex::decode(secret)?;
    K256LocalSigner::from_slice(&decoded).map_err(|e| Error::SignerLocal(e.into()))
}

fn deployer_signer() -> Result<K256LocalSigner, Error> {
    let secret =
        std::env::var(ENV_DEPLOYER_PRIVATE_KEY).map_err(|_| Error::DeployerPrivKeyNotSet)?;
    signer_from_hex(&secret)
}

/// CRE environment harness.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Opts {
    /// Environment TOML file
    #[arg(long, short, default_value = "environment.toml")]
    config: PathBuf,

    /// Environment name, attached as a label to registered nodes
    #[arg(long, default_value = "local")]
    environment: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the node configs and, when every node has a job distributor id, the job specs
    Render {
        /// Directory of the capability binaries inside the node containers
        #[arg(long, default_value = DEFAULT_CONTAINER_DIR)]
        container_dir: PathBuf,
    },
    /// Register nodes with the job distributor and wait until they connect
    Register {
        /// Also wait until every node reported a chain config for each blockchain
        #[arg(long)]
        wait_for_chain_configs: bool,
    },
    /// Register nodes, generate job specs and propose them
    Propose {
        /// Directory of the capability binaries inside the node containers
        #[arg(long, default_value = DEFAULT_CONTAINER_DIR)]
        container_dir: PathBuf,

        /// Maximum job proposals in flight
        #[arg(long, default_value_t = DEFAULT_CONCURRENCY_LIMIT)]
        concurrency_limit: usize,

        /// Timeout of a single job proposal in seconds
        #[arg(long, default_value_t = 60)]
        proposal_timeout_secs: u64,
    },
    /// Configure the capabilities registry, workflow registry and forwarders
    Registry {
        /// Write the contract addresses and the next DON id to this file
        #[arg(long)]
        deploy_info: Option<PathBuf>,
    },
}

/// Command line interface of the harness.
#[derive(Parser, Debug)]
pub struct Cli;

impl Cli {
    /// Run the CLI
    #[instrument]
    pub async fn run() -> Result<(), Error> {
        let opts = Opts::parse();
        let mut env = Environment::load(&opts.config)?;

        match opts.command {
            Command::Render { container_dir } => render(&env, &container_dir),
            Command::Register { wait_for_chain_configs } => {
                let client = connect_and_register(&mut env, &opts.environment).await?;
                for don in &env.topology.dons {
                    for node in &don.nodes {
                        println!("{}/{} = {}", don.name, node.index, node.node_id().unwrap_or(""));
                    }
                }

                if wait_for_chain_configs {
                    let node_ids = env.node_ids();
                    let timeout = Duration::from_secs(env.config.jd.wait_for_connection_secs);
                    let expected = env.config.blockchains.len();
                    jd::wait_for_chain_configs(&client, &node_ids, expected, timeout).await?;
                }

                Ok(())
            }
            Command::Propose { container_dir, concurrency_limit, proposal_timeout_secs } => {
                let client = connect_and_register(&mut env, &opts.environment).await?;
                let factories = default_factories(&env.config.gateway);
                let specs = env.job_specs(&factories, &container_dir)?;

                let config = DispatchConfig {
                    concurrency_limit,
                    timeout: Duration::from_secs(proposal_timeout_secs),
                };
                let proposed =
                    dispatch::create_jobs(Arc::new(client), &env.topology, specs, &config).await?;
                info!(proposed, "all jobs proposed");

                Ok(())
            }
            Command::Registry { deploy_info } => configure_registry(&env, deploy_info).await,
        }
    }
}

fn render(env: &Environment, container_dir: &std::path::Path) -> Result<(), Error> {
    for ((don_id, index), toml) in env.node_configs()? {
        println!("# DON {don_id} node {index}\n{toml}");
    }

    let all_registered =
        env.topology.dons.iter().flat_map(|d| &d.nodes).all(|n| n.node_id().is_ok());
    if !all_registered {
        warn!("not every node has a node_id, skipping job specs");
        return Ok(());
    }

    let factories = default_factories(&env.config.gateway);
    let specs = env.job_specs(&factories, container_dir)?;
    info!(jobs = count_job_specs(&specs), "job specs generated");
    for (don_id, jobs) in &specs {
        for (description, requests) in jobs {
            for request in requests {
                println!("# DON {don_id} {description} on {}\n{}", request.node_id, request.spec);
            }
        }
    }

    Ok(())
}

async fn connect_and_register(
    env: &mut Environment,
    environment: &str,
) -> Result<JobDistributorClient, Error> {
    let client = JobDistributorClient::connect(&env.config.jd.grpc_url).await?;

    let registered = jd::register_nodes(&client, &mut env.topology, environment).await?;
    info!(registered, "nodes registered");

    let timeout = Duration::from_secs(env.config.jd.wait_for_connection_secs);
    jd::wait_for_nodes(&client, &env.topology, timeout).await?;
    info!("all nodes connected");

    Ok(client)
}

async fn configure_registry(env: &Environment, deploy_info: Option<PathBuf>) -> Result<(), Error> {
    let signer = deployer_signer()?;
    let plan = RegistryPlan::from_topology(
        &env.topology,
        &env.config.blockchains,
        signer.address(),
    )?;
    info!(
        capabilities = plan.capabilities.len(),
        nodes = plan.nodes.len(),
        dons = plan.dons.len(),
        "configuring capabilities registry"
    );

    let contracts = &env.config.contracts;
    let output = registry::apply(
        &plan,
        contracts,
        env.config.home_chain(),
        &env.config.blockchains,
        signer,
    )
    .await?;
    info!(don_ids = ?output.don_ids, "registry configured");

    if let Some(path) = deploy_info {
        let info = DeployInfo {
            capabilities_registry: contracts.capabilities_registry,
            workflow_registry: contracts.workflow_registry.unwrap_or_default(),
            ocr3_capability: contracts.ocr3_capability.unwrap_or_default(),
            forwarders: contracts.forwarders.clone(),
            next_don_id: Some(output.next_don_id),
            node_funding: None,
        };
        info.write_to(&path).map_err(Error::DeployInfo)?;
        info!(path = %path.display(), "deploy info written");
    }

    Ok(())
}
