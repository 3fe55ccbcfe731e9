//! `cre-harness` binary.

use cre_harness::cli::Cli;
use std::process::ExitCode;
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let _guards = match cre_tracing::init_logging() {
        Ok(guards) => guards,
        Err(e) => {
            eprintln!("failed to initialize logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    match Cli::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "cre-harness failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
