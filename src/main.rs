mod alertmanager;
mod auth;
mod cli;
mod config;
mod context;
mod error;
mod fingerprint;
mod orchestrator;
mod template;

use std::process::ExitCode;

use clap::Parser;
use cli::Cli;
use log::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.debug());

    info!("Starting Drone plugin for Alertmanager");
    report(cli.execute().await)
}

/// Failures go through the logger so they carry the same level and timestamp as the
/// rest of the output, then map to exit status 1.
fn report(result: anyhow::Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logger(debug: bool) {
    let filter = if debug {
        "info,drone_alertmanager=debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();
}
