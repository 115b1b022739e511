mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use hoverfly_harness::{Directive, Harness, HarnessConfig, HarnessError};
use output::output_error;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Initialize tracing with env filter (e.g., RUST_LOG=hoverfly_harness=debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    cli.color.apply();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            output_error(&e);
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = HarnessConfig::load(cli.config.clone())?;
    config.merge_with_cli(
        cli.simulation_path,
        cli.image,
        cli.cert,
        cli.start_timeout,
        cli.hoverfly_args,
    );

    match cli.command {
        Commands::Serve { command } => {
            let harness = Harness::start(config)?;
            commands::serve(&harness, &command)
        }
        Commands::Session { directive, command } => {
            // Directive and path problems are reported before any container starts
            let directive: Directive = directive.parse()?;
            config.simulation_dir()?;
            let cert = config.cert_path();
            if !cert.exists() {
                return Err(HarnessError::CertNotFound(cert).into());
            }

            let harness = Harness::start(config)?;
            commands::session(&harness, &directive, &command)
        }
    }
}
