use std::process::ExitCode;

use clap::Parser;
use habit_app::app::{run, AppConfig};
use habit_app::cli::Cli;
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env().unwrap_or_else(|err| {
        warn!(%err, "ignoring invalid environment configuration");
        AppConfig::default()
    });
    if let Err(err) = run(config, cli.command.unwrap_or_default()) {
        eprintln!("Failed to run habitscope: {err:#}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
