use clap::Parser;
use mediaroute::cli::{run_cli, Cli};
use mediaroute::logging::{self, LogConfig};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = if cli.command.debug() {
        LogConfig::default_dev()
    } else {
        LogConfig::from_env()
    };
    if let Err(e) = logging::init(&config) {
        eprintln!("Warning: {e:#}");
    }
    run_cli(cli)
}
