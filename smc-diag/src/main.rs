use clap::Parser;
use smc_diag::{command::CliArgs, func};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = CliArgs::parse();
    let filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    if let Err(e) = func::run(&cli) {
        eprintln!("Error: {e:#}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
