// twostream-cli/src/main.rs
//
// Entry point for the `twostream` binary: parses arguments, installs the
// logger and dispatches to the subcommand. Any error is reported through
// `log::error!` and turns into exit status 1.

use std::process;

use clap::Parser;
use log::{error, info};
use twostream_cli::logging::init_logging;
use twostream_cli::{Cli, Commands, run_aggregate, run_index, run_verify};

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Index(_) => "index",
        Commands::Aggregate(_) => "aggregate",
        Commands::Verify(_) => "verify",
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Index(args) => run_index(args),
        Commands::Aggregate(args) => run_aggregate(args).map(|_| ()),
        Commands::Verify(args) => run_verify(args).map(|_| ()),
    }
}

fn main() {
    let cli = Cli::parse();
    let command = command_name(&cli.command);

    match init_logging(cli.verbose, cli.log_dir.as_deref(), command) {
        Ok(Some(path)) => info!("Logging to {}", path.display()),
        Ok(None) => {}
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    }

    if let Err(e) = run(&cli) {
        error!("Error: {e:#}");
        process::exit(1);
    }
}
