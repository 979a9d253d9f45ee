// Entry point of `setup-devstack`.
//
// Parses the command line, takes the host lock for commands that touch the host,
// dispatches to the command, and turns any `ProvisionError` into a diagnostic plus
// its stable exit code.

mod cli;
mod commands;
mod installers;
mod libs;
mod logger;
mod schemas;

use clap::Parser;
use colored::Colorize;

use crate::cli::cmd_enums::{Cli, Commands};
use crate::libs::errors::Result;
use crate::libs::host_lock::{HostLock, default_lock_path};

fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Install {
            config,
            skip_teardown,
            only,
            yes,
        } => commands::install::run(config, skip_teardown, only, yes),
        Commands::Teardown { config, only, yes } => commands::teardown::run(config, only, yes),
        Commands::Project {
            name,
            config,
            projects,
        } => commands::project::run(name, config, projects),
        Commands::Verify { config } => commands::verify::run(config),
        Commands::Report { config } => commands::report::run(config),
    }
}

fn run(cli: Cli) -> Result<()> {
    let _lock = if cli.command.mutates_host() {
        let path = cli.lock_file.clone().unwrap_or_else(default_lock_path);
        Some(HostLock::acquire(&path, &cli.command.label())?)
    } else {
        None
    };
    dispatch(cli.command)
}

fn main() {
    let cli = Cli::parse();
    logger::init(cli.debug);
    log_debug!("setup-devstack {} starting", env!("CARGO_PKG_VERSION"));

    if let Err(err) = run(cli) {
        log_error!("{}", err.to_string().red());
        if let Some(details) = err.diagnostics() {
            eprintln!("{}", details);
        }
        std::process::exit(err.exit_code());
    }
}
