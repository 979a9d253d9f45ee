use crate::cli::type_enums::ServiceKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Defines the command-line interface (CLI) for 'setup-devstack'.
/// `#[derive(Parser)]` automatically generates argument parsing code via `clap`.
#[derive(Parser)]
#[command(name = "setup-devstack")]
#[command(version)]
#[command(about = "Provision a local development stack and scaffold projects on top of it", long_about = None)]
pub struct Cli {
    /// Enables detailed debug output (every command line, patch and classifier decision).
    #[arg(short, long, global = true)]
    pub(crate) debug: bool,

    /// Path of the host-wide lock file (defaults to `$TMPDIR/setup-devstack.lock`).
    #[arg(long, global = true, env = "SETUP_DEVSTACK_LOCK_FILE", value_name = "PATH")]
    pub(crate) lock_file: Option<PathBuf>,

    /// Defines available subcommands for 'setup-devstack'.
    #[command(subcommand)]
    pub(crate) command: Commands,
}

/// Enumerates all supported subcommands with their specific arguments and options.
#[derive(Subcommand)]
pub enum Commands {
    /// Tears down any previous installation, then installs, configures, starts and
    /// verifies every managed service.
    Install {
        /// Path to the main configuration source (defaults to ~/.setup-devstack/devstack.toml).
        #[arg(long)]
        config: Option<String>,
        /// Keep existing installations and reconcile them in place instead of starting from scratch.
        #[arg(long)]
        skip_teardown: bool,
        /// Only handle this service.
        #[arg(long, value_enum)]
        only: Option<ServiceKind>,
        /// Do not ask before tearing down existing installations.
        #[arg(short, long)]
        yes: bool,
    },
    /// Removes every managed service: stops units, purges packages, deletes data,
    /// configuration, logs, shell-profile blocks and dotfiles.
    Teardown {
        /// Path to the main configuration source (defaults to ~/.setup-devstack/devstack.toml).
        #[arg(long)]
        config: Option<String>,
        /// Only handle this service.
        #[arg(long, value_enum)]
        only: Option<ServiceKind>,
        /// Do not ask for confirmation.
        #[arg(short, long)]
        yes: bool,
    },
    /// Scaffolds a project: frontend package, backend virtualenv, dedicated database
    /// and role, version control. Safe to re-run against an existing project.
    Project {
        /// Name of the project. Prompted for when omitted.
        name: Option<String>,
        /// Path to the main configuration source (defaults to ~/.setup-devstack/devstack.toml).
        #[arg(long)]
        config: Option<String>,
        /// Path to the project source (defaults to ~/.setup-devstack/projects.toml).
        #[arg(long)]
        projects: Option<String>,
    },
    /// Re-runs every service's verification probes without changing anything.
    Verify {
        /// Path to the main configuration source (defaults to ~/.setup-devstack/devstack.toml).
        #[arg(long)]
        config: Option<String>,
    },
    /// Prints the commands to verify each service by hand.
    Report {
        /// Path to the main configuration source (defaults to ~/.setup-devstack/devstack.toml).
        #[arg(long)]
        config: Option<String>,
    },
}

impl Commands {
    /// Short label recorded in the host lock.
    pub fn label(&self) -> String {
        match self {
            Commands::Install { .. } => "install".to_string(),
            Commands::Teardown { .. } => "teardown".to_string(),
            Commands::Project { name, .. } => match name {
                Some(name) => format!("project {name}"),
                None => "project".to_string(),
            },
            Commands::Verify { .. } => "verify".to_string(),
            Commands::Report { .. } => "report".to_string(),
        }
    }

    /// Whether the command changes the host and therefore needs the host lock.
    pub fn mutates_host(&self) -> bool {
        !matches!(self, Commands::Report { .. })
    }
}
