// This module defines the `ManagedService` descriptor: everything that differs between
// the database engine, the cache, the web server and the language-environment managers,
// expressed as data. The generic state machine in `libs::service_installer` consumes a
// descriptor and drives it through Installed -> Configured -> Enabled -> Running -> Verified;
// `libs::teardown` consumes the same descriptor's teardown plan.
//
// Descriptors are built from validated settings by the modules in `installers/`, used
// once per run and never persisted.

use std::path::PathBuf;

use crate::cli::type_enums::ServiceKind;
use crate::libs::config_patch::PatchRule;
use crate::libs::database::DatabaseBootstrap;
use crate::libs::executor::{CommandSpec, Privilege};

/// Predicate deciding whether the install action can be skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallCheck {
    /// Every listed apt package is installed.
    Packages(Vec<String>),
    /// A file written by an installer script exists.
    PathExists(PathBuf),
}

#[derive(Debug, Clone)]
pub struct InstallPlan {
    pub check: InstallCheck,
    /// apt packages installed first (the service itself, or prerequisites).
    pub packages: Vec<String>,
    /// Installer commands run after the packages.
    pub commands: Vec<CommandSpec>,
}

/// Where a service's live configuration file is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLocator {
    Fixed(PathBuf),
    /// First file named `file_name` below `root`. Not finding one is fatal.
    Search { root: PathBuf, file_name: String },
}

#[derive(Debug, Clone)]
pub struct ConfigTarget {
    pub locate: ConfigLocator,
    pub rules: Vec<PatchRule>,
    pub privilege: Privilege,
}

/// A file the provisioner owns completely (site definitions, placeholder pages).
#[derive(Debug, Clone)]
pub struct OwnedFile {
    pub path: PathBuf,
    pub content: String,
    pub privilege: Privilege,
}

#[derive(Debug, Clone)]
pub struct Symlink {
    pub target: PathBuf,
    pub link: PathBuf,
    pub privilege: Privilege,
}

/// Marker-delimited stanza in the user's shell profiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileStanza {
    pub id: String,
    pub body: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Configuration {
    pub patches: Vec<ConfigTarget>,
    pub directories: Vec<(PathBuf, Privilege)>,
    pub files: Vec<OwnedFile>,
    pub links: Vec<Symlink>,
    /// Paths that must not exist (e.g. a distribution's default site).
    pub absent: Vec<(PathBuf, Privilege)>,
    pub profile: Option<ProfileStanza>,
}

/// Protocol-level round trip proving a service works.
#[derive(Debug, Clone)]
pub enum Probe {
    /// Run a command; stdout must contain `expect`.
    Command {
        name: String,
        spec: CommandSpec,
        expect: String,
    },
    /// HTTP GET; the body must contain `expect_body`.
    Http { url: String, expect_body: String },
}

impl Probe {
    pub fn name(&self) -> &str {
        match self {
            Probe::Command { name, .. } => name,
            Probe::Http { .. } => "http-get",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Verification {
    pub probes: Vec<Probe>,
    /// Port that must not answer on non-loopback addresses (warning only).
    pub loopback_only_port: Option<u16>,
}

/// What teardown removes, in order.
#[derive(Debug, Clone, Default)]
pub struct TeardownPlan {
    pub packages: Vec<String>,
    pub directories: Vec<(PathBuf, Privilege)>,
    pub profile_id: Option<String>,
    pub dotfiles: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ManagedService {
    pub kind: ServiceKind,
    pub install: InstallPlan,
    pub config: Configuration,
    /// systemd unit; `None` for tools that are not daemons.
    pub unit: Option<String>,
    /// Commands run once the service is running (or right after configuration for tools).
    pub post_start: Vec<CommandSpec>,
    pub bootstrap: Option<DatabaseBootstrap>,
    pub verify: Verification,
    pub teardown: TeardownPlan,
}

impl ManagedService {
    pub fn tag(&self) -> &'static str {
        self.kind.tag()
    }

    /// Step label used in logs and diagnostics, e.g. `[Redis] Configured`.
    pub fn step(&self, state: &str) -> String {
        format!("{} {}", self.tag(), state)
    }
}
