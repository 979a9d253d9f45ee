// Register application subcommands.
// Each module corresponds to a specific `setup-devstack` command-line action.
//
// The helpers below are shared by every command: resolving and loading the
// configuration sources, and asking the operator before destructive steps.

use dialoguer::Confirm;

use crate::libs::config_loading::{self, ConfigSource};
use crate::libs::errors::{ConfigError, ProvisionError, Result};
use crate::libs::utilities::path_helpers::resolve_source_path;
use crate::log_debug;
use crate::schemas::settings::{Schema, Settings, StackSettings, install_schema};

// Tears down, installs and verifies the managed services.
pub mod install;
// Scaffolds a project on top of the provisioned stack.
pub mod project;
// Prints the manual verification commands.
pub mod report;
// Removes the managed services.
pub mod teardown;
// Re-runs the verification probes.
pub mod verify;

/// Default file name of the main configuration source inside `~/.setup-devstack`.
pub const MAIN_SOURCE_FILE: &str = "devstack.toml";
/// Default file name of the project source inside `~/.setup-devstack`.
pub const PROJECT_SOURCE_FILE: &str = "projects.toml";

/// Runs `step` against `source`, printing the full source when it fails so the
/// operator can see exactly what was loaded.
pub(crate) fn with_source<T>(source: &ConfigSource, step: impl FnOnce(&ConfigSource) -> Result<T, ConfigError>) -> Result<T> {
    step(source).map_err(|err| {
        source.dump();
        ProvisionError::from(err)
    })
}

/// Reads the main source and validates `schema`.
pub(crate) fn load_main(config: Option<&str>, schema: &Schema) -> Result<(ConfigSource, Settings)> {
    let path = resolve_source_path(config, MAIN_SOURCE_FILE);
    log_debug!("[Config] Main source: {}", path.display());
    let source = config_loading::read_source(&path)?;
    let settings = with_source(&source, |s| config_loading::load(s, schema))?;
    Ok((source, settings))
}

/// Reads the main source with the full install schema and parses every typed section.
pub(crate) fn load_stack(config: Option<&str>) -> Result<StackSettings> {
    let (source, settings) = load_main(config, &install_schema())?;
    with_source(&source, |_| StackSettings::from_settings(&settings))
}

/// Asks a yes/no question, defaulting to "no". `assume_yes` answers it without asking.
pub(crate) fn confirm(prompt: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| ProvisionError::Input(format!("could not read confirmation: {e}")))
}
