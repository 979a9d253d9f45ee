// This file contains the logic for the `setup-devstack project` command.
// It resolves the project name (argument or prompt), loads both configuration
// sources, and hands off to the scaffolder.

use colored::Colorize;
use dialoguer::Input;

use crate::commands::{PROJECT_SOURCE_FILE, load_main, with_source};
use crate::libs::config_loading::{self, load_project};
use crate::libs::errors::{ProvisionError, Result};
use crate::libs::executor::SystemRunner;
use crate::libs::host::Host;
use crate::libs::scaffolder::{ScaffoldContext, Scaffolder, validate_project_name};
use crate::libs::utilities::path_helpers::resolve_source_path;
use crate::schemas::settings::{
    GeneralSettings, ProjectSettings, project_schema, project_settings_schema,
};
use crate::{log_debug, log_info};

fn prompt_name() -> Result<String> {
    Input::<String>::new()
        .with_prompt("Project name")
        .interact_text()
        .map(|name| name.trim().to_string())
        .map_err(|e| ProvisionError::Input(format!("could not read project name: {e}")))
}

pub fn run(name: Option<String>, config: Option<String>, projects: Option<String>) -> Result<()> {
    let name = match name {
        Some(name) => name.trim().to_string(),
        None => prompt_name()?,
    };
    validate_project_name(&name)?;

    let (main, settings) = load_main(config.as_deref(), &project_schema())?;
    let (general, ctx) = with_source(&main, |_| {
        Ok((
            GeneralSettings::from_settings(&settings)?,
            ScaffoldContext::from_settings(&settings)?,
        ))
    })?;

    let projects_path = resolve_source_path(projects.as_deref(), PROJECT_SOURCE_FILE);
    log_debug!("[Config] Project source: {}", projects_path.display());
    let projects = config_loading::read_source(&projects_path)?;
    let project = with_source(&projects, |source| {
        let values = load_project(source, &name, &project_settings_schema(&name))?;
        ProjectSettings::from_settings(&values, &name)
    })?;

    let runner = SystemRunner;
    let host = Host::new(&runner, general.command_timeout);
    let layout = Scaffolder::new(&host, ctx).scaffold(&name, &project)?;

    log_info!(
        "[Project] {} ready: cd {} (database {}, role {})",
        name.bold(),
        layout.root.display().to_string().cyan(),
        layout.database.green(),
        layout.role.green()
    );
    Ok(())
}
