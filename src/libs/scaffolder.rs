//! # Project Scaffolder
//!
//! Creates a project directory wired to the provisioned stack:
//!
//! 1. `root/`, `root/frontend/`, `root/backend/` below `general.project_dir`
//! 2. an npm package with the configured frontend dependency (inside the nvm environment)
//! 3. a `.venv` built from the pinned interpreter (via pyenv) plus `.python-version`
//! 4. a dedicated role and database (`CreateOnly`: existing objects are kept)
//! 5. a git repository with a `.gitignore` covering the generated environments
//! 6. verification of each of the above, by name
//!
//! Every step checks for its own result first, so running the scaffolder again on an
//! existing project completes whatever is missing and touches nothing else.

use std::fs;
use std::path::{Path, PathBuf};

use colored::Colorize;

use crate::installers::nvm::with_nvm;
use crate::libs::database::{self, BootstrapPolicy, DatabaseBootstrap};
use crate::libs::errors::{ConfigError, ProvisionError, Result};
use crate::libs::executor::{CommandSpec, Privilege};
use crate::libs::host::Host;
use crate::libs::utilities::file_operations::ensure_lines;
use crate::schemas::project_layout::ProjectLayout;
use crate::schemas::settings::{ProjectSettings, Scope, Settings};
use crate::{log_debug, log_info};

/// Lines every scaffolded repository ignores.
pub const GITIGNORE_ENTRIES: [&str; 3] = ["frontend/node_modules/", "backend/.venv/", "__pycache__/"];

/// Rejects empty names and anything outside `[A-Za-z0-9_-]`.
pub fn validate_project_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ProvisionError::Input("project name must not be empty".into()));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ProvisionError::Input(format!(
            "project name '{name}' may only contain letters, digits, '_' and '-'"
        )));
    }
    Ok(())
}

/// The parts of the main configuration the scaffolder needs.
#[derive(Debug, Clone)]
pub struct ScaffoldContext {
    pub project_dir: PathBuf,
    pub pyenv_root: PathBuf,
    pub nvm_dir: PathBuf,
    pub db_port: u16,
}

impl ScaffoldContext {
    pub fn from_settings(s: &Settings) -> Result<Self, ConfigError> {
        Ok(ScaffoldContext {
            project_dir: s.get_path(&Scope::General, "project_dir")?,
            pyenv_root: s.get_path(&Scope::PythonEnv, "install_dir")?,
            nvm_dir: s.get_path(&Scope::PackageManager, "install_dir")?,
            db_port: match s.get_opt(&Scope::Database, "port") {
                Some(_) => s.get_port(&Scope::Database, "port")?,
                None => 5432,
            },
        })
    }
}

pub struct Scaffolder<'a> {
    host: &'a Host<'a>,
    ctx: ScaffoldContext,
}

/// `true` when `package.json` already lists `dependency`.
fn declares_dependency(package_json: &Path, dependency: &str) -> bool {
    let Ok(text) = fs::read_to_string(package_json) else {
        return false;
    };
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(manifest) => ["dependencies", "devDependencies"]
            .iter()
            .any(|section| manifest.get(section).and_then(|deps| deps.get(dependency)).is_some()),
        Err(err) => {
            log_debug!("[Project] {} is not valid JSON: {}", package_json.display(), err);
            false
        }
    }
}

impl<'a> Scaffolder<'a> {
    pub fn new(host: &'a Host<'a>, ctx: ScaffoldContext) -> Self {
        Scaffolder { host, ctx }
    }

    fn pyenv(&self) -> CommandSpec {
        CommandSpec::new(self.ctx.pyenv_root.join("bin").join("pyenv").display().to_string())
            .env("PYENV_ROOT", self.ctx.pyenv_root.display().to_string())
    }

    fn create_directories(&self, step: &str, layout: &ProjectLayout) -> Result<()> {
        for dir in [&layout.root, &layout.frontend, &layout.backend] {
            if !dir.exists() {
                self.host.create_dir_all(step, dir, &Privilege::User)?;
                log_info!("{} Created {}", step, dir.display().to_string().cyan());
            }
        }
        Ok(())
    }

    fn frontend(&self, step: &str, layout: &ProjectLayout, dependency: &str) -> Result<()> {
        if layout.package_json().exists() {
            log_info!("{} package.json exists, skipping npm init", step);
        } else {
            self.host.exec().run_strict(
                step,
                &with_nvm(&self.ctx.nvm_dir, "npm init -y").cwd(&layout.frontend),
            )?;
            log_info!("{} Initialised npm package", step);
        }

        if declares_dependency(&layout.package_json(), dependency) {
            log_info!("{} {} already declared, skipping install", step, dependency.cyan());
            return Ok(());
        }
        self.host.exec().run_strict(
            step,
            &with_nvm(&self.ctx.nvm_dir, &format!("npm install {dependency}")).cwd(&layout.frontend),
        )?;
        log_info!("{} Installed {}", step, dependency.green());
        Ok(())
    }

    fn backend(&self, step: &str, layout: &ProjectLayout, python_version: &str) -> Result<()> {
        if layout.venv_python().exists() {
            log_info!("{} .venv exists, skipping interpreter setup", step);
        } else {
            self.host
                .exec()
                .run_strict(step, &self.pyenv().args(["install", "-s", python_version]))?;
            let prompt = format!("{}-backend", layout.name);
            self.host.exec().run_strict(
                step,
                &self
                    .pyenv()
                    .env("PYENV_VERSION", python_version)
                    .args(["exec", "python", "-m", "venv", "--prompt", &prompt, ".venv"])
                    .cwd(&layout.backend),
            )?;
            log_info!("{} Created .venv with Python {}", step, python_version.green());
        }

        let pin = layout.backend.join(".python-version");
        let wanted = format!("{python_version}\n");
        if fs::read_to_string(&pin).ok().as_deref() != Some(wanted.as_str()) {
            self.host.write_file(step, &pin, &wanted, &Privilege::User)?;
        }
        Ok(())
    }

    fn version_control(&self, step: &str, layout: &ProjectLayout) -> Result<()> {
        if layout.vcs.exists() {
            log_info!("{} Repository exists, skipping git init", step);
        } else {
            self.host
                .exec()
                .run_strict(step, &CommandSpec::new("git").arg("init").cwd(&layout.root))?;
        }
        let added = ensure_lines(&layout.gitignore(), &GITIGNORE_ENTRIES)
            .map_err(|e| ProvisionError::io(format!("{step} updating .gitignore"), e))?;
        log_debug!("{} Added {} .gitignore entr(ies)", step, added);
        Ok(())
    }

    /// Checks each scaffolded part and names the first one that does not work.
    pub fn verify(&self, layout: &ProjectLayout, project: &ProjectSettings) -> Result<()> {
        let step = format!("[Project] {} Verified", layout.name);
        let check = |name: &str| format!("{step} {name}");

        if !declares_dependency(&layout.package_json(), &project.frontend_dependency) {
            return Err(ProvisionError::verification(
                check("frontend-dependency"),
                format!(
                    "{} does not declare {}",
                    layout.package_json().display(),
                    project.frontend_dependency
                ),
            ));
        }

        let npm_ls = with_nvm(
            &self.ctx.nvm_dir,
            &format!("npm ls {}", project.frontend_dependency),
        )
        .cwd(&layout.frontend);
        let out = self.host.exec().capture(&step, &npm_ls)?;
        if !out.success() {
            return Err(ProvisionError::verification(
                check("frontend-dependency"),
                format!("`npm ls {}` failed: {}", project.frontend_dependency, out.stderr.trim()),
            ));
        }

        let python = CommandSpec::new(layout.venv_python().display().to_string()).arg("--version");
        let out = self.host.exec().capture(&step, &python)?;
        let reported = format!("{}{}", out.stdout, out.stderr);
        let expected = format!("Python {}", project.python_version);
        if !out.success() || !reported.contains(&expected) {
            return Err(ProvisionError::verification(
                check("backend-interpreter"),
                format!("expected '{}', got '{}'", expected, reported.trim()),
            ));
        }

        let select = database::select_one_spec(
            &layout.role,
            &project.default_password,
            &layout.database,
            self.ctx.db_port,
        );
        let out = self.host.exec().capture(&step, &select)?;
        if !out.success() || out.stdout.trim() != "1" {
            return Err(ProvisionError::verification(
                check("database-connection"),
                format!(
                    "SELECT 1 as {} on {} failed: {}",
                    layout.role,
                    layout.database,
                    out.stderr.trim()
                ),
            ));
        }

        log_info!("{} All checks passed", step);
        Ok(())
    }

    /// Scaffolds (or completes) project `name`.
    pub fn scaffold(&self, name: &str, project: &ProjectSettings) -> Result<ProjectLayout> {
        validate_project_name(name)?;
        let layout = ProjectLayout::plan(&self.ctx.project_dir, name, project);
        let step = format!("[Project] {name}");
        eprintln!("{}", "==============================================================================".bright_blue());
        log_info!("{} Scaffolding in {}", step.bold(), layout.root.display().to_string().cyan());

        self.create_directories(&step, &layout)?;
        self.frontend(&format!("{step} Frontend"), &layout, &project.frontend_dependency)?;
        self.backend(&format!("{step} Backend"), &layout, &project.python_version)?;
        database::bootstrap(
            self.host.exec(),
            &format!("{step} Database"),
            &DatabaseBootstrap {
                role: layout.role.clone(),
                password: project.default_password.clone(),
                database: layout.database.clone(),
                policy: BootstrapPolicy::CreateOnly,
                grant_createdb: true,
            },
        )?;
        self.version_control(&format!("{step} VCS"), &layout)?;
        self.verify(&layout, project)?;

        log_info!("{} Ready at {}", step, layout.root.display().to_string().green());
        Ok(layout)
    }
}
