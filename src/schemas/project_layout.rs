// The on-disk and in-database shape of a scaffolded project.

use std::path::{Path, PathBuf};

use crate::schemas::settings::ProjectSettings;

/// Everything the scaffolder creates for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    pub name: String,
    /// `<project_dir>/<name>`
    pub root: PathBuf,
    /// `<root>/frontend`, an npm package.
    pub frontend: PathBuf,
    /// `<root>/backend`, with a `.venv` built from the pinned interpreter.
    pub backend: PathBuf,
    /// `<db_prefix><name>`
    pub database: String,
    /// `<user_prefix><name>`, owner of `database`.
    pub role: String,
    /// `<root>/.git`
    pub vcs: PathBuf,
}

impl ProjectLayout {
    pub fn plan(project_dir: &Path, name: &str, project: &ProjectSettings) -> Self {
        let root = project_dir.join(name);
        ProjectLayout {
            name: name.to_string(),
            frontend: root.join("frontend"),
            backend: root.join("backend"),
            vcs: root.join(".git"),
            database: format!("{}{}", project.db_prefix, name),
            role: format!("{}{}", project.user_prefix, name),
            root,
        }
    }

    pub fn venv(&self) -> PathBuf {
        self.backend.join(".venv")
    }

    pub fn venv_python(&self) -> PathBuf {
        self.venv().join("bin").join("python")
    }

    pub fn package_json(&self) -> PathBuf {
        self.frontend.join("package.json")
    }

    pub fn gitignore(&self) -> PathBuf {
        self.root.join(".gitignore")
    }
}
