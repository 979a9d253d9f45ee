// This module turns a TOML configuration source into a validated `Settings` object.
//
// Loading is split in two so the caller can print the raw text when validation fails:
//
// 1. `read_source` reads and parses the file (unreadable or malformed sources fail here).
// 2. `load` / `load_project` flatten the sections into `(Scope, key) -> String`, substitute
//    the `$USER` placeholder, and check every key of the stage's schema.
//
// Nothing is defaulted silently: a required key that is absent or empty is a
// `ConfigError::MissingKey` naming the exact section and key.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use colored::Colorize;

use crate::libs::errors::ConfigError;
use crate::libs::utilities::platform::invoking_user;
use crate::schemas::settings::{Schema, Scope, Settings};
use crate::{log_debug, log_error, log_warn};

/// Section of the project source used when a project has no section of its own.
pub const DEFAULT_PROJECT_SECTION: &str = "default";

/// A parsed configuration file, kept together with its raw text for diagnostics.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub path: PathBuf,
    pub raw: String,
    table: toml::Table,
}

impl ConfigSource {
    /// Parses `raw` as if it had been read from `path`.
    pub fn parse(path: &Path, raw: String) -> Result<Self, ConfigError> {
        let table = raw
            .parse::<toml::Table>()
            .map_err(|e| ConfigError::Syntax(format!("{}: {}", path.display(), e.message())))?;
        Ok(ConfigSource {
            path: path.to_path_buf(),
            raw,
            table,
        })
    }

    /// Prints the full source so the operator can see what was actually loaded.
    pub fn dump(&self) {
        log_error!(
            "[Config] Contents of {}:",
            self.path.display().to_string().red()
        );
        eprintln!("{}", "-".repeat(60).bright_black());
        eprintln!("{}", self.raw.trim_end());
        eprintln!("{}", "-".repeat(60).bright_black());
    }

    fn section(&self, name: &str) -> Option<&toml::Table> {
        self.table.get(name).and_then(toml::Value::as_table)
    }
}

/// Reads and parses a configuration source.
pub fn read_source(path: &Path) -> Result<ConfigSource, ConfigError> {
    log_debug!("[Config] Reading {}", path.display());
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    ConfigSource::parse(path, raw)
}

/// Scalar TOML values as strings; arrays and tables are not settings.
fn scalar(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Datetime(d) => Some(d.to_string()),
        toml::Value::Array(_) | toml::Value::Table(_) => None,
    }
}

/// Replaces `$USER` / `${USER}` with the invoking user. Other variables stay as written.
pub fn substitute_user(value: &str, user: Option<&str>) -> String {
    shellexpand::env_with_context_no_errors(value, |var| match var {
        "USER" => user,
        _ => None,
    })
    .into_owned()
}

fn insert_section(
    values: &mut BTreeMap<(Scope, String), String>,
    scope: &Scope,
    section: &toml::Table,
    user: Option<&str>,
) {
    for (key, value) in section {
        match scalar(value) {
            Some(text) => {
                values.insert((scope.clone(), key.clone()), substitute_user(&text, user));
            }
            None => log_warn!(
                "[Config] Ignoring non-scalar value [{}].{}",
                scope,
                key.yellow()
            ),
        }
    }
}

/// Fails with the first `(scope, key)` of `schema` that is absent or empty.
fn validate(settings: &Settings, schema: &Schema) -> Result<(), ConfigError> {
    for (scope, key) in schema {
        settings.get(scope, key)?;
    }
    Ok(())
}

/// Loads the main source (`general`, `database`, `cache`, ...) and validates `schema`.
pub fn load(source: &ConfigSource, schema: &Schema) -> Result<Settings, ConfigError> {
    let user = invoking_user();
    let mut values = BTreeMap::new();

    for scope in Scope::stack_scopes() {
        match source.section(scope.section_name()) {
            Some(section) => insert_section(&mut values, &scope, section, user.as_deref()),
            None => log_debug!("[Config] No [{}] section in {}", scope, source.path.display()),
        }
    }

    let settings = Settings::from_values(values);
    validate(&settings, schema)?;
    log_debug!(
        "[Config] Loaded {} value(s) from {}",
        settings.entry_count(),
        source.path.display()
    );
    Ok(settings)
}

/// Loads the values for `project_name` from the project source.
///
/// Keys come from `[<project_name>]`, falling back key by key to `[default]`. Both
/// end up under `Scope::Project(project_name)`.
pub fn load_project(source: &ConfigSource, project_name: &str, schema: &Schema) -> Result<Settings, ConfigError> {
    let user = invoking_user();
    let scope = Scope::Project(project_name.to_string());
    let mut values = BTreeMap::new();

    if let Some(defaults) = source.section(DEFAULT_PROJECT_SECTION) {
        insert_section(&mut values, &scope, defaults, user.as_deref());
    }
    match source.section(project_name) {
        Some(own) => insert_section(&mut values, &scope, own, user.as_deref()),
        None => log_debug!(
            "[Config] No [{}] section; using [{}] values",
            project_name,
            DEFAULT_PROJECT_SECTION
        ),
    }

    let settings = Settings::from_values(values);
    validate(&settings, schema)?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::settings::{install_schema, project_settings_schema, StackSettings};
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    const FULL: &str = indoc! {r#"
        [general]
        project_dir = "/home/$USER/projects"

        [database]
        user = "devadmin"
        password = "db-secret"
        name = "devdb"

        [cache]
        config_file = "/etc/redis/redis.conf"
        password = "cache-secret"
        port = 6380

        [webserver]
        config_file = "/etc/nginx/nginx.conf"
        site_definition = "/etc/nginx/sites-available/devstack"
        enabled_site = "/etc/nginx/sites-enabled/devstack"
        port = 8080
        document_root = "/var/www/devstack"
        index_file = "index.html"

        [python_env]
        install_dir = "/home/${USER}/.pyenv"
        auto_activate = true

        [package_manager]
        install_dir = "/home/$USER/.nvm"
        runtime_version = "v20.11.1"
    "#};

    fn source(raw: &str) -> ConfigSource {
        ConfigSource::parse(Path::new("devstack.toml"), raw.to_string()).unwrap()
    }

    #[test]
    fn complete_source_validates_and_types_parse() {
        let settings = load(&source(FULL), &install_schema()).unwrap();
        let stack = StackSettings::from_settings(&settings).unwrap();
        assert_eq!(stack.cache.port, 6380);
        assert!(stack.python_env.auto_activate);
        assert_eq!(stack.package_manager.runtime_version, "20.11.1");
        assert_eq!(stack.database.port, 5432);
    }

    #[test]
    fn missing_key_names_scope_and_key() {
        let raw = FULL.replace("password = \"cache-secret\"\n", "");
        let err = load(&source(&raw), &install_schema()).unwrap_err();
        match err {
            ConfigError::MissingKey { scope, key } => {
                assert_eq!(scope, Scope::Cache);
                assert_eq!(key, "password");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn empty_value_is_missing() {
        let raw = FULL.replace("name = \"devdb\"", "name = \"  \"");
        assert!(matches!(
            load(&source(&raw), &install_schema()),
            Err(ConfigError::MissingKey { scope: Scope::Database, .. })
        ));
    }

    #[test]
    fn only_the_user_placeholder_is_substituted() {
        assert_eq!(substitute_user("/home/$USER/x", Some("dev")), "/home/dev/x");
        assert_eq!(substitute_user("/home/${USER}/x", Some("dev")), "/home/dev/x");
        assert_eq!(substitute_user("$HOME/$USER", Some("dev")), "$HOME/dev");
        assert_eq!(substitute_user("/home/$USER", None), "/home/$USER");
    }

    #[test]
    fn malformed_toml_is_a_syntax_error() {
        let err = ConfigSource::parse(Path::new("bad.toml"), "[cache\nport = 1".into()).unwrap_err();
        assert!(matches!(err, ConfigError::Syntax(ref msg) if msg.starts_with("bad.toml")));
    }

    #[test]
    fn unreadable_file_is_reported_with_its_path() {
        let err = read_source(Path::new("/nonexistent/devstack.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Unreadable { ref path, .. } if path == Path::new("/nonexistent/devstack.toml")));
    }

    #[test]
    fn project_values_fall_back_to_default_section() {
        let raw = indoc! {r#"
            [default]
            python_version = "3.12.3"
            db_prefix = "proj_"
            user_prefix = "user_"
            default_password = "changeme"

            [shop]
            python_version = "3.11.9"
        "#};
        let projects = source(raw);

        let shop = load_project(&projects, "shop", &project_settings_schema("shop")).unwrap();
        let scope = Scope::Project("shop".into());
        assert_eq!(shop.get(&scope, "python_version").unwrap(), "3.11.9");
        assert_eq!(shop.get(&scope, "db_prefix").unwrap(), "proj_");

        let blog = load_project(&projects, "blog", &project_settings_schema("blog")).unwrap();
        assert_eq!(
            blog.get(&Scope::Project("blog".into()), "python_version").unwrap(),
            "3.12.3"
        );
    }

    #[test]
    fn project_without_any_section_is_missing_keys() {
        let projects = source("[other]\npython_version = \"3.12\"\n");
        assert!(matches!(
            load_project(&projects, "shop", &project_settings_schema("shop")),
            Err(ConfigError::MissingKey { .. })
        ));
    }
}
