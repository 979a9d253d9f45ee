// This module defines the validated settings object produced by the configuration loader,
// plus the typed per-section views that the installers and the scaffolder consume.
//
// `Settings` itself is an immutable `(Scope, key) -> String` map.
// The typed views (`DatabaseSettings`, `CacheSettings`, ...) are parsed from it up front,
// so a bad port number or boolean is reported before any mutating step runs.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::libs::errors::ConfigError;
use crate::libs::utilities::path_helpers::expand_tilde;

/// Named section of a configuration source.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    General,
    Database,
    Cache,
    WebServer,
    PythonEnv,
    PackageManager,
    /// A section of the project source, keyed by project name (or `default`).
    Project(String),
}

impl Scope {
    /// The section header as written in the TOML source.
    pub fn section_name(&self) -> &str {
        match self {
            Scope::General => "general",
            Scope::Database => "database",
            Scope::Cache => "cache",
            Scope::WebServer => "webserver",
            Scope::PythonEnv => "python_env",
            Scope::PackageManager => "package_manager",
            Scope::Project(name) => name,
        }
    }

    /// All fixed scopes of the main configuration source.
    pub fn stack_scopes() -> [Scope; 6] {
        [
            Scope::General,
            Scope::Database,
            Scope::Cache,
            Scope::WebServer,
            Scope::PythonEnv,
            Scope::PackageManager,
        ]
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.section_name())
    }
}

/// A list of `(scope, key)` pairs that must be present and non-empty.
pub type Schema = Vec<(Scope, &'static str)>;

/// Keys required before the global install flow may touch the host.
pub fn install_schema() -> Schema {
    vec![
        (Scope::General, "project_dir"),
        (Scope::Database, "user"),
        (Scope::Database, "password"),
        (Scope::Database, "name"),
        (Scope::Cache, "config_file"),
        (Scope::Cache, "password"),
        (Scope::Cache, "port"),
        (Scope::WebServer, "config_file"),
        (Scope::WebServer, "site_definition"),
        (Scope::WebServer, "enabled_site"),
        (Scope::WebServer, "port"),
        (Scope::WebServer, "document_root"),
        (Scope::WebServer, "index_file"),
        (Scope::PythonEnv, "install_dir"),
        (Scope::PythonEnv, "auto_activate"),
        (Scope::PackageManager, "install_dir"),
        (Scope::PackageManager, "runtime_version"),
    ]
}

/// Keys of the main source the project scaffolder relies on.
pub fn project_schema() -> Schema {
    vec![
        (Scope::General, "project_dir"),
        (Scope::PythonEnv, "install_dir"),
        (Scope::PackageManager, "install_dir"),
    ]
}

/// Keys the project source must provide for `project_name`.
pub fn project_settings_schema(project_name: &str) -> Schema {
    let scope = Scope::Project(project_name.to_string());
    vec![
        (scope.clone(), "python_version"),
        (scope.clone(), "db_prefix"),
        (scope.clone(), "user_prefix"),
        (scope, "default_password"),
    ]
}

/// Immutable, validated `(scope, key) -> value` mapping.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    values: BTreeMap<(Scope, String), String>,
}

impl Settings {
    pub(crate) fn from_values(values: BTreeMap<(Scope, String), String>) -> Self {
        Settings { values }
    }

    /// Looks up a value, failing with the exact `(scope, key)` when absent or empty.
    pub fn get(&self, scope: &Scope, key: &str) -> Result<&str, ConfigError> {
        self.values
            .get(&(scope.clone(), key.to_string()))
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingKey {
                scope: scope.clone(),
                key: key.to_string(),
            })
    }

    /// Looks up an optional value.
    pub fn get_opt(&self, scope: &Scope, key: &str) -> Option<&str> {
        self.get(scope, key).ok()
    }

    pub fn get_path(&self, scope: &Scope, key: &str) -> Result<PathBuf, ConfigError> {
        self.get(scope, key).map(expand_tilde)
    }

    pub fn get_port(&self, scope: &Scope, key: &str) -> Result<u16, ConfigError> {
        let raw = self.get(scope, key)?;
        raw.trim()
            .parse::<u16>()
            .ok()
            .filter(|port| *port != 0)
            .ok_or_else(|| invalid(scope, key, raw, "expected a TCP port between 1 and 65535"))
    }

    pub fn get_bool(&self, scope: &Scope, key: &str) -> Result<bool, ConfigError> {
        let raw = self.get(scope, key)?;
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(invalid(scope, key, raw, "expected true or false")),
        }
    }

    fn get_secs_or(&self, scope: &Scope, key: &str, default: u64) -> Result<Duration, ConfigError> {
        match self.get_opt(scope, key) {
            None => Ok(Duration::from_secs(default)),
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or_else(|| invalid(scope, key, raw, "expected a positive number of seconds")),
        }
    }

    /// Number of stored entries, used in debug logs.
    pub fn entry_count(&self) -> usize {
        self.values.len()
    }
}

fn invalid(scope: &Scope, key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        scope: scope.clone(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Checks a single secret or identifier value against characters that would need shell quoting.
fn plain_word(scope: &Scope, key: &str, value: &str) -> Result<String, ConfigError> {
    if value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        Ok(value.to_string())
    } else {
        Err(invalid(
            scope,
            key,
            value,
            "only letters, digits, '_', '-' and '.' are allowed",
        ))
    }
}

#[derive(Debug, Clone)]
pub struct GeneralSettings {
    pub project_dir: PathBuf,
    pub command_timeout: Duration,
    pub service_timeout: Duration,
}

impl GeneralSettings {
    pub fn from_settings(s: &Settings) -> Result<Self, ConfigError> {
        Ok(GeneralSettings {
            project_dir: s.get_path(&Scope::General, "project_dir")?,
            command_timeout: s.get_secs_or(&Scope::General, "command_timeout_secs", 600)?,
            service_timeout: s.get_secs_or(&Scope::General, "service_timeout_secs", 30)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub user: String,
    pub password: String,
    pub name: String,
    pub port: u16,
}

impl DatabaseSettings {
    pub fn from_settings(s: &Settings) -> Result<Self, ConfigError> {
        let scope = Scope::Database;
        Ok(DatabaseSettings {
            user: plain_word(&scope, "user", s.get(&scope, "user")?)?,
            password: s.get(&scope, "password")?.to_string(),
            name: plain_word(&scope, "name", s.get(&scope, "name")?)?,
            port: match s.get_opt(&scope, "port") {
                Some(_) => s.get_port(&scope, "port")?,
                None => 5432,
            },
        })
    }
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub config_file: PathBuf,
    pub password: String,
    pub port: u16,
}

impl CacheSettings {
    pub fn from_settings(s: &Settings) -> Result<Self, ConfigError> {
        let scope = Scope::Cache;
        Ok(CacheSettings {
            config_file: s.get_path(&scope, "config_file")?,
            // Redis treats whitespace as a directive separator.
            password: plain_word(&scope, "password", s.get(&scope, "password")?)?,
            port: s.get_port(&scope, "port")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct WebServerSettings {
    pub config_file: PathBuf,
    pub site_definition: PathBuf,
    pub enabled_site: PathBuf,
    pub port: u16,
    pub document_root: PathBuf,
    pub index_file: String,
}

impl WebServerSettings {
    pub fn from_settings(s: &Settings) -> Result<Self, ConfigError> {
        let scope = Scope::WebServer;
        Ok(WebServerSettings {
            config_file: s.get_path(&scope, "config_file")?,
            site_definition: s.get_path(&scope, "site_definition")?,
            enabled_site: s.get_path(&scope, "enabled_site")?,
            port: s.get_port(&scope, "port")?,
            document_root: s.get_path(&scope, "document_root")?,
            index_file: plain_word(&scope, "index_file", s.get(&scope, "index_file")?)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PythonEnvSettings {
    pub install_dir: PathBuf,
    pub auto_activate: bool,
}

impl PythonEnvSettings {
    pub fn from_settings(s: &Settings) -> Result<Self, ConfigError> {
        Ok(PythonEnvSettings {
            install_dir: s.get_path(&Scope::PythonEnv, "install_dir")?,
            auto_activate: s.get_bool(&Scope::PythonEnv, "auto_activate")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PackageManagerSettings {
    pub install_dir: PathBuf,
    pub runtime_version: String,
}

impl PackageManagerSettings {
    pub fn from_settings(s: &Settings) -> Result<Self, ConfigError> {
        let scope = Scope::PackageManager;
        let raw = s.get(&scope, "runtime_version")?;
        Ok(PackageManagerSettings {
            install_dir: s.get_path(&scope, "install_dir")?,
            runtime_version: plain_word(&scope, "runtime_version", raw.trim_start_matches('v'))?,
        })
    }
}

/// Every typed section of the main source, parsed in one go.
#[derive(Debug, Clone)]
pub struct StackSettings {
    pub general: GeneralSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub webserver: WebServerSettings,
    pub python_env: PythonEnvSettings,
    pub package_manager: PackageManagerSettings,
}

impl StackSettings {
    pub fn from_settings(s: &Settings) -> Result<Self, ConfigError> {
        Ok(StackSettings {
            general: GeneralSettings::from_settings(s)?,
            database: DatabaseSettings::from_settings(s)?,
            cache: CacheSettings::from_settings(s)?,
            webserver: WebServerSettings::from_settings(s)?,
            python_env: PythonEnvSettings::from_settings(s)?,
            package_manager: PackageManagerSettings::from_settings(s)?,
        })
    }
}

/// Per-project values from the project source.
#[derive(Debug, Clone)]
pub struct ProjectSettings {
    pub python_version: String,
    pub db_prefix: String,
    pub user_prefix: String,
    pub default_password: String,
    pub frontend_dependency: String,
}

impl ProjectSettings {
    pub fn from_settings(s: &Settings, project_name: &str) -> Result<Self, ConfigError> {
        let scope = Scope::Project(project_name.to_string());
        Ok(ProjectSettings {
            python_version: plain_word(&scope, "python_version", s.get(&scope, "python_version")?)?,
            db_prefix: plain_word(&scope, "db_prefix", s.get(&scope, "db_prefix")?)?,
            user_prefix: plain_word(&scope, "user_prefix", s.get(&scope, "user_prefix")?)?,
            default_password: s.get(&scope, "default_password")?.to_string(),
            frontend_dependency: plain_word(
                &scope,
                "frontend_dependency",
                s.get_opt(&scope, "frontend_dependency").unwrap_or("react"),
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(entries: &[(Scope, &str, &str)]) -> Settings {
        Settings::from_values(
            entries
                .iter()
                .map(|(scope, key, value)| ((scope.clone(), key.to_string()), value.to_string()))
                .collect(),
        )
    }

    #[test]
    fn empty_values_count_as_missing() {
        let s = settings(&[(Scope::Cache, "password", "   ")]);
        let err = s.get(&Scope::Cache, "password").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingKey { scope: Scope::Cache, ref key } if key == "password"
        ));
    }

    #[test]
    fn ports_are_validated() {
        let s = settings(&[
            (Scope::Cache, "port", "6379"),
            (Scope::WebServer, "port", "http"),
            (Scope::Database, "port", "0"),
        ]);
        assert_eq!(s.get_port(&Scope::Cache, "port").unwrap(), 6379);
        assert!(matches!(
            s.get_port(&Scope::WebServer, "port"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(s.get_port(&Scope::Database, "port").is_err());
    }

    #[test]
    fn booleans_accept_common_spellings() {
        let s = settings(&[
            (Scope::PythonEnv, "auto_activate", "Yes"),
            (Scope::General, "flag", "maybe"),
        ]);
        assert!(s.get_bool(&Scope::PythonEnv, "auto_activate").unwrap());
        assert!(s.get_bool(&Scope::General, "flag").is_err());
    }

    #[test]
    fn optional_timeouts_fall_back_to_defaults() {
        let s = settings(&[
            (Scope::General, "project_dir", "/srv/projects"),
            (Scope::General, "service_timeout_secs", "5"),
        ]);
        let general = GeneralSettings::from_settings(&s).unwrap();
        assert_eq!(general.project_dir, PathBuf::from("/srv/projects"));
        assert_eq!(general.service_timeout, Duration::from_secs(5));
        assert_eq!(general.command_timeout, Duration::from_secs(600));
    }

    #[test]
    fn project_settings_default_the_frontend_dependency() {
        let scope = Scope::Project("demo".into());
        let s = settings(&[
            (scope.clone(), "python_version", "3.12.3"),
            (scope.clone(), "db_prefix", "proj_"),
            (scope.clone(), "user_prefix", "user_"),
            (scope, "default_password", "s3cret"),
        ]);
        let project = ProjectSettings::from_settings(&s, "demo").unwrap();
        assert_eq!(project.frontend_dependency, "react");
        assert_eq!(project.db_prefix, "proj_");
    }

    #[test]
    fn identifiers_reject_shell_metacharacters() {
        let s = settings(&[
            (Scope::Database, "user", "admin; rm -rf /"),
            (Scope::Database, "password", "pw"),
            (Scope::Database, "name", "devdb"),
        ]);
        assert!(matches!(
            DatabaseSettings::from_settings(&s),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "user"
        ));
    }

    #[test]
    fn database_port_defaults_to_5432() {
        let mut entries = vec![
            (Scope::Database, "user", "admin"),
            (Scope::Database, "password", "pw"),
            (Scope::Database, "name", "devdb"),
        ];
        assert_eq!(DatabaseSettings::from_settings(&settings(&entries)).unwrap().port, 5432);

        entries.push((Scope::Database, "port", "5433"));
        assert_eq!(DatabaseSettings::from_settings(&settings(&entries)).unwrap().port, 5433);
    }
}
