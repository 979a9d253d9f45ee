//! # Error Taxonomy
//!
//! Every fatal path in `setup-devstack` ends in a [`ProvisionError`]. Each variant maps to
//! a stable process exit code so that scripts driving the provisioner can tell a broken
//! configuration from a failing package manager or a service that never came up.
//!
//! | Exit code | Meaning                                         |
//! |-----------|-------------------------------------------------|
//! | 1         | Configuration or interactive input error        |
//! | 2         | External tool failure (including host I/O)      |
//! | 3         | Post-step verification failed                   |
//! | 4         | An external operation timed out                 |
//! | 5         | Another provisioning run holds the host lock    |

use std::path::PathBuf;
use std::time::Duration;

use crate::schemas::settings::Scope;

/// A required configuration value is missing or unusable.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration source {path} could not be read: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration source is not valid TOML: {0}")]
    Syntax(String),

    #[error("required key '{key}' is missing or empty in section [{scope}]")]
    MissingKey { scope: Scope, key: String },

    #[error("key '{key}' in section [{scope}] has an invalid value '{value}': {reason}")]
    InvalidValue {
        scope: Scope,
        key: String,
        value: String,
        reason: String,
    },
}

/// Every way a provisioning run can abort.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{step}: `{command}` failed ({status})")]
    ExternalTool {
        step: String,
        command: String,
        status: String,
        stdout: String,
        stderr: String,
        /// Recent service log output attached after a service-management failure.
        logs: Option<String>,
    },

    #[error("{step}: {what} did not finish within {after:?}")]
    Timeout {
        step: String,
        what: String,
        after: Duration,
    },

    #[error("verification '{check}' failed: {detail}")]
    Verification { check: String, detail: String },

    #[error("another provisioning run holds the host lock {path} ({holder})")]
    LockHeld { path: PathBuf, holder: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid input: {0}")]
    Input(String),
}

impl ProvisionError {
    /// Wraps an I/O error with the step that produced it.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ProvisionError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn verification(check: impl Into<String>, detail: impl Into<String>) -> Self {
        ProvisionError::Verification {
            check: check.into(),
            detail: detail.into(),
        }
    }

    /// Stable exit code for this failure category.
    pub fn exit_code(&self) -> i32 {
        match self {
            ProvisionError::Config(_) | ProvisionError::Input(_) => 1,
            ProvisionError::ExternalTool { .. } | ProvisionError::Io { .. } => 2,
            ProvisionError::Verification { .. } => 3,
            ProvisionError::Timeout { .. } => 4,
            ProvisionError::LockHeld { .. } => 5,
        }
    }

    /// Captured output and service logs, for the operator-facing diagnostic.
    pub fn diagnostics(&self) -> Option<String> {
        let ProvisionError::ExternalTool {
            stdout,
            stderr,
            logs,
            ..
        } = self
        else {
            return None;
        };

        let mut sections = Vec::new();
        if !stdout.trim().is_empty() {
            sections.push(format!("--- stdout ---\n{}", stdout.trim_end()));
        }
        if !stderr.trim().is_empty() {
            sections.push(format!("--- stderr ---\n{}", stderr.trim_end()));
        }
        if let Some(logs) = logs.as_deref().filter(|l| !l.trim().is_empty()) {
            sections.push(format!("--- recent service logs ---\n{}", logs.trim_end()));
        }
        (!sections.is_empty()).then(|| sections.join("\n"))
    }
}

pub type Result<T, E = ProvisionError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_the_taxonomy() {
        let config: ProvisionError = ConfigError::MissingKey {
            scope: Scope::Cache,
            key: "port".into(),
        }
        .into();
        assert_eq!(config.exit_code(), 1);
        assert_eq!(ProvisionError::Input("empty".into()).exit_code(), 1);
        assert_eq!(ProvisionError::verification("ping", "no PONG").exit_code(), 3);
        assert_eq!(
            ProvisionError::Timeout {
                step: "Running".into(),
                what: "redis-server".into(),
                after: Duration::from_secs(1),
            }
            .exit_code(),
            4
        );
        assert_eq!(
            ProvisionError::LockHeld {
                path: PathBuf::from("/tmp/x.lock"),
                holder: "pid 1".into(),
            }
            .exit_code(),
            5
        );
    }

    #[test]
    fn diagnostics_include_service_logs() {
        let err = ProvisionError::ExternalTool {
            step: "Running".into(),
            command: "systemctl restart nginx".into(),
            status: "exit status 1".into(),
            stdout: String::new(),
            stderr: "Job failed".into(),
            logs: Some("nginx: bind() failed".into()),
        };
        assert_eq!(err.exit_code(), 2);
        let text = err.diagnostics().unwrap();
        assert!(text.contains("--- stderr ---\nJob failed"));
        assert!(text.contains("--- recent service logs ---\nnginx: bind() failed"));
        assert!(!text.contains("stdout"));
    }
}
