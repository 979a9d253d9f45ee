// This is the main module file for the `libs` directory.
// It declares the provisioning core: loading settings, running commands, and
// driving every managed service through install, teardown and verification.

// Reads TOML sources into validated `Settings`.
pub mod config_loading;
// Idempotent line-level patching of service configuration files.
pub mod config_patch;
// Role and database creation policies.
pub mod database;
// `ConfigError` / `ProvisionError` and the exit-code taxonomy.
pub mod errors;
// Privileged command execution with timeouts and result classification.
pub mod executor;
// Package manager, service manager and filesystem capabilities.
pub mod host;
// Host-wide advisory lock held for a whole run.
pub mod host_lock;
// HTTP probe used to verify the web server.
pub mod http_probe;
// Bounded exponential backoff for service activation.
pub mod readiness;
// Smoke tests and the manual verification table.
pub mod report;
// Per-project directory, environment and database scaffolding.
pub mod scaffolder;
// The generic per-service install state machine.
pub mod service_installer;
// Marker-delimited blocks in shell profiles.
pub mod shell_profile;
// Best-effort removal of prior installations.
pub mod teardown;
// Small helpers shared across the above.
pub mod utilities;

#[cfg(test)]
pub mod testing;
