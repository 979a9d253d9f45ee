// ============================================================================
//                              TEARDOWN STAGE
// ============================================================================
//
// Returns the host to a known-clean state before a fresh install, or on demand via
// `setup-devstack teardown`. Per service, in order:
//
//   1. stop the running unit
//   2. purge the packages
//   3. remove data, configuration and log directories
//   4. remove the service's marker-delimited shell-profile blocks
//   5. remove owned dotfiles
//
// Teardown never aborts. Every step ends as `Removed`, `NotFound` or `Failed(reason)`;
// the last two are logged as warnings and collected into a `TeardownSummary` that is
// printed once all services are processed.

use std::path::Path;

use colored::Colorize;

use crate::libs::errors::{ProvisionError, Result};
use crate::libs::executor::{Outcome, Privilege};
use crate::libs::host::Host;
use crate::libs::shell_profile::{profile_paths, strip_block};
use crate::schemas::managed_service::ManagedService;
use crate::{log_debug, log_info, log_warn};

/// Result of a single teardown step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalResult {
    /// The step removed or stopped something.
    Removed,

    /// There was nothing to remove.
    NotFound,

    /// The step failed; the reason is reported but never aborts the stage.
    Failed(String),
}

/// Aggregated results of a teardown run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TeardownSummary {
    /// `"[Redis] /var/lib/redis"`-style labels of removed items.
    pub removed: Vec<String>,

    /// Items that were already absent.
    pub not_found: Vec<String>,

    /// Items that could not be removed, with the reason.
    pub failed: Vec<(String, String)>,
}

impl TeardownSummary {
    fn record(&mut self, label: String, result: RemovalResult) {
        match result {
            RemovalResult::Removed => {
                log_info!("{} removed", label);
                self.removed.push(label);
            }
            RemovalResult::NotFound => {
                log_warn!("{} not found", label);
                self.not_found.push(label);
            }
            RemovalResult::Failed(reason) => {
                log_warn!("{} could not be removed: {}", label, reason.yellow());
                self.failed.push((label, reason));
            }
        }
    }

    /// Number of warnings (absent or failed items) raised during teardown.
    pub fn warning_count(&self) -> usize {
        self.not_found.len() + self.failed.len()
    }

    /// Prints the summary block shown at the end of the stage.
    pub fn display(&self) {
        println!("\n{}", "=".repeat(20).bright_blue());
        println!("  {}", "Teardown Summary".bright_yellow().bold());
        println!("{}", "=".repeat(20).bright_blue());

        if !self.removed.is_empty() {
            for item in &self.removed {
                println!("  {} {}", "✓".green(), item.green());
            }
            println!("Removed: {}\n", self.removed.len().to_string().green());
        }

        if !self.not_found.is_empty() {
            for item in &self.not_found {
                println!("  {} {}", "⚠".yellow(), item.yellow());
            }
            println!("Not found: {}\n", self.not_found.len().to_string().yellow());
        }

        if !self.failed.is_empty() {
            for (item, reason) in &self.failed {
                println!("  {} {} - {}", "✗".red(), item.red(), reason.red());
            }
            println!("Failed: {}\n", self.failed.len().to_string().red());
        }

        println!("{}\n", "=".repeat(20).bright_blue());
    }
}

fn from_outcome(outcome: Result<Outcome>) -> RemovalResult {
    match outcome {
        Ok(Outcome::Success(_)) => RemovalResult::Removed,
        Ok(Outcome::SuccessWithWarning(_, reason)) => RemovalResult::Failed(reason),
        Err(ProvisionError::ExternalTool { stderr, status, .. }) => {
            RemovalResult::Failed(stderr.lines().rfind(|l| !l.trim().is_empty()).map(str::to_string).unwrap_or(status))
        }
        Err(err) => RemovalResult::Failed(err.to_string()),
    }
}

fn remove_path(host: &Host, step: &str, path: &Path, privilege: &Privilege) -> RemovalResult {
    match host.remove_path(step, path, privilege) {
        Ok(true) => RemovalResult::Removed,
        Ok(false) => RemovalResult::NotFound,
        Err(err) => RemovalResult::Failed(err.to_string()),
    }
}

/// Tears down one service, appending its results to `summary`.
pub fn teardown_service(host: &Host, service: &ManagedService, summary: &mut TeardownSummary) {
    let tag = service.tag();
    let step = format!("{tag} Teardown");
    let plan = &service.teardown;
    log_info!("{} Tearing down", tag.bold());

    if let Some(unit) = &service.unit {
        let stopped = if host.unit_active(&step, unit).unwrap_or(false) {
            from_outcome(host.stop_unit(&step, unit))
        } else {
            RemovalResult::NotFound
        };
        summary.record(format!("{tag} unit {unit}"), stopped);
    }

    if !plan.packages.is_empty() {
        let installed: Vec<String> = plan
            .packages
            .iter()
            .filter(|pkg| host.package_installed(&step, pkg))
            .cloned()
            .collect();
        let purged = if installed.is_empty() {
            RemovalResult::NotFound
        } else {
            from_outcome(host.purge_packages(&step, &installed))
        };
        summary.record(format!("{tag} packages {}", plan.packages.join(" ")), purged);
    }

    for (dir, privilege) in &plan.directories {
        let result = remove_path(host, &step, dir, privilege);
        summary.record(format!("{tag} {}", dir.display()), result);
    }

    if let Some(id) = &plan.profile_id {
        for profile in profile_paths() {
            let result = match strip_block(&profile, id) {
                Ok(0) => RemovalResult::NotFound,
                Ok(_) => RemovalResult::Removed,
                Err(err) => RemovalResult::Failed(err.to_string()),
            };
            summary.record(format!("{tag} '{id}' block in {}", profile.display()), result);
        }
    }

    for dotfile in &plan.dotfiles {
        let result = remove_path(host, &step, dotfile, &Privilege::User);
        summary.record(format!("{tag} {}", dotfile.display()), result);
    }
}

/// Tears down every service in `services`. Never fails.
pub fn teardown(host: &Host, services: &[ManagedService]) -> TeardownSummary {
    eprintln!("{}", "==============================================================================".bright_blue());
    log_info!("[Teardown] Removing {} service(s)", services.len());

    let mut summary = TeardownSummary::default();
    for service in services {
        teardown_service(host, service, &mut summary);
    }
    log_debug!(
        "[Teardown] Finished with {} removal(s) and {} warning(s)",
        summary.removed.len(),
        summary.warning_count()
    );
    summary
}
