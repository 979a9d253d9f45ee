// Post-install smoke tests and the manual-verification report.
//
// The smoke tests re-run every service's Verified probes against the live host. Unlike
// provisioning they do not stop at the first failure: every service is checked, the
// results are tabulated, and the first failure becomes the run's error afterwards.
//
// The manual report is documentation only: the commands an operator can paste to
// check each service by hand.

use colored::Colorize;
use prettytable::{format, Cell, Row, Table};

use crate::cli::type_enums::ServiceKind;
use crate::installers::nginx;
use crate::libs::errors::{ProvisionError, Result};
use crate::libs::service_installer::Provisioner;
use crate::schemas::managed_service::ManagedService;
use crate::schemas::settings::StackSettings;
use crate::{log_error, log_info, log_warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmokeStatus {
    Passed,
    /// Passed, with security warnings.
    Warned(Vec<String>),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokeRow {
    pub kind: ServiceKind,
    pub status: SmokeStatus,
}

#[derive(Debug, Default)]
pub struct SmokeReport {
    pub rows: Vec<SmokeRow>,
    first_error: Option<ProvisionError>,
}

impl SmokeReport {
    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_BOX_CHARS);
        table.set_titles(Row::new(vec![
            Cell::new("Service").style_spec("bFc"),
            Cell::new("Result").style_spec("bFc"),
            Cell::new("Details").style_spec("bFc"),
        ]));
        for row in &self.rows {
            let (result, style, details) = match &row.status {
                SmokeStatus::Passed => ("passed", "Fg", String::new()),
                SmokeStatus::Warned(warnings) => ("warning", "Fy", warnings.join("\n")),
                SmokeStatus::Failed(reason) => ("FAILED", "Fr", reason.clone()),
            };
            table.add_row(Row::new(vec![
                Cell::new(&row.kind.to_string()),
                Cell::new(result).style_spec(style),
                Cell::new(&details),
            ]));
        }
        table
    }

    /// Every security warning raised across services.
    pub fn warnings(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| match &row.status {
                SmokeStatus::Warned(w) => Some(w.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// `Err` with the first failure, if any service failed.
    pub fn into_result(self) -> Result<Vec<String>> {
        let warnings = self.warnings();
        match self.first_error {
            Some(err) => Err(err),
            None => Ok(warnings),
        }
    }
}

/// Re-runs the Verified probes of every service in `services`.
pub fn smoke_test(provisioner: &Provisioner, services: &[ManagedService]) -> SmokeReport {
    log_info!("[Report] Running smoke tests for {} service(s)", services.len());
    let mut report = SmokeReport::default();

    for service in services {
        let status = match provisioner.verify(service) {
            Ok(warnings) if warnings.is_empty() => SmokeStatus::Passed,
            Ok(warnings) => SmokeStatus::Warned(warnings),
            Err(err) => {
                log_error!("{} Smoke test failed: {}", service.tag(), err);
                let reason = err.to_string();
                report.first_error.get_or_insert(err);
                SmokeStatus::Failed(reason)
            }
        };
        report.rows.push(SmokeRow {
            kind: service.kind,
            status,
        });
    }
    report
}

/// A command an operator can run by hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualCheck {
    pub kind: ServiceKind,
    pub purpose: &'static str,
    pub command: String,
}

pub fn manual_checks(stack: &StackSettings) -> Vec<ManualCheck> {
    let db = &stack.database;
    let cache = &stack.cache;
    let nvm_dir = stack.package_manager.install_dir.display();
    vec![
        ManualCheck {
            kind: ServiceKind::Postgres,
            purpose: "authenticated query over TCP",
            command: format!(
                "psql -h 127.0.0.1 -p {} -U {} -d {} -c 'SELECT 1'",
                db.port, db.user, db.name
            ),
        },
        ManualCheck {
            kind: ServiceKind::Redis,
            purpose: "authenticated ping",
            command: format!("redis-cli -p {} -a {} ping", cache.port, cache.password),
        },
        ManualCheck {
            kind: ServiceKind::Nginx,
            purpose: "placeholder page",
            command: format!("curl {}", nginx::probe_url(stack.webserver.port)),
        },
        ManualCheck {
            kind: ServiceKind::Pyenv,
            purpose: "python-environment manager",
            command: format!("{}/bin/pyenv --version", stack.python_env.install_dir.display()),
        },
        ManualCheck {
            kind: ServiceKind::Nvm,
            purpose: "pinned Node.js runtime",
            command: format!("source {nvm_dir}/nvm.sh && node --version"),
        },
    ]
}

pub fn manual_table(checks: &[ManualCheck]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    table.set_titles(Row::new(vec![
        Cell::new("Service").style_spec("bFc"),
        Cell::new("Checks").style_spec("bFc"),
        Cell::new("Command").style_spec("bFc"),
    ]));
    for check in checks {
        table.add_row(Row::new(vec![
            Cell::new(&check.kind.to_string()),
            Cell::new(check.purpose),
            Cell::new(&check.command).style_spec("Fy"),
        ]));
    }
    table
}

/// Prints the manual verification commands.
pub fn print_manual_report(stack: &StackSettings) {
    println!("\n{}", "Manual verification commands".bright_yellow().bold());
    manual_table(&manual_checks(stack)).printstd();
    log_warn!(
        "[Report] The commands above contain credentials; {} them from your shell history afterwards",
        "clear".bold()
    );
}
