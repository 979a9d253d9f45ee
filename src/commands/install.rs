// This file contains the logic for the `setup-devstack install` command.
// It tears down previous installations (unless told not to), then drives every selected
// service through the install state machine, re-runs all probes once everything is up,
// and finally prints the manual verification commands.

use std::time::Duration;

use colored::Colorize;

use crate::cli::type_enums::{ServiceKind, selected};
use crate::commands::{confirm, load_stack};
use crate::installers;
use crate::libs::errors::{ProvisionError, Result};
use crate::libs::executor::SystemRunner;
use crate::libs::host::Host;
use crate::libs::http_probe::UreqClient;
use crate::libs::readiness::Backoff;
use crate::libs::report;
use crate::libs::service_installer::Provisioner;
use crate::libs::teardown::teardown;
use crate::{log_debug, log_info, log_warn};

/// Timeout of a single HTTP probe request.
pub(crate) const HTTP_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub fn run(config: Option<String>, skip_teardown: bool, only: Option<ServiceKind>, yes: bool) -> Result<()> {
    log_debug!("Entered install::run() function.");
    let stack = load_stack(config.as_deref())?;
    let services = installers::descriptors(&selected(only), &stack);

    let runner = SystemRunner;
    let host = Host::new(&runner, stack.general.command_timeout);

    if skip_teardown {
        log_info!("[Install] Skipping teardown; existing installations are reconciled in place");
    } else {
        let names: Vec<String> = services.iter().map(|s| s.kind.to_string()).collect();
        let prompt = format!(
            "Remove existing installations of {} (data included) before installing?",
            names.join(", ")
        );
        if !confirm(&prompt, yes)? {
            return Err(ProvisionError::Input(
                "teardown declined; re-run with --skip-teardown to keep existing installations".into(),
            ));
        }
        teardown(&host, &services).display();
    }

    let http = UreqClient::new(HTTP_PROBE_TIMEOUT);
    let provisioner = Provisioner::new(&host, &http, Backoff::with_timeout(stack.general.service_timeout));
    let mut changed = 0;
    for service in &services {
        if provisioner.provision(service)?.changed {
            changed += 1;
        }
    }
    log_info!(
        "[Install] {} service(s) verified, {} needed changes",
        services.len().to_string().green(),
        changed
    );

    // Later services restart shared pieces of the host; check everything again end to end.
    let smoke = report::smoke_test(&provisioner, &services);
    smoke.table().printstd();
    let warnings = smoke.into_result()?;
    for warning in &warnings {
        log_warn!("[Install] Security warning: {}", warning);
    }

    report::print_manual_report(&stack);
    log_info!("'setup-devstack install' command completed!!");
    Ok(())
}
