// This file contains the logic for the `setup-devstack verify` command:
// every service's probes, run against the live host without changing anything.

use crate::cli::type_enums::ServiceKind;
use crate::commands::install::HTTP_PROBE_TIMEOUT;
use crate::commands::load_stack;
use crate::installers;
use crate::libs::errors::Result;
use crate::libs::executor::SystemRunner;
use crate::libs::host::Host;
use crate::libs::http_probe::UreqClient;
use crate::libs::readiness::Backoff;
use crate::libs::report;
use crate::libs::service_installer::Provisioner;
use crate::{log_info, log_warn};

pub fn run(config: Option<String>) -> Result<()> {
    let stack = load_stack(config.as_deref())?;
    let services = installers::descriptors(&ServiceKind::ALL, &stack);

    let runner = SystemRunner;
    let host = Host::new(&runner, stack.general.command_timeout);
    let http = UreqClient::new(HTTP_PROBE_TIMEOUT);
    let provisioner = Provisioner::new(&host, &http, Backoff::with_timeout(stack.general.service_timeout));

    let smoke = report::smoke_test(&provisioner, &services);
    smoke.table().printstd();
    for warning in smoke.into_result()? {
        log_warn!("[Verify] Security warning: {}", warning);
    }
    log_info!("[Verify] All services passed");
    Ok(())
}
