// This file contains the logic for the `setup-devstack teardown` command.
// Teardown is best effort: it never fails once confirmed, it only reports.

use crate::cli::type_enums::{ServiceKind, selected};
use crate::commands::{confirm, load_stack};
use crate::installers;
use crate::libs::errors::Result;
use crate::libs::executor::SystemRunner;
use crate::libs::host::Host;
use crate::libs::teardown::teardown;
use crate::{log_info, log_warn};

pub fn run(config: Option<String>, only: Option<ServiceKind>, yes: bool) -> Result<()> {
    let stack = load_stack(config.as_deref())?;
    let services = installers::descriptors(&selected(only), &stack);

    let names: Vec<String> = services.iter().map(|s| s.kind.to_string()).collect();
    let prompt = format!(
        "Remove {} including data, configuration and logs?",
        names.join(", ")
    );
    if !confirm(&prompt, yes)? {
        log_info!("[Teardown] Nothing removed");
        return Ok(());
    }

    let runner = SystemRunner;
    let host = Host::new(&runner, stack.general.command_timeout);
    let summary = teardown(&host, &services);
    summary.display();
    if summary.warning_count() > 0 {
        log_warn!(
            "[Teardown] Completed with {} warning(s)",
            summary.warning_count()
        );
    } else {
        log_info!("[Teardown] Completed");
    }
    Ok(())
}
