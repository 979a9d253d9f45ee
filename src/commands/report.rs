// This file contains the logic for the `setup-devstack report` command.

use crate::commands::load_stack;
use crate::libs::errors::Result;
use crate::libs::report::print_manual_report;

pub fn run(config: Option<String>) -> Result<()> {
    let stack = load_stack(config.as_deref())?;
    print_manual_report(&stack);
    Ok(())
}
