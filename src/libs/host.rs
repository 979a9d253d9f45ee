// This module is the provisioner's view of the machine it is configuring.
//
// `Host` groups the three external systems the orchestrator mutates (the package
// manager, the service manager and the filesystem) behind small typed methods. Every
// method goes through the `Executor`, so the whole orchestrator core runs unchanged
// against the `FakeRunner` in tests. Filesystem calls with `Privilege::User` use
// `std::fs` directly; anything privileged goes through `sudo` commands.

use std::cell::Cell;
use std::fs;
use std::path::Path;
use std::time::Duration;

use colored::Colorize;

use crate::libs::errors::{ProvisionError, Result};
use crate::libs::executor::{
    CommandOutput, CommandRunner, CommandSpec, Executor, Outcome, Privilege, accept_codes, best_effort,
};
use crate::{log_debug, log_info};

/// `systemctl` exit status for a unit that is not loaded.
const UNIT_NOT_LOADED: i32 = 5;

pub struct Host<'a> {
    exec: Executor<'a>,
    apt_refreshed: Cell<bool>,
}

impl<'a> Host<'a> {
    pub fn new(runner: &'a dyn CommandRunner, command_timeout: Duration) -> Self {
        Host {
            exec: Executor::new(runner, command_timeout),
            apt_refreshed: Cell::new(false),
        }
    }

    pub fn exec(&self) -> &Executor<'a> {
        &self.exec
    }

    // ========================================================================
    //                          PACKAGE MANAGER (apt)
    // ========================================================================

    /// `true` when dpkg reports the package as fully installed.
    pub fn package_installed(&self, step: &str, package: &str) -> bool {
        let spec = CommandSpec::new("dpkg-query").args(["-W", "-f=${Status}", package]);
        self.exec
            .capture(step, &spec)
            .map(|out| out.success() && out.stdout.contains("install ok installed"))
            .unwrap_or(false)
    }

    /// Installs packages non-interactively, refreshing the package index once per run.
    pub fn install_packages(&self, step: &str, packages: &[String]) -> Result<()> {
        if packages.is_empty() {
            return Ok(());
        }
        if !self.apt_refreshed.get() {
            self.exec
                .run_strict(step, &apt(["update"]))?;
            self.apt_refreshed.set(true);
        }
        log_info!("{} Installing packages: {}", step, packages.join(" ").cyan());
        self.exec.run_strict(
            step,
            &apt(["install", "-y", "--no-install-recommends"]).args(packages.iter().cloned()),
        )?;
        Ok(())
    }

    /// Purges packages and their configuration. Never fatal.
    pub fn purge_packages(&self, step: &str, packages: &[String]) -> Result<Outcome> {
        let outcome = self.exec.run(
            step,
            &apt(["purge", "-y"]).args(packages.iter().cloned()),
            &best_effort,
        )?;
        self.exec
            .run(step, &apt(["autoremove", "-y"]), &best_effort)?;
        Ok(outcome)
    }

    // ========================================================================
    //                         SERVICE MANAGER (systemd)
    // ========================================================================

    /// Runs `systemctl <action> <unit>`; a failure carries the unit's recent journal.
    pub fn manage_unit(&self, step: &str, action: &str, unit: &str) -> Result<()> {
        let spec = CommandSpec::new("systemctl").args([action, unit]).root();
        match self.exec.run_strict(step, &spec) {
            Ok(_) => Ok(()),
            Err(err) => Err(self.attach_unit_logs(err, unit)),
        }
    }

    /// Stops a unit during teardown. A unit that is not loaded (exit 5) is only a warning.
    pub fn stop_unit(&self, step: &str, unit: &str) -> Result<Outcome> {
        let spec = CommandSpec::new("systemctl").args(["stop", unit]).root();
        self.exec.run(step, &spec, &accept_codes(&[UNIT_NOT_LOADED]))
    }

    pub fn unit_active(&self, step: &str, unit: &str) -> Result<bool> {
        let spec = CommandSpec::new("systemctl").args(["is-active", unit]);
        let out = self.exec.capture(step, &spec)?;
        Ok(out.stdout.trim() == "active")
    }

    /// Recent journal lines of `unit`, when they can be fetched at all.
    pub fn unit_logs(&self, unit: &str) -> Option<String> {
        let spec = CommandSpec::new("journalctl")
            .args(["-u", unit, "-n", "50", "--no-pager"])
            .root();
        self.exec
            .capture("[Diagnostics]", &spec)
            .ok()
            .filter(CommandOutput::success)
            .map(|out| out.stdout)
    }

    /// Adds the unit's journal to an external tool error before it aborts the run.
    pub fn attach_unit_logs(&self, err: ProvisionError, unit: &str) -> ProvisionError {
        match err {
            ProvisionError::ExternalTool {
                step,
                command,
                status,
                stdout,
                stderr,
                logs: None,
            } => ProvisionError::ExternalTool {
                step,
                command,
                status,
                stdout,
                stderr,
                logs: self.unit_logs(unit),
            },
            other => other,
        }
    }

    // ========================================================================
    //                               FILESYSTEM
    // ========================================================================

    pub fn path_exists(&self, step: &str, path: &Path, privilege: &Privilege) -> bool {
        match privilege {
            Privilege::User => path.exists(),
            _ => self.exec.succeeds(
                step,
                &CommandSpec::new("test")
                    .arg("-e")
                    .arg(path.display().to_string())
                    .with_privilege(privilege.clone()),
            ),
        }
    }

    pub fn read_file(&self, step: &str, path: &Path, privilege: &Privilege) -> Result<String> {
        match privilege {
            Privilege::User => fs::read_to_string(path)
                .map_err(|e| ProvisionError::io(format!("{step} reading {}", path.display()), e)),
            _ => self
                .exec
                .run_strict(
                    step,
                    &CommandSpec::new("cat")
                        .arg(path.display().to_string())
                        .with_privilege(privilege.clone()),
                )
                .map(|out| out.stdout),
        }
    }

    pub fn write_file(&self, step: &str, path: &Path, content: &str, privilege: &Privilege) -> Result<()> {
        log_debug!("{} Writing {}", step, path.display());
        match privilege {
            Privilege::User => fs::write(path, content)
                .map_err(|e| ProvisionError::io(format!("{step} writing {}", path.display()), e)),
            _ => self
                .exec
                .run_strict(
                    step,
                    &CommandSpec::new("tee")
                        .arg(path.display().to_string())
                        .stdin(content)
                        .with_privilege(privilege.clone()),
                )
                .map(|_| ()),
        }
    }

    pub fn copy_file(&self, step: &str, from: &Path, to: &Path, privilege: &Privilege) -> Result<()> {
        match privilege {
            Privilege::User => fs::copy(from, to).map(|_| ()).map_err(|e| {
                ProvisionError::io(format!("{step} copying {} to {}", from.display(), to.display()), e)
            }),
            _ => self
                .exec
                .run_strict(
                    step,
                    &CommandSpec::new("cp")
                        .args(["-p", &from.display().to_string(), &to.display().to_string()])
                        .with_privilege(privilege.clone()),
                )
                .map(|_| ()),
        }
    }

    pub fn create_dir_all(&self, step: &str, path: &Path, privilege: &Privilege) -> Result<()> {
        match privilege {
            Privilege::User => fs::create_dir_all(path)
                .map_err(|e| ProvisionError::io(format!("{step} creating {}", path.display()), e)),
            _ => self
                .exec
                .run_strict(
                    step,
                    &CommandSpec::new("mkdir")
                        .args(["-p", &path.display().to_string()])
                        .with_privilege(privilege.clone()),
                )
                .map(|_| ()),
        }
    }

    /// Points `link` at `target`, replacing whatever link was there.
    pub fn symlink(&self, step: &str, target: &Path, link: &Path, privilege: &Privilege) -> Result<()> {
        match privilege {
            Privilege::User => {
                if fs::symlink_metadata(link).is_ok() {
                    fs::remove_file(link).map_err(|e| {
                        ProvisionError::io(format!("{step} replacing {}", link.display()), e)
                    })?;
                }
                std::os::unix::fs::symlink(target, link)
                    .map_err(|e| ProvisionError::io(format!("{step} linking {}", link.display()), e))
            }
            _ => self
                .exec
                .run_strict(
                    step,
                    &CommandSpec::new("ln")
                        .args(["-sfn", &target.display().to_string(), &link.display().to_string()])
                        .with_privilege(privilege.clone()),
                )
                .map(|_| ()),
        }
    }

    /// Removes a file or directory tree.
    ///
    /// # Returns
    /// * `Ok(true)` when something was removed, `Ok(false)` when nothing was there.
    pub fn remove_path(&self, step: &str, path: &Path, privilege: &Privilege) -> Result<bool> {
        if !self.path_exists(step, path, privilege) && fs::symlink_metadata(path).is_err() {
            return Ok(false);
        }
        match privilege {
            Privilege::User => {
                let meta = fs::symlink_metadata(path)
                    .map_err(|e| ProvisionError::io(format!("{step} inspecting {}", path.display()), e))?;
                let removed = if meta.is_dir() {
                    fs::remove_dir_all(path)
                } else {
                    fs::remove_file(path)
                };
                removed
                    .map(|_| true)
                    .map_err(|e| ProvisionError::io(format!("{step} removing {}", path.display()), e))
            }
            _ => self
                .exec
                .run_strict(
                    step,
                    &CommandSpec::new("rm")
                        .args(["-rf", &path.display().to_string()])
                        .with_privilege(privilege.clone()),
                )
                .map(|_| true),
        }
    }
}

fn apt<const N: usize>(args: [&str; N]) -> CommandSpec {
    CommandSpec::new("apt-get")
        .args(args)
        .env("DEBIAN_FRONTEND", "noninteractive")
        .root()
}
