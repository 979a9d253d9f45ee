// This module is the per-service provisioning state machine.
//
// Every managed service (database engine, cache, web server, pyenv, nvm) is driven
// through the same linear sequence of states:
//
//     NotInstalled -> Installed -> Configured -> Enabled -> Running -> Verified
//
// Each transition is idempotent: it first checks whether the host already satisfies it
// and only mutates what is missing. Any failed transition aborts the whole run with a
// `ProvisionError` naming the service and the state it was trying to reach; the last
// state actually reached is logged alongside it.
//
// The only thing that varies between services is the `ManagedService` descriptor
// built in `installers/`; this module never matches on the service kind.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use colored::Colorize;
use walkdir::WalkDir;

use crate::libs::config_patch::patch_file;
use crate::libs::database;
use crate::libs::errors::{ProvisionError, Result};
use crate::libs::executor::{CommandSpec, Privilege};
use crate::libs::host::Host;
use crate::libs::http_probe::HttpClient;
use crate::libs::readiness::{Backoff, wait_until};
use crate::libs::shell_profile::{apply_block, profile_paths};
use crate::libs::utilities::platform::non_loopback_addresses;
use crate::schemas::managed_service::{
    ConfigLocator, Configuration, InstallCheck, ManagedService, Probe, Verification,
};
use crate::{log_debug, log_error, log_info, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ServiceState {
    NotInstalled,
    Installed,
    Configured,
    Enabled,
    Running,
    Verified,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceState::NotInstalled => "NotInstalled",
            ServiceState::Installed => "Installed",
            ServiceState::Configured => "Configured",
            ServiceState::Enabled => "Enabled",
            ServiceState::Running => "Running",
            ServiceState::Verified => "Verified",
        };
        f.write_str(name)
    }
}

/// What one service's provisioning run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceReport {
    pub state: ServiceState,
    /// `true` when at least one transition had to mutate the host.
    pub changed: bool,
    /// Security warnings raised during verification. Never fatal.
    pub warnings: Vec<String>,
}

/// Capabilities the state machine needs from the outside world.
pub struct Provisioner<'a> {
    pub host: &'a Host<'a>,
    pub http: &'a dyn HttpClient,
    pub readiness: Backoff,
}

impl<'a> Provisioner<'a> {
    pub fn new(host: &'a Host<'a>, http: &'a dyn HttpClient, readiness: Backoff) -> Self {
        Provisioner { host, http, readiness }
    }

    /// Drives `service` from whatever state the host is in to `Verified`.
    pub fn provision(&self, service: &ManagedService) -> Result<ServiceReport> {
        eprintln!("{}", "==============================================================================".bright_blue());
        log_info!("{} Provisioning", service.tag().bold());

        let mut report = ServiceReport {
            state: ServiceState::NotInstalled,
            changed: false,
            warnings: vec![],
        };
        if let Err(err) = self.advance(service, &mut report) {
            log_error!(
                "{} Stopped after reaching state {}",
                service.tag(),
                report.state.to_string().red().bold()
            );
            return Err(err);
        }

        log_info!(
            "{} Reached state {}",
            service.tag(),
            report.state.to_string().green().bold()
        );
        Ok(report)
    }

    /// Walks the transitions in order, recording each state in `report` once reached.
    fn advance(&self, service: &ManagedService, report: &mut ServiceReport) -> Result<()> {
        report.changed |= self.ensure_installed(service)?;
        report.state = ServiceState::Installed;
        report.changed |= self.ensure_configured(service)?;
        report.state = ServiceState::Configured;
        report.changed |= self.ensure_enabled(service)?;
        report.state = ServiceState::Enabled;
        self.ensure_running(service)?;
        report.state = ServiceState::Running;
        report.warnings = self.verify(service)?;
        report.state = ServiceState::Verified;
        Ok(())
    }

    // ========================================================================
    //                              Installed
    // ========================================================================

    fn install_satisfied(&self, service: &ManagedService, step: &str) -> bool {
        match &service.install.check {
            InstallCheck::Packages(packages) => packages
                .iter()
                .all(|pkg| self.host.package_installed(step, pkg)),
            InstallCheck::PathExists(path) => self.host.path_exists(step, path, &Privilege::User),
        }
    }

    /// # Returns
    /// * `Ok(true)` when the install action ran, `Ok(false)` when it was already satisfied.
    fn ensure_installed(&self, service: &ManagedService) -> Result<bool> {
        let step = service.step("Installed");
        if self.install_satisfied(service, &step) {
            log_info!("{} Already installed, skipping", step);
            return Ok(false);
        }

        log_info!("{} Not installed yet", step);
        self.host.install_packages(&step, &service.install.packages)?;
        for command in &service.install.commands {
            log_info!("{} Running installer: {}", step, command.display().cyan());
            self.host.exec().run_strict(&step, command)?;
        }

        if !self.install_satisfied(service, &step) {
            return Err(ProvisionError::verification(
                step,
                "the install action finished but the install check still fails",
            ));
        }
        Ok(true)
    }

    // ========================================================================
    //                              Configured
    // ========================================================================

    fn locate(&self, step: &str, locator: &ConfigLocator, privilege: &Privilege) -> Result<PathBuf> {
        match locator {
            ConfigLocator::Fixed(path) => {
                if self.host.path_exists(step, path, privilege) {
                    Ok(path.clone())
                } else {
                    Err(missing_config(step, &path.display().to_string()))
                }
            }
            ConfigLocator::Search { root, file_name } => find_below(root, file_name)
                .ok_or_else(|| missing_config(step, &format!("{} below {}", file_name, root.display()))),
        }
    }

    fn ensure_configured(&self, service: &ManagedService) -> Result<bool> {
        let step = service.step("Configured");
        let config: &Configuration = &service.config;
        let mut changed = false;

        for (dir, privilege) in &config.directories {
            if !self.host.path_exists(&step, dir, privilege) {
                self.host.create_dir_all(&step, dir, privilege)?;
                log_info!("{} Created directory {}", step, dir.display());
                changed = true;
            }
        }

        for target in &config.patches {
            let path = self.locate(&step, &target.locate, &target.privilege)?;
            log_debug!("{} Using configuration file {}", step, path.display());
            changed |= patch_file(self.host, &step, &path, &target.rules, &target.privilege)?;
        }

        for file in &config.files {
            let current = if self.host.path_exists(&step, &file.path, &file.privilege) {
                Some(self.host.read_file(&step, &file.path, &file.privilege)?)
            } else {
                None
            };
            if current.as_deref() != Some(file.content.as_str()) {
                self.host
                    .write_file(&step, &file.path, &file.content, &file.privilege)?;
                log_info!("{} Wrote {}", step, file.path.display().to_string().cyan());
                changed = true;
            }
        }

        for (path, privilege) in &config.absent {
            if self.host.remove_path(&step, path, privilege)? {
                log_info!("{} Removed {}", step, path.display());
                changed = true;
            }
        }

        for link in &config.links {
            self.host
                .symlink(&step, &link.target, &link.link, &link.privilege)?;
            log_debug!("{} Linked {} -> {}", step, link.link.display(), link.target.display());
        }

        if let Some(stanza) = &config.profile {
            for profile in profile_paths() {
                let written = apply_block(&profile, &stanza.id, &stanza.body).map_err(|e| {
                    ProvisionError::io(format!("{step} updating {}", profile.display()), e)
                })?;
                if written {
                    log_info!("{} Updated '{}' block in {}", step, stanza.id, profile.display());
                    changed = true;
                }
            }
        }

        if !changed {
            log_info!("{} Configuration already up to date", step);
        }
        Ok(changed)
    }

    // ========================================================================
    //                           Enabled / Running
    // ========================================================================

    fn ensure_enabled(&self, service: &ManagedService) -> Result<bool> {
        let step = service.step("Enabled");
        let Some(unit) = &service.unit else {
            log_debug!("{} No service unit; nothing to enable", step);
            return Ok(false);
        };
        self.host.manage_unit(&step, "enable", unit)?;
        log_info!("{} Unit {} enabled at boot", step, unit.cyan());
        Ok(false)
    }

    fn ensure_running(&self, service: &ManagedService) -> Result<()> {
        let step = service.step("Running");

        if let Some(unit) = &service.unit {
            self.host.manage_unit(&step, "restart", unit)?;
            let waited = wait_until(&step, unit, self.readiness, || self.host.unit_active(&step, unit));
            if let Err(err) = waited {
                if let Some(logs) = self.host.unit_logs(unit) {
                    log_error!("{} Recent logs of {}:\n{}", step, unit, logs.trim_end());
                }
                return Err(err);
            }
            log_info!("{} Unit {} is active", step, unit.green());
        }

        if let Some(plan) = &service.bootstrap {
            database::bootstrap(self.host.exec(), &step, plan).map_err(|err| match &service.unit {
                Some(unit) => self.host.attach_unit_logs(err, unit),
                None => err,
            })?;
        }

        for command in &service.post_start {
            log_info!("{} Running: {}", step, command.display().cyan());
            self.host.exec().run_strict(&step, command)?;
        }
        Ok(())
    }

    // ========================================================================
    //                              Verified
    // ========================================================================

    fn run_probe(&self, step: &str, probe: &Probe) -> Result<()> {
        let check = format!("{step} {}", probe.name());
        match probe {
            Probe::Command { spec, expect, .. } => {
                let out = self.host.exec().capture(step, spec)?;
                if !out.success() {
                    let reason = out.stderr.trim();
                    return Err(ProvisionError::verification(
                        check,
                        format!("`{}` exited with {:?}: {}", spec.display(), out.status, reason),
                    ));
                }
                if !out.stdout.contains(expect.as_str()) {
                    return Err(ProvisionError::verification(
                        check,
                        format!("expected '{}' in output, got '{}'", expect, out.stdout.trim()),
                    ));
                }
            }
            Probe::Http { url, expect_body } => {
                let response = self
                    .http
                    .get(url)
                    .map_err(|reason| ProvisionError::verification(check.clone(), format!("GET {url}: {reason}")))?;
                if !response.is_success() {
                    return Err(ProvisionError::verification(
                        check,
                        format!("GET {url} answered with HTTP status {}", response.status),
                    ));
                }
                if !response.body.contains(expect_body.as_str()) {
                    return Err(ProvisionError::verification(
                        check,
                        format!("GET {url} did not return the expected content '{expect_body}'"),
                    ));
                }
            }
        }
        log_debug!("{} Probe '{}' passed", step, probe.name());
        Ok(())
    }

    /// Fetches the port over every non-loopback address of the host. Any HTTP answer,
    /// error statuses included, means the service is reachable from outside, which is
    /// reported but never fatal.
    fn loopback_warnings(&self, step: &str, port: u16) -> Vec<String> {
        let spec = CommandSpec::new("hostname").arg("-I");
        let addresses = match self.host.exec().capture(step, &spec) {
            Ok(out) if out.success() => non_loopback_addresses(&out.stdout),
            _ => {
                log_debug!("{} Could not list host addresses; skipping exposure check", step);
                return vec![];
            }
        };

        addresses
            .into_iter()
            .filter_map(|addr| {
                let url = format!("http://{}/", std::net::SocketAddr::new(addr, port));
                match self.http.get(&url) {
                    Ok(response) => {
                        log_debug!("{} {} answered with HTTP status {}", step, url, response.status);
                        let warning = format!("port {port} answers on non-loopback address {addr}");
                        log_warn!("{} SecurityWarning: {}", step, warning.yellow());
                        Some(warning)
                    }
                    Err(reason) => {
                        log_debug!("{} {} not reachable ({}), as expected", step, url, reason);
                        None
                    }
                }
            })
            .collect()
    }

    /// Runs every probe of the service. Used both at the end of provisioning and by the
    /// standalone smoke tests.
    ///
    /// # Returns
    /// * the security warnings raised; a failing probe is a fatal `Verification` error.
    pub fn verify(&self, service: &ManagedService) -> Result<Vec<String>> {
        let step = service.step("Verified");
        let Verification {
            probes,
            loopback_only_port,
        } = &service.verify;

        for probe in probes {
            self.run_probe(&step, probe)?;
        }
        let warnings = match loopback_only_port {
            Some(port) => self.loopback_warnings(&step, *port),
            None => vec![],
        };
        log_info!("{} {} probe(s) passed", step, probes.len());
        Ok(warnings)
    }
}

/// First regular file named `file_name` below `root`, in sorted traversal order.
fn find_below(root: &Path, file_name: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .find(|entry| entry.file_type().is_file() && entry.file_name() == file_name)
        .map(|entry| entry.into_path())
}

fn missing_config(step: &str, what: &str) -> ProvisionError {
    ProvisionError::io(
        format!("{step} locating configuration file"),
        io::Error::new(io::ErrorKind::NotFound, format!("{what} does not exist")),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::type_enums::ServiceKind;
    use crate::libs::config_patch::{DirectiveStyle, PatchRule};
    use crate::libs::database::{BootstrapPolicy, DatabaseBootstrap};
    use crate::libs::http_probe::fake::FakeHttp;
    use crate::libs::testing::FakeRunner;
    use crate::schemas::managed_service::{
        ConfigTarget, InstallPlan, OwnedFile, TeardownPlan,
    };
    use std::fs;
    use std::time::Duration;

    fn fast() -> Backoff {
        Backoff {
            initial: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            timeout: Duration::from_millis(30),
        }
    }

    fn cache_service(conf: &Path) -> ManagedService {
        ManagedService {
            kind: ServiceKind::Redis,
            install: InstallPlan {
                check: InstallCheck::Packages(vec!["redis-server".into()]),
                packages: vec!["redis-server".into()],
                commands: vec![],
            },
            config: Configuration {
                patches: vec![ConfigTarget {
                    locate: ConfigLocator::Fixed(conf.to_path_buf()),
                    rules: vec![
                        PatchRule::directive("bind", "127.0.0.1 -::1", DirectiveStyle::Space),
                        PatchRule::directive("port", "6380", DirectiveStyle::Space),
                    ],
                    privilege: Privilege::User,
                }],
                ..Configuration::default()
            },
            unit: Some("redis-server".into()),
            post_start: vec![],
            bootstrap: None,
            verify: Verification {
                probes: vec![Probe::Command {
                    name: "ping".into(),
                    spec: CommandSpec::new("redis-cli").args(["-p", "6380", "ping"]),
                    expect: "PONG".into(),
                }],
                loopback_only_port: None,
            },
            teardown: TeardownPlan::default(),
        }
    }

    fn installed_and_healthy() -> FakeRunner {
        FakeRunner::new()
            .on("dpkg-query", 0, "install ok installed", "")
            .on("systemctl is-active", 0, "active\n", "")
            .on("redis-cli", 0, "PONG\n", "")
    }

    #[test]
    fn fresh_host_walks_every_state() {
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("redis.conf");
        fs::write(&conf, "bind 0.0.0.0\nport 6379\n").unwrap();

        let fake = FakeRunner::new()
            .on_sequence("dpkg-query", &[(1, ""), (0, "install ok installed")])
            .on_sequence("systemctl is-active", &[(3, "activating\n"), (0, "active\n")])
            .on("redis-cli", 0, "PONG\n", "");
        let host = Host::new(&fake, Duration::from_secs(5));
        let http = FakeHttp::new();
        let report = Provisioner::new(&host, &http, fast())
            .provision(&cache_service(&conf))
            .unwrap();

        assert_eq!(report.state, ServiceState::Verified);
        assert!(report.changed);
        assert!(fake.called("apt-get install -y --no-install-recommends redis-server"));
        let install = fake.position("apt-get install").unwrap();
        let enable = fake.position("systemctl enable redis-server").unwrap();
        let restart = fake.position("systemctl restart redis-server").unwrap();
        assert!(install < enable && enable < restart);
        assert_eq!(fs::read_to_string(&conf).unwrap(), "bind 127.0.0.1 -::1\nport 6380\n");
        assert!(dir.path().join("redis.conf.bak").exists());
    }

    #[test]
    fn second_run_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("redis.conf");
        fs::write(&conf, "bind 127.0.0.1 -::1\nport 6380\n").unwrap();

        let fake = installed_and_healthy();
        let host = Host::new(&fake, Duration::from_secs(5));
        let http = FakeHttp::new();
        let report = Provisioner::new(&host, &http, fast())
            .provision(&cache_service(&conf))
            .unwrap();

        assert!(!report.changed);
        assert!(!fake.called("apt-get"));
        assert!(!dir.path().join("redis.conf.bak").exists());
    }

    #[test]
    fn missing_config_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let fake = installed_and_healthy();
        let host = Host::new(&fake, Duration::from_secs(5));
        let http = FakeHttp::new();
        let err = Provisioner::new(&host, &http, fast())
            .provision(&cache_service(&dir.path().join("absent.conf")))
            .unwrap_err();

        assert!(matches!(err, ProvisionError::Io { ref context, .. } if context.contains("[Redis] Configured")));
        assert!(!fake.called("systemctl"));
    }

    #[test]
    fn inactive_unit_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("redis.conf");
        fs::write(&conf, "").unwrap();

        let fake = installed_and_healthy().on("systemctl is-active", 3, "failed\n", "");
        let host = Host::new(&fake, Duration::from_secs(5));
        let http = FakeHttp::new();
        let err = Provisioner::new(&host, &http, fast())
            .provision(&cache_service(&conf))
            .unwrap_err();

        assert!(matches!(err, ProvisionError::Timeout { .. }));
        assert_eq!(err.exit_code(), 4);
        assert!(fake.called("journalctl -u redis-server"));
    }

    #[test]
    fn failed_bootstrap_carries_the_unit_journal() {
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("redis.conf");
        fs::write(&conf, "").unwrap();

        let mut service = cache_service(&conf);
        service.bootstrap = Some(DatabaseBootstrap {
            role: "devadmin".into(),
            password: "db-secret".into(),
            database: "devdb".into(),
            policy: BootstrapPolicy::DropThenCreate,
            grant_createdb: true,
        });
        let fake = installed_and_healthy()
            .on("CREATE ROLE", 1, "", "ERROR:  permission denied")
            .on("journalctl -u redis-server", 0, "FATAL:  could not map shared memory\n", "");
        let host = Host::new(&fake, Duration::from_secs(5));
        let http = FakeHttp::new();
        let err = Provisioner::new(&host, &http, fast()).provision(&service).unwrap_err();

        match &err {
            ProvisionError::ExternalTool { step, logs, .. } => {
                assert_eq!(step, "[Redis] Running");
                assert_eq!(logs.as_deref(), Some("FATAL:  could not map shared memory\n"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.diagnostics().unwrap().contains("--- recent service logs ---"));
        assert!(fake.position("CREATE ROLE").unwrap() < fake.position("journalctl").unwrap());
    }

    #[test]
    fn failures_record_the_last_state_reached() {
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("redis.conf");
        fs::write(&conf, "").unwrap();
        let http = FakeHttp::new();

        let fake = installed_and_healthy().on("redis-cli", 1, "", "Could not connect");
        let host = Host::new(&fake, Duration::from_secs(5));
        let mut report = ServiceReport {
            state: ServiceState::NotInstalled,
            changed: false,
            warnings: vec![],
        };
        let provisioner = Provisioner::new(&host, &http, fast());
        assert!(provisioner.advance(&cache_service(&conf), &mut report).is_err());
        assert_eq!(report.state, ServiceState::Running);

        let fake = installed_and_healthy();
        let host = Host::new(&fake, Duration::from_secs(5));
        let mut report = ServiceReport {
            state: ServiceState::NotInstalled,
            changed: false,
            warnings: vec![],
        };
        let provisioner = Provisioner::new(&host, &http, fast());
        let missing = cache_service(&dir.path().join("absent.conf"));
        assert!(provisioner.advance(&missing, &mut report).is_err());
        assert_eq!(report.state, ServiceState::Installed);
    }

    #[test]
    fn failing_probe_names_the_check() {
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("redis.conf");
        fs::write(&conf, "").unwrap();

        let fake = installed_and_healthy().on("redis-cli", 0, "NOAUTH Authentication required.\n", "");
        let host = Host::new(&fake, Duration::from_secs(5));
        let http = FakeHttp::new();
        let err = Provisioner::new(&host, &http, fast())
            .provision(&cache_service(&conf))
            .unwrap_err();

        match err {
            ProvisionError::Verification { check, detail } => {
                assert_eq!(check, "[Redis] Verified ping");
                assert!(detail.contains("NOAUTH"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn search_locator_walks_below_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("16").join("main");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("postgresql.conf"), "").unwrap();

        assert_eq!(
            find_below(dir.path(), "postgresql.conf"),
            Some(nested.join("postgresql.conf"))
        );
        assert_eq!(find_below(dir.path(), "pg_hba.conf"), None);
    }

    #[test]
    fn owned_files_are_written_only_when_different() {
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("redis.conf");
        fs::write(&conf, "").unwrap();
        let page = dir.path().join("www").join("index.html");

        let mut service = cache_service(&conf);
        service.config.directories = vec![(dir.path().join("www"), Privilege::User)];
        service.config.files = vec![OwnedFile {
            path: page.clone(),
            content: "hello\n".into(),
            privilege: Privilege::User,
        }];

        let fake = installed_and_healthy();
        let host = Host::new(&fake, Duration::from_secs(5));
        let http = FakeHttp::new();
        let provisioner = Provisioner::new(&host, &http, fast());

        assert!(provisioner.provision(&service).unwrap().changed);
        assert_eq!(fs::read_to_string(&page).unwrap(), "hello\n");
        assert!(!provisioner.provision(&service).unwrap().changed);
    }

    #[test]
    fn reachable_public_address_is_a_warning_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("redis.conf");
        fs::write(&conf, "").unwrap();

        let mut service = cache_service(&conf);
        service.verify.probes = vec![Probe::Http {
            url: "http://127.0.0.1:8080/".into(),
            expect_body: "It works".into(),
        }];
        service.verify.loopback_only_port = Some(8080);

        let fake = installed_and_healthy().on("hostname -I", 0, "10.0.0.5 172.17.0.1 ", "");
        let host = Host::new(&fake, Duration::from_secs(5));
        let http = FakeHttp::new()
            .serve("http://127.0.0.1:8080/", "<h1>It works</h1>")
            .serve("http://10.0.0.5:8080/", "<h1>It works</h1>");
        let report = Provisioner::new(&host, &http, fast()).provision(&service).unwrap();

        assert_eq!(report.warnings, vec!["port 8080 answers on non-loopback address 10.0.0.5"]);
        assert!(http.requested.borrow().contains(&"http://172.17.0.1:8080/".to_string()));
    }

    #[test]
    fn error_status_on_a_public_address_still_counts_as_exposed() {
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("redis.conf");
        fs::write(&conf, "").unwrap();

        let mut service = cache_service(&conf);
        service.verify.probes = vec![];
        service.verify.loopback_only_port = Some(8080);

        let fake = installed_and_healthy().on("hostname -I", 0, "10.0.0.5 172.17.0.1", "");
        let host = Host::new(&fake, Duration::from_secs(5));
        let http = FakeHttp::new()
            .respond("http://10.0.0.5:8080/", 404, "")
            .respond("http://172.17.0.1:8080/", 500, "Internal Server Error");
        let warnings = Provisioner::new(&host, &http, fast()).verify(&service).unwrap();

        assert_eq!(
            warnings,
            vec![
                "port 8080 answers on non-loopback address 10.0.0.5",
                "port 8080 answers on non-loopback address 172.17.0.1",
            ]
        );
    }

    #[test]
    fn web_check_requires_a_success_status() {
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("redis.conf");
        fs::write(&conf, "").unwrap();

        let mut service = cache_service(&conf);
        service.verify.probes = vec![Probe::Http {
            url: "http://127.0.0.1:8080/".into(),
            expect_body: "It works".into(),
        }];

        let fake = installed_and_healthy();
        let host = Host::new(&fake, Duration::from_secs(5));
        let http = FakeHttp::new().respond("http://127.0.0.1:8080/", 500, "It works, mostly");
        let err = Provisioner::new(&host, &http, fast()).verify(&service).unwrap_err();

        assert!(matches!(err, ProvisionError::Verification { ref detail, .. } if detail.contains("HTTP status 500")));
    }
}
