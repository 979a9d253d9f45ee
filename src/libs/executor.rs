//! # Command Executor
//!
//! Every external call the provisioner makes (package manager, service manager, database
//! client, installer scripts) goes through [`Executor::run`]. Centralising it here means:
//!
//! - exit statuses are interpreted by an explicit classifier instead of ad hoc `if` checks,
//! - every call is bounded by a timeout, and a timeout is reported as
//!   [`ProvisionError::Timeout`] rather than as a tool failure,
//! - captured stdout/stderr of a fatal command always reaches the operator.
//!
//! The actual process spawning sits behind the [`CommandRunner`] trait so the orchestrator
//! can be driven by a scripted fake in tests without touching the host.

use std::fmt;
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use colored::Colorize;

use crate::libs::errors::{ProvisionError, Result};
use crate::libs::utilities::platform::is_root;
use crate::{log_debug, log_warn};

/// Which identity a command runs as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Privilege {
    /// The invoking user, unchanged.
    User,
    /// Root, via `sudo` unless the process already is root.
    Root,
    /// Another system account, via `sudo -u <name>` (e.g. `postgres`).
    AsUser(String),
}

/// A fully described external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub privilege: Privilege,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
    pub stdin: Option<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
            privilege: Privilege::User,
            env: Vec::new(),
            cwd: None,
            stdin: None,
        }
    }

    /// `bash -c <script>`, for installer pipelines and sourcing environment managers.
    pub fn shell(script: impl Into<String>) -> Self {
        CommandSpec::new("bash").arg("-c").arg(script)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn root(mut self) -> Self {
        self.privilege = Privilege::Root;
        self
    }

    pub fn as_user(mut self, user: impl Into<String>) -> Self {
        self.privilege = Privilege::AsUser(user.into());
        self
    }

    pub fn with_privilege(mut self, privilege: Privilege) -> Self {
        self.privilege = privilege;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn stdin(mut self, payload: impl Into<String>) -> Self {
        self.stdin = Some(payload.into());
        self
    }

    /// The command line as shown to the operator. Environment values are hidden
    /// since they carry secrets like `PGPASSWORD`; arguments are shown verbatim, so
    /// secrets travel through `env` or `stdin`, never through `args`.
    pub fn display(&self) -> String {
        let mut parts: Vec<String> = match &self.privilege {
            Privilege::User => vec![],
            Privilege::Root => vec!["sudo".into()],
            Privilege::AsUser(user) => vec!["sudo".into(), "-u".into(), user.clone()],
        };
        parts.extend(self.env.iter().map(|(k, _)| format!("{k}=***")));
        parts.push(self.program.clone());
        parts.extend(self.args.iter().map(|a| {
            if a.contains(char::is_whitespace) {
                format!("'{a}'")
            } else {
                a.clone()
            }
        }));
        parts.join(" ")
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// What a finished process produced. `status` is `None` when it was killed by a signal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    fn status_text(&self) -> String {
        match self.status {
            Some(code) => format!("exit status {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Why a process could not produce a [`CommandOutput`].
#[derive(Debug)]
pub enum ExecFailure {
    Spawn(std::io::Error),
    TimedOut,
}

/// Capability interface for running external processes.
pub trait CommandRunner {
    fn execute(&self, spec: &CommandSpec, timeout: Duration) -> Result<CommandOutput, ExecFailure>;
}

/// Classification of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Success,
    /// Acceptable for this call site (e.g. "already removed" during teardown).
    Warning(String),
    Fatal,
}

/// The non-fatal result of [`Executor::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(CommandOutput),
    SuccessWithWarning(CommandOutput, String),
}

impl Outcome {
    pub fn into_output(self) -> CommandOutput {
        match self {
            Outcome::Success(out) | Outcome::SuccessWithWarning(out, _) => out,
        }
    }
}

/// Exit status 0 is success, anything else aborts the run.
pub fn strict(out: &CommandOutput) -> Verdict {
    if out.success() { Verdict::Success } else { Verdict::Fatal }
}

/// Never fatal: a non-zero exit is downgraded to a warning carrying stderr.
pub fn best_effort(out: &CommandOutput) -> Verdict {
    if out.success() {
        Verdict::Success
    } else {
        let reason = out.stderr.trim();
        Verdict::Warning(if reason.is_empty() {
            out.status_text()
        } else {
            reason.lines().last().unwrap_or(reason).to_string()
        })
    }
}

/// Success on 0, warning on any of `codes`, fatal otherwise.
pub fn accept_codes(codes: &'static [i32]) -> impl Fn(&CommandOutput) -> Verdict {
    move |out| match out.status {
        Some(0) => Verdict::Success,
        Some(code) if codes.contains(&code) => Verdict::Warning(out.status_text()),
        _ => Verdict::Fatal,
    }
}

/// Runs commands through a [`CommandRunner`] with a fixed per-call timeout.
pub struct Executor<'a> {
    runner: &'a dyn CommandRunner,
    timeout: Duration,
}

impl<'a> Executor<'a> {
    pub fn new(runner: &'a dyn CommandRunner, timeout: Duration) -> Self {
        Executor { runner, timeout }
    }

    /// Runs `spec` and classifies the result.
    ///
    /// # Arguments
    /// * `step`: Human-readable step name used in diagnostics (e.g. `"Redis: Installed"`).
    /// * `spec`: The command.
    /// * `classify`: Maps the finished process to a [`Verdict`].
    ///
    /// # Returns
    /// * `Ok(Outcome)` for `Success` / `Warning`.
    /// * `Err(ProvisionError::ExternalTool)` for `Fatal`, with captured output attached.
    /// * `Err(ProvisionError::Timeout)` when the deadline passed.
    pub fn run(
        &self,
        step: &str,
        spec: &CommandSpec,
        classify: &dyn Fn(&CommandOutput) -> Verdict,
    ) -> Result<Outcome> {
        let output = self.capture(step, spec)?;
        match classify(&output) {
            Verdict::Success => Ok(Outcome::Success(output)),
            Verdict::Warning(reason) => {
                log_warn!(
                    "{} `{}` reported: {}",
                    step,
                    spec.display().yellow(),
                    reason
                );
                Ok(Outcome::SuccessWithWarning(output, reason))
            }
            Verdict::Fatal => Err(ProvisionError::ExternalTool {
                step: step.to_string(),
                command: spec.display(),
                status: output.status_text(),
                stdout: output.stdout,
                stderr: output.stderr,
                logs: None,
            }),
        }
    }

    /// Shorthand for `run(step, spec, &strict)` returning the output.
    pub fn run_strict(&self, step: &str, spec: &CommandSpec) -> Result<CommandOutput> {
        self.run(step, spec, &strict).map(Outcome::into_output)
    }

    /// Runs a query and returns its output whatever the exit status.
    /// Only spawn failures and timeouts are errors.
    pub fn capture(&self, step: &str, spec: &CommandSpec) -> Result<CommandOutput> {
        log_debug!("{} Executing: {}", step, spec.display().cyan());
        match self.runner.execute(spec, self.timeout) {
            Ok(output) => {
                log_debug!("{} `{}` -> {}", step, spec.program, output.status_text());
                Ok(output)
            }
            Err(ExecFailure::TimedOut) => Err(ProvisionError::Timeout {
                step: step.to_string(),
                what: spec.display(),
                after: self.timeout,
            }),
            Err(ExecFailure::Spawn(err)) => Err(ProvisionError::ExternalTool {
                step: step.to_string(),
                command: spec.display(),
                status: format!("could not be started: {err}"),
                stdout: String::new(),
                stderr: String::new(),
                logs: None,
            }),
        }
    }

    /// Predicate query: `true` only when the command ran and exited 0.
    pub fn succeeds(&self, step: &str, spec: &CommandSpec) -> bool {
        match self.capture(step, spec) {
            Ok(output) => output.success(),
            Err(err) => {
                log_debug!("{} Query `{}` unavailable: {}", step, spec.display(), err);
                false
            }
        }
    }
}

/// Spawns real processes on this host.
pub struct SystemRunner;

impl SystemRunner {
    fn build(spec: &CommandSpec) -> Command {
        let sudo_prefix: Option<Vec<String>> = match &spec.privilege {
            Privilege::User => None,
            Privilege::Root if is_root() => None,
            Privilege::Root => Some(vec![]),
            Privilege::AsUser(user) => Some(vec!["-u".to_string(), user.clone()]),
        };

        match sudo_prefix {
            None => {
                let mut cmd = Command::new(&spec.program);
                cmd.args(&spec.args);
                cmd.envs(spec.env.iter().map(|(k, v)| (k, v)));
                cmd
            }
            Some(prefix) => {
                // `sudo` scrubs the environment, so variables travel through `env`.
                let mut cmd = Command::new("sudo");
                cmd.args(prefix);
                if !spec.env.is_empty() {
                    cmd.arg("env");
                    cmd.args(spec.env.iter().map(|(k, v)| format!("{k}={v}")));
                }
                cmd.arg(&spec.program).args(&spec.args);
                if spec.cwd.is_none() && matches!(spec.privilege, Privilege::AsUser(_)) {
                    // The target account usually cannot read the invoking user's cwd.
                    cmd.current_dir("/");
                }
                cmd
            }
        }
    }

    /// Signals the child's whole process group, so `sudo` and everything it started go
    /// down together. SIGTERM comes first because `sudo` relays it to the root-owned
    /// command, which the invoking user may not signal directly.
    fn kill_group(child: &mut Child) {
        let group = format!("-{}", child.id());
        for (signal, grace) in [("-TERM", Duration::from_millis(200)), ("-KILL", Duration::ZERO)] {
            let _ = Command::new("kill")
                .args([signal, "--", &group])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
            thread::sleep(grace);
        }
        let _ = child.kill();
        let _ = child.wait();
    }

    fn read_back(mut file: std::fs::File) -> String {
        let mut bytes = Vec::new();
        if file.seek(SeekFrom::Start(0)).is_ok() {
            let _ = file.read_to_end(&mut bytes);
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl CommandRunner for SystemRunner {
    fn execute(&self, spec: &CommandSpec, timeout: Duration) -> Result<CommandOutput, ExecFailure> {
        // Output goes to anonymous files rather than pipes so a chatty child never blocks.
        let stdout = tempfile::tempfile().map_err(ExecFailure::Spawn)?;
        let stderr = tempfile::tempfile().map_err(ExecFailure::Spawn)?;

        let mut cmd = SystemRunner::build(spec);
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        // Own process group, so a timeout reaches grandchildren too.
        cmd.process_group(0);
        cmd.stdout(Stdio::from(stdout.try_clone().map_err(ExecFailure::Spawn)?))
            .stderr(Stdio::from(stderr.try_clone().map_err(ExecFailure::Spawn)?))
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });

        let mut child = cmd.spawn().map_err(ExecFailure::Spawn)?;
        if let (Some(payload), Some(mut pipe)) = (&spec.stdin, child.stdin.take()) {
            // Dropping the pipe afterwards closes the child's stdin.
            pipe.write_all(payload.as_bytes()).map_err(ExecFailure::Spawn)?;
        }

        let started = Instant::now();
        let status = loop {
            match child.try_wait().map_err(ExecFailure::Spawn)? {
                Some(status) => break status,
                None if started.elapsed() >= timeout => {
                    SystemRunner::kill_group(&mut child);
                    return Err(ExecFailure::TimedOut);
                }
                None => thread::sleep(Duration::from_millis(25)),
            }
        };

        Ok(CommandOutput {
            status: status.code(),
            stdout: SystemRunner::read_back(stdout),
            stderr: SystemRunner::read_back(stderr),
        })
    }
}
