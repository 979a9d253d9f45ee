// Describes pyenv, the Python-environment manager, as a `ManagedService`.
//
// pyenv is not a daemon: it has no unit, and "configured" means the shell profile
// stanza that puts it on PATH. The upstream installer script clones pyenv together
// with the pyenv-virtualenv plugin into `PYENV_ROOT`.

use crate::cli::type_enums::ServiceKind;
use crate::libs::executor::{CommandSpec, Privilege};
use crate::schemas::managed_service::{
    Configuration, InstallCheck, InstallPlan, ManagedService, Probe, ProfileStanza, TeardownPlan,
    Verification,
};
use crate::schemas::settings::PythonEnvSettings;

pub const PROFILE_ID: &str = "pyenv";

const INSTALLER_URL: &str = "https://pyenv.run";

/// Packages pyenv needs to download and compile CPython.
const BUILD_PREREQUISITES: [&str; 16] = [
    "build-essential",
    "curl",
    "git",
    "libssl-dev",
    "zlib1g-dev",
    "libbz2-dev",
    "libreadline-dev",
    "libsqlite3-dev",
    "libncursesw5-dev",
    "xz-utils",
    "tk-dev",
    "libxml2-dev",
    "libxmlsec1-dev",
    "libffi-dev",
    "liblzma-dev",
    "ca-certificates",
];

pub fn profile_body(env: &PythonEnvSettings) -> Vec<String> {
    let mut body = vec![
        format!("export PYENV_ROOT=\"{}\"", env.install_dir.display()),
        "[[ -d \"$PYENV_ROOT/bin\" ]] && export PATH=\"$PYENV_ROOT/bin:$PATH\"".to_string(),
        "eval \"$(pyenv init -)\"".to_string(),
    ];
    if env.auto_activate {
        body.push("eval \"$(pyenv virtualenv-init -)\"".to_string());
    }
    body
}

pub fn descriptor(env: &PythonEnvSettings) -> ManagedService {
    let root = env.install_dir.display().to_string();
    let binary = env.install_dir.join("bin").join("pyenv");

    ManagedService {
        kind: ServiceKind::Pyenv,
        install: InstallPlan {
            check: InstallCheck::PathExists(binary.clone()),
            packages: BUILD_PREREQUISITES.iter().map(|p| p.to_string()).collect(),
            commands: vec![
                CommandSpec::shell(format!("curl -fsSL {INSTALLER_URL} | bash")).env("PYENV_ROOT", root),
            ],
        },
        config: Configuration {
            profile: Some(ProfileStanza {
                id: PROFILE_ID.into(),
                body: profile_body(env),
            }),
            ..Configuration::default()
        },
        unit: None,
        post_start: vec![],
        bootstrap: None,
        verify: Verification {
            probes: vec![Probe::Command {
                name: "pyenv-version".into(),
                spec: CommandSpec::new(binary.display().to_string()).arg("--version"),
                expect: "pyenv ".into(),
            }],
            loopback_only_port: None,
        },
        teardown: TeardownPlan {
            packages: vec![],
            directories: vec![(env.install_dir.clone(), Privilege::User)],
            profile_id: Some(PROFILE_ID.into()),
            dotfiles: vec![],
        },
    }
}
