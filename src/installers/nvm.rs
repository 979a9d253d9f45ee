// Describes nvm and the pinned Node.js runtime (with npm) as a `ManagedService`.
//
// nvm is a shell function, not a binary, so every command that needs it sources
// `$NVM_DIR/nvm.sh` first. Installing the runtime happens in the Running state,
// once nvm itself is on disk and the profile stanza is written.

use std::path::Path;

use crate::cli::type_enums::ServiceKind;
use crate::libs::executor::{CommandSpec, Privilege};
use crate::libs::utilities::path_helpers::home_path;
use crate::schemas::managed_service::{
    Configuration, InstallCheck, InstallPlan, ManagedService, Probe, ProfileStanza, TeardownPlan,
    Verification,
};
use crate::schemas::settings::PackageManagerSettings;

pub const PROFILE_ID: &str = "nvm";

const REPOSITORY: &str = "https://github.com/nvm-sh/nvm.git";

/// `bash -c` running `script` with nvm loaded from `nvm_dir`.
pub fn with_nvm(nvm_dir: &Path, script: &str) -> CommandSpec {
    let dir = nvm_dir.display().to_string();
    CommandSpec::shell(format!("source \"$NVM_DIR/nvm.sh\" && {script}")).env("NVM_DIR", dir)
}

pub fn profile_body(pm: &PackageManagerSettings) -> Vec<String> {
    vec![
        format!("export NVM_DIR=\"{}\"", pm.install_dir.display()),
        "[ -s \"$NVM_DIR/nvm.sh\" ] && \\. \"$NVM_DIR/nvm.sh\"".to_string(),
        "[ -s \"$NVM_DIR/bash_completion\" ] && \\. \"$NVM_DIR/bash_completion\"".to_string(),
    ]
}

pub fn descriptor(pm: &PackageManagerSettings) -> ManagedService {
    let dir = pm.install_dir.display().to_string();
    let version = &pm.runtime_version;

    let mut dotfiles = Vec::new();
    dotfiles.extend(home_path(".npm"));
    dotfiles.extend(home_path(".npmrc"));

    ManagedService {
        kind: ServiceKind::Nvm,
        install: InstallPlan {
            check: InstallCheck::PathExists(pm.install_dir.join("nvm.sh")),
            packages: vec!["git".into(), "curl".into(), "ca-certificates".into()],
            commands: vec![
                CommandSpec::new("git").args(["clone", "--depth", "1", REPOSITORY, &dir]),
            ],
        },
        config: Configuration {
            profile: Some(ProfileStanza {
                id: PROFILE_ID.into(),
                body: profile_body(pm),
            }),
            ..Configuration::default()
        },
        unit: None,
        post_start: vec![with_nvm(
            &pm.install_dir,
            &format!("nvm install {version} && nvm alias default {version}"),
        )],
        bootstrap: None,
        verify: Verification {
            probes: vec![
                Probe::Command {
                    name: "node-version".into(),
                    spec: with_nvm(&pm.install_dir, &format!("nvm exec {version} node --version")),
                    expect: format!("v{version}"),
                },
                Probe::Command {
                    name: "npm-version".into(),
                    spec: with_nvm(&pm.install_dir, &format!("nvm exec {version} npm --version")),
                    expect: ".".into(),
                },
            ],
            loopback_only_port: None,
        },
        teardown: TeardownPlan {
            packages: vec![],
            directories: vec![(pm.install_dir.clone(), Privilege::User)],
            profile_id: Some(PROFILE_ID.into()),
            dotfiles,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn settings() -> PackageManagerSettings {
        PackageManagerSettings {
            install_dir: PathBuf::from("/home/dev/.nvm"),
            runtime_version: "20.11.1".into(),
        }
    }

    #[test]
    fn commands_source_nvm_first() {
        let spec = with_nvm(Path::new("/opt/nvm"), "nvm ls");
        assert_eq!(spec.program, "bash");
        assert_eq!(spec.args, ["-c", "source \"$NVM_DIR/nvm.sh\" && nvm ls"]);
        assert_eq!(spec.env, vec![("NVM_DIR".to_string(), "/opt/nvm".to_string())]);
    }

    #[test]
    fn runtime_is_installed_after_nvm_and_pinned() {
        let service = descriptor(&settings());
        assert_eq!(
            service.install.check,
            InstallCheck::PathExists(PathBuf::from("/home/dev/.nvm/nvm.sh"))
        );
        assert!(service.post_start[0].args[1].contains("nvm install 20.11.1 && nvm alias default 20.11.1"));
        assert!(matches!(
            &service.verify.probes[0],
            Probe::Command { expect, .. } if expect == "v20.11.1"
        ));
    }
}
