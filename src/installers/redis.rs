// Describes the Redis cache as a `ManagedService`.

use std::path::PathBuf;

use crate::cli::type_enums::ServiceKind;
use crate::libs::config_patch::{DirectiveStyle, PatchRule};
use crate::libs::executor::{CommandSpec, Privilege};
use crate::libs::utilities::path_helpers::home_path;
use crate::schemas::managed_service::{
    ConfigLocator, ConfigTarget, Configuration, InstallCheck, InstallPlan, ManagedService, Probe,
    TeardownPlan, Verification,
};
use crate::schemas::settings::CacheSettings;

/// Authenticated `PING` against the configured port. The password goes through
/// `REDISCLI_AUTH` rather than `-a`.
pub fn ping_spec(cache: &CacheSettings) -> CommandSpec {
    CommandSpec::new("redis-cli")
        .args(["-h", "127.0.0.1", "-p", &cache.port.to_string(), "ping"])
        .env("REDISCLI_AUTH", cache.password.clone())
}

pub fn descriptor(cache: &CacheSettings) -> ManagedService {
    let packages: Vec<String> = vec!["redis-server".into(), "redis-tools".into()];

    ManagedService {
        kind: ServiceKind::Redis,
        install: InstallPlan {
            check: InstallCheck::Packages(packages.clone()),
            packages,
            commands: vec![],
        },
        config: Configuration {
            patches: vec![ConfigTarget {
                locate: ConfigLocator::Fixed(cache.config_file.clone()),
                rules: vec![
                    PatchRule::directive("bind", "127.0.0.1 -::1", DirectiveStyle::Space),
                    PatchRule::directive("requirepass", cache.password.clone(), DirectiveStyle::Space),
                    PatchRule::directive("port", cache.port.to_string(), DirectiveStyle::Space),
                    PatchRule::directive("protected-mode", "yes", DirectiveStyle::Space),
                ],
                privilege: Privilege::Root,
            }],
            ..Configuration::default()
        },
        unit: Some("redis-server".into()),
        post_start: vec![],
        bootstrap: None,
        verify: Verification {
            probes: vec![Probe::Command {
                name: "authenticated-ping".into(),
                spec: ping_spec(cache),
                expect: "PONG".into(),
            }],
            loopback_only_port: None,
        },
        teardown: TeardownPlan {
            packages: vec!["redis-server".into(), "redis-tools".into()],
            directories: ["/etc/redis", "/var/lib/redis", "/var/log/redis"]
                .into_iter()
                .map(|dir| (PathBuf::from(dir), Privilege::Root))
                .collect(),
            profile_id: None,
            dotfiles: home_path(".rediscli_history").into_iter().collect(),
        },
    }
}
