// This module describes the PostgreSQL database engine as a `ManagedService`.
//
// The distribution keeps the live configuration under a versioned directory
// (`/etc/postgresql/<major>/main/`), so both files are located by searching below
// `/etc/postgresql` rather than by a fixed path.

use std::path::PathBuf;

use crate::cli::type_enums::ServiceKind;
use crate::libs::config_patch::{DirectiveStyle, PatchRule};
use crate::libs::database::{self, BootstrapPolicy, DatabaseBootstrap};
use crate::libs::executor::Privilege;
use crate::libs::utilities::path_helpers::home_path;
use crate::schemas::managed_service::{
    ConfigLocator, ConfigTarget, Configuration, InstallCheck, InstallPlan, ManagedService, Probe,
    TeardownPlan, Verification,
};
use crate::schemas::settings::DatabaseSettings;

const CONFIG_ROOT: &str = "/etc/postgresql";

/// Loopback-only access with password authentication.
pub const HBA_LOOPBACK_RULE: &str = "host all all 127.0.0.1/32 scram-sha-256";

fn config_target(file_name: &str, rules: Vec<PatchRule>) -> ConfigTarget {
    ConfigTarget {
        locate: ConfigLocator::Search {
            root: PathBuf::from(CONFIG_ROOT),
            file_name: file_name.to_string(),
        },
        rules,
        privilege: Privilege::Root,
    }
}

pub fn descriptor(db: &DatabaseSettings) -> ManagedService {
    let packages: Vec<String> = vec!["postgresql".into(), "postgresql-contrib".into()];

    ManagedService {
        kind: ServiceKind::Postgres,
        install: InstallPlan {
            check: InstallCheck::Packages(packages.clone()),
            packages,
            commands: vec![],
        },
        config: Configuration {
            patches: vec![
                config_target(
                    "postgresql.conf",
                    vec![
                        PatchRule::directive("listen_addresses", "'localhost'", DirectiveStyle::Equals),
                        PatchRule::directive("port", db.port.to_string(), DirectiveStyle::Equals),
                        PatchRule::directive(
                            "password_encryption",
                            "scram-sha-256",
                            DirectiveStyle::Equals,
                        ),
                    ],
                ),
                config_target("pg_hba.conf", vec![PatchRule::ensure_line(HBA_LOOPBACK_RULE)]),
            ],
            ..Configuration::default()
        },
        unit: Some("postgresql".into()),
        post_start: vec![],
        bootstrap: Some(DatabaseBootstrap {
            role: db.user.clone(),
            password: db.password.clone(),
            database: db.name.clone(),
            policy: BootstrapPolicy::DropThenCreate,
            grant_createdb: true,
        }),
        verify: Verification {
            probes: vec![Probe::Command {
                name: "select-one".into(),
                spec: database::select_one_spec(&db.user, &db.password, &db.name, db.port),
                expect: "1".into(),
            }],
            loopback_only_port: None,
        },
        teardown: TeardownPlan {
            packages: vec![
                "postgresql".into(),
                "postgresql-contrib".into(),
                "postgresql-common".into(),
                "postgresql-client-common".into(),
            ],
            directories: ["/etc/postgresql", "/var/lib/postgresql", "/var/log/postgresql"]
                .into_iter()
                .map(|dir| (PathBuf::from(dir), Privilege::Root))
                .collect(),
            profile_id: None,
            dotfiles: home_path(".psql_history").into_iter().collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> DatabaseSettings {
        DatabaseSettings {
            user: "admin".into(),
            password: "s3cret".into(),
            name: "devdb".into(),
            port: 5433,
        }
    }

    #[test]
    fn configuration_is_found_by_search_and_bound_to_loopback() {
        let service = descriptor(&settings());
        let targets = &service.config.patches;
        assert_eq!(targets.len(), 2);
        assert!(matches!(
            &targets[0].locate,
            ConfigLocator::Search { root, file_name } if root == &PathBuf::from("/etc/postgresql") && file_name == "postgresql.conf"
        ));
        assert!(targets[0].rules.contains(&PatchRule::directive(
            "listen_addresses",
            "'localhost'",
            DirectiveStyle::Equals
        )));
        assert!(targets[0].rules.contains(&PatchRule::directive("port", "5433", DirectiveStyle::Equals)));
        assert_eq!(targets[1].rules, vec![PatchRule::ensure_line(HBA_LOOPBACK_RULE)]);
    }

    #[test]
    fn admin_role_is_recreated_on_every_run() {
        let plan = descriptor(&settings()).bootstrap.unwrap();
        assert_eq!(plan.policy, BootstrapPolicy::DropThenCreate);
        assert_eq!(plan.role, "admin");
        assert_eq!(plan.database, "devdb");
        assert!(plan.grant_createdb);
    }

    #[test]
    fn probe_connects_over_tcp_as_the_admin_role() {
        let service = descriptor(&settings());
        let Probe::Command { spec, expect, .. } = &service.verify.probes[0] else {
            panic!("expected a command probe");
        };
        assert_eq!(expect, "1");
        assert!(spec.args.windows(2).any(|w| w == ["-h", "127.0.0.1"]));
        assert!(spec.args.windows(2).any(|w| w == ["-p", "5433"]));
        assert_eq!(spec.privilege, Privilege::User);
    }
}
