// Describes the nginx web server / reverse proxy as a `ManagedService`.
//
// Unlike the other services nginx gets a site definition the provisioner owns
// completely: it is rendered from settings and rewritten whenever it drifts. The
// distribution's default site is removed so it cannot shadow ours on port 80.

use std::path::{Path, PathBuf};

use crate::cli::type_enums::ServiceKind;
use crate::libs::config_patch::{DirectiveStyle, PatchRule};
use crate::libs::executor::Privilege;
use crate::schemas::managed_service::{
    ConfigLocator, ConfigTarget, Configuration, InstallCheck, InstallPlan, ManagedService,
    OwnedFile, Probe, Symlink, TeardownPlan, Verification,
};
use crate::schemas::settings::WebServerSettings;

/// Text the placeholder page carries and the HTTP probe looks for.
pub const PLACEHOLDER_TEXT: &str = "setup-devstack: nginx is serving this host";

const DEFAULT_SITE: &str = "/etc/nginx/sites-enabled/default";

/// Server block listening on loopback only.
pub fn render_site(web: &WebServerSettings) -> String {
    format!(
        "server {{\n    listen 127.0.0.1:{port};\n    server_name localhost;\n\n    root {root};\n    index {index};\n\n    location / {{\n        try_files $uri $uri/ =404;\n    }}\n}}\n",
        port = web.port,
        root = web.document_root.display(),
        index = web.index_file,
    )
}

pub fn render_placeholder() -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><title>setup-devstack</title></head>\n<body>\n<p>{PLACEHOLDER_TEXT}</p>\n</body>\n</html>\n"
    )
}

pub fn probe_url(port: u16) -> String {
    format!("http://127.0.0.1:{port}/")
}

fn parent_of(path: &Path) -> Option<(PathBuf, Privilege)> {
    path.parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(|parent| (parent.to_path_buf(), Privilege::Root))
}

pub fn descriptor(web: &WebServerSettings) -> ManagedService {
    let packages: Vec<String> = vec!["nginx".into()];

    let mut directories: Vec<(PathBuf, Privilege)> = Vec::new();
    directories.extend(parent_of(&web.site_definition));
    directories.extend(parent_of(&web.enabled_site));
    directories.push((web.document_root.clone(), Privilege::Root));
    directories.dedup();

    ManagedService {
        kind: ServiceKind::Nginx,
        install: InstallPlan {
            check: InstallCheck::Packages(packages.clone()),
            packages,
            commands: vec![],
        },
        config: Configuration {
            patches: vec![ConfigTarget {
                locate: ConfigLocator::Fixed(web.config_file.clone()),
                rules: vec![PatchRule::directive_in_block(
                    "server_tokens",
                    "off",
                    DirectiveStyle::Semicolon,
                    "http {",
                )],
                privilege: Privilege::Root,
            }],
            directories,
            files: vec![
                OwnedFile {
                    path: web.site_definition.clone(),
                    content: render_site(web),
                    privilege: Privilege::Root,
                },
                OwnedFile {
                    path: web.document_root.join(&web.index_file),
                    content: render_placeholder(),
                    privilege: Privilege::Root,
                },
            ],
            links: vec![Symlink {
                target: web.site_definition.clone(),
                link: web.enabled_site.clone(),
                privilege: Privilege::Root,
            }],
            absent: if web.enabled_site == Path::new(DEFAULT_SITE) {
                vec![]
            } else {
                vec![(PathBuf::from(DEFAULT_SITE), Privilege::Root)]
            },
            profile: None,
        },
        unit: Some("nginx".into()),
        post_start: vec![],
        bootstrap: None,
        verify: Verification {
            probes: vec![Probe::Http {
                url: probe_url(web.port),
                expect_body: PLACEHOLDER_TEXT.into(),
            }],
            loopback_only_port: Some(web.port),
        },
        teardown: TeardownPlan {
            packages: vec!["nginx".into(), "nginx-common".into()],
            directories: vec![
                (PathBuf::from("/etc/nginx"), Privilege::Root),
                (PathBuf::from("/var/log/nginx"), Privilege::Root),
                (web.document_root.clone(), Privilege::Root),
            ],
            profile_id: None,
            dotfiles: vec![],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn settings() -> WebServerSettings {
        WebServerSettings {
            config_file: PathBuf::from("/etc/nginx/nginx.conf"),
            site_definition: PathBuf::from("/etc/nginx/sites-available/devstack"),
            enabled_site: PathBuf::from("/etc/nginx/sites-enabled/devstack"),
            port: 8080,
            document_root: PathBuf::from("/var/www/devstack"),
            index_file: "index.html".into(),
        }
    }

    #[test]
    fn site_listens_on_loopback_only() {
        let site = render_site(&settings());
        assert!(site.contains("listen 127.0.0.1:8080;"));
        assert!(site.contains("root /var/www/devstack;"));
        assert!(site.contains("index index.html;"));
        assert!(!site.contains("listen 8080"));
    }

    #[test]
    fn owned_files_links_and_default_site_removal() {
        let service = descriptor(&settings());
        let paths: Vec<&Path> = service.config.files.iter().map(|f| f.path.as_path()).collect();
        assert_eq!(
            paths,
            [
                Path::new("/etc/nginx/sites-available/devstack"),
                Path::new("/var/www/devstack/index.html")
            ]
        );
        assert_eq!(service.config.links[0].link, PathBuf::from("/etc/nginx/sites-enabled/devstack"));
        assert_eq!(
            service.config.absent,
            vec![(PathBuf::from(DEFAULT_SITE), Privilege::Root)]
        );
        assert!(service.config.files[1].content.contains(PLACEHOLDER_TEXT));
    }

    #[test]
    fn hardening_goes_inside_the_http_block() {
        let service = descriptor(&settings());
        assert_eq!(
            service.config.patches[0].rules,
            vec![PatchRule::directive_in_block("server_tokens", "off", DirectiveStyle::Semicolon, "http {")]
        );
    }

    #[test]
    fn verification_fetches_the_placeholder_and_checks_exposure() {
        let verify = descriptor(&settings()).verify;
        assert!(matches!(
            &verify.probes[0],
            Probe::Http { url, expect_body } if url == "http://127.0.0.1:8080/" && expect_body == PLACEHOLDER_TEXT
        ));
        assert_eq!(verify.loopback_only_port, Some(8080));
    }
}
