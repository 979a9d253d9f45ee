use clap::ValueEnum;
use std::fmt;

/// The managed services, in install order.
///
/// The database engine comes first because the scaffolder and the verification
/// report both depend on it; the language-environment managers come last because
/// nothing in the system services depends on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
pub enum ServiceKind {
    /// PostgreSQL database engine.
    Postgres,
    /// Redis cache / in-memory store.
    Redis,
    /// nginx reverse proxy / web server.
    Nginx,
    /// pyenv Python-environment manager.
    Pyenv,
    /// nvm with the pinned Node.js runtime and npm.
    Nvm,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 5] = [
        ServiceKind::Postgres,
        ServiceKind::Redis,
        ServiceKind::Nginx,
        ServiceKind::Pyenv,
        ServiceKind::Nvm,
    ];

    /// Bracketed log prefix, e.g. `[Postgres]`.
    pub fn tag(&self) -> &'static str {
        match self {
            ServiceKind::Postgres => "[Postgres]",
            ServiceKind::Redis => "[Redis]",
            ServiceKind::Nginx => "[Nginx]",
            ServiceKind::Pyenv => "[Pyenv]",
            ServiceKind::Nvm => "[Nvm]",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceKind::Postgres => "postgres",
            ServiceKind::Redis => "redis",
            ServiceKind::Nginx => "nginx",
            ServiceKind::Pyenv => "pyenv",
            ServiceKind::Nvm => "nvm",
        };
        f.write_str(name)
    }
}

/// Selects either every service or the one named with `--only`.
pub fn selected(only: Option<ServiceKind>) -> Vec<ServiceKind> {
    match only {
        Some(kind) => vec![kind],
        None => ServiceKind::ALL.to_vec(),
    }
}
