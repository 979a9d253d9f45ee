// This module is the registry of managed services.
//
// Each submodule turns validated settings into the `ManagedService` descriptor of one
// service. The generic state machine in `libs::service_installer` and the teardown
// stage in `libs::teardown` only ever see descriptors, so adding a service means adding
// a module here and a variant to `ServiceKind`.

use crate::cli::type_enums::ServiceKind;
use crate::schemas::managed_service::ManagedService;
use crate::schemas::settings::StackSettings;

/// PostgreSQL: packages, loopback-only `postgresql.conf`, `pg_hba.conf` rule, admin role.
pub(crate) mod postgres;

/// Redis: packages, bind/secret/port/protected-mode directives, authenticated ping.
pub(crate) mod redis;

/// nginx: packages, owned loopback site definition, placeholder page, HTTP probe.
pub(crate) mod nginx;

/// pyenv: installer script, shell profile stanza.
pub(crate) mod pyenv;

/// nvm: repository clone, shell profile stanza, pinned Node.js runtime.
pub(crate) mod nvm;

/// Builds the descriptor for one service.
pub fn descriptor(kind: ServiceKind, stack: &StackSettings) -> ManagedService {
    match kind {
        ServiceKind::Postgres => postgres::descriptor(&stack.database),
        ServiceKind::Redis => redis::descriptor(&stack.cache),
        ServiceKind::Nginx => nginx::descriptor(&stack.webserver),
        ServiceKind::Pyenv => pyenv::descriptor(&stack.python_env),
        ServiceKind::Nvm => nvm::descriptor(&stack.package_manager),
    }
}

/// Descriptors for `kinds`, in the order given.
pub fn descriptors(kinds: &[ServiceKind], stack: &StackSettings) -> Vec<ManagedService> {
    kinds.iter().map(|kind| descriptor(*kind, stack)).collect()
}
