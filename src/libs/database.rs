//! # Database Bootstrap
//!
//! Creates the roles and databases the stack hands out, using `psql` as the `postgres`
//! superuser account. Two policies exist:
//!
//! - [`BootstrapPolicy::DropThenCreate`] for the global admin role: drop database and role
//!   if they exist, then create them. Idempotent by construction.
//! - [`BootstrapPolicy::CreateOnly`] for per-project roles: never drop. Existing roles and
//!   databases are detected and kept, so scaffolding the same project twice is safe. An
//!   existing role has its password re-synchronised with the configured one.

use colored::Colorize;

use crate::libs::errors::Result;
use crate::libs::executor::{CommandSpec, Executor};
use crate::log_info;

/// Operating-system account that owns the database cluster.
pub const SUPERUSER: &str = "postgres";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapPolicy {
    DropThenCreate,
    CreateOnly,
}

/// A role/database pair to provision once the engine runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseBootstrap {
    pub role: String,
    pub password: String,
    pub database: String,
    pub policy: BootstrapPolicy,
    pub grant_createdb: bool,
}

/// Quotes an SQL identifier (`"name"`).
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quotes an SQL string literal (`'value'`).
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Runs SQL as the cluster superuser and returns trimmed stdout.
///
/// The statement goes in on stdin so passwords never reach the argument list, the
/// process table or the command line carried by errors.
fn psql(exec: &Executor, step: &str, sql: &str) -> Result<String> {
    let spec = CommandSpec::new("psql")
        .args(["-v", "ON_ERROR_STOP=1", "-tA", "-f", "-"])
        .stdin(sql)
        .as_user(SUPERUSER);
    exec.run_strict(step, &spec).map(|out| out.stdout.trim().to_string())
}

fn role_exists(exec: &Executor, step: &str, name: &str) -> Result<bool> {
    let sql = format!("SELECT 1 FROM pg_roles WHERE rolname = {}", quote_literal(name));
    Ok(psql(exec, step, &sql)? == "1")
}

fn database_exists(exec: &Executor, step: &str, name: &str) -> Result<bool> {
    let sql = format!("SELECT 1 FROM pg_database WHERE datname = {}", quote_literal(name));
    Ok(psql(exec, step, &sql)? == "1")
}

/// Makes sure a login role `name` exists with `password`.
pub fn ensure_role(exec: &Executor, step: &str, name: &str, password: &str, policy: BootstrapPolicy) -> Result<()> {
    let ident = quote_ident(name);
    let secret = quote_literal(password);

    match policy {
        BootstrapPolicy::DropThenCreate => {
            psql(exec, step, &format!("DROP ROLE IF EXISTS {ident}"))?;
        }
        BootstrapPolicy::CreateOnly if role_exists(exec, step, name)? => {
            log_info!("{} Role {} already exists; keeping it", step, name.cyan());
            psql(exec, step, &format!("ALTER ROLE {ident} WITH LOGIN PASSWORD {secret}"))?;
            return Ok(());
        }
        BootstrapPolicy::CreateOnly => {}
    }

    psql(exec, step, &format!("CREATE ROLE {ident} WITH LOGIN PASSWORD {secret}"))?;
    log_info!("{} Created role {}", step, name.green());
    Ok(())
}

/// Allows `name` to create databases.
pub fn grant_createdb(exec: &Executor, step: &str, name: &str) -> Result<()> {
    psql(exec, step, &format!("ALTER ROLE {} CREATEDB", quote_ident(name)))?;
    Ok(())
}

/// Makes sure database `name` exists and is owned by `owner`.
pub fn ensure_database(exec: &Executor, step: &str, name: &str, owner: &str, policy: BootstrapPolicy) -> Result<()> {
    let ident = quote_ident(name);

    match policy {
        BootstrapPolicy::DropThenCreate => {
            psql(exec, step, &format!("DROP DATABASE IF EXISTS {ident}"))?;
        }
        BootstrapPolicy::CreateOnly if database_exists(exec, step, name)? => {
            log_info!("{} Database {} already exists; keeping it", step, name.cyan());
            return Ok(());
        }
        BootstrapPolicy::CreateOnly => {}
    }

    psql(
        exec,
        step,
        &format!("CREATE DATABASE {ident} OWNER {}", quote_ident(owner)),
    )?;
    log_info!("{} Created database {} owned by {}", step, name.green(), owner.green());
    Ok(())
}

/// Provisions a role/database pair according to its policy.
///
/// With `DropThenCreate` the database is dropped before the role, since a role that
/// still owns a database cannot be dropped.
pub fn bootstrap(exec: &Executor, step: &str, plan: &DatabaseBootstrap) -> Result<()> {
    if plan.policy == BootstrapPolicy::DropThenCreate {
        psql(
            exec,
            step,
            &format!("DROP DATABASE IF EXISTS {}", quote_ident(&plan.database)),
        )?;
    }
    ensure_role(exec, step, &plan.role, &plan.password, plan.policy)?;
    if plan.grant_createdb {
        grant_createdb(exec, step, &plan.role)?;
    }
    ensure_database(exec, step, &plan.database, &plan.role, plan.policy)
}

/// Connects over TCP loopback as `role` and runs `SELECT 1`.
pub fn select_one_spec(role: &str, password: &str, database: &str, port: u16) -> CommandSpec {
    CommandSpec::new("psql")
        .args(["-h", "127.0.0.1", "-p", &port.to_string(), "-U", role, "-d", database])
        .args(["-tAc", "SELECT 1"])
        .env("PGPASSWORD", password)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::errors::ProvisionError;
    use crate::libs::testing::FakeRunner;
    use std::time::Duration;

    fn plan(policy: BootstrapPolicy) -> DatabaseBootstrap {
        DatabaseBootstrap {
            role: "user_demo".into(),
            password: "pa'ss".into(),
            database: "proj_demo".into(),
            policy,
            grant_createdb: true,
        }
    }

    #[test]
    fn quoting_escapes_embedded_quotes() {
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(quote_literal("pa'ss"), "'pa''ss'");
    }

    #[test]
    fn create_only_creates_missing_role_and_database() {
        let fake = FakeRunner::new()
            .on("FROM pg_roles", 0, "\n", "")
            .on("FROM pg_database", 0, "", "");
        let exec = Executor::new(&fake, Duration::from_secs(5));
        bootstrap(&exec, "[Project]", &plan(BootstrapPolicy::CreateOnly)).unwrap();

        assert!(fake.called("CREATE ROLE \"user_demo\" WITH LOGIN PASSWORD 'pa''ss'"));
        assert!(fake.called("ALTER ROLE \"user_demo\" CREATEDB"));
        assert!(fake.called("CREATE DATABASE \"proj_demo\" OWNER \"user_demo\""));
        assert!(!fake.called("DROP"));
        assert!(fake.calls().iter().all(|c| !c.contains("psql") || c.starts_with("sudo -u postgres")));
    }

    #[test]
    fn create_only_tolerates_existing_objects() {
        let fake = FakeRunner::new()
            .on("FROM pg_roles", 0, "1\n", "")
            .on("FROM pg_database", 0, "1\n", "")
            .on("CREATE ROLE", 1, "", "ERROR:  role already exists")
            .on("CREATE DATABASE", 1, "", "ERROR:  database already exists");
        let exec = Executor::new(&fake, Duration::from_secs(5));
        bootstrap(&exec, "[Project]", &plan(BootstrapPolicy::CreateOnly)).unwrap();

        assert!(!fake.called("CREATE ROLE"));
        assert!(!fake.called("CREATE DATABASE"));
        assert!(fake.called("ALTER ROLE \"user_demo\" WITH LOGIN PASSWORD"));
    }

    #[test]
    fn drop_then_create_drops_database_before_role() {
        let fake = FakeRunner::new();
        let exec = Executor::new(&fake, Duration::from_secs(5));
        bootstrap(&exec, "[Postgres]", &plan(BootstrapPolicy::DropThenCreate)).unwrap();

        let drop_db = fake.position("DROP DATABASE IF EXISTS").unwrap();
        let drop_role = fake.position("DROP ROLE IF EXISTS").unwrap();
        let create_role = fake.position("CREATE ROLE").unwrap();
        let create_db = fake.position("CREATE DATABASE").unwrap();
        assert!(drop_db < drop_role && drop_role < create_role && create_role < create_db);
        assert!(!fake.called("FROM pg_roles"));
    }

    #[test]
    fn sql_failures_are_fatal() {
        let fake = FakeRunner::new().on("CREATE ROLE", 1, "", "ERROR:  permission denied");
        let exec = Executor::new(&fake, Duration::from_secs(5));
        let err = bootstrap(&exec, "[Postgres]", &plan(BootstrapPolicy::DropThenCreate)).unwrap_err();
        assert!(matches!(err, ProvisionError::ExternalTool { ref stderr, .. } if stderr.contains("permission denied")));
    }

    #[test]
    fn failed_role_creation_does_not_leak_the_password() {
        let mut plan = plan(BootstrapPolicy::DropThenCreate);
        plan.password = "TopSecret99".into();
        let fake = FakeRunner::new().on("CREATE ROLE", 1, "", "ERROR:  permission denied");
        let exec = Executor::new(&fake, Duration::from_secs(5));
        let err = bootstrap(&exec, "[Postgres]", &plan).unwrap_err();

        assert!(!err.to_string().contains("TopSecret99"));
        assert!(!err.diagnostics().unwrap_or_default().contains("TopSecret99"));
        assert!(matches!(err, ProvisionError::ExternalTool { ref command, .. } if command.ends_with("psql -v ON_ERROR_STOP=1 -tA -f -")));
        assert!(fake.calls().iter().all(|call| !call.contains("TopSecret99")));
        assert_eq!(
            fake.stdin_of("CREATE ROLE").as_deref(),
            Some("CREATE ROLE \"user_demo\" WITH LOGIN PASSWORD 'TopSecret99'")
        );
    }
}
