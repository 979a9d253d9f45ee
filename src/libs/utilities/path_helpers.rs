// Our custom logging macros to give us nicely formatted (and colored!) output
// for debugging, general information, and errors.
use crate::{log_debug, log_warn};
// The 'colored' crate helps us make our console output look pretty and readable.
use colored::Colorize;
use std::env;
use std::path::{Path, PathBuf};

/// Resolves paths that start with a tilde `~` into the user's home directory.
///
/// # Arguments
/// * `path`: A string slice (`&str`) representing the path, which might start with `~`.
///
/// # Returns
/// * `PathBuf`: The resolved path. When the home directory cannot be determined,
///   `shellexpand` leaves the input unchanged.
pub fn expand_tilde(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path.trim()).into_owned())
}

/// Returns the application directory, typically `~/.setup-devstack`.
/// This is where the default configuration sources live.
pub fn get_devstack_dir() -> PathBuf {
    if let Some(home_dir) = dirs::home_dir() {
        let devstack_dir = home_dir.join(".setup-devstack");
        log_debug!(
            "[Utils] Devstack directory resolved to: {}",
            devstack_dir.display().to_string().cyan()
        );
        devstack_dir
    } else {
        let fallback_dir = env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".setup-devstack");
        log_warn!(
            "[Utils] Could not determine home directory. Falling back to {}",
            fallback_dir.display().to_string().yellow()
        );
        fallback_dir
    }
}

/// Resolves an optional user-supplied path, falling back to `file_name` inside the devstack directory.
pub fn resolve_source_path(user_path: Option<&str>, file_name: &str) -> PathBuf {
    match user_path {
        Some(path) => expand_tilde(path),
        None => get_devstack_dir().join(file_name),
    }
}

/// Path of the `.bak` sibling kept next to a patched configuration file.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".bak");
    PathBuf::from(name)
}

/// Home-relative path helper for dotfiles owned by a managed service.
pub fn home_path(relative: &str) -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(relative))
}
