// This module manages the stanzas the provisioner adds to shell startup files
// (`~/.bashrc`, and `~/.zshrc` when the user has one).
//
// Every stanza is fenced by a begin/end marker pair carrying the owning service's id:
//
//     # >>> setup-devstack: pyenv >>>
//     export PYENV_ROOT="/home/dev/.pyenv"
//     ...
//     # <<< setup-devstack: pyenv <<<
//
// Updates and removals locate stanzas by those markers only, never by matching the
// content of individual lines, so unrelated user content is never touched.

use std::path::{Path, PathBuf};

use colored::Colorize;

use crate::libs::utilities::file_operations::{read_lines, write_lines};
use crate::{log_debug, log_warn};

const MARKER_OWNER: &str = "setup-devstack";

pub fn begin_marker(id: &str) -> String {
    format!("# >>> {MARKER_OWNER}: {id} >>>")
}

pub fn end_marker(id: &str) -> String {
    format!("# <<< {MARKER_OWNER}: {id} <<<")
}

/// Locates a complete `begin..=end` block for `id`.
fn find_block(lines: &[String], id: &str) -> Option<(usize, usize)> {
    let begin = begin_marker(id);
    let end = end_marker(id);
    let start = lines.iter().position(|l| l.trim() == begin)?;
    let stop = lines[start..].iter().position(|l| l.trim() == end)? + start;
    Some((start, stop))
}

/// Inserts or refreshes the block for `id`.
///
/// # Returns
/// * `true` if `lines` changed.
pub fn upsert_block(lines: &mut Vec<String>, id: &str, body: &[String]) -> bool {
    let mut block = Vec::with_capacity(body.len() + 2);
    block.push(begin_marker(id));
    block.extend(body.iter().cloned());
    block.push(end_marker(id));

    if let Some((start, stop)) = find_block(lines, id) {
        if lines[start..=stop] == block[..] {
            return false;
        }
        lines.splice(start..=stop, block);
        return true;
    }

    if lines.iter().any(|l| l.trim() == begin_marker(id)) {
        // A begin marker without its end: the user edited the block. Leave it and add
        // a fresh one rather than guess where the old one stopped.
        log_warn!(
            "[Shell Profile] Found an unterminated '{}' block; appending a new one",
            id.yellow()
        );
    }
    if lines.last().is_some_and(|l| !l.trim().is_empty()) {
        lines.push(String::new());
    }
    lines.extend(block);
    true
}

/// Removes every complete block for `id`.
///
/// # Returns
/// * the number of blocks removed.
pub fn remove_block(lines: &mut Vec<String>, id: &str) -> usize {
    let mut removed = 0;
    while let Some((start, stop)) = find_block(lines, id) {
        lines.drain(start..=stop);
        // Drop the blank separator we added in front of the block.
        if start > 0 && start <= lines.len() && lines[start - 1].trim().is_empty() {
            lines.remove(start - 1);
        }
        removed += 1;
    }
    removed
}

/// Shell startup files the provisioner manages.
pub fn profile_paths() -> Vec<PathBuf> {
    let Some(home) = dirs::home_dir() else {
        log_warn!("[Shell Profile] Could not determine the home directory");
        return vec![];
    };
    let mut paths = vec![home.join(".bashrc")];
    let zshrc = home.join(".zshrc");
    if zshrc.exists() {
        paths.push(zshrc);
    }
    paths
}

/// Writes the block for `id` into `profile`, creating the file if needed.
pub fn apply_block(profile: &Path, id: &str, body: &[String]) -> std::io::Result<bool> {
    let mut lines = read_lines(profile);
    if !upsert_block(&mut lines, id, body) {
        log_debug!("[Shell Profile] '{}' block in {} is current", id, profile.display());
        return Ok(false);
    }
    write_lines(profile, &lines)?;
    Ok(true)
}

/// Removes the block for `id` from `profile`.
pub fn strip_block(profile: &Path, id: &str) -> std::io::Result<usize> {
    if !profile.exists() {
        return Ok(0);
    }
    let mut lines = read_lines(profile);
    let removed = remove_block(&mut lines, id);
    if removed > 0 {
        write_lines(profile, &lines)?;
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn block_is_appended_then_refreshed_in_place() {
        let mut profile = lines("alias ll='ls -l'");
        assert!(upsert_block(&mut profile, "nvm", &["export NVM_DIR=/a".into()]));
        assert!(!upsert_block(&mut profile, "nvm", &["export NVM_DIR=/a".into()]));
        assert!(upsert_block(&mut profile, "nvm", &["export NVM_DIR=/b".into()]));
        assert_eq!(
            profile,
            lines(
                "alias ll='ls -l'\n\n# >>> setup-devstack: nvm >>>\nexport NVM_DIR=/b\n# <<< setup-devstack: nvm <<<"
            )
        );
    }

    #[test]
    fn removal_only_touches_marked_content() {
        let mut profile = lines(
            "export NVM_DIR=/mine\n\n# >>> setup-devstack: nvm >>>\nexport NVM_DIR=/b\n# <<< setup-devstack: nvm <<<\nexport PATH=$PATH:/x",
        );
        assert_eq!(remove_block(&mut profile, "nvm"), 1);
        assert_eq!(profile, lines("export NVM_DIR=/mine\nexport PATH=$PATH:/x"));
        assert_eq!(remove_block(&mut profile, "nvm"), 0);
    }

    #[test]
    fn unterminated_blocks_are_left_alone() {
        let mut profile = lines("# >>> setup-devstack: pyenv >>>\neval \"$(pyenv init -)\"");
        assert_eq!(remove_block(&mut profile, "pyenv"), 0);
        assert_eq!(profile.len(), 2);
    }

    #[test]
    fn file_round_trip_creates_and_strips() {
        let dir = tempfile::tempdir().unwrap();
        let rc = dir.path().join(".bashrc");
        std::fs::write(&rc, "# user stuff\n").unwrap();

        assert!(apply_block(&rc, "pyenv", &["export PYENV_ROOT=/p".into()]).unwrap());
        assert!(!apply_block(&rc, "pyenv", &["export PYENV_ROOT=/p".into()]).unwrap());
        assert_eq!(strip_block(&rc, "pyenv").unwrap(), 1);
        assert_eq!(std::fs::read_to_string(&rc).unwrap(), "# user stuff\n");
        assert_eq!(strip_block(&dir.path().join(".zshrc"), "pyenv").unwrap(), 0);
    }
}
