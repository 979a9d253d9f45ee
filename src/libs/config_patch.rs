//! # Idempotent Configuration Patching
//!
//! Service configuration files are edited with *patch rules*, never rewritten wholesale.
//! A directive rule is satisfied on both paths:
//!
//! - **present**: the first active (uncommented) occurrence is rewritten in place, keeping
//!   its indentation, and any later active duplicates are dropped;
//! - **absent**: the directive is appended, either at the end of the file or right after an
//!   anchor line (e.g. inside nginx's `http {` block).
//!
//! Either way exactly one active occurrence remains, so applying the same rules to an
//! already patched file yields byte-identical output and no write happens.

use std::path::Path;

use colored::Colorize;

use crate::libs::errors::Result;
use crate::libs::executor::Privilege;
use crate::libs::host::Host;
use crate::libs::utilities::path_helpers::backup_path;
use crate::{log_debug, log_info};

/// How a directive is written in a given file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveStyle {
    /// `key value` (redis.conf)
    Space,
    /// `key = value` (postgresql.conf)
    Equals,
    /// `key value;` (nginx.conf)
    Semicolon,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchRule {
    /// Set `key` to `value`.
    Directive {
        key: String,
        value: String,
        style: DirectiveStyle,
        /// When appending, insert after the first line starting with this text.
        anchor: Option<String>,
    },
    /// Make sure this exact line (whitespace-normalised) is present once.
    EnsureLine(String),
}

impl PatchRule {
    pub fn directive(key: &str, value: impl Into<String>, style: DirectiveStyle) -> Self {
        PatchRule::Directive {
            key: key.to_string(),
            value: value.into(),
            style,
            anchor: None,
        }
    }

    pub fn directive_in_block(key: &str, value: impl Into<String>, style: DirectiveStyle, anchor: &str) -> Self {
        PatchRule::Directive {
            key: key.to_string(),
            value: value.into(),
            style,
            anchor: Some(anchor.to_string()),
        }
    }

    pub fn ensure_line(line: impl Into<String>) -> Self {
        PatchRule::EnsureLine(line.into())
    }

    /// Short label for logs.
    pub fn label(&self) -> &str {
        match self {
            PatchRule::Directive { key, .. } => key,
            PatchRule::EnsureLine(line) => line,
        }
    }
}

fn render(key: &str, value: &str, style: DirectiveStyle) -> String {
    match style {
        DirectiveStyle::Space => format!("{key} {value}"),
        DirectiveStyle::Equals => format!("{key} = {value}"),
        DirectiveStyle::Semicolon => format!("{key} {value};"),
    }
}

/// `true` when `line` is an active (uncommented) occurrence of `key`.
fn is_directive(line: &str, key: &str) -> bool {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') {
        return false;
    }
    let name_end = trimmed
        .find(|c: char| c.is_whitespace() || c == '=' || c == ';')
        .unwrap_or(trimmed.len());
    &trimmed[..name_end] == key
}

fn normalise(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Result of applying rules to a file's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchResult {
    pub content: String,
    /// One entry per rule that changed something.
    pub changes: Vec<String>,
}

impl PatchResult {
    pub fn changed(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// Applies `rules` in order to `content`. Pure: no I/O.
pub fn apply_rules(content: &str, rules: &[PatchRule]) -> PatchResult {
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
    let mut changes = Vec::new();

    for rule in rules {
        match rule {
            PatchRule::Directive {
                key,
                value,
                style,
                anchor,
            } => {
                let wanted = render(key, value, *style);
                let hits: Vec<usize> = lines
                    .iter()
                    .enumerate()
                    .filter(|(_, line)| is_directive(line, key))
                    .map(|(i, _)| i)
                    .collect();

                match hits.split_first() {
                    Some((&first, rest)) => {
                        let indent: String = lines[first]
                            .chars()
                            .take_while(|c| c.is_whitespace())
                            .collect();
                        let replacement = format!("{indent}{wanted}");
                        let mut changed = false;
                        if lines[first] != replacement {
                            lines[first] = replacement;
                            changed = true;
                        }
                        for &dup in rest.iter().rev() {
                            lines.remove(dup);
                            changed = true;
                        }
                        if changed {
                            changes.push(format!("replaced '{key}'"));
                        }
                    }
                    None => {
                        let anchor_at = anchor.as_deref().and_then(|a| {
                            lines.iter().position(|line| line.trim_start().starts_with(a))
                        });
                        match anchor_at {
                            Some(at) => lines.insert(at + 1, format!("    {wanted}")),
                            None => lines.push(wanted),
                        }
                        changes.push(format!("appended '{key}'"));
                    }
                }
            }
            PatchRule::EnsureLine(line) => {
                let wanted = normalise(line);
                if !lines.iter().any(|existing| normalise(existing) == wanted) {
                    lines.push(line.clone());
                    changes.push(format!("appended '{line}'"));
                }
            }
        }
    }

    let mut patched = lines.join("\n");
    if !patched.is_empty() {
        patched.push('\n');
    }
    // Untouched files keep their exact bytes (e.g. a missing trailing newline).
    if changes.is_empty() {
        patched = content.to_string();
    }
    PatchResult {
        content: patched,
        changes,
    }
}

/// Patches a configuration file on the host.
///
/// # Workflow
/// 1. Read the live file (fatal if unreadable).
/// 2. Apply the rules in memory.
/// 3. If nothing changed, stop: no backup, no write.
/// 4. Otherwise take a `.bak` copy, unless one already exists from an earlier run,
///    then write the patched content.
///
/// # Returns
/// * `Ok(true)` when the file was rewritten, `Ok(false)` when it already complied.
pub fn patch_file(host: &Host, step: &str, path: &Path, rules: &[PatchRule], privilege: &Privilege) -> Result<bool> {
    let original = host.read_file(step, path, privilege)?;
    let result = apply_rules(&original, rules);

    if !result.changed() {
        log_debug!(
            "{} {} already satisfies {} rule(s)",
            step,
            path.display(),
            rules.len()
        );
        return Ok(false);
    }

    let backup = backup_path(path);
    if !host.path_exists(step, &backup, privilege) {
        host.copy_file(step, path, &backup, privilege)?;
        log_debug!("{} Backed up {} to {}", step, path.display(), backup.display());
    }

    host.write_file(step, path, &result.content, privilege)?;
    log_info!(
        "{} Patched {}: {}",
        step,
        path.display().to_string().cyan(),
        result.changes.join(", ")
    );
    Ok(true)
}
