use crate::log_warn;
use colored::Colorize;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Writes all lines back to a text file (shell profile, `.gitignore`, ...).
///
/// # Formatting
/// - Joins all lines with newline characters
/// - Ensures the file ends with a trailing newline for proper shell parsing
/// - Empty content produces an empty file
pub fn write_lines(path: &Path, lines: &[String]) -> std::io::Result<()> {
    let content = lines.join("\n");
    let final_content = if content.is_empty() {
        content
    } else {
        format!("{content}\n")
    };
    fs::write(path, final_content)
}

/// Reads a text file line by line, preserving comments and blank lines.
///
/// A missing file is treated as empty. An unreadable file logs a warning and is
/// also treated as empty, so callers never clobber content they could not see:
/// they only write when they have something to add.
pub fn read_lines(path: &Path) -> Vec<String> {
    if !path.exists() {
        return vec![];
    }

    match fs::File::open(path) {
        Ok(file) => BufReader::new(file).lines().map_while(Result::ok).collect(),
        Err(err) => {
            log_warn!(
                "[Files] Could not read {}: {}. Using empty file.",
                path.display().to_string().red(),
                err.to_string().red()
            );
            vec![]
        }
    }
}

/// Appends each of `wanted` that is not already present as a whole (trimmed) line.
///
/// Returns the number of lines added. The file is untouched when nothing is missing.
pub fn ensure_lines(path: &Path, wanted: &[&str]) -> std::io::Result<usize> {
    let mut lines = read_lines(path);
    let missing: Vec<String> = wanted
        .iter()
        .filter(|want| !lines.iter().any(|line| line.trim() == want.trim()))
        .map(|want| want.to_string())
        .collect();

    if missing.is_empty() {
        return Ok(0);
    }
    let added = missing.len();
    lines.extend(missing);
    write_lines(path, &lines)?;
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ensure_lines_appends_only_missing_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".gitignore");
        fs::write(&path, "# ours\nbackend/.venv/\n").unwrap();

        let added = ensure_lines(&path, &["frontend/node_modules/", "backend/.venv/"]).unwrap();
        assert_eq!(added, 1);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "# ours\nbackend/.venv/\nfrontend/node_modules/\n"
        );

        assert_eq!(ensure_lines(&path, &["frontend/node_modules/"]).unwrap(), 0);
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_lines(&dir.path().join("nope")).is_empty());
    }
}
