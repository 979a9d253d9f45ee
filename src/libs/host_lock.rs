// Host-wide advisory lock.
//
// Two provisioning runs on the same machine would race on apt, systemd and the config
// files, so every mutating command holds an exclusive lock on a well-known file for its
// whole duration. The lock file also records who holds it, which is what the second
// run reports when it refuses to start.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use colored::Colorize;
use fs4::FileExt;
use serde::{Deserialize, Serialize};

use crate::libs::errors::{ProvisionError, Result};
use crate::log_debug;

const LOCK_FILE_NAME: &str = "setup-devstack.lock";

/// Who holds the lock, written into the lock file as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub pid: u32,
    pub started_at: DateTime<Local>,
    pub command: String,
}

impl LockRecord {
    fn describe(&self) -> String {
        format!(
            "pid {} running `{}` since {}",
            self.pid,
            self.command,
            self.started_at.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

/// `$TMPDIR/setup-devstack.lock`.
pub fn default_lock_path() -> PathBuf {
    std::env::temp_dir().join(LOCK_FILE_NAME)
}

/// Held for as long as the value lives; dropping it closes the file and releases the lock.
#[derive(Debug)]
pub struct HostLock {
    path: PathBuf,
    _file: File,
}

impl HostLock {
    /// Takes the lock without waiting.
    ///
    /// # Returns
    /// * `Err(ProvisionError::LockHeld)` when another run holds it, with that run's record.
    pub fn acquire(path: &Path, command: &str) -> Result<HostLock> {
        let context = |what: &str| format!("[Lock] {what} {}", path.display());

        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| ProvisionError::io(context("opening"), e))?;

        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::WouldBlock => {
                return Err(ProvisionError::LockHeld {
                    path: path.to_path_buf(),
                    holder: read_holder(&mut file),
                });
            }
            Err(err) => return Err(ProvisionError::io(context("locking"), err)),
        }

        let record = LockRecord {
            pid: std::process::id(),
            started_at: Local::now(),
            command: command.to_string(),
        };
        let json = serde_json::to_string(&record)
            .map_err(|e| ProvisionError::io(context("encoding record for"), e.into()))?;
        file.set_len(0)
            .and_then(|_| file.seek(SeekFrom::Start(0)))
            .and_then(|_| file.write_all(json.as_bytes()))
            .and_then(|_| file.flush())
            .map_err(|e| ProvisionError::io(context("writing"), e))?;

        log_debug!("[Lock] Acquired {} ({})", path.display().to_string().cyan(), record.describe());
        Ok(HostLock {
            path: path.to_path_buf(),
            _file: file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_holder(file: &mut File) -> String {
    let mut text = String::new();
    if file.read_to_string(&mut text).is_err() {
        return "holder unknown".to_string();
    }
    serde_json::from_str::<LockRecord>(&text)
        .map(|record| record.describe())
        .unwrap_or_else(|_| "holder unknown".to_string())
}
