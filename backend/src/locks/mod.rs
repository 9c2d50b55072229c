//! Lock-guarded access to the shared JSON files.
//!
//! A row of `info_file_locks` acts as the named mutex for one file. The row
//! is claimed inside an immediate (write) transaction and released in the
//! same transaction, so whoever holds the transaction holds the file. SQLite
//! write locks are database wide: two holders never run at the same time,
//! whatever their keys, and a crashed holder's transaction is rolled back
//! by SQLite itself.
//!
//! Callbacks must not call back into [`FileLocks`]: the nested call would
//! wait on the outer transaction until the busy timeout expires.

mod backup;
mod metadata;

pub use backup::{backup_file_rolling, backup_path};
pub use metadata::MetadataRepo;

use crate::db::Database;
use crate::error::{PortalError, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Transaction, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// The lock row as it stands while a callback runs.
#[derive(Debug, Clone, PartialEq)]
pub struct LockRecord {
    pub id: i64,
    pub filepath: String,
    pub starttime: DateTime<Utc>,
}

/// Handed to a callback while it holds a lock.
///
/// Database writes made through [`LockHandle::transaction`] commit together
/// with the lock release, or roll back with it.
pub struct LockHandle<'a> {
    tx: &'a Transaction<'a>,
    record: LockRecord,
}

impl<'a> LockHandle<'a> {
    pub fn transaction(&self) -> &Transaction<'a> {
        self.tx
    }

    pub fn record(&self) -> &LockRecord {
        &self.record
    }
}

#[derive(Debug, Clone)]
pub struct FileLocks {
    db: Database,
}

impl FileLocks {
    pub fn new(db: Database) -> Self {
        FileLocks { db }
    }

    /// Runs `callback` while holding the lock for `key`.
    ///
    /// The lock is released whichever way the callback exits: on `Ok` the
    /// release is committed, on `Err` or panic the transaction is rolled back
    /// and the lock table is left as it was before the call.
    pub fn execute<T, F>(&self, key: impl AsRef<Path>, callback: F) -> Result<T>
    where
        F: FnOnce(&LockHandle<'_>) -> Result<T>,
    {
        let filepath = resolve_key(key.as_ref());
        let key_text = filepath.to_string_lossy().into_owned();

        let mut conn = self.db.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let starttime = Utc::now();

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM info_file_locks WHERE filepath = ?1",
                params![&key_text],
                |row| row.get(0),
            )
            .optional()?;
        let id = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE info_file_locks SET locked = 1, starttime = ?2 WHERE id = ?1",
                    params![id, starttime],
                )?;
                id
            }
            None => {
                tx.execute(
                    "INSERT INTO info_file_locks (filepath, starttime, locked) VALUES (?1, ?2, 1)",
                    params![&key_text, starttime],
                )?;
                tx.last_insert_rowid()
            }
        };
        log::debug!("Acquired lock {} on {}", id, key_text);

        let result = {
            let handle = LockHandle {
                tx: &tx,
                record: LockRecord {
                    id,
                    filepath: key_text.clone(),
                    starttime,
                },
            };
            callback(&handle)
        };

        let value = match result {
            Ok(value) => value,
            Err(e) => {
                log::debug!("Callback under lock {} failed, rolling back: {}", id, e);
                return Err(e);
            }
        };

        tx.execute(
            "UPDATE info_file_locks SET locked = 0 WHERE id = ?1",
            params![id],
        )?;
        tx.commit()?;
        log::debug!("Released lock {} on {}", id, key_text);
        Ok(value)
    }

    /// Reads and parses a JSON file under its lock.
    pub fn read_json_file<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        self.execute(path, |_| read_json(path))
    }

    /// Serializes `data` into `path` under its lock.
    ///
    /// The file is truncated and written in place, not swapped in from a
    /// temporary file, so a crash mid-write can leave a partial file behind.
    pub fn write_json_file<T: Serialize>(&self, path: &Path, data: &T) -> Result<()> {
        self.execute(path, |_| write_json(path, data))
    }

    /// Read, modify, back up and rewrite `path` without releasing the lock
    /// in between. The rolling backup is skipped if the file does not exist
    /// yet; a missing file is read as `T::default()`.
    pub fn update_json_file<T, R, F>(&self, path: &Path, n_backups: usize, modify: F) -> Result<R>
    where
        T: DeserializeOwned + Serialize + Default,
        F: FnOnce(&mut T, &LockHandle<'_>) -> Result<R>,
    {
        self.execute(path, |handle| {
            let mut data: T = if path.exists() {
                read_json(path)?
            } else {
                T::default()
            };
            let outcome = modify(&mut data, handle)?;
            if path.exists() {
                backup_file_rolling(path, n_backups)?;
            }
            write_json(path, &data)?;
            Ok(outcome)
        })
    }

    /// Reads `name` from the metadata directory, keyed on the directory
    /// itself. A missing file reads as `T::default()` when `allow_missing`.
    pub fn read_metadata_file<T>(&self, metadata_dir: &Path, name: &str, allow_missing: bool) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        self.execute(metadata_dir, |_| {
            let json_file = metadata_dir.join(name);
            if !json_file.exists() && allow_missing {
                return Ok(T::default());
            }
            read_json(&json_file)
        })
    }

    /// Writes `data` to `name` in the metadata directory and records the
    /// change in the directory's Git repository.
    ///
    /// If the file already differs from the index, its current state is
    /// committed first so that every portal edit shows up as its own commit.
    /// Without a repository the file is still written and a warning logged.
    pub fn update_metadata_repo<T: Serialize>(
        &self,
        metadata_dir: &Path,
        name: &str,
        data: &T,
        username: &str,
        git: &crate::config::GitConfig,
    ) -> Result<()> {
        self.execute(metadata_dir, |_| {
            let repo = MetadataRepo::open(metadata_dir, git)?;

            if let Some(repo) = &repo {
                if repo.has_file_changed(name)? {
                    repo.commit_file(
                        name,
                        &format!(
                            "Commit state of {} before change submitted by {}",
                            name, username
                        ),
                    )?;
                }
            }

            write_json(&metadata_dir.join(name), data)?;

            if let Some(repo) = &repo {
                repo.commit_file(
                    name,
                    &format!("Commit change to {} submitted by {}", name, username),
                )?;
            }
            Ok(())
        })
    }
}

/// Canonical absolute form of a lock key.
///
/// Symlinks are resolved for the part of the path that exists; the rest is
/// appended unchanged, so files that do not exist yet still get a stable key.
pub fn resolve_key(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    if let Ok(canonical) = absolute.canonicalize() {
        return canonical;
    }

    let mut missing = Vec::new();
    let mut current = absolute.as_path();
    while let Some(parent) = current.parent() {
        if let Some(name) = current.file_name() {
            missing.push(name.to_os_string());
        }
        if let Ok(mut resolved) = parent.canonicalize() {
            for name in missing.iter().rev() {
                resolved.push(name);
            }
            return resolved;
        }
        current = parent;
    }
    absolute
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).map_err(|e| PortalError::io(path, e))?;
    serde_json::from_str(&raw).map_err(|e| PortalError::json(path, e))
}

pub(crate) fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    data.serialize(&mut ser)?;
    buf.push(b'\n');

    let mut file = fs::File::create(path).map_err(|e| PortalError::io(path, e))?;
    file.write_all(&buf).map_err(|e| PortalError::io(path, e))?;
    Ok(())
}
