//! SQLite persistence for the portal.
//!
//! A `Database` is only a path plus connection settings; every operation
//! opens its own connection, so the type is cheap to clone into request
//! handlers and blocking tasks.

pub mod users;

use crate::error::Result;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    username    TEXT PRIMARY KEY,
    first_name  TEXT NOT NULL DEFAULT '',
    last_name   TEXT NOT NULL DEFAULT '',
    email       TEXT NOT NULL DEFAULT '',
    is_staff    INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS user_permissions (
    username    TEXT NOT NULL REFERENCES users(username) ON DELETE CASCADE,
    permission  TEXT NOT NULL,
    PRIMARY KEY (username, permission)
);

CREATE TABLE IF NOT EXISTS site_status (
    site_id     TEXT PRIMARY KEY CHECK (length(site_id) = 2),
    site_name   TEXT NOT NULL CHECK (length(site_name) <= 30),
    username    TEXT CHECK (username IS NULL OR length(username) <= 30),
    date        TEXT,
    status      TEXT NOT NULL CHECK (status IN ('y', 'n', 'r')),
    description TEXT CHECK (description IS NULL OR length(description) <= 150)
);

CREATE TABLE IF NOT EXISTS site_status_history (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id     TEXT NOT NULL REFERENCES site_status(site_id) ON DELETE RESTRICT,
    username    TEXT CHECK (username IS NULL OR length(username) <= 30),
    date        TEXT,
    status      TEXT NOT NULL CHECK (status IN ('y', 'n', 'r')),
    description TEXT CHECK (description IS NULL OR length(description) <= 150)
);

CREATE TABLE IF NOT EXISTS info_file_locks (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    filepath    TEXT NOT NULL UNIQUE,
    starttime   TEXT NOT NULL,
    locked      INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS site_info_updates (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    user_updated     TEXT NOT NULL REFERENCES users(username) ON DELETE RESTRICT,
    datetime_updated TEXT NOT NULL,
    site_id          TEXT NOT NULL CHECK (length(site_id) = 2),
    long_name        TEXT NOT NULL CHECK (length(long_name) <= 32),
    release_lag      INTEGER NOT NULL CHECK (release_lag >= 0),
    location         TEXT NOT NULL CHECK (length(location) <= 256),
    contact          TEXT NOT NULL CHECK (length(contact) <= 256),
    site_reference   TEXT NOT NULL DEFAULT '',
    data_doi         TEXT NOT NULL,
    data_reference   TEXT NOT NULL DEFAULT '',
    data_revision    TEXT NOT NULL CHECK (length(data_revision) <= 8)
);

CREATE TABLE IF NOT EXISTS qc_reports (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    reviewer          TEXT NOT NULL DEFAULT '',
    site              TEXT NOT NULL DEFAULT '',
    netcdf_files      TEXT NOT NULL DEFAULT '',
    is_draft          INTEGER NOT NULL DEFAULT 1,
    answers           TEXT NOT NULL DEFAULT '{}',
    modification_time TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_qc_reports_site ON qc_reports(site);

CREATE TABLE IF NOT EXISTS site_reviewers (
    site      TEXT PRIMARY KEY,
    editor    TEXT NOT NULL REFERENCES users(username) ON DELETE RESTRICT,
    reviewer1 TEXT NOT NULL REFERENCES users(username) ON DELETE RESTRICT,
    reviewer2 TEXT NOT NULL REFERENCES users(username) ON DELETE RESTRICT
);
";

#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
    busy_timeout: Duration,
}

impl Database {
    /// Opens (or creates) the database at `path` and makes sure every table
    /// exists.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let db = Database {
            path: path.as_ref().to_path_buf(),
            busy_timeout,
        };
        let conn = db.connect()?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        conn.execute_batch(SCHEMA)?;
        log::debug!("Database ready at {}", db.path.display());
        Ok(db)
    }

    /// A new connection with the portal's pragmas applied.
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tempfile::TempDir;

    /// A database in a fresh temporary directory. Keep the `TempDir` alive
    /// for as long as the database is used.
    pub fn temp_db() -> (TempDir, Database) {
        let dir = tempfile::tempdir().expect("temp dir");
        let db = Database::open(dir.path().join("test.sqlite"), Duration::from_secs(30))
            .expect("database should open");
        (dir, db)
    }

    /// Stores a user with the given staff flag and permissions.
    pub fn add_user(db: &Database, username: &str, is_staff: bool, perms: &[&str]) {
        let conn = db.connect().expect("connection");
        super::users::upsert_user(
            &conn,
            &tccon_common::model::reviewers::User {
                username: username.to_string(),
                first_name: String::new(),
                last_name: String::new(),
                email: format!("{}@example.org", username),
                is_staff,
            },
        )
        .expect("user insert");
        for perm in perms {
            super::users::grant_permission(&conn, username, perm).expect("permission insert");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::temp_db;

    #[test]
    fn open_creates_tables() {
        let (_dir, db) = temp_db();
        let conn = db.connect().unwrap();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        for expected in [
            "info_file_locks",
            "qc_reports",
            "site_info_updates",
            "site_reviewers",
            "site_status",
            "site_status_history",
            "user_permissions",
            "users",
        ] {
            assert!(tables.iter().any(|t| t == expected), "missing table {expected}");
        }
    }

    #[test]
    fn reopening_is_idempotent() {
        let (dir, db) = temp_db();
        drop(db);
        super::Database::open(dir.path().join("test.sqlite"), std::time::Duration::from_secs(1))
            .expect("second open should succeed");
    }
}
