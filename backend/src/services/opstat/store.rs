//! Queries on `site_status` and `site_status_history`.

use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tccon_common::model::status::{OperationalStatus, SiteStatus, SiteStatusHistory};
use tccon_common::sites::SITE_ID_TO_NAME;

struct StatusCode(OperationalStatus);

impl FromSql for StatusCode {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let code = value.as_str()?;
        OperationalStatus::from_code(code)
            .map(StatusCode)
            .ok_or_else(|| FromSqlError::Other(format!("unknown status code {:?}", code).into()))
    }
}

fn status_from_row(row: &Row<'_>) -> rusqlite::Result<SiteStatus> {
    Ok(SiteStatus {
        site_id: row.get(0)?,
        site_name: row.get(1)?,
        username: row.get(2)?,
        date: row.get(3)?,
        status: row.get::<_, StatusCode>(4)?.0,
        description: row.get(5)?,
    })
}

fn history_from_row(row: &Row<'_>) -> rusqlite::Result<SiteStatusHistory> {
    Ok(SiteStatusHistory {
        id: row.get(0)?,
        site_id: row.get(1)?,
        username: row.get(2)?,
        date: row.get(3)?,
        status: row.get::<_, StatusCode>(4)?.0,
        description: row.get(5)?,
    })
}

const STATUS_COLUMNS: &str = "site_id, site_name, username, date, status, description";
const HISTORY_COLUMNS: &str = "id, site_id, username, date, status, description";

pub fn list(conn: &Connection) -> Result<Vec<SiteStatus>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM site_status ORDER BY site_id",
        STATUS_COLUMNS
    ))?;
    let rows = stmt
        .query_map([], status_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn get(conn: &Connection, site_id: &str) -> Result<Option<SiteStatus>> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM site_status WHERE site_id = ?1", STATUS_COLUMNS),
            params![site_id],
            status_from_row,
        )
        .optional()?;
    Ok(row)
}

/// Sites whose name matches exactly. More than one result means the name is
/// ambiguous.
pub fn find_by_name(conn: &Connection, name: &str) -> Result<Vec<SiteStatus>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM site_status WHERE site_name = ?1 ORDER BY site_id",
        STATUS_COLUMNS
    ))?;
    let rows = stmt
        .query_map(params![name], status_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn add_site(conn: &Connection, site_id: &str, site_name: &str, status: OperationalStatus) -> Result<()> {
    conn.execute(
        "INSERT INTO site_status (site_id, site_name, status) VALUES (?1, ?2, ?3)",
        params![site_id, site_name, status.code()],
    )?;
    Ok(())
}

/// Fills an empty status table with the known TCCON sites, all marked not
/// operational until someone reports otherwise. Returns how many were added.
pub fn seed_known_sites(conn: &mut Connection) -> Result<usize> {
    let existing: i64 = conn.query_row("SELECT COUNT(*) FROM site_status", [], |r| r.get(0))?;
    if existing > 0 {
        return Ok(0);
    }
    let tx = conn.transaction()?;
    for (site_id, name) in SITE_ID_TO_NAME {
        add_site(&tx, site_id, name, OperationalStatus::No)?;
    }
    tx.commit()?;
    Ok(SITE_ID_TO_NAME.len())
}

/// Sets the current status of a site and appends the matching history row.
/// Both writes share one transaction: if either fails neither is kept.
pub fn update_status(
    conn: &mut Connection,
    site_id: &str,
    status: OperationalStatus,
    description: &str,
    username: &str,
) -> Result<DateTime<Utc>> {
    let now = Utc::now();
    let tx = conn.transaction()?;
    let updated = tx.execute(
        "UPDATE site_status SET status = ?2, description = ?3, date = ?4, username = ?5
         WHERE site_id = ?1",
        params![site_id, status.code(), description, now, username],
    )?;
    if updated == 0 {
        return Err(rusqlite::Error::QueryReturnedNoRows.into());
    }
    tx.execute(
        "INSERT INTO site_status_history (site_id, username, date, status, description)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![site_id, username, now, status.code(), description],
    )?;
    tx.commit()?;
    log::info!("{} set status of {} to {}", username, site_id, status.api_word());
    Ok(now)
}

/// History of one site, newest first.
pub fn history(conn: &Connection, site_id: &str) -> Result<Vec<SiteStatusHistory>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM site_status_history WHERE site_id = ?1 ORDER BY date DESC, id DESC",
        HISTORY_COLUMNS
    ))?;
    let rows = stmt
        .query_map(params![site_id], history_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// History of every site, newest first.
pub fn all_history(conn: &Connection) -> Result<Vec<SiteStatusHistory>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM site_status_history ORDER BY date DESC, id DESC",
        HISTORY_COLUMNS
    ))?;
    let rows = stmt
        .query_map([], history_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::temp_db;
    use crate::error::PortalError;

    fn with_site() -> (tempfile::TempDir, Connection) {
        let (dir, db) = temp_db();
        let conn = db.connect().unwrap();
        add_site(&conn, "pa", "Park Falls", OperationalStatus::Yes).unwrap();
        (dir, conn)
    }

    #[test]
    fn update_writes_status_and_history() {
        let (_dir, mut conn) = with_site();
        update_status(&mut conn, "pa", OperationalStatus::No, "laser down", "alice").unwrap();

        let current = get(&conn, "pa").unwrap().unwrap();
        assert_eq!(current.status, OperationalStatus::No);
        assert_eq!(current.description.as_deref(), Some("laser down"));
        assert_eq!(current.username.as_deref(), Some("alice"));

        let hist = history(&conn, "pa").unwrap();
        assert_eq!(hist.len(), 1);
        assert_eq!(hist[0].date, current.date);
    }

    #[test]
    fn identical_resubmission_appends_history() {
        let (_dir, mut conn) = with_site();
        for _ in 0..2 {
            update_status(&mut conn, "pa", OperationalStatus::Yes, "ok", "alice").unwrap();
        }
        let hist = history(&conn, "pa").unwrap();
        assert_eq!(hist.len(), 2);
        assert!(hist[0].id > hist[1].id, "newest first");
    }

    #[test]
    fn failed_history_insert_rolls_back_status() {
        let (_dir, mut conn) = with_site();
        conn.execute_batch(
            "CREATE TRIGGER fail_history BEFORE INSERT ON site_status_history
             BEGIN SELECT RAISE(ABORT, 'history is read only'); END;",
        )
        .unwrap();

        let err = update_status(&mut conn, "pa", OperationalStatus::Retired, "gone", "bob").unwrap_err();
        assert!(err.last_line().contains("history is read only"));

        let current = get(&conn, "pa").unwrap().unwrap();
        assert_eq!(current.status, OperationalStatus::Yes);
        assert!(current.username.is_none());
        assert!(history(&conn, "pa").unwrap().is_empty());
    }

    #[test]
    fn overlong_description_is_rejected_atomically() {
        let (_dir, mut conn) = with_site();
        let long = "x".repeat(151);
        let err = update_status(&mut conn, "pa", OperationalStatus::No, &long, "bob").unwrap_err();
        assert!(matches!(err, PortalError::Database(_)));
        assert_eq!(get(&conn, "pa").unwrap().unwrap().status, OperationalStatus::Yes);
        assert!(all_history(&conn).unwrap().is_empty());

        update_status(&mut conn, "pa", OperationalStatus::No, &"x".repeat(150), "bob").unwrap();
    }

    #[test]
    fn unknown_site_is_an_error() {
        let (_dir, mut conn) = with_site();
        assert!(update_status(&mut conn, "zz", OperationalStatus::No, "", "bob").is_err());
        assert!(all_history(&conn).unwrap().is_empty());
    }

    #[test]
    fn seeding_only_fills_an_empty_table() {
        let (_dir, db) = temp_db();
        let mut conn = db.connect().unwrap();
        let added = seed_known_sites(&mut conn).unwrap();
        assert_eq!(added, SITE_ID_TO_NAME.len());
        assert_eq!(seed_known_sites(&mut conn).unwrap(), 0);
        // JPL appears under three ids.
        assert_eq!(find_by_name(&conn, "JPL").unwrap().len(), 3);
    }
}
