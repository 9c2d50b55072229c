//! Queries on `qc_reports` and `site_reviewers`.

use crate::error::{PortalError, Result};
use chrono::{Days, NaiveDate, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use tccon_common::model::qc::QcReport;
use tccon_common::model::reviewers::{SiteReviewers, User};

const REPORT_COLUMNS: &str = "id, reviewer, site, netcdf_files, is_draft, answers, modification_time";

fn report_from_row(row: &Row<'_>) -> rusqlite::Result<QcReport> {
    let answers: String = row.get(5)?;
    let answers: BTreeMap<String, String> = serde_json::from_str(&answers)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e)))?;
    Ok(QcReport {
        id: row.get(0)?,
        reviewer: row.get(1)?,
        site: row.get(2)?,
        netcdf_files: row.get(3)?,
        is_draft: row.get(4)?,
        answers,
        modification_time: row.get(6)?,
    })
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<QcReport>> {
    let report = conn
        .query_row(
            &format!("SELECT {} FROM qc_reports WHERE id = ?1", REPORT_COLUMNS),
            params![id],
            report_from_row,
        )
        .optional()?;
    Ok(report)
}

/// Inserts or updates `report`, stamping its modification time, and
/// returns its id. Updating an id that no longer exists is an error.
pub fn save(conn: &Connection, report: &mut QcReport) -> Result<i64> {
    let now = Utc::now();
    let answers = serde_json::to_string(&report.answers)?;
    let id = match report.id {
        Some(id) => {
            let n = conn.execute(
                "UPDATE qc_reports SET reviewer = ?1, site = ?2, netcdf_files = ?3, is_draft = ?4,
                    answers = ?5, modification_time = ?6
                 WHERE id = ?7",
                params![&report.reviewer, &report.site, &report.netcdf_files, report.is_draft, answers, now, id],
            )?;
            if n == 0 {
                return Err(PortalError::NotFound(format!("No QC report with id {}", id)));
            }
            id
        }
        None => {
            conn.execute(
                "INSERT INTO qc_reports (reviewer, site, netcdf_files, is_draft, answers, modification_time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![&report.reviewer, &report.site, &report.netcdf_files, report.is_draft, answers, now],
            )?;
            conn.last_insert_rowid()
        }
    };
    report.id = Some(id);
    report.modification_time = Some(now);
    Ok(id)
}

/// Returns whether a report was deleted.
pub fn delete(conn: &Connection, id: i64) -> Result<bool> {
    let n = conn.execute("DELETE FROM qc_reports WHERE id = ?1", params![id])?;
    Ok(n > 0)
}

/// Conditions for [`list`]. Dates bound the modification day inclusively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportQuery {
    pub reviewer: Option<String>,
    pub site: Option<String>,
    pub modified_after: Option<NaiveDate>,
    pub modified_before: Option<NaiveDate>,
}

/// Reports matching `query`, most recently modified first. The reviewer
/// matches case-insensitively on any part of the name.
pub fn list(conn: &Connection, query: &ReportQuery) -> Result<Vec<QcReport>> {
    let mut clauses = Vec::new();
    let mut values: Vec<String> = Vec::new();
    if let Some(reviewer) = &query.reviewer {
        values.push(format!("%{}%", reviewer.to_lowercase()));
        clauses.push(format!("lower(reviewer) LIKE ?{}", values.len()));
    }
    if let Some(site) = &query.site {
        values.push(site.clone());
        clauses.push(format!("site = ?{}", values.len()));
    }
    if let Some(after) = query.modified_after {
        values.push(after.format("%Y-%m-%d").to_string());
        clauses.push(format!("modification_time >= ?{}", values.len()));
    }
    if let Some(before) = query.modified_before {
        let next_day = before.checked_add_days(Days::new(1)).unwrap_or(before);
        values.push(next_day.format("%Y-%m-%d").to_string());
        clauses.push(format!("modification_time < ?{}", values.len()));
    }
    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM qc_reports {} ORDER BY modification_time DESC, id DESC",
        REPORT_COLUMNS, where_clause
    ))?;
    let reports = stmt
        .query_map(params_from_iter(values.iter()), report_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(reports)
}

const REVIEWER_SELECT: &str = "
    SELECT r.site,
           e.username, e.first_name, e.last_name, e.email, e.is_staff,
           a.username, a.first_name, a.last_name, a.email, a.is_staff,
           b.username, b.first_name, b.last_name, b.email, b.is_staff
    FROM site_reviewers r
    JOIN users e ON e.username = r.editor
    JOIN users a ON a.username = r.reviewer1
    JOIN users b ON b.username = r.reviewer2";

fn user_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<User> {
    Ok(User {
        username: row.get(offset)?,
        first_name: row.get(offset + 1)?,
        last_name: row.get(offset + 2)?,
        email: row.get(offset + 3)?,
        is_staff: row.get(offset + 4)?,
    })
}

fn reviewers_from_row(row: &Row<'_>) -> rusqlite::Result<SiteReviewers> {
    Ok(SiteReviewers {
        site: row.get(0)?,
        editor: user_at(row, 1)?,
        reviewer1: user_at(row, 6)?,
        reviewer2: user_at(row, 11)?,
    })
}

pub fn get_reviewers(conn: &Connection, site: &str) -> Result<Option<SiteReviewers>> {
    let row = conn
        .query_row(
            &format!("{} WHERE r.site = ?1", REVIEWER_SELECT),
            params![site],
            reviewers_from_row,
        )
        .optional()?;
    Ok(row)
}

pub fn list_reviewers(conn: &Connection) -> Result<Vec<SiteReviewers>> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY r.site", REVIEWER_SELECT))?;
    let rows = stmt
        .query_map([], reviewers_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Assigns the editor and reviewers of `site`. The three must be distinct.
pub fn set_reviewers(conn: &Connection, site: &str, editor: &str, reviewer1: &str, reviewer2: &str) -> Result<()> {
    if editor == reviewer1 || editor == reviewer2 || reviewer1 == reviewer2 {
        return Err(PortalError::BadRequest("duplicate reviewer assignments".into()));
    }
    conn.execute(
        "INSERT INTO site_reviewers (site, editor, reviewer1, reviewer2) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(site) DO UPDATE SET
            editor = excluded.editor, reviewer1 = excluded.reviewer1, reviewer2 = excluded.reviewer2",
        params![site, editor, reviewer1, reviewer2],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{add_user, temp_db};

    fn report(reviewer: &str, site: &str) -> QcReport {
        QcReport {
            reviewer: reviewer.into(),
            site: site.into(),
            netcdf_files: "x.nc".into(),
            answers: BTreeMap::from([("timing_present".to_string(), "n".to_string())]),
            ..Default::default()
        }
    }

    #[test]
    fn save_get_update_delete() {
        let (_dir, db) = temp_db();
        let conn = db.connect().unwrap();
        let mut r = report("Josh", "pa");
        let id = save(&conn, &mut r).unwrap();
        assert_eq!(r.id, Some(id));

        r.is_draft = false;
        r.answers.insert("timing_cmts".into(), "fine".into());
        save(&conn, &mut r).unwrap();
        let stored = get(&conn, id).unwrap().unwrap();
        assert!(!stored.is_draft);
        assert_eq!(stored.answer("timing_cmts"), Some("fine"));
        assert!(stored.modification_time.is_some());

        assert!(delete(&conn, id).unwrap());
        assert!(!delete(&conn, id).unwrap());
        assert!(get(&conn, id).unwrap().is_none());
        let err = save(&conn, &mut r).unwrap_err();
        assert!(matches!(err, PortalError::NotFound(_)));
    }

    #[test]
    fn list_filters() {
        let (_dir, db) = temp_db();
        let conn = db.connect().unwrap();
        for (reviewer, site) in [("Josh Laughner", "pa"), ("Debra Wunch", "pa"), ("Josh L", "oc")] {
            save(&conn, &mut report(reviewer, site)).unwrap();
        }
        conn.execute(
            "UPDATE qc_reports SET modification_time = '2020-06-15 12:00:00+00:00' WHERE reviewer = 'Debra Wunch'",
            [],
        )
        .unwrap();

        let all = list(&conn, &ReportQuery::default()).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].reviewer, "Debra Wunch");

        let josh = list(&conn, &ReportQuery { reviewer: Some("josh".into()), ..Default::default() }).unwrap();
        assert_eq!(josh.len(), 2);

        let pa_josh = list(
            &conn,
            &ReportQuery {
                reviewer: Some("JOSH".into()),
                site: Some("pa".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(pa_josh.len(), 1);

        let day = NaiveDate::from_ymd_opt(2020, 6, 15).unwrap();
        let that_day = list(
            &conn,
            &ReportQuery {
                modified_after: Some(day),
                modified_before: Some(day),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(that_day.len(), 1);
        assert_eq!(that_day[0].reviewer, "Debra Wunch");
    }

    #[test]
    fn reviewer_assignments() {
        let (_dir, db) = temp_db();
        for name in ["ed", "r1", "r2", "r3"] {
            add_user(&db, name, false, &[]);
        }
        let conn = db.connect().unwrap();
        set_reviewers(&conn, "pa", "ed", "r1", "r2").unwrap();
        set_reviewers(&conn, "pa", "ed", "r1", "r3").unwrap();
        let err = set_reviewers(&conn, "oc", "ed", "ed", "r2").unwrap_err();
        assert!(err.to_string().contains("duplicate reviewer assignments"));

        let pa = get_reviewers(&conn, "pa").unwrap().unwrap();
        assert_eq!(pa.reviewer2.username, "r3");
        assert_eq!(list_reviewers(&conn).unwrap().len(), 1);
        assert!(get_reviewers(&conn, "oc").unwrap().is_none());
        assert!(set_reviewers(&conn, "oc", "ed", "r1", "nobody").is_err());
    }
}
