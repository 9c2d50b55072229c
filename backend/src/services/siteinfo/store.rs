//! Lock-guarded access to the site info file and the `site_info_updates`
//! audit table.

use crate::error::{PortalError, Result};
use crate::locks::{read_json, FileLocks, LockHandle};
use chrono::Utc;
use rusqlite::params;
use std::path::Path;
use tccon_common::model::release_flag::{FlagDefinitions, ReleaseFlagFile};
use tccon_common::model::site_info::{SiteInfo, SiteInfoFile, STANDARD_FIELDS};

pub fn read_all(locks: &FileLocks, site_info_file: &Path) -> Result<SiteInfoFile> {
    locks.read_json_file(site_info_file)
}

pub fn read_site(locks: &FileLocks, site_info_file: &Path, site_id: &str) -> Result<SiteInfo> {
    read_all(locks, site_info_file)?
        .remove(site_id)
        .ok_or_else(|| no_site_info(site_id))
}

pub fn no_site_info(site_id: &str) -> PortalError {
    PortalError::NotFound(format!("No existing site information for site \"{}\"", site_id))
}

/// Copies the standard fields of `update` into the entry for `site_id`,
/// creating it if needed, and records the result in `site_info_updates`
/// inside the lock's transaction.
pub fn apply_update(
    all: &mut SiteInfoFile,
    handle: &LockHandle<'_>,
    site_id: &str,
    update: &SiteInfo,
    username: &str,
) -> Result<SiteInfo> {
    let entry = all.entry(site_id.to_string()).or_default();
    for field in STANDARD_FIELDS {
        if let Some(value) = update.get(field) {
            entry.set(field, value.to_string());
        }
    }
    let release_lag: i64 = entry
        .release_lag
        .trim()
        .parse()
        .map_err(|_| PortalError::BadRequest(format!("Invalid release lag {:?}", entry.release_lag)))?;

    handle.transaction().execute(
        "INSERT INTO site_info_updates (user_updated, datetime_updated, site_id, long_name,
            release_lag, location, contact, site_reference, data_doi, data_reference, data_revision)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            username,
            Utc::now(),
            site_id,
            &entry.long_name,
            release_lag,
            &entry.location,
            &entry.contact,
            &entry.site_reference,
            &entry.data_doi,
            &entry.data_reference,
            &entry.data_revision,
        ],
    )?;
    Ok(entry.clone())
}

/// Reads the flags file; a file that does not exist yet has no flags.
pub fn read_flags(locks: &FileLocks, flags_file: &Path) -> Result<ReleaseFlagFile> {
    locks.execute(flags_file, |_| {
        if flags_file.exists() {
            read_json(flags_file)
        } else {
            Ok(ReleaseFlagFile::new())
        }
    })
}

pub fn read_flag_definitions(locks: &FileLocks, defs_file: &Path) -> Result<FlagDefinitions> {
    locks.execute(defs_file, |_| {
        if defs_file.exists() {
            read_json(defs_file)
        } else {
            log::warn!("Flag definitions file {} is missing", defs_file.display());
            Ok(FlagDefinitions::default())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::temp_db;
    use crate::db::users::upsert_user;
    use tccon_common::model::reviewers::User;

    #[test]
    fn update_is_merged_and_recorded() {
        let (dir, db) = temp_db();
        upsert_user(
            &db.connect().unwrap(),
            &User {
                username: "pi".into(),
                first_name: String::new(),
                last_name: String::new(),
                email: String::new(),
                is_staff: false,
            },
        )
        .unwrap();
        let locks = FileLocks::new(db.clone());
        let file = dir.path().join("site_info.json");
        std::fs::write(
            &file,
            r#"{"pa": {"long_name": "parkfalls", "release_lag": "120", "location": "Park Falls",
                "contact": "A <a@b.c>", "data_doi": "10.1/x", "data_revision": "R0", "short_location": "WI"}}"#,
        )
        .unwrap();

        let update = SiteInfo {
            release_lag: "60".into(),
            ..read_site(&locks, &file, "pa").unwrap()
        };
        let saved = locks
            .update_json_file(&file, 5, |all: &mut SiteInfoFile, handle| {
                apply_update(all, handle, "pa", &update, "pi")
            })
            .unwrap();
        assert_eq!(saved.release_lag, "60");

        let again = read_site(&locks, &file, "pa").unwrap();
        assert_eq!(again.release_lag, "60");
        assert_eq!(again.extra["short_location"], "WI");
        assert!(crate::locks::backup_path(&file, 1, 5).exists());

        let conn = db.connect().unwrap();
        let (lag, user): (i64, String) = conn
            .query_row(
                "SELECT release_lag, user_updated FROM site_info_updates",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!((lag, user.as_str()), (60, "pi"));
    }

    #[test]
    fn unknown_site_is_not_found() {
        let (dir, db) = temp_db();
        let locks = FileLocks::new(db);
        let file = dir.path().join("site_info.json");
        std::fs::write(&file, "{}").unwrap();
        assert!(matches!(read_site(&locks, &file, "zz"), Err(PortalError::NotFound(_))));
    }

    #[test]
    fn missing_flags_file_is_empty() {
        let (dir, db) = temp_db();
        let locks = FileLocks::new(db);
        assert!(read_flags(&locks, &dir.path().join("flags.json")).unwrap().is_empty());
        assert!(read_flag_definitions(&locks, &dir.path().join("defs.json"))
            .unwrap()
            .definitions
            .is_empty());
    }
}
