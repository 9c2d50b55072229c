use crate::error::{PortalError, Result};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Path of backup number `index` of `path`. The suffix is zero padded to as
/// many digits as `n_backups` has, so `site_info.json.01` for ten backups.
pub fn backup_path(path: &Path, index: usize, n_backups: usize) -> PathBuf {
    let width = n_backups.to_string().len();
    let mut name = OsString::from(path.as_os_str());
    name.push(format!(".{:0width$}", index, width = width));
    PathBuf::from(name)
}

/// Moves `path` to backup 1, shifting older backups up by one and dropping
/// whatever falls past `n_backups`. `path` itself no longer exists afterwards.
///
/// With `n_backups == 0` nothing is moved.
pub fn backup_file_rolling(path: &Path, n_backups: usize) -> Result<()> {
    if n_backups == 0 {
        return Ok(());
    }

    for index in (1..n_backups).rev() {
        let older = backup_path(path, index, n_backups);
        if older.exists() {
            let newer = backup_path(path, index + 1, n_backups);
            fs::rename(&older, &newer).map_err(|e| PortalError::io(&older, e))?;
        }
    }

    let first = backup_path(path, 1, n_backups);
    fs::rename(path, &first).map_err(|e| PortalError::io(path, e))?;
    log::debug!("Backed up {} to {}", path.display(), first.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backups(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with("info.json."))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn two_backups_shift_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("info.json");

        fs::write(&file, "v1").unwrap();
        backup_file_rolling(&file, 5).unwrap();
        assert!(!file.exists());
        fs::write(&file, "v2").unwrap();
        backup_file_rolling(&file, 5).unwrap();

        assert_eq!(backups(dir.path()), vec!["info.json.1", "info.json.2"]);
        assert_eq!(fs::read_to_string(dir.path().join("info.json.1")).unwrap(), "v2");
        assert_eq!(fs::read_to_string(dir.path().join("info.json.2")).unwrap(), "v1");
    }

    #[test]
    fn never_keeps_more_than_n_backups() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("info.json");
        for i in 0..9 {
            fs::write(&file, format!("v{i}")).unwrap();
            backup_file_rolling(&file, 3).unwrap();
        }
        assert_eq!(
            backups(dir.path()),
            vec!["info.json.1", "info.json.2", "info.json.3"]
        );
        assert_eq!(fs::read_to_string(dir.path().join("info.json.3")).unwrap(), "v6");
    }

    #[test]
    fn suffix_is_padded_to_backup_count() {
        let file = Path::new("/data/site_info.json");
        assert_eq!(
            backup_path(file, 3, 10),
            PathBuf::from("/data/site_info.json.03")
        );
        assert_eq!(backup_path(file, 3, 5), PathBuf::from("/data/site_info.json.3"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = backup_file_rolling(&dir.path().join("absent.json"), 5).unwrap_err();
        assert!(matches!(err, PortalError::Io { .. }));
    }
}
