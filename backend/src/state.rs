use crate::config::{PortalConfig, RuntimeSettings};
use crate::db::Database;
use crate::locks::FileLocks;

/// Shared by every handler through `web::Data<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: PortalConfig,
    pub db: Database,
    pub locks: FileLocks,
}

impl AppState {
    pub fn new(config: PortalConfig, db: Database) -> Self {
        let locks = FileLocks::new(db.clone());
        AppState { config, db, locks }
    }

    /// Re-read on every call so edits to the settings file apply without a
    /// restart.
    pub fn runtime_settings(&self) -> RuntimeSettings {
        RuntimeSettings::load(&self.config.files.runtime_settings_file)
    }
}
