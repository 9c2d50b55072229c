//! Portal configuration, read from a TOML file at startup.
//!
//! Every section has defaults, so a missing key never stops the server; a
//! missing *file* only does when it was named explicitly.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable that may point at the configuration file.
pub const CONFIG_ENV_VAR: &str = "CARBACKEND_CONFIG";
/// File looked for in the working directory when nothing else is given.
pub const DEFAULT_CONFIG_FILE: &str = "carbackend.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    Validation { field: String, message: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub files: FilesConfig,
    pub locks: LocksConfig,
    pub auth: AuthConfig,
    pub features: FeaturesConfig,
    pub pdf: PdfConfig,
    pub git: GitConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: PathBuf::from("carbackend.sqlite"),
        }
    }
}

/// Locations of the JSON files and directories the portal manages.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    pub site_info_file: PathBuf,
    pub release_flags_file: PathBuf,
    pub release_flags_def_file: PathBuf,
    pub runtime_settings_file: PathBuf,
    pub metadata_dir: PathBuf,
    pub flag_plot_dir: PathBuf,
    pub flag_plot_url: String,
    pub n_backups: usize,
}

impl Default for FilesConfig {
    fn default() -> Self {
        let root = PathBuf::from("/var/www/tccon-metadata");
        FilesConfig {
            site_info_file: root.join("site_info.json"),
            release_flags_file: root.join("release_flags.json"),
            release_flags_def_file: root.join("release_flag_definitions.json"),
            runtime_settings_file: root.join("runtime_settings.json"),
            metadata_dir: root.join("doi_metadata"),
            flag_plot_dir: root.join("flag_plots"),
            flag_plot_url: "/flag_plots/".to_string(),
            n_backups: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocksConfig {
    /// How long a caller waits for another lock holder before giving up.
    pub busy_timeout_ms: u64,
}

impl Default for LocksConfig {
    fn default() -> Self {
        LocksConfig {
            busy_timeout_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Header set by the authenticating reverse proxy.
    pub user_header: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            user_header: "X-Remote-User".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    pub site_status: bool,
    pub site_metadata: bool,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        FeaturesConfig {
            site_status: true,
            site_metadata: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    pub font_dir: PathBuf,
    pub font_family: String,
}

impl Default for PdfConfig {
    fn default() -> Self {
        PdfConfig {
            font_dir: PathBuf::from("./fonts"),
            font_family: "LiberationSans".to_string(),
        }
    }
}

/// Identity used for commits in the metadata repository.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    pub author_name: String,
    pub author_email: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        GitConfig {
            author_name: "TCCON CAR backend".to_string(),
            author_email: "carbackend@localhost".to_string(),
        }
    }
}

impl PortalConfig {
    /// Loads and validates the configuration at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&raw).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: PortalConfig = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Resolves the config file from an explicit path, then the environment,
    /// then `carbackend.toml`. Only the last may be absent, in which case the
    /// built-in defaults are used.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::load(Path::new(&path));
        }
        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            Self::load(default_path)
        } else {
            log::warn!(
                "No {} found and {} not set, using built-in defaults",
                DEFAULT_CONFIG_FILE,
                CONFIG_ENV_VAR
            );
            let config = PortalConfig::default();
            config.validate()?;
            Ok(config)
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.files.n_backups == 0 {
            return Err(ConfigError::Validation {
                field: "files.n_backups".into(),
                message: "must keep at least one backup".into(),
            });
        }
        if self.auth.user_header.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "auth.user_header".into(),
                message: "must name a request header".into(),
            });
        }
        Ok(())
    }
}

/// Settings that operators may change without restarting the portal. Read
/// from the runtime settings JSON file every time they are needed.
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeSettings {
    #[serde(default = "default_contact")]
    pub contact: String,
    #[serde(default = "default_max_release_lag")]
    pub max_release_lag: u32,
}

fn default_contact() -> String {
    "Caltech".to_string()
}

fn default_max_release_lag() -> u32 {
    366
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        RuntimeSettings {
            contact: default_contact(),
            max_release_lag: default_max_release_lag(),
        }
    }
}

impl RuntimeSettings {
    /// Reads the runtime settings, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                log::warn!("Invalid runtime settings in {}: {}", path.display(), e);
                RuntimeSettings::default()
            }),
            Err(e) => {
                log::warn!("Cannot read runtime settings {}: {}", path.display(), e);
                RuntimeSettings::default()
            }
        }
    }
}
