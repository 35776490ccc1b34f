//! Configuration management for the rentsync crate.
//!
//! This module handles loading and validating configuration settings from
//! environment variables, with sensible defaults. It also derives every fixed
//! path of the on-disk layout from the two configured roots, so no other module
//! builds paths by hand.
//!
//! # Environment Variables
//!
//! - `RENTSYNC_DOCUMENTS_DIR`: Application documents directory (defaults to ~/Documents/rentsync)
//! - `RENTSYNC_CACHE_DIR`: Application cache directory (defaults to ~/.cache)
//! - `RENTSYNC_DRIVE_API_URL`: Base URL of the file metadata API
//! - `RENTSYNC_DRIVE_UPLOAD_URL`: Base URL of the file upload API
//! - `RENTSYNC_HTTP_TIMEOUT_SECS`: Timeout for a single HTTP request (defaults to 60)
//! - `RENTSYNC_BACKUP_COOLDOWN_HOURS`: Minimum time between auto-backups (defaults to 24)
//! - `HOME`: Used for expanding the default directories

use crate::constants::{
    APP_NAME, BACKUP_FILE_NAME, BACKUP_STAGING_DIR, DATABASE_FILE_NAME, DATABASE_SUBDIR,
    DEFAULT_BACKUP_COOLDOWN_HOURS, DEFAULT_CACHE_SUBDIR, DEFAULT_DOCUMENTS_SUBDIR,
    DEFAULT_DRIVE_API_URL, DEFAULT_DRIVE_UPLOAD_URL, DEFAULT_HTTP_TIMEOUT_SECS,
    ENV_VAR_BACKUP_COOLDOWN_HOURS, ENV_VAR_CACHE_DIR, ENV_VAR_DOCUMENTS_DIR,
    ENV_VAR_DRIVE_API_URL, ENV_VAR_DRIVE_UPLOAD_URL, ENV_VAR_HOME, ENV_VAR_HTTP_TIMEOUT_SECS,
    IMAGES_DIR_NAME, POLICY_FILE_NAME, RESTORE_DOWNLOAD_FILE, RESTORE_STAGING_DIR,
};
use crate::errors::{AppError, AppResult};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the backup core.
///
/// # Examples
///
/// Creating a configuration manually:
/// ```
/// use rentsync::Config;
/// use std::path::PathBuf;
///
/// let config = Config::with_dirs("/data/documents", "/data/cache");
/// assert_eq!(
///     config.database_path(),
///     PathBuf::from("/data/documents/SQLite/rental.db")
/// );
/// assert_eq!(
///     config.archive_path(),
///     PathBuf::from("/data/cache/rentsync/rental_backup.zip")
/// );
/// ```
#[derive(Clone)]
pub struct Config {
    /// Directory owned by the app holding the database, images and the local backup.
    pub documents_dir: PathBuf,

    /// Directory for disposable files; the crate only writes under its own namespace here.
    pub cache_dir: PathBuf,

    /// Base URL of the file metadata API (listing, download, delete).
    pub drive_api_url: String,

    /// Base URL of the file upload API (create and content replace).
    pub drive_upload_url: String,

    /// Timeout applied to every HTTP request.
    pub http_timeout: Duration,

    /// Minimum time between two successful unattended backups.
    pub backup_cooldown: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("documents_dir", &"[REDACTED_PATH]")
            .field("cache_dir", &"[REDACTED_PATH]")
            .field("drive_api_url", &self.drive_api_url)
            .field("drive_upload_url", &self.drive_upload_url)
            .field("http_timeout", &self.http_timeout)
            .field("backup_cooldown", &self.backup_cooldown)
            .finish()
    }
}

impl Default for Config {
    /// Creates a Config with default endpoints and timings and empty directories.
    fn default() -> Self {
        Config {
            documents_dir: PathBuf::new(),
            cache_dir: PathBuf::new(),
            drive_api_url: DEFAULT_DRIVE_API_URL.to_string(),
            drive_upload_url: DEFAULT_DRIVE_UPLOAD_URL.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            backup_cooldown: Duration::from_secs(DEFAULT_BACKUP_COOLDOWN_HOURS * 3600),
        }
    }
}

impl Config {
    /// Creates a Config rooted at the given directories with default endpoints.
    pub fn with_dirs(documents_dir: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Config {
            documents_dir: documents_dir.into(),
            cache_dir: cache_dir.into(),
            ..Config::default()
        }
    }

    /// Loads configuration from environment variables with sensible defaults.
    ///
    /// Directory values are expanded with `shellexpand`, so `~` and `$VAR`
    /// references are honoured.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if:
    /// - Path expansion fails
    /// - A numeric variable is not a positive integer
    /// - The resulting configuration fails `validate`
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rentsync::Config;
    ///
    /// match Config::load() {
    ///     Ok(config) => println!("Database at {:?}", config.database_path()),
    ///     Err(err) => eprintln!("Failed to load config: {}", err),
    /// }
    /// ```
    pub fn load() -> AppResult<Self> {
        let home = env::var(ENV_VAR_HOME).unwrap_or_default();

        let documents_dir = Self::dir_from_env(
            ENV_VAR_DOCUMENTS_DIR,
            format!("{}/{}", home, DEFAULT_DOCUMENTS_SUBDIR),
        )?;
        let cache_dir =
            Self::dir_from_env(ENV_VAR_CACHE_DIR, format!("{}/{}", home, DEFAULT_CACHE_SUBDIR))?;

        let drive_api_url =
            env::var(ENV_VAR_DRIVE_API_URL).unwrap_or_else(|_| DEFAULT_DRIVE_API_URL.to_string());
        let drive_upload_url = env::var(ENV_VAR_DRIVE_UPLOAD_URL)
            .unwrap_or_else(|_| DEFAULT_DRIVE_UPLOAD_URL.to_string());

        let timeout_secs =
            Self::positive_from_env(ENV_VAR_HTTP_TIMEOUT_SECS, DEFAULT_HTTP_TIMEOUT_SECS)?;
        let cooldown_hours =
            Self::positive_from_env(ENV_VAR_BACKUP_COOLDOWN_HOURS, DEFAULT_BACKUP_COOLDOWN_HOURS)?;
        let cooldown_secs = cooldown_hours.checked_mul(3600).ok_or_else(|| {
            AppError::Config(format!(
                "{} is too large: {} hours",
                ENV_VAR_BACKUP_COOLDOWN_HOURS, cooldown_hours
            ))
        })?;

        let config = Config {
            documents_dir,
            cache_dir,
            drive_api_url: drive_api_url.trim_end_matches('/').to_string(),
            drive_upload_url: drive_upload_url.trim_end_matches('/').to_string(),
            http_timeout: Duration::from_secs(timeout_secs),
            backup_cooldown: Duration::from_secs(cooldown_secs),
        };
        config.validate()?;

        Ok(config)
    }

    fn dir_from_env(var: &str, default: String) -> AppResult<PathBuf> {
        let raw = env::var(var).unwrap_or(default);
        let expanded = shellexpand::full(&raw)
            .map_err(|e| AppError::Config(format!("Failed to expand path in {}: {}", var, e)))?;
        Ok(PathBuf::from(expanded.into_owned()))
    }

    fn positive_from_env(var: &str, default: u64) -> AppResult<u64> {
        match env::var(var) {
            Err(_) => Ok(default),
            Ok(raw) => match raw.trim().parse::<u64>() {
                Ok(value) if value > 0 => Ok(value),
                _ => Err(AppError::Config(format!(
                    "{} must be a positive integer, got '{}'",
                    var, raw
                ))),
            },
        }
    }

    /// Validates that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a directory is empty or relative, a URL is
    /// not http(s), or a duration is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use rentsync::Config;
    ///
    /// assert!(Config::with_dirs("/docs", "/cache").validate().is_ok());
    /// assert!(Config::with_dirs("relative/docs", "/cache").validate().is_err());
    /// ```
    pub fn validate(&self) -> AppResult<()> {
        for (name, dir) in [
            ("Documents", &self.documents_dir),
            ("Cache", &self.cache_dir),
        ] {
            if dir.as_os_str().is_empty() {
                return Err(AppError::Config(format!("{} directory path is empty", name)));
            }
            if !dir.is_absolute() {
                return Err(AppError::Config(format!(
                    "{} directory must be an absolute path",
                    name
                )));
            }
        }

        for (name, url) in [
            ("Drive API URL", &self.drive_api_url),
            ("Drive upload URL", &self.drive_upload_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(AppError::Config(format!(
                    "{} must start with http:// or https://",
                    name
                )));
            }
        }

        if self.http_timeout.is_zero() {
            return Err(AppError::Config("HTTP timeout must be non-zero".to_string()));
        }
        if self.backup_cooldown.is_zero() {
            return Err(AppError::Config(
                "Backup cooldown must be non-zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Path of the live database file.
    pub fn database_path(&self) -> PathBuf {
        self.documents_dir
            .join(DATABASE_SUBDIR)
            .join(DATABASE_FILE_NAME)
    }

    /// Root of the live image tree.
    pub fn images_dir(&self) -> PathBuf {
        self.documents_dir.join(IMAGES_DIR_NAME)
    }

    /// Durable, user-visible local backup file.
    pub fn local_backup_path(&self) -> PathBuf {
        self.documents_dir.join(BACKUP_FILE_NAME)
    }

    /// Persisted policy store file.
    pub fn policy_path(&self) -> PathBuf {
        self.documents_dir.join(POLICY_FILE_NAME)
    }

    /// The crate's namespace under the cache directory.
    pub fn cache_namespace(&self) -> PathBuf {
        self.cache_dir.join(APP_NAME)
    }

    /// Staging directory for archive assembly.
    pub fn backup_staging_dir(&self) -> PathBuf {
        self.cache_namespace().join(BACKUP_STAGING_DIR)
    }

    /// Transient archive produced by the builder.
    pub fn archive_path(&self) -> PathBuf {
        self.cache_namespace().join(BACKUP_FILE_NAME)
    }

    /// Staging directory for archive extraction during restore.
    pub fn restore_staging_dir(&self) -> PathBuf {
        self.cache_namespace().join(RESTORE_STAGING_DIR)
    }

    /// Temporary download target for the remote archive.
    pub fn restore_download_path(&self) -> PathBuf {
        self.cache_namespace().join(RESTORE_DOWNLOAD_FILE)
    }
}
