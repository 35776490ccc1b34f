//! Constants used throughout the crate.
//!
//! Fixed file names and paths are part of the on-disk contract shared with the
//! database engine and the image service, and with archives produced by other
//! builds of the app. Changing any of them breaks restore compatibility.

// Application Metadata
/// The name of the crate, used as the cache namespace and in log output.
pub const APP_NAME: &str = "rentsync";

// Local filesystem layout
/// Sub-directory of the documents directory holding the database file.
pub const DATABASE_SUBDIR: &str = "SQLite";
/// File name of the live database, also its entry name inside the archive.
pub const DATABASE_FILE_NAME: &str = "rental.db";
/// Directory name of the image tree, also its entry name inside the archive.
pub const IMAGES_DIR_NAME: &str = "images";
/// File name of the durable local backup and of the remote backup object.
pub const BACKUP_FILE_NAME: &str = "rental_backup.zip";
/// File name of the persisted policy store under the documents directory.
pub const POLICY_FILE_NAME: &str = "rentsync_policy.json";

// Cache namespace
/// Staging directory used while assembling an archive.
pub const BACKUP_STAGING_DIR: &str = "backup_staging";
/// Staging directory used while unpacking a downloaded archive.
pub const RESTORE_STAGING_DIR: &str = "restore_staging";
/// Temporary download target for the remote archive.
pub const RESTORE_DOWNLOAD_FILE: &str = "restore_download.zip";

// Promotion
/// Suffix of the temporary sibling a restored file or tree is written to before rename.
pub const RESTORING_SUFFIX: &str = "restoring";
/// Suffix of the previous image tree while it is being swapped out.
pub const PREVIOUS_SUFFIX: &str = "previous";

// Remote API
/// Name of the per-application private storage area.
pub const APP_DATA_FOLDER: &str = "appDataFolder";
/// MIME type of the uploaded archive.
pub const ARCHIVE_MIME_TYPE: &str = "application/zip";
/// Default base URL of the file metadata API.
pub const DEFAULT_DRIVE_API_URL: &str = "https://www.googleapis.com/drive/v3";
/// Default base URL of the file upload API.
pub const DEFAULT_DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3";
/// Default timeout for a single HTTP request, in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

// Auto-backup policy
/// Minimum time between two successful unattended backups, in hours.
pub const DEFAULT_BACKUP_COOLDOWN_HOURS: u64 = 24;
/// Policy key: auto-backup enabled flag ("true" / "false").
pub const KEY_AUTO_BACKUP_ENABLED: &str = "autoBackupEnabled";
/// Policy key: RFC 3339 timestamp of the last successful backup.
pub const KEY_LAST_SUCCESSFUL_BACKUP: &str = "lastSuccessfulBackup";
/// Policy key: RFC 3339 timestamp of the last sync, shown by the settings screen.
pub const KEY_LAST_SYNC_TIME: &str = "lastSyncTime";
/// Policy key: account-linked flag, set once a remote backup has succeeded.
pub const KEY_ACCOUNT_LINKED: &str = "accountLinked";
/// Policy key: RFC 3339 timestamp of the last backup attempt, successful or not.
pub const KEY_LAST_BACKUP_ATTEMPT: &str = "lastBackupAttempt";

// Configuration Keys & Environment Variables
/// Environment variable for the application documents directory.
pub const ENV_VAR_DOCUMENTS_DIR: &str = "RENTSYNC_DOCUMENTS_DIR";
/// Environment variable for the application cache directory.
pub const ENV_VAR_CACHE_DIR: &str = "RENTSYNC_CACHE_DIR";
/// Environment variable overriding the file metadata API base URL.
pub const ENV_VAR_DRIVE_API_URL: &str = "RENTSYNC_DRIVE_API_URL";
/// Environment variable overriding the file upload API base URL.
pub const ENV_VAR_DRIVE_UPLOAD_URL: &str = "RENTSYNC_DRIVE_UPLOAD_URL";
/// Environment variable for the HTTP timeout in seconds.
pub const ENV_VAR_HTTP_TIMEOUT_SECS: &str = "RENTSYNC_HTTP_TIMEOUT_SECS";
/// Environment variable for the auto-backup cooldown in hours.
pub const ENV_VAR_BACKUP_COOLDOWN_HOURS: &str = "RENTSYNC_BACKUP_COOLDOWN_HOURS";
/// Standard environment variable for the user's home directory.
pub const ENV_VAR_HOME: &str = "HOME";
/// Default documents directory relative to the home directory.
pub const DEFAULT_DOCUMENTS_SUBDIR: &str = "Documents/rentsync";
/// Default cache directory relative to the home directory.
pub const DEFAULT_CACHE_SUBDIR: &str = ".cache";

// Logging Configuration
/// Log format identifier for plain text.
pub const LOG_FORMAT_TEXT: &str = "text";
/// Log format identifier for JSON.
pub const LOG_FORMAT_JSON: &str = "json";
/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";
/// Service name used in tracing spans and structured logs.
pub const TRACING_SERVICE_NAME: &str = "rentsync";
