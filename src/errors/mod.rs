//! Error handling utilities for the rentsync crate.
//!
//! This module provides the central error type `AppError` which represents all
//! possible error conditions of the backup core, the two domain-specific error
//! enums it wraps (`BackupError` and `RemoteError`), and the convenience alias
//! `AppResult`.
//!
//! Every public operation returns an `AppResult`. Nothing in this crate panics
//! across a component boundary; background callers decide whether to surface
//! or discard a failure.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Represents failures of the local half of a backup or restore.
///
/// # Examples
///
/// ```
/// use rentsync::errors::BackupError;
/// use std::path::PathBuf;
///
/// let error = BackupError::SourceMissing {
///     path: PathBuf::from("/data/SQLite/rental.db"),
/// };
/// assert!(format!("{}", error).contains("rental.db"));
/// ```
///
/// ```
/// use rentsync::errors::BackupError;
///
/// let error = BackupError::NotSignedIn;
/// assert!(format!("{}", error).contains("Sign in"));
/// ```
#[derive(Debug, Error)]
pub enum BackupError {
    /// The database file does not exist, so there is nothing to back up.
    #[error("Database file not found at {path}. Open the app at least once so the database is created before backing up.")]
    SourceMissing {
        /// The expected location of the database file
        path: PathBuf,
    },

    /// Copying files into or out of a staging area failed.
    #[error("Staging failed while {context}: {source}")]
    StagingFailure {
        /// What the builder or pipeline was doing when the copy failed
        context: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Not enough free space on the cache volume to stage the archive.
    #[error("Not enough free space to stage the backup: {needed} bytes needed, {available} bytes available. Free up storage and try again.")]
    InsufficientSpace {
        /// Bytes required to stage the database and images
        needed: u64,
        /// Bytes reported free on the cache volume
        available: u64,
    },

    /// The archive codec failed to compress or extract.
    #[error("Archive compression failed: {0}")]
    Compression(String),

    /// A remote operation was attempted without a signed-in account.
    #[error("Not signed in. Sign in to your cloud account to back up or restore.")]
    NotSignedIn,

    /// An extracted archive is missing a required entry or is malformed.
    #[error("Backup archive is corrupt: {0}")]
    CorruptArchive(String),
}

impl BackupError {
    /// Builds a `StagingFailure` from a context string and an I/O error.
    pub fn staging(context: impl Into<String>, source: io::Error) -> Self {
        BackupError::StagingFailure {
            context: context.into(),
            source,
        }
    }
}

/// Represents failures talking to the remote file-storage API.
///
/// # Examples
///
/// ```
/// use rentsync::errors::RemoteError;
///
/// let error = RemoteError::Status {
///     status: 403,
///     body: "insufficientPermissions".to_string(),
/// };
/// let message = format!("{}", error);
/// assert!(message.contains("403"));
/// assert!(message.contains("insufficientPermissions"));
/// ```
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The request could not be sent or the response could not be read.
    #[error("Remote request failed: {0}. Check your network connection.")]
    Request(#[source] reqwest::Error),

    /// The remote API answered with a non-success status.
    #[error("Remote API returned HTTP {status}: {body}")]
    Status {
        /// The HTTP status code
        status: u16,
        /// The response body, possibly empty
        body: String,
    },

    /// The remote API answered with a body that could not be understood.
    #[error("Invalid response from remote API: {0}")]
    InvalidResponse(String),
}

/// Represents all possible errors that can occur in the rentsync crate.
///
/// # Examples
///
/// Creating a configuration error:
/// ```
/// use rentsync::errors::AppError;
///
/// let error = AppError::Config("Documents directory path is empty".to_string());
/// assert_eq!(format!("{}", error), "Configuration error: Documents directory path is empty");
/// ```
///
/// Converting from an IO error:
/// ```
/// use rentsync::errors::AppError;
/// use std::io::{self, ErrorKind};
///
/// let io_error = io::Error::new(ErrorKind::NotFound, "file not found");
/// let app_error: AppError = io_error.into();
///
/// match app_error {
///     AppError::Io(inner) => assert_eq!(inner.kind(), ErrorKind::NotFound),
///     _ => panic!("Expected Io variant"),
/// }
/// ```
#[derive(Debug, Error)]
pub enum AppError {
    /// Errors related to configuration loading or validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input/output errors from filesystem operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors in the local backup or restore flow.
    #[error("Backup error: {0}")]
    Backup(#[from] BackupError),

    /// Errors talking to the remote storage API.
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Errors reading or writing the persisted policy state.
    #[error("Policy store error: {0}")]
    Policy(String),
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Remote(RemoteError::Request(err))
    }
}

impl AppError {
    /// Returns true when the failure is due to a missing sign-in.
    ///
    /// Callers use this to decide whether to prompt the user to sign in.
    pub fn is_not_signed_in(&self) -> bool {
        matches!(self, AppError::Backup(BackupError::NotSignedIn))
    }
}

/// A type alias for `Result<T, AppError>` to simplify function signatures.
///
/// # Examples
///
/// ```
/// use rentsync::errors::{AppResult, BackupError};
///
/// fn requires_account(signed_in: bool) -> AppResult<()> {
///     if !signed_in {
///         return Err(BackupError::NotSignedIn.into());
///     }
///     Ok(())
/// }
///
/// assert!(requires_account(true).is_ok());
/// assert!(requires_account(false).unwrap_err().is_not_signed_in());
/// ```
pub type AppResult<T> = Result<T, AppError>;
