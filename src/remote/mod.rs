//! Remote single-slot backup storage.
//!
//! The remote side holds at most one backup object per account, under a fixed
//! name inside the app's private storage area. Uploads replace that object in
//! place; they never add a second one.
//!
//! # Module Structure
//!
//! - `auth`: access tokens and the identity provider boundary
//! - `drive`: `DriveClient`, the HTTP implementation of `RemoteStore`

pub mod auth;
pub mod drive;

pub use self::auth::{AccessToken, IdentityProvider, TokenSession};
pub use self::drive::DriveClient;

use crate::errors::AppResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Identifies the one live backup object in remote storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBackupHandle {
    /// Remote file identifier
    pub id: String,
    /// Logical name, always the fixed backup file name
    pub name: String,
    /// Size in bytes, when reported by the remote
    pub size: Option<u64>,
    /// Last modification time, when reported by the remote
    pub modified_time: Option<DateTime<Utc>>,
}

/// Whether an upload created the slot or replaced its contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    /// No handle existed; a new object was created
    Created,
    /// An existing handle was updated in place
    Replaced,
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    /// Create or replace
    pub kind: UploadKind,
    /// Identifier of the slot, if the remote reported or already knew it
    pub file_id: Option<String>,
    /// Number of payload bytes sent
    pub bytes_sent: u64,
    /// Stray duplicate objects deleted to restore the single-slot invariant
    pub duplicates_removed: usize,
}

/// Operations on the single remote backup slot.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Finds the live backup object, ignoring trashed entries.
    async fn find_handle(&self, token: &AccessToken) -> AppResult<Option<RemoteBackupHandle>>;

    /// Uploads `archive`, replacing the existing object if there is one.
    async fn upload(&self, archive: &Path, token: &AccessToken) -> AppResult<UploadOutcome>;

    /// Downloads the live backup object to `dest`.
    ///
    /// Returns `Ok(None)` when no backup exists remotely.
    async fn download(&self, token: &AccessToken, dest: &Path) -> AppResult<Option<PathBuf>>;
}
