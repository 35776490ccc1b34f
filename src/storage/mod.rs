//! Filesystem capability used by the archive builder and the restore pipeline.
//!
//! Both components talk to disk only through `FileStore`, so tests can swap in
//! a store that fails on demand without touching real permissions.
//!
//! # Module Structure
//!
//! - `local`: `LocalFileStore`, the real implementation on `tokio::fs`

pub mod local;

pub use self::local::LocalFileStore;

use crate::errors::AppResult;
use async_trait::async_trait;
use std::path::Path;

/// Async filesystem operations needed by the backup core.
///
/// Removal operations treat a missing target as success; everything else
/// surfaces the underlying I/O error.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Returns true if a file or directory exists at `path`.
    async fn exists(&self, path: &Path) -> bool;

    /// Creates `path` and all missing parents.
    async fn create_dir_all(&self, path: &Path) -> AppResult<()>;

    /// Recursively removes `path`. A missing directory is not an error.
    async fn remove_dir_all(&self, path: &Path) -> AppResult<()>;

    /// Removes the file at `path`. A missing file is not an error.
    async fn remove_file(&self, path: &Path) -> AppResult<()>;

    /// Copies a single file, overwriting `to` if it exists.
    async fn copy_file(&self, from: &Path, to: &Path) -> AppResult<u64>;

    /// Recursively copies a directory tree into `to`, creating it.
    ///
    /// Returns the number of files copied.
    async fn copy_dir(&self, from: &Path, to: &Path) -> AppResult<usize>;

    /// Renames `from` to `to`, replacing a file at `to` atomically.
    async fn rename(&self, from: &Path, to: &Path) -> AppResult<()>;

    /// Reads a whole file.
    async fn read(&self, path: &Path) -> AppResult<Vec<u8>>;

    /// Writes a whole file, creating parents as needed.
    async fn write(&self, path: &Path, contents: &[u8]) -> AppResult<()>;

    /// Size of a file in bytes.
    async fn file_size(&self, path: &Path) -> AppResult<u64>;

    /// Total size in bytes of all files under a directory, 0 if it is missing.
    async fn dir_size(&self, path: &Path) -> AppResult<u64>;

    /// Free bytes on the volume holding `path`, if the platform reports it.
    async fn available_space(&self, path: &Path) -> Option<u64>;
}
