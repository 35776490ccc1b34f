//! Archive packaging of the database and image tree.
//!
//! This module turns the live database file and the optional image tree into a
//! single zip archive, and back.
//!
//! # Module Structure
//!
//! - `builder`: `ArchiveBuilder`, which stages and compresses a fresh archive
//! - `zip_codec`: `ZipCodec`, the zip implementation of `ArchiveCodec`
//!
//! # Archive layout
//!
//! ```text
//! rental.db          the database file under its original name
//! images/...         the whole image tree, only if it existed
//! ```

pub mod builder;
pub mod zip_codec;

pub use self::builder::{ArchiveBuilder, ArchiveReport, BuiltArchive};
pub use self::zip_codec::ZipCodec;

use crate::errors::AppResult;
use async_trait::async_trait;
use std::path::Path;

/// Compresses a directory into one archive file and extracts it again.
#[async_trait]
pub trait ArchiveCodec: Send + Sync {
    /// Compresses the children of `src_dir` as top-level entries of `archive`,
    /// replacing any existing file. Returns the number of files written.
    async fn compress_dir(&self, src_dir: &Path, archive: &Path) -> AppResult<usize>;

    /// Extracts `archive` into `dest_dir`. Returns the number of files written.
    ///
    /// Entries that would land outside `dest_dir` make the archive corrupt.
    async fn extract(&self, archive: &Path, dest_dir: &Path) -> AppResult<usize>;
}
