//! Staging and compression of a fresh backup archive.

use crate::archive::ArchiveCodec;
use crate::config::Config;
use crate::constants::{DATABASE_FILE_NAME, IMAGES_DIR_NAME};
use crate::errors::{AppError, AppResult, BackupError};
use crate::storage::FileStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Report of a built archive.
#[derive(Debug, Clone)]
pub struct ArchiveReport {
    /// Location of the archive in the cache namespace
    pub path: PathBuf,
    /// Size of the archive in bytes
    pub archive_size: u64,
    /// BLAKE3 checksum of the archive
    pub checksum: String,
    /// Whether the image tree was present and included
    pub includes_images: bool,
    /// Number of files packed (database plus images)
    pub total_files: usize,
    /// Duration taken to stage and compress
    pub duration: Duration,
}

/// A freshly built archive, held exclusively by the caller.
///
/// The next build waits until this is discarded or dropped, so the archive
/// file is never rebuilt or removed while its holder is still reading it.
pub struct BuiltArchive {
    /// What was built
    pub report: ArchiveReport,
    files: Arc<dyn FileStore>,
    _lease: OwnedMutexGuard<()>,
}

impl std::fmt::Debug for BuiltArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltArchive")
            .field("report", &self.report)
            .finish_non_exhaustive()
    }
}

impl BuiltArchive {
    /// Location of the archive file.
    pub fn path(&self) -> &Path {
        &self.report.path
    }

    /// Deletes the archive file and releases the builder.
    pub async fn discard(self) -> ArchiveReport {
        if let Err(e) = self.files.remove_file(&self.report.path).await {
            warn!(
                "Failed to remove transient archive {:?}: {}",
                self.report.path, e
            );
        }
        self.report
    }
}

/// Builds the transient backup archive.
///
/// Builds are serialized, and a built archive stays leased to its caller
/// until discarded: two callers never share the staging directory or the
/// archive file.
pub struct ArchiveBuilder {
    config: Config,
    files: Arc<dyn FileStore>,
    codec: Arc<dyn ArchiveCodec>,
    build_lock: Arc<Mutex<()>>,
}

fn staging_error(context: &str) -> impl FnOnce(AppError) -> AppError + '_ {
    move |err| match err {
        AppError::Io(source) => BackupError::staging(context, source).into(),
        other => other,
    }
}

impl ArchiveBuilder {
    /// Creates a builder over the given filesystem and codec.
    pub fn new(config: Config, files: Arc<dyn FileStore>, codec: Arc<dyn ArchiveCodec>) -> Self {
        Self {
            config,
            files,
            codec,
            build_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Location the archive is written to.
    pub fn archive_path(&self) -> PathBuf {
        self.config.archive_path()
    }

    /// Stages the database and images and compresses them into the archive.
    ///
    /// # Flow
    ///
    /// 1. Fail with `SourceMissing` if the database file does not exist
    /// 2. Check the cache volume has room for staging plus archive
    /// 3. Clear and recreate the staging directory
    /// 4. Copy the database, then the image tree if present
    /// 5. Compress the staging directory to the archive path
    /// 6. Remove the staging directory whatever happened in 4 and 5
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The database file is missing (nothing is created on disk)
    /// - The cache volume is too small
    /// - A copy fails (`StagingFailure`)
    /// - Compression fails; any partial archive is removed
    pub async fn build_archive(&self) -> AppResult<BuiltArchive> {
        let span = info_span!("build_archive", correlation_id = %Uuid::new_v4());
        async {
            let lease = self.build_lock.clone().lock_owned().await;
            let report = self.build_locked().await?;
            Ok(BuiltArchive {
                report,
                files: self.files.clone(),
                _lease: lease,
            })
        }
        .instrument(span)
        .await
    }

    async fn build_locked(&self) -> AppResult<ArchiveReport> {
        let start_time = Instant::now();
        let db_path = self.config.database_path();
        let images_dir = self.config.images_dir();
        let staging = self.config.backup_staging_dir();
        let archive = self.config.archive_path();

        info!("Building backup archive");

        if !self.files.exists(&db_path).await {
            return Err(BackupError::SourceMissing { path: db_path }.into());
        }
        let includes_images = self.files.exists(&images_dir).await;

        self.ensure_space(&db_path, includes_images.then_some(images_dir.as_path()))
            .await?;

        self.files
            .remove_dir_all(&staging)
            .await
            .map_err(staging_error("clearing stale staging directory"))?;
        self.files
            .create_dir_all(&staging)
            .await
            .map_err(staging_error("creating staging directory"))?;

        let result = self
            .stage_and_compress(&db_path, includes_images, &images_dir, &staging, &archive)
            .await;

        if let Err(e) = self.files.remove_dir_all(&staging).await {
            warn!("Failed to remove staging directory {:?}: {}", staging, e);
        }

        let total_files = match result {
            Ok(count) => count,
            Err(e) => {
                if let Err(cleanup) = self.files.remove_file(&archive).await {
                    warn!("Failed to remove partial archive {:?}: {}", archive, cleanup);
                }
                return Err(e);
            }
        };

        let bytes = self.files.read(&archive).await?;
        let checksum = blake3::hash(&bytes).to_hex().to_string();
        let duration = start_time.elapsed();

        info!(
            "Archive built: {} files, {} bytes, images included: {}",
            total_files,
            bytes.len(),
            includes_images
        );

        Ok(ArchiveReport {
            path: archive,
            archive_size: bytes.len() as u64,
            checksum,
            includes_images,
            total_files,
            duration,
        })
    }

    async fn ensure_space(&self, db_path: &Path, images_dir: Option<&Path>) -> AppResult<()> {
        let mut source_size = self.files.file_size(db_path).await?;
        if let Some(images) = images_dir {
            source_size += self.files.dir_size(images).await?;
        }

        // Staged copy plus an uncompressed-size upper bound on the archive.
        let needed = source_size.saturating_mul(2);
        if let Some(available) = self
            .files
            .available_space(&self.config.cache_namespace())
            .await
        {
            debug!("Need {} bytes, {} available", needed, available);
            if available < needed {
                return Err(BackupError::InsufficientSpace { needed, available }.into());
            }
        }
        Ok(())
    }

    async fn stage_and_compress(
        &self,
        db_path: &Path,
        includes_images: bool,
        images_dir: &Path,
        staging: &Path,
        archive: &Path,
    ) -> AppResult<usize> {
        debug!("Staging database");
        self.files
            .copy_file(db_path, &staging.join(DATABASE_FILE_NAME))
            .await
            .map_err(staging_error("copying database"))?;

        if includes_images {
            debug!("Staging image tree");
            let copied = self
                .files
                .copy_dir(images_dir, &staging.join(IMAGES_DIR_NAME))
                .await
                .map_err(staging_error("copying images"))?;
            debug!("Staged {} images", copied);
        } else {
            debug!("No image directory, archiving database only");
        }

        debug!("Compressing staging directory");
        self.codec.compress_dir(staging, archive).await
    }
}
