//! Replacing local state with the contents of a backup archive.
//!
//! A restore moves through fixed stages:
//!
//! ```text
//! Idle -> Downloading -> Extracting -> Validating -> Promoting -> Done
//!                         (any failure) -> Failed
//! ```
//!
//! Promotion writes the new database and image tree next to the live ones,
//! moves the live copies aside to `.previous` siblings and renames the new ones
//! into place. If any rename fails the `.previous` copies are moved back, so
//! the live database and image tree are either both old or both new.

use crate::archive::ArchiveCodec;
use crate::config::Config;
use crate::constants::{
    DATABASE_FILE_NAME, IMAGES_DIR_NAME, PREVIOUS_SUFFIX, RESTORING_SUFFIX,
};
use crate::errors::{AppError, AppResult, BackupError};
use crate::ops::remote::RemoteBackup;
use crate::storage::FileStore;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Where a restore currently is, or where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreStage {
    /// No restore has run yet
    Idle,
    /// Fetching the remote archive into the cache
    Downloading,
    /// Unpacking the archive into the staging directory
    Extracting,
    /// Checking the staged tree holds a database
    Validating,
    /// Swapping the staged database and images over the live ones
    Promoting,
    /// Finished, including the nothing-to-restore case
    Done,
    /// Stopped on an error; live data is as it was before the restore
    Failed,
}

/// Summary of a completed restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    /// Size of the restored database in bytes
    pub database_size: u64,
    /// Number of image files restored
    pub images_restored: usize,
    /// Whether the image tree was replaced
    pub images_replaced: bool,
    /// Wall time of the whole restore
    pub duration: Duration,
}

/// Result of a restore that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Local state was replaced
    Restored(RestoreReport),
    /// There was no backup to restore; local state is unchanged
    NothingToRestore,
}

/// Downloads, unpacks and promotes a backup over the live data.
pub struct RestorePipeline {
    config: Config,
    files: Arc<dyn FileStore>,
    codec: Arc<dyn ArchiveCodec>,
    remote: Arc<RemoteBackup>,
    stage: StdMutex<RestoreStage>,
    run_lock: Mutex<()>,
}

impl RestorePipeline {
    /// Creates an idle pipeline that downloads through `remote`.
    pub fn new(
        config: Config,
        files: Arc<dyn FileStore>,
        codec: Arc<dyn ArchiveCodec>,
        remote: Arc<RemoteBackup>,
    ) -> Self {
        Self {
            config,
            files,
            codec,
            remote,
            stage: StdMutex::new(RestoreStage::Idle),
            run_lock: Mutex::new(()),
        }
    }

    /// The stage the most recent restore reached.
    pub fn last_stage(&self) -> RestoreStage {
        self.stage.lock().map(|s| *s).unwrap_or(RestoreStage::Failed)
    }

    fn enter(&self, stage: RestoreStage) {
        if let Ok(mut current) = self.stage.lock() {
            *current = stage;
        }
        debug!("Restore stage: {:?}", stage);
    }

    /// Restores from the remote backup.
    ///
    /// Returns `NothingToRestore` when no remote backup exists. The downloaded
    /// archive and the staging directory are removed on every exit path.
    pub async fn restore(&self) -> AppResult<RestoreOutcome> {
        let span = info_span!("restore", correlation_id = %Uuid::new_v4(), source = "remote");
        async {
            let _guard = self.run_lock.lock().await;
            let started = Instant::now();

            self.enter(RestoreStage::Downloading);
            let archive = match self.remote.download_backup().await {
                Ok(Some(path)) => path,
                Ok(None) => {
                    info!("No remote backup found; nothing to restore");
                    self.enter(RestoreStage::Done);
                    return Ok(RestoreOutcome::NothingToRestore);
                }
                Err(e) => return Err(self.fail(e)),
            };

            let result = self.unpack_and_promote(&archive, started).await;
            if let Err(e) = self.files.remove_file(&archive).await {
                warn!("Failed to remove downloaded archive {:?}: {}", archive, e);
            }
            result.map(RestoreOutcome::Restored)
        }
        .instrument(span)
        .await
    }

    /// Restores from the local backup file in the documents directory.
    ///
    /// The local backup itself is left in place.
    pub async fn restore_local(&self) -> AppResult<RestoreOutcome> {
        let span = info_span!("restore", correlation_id = %Uuid::new_v4(), source = "local");
        async {
            let _guard = self.run_lock.lock().await;
            let started = Instant::now();

            let archive = self.config.local_backup_path();
            if !self.files.exists(&archive).await {
                info!("No local backup found; nothing to restore");
                self.enter(RestoreStage::Done);
                return Ok(RestoreOutcome::NothingToRestore);
            }

            self.unpack_and_promote(&archive, started)
                .await
                .map(RestoreOutcome::Restored)
        }
        .instrument(span)
        .await
    }

    fn fail(&self, err: AppError) -> AppError {
        let stage = self.last_stage();
        self.enter(RestoreStage::Failed);
        error!("Restore failed during {:?}: {}", stage, err);
        err
    }

    async fn unpack_and_promote(&self, archive: &Path, started: Instant) -> AppResult<RestoreReport> {
        let staging = self.config.restore_staging_dir();
        let result = self.stage_and_promote(archive, &staging, started).await;

        if let Err(e) = self.files.remove_dir_all(&staging).await {
            warn!("Failed to remove restore staging {:?}: {}", staging, e);
        }

        match result {
            Ok(report) => {
                self.enter(RestoreStage::Done);
                info!(
                    "Restore complete: database {} bytes, {} images",
                    report.database_size, report.images_restored
                );
                Ok(report)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn stage_and_promote(
        &self,
        archive: &Path,
        staging: &Path,
        started: Instant,
    ) -> AppResult<RestoreReport> {
        self.enter(RestoreStage::Extracting);
        self.files.remove_dir_all(staging).await?;
        self.files.create_dir_all(staging).await?;
        let entries = self.codec.extract(archive, staging).await?;
        debug!("Extracted {} entries", entries);

        self.enter(RestoreStage::Validating);
        let staged_db = staging.join(DATABASE_FILE_NAME);
        if !self.files.exists(&staged_db).await {
            return Err(BackupError::CorruptArchive(format!(
                "archive has no {} entry",
                DATABASE_FILE_NAME
            ))
            .into());
        }
        let staged_images = staging.join(IMAGES_DIR_NAME);
        let has_images = self.files.exists(&staged_images).await;

        self.enter(RestoreStage::Promoting);
        self.promote(&staged_db, has_images.then_some(staged_images.as_path()), started)
            .await
    }

    async fn promote(
        &self,
        staged_db: &Path,
        staged_images: Option<&Path>,
        started: Instant,
    ) -> AppResult<RestoreReport> {
        let paths = PromotionPaths::new(&self.config);

        // Both replacements are fully written before anything live is touched.
        let written = self.write_replacements(&paths, staged_db, staged_images).await;
        let (database_size, images_restored) = match written {
            Ok(sizes) => sizes,
            Err(e) => {
                self.discard_replacements(&paths).await;
                return Err(e);
            }
        };

        let mut progress = Progress::default();
        if let Err(e) = self
            .swap_in(&paths, staged_images.is_some(), &mut progress)
            .await
        {
            self.roll_back(&paths, &progress).await;
            self.discard_replacements(&paths).await;
            return Err(e);
        }

        if let Err(e) = self.files.remove_file(&paths.db_prev).await {
            warn!("Failed to remove previous database {:?}: {}", paths.db_prev, e);
        }
        if let Err(e) = self.files.remove_dir_all(&paths.images_prev).await {
            warn!("Failed to remove previous image tree {:?}: {}", paths.images_prev, e);
        }

        Ok(RestoreReport {
            database_size,
            images_restored,
            images_replaced: staged_images.is_some(),
            duration: started.elapsed(),
        })
    }

    async fn write_replacements(
        &self,
        paths: &PromotionPaths,
        staged_db: &Path,
        staged_images: Option<&Path>,
    ) -> AppResult<(u64, usize)> {
        let database_size = self.files.copy_file(staged_db, &paths.db_tmp).await?;
        let mut images_restored = 0;
        if let Some(staged_images) = staged_images {
            self.files.remove_dir_all(&paths.images_tmp).await?;
            images_restored = self.files.copy_dir(staged_images, &paths.images_tmp).await?;
        }
        Ok((database_size, images_restored))
    }

    /// Moves the live data aside and the replacements in, recording each step
    /// in `progress` so a failure can be undone.
    async fn swap_in(
        &self,
        paths: &PromotionPaths,
        replace_images: bool,
        progress: &mut Progress,
    ) -> AppResult<()> {
        self.files.remove_file(&paths.db_prev).await?;
        self.files.remove_dir_all(&paths.images_prev).await?;

        if self.files.exists(&paths.live_db).await {
            self.files.rename(&paths.live_db, &paths.db_prev).await?;
            progress.db_set_aside = true;
        }
        if replace_images && self.files.exists(&paths.live_images).await {
            self.files.rename(&paths.live_images, &paths.images_prev).await?;
            progress.images_set_aside = true;
        }

        self.files.rename(&paths.db_tmp, &paths.live_db).await?;
        progress.db_installed = true;

        if replace_images {
            self.files.rename(&paths.images_tmp, &paths.live_images).await?;
        }
        Ok(())
    }

    async fn roll_back(&self, paths: &PromotionPaths, progress: &Progress) {
        let db = if progress.db_set_aside {
            self.files.rename(&paths.db_prev, &paths.live_db).await
        } else if progress.db_installed {
            self.files.remove_file(&paths.live_db).await
        } else {
            Ok(())
        };
        if let Err(e) = db {
            error!("Failed to put previous database back: {}", e);
        }

        if progress.images_set_aside {
            if let Err(e) = self.files.rename(&paths.images_prev, &paths.live_images).await {
                error!("Failed to put previous image tree back: {}", e);
            }
        }
    }

    async fn discard_replacements(&self, paths: &PromotionPaths) {
        if let Err(e) = self.files.remove_file(&paths.db_tmp).await {
            warn!("Failed to remove {:?}: {}", paths.db_tmp, e);
        }
        if let Err(e) = self.files.remove_dir_all(&paths.images_tmp).await {
            warn!("Failed to remove {:?}: {}", paths.images_tmp, e);
        }
    }
}

/// Live locations and their `.restoring` / `.previous` siblings.
struct PromotionPaths {
    live_db: PathBuf,
    db_tmp: PathBuf,
    db_prev: PathBuf,
    live_images: PathBuf,
    images_tmp: PathBuf,
    images_prev: PathBuf,
}

impl PromotionPaths {
    fn new(config: &Config) -> Self {
        let live_db = config.database_path();
        let live_images = config.images_dir();
        Self {
            db_tmp: sibling(&live_db, RESTORING_SUFFIX),
            db_prev: sibling(&live_db, PREVIOUS_SUFFIX),
            images_tmp: sibling(&live_images, RESTORING_SUFFIX),
            images_prev: sibling(&live_images, PREVIOUS_SUFFIX),
            live_db,
            live_images,
        }
    }
}

#[derive(Debug, Default)]
struct Progress {
    db_set_aside: bool,
    images_set_aside: bool,
    db_installed: bool,
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}
