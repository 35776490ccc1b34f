//! Durable local copy of the backup archive.

use crate::archive::ArchiveBuilder;
use crate::config::Config;
use crate::constants::BACKUP_FILE_NAME;
use crate::errors::{AppError, AppResult, BackupError};
use crate::storage::FileStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Writes the single local backup file in the documents directory.
pub struct LocalBackupWriter {
    config: Config,
    builder: Arc<ArchiveBuilder>,
    files: Arc<dyn FileStore>,
}

impl LocalBackupWriter {
    /// Creates a writer sharing the given builder.
    pub fn new(config: Config, builder: Arc<ArchiveBuilder>, files: Arc<dyn FileStore>) -> Self {
        Self {
            config,
            builder,
            files,
        }
    }

    /// Builds a fresh archive and copies it over the local backup file.
    ///
    /// The copy lands on a `.partial` sibling first and is renamed into place,
    /// so an interrupted write never replaces a good backup with a truncated one.
    /// The transient archive in the cache is removed either way.
    ///
    /// # Returns
    ///
    /// The path of the local backup, for display.
    pub async fn write_local_backup(&self) -> AppResult<PathBuf> {
        let span = info_span!("write_local_backup", correlation_id = %Uuid::new_v4());
        let result = self.write_inner().instrument(span).await;
        if let Err(e) = &result {
            error!("Local backup failed: {}", e);
        }
        result
    }

    async fn write_inner(&self) -> AppResult<PathBuf> {
        let built = self.builder.build_archive().await?;
        let dest = self.config.local_backup_path();
        let partial = dest.with_file_name(format!("{}.partial", BACKUP_FILE_NAME));

        debug!("Copying archive to local backup location");
        let copied = async {
            self.files.copy_file(built.path(), &partial).await?;
            self.files.rename(&partial, &dest).await
        }
        .await;
        let report = built.discard().await;

        if let Err(e) = copied {
            if let Err(cleanup) = self.files.remove_file(&partial).await {
                warn!("Failed to remove partial backup {:?}: {}", partial, cleanup);
            }
            return Err(match e {
                AppError::Io(source) => {
                    BackupError::staging("copying archive to local backup", source).into()
                }
                other => other,
            });
        }

        info!("Local backup written ({} bytes)", report.archive_size);
        Ok(dest)
    }
}
