//! User-facing backup operations.
//!
//! This module orchestrates the lower layers into the actions the host app
//! exposes: writing a local backup, backing up to and restoring from the remote
//! slot, and running unattended backups.
//!
//! `BackupCore` wires every component from a `Config`, an identity provider and
//! a policy store. Hosts that need to swap a component (tests, alternative
//! remotes) use `BackupCore::from_parts`.

pub mod local;
pub mod remote;
pub mod restore;

pub use local::LocalBackupWriter;
pub use remote::{RemoteBackup, UploadReport};
pub use restore::{RestoreOutcome, RestorePipeline, RestoreReport, RestoreStage};

use crate::archive::{ArchiveBuilder, ArchiveCodec, ZipCodec};
use crate::config::Config;
use crate::errors::AppResult;
use crate::remote::{DriveClient, IdentityProvider, RemoteStore};
use crate::scheduler::{AutoBackupScheduler, PolicyStore};
use crate::storage::{FileStore, LocalFileStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Every backup component, wired together once per process.
pub struct BackupCore {
    config: Config,
    policy: Arc<dyn PolicyStore>,
    local: LocalBackupWriter,
    remote: Arc<RemoteBackup>,
    restore: RestorePipeline,
    scheduler: AutoBackupScheduler,
}

impl BackupCore {
    /// Builds the core with the local filesystem, zip archives and the HTTP remote.
    ///
    /// # Errors
    ///
    /// Fails when the configuration is invalid or the HTTP client cannot be built.
    pub fn new(
        config: Config,
        identity: Arc<dyn IdentityProvider>,
        policy: Arc<dyn PolicyStore>,
    ) -> AppResult<Self> {
        config.validate()?;
        let remote: Arc<dyn RemoteStore> = Arc::new(DriveClient::new(&config)?);
        Ok(Self::from_parts(
            config,
            Arc::new(LocalFileStore::new()),
            Arc::new(ZipCodec::new()),
            remote,
            identity,
            policy,
        ))
    }

    /// Builds the core from explicit components.
    pub fn from_parts(
        config: Config,
        files: Arc<dyn FileStore>,
        codec: Arc<dyn ArchiveCodec>,
        remote_store: Arc<dyn RemoteStore>,
        identity: Arc<dyn IdentityProvider>,
        policy: Arc<dyn PolicyStore>,
    ) -> Self {
        debug!("Wiring backup core");
        let builder = Arc::new(ArchiveBuilder::new(
            config.clone(),
            files.clone(),
            codec.clone(),
        ));
        let local = LocalBackupWriter::new(config.clone(), builder.clone(), files.clone());
        let remote = Arc::new(RemoteBackup::new(
            config.clone(),
            builder,
            files.clone(),
            remote_store,
            identity.clone(),
            policy.clone(),
        ));
        let restore = RestorePipeline::new(config.clone(), files, codec, remote.clone());
        let scheduler = AutoBackupScheduler::new(
            policy.clone(),
            identity,
            remote.clone(),
            config.backup_cooldown,
        );

        Self {
            config,
            policy,
            local,
            remote,
            restore,
            scheduler,
        }
    }

    /// Configuration the core was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Policy store holding flags and timestamps.
    pub fn policy(&self) -> &Arc<dyn PolicyStore> {
        &self.policy
    }

    /// Writes the local backup file. See `LocalBackupWriter::write_local_backup`.
    pub async fn write_local_backup(&self) -> AppResult<PathBuf> {
        self.local.write_local_backup().await
    }

    /// Backs up to the remote slot. See `RemoteBackup::upload_backup`.
    pub async fn upload_backup(&self) -> AppResult<UploadReport> {
        self.remote.upload_backup().await
    }

    /// Downloads the remote backup into the cache without restoring it.
    pub async fn download_backup(&self) -> AppResult<Option<PathBuf>> {
        self.remote.download_backup().await
    }

    /// Restores from the remote slot.
    pub async fn restore(&self) -> AppResult<RestoreOutcome> {
        self.restore.restore().await
    }

    /// Restores from the local backup file.
    pub async fn restore_local(&self) -> AppResult<RestoreOutcome> {
        self.restore.restore_local().await
    }

    /// Restore pipeline, for inspecting `last_stage`.
    pub fn restore_pipeline(&self) -> &RestorePipeline {
        &self.restore
    }

    /// Scheduler for lifecycle triggers.
    pub fn scheduler(&self) -> &AutoBackupScheduler {
        &self.scheduler
    }
}
