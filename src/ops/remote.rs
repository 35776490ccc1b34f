//! The remote backup path shared by manual and automatic backups.
//!
//! Both the "Back up now" action and the auto-backup scheduler go through
//! `RemoteBackup::upload_backup`, so a manual backup and an unattended one
//! leave the policy timestamps in the same state.

use crate::archive::{ArchiveBuilder, ArchiveReport};
use crate::config::Config;
use crate::errors::{AppResult, BackupError};
use crate::remote::{IdentityProvider, RemoteStore, UploadOutcome};
use crate::scheduler::policy::{self, PolicyStore};
use crate::scheduler::BackupRunner;
use crate::storage::FileStore;
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Report of a completed remote backup.
#[derive(Debug, Clone)]
pub struct UploadReport {
    /// The archive that was sent
    pub archive: ArchiveReport,
    /// What the remote did with it
    pub outcome: UploadOutcome,
}

/// Builds archives and moves them to and from the remote slot.
pub struct RemoteBackup {
    config: Config,
    builder: Arc<ArchiveBuilder>,
    files: Arc<dyn FileStore>,
    remote: Arc<dyn RemoteStore>,
    identity: Arc<dyn IdentityProvider>,
    policy: Arc<dyn PolicyStore>,
}

impl RemoteBackup {
    /// Wires the remote path from its collaborators.
    pub fn new(
        config: Config,
        builder: Arc<ArchiveBuilder>,
        files: Arc<dyn FileStore>,
        remote: Arc<dyn RemoteStore>,
        identity: Arc<dyn IdentityProvider>,
        policy: Arc<dyn PolicyStore>,
    ) -> Self {
        Self {
            config,
            builder,
            files,
            remote,
            identity,
            policy,
        }
    }

    /// Builds a fresh archive and uploads it to the remote slot.
    ///
    /// # Flow
    ///
    /// 1. Fail with `NotSignedIn` before any file I/O if no account is signed in
    /// 2. Record the attempt timestamp
    /// 3. Build the archive
    /// 4. Upload it, replacing the existing remote object if there is one
    /// 5. Delete the transient archive
    /// 6. Record the success and sync timestamps
    ///
    /// # Errors
    ///
    /// Returns the first failure; nothing is retried.
    pub async fn upload_backup(&self) -> AppResult<UploadReport> {
        let span = info_span!("upload_backup", correlation_id = %Uuid::new_v4());
        let result = self.upload_inner().instrument(span).await;
        if let Err(e) = &result {
            error!("Remote backup failed: {}", e);
        }
        result
    }

    async fn upload_inner(&self) -> AppResult<UploadReport> {
        if !self.identity.is_signed_in().await {
            return Err(BackupError::NotSignedIn.into());
        }
        let token = self.identity.access_token().await?;

        if let Err(e) = policy::record_attempt(self.policy.as_ref(), Utc::now()).await {
            warn!("Failed to record backup attempt: {}", e);
        }

        let built = self.builder.build_archive().await?;
        let upload = self.remote.upload(built.path(), &token).await;
        let archive = built.discard().await;
        let outcome = upload?;

        policy::record_success(self.policy.as_ref(), Utc::now()).await?;

        info!(
            "Remote backup complete: {} bytes, {:?}",
            archive.archive_size, outcome.kind
        );
        Ok(UploadReport { archive, outcome })
    }

    /// Downloads the remote archive into the cache namespace.
    ///
    /// Returns `Ok(None)` when there is no remote backup.
    pub async fn download_backup(&self) -> AppResult<Option<PathBuf>> {
        if !self.identity.is_signed_in().await {
            return Err(BackupError::NotSignedIn.into());
        }
        let token = self.identity.access_token().await?;

        let dest = self.config.restore_download_path();
        self.files.remove_file(&dest).await?;
        self.remote.download(&token, &dest).await
    }
}

#[async_trait]
impl BackupRunner for RemoteBackup {
    async fn run_backup(&self) -> AppResult<()> {
        self.upload_backup().await.map(|_| ())
    }
}
