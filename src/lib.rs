/*!
# rentsync

Backup, restore and sync core for a single-user rental-management app.

rentsync packages the app's local database file and image tree into one zip
archive, keeps a durable copy of it in the documents directory, mirrors it to a
single-slot object in the user's private cloud storage area, and restores local
state from that object. An auto-backup scheduler runs unattended backups on
lifecycle triggers, at most once per cooldown window and never two at a time.

## Architecture

- `archive`: assembling and unpacking the backup archive
- `config`: directory layout, remote endpoints, timeouts
- `errors`: error types shared by every module
- `logging`: optional tracing subscriber setup
- `ops`: the user-facing operations, wired together by `BackupCore`
- `remote`: identity boundary and the HTTP single-slot client
- `scheduler`: auto-backup guards, single-flight, policy store
- `storage`: filesystem capability used by the other layers

## Usage Example

```rust,no_run
use rentsync::remote::{AccessToken, TokenSession};
use rentsync::scheduler::{JsonFilePolicyStore, Trigger};
use rentsync::{BackupCore, Config};
use std::sync::Arc;

# async fn run() -> rentsync::AppResult<()> {
let config = Config::load()?;
let session = Arc::new(TokenSession::new());
session.sign_in(AccessToken::new("token-from-the-host-sign-in-flow"));
let policy = Arc::new(JsonFilePolicyStore::new(config.policy_path()));

let core = BackupCore::new(config, session, policy)?;
core.write_local_backup().await?;
core.upload_backup().await?;
core.scheduler().on_trigger(Trigger::Foreground).await;
# Ok(())
# }
```
*/

/// Archive assembly and the zip codec
pub mod archive;
/// Configuration loading and management
pub mod config;
/// Fixed names, keys and defaults
pub mod constants;
/// Error types and utilities for error handling
pub mod errors;
/// Tracing subscriber setup
pub mod logging;
/// User-facing backup operations
pub mod ops;
/// Remote single-slot storage
pub mod remote;
/// Auto-backup scheduling and policy state
pub mod scheduler;
/// Filesystem capability
pub mod storage;

// Re-export important types for convenience
pub use config::Config;
pub use errors::{AppError, AppResult, BackupError, RemoteError};
pub use ops::{BackupCore, RestoreOutcome, RestoreReport, RestoreStage, UploadReport};
pub use scheduler::{AutoBackupScheduler, Trigger, TriggerOutcome};
