//! Persisted auto-backup policy state.
//!
//! The host app owns a small key-value store; the backup core reads and writes
//! a handful of keys in it through `PolicyStore`. Timestamps are stored as
//! RFC 3339 strings in UTC with millisecond precision.

use crate::constants::{
    KEY_ACCOUNT_LINKED, KEY_AUTO_BACKUP_ENABLED, KEY_LAST_BACKUP_ATTEMPT,
    KEY_LAST_SUCCESSFUL_BACKUP, KEY_LAST_SYNC_TIME,
};
use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Mutex as StdMutex;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// String key-value store holding policy flags and timestamps.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Returns the value stored under `key`, if any.
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> AppResult<()>;
}

/// In-memory store for tests and for hosts without persistence.
#[derive(Debug, Default)]
pub struct MemoryPolicyStore {
    values: StdMutex<HashMap<String, String>>,
}

impl MemoryPolicyStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|_| AppError::Policy("policy store lock poisoned".to_string()))?;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| AppError::Policy("policy store lock poisoned".to_string()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store backed by a JSON object file.
///
/// Writes go to a temporary sibling which is then renamed over the file, so a
/// crash mid-write keeps the previous contents.
#[derive(Debug)]
pub struct JsonFilePolicyStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFilePolicyStore {
    /// Creates a store persisted at `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> AppResult<BTreeMap<String, String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                AppError::Policy(format!("Policy file {:?} is not valid JSON: {}", self.path, e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

#[async_trait]
impl PolicyStore for JsonFilePolicyStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;

        let mut values = self.read_all().await?;
        values.insert(key.to_string(), value.to_string());
        let json = serde_json::to_vec_pretty(&values)
            .map_err(|e| AppError::Policy(format!("Failed to serialize policy: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!("Persisted policy key {}", key);
        Ok(())
    }
}

/// Formats a timestamp the way the policy store expects.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(key: &str, raw: Option<String>) -> Option<DateTime<Utc>> {
    let raw = raw?;
    match DateTime::parse_from_rfc3339(raw.trim()) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            warn!("Ignoring unparseable {} value '{}': {}", key, raw, e);
            None
        }
    }
}

fn parse_flag(raw: Option<String>) -> bool {
    raw.map_or(false, |v| v.trim().eq_ignore_ascii_case("true"))
}

/// Typed view of the persisted policy keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupPolicyState {
    /// Whether unattended backups are enabled; absent means disabled
    pub auto_backup_enabled: bool,
    /// Whether a remote account has been linked by a successful backup
    pub account_linked: bool,
    /// Last backup that completed successfully
    pub last_successful_backup: Option<DateTime<Utc>>,
    /// Last sync time shown by the settings screen
    pub last_sync_time: Option<DateTime<Utc>>,
    /// Last backup attempt, successful or not
    pub last_backup_attempt: Option<DateTime<Utc>>,
}

impl BackupPolicyState {
    /// Reads every policy key. Unparseable timestamps read as absent.
    pub async fn load(store: &dyn PolicyStore) -> AppResult<Self> {
        Ok(Self {
            auto_backup_enabled: parse_flag(store.get(KEY_AUTO_BACKUP_ENABLED).await?),
            account_linked: parse_flag(store.get(KEY_ACCOUNT_LINKED).await?),
            last_successful_backup: parse_timestamp(
                KEY_LAST_SUCCESSFUL_BACKUP,
                store.get(KEY_LAST_SUCCESSFUL_BACKUP).await?,
            ),
            last_sync_time: parse_timestamp(
                KEY_LAST_SYNC_TIME,
                store.get(KEY_LAST_SYNC_TIME).await?,
            ),
            last_backup_attempt: parse_timestamp(
                KEY_LAST_BACKUP_ATTEMPT,
                store.get(KEY_LAST_BACKUP_ATTEMPT).await?,
            ),
        })
    }
}

/// Turns unattended backups on or off.
pub async fn set_auto_backup_enabled(store: &dyn PolicyStore, enabled: bool) -> AppResult<()> {
    store
        .set(KEY_AUTO_BACKUP_ENABLED, if enabled { "true" } else { "false" })
        .await
}

/// Records that a backup is about to be attempted.
pub async fn record_attempt(store: &dyn PolicyStore, now: DateTime<Utc>) -> AppResult<()> {
    store
        .set(KEY_LAST_BACKUP_ATTEMPT, &format_timestamp(now))
        .await
}

/// Records a successful remote backup: success and sync timestamps, linked account.
pub async fn record_success(store: &dyn PolicyStore, now: DateTime<Utc>) -> AppResult<()> {
    let stamp = format_timestamp(now);
    store.set(KEY_LAST_SUCCESSFUL_BACKUP, &stamp).await?;
    store.set(KEY_LAST_SYNC_TIME, &stamp).await?;
    store.set(KEY_ACCOUNT_LINKED, "true").await
}
