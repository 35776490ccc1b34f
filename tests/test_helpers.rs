#![allow(dead_code)]

use async_trait::async_trait;
use rentsync::archive::ZipCodec;
use rentsync::remote::{
    AccessToken, RemoteBackupHandle, RemoteStore, TokenSession, UploadKind, UploadOutcome,
};
use rentsync::scheduler::MemoryPolicyStore;
use rentsync::storage::{FileStore, LocalFileStore};
use rentsync::{AppError, AppResult, BackupCore, Config};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use walkdir::WalkDir;

pub const TEST_TOKEN: &str = "test-access-token";

/// In-memory stand-in for the cloud slot.
///
/// Keeps every stored object so tests can assert the single-slot invariant.
#[derive(Default)]
pub struct MemoryRemote {
    objects: Mutex<Vec<(String, Vec<u8>)>>,
    next_id: AtomicUsize,
    uploads: AtomicUsize,
    upload_delay_ms: AtomicU64,
}

impl MemoryRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seeds a stray object, as if another device had raced an upload.
    pub fn seed(&self, bytes: Vec<u8>) -> String {
        let id = format!("file-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.objects.lock().unwrap().push((id.clone(), bytes));
        id
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn object_ids(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn live_bytes(&self) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().first().map(|(_, b)| b.clone())
    }

    /// Makes every upload wait before it reads the archive, like a slow link.
    pub fn set_upload_delay(&self, delay: Duration) {
        self.upload_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn find_handle(&self, token: &AccessToken) -> AppResult<Option<RemoteBackupHandle>> {
        token.ensure_present()?;
        Ok(self
            .objects
            .lock()
            .unwrap()
            .first()
            .map(|(id, bytes)| RemoteBackupHandle {
                id: id.clone(),
                name: "rental_backup.zip".to_string(),
                size: Some(bytes.len() as u64),
                modified_time: None,
            }))
    }

    async fn upload(&self, archive: &Path, token: &AccessToken) -> AppResult<UploadOutcome> {
        token.ensure_present()?;
        let delay = self.upload_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let bytes = fs::read(archive)?;
        let bytes_sent = bytes.len() as u64;
        self.uploads.fetch_add(1, Ordering::SeqCst);

        let mut objects = self.objects.lock().unwrap();
        let duplicates_removed = objects.len().saturating_sub(1);
        objects.truncate(1);

        let (kind, file_id) = match objects.first_mut() {
            Some((id, existing)) => {
                *existing = bytes;
                (UploadKind::Replaced, id.clone())
            }
            None => {
                let id = format!("file-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
                objects.push((id.clone(), bytes));
                (UploadKind::Created, id)
            }
        };

        Ok(UploadOutcome {
            kind,
            file_id: Some(file_id),
            bytes_sent,
            duplicates_removed,
        })
    }

    async fn download(&self, token: &AccessToken, dest: &Path) -> AppResult<Option<PathBuf>> {
        token.ensure_present()?;
        let Some(bytes) = self.live_bytes() else {
            return Ok(None);
        };
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(dest, bytes)?;
        Ok(Some(dest.to_path_buf()))
    }
}

fn injected(what: &str) -> AppError {
    AppError::Io(io::Error::new(io::ErrorKind::Other, format!("injected {} failure", what)))
}

/// `LocalFileStore` that fails chosen operations on demand.
#[derive(Default)]
pub struct FaultyFileStore {
    inner: LocalFileStore,
    fail_rename_from: Mutex<Option<PathBuf>>,
    fail_copy_dir: AtomicBool,
}

impl FaultyFileStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fails any rename whose source is `from`.
    pub fn fail_rename_from(&self, from: PathBuf) {
        *self.fail_rename_from.lock().unwrap() = Some(from);
    }

    pub fn fail_copy_dir(&self, fail: bool) {
        self.fail_copy_dir.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl FileStore for FaultyFileStore {
    async fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> AppResult<()> {
        self.inner.create_dir_all(path).await
    }

    async fn remove_dir_all(&self, path: &Path) -> AppResult<()> {
        self.inner.remove_dir_all(path).await
    }

    async fn remove_file(&self, path: &Path) -> AppResult<()> {
        self.inner.remove_file(path).await
    }

    async fn copy_file(&self, from: &Path, to: &Path) -> AppResult<u64> {
        self.inner.copy_file(from, to).await
    }

    async fn copy_dir(&self, from: &Path, to: &Path) -> AppResult<usize> {
        if self.fail_copy_dir.load(Ordering::SeqCst) {
            return Err(injected("copy_dir"));
        }
        self.inner.copy_dir(from, to).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> AppResult<()> {
        let fail = self.fail_rename_from.lock().unwrap().as_deref() == Some(from);
        if fail {
            return Err(injected("rename"));
        }
        self.inner.rename(from, to).await
    }

    async fn read(&self, path: &Path) -> AppResult<Vec<u8>> {
        self.inner.read(path).await
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> AppResult<()> {
        self.inner.write(path, contents).await
    }

    async fn file_size(&self, path: &Path) -> AppResult<u64> {
        self.inner.file_size(path).await
    }

    async fn dir_size(&self, path: &Path) -> AppResult<u64> {
        self.inner.dir_size(path).await
    }

    async fn available_space(&self, path: &Path) -> Option<u64> {
        self.inner.available_space(path).await
    }
}

/// Every file under `root`, keyed by its path relative to `root`.
pub fn tree_contents(root: &Path) -> BTreeMap<String, Vec<u8>> {
    WalkDir::new(root)
        .into_iter()
        .map(|entry| entry.expect("walk tree"))
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let rel = entry
                .path()
                .strip_prefix(root)
                .expect("entry under root")
                .to_string_lossy()
                .replace('\\', "/");
            (rel, fs::read(entry.path()).expect("read entry"))
        })
        .collect()
}

/// A core wired to a temp directory, an in-memory remote and an in-memory policy.
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub config: Config,
    pub remote: Arc<MemoryRemote>,
    pub session: Arc<TokenSession>,
    pub policy: Arc<MemoryPolicyStore>,
    pub core: BackupCore,
}

impl TestEnv {
    /// Creates an environment with a signed-in session and no local data.
    pub fn new() -> Self {
        Self::with_files(Arc::new(LocalFileStore::new()))
    }

    /// Like `new`, with the core reaching disk through `files`.
    pub fn with_files(files: Arc<dyn FileStore>) -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let config = Config::with_dirs(
            temp_dir.path().join("documents"),
            temp_dir.path().join("cache"),
        );
        let remote = MemoryRemote::new();
        let session = Arc::new(TokenSession::new());
        session.sign_in(AccessToken::new(TEST_TOKEN));
        let policy = Arc::new(MemoryPolicyStore::new());

        let core = BackupCore::from_parts(
            config.clone(),
            files,
            Arc::new(ZipCodec::new()),
            remote.clone(),
            session.clone(),
            policy.clone(),
        );

        Self {
            temp_dir,
            config,
            remote,
            session,
            policy,
            core,
        }
    }

    pub fn write_database(&self, contents: &[u8]) {
        let db = self.config.database_path();
        fs::create_dir_all(db.parent().unwrap()).expect("create db dir");
        fs::write(db, contents).expect("write db");
    }

    pub fn write_image(&self, rel: &str, contents: &[u8]) {
        let path = self.config.images_dir().join(rel);
        fs::create_dir_all(path.parent().unwrap()).expect("create image dir");
        fs::write(path, contents).expect("write image");
    }

    pub fn read_database(&self) -> Vec<u8> {
        fs::read(self.config.database_path()).expect("read db")
    }

    pub fn read_image(&self, rel: &str) -> Vec<u8> {
        fs::read(self.config.images_dir().join(rel)).expect("read image")
    }

    /// Removes all live local data, as on a fresh install.
    pub fn wipe_local(&self) {
        let _ = fs::remove_file(self.config.database_path());
        let _ = fs::remove_dir_all(self.config.images_dir());
    }
}
