//! `FileStore` backed by the local filesystem.

use crate::errors::{AppError, AppResult};
use crate::storage::FileStore;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use walkdir::WalkDir;

/// Real filesystem store. Directory walks run on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileStore;

impl LocalFileStore {
    /// Creates a new local store.
    pub fn new() -> Self {
        LocalFileStore
    }
}

fn ignore_not_found(result: io::Result<()>) -> AppResult<()> {
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other.map_err(AppError::Io),
    }
}

fn join_error(e: tokio::task::JoinError) -> AppError {
    AppError::Io(io::Error::new(io::ErrorKind::Other, e))
}

fn copy_tree(from: &Path, to: &Path) -> io::Result<usize> {
    std::fs::create_dir_all(to)?;
    let mut copied = 0;

    for entry in WalkDir::new(from).follow_links(false) {
        let entry = entry.map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target = to.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }

    Ok(copied)
}

fn tree_size(root: &Path) -> io::Result<u64> {
    if !root.exists() {
        return Ok(0);
    }

    let mut total = 0;
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        if entry.file_type().is_file() {
            total += entry
                .metadata()
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
                .len();
        }
    }
    Ok(total)
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn exists(&self, path: &Path) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }

    async fn create_dir_all(&self, path: &Path) -> AppResult<()> {
        fs::create_dir_all(path).await?;
        Ok(())
    }

    async fn remove_dir_all(&self, path: &Path) -> AppResult<()> {
        ignore_not_found(fs::remove_dir_all(path).await)
    }

    async fn remove_file(&self, path: &Path) -> AppResult<()> {
        ignore_not_found(fs::remove_file(path).await)
    }

    async fn copy_file(&self, from: &Path, to: &Path) -> AppResult<u64> {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(fs::copy(from, to).await?)
    }

    async fn copy_dir(&self, from: &Path, to: &Path) -> AppResult<usize> {
        let (from, to): (PathBuf, PathBuf) = (from.into(), to.into());
        debug!("Copying tree {:?} -> {:?}", from, to);
        let copied = tokio::task::spawn_blocking(move || copy_tree(&from, &to))
            .await
            .map_err(join_error)??;
        Ok(copied)
    }

    async fn rename(&self, from: &Path, to: &Path) -> AppResult<()> {
        fs::rename(from, to).await?;
        Ok(())
    }

    async fn read(&self, path: &Path) -> AppResult<Vec<u8>> {
        Ok(fs::read(path).await?)
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, contents).await?;
        Ok(())
    }

    async fn file_size(&self, path: &Path) -> AppResult<u64> {
        Ok(fs::metadata(path).await?.len())
    }

    async fn dir_size(&self, path: &Path) -> AppResult<u64> {
        let root = path.to_path_buf();
        let size = tokio::task::spawn_blocking(move || tree_size(&root))
            .await
            .map_err(join_error)??;
        Ok(size)
    }

    async fn available_space(&self, path: &Path) -> Option<u64> {
        // fs2 needs an existing path; walk up to the nearest ancestor that exists.
        let mut next = Some(path);
        while let Some(candidate) = next {
            if candidate.exists() {
                return fs2::available_space(candidate).ok();
            }
            next = candidate.parent();
        }
        None
    }
}
