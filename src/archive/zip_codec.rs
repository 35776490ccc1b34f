//! Zip implementation of `ArchiveCodec`.
//!
//! Entries are stored with forward-slash relative paths, directories included,
//! so archives produced here extract identically on every platform. Walks are
//! sorted by file name to keep entry order stable between builds.

use crate::archive::ArchiveCodec;
use crate::errors::{AppError, AppResult, BackupError};
use async_trait::async_trait;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Deflate-compressed zip archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipCodec;

impl ZipCodec {
    /// Creates a new codec.
    pub fn new() -> Self {
        ZipCodec
    }
}

fn compression_error(context: &str, e: impl std::fmt::Display) -> AppError {
    BackupError::Compression(format!("{}: {}", context, e)).into()
}

fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn compress_blocking(src_dir: &Path, archive: &Path) -> AppResult<usize> {
    if let Some(parent) = archive.parent() {
        fs::create_dir_all(parent).map_err(|e| compression_error("creating archive directory", e))?;
    }

    let file = File::create(archive).map_err(|e| compression_error("creating archive file", e))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let file_options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let dir_options = FileOptions::default().compression_method(CompressionMethod::Stored);

    let mut files = 0;
    for entry in WalkDir::new(src_dir)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| compression_error("walking staging directory", e))?;
        let relative = entry
            .path()
            .strip_prefix(src_dir)
            .map_err(|e| compression_error("computing entry name", e))?;
        let name = entry_name(relative);

        if entry.file_type().is_dir() {
            zip.add_directory(format!("{}/", name), dir_options)
                .map_err(|e| compression_error(&format!("adding directory {}", name), e))?;
        } else if entry.file_type().is_file() {
            debug!("Adding to archive: {}", name);
            zip.start_file(name.as_str(), file_options)
                .map_err(|e| compression_error(&format!("adding {}", name), e))?;
            let mut reader = BufReader::new(
                File::open(entry.path())
                    .map_err(|e| compression_error(&format!("opening {}", name), e))?,
            );
            io::copy(&mut reader, &mut zip)
                .map_err(|e| compression_error(&format!("writing {}", name), e))?;
            files += 1;
        }
    }

    zip.finish()
        .map_err(|e| compression_error("finalizing archive", e))?;
    Ok(files)
}

fn extract_blocking(archive: &Path, dest_dir: &Path) -> AppResult<usize> {
    let file = File::open(archive).map_err(|e| compression_error("opening archive", e))?;
    let mut zip = ZipArchive::new(BufReader::new(file))
        .map_err(|e| BackupError::CorruptArchive(format!("not a zip archive: {}", e)))?;

    fs::create_dir_all(dest_dir).map_err(|e| BackupError::staging("creating restore staging directory", e))?;

    let mut files = 0;
    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| BackupError::CorruptArchive(format!("unreadable entry #{}: {}", i, e)))?;

        let relative: PathBuf = match entry.enclosed_name() {
            Some(path) => path.to_path_buf(),
            None => {
                return Err(BackupError::CorruptArchive(format!(
                    "entry '{}' escapes the archive root",
                    entry.name()
                ))
                .into())
            }
        };
        let target = dest_dir.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| BackupError::staging(format!("creating {}", relative.display()), e))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| BackupError::staging(format!("creating {}", parent.display()), e))?;
        }
        let mut out = File::create(&target)
            .map_err(|e| BackupError::staging(format!("creating {}", relative.display()), e))?;
        io::copy(&mut entry, &mut out)
            .map_err(|e| BackupError::CorruptArchive(format!("reading {}: {}", relative.display(), e)))?;
        files += 1;
    }

    Ok(files)
}

fn join_error(e: tokio::task::JoinError) -> AppError {
    AppError::Io(io::Error::new(io::ErrorKind::Other, e))
}

#[async_trait]
impl ArchiveCodec for ZipCodec {
    async fn compress_dir(&self, src_dir: &Path, archive: &Path) -> AppResult<usize> {
        let (src_dir, archive) = (src_dir.to_path_buf(), archive.to_path_buf());
        tokio::task::spawn_blocking(move || compress_blocking(&src_dir, &archive))
            .await
            .map_err(join_error)?
    }

    async fn extract(&self, archive: &Path, dest_dir: &Path) -> AppResult<usize> {
        let (archive, dest_dir) = (archive.to_path_buf(), dest_dir.to_path_buf());
        tokio::task::spawn_blocking(move || extract_blocking(&archive, &dest_dir))
            .await
            .map_err(join_error)?
    }
}
