//! HTTP client for the per-application cloud storage area.
//!
//! Talks to a Drive v3 style API: files are listed with a query string,
//! created or replaced with a two-part multipart upload (JSON metadata plus the
//! archive bytes), and fetched with `alt=media`.

use crate::config::Config;
use crate::constants::{APP_DATA_FOLDER, ARCHIVE_MIME_TYPE, BACKUP_FILE_NAME};
use crate::errors::{AppError, AppResult, RemoteError};
use crate::remote::{AccessToken, RemoteBackupHandle, RemoteStore, UploadKind, UploadOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Fields requested when listing files.
const LIST_FIELDS: &str = "files(id,name,size,modifiedTime,trashed)";

/// A file entry in a listing response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    trashed: bool,
    size: Option<String>,
    modified_time: Option<DateTime<Utc>>,
}

/// Response from the listing endpoint.
#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

/// Response from the create and replace endpoints.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: Option<String>,
}

impl From<DriveFile> for RemoteBackupHandle {
    fn from(file: DriveFile) -> Self {
        RemoteBackupHandle {
            id: file.id,
            name: file.name,
            size: file.size.and_then(|s| s.parse().ok()),
            modified_time: file.modified_time,
        }
    }
}

/// Client for the remote backup slot.
#[derive(Debug, Clone)]
pub struct DriveClient {
    api_url: String,
    upload_url: String,
    client: Client,
}

/// Turns a non-success response into `RemoteError::Status`.
async fn check_status(response: Response) -> AppResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Status {
        status: status.as_u16(),
        body,
    }
    .into())
}

fn search_query() -> String {
    format!(
        "name = '{}' and '{}' in parents and trashed = false",
        BACKUP_FILE_NAME, APP_DATA_FOLDER
    )
}

/// Records a failed remote operation in the current span; callers log the error.
fn log_failure<T>(operation: &str, result: AppResult<T>) -> AppResult<T> {
    if let Err(e) = &result {
        debug!("Remote {} failed: {}", operation, e);
    }
    result
}

impl DriveClient {
    /// Creates a client using the endpoints and timeout from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(config: &Config) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(RemoteError::Request)?;

        Ok(Self {
            api_url: config.drive_api_url.trim_end_matches('/').to_string(),
            upload_url: config.drive_upload_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Lists every live backup object under the fixed name.
    ///
    /// More than one result means the single-slot invariant was broken by an
    /// earlier writer; `upload` repairs it.
    pub async fn find_handles(&self, token: &AccessToken) -> AppResult<Vec<RemoteBackupHandle>> {
        token.ensure_present()?;

        let url = format!("{}/files", self.api_url);
        let query = search_query();
        debug!("Listing remote backups");

        let response = self
            .client
            .get(&url)
            .bearer_auth(token.expose())
            .query(&[
                ("q", query.as_str()),
                ("spaces", APP_DATA_FOLDER),
                ("fields", LIST_FIELDS),
                ("orderBy", "modifiedTime desc"),
            ])
            .send()
            .await?;
        let response = check_status(response).await?;

        let list: FileList = response.json().await.map_err(|e| {
            RemoteError::InvalidResponse(format!("Failed to parse file listing: {}", e))
        })?;

        let handles: Vec<RemoteBackupHandle> = list
            .files
            .into_iter()
            .filter(|f| !f.trashed)
            .map(RemoteBackupHandle::from)
            .collect();

        debug!("Found {} remote backup(s)", handles.len());
        Ok(handles)
    }

    async fn delete(&self, token: &AccessToken, id: &str) -> AppResult<()> {
        let url = format!("{}/files/{}", self.api_url, id);
        let response = self
            .client
            .delete(&url)
            .bearer_auth(token.expose())
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    fn multipart_body(metadata: serde_json::Value, bytes: Vec<u8>) -> AppResult<Form> {
        let metadata_part =
            Part::text(metadata.to_string()).mime_str("application/json; charset=UTF-8")?;
        let file_part = Part::bytes(bytes)
            .file_name(BACKUP_FILE_NAME)
            .mime_str(ARCHIVE_MIME_TYPE)?;

        Ok(Form::new()
            .part("metadata", metadata_part)
            .part("file", file_part))
    }

    async fn upload_inner(&self, archive: &Path, token: &AccessToken) -> AppResult<UploadOutcome> {
        token.ensure_present()?;

        let bytes = tokio::fs::read(archive).await?;
        let bytes_sent = bytes.len() as u64;

        let handles = self.find_handles(token).await?;
        let (existing, duplicates) = match handles.split_first() {
            Some((first, rest)) => (Some(first.clone()), rest.to_vec()),
            None => (None, Vec::new()),
        };

        let (kind, request) = match &existing {
            Some(handle) => {
                info!("Replacing remote backup {}", handle.id);
                let form = Self::multipart_body(json!({ "name": BACKUP_FILE_NAME }), bytes)?;
                let url = format!("{}/files/{}", self.upload_url, handle.id);
                (UploadKind::Replaced, self.client.patch(&url).multipart(form))
            }
            None => {
                info!("Creating remote backup");
                let form = Self::multipart_body(
                    json!({ "name": BACKUP_FILE_NAME, "parents": [APP_DATA_FOLDER] }),
                    bytes,
                )?;
                let url = format!("{}/files", self.upload_url);
                (UploadKind::Created, self.client.post(&url).multipart(form))
            }
        };

        let response = request
            .bearer_auth(token.expose())
            .query(&[("uploadType", "multipart")])
            .send()
            .await?;
        let response = check_status(response).await?;

        // Success is decided by status alone; the body only improves the report.
        let reported_id = response
            .json::<UploadResponse>()
            .await
            .ok()
            .and_then(|r| r.id);
        let file_id = reported_id.or_else(|| existing.as_ref().map(|h| h.id.clone()));

        let mut duplicates_removed = 0;
        for duplicate in &duplicates {
            warn!("Deleting duplicate remote backup {}", duplicate.id);
            match self.delete(token, &duplicate.id).await {
                Ok(()) => duplicates_removed += 1,
                Err(e) => warn!("Failed to delete duplicate {}: {}", duplicate.id, e),
            }
        }

        info!("Uploaded {} bytes ({:?})", bytes_sent, kind);
        Ok(UploadOutcome {
            kind,
            file_id,
            bytes_sent,
            duplicates_removed,
        })
    }

    async fn download_inner(&self, token: &AccessToken, dest: &Path) -> AppResult<Option<PathBuf>> {
        let handle = match self.find_handle(token).await? {
            Some(handle) => handle,
            None => {
                info!("No remote backup to download");
                return Ok(None);
            }
        };

        let url = format!("{}/files/{}", self.api_url, handle.id);
        debug!("Downloading remote backup {}", handle.id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token.expose())
            .query(&[("alt", "media")])
            .send()
            .await?;
        let response = check_status(response).await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        match Self::stream_to_file(response, dest).await {
            Ok(written) => {
                info!("Downloaded {} bytes", written);
                Ok(Some(dest.to_path_buf()))
            }
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(dest).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        warn!("Failed to remove partial download {:?}: {}", dest, cleanup);
                    }
                }
                Err(e)
            }
        }
    }

    async fn stream_to_file(response: Response, dest: &Path) -> AppResult<u64> {
        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(AppError::from)?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}

#[async_trait]
impl RemoteStore for DriveClient {
    async fn find_handle(&self, token: &AccessToken) -> AppResult<Option<RemoteBackupHandle>> {
        let result = self
            .find_handles(token)
            .await
            .map(|handles| handles.into_iter().next());
        log_failure("lookup", result)
    }

    async fn upload(&self, archive: &Path, token: &AccessToken) -> AppResult<UploadOutcome> {
        let span = info_span!("remote_upload", correlation_id = %Uuid::new_v4());
        let result = self.upload_inner(archive, token).instrument(span).await;
        log_failure("upload", result)
    }

    async fn download(&self, token: &AccessToken, dest: &Path) -> AppResult<Option<PathBuf>> {
        let span = info_span!("remote_download", correlation_id = %Uuid::new_v4());
        let result = self.download_inner(token, dest).instrument(span).await;
        log_failure("download", result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BackupError;
    use mockito::{Matcher, Server};
    use std::fs;
    use tempfile::TempDir;

    fn client_for(server: &Server) -> DriveClient {
        let mut config = Config::with_dirs("/docs", "/cache");
        config.drive_api_url = format!("{}/drive/v3", server.url());
        config.drive_upload_url = format!("{}/upload/drive/v3", server.url());
        DriveClient::new(&config).unwrap()
    }

    fn token() -> AccessToken {
        AccessToken::new("test-token")
    }

    #[tokio::test]
    async fn test_find_handle_filters_trashed() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/drive/v3/files")
            .match_header("authorization", "Bearer test-token")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("spaces".into(), "appDataFolder".into()),
                Matcher::UrlEncoded("q".into(), search_query()),
            ]))
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"files":[
                    {"id":"old","name":"rental_backup.zip","trashed":true},
                    {"id":"live","name":"rental_backup.zip","size":"42","modifiedTime":"2026-01-02T03:04:05Z"}
                ]}"#,
            )
            .create_async()
            .await;

        let handle = client_for(&server)
            .find_handle(&token())
            .await
            .unwrap()
            .expect("live handle");

        assert_eq!(handle.id, "live");
        assert_eq!(handle.size, Some(42));
        assert!(handle.modified_time.is_some());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_blank_token_makes_no_request() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let result = client_for(&server).find_handle(&AccessToken::new("")).await;

        assert!(matches!(
            result,
            Err(AppError::Backup(BackupError::NotSignedIn))
        ));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_creates_when_no_handle() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("rental_backup.zip");
        fs::write(&archive, b"archive-bytes").unwrap();

        let mut server = Server::new_async().await;
        server
            .mock("GET", "/drive/v3/files")
            .match_query(Matcher::Any)
            .with_body(r#"{"files":[]}"#)
            .create_async()
            .await;
        let create = server
            .mock("POST", "/upload/drive/v3/files")
            .match_query(Matcher::UrlEncoded("uploadType".into(), "multipart".into()))
            .match_header("authorization", "Bearer test-token")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#""parents":\["appDataFolder"\]"#.to_string()),
                Matcher::Regex("archive-bytes".to_string()),
            ]))
            .with_body(r#"{"id":"new-id"}"#)
            .create_async()
            .await;
        let replace = server
            .mock("PATCH", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let outcome = client_for(&server).upload(&archive, &token()).await.unwrap();

        assert_eq!(outcome.kind, UploadKind::Created);
        assert_eq!(outcome.file_id.as_deref(), Some("new-id"));
        assert_eq!(outcome.bytes_sent, 13);
        create.assert_async().await;
        replace.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_replaces_existing_handle() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("rental_backup.zip");
        fs::write(&archive, b"second").unwrap();

        let mut server = Server::new_async().await;
        server
            .mock("GET", "/drive/v3/files")
            .match_query(Matcher::Any)
            .with_body(r#"{"files":[{"id":"slot-1","name":"rental_backup.zip"}]}"#)
            .create_async()
            .await;
        let replace = server
            .mock("PATCH", "/upload/drive/v3/files/slot-1")
            .match_query(Matcher::UrlEncoded("uploadType".into(), "multipart".into()))
            .with_body("")
            .create_async()
            .await;
        let create = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let outcome = client_for(&server).upload(&archive, &token()).await.unwrap();

        assert_eq!(outcome.kind, UploadKind::Replaced);
        assert_eq!(outcome.file_id.as_deref(), Some("slot-1"));
        replace.assert_async().await;
        create.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_prunes_duplicates() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("rental_backup.zip");
        fs::write(&archive, b"bytes").unwrap();

        let mut server = Server::new_async().await;
        server
            .mock("GET", "/drive/v3/files")
            .match_query(Matcher::Any)
            .with_body(r#"{"files":[{"id":"keep"},{"id":"dup"}]}"#)
            .create_async()
            .await;
        server
            .mock("PATCH", "/upload/drive/v3/files/keep")
            .match_query(Matcher::Any)
            .with_body(r#"{"id":"keep"}"#)
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/drive/v3/files/dup")
            .with_status(204)
            .create_async()
            .await;

        let outcome = client_for(&server).upload(&archive, &token()).await.unwrap();

        assert_eq!(outcome.duplicates_removed, 1);
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_non_success_status_fails() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("rental_backup.zip");
        fs::write(&archive, b"bytes").unwrap();

        let mut server = Server::new_async().await;
        server
            .mock("GET", "/drive/v3/files")
            .match_query(Matcher::Any)
            .with_body(r#"{"files":[]}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/upload/drive/v3/files")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body("storageQuotaExceeded")
            .create_async()
            .await;

        let result = client_for(&server).upload(&archive, &token()).await;

        match result {
            Err(AppError::Remote(RemoteError::Status { status, body })) => {
                assert_eq!(status, 403);
                assert_eq!(body, "storageQuotaExceeded");
            }
            other => panic!("Expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_download_streams_to_file() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("cache/restore_download.zip");

        let mut server = Server::new_async().await;
        server
            .mock("GET", "/drive/v3/files")
            .match_query(Matcher::Any)
            .with_body(r#"{"files":[{"id":"slot-1"}]}"#)
            .create_async()
            .await;
        let media = server
            .mock("GET", "/drive/v3/files/slot-1")
            .match_query(Matcher::UrlEncoded("alt".into(), "media".into()))
            .with_body(vec![7u8; 10_000])
            .create_async()
            .await;

        let path = client_for(&server)
            .download(&token(), &dest)
            .await
            .unwrap()
            .expect("downloaded");

        assert_eq!(path, dest);
        assert_eq!(fs::read(&dest).unwrap(), vec![7u8; 10_000]);
        media.assert_async().await;
    }

    #[tokio::test]
    async fn test_download_write_failure_returns_write_error() {
        let temp_dir = TempDir::new().unwrap();
        // A directory in the way makes both the write and the cleanup fail.
        let dest = temp_dir.path().join("restore_download.zip");
        fs::create_dir_all(dest.join("occupied")).unwrap();

        let mut server = Server::new_async().await;
        server
            .mock("GET", "/drive/v3/files")
            .match_query(Matcher::Any)
            .with_body(r#"{"files":[{"id":"slot-1"}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/drive/v3/files/slot-1")
            .match_query(Matcher::UrlEncoded("alt".into(), "media".into()))
            .with_body(vec![7u8; 16])
            .create_async()
            .await;

        let result = client_for(&server).download(&token(), &dest).await;

        assert!(matches!(result, Err(AppError::Io(_))));
        assert!(dest.join("occupied").exists());
    }

    #[tokio::test]
    async fn test_download_without_handle_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("restore_download.zip");

        let mut server = Server::new_async().await;
        server
            .mock("GET", "/drive/v3/files")
            .match_query(Matcher::Any)
            .with_body(r#"{"files":[]}"#)
            .create_async()
            .await;

        let result = client_for(&server).download(&token(), &dest).await.unwrap();

        assert!(result.is_none());
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_unparseable_listing_is_invalid_response() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/drive/v3/files")
            .match_query(Matcher::Any)
            .with_body("<html>captive portal</html>")
            .create_async()
            .await;

        let result = client_for(&server).find_handle(&token()).await;

        assert!(matches!(
            result,
            Err(AppError::Remote(RemoteError::InvalidResponse(_)))
        ));
    }
}
