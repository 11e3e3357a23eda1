use super::uploader::{
    DriveApi, RemoteItem, TransferStatus, UploadProgress, UploadSession, ARCHIVE_MIME_TYPE, FOLDER_MIME_TYPE,
};
use crate::auth::Credential;
use crate::config::DriveConfig;
use crate::error::{BackupError, Result};
use async_trait::async_trait;
use reqwest::header::{CONTENT_RANGE, LOCATION, RANGE};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info, warn};

const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType, parents)";

pub struct GoogleDrive {
    api_base: String,
    upload_base: String,
    chunk_size: usize,
    client: Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    mime_type: String,
    #[serde(default)]
    parents: Vec<String>,
}

impl From<DriveFile> for RemoteItem {
    fn from(file: DriveFile) -> Self {
        RemoteItem {
            id: file.id,
            name: file.name,
            mime_type: file.mime_type,
            parents: file.parents,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateFolder<'a> {
    name: &'a str,
    mime_type: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadMetadata<'a> {
    name: &'a str,
    mime_type: &'a str,
    parents: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct CreatedFile {
    id: String,
}

impl GoogleDrive {
    pub fn new(config: &DriveConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("notes-backup/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            upload_base: config.upload_base.trim_end_matches('/').to_string(),
            chunk_size: config.aligned_chunk_size(),
            client,
        })
    }
}

async fn ensure_success(response: Response, action: &str) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    Err(BackupError::RemoteApi(format!("Failed to {}: {} - {}", action, status, text)))
}

/// Maps a resumable-upload chunk response code to a transfer status.
/// `None` means the code is an error to surface rather than a transfer state.
fn classify(code: u16) -> Option<TransferStatus> {
    match code {
        200 | 201 => Some(TransferStatus::Completed),
        308 => Some(TransferStatus::Pending),
        404 | 410 => Some(TransferStatus::Failed),
        499 => Some(TransferStatus::Cancelled),
        500..=599 => Some(TransferStatus::Interrupted),
        _ => None,
    }
}

fn content_range(start: u64, len: u64, total: u64) -> String {
    if len == 0 {
        format!("bytes */{}", total)
    } else {
        format!("bytes {}-{}/{}", start, start + len - 1, total)
    }
}

/// Bytes the server holds, from a `Range: bytes=0-N` header.
fn acknowledged_bytes(range: &str) -> Option<u64> {
    let end = range.trim().strip_prefix("bytes=")?.split('-').nth(1)?;
    end.trim().parse::<u64>().ok().map(|n| n + 1)
}

#[async_trait]
impl DriveApi for GoogleDrive {
    async fn list_items(&self, credential: &Credential) -> Result<Vec<RemoteItem>> {
        let url = format!("{}/files", self.api_base);
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(&url)
                .bearer_auth(credential.bearer())
                .query(&[
                    ("q", "trashed = false"),
                    ("fields", LIST_FIELDS),
                    ("pageSize", "1000"),
                    ("spaces", "drive"),
                ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = ensure_success(request.send().await?, "list files").await?;
            let page: FileList = response.json().await?;
            items.extend(page.files.into_iter().map(RemoteItem::from));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("Listed {} remote items", items.len());
        Ok(items)
    }

    async fn create_folder(&self, credential: &Credential, name: &str) -> Result<String> {
        let url = format!("{}/files", self.api_base);
        let body = CreateFolder {
            name,
            mime_type: FOLDER_MIME_TYPE,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(credential.bearer())
            .query(&[("fields", "id")])
            .json(&body)
            .send()
            .await?;
        let created: CreatedFile = ensure_success(response, "create folder").await?.json().await?;

        info!("Created folder: {} ({})", name, created.id);
        Ok(created.id)
    }

    async fn begin_upload(
        &self,
        credential: &Credential,
        name: &str,
        parent_id: &str,
        file_path: &Path,
    ) -> Result<UploadSession> {
        let total_bytes = tokio::fs::metadata(file_path).await?.len();
        let url = format!("{}/files", self.upload_base);
        let body = UploadMetadata {
            name,
            mime_type: ARCHIVE_MIME_TYPE,
            parents: [parent_id],
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(credential.bearer())
            .query(&[("uploadType", "resumable"), ("fields", "id")])
            .header("X-Upload-Content-Type", ARCHIVE_MIME_TYPE)
            .header("X-Upload-Content-Length", total_bytes)
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response, "start upload session").await?;

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| BackupError::RemoteApi("Upload session has no Location header".to_string()))?;

        debug!("Opened upload session for {} ({} bytes)", name, total_bytes);
        Ok(UploadSession::new(location, file_path, total_bytes))
    }

    async fn poll_upload(&self, credential: &Credential, session: &mut UploadSession) -> Result<UploadProgress> {
        let start = session.bytes_sent;
        let len = (session.total_bytes - start).min(self.chunk_size as u64);

        let mut file = File::open(&session.file_path).await?;
        file.seek(SeekFrom::Start(start)).await?;
        let mut chunk = vec![0u8; len as usize];
        file.read_exact(&mut chunk).await?;

        let response = self
            .client
            .put(&session.location)
            .bearer_auth(credential.bearer())
            .header(CONTENT_RANGE, content_range(start, len, session.total_bytes))
            .body(chunk)
            .send()
            .await?;

        let code = response.status().as_u16();
        let status = match classify(code) {
            Some(status) => status,
            None => {
                ensure_success(response, "upload chunk").await?;
                return Err(BackupError::RemoteApi(format!("Unexpected upload response: {}", code)));
            }
        };

        match status {
            TransferStatus::Pending => {
                session.bytes_sent = response
                    .headers()
                    .get(RANGE)
                    .and_then(|v| v.to_str().ok())
                    .and_then(acknowledged_bytes)
                    .unwrap_or(0);
            }
            TransferStatus::Completed => session.bytes_sent = session.total_bytes,
            other => warn!("Upload session ended as {} (HTTP {})", other, code),
        }

        Ok(UploadProgress {
            bytes_sent: session.bytes_sent,
            status,
        })
    }

    async fn delete_item(&self, credential: &Credential, id: &str) -> Result<()> {
        let url = format!("{}/files/{}", self.api_base, id);
        let response = self
            .client
            .delete(&url)
            .bearer_auth(credential.bearer())
            .send()
            .await?;
        ensure_success(response, "delete item").await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Google Drive"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::UploadExecutor;
    use tempfile::tempdir;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credential() -> Credential {
        Credential::new("token", None)
    }

    fn drive_for(server: &MockServer) -> GoogleDrive {
        GoogleDrive::new(&DriveConfig {
            api_base: format!("{}/drive/v3", server.uri()),
            upload_base: format!("{}/upload/drive/v3", server.uri()),
            chunk_size: 256 * 1024,
            ..DriveConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_list_items_follows_page_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .and(query_param("q", "trashed = false"))
            .and(query_param_is_missing("pageToken"))
            .and(header("Authorization", "Bearer token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "nextPageToken": "page-2",
                "files": [{"id": "1", "name": "NotesManager", "mimeType": FOLDER_MIME_TYPE}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .and(query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "files": [{"id": "2", "name": "01-31-2024.zip", "mimeType": ARCHIVE_MIME_TYPE, "parents": ["1"]}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let items = drive_for(&server).list_items(&credential()).await.unwrap();

        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert!(items[1].is_archive() && items[1].is_in("1"));
    }

    #[tokio::test]
    async fn test_create_folder_returns_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/drive/v3/files"))
            .and(body_string_contains(FOLDER_MIME_TYPE))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "folder-9"})))
            .expect(1)
            .mount(&server)
            .await;

        let id = drive_for(&server).create_folder(&credential(), "NotesManager").await.unwrap();
        assert_eq!(id, "folder-9");
    }

    #[tokio::test]
    async fn test_resumable_upload_in_chunks() {
        let server = MockServer::start().await;
        let session_url = format!("{}/session/abc", server.uri());
        Mock::given(method("POST"))
            .and(path("/upload/drive/v3/files"))
            .and(query_param("uploadType", "resumable"))
            .and(header("X-Upload-Content-Length", "300000"))
            .and(body_string_contains("01-31-2024.zip"))
            .and(body_string_contains("folder-1"))
            .respond_with(ResponseTemplate::new(200).insert_header("Location", session_url.as_str()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/session/abc"))
            .and(header("Content-Range", "bytes 0-262143/300000"))
            .respond_with(ResponseTemplate::new(308).insert_header("Range", "bytes=0-262143"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/session/abc"))
            .and(header("Content-Range", "bytes 262144-299999/300000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "file-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let archive = dir.path().join("01-31-2024.zip");
        std::fs::write(&archive, vec![1u8; 300_000]).unwrap();

        let drive = drive_for(&server);
        let outcome = UploadExecutor::new(&drive)
            .upload(&credential(), &archive, "folder-1")
            .await
            .unwrap();

        assert!(outcome.completed);
        assert_eq!(outcome.bytes_sent, 300_000);
    }

    #[tokio::test]
    async fn test_chunk_status_codes() {
        let server = MockServer::start().await;
        for (route, code) in [("/session/gone", 410), ("/session/busy", 503), ("/session/denied", 403)] {
            Mock::given(method("PUT"))
                .and(path(route))
                .respond_with(ResponseTemplate::new(code))
                .mount(&server)
                .await;
        }

        let dir = tempdir().unwrap();
        let archive = dir.path().join("01-31-2024.zip");
        std::fs::write(&archive, vec![1u8; 1000]).unwrap();
        let drive = drive_for(&server);
        let session = |route: &str| UploadSession::new(format!("{}{}", server.uri(), route), &archive, 1000);

        let progress = drive.poll_upload(&credential(), &mut session("/session/gone")).await.unwrap();
        assert_eq!(progress.status, TransferStatus::Failed);

        let progress = drive.poll_upload(&credential(), &mut session("/session/busy")).await.unwrap();
        assert_eq!(progress.status, TransferStatus::Interrupted);
        assert_eq!(progress.bytes_sent, 0);

        let err = drive.poll_upload(&credential(), &mut session("/session/denied")).await.unwrap_err();
        assert!(matches!(err, BackupError::RemoteApi(_)));
    }

    #[tokio::test]
    async fn test_delete_missing_item_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/drive/v3/files/present"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/drive/v3/files/absent"))
            .respond_with(ResponseTemplate::new(404).set_body_string("File not found: absent"))
            .mount(&server)
            .await;

        let drive = drive_for(&server);
        drive.delete_item(&credential(), "present").await.unwrap();
        let err = drive.delete_item(&credential(), "absent").await.unwrap_err();
        assert!(matches!(err, BackupError::RemoteApi(_)));
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn test_classify_chunk_responses() {
        assert_eq!(classify(200), Some(TransferStatus::Completed));
        assert_eq!(classify(201), Some(TransferStatus::Completed));
        assert_eq!(classify(308), Some(TransferStatus::Pending));
        assert_eq!(classify(410), Some(TransferStatus::Failed));
        assert_eq!(classify(499), Some(TransferStatus::Cancelled));
        assert_eq!(classify(503), Some(TransferStatus::Interrupted));
        assert_eq!(classify(403), None);
        assert_eq!(classify(401), None);
    }

    #[test]
    fn test_content_range() {
        assert_eq!(content_range(0, 262144, 1000000), "bytes 0-262143/1000000");
        assert_eq!(content_range(262144, 10, 262154), "bytes 262144-262153/262154");
        assert_eq!(content_range(0, 0, 0), "bytes */0");
    }

    #[test]
    fn test_acknowledged_bytes() {
        assert_eq!(acknowledged_bytes("bytes=0-524287"), Some(524288));
        assert_eq!(acknowledged_bytes("garbage"), None);
    }

    #[test]
    fn test_file_list_deserialization() {
        let json = r#"{
            "nextPageToken": "abc",
            "files": [
                {"id": "1", "name": "NotesManager", "mimeType": "application/vnd.google-apps.folder"},
                {"id": "2", "name": "01-01-2024.zip", "mimeType": "application/zip", "parents": ["1"]}
            ]
        }"#;
        let list: FileList = serde_json::from_str(json).unwrap();
        assert_eq!(list.next_page_token.as_deref(), Some("abc"));

        let items: Vec<RemoteItem> = list.files.into_iter().map(RemoteItem::from).collect();
        assert!(items[0].is_folder());
        assert!(items[0].parents.is_empty());
        assert!(items[1].is_archive() && items[1].is_in("1"));
    }

    #[test]
    fn test_new_aligns_chunk_size() {
        let drive = GoogleDrive::new(&DriveConfig {
            chunk_size: 300 * 1024,
            api_base: "https://example.test/drive/v3/".to_string(),
            ..DriveConfig::default()
        })
        .unwrap();
        assert_eq!(drive.chunk_size, 256 * 1024);
        assert_eq!(drive.api_base, "https://example.test/drive/v3");
    }
}
