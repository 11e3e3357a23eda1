use super::uploader::{DriveApi, TransferStatus};
use crate::auth::Credential;
use crate::error::{BackupError, Result};
use std::path::Path;
use tracing::{debug, info, warn};

/// Consecutive `Pending` polls without progress before giving up.
const MAX_STALLED_POLLS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadOutcome {
    pub bytes_sent: u64,
    pub completed: bool,
    pub status: TransferStatus,
}

impl UploadOutcome {
    fn ended(bytes_sent: u64, status: TransferStatus) -> Self {
        Self {
            bytes_sent,
            completed: status == TransferStatus::Completed,
            status,
        }
    }
}

pub struct UploadExecutor<'a> {
    api: &'a dyn DriveApi,
}

impl<'a> UploadExecutor<'a> {
    pub fn new(api: &'a dyn DriveApi) -> Self {
        Self { api }
    }

    /// Streams `local_path` into `container_id` under its own file name.
    ///
    /// A connection failure after the server acknowledged some bytes ends
    /// the transfer as `Interrupted`, reported through
    /// [`UploadOutcome::completed`] like any other terminal status. Local I/O
    /// errors, rejected requests and earlier connection failures are raised.
    pub async fn upload(&self, credential: &Credential, local_path: &Path, container_id: &str) -> Result<UploadOutcome> {
        let name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| BackupError::missing("Archive file name", local_path))?;

        let mut session = self.api.begin_upload(credential, &name, container_id, local_path).await?;
        info!("Uploading {} ({} bytes) to {}", name, session.total_bytes, self.api.name());

        let mut stalled = 0u32;
        loop {
            let before = session.bytes_sent;
            let progress = match self.api.poll_upload(credential, &mut session).await {
                Ok(progress) => progress,
                Err(BackupError::Transport(reason)) if session.bytes_sent > 0 => {
                    warn!("Upload of {} interrupted after {} bytes: {}", name, session.bytes_sent, reason);
                    return Ok(UploadOutcome::ended(session.bytes_sent, TransferStatus::Interrupted));
                }
                Err(e) => return Err(e),
            };

            if progress.status.is_terminal() {
                let outcome = UploadOutcome::ended(progress.bytes_sent, progress.status);
                if outcome.completed {
                    info!("Upload of {} completed ({} bytes)", name, outcome.bytes_sent);
                } else {
                    warn!("Upload of {} ended as {}", name, outcome.status);
                }
                return Ok(outcome);
            }

            debug!("Uploaded {}/{} bytes", progress.bytes_sent, session.total_bytes);
            if progress.bytes_sent > before {
                stalled = 0;
            } else {
                stalled += 1;
                if stalled >= MAX_STALLED_POLLS {
                    warn!("Upload of {} made no progress after {} polls", name, stalled);
                    return Ok(UploadOutcome::ended(progress.bytes_sent, TransferStatus::Interrupted));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::memory::{MemoryDrive, TransferScript};
    use crate::upload::uploader::FOLDER_MIME_TYPE;
    use std::fs;
    use tempfile::tempdir;

    fn credential() -> Credential {
        Credential::new("token", None)
    }

    fn archive(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("01-31-2024.zip");
        fs::write(&path, vec![7u8; 100]).unwrap();
        path
    }

    #[tokio::test]
    async fn test_completed_transfer() {
        let dir = tempdir().unwrap();
        let drive = MemoryDrive::new().with_chunk_size(30);
        let folder = drive.insert("NotesManager", FOLDER_MIME_TYPE, None);

        let outcome = UploadExecutor::new(&drive)
            .upload(&credential(), &archive(dir.path()), &folder)
            .await
            .unwrap();

        assert!(outcome.completed);
        assert_eq!(outcome.bytes_sent, 100);
        let stored = drive.items();
        assert!(stored.iter().any(|i| i.name == "01-31-2024.zip" && i.is_in(&folder)));
    }

    #[tokio::test]
    async fn test_failed_and_cancelled_are_reported_not_raised() {
        let dir = tempdir().unwrap();
        let path = archive(dir.path());

        for status in [TransferStatus::Failed, TransferStatus::Cancelled] {
            let drive = MemoryDrive::new()
                .with_chunk_size(30)
                .with_script(TransferScript::EndAfterChunks(2, status));
            let folder = drive.insert("NotesManager", FOLDER_MIME_TYPE, None);

            let outcome = UploadExecutor::new(&drive).upload(&credential(), &path, &folder).await.unwrap();

            assert!(!outcome.completed);
            assert_eq!(outcome.status, status);
            assert!(!drive.items().iter().any(|i| i.name == "01-31-2024.zip"));
        }
    }

    #[tokio::test]
    async fn test_transport_error_before_any_bytes_is_raised() {
        let dir = tempdir().unwrap();
        let drive = MemoryDrive::new().with_script(TransferScript::ErrorAfterChunks(0));
        let folder = drive.insert("NotesManager", FOLDER_MIME_TYPE, None);

        let err = UploadExecutor::new(&drive)
            .upload(&credential(), &archive(dir.path()), &folder)
            .await
            .unwrap_err();
        assert!(matches!(err, BackupError::Transport(_)));
    }

    #[tokio::test]
    async fn test_transport_error_after_bytes_is_interrupted() {
        let dir = tempdir().unwrap();
        let drive = MemoryDrive::new()
            .with_chunk_size(30)
            .with_script(TransferScript::ErrorAfterChunks(1));
        let folder = drive.insert("NotesManager", FOLDER_MIME_TYPE, None);

        let outcome = UploadExecutor::new(&drive)
            .upload(&credential(), &archive(dir.path()), &folder)
            .await
            .unwrap();
        assert!(!outcome.completed);
        assert_eq!(outcome.status, TransferStatus::Interrupted);
        assert_eq!(outcome.bytes_sent, 30);
    }

    #[tokio::test]
    async fn test_local_and_permission_errors_after_bytes_are_raised() {
        let dir = tempdir().unwrap();
        let path = archive(dir.path());

        let drive = MemoryDrive::new()
            .with_chunk_size(30)
            .with_script(TransferScript::LocalReadErrorAfterChunks(1));
        let folder = drive.insert("NotesManager", FOLDER_MIME_TYPE, None);
        let err = UploadExecutor::new(&drive).upload(&credential(), &path, &folder).await.unwrap_err();
        match err {
            BackupError::Io(io_err) => assert_eq!(io_err.kind(), std::io::ErrorKind::PermissionDenied),
            other => panic!("unexpected error: {:?}", other),
        }

        let drive = MemoryDrive::new()
            .with_chunk_size(30)
            .with_script(TransferScript::RejectAfterChunks(1));
        let folder = drive.insert("NotesManager", FOLDER_MIME_TYPE, None);
        let err = UploadExecutor::new(&drive).upload(&credential(), &path, &folder).await.unwrap_err();
        assert!(matches!(err, BackupError::RemoteApi(_)));
    }

    #[tokio::test]
    async fn test_stalled_transfer_ends() {
        let dir = tempdir().unwrap();
        let drive = MemoryDrive::new().with_chunk_size(30).with_script(TransferScript::Stall);
        let folder = drive.insert("NotesManager", FOLDER_MIME_TYPE, None);

        let outcome = UploadExecutor::new(&drive)
            .upload(&credential(), &archive(dir.path()), &folder)
            .await
            .unwrap();
        assert_eq!(outcome.status, TransferStatus::Interrupted);
        assert!(!outcome.completed);
    }
}
