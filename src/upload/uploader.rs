use crate::auth::Credential;
use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
pub const ARCHIVE_MIME_TYPE: &str = "application/zip";

/// An item as returned by the unfiltered remote listing.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteItem {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub parents: Vec<String>,
}

impl RemoteItem {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    pub fn is_archive(&self) -> bool {
        self.mime_type == ARCHIVE_MIME_TYPE
    }

    pub fn is_in(&self, parent_id: &str) -> bool {
        self.parents.iter().any(|p| p == parent_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
    Interrupted,
}

impl TransferStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransferStatus::Pending)
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferStatus::Pending => write!(f, "pending"),
            TransferStatus::Completed => write!(f, "completed"),
            TransferStatus::Failed => write!(f, "failed"),
            TransferStatus::Cancelled => write!(f, "cancelled"),
            TransferStatus::Interrupted => write!(f, "interrupted"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadProgress {
    pub bytes_sent: u64,
    pub status: TransferStatus,
}

/// A started transfer of a local file into a remote folder.
#[derive(Debug, Clone)]
pub struct UploadSession {
    pub location: String,
    pub file_path: PathBuf,
    pub total_bytes: u64,
    pub bytes_sent: u64,
}

impl UploadSession {
    pub fn new(location: impl Into<String>, file_path: &Path, total_bytes: u64) -> Self {
        Self {
            location: location.into(),
            file_path: file_path.to_path_buf(),
            total_bytes,
            bytes_sent: 0,
        }
    }
}

/// Remote object-store surface the backup engine is written against.
#[async_trait]
pub trait DriveApi: Send + Sync {
    async fn list_items(&self, credential: &Credential) -> Result<Vec<RemoteItem>>;
    async fn create_folder(&self, credential: &Credential, name: &str) -> Result<String>;
    async fn begin_upload(
        &self,
        credential: &Credential,
        name: &str,
        parent_id: &str,
        file_path: &Path,
    ) -> Result<UploadSession>;
    /// Advances the transfer by one step and reports where it stands.
    async fn poll_upload(&self, credential: &Credential, session: &mut UploadSession) -> Result<UploadProgress>;
    async fn delete_item(&self, credential: &Credential, id: &str) -> Result<()>;
    fn name(&self) -> &'static str;
}
