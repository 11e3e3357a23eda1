use crate::auth::{CredentialProvider, GoogleAuthorizer};
use crate::backup::archive::Archiver;
use crate::backup::clock::SystemClock;
use crate::backup::compression::calculate_sha256;
use crate::backup::manifest::{base_name, BackupManifest};
use crate::config::{self, AppConfig};
use crate::error::Result;
use crate::upload::{
    archive_in_container, create_drive, delete_item, ensure_container, find_item, DriveApi, UploadExecutor,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct BackupResult {
    pub archive_name: String,

    pub success: bool,

    pub file_size: Option<u64>,

    pub duration_secs: u64,

    pub error: Option<String>,
}

struct Transfer {
    completed: bool,
    file_size: u64,
}

/// One pass through [`BackupEngine::execute`]; the name is known once packed.
struct Attempt {
    archive_name: Option<String>,
    result: Result<Transfer>,
}

/// Packs the manifest and replaces today's backup in the remote folder.
///
/// Runs must not overlap: nothing guards the staging directory, the folder
/// lookup or the find-delete-upload sequence against a concurrent run.
pub struct BackupEngine {
    manifest: BackupManifest,
    archiver: Archiver,
    credentials: Arc<dyn CredentialProvider>,
    drive: Arc<dyn DriveApi>,
    folder_name: String,
}

impl BackupEngine {
    pub fn new(
        manifest: BackupManifest,
        archiver: Archiver,
        credentials: Arc<dyn CredentialProvider>,
        drive: Arc<dyn DriveApi>,
        folder_name: impl Into<String>,
    ) -> Self {
        Self {
            manifest,
            archiver,
            credentials,
            drive,
            folder_name: folder_name.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config::validate(config)?;
        let manifest = BackupManifest::from_config(&config.data)?;
        let archiver = Archiver::new(std::path::absolute(&config.work_dir)?, Arc::new(SystemClock));
        let credentials = Arc::new(GoogleAuthorizer::new(&config.auth)?);
        let drive = create_drive(&config.drive)?;

        Ok(Self::new(manifest, archiver, credentials, drive, config.drive.folder_name.clone()))
    }

    /// One full backup. `Ok(false)` means the run finished but the upload
    /// did not complete; errors from any step are propagated. The local
    /// archive is removed on every path once it has been created.
    pub async fn upload(&self) -> Result<bool> {
        self.execute().await.result.map(|t| t.completed)
    }

    async fn execute(&self) -> Attempt {
        let archive_path = match self.archiver.pack(&self.manifest) {
            Ok(path) => path,
            Err(e) => {
                return Attempt {
                    archive_name: None,
                    result: Err(e),
                }
            }
        };

        let result = self.transfer(&archive_path).await;

        match fs::remove_file(&archive_path) {
            Ok(()) => debug!("Removed local archive {}", archive_path.display()),
            Err(e) => warn!("Failed to remove local archive {}: {}", archive_path.display(), e),
        }
        Attempt {
            archive_name: base_name(&archive_path).ok(),
            result,
        }
    }

    async fn transfer(&self, archive_path: &Path) -> Result<Transfer> {
        let file_size = fs::metadata(archive_path)?.len();
        match calculate_sha256(archive_path) {
            Ok(hash) => info!("Archive {} bytes, sha256 {}", file_size, hash),
            Err(e) => warn!("Could not hash archive: {}", e),
        }

        info!("Authorizing with {}", self.credentials.name());
        let credential = self.credentials.authorize().await?;

        let drive = self.drive.as_ref();
        let container_id = ensure_container(drive, &credential, &self.folder_name).await?;
        info!("Using folder {} ({})", self.folder_name, container_id);

        let archive_name = base_name(archive_path)?;
        let stale = find_item(drive, &credential, archive_in_container(&archive_name, &container_id)).await?;
        if let Some(stale_id) = stale {
            info!("Replacing existing backup {} ({})", archive_name, stale_id);
            delete_item(drive, &credential, &stale_id).await?;
        }

        let outcome = UploadExecutor::new(drive)
            .upload(&credential, archive_path, &container_id)
            .await?;

        Ok(Transfer {
            completed: outcome.completed,
            file_size,
        })
    }

    /// Authorizes and resolves the remote folder without uploading anything.
    pub async fn test_connection(&self) -> Result<String> {
        let credential = self.credentials.authorize().await?;
        ensure_container(self.drive.as_ref(), &credential, &self.folder_name).await
    }

    /// [`upload`](Self::upload) folded into a report for interactive and
    /// scheduled callers.
    pub async fn run(&self) -> BackupResult {
        let start = Instant::now();
        let attempt = self.execute().await;
        let archive_name = attempt
            .archive_name
            .unwrap_or_else(|| self.archiver.archive_name());

        let (success, file_size, error) = match attempt.result {
            Ok(t) if t.completed => (true, Some(t.file_size), None),
            Ok(t) => (false, Some(t.file_size), Some("Upload did not complete".to_string())),
            Err(e) => (false, None, Some(e.to_string())),
        };

        let duration_secs = start.elapsed().as_secs();
        if success {
            info!("Backup {} completed in {} seconds", archive_name, duration_secs);
        } else {
            warn!(
                "Backup {} failed: {}",
                archive_name,
                error.as_deref().unwrap_or("unknown error")
            );
        }

        BackupResult {
            archive_name,
            success,
            file_size,
            duration_secs,
            error,
        }
    }
}
