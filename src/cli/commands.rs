use crate::auth::{CredentialProvider, GoogleAuthorizer};
use crate::backup::{run_scheduler, BackupEngine};
use crate::config::{self, AppConfig};
use crate::error::{BackupError, Result};
use crate::upload::{create_drive, ensure_container};
use std::path::Path;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tracing::{error, info};

pub const EXIT_OK: i32 = 0;
pub const EXIT_INCOMPLETE: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

fn load_engine(config_path: &Path) -> Result<BackupEngine> {
    let config = config::load_from(config_path)?;
    BackupEngine::from_config(&config)
}

/// One backup; the exit code separates "did not complete" from "crashed".
pub async fn run_once(config_path: &Path) -> i32 {
    let engine = match load_engine(config_path) {
        Ok(engine) => engine,
        Err(e) => {
            error!("{}", e);
            return EXIT_ERROR;
        }
    };

    match engine.upload().await {
        Ok(true) => {
            info!("Backup uploaded");
            EXIT_OK
        }
        Ok(false) => {
            error!("Backup upload did not complete");
            EXIT_INCOMPLETE
        }
        Err(e) => {
            error!("Backup failed: {}", e);
            EXIT_ERROR
        }
    }
}

pub async fn run_scheduled(config_path: &Path, shutdown: Arc<AtomicUsize>) -> i32 {
    let prepared = config::load_from(config_path).and_then(|config| {
        let schedule = config
            .schedule
            .clone()
            .ok_or_else(|| BackupError::Config("no schedule configured".to_string()))?;
        Ok((BackupEngine::from_config(&config)?, schedule))
    });

    match prepared {
        Ok((engine, schedule)) => {
            run_scheduler(Arc::new(engine), schedule, shutdown).await;
            EXIT_OK
        }
        Err(e) => {
            error!("{}", e);
            EXIT_ERROR
        }
    }
}

/// Signs in (storing the refresh token) and makes sure the folder exists.
/// Only the `[auth]` and `[drive]` sections are needed.
pub async fn authorize(config_path: &Path) -> i32 {
    let signed_in = match config::load_from(config_path) {
        Ok(config) => sign_in(&config).await,
        Err(e) => Err(e),
    };

    match signed_in {
        Ok(folder_id) => {
            info!("Authorized; backup folder id {}", folder_id);
            EXIT_OK
        }
        Err(e) => {
            error!("Authorization failed: {}", e);
            EXIT_ERROR
        }
    }
}

async fn sign_in(config: &AppConfig) -> Result<String> {
    let folder_name = config.drive.folder_name.trim();
    if folder_name.is_empty() {
        return Err(BackupError::Config("drive.folder_name must not be empty".to_string()));
    }

    let authorizer = GoogleAuthorizer::new(&config.auth)?;
    let drive = create_drive(&config.drive)?;
    let credential = authorizer.authorize().await?;
    ensure_container(drive.as_ref(), &credential, folder_name).await
}
