mod container;
mod executor;
mod google_drive;
mod locator;
#[cfg(test)]
pub mod memory;
mod uploader;

pub use container::ensure_container;
pub use executor::UploadExecutor;
pub use google_drive::GoogleDrive;
pub use locator::{archive_in_container, delete_item, find_item};
pub use uploader::{DriveApi, RemoteItem, TransferStatus, ARCHIVE_MIME_TYPE, FOLDER_MIME_TYPE};

use crate::config::DriveConfig;
use crate::error::Result;
use std::sync::Arc;

pub fn create_drive(config: &DriveConfig) -> Result<Arc<dyn DriveApi>> {
    Ok(Arc::new(GoogleDrive::new(config)?))
}
