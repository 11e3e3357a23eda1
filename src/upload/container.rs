use super::uploader::DriveApi;
use crate::auth::Credential;
use crate::error::Result;
use tracing::{debug, info};

/// Returns the id of the first folder named `name`, creating one if none
/// exists. Existing duplicates are left alone.
pub async fn ensure_container(api: &dyn DriveApi, credential: &Credential, name: &str) -> Result<String> {
    let items = api.list_items(credential).await?;

    if let Some(folder) = items.iter().find(|item| item.is_folder() && item.name == name) {
        debug!("Found existing folder: {} ({})", folder.name, folder.id);
        return Ok(folder.id.clone());
    }

    info!("Creating folder: {}", name);
    api.create_folder(credential, name).await
}
