use super::uploader::{DriveApi, RemoteItem};
use crate::auth::Credential;
use crate::error::Result;
use tracing::info;

/// Id of the first listed item matching `predicate`.
pub async fn find_item<P>(api: &dyn DriveApi, credential: &Credential, predicate: P) -> Result<Option<String>>
where
    P: Fn(&RemoteItem) -> bool + Send,
{
    let items = api.list_items(credential).await?;
    Ok(items.into_iter().find(|item| predicate(item)).map(|item| item.id))
}

/// Deleting an id that no longer exists is an error, not a no-op.
pub async fn delete_item(api: &dyn DriveApi, credential: &Credential, id: &str) -> Result<()> {
    api.delete_item(credential, id).await?;
    info!("Deleted remote item {}", id);
    Ok(())
}

/// Matches an archive called `name` directly inside `container_id`.
pub fn archive_in_container<'a>(name: &'a str, container_id: &'a str) -> impl Fn(&RemoteItem) -> bool + Send + 'a {
    move |item| item.is_archive() && item.name == name && item.is_in(container_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackupError;
    use crate::upload::memory::MemoryDrive;
    use crate::upload::uploader::{ARCHIVE_MIME_TYPE, FOLDER_MIME_TYPE};

    fn credential() -> Credential {
        Credential::new("token", None)
    }

    #[tokio::test]
    async fn test_find_returns_none_without_match() {
        let drive = MemoryDrive::new();
        let folder = drive.insert("NotesManager", FOLDER_MIME_TYPE, None);
        drive.insert("01-01-2024.zip", FOLDER_MIME_TYPE, Some(&folder));
        drive.insert("01-02-2024.zip", ARCHIVE_MIME_TYPE, Some(&folder));
        drive.insert("01-01-2024.zip", ARCHIVE_MIME_TYPE, Some("elsewhere"));

        let found = find_item(&drive, &credential(), archive_in_container("01-01-2024.zip", &folder))
            .await
            .unwrap();
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn test_find_then_delete() {
        let drive = MemoryDrive::new();
        let folder = drive.insert("NotesManager", FOLDER_MIME_TYPE, None);
        let target = drive.insert("01-01-2024.zip", ARCHIVE_MIME_TYPE, Some(&folder));

        let found = find_item(&drive, &credential(), archive_in_container("01-01-2024.zip", &folder))
            .await
            .unwrap();
        assert_eq!(found.as_deref(), Some(target.as_str()));

        delete_item(&drive, &credential(), &target).await.unwrap();
        let found = find_item(&drive, &credential(), archive_in_container("01-01-2024.zip", &folder))
            .await
            .unwrap();
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn test_delete_missing_id_is_error() {
        let drive = MemoryDrive::new();
        let err = delete_item(&drive, &credential(), "nope").await.unwrap_err();
        assert!(matches!(err, BackupError::RemoteApi(_)));
    }
}
