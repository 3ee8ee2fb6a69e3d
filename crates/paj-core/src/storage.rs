//! Filesystem side of a resource: its group directory

use crate::error::FetchError;
use paj_types::Resource;
use tokio::fs;
use tracing::info;

/// Create the resource's target directory (and parents) if missing
pub async fn create_context(resource: &Resource) -> Result<(), FetchError> {
    fs::create_dir_all(&resource.target_dir).await?;
    Ok(())
}

/// Delete the resource's whole group directory
///
/// Every file in the group goes with it, including files that belong to
/// other resources of the same group. A directory that is already gone is
/// not an error.
pub async fn delete_resource(resource: &Resource) -> Result<(), FetchError> {
    if !resource.target_dir.exists() {
        return Ok(());
    }

    info!(
        "Deleting group directory {} for {}",
        resource.target_dir.display(),
        resource.id
    );
    fs::remove_dir_all(&resource.target_dir).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::tempdir;

    fn resource_in(root: &Path, group: &str, id: &str) -> Resource {
        Resource {
            id: id.to_string(),
            group: group.to_string(),
            target_dir: root.join(group),
            source_url: format!("https://www.paj.gr.jp/english/statis/data/{}/{}.xlsx", group, id),
            file_name: format!("{}.xlsx", id),
        }
    }

    #[tokio::test]
    async fn test_create_context_makes_parents() {
        let dir = tempdir().unwrap();
        let resource = resource_in(&dir.path().join("nested"), "03", "2020-05-01_report");

        create_context(&resource).await.unwrap();
        assert!(resource.target_dir.is_dir());

        // Idempotent
        create_context(&resource).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_removes_sibling_files() {
        let dir = tempdir().unwrap();
        let resource = resource_in(dir.path(), "03", "2020-05-01_report");
        let other_group = resource_in(dir.path(), "04", "2020-05-01_other");

        create_context(&resource).await.unwrap();
        create_context(&other_group).await.unwrap();
        std::fs::write(resource.target_path(), b"mine").unwrap();
        std::fs::write(resource.target_dir.join("2020-04-01_sibling.xlsx"), b"sibling").unwrap();
        std::fs::write(other_group.target_path(), b"untouched").unwrap();

        delete_resource(&resource).await.unwrap();

        assert!(!resource.target_dir.exists());
        assert!(other_group.target_path().exists());
    }

    #[tokio::test]
    async fn test_delete_missing_directory_is_ok() {
        let dir = tempdir().unwrap();
        let resource = resource_in(dir.path(), "09", "2020-05-01_gone");
        delete_resource(&resource).await.unwrap();
    }
}
