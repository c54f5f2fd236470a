// Filesystem-backed directory reader.

use crate::domain::errors::FsError;
use crate::domain::ports::{DirEntry, DirectoryReader};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Lists real directories with `tokio::fs`. There is no native picker in a
/// headless process, so picking falls back to the home directory.
#[derive(Debug, Default, Clone)]
pub struct TokioDirectoryReader;

#[async_trait]
impl DirectoryReader for TokioDirectoryReader {
    async fn list_directory(&self, path: &str) -> Result<Vec<DirEntry>, FsError> {
        let mut dir = tokio::fs::read_dir(path)
            .await
            .map_err(|e| map_io(path, e))?;

        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(|e| map_io(path, e))? {
            let is_directory = entry.file_type().await.ok().map(|t| t.is_dir());
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.path().to_string_lossy().into_owned(),
                is_directory,
            });
        }
        // read_dir order is platform-defined; sort so levels are stable.
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(path, count = entries.len(), "directory listed");
        Ok(entries)
    }

    async fn home_directory(&self) -> Result<String, FsError> {
        std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| FsError::NotFound("home directory".to_string()))
    }

    async fn pick_directory(&self) -> Result<String, FsError> {
        self.home_directory().await
    }
}

fn map_io(path: &str, e: std::io::Error) -> FsError {
    match e.kind() {
        ErrorKind::NotFound => FsError::NotFound(path.to_string()),
        _ => FsError::Unreadable {
            path: path.to_string(),
            reason: e.to_string(),
        },
    }
}

/// True when `path` names an existing directory.
pub async fn is_directory(path: impl AsRef<Path>) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn when_listing_a_directory_then_entries_are_sorted_and_typed() {
        let root = std::env::temp_dir().join(format!("universe-fs-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(root.join("src")).await.expect("mkdir");
        tokio::fs::write(root.join("Cargo.toml"), "").await.expect("write");
        let path = root.to_string_lossy().into_owned();

        let entries = TokioDirectoryReader.list_directory(&path).await.expect("list");
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Cargo.toml", "src"]);
        assert_eq!(entries[1].is_directory, Some(true));
        assert!(is_directory(&root).await);

        tokio::fs::remove_dir_all(&root).await.expect("cleanup");
    }

    #[tokio::test]
    async fn when_directory_is_missing_then_not_found_is_returned() {
        let missing = std::env::temp_dir().join(format!("universe-missing-{}", uuid::Uuid::new_v4()));
        let err = TokioDirectoryReader
            .list_directory(&missing.to_string_lossy())
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::NotFound(_)));
    }
}
