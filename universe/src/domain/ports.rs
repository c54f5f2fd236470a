use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::domain::errors::{FsError, HostError};
use crate::domain::window::WindowRect;

/// One directory listing entry as reported by the reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub path: String,
    /// What the reader knows about the entry, if anything. The city layout
    /// classifies by name and only logs when this disagrees.
    pub is_directory: Option<bool>,
}

/// Parameters for opening another universe window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSpec {
    pub label: String,
    pub url: String,
    pub title: String,
    pub rect: WindowRect,
}

// Port for the native windowing shell hosting each universe.
#[async_trait]
pub trait HostShell: Send + Sync {
    async fn outer_bounds(&self) -> Result<WindowRect, HostError>;
    /// Resolves to whether exclusive pointer capture was granted.
    async fn request_pointer_capture(&self) -> Result<bool, HostError>;
    async fn release_pointer_capture(&self) -> Result<(), HostError>;
    async fn open_path(&self, path: &str) -> Result<(), HostError>;
    async fn create_window(&self, spec: WindowSpec) -> Result<(), HostError>;
}

// Port for the filesystem collaborator used to build city levels.
#[async_trait]
pub trait DirectoryReader: Send + Sync {
    async fn list_directory(&self, path: &str) -> Result<Vec<DirEntry>, FsError>;
    async fn home_directory(&self) -> Result<String, FsError>;
    /// Native directory picker; `Err(FsError::Cancelled)` when dismissed.
    async fn pick_directory(&self) -> Result<String, FsError>;

    /// Parent path; returns `path` itself at a filesystem root.
    fn parent_of(&self, path: &str) -> String {
        parent_path(path)
    }
}

/// Lexical parent of `path`, or `path` itself when it has none.
pub fn parent_path(path: &str) -> String {
    Path::new(path)
        .parent()
        .map(PathBuf::from)
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

// Port for retrieving the current time.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoDisk;

    #[async_trait]
    impl DirectoryReader for NoDisk {
        async fn list_directory(&self, path: &str) -> Result<Vec<DirEntry>, FsError> {
            Err(FsError::NotFound(path.to_string()))
        }

        async fn home_directory(&self) -> Result<String, FsError> {
            Ok("/home".to_string())
        }

        async fn pick_directory(&self) -> Result<String, FsError> {
            Err(FsError::Cancelled)
        }
    }

    #[test]
    fn parent_of_root_is_root() {
        assert_eq!(NoDisk.parent_of("/"), "/");
        assert_eq!(NoDisk.parent_of("/home/user"), "/home");
        assert_eq!(NoDisk.parent_of("relative"), "relative");
    }
}
