//! Stable local copies of completed transfers

use std::path::{Path, PathBuf};

use adhoc_core::{ResourceName, Result};
use tracing::debug;

/// Moves finished transfers out of transport-owned storage
///
/// Without a resource directory the location reported by the transport is
/// kept as is.
#[derive(Debug, Clone, Default)]
pub struct ResourceStore {
    resource_dir: Option<PathBuf>,
}

impl ResourceStore {
    pub fn new(resource_dir: Option<PathBuf>) -> Self {
        Self { resource_dir }
    }

    pub fn resource_dir(&self) -> Option<&Path> {
        self.resource_dir.as_deref()
    }

    /// Where a resource with this name is stored
    pub fn target_path(&self, resource_name: &ResourceName) -> Option<PathBuf> {
        self.resource_dir
            .as_ref()
            .map(|dir| dir.join(file_safe_name(resource_name)))
    }

    /// Copy `source` into the resource directory and return the stable path
    ///
    /// Different resource names can map to the same file name; an existing
    /// file is never replaced, the copy gets a unique suffix instead.
    pub async fn persist(&self, resource_name: &ResourceName, source: &Path) -> Result<PathBuf> {
        let Some(target) = self.target_path(resource_name) else {
            return Ok(source.to_path_buf());
        };
        if target == source {
            return Ok(target);
        }

        if let Some(dir) = &self.resource_dir {
            tokio::fs::create_dir_all(dir).await?;
        }
        let target = unused_path(target).await?;
        let bytes = tokio::fs::copy(source, &target).await?;
        debug!(
            "Stored resource {} ({} bytes) at {}",
            resource_name,
            bytes,
            target.display()
        );
        Ok(target)
    }
}

async fn unused_path(target: PathBuf) -> Result<PathBuf> {
    if !tokio::fs::try_exists(&target).await? {
        return Ok(target);
    }

    let stem = target
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "resource".to_string());
    let extension = target
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    loop {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let candidate = target.with_file_name(format!("{}-{}{}", stem, &suffix[..8], extension));
        if !tokio::fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }
    }
}

/// Resource names come from remote peers; keep them inside the directory
fn file_safe_name(resource_name: &ResourceName) -> String {
    let name: String = resource_name
        .as_str()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = name.trim_start_matches('.');
    if trimmed.is_empty() {
        "resource".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_safe_name_strips_separators() {
        assert_eq!(file_safe_name(&ResourceName::from("../../etc/passwd")), "_.._etc_passwd");
        assert_eq!(file_safe_name(&ResourceName::from("..")), "resource");
        assert_eq!(file_safe_name(&ResourceName::from("Bob-1-a.png")), "Bob-1-a.png");
    }

    #[tokio::test]
    async fn test_persist_without_dir_keeps_source() {
        let store = ResourceStore::default();
        let source = Path::new("/tmp/transport/abc");
        let location = store
            .persist(&ResourceName::from("abc"), source)
            .await
            .unwrap();
        assert_eq!(location, source);
    }

    #[tokio::test]
    async fn test_persist_copies_into_dir() {
        let incoming = tempfile::tempdir().unwrap();
        let stored = tempfile::tempdir().unwrap();
        let source = incoming.path().join("partial");
        tokio::fs::write(&source, b"payload").await.unwrap();

        let store = ResourceStore::new(Some(stored.path().join("resources")));
        let location = store
            .persist(&ResourceName::from("Bob-1-photo.jpg"), &source)
            .await
            .unwrap();

        assert_eq!(location, stored.path().join("resources").join("Bob-1-photo.jpg"));
        assert_eq!(tokio::fs::read(&location).await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_colliding_names_keep_both_copies() {
        let incoming = tempfile::tempdir().unwrap();
        let stored = tempfile::tempdir().unwrap();
        let first = incoming.path().join("first");
        let second = incoming.path().join("second");
        tokio::fs::write(&first, b"first").await.unwrap();
        tokio::fs::write(&second, b"second").await.unwrap();

        let store = ResourceStore::new(Some(stored.path().to_path_buf()));
        let a = store
            .persist(&ResourceName::from("a/b.txt"), &first)
            .await
            .unwrap();
        let b = store
            .persist(&ResourceName::from("a_b.txt"), &second)
            .await
            .unwrap();

        assert_eq!(a, stored.path().join("a_b.txt"));
        assert_ne!(a, b);
        assert_eq!(b.parent(), Some(stored.path()));
        assert!(b.to_string_lossy().ends_with(".txt"));
        assert_eq!(tokio::fs::read(&a).await.unwrap(), b"first");
        assert_eq!(tokio::fs::read(&b).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_persist_missing_source_is_io_error() {
        let stored = tempfile::tempdir().unwrap();
        let store = ResourceStore::new(Some(stored.path().to_path_buf()));
        let result = store
            .persist(&ResourceName::from("gone"), Path::new("/nonexistent/gone"))
            .await;
        assert!(matches!(result, Err(adhoc_core::AdhocError::Io(_))));
    }
}
