//! Local asset store
//!
//! Files under the asset root override whatever the upstream would return for
//! the same relative path. The relay only ever reads from this directory.

use crate::error::RelayError;
use crate::mime::content_type_for;
use hyper::body::Bytes;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// A file found in the local asset store
#[derive(Debug, Clone)]
pub struct LocalAsset {
    pub content_type: String,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct LocalAssetStore {
    root: PathBuf,
}

impl LocalAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if it does not exist yet
    pub fn ensure_root(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }

    /// Map a request-relative path onto the root.
    ///
    /// Returns `None` for anything that could escape the root: parent
    /// components, absolute paths and drive prefixes.
    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let relative = Path::new(relative);
        let mut resolved = self.root.clone();
        let mut depth = 0usize;

        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }

        (depth > 0).then_some(resolved)
    }

    /// Read a file if it exists. Absence (including directories and unsafe
    /// paths) is `Ok(None)`, so callers can fall back to upstream.
    pub async fn lookup(&self, relative: &str) -> Result<Option<LocalAsset>, RelayError> {
        let Some(path) = self.resolve(relative) else {
            debug!(relative, "Rejected local asset path");
            return Ok(None);
        };

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let body = tokio::fs::read(&path).await?;
        debug!(path = %path.display(), bytes = body.len(), "Serving local file");

        Ok(Some(LocalAsset {
            content_type: content_type_for(&path),
            body: Bytes::from(body),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_with(files: &[(&str, &str)]) -> (TempDir, LocalAssetStore) {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, content).unwrap();
        }
        let store = LocalAssetStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let store = LocalAssetStore::new("static");

        assert!(store.resolve("../secret.txt").is_none());
        assert!(store.resolve("icons/../../secret.txt").is_none());
        assert!(store.resolve("/etc/passwd").is_none());
        assert!(store.resolve("").is_none());
        assert_eq!(
            store.resolve("./icons/a.svg").unwrap(),
            PathBuf::from("static/icons/a.svg")
        );
    }

    #[tokio::test]
    async fn test_lookup_existing_file() {
        let (_dir, store) = store_with(&[("icons/badge.svg", "<svg/>")]);

        let asset = store.lookup("icons/badge.svg").await.unwrap().unwrap();
        assert_eq!(asset.content_type, "image/svg+xml");
        assert_eq!(asset.body, Bytes::from_static(b"<svg/>"));
    }

    #[tokio::test]
    async fn test_lookup_missing_and_directory() {
        let (_dir, store) = store_with(&[("icons/badge.svg", "<svg/>")]);

        assert!(store.lookup("missing.png").await.unwrap().is_none());
        assert!(store.lookup("icons").await.unwrap().is_none());
    }

    #[test]
    fn test_ensure_root_creates_directory() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("nested").join("static");
        let store = LocalAssetStore::new(&root);

        store.ensure_root().unwrap();
        assert!(root.is_dir());

        // Second call is a no-op
        store.ensure_root().unwrap();
    }
}
