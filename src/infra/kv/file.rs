//! Filesystem-backed key-value store: one file per key.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use tokio::fs;
use uuid::Uuid;

use crate::application::store::{KvStore, StoreError};

/// Longest key encoded directly as hex; longer keys are hashed so the file
/// name stays under common 255-byte limits.
const MAX_DIRECT_KEY_BYTES: usize = 100;

#[derive(Debug)]
pub struct FileKvStore {
    root: PathBuf,
}

impl FileKvStore {
    /// Initialise the store rooted at `root`, creating the directory if needed.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        Ok(self.root.join(file_name_for(key)?))
    }
}

#[async_trait]
impl KvStore for FileKvStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::Io(err)),
        }
    }

    /// Writes to a sibling temp file and renames it over the target, so
    /// readers never observe a half-written value.
    async fn put(&self, key: &str, value: Bytes) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let temp = self
            .root
            .join(format!(".{}.tmp", Uuid::new_v4().simple()));

        if let Err(err) = fs::write(&temp, &value).await {
            let _ = fs::remove_file(&temp).await;
            return Err(StoreError::Io(err));
        }
        if let Err(err) = fs::rename(&temp, &path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(StoreError::Io(err));
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::Io(err)),
        }
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        let metadata = fs::metadata(&self.root).await?;
        if metadata.is_dir() {
            Ok(())
        } else {
            Err(StoreError::from_backend(format!(
                "{} is not a directory",
                self.root.display()
            )))
        }
    }
}

fn file_name_for(key: &str) -> Result<String, StoreError> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey {
            reason: "key must not be empty",
        });
    }

    if key.len() <= MAX_DIRECT_KEY_BYTES {
        Ok(format!("k-{}", hex::encode(key.as_bytes())))
    } else {
        let digest = Sha256::digest(key.as_bytes());
        Ok(format!("h-{}", hex::encode(digest)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, FileKvStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileKvStore::new(dir.path().join("kv")).expect("store");
        (dir, store)
    }

    #[test]
    fn file_names_are_path_safe() {
        let name = file_name_for("../etc/passwd").expect("name");
        assert!(name.starts_with("k-"));
        assert!(name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));

        let long = "x".repeat(500);
        let hashed = file_name_for(&long).expect("name");
        assert!(hashed.starts_with("h-"));
        assert_eq!(hashed.len(), 2 + 64);
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(matches!(
            file_name_for(""),
            Err(StoreError::InvalidKey { .. })
        ));
    }

    #[tokio::test]
    async fn put_get_delete_round_trip() {
        let (_dir, store) = store();

        assert!(store.get("history-list").await.expect("get").is_none());
        store
            .put("history-list", Bytes::from_static(b"[]"))
            .await
            .expect("put");
        store
            .put("history-list", Bytes::from_static(b"[1]"))
            .await
            .expect("overwrite");
        assert_eq!(
            store.get("history-list").await.expect("get").as_deref(),
            Some(&b"[1]"[..])
        );

        store.delete("history-list").await.expect("delete");
        store.delete("history-list").await.expect("delete absent");
        assert!(store.get("history-list").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn put_leaves_no_temp_files() {
        let (_dir, store) = store();
        store.put("a", Bytes::from_static(b"1")).await.expect("put");

        let mut names = Vec::new();
        let mut entries = fs::read_dir(store.root()).await.expect("read dir");
        while let Some(entry) = entries.next_entry().await.expect("entry") {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec![format!("k-{}", hex::encode("a"))]);
    }

    #[tokio::test]
    async fn health_check_passes_for_existing_root() {
        let (_dir, store) = store();
        store.health_check().await.expect("healthy");
    }
}
