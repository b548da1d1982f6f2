use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::base::FallbackStore;
use crate::models::Identity;

/// Config for the file-backed fallback store.
#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone)]
pub struct FileStoreConfig {
    /// Path of the JSON slot file.
    pub path: String,
}

/// A durable single-slot store: one identity as a JSON file on disk.
///
/// IO errors are logged and treated as an empty slot, which degrades the
/// product to "no identity persisted across restarts".
pub struct FileStore {
    path: String,
}

impl FileStore {
    pub fn new(config: &FileStoreConfig) -> Self {
        Self {
            path: config.path.clone(),
        }
    }
}

#[async_trait]
impl FallbackStore for FileStore {
    async fn read(&self) -> Option<Identity> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Could not read fallback store {}: {}", self.path, e);
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(identity) => Some(identity),
            Err(e) => {
                warn!("Corrupt fallback store {}: {}", self.path, e);
                None
            }
        }
    }

    async fn write(&self, identity: &Identity) {
        let contents = match serde_json::to_string_pretty(identity) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Could not serialize identity: {}", e);
                return;
            }
        };
        if let Some(parent) = std::path::Path::new(&self.path).parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                warn!("Could not create fallback store directory: {}", e);
                return;
            }
        }
        if let Err(e) = tokio::fs::write(&self.path, contents).await {
            warn!("Could not write fallback store {}: {}", self.path, e);
        }
    }

    async fn clear(&self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not clear fallback store {}: {}", self.path, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Identity, IdentitySource};

    fn store_in(dir: &tempfile::TempDir) -> FileStore {
        FileStore::new(&FileStoreConfig {
            path: dir
                .path()
                .join("identity.json")
                .to_string_lossy()
                .into_owned(),
        })
    }

    /// Test that a written identity survives a fresh store instance,
    /// simulating an application restart.
    #[tokio::test]
    async fn test_write_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let identity = Identity::demo("b@x.com", "Bea");

        store_in(&dir).write(&identity).await;
        let restored = store_in(&dir).read().await;

        assert_eq!(restored, Some(identity));
    }

    /// Test that the slot is a single value: a second write overwrites.
    #[tokio::test]
    async fn test_write_overwrites_slot() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.write(&Identity::demo("first@x.com", "First")).await;
        store.write(&Identity::demo("second@x.com", "Second")).await;

        let restored = store.read().await.unwrap();
        assert_eq!(restored.email, "second@x.com");
    }

    /// Test that clear empties the slot and is idempotent.
    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.write(&Identity::demo("c@x.com", "Cee")).await;
        store.clear().await;
        store.clear().await;

        assert_eq!(store.read().await, None);
    }

    /// Test that a corrupt slot file degrades to an empty slot.
    #[tokio::test]
    async fn test_corrupt_slot_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        tokio::fs::write(dir.path().join("identity.json"), "not json")
            .await
            .unwrap();
        assert_eq!(store.read().await, None);

        // And stays usable afterwards.
        let identity = Identity::new(
            "id-9".to_string(),
            "d@x.com".to_string(),
            "Dee".to_string(),
            IdentitySource::Email,
        );
        store.write(&identity).await;
        assert_eq!(store.read().await, Some(identity));
    }
}
