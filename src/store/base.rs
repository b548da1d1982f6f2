use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::file_store::FileStore;
use super::memory_store::MemoryStore;
use crate::config::{StoreBackend, StoreConfig};
use crate::models::Identity;

/// The FallbackStore trait abstracts the single-slot local identity store
/// used when the remote provider is unavailable.
///
/// Failures are not modeled: the slot is assumed always available on the
/// local device. Implementations that can fail internally (disk IO) log and
/// degrade to "nothing persisted".
#[async_trait]
pub trait FallbackStore: Send + Sync {
    async fn read(&self) -> Option<Identity>;
    /// Idempotent overwrite of the single slot.
    async fn write(&self, identity: &Identity);
    async fn clear(&self);
}

/// Creates a concrete fallback store based on the StoreConfig.
/// If `store.enabled = false`, identities do not survive a restart: the
/// in-memory slot is used instead.
pub fn create_store(config: &StoreConfig) -> Arc<dyn FallbackStore> {
    if !config.enabled {
        info!("Fallback store disabled; identities will not survive a restart.");
        return Arc::new(MemoryStore::new());
    }

    match &config.backend {
        Some(StoreBackend::File(file_config)) => {
            info!("Using file fallback store at {}", file_config.path);
            Arc::new(FileStore::new(file_config))
        }
        None => {
            info!("Fallback store enabled but no backend configured; using memory store.");
            Arc::new(MemoryStore::new())
        }
    }
}
