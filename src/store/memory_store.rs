use std::sync::Mutex;

use async_trait::async_trait;

use super::base::FallbackStore;
use crate::models::Identity;

/// An in-process single-slot store, used when persistence is disabled and by
/// tests. Identities kept here do not survive a restart.
pub struct MemoryStore {
    slot: Mutex<Option<Identity>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            slot: Mutex::new(None),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FallbackStore for MemoryStore {
    async fn read(&self) -> Option<Identity> {
        self.slot.lock().expect("slot lock poisoned").clone()
    }

    async fn write(&self, identity: &Identity) {
        *self.slot.lock().expect("slot lock poisoned") = Some(identity.clone());
    }

    async fn clear(&self) {
        *self.slot.lock().expect("slot lock poisoned") = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test the write/read/clear cycle of the in-memory slot.
    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.read().await, None);

        let identity = Identity::demo("m@x.com", "Em");
        store.write(&identity).await;
        assert_eq!(store.read().await, Some(identity));

        store.clear().await;
        assert_eq!(store.read().await, None);
    }
}
