//! Web backend: vault records as JSON strings in a local-storage style map

use super::{Platform, VaultBackend};
use crate::{ClientError, Result, VaultRecord};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{hash_map::Entry, HashMap};

const KEY_PREFIX: &str = "byok:vault:";

/// String key/value storage keyed like browser local storage
#[derive(Debug, Default)]
pub struct WebBackend {
    storage: RwLock<HashMap<String, String>>,
}

impl WebBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn storage_key(user_id: &str) -> String {
        format!("{}{}", KEY_PREFIX, user_id)
    }

    /// Raw stored string, as local storage would return it
    pub fn get_item(&self, key: &str) -> Option<String> {
        self.storage.read().get(key).cloned()
    }
}

#[async_trait]
impl VaultBackend for WebBackend {
    fn platform(&self) -> Platform {
        Platform::Web
    }

    async fn load_record(&self, user_id: &str) -> Result<Option<VaultRecord>> {
        let Some(raw) = self.get_item(&Self::storage_key(user_id)) else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| ClientError::InvalidResponse(format!("corrupt vault record: {}", e)))
    }

    async fn save_record(&self, record: &VaultRecord) -> Result<()> {
        let raw = serde_json::to_string(record).map_err(|e| ClientError::InvalidArgument(e.to_string()))?;
        self.storage.write().insert(Self::storage_key(&record.user_id), raw);
        Ok(())
    }

    async fn create_record(&self, record: &VaultRecord) -> Result<()> {
        let raw = serde_json::to_string(record).map_err(|e| ClientError::InvalidArgument(e.to_string()))?;
        match self.storage.write().entry(Self::storage_key(&record.user_id)) {
            Entry::Occupied(_) => Err(ClientError::VaultExists(record.user_id.clone())),
            Entry::Vacant(slot) => {
                slot.insert(raw);
                Ok(())
            }
        }
    }

    async fn delete_record(&self, user_id: &str) -> Result<bool> {
        Ok(self.storage.write().remove(&Self::storage_key(user_id)).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byok_crypto::keys::MIN_ITERATIONS;

    #[tokio::test]
    async fn test_records_are_json_strings() {
        let backend = WebBackend::new();
        let (record, key) = VaultRecord::create_with_iterations("u1", "pw", MIN_ITERATIONS).unwrap();
        backend.save_record(&record).await.unwrap();

        let raw = backend.get_item("byok:vault:u1").unwrap();
        assert!(raw.contains("\"userId\":\"u1\""));
        assert!(!raw.contains(&key.to_hex()));

        assert_eq!(backend.load_record("u1").await.unwrap(), Some(record));
        assert!(backend.delete_record("u1").await.unwrap());
        assert!(backend.load_record("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_keeps_existing_record() {
        let backend = WebBackend::new();
        let (first, _) = VaultRecord::create_with_iterations("u1", "first", MIN_ITERATIONS).unwrap();
        let (second, _) = VaultRecord::create_with_iterations("u1", "second", MIN_ITERATIONS).unwrap();

        backend.create_record(&first).await.unwrap();
        assert!(matches!(
            backend.create_record(&second).await,
            Err(ClientError::VaultExists(_))
        ));
        assert_eq!(backend.load_record("u1").await.unwrap(), Some(first));
    }
}
