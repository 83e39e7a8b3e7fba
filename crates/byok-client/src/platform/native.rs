//! Native backend: vault records as JSON files in an app data directory

use super::{Platform, VaultBackend};
use crate::{ClientError, Result, VaultRecord};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Stores one `<hex(user_id)>.json` file per vault
#[derive(Clone, Debug)]
pub struct NativeBackend {
    dir: PathBuf,
}

impl NativeBackend {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, user_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", hex::encode(user_id.as_bytes())))
    }

    /// Serialize `record` to a fresh temp file in the vault directory
    async fn write_temp(&self, record: &VaultRecord) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| ClientError::InvalidArgument(e.to_string()))?;
        let tmp = self.dir.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, json).await?;
        Ok(tmp)
    }
}

#[async_trait]
impl VaultBackend for NativeBackend {
    fn platform(&self) -> Platform {
        Platform::Native
    }

    async fn load_record(&self, user_id: &str) -> Result<Option<VaultRecord>> {
        let bytes = match tokio::fs::read(self.record_path(user_id)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record = serde_json::from_slice(&bytes)
            .map_err(|e| ClientError::InvalidResponse(format!("corrupt vault record: {}", e)))?;
        Ok(Some(record))
    }

    async fn save_record(&self, record: &VaultRecord) -> Result<()> {
        let tmp = self.write_temp(record).await?;
        let path = self.record_path(&record.user_id);
        tokio::fs::rename(&tmp, &path).await?;
        debug!(path = %path.display(), "vault record saved");
        Ok(())
    }

    async fn create_record(&self, record: &VaultRecord) -> Result<()> {
        let tmp = self.write_temp(record).await?;
        let path = self.record_path(&record.user_id);

        // Linking fails if the record exists, so only one creator wins
        let linked = tokio::fs::hard_link(&tmp, &path).await;
        if let Err(e) = tokio::fs::remove_file(&tmp).await {
            debug!(path = %tmp.display(), error = %e, "temp record not removed");
        }
        match linked {
            Ok(()) => {
                debug!(path = %path.display(), "vault record created");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(ClientError::VaultExists(record.user_id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_record(&self, user_id: &str) -> Result<bool> {
        match tokio::fs::remove_file(self.record_path(user_id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byok_crypto::keys::MIN_ITERATIONS;

    #[tokio::test]
    async fn test_records_persist_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let backend = NativeBackend::new(dir.path().join("vaults"));
        assert!(backend.load_record("alice@example.com").await.unwrap().is_none());

        let (record, _) = VaultRecord::create_with_iterations("alice@example.com", "pw", MIN_ITERATIONS).unwrap();
        backend.save_record(&record).await.unwrap();

        let reopened = NativeBackend::new(dir.path().join("vaults"));
        assert_eq!(reopened.load_record("alice@example.com").await.unwrap(), Some(record));

        assert!(reopened.delete_record("alice@example.com").await.unwrap());
        assert!(!reopened.delete_record("alice@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let backend = NativeBackend::new(dir.path());
        let (first, _) = VaultRecord::create_with_iterations("u1", "first", MIN_ITERATIONS).unwrap();
        let (second, _) = VaultRecord::create_with_iterations("u1", "second", MIN_ITERATIONS).unwrap();

        backend.create_record(&first).await.unwrap();
        assert!(matches!(
            backend.create_record(&second).await,
            Err(ClientError::VaultExists(_))
        ));
        assert_eq!(backend.load_record("u1").await.unwrap(), Some(first));

        // Only the record file is left behind
        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec![format!("{}.json", hex::encode("u1"))]);
    }

    #[tokio::test]
    async fn test_user_ids_cannot_escape_directory() {
        let dir = tempfile::tempdir().unwrap();
        let backend = NativeBackend::new(dir.path());
        let path = backend.record_path("../../etc/passwd");
        assert_eq!(path.parent(), Some(dir.path()));
    }

    #[tokio::test]
    async fn test_corrupt_record() {
        let dir = tempfile::tempdir().unwrap();
        let backend = NativeBackend::new(dir.path());
        tokio::fs::write(backend.record_path("u1"), b"{not json").await.unwrap();
        assert!(matches!(
            backend.load_record("u1").await,
            Err(ClientError::InvalidResponse(_))
        ));
    }
}
