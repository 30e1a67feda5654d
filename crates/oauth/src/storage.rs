//! File-backed session storage
//!
//! Stores one JSON document per session in:
//! - Linux: ~/.local/share/cloud-drive/sessions/
//! - macOS: ~/Library/Application Support/com.clouddrive.cloud-drive/sessions/
//! - Windows: %APPDATA%\clouddrive\cloud-drive\data\sessions\
//!
//! Credentials survive a server restart.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{OAuthError, Result};
use crate::session::{SessionData, SessionId, SessionStore};

/// Storage format version (for future migrations)
const STORAGE_VERSION: u32 = 1;

/// Reads rewrite the file once `last_seen` is older than this
const TOUCH_INTERVAL_SECS: i64 = 5 * 60;

/// On-disk envelope around a session
#[derive(serde::Serialize, serde::Deserialize)]
struct StoredSession {
    version: u32,
    session: SessionData,
}

/// Session store writing one file per session id
///
/// Idle time is measured from the last access, recorded at most every few
/// minutes so plain reads rarely hit the disk. Concurrent writers for one
/// session each stage their own temporary file; the last rename wins.
pub struct FileSessionStore {
    dir: PathBuf,
    idle_timeout: Duration,
}

impl FileSessionStore {
    /// Creates the store, ensuring the directory exists
    pub fn new(dir: impl Into<PathBuf>, idle_timeout: Duration) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| OAuthError::Storage(format!("create {:?}: {}", dir, e)))?;
        info!("Session files stored in {:?}", dir);
        Ok(Self { dir, idle_timeout })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &SessionId) -> PathBuf {
        self.dir.join(format!("{}.json", id.as_str()))
    }

    /// Writes the session atomically through a uniquely named temporary file
    async fn write(&self, id: &SessionId, data: &SessionData) -> Result<()> {
        let content = serde_json::to_string_pretty(&StoredSession {
            version: STORAGE_VERSION,
            session: data.clone(),
        })
        .map_err(|e| OAuthError::Storage(e.to_string()))?;

        let dir = self.dir.clone();
        let path = self.path_for(id);
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| {
                OAuthError::Storage(format!("create temp file in {:?}: {}", dir, e))
            })?;
            tmp.write_all(content.as_bytes())
                .and_then(|()| tmp.as_file().sync_all())
                .map_err(|e| OAuthError::Storage(format!("write {:?}: {}", tmp.path(), e)))?;
            tmp.persist(&path)
                .map_err(|e| OAuthError::Storage(format!("rename to {:?}: {}", path, e.error)))?;
            Ok(())
        })
        .await
        .map_err(|e| OAuthError::Storage(format!("session write task failed: {}", e)))?
    }

    async fn remove_file(&self, path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OAuthError::Storage(format!("remove {:?}: {}", path, e))),
        }
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn get(&self, id: &SessionId) -> Result<Option<SessionData>> {
        let path = self.path_for(id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(OAuthError::Storage(format!("read {:?}: {}", path, e))),
        };

        let stored: StoredSession = match serde_json::from_str(&content) {
            Ok(stored) => stored,
            Err(e) => {
                // An unreadable session is discarded; the user signs in again
                warn!("Discarding corrupt session file {:?}: {}", path, e);
                self.remove_file(&path).await?;
                return Ok(None);
            }
        };

        let now = Utc::now();
        if stored.session.is_idle_at(now, self.idle_timeout) {
            debug!("Session {:?} expired", id);
            self.remove_file(&path).await?;
            return Ok(None);
        }

        let mut session = stored.session;
        if now - session.last_seen >= Duration::seconds(TOUCH_INTERVAL_SECS) {
            session.last_seen = now;
            self.write(id, &session).await?;
        }

        Ok(Some(session))
    }

    async fn set(&self, id: &SessionId, mut data: SessionData) -> Result<()> {
        data.last_seen = Utc::now();
        self.write(id, &data).await?;
        debug!("Saved session {:?}", id);
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<()> {
        self.remove_file(&self.path_for(id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::CredentialRecord;
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn create_test_storage() -> (FileSessionStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileSessionStore::new(temp_dir.path(), Duration::hours(1)).unwrap();
        (storage, temp_dir)
    }

    fn authenticated() -> SessionData {
        SessionData {
            pending: None,
            credential: Some(CredentialRecord {
                access_token: "access".into(),
                refresh_token: Some("refresh".into()),
                token_endpoint: "https://oauth2.googleapis.com/token".into(),
                client_id: "client".into(),
                client_secret: "secret".into(),
                scopes: BTreeSet::from(["https://www.googleapis.com/auth/drive.file".to_string()]),
                expiry: Utc::now() + Duration::hours(1),
            }),
            last_seen: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_save_and_load_session() {
        let (storage, _temp) = create_test_storage();
        let id = SessionId::generate();
        let data = authenticated();

        storage.set(&id, data.clone()).await.unwrap();
        let loaded = storage.get(&id).await.unwrap().unwrap();

        assert_eq!(loaded.credential, data.credential);
        assert!(storage.path_for(&id).exists());
    }

    #[tokio::test]
    async fn test_delete_session() {
        let (storage, _temp) = create_test_storage();
        let id = SessionId::generate();

        storage.set(&id, authenticated()).await.unwrap();
        storage.delete(&id).await.unwrap();
        assert!(storage.get(&id).await.unwrap().is_none());

        // Deleting twice is fine
        storage.delete(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_file_is_discarded() {
        let (storage, _temp) = create_test_storage();
        let id = SessionId::generate();
        std::fs::write(storage.path_for(&id), "{not json").unwrap();

        assert!(storage.get(&id).await.unwrap().is_none());
        assert!(!storage.path_for(&id).exists());
    }

    fn backdate(storage: &FileSessionStore, id: &SessionId, by: Duration) {
        let mut stored: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(storage.path_for(id)).unwrap()).unwrap();
        stored["session"]["last_seen"] = serde_json::to_value(Utc::now() - by).unwrap();
        std::fs::write(storage.path_for(id), stored.to_string()).unwrap();
    }

    fn stored_last_seen(storage: &FileSessionStore, id: &SessionId) -> chrono::DateTime<Utc> {
        let stored: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(storage.path_for(id)).unwrap()).unwrap();
        serde_json::from_value(stored["session"]["last_seen"].clone()).unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_keep_session() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(FileSessionStore::new(temp_dir.path(), Duration::hours(1)).unwrap());
        let id = SessionId::generate();

        for _ in 0..20 {
            let writers: Vec<_> = (0..8)
                .map(|_| {
                    let storage = storage.clone();
                    let id = id.clone();
                    tokio::spawn(async move { storage.set(&id, authenticated()).await })
                })
                .collect();
            let readers: Vec<_> = (0..4)
                .map(|_| {
                    let storage = storage.clone();
                    let id = id.clone();
                    tokio::spawn(async move { storage.get(&id).await })
                })
                .collect();

            for writer in writers {
                writer.await.unwrap().unwrap();
            }
            for reader in readers {
                // Either before the first write or a complete session
                if let Some(data) = reader.await.unwrap().unwrap() {
                    assert!(data.is_authenticated());
                }
            }
            assert!(storage.get(&id).await.unwrap().unwrap().is_authenticated());
        }

        // No temporary files left behind
        let entries = std::fs::read_dir(temp_dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn test_reads_keep_active_session_alive() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileSessionStore::new(temp_dir.path(), Duration::hours(1)).unwrap();
        let id = SessionId::generate();
        storage.set(&id, authenticated()).await.unwrap();

        backdate(&storage, &id, Duration::minutes(50));
        assert!(storage.get(&id).await.unwrap().is_some());
        assert!(stored_last_seen(&storage, &id) > Utc::now() - Duration::minutes(1));

        // Recent reads do not rewrite the file
        let before = stored_last_seen(&storage, &id);
        storage.get(&id).await.unwrap().unwrap();
        assert_eq!(stored_last_seen(&storage, &id), before);
    }

    #[tokio::test]
    async fn test_idle_session_is_removed() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileSessionStore::new(temp_dir.path(), Duration::minutes(5)).unwrap();
        let id = SessionId::generate();
        storage.set(&id, authenticated()).await.unwrap();

        backdate(&storage, &id, Duration::hours(1));

        assert!(storage.get(&id).await.unwrap().is_none());
        assert!(!storage.path_for(&id).exists());
    }
}
