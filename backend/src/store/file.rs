//! Local JSON file backend.

use async_trait::async_trait;
use santa_core::Session;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error};
use uuid::Uuid;

use super::{decode, StateStore, StoreError};

#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn staging_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("state");
        self.path
            .with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4()))
    }
}

#[async_trait]
impl StateStore for FileStore {
    async fn load(&self) -> Result<Session, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => decode(&bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no state file yet");
                Ok(Session::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    // Written and synced to a sibling file first, then renamed over the
    // target, so a crash never leaves a torn document.
    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(session)?;
        let staging = self.staging_path();
        if let Err(err) = write_synced(&staging, &json).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(err.into());
        }
        if let Err(err) = tokio::fs::rename(&staging, &self.path).await {
            error!(path = %self.path.display(), error = %err, "failed to replace state file");
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(err.into());
        }
        Ok(())
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}
